use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 单行匹配结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchOutcome {
    Matched,
    PartialQuantity,
    PriceVarianceMinor,
    PriceVarianceMajor,
    NoGoodsReceipt,
    NoPo,
    DuplicateInvoice,
}

impl MatchOutcome {
    /// 显式严重度全序 (审计用), 数值越大越严重:
    /// DUPLICATE_INVOICE > NO_PO > NO_GOODS_RECEIPT > PRICE_VARIANCE_MAJOR
    /// > PRICE_VARIANCE_MINOR > PARTIAL_QUANTITY > MATCHED
    pub fn severity(&self) -> u8 {
        match self {
            MatchOutcome::Matched => 0,
            MatchOutcome::PartialQuantity => 1,
            MatchOutcome::PriceVarianceMinor => 2,
            MatchOutcome::PriceVarianceMajor => 3,
            MatchOutcome::NoGoodsReceipt => 4,
            MatchOutcome::NoPo => 5,
            MatchOutcome::DuplicateInvoice => 6,
        }
    }

    /// 是否需要人工复核 (MATCHED 以外全部进复核队列)
    pub fn needs_review(&self) -> bool {
        !matches!(self, MatchOutcome::Matched)
    }
}

impl PartialOrd for MatchOutcome {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MatchOutcome {
    fn cmp(&self, other: &Self) -> Ordering {
        self.severity().cmp(&other.severity())
    }
}

impl std::fmt::Display for MatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MatchOutcome::Matched => "MATCHED",
            MatchOutcome::PartialQuantity => "PARTIAL_QUANTITY",
            MatchOutcome::PriceVarianceMinor => "PRICE_VARIANCE_MINOR",
            MatchOutcome::PriceVarianceMajor => "PRICE_VARIANCE_MAJOR",
            MatchOutcome::NoGoodsReceipt => "NO_GOODS_RECEIPT",
            MatchOutcome::NoPo => "NO_PO",
            MatchOutcome::DuplicateInvoice => "DUPLICATE_INVOICE",
        };
        f.write_str(s)
    }
}

/// 本次判定实际采用的容差值, 随结果一起输出
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedTolerances {
    pub price_pct: BigDecimal,
    pub qty_pct: BigDecimal,
    pub amount_abs: BigDecimal,
}

/// 单行匹配结果: 结论 + 差异额 + 采用的容差
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineMatch {
    pub invoice_id: String,
    pub order_id: String,
    pub line_id: u32,
    pub material_id: String,
    pub outcome: MatchOutcome,
    pub invoiced_qty: BigDecimal,
    pub received_qty: Option<BigDecimal>,
    pub invoiced_price: BigDecimal,
    pub po_price: Option<BigDecimal>,
    /// (实收 - 开票数量) / 开票数量, 百分比
    pub qty_variance_pct: Option<BigDecimal>,
    /// (开票单价 - PO 单价) / PO 单价, 百分比
    pub price_variance_pct: Option<BigDecimal>,
    /// 行金额 - 实收数量 × PO 单价
    pub amount_variance: Option<BigDecimal>,
    /// 数量不足标记, 即使价格问题占优也保留
    pub quantity_short: bool,
    pub amount_out_of_tolerance: bool,
    pub tolerances: AppliedTolerances,
}

/// 发票级处置结论: 各行结论中最严重者胜出
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceDisposition {
    pub invoice_id: String,
    pub disposition: MatchOutcome,
    pub lines: Vec<LineMatch>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_total_order() {
        let asc = [
            MatchOutcome::Matched,
            MatchOutcome::PartialQuantity,
            MatchOutcome::PriceVarianceMinor,
            MatchOutcome::PriceVarianceMajor,
            MatchOutcome::NoGoodsReceipt,
            MatchOutcome::NoPo,
            MatchOutcome::DuplicateInvoice,
        ];
        for pair in asc.windows(2) {
            assert!(pair[0] < pair[1], "{} should rank below {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn worst_outcome_wins() {
        let worst = [
            MatchOutcome::PartialQuantity,
            MatchOutcome::NoGoodsReceipt,
            MatchOutcome::PriceVarianceMinor,
        ]
        .into_iter()
        .max()
        .unwrap();
        assert_eq!(worst, MatchOutcome::NoGoodsReceipt);
    }

    #[test]
    fn serializes_to_screaming_snake_case() {
        let json = serde_json::to_string(&MatchOutcome::NoPo).unwrap();
        assert_eq!(json, "\"NO_PO\"");
        let json = serde_json::to_string(&MatchOutcome::PriceVarianceMinor).unwrap();
        assert_eq!(json, "\"PRICE_VARIANCE_MINOR\"");
    }
}
