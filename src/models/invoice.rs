use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use super::LineKey;

/// 发票明细 (RSEG)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub invoice_id: String,   // BELNR
    pub order_id: String,
    pub line_id: u32,
    pub material_id: String,
    pub invoiced_qty: BigDecimal,
    pub invoiced_price: BigDecimal,
    pub line_total: BigDecimal, // WRBTR
    pub currency: String,
}

impl InvoiceLine {
    pub fn key(&self) -> LineKey {
        LineKey::new(self.order_id.clone(), self.line_id)
    }

    /// 重复发票识别键: 同一运行内 (订单, 行, 数量, 单价) 完全一致即视为重复提交。
    /// 数量/单价先 normalized 再转字符串, 保证 100 与 100.00 命中同一个键。
    pub fn dup_key(&self) -> DuplicateKey {
        DuplicateKey {
            order_id: self.order_id.clone(),
            line_id: self.line_id,
            qty: self.invoiced_qty.normalized().to_string(),
            price: self.invoiced_price.normalized().to_string(),
        }
    }
}

/// 重复发票识别键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DuplicateKey {
    pub order_id: String,
    pub line_id: u32,
    pub qty: String,
    pub price: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn line(qty: &str, price: &str) -> InvoiceLine {
        InvoiceLine {
            invoice_id: "512000".into(),
            order_id: "451000".into(),
            line_id: 10,
            material_id: "M100".into(),
            invoiced_qty: BigDecimal::from_str(qty).unwrap(),
            invoiced_price: BigDecimal::from_str(price).unwrap(),
            line_total: BigDecimal::from_str("0").unwrap(),
            currency: "USD".into(),
        }
    }

    #[test]
    fn dup_key_ignores_trailing_zeros() {
        assert_eq!(line("100", "10.5").dup_key(), line("100.00", "10.50").dup_key());
    }

    #[test]
    fn dup_key_distinguishes_amounts() {
        assert_ne!(line("100", "10.5").dup_key(), line("100", "10.51").dup_key());
    }
}
