use bigdecimal::{BigDecimal, Zero};
use dashmap::DashMap;
use indexmap::IndexMap;
use rayon::prelude::*;

use crate::config::ToleranceConfig;
use crate::errors::ConfigError;
use crate::loader::MatchInput;
use crate::models::{
    DuplicateKey, GoodsReceiptLine, InvoiceLine, LineKey, LineMatch, MatchOutcome,
    PurchaseOrderLine,
};
use crate::service::tolerance::{variance_pct, within_tolerance, Tolerances};

/// 运行级重复发票集合。一次运行一个实例, 跨运行必须重建或 clear。
/// DashMap 提供原子 insert-if-absent, 并行路径下也安全。
#[derive(Debug, Default)]
pub struct DuplicateTracker {
    seen: DashMap<DuplicateKey, ()>,
}

impl DuplicateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 首次出现返回 true, 此后对同一键永远返回 false
    pub fn first_time(&self, key: DuplicateKey) -> bool {
        self.seen.insert(key, ()).is_none()
    }

    pub fn clear(&self) {
        self.seen.clear();
    }
}

/// 三单匹配引擎: 纯函数, 无 I/O, 同样输入必得同样输出
pub struct MatchEngine {
    tolerances: Tolerances,
}

impl MatchEngine {
    pub fn new(tolerances: Tolerances) -> Self {
        Self { tolerances }
    }

    pub fn from_config(cfg: &ToleranceConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(Tolerances::try_from(cfg)?))
    }

    pub fn tolerances(&self) -> &Tolerances {
        &self.tolerances
    }

    /// 顺序匹配全部发票行
    pub fn match_lines(&self, input: &MatchInput) -> Vec<LineMatch> {
        let dup_flags = self.duplicate_flags(&input.invoices);
        let total = input.invoices.len();
        tracing::info!("开始匹配: {} 条发票行", total);

        let mut results = Vec::with_capacity(total);
        for (idx, (line, is_dup)) in input.invoices.iter().zip(dup_flags).enumerate() {
            results.push(self.classify_line(line, is_dup, &input.po, &input.receipts));
            let current = idx + 1;
            if current % 500 == 0 {
                tracing::info!("匹配进度: {}/{}", current, total);
            }
        }

        tracing::info!("匹配完成: {} 条发票行", total);
        results
    }

    /// 并行匹配: 重复检测先走一遍顺序预扫描 (结果与输入顺序绑定, 保持确定性),
    /// 分类阶段按行并行, 行与行之间再无共享状态。
    pub fn match_lines_par(&self, input: &MatchInput) -> Vec<LineMatch> {
        let dup_flags = self.duplicate_flags(&input.invoices);
        tracing::info!("开始并行匹配: {} 条发票行", input.invoices.len());

        input
            .invoices
            .par_iter()
            .zip(dup_flags)
            .map(|(line, is_dup)| self.classify_line(line, is_dup, &input.po, &input.receipts))
            .collect()
    }

    /// 按输入顺序标记重复发票行: 第二次及以后出现的同键行为 true
    fn duplicate_flags(&self, invoices: &[InvoiceLine]) -> Vec<bool> {
        let tracker = DuplicateTracker::new();
        invoices
            .iter()
            .map(|line| !tracker.first_time(line.dup_key()))
            .collect()
    }

    /// 单行判定, 见各步骤注释。优先级:
    /// DUPLICATE > NO_PO > NO_GR > 重大价差 > 轻微价差 > 数量不足 > MATCHED
    pub fn classify_line(
        &self,
        line: &InvoiceLine,
        is_duplicate: bool,
        po_index: &IndexMap<LineKey, PurchaseOrderLine>,
        receipts: &IndexMap<LineKey, Vec<GoodsReceiptLine>>,
    ) -> LineMatch {
        let mut result = LineMatch {
            invoice_id: line.invoice_id.clone(),
            order_id: line.order_id.clone(),
            line_id: line.line_id,
            material_id: line.material_id.clone(),
            outcome: MatchOutcome::Matched,
            invoiced_qty: line.invoiced_qty.clone(),
            received_qty: None,
            invoiced_price: line.invoiced_price.clone(),
            po_price: None,
            qty_variance_pct: None,
            price_variance_pct: None,
            amount_variance: None,
            quantity_short: false,
            amount_out_of_tolerance: false,
            tolerances: self.tolerances.snapshot(),
        };

        // 0. 重复发票: 跳过全部后续检查
        if is_duplicate {
            result.outcome = MatchOutcome::DuplicateInvoice;
            return result;
        }

        // 1. PO 行查找, 缺失即终态
        let Some(po) = po_index.get(&line.key()) else {
            result.outcome = MatchOutcome::NoPo;
            return result;
        };
        result.po_price = Some(po.unit_price.clone());

        // 2. 收货汇总 (分批收货求和), 无收货即终态
        let received: Option<BigDecimal> = receipts.get(&line.key()).and_then(|rows| {
            if rows.is_empty() {
                None
            } else {
                Some(
                    rows.iter()
                        .fold(BigDecimal::zero(), |acc, r| acc + &r.received_qty),
                )
            }
        });
        let Some(received) = received else {
            result.outcome = MatchOutcome::NoGoodsReceipt;
            return result;
        };
        result.received_qty = Some(received.clone());

        // 3. 数量检查: 超容差且实收不足才算数量问题, 之后继续查价格
        let qty_ok = within_tolerance(&line.invoiced_qty, &received, &self.tolerances.qty_policy());
        result.quantity_short = !qty_ok && received < line.invoiced_qty;
        result.qty_variance_pct = variance_pct(&line.invoiced_qty, &received);

        // 4. 价格检查: 超容差但在 major 线以内算轻微, 超过算重大
        let price_ok = within_tolerance(
            &po.unit_price,
            &line.invoiced_price,
            &self.tolerances.price_policy(),
        );
        let price_flag = if price_ok {
            None
        } else if within_tolerance(
            &po.unit_price,
            &line.invoiced_price,
            &self.tolerances.major_price_policy(),
        ) {
            Some(MatchOutcome::PriceVarianceMinor)
        } else {
            Some(MatchOutcome::PriceVarianceMajor)
        };
        result.price_variance_pct = variance_pct(&po.unit_price, &line.invoiced_price);

        // 5. 金额检查: 行金额 vs 实收数量 × PO 单价, 绝对容差。
        //    超差只记录标记; 结论升级另看行内一致性 (见第 6 步),
        //    否则容差内的价差 (如 1.5%) 会因数量大被金额检查误伤。
        let expected_amount = (&received * &po.unit_price).with_scale(2);
        result.amount_out_of_tolerance = !within_tolerance(
            &expected_amount,
            &line.line_total,
            &self.tolerances.amount_policy(),
        );
        result.amount_variance = Some(&line.line_total - &expected_amount);

        // 6. 汇总各标记, 最严重者胜出。金额标记只在行金额与自身
        //    数量 × 单价 都对不上 (供应商算术错误) 时才独立升级为轻微差异。
        let internal_amount = (&line.invoiced_qty * &line.invoiced_price).with_scale(2);
        let internally_inconsistent = !within_tolerance(
            &internal_amount,
            &line.line_total,
            &self.tolerances.amount_policy(),
        );

        let mut outcome = MatchOutcome::Matched;
        if result.quantity_short {
            outcome = outcome.max(MatchOutcome::PartialQuantity);
        }
        if let Some(flag) = price_flag {
            outcome = outcome.max(flag);
        }
        if internally_inconsistent {
            outcome = outcome.max(MatchOutcome::PriceVarianceMinor);
        }
        result.outcome = outcome;
        result
    }
}
