use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::models::{InvoiceDisposition, LineMatch, MatchOutcome};

/// 行级结果聚合为发票级处置: 同一发票各行取最严重结论, 保持首见顺序
pub fn aggregate(lines: Vec<LineMatch>) -> Vec<InvoiceDisposition> {
    let mut by_invoice: IndexMap<String, Vec<LineMatch>> = IndexMap::new();
    for line in lines {
        by_invoice
            .entry(line.invoice_id.clone())
            .or_default()
            .push(line);
    }

    by_invoice
        .into_iter()
        .map(|(invoice_id, lines)| {
            let disposition = lines
                .iter()
                .map(|l| l.outcome)
                .max()
                .unwrap_or(MatchOutcome::Matched);
            InvoiceDisposition {
                invoice_id,
                disposition,
                lines,
            }
        })
        .collect()
}

/// 一次运行的分类统计 (发票级)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_invoices: usize,
    pub total_lines: usize,
    pub matched: usize,
    pub partial_quantity: usize,
    pub price_variance_minor: usize,
    pub price_variance_major: usize,
    pub no_goods_receipt: usize,
    pub no_po: usize,
    pub duplicate_invoice: usize,
    /// 装载阶段拒绝的坏行数
    pub malformed_lines: usize,
}

impl RunSummary {
    pub fn from_dispositions(dispositions: &[InvoiceDisposition], malformed_lines: usize) -> Self {
        let mut s = RunSummary {
            total_invoices: dispositions.len(),
            malformed_lines,
            ..Default::default()
        };
        for d in dispositions {
            s.total_lines += d.lines.len();
            match d.disposition {
                MatchOutcome::Matched => s.matched += 1,
                MatchOutcome::PartialQuantity => s.partial_quantity += 1,
                MatchOutcome::PriceVarianceMinor => s.price_variance_minor += 1,
                MatchOutcome::PriceVarianceMajor => s.price_variance_major += 1,
                MatchOutcome::NoGoodsReceipt => s.no_goods_receipt += 1,
                MatchOutcome::NoPo => s.no_po += 1,
                MatchOutcome::DuplicateInvoice => s.duplicate_invoice += 1,
            }
        }
        s
    }

    /// 需要人工复核的发票数
    pub fn needs_review(&self) -> usize {
        self.total_invoices - self.matched
    }

    pub fn log(&self) {
        tracing::info!(
            "匹配统计: 发票 {}, 行 {}, MATCHED {}, 数量不足 {}, 轻微价差 {}, 重大价差 {}, 无收货 {}, 无PO {}, 重复 {}, 坏行 {}",
            self.total_invoices,
            self.total_lines,
            self.matched,
            self.partial_quantity,
            self.price_variance_minor,
            self.price_variance_major,
            self.no_goods_receipt,
            self.no_po,
            self.duplicate_invoice,
            self.malformed_lines
        );
    }
}

/// 处置结果平铺导出 CSV (一行结果一条记录)
pub fn write_dispositions_csv<W: Write>(
    writer: W,
    dispositions: &[InvoiceDisposition],
) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([
        "invoice_id",
        "disposition",
        "order_id",
        "line_id",
        "material_id",
        "outcome",
        "invoiced_qty",
        "received_qty",
        "invoiced_price",
        "po_price",
        "qty_variance_pct",
        "price_variance_pct",
        "amount_variance",
        "quantity_short",
        "amount_out_of_tolerance",
    ])?;

    fn opt<T: std::fmt::Display>(v: &Option<T>) -> String {
        v.as_ref().map(|x| x.to_string()).unwrap_or_default()
    }

    for d in dispositions {
        for l in &d.lines {
            let row: [String; 15] = [
                d.invoice_id.clone(),
                d.disposition.to_string(),
                l.order_id.clone(),
                l.line_id.to_string(),
                l.material_id.clone(),
                l.outcome.to_string(),
                l.invoiced_qty.to_string(),
                opt(&l.received_qty),
                l.invoiced_price.to_string(),
                opt(&l.po_price),
                opt(&l.qty_variance_pct),
                opt(&l.price_variance_pct),
                opt(&l.amount_variance),
                l.quantity_short.to_string(),
                l.amount_out_of_tolerance.to_string(),
            ];
            wtr.write_record(&row)?;
        }
    }
    wtr.flush()?;
    Ok(())
}
