use bigdecimal::BigDecimal;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;

use crate::errors::{LoadError, MalformedRecord};
use crate::models::{GoodsReceiptLine, InvoiceLine, LineKey, PurchaseOrderLine};

/// 原始记录: 字段名 -> 字符串值 (CSV 行或上游传入的映射)
pub type RawRecord = HashMap<String, String>;

const PO_TABLE: &str = "EKPO";
const GR_TABLE: &str = "MSEG";
const INV_TABLE: &str = "RSEG";

/// 装载结果: 三个记录集 + 被拒绝的坏行
#[derive(Debug, Default)]
pub struct MatchInput {
    /// PO 行, 键唯一
    pub po: IndexMap<LineKey, PurchaseOrderLine>,
    /// 收货行, 同键可多条 (分批收货)
    pub receipts: IndexMap<LineKey, Vec<GoodsReceiptLine>>,
    /// 发票行, 保持输入顺序 (重复检测依赖顺序)
    pub invoices: Vec<InvoiceLine>,
    /// 数字字段解析失败的行, 逐行上报, 不中断装载
    pub rejects: Vec<MalformedRecord>,
}

impl MatchInput {
    pub fn invoice_count(&self) -> usize {
        let ids: HashSet<&str> = self.invoices.iter().map(|l| l.invoice_id.as_str()).collect();
        ids.len()
    }

    /// 发票号 -> 其全部明细行, 保持首见顺序
    pub fn invoices_by_id(&self) -> IndexMap<&str, Vec<&InvoiceLine>> {
        let mut map: IndexMap<&str, Vec<&InvoiceLine>> = IndexMap::new();
        for line in &self.invoices {
            map.entry(line.invoice_id.as_str()).or_default().push(line);
        }
        map
    }
}

fn req<'a>(
    rec: &'a RawRecord,
    table: &'static str,
    row: usize,
    field: &'static str,
) -> Result<&'a str, LoadError> {
    match rec.get(field).map(|v| v.trim()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(LoadError::MissingField { table, row, field }),
    }
}

fn parse_dec(
    table: &'static str,
    row: usize,
    field: &'static str,
    raw: &str,
) -> Result<BigDecimal, MalformedRecord> {
    BigDecimal::from_str(raw).map_err(|_| MalformedRecord {
        table,
        row,
        field,
        value: raw.to_string(),
    })
}

fn parse_line_id(
    table: &'static str,
    row: usize,
    field: &'static str,
    raw: &str,
) -> Result<u32, MalformedRecord> {
    raw.parse::<u32>().map_err(|_| MalformedRecord {
        table,
        row,
        field,
        value: raw.to_string(),
    })
}

/// 装载 PO 行 (EKPO)。缺字段/键重复是致命错误; 数字解析失败仅拒绝该行。
pub fn load_po_lines(
    records: &[RawRecord],
) -> Result<(IndexMap<LineKey, PurchaseOrderLine>, Vec<MalformedRecord>), LoadError> {
    let mut lines = IndexMap::with_capacity(records.len());
    let mut rejects = Vec::new();

    for (idx, rec) in records.iter().enumerate() {
        let row = idx + 1;
        let order_id = req(rec, PO_TABLE, row, "EBELN")?;
        let line_raw = req(rec, PO_TABLE, row, "EBELP")?;
        let material = req(rec, PO_TABLE, row, "MATNR")?;
        let qty_raw = req(rec, PO_TABLE, row, "MENGE")?;
        let price_raw = req(rec, PO_TABLE, row, "NETPR")?;
        let currency = req(rec, PO_TABLE, row, "WAERS")?;

        let line_id = match parse_line_id(PO_TABLE, row, "EBELP", line_raw) {
            Ok(v) => v,
            Err(e) => {
                rejects.push(e);
                continue;
            }
        };
        let ordered_qty = match parse_dec(PO_TABLE, row, "MENGE", qty_raw) {
            Ok(v) => v,
            Err(e) => {
                rejects.push(e);
                continue;
            }
        };
        let unit_price = match parse_dec(PO_TABLE, row, "NETPR", price_raw) {
            Ok(v) => v,
            Err(e) => {
                rejects.push(e);
                continue;
            }
        };

        let line = PurchaseOrderLine {
            order_id: order_id.to_string(),
            line_id,
            material_id: material.to_string(),
            ordered_qty,
            unit_price,
            currency: currency.to_string(),
        };

        if lines.insert(line.key(), line).is_some() {
            return Err(LoadError::DuplicatePoKey {
                order_id: order_id.to_string(),
                line_id,
            });
        }
    }

    Ok((lines, rejects))
}

/// 装载收货行 (MSEG), 同一 PO 行键允许重复出现
pub fn load_receipt_lines(
    records: &[RawRecord],
) -> Result<(IndexMap<LineKey, Vec<GoodsReceiptLine>>, Vec<MalformedRecord>), LoadError> {
    let mut receipts: IndexMap<LineKey, Vec<GoodsReceiptLine>> = IndexMap::new();
    let mut rejects = Vec::new();

    for (idx, rec) in records.iter().enumerate() {
        let row = idx + 1;
        let order_id = req(rec, GR_TABLE, row, "EBELN")?;
        let line_raw = req(rec, GR_TABLE, row, "EBELP")?;
        let material = req(rec, GR_TABLE, row, "MATNR")?;
        let qty_raw = req(rec, GR_TABLE, row, "MENGE")?;
        let value_raw = req(rec, GR_TABLE, row, "DMBTR")?;

        let parsed = (|| -> Result<GoodsReceiptLine, MalformedRecord> {
            Ok(GoodsReceiptLine {
                order_id: order_id.to_string(),
                line_id: parse_line_id(GR_TABLE, row, "EBELP", line_raw)?,
                material_id: material.to_string(),
                received_qty: parse_dec(GR_TABLE, row, "MENGE", qty_raw)?,
                received_value: parse_dec(GR_TABLE, row, "DMBTR", value_raw)?,
            })
        })();

        match parsed {
            Ok(line) => receipts.entry(line.key()).or_default().push(line),
            Err(e) => rejects.push(e),
        }
    }

    Ok((receipts, rejects))
}

/// 装载发票行 (RSEG), 保持输入顺序
pub fn load_invoice_lines(
    records: &[RawRecord],
) -> Result<(Vec<InvoiceLine>, Vec<MalformedRecord>), LoadError> {
    let mut lines = Vec::with_capacity(records.len());
    let mut rejects = Vec::new();

    for (idx, rec) in records.iter().enumerate() {
        let row = idx + 1;
        let invoice_id = req(rec, INV_TABLE, row, "BELNR")?;
        let order_id = req(rec, INV_TABLE, row, "EBELN")?;
        let line_raw = req(rec, INV_TABLE, row, "EBELP")?;
        let material = req(rec, INV_TABLE, row, "MATNR")?;
        let qty_raw = req(rec, INV_TABLE, row, "MENGE")?;
        let price_raw = req(rec, INV_TABLE, row, "NETPR")?;
        let total_raw = req(rec, INV_TABLE, row, "WRBTR")?;
        let currency = req(rec, INV_TABLE, row, "WAERS")?;

        let parsed = (|| -> Result<InvoiceLine, MalformedRecord> {
            Ok(InvoiceLine {
                invoice_id: invoice_id.to_string(),
                order_id: order_id.to_string(),
                line_id: parse_line_id(INV_TABLE, row, "EBELP", line_raw)?,
                material_id: material.to_string(),
                invoiced_qty: parse_dec(INV_TABLE, row, "MENGE", qty_raw)?,
                invoiced_price: parse_dec(INV_TABLE, row, "NETPR", price_raw)?,
                line_total: parse_dec(INV_TABLE, row, "WRBTR", total_raw)?,
                currency: currency.to_string(),
            })
        })();

        match parsed {
            Ok(line) => lines.push(line),
            Err(e) => rejects.push(e),
        }
    }

    Ok((lines, rejects))
}

/// 从三个内存记录序列组装匹配输入
pub fn load_from_records(
    po: &[RawRecord],
    gr: &[RawRecord],
    inv: &[RawRecord],
) -> Result<MatchInput, LoadError> {
    let (po, mut rejects) = load_po_lines(po)?;
    let (receipts, r2) = load_receipt_lines(gr)?;
    let (invoices, r3) = load_invoice_lines(inv)?;
    rejects.extend(r2);
    rejects.extend(r3);

    if !rejects.is_empty() {
        for r in &rejects {
            tracing::warn!("rejected row: {}", r);
        }
    }

    Ok(MatchInput {
        po,
        receipts,
        invoices,
        rejects,
    })
}

/// 把一个 CSV 表读成原始记录序列 (表头 -> 值)
pub fn read_table(path: &Path) -> Result<Vec<RawRecord>, LoadError> {
    let mut rdr = csv::Reader::from_path(path)?;
    let headers = rdr.headers()?.clone();
    let mut records = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        let map: RawRecord = headers
            .iter()
            .zip(rec.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        records.push(map);
    }
    Ok(records)
}

/// 从目录读取 EKPO.csv / MSEG.csv / RSEG.csv 并组装匹配输入
pub fn load_from_dir(dir: &Path) -> Result<MatchInput, LoadError> {
    let po = read_table(&dir.join("EKPO.csv"))?;
    let gr = read_table(&dir.join("MSEG.csv"))?;
    let inv = read_table(&dir.join("RSEG.csv"))?;

    let input = load_from_records(&po, &gr, &inv)?;
    tracing::info!(
        "装载完成: {} 条 PO 行, {} 个收货键, {} 条发票行, 拒绝 {} 行",
        input.po.len(),
        input.receipts.len(),
        input.invoices.len(),
        input.rejects.len()
    );
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(pairs: &[(&str, &str)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn po_rec(ebeln: &str, ebelp: &str, menge: &str, netpr: &str) -> RawRecord {
        rec(&[
            ("EBELN", ebeln),
            ("EBELP", ebelp),
            ("MATNR", "M100"),
            ("MENGE", menge),
            ("NETPR", netpr),
            ("WAERS", "USD"),
        ])
    }

    #[test]
    fn po_missing_field_is_fatal() {
        let mut r = po_rec("451000", "10", "100", "10.00");
        r.remove("NETPR");
        let err = load_po_lines(&[r]).unwrap_err();
        assert!(matches!(
            err,
            LoadError::MissingField { field: "NETPR", .. }
        ));
    }

    #[test]
    fn po_blank_field_counts_as_missing() {
        let r = po_rec("451000", "10", "  ", "10.00");
        assert!(load_po_lines(&[r]).is_err());
    }

    #[test]
    fn po_duplicate_key_is_fatal() {
        let rows = vec![
            po_rec("451000", "10", "100", "10.00"),
            po_rec("451000", "10", "50", "9.00"),
        ];
        let err = load_po_lines(&rows).unwrap_err();
        assert!(matches!(err, LoadError::DuplicatePoKey { .. }));
    }

    #[test]
    fn malformed_numeric_rejects_line_only() {
        let rows = vec![
            po_rec("451000", "10", "abc", "10.00"),
            po_rec("451000", "20", "100", "10.00"),
        ];
        let (lines, rejects) = load_po_lines(&rows).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(rejects.len(), 1);
        assert_eq!(rejects[0].field, "MENGE");
        assert!(lines.contains_key(&LineKey::new("451000", 20)));
    }

    #[test]
    fn receipts_allow_repeated_keys() {
        let gr = |menge: &str| {
            rec(&[
                ("EBELN", "451000"),
                ("EBELP", "10"),
                ("MATNR", "M100"),
                ("MENGE", menge),
                ("DMBTR", "500"),
            ])
        };
        let (receipts, rejects) = load_receipt_lines(&[gr("40"), gr("60")]).unwrap();
        assert!(rejects.is_empty());
        assert_eq!(receipts[&LineKey::new("451000", 10)].len(), 2);
    }

    #[test]
    fn invoices_preserve_input_order() {
        let inv = |belnr: &str| {
            rec(&[
                ("BELNR", belnr),
                ("EBELN", "451000"),
                ("EBELP", "10"),
                ("MATNR", "M100"),
                ("MENGE", "100"),
                ("NETPR", "10.00"),
                ("WRBTR", "1000.00"),
                ("WAERS", "USD"),
            ])
        };
        let (lines, _) = load_invoice_lines(&[inv("512001"), inv("512000")]).unwrap();
        assert_eq!(lines[0].invoice_id, "512001");
        assert_eq!(lines[1].invoice_id, "512000");
    }
}
