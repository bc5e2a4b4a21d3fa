use bigdecimal::BigDecimal;
use chrono::{Duration, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::loader::RawRecord;
use crate::models::MatchOutcome;

const CURRENCIES: &[&str] = &["USD", "EUR", "GBP", "INR", "JPY"];
const COUNTRIES: &[&str] = &["US", "DE", "GB", "IN", "JP", "FR"];
const CITIES: &[&str] = &["Austin", "Hamburg", "Leeds", "Pune", "Osaka", "Lyon"];
const NAME_STEMS: &[&str] = &[
    "Acme", "Northwind", "Globex", "Initech", "Vandelay", "Umbrella", "Hooli", "Cyberdyne",
    "Pinnacle", "Redwood", "Meridian", "Atlas",
];
const NAME_SUFFIXES: &[&str] = &[
    "Industries",
    "Logistics",
    "Supply Co",
    "Group",
    "GmbH",
    "LLC",
    "Trading",
    "Manufacturing",
];

/// 发票场景: 每张合成发票按分布注入一种预期问题
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scenario {
    PerfectMatch,
    PartialQty,
    PriceVarianceMinor,
    PriceVarianceMajor,
    NoPo,
    NoGr,
    DuplicateInvoice,
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::PerfectMatch => "PERFECT_MATCH",
            Scenario::PartialQty => "PARTIAL_QTY",
            Scenario::PriceVarianceMinor => "PRICE_VARIANCE_MINOR",
            Scenario::PriceVarianceMajor => "PRICE_VARIANCE_MAJOR",
            Scenario::NoPo => "NO_PO",
            Scenario::NoGr => "NO_GR",
            Scenario::DuplicateInvoice => "DUPLICATE_INVOICE",
        }
    }

    /// 注入该场景后引擎应得的结论 (默认容差下)
    pub fn expected_outcome(&self) -> MatchOutcome {
        match self {
            Scenario::PerfectMatch => MatchOutcome::Matched,
            Scenario::PartialQty => MatchOutcome::PartialQuantity,
            Scenario::PriceVarianceMinor => MatchOutcome::PriceVarianceMinor,
            Scenario::PriceVarianceMajor => MatchOutcome::PriceVarianceMajor,
            Scenario::NoPo => MatchOutcome::NoPo,
            Scenario::NoGr => MatchOutcome::NoGoodsReceipt,
            Scenario::DuplicateInvoice => MatchOutcome::DuplicateInvoice,
        }
    }
}

/// 场景分布 (权重之和应为 1.0, 内部按比例归一)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioWeights {
    pub perfect_match: f64,
    pub partial_qty: f64,
    pub price_variance_minor: f64,
    pub price_variance_major: f64,
    pub no_po: f64,
    pub no_gr: f64,
    pub duplicate_invoice: f64,
}

impl Default for ScenarioWeights {
    fn default() -> Self {
        Self {
            perfect_match: 0.40,
            partial_qty: 0.20,
            price_variance_minor: 0.15,
            price_variance_major: 0.10,
            no_po: 0.07,
            no_gr: 0.05,
            duplicate_invoice: 0.03,
        }
    }
}

impl ScenarioWeights {
    pub fn total(&self) -> f64 {
        self.perfect_match
            + self.partial_qty
            + self.price_variance_minor
            + self.price_variance_major
            + self.no_po
            + self.no_gr
            + self.duplicate_invoice
    }

    fn pick(&self, rng: &mut StdRng) -> Scenario {
        let entries = [
            (Scenario::PerfectMatch, self.perfect_match),
            (Scenario::PartialQty, self.partial_qty),
            (Scenario::PriceVarianceMinor, self.price_variance_minor),
            (Scenario::PriceVarianceMajor, self.price_variance_major),
            (Scenario::NoPo, self.no_po),
            (Scenario::NoGr, self.no_gr),
            (Scenario::DuplicateInvoice, self.duplicate_invoice),
        ];
        let mut r = rng.gen::<f64>() * self.total();
        for (scenario, w) in entries {
            if r < w {
                return scenario;
            }
            r -= w;
        }
        Scenario::PerfectMatch
    }
}

/// 数据生成设置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataGenConfig {
    pub num_vendors: usize,
    pub num_purchase_orders: usize,
    pub num_invoices: usize,
    /// 固定随机种子可复现同一套数据
    pub seed: Option<u64>,
    pub scenarios: ScenarioWeights,
}

impl Default for DataGenConfig {
    fn default() -> Self {
        Self {
            num_vendors: 50,
            num_purchase_orders: 200,
            num_invoices: 300,
            seed: None,
            scenarios: ScenarioWeights::default(),
        }
    }
}

// ---- 表行 (SAP 风格列名, serde 负责表头) ----

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct VendorRow {
    pub lifnr: String,
    pub name1: String,
    pub land1: String,
    pub ort01: String,
    pub waers: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct PoHeaderRow {
    pub ebeln: String,
    pub lifnr: String,
    pub bedat: NaiveDate,
    pub waers: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct PoItemRow {
    pub ebeln: String,
    pub ebelp: u32,
    pub matnr: String,
    pub menge: BigDecimal,
    pub netpr: BigDecimal,
    pub waers: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct GoodsReceiptRow {
    pub mblnr: String,
    pub ebeln: String,
    pub ebelp: u32,
    pub matnr: String,
    pub menge: BigDecimal,
    pub dmbtr: BigDecimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct InvoiceHeaderRow {
    pub belnr: String,
    pub lifnr: String,
    pub budat: NaiveDate,
    pub waers: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct InvoiceItemRow {
    pub belnr: String,
    pub ebeln: String,
    pub ebelp: u32,
    pub matnr: String,
    pub menge: BigDecimal,
    pub netpr: BigDecimal,
    pub wrbtr: BigDecimal,
    pub waers: String,
}

/// 发票 -> 注入场景的对照表, 供测试断言引擎结论
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioRow {
    pub belnr: String,
    pub ebeln: String,
    pub ebelp: u32,
    pub scenario: Scenario,
}

/// 一套完整的合成采购数据
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub vendors: Vec<VendorRow>,
    pub po_headers: Vec<PoHeaderRow>,
    pub po_items: Vec<PoItemRow>,
    pub gr_lines: Vec<GoodsReceiptRow>,
    pub invoice_headers: Vec<InvoiceHeaderRow>,
    pub invoice_items: Vec<InvoiceItemRow>,
    pub scenarios: Vec<ScenarioRow>,
}

fn money(rng: &mut StdRng, lo_cents: i64, hi_cents: i64) -> BigDecimal {
    BigDecimal::from(rng.gen_range(lo_cents..=hi_cents)) / BigDecimal::from(100)
}

fn date_within(rng: &mut StdRng, days_back: i64) -> NaiveDate {
    Utc::now().date_naive() - Duration::days(rng.gen_range(0..days_back))
}

/// 生成合成数据集。同一个 seed 产出完全相同的数据。
pub fn generate(cfg: &DataGenConfig) -> Dataset {
    let seed = cfg.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);
    tracing::info!(
        "生成合成数据: {} 供应商, {} PO, {} 发票 (seed={})",
        cfg.num_vendors,
        cfg.num_purchase_orders,
        cfg.num_invoices,
        seed
    );

    let mut ds = Dataset::default();

    // 供应商主数据
    for i in 0..cfg.num_vendors {
        let name = format!(
            "{} {}",
            NAME_STEMS.choose(&mut rng).unwrap_or(&"Acme"),
            NAME_SUFFIXES.choose(&mut rng).unwrap_or(&"Group")
        );
        ds.vendors.push(VendorRow {
            lifnr: format!("V{}", 1000 + i),
            name1: name,
            land1: COUNTRIES.choose(&mut rng).unwrap_or(&"US").to_string(),
            ort01: CITIES.choose(&mut rng).unwrap_or(&"Austin").to_string(),
            waers: CURRENCIES.choose(&mut rng).unwrap_or(&"USD").to_string(),
        });
    }

    // PO 头 + 明细 (每单 1-4 行, 行号 10/20/30/40)
    for i in 0..cfg.num_purchase_orders {
        let vendor_idx = rng.gen_range(0..ds.vendors.len().max(1));
        let vendor = &ds.vendors[vendor_idx];
        let header = PoHeaderRow {
            ebeln: format!("45{}", 1000 + i),
            lifnr: vendor.lifnr.clone(),
            bedat: date_within(&mut rng, 180),
            waers: vendor.waers.clone(),
        };
        let item_count = rng.gen_range(1..=4u32);
        for n in 0..item_count {
            ds.po_items.push(PoItemRow {
                ebeln: header.ebeln.clone(),
                ebelp: (n + 1) * 10,
                matnr: format!("M{}", rng.gen_range(100..1000)),
                menge: BigDecimal::from(rng.gen_range(1..=20)),
                netpr: money(&mut rng, 5_000, 100_000),
                waers: header.waers.clone(),
            });
        }
        ds.po_headers.push(header);
    }

    // 每张发票独占一条 PO 明细, 避免场景互相污染
    let mut item_pool: Vec<usize> = (0..ds.po_items.len()).collect();
    item_pool.shuffle(&mut rng);

    let mut gr_seq = 0usize;
    let mut extra_po_seq = 0usize;
    let push_gr = |ds: &mut Dataset, item: &PoItemRow, qty: BigDecimal, seq: &mut usize| {
        let dmbtr = (&qty * &item.netpr).with_scale(2);
        ds.gr_lines.push(GoodsReceiptRow {
            mblnr: format!("50{}", 2000 + *seq),
            ebeln: item.ebeln.clone(),
            ebelp: item.ebelp,
            matnr: item.matnr.clone(),
            menge: qty,
            dmbtr,
        });
        *seq += 1;
    };

    for i in 0..cfg.num_invoices {
        let item = match item_pool.pop() {
            Some(idx) => ds.po_items[idx].clone(),
            // 明细用尽时补一条全新 PO 行。复用已消费的键会让后续场景的
            // 收货回头满足先前标注 NO_GR 的发票, 标签对照表就失真了。
            None => {
                let (lifnr, waers) = ds
                    .vendors
                    .choose(&mut rng)
                    .map(|v| (v.lifnr.clone(), v.waers.clone()))
                    .unwrap_or_else(|| ("V1000".to_string(), "USD".to_string()));
                let item = PoItemRow {
                    ebeln: format!("45{}", 1000 + cfg.num_purchase_orders + extra_po_seq),
                    ebelp: 10,
                    matnr: format!("M{}", rng.gen_range(100..1000)),
                    menge: BigDecimal::from(rng.gen_range(1..=20)),
                    netpr: money(&mut rng, 5_000, 100_000),
                    waers: waers.clone(),
                };
                extra_po_seq += 1;
                ds.po_headers.push(PoHeaderRow {
                    ebeln: item.ebeln.clone(),
                    lifnr,
                    bedat: date_within(&mut rng, 180),
                    waers,
                });
                ds.po_items.push(item.clone());
                item
            }
        };

        let scenario = cfg.scenarios.pick(&mut rng);
        let belnr = format!("51{}", 2000 + i);
        let budat = date_within(&mut rng, 60);
        let vendor = ds
            .po_headers
            .iter()
            .find(|h| h.ebeln == item.ebeln)
            .map(|h| h.lifnr.clone())
            .unwrap_or_else(|| "V1000".to_string());

        let push_invoice =
            |ds: &mut Dataset, belnr: &str, order: &str, line: u32, matnr: &str, qty: &BigDecimal, price: &BigDecimal| {
                ds.invoice_headers.push(InvoiceHeaderRow {
                    belnr: belnr.to_string(),
                    lifnr: vendor.clone(),
                    budat,
                    waers: item.waers.clone(),
                });
                ds.invoice_items.push(InvoiceItemRow {
                    belnr: belnr.to_string(),
                    ebeln: order.to_string(),
                    ebelp: line,
                    matnr: matnr.to_string(),
                    menge: qty.clone(),
                    netpr: price.clone(),
                    wrbtr: (qty * price).with_scale(2),
                    waers: item.waers.clone(),
                });
            };

        match scenario {
            Scenario::PerfectMatch => {
                push_gr(&mut ds, &item, item.menge.clone(), &mut gr_seq);
                push_invoice(&mut ds, &belnr, &item.ebeln, item.ebelp, &item.matnr, &item.menge, &item.netpr);
            }
            Scenario::PartialQty => {
                // 收货 70-90% 向下取整: 缺口至少 10%, 必超 5% 容差
                let ratio = rng.gen_range(0.70..0.90);
                let full: i64 = item.menge.to_string().parse().unwrap_or(10);
                let short = BigDecimal::from(((full as f64) * ratio).floor() as i64);
                push_gr(&mut ds, &item, short, &mut gr_seq);
                push_invoice(&mut ds, &belnr, &item.ebeln, item.ebelp, &item.matnr, &item.menge, &item.netpr);
            }
            Scenario::PriceVarianceMinor | Scenario::PriceVarianceMajor => {
                push_gr(&mut ds, &item, item.menge.clone(), &mut gr_seq);
                let pct = if scenario == Scenario::PriceVarianceMinor {
                    rng.gen_range(0.025..0.045) // 2.5-4.5%: 超 2% 且在 5% 以内
                } else {
                    rng.gen_range(0.06..0.15) // 6-15%: 超 5%
                };
                let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                let cents: i64 = (&item.netpr * BigDecimal::from(100))
                    .with_scale(0)
                    .to_string()
                    .parse()
                    .unwrap_or(10_000);
                let skewed_cents = ((cents as f64) * (1.0 + sign * pct)).round() as i64;
                let skewed = BigDecimal::from(skewed_cents) / BigDecimal::from(100);
                push_invoice(&mut ds, &belnr, &item.ebeln, item.ebelp, &item.matnr, &item.menge, &skewed);
            }
            Scenario::NoPo => {
                // 系统中不存在的订单号
                let ghost_order = format!("45999{}", i);
                push_invoice(&mut ds, &belnr, &ghost_order, 10, &item.matnr, &item.menge, &item.netpr);
            }
            Scenario::NoGr => {
                // PO 在, 货未到
                push_invoice(&mut ds, &belnr, &item.ebeln, item.ebelp, &item.matnr, &item.menge, &item.netpr);
            }
            Scenario::DuplicateInvoice => {
                push_gr(&mut ds, &item, item.menge.clone(), &mut gr_seq);
                push_invoice(&mut ds, &belnr, &item.ebeln, item.ebelp, &item.matnr, &item.menge, &item.netpr);
                // 同一 (订单, 行, 数量, 单价) 再提交一次, 只有第二张算重复
                let dup_belnr = format!("51{}", 2000 + cfg.num_invoices + i);
                push_invoice(&mut ds, &dup_belnr, &item.ebeln, item.ebelp, &item.matnr, &item.menge, &item.netpr);
                ds.scenarios.push(ScenarioRow {
                    belnr: belnr.clone(),
                    ebeln: item.ebeln.clone(),
                    ebelp: item.ebelp,
                    scenario: Scenario::PerfectMatch,
                });
                ds.scenarios.push(ScenarioRow {
                    belnr: dup_belnr,
                    ebeln: item.ebeln.clone(),
                    ebelp: item.ebelp,
                    scenario,
                });
                continue;
            }
        }

        let (label_order, label_line) = match scenario {
            Scenario::NoPo => (format!("45999{}", i), 10),
            _ => (item.ebeln.clone(), item.ebelp),
        };
        ds.scenarios.push(ScenarioRow {
            belnr,
            ebeln: label_order,
            ebelp: label_line,
            scenario,
        });
    }

    ds
}

impl Dataset {
    /// 全部表写成 CSV: LFA1/EKKO/EKPO/MSEG/RBKP/RSEG + 场景对照表
    pub fn write_csv(&self, dir: &Path) -> Result<(), csv::Error> {
        std::fs::create_dir_all(dir).map_err(csv::Error::from)?;

        fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), csv::Error> {
            let mut wtr = csv::Writer::from_path(path)?;
            for row in rows {
                wtr.serialize(row)?;
            }
            wtr.flush()?;
            Ok(())
        }

        write_table(&dir.join("LFA1.csv"), &self.vendors)?;
        write_table(&dir.join("EKKO.csv"), &self.po_headers)?;
        write_table(&dir.join("EKPO.csv"), &self.po_items)?;
        write_table(&dir.join("MSEG.csv"), &self.gr_lines)?;
        write_table(&dir.join("RBKP.csv"), &self.invoice_headers)?;
        write_table(&dir.join("RSEG.csv"), &self.invoice_items)?;
        write_table(&dir.join("invoice_scenarios.csv"), &self.scenarios)?;
        tracing::info!(
            "已写出合成数据: {} PO 行, {} 收货行, {} 发票行 -> {}",
            self.po_items.len(),
            self.gr_lines.len(),
            self.invoice_items.len(),
            dir.display()
        );
        Ok(())
    }

    // ---- 直接喂给 loader 的内存形式 ----

    pub fn po_records(&self) -> Vec<RawRecord> {
        self.po_items
            .iter()
            .map(|r| {
                to_record(&[
                    ("EBELN", r.ebeln.clone()),
                    ("EBELP", r.ebelp.to_string()),
                    ("MATNR", r.matnr.clone()),
                    ("MENGE", r.menge.to_string()),
                    ("NETPR", r.netpr.to_string()),
                    ("WAERS", r.waers.clone()),
                ])
            })
            .collect()
    }

    pub fn gr_records(&self) -> Vec<RawRecord> {
        self.gr_lines
            .iter()
            .map(|r| {
                to_record(&[
                    ("MBLNR", r.mblnr.clone()),
                    ("EBELN", r.ebeln.clone()),
                    ("EBELP", r.ebelp.to_string()),
                    ("MATNR", r.matnr.clone()),
                    ("MENGE", r.menge.to_string()),
                    ("DMBTR", r.dmbtr.to_string()),
                ])
            })
            .collect()
    }

    pub fn invoice_records(&self) -> Vec<RawRecord> {
        self.invoice_items
            .iter()
            .map(|r| {
                to_record(&[
                    ("BELNR", r.belnr.clone()),
                    ("EBELN", r.ebeln.clone()),
                    ("EBELP", r.ebelp.to_string()),
                    ("MATNR", r.matnr.clone()),
                    ("MENGE", r.menge.to_string()),
                    ("NETPR", r.netpr.to_string()),
                    ("WRBTR", r.wrbtr.to_string()),
                    ("WAERS", r.waers.clone()),
                ])
            })
            .collect()
    }
}

fn to_record(pairs: &[(&str, String)]) -> RawRecord {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect::<HashMap<_, _>>()
}
