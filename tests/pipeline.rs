//! 端到端: 合成数据 -> CSV -> 装载 -> 匹配 -> 汇总。
//! 每张发票在生成时注入已知场景, 这里断言引擎判出的处置与注入一致。

use std::collections::HashMap;

use threeway_match_rust::config::ToleranceConfig;
use threeway_match_rust::datagen::{self, DataGenConfig, ScenarioWeights};
use threeway_match_rust::loader;
use threeway_match_rust::models::MatchOutcome;
use threeway_match_rust::service::{aggregate, MatchEngine, RunSummary};

fn test_cfg(seed: u64) -> DataGenConfig {
    DataGenConfig {
        num_vendors: 10,
        num_purchase_orders: 80,
        num_invoices: 120,
        seed: Some(seed),
        scenarios: ScenarioWeights::default(),
    }
}

#[test]
fn injected_scenarios_round_trip_through_csv() {
    let dataset = datagen::generate(&test_cfg(20240917));
    let dir = tempfile::tempdir().unwrap();
    dataset.write_csv(dir.path()).unwrap();

    let input = loader::load_from_dir(dir.path()).unwrap();
    assert!(input.rejects.is_empty(), "合成数据不应出坏行");
    assert_eq!(input.invoices.len(), dataset.invoice_items.len());

    let engine = MatchEngine::from_config(&ToleranceConfig::default()).unwrap();
    let dispositions = aggregate(engine.match_lines(&input));

    let by_invoice: HashMap<&str, MatchOutcome> = dispositions
        .iter()
        .map(|d| (d.invoice_id.as_str(), d.disposition))
        .collect();

    for label in &dataset.scenarios {
        let got = by_invoice
            .get(label.belnr.as_str())
            .unwrap_or_else(|| panic!("发票 {} 没有处置结果", label.belnr));
        assert_eq!(
            *got,
            label.scenario.expected_outcome(),
            "发票 {} 注入 {:?} 判成 {:?}",
            label.belnr,
            label.scenario,
            got
        );
    }
}

#[test]
fn summary_accounts_for_every_invoice() {
    let dataset = datagen::generate(&test_cfg(7));
    let input =
        loader::load_from_records(&dataset.po_records(), &dataset.gr_records(), &dataset.invoice_records())
            .unwrap();

    let engine = MatchEngine::from_config(&ToleranceConfig::default()).unwrap();
    let dispositions = aggregate(engine.match_lines_par(&input));
    let summary = RunSummary::from_dispositions(&dispositions, input.rejects.len());

    assert_eq!(summary.total_invoices, input.invoice_count());
    assert_eq!(summary.total_lines, input.invoices.len());
    let categorized = summary.matched
        + summary.partial_quantity
        + summary.price_variance_minor
        + summary.price_variance_major
        + summary.no_goods_receipt
        + summary.no_po
        + summary.duplicate_invoice;
    assert_eq!(categorized, summary.total_invoices);

    // 分类计数应与注入场景的期望结论逐类一致
    let mut expected: HashMap<MatchOutcome, usize> = HashMap::new();
    for label in &dataset.scenarios {
        *expected.entry(label.scenario.expected_outcome()).or_default() += 1;
    }
    let count = |o: MatchOutcome| expected.get(&o).copied().unwrap_or(0);
    assert_eq!(summary.matched, count(MatchOutcome::Matched));
    assert_eq!(summary.partial_quantity, count(MatchOutcome::PartialQuantity));
    assert_eq!(summary.price_variance_minor, count(MatchOutcome::PriceVarianceMinor));
    assert_eq!(summary.price_variance_major, count(MatchOutcome::PriceVarianceMajor));
    assert_eq!(summary.no_goods_receipt, count(MatchOutcome::NoGoodsReceipt));
    assert_eq!(summary.no_po, count(MatchOutcome::NoPo));
    assert_eq!(summary.duplicate_invoice, count(MatchOutcome::DuplicateInvoice));
}

#[test]
fn scenario_labels_hold_when_po_item_pool_is_exhausted() {
    // 发票数远超 PO 明细数, 补行路径被反复触发;
    // 注入标签与引擎结论仍需逐张一致
    for seed in [5u64, 20240917] {
        let cfg = DataGenConfig {
            num_vendors: 3,
            num_purchase_orders: 4,
            num_invoices: 60,
            seed: Some(seed),
            scenarios: ScenarioWeights::default(),
        };
        let dataset = datagen::generate(&cfg);
        let input = loader::load_from_records(
            &dataset.po_records(),
            &dataset.gr_records(),
            &dataset.invoice_records(),
        )
        .unwrap();

        let engine = MatchEngine::from_config(&ToleranceConfig::default()).unwrap();
        let dispositions = aggregate(engine.match_lines(&input));
        let by_invoice: HashMap<&str, MatchOutcome> = dispositions
            .iter()
            .map(|d| (d.invoice_id.as_str(), d.disposition))
            .collect();

        for label in &dataset.scenarios {
            let got = by_invoice
                .get(label.belnr.as_str())
                .unwrap_or_else(|| panic!("发票 {} 没有处置结果", label.belnr));
            assert_eq!(
                *got,
                label.scenario.expected_outcome(),
                "seed {} 发票 {} 注入 {:?} 判成 {:?}",
                seed,
                label.belnr,
                label.scenario,
                got
            );
        }
    }
}

#[test]
fn sequential_and_parallel_runs_agree_on_generated_data() {
    let dataset = datagen::generate(&test_cfg(99));
    let input =
        loader::load_from_records(&dataset.po_records(), &dataset.gr_records(), &dataset.invoice_records())
            .unwrap();
    let engine = MatchEngine::from_config(&ToleranceConfig::default()).unwrap();

    let seq: Vec<_> = engine.match_lines(&input).into_iter().map(|l| l.outcome).collect();
    let par: Vec<_> = engine.match_lines_par(&input).into_iter().map(|l| l.outcome).collect();
    assert_eq!(seq, par);
}
