use std::path::Path;
use threeway_match_rust::service::{aggregate, reporter, MatchEngine};
use threeway_match_rust::{datagen, loader, AppConfig, RunSummary};
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    let config = AppConfig::load(None)?;

    let mode = std::env::args().nth(1).unwrap_or_else(|| "match".to_string());
    let dir_arg = std::env::args().nth(2);
    let dir = dir_arg.as_deref().unwrap_or(config.data_dir.as_str());
    let dir = Path::new(dir);

    match mode.as_str() {
        // 生成合成 SAP 采购数据
        "generate" => {
            let dataset = datagen::generate(&config.datagen);
            dataset.write_csv(dir)?;
        }
        // 装载 -> 匹配 -> 汇总导出
        "match" => {
            let input = loader::load_from_dir(dir)?;
            let engine = MatchEngine::from_config(&config.tolerance)?;

            let lines = engine.match_lines_par(&input);
            let dispositions = aggregate(lines);
            let summary = RunSummary::from_dispositions(&dispositions, input.rejects.len());
            summary.log();

            let out_csv = dir.join("match_results.csv");
            reporter::write_dispositions_csv(std::fs::File::create(&out_csv)?, &dispositions)?;
            info!("处置明细已写出: {}", out_csv.display());

            let out_json = dir.join("run_summary.json");
            std::fs::write(&out_json, serde_json::to_vec_pretty(&summary)?)?;
            info!("运行统计已写出: {}", out_json.display());
        }
        other => {
            eprintln!("usage: threeway-match-rust [generate|match] [data_dir]");
            return Err(format!("unknown mode: {}", other).into());
        }
    }

    Ok(())
}
