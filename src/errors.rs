use serde::Serialize;
use thiserror::Error;

/// 装载错误: 对当前记录集是致命的, 需要修正数据后重新提交
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{table} row {row}: missing required field {field}")]
    MissingField {
        table: &'static str,
        row: usize,
        field: &'static str,
    },

    /// PO 行键必须唯一 (order id + line id)
    #[error("duplicate PO line key {order_id}-{line_id}")]
    DuplicatePoKey { order_id: String, line_id: u32 },

    #[error("csv read failed: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// 数字字段解析失败: 仅拒绝该行, 不影响整个记录集
#[derive(Debug, Clone, Error, Serialize)]
#[error("{table} row {row}: field {field} value '{value}' is not numeric")]
pub struct MalformedRecord {
    pub table: &'static str,
    pub row: usize,
    pub field: &'static str,
    pub value: String,
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid tolerance value for {name}: {value}")]
    InvalidTolerance { name: &'static str, value: String },

    #[error(transparent)]
    Source(#[from] config::ConfigError),
}

/// 成本控制错误 (预算保护)
#[derive(Debug, Error)]
pub enum CostError {
    #[error("query cost {cost:.4} exceeds per-query cap {cap:.4}")]
    QueryCapExceeded { cost: f64, cap: f64 },

    #[error("daily budget exhausted: spent {spent:.2} of {limit:.2}")]
    DailyBudgetExceeded { spent: f64, limit: f64 },

    #[error("monthly budget exhausted: spent {spent:.2} of {limit:.2}")]
    MonthlyBudgetExceeded { spent: f64, limit: f64 },

    #[error("cost tracking file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cost tracking file is corrupt: {0}")]
    Json(#[from] serde_json::Error),
}
