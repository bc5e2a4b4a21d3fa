use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::datagen::DataGenConfig;
use crate::errors::ConfigError;
use crate::registry::SelectionStrategy;

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: String,
    pub tolerance: ToleranceConfig,
    pub cost: CostBudget,
    pub llm: LlmConfig,
    pub datagen: DataGenConfig,
}

/// LLM 调用设置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// 模型选择策略, 默认 hybrid
    pub selection_strategy: SelectionStrategy,
}

/// 三单匹配容差设置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceConfig {
    /// 允许 ±2% 价格差异
    pub price_pct: f64,
    /// 允许 ±5% 数量差异
    pub qty_pct: f64,
    /// 允许 ±10 金额绝对差异
    pub amount_abs: f64,
    /// 重大价格差异阈值倍数: 2.5 × 2% = 5%, 超过进重大差异
    pub major_multiplier: f64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            price_pct: 2.0,
            qty_pct: 5.0,
            amount_abs: 10.0,
            major_multiplier: 2.5,
        }
    }
}

/// 成本安全控制 (预算保护)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CostBudget {
    /// 单次查询上限
    pub max_cost_per_query: f64,
    /// 每日预算
    pub daily_budget_limit: f64,
    /// 每月硬上限
    pub monthly_budget_limit: f64,
    /// 日预算告警线 (比例)
    pub warn_at_daily_pct: f64,
    /// 月预算告警线 (比例)
    pub warn_at_monthly_pct: f64,
    /// 跨会话累计支出的持久化文件
    pub tracking_file: String,
}

impl Default for CostBudget {
    fn default() -> Self {
        Self {
            max_cost_per_query: 0.02,
            daily_budget_limit: 2.00,
            monthly_budget_limit: 20.00,
            warn_at_daily_pct: 0.75,
            warn_at_monthly_pct: 0.80,
            tracking_file: "data/llm_cost_tracking.json".to_string(),
        }
    }
}

impl AppConfig {
    /// 加载配置: 内置默认值 < 可选 TOML 文件 < AP_ 前缀环境变量
    /// 例: AP__TOLERANCE__PRICE_PCT=3.0
    pub fn load(file: Option<&str>) -> Result<Self, ConfigError> {
        let defaults = Config::try_from(&AppConfig {
            data_dir: "data/sap_tables".to_string(),
            ..AppConfig::default()
        })?;

        let file_source = File::with_name(file.unwrap_or("config/default")).required(false);

        let cfg = Config::builder()
            .add_source(defaults)
            .add_source(file_source)
            .add_source(Environment::with_prefix("AP").separator("__"))
            .build()?;

        Ok(cfg.try_deserialize()?)
    }
}
