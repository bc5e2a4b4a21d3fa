pub mod cost;

pub use cost::CostTracker;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// 模型规格 (多供应商注册表的一项)
#[derive(Debug, Clone, Serialize)]
pub struct ModelSpec {
    pub provider: &'static str,
    pub model_name: &'static str,
    /// 每 1k 输入 token 成本 (美元)
    pub cost_per_1k_input: f64,
    pub cost_per_1k_output: f64,
    pub context_window: u32,
    pub strengths: &'static [&'static str],
    pub best_for: &'static [&'static str],
}

impl ModelSpec {
    pub fn is_free(&self) -> bool {
        self.cost_per_1k_input == 0.0 && self.cost_per_1k_output == 0.0
    }

    /// 估算一次调用成本
    pub fn estimate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        input_tokens as f64 / 1000.0 * self.cost_per_1k_input
            + output_tokens as f64 / 1000.0 * self.cost_per_1k_output
    }
}

/// 模型注册表: 启动时构建一次的只读查找表
static MODELS: Lazy<IndexMap<&'static str, ModelSpec>> = Lazy::new(|| {
    IndexMap::from([
        (
            "gpt-4o",
            ModelSpec {
                provider: "openai",
                model_name: "gpt-4o",
                cost_per_1k_input: 0.0025,
                cost_per_1k_output: 0.010,
                context_window: 128_000,
                strengths: &["vision", "function_calling", "structured_output"],
                best_for: &["invoice_ocr", "complex_reasoning"],
            },
        ),
        (
            "gpt-4o-mini",
            ModelSpec {
                provider: "openai",
                model_name: "gpt-4o-mini",
                cost_per_1k_input: 0.00015,
                cost_per_1k_output: 0.0006,
                context_window: 128_000,
                strengths: &["speed", "cost", "good_quality"],
                best_for: &["simple_queries", "classification", "sql_generation"],
            },
        ),
        (
            "claude-sonnet-4",
            ModelSpec {
                provider: "anthropic",
                model_name: "claude-sonnet-4-20250514",
                cost_per_1k_input: 0.003,
                cost_per_1k_output: 0.015,
                context_window: 200_000,
                strengths: &["reasoning", "analysis", "long_context", "instruction_following"],
                best_for: &["policy_rag", "explanations", "complex_reasoning"],
            },
        ),
        (
            "claude-haiku-4",
            ModelSpec {
                provider: "anthropic",
                model_name: "claude-haiku-4-20250514",
                cost_per_1k_input: 0.0008,
                cost_per_1k_output: 0.004,
                context_window: 200_000,
                strengths: &["speed", "cost", "quality"],
                best_for: &["high_volume", "simple_tasks", "validation"],
            },
        ),
        (
            "gemini-2.0-flash",
            ModelSpec {
                provider: "google",
                model_name: "gemini-2.0-flash-exp",
                cost_per_1k_input: 0.0,
                cost_per_1k_output: 0.0,
                context_window: 1_000_000,
                strengths: &["free", "speed", "multimodal", "long_context"],
                best_for: &["experimentation", "document_analysis", "testing"],
            },
        ),
        (
            "gemini-1.5-pro",
            ModelSpec {
                provider: "google",
                model_name: "gemini-1.5-pro",
                cost_per_1k_input: 0.00125,
                cost_per_1k_output: 0.005,
                context_window: 2_000_000,
                strengths: &["very_long_context", "reasoning", "multimodal"],
                best_for: &["multi_document", "large_context"],
            },
        ),
        (
            "llama-3.2",
            ModelSpec {
                provider: "ollama",
                model_name: "llama3.2",
                cost_per_1k_input: 0.0,
                cost_per_1k_output: 0.0,
                context_window: 8_192,
                strengths: &["free", "privacy", "offline", "no_limits"],
                best_for: &["development", "simple_tasks", "unlimited_testing"],
            },
        ),
        (
            "mistral",
            ModelSpec {
                provider: "ollama",
                model_name: "mistral",
                cost_per_1k_input: 0.0,
                cost_per_1k_output: 0.0,
                context_window: 32_768,
                strengths: &["free", "speed", "good_quality"],
                best_for: &["sql_generation", "classification", "fast_tasks"],
            },
        ),
    ])
});

/// 任务 -> 默认模型
static TASK_MODEL_MAPPING: &[(&str, &str)] = &[
    ("data_generation", "llama-3.2"),
    ("invoice_ocr", "gpt-4o-mini"),
    ("invoice_validation", "llama-3.2"),
    ("sql_generation", "llama-3.2"),
    ("sql_explanation", "claude-haiku-4"),
    ("policy_search", "claude-haiku-4"),
    ("policy_explanation", "claude-sonnet-4"),
    ("match_logic", "llama-3.2"),
    ("match_explanation", "claude-haiku-4"),
    ("chat", "claude-haiku-4"),
    ("classification", "llama-3.2"),
    ("compliance", "claude-sonnet-4"),
    ("fraud_detection", "claude-sonnet-4"),
];

/// 主模型失败时的回退顺序 (免费优先, 逐级加价)
pub static FALLBACK_ORDER: &[&str] = &[
    "llama-3.2",
    "claude-haiku-4",
    "gpt-4o-mini",
    "claude-sonnet-4",
    "gpt-4o",
];

/// 模型选择策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// 固定使用任务映射
    Static,
    CostOptimized,
    QualityOptimized,
    /// 平衡成本/质量并尊重预算限制
    #[default]
    Hybrid,
}

pub fn model(name: &str) -> Option<&'static ModelSpec> {
    MODELS.get(name)
}

pub fn task_model_name(task: &str) -> Option<&'static str> {
    TASK_MODEL_MAPPING
        .iter()
        .find(|(t, _)| *t == task)
        .map(|(_, m)| *m)
}

pub fn model_for_task(task: &str) -> Option<&'static ModelSpec> {
    task_model_name(task).and_then(model)
}

/// 按策略为任务挑选模型 (配置项 llm.selection_strategy):
/// - static: 固定任务映射
/// - cost_optimized: 回退链里的第一个免费模型
/// - quality_optimized: 回退链末端 (最强付费模型)
/// - hybrid: 任务映射, 但日剩余额度不足一次查询时降级到免费模型
pub fn select_model(
    task: &str,
    strategy: SelectionStrategy,
    tracker: &CostTracker,
) -> Option<&'static ModelSpec> {
    let free_fallback = || {
        FALLBACK_ORDER
            .iter()
            .filter_map(|name| model(name))
            .find(|m| m.is_free())
    };

    match strategy {
        SelectionStrategy::Static => model_for_task(task),
        SelectionStrategy::CostOptimized => free_fallback().or_else(|| model_for_task(task)),
        SelectionStrategy::QualityOptimized => FALLBACK_ORDER
            .last()
            .and_then(|name| model(name))
            .or_else(|| model_for_task(task)),
        SelectionStrategy::Hybrid => {
            let chosen = model_for_task(task)?;
            if !chosen.is_free() && tracker.daily_headroom() < tracker.budget().max_cost_per_query
            {
                return free_fallback().or(Some(chosen));
            }
            Some(chosen)
        }
    }
}
