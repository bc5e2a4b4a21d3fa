use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::CostBudget;
use crate::errors::CostError;

/// 累计支出状态 (持久化部分)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendState {
    pub day: NaiveDate,
    pub daily_spent: f64,
    pub monthly_spent: f64,
}

/// 显式进程级支出跟踪器: 由调用方创建并传给每个 LLM 调用协作方,
/// 不做隐藏单例。按日/按月自动翻转, 可持久化跨会话累计。
#[derive(Debug, Clone)]
pub struct CostTracker {
    budget: CostBudget,
    state: SpendState,
}

impl CostTracker {
    pub fn new(budget: CostBudget, today: NaiveDate) -> Self {
        Self {
            budget,
            state: SpendState {
                day: today,
                daily_spent: 0.0,
                monthly_spent: 0.0,
            },
        }
    }

    /// 从跟踪文件恢复; 文件不存在则从零开始
    pub fn load(budget: CostBudget, path: &Path, today: NaiveDate) -> Result<Self, CostError> {
        if !path.exists() {
            return Ok(Self::new(budget, today));
        }
        let raw = std::fs::read_to_string(path)?;
        let state: SpendState = serde_json::from_str(&raw)?;
        let mut tracker = Self { budget, state };
        tracker.roll_over(today);
        Ok(tracker)
    }

    pub fn save(&self, path: &Path) -> Result<(), CostError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(&self.state)?)?;
        Ok(())
    }

    /// 日期翻转: 跨天清日累计, 跨月清月累计
    fn roll_over(&mut self, today: NaiveDate) {
        if today != self.state.day {
            self.state.daily_spent = 0.0;
        }
        if (today.year(), today.month()) != (self.state.day.year(), self.state.day.month()) {
            self.state.monthly_spent = 0.0;
        }
        self.state.day = today;
    }

    /// 支出前检查: 超限直接拒绝, 接近告警线时 warn
    pub fn authorize(&mut self, cost: f64, today: NaiveDate) -> Result<(), CostError> {
        self.roll_over(today);

        if cost > self.budget.max_cost_per_query {
            return Err(CostError::QueryCapExceeded {
                cost,
                cap: self.budget.max_cost_per_query,
            });
        }

        let daily_after = self.state.daily_spent + cost;
        if daily_after > self.budget.daily_budget_limit {
            return Err(CostError::DailyBudgetExceeded {
                spent: self.state.daily_spent,
                limit: self.budget.daily_budget_limit,
            });
        }

        let monthly_after = self.state.monthly_spent + cost;
        if monthly_after > self.budget.monthly_budget_limit {
            return Err(CostError::MonthlyBudgetExceeded {
                spent: self.state.monthly_spent,
                limit: self.budget.monthly_budget_limit,
            });
        }

        if daily_after >= self.budget.daily_budget_limit * self.budget.warn_at_daily_pct {
            tracing::warn!(
                "日预算已用 {:.2}/{:.2}, 接近上限",
                daily_after,
                self.budget.daily_budget_limit
            );
        }
        if monthly_after >= self.budget.monthly_budget_limit * self.budget.warn_at_monthly_pct {
            tracing::warn!(
                "月预算已用 {:.2}/{:.2}, 接近上限",
                monthly_after,
                self.budget.monthly_budget_limit
            );
        }

        Ok(())
    }

    /// 记录一次实际支出
    pub fn record(&mut self, cost: f64, today: NaiveDate) {
        self.roll_over(today);
        self.state.daily_spent += cost;
        self.state.monthly_spent += cost;
    }

    /// 按运行/账期重置
    pub fn reset(&mut self, today: NaiveDate) {
        self.state = SpendState {
            day: today,
            daily_spent: 0.0,
            monthly_spent: 0.0,
        };
    }

    pub fn daily_spent(&self) -> f64 {
        self.state.daily_spent
    }

    pub fn monthly_spent(&self) -> f64 {
        self.state.monthly_spent
    }

    pub fn budget(&self) -> &CostBudget {
        &self.budget
    }

    /// 当日剩余额度
    pub fn daily_headroom(&self) -> f64 {
        (self.budget.daily_budget_limit - self.state.daily_spent).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tracker() -> CostTracker {
        CostTracker::new(CostBudget::default(), day(2025, 6, 1))
    }

    #[test]
    fn per_query_cap_enforced() {
        let mut t = tracker();
        assert!(matches!(
            t.authorize(0.05, day(2025, 6, 1)),
            Err(CostError::QueryCapExceeded { .. })
        ));
        assert!(t.authorize(0.02, day(2025, 6, 1)).is_ok());
    }

    #[test]
    fn daily_budget_enforced_and_rolls_over() {
        let mut t = tracker();
        for _ in 0..100 {
            t.record(0.02, day(2025, 6, 1));
        }
        assert!((t.daily_spent() - 2.0).abs() < 1e-9);
        assert!(matches!(
            t.authorize(0.01, day(2025, 6, 1)),
            Err(CostError::DailyBudgetExceeded { .. })
        ));
        // 第二天日累计清零, 月累计保留
        assert!(t.authorize(0.01, day(2025, 6, 2)).is_ok());
        assert_eq!(t.daily_spent(), 0.0);
        assert!((t.monthly_spent() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn monthly_budget_enforced_and_rolls_over() {
        let mut t = tracker();
        // 分摊到多天避免触日限
        for d in 1..=20 {
            for _ in 0..50 {
                t.record(0.02, day(2025, 6, d));
            }
        }
        assert!((t.monthly_spent() - 20.0).abs() < 1e-9);
        assert!(matches!(
            t.authorize(0.01, day(2025, 6, 21)),
            Err(CostError::MonthlyBudgetExceeded { .. })
        ));
        // 跨月清零
        assert!(t.authorize(0.01, day(2025, 7, 1)).is_ok());
        assert_eq!(t.monthly_spent(), 0.0);
    }

    #[test]
    fn persists_across_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("llm_cost_tracking.json");

        let mut t = tracker();
        t.record(0.5, day(2025, 6, 1));
        t.save(&path).unwrap();

        let restored = CostTracker::load(CostBudget::default(), &path, day(2025, 6, 1)).unwrap();
        assert!((restored.daily_spent() - 0.5).abs() < 1e-9);

        // 缺文件从零开始
        let fresh =
            CostTracker::load(CostBudget::default(), &dir.path().join("nope.json"), day(2025, 6, 1))
                .unwrap();
        assert_eq!(fresh.daily_spent(), 0.0);
    }

    #[test]
    fn reset_clears_state() {
        let mut t = tracker();
        t.record(1.0, day(2025, 6, 1));
        t.reset(day(2025, 6, 1));
        assert_eq!(t.daily_spent(), 0.0);
        assert_eq!(t.monthly_spent(), 0.0);
    }
}
