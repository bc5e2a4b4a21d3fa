use bigdecimal::{BigDecimal, Zero};
use std::str::FromStr;

use crate::config::ToleranceConfig;
use crate::errors::ConfigError;
use crate::models::AppliedTolerances;

/// 容差策略
#[derive(Debug, Clone)]
pub enum TolerancePolicy {
    /// 百分比容差; zero_fallback: expected 为 0 时退回的绝对容差 (可选)
    Percent {
        pct: BigDecimal,
        zero_fallback: Option<BigDecimal>,
    },
    /// 绝对值容差
    Absolute { limit: BigDecimal },
}

/// 容差判定, 全函数, 不会 panic。
///
/// 百分比规则按乘法形式实现: |actual-expected| * 100 <= pct * |expected|,
/// 与除法写法等价, 但 BigDecimal 乘法精确, 无需 ε。
/// expected 为 0 时: actual 也为 0 则通过, 否则看 zero_fallback。
pub fn within_tolerance(
    expected: &BigDecimal,
    actual: &BigDecimal,
    policy: &TolerancePolicy,
) -> bool {
    let diff = (actual - expected).abs();
    match policy {
        TolerancePolicy::Percent { pct, zero_fallback } => {
            if expected.is_zero() {
                return match zero_fallback {
                    Some(limit) => actual.abs() <= *limit,
                    None => actual.is_zero(),
                };
            }
            &diff * BigDecimal::from(100) <= pct * expected.abs()
        }
        TolerancePolicy::Absolute { limit } => diff <= *limit,
    }
}

/// 带符号相对差异 (百分比): (actual - expected) / |expected| * 100。
/// expected 为 0 时无定义, 返回 None。
pub fn variance_pct(expected: &BigDecimal, actual: &BigDecimal) -> Option<BigDecimal> {
    if expected.is_zero() {
        return None;
    }
    let pct = (actual - expected) * BigDecimal::from(100) / expected.abs();
    Some(pct.with_scale(4))
}

/// 引擎实际使用的容差集合 (由配置转换而来)
#[derive(Debug, Clone)]
pub struct Tolerances {
    pub price_pct: BigDecimal,
    pub qty_pct: BigDecimal,
    pub amount_abs: BigDecimal,
    /// 重大价格差异阈值 = price_pct * major_multiplier
    pub major_multiplier: BigDecimal,
}

impl Tolerances {
    pub fn price_policy(&self) -> TolerancePolicy {
        TolerancePolicy::Percent {
            pct: self.price_pct.clone(),
            zero_fallback: None,
        }
    }

    /// 数量为 0 的 PO 行极少见, 退回绝对金额容差避免误报
    pub fn qty_policy(&self) -> TolerancePolicy {
        TolerancePolicy::Percent {
            pct: self.qty_pct.clone(),
            zero_fallback: Some(self.amount_abs.clone()),
        }
    }

    pub fn amount_policy(&self) -> TolerancePolicy {
        TolerancePolicy::Absolute {
            limit: self.amount_abs.clone(),
        }
    }

    /// 重大价格差异判定线
    pub fn major_price_policy(&self) -> TolerancePolicy {
        TolerancePolicy::Percent {
            pct: &self.price_pct * &self.major_multiplier,
            zero_fallback: None,
        }
    }

    pub fn snapshot(&self) -> AppliedTolerances {
        AppliedTolerances {
            price_pct: self.price_pct.clone(),
            qty_pct: self.qty_pct.clone(),
            amount_abs: self.amount_abs.clone(),
        }
    }
}

impl TryFrom<&ToleranceConfig> for Tolerances {
    type Error = ConfigError;

    fn try_from(cfg: &ToleranceConfig) -> Result<Self, Self::Error> {
        // f64 走 Display 最短表示再解析, 避免二进制浮点尾巴污染十进制值
        fn dec(name: &'static str, v: f64) -> Result<BigDecimal, ConfigError> {
            if !v.is_finite() || v < 0.0 {
                return Err(ConfigError::InvalidTolerance {
                    name,
                    value: v.to_string(),
                });
            }
            BigDecimal::from_str(&v.to_string()).map_err(|_| ConfigError::InvalidTolerance {
                name,
                value: v.to_string(),
            })
        }

        let major_multiplier = dec("major_multiplier", cfg.major_multiplier)?;
        if major_multiplier < BigDecimal::from(1) {
            return Err(ConfigError::InvalidTolerance {
                name: "major_multiplier",
                value: cfg.major_multiplier.to_string(),
            });
        }

        Ok(Self {
            price_pct: dec("price_pct", cfg.price_pct)?,
            qty_pct: dec("qty_pct", cfg.qty_pct)?,
            amount_abs: dec("amount_abs", cfg.amount_abs)?,
            major_multiplier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn pct(p: &str) -> TolerancePolicy {
        TolerancePolicy::Percent {
            pct: d(p),
            zero_fallback: None,
        }
    }

    #[test]
    fn percent_passes_at_boundary() {
        // PO 100, 发票 102: 恰好 2%
        assert!(within_tolerance(&d("100"), &d("102"), &pct("2")));
        assert!(!within_tolerance(&d("100"), &d("102.01"), &pct("2")));
    }

    #[test]
    fn percent_is_symmetric_around_expected() {
        assert!(within_tolerance(&d("100"), &d("98"), &pct("2")));
        assert!(!within_tolerance(&d("100"), &d("97.99"), &pct("2")));
    }

    #[test]
    fn percent_zero_expected_requires_zero_actual() {
        assert!(within_tolerance(&d("0"), &d("0"), &pct("2")));
        assert!(!within_tolerance(&d("0"), &d("0.01"), &pct("2")));
    }

    #[test]
    fn percent_zero_expected_with_fallback() {
        let policy = TolerancePolicy::Percent {
            pct: d("5"),
            zero_fallback: Some(d("10")),
        };
        assert!(within_tolerance(&d("0"), &d("9.99"), &policy));
        assert!(!within_tolerance(&d("0"), &d("10.01"), &policy));
    }

    #[test]
    fn absolute_limit() {
        let policy = TolerancePolicy::Absolute { limit: d("10") };
        assert!(within_tolerance(&d("1000"), &d("1005"), &policy));
        assert!(within_tolerance(&d("1000"), &d("990"), &policy));
        assert!(!within_tolerance(&d("1000"), &d("1050"), &policy));
    }

    #[test]
    fn variance_pct_signed() {
        assert_eq!(variance_pct(&d("100"), &d("80")), Some(d("-20.0000")));
        assert_eq!(variance_pct(&d("10.00"), &d("10.15")), Some(d("1.5000")));
        assert_eq!(variance_pct(&d("0"), &d("5")), None);
    }

    #[test]
    fn config_conversion_rejects_bad_values() {
        let mut cfg = ToleranceConfig::default();
        cfg.major_multiplier = 0.5;
        assert!(Tolerances::try_from(&cfg).is_err());

        let mut cfg = ToleranceConfig::default();
        cfg.price_pct = -1.0;
        assert!(Tolerances::try_from(&cfg).is_err());
    }

    proptest! {
        /// 乘法形式与除法定义一致: 以分为单位生成精确十进制值
        #[test]
        fn percent_matches_division_rule(expected_cents in 1i64..2_000_000, actual_cents in 0i64..2_000_000) {
            let expected = BigDecimal::from(expected_cents) / BigDecimal::from(100);
            let actual = BigDecimal::from(actual_cents) / BigDecimal::from(100);
            let passed = within_tolerance(&expected, &actual, &pct("2"));
            let ratio = (actual_cents - expected_cents).abs() as f64 / expected_cents as f64;
            // 远离边界时两种写法必然一致; 边界上 f64 有舍入, 留一条窄带不判
            if (ratio - 0.02).abs() > 1e-9 {
                prop_assert_eq!(passed, ratio <= 0.02);
            }
        }

        /// 完全相等永远通过
        #[test]
        fn equal_values_always_pass(cents in 0i64..2_000_000, p in 0u32..100) {
            let v = BigDecimal::from(cents) / BigDecimal::from(100);
            let policy = TolerancePolicy::Percent { pct: BigDecimal::from(p), zero_fallback: None };
            prop_assert!(within_tolerance(&v, &v, &policy));
        }
    }
}
