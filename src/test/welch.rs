//! Welch's unequal-variance two-sample t-test.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Statistics of a successful test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelchResult {
    /// t statistic, oriented B − A.
    pub statistic: f64,
    /// Two-sided p-value.
    pub p_value: f64,
    /// Welch–Satterthwaite degrees of freedom.
    pub df: f64,
}

/// Result of testing one feature.
#[derive(Debug, Clone, PartialEq)]
pub enum TestOutcome {
    /// The test ran.
    Tested(WelchResult),
    /// The test could not be computed for this feature.
    Failed {
        /// Why the test failed.
        reason: String,
    },
}

impl TestOutcome {
    /// P-value, defaulting to 1.0 when the test failed.
    pub fn p_value(&self) -> f64 {
        match self {
            TestOutcome::Tested(r) => r.p_value,
            TestOutcome::Failed { .. } => 1.0,
        }
    }

    /// Test statistic, if the test ran.
    pub fn statistic(&self) -> Option<f64> {
        match self {
            TestOutcome::Tested(r) => Some(r.statistic),
            TestOutcome::Failed { .. } => None,
        }
    }

    /// Whether the test failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, TestOutcome::Failed { .. })
    }
}

fn mean_var(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var)
}

/// Welch's t-test of `b` against `a`.
///
/// Each group needs at least two finite values and the pooled standard error
/// must be positive; otherwise the outcome is [`TestOutcome::Failed`].
pub fn welch_t_test(a: &[f64], b: &[f64]) -> TestOutcome {
    if a.len() < 2 || b.len() < 2 {
        return TestOutcome::Failed {
            reason: format!("groups of size {} and {}; need at least 2", a.len(), b.len()),
        };
    }
    if a.iter().chain(b).any(|v| !v.is_finite()) {
        return TestOutcome::Failed {
            reason: "non-finite values".to_string(),
        };
    }

    let (mean_a, var_a) = mean_var(a);
    let (mean_b, var_b) = mean_var(b);
    let se_a = var_a / a.len() as f64;
    let se_b = var_b / b.len() as f64;
    let se = (se_a + se_b).sqrt();

    if se <= 0.0 {
        return TestOutcome::Failed {
            reason: "zero variance in both groups".to_string(),
        };
    }

    let statistic = (mean_b - mean_a) / se;
    let df = (se_a + se_b).powi(2)
        / (se_a.powi(2) / (a.len() - 1) as f64 + se_b.powi(2) / (b.len() - 1) as f64);

    match StudentsT::new(0.0, 1.0, df) {
        Ok(t_dist) => {
            let p_value = (2.0 * (1.0 - t_dist.cdf(statistic.abs()))).clamp(0.0, 1.0);
            TestOutcome::Tested(WelchResult {
                statistic,
                p_value,
                df,
            })
        }
        Err(e) => TestOutcome::Failed {
            reason: format!("invalid t distribution (df = {}): {}", df, e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_known_values() {
        // t = 5 / sqrt(0.5 + 10), df = 10.5^2 / (0.5^2 / 4 + 10^2 / 4)
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [2.0, 4.0, 6.0, 8.0, 20.0];
        match welch_t_test(&a, &b) {
            TestOutcome::Tested(r) => {
                assert_relative_eq!(r.statistic, 1.543033, epsilon = 1e-5);
                assert_relative_eq!(r.df, 4.399002, epsilon = 1e-5);
                assert_relative_eq!(r.p_value, 0.191292, epsilon = 1e-4);
            }
            TestOutcome::Failed { reason } => panic!("{}", reason),
        }
    }

    #[test]
    fn test_orientation() {
        let a = [1.0, 1.1, 0.9];
        let b = [5.0, 5.2, 4.9];
        let up = welch_t_test(&a, &b);
        let down = welch_t_test(&b, &a);
        assert!(up.statistic().unwrap() > 0.0);
        assert!(down.statistic().unwrap() < 0.0);
        assert_relative_eq!(up.p_value(), down.p_value(), epsilon = 1e-12);
        assert!(up.p_value() < 0.01);
    }

    #[test]
    fn test_identical_groups() {
        let a = [1.0, 2.0, 3.0];
        let outcome = welch_t_test(&a, &a);
        assert_relative_eq!(outcome.statistic().unwrap(), 0.0);
        assert_relative_eq!(outcome.p_value(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_variance_fails() {
        let outcome = welch_t_test(&[2.0, 2.0], &[2.0, 2.0, 2.0]);
        assert!(outcome.is_failed());
        assert_eq!(outcome.p_value(), 1.0);
        assert_eq!(outcome.statistic(), None);
    }

    #[test]
    fn test_small_group_fails() {
        assert!(welch_t_test(&[1.0], &[2.0, 3.0]).is_failed());
    }
}
