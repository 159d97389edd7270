//! Per-feature two-sample hypothesis tests.

pub mod welch;

pub use welch::{welch_t_test, TestOutcome, WelchResult};
