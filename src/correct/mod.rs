//! Multiple testing correction.

pub mod bh;

pub use bh::{adjust_or_fallback, correct_bh, BhCorrected};
