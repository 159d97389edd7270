//! Library-size normalization followed by a log transform.

pub mod library_size;

pub use library_size::{norm_library_size, normalize_for, NormalizedMatrix};
