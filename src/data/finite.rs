//! Serde helpers that emit non-finite numbers as `null`.
//!
//! Externalized results must never carry NaN or ±Infinity; these functions
//! are used with `#[serde(serialize_with = "...")]` on numeric fields.

use serde::Serializer;

/// `Some(x)` when `x` is finite, otherwise `None`.
#[inline]
pub fn finite(x: f64) -> Option<f64> {
    x.is_finite().then_some(x)
}

/// Serialize a scalar.
pub fn value<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
    match finite(*v) {
        Some(x) => s.serialize_f64(x),
        None => s.serialize_none(),
    }
}

/// Serialize an optional scalar.
pub fn option<S: Serializer>(v: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
    match v.and_then(finite) {
        Some(x) => s.serialize_f64(x),
        None => s.serialize_none(),
    }
}

/// Serialize a vector of scalars.
pub fn values<S: Serializer>(v: &[f64], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(v.iter().map(|&x| finite(x)))
}

/// Serialize 2-D points.
pub fn points<S: Serializer>(v: &[[f64; 2]], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(v.iter().map(|p| [finite(p[0]), finite(p[1])]))
}

/// Serialize optional 2-D points.
pub fn option_points<S: Serializer>(v: &Option<Vec<[f64; 2]>>, s: S) -> Result<S::Ok, S::Error> {
    match v {
        Some(p) => points(p, s),
        None => s.serialize_none(),
    }
}

/// Serialize a row-major matrix.
pub fn rows<S: Serializer>(v: &[Vec<f64>], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(
        v.iter()
            .map(|row| row.iter().map(|&x| finite(x)).collect::<Vec<_>>()),
    )
}
