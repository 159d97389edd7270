//! Dimensionality reduction: variable-feature selection, PCA, a 2-D
//! neighbour-graph embedding and sample correlation.

pub mod correlation;
pub mod pca;
pub mod umap;
pub mod variable;

pub use correlation::{pearson_correlation, sample_correlation};
pub use pca::{pca, Pca};
pub use umap::{embed_or_fallback, Embedder, Umap, UmapConfig};
pub use variable::{feature_variances, observations, standardize, top_variable_features};
