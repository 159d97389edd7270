//! Expression matrix with sparse storage for bulk and single-cell data.

use crate::error::{AnalysisError, Result};
use log::debug;
use rayon::prelude::*;
use sprs::{CsMat, TriMat};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// A sparse matrix of expression measurements.
///
/// Rows represent features (genes), columns represent samples or cells.
/// Uses CSR (Compressed Sparse Row) format for efficient row-wise operations.
/// Row and column labels are unique; duplicates are suffixed on construction.
///
/// The matrix is never edited in place: filtering returns a new matrix.
#[derive(Debug, Clone)]
pub struct ExpressionMatrix {
    /// Sparse matrix in CSR format (features × samples)
    data: CsMat<f64>,
    /// Feature identifiers (row names)
    feature_ids: Vec<String>,
    /// Sample identifiers (column names)
    sample_ids: Vec<String>,
}

impl ExpressionMatrix {
    /// Create a new ExpressionMatrix from a sparse matrix and identifiers.
    ///
    /// Duplicate identifiers are made unique by appending `-1`, `-2`, ...
    pub fn new(data: CsMat<f64>, feature_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != feature_ids.len() {
            return Err(AnalysisError::DimensionMismatch {
                expected: nrows,
                actual: feature_ids.len(),
            });
        }
        if ncols != sample_ids.len() {
            return Err(AnalysisError::DimensionMismatch {
                expected: ncols,
                actual: sample_ids.len(),
            });
        }
        let data = if data.is_csr() { data } else { data.to_csr() };
        Ok(Self {
            data,
            feature_ids: make_unique(feature_ids),
            sample_ids: make_unique(sample_ids),
        })
    }

    /// Build a matrix from dense feature rows.
    ///
    /// Non-finite values are stored as zero.
    pub fn from_rows(
        rows: &[Vec<f64>],
        feature_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let n_samples = sample_ids.len();
        let mut tri_mat = TriMat::new((rows.len(), n_samples));
        for (row, values) in rows.iter().enumerate() {
            if values.len() != n_samples {
                return Err(AnalysisError::DimensionMismatch {
                    expected: n_samples,
                    actual: values.len(),
                });
            }
            for (col, &val) in values.iter().enumerate() {
                if val.is_finite() && val != 0.0 {
                    tri_mat.add_triplet(row, col, val);
                }
            }
        }
        Self::new(tri_mat.to_csr(), feature_ids, sample_ids)
    }

    /// Load an expression matrix from a TSV file.
    ///
    /// Expected format:
    /// - First row: header with sample IDs (first column is feature ID header)
    /// - Subsequent rows: feature ID followed by values
    ///
    /// Cells that do not parse as finite numbers are coerced to zero.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| AnalysisError::EmptyData("Empty TSV file".to_string()))??;
        let header: Vec<&str> = header_line.split('\t').collect();
        if header.len() < 2 {
            return Err(AnalysisError::EmptyData(
                "TSV must have at least one sample".to_string(),
            ));
        }
        let sample_ids: Vec<String> = header[1..].iter().map(|s| s.trim().to_string()).collect();
        let n_samples = sample_ids.len();

        let mut triplets: Vec<(usize, usize, f64)> = Vec::new();
        let mut feature_ids: Vec<String> = Vec::new();
        let mut n_coerced = 0usize;

        for line_result in lines {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let row_idx = feature_ids.len();
            feature_ids.push(fields[0].trim().to_string());

            for (col_idx, value_str) in fields[1..].iter().enumerate().take(n_samples) {
                match value_str.trim().parse::<f64>() {
                    Ok(value) if value.is_finite() => {
                        if value != 0.0 {
                            triplets.push((row_idx, col_idx, value));
                        }
                    }
                    _ => n_coerced += 1,
                }
            }
        }

        let n_features = feature_ids.len();
        if n_features == 0 {
            return Err(AnalysisError::EmptyData("No features in TSV".to_string()));
        }
        if n_coerced > 0 {
            debug!("Coerced {} non-numeric cells to zero", n_coerced);
        }

        let mut tri_mat = TriMat::new((n_features, n_samples));
        for (row, col, val) in triplets {
            tri_mat.add_triplet(row, col, val);
        }

        Self::new(tri_mat.to_csr(), feature_ids, sample_ids)
    }

    /// Write the matrix to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "feature_id")?;
        for sample_id in &self.sample_ids {
            write!(writer, "\t{}", sample_id)?;
        }
        writeln!(writer)?;

        for (row_idx, feature_id) in self.feature_ids.iter().enumerate() {
            write!(writer, "{}", feature_id)?;
            for value in self.row_dense(row_idx) {
                write!(writer, "\t{}", value)?;
            }
            writeln!(writer)?;
        }

        Ok(())
    }

    /// Get the value at (row, col), returning 0 for missing entries.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data.get(row, col).copied().unwrap_or(0.0)
    }

    /// Number of features (rows).
    #[inline]
    pub fn n_features(&self) -> usize {
        self.data.rows()
    }

    /// Number of samples (columns).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.cols()
    }

    /// Total number of stored non-zero entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.data.nnz()
    }

    /// Feature identifiers.
    #[inline]
    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    /// Sample identifiers.
    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Get a dense vector for a specific row (feature).
    pub fn row_dense(&self, row: usize) -> Vec<f64> {
        let mut dense = vec![0.0; self.n_samples()];
        if let Some(row_vec) = self.data.outer_view(row) {
            for (col, &val) in row_vec.iter() {
                dense[col] = val;
            }
        }
        dense
    }

    /// Total signal per feature.
    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.n_features())
            .into_par_iter()
            .map(|row| {
                self.data
                    .outer_view(row)
                    .map(|v| v.iter().map(|(_, &val)| val).sum())
                    .unwrap_or(0.0)
            })
            .collect()
    }

    /// Total signal per sample (library sizes).
    pub fn col_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.n_samples()];
        for row_vec in self.data.outer_iterator() {
            for (col, &val) in row_vec.iter() {
                sums[col] += val;
            }
        }
        sums
    }

    /// Number of samples in which each feature is detected (value > 0).
    pub fn detected_per_feature(&self) -> Vec<usize> {
        (0..self.n_features())
            .into_par_iter()
            .map(|row| {
                self.data
                    .outer_view(row)
                    .map(|v| v.iter().filter(|(_, &val)| val > 0.0).count())
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Number of features detected (value > 0) in each sample.
    pub fn detected_per_sample(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_samples()];
        for row_vec in self.data.outer_iterator() {
            for (col, &val) in row_vec.iter() {
                if val > 0.0 {
                    counts[col] += 1;
                }
            }
        }
        counts
    }

    /// Fraction of entries that are exactly zero.
    ///
    /// Returns `None` for an empty matrix.
    pub fn zero_fraction(&self) -> Option<f64> {
        let total = self.n_features() * self.n_samples();
        if total == 0 {
            return None;
        }
        let nonzero = self.data.iter().filter(|(&val, _)| val != 0.0).count();
        Some((total - nonzero) as f64 / total as f64)
    }

    /// Subset the matrix to include only specified features (by index).
    pub fn subset_features(&self, indices: &[usize]) -> Result<Self> {
        let n_features = indices.len();
        let n_samples = self.n_samples();

        let mut tri_mat = TriMat::new((n_features, n_samples));
        let mut new_feature_ids = Vec::with_capacity(n_features);

        for (new_row, &old_row) in indices.iter().enumerate() {
            if old_row >= self.n_features() {
                return Err(AnalysisError::InvalidParameter(format!(
                    "Feature index {} out of bounds",
                    old_row
                )));
            }
            new_feature_ids.push(self.feature_ids[old_row].clone());

            if let Some(row_vec) = self.data.outer_view(old_row) {
                for (col, &val) in row_vec.iter() {
                    tri_mat.add_triplet(new_row, col, val);
                }
            }
        }

        Self::new(tri_mat.to_csr(), new_feature_ids, self.sample_ids.clone())
    }

    /// Subset the matrix to include only specified samples (by index).
    pub fn subset_samples(&self, indices: &[usize]) -> Result<Self> {
        let n_features = self.n_features();
        let n_samples = indices.len();

        let col_map: HashMap<usize, usize> = indices
            .iter()
            .enumerate()
            .map(|(new_idx, &old_idx)| (old_idx, new_idx))
            .collect();

        let mut new_sample_ids = Vec::with_capacity(n_samples);
        for &old_col in indices {
            if old_col >= self.n_samples() {
                return Err(AnalysisError::InvalidParameter(format!(
                    "Sample index {} out of bounds",
                    old_col
                )));
            }
            new_sample_ids.push(self.sample_ids[old_col].clone());
        }

        let mut tri_mat = TriMat::new((n_features, n_samples));
        for (row, row_vec) in self.data.outer_iterator().enumerate() {
            for (old_col, &val) in row_vec.iter() {
                if let Some(&new_col) = col_map.get(&old_col) {
                    tri_mat.add_triplet(row, new_col, val);
                }
            }
        }

        Self::new(tri_mat.to_csr(), self.feature_ids.clone(), new_sample_ids)
    }

    /// Convert to a dense matrix (features × samples).
    pub fn to_dense(&self) -> nalgebra::DMatrix<f64> {
        let mut dense = nalgebra::DMatrix::zeros(self.n_features(), self.n_samples());
        for (row, row_vec) in self.data.outer_iterator().enumerate() {
            for (col, &val) in row_vec.iter() {
                dense[(row, col)] = val;
            }
        }
        dense
    }
}

/// Make labels unique by suffixing repeats with `-1`, `-2`, ...
pub(crate) fn make_unique(ids: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(ids.len());
    let originals: HashSet<String> = ids.iter().cloned().collect();
    if originals.len() == ids.len() {
        return ids;
    }

    let mut next_suffix: HashMap<String, usize> = HashMap::new();
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if seen.insert(id.clone()) {
            unique.push(id);
            continue;
        }
        let counter = next_suffix.entry(id.clone()).or_insert(1);
        let mut candidate = format!("{}-{}", id, counter);
        while originals.contains(&candidate) || seen.contains(&candidate) {
            *counter += 1;
            candidate = format!("{}-{}", id, counter);
        }
        *counter += 1;
        seen.insert(candidate.clone());
        unique.push(candidate);
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_matrix() -> ExpressionMatrix {
        // 3 features × 4 samples
        let rows = vec![
            vec![10.0, 20.0, 0.0, 5.0],
            vec![100.0, 200.0, 150.0, 175.0],
            vec![1.0, 0.0, 0.0, 0.0],
        ];
        let feature_ids = vec!["GENE_A".to_string(), "GENE_B".to_string(), "GENE_C".to_string()];
        let sample_ids = vec![
            "GSM1".to_string(),
            "GSM2".to_string(),
            "GSM3".to_string(),
            "GSM4".to_string(),
        ];
        ExpressionMatrix::from_rows(&rows, feature_ids, sample_ids).unwrap()
    }

    #[test]
    fn test_dimensions() {
        let mat = create_test_matrix();
        assert_eq!(mat.n_features(), 3);
        assert_eq!(mat.n_samples(), 4);
        assert_eq!(mat.nnz(), 8);
    }

    #[test]
    fn test_get_values() {
        let mat = create_test_matrix();
        assert_eq!(mat.get(0, 0), 10.0);
        assert_eq!(mat.get(0, 2), 0.0);
        assert_eq!(mat.get(2, 0), 1.0);
        assert_eq!(mat.get(2, 1), 0.0);
    }

    #[test]
    fn test_sums_and_detection() {
        let mat = create_test_matrix();
        assert_eq!(mat.row_sums(), vec![35.0, 625.0, 1.0]);
        assert_eq!(mat.col_sums(), vec![111.0, 220.0, 150.0, 180.0]);
        assert_eq!(mat.detected_per_feature(), vec![3, 4, 1]);
        assert_eq!(mat.detected_per_sample(), vec![3, 2, 1, 2]);
    }

    #[test]
    fn test_negative_values_are_not_detected() {
        let rows = vec![vec![-1.0, 2.0], vec![0.0, -3.0]];
        let mat = ExpressionMatrix::from_rows(
            &rows,
            vec!["a".into(), "b".into()],
            vec!["s1".into(), "s2".into()],
        )
        .unwrap();
        assert_eq!(mat.detected_per_feature(), vec![1, 0]);
        assert_eq!(mat.detected_per_sample(), vec![0, 1]);
    }

    #[test]
    fn test_zero_fraction() {
        let mat = create_test_matrix();
        let frac = mat.zero_fraction().unwrap();
        assert!((frac - 4.0 / 12.0).abs() < 1e-12);

        let empty = ExpressionMatrix::from_rows(&[], vec![], vec![]).unwrap();
        assert!(empty.zero_fraction().is_none());
    }

    #[test]
    fn test_duplicate_labels_are_suffixed() {
        let rows = vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]];
        let ids = vec!["TP53".into(), "TP53".into(), "TP53-1".into(), "TP53".into()];
        let mat = ExpressionMatrix::from_rows(&rows, ids, vec!["s".into()]).unwrap();
        let unique: HashSet<&String> = mat.feature_ids().iter().collect();
        assert_eq!(unique.len(), 4);
        assert_eq!(mat.feature_ids()[0], "TP53");
        assert_eq!(mat.feature_ids()[2], "TP53-1");
    }

    #[test]
    fn test_tsv_roundtrip_with_non_numeric_cells() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "gene\tGSM1\tGSM2").unwrap();
        writeln!(file, "A\t1.5\tNA").unwrap();
        writeln!(file, "B\t0\t7").unwrap();
        file.flush().unwrap();

        let mat = ExpressionMatrix::from_tsv(file.path()).unwrap();
        assert_eq!(mat.n_features(), 2);
        assert_eq!(mat.sample_ids(), &["GSM1", "GSM2"]);
        assert_eq!(mat.get(0, 0), 1.5);
        assert_eq!(mat.get(0, 1), 0.0);
        assert_eq!(mat.get(1, 1), 7.0);

        let out = NamedTempFile::new().unwrap();
        mat.to_tsv(out.path()).unwrap();
        let loaded = ExpressionMatrix::from_tsv(out.path()).unwrap();
        assert_eq!(loaded.feature_ids(), mat.feature_ids());
        assert_eq!(loaded.get(1, 1), 7.0);
    }

    #[test]
    fn test_subset_features() {
        let mat = create_test_matrix();
        let subset = mat.subset_features(&[0, 2]).unwrap();

        assert_eq!(subset.n_features(), 2);
        assert_eq!(subset.n_samples(), 4);
        assert_eq!(subset.feature_ids(), &["GENE_A", "GENE_C"]);
        assert_eq!(subset.get(1, 0), 1.0);
        assert!(mat.subset_features(&[5]).is_err());
    }

    #[test]
    fn test_subset_samples() {
        let mat = create_test_matrix();
        let subset = mat.subset_samples(&[1, 3]).unwrap();

        assert_eq!(subset.n_features(), 3);
        assert_eq!(subset.n_samples(), 2);
        assert_eq!(subset.sample_ids(), &["GSM2", "GSM4"]);
        assert_eq!(subset.get(0, 0), 20.0);
        assert_eq!(subset.get(0, 1), 5.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let rows = vec![vec![1.0, 2.0]];
        let result = ExpressionMatrix::from_rows(&rows, vec!["a".into()], vec!["s1".into()]);
        assert!(result.is_err());
    }
}
