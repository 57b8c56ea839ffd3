//! Named design matrices.

use std::collections::BTreeSet;

use nalgebra::DMatrix;

use crate::RegressionError;

/// Name of the constant column added when an intercept is requested.
pub const INTERCEPT: &str = "(Intercept)";

/// A design matrix with named columns, intercept first when present.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    names: Vec<String>,
    matrix: DMatrix<f64>,
    intercept: bool,
}

impl DesignMatrix {
    /// Builds an `nrows`-row design from named columns, optionally
    /// prepending an intercept column of ones. With no columns and an
    /// intercept this is the intercept-only design.
    ///
    /// # Errors
    ///
    /// Returns [`RegressionError::DimensionMismatch`] for columns that are
    /// not `nrows` long,
    /// [`RegressionError::DuplicateColumn`] for repeated names, or
    /// [`RegressionError::NonFinite`] for NaN/infinite entries.
    pub fn new(
        nrows: usize,
        columns: Vec<(String, Vec<f64>)>,
        intercept: bool,
    ) -> Result<Self, RegressionError> {
        let mut seen = BTreeSet::new();
        for (name, values) in &columns {
            if name == INTERCEPT || !seen.insert(name.as_str()) {
                return Err(RegressionError::DuplicateColumn { name: name.clone() });
            }
            if values.len() != nrows {
                return Err(RegressionError::DimensionMismatch {
                    expected: nrows,
                    actual: values.len(),
                });
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(RegressionError::NonFinite {
                    column: name.clone(),
                });
            }
        }

        let mut names = Vec::with_capacity(columns.len() + usize::from(intercept));
        let mut data = Vec::with_capacity(nrows * (columns.len() + 1));
        if intercept {
            names.push(INTERCEPT.to_string());
            data.extend(std::iter::repeat_n(1.0, nrows));
        }
        for (name, values) in columns {
            names.push(name);
            data.extend(values);
        }

        let ncols = names.len();
        Ok(Self {
            names,
            matrix: DMatrix::from_vec(nrows, ncols, data),
            intercept,
        })
    }

    /// Number of observations.
    #[must_use]
    pub fn nrows(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of columns, including the intercept.
    #[must_use]
    pub fn ncols(&self) -> usize {
        self.matrix.ncols()
    }

    /// Column names in order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The underlying `n x k` matrix.
    #[must_use]
    pub const fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Whether the first column is the intercept.
    #[must_use]
    pub const fn has_intercept(&self) -> bool {
        self.intercept
    }

    /// Column `j` as a vector.
    #[must_use]
    pub fn column(&self, j: usize) -> Vec<f64> {
        self.matrix.column(j).iter().copied().collect()
    }

    /// Indices of the non-intercept columns.
    #[must_use]
    pub fn regressor_indices(&self) -> Vec<usize> {
        let start = usize::from(self.intercept);
        (start..self.ncols()).collect()
    }

    /// Returns a copy with `extra` columns appended after the existing ones.
    ///
    /// # Errors
    ///
    /// Same conditions as [`DesignMatrix::new`].
    pub fn with_columns(&self, extra: Vec<(String, Vec<f64>)>) -> Result<Self, RegressionError> {
        let mut columns: Vec<(String, Vec<f64>)> = self
            .regressor_indices()
            .into_iter()
            .map(|j| (self.names[j].clone(), self.column(j)))
            .collect();
        for (name, values) in extra {
            if values.len() != self.nrows() {
                return Err(RegressionError::DimensionMismatch {
                    expected: self.nrows(),
                    actual: values.len(),
                });
            }
            columns.push((name, values));
        }
        Self::new(self.nrows(), columns, self.intercept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intercept_is_first_column_of_ones() {
        let d = DesignMatrix::new(3, vec![("x".to_string(), vec![2.0, 3.0, 5.0])], true).unwrap();
        assert_eq!(d.names(), &[INTERCEPT.to_string(), "x".to_string()]);
        assert_eq!(d.column(0), vec![1.0, 1.0, 1.0]);
        assert_eq!(d.column(1), vec![2.0, 3.0, 5.0]);
        assert_eq!(d.regressor_indices(), vec![1]);
    }

    #[test]
    fn intercept_only_design_has_one_column_per_row() {
        let d = DesignMatrix::new(4, vec![], true).unwrap();
        assert_eq!(d.nrows(), 4);
        assert_eq!(d.ncols(), 1);
        assert_eq!(d.names(), &[INTERCEPT.to_string()]);
        assert_eq!(d.column(0), vec![1.0; 4]);
        assert!(d.regressor_indices().is_empty());
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = DesignMatrix::new(
            2,
            vec![
                ("a".to_string(), vec![1.0, 2.0]),
                ("b".to_string(), vec![1.0]),
            ],
            false,
        )
        .unwrap_err();
        assert!(matches!(err, RegressionError::DimensionMismatch { expected: 2, actual: 1 }));
    }

    #[test]
    fn rejects_duplicate_names_and_nan() {
        assert!(matches!(
            DesignMatrix::new(
                1,
                vec![("a".to_string(), vec![1.0]), ("a".to_string(), vec![2.0])],
                false
            ),
            Err(RegressionError::DuplicateColumn { .. })
        ));
        assert!(matches!(
            DesignMatrix::new(1, vec![("a".to_string(), vec![f64::NAN])], false),
            Err(RegressionError::NonFinite { .. })
        ));
    }

    #[test]
    fn with_columns_appends_after_regressors() {
        let d = DesignMatrix::new(2, vec![("x".to_string(), vec![1.0, 2.0])], true).unwrap();
        let augmented = d
            .with_columns(vec![("lag.x".to_string(), vec![2.0, 1.0])])
            .unwrap();
        assert_eq!(augmented.ncols(), 3);
        assert_eq!(augmented.names()[2], "lag.x");
        assert_eq!(augmented.column(2), vec![2.0, 1.0]);
    }
}
