use ndarray::{Array2, ArrayView2, ArrayViewD, Ix2};

use crate::error::{CsvdError, Result};

/// Collects row vectors into a dense `B x N` matrix.
///
/// Fails with [`CsvdError::ShapeMismatch`] when the rows do not all share the
/// length of the first one.
pub fn rows_to_array(rows: &[Vec<f64>]) -> Result<Array2<f64>> {
    let n_features = rows.first().map_or(0, Vec::len);
    let mut flat = Vec::with_capacity(rows.len() * n_features);

    for (i, row) in rows.iter().enumerate() {
        if row.len() != n_features {
            return Err(CsvdError::ShapeMismatch {
                expected: format!("{} features in every row", n_features),
                found: format!("{} features in row {}", row.len(), i),
            });
        }
        flat.extend_from_slice(row);
    }

    Array2::from_shape_vec((rows.len(), n_features), flat).map_err(|e| {
        CsvdError::ShapeMismatch {
            expected: format!("{} x {} matrix", rows.len(), n_features),
            found: e.to_string(),
        }
    })
}

/// Reinterprets a dynamically shaped array as a `B x N` matrix view.
pub fn as_matrix(data: ArrayViewD<'_, f64>) -> Result<ArrayView2<'_, f64>> {
    if data.ndim() != 2 {
        return Err(CsvdError::ShapeMismatch {
            expected: "2-dimensional array".to_string(),
            found: format!("{}-dimensional array {:?}", data.ndim(), data.shape()),
        });
    }

    let shape = data.shape().to_vec();
    data.into_dimensionality::<Ix2>()
        .map_err(|e| CsvdError::ShapeMismatch {
            expected: "2-dimensional array".to_string(),
            found: format!("{:?} ({})", shape, e),
        })
}

/// Rejects matrices with no rows or no columns.
pub(crate) fn ensure_non_empty(data: &ArrayView2<f64>) -> Result<()> {
    let (n_rows, n_cols) = data.dim();
    if n_rows == 0 || n_cols == 0 {
        return Err(CsvdError::ShapeMismatch {
            expected: "at least one row and one column".to_string(),
            found: format!("{} x {} matrix", n_rows, n_cols),
        });
    }
    Ok(())
}

/// Rejects matrices holding NaN or infinite entries.
pub(crate) fn ensure_finite(data: &ArrayView2<f64>) -> Result<()> {
    if let Some(((row, col), value)) = data.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(CsvdError::Numerical(format!(
            "non-finite value {} at row {}, column {}",
            value, row, col
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, ArrayD, IxDyn};

    #[test]
    fn test_rows_to_array() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let arr = rows_to_array(&rows).unwrap();

        assert_eq!(arr, array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
    }

    #[test]
    fn test_rows_to_array_ragged() {
        let rows = vec![vec![1.0, 2.0], vec![3.0], vec![5.0, 6.0]];
        let err = rows_to_array(&rows).unwrap_err();

        assert!(matches!(err, CsvdError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_as_matrix_rejects_3d() {
        let data = ArrayD::<f64>::zeros(IxDyn(&[2, 3, 1]));
        assert!(matches!(
            as_matrix(data.view()),
            Err(CsvdError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_as_matrix_accepts_2d() {
        let data = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]].into_dyn();
        let matrix = as_matrix(data.view()).unwrap();

        assert_eq!(matrix.dim(), (2, 3));
        assert_eq!(matrix[[1, 2]], 6.0);
    }

    #[test]
    fn test_ensure_non_empty() {
        let empty = Array2::<f64>::zeros((0, 3));
        assert!(ensure_non_empty(&empty.view()).is_err());

        let full = Array2::<f64>::zeros((1, 3));
        assert!(ensure_non_empty(&full.view()).is_ok());
    }

    #[test]
    fn test_ensure_finite() {
        let nan = array![[1.0, 2.0], [f64::NAN, 0.0]];
        assert_eq!(
            ensure_finite(&nan.view()).unwrap_err(),
            CsvdError::Numerical("non-finite value NaN at row 1, column 0".to_string())
        );

        let inf = array![[1.0, f64::NEG_INFINITY]];
        assert!(matches!(
            ensure_finite(&inf.view()),
            Err(CsvdError::Numerical(_))
        ));

        assert!(ensure_finite(&array![[1.0, 2.0]].view()).is_ok());
    }
}
