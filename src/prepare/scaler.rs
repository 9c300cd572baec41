//! Standardization to zero mean and unit variance.

use crate::error::{Error, Result};
use ndarray::{Array1, Array2, Axis};

/// Per-feature mean and population standard deviation.
///
/// Fit once on a reference matrix, then reuse for every transform of that
/// matrix. A feature with zero spread is centered but not rescaled.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingParameters {
    mean: Array1<f64>,
    std: Array1<f64>,
}

impl ScalingParameters {
    /// Compute mean and standard deviation of each column.
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        let n = x.nrows();
        if n == 0 {
            return Err(Error::EmptyInput);
        }

        let mean = x.sum_axis(Axis(0)) / n as f64;
        let mut std = Array1::zeros(x.ncols());
        for (j, s) in std.iter_mut().enumerate() {
            let sum_sq: f64 = x.column(j).iter().map(|v| (v - mean[j]).powi(2)).sum();
            *s = (sum_sq / n as f64).sqrt();
        }

        Ok(Self { mean, std })
    }

    /// Per-feature means.
    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    /// Per-feature population standard deviations.
    pub fn std(&self) -> &Array1<f64> {
        &self.std
    }

    /// Standardize `x` with the fitted parameters.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.mean.len() {
            return Err(Error::DimensionMismatch {
                expected: self.mean.len(),
                found: x.ncols(),
            });
        }

        let mut out = x.clone();
        for (j, mut col) in out.columns_mut().into_iter().enumerate() {
            let scale = if self.std[j] > 0.0 { self.std[j] } else { 1.0 };
            col.mapv_inplace(|v| (v - self.mean[j]) / scale);
        }
        Ok(out)
    }

    /// Fit on `x` and standardize it.
    pub fn fit_transform(x: &Array2<f64>) -> Result<(Self, Array2<f64>)> {
        let params = Self::fit(x)?;
        let scaled = params.transform(x)?;
        Ok((params, scaled))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_scaled_columns_are_standard() {
        let x = array![
            [14.5, 121.0, 3.0, 0.0],
            [10.3, 123.9, 22.0, 6.0],
            [7.1, 125.6, 12.0, 2.0],
            [16.4, 120.6, 8.0, 4.0],
            [13.6, 123.2, 17.0, 5.0],
        ];
        let (_, scaled) = ScalingParameters::fit_transform(&x).unwrap();

        for col in scaled.columns() {
            let n = col.len() as f64;
            let mean = col.sum() / n;
            let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            assert!(mean.abs() < 1e-12, "mean {mean}");
            assert!((var.sqrt() - 1.0).abs() < 1e-12, "std {}", var.sqrt());
        }
    }

    #[test]
    fn test_constant_column_is_centered() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0]];
        let (params, scaled) = ScalingParameters::fit_transform(&x).unwrap();
        assert_eq!(params.std()[1], 0.0);
        assert!(scaled.column(1).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_transform_dimension_mismatch() {
        let params = ScalingParameters::fit(&array![[1.0, 2.0], [3.0, 4.0]]).unwrap();
        let err = params.transform(&array![[1.0, 2.0, 3.0]]).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 2,
                found: 3
            }
        ));
    }

    #[test]
    fn test_fit_empty_error() {
        let x = Array2::<f64>::zeros((0, 4));
        assert!(matches!(ScalingParameters::fit(&x), Err(Error::EmptyInput)));
    }
}
