//! Linear projection onto the directions of maximum variance.
//!
//! The components are the leading eigenvectors of the sample covariance
//! matrix, found by power iteration with deflation. The starting vectors come
//! from a seeded RNG and each component is sign-normalized (largest absolute
//! coefficient positive), so the same input and seed give bit-identical
//! output.

use crate::error::{Error, Result};
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;

const MAX_POWER_ITER: usize = 1000;
const POWER_TOL: f64 = 1e-12;

/// Orthonormal projection basis with the variance each direction explains.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionBasis {
    /// Column means of the fitted matrix.
    mean: Array1<f64>,
    /// One component per row, `n_components × n_features`.
    components: Array2<f64>,
    explained_variance: Vec<f64>,
    explained_variance_ratio: Vec<f64>,
}

impl ProjectionBasis {
    /// Fit `n_components` directions on `x`.
    pub fn fit(x: &Array2<f64>, n_components: usize, seed: u64) -> Result<Self> {
        let (n, d) = x.dim();
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        if n_components == 0 || n_components > d {
            return Err(Error::config(
                "n_components",
                format!("must be in 1..={d}, got {n_components}"),
            ));
        }

        let mean = x.sum_axis(Axis(0)) / n as f64;
        let centered = x - &mean;
        let denom = n.saturating_sub(1).max(1) as f64;
        let mut cov = centered.t().dot(&centered) / denom;
        let total_variance: f64 = cov.diag().sum();

        let mut rng = StdRng::seed_from_u64(seed);
        let mut components = Array2::zeros((n_components, d));
        let mut explained_variance = Vec::with_capacity(n_components);

        for c in 0..n_components {
            let v = Self::leading_eigenvector(&cov, &components, c, &mut rng);
            let lambda = v.dot(&cov.dot(&v)).max(0.0);

            // Deflate: remove the found direction from the covariance.
            for i in 0..d {
                for j in 0..d {
                    cov[[i, j]] -= lambda * v[i] * v[j];
                }
            }

            components.row_mut(c).assign(&v);
            explained_variance.push(lambda);
        }

        let explained_variance_ratio = explained_variance
            .iter()
            .map(|&ev| {
                if total_variance > 0.0 {
                    ev / total_variance
                } else {
                    0.0
                }
            })
            .collect();

        Ok(Self {
            mean,
            components,
            explained_variance,
            explained_variance_ratio,
        })
    }

    /// Power iteration for the dominant direction of `cov`, kept orthogonal to
    /// the first `found` rows of `basis`.
    fn leading_eigenvector(
        cov: &Array2<f64>,
        basis: &Array2<f64>,
        found: usize,
        rng: &mut StdRng,
    ) -> Array1<f64> {
        let d = cov.nrows();
        let mut v = Self::random_unit_orthogonal(d, basis, found, rng);

        for _ in 0..MAX_POWER_ITER {
            let mut next = cov.dot(&v);
            orthogonalize(&mut next, basis, found);
            let norm = next.dot(&next).sqrt();
            if norm <= f64::EPSILON {
                // Remaining spectrum is zero; any orthogonal direction will do.
                break;
            }
            next /= norm;
            let delta: f64 = next
                .iter()
                .zip(v.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum();
            v = next;
            if delta < POWER_TOL {
                break;
            }
        }

        // Sign convention: largest absolute coefficient is positive.
        let pivot = v
            .iter()
            .copied()
            .fold(0.0_f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
        if pivot < 0.0 {
            v.mapv_inplace(|x| -x);
        }
        v
    }

    fn random_unit_orthogonal(
        d: usize,
        basis: &Array2<f64>,
        found: usize,
        rng: &mut StdRng,
    ) -> Array1<f64> {
        loop {
            let mut v: Array1<f64> = (0..d).map(|_| rng.random::<f64>() - 0.5).collect();
            orthogonalize(&mut v, basis, found);
            let norm = v.dot(&v).sqrt();
            if norm > 1e-8 {
                return v / norm;
            }
        }
    }

    /// Component directions, one per row.
    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    /// Number of components.
    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    /// Variance along each component, descending.
    pub fn explained_variance(&self) -> &[f64] {
        &self.explained_variance
    }

    /// Fraction of total variance along each component.
    pub fn explained_variance_ratio(&self) -> &[f64] {
        &self.explained_variance_ratio
    }

    /// Project `x` onto the basis.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.mean.len() {
            return Err(Error::DimensionMismatch {
                expected: self.mean.len(),
                found: x.ncols(),
            });
        }
        let centered = x - &self.mean;
        Ok(centered.dot(&self.components.t()))
    }
}

/// Gram-Schmidt against the first `found` rows of `basis`.
fn orthogonalize(v: &mut Array1<f64>, basis: &Array2<f64>, found: usize) {
    for row in basis.rows().into_iter().take(found) {
        let proj = v.dot(&row);
        v.scaled_add(-proj, &row);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ndarray::array;

    fn elongated() -> Array2<f64> {
        // Spread mostly along (1, 1), a little along (1, -1).
        let mut rows = Vec::new();
        for i in 0..20 {
            let t = i as f64 - 9.5;
            let jitter = if i % 2 == 0 { 0.3 } else { -0.3 };
            rows.extend_from_slice(&[t + jitter, t - jitter, 0.1 * (i % 3) as f64]);
        }
        Array2::from_shape_vec((20, 3), rows).unwrap()
    }

    #[test]
    fn test_components_orthonormal() {
        let basis = ProjectionBasis::fit(&elongated(), 3, 42).unwrap();
        let c = basis.components();
        let gram = c.dot(&c.t());
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((gram[[i, j]] - expected).abs() < 1e-6, "gram[{i},{j}]");
            }
        }
    }

    #[test]
    fn test_variance_descending_and_leading_direction() {
        let basis = ProjectionBasis::fit(&elongated(), 2, 42).unwrap();
        let ev = basis.explained_variance();
        assert!(ev[0] >= ev[1]);

        // Each component satisfies C v = lambda v on the sample covariance.
        let x = elongated();
        let centered = &x - &x.mean_axis(Axis(0)).unwrap();
        let cov = centered.t().dot(&centered) / (x.nrows() as f64 - 1.0);
        for (v, &lambda) in basis.components().rows().into_iter().zip(ev) {
            let residual = &cov.dot(&v) - &(&v * lambda);
            assert!(residual.dot(&residual).sqrt() < 1e-6 * ev[0].max(1.0));
        }

        // The leading direction is close to (1, 1, 0) and positive.
        let first = basis.components().row(0);
        let s = 1.0 / 2f64.sqrt();
        assert!((first[0] - s).abs() < 1e-2);
        assert!((first[1] - s).abs() < 1e-2);
        assert!(first[2].abs() < 1e-2);

        let ratio_sum: f64 = basis.explained_variance_ratio().iter().sum();
        assert!(ratio_sum <= 1.0 + 1e-9);
    }

    #[test]
    fn test_bit_identical_with_same_seed() {
        let x = elongated();
        let a = ProjectionBasis::fit(&x, 2, 42).unwrap();
        let b = ProjectionBasis::fit(&x, 2, 42).unwrap();
        assert_eq!(a.transform(&x).unwrap(), b.transform(&x).unwrap());
    }

    #[test]
    fn test_projected_variance_matches_explained() {
        let x = elongated();
        let basis = ProjectionBasis::fit(&x, 1, 7).unwrap();
        let z = basis.transform(&x).unwrap();
        let n = z.nrows() as f64;
        let mean = z.column(0).sum() / n;
        let var = z.column(0).iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        assert!((var - basis.explained_variance()[0]).abs() < 1e-6);
    }

    #[test]
    fn test_too_many_components() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        assert!(matches!(
            ProjectionBasis::fit(&x, 3, 42),
            Err(Error::InvalidConfiguration { .. })
        ));
    }
}
