use crate::errors::{DoeError, Result};
use linfa::Float;
use ndarray::{Array, Array1, Array2, ArrayBase, ArrayView1, Data, DataMut, Ix1, Ix2, Zip};
use ndarray_rand::{rand::Rng, rand_distr::Uniform, RandomExt};

#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// A box constrained design space `[low_1, high_1] x ... x [low_nx, high_nx]`
///
/// Bounds are checked at construction and never change afterwards.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(try_from = "Vec<(F, F)>", into = "Vec<(F, F)>"),
    serde(bound(
        serialize = "F: Serialize",
        deserialize = "F: Deserialize<'de>"
    ))
)]
pub struct Domain<F: Float> {
    /// (nx, 2) matrix where the ith row is [lower_bound, upper_bound] of the ith component
    xlimits: Array2<F>,
}

impl<F: Float> Domain<F> {
    /// Constructor given bounds as a (nx, 2) matrix \[\[lower bound, upper bound\], ...\]
    ///
    /// Fails when the matrix is empty, has not two columns, contains non finite values
    /// or when a lower bound is greater than its upper bound.
    pub fn new(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Self> {
        if xlimits.ncols() != 2 {
            return Err(DoeError::BadBoundsShape(xlimits.ncols()));
        }
        if xlimits.nrows() == 0 {
            return Err(DoeError::EmptyDomain);
        }
        for (dim, bounds) in xlimits.rows().into_iter().enumerate() {
            let (low, high) = (bounds[0], bounds[1]);
            if !low.is_finite() || !high.is_finite() {
                return Err(DoeError::NonFiniteBound(dim));
            }
            if low > high {
                return Err(DoeError::InvalidBounds {
                    dim,
                    low: low.to_f64().unwrap_or(f64::NAN),
                    high: high.to_f64().unwrap_or(f64::NAN),
                });
            }
        }
        Ok(Domain {
            xlimits: xlimits.to_owned(),
        })
    }

    /// Constructor given a list of (lower bound, upper bound) pairs
    pub fn from_bounds(bounds: &[(F, F)]) -> Result<Self> {
        let mut xlimits = Array2::zeros((bounds.len(), 2));
        for (mut row, (low, high)) in xlimits.rows_mut().into_iter().zip(bounds) {
            row[0] = *low;
            row[1] = *high;
        }
        Self::new(&xlimits)
    }

    /// Dimension of the design space
    pub fn dim(&self) -> usize {
        self.xlimits.nrows()
    }

    /// Bounds as a (nx, 2) matrix
    pub fn xlimits(&self) -> &Array2<F> {
        &self.xlimits
    }

    /// Lower bounds
    pub fn lower(&self) -> ArrayView1<F> {
        self.xlimits.column(0)
    }

    /// Upper bounds
    pub fn upper(&self) -> ArrayView1<F> {
        self.xlimits.column(1)
    }

    /// Interval widths `upper - lower`
    pub fn widths(&self) -> Array1<F> {
        &self.upper() - &self.lower()
    }

    /// Whether the ith component is fixed, i.e. `lower == upper`
    pub fn is_fixed(&self, i: usize) -> bool {
        self.xlimits[[i, 0]] == self.xlimits[[i, 1]]
    }

    /// Check that `x` has the domain dimension
    pub fn check_dim(&self, x: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<()> {
        if x.len() != self.dim() {
            return Err(DoeError::DimensionMismatch {
                expected: self.dim(),
                actual: x.len(),
            });
        }
        Ok(())
    }

    /// Whether `x` lies within bounds (inclusive). A point of wrong dimension is never contained.
    pub fn contains(&self, x: &ArrayBase<impl Data<Elem = F>, Ix1>) -> bool {
        x.len() == self.dim()
            && Zip::from(x)
                .and(self.xlimits.rows())
                .all(|&xi, b| b[0] <= xi && xi <= b[1])
    }

    /// Project `x` onto the domain, component by component.
    ///
    /// **Panics** if `x` dimension differs from the domain one.
    pub fn clamp(&self, x: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Array1<F> {
        let mut res = x.to_owned();
        self.clamp_inplace(&mut res);
        res
    }

    /// In-place version of [`Domain::clamp`]
    pub fn clamp_inplace(&self, x: &mut ArrayBase<impl DataMut<Elem = F>, Ix1>) {
        Zip::from(x).and(self.xlimits.rows()).for_each(|xi, b| {
            if *xi < b[0] || xi.is_nan() {
                *xi = b[0];
            } else if *xi > b[1] {
                *xi = b[1];
            }
        });
    }

    /// Draw `n` points uniformly within the domain as a (n, nx) matrix.
    /// Fixed components are set to their unique value.
    pub fn sample_uniform<R: Rng>(&self, n: usize, rng: &mut R) -> Array2<F> {
        let unit = Array::random_using((n, self.dim()), Uniform::new(0f64, 1.), rng);
        let mut samples = unit.mapv(F::cast) * &self.widths() + &self.lower();
        // lower + u * width may round past the upper bound
        for mut x in samples.rows_mut() {
            self.clamp_inplace(&mut x);
        }
        samples
    }
}

impl<F: Float> TryFrom<Vec<(F, F)>> for Domain<F> {
    type Error = DoeError;
    fn try_from(bounds: Vec<(F, F)>) -> Result<Self> {
        Self::from_bounds(&bounds)
    }
}

impl<F: Float> From<Domain<F>> for Vec<(F, F)> {
    fn from(domain: Domain<F>) -> Vec<(F, F)> {
        domain.xlimits.rows().into_iter().map(|b| (b[0], b[1])).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr2, array, Axis};
    use ndarray_rand::rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    #[test]
    fn test_domain_invalid_bounds() {
        let res = Domain::new(&arr2(&[[0., 1.], [2., 1.]]));
        assert_eq!(
            res,
            Err(DoeError::InvalidBounds {
                dim: 1,
                low: 2.,
                high: 1.
            })
        );
        assert_eq!(
            Domain::<f64>::from_bounds(&[]),
            Err(DoeError::EmptyDomain)
        );
        assert_eq!(
            Domain::new(&arr2(&[[0., f64::INFINITY]])),
            Err(DoeError::NonFiniteBound(0))
        );
        assert_eq!(
            Domain::new(&arr2(&[[0., 1., 2.]])),
            Err(DoeError::BadBoundsShape(3))
        );
    }

    #[test]
    fn test_domain_contains_and_clamp() {
        let domain = Domain::from_bounds(&[(0., 1.), (-2., 2.)]).unwrap();
        assert_eq!(domain.dim(), 2);
        assert!(domain.contains(&array![0., 2.]));
        assert!(!domain.contains(&array![1.5, 0.]));
        assert!(!domain.contains(&array![0.5]));
        assert_abs_diff_eq!(domain.clamp(&array![1.5, -3.]), array![1., -2.]);
        assert_abs_diff_eq!(domain.clamp(&array![0.25, 1.]), array![0.25, 1.]);
        assert!(domain.contains(&domain.clamp(&array![f64::NAN, 10.])));
        assert!(domain.check_dim(&array![1.]).is_err());
    }

    #[test]
    fn test_domain_sample_uniform() {
        let domain = Domain::new(&arr2(&[[5., 10.], [3., 3.]])).unwrap();
        assert!(!domain.is_fixed(0));
        assert!(domain.is_fixed(1));
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let samples = domain.sample_uniform(50, &mut rng);
        assert_eq!(samples.dim(), (50, 2));
        for x in samples.rows() {
            assert!(domain.contains(&x));
            assert_eq!(x[1], 3.);
        }
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        assert_eq!(samples, domain.sample_uniform(50, &mut rng));
    }

    #[test]
    fn test_domain_sample_uniform_scaling() {
        let domain = Domain::new(&arr2(&[[-4., 4.], [0., 0.5]])).unwrap();
        let mut rng = Xoshiro256Plus::seed_from_u64(3);
        let samples = domain.sample_uniform(2000, &mut rng);
        let mean = samples.mean_axis(Axis(0)).unwrap();
        assert_abs_diff_eq!(mean, array![0., 0.25], epsilon = 0.2);
        let spread = samples.fold_axis(Axis(0), f64::NEG_INFINITY, |m, &v| m.max(v))
            - samples.fold_axis(Axis(0), f64::INFINITY, |m, &v| m.min(v));
        assert!(spread[0] > 7.5 && spread[1] > 0.45);
        assert!(domain.sample_uniform(0, &mut rng).is_empty());
    }

    #[test]
    fn test_domain_bounds_conversion() {
        let domain = Domain::from_bounds(&[(0., 1.), (-2., 2.)]).unwrap();
        let bounds: Vec<(f64, f64)> = domain.clone().into();
        assert_eq!(bounds, vec![(0., 1.), (-2., 2.)]);
        assert_eq!(Domain::try_from(bounds).unwrap(), domain);
    }
}
