//! A module for stationary covariance kernels `k(x, x')` used as GP prior covariance.
//!
//! The following kernels are implemented, all in product (separable) form
//! with one length scale `l_j` per input component and a signal variance `s2`:
//! * squared exponential,
//! * matern 3/2,
//! * matern 5/2.
//!
//! Hyperparameters are given as `[s2, l_1, ..., l_nx]`; a single length scale
//! `[s2, l]` is broadcasted to every component.

use crate::errors::{GpError, Result};
use crate::utils::{differences, pairwise_differences};
use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2, Zip};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// A trait for stationary covariance kernels
pub trait CovarianceKernel<F: Float>: Clone + fmt::Debug + fmt::Display + Send + Sync {
    /// Input dimension nx
    fn dim(&self) -> usize;

    /// Signal variance `s2`, i.e. `k(x, x)`
    fn signal_variance(&self) -> F;

    /// Length scales, one per input component
    fn length_scales(&self) -> &Array1<F>;

    /// Compute kernel values given componentwise differences `d = x - x'`
    /// specified as a (n, nx) matrix. Returns n values.
    fn value(&self, d: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F>;

    /// Compute the jacobian of `k(x, xtrain_i)` wrt `x` components
    /// given a set of `xtrain` points (n, nx). Returns a (n, nx) matrix.
    fn jacobian(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
        xtrain: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Array2<F>;

    /// Kernel value `k(x, y)`
    fn evaluate(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
        y: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> F {
        let d = (x - y).insert_axis(Axis(0));
        self.value(&d)[0]
    }

    /// Gradient of `k(x, y)` wrt `x`
    fn grad_wrt_first(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
        y: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Array1<F> {
        let y = y.view().insert_axis(Axis(0));
        self.jacobian(x, &y).row(0).to_owned()
    }

    /// Covariance matrix `[k(xa_i, xb_j)]` of shape (na, nb)
    fn cross_covariance(
        &self,
        xa: &ArrayBase<impl Data<Elem = F>, Ix2>,
        xb: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Array2<F> {
        let mut k = Array2::zeros((xa.nrows(), xb.nrows()));
        Zip::from(k.rows_mut())
            .and(xa.rows())
            .for_each(|mut k_i, xa_i| k_i.assign(&self.value(&differences(&xa_i, xb))));
        k
    }

    /// Hyperparameters as `[s2, l_1, ..., l_nx]`
    fn hyperparameters(&self) -> Array1<F> {
        let mut hyper = Array1::zeros(self.dim() + 1);
        hyper[0] = self.signal_variance();
        hyper
            .slice_mut(ndarray::s![1..])
            .assign(self.length_scales());
        hyper
    }
}

/// Check and expand `[s2, l_1, ..., l_nx]` or `[s2, l]` hyperparameters
/// returning the signal variance and the nx length scales
fn parse_hyperparameters<F: Float>(dim: usize, hyper: &[F]) -> Result<(F, Array1<F>)> {
    if dim == 0 {
        return Err(GpError::ConfigurationError(
            "kernel dimension should be greater than 0".to_string(),
        ));
    }
    if hyper.len() != dim + 1 && hyper.len() != 2 {
        return Err(GpError::ConfigurationError(format!(
            "expected {} hyperparameters [signal variance, length scales...] (or 2 with a shared length scale), got {}",
            dim + 1,
            hyper.len()
        )));
    }
    if let Some(v) = hyper.iter().find(|v| !v.is_finite() || **v <= F::zero()) {
        return Err(GpError::ConfigurationError(format!(
            "hyperparameters should be finite and strictly positive, got {v}"
        )));
    }
    let length_scales = if hyper.len() == dim + 1 {
        Array1::from_iter(hyper[1..].iter().cloned())
    } else {
        Array1::from_elem(dim, hyper[1])
    };
    Ok((hyper[0], length_scales))
}

macro_rules! declare_kernel {
    ($kernel:ident, $name:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Debug, PartialEq)]
        pub struct $kernel<F: Float> {
            signal_variance: F,
            length_scales: Array1<F>,
            /// inverse length scales
            theta: Array1<F>,
        }

        impl<F: Float> $kernel<F> {
            /// Constructor given the signal variance and one length scale per component
            pub fn new(signal_variance: F, length_scales: Array1<F>) -> Result<Self> {
                let mut hyper = vec![signal_variance];
                hyper.extend(length_scales.iter().cloned());
                let (signal_variance, length_scales) =
                    parse_hyperparameters(length_scales.len(), &hyper)?;
                let theta = length_scales.mapv(|l| F::one() / l);
                Ok($kernel {
                    signal_variance,
                    length_scales,
                    theta,
                })
            }

            /// Constructor given `[s2, l_1, ..., l_nx]` or `[s2, l]` hyperparameters
            pub fn from_hyperparameters(dim: usize, hyper: &[F]) -> Result<Self> {
                let (signal_variance, length_scales) = parse_hyperparameters(dim, hyper)?;
                Self::new(signal_variance, length_scales)
            }
        }

        impl<F: Float> fmt::Display for $kernel<F> {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(
                    f,
                    "{}(signal_variance={}, length_scales={})",
                    $name, self.signal_variance, self.length_scales
                )
            }
        }
    };
}

declare_kernel!(
    SquaredExponential,
    "SquaredExponential",
    "Squared exponential kernel `s2 * exp(-0.5 * sum_j (d_j / l_j)^2)`"
);
declare_kernel!(
    Matern32,
    "Matern32",
    "Matern 3/2 kernel `s2 * prod_j (1 + sqrt(3) r_j) exp(-sqrt(3) r_j)` with `r_j = |d_j| / l_j`"
);
declare_kernel!(
    Matern52,
    "Matern52",
    "Matern 5/2 kernel `s2 * prod_j (1 + sqrt(5) r_j + 5/3 r_j^2) exp(-sqrt(5) r_j)` with `r_j = |d_j| / l_j`"
);

impl<F: Float> CovarianceKernel<F> for SquaredExponential<F> {
    fn dim(&self) -> usize {
        self.theta.len()
    }

    fn signal_variance(&self) -> F {
        self.signal_variance
    }

    fn length_scales(&self) -> &Array1<F> {
        &self.length_scales
    }

    /// ```text
    ///            d
    /// s2 * exp( sum - (theta_j * d_j)^2 / 2 )
    ///           j=1
    /// ```
    fn value(&self, d: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F> {
        let theta2 = self.theta.mapv(|v| v * v);
        let r = d.mapv(|v| v * v).dot(&theta2);
        r.mapv(|v| self.signal_variance * F::exp(F::cast(-0.5) * v))
    }

    fn jacobian(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
        xtrain: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Array2<F> {
        let d = differences(x, xtrain);
        let r = self.value(&d).insert_axis(Axis(1));
        let dtheta = self.theta.mapv(|v| -v * v);
        d * &dtheta * &r
    }
}

impl<F: Float> CovarianceKernel<F> for Matern32<F> {
    fn dim(&self) -> usize {
        self.theta.len()
    }

    fn signal_variance(&self) -> F {
        self.signal_variance
    }

    fn length_scales(&self) -> &Array1<F> {
        &self.length_scales
    }

    /// ```text
    ///       d
    /// s2 * prod (1 + sqrt(3) * theta_j * |d_j|) * exp( - sqrt(3) * theta_j * |d_j| )
    ///      j=1
    /// ```
    fn value(&self, d: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F> {
        let sqrt3 = F::cast(3.).sqrt();
        d.map_axis(Axis(1), |d_i| {
            let mut a = F::one();
            let mut b = F::zero();
            Zip::from(&d_i).and(&self.theta).for_each(|d_ij, theta_j| {
                let v = sqrt3 * *theta_j * num_traits::Float::abs(*d_ij);
                a *= F::one() + v;
                b += v;
            });
            self.signal_variance * a * F::exp(-b)
        })
    }

    fn jacobian(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
        xtrain: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Array2<F> {
        let sqrt3 = F::cast(3.).sqrt();
        let three = F::cast(3.);
        let d = differences(x, xtrain);
        let r = self.value(&d);
        let mut jac = Array2::zeros(d.raw_dim());
        Zip::from(jac.rows_mut())
            .and(d.rows())
            .and(&r)
            .for_each(|mut jac_i, d_i, r_i| {
                Zip::from(&mut jac_i)
                    .and(&d_i)
                    .and(&self.theta)
                    .for_each(|jac_ij, d_ij, theta_j| {
                        let v = sqrt3 * *theta_j * num_traits::Float::abs(*d_ij);
                        *jac_ij = -three * *theta_j * *theta_j * *d_ij * *r_i / (F::one() + v);
                    });
            });
        jac
    }
}

impl<F: Float> CovarianceKernel<F> for Matern52<F> {
    fn dim(&self) -> usize {
        self.theta.len()
    }

    fn signal_variance(&self) -> F {
        self.signal_variance
    }

    fn length_scales(&self) -> &Array1<F> {
        &self.length_scales
    }

    /// ```text
    ///       d
    /// s2 * prod (1 + sqrt(5) * theta_j * |d_j| + 5/3 * theta_j^2 * d_j^2) * exp( - sqrt(5) * theta_j * |d_j| )
    ///      j=1
    /// ```
    fn value(&self, d: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F> {
        let sqrt5 = F::cast(5.).sqrt();
        let div5_3 = F::cast(5. / 3.);
        d.map_axis(Axis(1), |d_i| {
            let mut a = F::one();
            let mut b = F::zero();
            Zip::from(&d_i).and(&self.theta).for_each(|d_ij, theta_j| {
                let v = *theta_j * num_traits::Float::abs(*d_ij);
                a *= F::one() + sqrt5 * v + div5_3 * v * v;
                b += sqrt5 * v;
            });
            self.signal_variance * a * F::exp(-b)
        })
    }

    fn jacobian(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
        xtrain: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Array2<F> {
        let sqrt5 = F::cast(5.).sqrt();
        let div5_3 = F::cast(5. / 3.);
        let d = differences(x, xtrain);
        let r = self.value(&d);
        let mut jac = Array2::zeros(d.raw_dim());
        Zip::from(jac.rows_mut())
            .and(d.rows())
            .and(&r)
            .for_each(|mut jac_i, d_i, r_i| {
                Zip::from(&mut jac_i)
                    .and(&d_i)
                    .and(&self.theta)
                    .for_each(|jac_ij, d_ij, theta_j| {
                        let v = *theta_j * num_traits::Float::abs(*d_ij);
                        let a = F::one() + sqrt5 * v + div5_3 * v * v;
                        *jac_ij = -div5_3 * *theta_j * *theta_j * *d_ij * (F::one() + sqrt5 * v)
                            * *r_i
                            / a;
                    });
            });
        jac
    }
}

/// Kernel families available from a configuration value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum KernelKind {
    /// Squared exponential kernel
    #[default]
    #[cfg_attr(feature = "serializable", serde(alias = "square_exponential"))]
    SquaredExponential,
    /// Matern 3/2 kernel
    Matern32,
    /// Matern 5/2 kernel
    Matern52,
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KernelKind::SquaredExponential => write!(f, "SquaredExponential"),
            KernelKind::Matern32 => write!(f, "Matern32"),
            KernelKind::Matern52 => write!(f, "Matern52"),
        }
    }
}

/// A covariance kernel selected at runtime by its [`KernelKind`]
#[derive(Clone, Debug, PartialEq)]
pub enum Kernel<F: Float> {
    /// Squared exponential kernel
    SquaredExponential(SquaredExponential<F>),
    /// Matern 3/2 kernel
    Matern32(Matern32<F>),
    /// Matern 5/2 kernel
    Matern52(Matern52<F>),
}

impl<F: Float> Kernel<F> {
    /// Build a kernel of the given `kind` for `dim`-dimensional inputs
    /// from `[s2, l_1, ..., l_nx]` or `[s2, l]` hyperparameters
    pub fn new(kind: KernelKind, dim: usize, hyperparameters: &[F]) -> Result<Self> {
        Ok(match kind {
            KernelKind::SquaredExponential => Kernel::SquaredExponential(
                SquaredExponential::from_hyperparameters(dim, hyperparameters)?,
            ),
            KernelKind::Matern32 => {
                Kernel::Matern32(Matern32::from_hyperparameters(dim, hyperparameters)?)
            }
            KernelKind::Matern52 => {
                Kernel::Matern52(Matern52::from_hyperparameters(dim, hyperparameters)?)
            }
        })
    }

    /// Kind of the kernel
    pub fn kind(&self) -> KernelKind {
        match self {
            Kernel::SquaredExponential(_) => KernelKind::SquaredExponential,
            Kernel::Matern32(_) => KernelKind::Matern32,
            Kernel::Matern52(_) => KernelKind::Matern52,
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $k:ident => $e:expr) => {
        match $self {
            Kernel::SquaredExponential($k) => $e,
            Kernel::Matern32($k) => $e,
            Kernel::Matern52($k) => $e,
        }
    };
}

impl<F: Float> CovarianceKernel<F> for Kernel<F> {
    fn dim(&self) -> usize {
        dispatch!(self, k => k.dim())
    }

    fn signal_variance(&self) -> F {
        dispatch!(self, k => k.signal_variance())
    }

    fn length_scales(&self) -> &Array1<F> {
        dispatch!(self, k => k.length_scales())
    }

    fn value(&self, d: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F> {
        dispatch!(self, k => k.value(d))
    }

    fn jacobian(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
        xtrain: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Array2<F> {
        dispatch!(self, k => k.jacobian(x, xtrain))
    }
}

impl<F: Float> fmt::Display for Kernel<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        dispatch!(self, k => write!(f, "{k}"))
    }
}

/// Covariance matrix of `x` points (n, nx) against themselves, i.e. `[k(x_i, x_j)]`
pub(crate) fn gram_matrix<F: Float, K: CovarianceKernel<F>>(
    kernel: &K,
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Array2<F> {
    let n = x.nrows();
    let dx = pairwise_differences(x, x);
    let values = kernel.value(&dx);
    Array2::from_shape_fn((n, n), |(i, j)| values[i * n + j])
}
