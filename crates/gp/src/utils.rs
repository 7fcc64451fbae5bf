use crate::errors::{GpError, Result};
use linfa::Float;
use linfa_linalg::{cholesky::*, eigh::*};
use log::{debug, warn};
use ndarray::{Array2, ArrayBase, Data, Ix1, Ix2};

/// Computes differences between each element of x and each element of y
/// resulting in a 2d array of shape (nrows(x) * nrows(y), ncols(x));
/// *Panics* if x and y have not the same column numbers
pub fn pairwise_differences<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    y: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Array2<F> {
    assert!(x.ncols() == y.ncols());

    let nx = x.nrows();
    let ny = y.nrows();
    let ncols = x.ncols();
    let mut result = Array2::zeros((nx * ny, ncols));

    for (i, x_row) in x.rows().into_iter().enumerate() {
        for (j, y_row) in y.rows().into_iter().enumerate() {
            let idx = i * ny + j;
            for k in 0..ncols {
                result[[idx, k]] = x_row[k] - y_row[k];
            }
        }
    }

    result
}

/// Computes differences between x and each element of y
/// resulting in a 2d array of shape (nrows(y), ncols(x));
/// *Panics* if x and y have not the same number of components
pub fn differences<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix1>,
    y: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Array2<F> {
    assert!(x.len() == y.ncols());
    x.to_owned() - y
}

/// Lower Cholesky factor of a symmetric positive definite matrix `a`.
///
/// When the plain factorization fails, a diagonal jitter starting at `nugget` times
/// the mean diagonal magnitude is added and grown tenfold at each of the `max_attempts` trials.
/// Returns the factor together with the jitter actually added (zero when none was needed).
pub fn regularized_cholesky<F: Float>(
    a: &ArrayBase<impl Data<Elem = F>, Ix2>,
    nugget: F,
    max_attempts: usize,
) -> Result<(Array2<F>, F)> {
    if let Some(l) = checked_cholesky(a) {
        return Ok((l, F::zero()));
    }
    let n = a.nrows();
    let scale = if n > 0 {
        a.diag()
            .fold(F::zero(), |acc, v| acc + num_traits::Float::abs(*v))
            / F::cast(n)
    } else {
        F::one()
    };
    let scale = if scale > F::zero() { scale } else { F::one() };
    let mut jitter = nugget * scale;
    for attempt in 1..=max_attempts {
        let mut reg = a.to_owned();
        reg.diag_mut().mapv_inplace(|v| v + jitter);
        if let Some(l) = checked_cholesky(&reg) {
            warn!("Covariance matrix regularized with jitter {jitter} (attempt {attempt})");
            return Ok((l, jitter));
        }
        debug!("Cholesky failed with jitter {jitter}");
        jitter *= F::cast(10.);
    }
    Err(GpError::NumericalInstability(format!(
        "Cholesky decomposition of the ({n}, {n}) covariance matrix failed after {max_attempts} regularization attempts"
    )))
}

fn checked_cholesky<F: Float>(a: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Option<Array2<F>> {
    match a.cholesky() {
        Ok(l) if l.iter().all(|v| v.is_finite()) && l.diag().iter().all(|v| *v > F::zero()) => {
            Some(l)
        }
        _ => None,
    }
}

/// Compute a matrix `C` such that `C C^t` approximates the given covariance matrix `cov`.
///
/// Cholesky decomposition (with jitter) is tried first, eigenvalues decomposition is used
/// as fallback with negative eigenvalues lower bounded at zero.
pub fn covariance_factor<F: Float>(
    cov: &Array2<F>,
    nugget: F,
    max_attempts: usize,
) -> Result<Array2<F>> {
    match regularized_cholesky(cov, nugget, max_attempts) {
        Ok((l, _)) => Ok(l),
        Err(_) => {
            warn!("Fallback to eigen decomposition to factorize covariance matrix");
            let (v, w) = cov.to_owned().eigh_into()?;
            let v = v.mapv(|x| {
                // We lower bound the float value at 1e-9
                if x < F::cast(1e-9) {
                    return F::zero();
                }
                x.sqrt()
            });
            let d = Array2::from_diag(&v);
            Ok(w.dot(&d))
        }
    }
}
