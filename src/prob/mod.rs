use nalgebra::*;
use thiserror::Error;

mod multinormal;

pub use multinormal::*;

mod wishart;

pub use wishart::*;

/// Failures surfaced by construction or by a Gibbs sweep. All of them are
/// deterministic given the data and the priors, so none is retried
/// internally: the caller decides whether to adjust the priors or reject
/// the dataset.
#[derive(Debug, Clone, Error)]
pub enum Error {

    /// A prior or data structure disagrees with the column dimension
    /// established at construction.
    #[error("incompatible dimension (expected {expected}, found {found})")]
    InvalidDimension { expected : usize, found : usize },

    /// A covariance parameter failed its symmetry or eigenvalue check.
    #[error("matrix is not positive semi-definite (minimum eigenvalue {min_eig:e})")]
    NonPositiveDefinite { min_eig : f64 },

    /// The covariance block over the informed columns cannot be factored,
    /// so the conditional distribution over the remaining columns is
    /// degenerate.
    #[error("singular conditional covariance over columns {columns:?}")]
    SingularConditional { columns : Vec<usize> },

    /// A data matrix whose rows have no columns at all.
    #[error("observation rows have zero columns")]
    EmptyRow,

}

/// Relative bound below which an eigenvalue or Cholesky pivot is treated
/// as zero. A covariance block is declared singular when its smallest
/// pivot falls below this fraction of the largest one.
pub const SINGULARITY_TOL : f64 = 1e-10;

/// Verifies that the argument is square, symmetric up to rounding, and has
/// no eigenvalue below -SINGULARITY_TOL relative to the spectral radius.
/// Asymmetric input is reported through the same error as an indefinite
/// one, since both violate the covariance contract.
pub(crate) fn check_psd(m : &DMatrix<f64>) -> Result<(), Error> {
    let n = m.nrows();
    if n != m.ncols() {
        return Err(Error::InvalidDimension { expected : n, found : m.ncols() });
    }
    let scale = m.amax().max(1.0);
    for i in 0..n {
        for j in (i+1)..n {
            if (m[(i, j)] - m[(j, i)]).abs() > SINGULARITY_TOL * scale {
                return Err(Error::NonPositiveDefinite { min_eig : f64::NEG_INFINITY });
            }
        }
    }
    let eigen = SymmetricEigen::new(m.clone());
    let min_eig = eigen.eigenvalues.min();
    let max_eig = eigen.eigenvalues.max().max(0.0);
    if min_eig < -SINGULARITY_TOL * max_eig.max(1.0) {
        return Err(Error::NonPositiveDefinite { min_eig });
    }
    Ok(())
}

/// Cholesky factorization that refuses nearly singular input instead of
/// returning a factor contaminated by rounding. The columns argument names
/// the variables the block ranges over, so the error can be traced back to
/// a missingness pattern.
pub(crate) fn checked_cholesky(
    m : &DMatrix<f64>,
    columns : &[usize]
) -> Result<Cholesky<f64, Dynamic>, Error> {
    let chol = Cholesky::new(m.clone())
        .ok_or(Error::SingularConditional { columns : columns.to_vec() })?;
    let diag = chol.l_dirty().diagonal();
    let max_piv = diag.max();
    let min_piv = diag.min();
    if !min_piv.is_finite() || min_piv <= SINGULARITY_TOL * max_piv {
        return Err(Error::SingularConditional { columns : columns.to_vec() });
    }
    Ok(chol)
}

/// Averages a matrix with its transpose. Draws and inverses accumulate
/// asymmetries of rounding order; downstream factorizations expect exact
/// symmetry.
pub(crate) fn symmetrize(m : &mut DMatrix<f64>) {
    let mt = m.transpose();
    *m += mt;
    *m *= 0.5;
}
