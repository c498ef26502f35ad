use nalgebra::*;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Serialize, Deserialize};
use std::fmt::{self, Display};

use super::*;

/// Multivariate normal parametrized by μ (px1) and Σ (pxp). The covariance
/// is stored as supplied; factorizations are taken on demand, since the
/// typical consumer re-draws Σ at every Gibbs sweep and a cached factor
/// would be stale after one update.
///
/// Conditioning on an arbitrary subset of coordinates is the central
/// operation here: for a partition (m, o) of the indices, the distribution
/// of x_m given x_o is again normal, with mean
/// μ_m + Σ_mo Σ_oo⁻¹ (x_o − μ_o) and covariance Σ_mm − Σ_mo Σ_oo⁻¹ Σ_om.
/// The index sets are explicit argument slices, so the same joint draw can
/// be conditioned under many distinct patterns without relabeling columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiNormal {

    mu : DVector<f64>,

    sigma : DMatrix<f64>,

}

impl MultiNormal {

    /// Builds the distribution after validating that μ and Σ agree in
    /// dimension and that Σ is symmetric positive semi-definite.
    pub fn new(mu : DVector<f64>, sigma : DMatrix<f64>) -> Result<Self, Error> {
        let p = mu.nrows();
        if p == 0 {
            return Err(Error::EmptyRow);
        }
        if sigma.nrows() != p || sigma.ncols() != p {
            return Err(Error::InvalidDimension { expected : p, found : sigma.nrows() });
        }
        check_psd(&sigma)?;
        Ok(Self { mu, sigma })
    }

    /// Wraps a (mean, covariance) pair produced by a conjugate draw, whose
    /// validity is guaranteed by the sampler that produced it.
    pub(crate) fn from_draw(mu : DVector<f64>, sigma : DMatrix<f64>) -> Self {
        Self { mu, sigma }
    }

    pub fn dim(&self) -> usize {
        self.mu.nrows()
    }

    pub fn mean(&self) -> &DVector<f64> {
        &self.mu
    }

    pub fn cov(&self) -> &DMatrix<f64> {
        &self.sigma
    }

    /// Inverse of the covariance, via its Cholesky factor.
    pub fn precision(&self) -> Result<DMatrix<f64>, Error> {
        let cols : Vec<usize> = (0..self.dim()).collect();
        let mut prec = checked_cholesky(&self.sigma, &cols)?.inverse();
        symmetrize(&mut prec);
        Ok(prec)
    }

    /// Distribution of the coordinates listed in missing, conditional on
    /// the coordinates listed in observed. An empty observed set yields the
    /// marginal over the missing coordinates. Fails with SingularConditional
    /// when the observed block (or the resulting conditional covariance)
    /// cannot be factored.
    pub fn conditional(
        &self,
        observed : &[usize],
        missing : &[usize]
    ) -> Result<ConditionalNormal, Error> {
        let p = self.dim();
        for ix in observed.iter().chain(missing.iter()) {
            if *ix >= p {
                return Err(Error::InvalidDimension { expected : p, found : *ix });
            }
        }
        let mu_m = self.mu.select_rows(missing);
        if observed.is_empty() {
            let factor = checked_cholesky(&self.sigma, missing)?.l();
            return Ok(ConditionalNormal {
                base : mu_m,
                gain : DMatrix::zeros(missing.len(), 0),
                factor
            });
        }
        let mu_o = self.mu.select_rows(observed);
        let s_oo = self.sigma.select_rows(observed).select_columns(observed);
        let s_mo = self.sigma.select_rows(missing).select_columns(observed);
        let s_mm = self.sigma.select_rows(missing).select_columns(missing);
        let chol_oo = checked_cholesky(&s_oo, observed)?;

        // gain = Σ_mo Σ_oo⁻¹, taken as the solution of Σ_oo gainᵀ = Σ_om.
        let gain = chol_oo.solve(&s_mo.transpose()).transpose();
        let mut cond_cov = s_mm - &gain * s_mo.transpose();
        symmetrize(&mut cond_cov);
        let factor = checked_cholesky(&cond_cov, missing)?.l();
        let base = mu_m - &gain * mu_o;
        Ok(ConditionalNormal { base, gain, factor })
    }

    /// One draw from the joint distribution.
    pub fn sample<R>(&self, rng : &mut R) -> Result<DVector<f64>, Error>
    where
        R : Rng + ?Sized
    {
        let cols : Vec<usize> = (0..self.dim()).collect();
        let factor = checked_cholesky(&self.sigma, &cols)?.l();
        Ok(&self.mu + factor * standard_normal_vector(self.dim(), rng))
    }

}

impl Display for MultiNormal {

    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MNorm({})", self.mu.nrows())
    }

}

/// Result of MultiNormal::conditional: a Gaussian over the missing
/// coordinates whose mean is an affine function of the observed values.
/// The factorization work is done once at construction, so conditioning a
/// whole block of rows sharing the same pattern costs one triangular solve
/// per row rather than one per cell.
#[derive(Debug, Clone)]
pub struct ConditionalNormal {

    /// μ_m − gain μ_o
    base : DVector<f64>,

    /// Σ_mo Σ_oo⁻¹
    gain : DMatrix<f64>,

    /// Lower Cholesky factor of the conditional covariance.
    factor : DMatrix<f64>,

}

impl ConditionalNormal {

    pub fn dim(&self) -> usize {
        self.base.nrows()
    }

    /// Conditional mean given the observed values, in pattern order.
    pub fn mean_given(&self, x_obs : &DVector<f64>) -> DVector<f64> {
        &self.base + &self.gain * x_obs
    }

    /// One draw of the missing coordinates given the observed values.
    pub fn sample_given<R>(&self, x_obs : &DVector<f64>, rng : &mut R) -> DVector<f64>
    where
        R : Rng + ?Sized
    {
        self.mean_given(x_obs) + &self.factor * standard_normal_vector(self.dim(), rng)
    }

    /// Conditional covariance, rebuilt from its factor.
    pub fn cov(&self) -> DMatrix<f64> {
        &self.factor * self.factor.transpose()
    }

}

pub(crate) fn standard_normal_vector<R>(n : usize, rng : &mut R) -> DVector<f64>
where
    R : Rng + ?Sized
{
    DVector::from_iterator(n, (0..n).map(|_| rng.sample(StandardNormal)))
}
