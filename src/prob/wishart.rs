use nalgebra::*;
use rand::Rng;
use rand_distr::{ChiSquared, StandardNormal};
use serde::{Serialize, Deserialize};
use std::fmt::{self, Display};

use super::*;

/// Inverse-Wishart distribution over covariance matrices, parametrized by a
/// symmetric positive semi-definite scale matrix S (pxp) and degrees of
/// freedom ν > p - 1. When used as the conjugate prior for the covariance
/// of a multivariate normal, the posterior after observing n centered rows
/// with scatter matrix G is again inverse-Wishart with scale S + G and
/// degrees of freedom ν + n, which is how the Gibbs parameter step builds
/// its covariance draw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InverseWishart {

    scale : DMatrix<f64>,

    df : f64,

}

impl InverseWishart {

    /// Validates the scale matrix and the degrees of freedom. Degrees of
    /// freedom at or below p - 1 leave the density improper, which is
    /// rejected here rather than discovered as a failed chi-square draw
    /// deep inside a sweep.
    pub fn new(scale : DMatrix<f64>, df : f64) -> Result<Self, Error> {
        let p = scale.nrows();
        if p == 0 {
            return Err(Error::EmptyRow);
        }
        check_psd(&scale)?;
        if !(df > (p - 1) as f64) {
            return Err(Error::InvalidDimension { expected : p, found : df.max(0.0).floor() as usize });
        }
        Ok(Self { scale, df })
    }

    /// Conjugate update of a validated prior: scatter is an empirical
    /// cross-product matrix, so the sum stays symmetric positive
    /// semi-definite and the eigenvalue check is not repeated.
    pub(crate) fn posterior(prior_scale : &DMatrix<f64>, scatter : DMatrix<f64>, df : f64) -> Self {
        Self { scale : prior_scale + scatter, df }
    }

    pub fn dim(&self) -> usize {
        self.scale.nrows()
    }

    pub fn scale(&self) -> &DMatrix<f64> {
        &self.scale
    }

    pub fn df(&self) -> f64 {
        self.df
    }

    /// One covariance draw, by the Bartlett decomposition: with
    /// S⁻¹ = L Lᵀ and T lower triangular holding square roots of
    /// chi-square draws on the diagonal and standard normals below it,
    /// (L T)(L T)ᵀ is Wishart(ν, S⁻¹) and its inverse is the desired
    /// inverse-Wishart(ν, S) realization. The returned matrix is exactly
    /// symmetric.
    pub fn sample<R>(&self, rng : &mut R) -> Result<DMatrix<f64>, Error>
    where
        R : Rng + ?Sized
    {
        use rand_distr::Distribution;
        let p = self.dim();
        let cols : Vec<usize> = (0..p).collect();
        let mut s_inv = checked_cholesky(&self.scale, &cols)?.inverse();
        symmetrize(&mut s_inv);
        let l = checked_cholesky(&s_inv, &cols)?.l();
        let mut t = DMatrix::zeros(p, p);
        for i in 0..p {
            // df - i stays positive for i < p, by the construction check.
            let chi = ChiSquared::new(self.df - i as f64)
                .map_err(|_| Error::InvalidDimension { expected : p, found : i })?;
            t[(i, i)] = chi.sample(rng).sqrt();
            for j in 0..i {
                t[(i, j)] = rng.sample(StandardNormal);
            }
        }
        let m = l * t;
        let w = &m * m.transpose();
        let mut sigma = checked_cholesky(&w, &cols)?.inverse();
        symmetrize(&mut sigma);
        Ok(sigma)
    }

}

impl Display for InverseWishart {

    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InvWish({}, {})", self.dim(), self.df)
    }

}
