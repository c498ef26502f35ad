use nalgebra::DMatrix;
use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::prob::Error;
use super::GaussianImputer;

/// Pooled result of analyses carried over several completed datasets. The
/// standard error combines the average within-imputation variance with the
/// spread of the point estimates across imputations, so uncertainty about
/// the missing cells widens the interval instead of vanishing into a
/// single filled-in table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PooledEstimate {

    estimate : f64,

    std_err : f64,

    /// Reference degrees of freedom for interval construction; infinite
    /// when the estimates did not vary across imputations.
    df : f64,

    /// Share of the total variance attributable to missingness.
    frac_missing : f64,

    n_imputations : usize,

}

impl PooledEstimate {

    pub fn estimate(&self) -> f64 {
        self.estimate
    }

    pub fn std_err(&self) -> f64 {
        self.std_err
    }

    pub fn df(&self) -> f64 {
        self.df
    }

    pub fn frac_missing(&self) -> f64 {
        self.frac_missing
    }

    pub fn n_imputations(&self) -> usize {
        self.n_imputations
    }

}

/// Combines one (point estimate, standard error) pair per completed
/// imputation: pooled point estimate q̄ = mean of the estimates; pooled
/// variance T = W + (1 + 1/m) B, with W the mean squared standard error
/// and B the sample variance of the estimates; reference degrees of
/// freedom (m - 1)(1 + W / ((1 + 1/m) B))². At least two pairs are
/// required, since B is undefined for one.
pub fn pool(draws : &[(f64, f64)]) -> Result<PooledEstimate, Error> {
    let m = draws.len();
    if m < 2 {
        return Err(Error::InvalidDimension { expected : 2, found : m });
    }
    let mf = m as f64;
    let qbar = draws.iter().map(|d| d.0).sum::<f64>() / mf;
    let within = draws.iter().map(|d| d.1 * d.1).sum::<f64>() / mf;
    let between = draws.iter().map(|d| (d.0 - qbar).powi(2)).sum::<f64>() / (mf - 1.0);
    let total = within + (1.0 + 1.0 / mf) * between;
    let df = if between > 0.0 && within > 0.0 {
        let r = (1.0 + 1.0 / mf) * between / within;
        (mf - 1.0) * (1.0 + 1.0 / r).powi(2)
    } else {
        f64::INFINITY
    };
    let frac_missing = if total > 0.0 {
        (1.0 + 1.0 / mf) * between / total
    } else {
        0.0
    };
    Ok(PooledEstimate {
        estimate : qbar,
        std_err : total.sqrt(),
        df,
        frac_missing,
        n_imputations : m
    })
}

/// Schedule for a multiple-imputation run: a warm-up stretch of sweeps
/// discarded once, then one completed dataset kept every skip sweeps until
/// n_imputations analyses have been collected. Consecutive sweeps are
/// correlated, so skip trades run time for independence between the
/// retained datasets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultipleImputation {

    pub burn : usize,

    pub skip : usize,

    pub n_imputations : usize,

}

impl Default for MultipleImputation {

    fn default() -> Self {
        Self { burn : 100, skip : 10, n_imputations : 20 }
    }

}

impl MultipleImputation {

    pub fn new(n_imputations : usize) -> Self {
        Self { n_imputations, ..Default::default() }
    }

    /// Drives the imputer through the schedule, hands each retained
    /// completed matrix to the analysis closure, and pools the resulting
    /// (estimate, standard error) pairs. A skip of zero is promoted to
    /// one, so two analyses never see the same sweep.
    pub fn run<R, F>(
        &self,
        imputer : &mut GaussianImputer,
        rng : &mut R,
        mut analyze : F
    ) -> Result<PooledEstimate, anyhow::Error>
    where
        R : Rng + ?Sized,
        F : FnMut(&DMatrix<f64>) -> Result<(f64, f64), anyhow::Error>
    {
        for _ in 0..self.burn {
            imputer.update(rng)?;
        }
        let mut draws = Vec::with_capacity(self.n_imputations);
        for _ in 0..self.n_imputations {
            for _ in 0..self.skip.max(1) {
                imputer.update(rng)?;
            }
            draws.push(analyze(imputer.imputed())?);
        }
        Ok(pool(&draws)?)
    }

}
