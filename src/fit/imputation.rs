use nalgebra::*;
use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::prob::*;
use crate::sample::ObservationMatrix;

/// Conjugate priors held constant over a run: a Gaussian prior on the mean
/// vector, with location m0 and covariance Λ0, and an inverse-Wishart-like
/// prior on the covariance matrix, with scale S0 and degrees of freedom ν0.
/// The precision Λ0⁻¹ and the scaled location Λ0⁻¹ m0 enter every mean
/// update, so both are computed once here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorParameters {

    mean_loc : DVector<f64>,

    mean_cov : DMatrix<f64>,

    cov_scale : DMatrix<f64>,

    cov_df : f64,

    mean_prec : DMatrix<f64>,

    scaled_loc : DVector<f64>,

}

impl PriorParameters {

    /// Validates shapes against the length of the mean location, positive
    /// semi-definiteness of both covariance parameters, and invertibility
    /// of the mean prior covariance (its precision appears in the
    /// conjugate mean update, so a degenerate Λ0 is rejected up front).
    pub fn new(
        mean_loc : DVector<f64>,
        mean_cov : DMatrix<f64>,
        cov_scale : DMatrix<f64>,
        cov_df : f64
    ) -> Result<Self, Error> {
        let p = mean_loc.nrows();
        if p == 0 {
            return Err(Error::EmptyRow);
        }
        if mean_cov.nrows() != p || mean_cov.ncols() != p {
            return Err(Error::InvalidDimension { expected : p, found : mean_cov.nrows() });
        }
        if cov_scale.nrows() != p || cov_scale.ncols() != p {
            return Err(Error::InvalidDimension { expected : p, found : cov_scale.nrows() });
        }
        if !(cov_df.is_finite() && cov_df > 0.0) {
            return Err(Error::InvalidDimension { expected : p, found : cov_df.max(0.0).floor() as usize });
        }
        check_psd(&mean_cov)?;
        check_psd(&cov_scale)?;
        let cols : Vec<usize> = (0..p).collect();
        let mut mean_prec = checked_cholesky(&mean_cov, &cols)
            .map_err(|_| Error::NonPositiveDefinite { min_eig : 0.0 })?
            .inverse();
        symmetrize(&mut mean_prec);
        let scaled_loc = &mean_prec * &mean_loc;
        Ok(Self { mean_loc, mean_cov, cov_scale, cov_df, mean_prec, scaled_loc })
    }

    /// Weakly informative default: zero location, identity covariances,
    /// one prior degree of freedom.
    pub fn vague(p : usize) -> Result<Self, Error> {
        Self::new(DVector::zeros(p), DMatrix::identity(p, p), DMatrix::identity(p, p), 1.0)
    }

    pub fn dim(&self) -> usize {
        self.mean_loc.nrows()
    }

    pub fn mean_loc(&self) -> &DVector<f64> {
        &self.mean_loc
    }

    pub fn mean_cov(&self) -> &DMatrix<f64> {
        &self.mean_cov
    }

    pub fn cov_scale(&self) -> &DMatrix<f64> {
        &self.cov_scale
    }

    pub fn cov_df(&self) -> f64 {
        self.cov_df
    }

}

/// Gibbs sampler over (mean, covariance, missing values) of a partially
/// observed Gaussian data matrix.
///
/// The sampler owns three pieces of state: the observations (fixed at
/// construction), the completed matrix (observed cells never change;
/// missing cells are overwritten by every sweep), and the current
/// (mean, covariance) draw. Each call to update is one transition of a
/// Markov chain whose stationary distribution is the joint posterior, so a
/// caller wanting independent-looking completed datasets discards an
/// initial run of sweeps and then keeps one sweep in every few.
///
/// Rows with no observed cell never enter the likelihood; their cells are
/// redrawn each sweep from the current marginal, which is informed by the
/// prior and by the rest of the data only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianImputer {

    obs : ObservationMatrix,

    prior : PriorParameters,

    /// Latest (mean, covariance) draw; the conditioning state for the next
    /// impute step.
    state : MultiNormal,

    /// The data matrix with missing cells filled by the latest draw.
    completed : DMatrix<f64>,

}

impl GaussianImputer {

    /// Checks the priors against the data dimension and initializes the
    /// chain: missing cells start at their column's observed mean (at the
    /// prior location when a column has no observed cell), and the
    /// covariance starts at the identity. The starting fill only matters
    /// during burn-in.
    pub fn new(obs : ObservationMatrix, prior : PriorParameters) -> Result<Self, Error> {
        let p = obs.dim();
        if prior.dim() != p {
            return Err(Error::InvalidDimension { expected : p, found : prior.dim() });
        }
        let n_eff = obs.estimation_rows().len();

        // The covariance draw needs ν0 + n > p - 1 to stay proper.
        if !(n_eff as f64 + prior.cov_df > (p - 1) as f64) {
            return Err(Error::InvalidDimension { expected : p, found : n_eff });
        }
        let mut init_mean = DVector::zeros(p);
        for j in 0..p {
            init_mean[j] = obs.observed_column_mean(j).unwrap_or(prior.mean_loc[j]);
        }
        let mut completed = obs.data().clone();
        for pat in obs.patterns() {
            for &i in pat.rows() {
                for &j in pat.missing() {
                    completed[(i, j)] = init_mean[j];
                }
            }
        }
        let state = MultiNormal::from_draw(init_mean, DMatrix::identity(p, p));
        Ok(Self { obs, prior, state, completed })
    }

    /// One Gibbs sweep: redraw every missing cell conditional on the
    /// current (mean, covariance), then redraw the covariance and the mean
    /// conditional on the completed data. After a successful return the
    /// completed matrix has no missing cell and the stored state is one
    /// draw from the joint posterior chain.
    ///
    /// A failure leaves no partially applied parameter draw behind: the
    /// sweep is abandoned at the failing factorization and the error is
    /// returned as is.
    pub fn update<R>(&mut self, rng : &mut R) -> Result<(), Error>
    where
        R : Rng + ?Sized
    {
        self.impute_step(rng)?;
        self.draw_cov(rng)?;
        self.draw_mean(rng)?;
        Ok(())
    }

    /// Redraws missing cells pattern by pattern. The conditional
    /// decomposition is shared by all rows of a pattern; only the observed
    /// values (and the draws) differ across rows.
    fn impute_step<R>(&mut self, rng : &mut R) -> Result<(), Error>
    where
        R : Rng + ?Sized
    {
        for pat in self.obs.patterns() {
            let cond = self.state.conditional(pat.observed(), pat.missing())?;
            for &i in pat.rows() {
                let x_obs = DVector::from_iterator(
                    pat.observed().len(),
                    pat.observed().iter().map(|&j| self.completed[(i, j)])
                );
                let draw = cond.sample_given(&x_obs, rng);
                for (k, &j) in pat.missing().iter().enumerate() {
                    self.completed[(i, j)] = draw[k];
                }
            }
        }
        Ok(())
    }

    /// Inverse-Wishart conjugate draw: prior scale plus the scatter of the
    /// completed estimation rows around the current mean, with ν0 + n
    /// degrees of freedom.
    fn draw_cov<R>(&mut self, rng : &mut R) -> Result<(), Error>
    where
        R : Rng + ?Sized
    {
        let p = self.obs.dim();
        let mu = self.state.mean().clone();
        let mut scatter = DMatrix::zeros(p, p);
        for &i in self.obs.estimation_rows() {
            let r = self.completed.row(i).transpose() - &mu;
            scatter += &r * r.transpose();
        }
        let df = self.obs.estimation_rows().len() as f64 + self.prior.cov_df;
        let iw = InverseWishart::posterior(&self.prior.cov_scale, scatter, df);
        let sigma = iw.sample(rng)?;
        self.state = MultiNormal::from_draw(mu, sigma);
        Ok(())
    }

    /// Gaussian conjugate draw of the mean given the covariance just
    /// drawn: posterior precision Λ0⁻¹ + n Σ⁻¹, posterior location
    /// weighted between the prior location and the completed-data sum.
    fn draw_mean<R>(&mut self, rng : &mut R) -> Result<(), Error>
    where
        R : Rng + ?Sized
    {
        let p = self.obs.dim();
        let prec = self.state.precision()?;
        let n_eff = self.obs.estimation_rows().len() as f64;
        let mut sum = DVector::zeros(p);
        for &i in self.obs.estimation_rows() {
            sum += self.completed.row(i).transpose();
        }
        let lambda = &self.prior.mean_prec + &prec * n_eff;
        let cols : Vec<usize> = (0..p).collect();
        let mut post_cov = checked_cholesky(&lambda, &cols)?.inverse();
        symmetrize(&mut post_cov);
        let post_loc = &post_cov * (&self.prior.scaled_loc + &prec * sum);
        let factor = checked_cholesky(&post_cov, &cols)?.l();
        let mean = post_loc + factor * standard_normal_vector(p, rng);
        self.state = MultiNormal::from_draw(mean, self.state.cov().clone());
        Ok(())
    }

    /// Current mean draw.
    pub fn mean(&self) -> &DVector<f64> {
        self.state.mean()
    }

    /// Current covariance draw.
    pub fn cov(&self) -> &DMatrix<f64> {
        self.state.cov()
    }

    /// Current (mean, covariance) draw as a distribution.
    pub fn state(&self) -> &MultiNormal {
        &self.state
    }

    /// The data matrix with missing cells filled by the latest sweep.
    pub fn imputed(&self) -> &DMatrix<f64> {
        &self.completed
    }

    pub fn observations(&self) -> &ObservationMatrix {
        &self.obs
    }

    pub fn prior(&self) -> &PriorParameters {
        &self.prior
    }

}
