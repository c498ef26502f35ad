/// Probability distributions backing the sampler (multivariate normal
/// conditioning and inverse-Wishart draws) and the error types shared
/// across the crate.
pub mod prob;

/// Partially observed data matrices and the missingness patterns
/// derived from them.
pub mod sample;

/// Gibbs sampling engine for Bayesian Gaussian imputation, and combining
/// rules to pool analyses carried over completed datasets.
pub mod fit;

/// Running summaries of scalar statistics derived from posterior draws.
pub mod calc;

pub use prob::Error;
