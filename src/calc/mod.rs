use num_traits::Float;
use serde::{Serialize, Deserialize};

/// Online mean and variance of a stream of scalar draws, by Welford's
/// update. The typical stream is a derived statistic read off each
/// posterior draw (a correlation from the covariance, a single mean
/// coordinate), accumulated across sweeps without storing the draws.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunningSummary<T> {

    n : usize,

    count : T,

    mean : T,

    m2 : T,

}

impl<T : Float> RunningSummary<T> {

    pub fn new() -> Self {
        Self { n : 0, count : T::zero(), mean : T::zero(), m2 : T::zero() }
    }

    pub fn push(&mut self, x : T) {
        self.n += 1;
        self.count = self.count + T::one();
        let delta = x - self.mean;
        self.mean = self.mean + delta / self.count;
        let delta2 = x - self.mean;
        self.m2 = self.m2 + delta * delta2;
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn mean(&self) -> Option<T> {
        if self.n > 0 { Some(self.mean) } else { None }
    }

    /// Sample variance (n - 1 divisor); None below two draws.
    pub fn variance(&self) -> Option<T> {
        if self.n > 1 { Some(self.m2 / (self.count - T::one())) } else { None }
    }

    pub fn stddev(&self) -> Option<T> {
        self.variance().map(|v| v.sqrt())
    }

}

impl<T : Float> Default for RunningSummary<T> {

    fn default() -> Self {
        Self::new()
    }

}

impl<T : Float> Extend<T> for RunningSummary<T> {

    fn extend<I : IntoIterator<Item = T>>(&mut self, iter : I) {
        for x in iter {
            self.push(x);
        }
    }

}
