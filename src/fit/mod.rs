mod imputation;

pub use imputation::*;

mod combine;

pub use combine::*;
