use nalgebra::*;
use serde::{Serialize, Deserialize};
use std::collections::HashMap;

use crate::prob::Error;

/// A partially observed N x P data table. Rows are subjects, kept in
/// insertion order; columns are variables, optionally named. Column names
/// are resolved to integer positions once, here, and every downstream
/// consumer works on index sets: the imputation machinery never touches a
/// label again after construction.
///
/// Missing cells are carried in an explicit mask. A NaN cell in the input
/// is always treated as missing, whether or not a mask was supplied, so a
/// matrix loaded from a source that encodes gaps as NaN needs no separate
/// mask at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationMatrix {

    data : DMatrix<f64>,

    /// true marks a missing cell.
    mask : DMatrix<bool>,

    names : Vec<String>,

    /// Distinct missingness patterns, in order of first appearance.
    /// Fully observed rows belong to no pattern.
    patterns : Vec<MissingnessPattern>,

    /// Rows carrying at least one observed cell. Only these contribute to
    /// parameter estimation; rows outside the set still receive draws.
    est_rows : Vec<usize>,

}

impl ObservationMatrix {

    /// Builds the table from a numeric matrix, with NaN as the missing
    /// marker and unnamed columns.
    pub fn new(data : DMatrix<f64>) -> Result<Self, Error> {
        let mask = DMatrix::from_element(data.nrows(), data.ncols(), false);
        Self::build(data, mask, Vec::new())
    }

    /// Same as new, resolving an ordered list of column names.
    pub fn with_names(data : DMatrix<f64>, names : &[&str]) -> Result<Self, Error> {
        if names.len() != data.ncols() {
            return Err(Error::InvalidDimension { expected : data.ncols(), found : names.len() });
        }
        let mask = DMatrix::from_element(data.nrows(), data.ncols(), false);
        Self::build(data, mask, names.iter().map(|n| n.to_string()).collect())
    }

    /// Builds the table from a numeric matrix and an explicit missingness
    /// mask. NaN cells are folded into the mask.
    pub fn from_mask(data : DMatrix<f64>, mask : DMatrix<bool>) -> Result<Self, Error> {
        if mask.nrows() != data.nrows() || mask.ncols() != data.ncols() {
            return Err(Error::InvalidDimension { expected : data.ncols(), found : mask.ncols() });
        }
        Self::build(data, mask, Vec::new())
    }

    fn build(data : DMatrix<f64>, mut mask : DMatrix<bool>, names : Vec<String>) -> Result<Self, Error> {
        let (n, p) = data.shape();
        if p == 0 {
            return Err(Error::EmptyRow);
        }
        for i in 0..n {
            for j in 0..p {
                if data[(i, j)].is_nan() {
                    mask[(i, j)] = true;
                }
            }
        }

        // Group rows by identical missingness pattern, preserving the order
        // in which each pattern first appears.
        let mut patterns : Vec<MissingnessPattern> = Vec::new();
        let mut index : HashMap<Vec<usize>, usize> = HashMap::new();
        let mut est_rows = Vec::new();
        for i in 0..n {
            let missing : Vec<usize> = (0..p).filter(|j| mask[(i, *j)]).collect();
            if missing.len() < p {
                est_rows.push(i);
            }
            if missing.is_empty() {
                continue;
            }
            match index.get(&missing) {
                Some(k) => patterns[*k].rows.push(i),
                None => {
                    let observed = (0..p).filter(|j| !mask[(i, *j)]).collect();
                    index.insert(missing.clone(), patterns.len());
                    patterns.push(MissingnessPattern { missing, observed, rows : vec![i] });
                }
            }
        }
        Ok(Self { data, mask, names, patterns, est_rows })
    }

    /// Number of rows.
    pub fn n(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns.
    pub fn dim(&self) -> usize {
        self.data.ncols()
    }

    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }

    pub fn is_missing(&self, row : usize, col : usize) -> bool {
        self.mask[(row, col)]
    }

    pub fn n_missing(&self) -> usize {
        self.patterns.iter().map(|pat| pat.missing.len() * pat.rows.len()).sum()
    }

    pub fn fully_observed(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[MissingnessPattern] {
        &self.patterns
    }

    pub fn estimation_rows(&self) -> &[usize] {
        &self.est_rows
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Position of a named column, when names were supplied.
    pub fn position(&self, name : &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Mean of the observed cells of a column; None when the column has no
    /// observed cell at all.
    pub fn observed_column_mean(&self, col : usize) -> Option<f64> {
        let mut sum = 0.0;
        let mut count = 0;
        for i in 0..self.n() {
            if !self.mask[(i, col)] {
                sum += self.data[(i, col)];
                count += 1;
            }
        }
        if count > 0 { Some(sum / count as f64) } else { None }
    }

}

/// The set of column indices missing in a row, together with its
/// complement and the rows that share it. One conditional decomposition
/// serves every row of the pattern within a sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingnessPattern {

    missing : Vec<usize>,

    observed : Vec<usize>,

    rows : Vec<usize>,

}

impl MissingnessPattern {

    pub fn missing(&self) -> &[usize] {
        &self.missing
    }

    pub fn observed(&self) -> &[usize] {
        &self.observed
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    /// A pattern with every column missing. Rows under it are excluded
    /// from estimation and draw from the current marginal.
    pub fn is_unobserved(&self) -> bool {
        self.observed.is_empty()
    }

}
