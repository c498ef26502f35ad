use nalgebra::*;
use rand::prelude::*;
use rand_distr::StandardNormal;

use gaussmi::calc::RunningSummary;
use gaussmi::fit::{GaussianImputer, MultipleImputation, PriorParameters};
use gaussmi::sample::ObservationMatrix;
use gaussmi::Error;

const EPS : f64 = 1e-12;

/// n draws from a bivariate normal with unit variances, the informed
/// means and correlation rho.
fn correlated_pairs<R : Rng>(n : usize, means : (f64, f64), rho : f64, rng : &mut R) -> DMatrix<f64> {
    let mut data = DMatrix::zeros(n, 2);
    for i in 0..n {
        let z1 : f64 = rng.sample(StandardNormal);
        let z2 : f64 = rng.sample(StandardNormal);
        data[(i, 0)] = means.0 + z1;
        data[(i, 1)] = means.1 + rho * z1 + (1.0 - rho * rho).sqrt() * z2;
    }
    data
}

#[test]
fn fully_observed_data_is_left_untouched() {
    let mut rng = StdRng::seed_from_u64(1);
    let data = correlated_pairs(10, (0.0, 0.0), 0.5, &mut rng);
    let obs = ObservationMatrix::new(data.clone()).unwrap();
    let prior = PriorParameters::vague(2).unwrap();
    let mut imp = GaussianImputer::new(obs, prior).unwrap();
    for _ in 0..25 {
        imp.update(&mut rng).unwrap();
        assert_eq!(*imp.imputed(), data);
    }
}

#[test]
fn posterior_draws_concentrate_on_the_sample_moments() {
    let mut rng = StdRng::seed_from_u64(2);
    let n = 300;
    let data = correlated_pairs(n, (0.0, 0.0), 0.6, &mut rng);
    let obs = ObservationMatrix::new(data.clone()).unwrap();
    let prior = PriorParameters::vague(2).unwrap();
    let mut imp = GaussianImputer::new(obs, prior).unwrap();
    for _ in 0..100 {
        imp.update(&mut rng).unwrap();
    }
    let n_draws = 1500;
    let mut mean_acc = DVector::zeros(2);
    let mut cov_acc = DMatrix::zeros(2, 2);
    for _ in 0..n_draws {
        imp.update(&mut rng).unwrap();
        mean_acc += imp.mean();
        cov_acc += imp.cov();
    }
    mean_acc /= n_draws as f64;
    cov_acc /= n_draws as f64;

    let sample_mean = data.row_sum().transpose() / n as f64;
    let mut sample_cov = DMatrix::zeros(2, 2);
    for i in 0..n {
        let r = data.row(i).transpose() - &sample_mean;
        sample_cov += &r * r.transpose();
    }
    sample_cov /= n as f64;

    for j in 0..2 {
        assert!((mean_acc[j] - sample_mean[j]).abs() < 0.05);
    }
    for i in 0..2 {
        for j in 0..2 {
            assert!((cov_acc[(i, j)] - sample_cov[(i, j)]).abs() < 0.08);
        }
    }
}

#[test]
fn one_missing_cell_is_filled_and_nothing_else_moves() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut data = correlated_pairs(10, (1.0, -1.0), 0.4, &mut rng);
    data[(2, 1)] = f64::NAN;
    let reference = data.clone();
    let obs = ObservationMatrix::new(data).unwrap();
    let prior = PriorParameters::vague(2).unwrap();
    let mut imp = GaussianImputer::new(obs, prior).unwrap();
    imp.update(&mut rng).unwrap();
    assert!(imp.imputed()[(2, 1)].is_finite());
    for i in 0..10 {
        for j in 0..2 {
            if (i, j) != (2, 1) {
                assert!((imp.imputed()[(i, j)] - reference[(i, j)]).abs() < EPS);
            }
        }
    }
}

#[test]
fn a_fully_missing_row_still_receives_draws() {
    let mut rng = StdRng::seed_from_u64(4);
    let mut data = correlated_pairs(6, (0.0, 0.0), 0.3, &mut rng);
    data[(4, 0)] = f64::NAN;
    data[(4, 1)] = f64::NAN;
    let obs = ObservationMatrix::new(data).unwrap();
    assert_eq!(obs.estimation_rows().len(), 5);
    let prior = PriorParameters::vague(2).unwrap();
    let mut imp = GaussianImputer::new(obs, prior).unwrap();
    imp.update(&mut rng).unwrap();
    assert!(imp.imputed()[(4, 0)].is_finite());
    assert!(imp.imputed()[(4, 1)].is_finite());
}

#[test]
fn shape_is_preserved_and_draws_stay_well_formed() {
    let mut rng = StdRng::seed_from_u64(5);
    let n = 30;
    let mut data = DMatrix::zeros(n, 3);
    for i in 0..n {
        let z1 : f64 = rng.sample(StandardNormal);
        let z2 : f64 = rng.sample(StandardNormal);
        let z3 : f64 = rng.sample(StandardNormal);
        data[(i, 0)] = z1;
        data[(i, 1)] = 0.5 * z1 + z2;
        data[(i, 2)] = 0.2 * z1 - 0.4 * z2 + z3;
    }
    for i in 0..n {
        for j in 0..3 {
            if rng.gen::<f64>() < 0.2 {
                data[(i, j)] = f64::NAN;
            }
        }
    }
    let obs = ObservationMatrix::new(data).unwrap();
    let prior = PriorParameters::vague(3).unwrap();
    let mut imp = GaussianImputer::new(obs, prior).unwrap();
    for _ in 0..50 {
        imp.update(&mut rng).unwrap();
        let completed = imp.imputed();
        assert_eq!(completed.shape(), (n, 3));
        assert!(completed.iter().all(|x| x.is_finite()));
        let cov = imp.cov();
        for i in 0..3 {
            for j in 0..3 {
                assert!((cov[(i, j)] - cov[(j, i)]).abs() < EPS);
            }
        }
        let min_eig = SymmetricEigen::new(cov.clone()).eigenvalues.min();
        assert!(min_eig > -1e-8);
    }
}

#[test]
fn seeded_runs_reproduce_the_same_chain() {
    let mut gen_rng = StdRng::seed_from_u64(6);
    let mut data = correlated_pairs(20, (0.0, 2.0), 0.5, &mut gen_rng);
    for i in (0..20).step_by(3) {
        data[(i, 1)] = f64::NAN;
    }
    let obs = ObservationMatrix::new(data).unwrap();
    let prior = PriorParameters::vague(2).unwrap();
    let mut a = GaussianImputer::new(obs.clone(), prior.clone()).unwrap();
    let mut b = GaussianImputer::new(obs, prior).unwrap();
    let mut ra = StdRng::seed_from_u64(99);
    let mut rb = StdRng::seed_from_u64(99);
    for _ in 0..20 {
        a.update(&mut ra).unwrap();
        b.update(&mut rb).unwrap();
        assert_eq!(a.mean(), b.mean());
        assert_eq!(a.cov(), b.cov());
        assert_eq!(a.imputed(), b.imputed());
    }
}

#[test]
fn a_never_observed_column_follows_the_prior() {
    let mut rng = StdRng::seed_from_u64(7);
    let n = 10;
    let mut data = correlated_pairs(n, (0.0, 0.0), 0.0, &mut rng);
    for i in 0..n {
        data[(i, 1)] = f64::NAN;
    }
    let obs = ObservationMatrix::new(data).unwrap();

    // Informative covariance prior: under a vague one the unidentified
    // column's conditional variance is heavy tailed and the summary would
    // need far longer runs.
    let prior = PriorParameters::new(
        DVector::zeros(2),
        DMatrix::identity(2, 2),
        DMatrix::identity(2, 2) * 4.0,
        10.0
    ).unwrap();
    let mut imp = GaussianImputer::new(obs, prior).unwrap();
    for _ in 0..500 {
        imp.update(&mut rng).unwrap();
    }
    let mut acc = RunningSummary::new();
    for _ in 0..4000 {
        imp.update(&mut rng).unwrap();
        for i in 0..n {
            acc.push(imp.imputed()[(i, 1)]);
        }
    }

    // The prior is centered at zero with scales of order one, so the draws
    // for the never observed column should hover around zero with spread
    // of the same order.
    assert!(acc.mean().unwrap().abs() < 0.5);
    let sd = acc.stddev().unwrap();
    assert!(sd > 0.3 && sd < 5.0);
}

#[test]
fn multiple_imputation_pools_a_column_mean() {
    let mut rng = StdRng::seed_from_u64(8);
    let n = 40;
    let mut data = correlated_pairs(n, (0.0, 2.0), 0.7, &mut rng);
    for i in 0..n {
        if rng.gen::<f64>() < 0.25 {
            data[(i, 1)] = f64::NAN;
        }
    }
    let obs = ObservationMatrix::with_names(data, &["age", "chol"]).unwrap();
    let col = obs.position("chol").unwrap();
    let prior = PriorParameters::vague(2).unwrap();
    let mut imp = GaussianImputer::new(obs, prior).unwrap();
    let schedule = MultipleImputation { burn : 50, skip : 5, n_imputations : 8 };
    let pooled = schedule
        .run(&mut imp, &mut rng, |completed| {
            let m = completed.column(col).mean();
            let var = completed
                .column(col)
                .iter()
                .map(|x| (x - m).powi(2))
                .sum::<f64>() / (n - 1) as f64;
            Ok((m, (var / n as f64).sqrt()))
        })
        .unwrap();
    assert!((pooled.estimate() - 2.0).abs() < 0.5);
    assert!(pooled.std_err() > 0.0);
    assert!(pooled.frac_missing() >= 0.0 && pooled.frac_missing() <= 1.0);
    assert_eq!(pooled.n_imputations(), 8);
}

#[test]
fn a_correlation_summary_tracks_the_data() {
    let mut rng = StdRng::seed_from_u64(9);
    let n = 200;
    let mut data = correlated_pairs(n, (0.0, 0.0), 0.6, &mut rng);
    for i in 0..n {
        if rng.gen::<f64>() < 0.1 {
            data[(i, 0)] = f64::NAN;
        }
    }
    let obs = ObservationMatrix::new(data).unwrap();
    let prior = PriorParameters::vague(2).unwrap();
    let mut imp = GaussianImputer::new(obs, prior).unwrap();
    for _ in 0..100 {
        imp.update(&mut rng).unwrap();
    }
    let mut rho = RunningSummary::new();
    for _ in 0..600 {
        imp.update(&mut rng).unwrap();
        let cov = imp.cov();
        rho.push(cov[(0, 1)] / (cov[(0, 0)] * cov[(1, 1)]).sqrt());
    }
    let r = rho.mean().unwrap();
    assert!(r > 0.3 && r < 0.9);
    assert!(rho.stddev().unwrap() > 0.0);
}

#[test]
fn state_serializes_and_round_trips() {
    let mut rng = StdRng::seed_from_u64(10);
    let data = correlated_pairs(15, (1.0, 1.0), 0.2, &mut rng);
    let obs = ObservationMatrix::new(data).unwrap();
    let prior = PriorParameters::vague(2).unwrap();
    let mut imp = GaussianImputer::new(obs, prior).unwrap();
    imp.update(&mut rng).unwrap();
    let ser = serde_json::to_string(imp.state()).unwrap();
    let state : gaussmi::prob::MultiNormal = serde_json::from_str(&ser).unwrap();
    assert_eq!(state.mean(), imp.mean());
    assert_eq!(state.cov(), imp.cov());
}

#[test]
fn construction_rejects_an_indefinite_covariance_prior() {
    let mut scale = DMatrix::identity(2, 2);
    scale[(0, 0)] = -2.0;
    let res = PriorParameters::new(
        DVector::zeros(2),
        DMatrix::identity(2, 2),
        scale,
        1.0
    );
    assert!(matches!(res, Err(Error::NonPositiveDefinite { .. })));
}
