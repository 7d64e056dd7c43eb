use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use sandbox_pairs::analytics::{
    adf_test, hedge_ratio, latest_correlation, latest_zscore, linear_fit, pearson,
    rolling_correlation, rolling_zscore, spread,
};
use sandbox_pairs::error::AnalyticsError;

/// Centred uniform draws in [-0.5, 0.5).
fn white_noise(seed: u64, n: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.random::<f64>() - 0.5).collect()
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    let step = (end - start) / (n - 1) as f64;
    (0..n).map(|i| start + step * i as f64).collect()
}

#[test]
fn hedge_ratio_recovers_noisy_slope() {
    let mut rng = StdRng::seed_from_u64(42);
    let x = linspace(0.0, 10.0, 100);
    let y: Vec<f64> = x
        .iter()
        .map(|v| 2.0 * v + rng.random_range(-0.1..0.1))
        .collect();

    let beta = hedge_ratio(&x, &y).unwrap();
    assert!((beta - 2.0).abs() < 0.1, "beta = {}", beta);

    let s = spread(&x, &y, beta).unwrap();
    let mean = s.iter().sum::<f64>() / s.len() as f64;
    assert!(mean.abs() < 0.1, "spread mean = {}", mean);
}

#[test]
fn spread_keeps_intercept_of_the_fit() {
    let x = linspace(1.0, 20.0, 40);
    let y: Vec<f64> = x.iter().map(|v| 0.5 * v + 30.0).collect();
    let fit = linear_fit(&x, &y).unwrap();
    assert!((fit.slope - 0.5).abs() < 1e-9);
    assert!((fit.intercept - 30.0).abs() < 1e-9);

    let s = spread(&x, &y, fit.slope).unwrap();
    assert!(s.iter().all(|v| (v - 30.0).abs() < 1e-9));
}

#[test]
fn hedge_ratio_rejects_bad_input() {
    assert_eq!(
        hedge_ratio(&[1.0, 2.0, 3.0], &[1.0, 2.0]),
        Err(AnalyticsError::LengthMismatch { left: 3, right: 2 })
    );
    assert_eq!(
        hedge_ratio(&[5.0; 10], &linspace(0.0, 1.0, 10)),
        Err(AnalyticsError::Degenerate)
    );
    assert_eq!(
        hedge_ratio(&[1.0, f64::NAN], &[1.0, 2.0]),
        Err(AnalyticsError::NonFinite)
    );
}

#[test]
fn zscore_of_known_window() {
    let z = latest_zscore(&[1.0, 2.0, 3.0, 4.0, 5.0], 5).unwrap();
    assert!((z - 2.0 / 2.5f64.sqrt()).abs() < 1e-12);
    // only the trailing window counts
    let z2 = latest_zscore(&[1_000.0, 1.0, 2.0, 3.0, 4.0, 5.0], 5).unwrap();
    assert!((z - z2).abs() < 1e-12);
    assert_eq!(latest_zscore(&[1.0, 2.0, 3.0], 5), None);
}

#[test]
fn rolling_zscore_defined_after_warmup() {
    let mut rng = StdRng::seed_from_u64(3);
    let series: Vec<f64> = (0..60).map(|_| rng.random_range(-1.0..1.0)).collect();
    let window = 20;
    let z = rolling_zscore(&series, window).unwrap();
    assert_eq!(z.len(), series.len());
    assert!(z[..window - 1].iter().all(Option::is_none));
    assert!(z[window - 1..]
        .iter()
        .all(|v| v.map_or(false, f64::is_finite)));
    assert_eq!(z.last().copied().flatten(), latest_zscore(&series, window));
}

#[test]
fn correlation_of_linear_legs_is_one() {
    let x = linspace(100.0, 110.0, 30);
    let up: Vec<f64> = x.iter().map(|v| 3.0 * v + 1.0).collect();
    let down: Vec<f64> = x.iter().map(|v| -0.5 * v).collect();
    assert!((pearson(&x, &up).unwrap() - 1.0).abs() < 1e-9);
    assert!((pearson(&x, &down).unwrap() + 1.0).abs() < 1e-9);
}

#[test]
fn correlation_needs_min_samples_and_variation() {
    let x = linspace(1.0, 2.0, 10);
    let y = linspace(5.0, 7.0, 10);
    assert_eq!(latest_correlation(&x, &y, 50, 20), None);
    assert!(latest_correlation(&x, &y, 50, 10).is_some());
    assert_eq!(pearson(&x, &[4.2; 10]), None);
}

#[test]
fn correlation_aligns_tails_of_unequal_histories() {
    let mut rng = StdRng::seed_from_u64(9);
    let x: Vec<f64> = (0..40).map(|_| rng.random_range(0.0..1.0)).collect();
    let y: Vec<f64> = x[15..].iter().map(|v| 2.0 * v).collect();
    // y is the newest 25 points of x, doubled
    let r = latest_correlation(&x, &y, 50, 20).unwrap();
    assert!((r - 1.0).abs() < 1e-9);
}

#[test]
fn rolling_correlation_shape() {
    let x = linspace(0.0, 1.0, 12);
    let y: Vec<f64> = x.iter().map(|v| v * v).collect();
    let r = rolling_correlation(&x, &y, 5).unwrap();
    assert_eq!(r.len(), 12);
    assert!(r[..4].iter().all(Option::is_none));
    assert!(r[4..].iter().all(|v| v.map_or(false, |c| c > 0.9)));
    assert_eq!(
        rolling_correlation(&x, &y[..5], 5),
        Err(AnalyticsError::LengthMismatch { left: 12, right: 5 })
    );
}

#[test]
fn white_noise_is_stationary() {
    let series = white_noise(42, 200);
    let result = adf_test(&series, 0.05);
    assert!(result.is_stationary);
    assert!(result.statistic.unwrap() < -4.0);
    assert!(result.p_value.unwrap() < 0.01);
}

#[test]
fn random_walk_is_not_stationary() {
    let series: Vec<f64> = white_noise(7, 200)
        .iter()
        .scan(100.0, |level, step| {
            *level += step;
            Some(*level)
        })
        .collect();
    let result = adf_test(&series, 0.05);
    assert!(!result.is_stationary);
    let p = result.p_value.unwrap();
    assert!(p > 0.1 && p <= 1.0, "p = {}", p);
}

#[test]
fn degenerate_series_give_neutral_result() {
    for series in [vec![3.0; 50], vec![1.0, 2.0, 3.0]] {
        let result = adf_test(&series, 0.05);
        assert!(!result.is_stationary);
        assert_eq!(result.statistic, None);
        assert_eq!(result.p_value, None);
    }
}

#[test]
fn non_finite_points_are_discarded_before_testing() {
    let clean = white_noise(42, 200);
    let mut dirty = clean.clone();
    dirty.insert(50, f64::NAN);
    dirty.push(f64::INFINITY);
    assert_eq!(adf_test(&dirty, 0.05), adf_test(&clean, 0.05));
}
