//! Augmented Dickey-Fuller test with a constant term.
//!
//! The regression is `dy_t = c + gamma * y_{t-1} + sum_i phi_i * dy_{t-i} + e_t`.
//! The number of augmenting lags is chosen by AIC over `0..=maxlag`, all
//! candidates fitted on the same sample, and the chosen model is refitted
//! on the longest sample it allows. The statistic is the t-value of `gamma`;
//! its p-value comes from MacKinnon's (1994) response surface for one
//! series with a constant.
//!
//! The test never fails outward: short input, a singular design (for
//! example a constant series) or a perfect fit all produce
//! [`StationarityResult::neutral`].

use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::AnalyticsError;
use crate::model::snapshot::StationarityResult;

pub const MIN_OBSERVATIONS: usize = 10;
pub const DEFAULT_SIGNIFICANCE: f64 = 0.05;

// MacKinnon (1994) coefficients, constant-only regression, one series.
const TAU_MAX: f64 = 2.74;
const TAU_MIN: f64 = -18.83;
const TAU_STAR: f64 = -1.61;
const TAU_SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038269];
const TAU_LARGE_P: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

const PIVOT_EPSILON: f64 = 1e-12;

/// Run the test on `series`, discarding non-finite values first.
pub fn adf_test(series: &[f64], significance: f64) -> StationarityResult {
    let clean: Vec<f64> = series.iter().copied().filter(|v| v.is_finite()).collect();
    if clean.len() < MIN_OBSERVATIONS {
        return StationarityResult::neutral();
    }

    match adf_statistic(&clean) {
        Ok((statistic, used_lag)) => {
            let p_value = mackinnon_p_value(statistic);
            if !p_value.is_finite() {
                return StationarityResult::neutral();
            }
            StationarityResult {
                statistic: Some(statistic),
                p_value: Some(p_value),
                used_lag: Some(used_lag),
                is_stationary: p_value < significance,
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, len = clean.len(), "ADF test could not run");
            StationarityResult::neutral()
        }
    }
}

/// Default lag ceiling: `ceil(12 * (n / 100)^(1/4))`, capped so the regression keeps degrees of freedom.
fn max_lag(nobs: usize) -> Result<usize, AnalyticsError> {
    let schwert = (12.0 * (nobs as f64 / 100.0).powf(0.25)).ceil() as usize;
    let cap = (nobs / 2).checked_sub(2).ok_or(AnalyticsError::InsufficientData {
        required: MIN_OBSERVATIONS,
        actual: nobs,
    })?;
    Ok(schwert.min(cap))
}

/// Returns `(t-statistic of gamma, augmenting lags used)`.
fn adf_statistic(y: &[f64]) -> Result<(f64, usize), AnalyticsError> {
    let dy: Vec<f64> = y.windows(2).map(|w| w[1] - w[0]).collect();
    let maxlag = max_lag(y.len())?;

    let mut best: Option<(f64, usize)> = None;
    for lags in 0..=maxlag {
        let fit = match fit_adf_regression(y, &dy, maxlag, lags) {
            Ok(fit) => fit,
            Err(_) => continue,
        };
        let aic = fit.aic();
        if !aic.is_finite() {
            continue;
        }
        if best.map_or(true, |(best_aic, _)| aic < best_aic) {
            best = Some((aic, lags));
        }
    }
    let (_, lags) = best.ok_or(AnalyticsError::Singular)?;

    let fit = fit_adf_regression(y, &dy, lags, lags)?;
    // column 1 holds y_{t-1}
    let t = fit.t_value(1)?;
    Ok((t, lags))
}

/// Fit the ADF regression with `lags` augmenting terms, using targets `dy[first..]`.
fn fit_adf_regression(
    y: &[f64],
    dy: &[f64],
    first: usize,
    lags: usize,
) -> Result<OlsFit, AnalyticsError> {
    let rows: Vec<Vec<f64>> = (first..dy.len())
        .map(|t| {
            let mut row = Vec::with_capacity(lags + 2);
            row.push(1.0);
            row.push(y[t]);
            row.extend((1..=lags).map(|i| dy[t - i]));
            row
        })
        .collect();
    let target = &dy[first..];
    ols(&rows, target)
}

#[derive(Debug)]
struct OlsFit {
    coefficients: Vec<f64>,
    /// Diagonal of `(X'X)^-1`.
    inverse_diag: Vec<f64>,
    ssr: f64,
    nobs: usize,
}

impl OlsFit {
    fn k(&self) -> usize {
        self.coefficients.len()
    }

    fn aic(&self) -> f64 {
        let n = self.nobs as f64;
        let llf = -n / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (self.ssr / n).ln() + 1.0);
        -2.0 * llf + 2.0 * self.k() as f64
    }

    fn t_value(&self, idx: usize) -> Result<f64, AnalyticsError> {
        let dof = self.nobs.saturating_sub(self.k());
        if dof == 0 {
            return Err(AnalyticsError::InsufficientData {
                required: self.k() + 1,
                actual: self.nobs,
            });
        }
        let sigma2 = self.ssr / dof as f64;
        let se = (sigma2 * self.inverse_diag[idx]).sqrt();
        if !se.is_finite() || se < PIVOT_EPSILON {
            return Err(AnalyticsError::Degenerate);
        }
        Ok(self.coefficients[idx] / se)
    }
}

/// Least squares through the normal equations. `rows` is the design matrix.
fn ols(rows: &[Vec<f64>], target: &[f64]) -> Result<OlsFit, AnalyticsError> {
    let k = rows.first().map(Vec::len).unwrap_or(0);
    if rows.len() <= k || k == 0 {
        return Err(AnalyticsError::InsufficientData {
            required: k + 1,
            actual: rows.len(),
        });
    }

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, yt) in rows.iter().zip(target) {
        for i in 0..k {
            xty[i] += row[i] * yt;
            for j in 0..k {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }

    let inverse = invert(xtx)?;
    let coefficients: Vec<f64> = (0..k)
        .map(|i| (0..k).map(|j| inverse[i][j] * xty[j]).sum())
        .collect();
    let ssr = rows
        .iter()
        .zip(target)
        .map(|(row, yt)| {
            let fitted: f64 = row.iter().zip(&coefficients).map(|(a, b)| a * b).sum();
            let e = yt - fitted;
            e * e
        })
        .sum();

    Ok(OlsFit {
        inverse_diag: (0..k).map(|i| inverse[i][i]).collect(),
        coefficients,
        ssr,
        nobs: rows.len(),
    })
}

/// Gauss-Jordan inversion with partial pivoting.
fn invert(mut a: Vec<Vec<f64>>) -> Result<Vec<Vec<f64>>, AnalyticsError> {
    let n = a.len();
    let scale = (0..n).map(|i| a[i][i].abs()).fold(0.0, f64::max).max(1.0);
    let mut inv: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&r1, &r2| a[r1][col].abs().total_cmp(&a[r2][col].abs()))
            .ok_or(AnalyticsError::Singular)?;
        if a[pivot_row][col].abs() < PIVOT_EPSILON * scale {
            return Err(AnalyticsError::Singular);
        }
        a.swap(col, pivot_row);
        inv.swap(col, pivot_row);

        let pivot = a[col][col];
        a[col].iter_mut().for_each(|v| *v /= pivot);
        inv[col].iter_mut().for_each(|v| *v /= pivot);
        let pivot_a = a[col].clone();
        let pivot_inv = inv[col].clone();

        for r in 0..n {
            if r == col {
                continue;
            }
            let factor = a[r][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                a[r][j] -= factor * pivot_a[j];
                inv[r][j] -= factor * pivot_inv[j];
            }
        }
    }
    Ok(inv)
}

fn polyval(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Approximate p-value of an ADF statistic (constant, one series).
pub fn mackinnon_p_value(statistic: f64) -> f64 {
    if statistic.is_nan() {
        return f64::NAN;
    }
    if statistic > TAU_MAX {
        return 1.0;
    }
    if statistic < TAU_MIN {
        return 0.0;
    }
    let coefficients: &[f64] = if statistic <= TAU_STAR {
        &TAU_SMALL_P
    } else {
        &TAU_LARGE_P
    };
    match Normal::new(0.0, 1.0) {
        Ok(normal) => normal.cdf(polyval(coefficients, statistic)),
        Err(_) => f64::NAN,
    }
}
