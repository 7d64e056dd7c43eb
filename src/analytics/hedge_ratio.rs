//! Hedge ratio (beta) between two price legs.
//!
//! The ratio is the slope of an ordinary least squares fit of `y` on `x`
//! **with** an intercept. The intercept is not part of the spread, so the
//! spread `y - beta * x` is free to settle around a non-zero mean; the
//! z-score normalises that mean away. A through-origin fit would force the
//! spread mean toward zero and gives a different beta on the same data.

use crate::error::AnalyticsError;

const VARIANCE_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

pub(crate) fn check_pair(x: &[f64], y: &[f64]) -> Result<(), AnalyticsError> {
    if x.len() != y.len() {
        return Err(AnalyticsError::LengthMismatch {
            left: x.len(),
            right: y.len(),
        });
    }
    if x.len() < 2 {
        return Err(AnalyticsError::InsufficientData {
            required: 2,
            actual: x.len(),
        });
    }
    if !x.iter().chain(y.iter()).all(|v| v.is_finite()) {
        return Err(AnalyticsError::NonFinite);
    }
    Ok(())
}

/// OLS fit `y = intercept + slope * x`.
pub fn linear_fit(x: &[f64], y: &[f64]) -> Result<LinearFit, AnalyticsError> {
    check_pair(x, y)?;
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        sxy += dx * (yi - mean_y);
        sxx += dx * dx;
    }
    if sxx / n < VARIANCE_EPSILON {
        return Err(AnalyticsError::Degenerate);
    }

    let slope = sxy / sxx;
    Ok(LinearFit {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

/// Slope of `y` regressed on `x` (intercept included, see module docs).
pub fn hedge_ratio(x: &[f64], y: &[f64]) -> Result<f64, AnalyticsError> {
    linear_fit(x, y).map(|fit| fit.slope)
}
