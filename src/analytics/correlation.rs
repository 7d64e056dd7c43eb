use crate::error::AnalyticsError;

/// Below this population standard deviation a leg is treated as flat.
pub const STD_EPSILON: f64 = 1e-6;

/// Pearson correlation of two equal-length series. `None` when either side is flat.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    if !x.iter().chain(y.iter()).all(|v| v.is_finite()) {
        return None;
    }
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if (sxx / n).sqrt() < STD_EPSILON || (syy / n).sqrt() < STD_EPSILON {
        return None;
    }
    let r = sxy / (sxx.sqrt() * syy.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Correlation over the aligned tail of two price histories of possibly different length.
///
/// Uses at most `window` of the newest points common to both sides and
/// requires at least `min_samples` of them.
pub fn latest_correlation(x: &[f64], y: &[f64], window: usize, min_samples: usize) -> Option<f64> {
    let n = x.len().min(y.len()).min(window);
    if n < min_samples.max(2) {
        return None;
    }
    pearson(&x[x.len() - n..], &y[y.len() - n..])
}

/// Rolling correlation for every index; the first `window - 1` entries are undefined.
pub fn rolling_correlation(
    x: &[f64],
    y: &[f64],
    window: usize,
) -> Result<Vec<Option<f64>>, AnalyticsError> {
    if window <= 1 {
        return Err(AnalyticsError::InvalidWindow(window));
    }
    if x.len() != y.len() {
        return Err(AnalyticsError::LengthMismatch {
            left: x.len(),
            right: y.len(),
        });
    }
    Ok((0..x.len())
        .map(|i| {
            if i + 1 < window {
                None
            } else {
                pearson(&x[i + 1 - window..=i], &y[i + 1 - window..=i])
            }
        })
        .collect())
}
