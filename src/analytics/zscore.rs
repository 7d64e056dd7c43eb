use crate::error::AnalyticsError;

/// Below this sample standard deviation the z-score is undefined.
pub const STD_EPSILON: f64 = 1e-9;

/// Mean and unbiased (n - 1) sample standard deviation.
pub fn mean_sample_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / (n - 1.0);
    Some((mean, variance.sqrt()))
}

fn zscore_of_window(window: &[f64]) -> Option<f64> {
    let last = *window.last()?;
    let (mean, std) = mean_sample_std(window)?;
    if !std.is_finite() || std < STD_EPSILON {
        return None;
    }
    let z = (last - mean) / std;
    z.is_finite().then_some(z)
}

/// Z-score of the newest value against the trailing `window` values (itself included).
///
/// Undefined until `window` values exist, for `window < 2`, or when the
/// window has (numerically) zero spread.
pub fn latest_zscore(series: &[f64], window: usize) -> Option<f64> {
    if window < 2 || series.len() < window {
        return None;
    }
    zscore_of_window(&series[series.len() - window..])
}

/// Rolling z-score for every point; the first `window - 1` entries are undefined.
pub fn rolling_zscore(series: &[f64], window: usize) -> Result<Vec<Option<f64>>, AnalyticsError> {
    if window <= 1 {
        return Err(AnalyticsError::InvalidWindow(window));
    }
    Ok((0..series.len())
        .map(|i| {
            if i + 1 < window {
                None
            } else {
                zscore_of_window(&series[i + 1 - window..=i])
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_std_uses_n_minus_one() {
        let (mean, std) = mean_sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((mean - 5.0).abs() < 1e-12);
        // population std is 2.0; sample std is sqrt(32 / 7)
        assert!((std - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn flat_window_is_undefined() {
        assert_eq!(latest_zscore(&[1.0; 10], 5), None);
    }

    #[test]
    fn rejects_tiny_window() {
        assert_eq!(
            rolling_zscore(&[1.0, 2.0], 1),
            Err(AnalyticsError::InvalidWindow(1))
        );
    }
}
