use super::hedge_ratio::check_pair;
use crate::error::AnalyticsError;

/// Residual of one price after removing the hedged other leg.
pub fn spread_point(x: f64, y: f64, hedge_ratio: f64) -> f64 {
    y - hedge_ratio * x
}

/// Element-wise `y - hedge_ratio * x`.
pub fn spread(x: &[f64], y: &[f64], hedge_ratio: f64) -> Result<Vec<f64>, AnalyticsError> {
    check_pair(x, y)?;
    if !hedge_ratio.is_finite() {
        return Err(AnalyticsError::NonFinite);
    }
    Ok(x
        .iter()
        .zip(y)
        .map(|(xi, yi)| spread_point(*xi, *yi, hedge_ratio))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spread_is_elementwise() {
        let s = spread(&[1.0, 2.0, 3.0], &[10.0, 20.0, 30.0], 2.0).unwrap();
        assert_eq!(s, vec![8.0, 16.0, 24.0]);
    }

    #[test]
    fn non_finite_ratio_is_rejected() {
        assert_eq!(
            spread(&[1.0, 2.0], &[1.0, 2.0], f64::INFINITY),
            Err(AnalyticsError::NonFinite)
        );
    }
}
