pub mod correlation;
pub mod hedge_ratio;
pub mod spread;
pub mod stationarity;
pub mod zscore;

pub use correlation::{latest_correlation, pearson, rolling_correlation};
pub use hedge_ratio::{hedge_ratio, linear_fit, LinearFit};
pub use spread::{spread, spread_point};
pub use stationarity::{adf_test, mackinnon_p_value};
pub use zscore::{latest_zscore, mean_sample_std, rolling_zscore};
