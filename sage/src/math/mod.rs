//! Numeric building blocks: robust statistics, FFT cross-correlation,
//! apodization, splines, Savitzky-Golay smoothing.

pub(crate) mod fft;
pub(crate) mod savgol;
pub(crate) mod spline;
pub(crate) mod statistics;
pub(crate) mod taper;

pub use statistics::{
    joint_weighted_stats, mad_to_sigma, median_f32_mut, weighted_mean_std, JointWeightedStats,
    WeightedStats, MAD_TO_SIGMA,
};

/// L2 norm over a half-open index range.
#[inline]
pub fn norm_l2(values: &[f32], range: std::ops::Range<usize>) -> f32 {
    values[range].iter().map(|v| v * v).sum::<f32>().sqrt()
}
