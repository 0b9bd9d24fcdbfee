//! Robust and weighted statistics.
//!
//! The weighted estimators use the effective sample size
//! `N_eff = (Σw)² / Σw²` for the finite-sample bias correction, so heavily
//! weighted small samples do not pretend to more precision than they carry.

/// MAD (Median Absolute Deviation) to standard deviation conversion factor
/// for a normal distribution: 1 / Φ⁻¹(3/4).
pub const MAD_TO_SIGMA: f32 = 1.4826022;

/// Convert MAD to standard deviation (assuming normal distribution).
#[inline]
pub fn mad_to_sigma(mad: f32) -> f32 {
    mad * MAD_TO_SIGMA
}

/// Median of f32 values in-place (partial sort via quickselect).
pub fn median_f32_mut(data: &mut [f32]) -> f32 {
    debug_assert!(!data.is_empty());
    let mid = data.len() / 2;
    let (_, &mut upper, _) = data.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    if data.len() % 2 == 1 {
        upper
    } else {
        let lower = data[..mid]
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);
        (lower + upper) * 0.5
    }
}

/// Robust sigma of a sample: MAD scaled to standard deviation.
/// Mutates the buffer (used as quickselect scratch).
pub fn robust_sigma_mut(data: &mut [f32]) -> f32 {
    if data.is_empty() {
        return 0.0;
    }
    let median = median_f32_mut(data);
    for v in data.iter_mut() {
        *v = (*v - median).abs();
    }
    mad_to_sigma(median_f32_mut(data))
}

/// Weighted mean and spread of a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedStats {
    /// Weighted mean `Σwx / Σw`.
    pub mean: f64,
    /// Bias-corrected weighted standard deviation.
    pub std: f64,
    /// Standard error of the weighted mean: `std / sqrt(N_eff)`.
    pub std_err: f64,
    /// Effective sample size `(Σw)² / Σw²`.
    pub n_eff: f64,
}

/// Weighted mean / standard deviation over `(value, weight)` pairs.
///
/// Pairs with non-finite values or non-positive weights are ignored.
/// Returns `None` when nothing valid remains.
pub fn weighted_mean_std(pairs: impl Iterator<Item = (f64, f64)> + Clone) -> Option<WeightedStats> {
    let valid = pairs.filter(|(x, w)| x.is_finite() && w.is_finite() && *w > 0.0);

    let mut sum_w = 0.0;
    let mut sum_wx = 0.0;
    let mut sum_w2 = 0.0;
    let mut count = 0usize;
    for (x, w) in valid.clone() {
        sum_w += w;
        sum_wx += w * x;
        sum_w2 += w * w;
        count += 1;
    }
    if count == 0 || sum_w <= 0.0 {
        return None;
    }

    let mean = sum_wx / sum_w;
    if count == 1 {
        return Some(WeightedStats {
            mean,
            std: 0.0,
            std_err: 0.0,
            n_eff: 1.0,
        });
    }

    let n_eff = sum_w * sum_w / sum_w2;
    let mut var = valid.map(|(x, w)| w * (x - mean) * (x - mean)).sum::<f64>() / sum_w;
    if n_eff > 1.0 {
        var *= n_eff / (n_eff - 1.0);
    }
    let std = var.max(0.0).sqrt();
    Some(WeightedStats {
        mean,
        std,
        std_err: std / n_eff.sqrt(),
        n_eff,
    })
}

/// Joint weighted estimate for two quantities measured per sample, with the
/// full 2x2 covariance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointWeightedStats {
    pub x: WeightedStats,
    pub y: WeightedStats,
    /// Bias-corrected weighted covariance of the two quantities.
    pub covariance: f64,
}

/// Joint weighted mean/spread over `(x, y, weight)` triplets. Triplets with
/// non-finite values or non-positive weights are ignored.
pub fn joint_weighted_stats(
    triplets: impl Iterator<Item = (f64, f64, f64)> + Clone,
) -> Option<JointWeightedStats> {
    let valid = triplets.filter(|(x, y, w)| {
        x.is_finite() && y.is_finite() && w.is_finite() && *w > 0.0
    });

    let x = weighted_mean_std(valid.clone().map(|(x, _, w)| (x, w)))?;
    let y = weighted_mean_std(valid.clone().map(|(_, y, w)| (y, w)))?;

    let sum_w: f64 = valid.clone().map(|(_, _, w)| w).sum();
    let mut covariance = valid
        .map(|(vx, vy, w)| w * (vx - x.mean) * (vy - y.mean))
        .sum::<f64>()
        / sum_w;
    if x.n_eff > 1.0 {
        covariance *= x.n_eff / (x.n_eff - 1.0);
    }

    Some(JointWeightedStats { x, y, covariance })
}
