//! Single-pixel spike removal against a running-median baseline.

use crate::math::statistics;

use super::PreprocConfig;

/// Replace spike samples with the running-median baseline. Returns the
/// number of samples replaced.
///
/// A sample is a spike when its residual to the baseline exceeds
/// `spike_floor_z` robust sigmas, exceeds both neighbor residuals by
/// `spike_rel_edge_ratio`, and (when configured) exceeds a minimum absolute
/// residual. Consecutive removals are kept `spike_min_separation` apart.
pub fn remove_spikes(flux: &mut [f32], config: &PreprocConfig) -> usize {
    let n = flux.len();
    if n < 8 {
        return 0;
    }
    let window = config.spike_baseline_window.min(n) | 1;
    let baseline = running_median(flux, window);

    let residuals: Vec<f32> = flux
        .iter()
        .zip(&baseline)
        .map(|(&f, &b)| f - b)
        .collect();
    let sigma = {
        let mut scratch = residuals.clone();
        statistics::robust_sigma_mut(&mut scratch)
    };
    if sigma <= 0.0 {
        return 0;
    }

    let threshold = config.spike_floor_z * sigma;
    let mut removed = 0usize;
    let mut last_removed: Option<usize> = None;
    for i in 1..n - 1 {
        if let Some(last) = last_removed {
            if i - last < config.spike_min_separation.max(1) {
                continue;
            }
        }
        let r = residuals[i].abs();
        if r <= threshold {
            continue;
        }
        if config.spike_min_residual > 0.0 && r <= config.spike_min_residual {
            continue;
        }
        let ratio = config.spike_rel_edge_ratio;
        if r <= ratio * residuals[i - 1].abs() || r <= ratio * residuals[i + 1].abs() {
            continue;
        }
        flux[i] = baseline[i];
        removed += 1;
        last_removed = Some(i);
    }
    removed
}

/// Running median with a centered window, clamped at the edges.
fn running_median(flux: &[f32], window: usize) -> Vec<f32> {
    let n = flux.len();
    let half = window / 2;
    let mut scratch = Vec::with_capacity(window);
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(n);
            scratch.clear();
            scratch.extend_from_slice(&flux[lo..hi]);
            statistics::median_f32_mut(&mut scratch)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PreprocConfig {
        PreprocConfig {
            spike_floor_z: 5.0,
            spike_baseline_window: 21,
            ..PreprocConfig::default()
        }
    }

    #[test]
    fn removes_an_isolated_spike() {
        let mut flux: Vec<f32> = (0..200).map(|i| 10.0 + (i as f32 * 0.1).sin()).collect();
        flux[100] = 500.0;
        let removed = remove_spikes(&mut flux, &config());
        assert_eq!(removed, 1);
        assert!(flux[100] < 12.0);
    }

    #[test]
    fn leaves_broad_features_alone() {
        // A broad emission feature has neighbors nearly as high as the
        // center, so the neighbor-ratio gate keeps it.
        let mut flux: Vec<f32> = (0..200).map(|i| 10.0 + (i as f32 * 0.1).sin()).collect();
        for (j, f) in [30.0f32, 80.0, 100.0, 80.0, 30.0].iter().enumerate() {
            flux[98 + j] += f;
        }
        let original = flux.clone();
        remove_spikes(&mut flux, &config());
        assert_eq!(flux, original);
    }

    #[test]
    fn respects_minimum_separation() {
        let mut flux: Vec<f32> = (0..100).map(|i| 10.0 + (i as f32 * 0.1).sin()).collect();
        flux[50] = 1000.0;
        flux[51] = 60.0;
        let mut cfg = config();
        cfg.spike_min_separation = 4;
        remove_spikes(&mut flux, &cfg);
        // The second spike sits inside the separation window of the first.
        assert!(flux[50] < 20.0);
        assert!(flux[51] > 50.0);
    }

    #[test]
    fn quiet_spectrum_is_untouched() {
        let mut flux: Vec<f32> = (0..100).map(|i| 5.0 + (i as f32 * 0.3).cos()).collect();
        let original = flux.clone();
        assert_eq!(remove_spikes(&mut flux, &config()), 0);
        assert_eq!(flux, original);
    }
}
