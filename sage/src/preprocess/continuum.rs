//! Continuum estimation over the active region.
//!
//! A smoothing spline through robust (median) knots spans the active region;
//! if the fit degenerates (non-finite values, non-positive continuum under
//! real signal) the fitter falls back to a linear least-squares continuum,
//! and finally to a constant. The fallback is reported through the trace,
//! never as an error.

use crate::math::spline::CubicSpline;
use crate::math::statistics;
use crate::trace::Trace;

/// Number of spline knot segments across the active region.
const NUM_KNOTS: usize = 13;
/// Continuum floor relative to the median absolute signal.
const FLOOR_FRACTION: f32 = 1e-3;

/// Fit the continuum over `[left, right]` of `log_flux`. The returned vector
/// is 0 outside the active region and strictly positive wherever the input
/// carries usable signal.
pub fn fit_continuum(log_flux: &[f32], left: usize, right: usize, trace: &mut Trace) -> Vec<f32> {
    let mut continuum = vec![0.0f32; log_flux.len()];
    let active = &log_flux[left..=right];

    // Positive floor derived from the typical signal level.
    let mut magnitudes: Vec<f32> = active
        .iter()
        .filter(|&&v| v != 0.0)
        .map(|v| v.abs())
        .collect();
    if magnitudes.is_empty() {
        return continuum;
    }
    let typical = statistics::median_f32_mut(&mut magnitudes);
    let floor = (typical * FLOOR_FRACTION).max(f32::MIN_POSITIVE);

    let values = match spline_continuum(log_flux, left, right) {
        Some(values) if values.iter().all(|v| v.is_finite()) => values,
        _ => {
            trace.warn("continuum fit degenerate, using linear fallback");
            linear_continuum(log_flux, left, right)
        }
    };

    for (i, value) in values.into_iter().enumerate() {
        continuum[left + i] = value.max(floor);
    }
    continuum
}

/// Smoothing spline through median knots. `None` when too few usable knots
/// remain.
fn spline_continuum(log_flux: &[f32], left: usize, right: usize) -> Option<Vec<f32>> {
    let len = right - left + 1;
    let seg = (len / NUM_KNOTS).max(1);

    let mut knots_x = Vec::with_capacity(NUM_KNOTS + 2);
    let mut knots_y = Vec::with_capacity(NUM_KNOTS + 2);
    let mut scratch = Vec::with_capacity(seg);
    let mut start = left;
    while start <= right {
        let end = (start + seg - 1).min(right);
        scratch.clear();
        scratch.extend(
            log_flux[start..=end]
                .iter()
                .copied()
                .filter(|&v| v != 0.0),
        );
        if !scratch.is_empty() {
            knots_x.push((start + end) as f64 / 2.0);
            knots_y.push(statistics::median_f32_mut(&mut scratch) as f64);
        }
        start = end + 1;
    }

    if knots_x.len() < 4 {
        return None;
    }
    let spline = CubicSpline::fit(knots_x, knots_y)?;
    Some((left..=right).map(|i| spline.eval(i as f64) as f32).collect())
}

/// Least-squares line over the nonzero bins of the active region.
fn linear_continuum(log_flux: &[f32], left: usize, right: usize) -> Vec<f32> {
    let mut sum_x = 0.0f64;
    let mut sum_y = 0.0f64;
    let mut sum_xx = 0.0f64;
    let mut sum_xy = 0.0f64;
    let mut count = 0.0f64;
    for i in left..=right {
        let y = log_flux[i] as f64;
        if y == 0.0 {
            continue;
        }
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xx += x * x;
        sum_xy += x * y;
        count += 1.0;
    }
    if count < 2.0 {
        let value = if count > 0.0 { (sum_y / count.max(1.0)) as f32 } else { 0.0 };
        return vec![value; right - left + 1];
    }
    let denom = count * sum_xx - sum_x * sum_x;
    let (slope, intercept) = if denom.abs() < 1e-12 {
        (0.0, sum_y / count)
    } else {
        let slope = (count * sum_xy - sum_x * sum_y) / denom;
        (slope, (sum_y - slope * sum_x) / count)
    };
    (left..=right)
        .map(|i| (intercept + slope * i as f64) as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smooth_spectrum_is_tracked_closely() {
        // Broad blackbody-like shape: the continuum should follow it within
        // a few percent so the flattened residual is small.
        let n = 1024usize;
        let flux: Vec<f32> = (0..n)
            .map(|i| {
                let x = i as f32 / n as f32;
                50.0 + 40.0 * (-(x - 0.4) * (x - 0.4) / 0.1).exp()
            })
            .collect();
        let mut trace = Trace::new();
        let continuum = fit_continuum(&flux, 0, n - 1, &mut trace);
        for i in 50..n - 50 {
            let ratio = flux[i] / continuum[i];
            assert!((ratio - 1.0).abs() < 0.05, "bin {i}: ratio {ratio}");
        }
        assert!(trace.warnings.is_empty());
    }

    #[test]
    fn sparse_signal_falls_back_to_linear() {
        // Only three bins carry signal: too few knots for a spline.
        let mut flux = vec![0.0f32; 64];
        flux[2] = 5.0;
        flux[30] = 6.0;
        flux[60] = 7.0;
        let mut trace = Trace::new();
        let continuum = fit_continuum(&flux, 2, 60, &mut trace);
        assert!(!trace.warnings.is_empty());
        for i in 2..=60 {
            assert!(continuum[i] > 0.0, "bin {i}");
        }
    }

    #[test]
    fn continuum_is_positive_even_for_negative_dips() {
        let mut flux: Vec<f32> = vec![10.0; 256];
        for f in flux.iter_mut().skip(100).take(20) {
            *f = -5.0;
        }
        let mut trace = Trace::new();
        let continuum = fit_continuum(&flux, 0, 255, &mut trace);
        for (i, &c) in continuum.iter().enumerate() {
            assert!(c > 0.0, "bin {i}");
        }
    }

    #[test]
    fn all_zero_region_yields_zero_continuum() {
        let flux = vec![0.0f32; 32];
        let mut trace = Trace::new();
        let continuum = fit_continuum(&flux, 0, 31, &mut trace);
        assert!(continuum.iter().all(|&c| c == 0.0));
    }
}
