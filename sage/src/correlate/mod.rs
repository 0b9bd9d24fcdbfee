//! FFT cross-correlation of one processed input against one template.
//!
//! The correlation is normalized by the product of the two L2 norms, so the
//! peak height is a cosine-similarity-like value and every derived metric is
//! invariant under flux scaling. The quality metric `rlap` is the normalized
//! peak height over the off-peak RMS, in the spirit of Tonry & Davis; `lap`
//! measures the support overlap at the best shift and `ccc` the cosine
//! similarity over that overlap.


use serde::Serialize;

use crate::grid::LogGrid;
use crate::math::fft::{CorrScratch, CorrelationFft};
use crate::math::norm_l2;
use crate::preprocess::ProcessedSpectrum;
use crate::scoring::ScoringConfig;
use crate::template::Template;

/// Floor for norm products and sigma estimates.
const TINY: f32 = 1e-12;
/// Minimum number of off-peak samples for the sigma estimate before the
/// estimator widens to the full lag range.
const MIN_SIGMA_SAMPLES: usize = 16;

/// Lightweight copy of template metadata carried inside a match.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateInfo {
    pub name: String,
    pub sn_type: String,
    pub subtype: String,
    pub age_days: f32,
}

impl TemplateInfo {
    fn of(template: &Template) -> Self {
        Self {
            name: template.name.clone(),
            sn_type: template.sn_type.clone(),
            subtype: template.subtype.clone(),
            age_days: template.age_days,
        }
    }
}

/// Per-template correlation result.
#[derive(Debug, Clone, Serialize)]
pub struct Match {
    pub template: TemplateInfo,
    /// Best-fit redshift from the (sub-pixel refined) peak lag.
    pub z_best: f64,
    /// Redshift uncertainty from the peak half-width at `peak - sigma`.
    pub z_err: f64,
    /// Peak lag in grid bins, sub-pixel refined.
    pub lag_bins: f64,
    /// Normalized peak height over off-peak RMS.
    pub rlap: f32,
    /// Support overlap fraction at the best shift, in [0, 1].
    pub lap: f32,
    /// Cosine similarity over the overlap region, in [-1, 1].
    pub ccc: f32,
    /// Combined quality: `rlap * max(ccc, 0)`, or `rlap` when ccc is off.
    pub rlap_ccc: f32,
    /// Normalized correlation peak height.
    pub corr_peak: f32,
    /// Off-peak RMS of the normalized correlation.
    pub corr_sigma: f32,
    /// Below the `lapmin`/`rlapmin` acceptance gates.
    pub rejected: bool,
}

/// The input side of a correlation, prepared once per analysis and shared
/// read-only by all scoring workers.
#[derive(Debug)]
pub struct PreparedInput {
    pub tapered: Vec<f32>,
    pub fft: Vec<rustfft::num_complex::Complex<f32>>,
    pub left_edge: usize,
    pub right_edge: usize,
    pub norm: f32,
}

impl PreparedInput {
    pub fn from_processed(processed: &ProcessedSpectrum, fft: &CorrelationFft) -> Self {
        let norm = norm_l2(&processed.tapered_flux, processed.active_range());
        Self {
            tapered: processed.tapered_flux.clone(),
            fft: fft.forward_padded(&processed.tapered_flux),
            left_edge: processed.left_edge,
            right_edge: processed.right_edge,
            norm,
        }
    }
}

/// Cross-correlation engine bound to one grid.
#[derive(Debug)]
pub struct Correlator {
    grid: LogGrid,
    fft: CorrelationFft,
}

impl Correlator {
    pub fn new(grid: LogGrid) -> Self {
        let fft = CorrelationFft::new(grid.num_bins);
        Self { grid, fft }
    }

    #[inline]
    pub fn fft(&self) -> &CorrelationFft {
        &self.fft
    }

    pub fn make_scratch(&self) -> CorrScratch {
        self.fft.make_scratch()
    }

    /// Integer lag search window implied by the redshift bounds.
    fn lag_window(&self, config: &ScoringConfig) -> (isize, isize) {
        let half = self.grid.num_bins as isize - 1;
        let lo = self.grid.lag_from_redshift(config.zmin as f64).ceil() as isize;
        let hi = self.grid.lag_from_redshift(config.zmax as f64).floor() as isize;
        (lo.clamp(-half, half), hi.clamp(-half, half))
    }

    /// Correlate the prepared input against one template.
    pub fn correlate(
        &self,
        input: &PreparedInput,
        template: &Template,
        config: &ScoringConfig,
        scratch: &mut CorrScratch,
    ) -> Match {
        self.fft.cross_correlate(&input.fft, &template.fft, scratch);
        let norm_product = (input.norm * template.norm).max(TINY);
        let (lag_lo, lag_hi) = self.lag_window(config);
        let window = config.peak_window_size.max(1) as isize;

        let (lag_bins, corr_peak, corr_sigma, z_best, z_err) = match config.forced_redshift {
            Some(z_forced) => {
                let lag = self.grid.lag_from_redshift(z_forced as f64);
                let peak = interp_lag(scratch, lag) / norm_product;
                let center = lag.round() as isize;
                let sigma = off_peak_sigma(scratch, lag_lo, lag_hi, center, window, norm_product);
                (lag, peak, sigma, z_forced as f64, 0.0)
            }
            None => {
                let center = argmax_lag(scratch, lag_lo, lag_hi);
                let sigma = off_peak_sigma(scratch, lag_lo, lag_hi, center, window, norm_product);
                let (lag, peak) = refine_peak(scratch, center, norm_product);
                let z_best = self.grid.redshift_from_lag(lag);
                let z_err = self.peak_half_width_z(scratch, center, lag_lo, lag_hi, peak, sigma, norm_product, z_best);
                (lag, peak, sigma, z_best, z_err)
            }
        };

        let shift = lag_bins.round() as isize;
        let lap = overlap_fraction(input, template, shift, self.grid.num_bins);
        let ccc = if config.use_ccc {
            cosine_over_overlap(input, template, shift)
        } else {
            0.0
        };

        let rlap = corr_peak / corr_sigma.max(TINY);
        let rlap_ccc = if config.use_ccc {
            rlap * ccc.max(0.0)
        } else {
            rlap
        };
        let rejected = lap < config.lapmin || rlap < config.rlapmin;

        Match {
            template: TemplateInfo::of(template),
            z_best,
            z_err,
            lag_bins,
            rlap,
            lap,
            ccc,
            rlap_ccc,
            corr_peak,
            corr_sigma,
            rejected,
        }
    }

    /// Redshift uncertainty from the width of the peak at `peak - sigma`.
    #[allow(clippy::too_many_arguments)]
    fn peak_half_width_z(
        &self,
        scratch: &CorrScratch,
        center: isize,
        lag_lo: isize,
        lag_hi: isize,
        peak: f32,
        sigma: f32,
        norm_product: f32,
        z_best: f64,
    ) -> f64 {
        let threshold = peak - sigma;
        let mut left = center;
        while left > lag_lo && scratch.at_lag(left - 1) / norm_product > threshold {
            left -= 1;
        }
        let mut right = center;
        while right < lag_hi && scratch.at_lag(right + 1) / norm_product > threshold {
            right += 1;
        }
        let half_width = (right - left) as f64 / 2.0;
        ((half_width * self.grid.dlnw()).exp() - 1.0) * (1.0 + z_best)
    }
}

/// Linear interpolation of the raw correlation at a fractional lag.
fn interp_lag(scratch: &CorrScratch, lag: f64) -> f32 {
    let floor = lag.floor() as isize;
    let frac = (lag - floor as f64) as f32;
    scratch.at_lag(floor) * (1.0 - frac) + scratch.at_lag(floor + 1) * frac
}

fn argmax_lag(scratch: &CorrScratch, lag_lo: isize, lag_hi: isize) -> isize {
    let mut best = lag_lo;
    let mut best_value = f32::NEG_INFINITY;
    for lag in lag_lo..=lag_hi {
        let value = scratch.at_lag(lag);
        if value > best_value {
            best_value = value;
            best = lag;
        }
    }
    best
}

/// Parabolic sub-pixel refinement around the integer peak. Returns the
/// refined lag and the interpolated normalized peak height.
fn refine_peak(scratch: &CorrScratch, center: isize, norm_product: f32) -> (f64, f32) {
    let c = scratch.at_lag(center);
    let l = scratch.at_lag(center - 1);
    let r = scratch.at_lag(center + 1);
    let denom = l - 2.0 * c + r;
    let mut lag = center as f64;
    let mut peak = c;
    if denom < 0.0 {
        let delta = (0.5 * (l - r) / denom) as f64;
        let delta = delta.clamp(-0.5, 0.5);
        lag += delta;
        peak = c - 0.25 * (l - r) * delta as f32;
    }
    (lag, peak / norm_product)
}

/// RMS of the normalized correlation over the searched lags, excluding the
/// peak window. Widens to the full padded lag range when the searched range
/// leaves too few samples.
fn off_peak_sigma(
    scratch: &CorrScratch,
    lag_lo: isize,
    lag_hi: isize,
    center: isize,
    window: isize,
    norm_product: f32,
) -> f32 {
    let estimate = |lo: isize, hi: isize| -> (f64, usize) {
        let mut acc = 0.0f64;
        let mut count = 0usize;
        for lag in lo..=hi {
            if (lag - center).abs() <= window {
                continue;
            }
            let v = (scratch.at_lag(lag) / norm_product) as f64;
            acc += v * v;
            count += 1;
        }
        (acc, count)
    };

    let (mut acc, mut count) = estimate(lag_lo, lag_hi);
    if count < MIN_SIGMA_SAMPLES {
        let n = scratch.corr.len() as isize / 2;
        (acc, count) = estimate(-n + 1, n - 1);
    }
    if count == 0 {
        return TINY;
    }
    ((acc / count as f64).sqrt() as f32).max(TINY)
}

/// Jaccard overlap of the input support and the shifted template support.
fn overlap_fraction(
    input: &PreparedInput,
    template: &Template,
    shift: isize,
    num_bins: usize,
) -> f32 {
    let t_left = (template.left_edge as isize + shift).clamp(0, num_bins as isize - 1);
    let t_right = (template.right_edge as isize + shift).clamp(0, num_bins as isize - 1);
    let i_left = input.left_edge as isize;
    let i_right = input.right_edge as isize;

    let inter = (t_right.min(i_right) - t_left.max(i_left) + 1).max(0);
    let union = (t_right.max(i_right) - t_left.min(i_left) + 1).max(1);
    inter as f32 / union as f32
}

/// Cosine similarity between input and shifted template over their overlap.
fn cosine_over_overlap(input: &PreparedInput, template: &Template, shift: isize) -> f32 {
    let n = input.tapered.len() as isize;
    let lo = (template.left_edge as isize + shift)
        .max(input.left_edge as isize)
        .max(0);
    let hi = (template.right_edge as isize + shift)
        .min(input.right_edge as isize)
        .min(n - 1);
    if hi <= lo {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for j in lo..=hi {
        let a = input.tapered[j as usize] as f64;
        let b = template.flat_flux[(j - shift) as usize] as f64;
        dot += a * b;
        norm_a += a * a;
        norm_b += b * b;
    }
    let denom = (norm_a * norm_b).sqrt();
    if denom < TINY as f64 {
        return 0.0;
    }
    (dot / denom) as f32
}
