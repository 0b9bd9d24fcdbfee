//! Deterministic preprocessing: raw `(wave, flux)` to a flattened, apodized
//! spectrum on the shared log-wavelength grid.
//!
//! # Pipeline stages
//!
//! 1. **Spike removal** (optional) - residuals against a running-median
//!    baseline, flagged by robust sigma and neighbor ratio.
//! 2. **Wavelength masking** (optional) - user ranges, telluric A-band, sky
//!    emission lines, narrow emission lines at a known redshift.
//! 3. **Savitzky-Golay smoothing** (optional, off by default).
//! 4. **Log-rebinning** - flux-conserving rebin onto the grid.
//! 5. **Edge detection** - first/last bins with signal.
//! 6. **Continuum fit and flattening** - smoothing spline over the active
//!    region (linear fallback on degeneracy), then `flux/continuum - 1`
//!    with the active-region mean subtracted.
//! 7. **Apodization** - cosine taper of the active-region edges.

mod continuum;
mod masking;
mod rebin;
mod spikes;


use crate::error::{Error, Result};
use crate::grid::LogGrid;
use crate::io::Spectrum;
use crate::math::savgol;
use crate::math::taper;
use crate::trace::Trace;

// ============================================================================
// Configuration
// ============================================================================

/// Preprocessing parameters. Defaults follow common transient-survey
/// reduction practice; every stage except rebinning and edge detection can
/// be disabled.
#[derive(Debug, Clone)]
pub struct PreprocConfig {
    /// Remove single-pixel spikes (cosmic rays, hot pixels) against a
    /// running-median baseline.
    pub spike_masking: bool,
    /// Robust-sigma threshold for the spike residual.
    pub spike_floor_z: f32,
    /// Running-median window in samples; forced odd.
    pub spike_baseline_window: usize,
    /// A spike must exceed both immediate neighbor residuals by this factor.
    pub spike_rel_edge_ratio: f32,
    /// Minimum number of samples between consecutive removals.
    pub spike_min_separation: usize,
    /// Minimum absolute residual for a spike; 0 disables the floor.
    pub spike_min_residual: f32,
    /// Savitzky-Golay window in samples; 0 disables smoothing. Forced odd.
    pub savgol_window: usize,
    /// Savitzky-Golay polynomial order.
    pub savgol_order: usize,
    /// Zero the telluric A-band (7575-7675 Å).
    pub aband_remove: bool,
    /// Zero narrow windows around bright night-sky emission lines.
    pub skyclip: bool,
    /// Clip narrow galaxy emission lines at this redshift; negative disables.
    pub emclip_z: f32,
    /// Half-width in Å of the emission-line clip windows.
    pub emwidth: f32,
    /// User-supplied `[wmin, wmax]` ranges to zero out, in Å.
    pub wavelength_masks: Vec<(f32, f32)>,
    /// Percent of the active region tapered on each side.
    pub apodize_percent: f32,
}

impl Default for PreprocConfig {
    fn default() -> Self {
        Self {
            spike_masking: true,
            spike_floor_z: 50.0,
            spike_baseline_window: 501,
            spike_rel_edge_ratio: 1.5,
            spike_min_separation: 2,
            spike_min_residual: 0.0,
            savgol_window: 0,
            savgol_order: 3,
            aband_remove: false,
            skyclip: false,
            emclip_z: -1.0,
            emwidth: 40.0,
            wavelength_masks: Vec::new(),
            apodize_percent: 10.0,
        }
    }
}

impl PreprocConfig {
    pub fn validate(&self) {
        assert!(self.spike_floor_z > 0.0, "spike_floor_z must be positive");
        assert!(
            self.spike_baseline_window >= 3,
            "spike baseline window too small"
        );
        if self.savgol_window > 0 {
            assert!(
                self.savgol_order < self.savgol_window,
                "savgol_order must be smaller than savgol_window"
            );
        }
        assert!(
            (0.0..=50.0).contains(&self.apodize_percent),
            "apodize_percent must be in [0, 50]"
        );
    }
}

// ============================================================================
// Output
// ============================================================================

/// A spectrum flattened and apodized on the shared grid.
///
/// Outside `[left_edge, right_edge]`, `flat_flux` and `tapered_flux` are
/// exactly zero. Over the active region `flat_flux` has zero mean.
#[derive(Debug, Clone)]
pub struct ProcessedSpectrum {
    pub grid: LogGrid,
    /// Rebinned flux on the grid, before flattening.
    pub log_flux: Vec<f32>,
    /// Continuum-divided, mean-subtracted flux.
    pub flat_flux: Vec<f32>,
    /// The fitted continuum; 0 outside the active region.
    pub continuum: Vec<f32>,
    /// `flat_flux` with the cosine taper applied.
    pub tapered_flux: Vec<f32>,
    /// First grid bin with signal.
    pub left_edge: usize,
    /// Last grid bin with signal (inclusive).
    pub right_edge: usize,
    /// Bins carrying signal (`log_flux != 0`).
    pub nonzero_mask: Vec<bool>,
}

impl ProcessedSpectrum {
    /// Active region as a half-open range.
    #[inline]
    pub fn active_range(&self) -> std::ops::Range<usize> {
        self.left_edge..self.right_edge + 1
    }

    /// ln(λ) of every grid point: `ln(min_wave) + i * dlnw`.
    pub fn log_wave(&self) -> Vec<f64> {
        (0..self.grid.num_bins)
            .map(|i| self.grid.ln_wave_at(i))
            .collect()
    }
}

// ============================================================================
// Entry point
// ============================================================================

/// Run the preprocessing pipeline. `trace` collects decision points and
/// recoverable problems (e.g. a continuum fallback).
pub fn preprocess(
    spectrum: &Spectrum,
    grid: &LogGrid,
    config: &PreprocConfig,
    trace: &mut Trace,
) -> Result<ProcessedSpectrum> {
    config.validate();
    let wave = &spectrum.wave;
    let mut flux = spectrum.flux.clone();

    if config.spike_masking {
        let removed = spikes::remove_spikes(&mut flux, config);
        if removed > 0 {
            trace.note("preprocess", format!("removed {removed} spike(s)"));
        }
    }

    masking::apply_masks(wave, &mut flux, config);

    if config.savgol_window >= 3 {
        let window = config.savgol_window | 1;
        flux = savgol::savgol_smooth(&flux, window, config.savgol_order);
    }

    let log_flux = rebin::log_rebin(wave, &flux, grid);

    let left_edge = log_flux.iter().position(|&v| v != 0.0);
    let right_edge = log_flux.iter().rposition(|&v| v != 0.0);
    let (left_edge, right_edge) = match (left_edge, right_edge) {
        (Some(l), Some(r)) if r > l => (l, r),
        _ => return Err(Error::EmptySpectrum),
    };

    let continuum = continuum::fit_continuum(&log_flux, left_edge, right_edge, trace);

    // Bins carry signal only where the rebinned flux is nonzero and the
    // continuum is usable.
    let nonzero_mask: Vec<bool> = log_flux
        .iter()
        .zip(&continuum)
        .map(|(&f, &c)| f != 0.0 && c > 0.0)
        .collect();

    // Flatten: flux / continuum - 1 over bins with signal, then remove the
    // mean so the correlation sees a zero-mean signal.
    let mut flat_flux = vec![0.0f32; grid.num_bins];
    for i in left_edge..=right_edge {
        if nonzero_mask[i] {
            flat_flux[i] = log_flux[i] / continuum[i] - 1.0;
        }
    }
    let signal_bins = nonzero_mask[left_edge..=right_edge]
        .iter()
        .filter(|&&m| m)
        .count();
    if signal_bins > 0 {
        let mean: f32 = (left_edge..=right_edge)
            .filter(|&i| nonzero_mask[i])
            .map(|i| flat_flux[i])
            .sum::<f32>()
            / signal_bins as f32;
        for i in left_edge..=right_edge {
            if nonzero_mask[i] {
                flat_flux[i] -= mean;
            }
        }
    }

    let mut tapered_flux = flat_flux.clone();
    taper::apodize(
        &mut tapered_flux,
        left_edge,
        right_edge,
        config.apodize_percent,
    );

    Ok(ProcessedSpectrum {
        grid: *grid,
        log_flux,
        flat_flux,
        continuum,
        tapered_flux,
        left_edge,
        right_edge,
        nonzero_mask,
    })
}
