//! The shared log-wavelength grid.
//!
//! Every spectrum inside the core lives on one fixed grid G: `num_bins`
//! points uniformly spaced in ln(λ). Templates are pre-rebinned onto G at
//! library build time; the input is rebinned at analysis time. Correlation
//! lags are measured in grid bins, so a shift of `k` bins corresponds to a
//! multiplicative redshift factor: `1 + z = exp(k · dlnw)`.

use serde::{Deserialize, Serialize};

/// Default number of grid bins. Power of two so FFT lengths stay cheap.
pub const DEFAULT_NUM_BINS: usize = 1024;
/// Default blue end of the grid in Å.
pub const DEFAULT_MIN_WAVE: f64 = 2500.0;
/// Default red end of the grid in Å.
pub const DEFAULT_MAX_WAVE: f64 = 10000.0;

/// Fixed log-wavelength grid shared by all spectra in one library.
///
/// Grid point `i` sits at `min_wave * exp(i * dlnw)`, so
/// `ln_wave_at(i) = ln(min_wave) + i * dlnw`. For rebinning, each point owns
/// the bin centered on it: `[edge(i), edge(i + 1))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogGrid {
    /// Number of grid points. Must be a power of two.
    pub num_bins: usize,
    /// Wavelength λ₀ of grid point 0, in Å.
    pub min_wave: f64,
    /// Upper wavelength bound: one logarithmic step past the last point.
    pub max_wave: f64,
}

impl Default for LogGrid {
    fn default() -> Self {
        Self::new(DEFAULT_NUM_BINS, DEFAULT_MIN_WAVE, DEFAULT_MAX_WAVE)
    }
}

impl LogGrid {
    pub fn new(num_bins: usize, min_wave: f64, max_wave: f64) -> Self {
        assert!(num_bins.is_power_of_two(), "grid size must be a power of two");
        assert!(min_wave > 0.0 && max_wave > min_wave, "invalid wavelength range");
        Self {
            num_bins,
            min_wave,
            max_wave,
        }
    }

    /// Logarithmic bin width `dlnw = ln(max/min) / num_bins`.
    #[inline]
    pub fn dlnw(&self) -> f64 {
        (self.max_wave / self.min_wave).ln() / self.num_bins as f64
    }

    /// Wavelength of grid point `i` (Å).
    #[inline]
    pub fn wave_at(&self, i: usize) -> f64 {
        self.min_wave * (i as f64 * self.dlnw()).exp()
    }

    /// ln(wavelength) of grid point `i`: `ln(min_wave) + i * dlnw`.
    #[inline]
    pub fn ln_wave_at(&self, i: usize) -> f64 {
        self.min_wave.ln() + i as f64 * self.dlnw()
    }

    /// Left edge of the bin centered on grid point `i`. Valid for
    /// `i ∈ 0..=num_bins`, so `edge(num_bins)` closes the last bin.
    #[inline]
    pub fn edge(&self, i: usize) -> f64 {
        self.min_wave * ((i as f64 - 0.5) * self.dlnw()).exp()
    }

    /// Redshift implied by a correlation lag in grid bins (may be fractional).
    #[inline]
    pub fn redshift_from_lag(&self, lag: f64) -> f64 {
        (lag * self.dlnw()).exp() - 1.0
    }

    /// Correlation lag in grid bins implied by a redshift.
    #[inline]
    pub fn lag_from_redshift(&self, z: f64) -> f64 {
        (1.0 + z).ln() / self.dlnw()
    }

    /// Grid point wavelengths as an array (Å). Allocates.
    pub fn wave_axis(&self) -> Vec<f64> {
        (0..self.num_bins).map(|i| self.wave_at(i)).collect()
    }
}
