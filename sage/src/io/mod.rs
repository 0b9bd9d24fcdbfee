//! Spectrum input: normalize external files into `(wave[], flux[])`.
//!
//! Dispatches on file extension: `.fits`/`.fit` go through the minimal FITS
//! reader, everything else through the column-text reader (whitespace- or
//! comma-separated, with or without a header line). Wavelengths are assumed
//! to be in Å.

mod fits;
mod text;

use std::path::Path;

use crate::error::{Error, Result};

/// Minimum number of valid samples for a spectrum to be usable.
pub const MIN_SAMPLES: usize = 16;

/// A raw observed spectrum. Read-only once constructed.
///
/// Invariants: `wave` strictly increasing, `wave.len() == flux.len()`, all
/// values finite.
#[derive(Debug, Clone)]
pub struct Spectrum {
    pub wave: Vec<f64>,
    pub flux: Vec<f32>,
}

impl Spectrum {
    /// Build a spectrum from parallel arrays, trimming non-finite samples and
    /// sorting by wavelength (duplicate wavelengths keep the first sample).
    pub fn new(wave: Vec<f64>, flux: Vec<f32>) -> Result<Self> {
        if wave.len() != flux.len() {
            return Err(Error::internal(
                "spectrum-io",
                format!("wave/flux length mismatch: {} vs {}", wave.len(), flux.len()),
            ));
        }
        let mut samples: Vec<(f64, f32)> = wave
            .into_iter()
            .zip(flux)
            .filter(|(w, f)| w.is_finite() && *w > 0.0 && f.is_finite())
            .collect();
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));
        samples.dedup_by(|a, b| a.0 == b.0);

        if samples.len() < MIN_SAMPLES {
            return Err(Error::EmptySpectrum);
        }
        let (wave, flux) = samples.into_iter().unzip();
        Ok(Self { wave, flux })
    }

    /// Load a spectrum from a file, dispatching on the extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "fits" | "fit" => fits::load_fits(path),
            _ => text::load_columns(path),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.wave.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.wave.is_empty()
    }
}

#[cfg(test)]
mod tests;
