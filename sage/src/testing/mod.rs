//! Synthetic spectra and libraries for tests.
//!
//! The generators produce smooth continua with type-specific Gaussian
//! features, so type buckets are mutually distinguishable and a template
//! correlated against itself produces a sharp, high-significance peak.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::grid::LogGrid;
use crate::io::Spectrum;
use crate::preprocess::{preprocess, PreprocConfig, ProcessedSpectrum};
use crate::template::{TemplateLibrary, TemplateRecord};
use crate::trace::Trace;

/// Initialize a tracing subscriber for tests. Safe to call repeatedly.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// A spectral feature: Gaussian with `depth < 0` for absorption.
#[derive(Debug, Clone, Copy)]
pub struct Feature {
    pub center: f64,
    pub width: f64,
    pub depth: f64,
}

/// Si II / S II / Ca II -like absorption pattern.
pub fn ia_features() -> Vec<Feature> {
    vec![
        Feature { center: 3950.0, width: 60.0, depth: -0.25 },
        Feature { center: 4300.0, width: 80.0, depth: -0.15 },
        Feature { center: 5000.0, width: 70.0, depth: -0.18 },
        Feature { center: 5450.0, width: 50.0, depth: -0.12 },
        Feature { center: 6150.0, width: 80.0, depth: -0.30 },
        Feature { center: 8200.0, width: 120.0, depth: -0.20 },
    ]
}

/// Balmer-dominated pattern with P-Cygni-like emission.
pub fn ii_features() -> Vec<Feature> {
    vec![
        Feature { center: 4340.0, width: 50.0, depth: -0.10 },
        Feature { center: 4861.0, width: 60.0, depth: -0.14 },
        Feature { center: 5169.0, width: 50.0, depth: -0.08 },
        Feature { center: 6563.0, width: 70.0, depth: 0.35 },
        Feature { center: 6450.0, width: 50.0, depth: -0.15 },
        Feature { center: 7100.0, width: 60.0, depth: -0.06 },
    ]
}

/// Sample a smooth continuum plus features over `3200-9600` Å at 2 Å steps.
pub fn synthetic_spectrum(features: &[Feature], scale: f64) -> Spectrum {
    let wave: Vec<f64> = (0..3200).map(|i| 3200.0 + i as f64 * 2.0).collect();
    let flux: Vec<f32> = wave
        .iter()
        .map(|&w| {
            let x = (w - 3200.0) / 6400.0;
            let continuum = 100.0 * (1.0 - 0.35 * x);
            let modulation: f64 = features
                .iter()
                .map(|f| f.depth * (-((w - f.center) / f.width).powi(2)).exp())
                .sum();
            (scale * continuum * (1.0 + modulation)) as f32
        })
        .collect();
    Spectrum { wave, flux }
}

/// Shift a spectrum to redshift `z` (observed wavelengths stretched).
pub fn redshift_spectrum(spectrum: &Spectrum, z: f64) -> Spectrum {
    Spectrum {
        wave: spectrum.wave.iter().map(|w| w * (1.0 + z)).collect(),
        flux: spectrum.flux.clone(),
    }
}

/// Add seeded Gaussian noise with sigma expressed as a fraction of the mean
/// flux level.
pub fn add_noise(spectrum: &Spectrum, sigma_frac: f64, seed: u64) -> Spectrum {
    let mut rng = StdRng::seed_from_u64(seed);
    let mean = spectrum.flux.iter().map(|&f| f as f64).sum::<f64>() / spectrum.flux.len() as f64;
    let sigma = (mean * sigma_frac) as f32;
    let flux = spectrum
        .flux
        .iter()
        .map(|&f| {
            // Box-Muller from two uniform draws.
            let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
            let u2: f64 = rng.gen();
            let gauss = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
            f + sigma * gauss as f32
        })
        .collect();
    Spectrum {
        wave: spectrum.wave.clone(),
        flux,
    }
}

/// Preprocess a raw spectrum with default settings.
pub fn process(spectrum: &Spectrum, grid: &LogGrid) -> ProcessedSpectrum {
    let mut trace = Trace::new();
    preprocess(spectrum, grid, &PreprocConfig::default(), &mut trace)
        .expect("synthetic spectrum should preprocess")
}

/// Template record for one epoch of a synthetic type. Epochs vary feature
/// depth and width slightly so they are distinct but mutually consistent.
pub fn epoch_record(
    grid: &LogGrid,
    name: &str,
    sn_type: &str,
    subtype: &str,
    features: &[Feature],
    epoch: usize,
) -> TemplateRecord {
    // Alternate the sign of the depth change across features so epochs
    // differ in shape (not just scale) while every line stays at its rest
    // wavelength.
    let varied: Vec<Feature> = features
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            Feature {
                center: f.center,
                width: f.width * (1.0 + 0.02 * epoch as f64),
                depth: f.depth * (1.0 + 0.06 * sign * epoch as f64),
            }
        })
        .collect();
    let spectrum = synthetic_spectrum(&varied, 1.0);
    let processed = process(&spectrum, grid);
    let mut record = TemplateRecord::from_processed(
        name,
        sn_type,
        subtype,
        -5.0 + 5.0 * epoch as f32,
        &processed,
    );
    record.quality_score = 1.0;
    record
}

/// A small two-type library: `n_ia` Ia epochs and `n_ii` II epochs.
pub fn build_test_library(grid: &LogGrid, n_ia: usize, n_ii: usize) -> TemplateLibrary {
    let mut buckets: BTreeMap<String, Vec<TemplateRecord>> = BTreeMap::new();
    if n_ia > 0 {
        let ia = (0..n_ia)
            .map(|e| {
                let subtype = if e % 3 == 2 { "Ia-91T" } else { "Ia-norm" };
                epoch_record(grid, &format!("sn_ia_{e:02}"), "Ia", subtype, &ia_features(), e)
            })
            .collect();
        buckets.insert("Ia".to_string(), ia);
    }
    if n_ii > 0 {
        let ii = (0..n_ii)
            .map(|e| {
                epoch_record(grid, &format!("sn_ii_{e:02}"), "II", "IIP", &ii_features(), e)
            })
            .collect();
        buckets.insert("II".to_string(), ii);
    }
    TemplateLibrary::build(*grid, buckets).expect("synthetic library should build")
}
