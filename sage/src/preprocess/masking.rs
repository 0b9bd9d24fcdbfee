//! Wavelength-domain masking: user ranges, telluric absorption, sky and
//! galaxy emission lines.

use super::PreprocConfig;

/// Telluric O2 A-band, Å.
const ABAND: (f64, f64) = (7575.0, 7675.0);

/// Bright night-sky emission lines, Å (O I 5577/6300/6364, Na D).
const SKY_LINES: [f64; 4] = [5577.34, 5889.95, 6300.30, 6363.78];
/// Half-width of the sky-line clip windows, Å.
const SKY_HALF_WIDTH: f64 = 30.0;

/// Narrow galaxy emission lines clipped by `emclip_z`, rest-frame Å:
/// [O II] 3727, Hβ, [O III] 4959/5007, [N II] 6548/6584, Hα, [S II] 6717/6731.
const EMISSION_LINES: [f64; 9] = [
    3727.3, 4861.3, 4958.9, 5006.8, 6548.1, 6562.8, 6583.6, 6716.4, 6730.8,
];

/// Zero out all configured wavelength windows.
pub fn apply_masks(wave: &[f64], flux: &mut [f32], config: &PreprocConfig) {
    for &(wmin, wmax) in &config.wavelength_masks {
        zero_range(wave, flux, wmin as f64, wmax as f64);
    }

    if config.aband_remove {
        zero_range(wave, flux, ABAND.0, ABAND.1);
    }

    if config.skyclip {
        for line in SKY_LINES {
            zero_range(wave, flux, line - SKY_HALF_WIDTH, line + SKY_HALF_WIDTH);
        }
    }

    if config.emclip_z >= 0.0 {
        let shift = 1.0 + config.emclip_z as f64;
        let half = config.emwidth as f64;
        for line in EMISSION_LINES {
            let center = line * shift;
            zero_range(wave, flux, center - half, center + half);
        }
    }
}

fn zero_range(wave: &[f64], flux: &mut [f32], wmin: f64, wmax: f64) {
    if wmax < wmin {
        return;
    }
    let start = wave.partition_point(|&w| w < wmin);
    let end = wave.partition_point(|&w| w <= wmax);
    for value in &mut flux[start..end] {
        *value = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_wave(n: usize) -> Vec<f64> {
        (0..n).map(|i| 4000.0 + i as f64 * 10.0).collect()
    }

    #[test]
    fn user_mask_zeroes_exactly_the_window() {
        let wave = linear_wave(100);
        let mut flux = vec![1.0f32; 100];
        let config = PreprocConfig {
            wavelength_masks: vec![(4200.0, 4300.0)],
            ..PreprocConfig::default()
        };
        apply_masks(&wave, &mut flux, &config);
        for (i, &f) in flux.iter().enumerate() {
            let w = wave[i];
            if (4200.0..=4300.0).contains(&w) {
                assert_eq!(f, 0.0, "wave {w}");
            } else {
                assert_eq!(f, 1.0, "wave {w}");
            }
        }
    }

    #[test]
    fn aband_clip() {
        let wave: Vec<f64> = (0..200).map(|i| 7000.0 + i as f64 * 5.0).collect();
        let mut flux = vec![2.0f32; 200];
        let config = PreprocConfig {
            aband_remove: true,
            ..PreprocConfig::default()
        };
        apply_masks(&wave, &mut flux, &config);
        let idx_7600 = wave.iter().position(|&w| w == 7600.0).unwrap();
        let idx_7500 = wave.iter().position(|&w| w == 7500.0).unwrap();
        assert_eq!(flux[idx_7600], 0.0);
        assert_eq!(flux[idx_7500], 2.0);
    }

    #[test]
    fn emission_clip_follows_redshift() {
        let wave: Vec<f64> = (0..400).map(|i| 6000.0 + i as f64 * 2.0).collect();
        let mut flux = vec![1.0f32; 400];
        let config = PreprocConfig {
            emclip_z: 0.05,
            emwidth: 20.0,
            ..PreprocConfig::default()
        };
        apply_masks(&wave, &mut flux, &config);
        // Hα at z=0.05 lands at 6890.9 Å.
        let center = 6562.8 * 1.05;
        for (i, &f) in flux.iter().enumerate() {
            if (wave[i] - center).abs() < 18.0 {
                assert_eq!(f, 0.0, "wave {}", wave[i]);
            }
        }
        assert_eq!(flux[0], 1.0);
    }

    #[test]
    fn disabled_masks_are_noops() {
        let wave = linear_wave(50);
        let mut flux = vec![1.0f32; 50];
        apply_masks(&wave, &mut flux, &PreprocConfig::default());
        assert!(flux.iter().all(|&f| f == 1.0));
    }
}
