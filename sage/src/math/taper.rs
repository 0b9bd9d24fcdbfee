//! Cosine (Tukey-style) apodization of the active region of a spectrum.

/// Taper weights applied to the outermost `percent`% of the active region
/// `[left, right]` (inclusive) on each side: half a cosine rising from 0 at
/// the edge toward 1 in the interior. Samples outside the active region are
/// untouched.
pub fn apodize(flux: &mut [f32], left: usize, right: usize, percent: f32) {
    if percent <= 0.0 || right <= left || right >= flux.len() {
        return;
    }
    let active_len = right - left + 1;
    let ntaper = ((percent as f64 / 100.0) * active_len as f64).round() as usize;
    let ntaper = ntaper.min(active_len / 2);
    if ntaper == 0 {
        return;
    }
    for j in 0..ntaper {
        let w = 0.5 * (1.0 - (std::f64::consts::PI * j as f64 / ntaper as f64).cos()) as f32;
        flux[left + j] *= w;
        flux[right - j] *= w;
    }
}

/// The taper weight applied at offset `j` from the active-region edge, for a
/// taper of `ntaper` bins. Exposed for tests.
#[cfg(test)]
pub fn taper_weight(j: usize, ntaper: usize) -> f32 {
    if j >= ntaper {
        1.0
    } else {
        0.5 * (1.0 - (std::f64::consts::PI * j as f64 / ntaper as f64).cos()) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taper_never_amplifies_and_is_monotone_from_edge() {
        let mut flux = vec![1.0f32; 100];
        let original = flux.clone();
        apodize(&mut flux, 10, 89, 20.0);
        for i in 0..flux.len() {
            assert!(flux[i].abs() <= original[i].abs() + 1e-7);
        }
        // 20% of 80 bins = 16 taper bins on each side.
        for j in 1..16 {
            assert!(flux[10 + j] >= flux[10 + j - 1]);
            assert!(flux[89 - j] >= flux[89 - j + 1]);
        }
        assert_eq!(flux[10], 0.0);
        assert_eq!(flux[89], 0.0);
        // Interior untouched.
        assert_eq!(flux[50], 1.0);
    }

    #[test]
    fn zero_percent_is_identity() {
        let mut flux = vec![0.5f32; 32];
        apodize(&mut flux, 0, 31, 0.0);
        assert!(flux.iter().all(|&v| v == 0.5));
    }

    #[test]
    fn weight_endpoints() {
        assert_eq!(taper_weight(0, 8), 0.0);
        assert_eq!(taper_weight(8, 8), 1.0);
        assert!((taper_weight(4, 8) - 0.5).abs() < 1e-6);
    }
}
