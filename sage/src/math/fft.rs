//! FFT plumbing for cross-correlation.
//!
//! Plans are cached per grid size and shared read-only across scoring
//! workers; each worker owns a [`CorrScratch`] so the hot loop never
//! allocates. Spectra are length `N` on the grid but transformed at length
//! `2N` (zero-padded) to avoid circular wrap in the correlation.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Cached forward/inverse FFT plans of length `2 * num_bins`.
pub struct CorrelationFft {
    num_bins: usize,
    padded_len: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for CorrelationFft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelationFft")
            .field("num_bins", &self.num_bins)
            .field("padded_len", &self.padded_len)
            .finish()
    }
}

/// Per-worker scratch buffers for one correlation.
pub struct CorrScratch {
    /// Frequency-domain product buffer, length `2N`.
    freq: Vec<Complex<f32>>,
    /// rustfft in-place scratch.
    fft_scratch: Vec<Complex<f32>>,
    /// Correlation output in FFT index order, length `2N`.
    pub corr: Vec<f32>,
}

impl CorrelationFft {
    pub fn new(num_bins: usize) -> Self {
        assert!(num_bins.is_power_of_two(), "grid size must be a power of two");
        let padded_len = num_bins * 2;
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(padded_len);
        let inverse = planner.plan_fft_inverse(padded_len);
        Self {
            num_bins,
            padded_len,
            forward,
            inverse,
        }
    }

    #[inline]
    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    #[inline]
    pub fn padded_len(&self) -> usize {
        self.padded_len
    }

    /// Forward transform of a real length-`N` signal, zero-padded to `2N`.
    /// Allocating; used once per analysis input and once per template at
    /// library load.
    pub fn forward_padded(&self, flux: &[f32]) -> Vec<Complex<f32>> {
        assert_eq!(flux.len(), self.num_bins);
        let mut buf: Vec<Complex<f32>> = flux
            .iter()
            .map(|&v| Complex::new(v, 0.0))
            .chain(std::iter::repeat(Complex::new(0.0, 0.0)).take(self.num_bins))
            .collect();
        self.forward.process(&mut buf);
        buf
    }

    pub fn make_scratch(&self) -> CorrScratch {
        let scratch_len = self
            .inverse
            .get_inplace_scratch_len()
            .max(self.forward.get_inplace_scratch_len());
        CorrScratch {
            freq: vec![Complex::new(0.0, 0.0); self.padded_len],
            fft_scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            corr: vec![0.0; self.padded_len],
        }
    }

    /// Cross-correlation of two pre-transformed signals.
    ///
    /// Fills `scratch.corr` with `C[k] = Σ_m a[m + k] · b[m]` in FFT index
    /// order: lag `k ≥ 0` at index `k`, lag `k < 0` at index `2N + k`.
    /// A positive lag means features of `a` sit at higher bins than in `b`.
    pub fn cross_correlate(
        &self,
        a_fft: &[Complex<f32>],
        b_fft: &[Complex<f32>],
        scratch: &mut CorrScratch,
    ) {
        assert_eq!(a_fft.len(), self.padded_len);
        assert_eq!(b_fft.len(), self.padded_len);
        for ((dst, &a), &b) in scratch.freq.iter_mut().zip(a_fft).zip(b_fft) {
            *dst = a * b.conj();
        }
        self.inverse
            .process_with_scratch(&mut scratch.freq, &mut scratch.fft_scratch);
        let norm = 1.0 / self.padded_len as f32;
        for (dst, src) in scratch.corr.iter_mut().zip(&scratch.freq) {
            *dst = src.re * norm;
        }
    }
}

impl CorrScratch {
    /// Correlation value at a signed lag, handling FFT wraparound.
    #[inline]
    pub fn at_lag(&self, lag: isize) -> f32 {
        let len = self.corr.len() as isize;
        let idx = lag.rem_euclid(len) as usize;
        self.corr[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correlate(a: &[f32], b: &[f32]) -> CorrScratch {
        let fft = CorrelationFft::new(a.len());
        let a_fft = fft.forward_padded(a);
        let b_fft = fft.forward_padded(b);
        let mut scratch = fft.make_scratch();
        fft.cross_correlate(&a_fft, &b_fft, &mut scratch);
        scratch
    }

    #[test]
    fn zero_lag_peak_for_identical_signals() {
        let signal: Vec<f32> = (0..64)
            .map(|i| (-((i as f32 - 32.0) / 4.0).powi(2)).exp())
            .collect();
        let scratch = correlate(&signal, &signal);
        let energy: f32 = signal.iter().map(|v| v * v).sum();
        assert!((scratch.at_lag(0) - energy).abs() < 1e-3);
        for lag in 1..32isize {
            assert!(scratch.at_lag(lag) <= scratch.at_lag(0) + 1e-6);
            assert!(scratch.at_lag(-lag) <= scratch.at_lag(0) + 1e-6);
        }
    }

    #[test]
    fn shifted_signal_peaks_at_shift() {
        let n = 128usize;
        let template: Vec<f32> = (0..n)
            .map(|i| (-((i as f32 - 40.0) / 3.0).powi(2)).exp())
            .collect();
        // Input = template moved 17 bins redward.
        let mut input = vec![0.0f32; n];
        for i in 0..n - 17 {
            input[i + 17] = template[i];
        }
        let scratch = correlate(&input, &template);
        let best = (-(n as isize) + 1..n as isize)
            .max_by(|&a, &b| scratch.at_lag(a).total_cmp(&scratch.at_lag(b)))
            .unwrap();
        assert_eq!(best, 17);
    }

    #[test]
    fn zero_padding_prevents_wraparound_mixing() {
        // A feature at the far left of `a` and far right of `b`: without
        // padding, the circular correlation would alias their true (large
        // negative) lag into a small positive one.
        let n = 64usize;
        let mut a = vec![0.0f32; n];
        let mut b = vec![0.0f32; n];
        a[2] = 1.0;
        b[n - 3] = 1.0;
        let scratch = correlate(&a, &b);
        let expected = 2isize - (n as isize - 3);
        let best = (-(n as isize) + 1..n as isize)
            .max_by(|&x, &y| scratch.at_lag(x).total_cmp(&scratch.at_lag(y)))
            .unwrap();
        assert_eq!(best, expected);
    }
}
