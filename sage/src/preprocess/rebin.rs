//! Flux-conserving rebin from an arbitrary wavelength sampling onto the
//! shared log-wavelength grid.
//!
//! Input samples are treated as piecewise-constant flux density over bins
//! bounded by the geometric midpoints of adjacent wavelengths. Each grid bin
//! gets the coverage-weighted mean of the overlapping input bins; grid bins
//! with no coverage are 0.

use crate::grid::LogGrid;

pub fn log_rebin(wave: &[f64], flux: &[f32], grid: &LogGrid) -> Vec<f32> {
    let n = wave.len();
    let mut out = vec![0.0f32; grid.num_bins];
    if n < 2 {
        return out;
    }

    // Input bin edges: geometric midpoints, reflected at the ends.
    let mut edges = Vec::with_capacity(n + 1);
    edges.push(wave[0] * (wave[0] / (wave[0] * wave[1]).sqrt()));
    for i in 0..n - 1 {
        edges.push((wave[i] * wave[i + 1]).sqrt());
    }
    edges.push(wave[n - 1] * (wave[n - 1] / (wave[n - 2] * wave[n - 1]).sqrt()));

    let mut src = 0usize;
    for bin in 0..grid.num_bins {
        let bin_lo = grid.edge(bin);
        let bin_hi = grid.edge(bin + 1);

        // Skip input bins entirely blueward of this grid bin.
        while src < n && edges[src + 1] <= bin_lo {
            src += 1;
        }
        if src >= n || edges[src] >= bin_hi {
            continue;
        }

        let mut weighted = 0.0f64;
        let mut coverage = 0.0f64;
        let mut j = src;
        while j < n && edges[j] < bin_hi {
            let overlap = edges[j + 1].min(bin_hi) - edges[j].max(bin_lo);
            if overlap > 0.0 {
                weighted += flux[j] as f64 * overlap;
                coverage += overlap;
            }
            j += 1;
        }
        if coverage > 0.0 {
            out[bin] = (weighted / coverage) as f32;
        }
    }
    out
}
