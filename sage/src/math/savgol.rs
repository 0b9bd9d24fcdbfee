//! Savitzky-Golay smoothing.
//!
//! The filter fits a degree-`order` polynomial to each window by linear least
//! squares and takes its center value, which reduces to a fixed convolution
//! kernel. Kernels are computed directly from the normal equations.

/// Convolution kernel for a centered Savitzky-Golay filter.
///
/// `window` must be odd and `order < window`. Returns `None` for invalid
/// parameters or a singular system.
pub fn savgol_kernel(window: usize, order: usize) -> Option<Vec<f64>> {
    if window < 3 || window % 2 == 0 || order >= window {
        return None;
    }
    let half = (window / 2) as i64;
    let terms = order + 1;

    // Normal-equation matrix S[j][k] = Σ_m m^(j+k) over the window.
    let mut moments = vec![0.0f64; 2 * order + 1];
    for m in -half..=half {
        let mut power = 1.0f64;
        for moment in moments.iter_mut() {
            *moment += power;
            power *= m as f64;
        }
    }
    let mut system = vec![vec![0.0f64; terms + 1]; terms];
    for (j, row) in system.iter_mut().enumerate() {
        for k in 0..terms {
            row[k] = moments[j + k];
        }
    }
    // Right-hand side e0: evaluate the fitted polynomial at the window center.
    system[0][terms] = 1.0;

    let solution = solve_gauss(&mut system)?;

    let mut kernel = Vec::with_capacity(window);
    for m in -half..=half {
        let mut value = 0.0;
        let mut power = 1.0;
        for coeff in &solution {
            value += coeff * power;
            power *= m as f64;
        }
        kernel.push(value);
    }
    Some(kernel)
}

/// Apply a Savitzky-Golay filter with mirrored edges. Returns the input
/// unchanged when the parameters are invalid or the signal is shorter than
/// the window.
pub fn savgol_smooth(flux: &[f32], window: usize, order: usize) -> Vec<f32> {
    let Some(kernel) = savgol_kernel(window, order) else {
        return flux.to_vec();
    };
    let n = flux.len();
    if n < window {
        return flux.to_vec();
    }
    let half = (window / 2) as isize;
    let mirrored = |i: isize| -> f32 {
        let idx = if i < 0 {
            (-i) as usize
        } else if i >= n as isize {
            2 * (n - 1) - i as usize
        } else {
            i as usize
        };
        flux[idx]
    };
    (0..n as isize)
        .map(|i| {
            let mut acc = 0.0f64;
            for (k, &c) in kernel.iter().enumerate() {
                acc += c * mirrored(i + k as isize - half) as f64;
            }
            acc as f32
        })
        .collect()
}

/// Gaussian elimination with partial pivoting on an augmented matrix.
fn solve_gauss(system: &mut [Vec<f64>]) -> Option<Vec<f64>> {
    let n = system.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&a, &b| system[a][col].abs().total_cmp(&system[b][col].abs()))?;
        if system[pivot][col].abs() < 1e-12 {
            return None;
        }
        system.swap(col, pivot);
        for row in col + 1..n {
            let factor = system[row][col] / system[col][col];
            for k in col..=n {
                system[row][k] -= factor * system[col][k];
            }
        }
    }
    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let mut acc = system[row][n];
        for k in row + 1..n {
            acc -= system[row][k] * solution[k];
        }
        solution[row] = acc / system[row][row];
    }
    Some(solution)
}
