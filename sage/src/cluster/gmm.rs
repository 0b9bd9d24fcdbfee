//! Weighted Gaussian Mixture Model in two dimensions.
//!
//! Full 2x2 covariances, sample weights in both the E and M steps, seeded
//! k-means++ initialization so fits are reproducible, and BIC for model
//! selection. Everything is deterministic for a fixed seed and input order.

use glam::{DMat2, DVec2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MAX_ITERATIONS: usize = 100;
const LL_TOLERANCE: f64 = 1e-6;
/// Relative covariance regularization floor.
const COV_REG_FRACTION: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct GmmComponent {
    /// Mixing proportion.
    pub weight: f64,
    pub mean: DVec2,
    pub cov: DMat2,
}

#[derive(Debug, Clone)]
pub struct GmmFit {
    pub components: Vec<GmmComponent>,
    /// Hard assignment of each point to its argmax-responsibility component.
    pub assignments: Vec<usize>,
    pub log_likelihood: f64,
    pub bic: f64,
}

/// Fit mixtures for `k = 1..=k_max` and return the fit with the lowest BIC.
pub fn best_fit_by_bic(
    points: &[DVec2],
    weights: &[f64],
    k_max: usize,
    seed: u64,
) -> Option<GmmFit> {
    let k_max = k_max.min(points.len());
    let mut best: Option<GmmFit> = None;
    for k in 1..=k_max {
        let Some(fit) = fit_weighted(points, weights, k, seed) else {
            continue;
        };
        if best.as_ref().map_or(true, |b| fit.bic < b.bic) {
            best = Some(fit);
        }
    }
    best
}

/// One weighted EM fit with `k` components.
pub fn fit_weighted(points: &[DVec2], weights: &[f64], k: usize, seed: u64) -> Option<GmmFit> {
    let n = points.len();
    if k == 0 || n < k || weights.len() != n {
        return None;
    }
    let total_weight: f64 = weights.iter().sum();
    if total_weight <= 0.0 {
        return None;
    }

    let reg = regularization(points, weights, total_weight);
    let mut components = initialize(points, weights, k, seed, reg);
    let mut responsibilities = vec![0.0f64; n * k];
    let mut previous_ll = f64::NEG_INFINITY;
    let mut log_likelihood = f64::NEG_INFINITY;

    for _ in 0..MAX_ITERATIONS {
        // E step: weighted responsibilities via log-sum-exp.
        log_likelihood = 0.0;
        for (i, point) in points.iter().enumerate() {
            let logs: Vec<f64> = components
                .iter()
                .map(|c| c.weight.max(f64::MIN_POSITIVE).ln() + log_gauss(point, c))
                .collect();
            let max_log = logs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let sum_exp: f64 = logs.iter().map(|l| (l - max_log).exp()).sum();
            let log_norm = max_log + sum_exp.ln();
            for (j, l) in logs.iter().enumerate() {
                responsibilities[i * k + j] = (l - log_norm).exp();
            }
            // Normalize sample weights to an effective count of n.
            log_likelihood += weights[i] * n as f64 / total_weight * log_norm;
        }

        // M step with sample weights folded into the responsibilities.
        for (j, component) in components.iter_mut().enumerate() {
            let mut mass = 0.0f64;
            let mut mean = DVec2::ZERO;
            for (i, point) in points.iter().enumerate() {
                let r = responsibilities[i * k + j] * weights[i];
                mass += r;
                mean += *point * r;
            }
            if mass < total_weight * 1e-12 {
                return None;
            }
            let mean = mean / mass;
            let mut cov = DMat2::ZERO;
            for (i, point) in points.iter().enumerate() {
                let r = responsibilities[i * k + j] * weights[i];
                let d = *point - mean;
                cov += DMat2::from_cols(d * d.x, d * d.y) * r;
            }
            cov = cov * (1.0 / mass) + DMat2::from_diagonal(DVec2::splat(reg));
            component.weight = mass / total_weight;
            component.mean = mean;
            component.cov = cov;
        }

        if (log_likelihood - previous_ll).abs() < LL_TOLERANCE * (1.0 + log_likelihood.abs()) {
            break;
        }
        previous_ll = log_likelihood;
    }

    let assignments = points
        .iter()
        .enumerate()
        .map(|(i, _)| {
            (0..k)
                .max_by(|&a, &b| {
                    responsibilities[i * k + a].total_cmp(&responsibilities[i * k + b])
                })
                .unwrap_or(0)
        })
        .collect();

    // Free parameters: k-1 mixing weights, 2k means, 3k covariance entries.
    let params = (6 * k - 1) as f64;
    let bic = -2.0 * log_likelihood + params * (n as f64).ln();

    Some(GmmFit {
        components,
        assignments,
        log_likelihood,
        bic,
    })
}

/// Log density of a 2-D Gaussian.
fn log_gauss(point: &DVec2, component: &GmmComponent) -> f64 {
    let det = component.cov.determinant().max(f64::MIN_POSITIVE);
    let inv = component.cov.inverse();
    let d = *point - component.mean;
    let mahalanobis = d.dot(inv * d);
    -(2.0 * std::f64::consts::PI).ln() - 0.5 * det.ln() - 0.5 * mahalanobis
}

/// Covariance floor: a small fraction of the average per-dimension variance.
fn regularization(points: &[DVec2], weights: &[f64], total_weight: f64) -> f64 {
    let mut mean = DVec2::ZERO;
    for (p, &w) in points.iter().zip(weights) {
        mean += *p * w;
    }
    mean /= total_weight;
    let mut var = 0.0f64;
    for (p, &w) in points.iter().zip(weights) {
        let d = *p - mean;
        var += w * (d.x * d.x + d.y * d.y) * 0.5;
    }
    var /= total_weight;
    (var * COV_REG_FRACTION).max(1e-10)
}

/// Weighted k-means++ seeding; covariances start from the regularized
/// global spread, mixing weights uniform.
fn initialize(
    points: &[DVec2],
    weights: &[f64],
    k: usize,
    seed: u64,
    reg: f64,
) -> Vec<GmmComponent> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centers: Vec<DVec2> = Vec::with_capacity(k);

    // First center: weighted draw.
    centers.push(points[weighted_draw(&mut rng, weights)]);
    while centers.len() < k {
        let distances: Vec<f64> = points
            .iter()
            .map(|p| {
                centers
                    .iter()
                    .map(|c| p.distance_squared(*c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let combined: Vec<f64> = distances
            .iter()
            .zip(weights)
            .map(|(d, w)| d * w)
            .collect();
        centers.push(points[weighted_draw(&mut rng, &combined)]);
    }

    // Global covariance for the initial spread.
    let total_weight: f64 = weights.iter().sum();
    let mut mean = DVec2::ZERO;
    for (p, &w) in points.iter().zip(weights) {
        mean += *p * w;
    }
    mean /= total_weight;
    let mut cov = DMat2::ZERO;
    for (p, &w) in points.iter().zip(weights) {
        let d = *p - mean;
        cov += DMat2::from_cols(d * d.x, d * d.y) * w;
    }
    cov = cov * (1.0 / total_weight) + DMat2::from_diagonal(DVec2::splat(reg));

    centers
        .into_iter()
        .map(|mean| GmmComponent {
            weight: 1.0 / k as f64,
            mean,
            cov,
        })
        .collect()
}

/// Draw an index proportional to `weights`; falls back to the largest weight
/// when the distribution degenerates.
fn weighted_draw(rng: &mut StdRng, weights: &[f64]) -> usize {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return weights
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);
    }
    let mut target = rng.gen::<f64>() * total;
    for (i, &w) in weights.iter().enumerate() {
        target -= w;
        if target <= 0.0 {
            return i;
        }
    }
    weights.len() - 1
}
