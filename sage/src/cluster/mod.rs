//! Type-aware cluster selection over the accepted matches.
//!
//! Matches are partitioned by template type; each type with enough accepted
//! matches is clustered with a weighted GMM in `(z, ln rlap_ccc)` space. A
//! cluster's score is the rlap_ccc it accumulates, damped by how tight it is
//! in redshift and age; the winning cluster defines the classification and
//! the consensus estimates. When nothing clears the score threshold the
//! classification is "unknown" - there is deliberately no best-of-all-matches
//! fallback.

mod gmm;


use std::collections::BTreeMap;

use glam::DVec2;
use serde::Serialize;
use tracing::debug;

use crate::correlate::Match;
use crate::math::joint_weighted_stats;
use crate::trace::Trace;

/// Seed for the deterministic GMM initialization.
const GMM_SEED: u64 = 0x5a9e;

// ============================================================================
// Configuration
// ============================================================================

/// Clustering parameters.
#[derive(Debug, Clone)]
pub struct ClusteringConfig {
    /// Minimum cluster score (summed rlap_ccc) for eligibility.
    pub rlap_ccc_threshold: f32,
    /// Maximum number of GMM components per type.
    pub k_max: usize,
    /// Minimum accepted matches for a type to be clustered at all.
    pub min_cluster_size: usize,
    /// Redshift-spread damping in the tightness term.
    pub alpha_z: f32,
    /// Age-spread damping in the tightness term, per day.
    pub alpha_age: f32,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            rlap_ccc_threshold: 1.8,
            k_max: 5,
            min_cluster_size: 3,
            alpha_z: 100.0,
            alpha_age: 0.02,
        }
    }
}

impl ClusteringConfig {
    pub fn validate(&self) {
        assert!(self.k_max >= 1, "k_max must be at least 1");
        assert!(self.min_cluster_size >= 1, "min_cluster_size must be at least 1");
        assert!(self.alpha_z >= 0.0 && self.alpha_age >= 0.0, "alphas must be non-negative");
    }
}

// ============================================================================
// Output
// ============================================================================

/// A group of mutually consistent matches of one type.
#[derive(Debug, Clone, Serialize)]
pub struct Cluster {
    pub sn_type: String,
    /// Indices into the match slice handed to [`select_cluster`].
    pub member_indices: Vec<usize>,
    /// Consensus redshift: rlap_ccc-weighted mean over members.
    pub z_mean: f64,
    /// Bias-corrected weighted standard deviation of member redshifts.
    pub z_sigma: f64,
    pub age_mean: f64,
    pub age_sigma: f64,
    /// Bias-corrected weighted covariance between member redshifts and ages.
    pub z_age_covariance: f64,
    /// Subtype with the largest summed rlap_ccc among members.
    pub top_subtype: String,
    /// Summed rlap_ccc over members.
    pub score: f64,
    /// `1 / (1 + alpha_z * z_sigma + alpha_age * age_sigma)`.
    pub tightness: f64,
    /// `score * tightness`; the winner maximizes this.
    pub quality: f64,
    /// Member count per subtype, as fractions of the cluster size.
    pub subtype_fractions: BTreeMap<String, f64>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.member_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.member_indices.is_empty()
    }
}

// ============================================================================
// Selection
// ============================================================================

/// Cluster the accepted matches and pick the winner.
///
/// Returns `None` when no cluster reaches the score threshold; the caller
/// reports `best_type = "unknown"` in that case, which is a successful
/// outcome, not an error.
pub fn select_cluster(
    matches: &[Match],
    config: &ClusteringConfig,
    trace: &mut Trace,
) -> Option<Cluster> {
    config.validate();

    // Partition accepted matches by type, keeping original indices.
    let mut by_type: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, m) in matches.iter().enumerate() {
        if m.rejected || !(m.rlap_ccc > 0.0) {
            continue;
        }
        by_type.entry(m.template.sn_type.as_str()).or_default().push(i);
    }

    let mut candidates: Vec<Cluster> = Vec::new();
    for (&sn_type, indices) in &by_type {
        if indices.len() < config.min_cluster_size {
            trace.note(
                "clustering",
                format!(
                    "type '{sn_type}': {} accepted match(es), below min cluster size",
                    indices.len()
                ),
            );
            continue;
        }

        // Sort members by template name so the fit is independent of the
        // library iteration order.
        let mut indices = indices.clone();
        indices.sort_by(|&a, &b| matches[a].template.name.cmp(&matches[b].template.name));

        let points: Vec<DVec2> = indices
            .iter()
            .map(|&i| DVec2::new(matches[i].z_best, (matches[i].rlap_ccc as f64).ln()))
            .collect();
        let weights: Vec<f64> = indices.iter().map(|&i| matches[i].rlap_ccc as f64).collect();

        let Some(fit) = gmm::best_fit_by_bic(&points, &weights, config.k_max, GMM_SEED) else {
            trace.warn(format!("type '{sn_type}': GMM fit failed"));
            continue;
        };
        debug!(
            "type '{}': {} matches -> {} component(s)",
            sn_type,
            indices.len(),
            fit.components.len()
        );

        for component in 0..fit.components.len() {
            let members: Vec<usize> = indices
                .iter()
                .zip(&fit.assignments)
                .filter(|(_, &a)| a == component)
                .map(|(&i, _)| i)
                .collect();
            if members.is_empty() {
                continue;
            }
            candidates.push(summarize(sn_type, members, matches, config));
        }
    }

    trace.note(
        "clustering",
        format!("{} candidate cluster(s)", candidates.len()),
    );

    let eligible = candidates
        .into_iter()
        .filter(|c| c.score >= config.rlap_ccc_threshold as f64);

    // Winner: highest quality; ties broken by member count, then type name.
    eligible.max_by(|a, b| {
        a.quality
            .total_cmp(&b.quality)
            .then_with(|| a.len().cmp(&b.len()))
            .then_with(|| b.sn_type.cmp(&a.sn_type))
    })
}

/// Compute the summary statistics for one candidate cluster.
fn summarize(
    sn_type: &str,
    member_indices: Vec<usize>,
    matches: &[Match],
    config: &ClusteringConfig,
) -> Cluster {
    let joint = joint_weighted_stats(member_indices.iter().map(|&i| {
        (
            matches[i].z_best,
            matches[i].template.age_days as f64,
            matches[i].rlap_ccc as f64,
        )
    }));
    let (z_mean, z_sigma, age_mean, age_sigma, z_age_covariance) = joint
        .map(|j| (j.x.mean, j.x.std, j.y.mean, j.y.std, j.covariance))
        .unwrap_or((0.0, 0.0, 0.0, 0.0, 0.0));

    let score: f64 = member_indices
        .iter()
        .map(|&i| matches[i].rlap_ccc as f64)
        .sum();
    let tightness =
        1.0 / (1.0 + config.alpha_z as f64 * z_sigma + config.alpha_age as f64 * age_sigma);
    let quality = score * tightness;

    // Subtype vote: largest summed rlap_ccc, ties by count then name.
    let mut subtype_weight: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for &i in &member_indices {
        let entry = subtype_weight
            .entry(matches[i].template.subtype.as_str())
            .or_insert((0.0, 0));
        entry.0 += matches[i].rlap_ccc as f64;
        entry.1 += 1;
    }
    let top_subtype = subtype_weight
        .iter()
        .max_by(|a, b| {
            a.1 .0
                .total_cmp(&b.1 .0)
                .then_with(|| a.1 .1.cmp(&b.1 .1))
                .then_with(|| b.0.cmp(a.0))
        })
        .map(|(name, _)| name.to_string())
        .unwrap_or_default();

    let total = member_indices.len() as f64;
    let subtype_fractions = subtype_weight
        .iter()
        .map(|(name, (_, count))| (name.to_string(), *count as f64 / total))
        .collect();

    Cluster {
        sn_type: sn_type.to_string(),
        member_indices,
        z_mean,
        z_sigma,
        age_mean,
        age_sigma,
        z_age_covariance,
        top_subtype,
        score,
        tightness,
        quality,
        subtype_fractions,
    }
}
