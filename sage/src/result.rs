//! Final result assembly: ranked matches, the winning cluster, and the
//! consensus classification.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

use crate::cluster::Cluster;
use crate::correlate::Match;
use crate::trace::Trace;

/// Default number of top matches carried in the result.
pub const DEFAULT_TOP_K: usize = 10;

/// The chosen type, or `Unknown` when no cluster was eligible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BestType {
    Unknown,
    Known(String),
}

impl BestType {
    pub fn as_str(&self) -> &str {
        match self {
            BestType::Unknown => "unknown",
            BestType::Known(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, BestType::Known(_))
    }
}

impl std::fmt::Display for BestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for BestType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Scalar view of one match; flux arrays never reach the result.
#[derive(Debug, Clone, Serialize)]
pub struct MatchSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub sn_type: String,
    pub subtype: String,
    pub age_days: f32,
    pub z: f64,
    pub z_err: f64,
    pub rlap: f32,
    pub lap: f32,
    pub ccc: f32,
    pub rlap_ccc: f32,
    pub rejected: bool,
}

impl From<&Match> for MatchSummary {
    fn from(m: &Match) -> Self {
        Self {
            name: m.template.name.clone(),
            sn_type: m.template.sn_type.clone(),
            subtype: m.template.subtype.clone(),
            age_days: m.template.age_days,
            z: m.z_best,
            z_err: m.z_err,
            rlap: m.rlap,
            lap: m.lap,
            ccc: m.ccc,
            rlap_ccc: m.rlap_ccc,
            rejected: m.rejected,
        }
    }
}

/// Scalar view of the winning cluster.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterSummary {
    #[serde(rename = "type")]
    pub sn_type: String,
    pub size: usize,
    pub z: f64,
    pub z_err: f64,
    pub age: f64,
    pub age_err: f64,
    pub z_age_covariance: f64,
    pub top_subtype: String,
    pub score: f64,
    pub tightness: f64,
    pub quality: f64,
}

/// The complete outcome of one analysis.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    /// The analysis ran to completion. An "unknown" classification is still
    /// a success.
    pub success: bool,
    pub best_type: BestType,
    pub best_subtype: Option<String>,
    pub best_template_name: Option<String>,
    pub z: Option<f64>,
    pub z_err: Option<f64>,
    pub age: Option<f64>,
    pub age_err: Option<f64>,
    /// rlap of the best accepted match.
    pub rlap_best: Option<f32>,
    /// Top accepted matches by rlap_ccc, at most `top_k`.
    pub top_matches: Vec<MatchSummary>,
    /// Every scored match, rejected ones flagged.
    pub filtered_matches: Vec<MatchSummary>,
    pub winning_cluster: Option<ClusterSummary>,
    /// Over winning-cluster members only; empty when unknown.
    pub type_fractions: BTreeMap<String, f64>,
    pub subtype_fractions: BTreeMap<String, f64>,
    pub trace: Trace,
}

/// Pack matches and the cluster decision into the final result.
///
/// `matches` must already be sorted by `(-rlap_ccc, name)`.
pub fn assemble(
    matches: Vec<Match>,
    winner: Option<Cluster>,
    trace: Trace,
    top_k: usize,
) -> AnalysisResult {
    let top_matches: Vec<MatchSummary> = matches
        .iter()
        .filter(|m| !m.rejected)
        .take(top_k)
        .map(MatchSummary::from)
        .collect();
    let rlap_best = top_matches.first().map(|m| m.rlap);
    let filtered_matches: Vec<MatchSummary> = matches.iter().map(MatchSummary::from).collect();

    match winner {
        Some(cluster) => {
            let best_member = cluster
                .member_indices
                .iter()
                .map(|&i| &matches[i])
                .max_by(|a, b| {
                    a.rlap_ccc
                        .total_cmp(&b.rlap_ccc)
                        .then_with(|| b.template.name.cmp(&a.template.name))
                });
            let best_template_name = best_member.map(|m| m.template.name.clone());

            let mut type_fractions = BTreeMap::new();
            type_fractions.insert(cluster.sn_type.clone(), 1.0);

            let summary = ClusterSummary {
                sn_type: cluster.sn_type.clone(),
                size: cluster.len(),
                z: cluster.z_mean,
                z_err: cluster.z_sigma,
                age: cluster.age_mean,
                age_err: cluster.age_sigma,
                z_age_covariance: cluster.z_age_covariance,
                top_subtype: cluster.top_subtype.clone(),
                score: cluster.score,
                tightness: cluster.tightness,
                quality: cluster.quality,
            };

            AnalysisResult {
                success: true,
                best_type: BestType::Known(cluster.sn_type.clone()),
                best_subtype: Some(cluster.top_subtype.clone()),
                best_template_name,
                z: Some(cluster.z_mean),
                z_err: Some(cluster.z_sigma),
                age: Some(cluster.age_mean),
                age_err: Some(cluster.age_sigma),
                rlap_best,
                top_matches,
                filtered_matches,
                winning_cluster: Some(summary),
                type_fractions,
                subtype_fractions: cluster.subtype_fractions,
                trace,
            }
        }
        None => AnalysisResult {
            success: true,
            best_type: BestType::Unknown,
            best_subtype: None,
            best_template_name: None,
            z: None,
            z_err: None,
            age: None,
            age_err: None,
            rlap_best,
            top_matches,
            filtered_matches,
            winning_cluster: None,
            type_fractions: BTreeMap::new(),
            subtype_fractions: BTreeMap::new(),
            trace,
        },
    }
}
