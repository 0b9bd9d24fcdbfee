//! Parallel scoring: drive the correlator over every eligible template.
//!
//! Templates are independent, so the engine fans out over a rayon pool with
//! one scratch buffer per worker and exactly one result slot per template.
//! Progress events are advisory; the sink may be dropped at any time.
//! Cancellation is polled between templates, so the grace period is bounded
//! by one template's correlation.


use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::correlate::{Correlator, Match, PreparedInput};
use crate::error::{Error, Result};
use crate::template::{TemplateFilter, TemplateLibrary};
use crate::trace::Trace;

/// Type buckets skipped when no explicit `type_filter` is set. Galaxy-like
/// templates are only scored when asked for by name.
const NON_SN_TYPES: [&str; 3] = ["Gal", "AGN", "Star"];

// ============================================================================
// Configuration
// ============================================================================

/// Scoring parameters: redshift search bounds, acceptance gates, and
/// library filters.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub zmin: f32,
    pub zmax: f32,
    /// Minimum rlap for a match to be accepted.
    pub rlapmin: f32,
    /// Minimum support overlap for a match to be accepted.
    pub lapmin: f32,
    pub age_min: Option<f32>,
    pub age_max: Option<f32>,
    /// Restrict scoring to these type buckets. When unset, all buckets
    /// except the known non-SN ones are scored.
    pub type_filter: Option<BTreeSet<String>>,
    pub template_filter: Option<BTreeSet<String>>,
    pub exclude_templates: BTreeSet<String>,
    /// Skip the redshift search and evaluate the correlation at this z.
    pub forced_redshift: Option<f32>,
    /// Half-width in bins of the peak window excluded from the noise
    /// estimate and searched for the half-width error.
    pub peak_window_size: usize,
    /// Combine rlap with the cosine similarity into rlap_ccc.
    pub use_ccc: bool,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            zmin: -0.01,
            zmax: 1.0,
            rlapmin: 4.0,
            lapmin: 0.3,
            age_min: None,
            age_max: None,
            type_filter: None,
            template_filter: None,
            exclude_templates: BTreeSet::new(),
            forced_redshift: None,
            peak_window_size: 10,
            use_ccc: true,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) {
        assert!(self.zmin < self.zmax, "zmin must be below zmax");
        assert!(self.lapmin >= 0.0 && self.lapmin <= 1.0, "lapmin must be in [0, 1]");
        assert!(self.rlapmin >= 0.0, "rlapmin must be non-negative");
    }

    fn library_filter(&self) -> TemplateFilter {
        TemplateFilter {
            type_filter: self.type_filter.clone(),
            template_filter: self.template_filter.clone(),
            exclude_templates: self.exclude_templates.clone(),
            age_min: self.age_min,
            age_max: self.age_max,
        }
    }
}

// ============================================================================
// Progress & cancellation
// ============================================================================

/// Pipeline phase attached to progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Preprocess,
    Scoring,
    Clustering,
}

/// Advisory progress report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub completed: usize,
    pub total: usize,
    pub phase: Phase,
}

/// Channel end the engine reports progress on. Closed receivers are
/// tolerated silently.
pub type ProgressSink = Sender<ProgressEvent>;

/// Cooperative cancellation flag shared between the caller and the engine.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Engine
// ============================================================================

enum Outcome {
    Scored(Box<Match>),
    Skipped(String),
    Cancelled,
}

/// Score every eligible template. Returns all matches (rejected ones are
/// flagged, not dropped), sorted by `(-rlap_ccc, name)` so the result is
/// independent of worker scheduling.
pub fn score_templates(
    correlator: &Correlator,
    input: &PreparedInput,
    library: &TemplateLibrary,
    config: &ScoringConfig,
    cancel: &CancelToken,
    progress: Option<&ProgressSink>,
    trace: &mut Trace,
) -> Result<Vec<Match>> {
    config.validate();

    let mut filter = config.library_filter();
    if filter.type_filter.is_none() {
        let sn_types: BTreeSet<String> = library
            .types()
            .filter(|t| !NON_SN_TYPES.contains(t))
            .map(str::to_string)
            .collect();
        filter.type_filter = Some(sn_types);
    }
    let templates = library.select(&filter);
    if templates.is_empty() {
        return Err(Error::NoEligibleTemplates);
    }

    let total = templates.len();
    let completed = AtomicUsize::new(0);
    debug!("scoring {total} templates");

    let outcomes: Vec<Outcome> = templates
        .par_iter()
        .map_init(
            || correlator.make_scratch(),
            |scratch, template| {
                if cancel.is_cancelled() {
                    return Outcome::Cancelled;
                }
                let result = catch_unwind(AssertUnwindSafe(|| {
                    correlator.correlate(input, template, config, scratch)
                }));
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(sink) = progress {
                    // A dropped receiver is fine; the sender just keeps going.
                    let _ = sink.send(ProgressEvent {
                        completed: done,
                        total,
                        phase: Phase::Scoring,
                    });
                }
                match result {
                    Ok(m) => Outcome::Scored(Box::new(m)),
                    Err(_) => Outcome::Skipped(template.name.clone()),
                }
            },
        )
        .collect();

    let mut matches = Vec::with_capacity(total);
    for outcome in outcomes {
        match outcome {
            Outcome::Scored(m) => matches.push(*m),
            Outcome::Skipped(name) => {
                trace.warn(format!("template '{name}' failed to correlate; skipped"));
            }
            Outcome::Cancelled => {}
        }
    }

    if cancel.is_cancelled() {
        let done = matches.len();
        trace.note(
            "scoring",
            format!("cancelled with {done} of {total} templates scored"),
        );
        return Err(Error::Cancelled {
            completed: done,
            total,
        });
    }

    matches.sort_by(|a, b| {
        b.rlap_ccc
            .total_cmp(&a.rlap_ccc)
            .then_with(|| a.template.name.cmp(&b.template.name))
    });
    Ok(matches)
}
