//! The top-level analysis pipeline: preprocess, score, cluster, assemble.

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::time::Instant;

use tracing::info;

use crate::cluster::{select_cluster, ClusteringConfig};
use crate::correlate::{Correlator, PreparedInput};
use crate::error::Result;
use crate::io::Spectrum;
use crate::preprocess::{preprocess, PreprocConfig, ProcessedSpectrum};
use crate::result::{assemble, AnalysisResult, DEFAULT_TOP_K};
use crate::scoring::{score_templates, CancelToken, ProgressSink, ScoringConfig};
use crate::template::TemplateLibrary;
use crate::trace::Trace;

/// Input to an analysis: an already-loaded spectrum or a path to load.
#[derive(Debug)]
pub enum AnalysisInput {
    Spectrum(Spectrum),
    Path(PathBuf),
}

impl From<Spectrum> for AnalysisInput {
    fn from(spectrum: Spectrum) -> Self {
        AnalysisInput::Spectrum(spectrum)
    }
}

impl From<PathBuf> for AnalysisInput {
    fn from(path: PathBuf) -> Self {
        AnalysisInput::Path(path)
    }
}

/// Bundle of the per-stage configurations.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub preproc: PreprocConfig,
    pub scoring: ScoringConfig,
    pub clustering: ClusteringConfig,
    /// Number of top matches carried into the result.
    pub top_k: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            preproc: PreprocConfig::default(),
            scoring: ScoringConfig::default(),
            clustering: ClusteringConfig::default(),
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// An analysis result together with the processed input it was derived
/// from (needed for the fluxed/flattened dumps).
#[derive(Debug)]
pub struct Analysis {
    pub result: AnalysisResult,
    pub processed: ProcessedSpectrum,
}

/// Classify one spectrum against the library.
pub fn analyze(
    input: AnalysisInput,
    library: &TemplateLibrary,
    config: &AnalysisConfig,
    cancel: &CancelToken,
    progress: Option<&ProgressSink>,
) -> Result<AnalysisResult> {
    analyze_full(input, library, config, cancel, progress).map(|analysis| analysis.result)
}

/// Like [`analyze`], but also hands back the processed spectrum.
pub fn analyze_full(
    input: AnalysisInput,
    library: &TemplateLibrary,
    config: &AnalysisConfig,
    cancel: &CancelToken,
    progress: Option<&ProgressSink>,
) -> Result<Analysis> {
    let mut trace = Trace::new();

    let spectrum = match input {
        AnalysisInput::Spectrum(spectrum) => spectrum,
        AnalysisInput::Path(path) => Spectrum::from_file(&path)?,
    };

    let started = Instant::now();
    let processed = preprocess(&spectrum, library.grid(), &config.preproc, &mut trace)?;
    trace.stage(
        "preprocess",
        started.elapsed(),
        vec![format!(
            "active region {}..{} of {} bins",
            processed.left_edge,
            processed.right_edge,
            library.grid().num_bins
        )],
    );

    let started = Instant::now();
    let correlator = Correlator::new(*library.grid());
    let prepared = PreparedInput::from_processed(&processed, correlator.fft());
    let matches = score_templates(
        &correlator,
        &prepared,
        library,
        &config.scoring,
        cancel,
        progress,
        &mut trace,
    )?;
    let accepted = matches.iter().filter(|m| !m.rejected).count();
    trace.stage(
        "scoring",
        started.elapsed(),
        vec![format!("{} scored, {} accepted", matches.len(), accepted)],
    );

    let started = Instant::now();
    let winner = select_cluster(&matches, &config.clustering, &mut trace);
    trace.stage(
        "clustering",
        started.elapsed(),
        vec![match &winner {
            Some(cluster) => format!(
                "winner: type '{}' with {} member(s)",
                cluster.sn_type,
                cluster.len()
            ),
            None => "no eligible cluster".to_string(),
        }],
    );

    let result = assemble(matches, winner, trace, config.top_k);
    info!(
        "classified as {} ({} accepted matches)",
        result.best_type, accepted
    );
    Ok(Analysis { result, processed })
}
