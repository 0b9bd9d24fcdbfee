//! SAGE - supernova spectrum classification core.
//!
//! Classifies an observed spectrum against a library of labeled reference
//! spectra:
//! - Preprocessing: spike removal, masking, log-rebinning onto a shared
//!   grid, continuum flattening, apodization
//! - FFT cross-correlation against every eligible template, with the
//!   overlap-aware rlap quality metric (optionally combined with a cosine
//!   similarity into rlap_ccc)
//! - Type-aware GMM clustering of the matches in (z, quality) space; the
//!   winning cluster defines the type, subtype, redshift, and age
//!
//! # Quick start
//!
//! ```rust,ignore
//! use sage::{analyze, AnalysisConfig, AnalysisInput, CancelToken, TemplateLibrary};
//!
//! let library = TemplateLibrary::load("templates")?;
//! let result = analyze(
//!     AnalysisInput::Path("spectrum.dat".into()),
//!     &library,
//!     &AnalysisConfig::default(),
//!     &CancelToken::new(),
//!     None,
//! )?;
//! println!("{} at z = {:?}", result.best_type, result.z);
//! ```

mod analysis;
mod cluster;
mod correlate;
mod error;
mod grid;
mod io;
mod math;
mod preprocess;
mod report;
mod result;
mod scoring;
mod template;
mod trace;

#[cfg(test)]
pub mod testing;

// ============================================================================
// Public API
// ============================================================================

pub use analysis::{analyze, analyze_full, Analysis, AnalysisConfig, AnalysisInput};
pub use cluster::{Cluster, ClusteringConfig};
pub use correlate::{Correlator, Match, PreparedInput, TemplateInfo};
pub use error::{Error, Result};
pub use grid::LogGrid;
pub use io::Spectrum;
pub use preprocess::{preprocess, PreprocConfig, ProcessedSpectrum};
pub use report::{display_summary, one_line_summary, write_outputs, OutputOptions};
pub use result::{AnalysisResult, BestType, ClusterSummary, MatchSummary, DEFAULT_TOP_K};
pub use scoring::{CancelToken, Phase, ProgressEvent, ProgressSink, ScoringConfig};
pub use template::{Template, TemplateFilter, TemplateLibrary, TemplateRecord};
pub use trace::{StageTrace, Trace};
