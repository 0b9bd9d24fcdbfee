//! Text and JSON records for one analysis, plus the processed-spectrum dumps.
//!
//! The text record is the primary persisted output; the JSON export carries
//! the full result for downstream tooling. Plots and richer reports are the
//! front end's business.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::preprocess::ProcessedSpectrum;
use crate::result::AnalysisResult;

/// What `write_outputs` should produce besides the primary text record.
#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    /// Full result as JSON.
    pub json: bool,
    /// Two-column dumps of the processed input (fluxed and flattened).
    pub dumps: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            json: true,
            dumps: false,
        }
    }
}

/// Multi-line classification summary.
pub fn display_summary(result: &AnalysisResult, spectrum_name: &str) -> String {
    let mut out = String::new();
    let title = format!("SAGE CLASSIFICATION - {spectrum_name}");
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", "=".repeat(title.len()));
    let _ = writeln!(out);

    match &result.winning_cluster {
        Some(cluster) => {
            let _ = writeln!(out, "Type     : {}", result.best_type);
            let _ = writeln!(
                out,
                "Subtype  : {}",
                result.best_subtype.as_deref().unwrap_or("-")
            );
            let _ = writeln!(
                out,
                "Redshift : {:.5} +/- {:.5}",
                cluster.z, cluster.z_err
            );
            let _ = writeln!(
                out,
                "Age      : {:+.1} +/- {:.1} days",
                cluster.age, cluster.age_err
            );
            let _ = writeln!(
                out,
                "Cluster  : {} member(s), score {:.2}, quality {:.2}",
                cluster.size, cluster.score, cluster.quality
            );
        }
        None => {
            let _ = writeln!(out, "Type     : unknown (no eligible cluster)");
        }
    }

    if !result.subtype_fractions.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Subtype fractions (winning cluster):");
        for (subtype, fraction) in &result.subtype_fractions {
            let _ = writeln!(out, "  {subtype:<12} {:5.1}%", fraction * 100.0);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Top matches ({} accepted of {} scored):",
        result.top_matches.len(),
        result.filtered_matches.len()
    );
    let header = format!(
        "  {:<18} {:<6} {:<10} {:>7} {:>9} {:>6} {:>6}",
        "template", "type", "subtype", "age", "z", "rlap", "r*ccc"
    );
    let _ = writeln!(out, "{header}");
    let _ = writeln!(out, "  {}", "-".repeat(header.len() - 2));
    for m in &result.top_matches {
        let _ = writeln!(
            out,
            "  {:<18} {:<6} {:<10} {:>7.1} {:>9.5} {:>6.1} {:>6.1}",
            m.name, m.sn_type, m.subtype, m.age_days, m.z, m.rlap, m.rlap_ccc
        );
    }

    if !result.trace.warnings.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Warnings:");
        for warning in &result.trace.warnings {
            let _ = writeln!(out, "  - {warning}");
        }
    }

    out
}

/// Single-line digest for terminals and logs.
pub fn one_line_summary(result: &AnalysisResult, spectrum_name: &str) -> String {
    match &result.winning_cluster {
        Some(cluster) => format!(
            "{spectrum_name}: {}/{} z={:.5} age={:+.1}d rlap={:.1} ({} members)",
            result.best_type,
            result.best_subtype.as_deref().unwrap_or("-"),
            cluster.z,
            cluster.age,
            result.rlap_best.unwrap_or(0.0),
            cluster.size,
        ),
        None => format!("{spectrum_name}: unknown (no eligible cluster)"),
    }
}

/// Write the persisted records for one spectrum into `dir`, returning the
/// paths written.
pub fn write_outputs(
    dir: &Path,
    stem: &str,
    result: &AnalysisResult,
    processed: &ProcessedSpectrum,
    options: OutputOptions,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .map_err(|e| Error::bad_input(dir, format!("create output directory failed: {e}")))?;
    let mut written = Vec::new();

    let txt_path = dir.join(format!("{stem}.sage.txt"));
    fs::write(&txt_path, display_summary(result, stem))
        .map_err(|e| Error::bad_input(&txt_path, format!("write failed: {e}")))?;
    written.push(txt_path);

    if options.json {
        let json_path = dir.join(format!("{stem}.sage.json"));
        let payload = serde_json::to_string_pretty(result)
            .map_err(|e| Error::internal("report", format!("result serialization failed: {e}")))?;
        fs::write(&json_path, payload)
            .map_err(|e| Error::bad_input(&json_path, format!("write failed: {e}")))?;
        written.push(json_path);
    }

    if options.dumps {
        let fluxed = dir.join(format!("{stem}_fluxed.dat"));
        write_columns(&fluxed, processed, &processed.log_flux)?;
        written.push(fluxed);

        let flattened = dir.join(format!("{stem}_flattened.dat"));
        write_columns(&flattened, processed, &processed.flat_flux)?;
        written.push(flattened);
    }

    Ok(written)
}

/// Two columns, wave and flux, over the active region.
fn write_columns(path: &Path, processed: &ProcessedSpectrum, flux: &[f32]) -> Result<()> {
    let mut out = String::new();
    for i in processed.active_range() {
        let _ = writeln!(out, "{:.3} {:.6e}", processed.grid.wave_at(i), flux[i]);
    }
    fs::write(path, out).map_err(|e| Error::bad_input(path, format!("write failed: {e}")))
}
