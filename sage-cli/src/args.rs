use std::path::PathBuf;

use clap::Parser;

/// Command-line surface of the classifier.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "sage",
    version,
    about = "Classify a supernova spectrum against a template library."
)]
pub struct Args {
    /// Path to the input spectrum (two-column text, CSV, or simple FITS).
    pub spectrum: PathBuf,

    /// Template library directory (defaults to $SAGE_TEMPLATES or ./templates).
    #[arg(long)]
    pub templates: Option<PathBuf>,

    /// Directory for the persisted outputs.
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Skip the redshift search and evaluate every template at this redshift.
    #[arg(long, allow_negative_numbers = true)]
    pub forced_redshift: Option<f32>,

    /// Lower redshift bound of the search.
    #[arg(long, default_value_t = -0.01, allow_negative_numbers = true)]
    pub zmin: f32,

    /// Upper redshift bound of the search.
    #[arg(long, default_value_t = 1.0)]
    pub zmax: f32,

    /// Minimum rlap for a match to be accepted.
    #[arg(long, default_value_t = 4.0)]
    pub rlapmin: f32,

    /// Minimum support overlap for a match to be accepted.
    #[arg(long, default_value_t = 0.3)]
    pub lapmin: f32,

    /// Restrict scoring to these template types. May be given multiple times.
    #[arg(long = "type-filter", num_args = 1..)]
    pub type_filter: Vec<String>,

    /// Minimum template age in days.
    #[arg(long, allow_negative_numbers = true)]
    pub age_min: Option<f32>,

    /// Maximum template age in days.
    #[arg(long, allow_negative_numbers = true)]
    pub age_max: Option<f32>,

    /// Savitzky-Golay smoothing window in samples (0 disables).
    #[arg(long, default_value_t = 0)]
    pub savgol_window: usize,

    /// Savitzky-Golay polynomial order.
    #[arg(long, default_value_t = 3)]
    pub savgol_order: usize,

    /// Zero out the telluric A-band (7575-7675 A).
    #[arg(long)]
    pub aband_remove: bool,

    /// Clip bright night-sky emission lines.
    #[arg(long)]
    pub skyclip: bool,

    /// Wavelength ranges to zero out, as WMIN:WMAX in A. Repeatable.
    #[arg(long = "wavelength-masks", num_args = 1.., value_name = "WMIN:WMAX")]
    pub wavelength_masks: Vec<String>,

    /// Percent of the active region tapered on each side.
    #[arg(long, default_value_t = 10.0)]
    pub apodize_percent: f32,

    /// Write every output: text record, JSON export, processed-spectrum dumps.
    #[arg(long, conflicts_with = "minimal")]
    pub complete: bool,

    /// Write only the primary text record.
    #[arg(long)]
    pub minimal: bool,

    /// Increase log verbosity (-v: debug, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
