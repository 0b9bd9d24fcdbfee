//! Thin command-line front end over the sage analysis core.

mod args;

use std::collections::BTreeSet;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;

use anyhow::{anyhow, Context};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use args::Args;
use sage::{
    analyze_full, AnalysisConfig, AnalysisInput, CancelToken, OutputOptions, PreprocConfig,
    ProgressEvent, ScoringConfig, TemplateLibrary,
};

fn main() -> ExitCode {
    let args = Args::parse();
    setup_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

/// 2 for user/input problems, 3 for cancellation, 1 for internal bugs.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<sage::Error>() {
        Some(sage::Error::Cancelled { .. }) => 3,
        Some(sage::Error::Internal { .. }) => 1,
        Some(_) => 2,
        None => 2,
    }
}

fn setup_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sage={default_level},sage_cli={default_level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &Args) -> anyhow::Result<()> {
    if args.zmin >= args.zmax {
        return Err(anyhow!("zmin ({}) must be below zmax ({})", args.zmin, args.zmax));
    }

    let library_dir = library_dir(args);
    let library = TemplateLibrary::load(&library_dir)
        .with_context(|| format!("loading template library from '{}'", library_dir.display()))?;
    info!(
        "library: {} templates in {} type bucket(s)",
        library.len(),
        library.types().count()
    );

    let config = AnalysisConfig {
        preproc: preproc_config(args)?,
        scoring: scoring_config(args),
        ..AnalysisConfig::default()
    };

    // Ctrl-C trips the cancellation token; the engine unwinds within one
    // template's work.
    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || cancel.cancel()).context("installing Ctrl-C handler")?;
    }

    let (progress_tx, progress_rx) = mpsc::channel::<ProgressEvent>();
    let reporter = std::thread::spawn(move || {
        let interactive = std::io::stderr().is_terminal();
        let mut last_percent = 0;
        for event in progress_rx.iter() {
            let percent = event.completed * 100 / event.total.max(1);
            if interactive && percent >= last_percent + 5 {
                last_percent = percent;
                eprint!("\rscoring {percent:>3}% ({}/{})", event.completed, event.total);
                let _ = std::io::stderr().flush();
            }
        }
        if interactive && last_percent > 0 {
            eprintln!();
        }
    });

    let outcome = analyze_full(
        AnalysisInput::Path(args.spectrum.clone()),
        &library,
        &config,
        &cancel,
        Some(&progress_tx),
    );
    drop(progress_tx);
    let _ = reporter.join();
    let analysis = outcome.map_err(anyhow::Error::from)?;

    let stem = args
        .spectrum
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("spectrum");

    println!("{}", sage::display_summary(&analysis.result, stem));
    info!("{}", sage::one_line_summary(&analysis.result, stem));

    let options = if args.complete {
        OutputOptions {
            json: true,
            dumps: true,
        }
    } else if args.minimal {
        OutputOptions {
            json: false,
            dumps: false,
        }
    } else {
        OutputOptions::default()
    };
    let written = sage::write_outputs(&args.output_dir, stem, &analysis.result, &analysis.processed, options)?;
    for path in written {
        info!("wrote {}", path.display());
    }
    Ok(())
}

fn library_dir(args: &Args) -> PathBuf {
    args.templates.clone().unwrap_or_else(|| {
        std::env::var_os("SAGE_TEMPLATES")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("templates"))
    })
}

fn preproc_config(args: &Args) -> anyhow::Result<PreprocConfig> {
    if args.savgol_window > 0 && args.savgol_order >= args.savgol_window {
        return Err(anyhow!(
            "savgol-order ({}) must be smaller than savgol-window ({})",
            args.savgol_order,
            args.savgol_window
        ));
    }
    if !(0.0..=50.0).contains(&args.apodize_percent) {
        return Err(anyhow!("apodize-percent must be in [0, 50]"));
    }

    let mut masks = Vec::with_capacity(args.wavelength_masks.len());
    for mask in &args.wavelength_masks {
        let (lo, hi) = mask
            .split_once(':')
            .ok_or_else(|| anyhow!("wavelength mask '{mask}' is not WMIN:WMAX"))?;
        let lo: f32 = lo.trim().parse().context("wavelength mask lower bound")?;
        let hi: f32 = hi.trim().parse().context("wavelength mask upper bound")?;
        if hi <= lo {
            return Err(anyhow!("wavelength mask '{mask}' is empty"));
        }
        masks.push((lo, hi));
    }

    Ok(PreprocConfig {
        savgol_window: args.savgol_window,
        savgol_order: args.savgol_order,
        aband_remove: args.aband_remove,
        skyclip: args.skyclip,
        wavelength_masks: masks,
        apodize_percent: args.apodize_percent,
        ..PreprocConfig::default()
    })
}

fn scoring_config(args: &Args) -> ScoringConfig {
    let type_filter = if args.type_filter.is_empty() {
        None
    } else {
        Some(args.type_filter.iter().cloned().collect::<BTreeSet<_>>())
    };
    ScoringConfig {
        zmin: args.zmin,
        zmax: args.zmax,
        rlapmin: args.rlapmin,
        lapmin: args.lapmin,
        age_min: args.age_min,
        age_max: args.age_max,
        type_filter,
        forced_redshift: args.forced_redshift,
        ..ScoringConfig::default()
    }
}
