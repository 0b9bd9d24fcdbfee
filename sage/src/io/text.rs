//! Two-column text and CSV spectrum files.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

use super::Spectrum;

/// Load a two-column `(wave, flux)` file. Columns may be separated by
/// whitespace or commas; comment lines (`#`, `;`, `%`) and a leading header
/// line are skipped. Extra columns (e.g. flux error) are ignored.
pub fn load_columns(path: &Path) -> Result<Spectrum> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::bad_input(path, format!("read failed: {e}")))?;

    let mut wave = Vec::new();
    let mut flux = Vec::new();
    let mut rejected_lines = 0usize;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(['#', ';', '%']) {
            continue;
        }
        match parse_pair(line) {
            Some((w, f)) => {
                wave.push(w);
                flux.push(f);
            }
            // Tolerate header lines, count everything else unparseable.
            None => rejected_lines += 1,
        }
    }

    if wave.is_empty() {
        return Err(Error::bad_input(path, "no numeric (wave, flux) rows found"));
    }
    if rejected_lines > 1 && rejected_lines * 10 > wave.len() {
        return Err(Error::bad_input(
            path,
            format!("{rejected_lines} unparseable rows"),
        ));
    }

    Spectrum::new(wave, flux)
}

fn parse_pair(line: &str) -> Option<(f64, f32)> {
    let mut fields = line.split(|c: char| c == ',' || c.is_whitespace()).filter(|s| !s.is_empty());
    let wave: f64 = fields.next()?.trim().parse().ok()?;
    let flux: f32 = fields.next()?.trim().parse().ok()?;
    Some((wave, flux))
}
