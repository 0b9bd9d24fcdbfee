//! Minimal FITS reader: a single 1-D image HDU with a linear (or log-linear)
//! wavelength WCS in the header.
//!
//! Supported: `BITPIX` 8/16/32/-32/-64, `BSCALE`/`BZERO`, `CRVAL1`/`CDELT1`
//! (or `CD1_1`)/`CRPIX1`, `DC-FLAG = 1` for log-linear axes. Multi-extension
//! files and binary tables are out of scope; only the primary HDU is read.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

use super::Spectrum;

const BLOCK: usize = 2880;
const CARD: usize = 80;

pub fn load_fits(path: &Path) -> Result<Spectrum> {
    let bytes = fs::read(path).map_err(|e| Error::bad_input(path, format!("read failed: {e}")))?;
    let bad = |reason: &str| Error::bad_input(path, reason.to_string());

    let header = Header::parse(&bytes).ok_or_else(|| bad("malformed FITS header"))?;
    if !header.simple {
        return Err(bad("missing SIMPLE keyword"));
    }
    let bitpix = header.int("BITPIX").ok_or_else(|| bad("missing BITPIX"))?;
    let naxis = header.int("NAXIS").ok_or_else(|| bad("missing NAXIS"))?;
    if naxis != 1 {
        return Err(bad("only single-axis FITS spectra are supported"));
    }
    let len = header.int("NAXIS1").ok_or_else(|| bad("missing NAXIS1"))? as usize;

    let bytes_per_value = match bitpix {
        8 => 1,
        16 => 2,
        32 => 4,
        -32 => 4,
        -64 => 8,
        _ => return Err(bad("unsupported BITPIX")),
    };
    let data = bytes
        .get(header.data_offset..header.data_offset + len * bytes_per_value)
        .ok_or_else(|| bad("truncated FITS data block"))?;

    let bscale = header.float("BSCALE").unwrap_or(1.0);
    let bzero = header.float("BZERO").unwrap_or(0.0);
    let raw = read_values(data, bitpix, len);
    let flux: Vec<f32> = raw.iter().map(|v| (v * bscale + bzero) as f32).collect();

    // Wavelength axis from the WCS keywords. CRPIX1 is 1-based.
    let crval = header.float("CRVAL1").ok_or_else(|| bad("missing CRVAL1"))?;
    let cdelt = header
        .float("CDELT1")
        .or_else(|| header.float("CD1_1"))
        .ok_or_else(|| bad("missing CDELT1/CD1_1"))?;
    if cdelt == 0.0 {
        return Err(bad("zero CDELT1"));
    }
    let crpix = header.float("CRPIX1").unwrap_or(1.0);
    let log_axis = header.int("DC-FLAG") == Some(1);

    let wave: Vec<f64> = (0..len)
        .map(|i| {
            let w = crval + (i as f64 + 1.0 - crpix) * cdelt;
            if log_axis {
                10f64.powf(w)
            } else {
                w
            }
        })
        .collect();

    Spectrum::new(wave, flux)
}

fn read_values(data: &[u8], bitpix: i64, len: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(len);
    match bitpix {
        8 => out.extend(data.iter().map(|&b| b as f64)),
        16 => out.extend(
            data.chunks_exact(2)
                .map(|c| i16::from_be_bytes([c[0], c[1]]) as f64),
        ),
        32 => out.extend(
            data.chunks_exact(4)
                .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]) as f64),
        ),
        -32 => out.extend(
            data.chunks_exact(4)
                .map(|c| f32::from_be_bytes([c[0], c[1], c[2], c[3]]) as f64),
        ),
        -64 => out.extend(data.chunks_exact(8).map(|c| {
            f64::from_be_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])
        })),
        _ => unreachable!("bitpix validated by caller"),
    }
    out
}

/// Parsed primary-HDU header cards.
struct Header {
    simple: bool,
    cards: Vec<(String, String)>,
    /// Byte offset of the start of the data block.
    data_offset: usize,
}

impl Header {
    fn parse(bytes: &[u8]) -> Option<Self> {
        let mut cards = Vec::new();
        let mut simple = false;
        let mut offset = 0;

        'blocks: loop {
            let block = bytes.get(offset..offset + BLOCK)?;
            offset += BLOCK;
            for card in block.chunks_exact(CARD) {
                let text = std::str::from_utf8(card).ok()?;
                let keyword = text[..8].trim_end();
                if keyword == "END" {
                    break 'blocks;
                }
                if keyword == "SIMPLE" {
                    simple = text.contains('T');
                    continue;
                }
                if keyword.is_empty() || keyword == "COMMENT" || keyword == "HISTORY" {
                    continue;
                }
                if text.as_bytes().get(8) == Some(&b'=') {
                    // Strip an inline comment; FITS strings are not needed here.
                    let value = text[9..].split('/').next().unwrap_or("").trim();
                    cards.push((keyword.to_string(), value.to_string()));
                }
            }
        }

        Some(Self {
            simple,
            cards,
            data_offset: offset,
        })
    }

    fn value(&self, keyword: &str) -> Option<&str> {
        self.cards
            .iter()
            .find(|(k, _)| k == keyword)
            .map(|(_, v)| v.as_str())
    }

    fn int(&self, keyword: &str) -> Option<i64> {
        self.value(keyword)?.parse().ok()
    }

    fn float(&self, keyword: &str) -> Option<f64> {
        // FITS allows FORTRAN-style exponents ('1.0D4').
        self.value(keyword)?.replace(['D', 'd'], "E").parse().ok()
    }
}
