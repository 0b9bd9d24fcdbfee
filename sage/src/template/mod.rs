//! The template library: labeled, pre-flattened reference spectra on the
//! shared grid, loaded once and shared read-only across analyses.
//!
//! On disk a library is a directory with an `index.json` naming one file per
//! type bucket, plus an optional `user/` subdirectory of the same shape. A
//! type declared in the user index is served exclusively from the user
//! bucket; the base bucket for that type is hidden entirely, so user-edited
//! libraries take effect without per-template merging.


use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::grid::LogGrid;
use crate::math::fft::CorrelationFft;
use crate::math::norm_l2;
use crate::preprocess::ProcessedSpectrum;

// ============================================================================
// Disk schema
// ============================================================================

/// One template as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub sn_type: String,
    #[serde(default)]
    pub subtype: String,
    pub age_days: f32,
    /// Residual redshift of the stored spectrum relative to rest frame.
    #[serde(default)]
    pub redshift_at_rest: f32,
    #[serde(default = "default_quality")]
    pub quality_score: f32,
    /// Flattened, apodized flux on the shared grid.
    pub flat_flux: Vec<f32>,
}

fn default_quality() -> f32 {
    1.0
}

impl TemplateRecord {
    /// Build a record from a processed spectrum (library authoring).
    pub fn from_processed(
        name: impl Into<String>,
        sn_type: impl Into<String>,
        subtype: impl Into<String>,
        age_days: f32,
        processed: &ProcessedSpectrum,
    ) -> Self {
        Self {
            name: name.into(),
            sn_type: sn_type.into(),
            subtype: subtype.into(),
            age_days,
            redshift_at_rest: 0.0,
            quality_score: 1.0,
            flat_flux: processed.tapered_flux.clone(),
        }
    }
}

/// `index.json`: grid parameters plus the bucket files.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LibraryIndex {
    num_bins: usize,
    min_wave: f64,
    max_wave: f64,
    buckets: Vec<BucketEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BucketEntry {
    #[serde(rename = "type")]
    sn_type: String,
    file: String,
}

// ============================================================================
// In-memory library
// ============================================================================

/// A template ready for correlation: record metadata plus the precomputed
/// support edges, norm, and padded FFT.
#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub sn_type: String,
    pub subtype: String,
    pub age_days: f32,
    pub redshift_at_rest: f32,
    pub quality_score: f32,
    pub flat_flux: Vec<f32>,
    pub left_edge: usize,
    pub right_edge: usize,
    /// L2 norm of `flat_flux` over the active region.
    pub norm: f32,
    /// Forward FFT of the zero-padded flux.
    pub fft: Vec<Complex<f32>>,
}

impl Template {
    fn from_record(record: TemplateRecord, fft_engine: &CorrelationFft) -> Result<Self> {
        let left_edge = record.flat_flux.iter().position(|&v| v != 0.0);
        let right_edge = record.flat_flux.iter().rposition(|&v| v != 0.0);
        let (left_edge, right_edge) = match (left_edge, right_edge) {
            (Some(l), Some(r)) if r > l => (l, r),
            _ => {
                return Err(Error::internal(
                    "template-store",
                    format!("template '{}' has no signal", record.name),
                ))
            }
        };
        let norm = norm_l2(&record.flat_flux, left_edge..right_edge + 1);
        if !(norm > 0.0) {
            return Err(Error::internal(
                "template-store",
                format!("template '{}' has zero norm", record.name),
            ));
        }
        let fft = fft_engine.forward_padded(&record.flat_flux);
        Ok(Self {
            name: record.name,
            sn_type: record.sn_type,
            subtype: record.subtype,
            age_days: record.age_days,
            redshift_at_rest: record.redshift_at_rest,
            quality_score: record.quality_score,
            flat_flux: record.flat_flux,
            left_edge,
            right_edge,
            norm,
            fft,
        })
    }

    /// Active support length in bins.
    #[inline]
    pub fn support_len(&self) -> usize {
        self.right_edge - self.left_edge + 1
    }

    /// The on-disk record for this template.
    fn to_record(&self) -> TemplateRecord {
        TemplateRecord {
            name: self.name.clone(),
            sn_type: self.sn_type.clone(),
            subtype: self.subtype.clone(),
            age_days: self.age_days,
            redshift_at_rest: self.redshift_at_rest,
            quality_score: self.quality_score,
            flat_flux: self.flat_flux.clone(),
        }
    }
}

/// Query-time filters. All default to "no restriction".
#[derive(Debug, Clone, Default)]
pub struct TemplateFilter {
    /// Restrict to these type buckets.
    pub type_filter: Option<BTreeSet<String>>,
    /// Restrict to these template names.
    pub template_filter: Option<BTreeSet<String>>,
    /// Drop these template names.
    pub exclude_templates: BTreeSet<String>,
    pub age_min: Option<f32>,
    pub age_max: Option<f32>,
}

impl TemplateFilter {
    fn accepts(&self, template: &Template) -> bool {
        if let Some(types) = &self.type_filter {
            if !types.contains(&template.sn_type) {
                return false;
            }
        }
        if let Some(names) = &self.template_filter {
            if !names.contains(&template.name) {
                return false;
            }
        }
        if self.exclude_templates.contains(&template.name) {
            return false;
        }
        if let Some(age_min) = self.age_min {
            if template.age_days < age_min {
                return false;
            }
        }
        if let Some(age_max) = self.age_max {
            if template.age_days > age_max {
                return false;
            }
        }
        true
    }
}

/// The merged, immutable template library.
#[derive(Debug)]
pub struct TemplateLibrary {
    grid: LogGrid,
    /// Type bucket -> ordered templates. BTreeMap keeps iteration order
    /// deterministic.
    buckets: BTreeMap<String, Vec<Template>>,
}

impl TemplateLibrary {
    /// Load a library directory: `index.json` + bucket files, with an
    /// optional `user/` override directory.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut records = load_buckets(dir)?;
        let grid = records.grid;

        let user_dir = dir.join("user");
        if user_dir.join("index.json").is_file() {
            let user = load_buckets(&user_dir)?;
            if user.grid != grid {
                return Err(Error::bad_input(
                    &user_dir,
                    "user library grid does not match base library grid",
                ));
            }
            for (sn_type, bucket) in user.buckets {
                info!(
                    "type '{}' served from user bucket ({} templates)",
                    sn_type,
                    bucket.len()
                );
                records.buckets.insert(sn_type, bucket);
            }
        }

        Self::build(grid, records.buckets)
    }

    /// Build a library from in-memory records: the authoring entry point,
    /// also used by tests. Validates uniqueness and precomputes edges,
    /// norms, and FFTs.
    pub fn build(
        grid: LogGrid,
        raw_buckets: BTreeMap<String, Vec<TemplateRecord>>,
    ) -> Result<Self> {
        let fft_engine = CorrelationFft::new(grid.num_bins);
        let mut buckets = BTreeMap::new();
        let mut seen: BTreeSet<(String, String)> = BTreeSet::new();

        for (sn_type, bucket_records) in raw_buckets {
            let mut names = BTreeSet::new();
            let mut bucket = Vec::with_capacity(bucket_records.len());
            for record in bucket_records {
                if record.flat_flux.len() != grid.num_bins {
                    return Err(Error::internal(
                        "template-store",
                        format!(
                            "template '{}' has {} bins, library grid has {}",
                            record.name,
                            record.flat_flux.len(),
                            grid.num_bins
                        ),
                    ));
                }
                if !names.insert(record.name.clone()) {
                    return Err(Error::internal(
                        "template-store",
                        format!("duplicate template name '{}' in type '{sn_type}'", record.name),
                    ));
                }
                let key = (record.name.clone(), format!("{:.3}", record.age_days));
                if !seen.insert(key) {
                    return Err(Error::internal(
                        "template-store",
                        format!(
                            "duplicate (name, age) pair: '{}' at {} days",
                            record.name, record.age_days
                        ),
                    ));
                }
                bucket.push(Template::from_record(record, &fft_engine)?);
            }
            buckets.insert(sn_type, bucket);
        }

        Ok(Self { grid, buckets })
    }

    #[inline]
    pub fn grid(&self) -> &LogGrid {
        &self.grid
    }

    /// Number of templates across all buckets.
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Type buckets present, in sorted order.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    pub fn bucket(&self, sn_type: &str) -> Option<&[Template]> {
        self.buckets.get(sn_type).map(Vec::as_slice)
    }

    /// Write the library to `dir` in the on-disk layout: `index.json` plus
    /// one file per type bucket.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let records: BTreeMap<String, Vec<TemplateRecord>> = self
            .buckets
            .iter()
            .map(|(sn_type, bucket)| {
                (
                    sn_type.clone(),
                    bucket.iter().map(Template::to_record).collect(),
                )
            })
            .collect();
        write_library_dir(dir.as_ref(), &self.grid, &records)
    }

    /// Damage one template's FFT cache so failure isolation can be tested.
    #[cfg(test)]
    pub(crate) fn corrupt_template_fft(&mut self, sn_type: &str, index: usize) {
        self.buckets.get_mut(sn_type).expect("bucket exists")[index]
            .fft
            .truncate(8);
    }

    /// Templates passing the filter, in deterministic (type, file) order.
    pub fn select<'a>(&'a self, filter: &TemplateFilter) -> Vec<&'a Template> {
        let selected: Vec<&Template> = self
            .buckets
            .values()
            .flatten()
            .filter(|t| filter.accepts(t))
            .collect();
        debug!(
            "selected {} of {} templates",
            selected.len(),
            self.len()
        );
        selected
    }
}

struct RawBuckets {
    grid: LogGrid,
    buckets: BTreeMap<String, Vec<TemplateRecord>>,
}

fn load_buckets(dir: &Path) -> Result<RawBuckets> {
    let index_path = dir.join("index.json");
    let index_text = fs::read_to_string(&index_path)
        .map_err(|e| Error::bad_input(&index_path, format!("read failed: {e}")))?;
    let index: LibraryIndex = serde_json::from_str(&index_text)
        .map_err(|e| Error::bad_input(&index_path, format!("malformed index: {e}")))?;

    if !index.num_bins.is_power_of_two()
        || index.min_wave <= 0.0
        || index.max_wave <= index.min_wave
    {
        return Err(Error::bad_input(&index_path, "invalid grid parameters"));
    }
    let grid = LogGrid::new(index.num_bins, index.min_wave, index.max_wave);
    let mut buckets = BTreeMap::new();
    for entry in index.buckets {
        let path = dir.join(&entry.file);
        let text = fs::read_to_string(&path)
            .map_err(|e| Error::bad_input(&path, format!("read failed: {e}")))?;
        let records: Vec<TemplateRecord> = serde_json::from_str(&text)
            .map_err(|e| Error::bad_input(&path, format!("malformed bucket: {e}")))?;
        buckets.insert(entry.sn_type, records);
    }
    Ok(RawBuckets { grid, buckets })
}

fn write_library_dir(
    dir: &Path,
    grid: &LogGrid,
    buckets: &BTreeMap<String, Vec<TemplateRecord>>,
) -> Result<()> {
    fs::create_dir_all(dir)
        .map_err(|e| Error::bad_input(dir, format!("create directory failed: {e}")))?;

    let index = LibraryIndex {
        num_bins: grid.num_bins,
        min_wave: grid.min_wave,
        max_wave: grid.max_wave,
        buckets: buckets
            .keys()
            .map(|sn_type| BucketEntry {
                sn_type: sn_type.clone(),
                file: format!("{sn_type}.json"),
            })
            .collect(),
    };
    let index_path = dir.join("index.json");
    fs::write(&index_path, serde_json::to_string_pretty(&index).unwrap())
        .map_err(|e| Error::bad_input(&index_path, format!("write failed: {e}")))?;

    for (sn_type, records) in buckets {
        let path = dir.join(format!("{sn_type}.json"));
        fs::write(&path, serde_json::to_string(records).unwrap())
            .map_err(|e| Error::bad_input(&path, format!("write failed: {e}")))?;
    }
    Ok(())
}
