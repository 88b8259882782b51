//! Sample path resolution and auditing.
//!
//! A region's sample file is found by joining the instrument directory, the
//! effective `default_path` and the `sample` value. Problems are reported per
//! region as [`SampleIssue`] values so that one broken region never hides another.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::inheritance::{resolve, EffectiveOpcode, EffectiveRegion};
use crate::parser::path_utils::resolve_absolute_path;
use crate::parser::{Origin, SfzDocument, SourceEncoding};

/// Where the sample of one region lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSamplePath {
    /// Section index of the region
    pub region: usize,
    /// The `sample` value as written
    pub sample: String,
    /// The effective `default_path`, if any
    pub default_path: Option<String>,
    /// The joined, normalized path
    pub path: PathBuf,
    /// Whether `path` existed when it was resolved
    pub exists: bool,
}

/// A problem with the sample of a single region
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SampleIssue {
    #[error("region {region} has no sample")]
    NoSample { region: usize },

    /// The raw bytes of `sample` or of the `default_path` it is combined with are
    /// not valid in the document encoding
    #[error("invalid {encoding} bytes in '{opcode}' at line {}, byte {offset}", .origin.line)]
    InvalidEncoding {
        region: usize,
        opcode: String,
        /// Where the opcode was written; [`SampleIssue::file`] turns it into a path
        origin: Origin,
        offset: usize,
        encoding: SourceEncoding,
    },

    #[error("sample not found: {}", .path.display())]
    SampleNotFound { region: usize, path: PathBuf },
}

impl SampleIssue {
    /// Section index of the affected region
    pub fn region(&self) -> usize {
        match self {
            SampleIssue::NoSample { region }
            | SampleIssue::InvalidEncoding { region, .. }
            | SampleIssue::SampleNotFound { region, .. } => *region,
        }
    }

    /// The file holding the offending opcode, for encoding issues
    pub fn file<'d>(&self, doc: &'d SfzDocument) -> Option<&'d Path> {
        match self {
            SampleIssue::InvalidEncoding { origin, .. } => doc.source_path(origin.file),
            _ => None,
        }
    }
}

/// The result of resolving every sample of a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleAudit {
    /// Samples that exist, in region order
    pub resolved: Vec<ResolvedSamplePath>,
    pub issues: Vec<SampleIssue>,
}

impl SampleAudit {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Invalid bytes in `sample` or `default_path`
    pub fn encoding_issues(&self) -> impl Iterator<Item = &SampleIssue> {
        self.issues.iter().filter(|issue| matches!(issue, SampleIssue::InvalidEncoding { .. }))
    }

    pub fn missing(&self) -> impl Iterator<Item = &SampleIssue> {
        self.issues.iter().filter(|issue| matches!(issue, SampleIssue::SampleNotFound { .. }))
    }
}

/// Directory that relative sample paths of `doc` are resolved against
///
/// This is the directory of the root file, or the current directory for documents
/// that were not read from a file.
pub fn sample_root(doc: &SfzDocument) -> PathBuf {
    doc.source_file()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn check_encoding(region: &EffectiveRegion, name: &str, opcode: &EffectiveOpcode) -> Result<(), SampleIssue> {
    region
        .encoding
        .validate(&opcode.raw)
        .map_err(|offset| SampleIssue::InvalidEncoding {
            region: region.region,
            opcode: name.to_string(),
            origin: opcode.origin,
            offset,
            encoding: region.encoding,
        })
}

/// Join the sample path of `region` without requiring the file to exist
///
/// Relative paths are resolved against `root`; an absolute `default_path` ignores
/// the root and an absolute `sample` ignores both.
pub fn locate_sample(region: &EffectiveRegion, root: &Path) -> Result<ResolvedSamplePath, SampleIssue> {
    let sample = region.get("sample").ok_or(SampleIssue::NoSample { region: region.region })?;
    check_encoding(region, "sample", sample)?;

    let default_path = region.get("default_path");
    if let Some(default_path) = default_path {
        check_encoding(region, "default_path", default_path)?;
    }

    let default_path = default_path.map(|opcode| opcode.value.clone());
    let path = resolve_absolute_path(&sample.value, default_path.as_deref(), root);
    let exists = path.exists();
    Ok(ResolvedSamplePath { region: region.region, sample: sample.value.clone(), default_path, path, exists })
}

/// Find the sample file of `region`, failing with [`SampleIssue::SampleNotFound`]
/// when it does not exist
pub fn resolve_sample(region: &EffectiveRegion, root: &Path) -> Result<ResolvedSamplePath, SampleIssue> {
    let resolved = locate_sample(region, root)?;
    if !resolved.exists {
        return Err(SampleIssue::SampleNotFound { region: resolved.region, path: resolved.path });
    }
    Ok(resolved)
}

/// Resolve the sample of every region of `doc`
pub fn audit_samples(doc: &SfzDocument, root: &Path) -> SampleAudit {
    let mut audit = SampleAudit::default();
    for region in resolve(doc) {
        match resolve_sample(&region, root) {
            Ok(resolved) => audit.resolved.push(resolved),
            Err(issue) => {
                log::debug!("{issue}");
                audit.issues.push(issue);
            }
        }
    }
    audit
}
