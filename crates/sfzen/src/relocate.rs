//! Copying an instrument together with its samples.
//!
//! The copy is self-contained: samples are placed next to the new `.sfz` file,
//! every `sample` opcode is rewritten to a path relative to it and `default_path`
//! is dropped.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::parser::path_utils::normalize_path;
use crate::parser::{Error, Result, SfzDocument};
use crate::samples::{audit_samples, SampleIssue};
use crate::serialize::{write_sfz, SerializeOptions};

/// Directory that samples from outside the instrument directory are copied to
pub const SAMPLES_DIR: &str = "samples";

/// One sample file to copy and the regions that use it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyEntry {
    pub source: PathBuf,
    /// Destination relative to the new instrument directory
    pub target: PathBuf,
    pub regions: Vec<usize>,
}

impl CopyEntry {
    /// The value written to `sample` in the copy
    pub fn sample_value(&self) -> String {
        normalize_path(&self.target.to_string_lossy())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyPlan {
    pub entries: Vec<CopyEntry>,
    /// Regions whose sample cannot be copied; they keep their `sample` opcode
    pub issues: Vec<SampleIssue>,
}

fn unique_target(wanted: PathBuf, taken: &HashSet<PathBuf>) -> PathBuf {
    if !taken.contains(&wanted) {
        return wanted;
    }
    let stem = wanted.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let extension = wanted.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();
    let mut n = 1;
    loop {
        let candidate = wanted.with_file_name(format!("{stem}-{n}{extension}"));
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Decide where every sample of `doc` goes
///
/// Samples inside `root` keep their relative location; others go to
/// [`SAMPLES_DIR`]. Two different files never share a destination.
pub fn plan_copy(doc: &SfzDocument, root: &Path) -> CopyPlan {
    let audit = audit_samples(doc, root);
    let mut plan = CopyPlan { entries: Vec::new(), issues: audit.issues };
    let mut by_source: HashMap<PathBuf, usize> = HashMap::new();
    let mut taken: HashSet<PathBuf> = HashSet::new();

    for resolved in audit.resolved {
        if let Some(&index) = by_source.get(&resolved.path) {
            plan.entries[index].regions.push(resolved.region);
            continue;
        }

        let wanted = match resolved.path.strip_prefix(root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => {
                let name = resolved.path.file_name().map(PathBuf::from).unwrap_or_default();
                Path::new(SAMPLES_DIR).join(name)
            }
        };
        let target = unique_target(wanted, &taken);
        taken.insert(target.clone());
        by_source.insert(resolved.path.clone(), plan.entries.len());
        plan.entries.push(CopyEntry { source: resolved.path, target, regions: vec![resolved.region] });
    }

    plan
}

/// Copy the planned samples into `dest_dir` and return the rewritten document
pub fn apply_copy_plan(doc: &SfzDocument, plan: &CopyPlan, dest_dir: &Path) -> Result<SfzDocument> {
    let mut copy = doc.clone();

    for entry in &plan.entries {
        let to = dest_dir.join(&entry.target);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&entry.source, &to).map_err(|source| Error::Copy { from: entry.source.clone(), to: to.clone(), source })?;
        log::debug!("Copied {} to {}", entry.source.display(), to.display());

        let value = entry.sample_value();
        for &region in &entry.regions {
            copy.set_opcode(region, "sample", &value);
        }
    }

    for index in 0..copy.sections().len() {
        copy.remove_opcode(index, "default_path");
    }

    Ok(copy)
}

/// What [`copy_instrument`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyReport {
    pub destination: PathBuf,
    pub copied: usize,
    /// Regions whose sample was left as it was
    pub issues: Vec<SampleIssue>,
}

/// Copy `doc` and its samples so that the new instrument lives at `dest_file`
pub fn copy_instrument(
    doc: &SfzDocument,
    root: &Path,
    dest_file: &Path,
    options: &SerializeOptions,
) -> Result<CopyReport> {
    let dest_dir = dest_file.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dest_dir)?;

    let plan = plan_copy(doc, root);
    let copy = apply_copy_plan(doc, &plan, dest_dir)?;
    let file = fs::File::create(dest_file)?;
    write_sfz(&copy, options, std::io::BufWriter::new(file))?;

    log::info!(
        "Copied instrument to {} with {} sample(s)",
        dest_file.display(),
        plan.entries.len()
    );
    Ok(CopyReport { destination: dest_file.to_path_buf(), copied: plan.entries.len(), issues: plan.issues })
}
