//! Processing many documents at once.
//!
//! Documents are independent, so they are parsed in parallel on the rayon thread
//! pool. A document that fails to parse is reported with its path and never stops
//! the rest of the batch.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rayon::prelude::*;

use crate::parser::opcodes::name_sorted;
use crate::parser::{parse_sfz_file, Error, ParseOptions, Result, SfzDocument};

/// The result of processing one file of a batch
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub path: PathBuf,
    pub result: Result<T>,
}

impl<T> BatchOutcome<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Parse every file in `paths` and hand each document to `process`
///
/// Outcomes are returned in the order of `paths`.
pub fn process_batch<T, F>(paths: &[PathBuf], options: &ParseOptions, process: F) -> Vec<BatchOutcome<T>>
where
    T: Send,
    F: Fn(&Path, SfzDocument) -> Result<T> + Sync,
{
    let outcomes: Vec<BatchOutcome<T>> = paths
        .par_iter()
        .map(|path| {
            let result = parse_sfz_file(path, options).and_then(|doc| process(path, doc));
            if let Err(err) = &result {
                log::warn!("Skipping {}: {err}", path.display());
            }
            BatchOutcome { path: path.clone(), result }
        })
        .collect();

    let failed = outcomes.iter().filter(|outcome| !outcome.is_ok()).count();
    log::info!("Processed {} file(s), {failed} failed", outcomes.len());
    outcomes
}

/// How often each opcode is written across a set of documents
///
/// Counts are literal: an opcode counts once for every section that defines it,
/// however many regions inherit it.
#[derive(Debug, Default)]
pub struct UsageReport {
    /// Number of documents that were read successfully
    pub documents: usize,
    pub counts: BTreeMap<String, usize>,
    /// Documents that could not be read
    pub failures: Vec<(PathBuf, Error)>,
}

impl UsageReport {
    fn add_document(&mut self, doc: &SfzDocument) {
        self.documents += 1;
        for section in doc.sections() {
            for opcode in &section.opcodes {
                *self.counts.entry(opcode.name.clone()).or_default() += 1;
            }
        }
    }

    pub fn count(&self, name: &str) -> usize {
        self.counts.get(name).copied().unwrap_or(0)
    }

    /// Every opcode seen, in the preferred opcode order
    pub fn opcodes(&self) -> Vec<&str> {
        name_sorted(self.counts.keys().map(String::as_str))
    }
}

/// Count opcode usage over every file in `paths`
pub fn count_opcode_usage(paths: &[PathBuf], options: &ParseOptions) -> UsageReport {
    let report = Mutex::new(UsageReport::default());

    paths.par_iter().for_each(|path| {
        let parsed = parse_sfz_file(path, options);
        let mut report = match report.lock() {
            Ok(report) => report,
            Err(poisoned) => poisoned.into_inner(),
        };
        match parsed {
            Ok(doc) => report.add_document(&doc),
            Err(err) => {
                log::warn!("Skipping {}: {err}", path.display());
                report.failures.push((path.clone(), err));
            }
        }
    });

    let mut report = match report.into_inner() {
        Ok(report) => report,
        Err(poisoned) => poisoned.into_inner(),
    };
    report.failures.sort_by(|a, b| a.0.cmp(&b.0));
    log::info!(
        "Counted {} distinct opcode(s) in {} document(s)",
        report.counts.len(),
        report.documents
    );
    report
}
