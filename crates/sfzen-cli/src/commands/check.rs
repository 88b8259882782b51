use std::path::PathBuf;

use anyhow::Result;
use sfzen::resample::ResamplePlan;
use sfzen::samples::sample_root;
use sfzen::{audit_samples, plan_resample, process_batch, ParseOptions, SampleIssue, SfzDocument, TargetFormat};

/// Findings for one instrument
#[derive(Debug, Default)]
pub struct FileReport {
    pub problems: Vec<String>,
}

fn describe_issue(doc: &SfzDocument, issue: &SampleIssue) -> Option<String> {
    match issue {
        SampleIssue::NoSample { .. } => None,
        SampleIssue::InvalidEncoding { .. } => match issue.file(doc) {
            Some(file) => Some(format!("{issue} in {}", file.display())),
            None => Some(issue.to_string()),
        },
        SampleIssue::SampleNotFound { path, .. } => Some(format!("missing sample {}", path.display())),
    }
}

fn describe_plan(plan: &ResamplePlan, details: bool) -> Vec<String> {
    let mut lines = Vec::new();
    if details {
        let mut seen = Vec::new();
        for job in &plan.jobs {
            if !seen.contains(&&job.source) {
                seen.push(&job.source);
                lines.push(format!("{}   {}", job.source.display(), job.format));
            }
        }
    } else {
        for (format, count) in plan.format_counts() {
            lines.push(format!("{count} sample(s) at {format}"));
        }
    }
    for (path, err) in &plan.failures {
        lines.push(format!("unreadable sample {}: {err}", path.display()));
    }
    lines
}

/// Check the samples of one parsed instrument
pub fn check_document(doc: &SfzDocument, target: &TargetFormat, details: bool) -> FileReport {
    let root = sample_root(doc);
    let audit = audit_samples(doc, &root);
    let mut problems: Vec<String> = audit.issues.iter().filter_map(|issue| describe_issue(doc, issue)).collect();
    problems.extend(describe_plan(&plan_resample(doc, &root, target), details));
    FileReport { problems }
}

/// Report missing samples, invalid encodings and samples not in `target` format
pub fn run(files: &[PathBuf], options: &ParseOptions, target: &TargetFormat, details: bool) -> Result<bool> {
    let outcomes = process_batch(files, options, |_, doc| Ok(check_document(&doc, target, details)));

    let mut clean = true;
    for outcome in outcomes {
        match outcome.result {
            Ok(report) if report.problems.is_empty() => {}
            Ok(report) => {
                clean = false;
                println!("{}", outcome.path.display());
                for problem in report.problems {
                    println!("\t{problem}");
                }
            }
            Err(err) => {
                clean = false;
                eprintln!("Error in {}: {err}", outcome.path.display());
            }
        }
    }
    Ok(clean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfzen::parse_sfz_file;
    use std::fs;
    use std::path::Path;

    fn write_wav(path: &Path, sample_rate: u32) {
        let spec = hound_spec(sample_rate);
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        writer.write_sample(0i16).unwrap();
        writer.finalize().unwrap();
    }

    fn hound_spec(sample_rate: u32) -> hound::WavSpec {
        hound::WavSpec { channels: 1, sample_rate, bits_per_sample: 16, sample_format: hound::SampleFormat::Int }
    }

    #[test]
    fn test_check_document() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("ok.wav"), 44100);
        write_wav(&dir.path().join("hi.wav"), 96000);
        let path = dir.path().join("inst.sfz");
        fs::write(
            &path,
            "<region> sample=ok.wav\n<region> sample=hi.wav\n<region> sample=gone.wav\n<region> key=1\n",
        )
        .unwrap();
        let doc = parse_sfz_file(&path, &ParseOptions::default()).unwrap();

        let report = check_document(&doc, &TargetFormat::default(), false);
        assert_eq!(report.problems.len(), 2);
        assert!(report.problems[0].starts_with("missing sample"));
        assert!(report.problems[0].ends_with("gone.wav"));
        assert_eq!(report.problems[1], "1 sample(s) at 96000 Hz, 1 chan, 16 bits");

        let detailed = check_document(&doc, &TargetFormat::default(), true);
        assert!(detailed.problems[1].ends_with("hi.wav   96000 Hz, 1 chan, 16 bits"));
    }

    #[test]
    fn test_invalid_encoding_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inst.sfz");
        fs::write(&path, b"<region> sample=caf\xE9.wav\n").unwrap();
        let options = ParseOptions { encoding: Some(sfzen::SourceEncoding::Ascii), ..ParseOptions::default() };
        let doc = parse_sfz_file(&path, &options).unwrap();

        let report = check_document(&doc, &TargetFormat::default(), false);
        assert_eq!(report.problems.len(), 1);
        assert!(report.problems[0].starts_with("invalid ascii bytes in 'sample' at line 1, byte 3 in "));
        assert!(report.problems[0].ends_with("inst.sfz"));
    }
}
