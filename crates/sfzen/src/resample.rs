//! Resampling support.
//!
//! Converting audio is left to an external tool. This module decides which samples
//! need converting, by reading their WAV headers, and updates a region once its
//! sample has been replaced: the new path goes into `sample` and every opcode that
//! counts sample frames is rescaled by the rate ratio.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::inheritance::resolve_region;
use crate::parser::path_utils::normalize_path;
use crate::parser::{Error, Result, SfzDocument};
use crate::samples::audit_samples;

/// Opcodes whose values are positions in sample frames
pub const SAMPLE_UNIT_OPCODES: &[&str] =
    &["offset", "offset_random", "end", "loop_start", "loop_end", "loopstart", "loopend"];

/// Format of a sample file as stored in its WAV header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz, {} chan, {} bits", self.sample_rate, self.channels, self.bits_per_sample)
    }
}

/// Read the format of a WAV file
pub fn probe_sample_format(path: &Path) -> Result<SampleFormat> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    Ok(SampleFormat {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
    })
}

/// The format samples are expected in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetFormat {
    pub sample_rate: u32,
    /// Required channel count; any count is accepted when `None`
    pub channels: Option<u16>,
    pub bits_per_sample: u16,
}

impl Default for TargetFormat {
    fn default() -> Self {
        Self { sample_rate: 44100, channels: None, bits_per_sample: 16 }
    }
}

impl TargetFormat {
    pub fn mono(self) -> Self {
        Self { channels: Some(1), ..self }
    }

    pub fn matches(&self, format: &SampleFormat) -> bool {
        format.sample_rate == self.sample_rate
            && format.bits_per_sample == self.bits_per_sample
            && self.channels.map_or(true, |channels| channels == format.channels)
    }

    /// Factor that converts frame positions of `format` into positions at the
    /// target rate
    pub fn rate_ratio(&self, format: &SampleFormat) -> f64 {
        f64::from(self.sample_rate) / f64::from(format.sample_rate)
    }
}

/// A region whose sample is not in the target format
#[derive(Debug, Clone, PartialEq)]
pub struct ResampleJob {
    pub region: usize,
    pub source: PathBuf,
    pub format: SampleFormat,
    pub rate_ratio: f64,
}

/// Samples that need converting, and samples that could not be probed
#[derive(Debug, Default)]
pub struct ResamplePlan {
    pub jobs: Vec<ResampleJob>,
    pub failures: Vec<(PathBuf, Error)>,
}

impl ResamplePlan {
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Number of distinct files per offending format
    pub fn format_counts(&self) -> Vec<(SampleFormat, usize)> {
        let mut seen: HashMap<&Path, SampleFormat> = HashMap::new();
        for job in &self.jobs {
            seen.insert(&job.source, job.format);
        }
        let mut counts: HashMap<SampleFormat, usize> = HashMap::new();
        for format in seen.into_values() {
            *counts.entry(format).or_default() += 1;
        }
        let mut counts: Vec<_> = counts.into_iter().collect();
        counts.sort_by_key(|(format, _)| (format.sample_rate, format.channels, format.bits_per_sample));
        counts
    }
}

/// Find every region whose existing sample does not match `target`
///
/// Samples that cannot be found are not part of the plan; [`audit_samples`]
/// reports those. Each file is probed once, however many regions use it.
pub fn plan_resample(doc: &SfzDocument, root: &Path, target: &TargetFormat) -> ResamplePlan {
    let mut plan = ResamplePlan::default();
    let mut probed: HashMap<PathBuf, Option<SampleFormat>> = HashMap::new();

    for resolved in audit_samples(doc, root).resolved {
        let format = match probed.get(&resolved.path) {
            Some(format) => *format,
            None => {
                let format = match probe_sample_format(&resolved.path) {
                    Ok(format) => Some(format),
                    Err(err) => {
                        log::warn!("Cannot probe {}: {err}", resolved.path.display());
                        plan.failures.push((resolved.path.clone(), err));
                        None
                    }
                };
                probed.insert(resolved.path.clone(), format);
                format
            }
        };

        if let Some(format) = format.filter(|format| !target.matches(format)) {
            plan.jobs.push(ResampleJob {
                region: resolved.region,
                rate_ratio: target.rate_ratio(&format),
                source: resolved.path,
                format,
            });
        }
    }

    plan
}

/// Point `region` at a converted sample and rescale its frame positions
///
/// Frame opcodes are taken from the effective opcode set, so inherited positions
/// are rescaled too; the rescaled values are written into the region itself and
/// the sections it inherits from are left alone. Returns the opcodes that changed.
///
/// A relative `new_path` is taken as relative to the sample root, so an inherited
/// `default_path` is overridden with an empty one in the region.
pub fn apply_conversion(doc: &mut SfzDocument, region: usize, new_path: &str, rate_ratio: f64) -> Result<Vec<String>> {
    let effective = resolve_region(doc, region).ok_or(Error::NotARegion(region))?;
    let mut updates = Vec::new();

    if rate_ratio != 1.0 {
        for &name in SAMPLE_UNIT_OPCODES {
            let Some(value) = effective.value(name) else {
                continue;
            };
            let frames: f64 = value
                .trim()
                .parse()
                .map_err(|_| Error::InvalidOpcodeValue(value.to_string(), "sample frames".to_string()))?;
            let rescaled = (frames * rate_ratio).round();
            if rescaled != frames {
                log::debug!("Adjusted {name} of region {region}: {value} -> {rescaled}");
                updates.push((name, (rescaled as i64).to_string()));
            }
        }
    }

    let inherits_default_path = effective.value("default_path").is_some_and(|path| !path.is_empty());
    if inherits_default_path && !Path::new(&normalize_path(new_path)).is_absolute() {
        updates.push(("default_path", String::new()));
    }

    // Nothing is written until every position has been parsed
    for (name, value) in &updates {
        doc.set_opcode(region, name, value);
    }
    doc.set_opcode(region, "sample", new_path);
    Ok(updates.into_iter().map(|(name, _)| name.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::path_utils::resolve_absolute_path;
    use crate::parser::{parse_sfz_file, parse_sfz_str, ParseOptions};
    use std::fs;

    fn write_wav(path: &Path, sample_rate: u32, channels: u16) {
        let spec = hound::WavSpec { channels, sample_rate, bits_per_sample: 16, sample_format: hound::SampleFormat::Int };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..16 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_probe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        write_wav(&path, 48000, 2);
        let format = probe_sample_format(&path).unwrap();
        assert_eq!(format, SampleFormat { sample_rate: 48000, channels: 2, bits_per_sample: 16 });
        assert_eq!(format.to_string(), "48000 Hz, 2 chan, 16 bits");

        fs::write(dir.path().join("b.wav"), b"not a wav").unwrap();
        assert!(matches!(probe_sample_format(&dir.path().join("b.wav")), Err(Error::Wav(_))));
    }

    #[test]
    fn test_target_format() {
        let format = SampleFormat { sample_rate: 44100, channels: 2, bits_per_sample: 16 };
        assert!(TargetFormat::default().matches(&format));
        assert!(!TargetFormat::default().mono().matches(&format));
        assert_eq!(TargetFormat::default().rate_ratio(&format), 1.0);
    }

    #[test]
    fn test_plan_resample() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("hi.wav"), 48000, 1);
        write_wav(&dir.path().join("ok.wav"), 44100, 1);
        fs::write(dir.path().join("bad.wav"), b"junk").unwrap();
        fs::write(
            dir.path().join("inst.sfz"),
            "<region> sample=hi.wav\n<region> sample=hi.wav\n<region> sample=ok.wav\n\
             <region> sample=bad.wav\n<region> sample=missing.wav\n",
        )
        .unwrap();

        let doc = parse_sfz_file(dir.path().join("inst.sfz"), &ParseOptions::default()).unwrap();
        let root = crate::samples::sample_root(&doc);
        let plan = plan_resample(&doc, &root, &TargetFormat::default());

        assert_eq!(plan.jobs.iter().map(|job| job.region).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(plan.jobs[0].rate_ratio, 44100.0 / 48000.0);
        assert_eq!(plan.failures.len(), 1);
        assert!(plan.failures[0].0.ends_with("bad.wav"));
        assert_eq!(
            plan.format_counts(),
            vec![(SampleFormat { sample_rate: 48000, channels: 1, bits_per_sample: 16 }, 1)]
        );
    }

    #[test]
    fn test_apply_conversion() {
        let mut doc = parse_sfz_str(
            "<group> loop_start=4800\n\
             <region> sample=a.wav offset=480 end=48000\n\
             <region> sample=b.wav\n",
            &ParseOptions::default(),
        )
        .unwrap();

        let adjusted = apply_conversion(&mut doc, 1, "/tmp/a-44100.wav", 44100.0 / 48000.0).unwrap();
        assert_eq!(adjusted, vec!["offset", "end", "loop_start"]);

        let region = &doc.sections()[1];
        assert_eq!(region.get_opcode_str("sample"), Some("/tmp/a-44100.wav"));
        assert_eq!(region.get_opcode_str("offset"), Some("441"));
        assert_eq!(region.get_opcode_str("end"), Some("44100"));
        assert_eq!(region.get_opcode_str("loop_start"), Some("4410"));
        assert_eq!(doc.sections()[0].get_opcode_str("loop_start"), Some("4800"));
        assert_eq!(doc.sections()[2].opcode("loop_start"), None);

        assert!(matches!(apply_conversion(&mut doc, 0, "x.wav", 1.0), Err(Error::NotARegion(0))));
    }

    #[test]
    fn test_apply_conversion_relative_path_drops_default_path() {
        let mut doc = parse_sfz_str(
            "<control> default_path=orig/\n<region> sample=a.wav\n<region> sample=b.wav\n",
            &ParseOptions::default(),
        )
        .unwrap();

        let adjusted = apply_conversion(&mut doc, 1, "converted/a.wav", 1.0).unwrap();
        assert_eq!(adjusted, vec!["default_path"]);
        let region = resolve_region(&doc, 1).unwrap();
        assert_eq!(region.value("default_path"), Some(""));
        assert_eq!(
            resolve_absolute_path(region.value("sample").unwrap(), region.value("default_path"), Path::new("/lib")),
            PathBuf::from("/lib/converted/a.wav")
        );
        assert_eq!(resolve_region(&doc, 2).unwrap().value("default_path"), Some("orig/"));

        // absolute paths ignore default_path anyway
        assert!(apply_conversion(&mut doc, 2, "/tmp/b.wav", 1.0).unwrap().is_empty());
        assert_eq!(resolve_region(&doc, 2).unwrap().value("default_path"), Some("orig/"));
    }

    #[test]
    fn test_apply_conversion_rejects_bad_positions() {
        let mut doc = parse_sfz_str("<region> sample=a.wav end=lots\n", &ParseOptions::default()).unwrap();
        let err = apply_conversion(&mut doc, 0, "b.wav", 0.5).unwrap_err();
        assert!(matches!(err, Error::InvalidOpcodeValue(value, _) if value == "lots"));
        assert_eq!(doc.sections()[0].get_opcode_str("sample"), Some("a.wav"));
    }
}
