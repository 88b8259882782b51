use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sfzen::{parse_sfz_file, serialize_bytes, ParseOptions, SerializeOptions};

/// Where formatted output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Stdout,
    File(PathBuf),
    InPlace,
}

/// Re-serialize `file`
///
/// Includes are inlined and macros expanded in the result. Values are written with
/// their original bytes, so the file keeps its encoding.
pub fn format_file(file: &Path, options: &ParseOptions, serialize: &SerializeOptions) -> Result<Vec<u8>> {
    let doc = parse_sfz_file(file, options).with_context(|| format!("Failed to parse {}", file.display()))?;
    if doc.sources.len() > 1 {
        log::info!("Inlining {} included file(s) of {}", doc.sources.len() - 1, file.display());
    }
    Ok(serialize_bytes(&doc, serialize))
}

pub fn run(file: &Path, output: &Output, options: &ParseOptions, serialize: &SerializeOptions) -> Result<bool> {
    let bytes = format_file(file, options, serialize)?;
    match output {
        Output::Stdout => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
        Output::File(path) => {
            fs::write(path, &bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        }
        Output::InPlace => {
            fs::write(file, &bytes).with_context(|| format!("Failed to write {}", file.display()))?;
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.sfz");
        fs::write(&file, "// comment\n<region>   volume=-1  sample=a.wav   lokey=1\n").unwrap();

        let original = format_file(&file, &ParseOptions::default(), &SerializeOptions::default()).unwrap();
        assert_eq!(original, b"<region>\nvolume=-1\nsample=a.wav\nlokey=1\n");

        let canonical = format_file(&file, &ParseOptions::default(), &SerializeOptions::canonical()).unwrap();
        assert_eq!(canonical, b"<region>\nlokey=1\nsample=a.wav\nvolume=-1\n");

        let out = dir.path().join("out.sfz");
        run(&file, &Output::File(out.clone()), &ParseOptions::default(), &SerializeOptions::default()).unwrap();
        assert_eq!(fs::read(out).unwrap(), original);
    }

    #[test]
    fn test_parse_error_has_context() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bad.sfz");
        fs::write(&file, "volume=1\n").unwrap();
        let err = format_file(&file, &ParseOptions::default(), &SerializeOptions::default()).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse"));
        assert!(err.downcast_ref::<sfzen::Error>().is_some());
    }
}
