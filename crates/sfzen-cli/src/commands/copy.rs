use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use sfzen::samples::sample_root;
use sfzen::{copy_instrument, parse_sfz_file, ParseOptions, SerializeOptions};

/// Where the copy of `file` is written: a directory keeps the file name
pub fn destination_file(file: &Path, destination: &Path) -> Result<PathBuf> {
    if destination.is_dir() || destination.extension().is_none() {
        let name = file.file_name().with_context(|| format!("Not a file: {}", file.display()))?;
        Ok(destination.join(name))
    } else {
        Ok(destination.to_path_buf())
    }
}

/// Copy `file` and its samples to `destination`
pub fn run(file: &Path, destination: &Path, options: &ParseOptions, serialize: &SerializeOptions) -> Result<bool> {
    let dest_file = destination_file(file, destination)?;
    if dest_file.exists() {
        bail!("Refusing to overwrite {}", dest_file.display());
    }

    let doc = parse_sfz_file(file, options).with_context(|| format!("Failed to parse {}", file.display()))?;
    let report = copy_instrument(&doc, &sample_root(&doc), &dest_file, serialize)
        .with_context(|| format!("Failed to copy {}", file.display()))?;

    println!("{} ({} sample(s))", report.destination.display(), report.copied);
    for issue in &report.issues {
        eprintln!("\t{issue}");
    }
    Ok(report.issues.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_destination_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = Path::new("/lib/piano.sfz");
        assert_eq!(destination_file(file, dir.path()).unwrap(), dir.path().join("piano.sfz"));
        assert_eq!(
            destination_file(file, &dir.path().join("new")).unwrap(),
            dir.path().join("new/piano.sfz")
        );
        assert_eq!(
            destination_file(file, &dir.path().join("renamed.sfz")).unwrap(),
            dir.path().join("renamed.sfz")
        );
    }

    #[test]
    fn test_copy() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a.wav"), b"a").unwrap();
        let file = src.path().join("inst.sfz");
        fs::write(&file, "<region> sample=a.wav\n").unwrap();

        let clean = run(&file, dest.path(), &ParseOptions::default(), &SerializeOptions::default()).unwrap();
        assert!(clean);
        assert!(dest.path().join("a.wav").exists());
        assert_eq!(fs::read_to_string(dest.path().join("inst.sfz")).unwrap(), "<region>\nsample=a.wav\n");

        assert!(run(&file, dest.path(), &ParseOptions::default(), &SerializeOptions::default()).is_err());
    }
}
