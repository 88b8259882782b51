//! Collecting `.sfz` files from command line arguments.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

fn is_sfz(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()).is_some_and(|ext| ext.eq_ignore_ascii_case("sfz"))
}

fn walk(dir: &Path, recurse: bool, found: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).with_context(|| format!("Failed to read directory {}", dir.display()))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if recurse {
                walk(&path, recurse, found)?;
            }
        } else if is_sfz(&path) {
            found.push(path);
        }
    }
    Ok(())
}

/// Expand files and directories into a sorted list of `.sfz` files
///
/// Files given directly are taken whatever their extension. Directories contribute
/// the `.sfz` files they contain, and those of their subdirectories with `recurse`.
pub fn sfz_files(paths: &[PathBuf], recurse: bool) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for path in paths {
        if path.is_dir() {
            walk(path, recurse, &mut found)?;
        } else if path.is_file() {
            found.push(path.clone());
        } else {
            bail!("No such file or directory: {}", path.display());
        }
    }
    found.sort();
    found.dedup();
    Ok(found)
}
