use std::path::{Component, Path, PathBuf};

/// Normalize the separators of a path written in an SFZ file
///
/// SFZ files authored on Windows use backslashes, which every platform we run on
/// also accepts as forward slashes. Backslashes are therefore always converted.
///
/// # Example
///
/// ```
/// use sfzen::parser::path_utils::normalize_path;
///
/// assert_eq!(normalize_path("samples\\piano\\C4.wav"), "samples/piano/C4.wav");
/// ```
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Drop `.` components from a path, keeping everything else as written
pub fn clean_path(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

/// Drop `.` components and resolve `..` lexically, without touching the filesystem
///
/// A `..` that would climb above the root (or above the start of a relative path)
/// is kept.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    parts.into_iter().collect()
}

/// Combine a default path with a sample path
///
/// This function handles combining a default path with a sample path following
/// SFZ format rules:
/// - If the sample path is absolute, it's used as-is
/// - If the sample path is relative, it's appended to the default path
/// - Backslashes are normalized and `.` components dropped
///
/// # Example
///
/// ```
/// use sfzen::parser::path_utils::combine_sample_path;
/// use std::path::PathBuf;
///
/// assert_eq!(combine_sample_path("samples/piano", "C4.wav"), PathBuf::from("samples/piano/C4.wav"));
/// assert_eq!(combine_sample_path("samples/", "/abs/C4.wav"), PathBuf::from("/abs/C4.wav"));
/// ```
pub fn combine_sample_path(default_path: &str, sample_path: &str) -> PathBuf {
    let sample = PathBuf::from(normalize_path(sample_path));
    if sample.is_absolute() {
        return clean_path(&sample);
    }
    clean_path(&Path::new(&normalize_path(default_path)).join(sample))
}

/// Resolve a sample path against a root directory using SFZ resolution rules
///
/// 1. An absolute sample path is used directly
/// 2. Otherwise it is appended to `default_path`; an absolute `default_path`
///    ignores the root
/// 3. A path that is still relative is joined to `root`
///
/// ```
/// use sfzen::parser::path_utils::resolve_absolute_path;
/// use std::path::{Path, PathBuf};
///
/// let resolved = resolve_absolute_path("kick.wav", Some("drums/"), Path::new("/lib"));
/// assert_eq!(resolved, PathBuf::from("/lib/drums/kick.wav"));
/// ```
pub fn resolve_absolute_path(sample_path: &str, default_path: Option<&str>, root: &Path) -> PathBuf {
    let path = match default_path {
        Some(default_path) => combine_sample_path(default_path, sample_path),
        None => clean_path(Path::new(&normalize_path(sample_path))),
    };
    if path.is_absolute() {
        path
    } else {
        clean_path(&root.join(path))
    }
}
