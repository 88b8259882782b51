//! Configuration file support for the `sfzen` command
//!
//! Configuration is stored in TOML format at:
//! - Linux: `~/.config/sfzen/config.toml`
//! - macOS: `~/Library/Application Support/sfzen/config.toml`
//! - Windows: `%APPDATA%\sfzen\config.toml`
//!
//! Command line flags override every value read from the file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use sfzen::{OpcodeOrder, OrphanPolicy, ParseOptions, SerializeOptions, SourceEncoding, TargetFormat};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub parse: ParseSettings,
    pub check: CheckSettings,
    pub format: FormatSettings,
}

/// How instruments are read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseSettings {
    /// Source encoding label such as "utf-8" or "windows-1252"; detected when unset
    pub encoding: Option<String>,
    /// Fail on bytes that are invalid in the encoding
    pub strict_encoding: bool,
    /// Accept opcodes before the first header
    pub implicit_global: bool,
    pub max_include_depth: usize,
}

impl Default for ParseSettings {
    fn default() -> Self {
        let defaults = ParseOptions::default();
        Self {
            encoding: None,
            strict_encoding: defaults.strict_encoding,
            implicit_global: false,
            max_include_depth: defaults.max_include_depth,
        }
    }
}

impl ParseSettings {
    pub fn to_options(&self) -> Result<ParseOptions> {
        let encoding = match &self.encoding {
            Some(label) => Some(
                SourceEncoding::from_label(label).with_context(|| format!("Unknown encoding '{label}'"))?,
            ),
            None => None,
        };
        Ok(ParseOptions {
            encoding,
            strict_encoding: self.strict_encoding,
            orphans: if self.implicit_global { OrphanPolicy::ImplicitGlobal } else { OrphanPolicy::Reject },
            max_include_depth: self.max_include_depth,
            ..ParseOptions::default()
        })
    }
}

/// The sample format `check` expects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckSettings {
    pub sample_rate: u32,
    pub mono: bool,
    pub bits_per_sample: u16,
}

impl Default for CheckSettings {
    fn default() -> Self {
        let target = TargetFormat::default();
        Self { sample_rate: target.sample_rate, mono: false, bits_per_sample: target.bits_per_sample }
    }
}

impl CheckSettings {
    pub fn target(&self) -> TargetFormat {
        let target = TargetFormat {
            sample_rate: self.sample_rate,
            channels: None,
            bits_per_sample: self.bits_per_sample,
        };
        if self.mono {
            target.mono()
        } else {
            target
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatSettings {
    /// Sort opcodes into the conventional order
    pub canonical: bool,
}

impl FormatSettings {
    pub fn to_options(&self) -> SerializeOptions {
        let order = if self.canonical { OpcodeOrder::Canonical } else { OpcodeOrder::Original };
        SerializeOptions { order }
    }
}

impl Config {
    /// Load `path`, or the default config file if it exists
    ///
    /// An explicitly given file has to exist; a missing default file yields the
    /// default configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_file(path),
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::load_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn load_file(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Get the default configuration file path
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "sfzen").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Write a commented default config file, keeping an existing one
    pub fn create_default_config_file() -> Result<PathBuf> {
        let path = Self::config_path().context("Could not determine config directory")?;
        if path.exists() {
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = r#"# sfzen configuration file

[parse]
# Encoding of .sfz files: "utf-8", "latin-1", "windows-1252" or "ascii".
# Detected per file when unset.
# encoding = "windows-1252"

# Fail instead of decoding invalid bytes lossily
strict_encoding = false

# Accept opcodes written before the first header
implicit_global = false

max_include_depth = 32

[check]
# Format samples are expected in
sample_rate = 44100
mono = false
bits_per_sample = 16

[format]
# Sort opcodes into the conventional order
canonical = false
"#;
        fs::write(&path, content)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.check.sample_rate, 44100);
        assert_eq!(config.parse.to_options().unwrap(), ParseOptions::default());
        assert_eq!(config.format.to_options(), SerializeOptions::default());
    }

    #[test]
    fn test_partial_file() {
        let config: Config = toml::from_str("[check]\nmono = true\n[parse]\nencoding = \"latin-1\"\n").unwrap();
        assert_eq!(config.check.target().channels, Some(1));
        assert_eq!(config.check.bits_per_sample, 16);
        assert_eq!(config.parse.to_options().unwrap().encoding, Some(SourceEncoding::Latin1));
        assert!(!config.format.canonical);
    }

    #[test]
    fn test_unknown_encoding() {
        let settings = ParseSettings { encoding: Some("klingon".into()), ..ParseSettings::default() };
        assert!(settings.to_options().is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[format]\ncanonical = true\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.format.to_options(), SerializeOptions::canonical());

        assert!(Config::load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }
}
