//! sfzen CLI - The `sfzen` command.
//!
//! Tools for working with SFZ instruments:
//!
//! - **opcodes**: list the opcodes used across many instruments
//! - **check**: report missing samples, invalid encodings and samples in the wrong format
//! - **format**: rewrite an instrument in a uniform layout
//! - **copy**: copy an instrument together with its samples

mod commands;
mod config;
mod discover;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::format::Output;
use crate::config::Config;

/// sfzen - SFZ instrument tools
#[derive(Parser, Debug)]
#[command(name = "sfzen")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect, check, format and copy SFZ instruments", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Show progress and debug information
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Encoding of .sfz files (utf-8, latin-1, windows-1252, ascii)
    #[arg(long, global = true)]
    encoding: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List all opcodes used by the given instruments
    Opcodes {
        /// Files or directories to inspect
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,

        /// Recurse into subdirectories
        #[arg(short, long)]
        recurse: bool,

        /// Show how many sections use each opcode
        #[arg(short, long)]
        counts: bool,
    },

    /// Check that samples exist, are validly encoded and are in the expected format
    Check {
        /// Files or directories to inspect
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,

        /// Recurse into subdirectories
        #[arg(short, long)]
        recurse: bool,

        /// Expected sample rate
        #[arg(short, long)]
        sample_rate: Option<u32>,

        /// Expect mono samples
        #[arg(short, long)]
        mono: bool,

        /// Expected bit depth
        #[arg(short, long)]
        bitdepth: Option<u16>,

        /// List every offending sample instead of a summary
        #[arg(short, long)]
        details: bool,
    },

    /// Rewrite an instrument with one opcode per line
    Format {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Sort opcodes into the conventional order
        #[arg(short, long)]
        canonical: bool,

        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "FILE", conflicts_with = "in_place")]
        output: Option<PathBuf>,

        /// Overwrite the input file
        #[arg(short, long)]
        in_place: bool,
    },

    /// Copy an instrument and its samples to a new location
    Copy {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Target directory or .sfz file
        #[arg(value_name = "DESTINATION")]
        destination: PathBuf,
    },

    /// Create the default config file and print its path
    Config,
}

fn init_logger(verbose: bool) {
    // RUST_LOG overrides the default level
    let default_level = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}

fn run(args: Args) -> Result<bool> {
    if let Commands::Config = args.command {
        println!("{}", Config::create_default_config_file()?.display());
        return Ok(true);
    }

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(encoding) = args.encoding {
        config.parse.encoding = Some(encoding);
    }
    let parse_options = config.parse.to_options()?;

    match args.command {
        Commands::Opcodes { paths, recurse, counts } => {
            let files = discover::sfz_files(&paths, recurse)?;
            log::info!("Reading {} file(s)", files.len());
            commands::opcodes::run(&files, &parse_options, counts)
        }
        Commands::Check { paths, recurse, sample_rate, mono, bitdepth, details } => {
            if let Some(sample_rate) = sample_rate {
                config.check.sample_rate = sample_rate;
            }
            if let Some(bitdepth) = bitdepth {
                config.check.bits_per_sample = bitdepth;
            }
            config.check.mono |= mono;

            let files = discover::sfz_files(&paths, recurse)?;
            log::info!("Checking {} file(s)", files.len());
            commands::check::run(&files, &parse_options, &config.check.target(), details)
        }
        Commands::Format { file, canonical, output, in_place } => {
            config.format.canonical |= canonical;
            let output = match (output, in_place) {
                (_, true) => Output::InPlace,
                (Some(path), false) => Output::File(path),
                (None, false) => Output::Stdout,
            };
            commands::format::run(&file, &output, &parse_options, &config.format.to_options())
        }
        Commands::Copy { file, destination } => {
            commands::copy::run(&file, &destination, &parse_options, &config.format.to_options())
        }
        Commands::Config => Ok(true),
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logger(args.verbose);

    let clean = run(args)?;
    Ok(if clean { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_arguments() {
        let args = Args::parse_from(["sfzen", "check", "-r", "--sample-rate", "48000", "-m", "lib/", "-v"]);
        assert!(args.verbose);
        match args.command {
            Commands::Check { paths, recurse, sample_rate, mono, bitdepth, details } => {
                assert_eq!(paths, vec![PathBuf::from("lib/")]);
                assert!(recurse && mono && !details);
                assert_eq!(sample_rate, Some(48000));
                assert_eq!(bitdepth, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
