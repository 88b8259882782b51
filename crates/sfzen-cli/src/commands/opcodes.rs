use std::path::PathBuf;

use anyhow::Result;
use sfzen::{count_opcode_usage, ParseOptions, UsageReport};

/// One line per opcode, in the conventional opcode order
pub fn render(report: &UsageReport, counts: bool) -> Vec<String> {
    report
        .opcodes()
        .into_iter()
        .map(|name| if counts { format!("{:>6}  {name}", report.count(name)) } else { name.to_string() })
        .collect()
}

/// List every opcode used across `files`
pub fn run(files: &[PathBuf], options: &ParseOptions, counts: bool) -> Result<bool> {
    let report = count_opcode_usage(files, options);
    for line in render(&report, counts) {
        println!("{line}");
    }
    for (path, err) in &report.failures {
        eprintln!("Error in {}: {err}", path.display());
    }
    Ok(report.failures.is_empty())
}
