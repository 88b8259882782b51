//! Subcommand implementations. Each `run` prints its results and returns
//! whether the input was free of problems.

pub mod check;
pub mod copy;
pub mod format;
pub mod opcodes;
