//! # tether CLI
//!
//! Command-line access to `tether-core`: inspect connection types, list,
//! add and remove edges, search for targets, run deletion cleanup and
//! migrate legacy data. Run `tether --help` for usage information.

mod cli;
pub mod ui;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}
