//! CLI command handlers
//!
//! - `args`: clap structures for the `run` and `topology` commands
//! - `router`: merges flags with the cluster file and runs the command

pub mod args;
pub mod router;

pub use args::{Cli, Commands};
pub use router::{build_run_options, execute_command};

/// Log filter for a `-v` count
pub fn get_log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}
