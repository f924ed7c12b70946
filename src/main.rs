use clap::Parser;
use oracle_dispatch::cli::{execute_command, get_log_level, Cli};
use tracing::{debug, error, trace};

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(get_log_level(cli.verbose))
        .with_target(cli.verbose >= 2) // Show target module for -vv and above
        .with_thread_ids(cli.verbose >= 3) // Show thread IDs for -vvv
        .with_line_number(cli.verbose >= 3) // Show line numbers for -vvv
        .with_writer(std::io::stderr)
        .init();

    debug!("oracle-dispatch started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = execute_command(cli.command, cli.verbose) {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
