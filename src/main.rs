//! Main entry point for envcrypt.

use clap::Parser;
use envcrypt::cli::Cli;
use envcrypt::utils::error_exit;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_env("ENVCRYPT_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("envcrypt=debug")
        } else {
            EnvFilter::new("envcrypt=warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .init();

    // Clean up compare files left behind by interrupted runs
    let _ = envcrypt::secure_temp::cleanup_old_temp_files();

    if let Err(e) = cli.execute() {
        error_exit(&e.to_string(), e.exit_code());
    }
}
