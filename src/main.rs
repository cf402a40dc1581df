use anyhow::Result;
use clap::Parser;
use std::future::Future;
use std::io;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use voidscan::cli::{Cli, Commands};
use voidscan::output;
use voidscan::service::ScanService;

fn init_logging(verbose: bool) {
    let default = if verbose { "voidscan=debug" } else { "voidscan=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Cancel the scan when `signal` fires. A handler that fails to install
/// leaves the scan running.
async fn cancel_on_signal<F>(signal: F, cancel: CancellationToken)
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            eprintln!("\nStopping: waiting for in-flight probes...");
            cancel.cancel();
        }
        Err(e) => tracing::warn!(error = %e, "could not listen for Ctrl-C"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = match cli.settings() {
        Ok(settings) => settings,
        Err(e) => {
            output::print_error(&e.to_string());
            std::process::exit(2);
        }
    };
    let service = ScanService::new(settings);

    let result = match &cli.command {
        Commands::Scan(cmd) => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(cancel_on_signal(tokio::signal::ctrl_c(), on_signal));
            cmd.execute(&service, &cancel, cli.quiet).await
        }
        Commands::History(cmd) => cmd.execute(&service),
        Commands::Show(cmd) => cmd.execute(&service),
    };

    if let Err(e) = result {
        output::print_error(&e.to_string());
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signal_cancels_scan() {
        let cancel = CancellationToken::new();
        cancel_on_signal(async { Ok(()) }, cancel.clone()).await;
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_failed_signal_handler_keeps_scan_running() {
        let cancel = CancellationToken::new();
        let failed = async { Err(io::Error::new(io::ErrorKind::Other, "no signal support")) };
        cancel_on_signal(failed, cancel.clone()).await;
        assert!(!cancel.is_cancelled());
    }
}
