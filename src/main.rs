use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser;

use hypeman_cli::cancel::CancelToken;
use hypeman_cli::cli::Cli;

/// Conventional status for a process stopped by SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

fn main() -> ExitCode {
    let cli = Cli::parse();
    hypeman_cli::init_tracing(cli.debug);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async {
        let cancel = CancelToken::new();
        cancel.cancel_on_interrupt();

        match hypeman_cli::run(cli, cancel).await {
            Ok(()) => Ok(ExitCode::SUCCESS),
            Err(err) if err.is_cancelled() => Ok(ExitCode::from(EXIT_INTERRUPTED)),
            Err(err) => Err(err.into()),
        }
    })
}
