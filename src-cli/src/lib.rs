pub mod app;
pub mod cli;
pub mod shell;

use std::io::{BufRead, Write};
use std::process::ExitCode;

use clap::Parser;
use fasternet_core::config::{AppConfig, StoreConfig};
use fasternet_core::error::AppError;
use tracing::debug;

use crate::app::App;
use crate::cli::{Cli, Command};

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into())
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Resolve config (file, then environment through `env`), open the backend and run one command.
pub fn execute(
    cli: &Cli,
    env: impl Fn(&str) -> Option<String>,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
) -> Result<(), AppError> {
    let config = AppConfig::load(cli.config.as_deref())?.with_env_overrides(env);
    debug!(
        remote = matches!(config.store, StoreConfig::Remote { .. }),
        "resolved configuration"
    );
    let mut app = App::open(config, cli.json)?;

    if cli.command == Command::Shell {
        return shell::run_shell(&mut app, input, out);
    }
    let text = app.dispatch(&cli.command)?;
    out.write_all(text.as_bytes()).map_err(|e| {
        AppError::new("OUTPUT_WRITE_FAILED", "Failed to write output").with_details(e.to_string())
    })
}

pub fn report_error(err: &AppError, verbose: bool) -> String {
    let mut msg = err.to_string();
    if verbose {
        if let Some(details) = &err.details {
            msg.push_str(&format!("\n  details: {details}"));
        }
    }
    if err.retryable {
        msg.push_str("\n  (temporary failure; try again)");
    }
    msg
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut out = std::io::stdout().lock();
    match execute(&cli, |k| std::env::var(k).ok(), &mut input, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", report_error(&e, cli.verbose));
            ExitCode::FAILURE
        }
    }
}
