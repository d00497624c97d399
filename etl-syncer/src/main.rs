//! ETL syncer binary.
//!
//! Runs one incremental sync of every configured MySQL stream into BigQuery and exits. Runs are
//! started by an external scheduler, which reads the JSON outcome printed on stdout and the
//! process exit code.

use std::process::ExitCode;

use etl::pipeline::{RunOutcome, RunStatus};
use etl_config::Environment;
use etl_config::shared::SyncerConfig;
use etl_telemetry::tracing::init_tracing;
use tracing::{Instrument, error, info, info_span};

use crate::config::load_syncer_config;
use crate::core::run_syncer_with_config;
use crate::error::{SyncerError, SyncerResult};

mod config;
mod core;
mod error;
mod notification;

/// Exit code of a run that completed with at least one failure.
const RUN_FAILED_EXIT_CODE: u8 = 1;

/// Exit code of a run that could not start.
const SETUP_FAILED_EXIT_CODE: u8 = 2;

/// Entry point for the syncer.
///
/// Loads configuration, initializes tracing, starts the async runtime and runs a single sync.
/// Prints the run outcome as one JSON line and maps it to the exit code.
fn main() -> ExitCode {
    match try_main() {
        Ok(outcome) => {
            print_outcome(&outcome);
            match outcome.status {
                RunStatus::Success => ExitCode::SUCCESS,
                RunStatus::Failure => ExitCode::from(RUN_FAILED_EXIT_CODE),
            }
        }
        Err(err) => {
            eprint!("{}", err.render_report());
            print_outcome(&RunOutcome {
                status: RunStatus::Failure,
                message: err.to_string(),
            });
            ExitCode::from(SETUP_FAILED_EXIT_CODE)
        }
    }
}

fn try_main() -> SyncerResult<RunOutcome> {
    let environment = Environment::load()?;

    // Load syncer config
    let syncer_config = load_syncer_config()?;

    let _log_flusher = init_tracing(environment).map_err(SyncerError::config)?;

    // The warehouse and workflow clients both reach Google APIs through rustls. An error only
    // means a provider is already installed.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    // We start the runtime.
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(environment, syncer_config))
}

/// Main async entry point that runs the sync once.
async fn async_main(environment: Environment, config: SyncerConfig) -> SyncerResult<RunOutcome> {
    let span = info_span!("syncer", environment = environment.as_str());

    async move {
        match run_syncer_with_config(config).await {
            Ok(report) => {
                let outcome = report.outcome();
                if let Some(err) = report.error() {
                    error!(error = %err, "{}", outcome.message);
                } else {
                    info!("{}", outcome.message);
                }

                Ok(outcome)
            }
            Err(err) => {
                error!("{err}");
                Err(err)
            }
        }
    }
    .instrument(span)
    .await
}

fn print_outcome(outcome: &RunOutcome) {
    match serde_json::to_string(outcome) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("failed to serialize run outcome: {err}"),
    }
}
