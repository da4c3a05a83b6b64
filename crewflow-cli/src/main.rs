//! `crewflow` command line: terminal research flow, backend check and the
//! browser dashboard.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crewflow::config::CrewflowConfig;
use crewflow::research::ResearchPipeline;
use std::future::Future;
use std::io::{self, BufReader};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::info;

mod dashboard;
mod telemetry;
mod terminal;

/// Probe bound applied by the dashboard when the config leaves it unset.
const DASHBOARD_PROBE_TIMEOUT_SECS: u64 = 10;

/// How long shutdown waits for a stdin read left behind by an interrupt.
const BLOCKING_SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(
    name = "crewflow",
    version = env!("CARGO_PKG_VERSION"),
    about = "Research a topic with local models and write a report"
)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "CREWFLOW_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Emit JSON log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Research a topic in the terminal; prompts when no topic is given
    Research {
        /// Topic to research
        topic: Option<String>,

        /// Directory the report is written to
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Check that the backend is installed and has the model
    Check {
        /// Also send a one-line test prompt
        #[arg(long)]
        smoke: bool,
    },
    /// Serve the browser dashboard
    Serve {
        /// Listen address
        #[arg(long, env = "CREWFLOW_ADDR", default_value = "127.0.0.1:8501")]
        addr: SocketAddr,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Error: starting runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(cli));
    runtime.shutdown_timeout(BLOCKING_SHUTDOWN_GRACE);

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Installs the Ctrl-C handler now and resolves on the first Ctrl-C.
///
/// Never resolves if the handler cannot be installed.
fn interrupt_signal() -> impl Future<Output = ()> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(());
        }
    });
    async move {
        if rx.await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = CrewflowConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if cli.json_logs {
        config.telemetry.json = true;
    }
    telemetry::init(&config.telemetry)?;

    match cli.command {
        Commands::Research { topic, output_dir } => {
            if let Some(dir) = output_dir {
                config.report.output_dir = dir;
            }
            let interrupt = interrupt_signal();
            tokio::task::yield_now().await;
            let pipeline = ResearchPipeline::from_config(&config)?;

            let outcome = terminal::research(
                &pipeline,
                topic,
                BufReader::new(io::stdin()),
                &mut io::stdout(),
                interrupt,
            )
            .await?;
            Ok(outcome.exit_code())
        }
        Commands::Check { smoke } => {
            let pipeline = ResearchPipeline::from_config(&config)?;
            let outcome = terminal::check(
                pipeline.probe().as_ref(),
                pipeline.client().as_ref(),
                &pipeline.model().name,
                smoke,
                &mut io::stdout(),
            )
            .await?;
            Ok(outcome.exit_code())
        }
        Commands::Serve { addr } => {
            config
                .probe
                .timeout_secs
                .get_or_insert(DASHBOARD_PROBE_TIMEOUT_SECS);
            let pipeline = ResearchPipeline::from_config(&config)?;
            info!(model = %pipeline.model(), output_dir = %pipeline.persister().output_dir().display(), "Starting dashboard");

            dashboard::serve(dashboard::AppState::new(Arc::new(pipeline)), addr).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
