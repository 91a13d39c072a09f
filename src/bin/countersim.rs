//! countersim command line
//!
//! Seeds the counter store, validates the telemetry service, and simulates
//! live counters until interrupted.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::filter::LevelFilter;

use countersim::repository::RecordTemplate;
use countersim::validation::load_scenarios;
use countersim::{
    default_battery, logging, run_suite, seed_store, CounterRepository, CounterSimulator, CounterStore,
    GnmiTelemetryClient, HarnessConfig, HarnessError, HarnessResult, InMemoryStore, LoopbackTelemetry,
    ObjectIdentifierMap, PolicyDocument, RedisStore, SuiteReport, TelemetryClient,
};

#[derive(Debug, Parser)]
#[command(name = "countersim", version, about = "Device counter simulator and gNMI validation harness")]
struct Cli {
    /// Harness configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use an in-memory store and the loopback gNMI responder instead of
    /// Redis and a remote service. The store is seeded first.
    #[arg(long, global = true)]
    dry_run: bool,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load the seed documents into the store.
    Seed,
    /// Run the query scenarios once.
    Validate {
        /// Write the suite report as JSON.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Run the counter generators until Ctrl-C.
    Simulate,
    /// Seed, validate, then simulate until Ctrl-C.
    Run {
        /// Write the suite report as JSON.
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

struct Harness {
    config: HarnessConfig,
    store: Arc<dyn CounterStore>,
    dry_run: bool,
}

impl Harness {
    async fn open(config: HarnessConfig, dry_run: bool) -> HarnessResult<Self> {
        let store: Arc<dyn CounterStore> = if dry_run {
            info!("dry run: using the in-memory store");
            let store = Arc::new(InMemoryStore::new());
            seed_store(store.as_ref(), &config.seed).await?;
            store
        } else {
            let store = RedisStore::connect(&config.store).await?;
            if let Err(e) = store.enable_keyspace_events().await {
                warn!(error = %e, "could not enable keyspace notifications");
            }
            info!(address = %config.store.address, database = config.store.database, "connected to store");
            Arc::new(store)
        };

        Ok(Self {
            config,
            store,
            dry_run,
        })
    }

    async fn seed(&self) -> HarnessResult<()> {
        if self.dry_run {
            // Already seeded when the in-memory store was opened.
            return Ok(());
        }
        seed_store(self.store.as_ref(), &self.config.seed).await?;
        Ok(())
    }

    async fn validate(&self, report_path: Option<&Path>) -> HarnessResult<SuiteReport> {
        let scenarios = match &self.config.validation.scenario_file {
            Some(file) => load_scenarios(file)?,
            None => default_battery(&self.config.validation.target, &self.config.seed.data_dir)?,
        };

        let client: Box<dyn TelemetryClient> = if self.dry_run {
            Box::new(LoopbackTelemetry::new(Arc::clone(&self.store)))
        } else {
            Box::new(GnmiTelemetryClient::connect(&self.config.telemetry).await?)
        };

        let report = run_suite(client.as_ref(), &scenarios).await;
        for result in report.results.iter().filter(|r| !r.passed()) {
            warn!(
                scenario = %result.description,
                outcome = ?result.outcome,
                expected = ?result.expected,
                observed = ?result.observed,
                "scenario failed"
            );
        }
        info!(passed = report.passed(), failed = report.failed(), "validation finished");

        if let Some(path) = report_path {
            let json = serde_json::to_vec_pretty(&report).map_err(|e| HarnessError::Report {
                message: format!("failed to encode suite report: {e}"),
            })?;
            std::fs::write(path, json).map_err(|e| HarnessError::Report {
                message: format!("failed to write {}: {e}", path.display()),
            })?;
            info!(path = %path.display(), "wrote suite report");
        }
        Ok(report)
    }

    async fn simulate(&self) -> HarnessResult<()> {
        let sim_config = &self.config.simulation;
        let oids = ObjectIdentifierMap::load_from_store(self.store.as_ref()).await?;
        let port_template = load_template(sim_config.port_template.as_deref())?;
        let queue_template = load_template(sim_config.queue_template.as_deref())?;

        let repository = CounterRepository::new(Arc::clone(&self.store), Arc::new(oids))
            .with_queue_selection(sim_config.queue_selection)
            .with_templates(port_template, queue_template);

        let policies = PolicyDocument::load(&sim_config.policy_file)?;
        info!(
            title = %policies.title,
            app = %policies.app.name,
            counters = policies.counters.len(),
            "loaded counter policies"
        );

        let handle = CounterSimulator::new(Arc::new(repository), sim_config)
            .start(&policies.counters);
        for failure in handle.failures() {
            error!(counter = %failure.counter, error = %failure.error, "counter not started");
        }
        info!(running = handle.running().len(), "simulation running, press Ctrl+C to stop");

        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C, stopping");
        }
        handle.shutdown().await;
        Ok(())
    }
}

fn load_template(path: Option<&Path>) -> HarnessResult<RecordTemplate> {
    Ok(path.map(RecordTemplate::load).transpose()?.unwrap_or_default())
}

fn load_config(path: Option<&Path>) -> HarnessResult<HarnessConfig> {
    let config = match path {
        Some(path) => HarnessConfig::load(path)?,
        None => {
            let config = HarnessConfig::default();
            config.validate()?;
            config
        }
    };
    Ok(config)
}

async fn execute(cli: Cli) -> HarnessResult<ExitCode> {
    let config = load_config(cli.config.as_deref())?;
    let harness = Harness::open(config, cli.dry_run).await?;

    match cli.command {
        Command::Seed => {
            harness.seed().await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Validate { report } => {
            let report = harness.validate(report.as_deref()).await?;
            Ok(if report.all_passed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Simulate => {
            harness.simulate().await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Run { report } => {
            harness.seed().await?;
            // Validation failures are reported, not fatal.
            if let Err(e) = harness.validate(report.as_deref()).await {
                if e.is_fatal_at_startup() {
                    return Err(e);
                }
                error!(error = %e, retryable = e.is_retryable(), "validation could not run");
            }
            harness.simulate().await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_with_default(if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO });
    info!(version = env!("CARGO_PKG_VERSION"), "countersim starting");

    match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, retryable = e.is_retryable(), "countersim failed");
            ExitCode::FAILURE
        }
    }
}
