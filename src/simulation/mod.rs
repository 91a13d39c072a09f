//! Counter simulation engine.
//!
//! Every configured counter gets one long-lived task that computes a value,
//! writes it through the [`CounterRepository`] and then sleeps for the
//! counter's interval. Ticks of one counter are strictly sequential; counters
//! never wait on each other.
//!
//! Each tick runs under a budget. A tick that exceeds it is dropped (which
//! cancels the in-flight write) and logged, and the next tick is scheduled as
//! usual. A single [`CancellationToken`] stops every generator, both while it
//! sleeps and while a tick is in flight.

mod generator;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SimulationConfig;
use crate::error::{ConfigError, TickError};
use crate::policy::CounterPolicy;
use crate::repository::{CounterRepository, ResolvedCounter};

pub use generator::{ValueGenerator, RANDOM_UPPER_BOUND};

/// Outcome of one tick of one counter.
#[derive(Debug)]
pub struct TickReport {
    /// Counter name.
    pub counter: String,
    /// 1-based tick number within the counter's generator.
    pub tick: u64,
    /// Value the tick tried to write.
    pub value: i64,
    /// Whether the write landed, and why not.
    pub outcome: Result<(), TickError>,
    /// When the tick finished.
    pub at: DateTime<Utc>,
}

impl TickReport {
    /// True when the write landed.
    #[must_use]
    pub const fn committed(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// A counter whose policy could not be resolved at startup.
#[derive(Debug)]
pub struct StartFailure {
    /// Counter name.
    pub counter: String,
    /// Why the path did not resolve.
    pub error: ConfigError,
}

/// Spawns and owns counter generators.
#[derive(Debug)]
pub struct CounterSimulator {
    repository: Arc<CounterRepository>,
    tick_budget: Duration,
    reports: Option<mpsc::Sender<TickReport>>,
}

impl CounterSimulator {
    /// Simulator writing through `repository` with the configured tick budget.
    #[must_use]
    pub fn new(repository: Arc<CounterRepository>, config: &SimulationConfig) -> Self {
        Self {
            repository,
            tick_budget: config.tick_budget(),
            reports: None,
        }
    }

    /// Override the per-tick budget.
    #[must_use]
    pub fn with_tick_budget(mut self, budget: Duration) -> Self {
        self.tick_budget = budget;
        self
    }

    /// Publish every tick outcome on `sender`. Reports that do not fit are
    /// dropped and counted; generators never wait on the receiver.
    #[must_use]
    pub fn with_reports(mut self, sender: mpsc::Sender<TickReport>) -> Self {
        self.reports = Some(sender);
        self
    }

    /// Start one generator per policy.
    ///
    /// Policies whose path does not resolve are reported in
    /// [`SimulationHandle::failures`] and never started; the others are not
    /// affected. Fixed counters get a task of their own that writes once, so a
    /// slow write never delays the counters after it.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(&self, policies: &[CounterPolicy]) -> SimulationHandle {
        let cancel = CancellationToken::new();
        let dropped_reports = Arc::new(AtomicU64::new(0));
        let mut tasks = JoinSet::new();
        let mut running = Vec::new();
        let mut failures = Vec::new();

        for policy in policies {
            let counter = match self.repository.resolve(&policy.path) {
                Ok(counter) => counter,
                Err(error) => {
                    warn!(counter = %policy.name, path = %policy.path, error = %error, "counter failed to start");
                    failures.push(StartFailure {
                        counter: policy.name.clone(),
                        error,
                    });
                    continue;
                }
            };

            let mut ticker = Ticker {
                name: policy.name.clone(),
                counter,
                generator: ValueGenerator::from_policy(policy),
                repository: Arc::clone(&self.repository),
                budget: self.tick_budget,
                reports: self.reports.clone(),
                dropped_reports: Arc::clone(&dropped_reports),
                ticks: 0,
            };

            let token = cancel.child_token();
            if ticker.generator.is_scheduled() {
                info!(
                    counter = %policy.name,
                    kind = %policy.kind,
                    interval_secs = policy.interval.as_secs(),
                    key = %ticker.counter.key,
                    "starting counter generator"
                );
                let interval = policy.interval;
                tasks.spawn(async move { ticker.run(interval, token).await });
            } else {
                info!(counter = %policy.name, key = %ticker.counter.key, "writing fixed counter");
                tasks.spawn(async move {
                    ticker.tick(&token).await;
                });
            }
            running.push(policy.name.clone());
        }

        SimulationHandle {
            cancel,
            tasks,
            running,
            failures,
            dropped_reports,
        }
    }
}

struct Ticker {
    name: String,
    counter: ResolvedCounter,
    generator: ValueGenerator,
    repository: Arc<CounterRepository>,
    budget: Duration,
    reports: Option<mpsc::Sender<TickReport>>,
    dropped_reports: Arc<AtomicU64>,
    ticks: u64,
}

impl Ticker {
    async fn run(&mut self, interval: Duration, cancel: CancellationToken) {
        loop {
            if !self.tick(&cancel).await {
                break;
            }
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
        }
        debug!(counter = %self.name, ticks = self.ticks, "counter generator stopped");
    }

    /// Run one bounded tick. Returns false once cancelled.
    async fn tick(&mut self, cancel: &CancellationToken) -> bool {
        self.ticks += 1;
        let value = self.generator.next_value();

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(TickError::Cancelled),
            res = tokio::time::timeout(self.budget, self.repository.update(&self.counter, value)) => match res {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(e)) => Err(TickError::Store(e)),
                Err(_) => Err(TickError::Timeout {
                    duration_ms: u64::try_from(self.budget.as_millis()).unwrap_or(u64::MAX),
                }),
            },
        };

        let cancelled = matches!(outcome, Err(TickError::Cancelled));
        match &outcome {
            Ok(()) => {
                self.generator.commit(value);
                debug!(counter = %self.name, tick = self.ticks, value, "tick committed");
            }
            Err(TickError::Cancelled) => {}
            Err(e) => warn!(counter = %self.name, tick = self.ticks, value, error = %e, "tick skipped"),
        }

        if !cancelled {
            self.report(value, outcome);
        }
        !cancelled
    }

    fn report(&self, value: i64, outcome: Result<(), TickError>) {
        let Some(reports) = &self.reports else {
            return;
        };
        let report = TickReport {
            counter: self.name.clone(),
            tick: self.ticks,
            value,
            outcome,
            at: Utc::now(),
        };
        if let Err(mpsc::error::TrySendError::Full(_)) = reports.try_send(report) {
            self.dropped_reports.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Running generators. Dropping the handle without [`shutdown`](Self::shutdown)
/// aborts every task.
#[derive(Debug)]
pub struct SimulationHandle {
    cancel: CancellationToken,
    tasks: JoinSet<()>,
    running: Vec<String>,
    failures: Vec<StartFailure>,
    dropped_reports: Arc<AtomicU64>,
}

impl SimulationHandle {
    /// Counters that started (fixed counters included).
    #[must_use]
    pub fn running(&self) -> &[String] {
        &self.running
    }

    /// Counters that failed to resolve and never started.
    #[must_use]
    pub fn failures(&self) -> &[StartFailure] {
        &self.failures
    }

    /// Token that stops every generator when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Tick reports dropped because the receiver was full.
    #[must_use]
    pub fn dropped_reports(&self) -> u64 {
        self.dropped_reports.load(Ordering::Relaxed)
    }

    /// Cancel every generator and wait for all of them to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        while let Some(res) = self.tasks.join_next().await {
            if let Err(e) = res {
                if e.is_panic() {
                    warn!(error = %e, "counter generator panicked");
                }
            }
        }
        info!(counters = self.running.len(), "simulation stopped");
    }
}
