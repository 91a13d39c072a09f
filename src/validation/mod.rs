//! Validation engine.
//!
//! Runs query scenarios against a [`TelemetryClient`] and reconciles the
//! observed status and value with the expectation. A failing scenario never
//! stops the ones after it.

mod compare;
mod scenario;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::path::format_path;
use crate::telemetry::{build_get_request, Encoding, TelemetryClient};

pub use compare::{decode_response, values_match, ObservedValue};
pub use scenario::{
    default_battery, load_scenarios, scenarios_from_toml, ExpectedValue, QueryScenario, ResultCode,
    BATTERY_INTERFACES,
};

/// How a scenario ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    /// Status and value matched.
    Pass,
    /// Observed status differs from the expected one.
    CodeMismatch,
    /// Status matched, value did not.
    ValueMismatch,
    /// Status matched but the response could not be decoded.
    Protocol(String),
}

/// Outcome of one scenario with both sides kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    /// Scenario description.
    pub description: String,
    /// Status the scenario expects.
    pub expected_code: ResultCode,
    /// Status the service returned.
    pub observed_code: ResultCode,
    /// Value the scenario expects.
    pub expected: ExpectedValue,
    /// Value the service returned.
    pub observed: ObservedValue,
    /// Pass or the kind of failure.
    pub outcome: Outcome,
    /// Status message returned by the service, if any.
    pub message: String,
}

impl QueryResult {
    /// True when the scenario passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Pass
    }
}

/// Run one scenario.
///
/// The request prefers structured (`JSON_IETF`) encoding. The value is only
/// compared when the expected status is observed and a value is expected.
pub async fn run_scenario(client: &dyn TelemetryClient, scenario: &QueryScenario) -> QueryResult {
    let request = build_get_request(&scenario.target, &scenario.path, Encoding::JsonIetf);

    let (observed_code, observed, outcome, message) = match client.get(request).await {
        Err(status) => {
            let code = ResultCode::from(status.code());
            let outcome = if code == scenario.expected_code {
                Outcome::Pass
            } else {
                Outcome::CodeMismatch
            };
            (code, ObservedValue::Absent, outcome, status.message().to_string())
        }
        Ok(response) => {
            let decoded = decode_response(&response);
            let outcome = if scenario.expected_code != ResultCode::Ok {
                Outcome::CodeMismatch
            } else if scenario.expected == ExpectedValue::Absent {
                Outcome::Pass
            } else {
                match &decoded {
                    Err(e) => Outcome::Protocol(e.to_string()),
                    Ok(observed) if values_match(&scenario.expected, observed) => Outcome::Pass,
                    Ok(_) => Outcome::ValueMismatch,
                }
            };
            let observed = decoded.unwrap_or(ObservedValue::Absent);
            (ResultCode::Ok, observed, outcome, String::new())
        }
    };

    let result = QueryResult {
        description: scenario.description.clone(),
        expected_code: scenario.expected_code,
        observed_code,
        expected: scenario.expected.clone(),
        observed,
        outcome,
        message,
    };

    if result.passed() {
        info!(scenario = %result.description, code = %result.observed_code, "scenario passed");
    } else {
        warn!(
            scenario = %result.description,
            target = %scenario.target,
            path = %format_path(&scenario.path),
            outcome = ?result.outcome,
            expected_code = %result.expected_code,
            observed_code = %result.observed_code,
            expected = ?result.expected,
            observed = ?result.observed,
            message = %result.message,
            "scenario failed"
        );
    }
    result
}

/// Results of one pass over a scenario list.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    /// Unique id of this pass.
    pub run_id: Uuid,
    /// When the first scenario was sent.
    pub started_at: DateTime<Utc>,
    /// When the last scenario finished.
    pub finished_at: DateTime<Utc>,
    /// One result per scenario, in order.
    pub results: Vec<QueryResult>,
}

impl SuiteReport {
    /// Number of passing scenarios.
    #[must_use]
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }

    /// Number of failing scenarios.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    /// True when no scenario failed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }
}

/// Run every scenario in order, regardless of earlier failures.
pub async fn run_suite(client: &dyn TelemetryClient, scenarios: &[QueryScenario]) -> SuiteReport {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();

    let mut results = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        results.push(run_scenario(client, scenario).await);
    }

    let report = SuiteReport {
        run_id,
        started_at,
        finished_at: Utc::now(),
        results,
    };
    info!(
        run_id = %report.run_id,
        passed = report.passed(),
        failed = report.failed(),
        "validation suite finished"
    );
    report
}
