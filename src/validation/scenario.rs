//! Query scenarios and their expectations.
//!
//! Scenarios are declared in TOML:
//!
//! ```toml
//! [[scenario]]
//! description = "get COUNTERS:Ethernet68 SAI_PORT_STAT_PFC_7_RX_PKTS"
//! target = "COUNTERS_DB"
//! path = "/COUNTERS/Ethernet68/SAI_PORT_STAT_PFC_7_RX_PKTS"
//! expect_code = "OK"
//! expect_scalar = "6"
//! ```
//!
//! `expect_json` carries an inline structured payload and `expect_file` names
//! a JSON file relative to the scenario file. At most one expectation may be
//! given; none means the value is not compared.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tonic::Code;

use crate::error::ConfigError;
use crate::path::{parse_path, PathElement};
use crate::repository::{COUNTERS_TABLE, PORT_NAME_MAP};

/// Status code taxonomy the harness distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResultCode {
    /// The query succeeded.
    Ok,
    /// Unknown target or path.
    NotFound,
    /// The service refuses the request, e.g. for an empty target.
    Unimplemented,
    /// Any other gRPC status code.
    Other(i32),
}

impl From<Code> for ResultCode {
    fn from(code: Code) -> Self {
        match code {
            Code::Ok => Self::Ok,
            Code::NotFound => Self::NotFound,
            Code::Unimplemented => Self::Unimplemented,
            other => Self::Other(other as i32),
        }
    }
}

impl FromStr for ResultCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = match s.trim().to_ascii_lowercase().replace(['_', ' '], "").as_str() {
            "ok" => Code::Ok,
            "cancelled" => Code::Cancelled,
            "unknown" => Code::Unknown,
            "invalidargument" => Code::InvalidArgument,
            "deadlineexceeded" => Code::DeadlineExceeded,
            "notfound" => Code::NotFound,
            "alreadyexists" => Code::AlreadyExists,
            "permissiondenied" => Code::PermissionDenied,
            "resourceexhausted" => Code::ResourceExhausted,
            "failedprecondition" => Code::FailedPrecondition,
            "aborted" => Code::Aborted,
            "outofrange" => Code::OutOfRange,
            "unimplemented" => Code::Unimplemented,
            "internal" => Code::Internal,
            "unavailable" => Code::Unavailable,
            "dataloss" => Code::DataLoss,
            "unauthenticated" => Code::Unauthenticated,
            _ => return Err(format!("unknown result code '{s}'")),
        };
        Ok(code.into())
    }
}

impl TryFrom<String> for ResultCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResultCode> for String {
    fn from(code: ResultCode) -> Self {
        code.to_string()
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::NotFound => write!(f, "NotFound"),
            Self::Unimplemented => write!(f, "Unimplemented"),
            Self::Other(code) => write!(f, "{:?}", Code::from_i32(*code)),
        }
    }
}

/// Value a scenario expects on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExpectedValue {
    /// No value comparison.
    Absent,
    /// A single leaf, compared textually.
    Scalar(String),
    /// A nested field tree, compared as unordered field sets.
    Structured(JsonValue),
}

/// One declarative query test case.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryScenario {
    /// Human-readable description.
    pub description: String,
    /// Target namespace (prefix target).
    pub target: String,
    /// Queried path.
    pub path: Vec<PathElement>,
    /// Expected status.
    pub expected_code: ResultCode,
    /// Expected value.
    pub expected: ExpectedValue,
}

impl QueryScenario {
    /// Build a scenario from a path string.
    pub fn new(
        description: impl Into<String>,
        target: impl Into<String>,
        path: &str,
        expected_code: ResultCode,
        expected: ExpectedValue,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            description: description.into(),
            target: target.into(),
            path: parse_path(path)?,
            expected_code,
            expected,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawScenario {
    description: String,
    #[serde(default)]
    target: String,
    path: String,
    expect_code: ResultCode,
    expect_scalar: Option<String>,
    expect_json: Option<String>,
    expect_file: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawScenarioFile {
    #[serde(default)]
    scenario: Vec<RawScenario>,
}

fn read_json(path: &Path) -> Result<JsonValue, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| ConfigError::decode(path, e))
}

impl RawScenario {
    fn into_scenario(self, name: &str, base_dir: &Path) -> Result<QueryScenario, ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid {
            reason: format!("{name}: scenario '{}': {reason}", self.description),
        };

        let given = [&self.expect_scalar, &self.expect_json, &self.expect_file]
            .iter()
            .filter(|e| e.is_some())
            .count();
        if given > 1 {
            return Err(invalid("give at most one of expect_scalar, expect_json, expect_file".to_string()));
        }
        if given == 1 && self.expect_code != ResultCode::Ok {
            return Err(invalid(format!("a value is only compared for OK, not {}", self.expect_code)));
        }

        let expected = if let Some(scalar) = &self.expect_scalar {
            ExpectedValue::Scalar(scalar.clone())
        } else if let Some(json) = &self.expect_json {
            ExpectedValue::Structured(serde_json::from_str(json).map_err(|e| invalid(format!("expect_json: {e}")))?)
        } else if let Some(file) = &self.expect_file {
            ExpectedValue::Structured(read_json(&base_dir.join(file))?)
        } else {
            ExpectedValue::Absent
        };

        QueryScenario::new(self.description.clone(), self.target.clone(), &self.path, self.expect_code, expected)
    }
}

/// Decode scenarios from TOML; `expect_file` paths resolve against `base_dir`.
pub fn scenarios_from_toml(name: &str, text: &str, base_dir: &Path) -> Result<Vec<QueryScenario>, ConfigError> {
    let raw: RawScenarioFile = toml::from_str(text).map_err(|e| ConfigError::decode(name, e))?;
    raw.scenario
        .into_iter()
        .map(|s| s.into_scenario(name, base_dir))
        .collect()
}

/// Load a scenario file.
pub fn load_scenarios(path: impl AsRef<Path>) -> Result<Vec<QueryScenario>, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    scenarios_from_toml(&path.display().to_string(), &text, base_dir)
}

/// Interfaces whose full counter rows the built-in battery checks.
pub const BATTERY_INTERFACES: [&str; 3] = ["Ethernet0", "Ethernet8", "Ethernet68"];

/// The built-in battery: error paths of the service, the port name map, the
/// seeded interface rows, and one leaf. Expected payloads are the seed files
/// in `data_dir`.
pub fn default_battery(target: &str, data_dir: &Path) -> Result<Vec<QueryScenario>, ConfigError> {
    let mut battery = vec![
        QueryScenario::new(
            "non-existing path target",
            "MY_DB",
            "/MyCounters",
            ResultCode::NotFound,
            ExpectedValue::Absent,
        )?,
        QueryScenario::new(
            "empty path target",
            "",
            "/MyCounters",
            ResultCode::Unimplemented,
            ExpectedValue::Absent,
        )?,
        QueryScenario::new(
            "valid but non-existing node",
            target,
            "/MyCounters",
            ResultCode::NotFound,
            ExpectedValue::Absent,
        )?,
        QueryScenario::new(
            format!("get {PORT_NAME_MAP}"),
            target,
            &format!("/{PORT_NAME_MAP}"),
            ResultCode::Ok,
            ExpectedValue::Structured(read_json(&data_dir.join(format!("{PORT_NAME_MAP}.json")))?),
        )?,
    ];

    for interface in BATTERY_INTERFACES {
        let file = data_dir.join(format!("{COUNTERS_TABLE}:{interface}.json"));
        battery.push(QueryScenario::new(
            format!("get {COUNTERS_TABLE}:{interface}"),
            target,
            &format!("/{COUNTERS_TABLE}/{interface}"),
            ResultCode::Ok,
            ExpectedValue::Structured(read_json(&file)?),
        )?);
    }

    battery.push(QueryScenario::new(
        format!("get {COUNTERS_TABLE}:Ethernet68 SAI_PORT_STAT_PFC_7_RX_PKTS"),
        target,
        &format!("/{COUNTERS_TABLE}/Ethernet68/SAI_PORT_STAT_PFC_7_RX_PKTS"),
        ResultCode::Ok,
        ExpectedValue::Scalar("6".to_string()),
    )?);

    Ok(battery)
}
