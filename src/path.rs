//! Hierarchical path parsing.
//!
//! Counter policies and query scenarios both address data with slash-separated
//! paths such as `/COUNTERS/Ethernet8/Queues[index=3]/SAI_QUEUE_STAT_PACKETS`.
//! Each element is a name with optional `[key=value]` predicates.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Element name that marks a queue-scoped counter path.
pub const QUEUES_ELEMENT: &str = "Queues";

static ELEMENT_RE: OnceLock<Regex> = OnceLock::new();
static KEY_RE: OnceLock<Regex> = OnceLock::new();

fn element_re() -> &'static Regex {
    ELEMENT_RE.get_or_init(|| {
        Regex::new(r"^([^\[\]=]+)((?:\[[^\[\]=]+=[^\[\]]*\])*)$").unwrap_or_else(|e| {
            unreachable!("static element pattern failed to compile: {e}")
        })
    })
}

fn key_re() -> &'static Regex {
    KEY_RE.get_or_init(|| {
        Regex::new(r"\[([^\[\]=]+)=([^\[\]]*)\]")
            .unwrap_or_else(|e| unreachable!("static key pattern failed to compile: {e}"))
    })
}

/// One named element of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathElement {
    /// Element name.
    pub name: String,
    /// Predicates such as `[index=3]`, by key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub keys: BTreeMap<String, String>,
}

impl PathElement {
    /// An element without predicates.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: BTreeMap::new(),
        }
    }

    /// Value of the first of `names` present in the element's predicates.
    #[must_use]
    pub fn key(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|n| self.keys.get(*n).map(String::as_str))
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (k, v) in &self.keys {
            write!(f, "[{k}={v}]")?;
        }
        Ok(())
    }
}

fn malformed(path: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::MalformedPath {
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// Split on `/` outside of `[...]` predicates.
fn split_segments(path: &str) -> Result<Vec<&str>, ConfigError> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (idx, ch) in path.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| malformed(path, "unbalanced ']'"))?;
            }
            '/' if depth == 0 => {
                segments.push(&path[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(malformed(path, "unbalanced '['"));
    }
    segments.push(&path[start..]);
    Ok(segments)
}

/// Parse a slash-separated path into its elements.
///
/// A leading `/` is optional, empty segments are ignored, and the root path
/// parses to no elements.
pub fn parse_path(path: &str) -> Result<Vec<PathElement>, ConfigError> {
    let trimmed = path.trim();
    let mut elems = Vec::new();

    for segment in split_segments(trimmed)? {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        let caps = element_re()
            .captures(segment)
            .ok_or_else(|| malformed(path, format!("invalid element '{segment}'")))?;

        let name = caps.get(1).map_or("", |m| m.as_str()).trim();
        if name.is_empty() {
            return Err(malformed(path, format!("element '{segment}' has no name")));
        }

        let mut elem = PathElement::new(name);
        if let Some(preds) = caps.get(2) {
            for kv in key_re().captures_iter(preds.as_str()) {
                let key = kv.get(1).map_or("", |m| m.as_str()).trim().to_string();
                let value = kv.get(2).map_or("", |m| m.as_str()).trim().to_string();
                if elem.keys.insert(key.clone(), value).is_some() {
                    return Err(malformed(path, format!("duplicate key '{key}' in '{segment}'")));
                }
            }
        }
        elems.push(elem);
    }

    Ok(elems)
}

/// Render elements back into a `/`-prefixed path.
#[must_use]
pub fn format_path(elems: &[PathElement]) -> String {
    let mut out = String::new();
    for elem in elems {
        out.push('/');
        out.push_str(&elem.to_string());
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Entity a counter path addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum CounterScope {
    /// Port-level statistic.
    Port,
    /// Queue-level statistic; `index` is the queue the path names, if any.
    Queue {
        /// Queue index from the path, if any.
        index: Option<u32>,
    },
}

/// Parsed counter identifier: interface, optional queue, statistic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterPath {
    raw: String,
    entity: String,
    scope: CounterScope,
    statistic: String,
}

impl CounterPath {
    /// Parse `/<root>/<interface>[/Queues[index=N] | /Queues/N]/.../<statistic>`.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let elems = parse_path(raw)?;
        if elems.len() < 3 {
            return Err(malformed(
                raw,
                "expected at least a root, an entity and a statistic",
            ));
        }

        let entity = elems[1].name.clone();
        let last = elems.len() - 1;
        let statistic = elems[last].name.clone();

        let mut scope = CounterScope::Port;
        for (pos, elem) in elems.iter().enumerate().take(last).skip(2) {
            if elem.name != QUEUES_ELEMENT {
                continue;
            }

            let explicit = elem
                .key(&["index", "queue"])
                .or_else(|| elems[1].key(&["queue"]));
            let from_next = (pos + 1 < last)
                .then(|| elems[pos + 1].name.as_str())
                .filter(|n| n.chars().all(|c| c.is_ascii_digit()));

            let index = match explicit.or(from_next) {
                Some(text) => Some(
                    text.parse::<u32>()
                        .map_err(|_| malformed(raw, format!("invalid queue index '{text}'")))?,
                ),
                None => None,
            };
            scope = CounterScope::Queue { index };
            break;
        }

        Ok(Self {
            raw: raw.trim().to_string(),
            entity,
            scope,
            statistic,
        })
    }

    /// The path as written in the policy.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Interface (or other entity) name, e.g. `Ethernet8`.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Port or queue scope of the counter.
    #[must_use]
    pub const fn scope(&self) -> CounterScope {
        self.scope
    }

    /// Statistic (record field) name, e.g. `SAI_PORT_STAT_PFC_7_RX_PKTS`.
    #[must_use]
    pub fn statistic(&self) -> &str {
        &self.statistic
    }
}

impl fmt::Display for CounterPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
