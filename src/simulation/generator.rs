//! Per-counter value generators.

use rand::rngs::OsRng;
use rand::Rng;

use crate::policy::{CounterKind, CounterPolicy};

/// Exclusive upper bound of random counter values.
pub const RANDOM_UPPER_BOUND: i64 = 1000;

/// Value state of one counter.
///
/// `next_value` proposes the value for the coming tick without changing
/// state; `commit` applies it once the write has landed, so a skipped tick
/// never advances an incrementing counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueGenerator {
    /// Always `value`.
    Fixed {
        /// The configured value.
        value: i64,
    },
    /// Last committed value plus `step`.
    Incrementing {
        /// Last committed value.
        current: i64,
        /// Increment per tick.
        step: i64,
    },
    /// Uniform in `0..RANDOM_UPPER_BOUND`.
    Random,
}

impl ValueGenerator {
    /// Initial state for `policy`.
    #[must_use]
    pub const fn from_policy(policy: &CounterPolicy) -> Self {
        match policy.kind {
            CounterKind::Fixed => Self::Fixed {
                value: policy.initial_value,
            },
            CounterKind::Incrementing => Self::Incrementing {
                current: policy.initial_value,
                step: policy.step,
            },
            CounterKind::Random => Self::Random,
        }
    }

    /// Fixed counters are written once and never scheduled.
    #[must_use]
    pub const fn is_scheduled(&self) -> bool {
        !matches!(self, Self::Fixed { .. })
    }

    /// Value for the coming tick.
    #[must_use]
    pub fn next_value(&self) -> i64 {
        match self {
            Self::Fixed { value } => *value,
            Self::Incrementing { current, step } => current.saturating_add(*step),
            Self::Random => {
                let mut rng = OsRng;
                rng.gen_range(0..RANDOM_UPPER_BOUND)
            }
        }
    }

    /// Record that `written` reached the store.
    pub fn commit(&mut self, written: i64) {
        if let Self::Incrementing { current, .. } = self {
            *current = written;
        }
    }
}
