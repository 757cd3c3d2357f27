//! Target-control strategies.
//!
//! A strategy is a pure state machine: it takes the previous
//! [`AlgorithmState`], the active [`AlgorithmConfig`] and one reading, and
//! returns the next state plus an optional [`BpmTarget`]. Strategies hold no
//! subscriptions and do no I/O.

mod linear;

pub use linear::LinearStrategy;

use crate::{AlgorithmConfig, AlgorithmState, BpmTarget, Error, HeartRateReading, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a strategy implementation
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Linear,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Linear => "linear",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "linear" => Ok(StrategyKind::Linear),
            other => Err(Error::UnknownStrategy(other.to_string())),
        }
    }
}

/// Result of feeding one reading through a strategy
#[derive(Clone, Debug)]
pub struct Computation {
    pub next_state: AlgorithmState,
    pub target: Option<BpmTarget>,
}

/// A target-control algorithm
pub trait Strategy {
    fn kind(&self) -> StrategyKind;

    /// State for a fresh session, with the mode entered at `now_ms`
    fn initial_state(&self, config: &AlgorithmConfig, now_ms: i64) -> AlgorithmState;

    /// Pure transition: never mutates `state`
    fn compute(
        &self,
        reading: &HeartRateReading,
        state: &AlgorithmState,
        config: &AlgorithmConfig,
    ) -> Computation;
}

/// Instantiate the strategy registered under `kind`
pub fn strategy_for(kind: StrategyKind) -> Box<dyn Strategy> {
    match kind {
        StrategyKind::Linear => Box::new(LinearStrategy),
    }
}

/// Instantiate a strategy from its textual identifier
pub fn strategy_named(name: &str) -> Result<Box<dyn Strategy>> {
    Ok(strategy_for(name.parse()?))
}
