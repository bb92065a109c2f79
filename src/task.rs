//! Task files: a synthesis problem and its budgets in one JSON document.
//!
//! ```json
//! {
//!   "inputs": [[{"Bucket": "A", "Budgeted": 100, "Actual": 115}]],
//!   "output": [{"x": "Actual", "y": 115}],
//!   "config": {"operators": ["gather"]},
//!   "max_prog_size": 1,
//!   "time_limit": 10,
//!   "solution_limit": 1,
//!   "expect_solution": true
//! }
//! ```
//!
//! Everything except `inputs` and `output` is optional.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::config::{Budgets, Config, RawConfig};
use crate::synthesize::{synthesize, Synthesis};
use crate::table::Table;
use crate::Error;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTask {
    inputs: Vec<serde_json::Value>,
    output: serde_json::Value,
    config: Option<RawConfig>,
    max_prog_size: Option<usize>,
    /// Seconds.
    time_limit: Option<f64>,
    solution_limit: Option<usize>,
    expect_solution: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub inputs: Vec<Table>,
    pub output: Table,
    pub config: Config,
    pub budgets: Budgets,
    /// Whether a run is expected to accept at least one program, when the
    /// task file says so.
    pub expect_solution: Option<bool>,
}

impl Task {
    pub fn from_json(json: &serde_json::Value) -> Result<Self, Error> {
        let raw = RawTask::deserialize(json)?;
        let inputs = raw
            .inputs
            .iter()
            .map(Table::from_json)
            .collect::<Result<Vec<_>, _>>()?;
        if inputs.is_empty() {
            return Err(Error::NoInputs);
        }
        let output = Table::from_json(&raw.output)?;
        let config = match raw.config {
            Some(raw) => Config::try_from(raw)?,
            None => Config::default(),
        };

        let mut budgets = Budgets::default();
        if let Some(size) = raw.max_prog_size {
            budgets.max_prog_size = size;
        }
        if let Some(secs) = raw.time_limit {
            budgets.time_limit = seconds(secs)?;
        }
        if let Some(limit) = raw.solution_limit {
            budgets.solution_limit = limit;
        }
        budgets.validate()?;

        Ok(Self {
            inputs,
            output,
            config,
            budgets,
            expect_solution: raw.expect_solution,
        })
    }

    pub fn parse(text: &str) -> Result<Self, Error> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        Self::from_json(&json)
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|err| Error::IoError(path.to_owned(), err))?;
        Self::parse(&text)
    }

    pub fn run(&self) -> Result<Synthesis, Error> {
        synthesize(&self.inputs, &self.output, &self.config, &self.budgets)
    }
}

/// A time limit given in (possibly fractional) seconds.
pub fn seconds(secs: f64) -> Result<Duration, Error> {
    Duration::try_from_secs_f64(secs).map_err(|err| Error::InvalidBudget(format!("time limit {secs}: {err}")))
}
