use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::ast::{AggrFunc, ArithOp, CmpOp, Opcode};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),
    #[error("Unknown comparison operator: {0}")]
    UnknownComparison(String),
    #[error("Unknown aggregation function: {0}")]
    UnknownAggregation(String),
    #[error("Unknown mutate operator: {0}")]
    UnknownMutateOp(String),
    #[error("Unsupported constant: {0}")]
    UnsupportedConstant(String),
}

/// What the search is allowed to use. Fixed for a whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Operators sketches may be built from, in enumeration order.
    pub operators: Vec<Opcode>,
    pub filter_op: Vec<CmpOp>,
    pub constants: Vec<Value>,
    pub aggr_func: Vec<AggrFunc>,
    pub mutate_op: Vec<ArithOp>,
    /// Largest number of columns a single `gather` melts.
    pub gather_max_val_list_size: usize,
    /// Largest number of id columns a single `gather_neg` keeps.
    pub gather_max_key_list_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            operators: Opcode::ALL.to_vec(),
            filter_op: vec![CmpOp::Gt, CmpOp::Lt, CmpOp::Eq],
            constants: vec![],
            aggr_func: vec![AggrFunc::Mean, AggrFunc::Sum, AggrFunc::Count],
            mutate_op: vec![ArithOp::Add, ArithOp::Sub],
            gather_max_val_list_size: 3,
            gather_max_key_list_size: 3,
        }
    }
}

impl Config {
    /// The default configuration restricted to the named operators.
    pub fn with_operators<S: AsRef<str>>(names: &[S]) -> Result<Self, ConfigError> {
        Ok(Self {
            operators: parse_all(names, ConfigError::UnknownOperator)?,
            ..Self::default()
        })
    }

    pub fn from_json(json: &serde_json::Value) -> Result<Self, crate::Error> {
        let raw = RawConfig::deserialize(json)?;
        Ok(Config::try_from(raw)?)
    }
}

fn parse_all<T: std::str::FromStr, S: AsRef<str>>(
    names: &[S],
    err: impl Fn(String) -> ConfigError,
) -> Result<Vec<T>, ConfigError> {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            name.parse().map_err(|_| err(name.to_owned()))
        })
        .collect()
}

/// The JSON shape of a configuration. Missing fields take their defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub operators: Option<Vec<String>>,
    pub filter_op: Option<Vec<String>>,
    pub constants: Option<Vec<serde_json::Value>>,
    pub aggr_func: Option<Vec<String>>,
    pub mutate_op: Option<Vec<String>>,
    pub gather_max_val_list_size: Option<usize>,
    pub gather_max_key_list_size: Option<usize>,
}

impl TryFrom<RawConfig> for Config {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let mut config = Config::default();
        if let Some(names) = raw.operators {
            config.operators = parse_all(names.as_slice(), ConfigError::UnknownOperator)?;
        }
        if let Some(names) = raw.filter_op {
            config.filter_op = parse_all(names.as_slice(), ConfigError::UnknownComparison)?;
        }
        if let Some(names) = raw.aggr_func {
            config.aggr_func = parse_all(names.as_slice(), ConfigError::UnknownAggregation)?;
        }
        if let Some(names) = raw.mutate_op {
            config.mutate_op = parse_all(names.as_slice(), ConfigError::UnknownMutateOp)?;
        }
        if let Some(constants) = raw.constants {
            config.constants = constants
                .into_iter()
                .map(|c| match c {
                    serde_json::Value::String(s) => Ok(Value::Str(s)),
                    serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
                    serde_json::Value::Number(n) => n
                        .as_f64()
                        .map(Value::from)
                        .ok_or_else(|| ConfigError::UnsupportedConstant(n.to_string())),
                    other => Err(ConfigError::UnsupportedConstant(other.to_string())),
                })
                .collect::<Result<_, _>>()?;
        }
        if let Some(size) = raw.gather_max_val_list_size {
            config.gather_max_val_list_size = size;
        }
        if let Some(size) = raw.gather_max_key_list_size {
            config.gather_max_key_list_size = size;
        }
        Ok(config)
    }
}

/// Limits on a single synthesis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budgets {
    /// Largest number of operator applications in a program.
    pub max_prog_size: usize,
    pub time_limit: Duration,
    /// Stop after this many accepted programs.
    pub solution_limit: usize,
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            max_prog_size: 3,
            time_limit: Duration::from_secs(60),
            solution_limit: 1,
        }
    }
}

impl Budgets {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.time_limit.is_zero() {
            return Err(crate::Error::InvalidBudget(
                "time limit must be positive".into(),
            ));
        }
        if self.solution_limit == 0 {
            return Err(crate::Error::InvalidBudget(
                "solution limit must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_names_are_rejected() {
        assert_eq!(
            Config::with_operators(&["gather", "pivot"]),
            Err(ConfigError::UnknownOperator("pivot".into()))
        );
        let config = Config::with_operators(&["spread", "gather"]).unwrap();
        assert_eq!(config.operators, vec![Opcode::Spread, Opcode::Gather]);
    }

    #[test]
    fn json_overrides_defaults() {
        let json = serde_json::json!({
            "operators": ["filter", "group_sum"],
            "filter_op": ["=="],
            "constants": ["Bucket_A", 100],
            "gather_max_val_list_size": 2,
        });
        let config = Config::from_json(&json).unwrap();
        assert_eq!(config.operators, vec![Opcode::Filter, Opcode::GroupSummary]);
        assert_eq!(config.filter_op, vec![CmpOp::Eq]);
        assert_eq!(config.constants, vec![Value::from("Bucket_A"), Value::from(100)]);
        assert_eq!(config.gather_max_val_list_size, 2);
        assert_eq!(config.gather_max_key_list_size, 3);
        assert_eq!(config.aggr_func, Config::default().aggr_func);

        let bad = serde_json::json!({"aggr_func": ["median"]});
        assert!(matches!(
            Config::from_json(&bad),
            Err(crate::Error::Config(ConfigError::UnknownAggregation(_)))
        ));
        let typo = serde_json::json!({"operator": ["gather"]});
        assert!(matches!(Config::from_json(&typo), Err(crate::Error::Json(_))));
    }

    #[test]
    fn budgets_are_validated() {
        assert!(Budgets::default().validate().is_ok());
        let zero_time = Budgets {
            time_limit: Duration::ZERO,
            ..Budgets::default()
        };
        assert!(zero_time.validate().is_err());
        let no_solutions = Budgets {
            solution_limit: 0,
            ..Budgets::default()
        };
        assert!(no_solutions.validate().is_err());
    }
}
