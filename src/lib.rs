//! # tablesynth
//!
//! Synthesizes short table-transformation programs by example. Given input
//! tables and a (possibly partial) target table, [`synthesize`] searches for
//! programs in a small DSL of reshaping and summarizing operators whose
//! output includes every row of the target under some renaming of columns.
//!
//! Search proceeds by program size. For each size, operator sequences are
//! enumerated as sketches whose arguments are holes; sketches that cannot
//! produce the target are filtered out structurally. For the rest, the
//! target is pushed backward through the sketch into premises, one per
//! depth, and holes are then filled from the innermost operator outward,
//! checking each partial program against its premise before going further.
//! Every program the search produces is evaluated again and aligned against
//! the original target before it is accepted.
//!
//! ```
//! use tablesynth::{synthesize, table, Budgets, Config};
//!
//! let input = table!(
//!     ["Bucket", "Budgeted", "Actual"],
//!     ["Bucket_A", 115, 120],
//!     ["Bucket_D", 100, 90],
//! )
//! .unwrap();
//! let target = table!(["x", "y"], ["Actual", 90]).unwrap();
//! let config = Config::with_operators(&["gather"]).unwrap();
//! let budgets = Budgets { max_prog_size: 1, ..Budgets::default() };
//!
//! let result = synthesize(&[input], &target, &config, &budgets).unwrap();
//! assert_eq!(result.solutions[0].program.to_string(), "t0 <- gather(input0, [2])");
//! ```
pub mod align;
pub mod ast;
pub mod backward;
pub mod cli;
pub mod config;
pub mod instantiate;
pub mod sketch;
pub mod synthesize;
pub mod table;
pub mod task;
pub mod util;
pub mod value;

use std::path::PathBuf;

use thiserror::Error;

pub use align::{align, table_equivalence, table_inclusion};
pub use ast::{AggrFunc, Arg, ArithOp, CmpOp, EvalError, Node, OpNode, Opcode};
pub use backward::{Obligation, PremiseChain, PremiseGraph};
pub use config::{Budgets, Config, ConfigError};
pub use instantiate::Deadline;
pub use sketch::{is_admissible, SketchContext, SketchGenerator};
pub use synthesize::{synthesize, Solution, Synthesis, SynthesisReport};
pub use table::{Table, TableError};
pub use task::Task;
pub use util::NameGen;
pub use value::{DType, Value};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("Synthesis needs at least one input table")]
    NoInputs,
    #[error("Invalid budget: {0}")]
    InvalidBudget(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("IO error: {}: {1}", .0.display())]
    IoError(PathBuf, std::io::Error),
}
