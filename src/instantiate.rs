//! Hole instantiation guided by premise chains.

use std::ops::ControlFlow;
use std::time::Duration;

use instant::Instant;

use crate::align::align;
use crate::ast::{Arg, Node};
use crate::backward::PremiseChain;
use crate::config::Config;
use crate::synthesize::SynthesisReport;
use crate::table::Table;
use crate::value::DType;

/// A wall-clock budget shared by every part of one synthesis run.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    limit: Duration,
}

impl Deadline {
    pub fn new(limit: Duration) -> Self {
        Self {
            start: Instant::now(),
            limit,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn expired(&self) -> bool {
        self.elapsed() >= self.limit
    }
}

/// Fills the holes of one sketch, innermost operator first.
///
/// After all arguments of the operator at depth `d` are chosen, that operator
/// is applied to the (already concrete) table beneath it and the result must
/// include the chain's obligation at depth `d`. Branches that fail are dropped
/// before any operator above them is enumerated.
pub struct Instantiator<'a> {
    inputs: &'a [Table],
    config: &'a Config,
    deadline: &'a Deadline,
    report: &'a mut SynthesisReport,
}

impl<'a> Instantiator<'a> {
    pub fn new(
        inputs: &'a [Table],
        config: &'a Config,
        deadline: &'a Deadline,
        report: &'a mut SynthesisReport,
    ) -> Self {
        Self {
            inputs,
            config,
            deadline,
            report,
        }
    }

    /// Calls `on_program` with every concrete program (and its output) that
    /// satisfies `chain`. Stops when `on_program` breaks or the deadline
    /// expires.
    pub fn run(
        &mut self,
        sketch: &Node,
        chain: &PremiseChain<'_>,
        on_program: &mut impl FnMut(Node, Table) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        let depth = sketch.size();
        let Some(input) = self.inputs.get(sketch.input()) else {
            return ControlFlow::Continue(());
        };
        if !self.premise_holds(chain, depth, input) {
            return ControlFlow::Continue(());
        }
        if depth == 0 {
            return on_program(sketch.clone(), input.clone());
        }
        self.fill(sketch.clone(), depth - 1, 1, input, chain, on_program)
    }

    fn premise_holds(&mut self, chain: &PremiseChain<'_>, depth: usize, table: &Table) -> bool {
        let Some(obligation) = chain.at_depth(depth) else {
            return true;
        };
        if align(&obligation.target, table, false).is_some() {
            true
        } else {
            log::trace!("premise at depth {depth} fails");
            self.report.premise_prunings += 1;
            false
        }
    }

    fn schema_admits(&mut self, chain: &PremiseChain<'_>, depth: usize, schema: &[DType]) -> bool {
        let Some(obligation) = chain.at_depth(depth) else {
            return true;
        };
        if types_can_include(&obligation.target, schema) {
            true
        } else {
            log::trace!("output types {schema:?} cannot hold the premise at depth {depth}");
            self.report.premise_prunings += 1;
            false
        }
    }

    fn fill(
        &mut self,
        program: Node,
        depth: usize,
        arg_id: usize,
        input: &Table,
        chain: &PremiseChain<'_>,
        on_program: &mut impl FnMut(Node, Table) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        if self.deadline.expired() {
            self.report.timed_out = true;
            return ControlFlow::Break(());
        }
        let path = vec![0; depth];
        let Some(Node::Op(node)) = program.subtree(&path) else {
            return ControlFlow::Continue(());
        };

        if arg_id > node.opcode.arity() {
            if let Ok(schema) = node.static_schema(input.dtypes()) {
                if !self.schema_admits(chain, depth, &schema) {
                    return ControlFlow::Continue(());
                }
            }
            self.report.candidates += 1;
            let table = match node.apply(input) {
                Ok(table) => table,
                Err(err) => {
                    log::trace!("{err}");
                    *self.report.inapplicable.entry(node.opcode).or_default() += 1;
                    return ControlFlow::Continue(());
                }
            };
            if !self.premise_holds(chain, depth, &table) {
                return ControlFlow::Continue(());
            }
            if depth == 0 {
                return on_program(program, table);
            }
            return self.fill(program, depth - 1, 1, &table, chain, on_program);
        }

        // arguments fixed up front are kept
        if !matches!(node.arg(arg_id), Some(Arg::Hole)) {
            return self.fill(program, depth, arg_id + 1, input, chain, on_program);
        }
        let domain = match node.domain(arg_id, input, self.config) {
            Ok(domain) => domain,
            Err(err) => {
                log::trace!("no domain for argument {arg_id}: {err}");
                return ControlFlow::Continue(());
            }
        };
        let mut hole = path;
        hole.push(arg_id);
        for value in domain {
            let Some(next) = program.fill_hole(&hole, value) else {
                continue;
            };
            self.fill(next, depth, arg_id + 1, input, chain, on_program)?;
        }
        ControlFlow::Continue(())
    }
}

/// Whether a table with column types `schema` could include `target`.
/// Values of different types never compare equal, so each column of a
/// non-empty target needs its own output column of the same type.
fn types_can_include(target: &Table, schema: &[DType]) -> bool {
    if target.num_rows() == 0 {
        return true;
    }
    [DType::String, DType::Number, DType::Boolean].into_iter().all(|dtype| {
        let needed = target.dtypes().iter().filter(|&&t| t == dtype).count();
        needed <= schema.iter().filter(|&&t| t == dtype).count()
    })
}
