//! The synthesis driver.

use std::fmt::{self, Display, Formatter};
use std::ops::ControlFlow;
use std::time::Duration;

use crate::align::align;
use crate::ast::{Node, Opcode};
use crate::backward::PremiseGraph;
use crate::config::{Budgets, Config};
use crate::instantiate::{Deadline, Instantiator};
use crate::sketch::{SketchContext, SketchGenerator};
use crate::table::Table;
use crate::util::{HashSet, IndexMap};
use crate::Error;

/// An accepted program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub program: Node,
    /// The program's output on the synthesis inputs.
    pub output: Table,
    /// Column `i` of the target corresponds to column `alignment[i]` of
    /// `output`.
    pub alignment: Vec<usize>,
}

impl Solution {
    /// Runs the program on other inputs with the same schemas.
    pub fn eval(&self, inputs: &[Table]) -> Result<Table, crate::ast::EvalError> {
        self.program.eval(inputs)
    }
}

/// Counters collected during one synthesis run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthesisReport {
    pub sketches_generated: usize,
    pub sketches_admitted: usize,
    pub premise_chains: usize,
    /// Operator applications tried by the instantiator.
    pub candidates: usize,
    pub inapplicable: IndexMap<Opcode, usize>,
    pub premise_prunings: usize,
    pub final_checks: usize,
    pub accepted: usize,
    pub time_per_size: IndexMap<usize, Duration>,
    pub elapsed: Duration,
    pub timed_out: bool,
}

impl SynthesisReport {
    pub fn union(&self, other: &Self) -> Self {
        let mut inapplicable = self.inapplicable.clone();
        for (op, n) in &other.inapplicable {
            *inapplicable.entry(*op).or_default() += n;
        }
        let mut time_per_size = self.time_per_size.clone();
        for (size, time) in &other.time_per_size {
            *time_per_size.entry(*size).or_default() += *time;
        }
        Self {
            sketches_generated: self.sketches_generated + other.sketches_generated,
            sketches_admitted: self.sketches_admitted + other.sketches_admitted,
            premise_chains: self.premise_chains + other.premise_chains,
            candidates: self.candidates + other.candidates,
            inapplicable,
            premise_prunings: self.premise_prunings + other.premise_prunings,
            final_checks: self.final_checks + other.final_checks,
            accepted: self.accepted + other.accepted,
            time_per_size,
            elapsed: self.elapsed + other.elapsed,
            timed_out: self.timed_out || other.timed_out,
        }
    }
}

impl Display for SynthesisReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Sketches: {} generated, {} admitted, {} premise chains",
            self.sketches_generated, self.sketches_admitted, self.premise_chains
        )?;
        writeln!(
            f,
            "Candidates: {} evaluated, {} pruned by premises, {} final checks, {} accepted",
            self.candidates, self.premise_prunings, self.final_checks, self.accepted
        )?;
        for (op, n) in &self.inapplicable {
            writeln!(f, "Operator {op}: inapplicable {n} times")?;
        }
        for (size, time) in &self.time_per_size {
            writeln!(f, "Size {size}: {:.3}s", time.as_secs_f64())?;
        }
        write!(f, "Total: {:.3}s", self.elapsed.as_secs_f64())?;
        if self.timed_out {
            write!(f, " (time limit reached)")?;
        }
        writeln!(f)
    }
}

#[derive(Debug, Clone)]
pub struct Synthesis {
    /// Accepted programs, in the order they were found.
    pub solutions: Vec<Solution>,
    pub report: SynthesisReport,
}

/// Searches for programs over `inputs` whose output includes `output`.
///
/// Program sizes are tried in increasing order, up to
/// `budgets.max_prog_size`. Running out of time is not an error: whatever was
/// accepted by then is returned.
pub fn synthesize(inputs: &[Table], output: &Table, config: &Config, budgets: &Budgets) -> Result<Synthesis, Error> {
    if inputs.is_empty() {
        return Err(Error::NoInputs);
    }
    budgets.validate()?;

    let deadline = Deadline::new(budgets.time_limit);
    let ctx = SketchContext::new(inputs, output);
    log::debug!("sketch context: {ctx:?}");
    let mut generator = SketchGenerator::new(&config.operators, inputs.len());
    let mut report = SynthesisReport::default();
    let mut solutions: Vec<Solution> = vec![];
    let mut seen: HashSet<Node> = HashSet::default();

    let mut final_checks = 0;
    for size in 0..=budgets.max_prog_size {
        let size_start = deadline.elapsed();
        report.sketches_generated += generator.level(size).len();
        let sketches = generator.admissible(size, ctx);
        report.sketches_admitted += sketches.len();
        log::info!("size {size}: {} admissible sketches", sketches.len());

        let mut stop = false;
        'sketches: for sketch in &sketches {
            let graph = PremiseGraph::build(sketch, output);
            let chains = graph.chains();
            report.premise_chains += chains.len();
            log::debug!("sketch {sketch}: {} premise chains", chains.len());

            for chain in &chains {
                if deadline.expired() {
                    report.timed_out = true;
                    stop = true;
                    break 'sketches;
                }
                let mut accept = |program: Node, _: Table| {
                    if !seen.insert(program.clone()) {
                        return ControlFlow::Continue(());
                    }
                    if let Some(solution) = final_check(inputs, output, program, &mut final_checks) {
                        log::debug!("accepted {}", solution.program);
                        solutions.push(solution);
                    }
                    if solutions.len() >= budgets.solution_limit {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                };
                let mut instantiator = Instantiator::new(inputs, config, &deadline, &mut report);
                if instantiator.run(sketch, chain, &mut accept).is_break() {
                    stop = true;
                    break 'sketches;
                }
            }
        }
        *report.time_per_size.entry(size).or_default() += deadline.elapsed() - size_start;
        if stop {
            break;
        }
    }

    if report.timed_out {
        log::warn!(
            "time limit of {:?} reached with {} programs accepted",
            budgets.time_limit,
            solutions.len()
        );
    }
    report.final_checks = final_checks;
    report.accepted = solutions.len();
    report.elapsed = deadline.elapsed();
    Ok(Synthesis { solutions, report })
}

/// Evaluates the whole program again and aligns its output with the
/// original target. Premises only prune, so this is what decides acceptance.
fn final_check(inputs: &[Table], output: &Table, program: Node, checks: &mut usize) -> Option<Solution> {
    *checks += 1;
    let table = match program.eval(inputs) {
        Ok(table) => table,
        Err(err) => {
            log::trace!("final evaluation failed: {err}");
            return None;
        }
    };
    let alignment = align(output, &table, false)?;
    Some(Solution {
        program,
        output: table,
        alignment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AggrFunc, Arg};
    use crate::table;

    fn budget() -> Table {
        table!(
            ["Bucket", "Budgeted", "Actual"],
            ["Bucket_A", 115, 120],
            ["Bucket_B", 100, 130],
            ["Bucket_C", 125, 75],
            ["Bucket_D", 100, 90],
            ["Bucket_E", 85, 115],
        )
        .unwrap()
    }

    #[test]
    fn identity_is_found_at_size_zero() {
        let target = table!(["b"], [100], [85]).unwrap();
        let result = synthesize(&[budget()], &target, &Config::default(), &Budgets::default()).unwrap();
        assert_eq!(result.solutions.len(), 1);
        assert_eq!(result.solutions[0].program, Node::table(0));
        assert_eq!(result.solutions[0].alignment, vec![1]);
        assert_eq!(result.report.accepted, 1);
    }

    #[test]
    fn sums_need_a_value_creating_operator() {
        let target = table!(["total"], [525]).unwrap();
        let config = Config::with_operators(&["cumsum", "gather"]).unwrap();
        let budgets = Budgets {
            max_prog_size: 1,
            ..Budgets::default()
        };
        let result = synthesize(&[budget()], &target, &config, &budgets).unwrap();
        let expected = Node::op(Opcode::CumSum, Node::table(0), [Arg::Col(1)]);
        assert_eq!(
            result.solutions.iter().map(|s| &s.program).collect::<Vec<_>>(),
            vec![&expected]
        );
        assert_eq!(result.solutions[0].alignment, vec![3]);
    }

    #[test]
    fn counts_may_coincide_with_input_cells() {
        let input = table!(["g", "v"], ["a", 1], ["a", 5], ["b", 2]).unwrap();
        let target = table!(["g", "n"], ["a", 2], ["b", 1]).unwrap();
        let config = Config::with_operators(&["group_sum"]).unwrap();
        let budgets = Budgets {
            max_prog_size: 1,
            ..Budgets::default()
        };
        let result = synthesize(&[input], &target, &config, &budgets).unwrap();
        let expected = Node::op(
            Opcode::GroupSummary,
            Node::table(0),
            [Arg::Cols(vec![0]), Arg::CountRows, Arg::Aggr(AggrFunc::Count)],
        );
        assert_eq!(result.solutions.len(), 1);
        assert_eq!(result.solutions[0].program, expected);
    }

    #[test]
    fn solution_limit_caps_the_result() {
        let target = table!(["x", "y"], ["Actual", 90]).unwrap();
        let config = Config::with_operators(&["gather"]).unwrap();
        let budgets = Budgets {
            max_prog_size: 1,
            solution_limit: 2,
            ..Budgets::default()
        };
        let result = synthesize(&[budget()], &target, &config, &budgets).unwrap();
        let programs: Vec<String> = result.solutions.iter().map(|s| s.program.to_string()).collect();
        assert_eq!(
            programs,
            vec!["t0 <- gather(input0, [2])", "t0 <- gather(input0, [1, 2])"]
        );

        let budgets = Budgets {
            solution_limit: 1,
            ..budgets
        };
        let result = synthesize(&[budget()], &target, &config, &budgets).unwrap();
        assert_eq!(result.solutions.len(), 1);
    }

    #[test]
    fn bad_requests_are_errors() {
        let target = budget();
        assert!(matches!(
            synthesize(&[], &target, &Config::default(), &Budgets::default()),
            Err(Error::NoInputs)
        ));
        let budgets = Budgets {
            solution_limit: 0,
            ..Budgets::default()
        };
        assert!(matches!(
            synthesize(&[budget()], &target, &Config::default(), &budgets),
            Err(Error::InvalidBudget(_))
        ));
    }

    #[test]
    fn report_summarizes_the_run() {
        let mut a = SynthesisReport {
            candidates: 3,
            ..SynthesisReport::default()
        };
        a.inapplicable.insert(Opcode::Spread, 2);
        let mut b = SynthesisReport {
            candidates: 4,
            timed_out: true,
            ..SynthesisReport::default()
        };
        b.inapplicable.insert(Opcode::Spread, 1);
        let both = a.union(&b);
        assert_eq!(both.candidates, 7);
        assert_eq!(both.inapplicable[&Opcode::Spread], 3);
        let text = both.to_string();
        assert!(text.contains("Operator spread: inapplicable 3 times"));
        assert!(text.contains("(time limit reached)"));
    }
}
