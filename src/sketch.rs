//! Sketch enumeration and the structural admissibility filter.

use crate::ast::{Node, Opcode, SEPARATORS};
use crate::table::Table;
use crate::util::HashSet;
use crate::value::Value;

/// Facts about a synthesis problem that decide which operator sequences are
/// worth searching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SketchContext {
    /// The target holds a value that occurs nowhere in the inputs, neither as
    /// a cell nor as a column name.
    pub new_values: bool,
    /// Some input column name or cell contains a separator character.
    pub has_separator: bool,
}

impl SketchContext {
    pub fn new(inputs: &[Table], output: &Table) -> Self {
        let mut known: HashSet<Value> = HashSet::default();
        let mut has_separator = false;
        for input in inputs {
            for name in input.columns() {
                has_separator |= name.contains(SEPARATORS);
                known.insert(Value::Str(name.clone()));
            }
            for cell in input.cells() {
                if let Value::Str(s) = cell {
                    has_separator |= s.contains(SEPARATORS);
                }
                known.insert(cell.key());
            }
        }
        let new_values = output.cells().any(|cell| !known.contains(&cell.key()));
        Self {
            new_values,
            has_separator,
        }
    }
}

/// Whether a sketch with these operators (outermost first) may enter the
/// search.
pub fn is_admissible(ops: &[Opcode], ctx: SketchContext) -> bool {
    let reject = |why: &str| {
        log::trace!("rejecting sketch {ops:?}: {why}");
        false
    };
    if ops.iter().any(|op| matches!(op, Opcode::Select | Opcode::Filter)) {
        return reject("select and filter are applied outside the search");
    }
    if ops
        .iter()
        .skip(1)
        .any(|op| matches!(op, Opcode::GroupSummary | Opcode::MutateCustom))
    {
        return reject("group_sum and mutate_custom must be outermost");
    }
    if ops.iter().filter(|op| op.is_gather_family()).count() > 1 {
        return reject("more than one gather");
    }
    if ops.iter().filter(|op| op.is_mutate_family()).count() > 1 {
        return reject("more than one mutate");
    }
    for (i, op) in ops.iter().enumerate() {
        if *op != Opcode::Separate && ops[i + 1..].contains(op) {
            return reject("repeated operator");
        }
    }
    if !ctx.has_separator && ops.contains(&Opcode::Separate) {
        return reject("nothing to separate");
    }
    if ctx.new_values && !ops.iter().any(|op| op.creates_values()) {
        return reject("the target has values no operator here can create");
    }
    true
}

/// Enumerates sketches level by level. Level `n` holds every sketch with `n`
/// operators, built by wrapping each level `n - 1` sketch in each configured
/// operator; levels are kept so later sizes reuse earlier ones.
#[derive(Debug, Clone)]
pub struct SketchGenerator {
    operators: Vec<Opcode>,
    levels: Vec<Vec<Node>>,
}

impl SketchGenerator {
    pub fn new(operators: &[Opcode], num_inputs: usize) -> Self {
        Self {
            operators: operators.to_vec(),
            levels: vec![(0..num_inputs).map(Node::table).collect()],
        }
    }

    /// Every sketch of exactly `size` operators, admissible or not.
    pub fn level(&mut self, size: usize) -> &[Node] {
        while self.levels.len() <= size {
            let mut next = vec![];
            if let Some(prev) = self.levels.last() {
                for &op in &self.operators {
                    for inner in prev {
                        next.push(Node::sketch(op, inner.clone()));
                    }
                }
            }
            self.levels.push(next);
        }
        &self.levels[size]
    }

    /// The sketches of `size` operators that pass the admissibility filter.
    pub fn admissible(&mut self, size: usize, ctx: SketchContext) -> Vec<Node> {
        self.level(size)
            .iter()
            .filter(|sketch| is_admissible(&sketch.opcodes(), ctx))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table;

    const CREATING: SketchContext = SketchContext {
        new_values: true,
        has_separator: true,
    };
    const RESHAPING: SketchContext = SketchContext {
        new_values: false,
        has_separator: true,
    };

    #[test]
    fn structural_rules() {
        use Opcode::*;
        assert!(is_admissible(&[Gather], RESHAPING));
        assert!(is_admissible(&[Spread, Gather], RESHAPING));
        assert!(!is_admissible(&[Filter], RESHAPING));
        assert!(!is_admissible(&[Gather, Select], RESHAPING));

        assert!(is_admissible(&[GroupSummary, Gather], CREATING));
        assert!(!is_admissible(&[Gather, GroupSummary], CREATING));
        assert!(!is_admissible(&[Separate, MutateCustom], CREATING));

        assert!(!is_admissible(&[Gather, GatherNeg], RESHAPING));
        assert!(!is_admissible(&[Mutate, CumSum], CREATING));
        assert!(!is_admissible(&[Spread, Spread], RESHAPING));
        assert!(is_admissible(&[Separate, Separate], CREATING));
    }

    #[test]
    fn context_rules() {
        use Opcode::*;
        assert!(!is_admissible(&[], CREATING));
        assert!(is_admissible(&[], RESHAPING));
        assert!(!is_admissible(&[Gather], CREATING));
        // counts and sums often coincide with input cells
        assert!(is_admissible(&[Mutate], RESHAPING));
        assert!(is_admissible(&[GroupSummary, Gather], RESHAPING));
        let no_sep = SketchContext {
            new_values: true,
            has_separator: false,
        };
        assert!(!is_admissible(&[Separate], no_sep));
        assert!(is_admissible(&[Unite], no_sep));
    }

    #[test]
    fn levels_wrap_in_operator_order() {
        let mut gen = SketchGenerator::new(&[Opcode::Gather, Opcode::Spread], 2);
        assert_eq!(gen.level(0), &[Node::table(0), Node::table(1)]);
        assert_eq!(gen.level(2).len(), 8);
        let first: Vec<_> = gen.level(1).iter().map(|s| (s.opcodes(), s.input())).collect();
        assert_eq!(
            first,
            vec![
                (vec![Opcode::Gather], 0),
                (vec![Opcode::Gather], 1),
                (vec![Opcode::Spread], 0),
                (vec![Opcode::Spread], 1),
            ]
        );
        // gather(gather(..)) and spread(spread(..)) are filtered out
        assert_eq!(gen.admissible(2, RESHAPING).len(), 4);
    }

    #[test]
    fn context_from_tables() {
        let input = table!(["Bucket", "Budgeted"], ["A", 1], ["B", 2]).unwrap();
        let reshaped = table!(["k", "v"], ["Budgeted", 1]).unwrap();
        assert_eq!(
            SketchContext::new(&[input.clone()], &reshaped),
            SketchContext {
                new_values: false,
                has_separator: false
            }
        );
        let summed = table!(["total"], [3]).unwrap();
        assert!(SketchContext::new(&[input], &summed).new_values);

        let dated = table!(["date"], ["2020-01"]).unwrap();
        assert!(SketchContext::new(&[dated.clone()], &dated).has_separator);
    }
}
