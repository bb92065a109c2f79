//! Backward abstract evaluation.
//!
//! Starting from the target table at the root of a sketch, each operator is
//! asked which tables its input would plausibly have to include for its
//! output to include the current requirement. Every answer becomes an
//! [`Obligation`] one level deeper. Obligations form a tree stored in an
//! arena: each one points at the obligation it was derived from, so chains
//! that share a prefix share its entries instead of copying them.
//!
//! The rules are heuristics. A requirement derived here may be stronger than
//! what a correct program actually needs, so every accepted program is
//! checked again against the original target.

use crate::ast::{Node, Opcode, SEPARATORS, UNITE_SEPARATOR};
use crate::table::Table;
use crate::util::{combinations, IndexSet, NameGen};
use crate::value::{DType, Value};

pub type ObligationId = usize;

/// The node at `path` must evaluate to a table that includes `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Obligation {
    pub target: Table,
    /// Distance from the sketch root.
    pub depth: usize,
    pub parent: Option<ObligationId>,
}

impl Obligation {
    /// Sketches are operator chains, so the node at depth `d` is always
    /// reached through `d` child edges.
    pub fn path(&self) -> Vec<usize> {
        vec![0; self.depth]
    }
}

/// All obligations derived for one sketch.
#[derive(Debug, Clone, Default)]
pub struct PremiseGraph {
    obligations: Vec<Obligation>,
    /// Obligations at table-reference leaves, in discovery order.
    leaves: Vec<ObligationId>,
}

impl PremiseGraph {
    pub fn build(sketch: &Node, output: &Table) -> Self {
        let mut graph = Self::default();
        graph.expand(sketch, output.clone(), 0, None);
        graph
    }

    fn expand(&mut self, node: &Node, target: Table, depth: usize, parent: Option<ObligationId>) {
        let id = self.obligations.len();
        self.obligations.push(Obligation {
            target,
            depth,
            parent,
        });
        let Node::Op(op) = node else {
            self.leaves.push(id);
            return;
        };
        let candidates = backward(op.opcode, &self.obligations[id].target, depth == 0);
        if candidates.is_empty() {
            log::trace!("no premise for {} at depth {depth}", op.opcode);
        }
        for candidate in candidates {
            self.expand(&op.child, candidate, depth + 1, Some(id));
        }
    }

    pub fn get(&self, id: ObligationId) -> &Obligation {
        &self.obligations[id]
    }

    pub fn len(&self) -> usize {
        self.obligations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obligations.is_empty()
    }

    /// Every complete chain from the root to a leaf, depth first.
    pub fn chains(&self) -> Vec<PremiseChain<'_>> {
        self.leaves
            .iter()
            .map(|&leaf| {
                let mut obligations = vec![];
                let mut next = Some(leaf);
                while let Some(id) = next {
                    obligations.push(&self.obligations[id]);
                    next = self.obligations[id].parent;
                }
                obligations.reverse();
                PremiseChain { obligations }
            })
            .collect()
    }
}

/// One obligation per depth, from the root (depth 0) to the table reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PremiseChain<'a> {
    obligations: Vec<&'a Obligation>,
}

impl<'a> PremiseChain<'a> {
    pub fn len(&self) -> usize {
        self.obligations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obligations.is_empty()
    }

    pub fn at_depth(&self, depth: usize) -> Option<&'a Obligation> {
        self.obligations.get(depth).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Obligation> + '_ {
        self.obligations.iter().copied()
    }
}

/// Candidate requirements on the input of `op`, given that its output must
/// include `required`. `outermost` is set for the root of the sketch, where
/// the operator must have done some visible work.
pub fn backward(op: Opcode, required: &Table, outermost: bool) -> Vec<Table> {
    let mut out = IndexSet::default();
    let keep = !outermost;
    match op {
        Opcode::Select | Opcode::Filter => {
            out.insert(required.clone());
        }
        Opcode::Unite => {
            if keep {
                out.insert(required.clone());
            }
            out.extend(undo_unite(required));
        }
        Opcode::Separate => {
            if keep {
                out.insert(required.clone());
            }
            // either half of a split may have become a number
            for c in (0..required.num_columns())
                .filter(|&c| matches!(required.dtypes()[c], DType::String | DType::Number))
            {
                out.insert(required.drop_columns(&[c]).dedup());
            }
            out.extend(reunite(required));
        }
        Opcode::Spread => out.extend(melt(required)),
        Opcode::Gather | Opcode::GatherNeg => {
            if keep {
                out.insert(required.clone());
            }
            for pair in combinations(required.num_columns(), 2) {
                if pair.iter().any(|&c| required.dtypes()[c] == DType::String) {
                    out.insert(required.drop_columns(&pair).dedup());
                }
            }
        }
        Opcode::Mutate | Opcode::CumSum | Opcode::GroupSummary | Opcode::MutateCustom => {
            if keep {
                out.insert(required.clone());
            }
            let created = if op == Opcode::MutateCustom {
                DType::Boolean
            } else {
                DType::Number
            };
            for c in required.columns_of(created) {
                out.insert(required.drop_columns(&[c]).dedup());
            }
        }
    }
    out.into_iter().collect()
}

/// Splits every string column whose values all contain the unite separator,
/// once at the first and once at the last occurrence.
fn undo_unite(required: &Table) -> Vec<Table> {
    let mut out = vec![];
    for c in required.columns_of(DType::String) {
        let texts: Option<Vec<&str>> = required.column(c).map(Value::as_str).collect();
        let Some(texts) = texts else { continue };
        if !texts.iter().all(|t| t.contains(UNITE_SEPARATOR)) {
            continue;
        }
        let firsts = texts.iter().filter_map(|t| t.split_once(UNITE_SEPARATOR)).collect::<Vec<_>>();
        let lasts = texts.iter().filter_map(|t| t.rsplit_once(UNITE_SEPARATOR)).collect::<Vec<_>>();
        out.push(split_column(required, c, &firsts));
        if firsts != lasts {
            out.push(split_column(required, c, &lasts));
        }
    }
    out
}

/// Replaces column `c` with two columns holding `parts`, typed as numbers
/// when every part on a side is numeric.
fn split_column(table: &Table, c: usize, parts: &[(&str, &str)]) -> Table {
    let lefts: Vec<&str> = parts.iter().map(|p| p.0).collect();
    let rights: Vec<&str> = parts.iter().map(|p| p.1).collect();
    let (left_type, lefts) = Value::parse_fragments(&lefts);
    let (right_type, rights) = Value::parse_fragments(&rights);
    let mut names = NameGen::with_reserved(table.columns().iter().map(String::as_str));
    let name = &table.columns()[c];

    let mut columns = vec![];
    let mut dtypes = vec![];
    for i in 0..table.num_columns() {
        if i == c {
            columns.extend([names.claim(&format!("{name}1")), names.claim(&format!("{name}2"))]);
            dtypes.extend([left_type, right_type]);
        } else {
            columns.push(table.columns()[i].clone());
            dtypes.push(table.dtypes()[i]);
        }
    }
    let rows = table
        .rows()
        .iter()
        .enumerate()
        .map(|(r, row)| {
            let mut out = Vec::with_capacity(columns.len());
            for (i, value) in row.iter().enumerate() {
                if i == c {
                    out.push(lefts[r].clone());
                    out.push(rights[r].clone());
                } else {
                    out.push(value.clone());
                }
            }
            out
        })
        .collect();
    Table::from_parts(columns, dtypes, rows)
}

/// Joins every pair `i < j` of string or numeric columns into one string
/// column under each separator.
fn reunite(required: &Table) -> Vec<Table> {
    let joinable: Vec<usize> = (0..required.num_columns())
        .filter(|&c| matches!(required.dtypes()[c], DType::String | DType::Number))
        .collect();
    let mut out = vec![];
    for pair in combinations(joinable.len(), 2) {
        let (i, j) = (joinable[pair[0]], joinable[pair[1]]);
        for sep in SEPARATORS {
            let mut names = NameGen::with_reserved(required.columns().iter().map(String::as_str));
            let name = names.claim(&format!("{}{sep}{}", required.columns()[i], required.columns()[j]));
            let mut columns = vec![];
            let mut dtypes = vec![];
            for c in 0..required.num_columns() {
                if c == i {
                    columns.push(name.clone());
                    dtypes.push(DType::String);
                } else if c != j {
                    columns.push(required.columns()[c].clone());
                    dtypes.push(required.dtypes()[c]);
                }
            }
            let rows = required
                .rows()
                .iter()
                .map(|row| {
                    let mut out = vec![];
                    for (c, value) in row.iter().enumerate() {
                        if c == i {
                            out.push(Value::Str(format!("{}{sep}{}", row[i], row[j])));
                        } else if c != j {
                            out.push(value.clone());
                        }
                    }
                    out
                })
                .collect();
            out.push(Table::from_parts(columns, dtypes, rows));
        }
    }
    out
}

/// Recovers the long form a `spread` may have started from: keeps up to two
/// id columns and stacks the rest into one value column. The key column of
/// the long form is not rebuilt, since the wide column names are arbitrary.
fn melt(required: &Table) -> Vec<Table> {
    let width = required.num_columns();
    let mut out = vec![];
    for k in 0..=2usize.min(width.saturating_sub(1)) {
        for ids in combinations(width, k) {
            let melted: Vec<usize> = (0..width).filter(|c| !ids.contains(c)).collect();
            let Some(&first) = melted.first() else { continue };
            let value_type = required.dtypes()[first];
            if melted.iter().any(|&c| required.dtypes()[c] != value_type) {
                continue;
            }
            let mut columns: Vec<String> = ids.iter().map(|&c| required.columns()[c].clone()).collect();
            let mut dtypes: Vec<DType> = ids.iter().map(|&c| required.dtypes()[c]).collect();
            let mut names = NameGen::with_reserved(columns.iter().map(String::as_str));
            columns.push(names.claim("VALUE"));
            dtypes.push(value_type);
            let mut rows = vec![];
            for row in required.rows() {
                for &c in &melted {
                    let mut long: Vec<Value> = ids.iter().map(|&i| row[i].clone()).collect();
                    long.push(row[c].clone());
                    rows.push(long);
                }
            }
            out.push(Table::from_parts(columns, dtypes, rows).dedup());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::{table_equivalence, table_inclusion};
    use crate::ast::Arg;
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

    fn target() -> Table {
        table!(
            ["x", "y", "column"],
            ["Actual", 115, "Bucket_E"],
            ["Actual", 90, "Bucket_D"],
            ["Budgeted", 100, "Bucket_D"],
        )
        .unwrap()
    }

    #[test]
    fn gather_drops_the_key_value_pair() {
        let candidates = backward(Opcode::Gather, &target(), true);
        assert!(!candidates.contains(&target()));
        // dropping (x, y) leaves the ids, which the input must contain
        let ids = table!(["column"], ["Bucket_E"], ["Bucket_D"]).unwrap();
        assert!(candidates.iter().any(|t| table_equivalence(t, &ids)));
        assert!(candidates.iter().any(|t| table_inclusion(t, &budget())));

        let inner = backward(Opcode::Gather, &target(), false);
        assert_eq!(inner[0], target());
        assert_eq!(inner.len(), candidates.len() + 1);
    }

    #[test]
    fn spread_melts_back_to_long_form() {
        let wide = budget();
        let candidates = backward(Opcode::Spread, &wide, true);
        let long = Node::op(Opcode::Gather, Node::table(0), [Arg::Cols(vec![1, 2])])
            .eval(&[budget()])
            .unwrap();
        // the melt over id {Bucket} is the gathered table without its KEY
        assert!(candidates
            .iter()
            .any(|t| t.num_columns() == 2 && table_inclusion(t, &long)));
        // Bucket never shares a dtype with the numbers, so no melt over all
        assert!(candidates.iter().all(|t| t.num_columns() >= 2));
    }

    #[test]
    fn unite_is_undone_at_first_and_last_separator() {
        let required = table!(["k"], ["a_b_c"], ["d_e_f"]).unwrap();
        let candidates = backward(Opcode::Unite, &required, true);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].rows()[0], vec![Value::from("a"), Value::from("b_c")]);
        assert_eq!(candidates[1].rows()[0], vec![Value::from("a_b"), Value::from("c")]);

        let years = table!(["k"], ["2019_x"]).unwrap();
        let split = backward(Opcode::Unite, &years, true);
        assert_eq!(split[0].dtypes(), &[DType::Number, DType::String]);
    }

    #[test]
    fn separate_reunites_pairs() {
        let required = table!(["y", "q"], [2019, "Q1"]).unwrap();
        let candidates = backward(Opcode::Separate, &required, true);
        let joined: Vec<String> = candidates
            .iter()
            .filter(|t| t.num_columns() == 1 && !required.columns().contains(&t.columns()[0]))
            .map(|t| t.rows()[0][0].to_string())
            .collect();
        assert_eq!(joined, vec!["2019-Q1", "2019_Q1", "2019 Q1"]);
    }

    #[test]
    fn separate_drops_a_numeric_half() {
        let input = table!(["id", "v"], ["a-1", 10], ["b-2", 20]).unwrap();
        let required = table!(["n", "v"], [1, 10]).unwrap();
        let candidates = backward(Opcode::Separate, &required, true);
        assert!(candidates.contains(&table!(["v"], [10]).unwrap()));
        assert!(candidates.iter().any(|t| table_inclusion(t, &input)));

        let split = Node::op(Opcode::Separate, Node::table(0), [Arg::Col(0)])
            .eval(&[input])
            .unwrap();
        assert!(table_inclusion(&required, &split));
    }

    #[test]
    fn mutate_family_drops_created_columns() {
        let required = table!(["k", "v", "flag"], ["a", 1, true], ["a", 1, false]).unwrap();
        let numeric = backward(Opcode::Mutate, &required, true);
        assert_eq!(numeric, vec![table!(["k", "flag"], ["a", true], ["a", false]).unwrap()]);
        let boolean = backward(Opcode::MutateCustom, &required, true);
        assert_eq!(boolean, vec![table!(["k", "v"], ["a", 1]).unwrap()]);
    }

    #[test]
    fn chains_run_from_root_to_leaf() {
        let sketch = Node::sketch(Opcode::Spread, Node::sketch(Opcode::Gather, Node::table(0)));
        let graph = PremiseGraph::build(&sketch, &budget());
        let chains = graph.chains();
        assert!(!chains.is_empty());
        for chain in &chains {
            assert_eq!(chain.len(), 3);
            assert_eq!(chain.at_depth(0).map(|o| &o.target), Some(&budget()));
            for (depth, obligation) in chain.iter().enumerate() {
                assert_eq!(obligation.depth, depth);
                assert_eq!(obligation.path(), vec![0; depth]);
            }
        }
        // the root obligation is stored once however many chains share it
        assert_eq!(graph.get(0).parent, None);
        assert_eq!(graph.len(), 1 + 4 + chains.len());
    }
}
