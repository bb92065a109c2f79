//! The table-transformation DSL.
//!
//! A program is a chain of operator applications over one input table. Every
//! operator node holds its input subtree as argument `0`, followed by its own
//! arguments at positions `1..=arity`. Any of those arguments may be a
//! [`Arg::Hole`]; a node without reachable holes is concrete.
//!
//! Nodes are immutable. Filling a hole produces a new node that shares all
//! untouched subtrees with the old one.

mod domain;
mod eval;

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::util::{ListDisplay, NameGen};
use crate::value::{DType, Value};

pub use eval::{EvalError, SEPARATORS, UNITE_SEPARATOR};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Opcode {
    Select,
    Unite,
    Filter,
    Separate,
    Spread,
    Gather,
    GatherNeg,
    GroupSummary,
    CumSum,
    Mutate,
    MutateCustom,
}

impl Opcode {
    pub const ALL: [Opcode; 11] = [
        Opcode::Select,
        Opcode::Unite,
        Opcode::Filter,
        Opcode::Separate,
        Opcode::Spread,
        Opcode::Gather,
        Opcode::GatherNeg,
        Opcode::GroupSummary,
        Opcode::CumSum,
        Opcode::Mutate,
        Opcode::MutateCustom,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Opcode::Select => "select",
            Opcode::Unite => "unite",
            Opcode::Filter => "filter",
            Opcode::Separate => "separate",
            Opcode::Spread => "spread",
            Opcode::Gather => "gather",
            Opcode::GatherNeg => "gather_neg",
            Opcode::GroupSummary => "group_sum",
            Opcode::CumSum => "cumsum",
            Opcode::Mutate => "mutate",
            Opcode::MutateCustom => "mutate_custom",
        }
    }

    /// Number of arguments besides the input subtree.
    pub fn arity(self) -> usize {
        match self {
            Opcode::Select
            | Opcode::Separate
            | Opcode::Gather
            | Opcode::GatherNeg
            | Opcode::CumSum => 1,
            Opcode::Spread => 2,
            Opcode::Unite
            | Opcode::Filter
            | Opcode::GroupSummary
            | Opcode::Mutate
            | Opcode::MutateCustom => 3,
        }
    }

    pub fn is_gather_family(self) -> bool {
        matches!(self, Opcode::Gather | Opcode::GatherNeg)
    }

    pub fn is_mutate_family(self) -> bool {
        matches!(self, Opcode::Mutate | Opcode::MutateCustom | Opcode::CumSum)
    }

    /// Operators whose output column types cannot be known without the data.
    pub fn schema_depends_on_data(self) -> bool {
        matches!(self, Opcode::Spread | Opcode::Separate)
    }

    /// Operators whose output may hold cell values that appear nowhere in
    /// their input (neither as a cell nor as a column name).
    pub fn creates_values(self) -> bool {
        matches!(
            self,
            Opcode::Unite
                | Opcode::Separate
                | Opcode::GroupSummary
                | Opcode::CumSum
                | Opcode::Mutate
                | Opcode::MutateCustom
        )
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Opcode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Opcode::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| format!("Unknown operator: {s}"))
    }
}

/// Comparison operators used by `filter` and `mutate_custom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CmpOp {
    Gt,
    Lt,
    Eq,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Gt => ">",
            CmpOp::Lt => "<",
            CmpOp::Eq => "==",
        }
    }

    /// Whether the operator can compare values of this type.
    pub fn accepts(self, dtype: DType) -> bool {
        match self {
            CmpOp::Eq => true,
            CmpOp::Gt | CmpOp::Lt => dtype == DType::Number,
        }
    }

    /// `None` when the operands cannot be compared with this operator.
    pub fn holds(self, lhs: &Value, rhs: &Value) -> Option<bool> {
        match self {
            CmpOp::Eq => (lhs.dtype() == rhs.dtype()).then(|| lhs.key() == rhs.key()),
            CmpOp::Gt => Some(lhs.as_num()? > rhs.as_num()?),
            CmpOp::Lt => Some(lhs.as_num()? < rhs.as_num()?),
        }
    }
}

impl FromStr for CmpOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">" => Ok(CmpOp::Gt),
            "<" => Ok(CmpOp::Lt),
            "==" => Ok(CmpOp::Eq),
            _ => Err(format!("Unknown comparison operator: {s}")),
        }
    }
}

/// Arithmetic operators used by `mutate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArithOp {
    Add,
    Sub,
}

impl ArithOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
        }
    }

    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            ArithOp::Add => lhs + rhs,
            ArithOp::Sub => lhs - rhs,
        }
    }
}

impl FromStr for ArithOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" => Ok(ArithOp::Add),
            "-" => Ok(ArithOp::Sub),
            _ => Err(format!("Unknown mutate operator: {s}")),
        }
    }
}

/// Aggregation functions used by `group_sum`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AggrFunc {
    Mean,
    Sum,
    Count,
}

impl AggrFunc {
    pub fn name(self) -> &'static str {
        match self {
            AggrFunc::Mean => "mean",
            AggrFunc::Sum => "sum",
            AggrFunc::Count => "count",
        }
    }
}

impl FromStr for AggrFunc {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean" => Ok(AggrFunc::Mean),
            "sum" => Ok(AggrFunc::Sum),
            "count" => Ok(AggrFunc::Count),
            _ => Err(format!("Unknown aggregation function: {s}")),
        }
    }
}

/// An operator argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Arg {
    /// Not decided yet.
    Hole,
    Col(usize),
    Cols(Vec<usize>),
    Cmp(CmpOp),
    Arith(ArithOp),
    Aggr(AggrFunc),
    /// Stands in for the aggregated column when `group_sum` counts rows.
    CountRows,
    Const(Value),
}

impl Display for Arg {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Hole => write!(f, "??"),
            Arg::Col(c) => write!(f, "{c}"),
            Arg::Cols(cols) => write!(f, "[{}]", ListDisplay(cols, ", ")),
            Arg::Cmp(op) => write!(f, "{:?}", op.symbol()),
            Arg::Arith(op) => write!(f, "{:?}", op.symbol()),
            Arg::Aggr(func) => write!(f, "{:?}", func.name()),
            Arg::CountRows => write!(f, "*"),
            Arg::Const(value) => f.write_str(&value.to_literal()),
        }
    }
}

/// An operator applied to an input subtree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OpNode {
    pub opcode: Opcode,
    pub child: Arc<Node>,
    pub args: SmallVec<[Arg; 3]>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    /// Refers to the input table at this index.
    Table(usize),
    Op(OpNode),
}

impl Node {
    pub fn table(index: usize) -> Self {
        Node::Table(index)
    }

    pub fn op(opcode: Opcode, child: impl Into<Arc<Node>>, args: impl IntoIterator<Item = Arg>) -> Self {
        let args: SmallVec<[Arg; 3]> = args.into_iter().collect();
        debug_assert_eq!(args.len(), opcode.arity(), "wrong arity for {opcode}");
        Node::Op(OpNode {
            opcode,
            child: child.into(),
            args,
        })
    }

    /// `opcode` applied to `child` with every argument left as a hole.
    pub fn sketch(opcode: Opcode, child: impl Into<Arc<Node>>) -> Self {
        Self::op(opcode, child, std::iter::repeat(Arg::Hole).take(opcode.arity()))
    }

    pub fn opcode(&self) -> Option<Opcode> {
        match self {
            Node::Table(_) => None,
            Node::Op(node) => Some(node.opcode),
        }
    }

    pub fn child(&self) -> Option<&Arc<Node>> {
        match self {
            Node::Table(_) => None,
            Node::Op(node) => Some(&node.child),
        }
    }

    /// The input table the program ultimately reads.
    pub fn input(&self) -> usize {
        match self {
            Node::Table(i) => *i,
            Node::Op(node) => node.child.input(),
        }
    }

    /// Number of operator applications.
    pub fn size(&self) -> usize {
        match self {
            Node::Table(_) => 0,
            Node::Op(node) => 1 + node.child.size(),
        }
    }

    /// Operators from the outermost one down to the table reference.
    pub fn opcodes(&self) -> Vec<Opcode> {
        let mut out = vec![];
        let mut node = self;
        while let Node::Op(op) = node {
            out.push(op.opcode);
            node = &op.child;
        }
        out
    }

    /// The subtree reached by following `path` (child indices from the root).
    pub fn subtree(&self, path: &[usize]) -> Option<&Node> {
        match path.split_first() {
            None => Some(self),
            Some((0, rest)) => self.child()?.subtree(rest),
            Some(_) => None,
        }
    }

    pub fn is_concrete(&self) -> bool {
        match self {
            Node::Table(_) => true,
            Node::Op(node) => {
                !node.args.iter().any(|a| matches!(a, Arg::Hole)) && node.child.is_concrete()
            }
        }
    }

    /// Paths of every hole, outermost first. The last index of a path is the
    /// argument position; the indices before it lead through the children.
    pub fn holes(&self) -> Vec<Vec<usize>> {
        let mut out = vec![];
        self.collect_holes(&mut vec![], &mut out);
        out
    }

    fn collect_holes(&self, prefix: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        let Node::Op(node) = self else {
            return;
        };
        for (i, arg) in node.args.iter().enumerate() {
            if matches!(arg, Arg::Hole) {
                let mut path = prefix.clone();
                path.push(i + 1);
                out.push(path);
            }
        }
        prefix.push(0);
        node.child.collect_holes(prefix, out);
        prefix.pop();
    }

    /// A copy of this node with the hole at `path` replaced by `value`.
    /// Returns `None` if `path` does not lead to a hole.
    pub fn fill_hole(&self, path: &[usize], value: Arg) -> Option<Node> {
        let Node::Op(node) = self else {
            return None;
        };
        match path {
            [] => None,
            [0, rest @ ..] => {
                let child = node.child.fill_hole(rest, value)?;
                Some(Node::Op(OpNode {
                    opcode: node.opcode,
                    child: Arc::new(child),
                    args: node.args.clone(),
                }))
            }
            [arg] => {
                let slot = node.args.get(arg - 1)?;
                if !matches!(slot, Arg::Hole) {
                    return None;
                }
                let mut args = node.args.clone();
                args[arg - 1] = value;
                Some(Node::Op(OpNode {
                    opcode: node.opcode,
                    child: node.child.clone(),
                    args,
                }))
            }
            _ => None,
        }
    }

    /// Renders the program as assignments, innermost first, e.g.
    /// `t0 <- gather(input0, [1, 2])`.
    pub fn to_statements(&self) -> Vec<String> {
        let mut names = NameGen::new();
        let mut inputs = vec![];
        self.walk(&mut |node| {
            if let Node::Table(i) = node {
                inputs.push(*i);
            }
        });
        for i in inputs {
            names.reserve(&format!("input{i}"));
        }
        let mut out = vec![];
        self.render(&mut names, &mut out);
        out
    }

    fn render(&self, names: &mut NameGen, out: &mut Vec<String>) -> String {
        match self {
            Node::Table(i) => format!("input{i}"),
            Node::Op(node) => {
                let input = node.child.render(names, out);
                let var = names.fresh("t");
                let mut call = format!("{var} <- {}({input}", node.opcode);
                for arg in &node.args {
                    call.push_str(&format!(", {arg}"));
                }
                call.push(')');
                out.push(call);
                var
            }
        }
    }

    /// Visits every node, outermost first.
    pub fn walk(&self, f: &mut impl FnMut(&Node)) {
        f(self);
        if let Node::Op(node) = self {
            node.child.walk(f);
        }
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Node::Table(i) => write!(f, "input{i}"),
            Node::Op(_) => write!(f, "{}", ListDisplay(self.to_statements(), "; ")),
        }
    }
}

impl OpNode {
    /// The argument at position `index` (1-based; `0` is the child).
    pub fn arg(&self, index: usize) -> Option<&Arg> {
        index.checked_sub(1).and_then(|i| self.args.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_names_round_trip() {
        for op in Opcode::ALL {
            assert_eq!(op.name().parse::<Opcode>(), Ok(op));
        }
        assert!("pivot_longer".parse::<Opcode>().is_err());
    }

    #[test]
    fn holes_are_addressed_by_path() {
        let sketch = Node::sketch(Opcode::Mutate, Node::sketch(Opcode::Unite, Node::table(0)));
        assert!(!sketch.is_concrete());
        assert_eq!(
            sketch.holes(),
            vec![
                vec![1],
                vec![2],
                vec![3],
                vec![0, 1],
                vec![0, 2],
                vec![0, 3]
            ]
        );

        let filled = sketch.fill_hole(&[0, 2], Arg::Col(4)).unwrap();
        assert_eq!(filled.holes().len(), 5);
        assert_eq!(
            filled.subtree(&[0]).and_then(|n| match n {
                Node::Op(op) => op.arg(2).cloned(),
                Node::Table(_) => None,
            }),
            Some(Arg::Col(4))
        );
        // the original sketch is untouched
        assert_eq!(sketch.holes().len(), 6);
        // filled arguments are not holes anymore
        assert!(filled.fill_hole(&[0, 2], Arg::Col(5)).is_none());
        assert!(filled.fill_hole(&[0, 0], Arg::Col(5)).is_none());
    }

    #[test]
    fn statements_render_innermost_first() {
        let program = Node::op(
            Opcode::Mutate,
            Node::op(Opcode::Gather, Node::table(0), [Arg::Cols(vec![1, 2])]),
            [Arg::Col(1), Arg::Arith(ArithOp::Sub), Arg::Col(2)],
        );
        assert_eq!(
            program.to_statements(),
            vec![
                "t0 <- gather(input0, [1, 2])".to_string(),
                "t1 <- mutate(t0, 1, \"-\", 2)".to_string(),
            ]
        );
        assert_eq!(
            program.to_string(),
            "t0 <- gather(input0, [1, 2]); t1 <- mutate(t0, 1, \"-\", 2)"
        );
        assert_eq!(Node::table(1).to_string(), "input1");
        assert_eq!(program.opcodes(), vec![Opcode::Mutate, Opcode::Gather]);
        assert_eq!(program.size(), 2);
        assert!(program.is_concrete());
    }
}
