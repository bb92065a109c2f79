//! Output-schema and argument-domain inference.

use super::{AggrFunc, Arg, ArithOp, EvalError, Node, OpNode, Opcode, SEPARATORS, UNITE_SEPARATOR};
use crate::config::Config;
use crate::table::Table;
use crate::util::combinations;
use crate::value::{DType, Value};

impl Node {
    /// Column types of this program's output.
    ///
    /// Most operators are typed statically. `spread` and `separate` depend on
    /// the data (the key values and the split fragments), so they are
    /// evaluated, which requires their subtree to be concrete.
    pub fn infer_output_schema(&self, inputs: &[Table]) -> Result<Vec<DType>, EvalError> {
        let Node::Op(node) = self else {
            return self.eval(inputs).map(|t| t.dtypes().to_vec());
        };
        if node.opcode.schema_depends_on_data() {
            return self.eval(inputs).map(|t| t.dtypes().to_vec());
        }
        let input = node.child.infer_output_schema(inputs)?;
        node.static_schema(&input)
    }

    /// Candidate values for argument `arg_id` (1-based) of this node.
    ///
    /// The child subtree must already be concrete, and so must every argument
    /// before `arg_id`; later arguments are ignored.
    pub fn infer_domain(&self, arg_id: usize, inputs: &[Table], config: &Config) -> Result<Vec<Arg>, EvalError> {
        match self {
            Node::Table(_) => Ok(vec![]),
            Node::Op(node) => {
                let input = node.child.eval(inputs)?;
                node.domain(arg_id, &input, config)
            }
        }
    }
}

impl OpNode {
    /// Output column types from the input's alone. Fails for `spread` and
    /// `separate`, whose output types come from the data.
    pub fn static_schema(&self, input: &[DType]) -> Result<Vec<DType>, EvalError> {
        let input = input.to_vec();
        let width = input.len();
        let col = |index: usize| match self.arg(index) {
            Some(Arg::Col(c)) if *c < width => Ok(*c),
            Some(Arg::Col(c)) => Err(EvalError::ColumnOutOfRange {
                op: self.opcode,
                col: *c,
                width,
            }),
            Some(Arg::Hole) => Err(EvalError::Hole {
                op: self.opcode,
                index,
            }),
            _ => Err(EvalError::BadArgument {
                op: self.opcode,
                index,
            }),
        };
        let cols = |index: usize| match self.arg(index) {
            Some(Arg::Cols(cols)) if cols.iter().all(|&c| c < width) => Ok(cols.clone()),
            Some(Arg::Hole) => Err(EvalError::Hole {
                op: self.opcode,
                index,
            }),
            _ => Err(EvalError::BadArgument {
                op: self.opcode,
                index,
            }),
        };
        Ok(match self.opcode {
            Opcode::Select => cols(1)?.into_iter().map(|c| input[c]).collect(),
            Opcode::Filter => input,
            Opcode::Unite => {
                let (c1, c2) = (col(1)?, col(2)?);
                let mut out = vec![];
                for (c, &dtype) in input.iter().enumerate() {
                    if c == c1 {
                        out.push(DType::String);
                    } else if c != c2 {
                        out.push(dtype);
                    }
                }
                out
            }
            Opcode::Gather | Opcode::GatherNeg => {
                let listed = cols(1)?;
                let melted = |c: &usize| listed.contains(c) == (self.opcode == Opcode::Gather);
                let value_type = (0..width).find(melted).map_or(DType::String, |c| input[c]);
                let mut out: Vec<DType> = (0..width)
                    .filter(|c| !melted(c))
                    .map(|c| input[c])
                    .collect();
                out.extend([DType::String, value_type]);
                out
            }
            Opcode::GroupSummary => {
                let mut out: Vec<DType> = cols(1)?.into_iter().map(|c| input[c]).collect();
                out.push(DType::Number);
                out
            }
            Opcode::CumSum | Opcode::Mutate => {
                let mut out = input;
                out.push(DType::Number);
                out
            }
            Opcode::MutateCustom => {
                let mut out = input;
                out.push(DType::Boolean);
                out
            }
            Opcode::Spread | Opcode::Separate => {
                return Err(EvalError::Inapplicable {
                    op: self.opcode,
                    reason: "output types depend on the data".into(),
                })
            }
        })
    }

    /// Domain of argument `arg_id` given the concrete table this node reads.
    pub(crate) fn domain(&self, arg_id: usize, input: &Table, config: &Config) -> Result<Vec<Arg>, EvalError> {
        let width = input.num_columns();
        let dtypes = input.dtypes();
        let all_cols = || (0..width).map(Arg::Col).collect::<Vec<_>>();
        let earlier = |index: usize| -> Result<usize, EvalError> {
            match self.arg(index) {
                Some(Arg::Col(c)) if *c < width => Ok(*c),
                Some(Arg::Col(c)) => Err(EvalError::ColumnOutOfRange {
                    op: self.opcode,
                    col: *c,
                    width,
                }),
                Some(Arg::Hole) => Err(EvalError::Hole {
                    op: self.opcode,
                    index,
                }),
                _ => Err(EvalError::BadArgument {
                    op: self.opcode,
                    index,
                }),
            }
        };
        let constants_for = |dtype: DType| -> Vec<Arg> {
            config
                .constants
                .iter()
                .filter(|c| c.dtype() == dtype)
                .cloned()
                .map(Arg::Const)
                .collect()
        };

        let domain = match (self.opcode, arg_id) {
            (Opcode::Select, 1) => (1..=width)
                .flat_map(|k| combinations(width, k))
                .map(Arg::Cols)
                .collect(),

            (Opcode::Unite, 1) => all_cols(),
            (Opcode::Unite, 2) => (earlier(1)? + 1..width).map(Arg::Col).collect(),
            (Opcode::Unite, 3) => vec![Arg::Const(Value::from(UNITE_SEPARATOR))],

            (Opcode::Filter | Opcode::MutateCustom, 1) => all_cols(),
            (Opcode::Filter | Opcode::MutateCustom, 2) => {
                let dtype = dtypes[earlier(1)?];
                config
                    .filter_op
                    .iter()
                    .filter(|op| op.accepts(dtype))
                    .map(|&op| Arg::Cmp(op))
                    .collect()
            }
            (Opcode::Filter | Opcode::MutateCustom, 3) => constants_for(dtypes[earlier(1)?]),

            (Opcode::Separate, 1) => input
                .columns_of(DType::String)
                .into_iter()
                .filter(|&c| {
                    input
                        .column(c)
                        .all(|v| v.as_str().is_some_and(|s| s.contains(SEPARATORS)))
                })
                .map(Arg::Col)
                .collect(),

            (Opcode::Spread, 1) => all_cols(),
            (Opcode::Spread, 2) => {
                let key = earlier(1)?;
                (0..width).filter(|&c| c != key).map(Arg::Col).collect()
            }

            (Opcode::Gather, 1) => {
                let max = config.gather_max_val_list_size.min(width);
                (1..=max)
                    .flat_map(|k| combinations(width, k))
                    .filter(|cols| same_dtype(dtypes, cols))
                    .map(Arg::Cols)
                    .collect()
            }
            (Opcode::GatherNeg, 1) => {
                let max = config.gather_max_key_list_size.min(width.saturating_sub(1));
                (1..=max)
                    .flat_map(|k| combinations(width, k))
                    .filter(|ids| {
                        let melted: Vec<usize> = (0..width).filter(|c| !ids.contains(c)).collect();
                        same_dtype(dtypes, &melted)
                    })
                    .map(Arg::Cols)
                    .collect()
            }

            (Opcode::GroupSummary, 1) => (1..=width)
                .flat_map(|k| combinations(width, k))
                .map(Arg::Cols)
                .collect(),
            (Opcode::GroupSummary, 2) => {
                let group = match self.arg(1) {
                    Some(Arg::Cols(cols)) => cols.clone(),
                    _ => {
                        return Err(EvalError::Hole {
                            op: self.opcode,
                            index: 1,
                        })
                    }
                };
                let mut out: Vec<Arg> = input
                    .columns_of(DType::Number)
                    .into_iter()
                    .filter(|c| !group.contains(c))
                    .map(Arg::Col)
                    .collect();
                if config.aggr_func.contains(&AggrFunc::Count) {
                    out.push(Arg::CountRows);
                }
                out
            }
            (Opcode::GroupSummary, 3) => match self.arg(2) {
                Some(Arg::CountRows) => vec![Arg::Aggr(AggrFunc::Count)],
                Some(Arg::Col(_)) => config
                    .aggr_func
                    .iter()
                    .filter(|&&f| f != AggrFunc::Count)
                    .map(|&f| Arg::Aggr(f))
                    .collect(),
                _ => {
                    return Err(EvalError::Hole {
                        op: self.opcode,
                        index: 2,
                    })
                }
            },

            (Opcode::CumSum, 1) => input.columns_of(DType::Number).into_iter().map(Arg::Col).collect(),

            (Opcode::Mutate, 1) => input.columns_of(DType::Number).into_iter().map(Arg::Col).collect(),
            (Opcode::Mutate, 2) => config.mutate_op.iter().map(|&op| Arg::Arith(op)).collect(),
            (Opcode::Mutate, 3) => {
                let c1 = earlier(1)?;
                let op = match self.arg(2) {
                    Some(Arg::Arith(op)) => *op,
                    _ => {
                        return Err(EvalError::Hole {
                            op: self.opcode,
                            index: 2,
                        })
                    }
                };
                input
                    .columns_of(DType::Number)
                    .into_iter()
                    .filter(|&c2| match op {
                        // commutative: only try each pair once
                        ArithOp::Add => c2 > c1,
                        ArithOp::Sub => c2 != c1,
                    })
                    .map(Arg::Col)
                    .collect()
            }

            (op, index) => {
                return Err(EvalError::BadArgument { op, index });
            }
        };
        Ok(domain)
    }
}

fn same_dtype(dtypes: &[DType], cols: &[usize]) -> bool {
    match cols.split_first() {
        None => false,
        Some((&first, rest)) => rest.iter().all(|&c| dtypes[c] == dtypes[first]),
    }
}
