//! Concrete semantics of the DSL.

use thiserror::Error;

use super::{AggrFunc, Arg, ArithOp, CmpOp, Node, OpNode, Opcode};
use crate::table::Table;
use crate::util::{HashMap, IndexMap, NameGen};
use crate::value::{DType, Value};

/// Characters `separate` splits on.
pub const SEPARATORS: [char; 3] = ['-', '_', ' '];
/// The separator `unite` joins with.
pub const UNITE_SEPARATOR: &str = "_";

/// Why a program could not be evaluated. These are local conditions: the
/// search treats the offending candidate as producing nothing and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("{op} is not applicable: {reason}")]
    Inapplicable { op: Opcode, reason: String },
    #[error("argument {index} of {op} is still a hole")]
    Hole { op: Opcode, index: usize },
    #[error("argument {index} of {op} has the wrong kind")]
    BadArgument { op: Opcode, index: usize },
    #[error("column {col} is out of range for {op} over {width} columns")]
    ColumnOutOfRange { op: Opcode, col: usize, width: usize },
    #[error("the program reads input {0}, but only {1} inputs were given")]
    MissingInput(usize, usize),
}

impl Node {
    /// Evaluates a concrete program against `inputs`.
    pub fn eval(&self, inputs: &[Table]) -> Result<Table, EvalError> {
        match self {
            Node::Table(i) => inputs
                .get(*i)
                .cloned()
                .ok_or(EvalError::MissingInput(*i, inputs.len())),
            Node::Op(node) => {
                let input = node.child.eval(inputs)?;
                node.apply(&input)
            }
        }
    }
}

impl OpNode {
    /// Applies this operator to an already evaluated input table. The
    /// subtree in `child` is not consulted.
    pub fn apply(&self, input: &Table) -> Result<Table, EvalError> {
        let mut names = NameGen::with_reserved(input.columns().iter().map(String::as_str));
        let width = input.num_columns();
        match self.opcode {
            Opcode::Select => {
                let cols = self.cols(1, width)?;
                if cols.is_empty() {
                    return Err(self.inapplicable("no columns selected"));
                }
                Ok(input.project(cols))
            }
            Opcode::Unite => {
                let (c1, c2) = (self.col(1, width)?, self.col(2, width)?);
                let sep = match self.value(3)? {
                    Value::Str(sep) => sep.clone(),
                    _ => return Err(self.bad_argument(3)),
                };
                self.unite(input, c1, c2, &sep, &mut names)
            }
            Opcode::Filter => {
                let (col, op, constant) = (self.col(1, width)?, self.cmp(2)?, self.value(3)?);
                self.filter(input, col, op, constant)
            }
            Opcode::Separate => {
                let col = self.col(1, width)?;
                self.separate(input, col, &mut names)
            }
            Opcode::Spread => {
                let (key, val) = (self.col(1, width)?, self.col(2, width)?);
                self.spread(input, key, val)
            }
            Opcode::Gather => {
                let value_cols = self.cols(1, width)?.to_vec();
                self.gather(input, &value_cols, &mut names)
            }
            Opcode::GatherNeg => {
                let id_cols = self.cols(1, width)?;
                let value_cols: Vec<usize> = (0..width).filter(|c| !id_cols.contains(c)).collect();
                self.gather(input, &value_cols, &mut names)
            }
            Opcode::GroupSummary => {
                let group_cols = self.cols(1, width)?.to_vec();
                let target = match self.required(2)? {
                    Arg::CountRows => None,
                    Arg::Col(c) if *c < width => Some(*c),
                    Arg::Col(c) => return Err(self.out_of_range(*c, width)),
                    _ => return Err(self.bad_argument(2)),
                };
                let func = self.aggr(3)?;
                self.group_summary(input, &group_cols, target, func, &mut names)
            }
            Opcode::CumSum => {
                let col = self.col(1, width)?;
                self.cumsum(input, col, &mut names)
            }
            Opcode::Mutate => {
                let (c1, op, c2) = (self.col(1, width)?, self.arith(2)?, self.col(3, width)?);
                self.mutate(input, c1, op, c2, &mut names)
            }
            Opcode::MutateCustom => {
                let (col, op, constant) = (self.col(1, width)?, self.cmp(2)?, self.value(3)?);
                self.mutate_custom(input, col, op, constant, &mut names)
            }
        }
    }

    fn inapplicable(&self, reason: impl Into<String>) -> EvalError {
        EvalError::Inapplicable {
            op: self.opcode,
            reason: reason.into(),
        }
    }

    fn bad_argument(&self, index: usize) -> EvalError {
        EvalError::BadArgument {
            op: self.opcode,
            index,
        }
    }

    fn out_of_range(&self, col: usize, width: usize) -> EvalError {
        EvalError::ColumnOutOfRange {
            op: self.opcode,
            col,
            width,
        }
    }

    fn required(&self, index: usize) -> Result<&Arg, EvalError> {
        match self.arg(index) {
            None => Err(self.bad_argument(index)),
            Some(Arg::Hole) => Err(EvalError::Hole {
                op: self.opcode,
                index,
            }),
            Some(arg) => Ok(arg),
        }
    }

    fn col(&self, index: usize, width: usize) -> Result<usize, EvalError> {
        match self.required(index)? {
            Arg::Col(c) if *c < width => Ok(*c),
            Arg::Col(c) => Err(self.out_of_range(*c, width)),
            _ => Err(self.bad_argument(index)),
        }
    }

    fn cols(&self, index: usize, width: usize) -> Result<&[usize], EvalError> {
        match self.required(index)? {
            Arg::Cols(cols) => {
                if let Some(&c) = cols.iter().find(|&&c| c >= width) {
                    return Err(self.out_of_range(c, width));
                }
                if (1..cols.len()).any(|i| cols[..i].contains(&cols[i])) {
                    return Err(self.inapplicable("a column is listed twice"));
                }
                Ok(cols)
            }
            _ => Err(self.bad_argument(index)),
        }
    }

    fn cmp(&self, index: usize) -> Result<CmpOp, EvalError> {
        match self.required(index)? {
            Arg::Cmp(op) => Ok(*op),
            _ => Err(self.bad_argument(index)),
        }
    }

    fn arith(&self, index: usize) -> Result<ArithOp, EvalError> {
        match self.required(index)? {
            Arg::Arith(op) => Ok(*op),
            _ => Err(self.bad_argument(index)),
        }
    }

    fn aggr(&self, index: usize) -> Result<AggrFunc, EvalError> {
        match self.required(index)? {
            Arg::Aggr(func) => Ok(*func),
            _ => Err(self.bad_argument(index)),
        }
    }

    fn value(&self, index: usize) -> Result<&Value, EvalError> {
        match self.required(index)? {
            Arg::Const(value) => Ok(value),
            _ => Err(self.bad_argument(index)),
        }
    }

    fn numeric(&self, input: &Table, col: usize) -> Result<(), EvalError> {
        if input.dtypes()[col] == DType::Number {
            Ok(())
        } else {
            Err(self.inapplicable(format!("column {:?} is not numeric", input.columns()[col])))
        }
    }

    fn unite(
        &self,
        input: &Table,
        c1: usize,
        c2: usize,
        sep: &str,
        names: &mut NameGen,
    ) -> Result<Table, EvalError> {
        if c1 == c2 {
            return Err(self.inapplicable("cannot unite a column with itself"));
        }
        let name = names.claim(&format!(
            "{}{sep}{}",
            input.columns()[c1],
            input.columns()[c2]
        ));
        let mut columns = vec![];
        let mut dtypes = vec![];
        for c in 0..input.num_columns() {
            if c == c1 {
                columns.push(name.clone());
                dtypes.push(DType::String);
            } else if c != c2 {
                columns.push(input.columns()[c].clone());
                dtypes.push(input.dtypes()[c]);
            }
        }
        let rows = input
            .rows()
            .iter()
            .map(|row| {
                let mut out = Vec::with_capacity(columns.len());
                for (c, value) in row.iter().enumerate() {
                    if c == c1 {
                        out.push(Value::Str(format!("{}{sep}{}", row[c1], row[c2])));
                    } else if c != c2 {
                        out.push(value.clone());
                    }
                }
                out
            })
            .collect();
        Ok(Table::from_parts(columns, dtypes, rows))
    }

    fn filter(&self, input: &Table, col: usize, op: CmpOp, constant: &Value) -> Result<Table, EvalError> {
        let dtype = input.dtypes()[col];
        if !op.accepts(dtype) || constant.dtype() != dtype {
            return Err(self.inapplicable(format!(
                "cannot compare {dtype} column with {} using {}",
                constant.to_literal(),
                op.symbol()
            )));
        }
        let mut rows = vec![];
        for row in input.rows() {
            if op.holds(&row[col], constant) == Some(true) {
                rows.push(row.clone());
            }
        }
        Ok(Table::from_parts(
            input.columns().to_vec(),
            input.dtypes().to_vec(),
            rows,
        ))
    }

    fn separate(&self, input: &Table, col: usize, names: &mut NameGen) -> Result<Table, EvalError> {
        if input.dtypes()[col] != DType::String {
            return Err(self.inapplicable("only string columns can be separated"));
        }
        let mut lefts = Vec::with_capacity(input.num_rows());
        let mut rights = Vec::with_capacity(input.num_rows());
        for value in input.column(col) {
            let text = value.as_str().unwrap_or_default();
            let Some((left, right)) = text.split_once(|c: char| SEPARATORS.contains(&c)) else {
                return Err(self.inapplicable(format!("{text:?} has no separator")));
            };
            lefts.push(left);
            rights.push(right);
        }
        let (left_type, lefts) = Value::parse_fragments(&lefts);
        let (right_type, rights) = Value::parse_fragments(&rights);
        let name = &input.columns()[col];
        let (left_name, right_name) = (names.claim(&format!("{name}1")), names.claim(&format!("{name}2")));

        let mut columns = vec![];
        let mut dtypes = vec![];
        for c in 0..input.num_columns() {
            if c == col {
                columns.extend([left_name.clone(), right_name.clone()]);
                dtypes.extend([left_type, right_type]);
            } else {
                columns.push(input.columns()[c].clone());
                dtypes.push(input.dtypes()[c]);
            }
        }
        let rows = input
            .rows()
            .iter()
            .enumerate()
            .map(|(r, row)| {
                let mut out = Vec::with_capacity(columns.len());
                for (c, value) in row.iter().enumerate() {
                    if c == col {
                        out.push(lefts[r].clone());
                        out.push(rights[r].clone());
                    } else {
                        out.push(value.clone());
                    }
                }
                out
            })
            .collect();
        Ok(Table::from_parts(columns, dtypes, rows))
    }

    fn spread(&self, input: &Table, key: usize, val: usize) -> Result<Table, EvalError> {
        if key == val {
            return Err(self.inapplicable("key and value must be different columns"));
        }
        let index: Vec<usize> = (0..input.num_columns())
            .filter(|&c| c != key && c != val)
            .collect();
        // the key and value columns disappear, so their names are free again
        let mut names = NameGen::with_reserved(index.iter().map(|&c| input.columns()[c].as_str()));

        // index tuple -> (original values, cells by key position)
        let mut groups: IndexMap<Vec<Value>, (Vec<Value>, HashMap<usize, Value>)> = IndexMap::default();
        let mut keys: IndexMap<Value, Value> = IndexMap::default();
        for row in input.rows() {
            let entry = keys.entry(row[key].key());
            let key_pos = entry.index();
            entry.or_insert_with(|| row[key].clone());
            let group = groups
                .entry(index.iter().map(|&c| row[c].key()).collect())
                .or_insert_with(|| (index.iter().map(|&c| row[c].clone()).collect(), HashMap::default()));
            if group.1.insert(key_pos, row[val].clone()).is_some() {
                return Err(self.inapplicable(format!("{} appears twice in one group", row[key])));
            }
        }
        if keys.is_empty() {
            return Err(self.inapplicable("nothing to spread"));
        }

        let mut columns: Vec<String> = index.iter().map(|&c| input.columns()[c].clone()).collect();
        let mut dtypes: Vec<DType> = index.iter().map(|&c| input.dtypes()[c]).collect();
        for key_value in keys.values() {
            columns.push(names.claim(&key_value.to_string()));
            dtypes.push(input.dtypes()[val]);
        }
        let mut rows = Vec::with_capacity(groups.len());
        for (ids, cells) in groups.into_values() {
            let mut row = ids;
            for k in 0..keys.len() {
                let Some(cell) = cells.get(&k) else {
                    return Err(self.inapplicable("the spread table would have missing cells"));
                };
                row.push(cell.clone());
            }
            rows.push(row);
        }
        Ok(Table::from_parts(columns, dtypes, rows))
    }

    fn gather(&self, input: &Table, value_cols: &[usize], names: &mut NameGen) -> Result<Table, EvalError> {
        let Some(&first) = value_cols.first() else {
            return Err(self.inapplicable("no columns to gather"));
        };
        let value_type = input.dtypes()[first];
        if value_cols.iter().any(|&c| input.dtypes()[c] != value_type) {
            return Err(self.inapplicable("gathered columns have different types"));
        }
        let ids: Vec<usize> = (0..input.num_columns())
            .filter(|c| !value_cols.contains(c))
            .collect();

        let mut columns: Vec<String> = ids.iter().map(|&c| input.columns()[c].clone()).collect();
        let mut dtypes: Vec<DType> = ids.iter().map(|&c| input.dtypes()[c]).collect();
        columns.extend([names.claim("KEY"), names.claim("VALUE")]);
        dtypes.extend([DType::String, value_type]);

        let mut rows = Vec::with_capacity(input.num_rows() * value_cols.len());
        for &vc in value_cols {
            let key = Value::Str(input.columns()[vc].clone());
            for row in input.rows() {
                let mut out: Vec<Value> = ids.iter().map(|&c| row[c].clone()).collect();
                out.push(key.clone());
                out.push(row[vc].clone());
                rows.push(out);
            }
        }
        Ok(Table::from_parts(columns, dtypes, rows))
    }

    fn group_summary(
        &self,
        input: &Table,
        group_cols: &[usize],
        target: Option<usize>,
        func: AggrFunc,
        names: &mut NameGen,
    ) -> Result<Table, EvalError> {
        if group_cols.is_empty() {
            return Err(self.inapplicable("no grouping columns"));
        }
        let name = match (target, func) {
            (None, AggrFunc::Count) => names.claim("count"),
            (None, _) => return Err(self.inapplicable("only count can aggregate over rows")),
            (Some(c), _) if group_cols.contains(&c) => {
                return Err(self.inapplicable("cannot aggregate a grouping column"))
            }
            (Some(c), _) => {
                self.numeric(input, c)?;
                names.claim(&format!("{}_{}", func.name(), input.columns()[c]))
            }
        };

        let mut groups: IndexMap<Vec<Value>, (Vec<Value>, Vec<f64>)> = IndexMap::default();
        for row in input.rows() {
            let group = groups
                .entry(group_cols.iter().map(|&c| row[c].key()).collect())
                .or_insert_with(|| (group_cols.iter().map(|&c| row[c].clone()).collect(), vec![]));
            group.1.push(target.and_then(|c| row[c].as_num()).unwrap_or(1.0));
        }

        let mut columns: Vec<String> = group_cols.iter().map(|&c| input.columns()[c].clone()).collect();
        let mut dtypes: Vec<DType> = group_cols.iter().map(|&c| input.dtypes()[c]).collect();
        columns.push(name);
        dtypes.push(DType::Number);
        let rows = groups
            .into_values()
            .map(|(mut row, values)| {
                let sum: f64 = values.iter().sum();
                let aggregate = match func {
                    AggrFunc::Count => values.len() as f64,
                    AggrFunc::Sum => sum,
                    AggrFunc::Mean => sum / values.len() as f64,
                };
                row.push(Value::from(aggregate));
                row
            })
            .collect();
        Ok(Table::from_parts(columns, dtypes, rows))
    }

    fn cumsum(&self, input: &Table, col: usize, names: &mut NameGen) -> Result<Table, EvalError> {
        self.numeric(input, col)?;
        let mut total = 0.0;
        let running = input
            .column(col)
            .map(|v| {
                total += v.as_num().unwrap_or_default();
                Value::from(total)
            })
            .collect();
        Ok(append(input, names.claim("cumsum"), DType::Number, running))
    }

    fn mutate(
        &self,
        input: &Table,
        c1: usize,
        op: ArithOp,
        c2: usize,
        names: &mut NameGen,
    ) -> Result<Table, EvalError> {
        if c1 == c2 {
            return Err(self.inapplicable("mutate needs two different columns"));
        }
        self.numeric(input, c1)?;
        self.numeric(input, c2)?;
        let values = input
            .rows()
            .iter()
            .map(|row| {
                let (a, b) = (row[c1].as_num().unwrap_or_default(), row[c2].as_num().unwrap_or_default());
                Value::from(op.apply(a, b))
            })
            .collect();
        let name = names.claim(&format!(
            "{}{}{}",
            input.columns()[c1],
            op.symbol(),
            input.columns()[c2]
        ));
        Ok(append(input, name, DType::Number, values))
    }

    fn mutate_custom(
        &self,
        input: &Table,
        col: usize,
        op: CmpOp,
        constant: &Value,
        names: &mut NameGen,
    ) -> Result<Table, EvalError> {
        let dtype = input.dtypes()[col];
        if !op.accepts(dtype) || constant.dtype() != dtype {
            return Err(self.inapplicable(format!(
                "cannot compare {dtype} column with {} using {}",
                constant.to_literal(),
                op.symbol()
            )));
        }
        let values = input
            .column(col)
            .map(|v| Value::Bool(op.holds(v, constant) == Some(true)))
            .collect();
        let name = names.claim(&format!("{}{}{}", input.columns()[col], op.symbol(), constant));
        Ok(append(input, name, DType::Boolean, values))
    }
}

fn append(input: &Table, name: String, dtype: DType, values: Vec<Value>) -> Table {
    let mut columns = input.columns().to_vec();
    let mut dtypes = input.dtypes().to_vec();
    columns.push(name);
    dtypes.push(dtype);
    let rows = input
        .rows()
        .iter()
        .zip(values)
        .map(|(row, value)| {
            let mut row = row.clone();
            row.push(value);
            row
        })
        .collect();
    Table::from_parts(columns, dtypes, rows)
}
