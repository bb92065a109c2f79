//! The table value model shared by concrete evaluation, domain inference,
//! and table inclusion.

use std::fmt::{self, Display, Formatter};

use thiserror::Error;

use crate::util::{HashSet, IndexMap};
use crate::value::{DType, Value};

#[derive(Debug, Error)]
pub enum TableError {
    #[error("duplicate column name {0:?}")]
    DuplicateColumn(String),
    #[error("row {row} has {found} cells but the schema has {expected} columns")]
    RowArity {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("row {row} is missing column {column:?}")]
    MissingColumn { row: usize, column: String },
    #[error("row {row} has column {column:?}, which is not in the schema")]
    ExtraColumn { row: usize, column: String },
    #[error("unsupported value {value} in column {column:?}")]
    UnsupportedValue { column: String, value: String },
    #[error("expected a list of records, found {0}")]
    NotRecords(String),
}

/// A table: an ordered schema, one dtype per column, and rows.
///
/// Every row holds exactly one cell per column, and every cell has the dtype
/// of its column. Both are checked by the public constructors; operators
/// produce tables through [`Table::from_parts`], which only re-checks them in
/// debug builds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Table {
    columns: Vec<String>,
    dtypes: Vec<DType>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Builds a table and infers its column types. A column whose cells are
    /// of mixed kinds is turned into a string column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, TableError> {
        {
            let mut seen = HashSet::default();
            for column in &columns {
                if !seen.insert(column.as_str()) {
                    return Err(TableError::DuplicateColumn(column.clone()));
                }
            }
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(TableError::RowArity {
                    row: i,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }

        let mut rows = rows;
        let dtypes = (0..columns.len())
            .map(|c| {
                let mut kinds = rows.iter().map(|row| row[c].dtype());
                let first = kinds.next().unwrap_or(DType::String);
                if kinds.all(|kind| kind == first) {
                    first
                } else {
                    for row in rows.iter_mut() {
                        if !matches!(row[c], Value::Str(_)) {
                            row[c] = Value::Str(row[c].to_string());
                        }
                    }
                    DType::String
                }
            })
            .collect();

        Ok(Self {
            columns,
            dtypes,
            rows,
        })
    }

    pub(crate) fn from_parts(columns: Vec<String>, dtypes: Vec<DType>, rows: Vec<Vec<Value>>) -> Self {
        debug_assert_eq!(columns.len(), dtypes.len());
        debug_assert!(rows.iter().all(|row| row.len() == columns.len()));
        debug_assert!(rows
            .iter()
            .all(|row| row.iter().zip(&dtypes).all(|(v, t)| v.dtype() == *t)));
        Self {
            columns,
            dtypes,
            rows,
        }
    }

    /// Builds a table from records keyed by column name. The schema is the
    /// key order of the first record; every other record must have the same
    /// keys.
    pub fn from_records(records: &[IndexMap<String, Value>]) -> Result<Self, TableError> {
        let columns: Vec<String> = match records.first() {
            Some(first) => first.keys().cloned().collect(),
            None => vec![],
        };
        let mut rows = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if let Some(extra) = record.keys().find(|k| !columns.contains(k)) {
                return Err(TableError::ExtraColumn {
                    row: i,
                    column: extra.clone(),
                });
            }
            let row = columns
                .iter()
                .map(|column| {
                    record
                        .get(column)
                        .cloned()
                        .ok_or_else(|| TableError::MissingColumn {
                            row: i,
                            column: column.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(row);
        }
        Self::new(columns, rows)
    }

    /// Reads a JSON list of flat records.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, TableError> {
        let serde_json::Value::Array(items) = json else {
            return Err(TableError::NotRecords(json.to_string()));
        };
        let mut records = Vec::with_capacity(items.len());
        for item in items {
            let serde_json::Value::Object(fields) = item else {
                return Err(TableError::NotRecords(item.to_string()));
            };
            let mut record = IndexMap::default();
            for (column, value) in fields {
                let value = match value {
                    serde_json::Value::String(s) => Value::Str(s.clone()),
                    serde_json::Value::Bool(b) => Value::Bool(*b),
                    serde_json::Value::Number(n) => match n.as_f64() {
                        Some(n) => Value::from(n),
                        None => {
                            return Err(TableError::UnsupportedValue {
                                column: column.clone(),
                                value: n.to_string(),
                            })
                        }
                    },
                    other => {
                        return Err(TableError::UnsupportedValue {
                            column: column.clone(),
                            value: other.to_string(),
                        })
                    }
                };
                record.insert(column.clone(), value);
            }
            records.push(record);
        }
        Self::from_records(&records)
    }

    pub fn to_json(&self) -> serde_json::Value {
        let records = self
            .records()
            .into_iter()
            .map(|record| {
                let fields = record
                    .into_iter()
                    .map(|(column, value)| {
                        let value = match value {
                            Value::Str(s) => serde_json::Value::String(s),
                            Value::Bool(b) => serde_json::Value::Bool(b),
                            Value::Num(n) => serde_json::Number::from_f64(n.0)
                                .map_or(serde_json::Value::Null, serde_json::Value::Number),
                        };
                        (column, value)
                    })
                    .collect();
                serde_json::Value::Object(fields)
            })
            .collect();
        serde_json::Value::Array(records)
    }

    pub fn records(&self) -> Vec<IndexMap<String, Value>> {
        self.rows
            .iter()
            .map(|row| self.columns.iter().cloned().zip(row.iter().cloned()).collect())
            .collect()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn dtypes(&self) -> &[DType] {
        &self.dtypes
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |row| &row[index])
    }

    /// Every cell, row by row.
    pub fn cells(&self) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().flatten()
    }

    /// Columns of the given dtype, in schema order.
    pub fn columns_of(&self, dtype: DType) -> Vec<usize> {
        (0..self.num_columns())
            .filter(|&c| self.dtypes[c] == dtype)
            .collect()
    }

    /// Keeps `cols`, in the order given.
    pub fn project(&self, cols: &[usize]) -> Table {
        let columns = cols.iter().map(|&c| self.columns[c].clone()).collect();
        let dtypes = cols.iter().map(|&c| self.dtypes[c]).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| cols.iter().map(|&c| row[c].clone()).collect())
            .collect();
        Self::from_parts(columns, dtypes, rows)
    }

    /// Removes `cols`, keeping the remaining columns in order.
    pub fn drop_columns(&self, cols: &[usize]) -> Table {
        let keep: Vec<usize> = (0..self.num_columns())
            .filter(|c| !cols.contains(c))
            .collect();
        self.project(&keep)
    }

    /// Removes repeated rows, keeping first occurrences in order.
    pub fn dedup(&self) -> Table {
        let mut seen = HashSet::default();
        let rows = self
            .rows
            .iter()
            .filter(|row| seen.insert(row.iter().map(Value::key).collect::<Vec<_>>()))
            .cloned()
            .collect();
        Self::from_parts(self.columns.clone(), self.dtypes.clone(), rows)
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let rendered: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(|v| v.to_string()).collect())
            .collect();
        let widths: Vec<usize> = (0..self.num_columns())
            .map(|c| {
                rendered
                    .iter()
                    .map(|row| row[c].len())
                    .chain([self.columns[c].len()])
                    .max()
                    .unwrap_or(0)
            })
            .collect();
        write_line(f, &self.columns, &widths)?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        write_line(f, &rule, &widths)?;
        for row in &rendered {
            write_line(f, row, &widths)?;
        }
        Ok(())
    }
}

fn write_line(f: &mut Formatter<'_>, cells: &[String], widths: &[usize]) -> fmt::Result {
    let mut first = true;
    for (cell, width) in cells.iter().zip(widths) {
        if !first {
            f.write_str(" | ")?;
        }
        write!(f, "{cell:width$}", width = *width)?;
        first = false;
    }
    writeln!(f)
}

/// Builds a table from a literal list of column names and rows; used by
/// tests and benchmarks.
#[macro_export]
macro_rules! table {
    ([$($col:expr),* $(,)?] $(, [$($cell:expr),* $(,)?])* $(,)?) => {
        $crate::Table::new(
            vec![$(String::from($col)),*],
            vec![$(vec![$($crate::Value::from($cell)),*]),*],
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_must_match_the_schema() {
        let err = Table::new(
            vec!["a".into(), "b".into()],
            vec![vec![Value::from(1), Value::from(2)], vec![Value::from(3)]],
        )
        .unwrap_err();
        assert!(matches!(err, TableError::RowArity { row: 1, .. }));

        let err = Table::new(vec!["a".into(), "a".into()], vec![]).unwrap_err();
        assert!(matches!(err, TableError::DuplicateColumn(_)));
    }

    #[test]
    fn dtypes_are_inferred_and_mixed_columns_become_strings() {
        let t = table!(["n", "s", "b", "m"], [1, "x", true, 1], [2, "y", false, "z"]).unwrap();
        assert_eq!(
            t.dtypes(),
            &[DType::Number, DType::String, DType::Boolean, DType::String]
        );
        assert_eq!(t.rows()[0][3], Value::from("1"));
    }

    #[test]
    fn json_records_keep_key_order() {
        let json = serde_json::json!([
            {"Bucket": "A", "Budgeted": 100, "Actual": 115},
            {"Bucket": "B", "Budgeted": 90, "Actual": 80},
        ]);
        let t = Table::from_json(&json).unwrap();
        assert_eq!(t.columns(), &["Bucket", "Budgeted", "Actual"]);
        assert_eq!(t.num_rows(), 2);
        assert_eq!(t.to_json()[1]["Actual"], serde_json::json!(80.0));

        let bad = serde_json::json!([{"a": 1}, {"b": 2}]);
        assert!(matches!(
            Table::from_json(&bad),
            Err(TableError::ExtraColumn { row: 1, .. })
        ));
        let null = serde_json::json!([{"a": null}]);
        assert!(matches!(
            Table::from_json(&null),
            Err(TableError::UnsupportedValue { .. })
        ));
    }

    #[test]
    fn dedup_and_projection() {
        let t = table!(["a", "b"], ["x", 1], ["x", 2], ["y", 1]).unwrap();
        let a = t.project(&[0]).dedup();
        assert_eq!(a, table!(["a"], ["x"], ["y"]).unwrap());
        let b = t.drop_columns(&[0]);
        assert_eq!(b.columns(), &["b"]);
        assert_eq!(b.num_rows(), 3);
    }
}
