//! Table inclusion and schema alignment.
//!
//! `required` is included in `actual` when there is an injective mapping from
//! the columns of `required` to the columns of `actual` under which every row
//! of `required` appears in `actual` at least as many times. Column names are
//! never consulted; only contents matter.

use crate::table::Table;
use crate::util::HashMap;
use crate::value::Value;

type Counts = HashMap<Value, usize>;

fn column_counts(table: &Table, col: usize) -> Counts {
    let mut counts = Counts::default();
    for value in table.column(col) {
        *counts.entry(value.key()).or_default() += 1;
    }
    counts
}

/// Whether a column with multiplicities `required` may be mapped onto a
/// column with multiplicities `actual`.
fn column_compatible(required: &Counts, actual: &Counts, equivalence: bool) -> bool {
    if equivalence && required.len() != actual.len() {
        return false;
    }
    required.iter().all(|(value, &count)| {
        let have = actual.get(value).copied().unwrap_or(0);
        if equivalence {
            have == count
        } else {
            have >= count
        }
    })
}

fn rows_dominated(required: &Table, actual: &Table, mapping: &[usize], equivalence: bool) -> bool {
    let mut counts: HashMap<Vec<Value>, isize> = HashMap::default();
    for row in actual.rows() {
        let key = mapping.iter().map(|&c| row[c].key()).collect();
        *counts.entry(key).or_default() += 1;
    }
    for row in required.rows() {
        let key: Vec<Value> = row.iter().map(Value::key).collect();
        match counts.get_mut(&key) {
            Some(count) if *count > 0 => *count -= 1,
            _ => return false,
        }
    }
    !equivalence || counts.values().all(|&c| c == 0)
}

/// Searches for a column mapping under which `required` is included in
/// `actual` (or, with `equivalence`, has exactly the same rows). On success
/// returns the mapping: column `i` of `required` corresponds to column
/// `mapping[i]` of `actual`. Mappings are tried in lexicographic order, so the
/// result is deterministic.
pub fn align(required: &Table, actual: &Table, equivalence: bool) -> Option<Vec<usize>> {
    if required.num_columns() > actual.num_columns() || required.num_rows() > actual.num_rows() {
        return None;
    }
    if equivalence
        && (required.num_columns() != actual.num_columns()
            || required.num_rows() != actual.num_rows())
    {
        return None;
    }

    let actual_counts: Vec<Counts> = (0..actual.num_columns())
        .map(|c| column_counts(actual, c))
        .collect();
    let mut candidates = Vec::with_capacity(required.num_columns());
    for col in 0..required.num_columns() {
        let counts = column_counts(required, col);
        let options: Vec<usize> = actual_counts
            .iter()
            .enumerate()
            .filter(|(_, other)| column_compatible(&counts, other, equivalence))
            .map(|(c, _)| c)
            .collect();
        if options.is_empty() {
            log::trace!(
                "column {:?} has no counterpart among {:?}",
                required.columns()[col],
                actual.columns()
            );
            return None;
        }
        candidates.push(options);
    }

    let mut mapping = Vec::with_capacity(candidates.len());
    let mut used = vec![false; actual.num_columns()];
    search(required, actual, &candidates, equivalence, &mut mapping, &mut used).then_some(mapping)
}

fn search(
    required: &Table,
    actual: &Table,
    candidates: &[Vec<usize>],
    equivalence: bool,
    mapping: &mut Vec<usize>,
    used: &mut [bool],
) -> bool {
    let Some(options) = candidates.get(mapping.len()) else {
        return rows_dominated(required, actual, mapping, equivalence);
    };
    for &c in options {
        if used[c] {
            continue;
        }
        used[c] = true;
        mapping.push(c);
        if search(required, actual, candidates, equivalence, mapping, used) {
            return true;
        }
        mapping.pop();
        used[c] = false;
    }
    false
}

/// Multiset inclusion of `required`'s rows in `actual`'s rows under some
/// column mapping.
pub fn table_inclusion(required: &Table, actual: &Table) -> bool {
    align(required, actual, false).is_some()
}

/// Identical row multisets under some column bijection.
pub fn table_equivalence(a: &Table, b: &Table) -> bool {
    align(a, b, true).is_some()
}
