use std::fmt::{self, Display, Formatter};

pub(crate) type BuildHasher = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;
pub(crate) type HashMap<K, V> = hashbrown::HashMap<K, V, BuildHasher>;
pub(crate) type HashSet<K> = hashbrown::HashSet<K, BuildHasher>;
pub type IndexMap<K, V> = indexmap::IndexMap<K, V, BuildHasher>;
pub type IndexSet<K> = indexmap::IndexSet<K, BuildHasher>;

/// Hands out names that do not collide with any name it has already seen.
///
/// This is the naming arena used when evaluation has to invent column names
/// (`KEY`, `VALUE`, the halves of a separated column, ...) and when a program
/// is printed as a sequence of assignments. Every table evaluation and every
/// rendering owns its own arena, so concurrent search branches never share
/// naming state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameGen {
    count: usize,
    used: HashSet<String>,
}

impl NameGen {
    pub fn new() -> Self {
        Self::default()
    }

    /// An arena that already considers `names` taken.
    pub fn with_reserved<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut gen = Self::new();
        for name in names {
            gen.reserve(name);
        }
        gen
    }

    pub fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_owned());
    }

    /// Always returns `hint` followed by a counter, e.g. `t0`, `t1`.
    pub fn fresh(&mut self, hint: &str) -> String {
        loop {
            let name = format!("{hint}{}", self.count);
            self.count += 1;
            if self.used.insert(name.clone()) {
                return name;
            }
        }
    }

    /// Returns `hint` itself when it is still free, otherwise a suffixed
    /// variant from [`NameGen::fresh`].
    pub fn claim(&mut self, hint: &str) -> String {
        if self.used.insert(hint.to_owned()) {
            hint.to_owned()
        } else {
            self.fresh(hint)
        }
    }
}

pub(crate) struct ListDisplay<'a, TS>(pub TS, pub &'a str);

impl<'a, TS> Display for ListDisplay<'a, TS>
where
    TS: Clone + IntoIterator,
    TS::Item: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut did_something = false;
        for item in self.0.clone().into_iter() {
            if did_something {
                f.write_str(self.1)?;
            }
            Display::fmt(&item, f)?;
            did_something = true;
        }
        Ok(())
    }
}

/// All `k`-element combinations of `0..n`, in lexicographic order.
pub(crate) fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    let mut out = vec![];
    if k > n {
        return out;
    }
    let mut current: Vec<usize> = (0..k).collect();
    loop {
        out.push(current.clone());
        // find the rightmost index that can still be bumped
        let Some(i) = (0..k).rev().find(|&i| current[i] != i + n - k) else {
            return out;
        };
        current[i] += 1;
        for j in i + 1..k {
            current[j] = current[j - 1] + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_prefers_the_hint() {
        let mut gen = NameGen::with_reserved(["KEY", "x"]);
        assert_eq!(gen.claim("VALUE"), "VALUE");
        assert_eq!(gen.claim("KEY"), "KEY0");
        assert_eq!(gen.claim("KEY"), "KEY1");
        assert_eq!(gen.claim("VALUE"), "VALUE2");
    }

    #[test]
    fn fresh_skips_taken_names() {
        let mut gen = NameGen::with_reserved(["t0"]);
        assert_eq!(gen.fresh("t"), "t1");
        assert_eq!(gen.fresh("t"), "t2");
    }

    #[test]
    fn combinations_are_lexicographic() {
        assert_eq!(
            combinations(4, 2),
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );
        assert_eq!(combinations(3, 0), vec![Vec::<usize>::new()]);
        assert!(combinations(2, 3).is_empty());
    }

    #[test]
    fn list_display() {
        assert_eq!(ListDisplay([1, 2, 3], ", ").to_string(), "1, 2, 3");
    }
}
