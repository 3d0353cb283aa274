use crate::token::Name;
use std::collections::HashMap;
use std::slice::Iter;

/// Bidirectional mapping between grammar symbol names and column indices.
///
/// The LALR table builder freezes one of these with all nonterminals first,
/// then all terminals, with `$end` in the last column. Insertion order is
/// preserved so that tables built from the same grammar twice are identical.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Symtab {
    map: HashMap<Name, usize>,
    vec: Vec<Name>,
}

impl Symtab {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            vec: Vec::new(),
        }
    }

    /// Adds a symbol, returning its index. Re-adding returns the existing
    /// index.
    pub fn add(&mut self, sym: &str) -> usize {
        if let Some(&idx) = self.map.get(sym) {
            return idx;
        }
        let idx = self.vec.len();
        let owned: Name = sym.into();
        self.vec.push(owned.clone());
        self.map.insert(owned, idx);
        idx
    }

    pub fn idx(&self, sym: &str) -> Option<usize> {
        self.map.get(sym).copied()
    }

    pub fn sym(&self, idx: usize) -> Option<&str> {
        self.vec.get(idx).map(|x| x.as_str())
    }

    pub fn contains(&self, sym: &str) -> bool {
        self.map.contains_key(sym)
    }

    pub fn iter(&self) -> Iter<'_, Name> {
        self.vec.iter()
    }

    pub fn len(&self) -> usize {
        self.vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::Symtab;

    #[test]
    fn new_is_empty() {
        let st = Symtab::new();
        assert!(st.is_empty());
        assert_eq!(st.idx("anything"), None);
        assert_eq!(st.sym(0), None);
    }

    #[test]
    fn add_and_retrieve() {
        let mut st = Symtab::new();
        assert_eq!(st.add("expr"), 0);
        assert_eq!(st.add("PLUS"), 1);
        assert_eq!(st.idx("expr"), Some(0));
        assert_eq!(st.sym(1), Some("PLUS"));
        assert!(st.contains("PLUS"));
        assert!(!st.contains("MINUS"));
    }

    #[test]
    fn duplicate_add_returns_same_index() {
        let mut st = Symtab::new();
        let first = st.add("term");
        let second = st.add("term");
        assert_eq!(first, second);
        assert_eq!(st.len(), 1);
    }

    #[test]
    fn insertion_order_is_stable() {
        let mut st = Symtab::new();
        for name in ["S'", "expr", "term", "PLUS", "TIMES", "$end"] {
            st.add(name);
        }
        let names: Vec<&str> = st.iter().map(|n| n.as_str()).collect();
        assert_eq!(names, ["S'", "expr", "term", "PLUS", "TIMES", "$end"]);
    }
}
