//! Arena of LR(0) items.
//!
//! One dot-item chain is generated per production and shared by every
//! state that mentions it. Items are addressed by arena index, so the
//! `next`/`after` links are plain integers instead of cyclic references:
//! `next` is the same item with the dot advanced, `before` the symbol left
//! of the dot, and `after` the productions of the nonterminal right of the
//! dot (which is what makes closures a table lookup).

use crate::grammar::Production;
use crate::token::Name;
use indexmap::IndexMap;

#[derive(Debug, Clone)]
pub(crate) struct LrItem {
    pub prod: usize,
    pub dot: usize,
    pub next: Option<usize>,
    pub before: Option<Name>,
    pub after: Vec<usize>,
}

#[derive(Debug, Default)]
pub(crate) struct LrItemArena {
    items: Vec<LrItem>,
    start_of: Vec<usize>,
}

impl LrItemArena {
    pub fn build(productions: &[Production], prodnames: &IndexMap<Name, Vec<usize>>) -> Self {
        let mut items = Vec::new();
        let mut start_of = Vec::with_capacity(productions.len());
        for p in productions {
            let base = items.len();
            start_of.push(base);
            let len = p.rhs.len();
            for dot in 0..=len {
                let next = if dot < len { Some(base + dot + 1) } else { None };
                let before = if dot > 0 {
                    Some(p.rhs[dot - 1].clone())
                } else {
                    None
                };
                let after = match p.rhs.get(dot) {
                    Some(sym) => prodnames.get(sym.as_str()).cloned().unwrap_or_default(),
                    None => Vec::new(),
                };
                items.push(LrItem {
                    prod: p.number,
                    dot,
                    next,
                    before,
                    after,
                });
            }
        }
        Self { items, start_of }
    }

    pub fn item(&self, idx: usize) -> &LrItem {
        &self.items[idx]
    }

    /// Index of the dot-0 item of a production.
    pub fn start(&self, prod: usize) -> usize {
        self.start_of[prod]
    }

    /// Index of the item of `prod` with the dot at `dot`.
    pub fn index_of(&self, prod: usize, dot: usize) -> usize {
        self.start_of[prod] + dot
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Grammar, SourceLoc};
    use crate::token::Name;

    fn names(ts: &[&str]) -> Vec<Name> {
        ts.iter().map(|t| Name::from(*t)).collect()
    }

    fn small_grammar() -> Grammar {
        let mut g = Grammar::new(&names(&["A", "B"])).unwrap();
        g.add_production("s", &["x", "B"], SourceLoc::default()).unwrap();
        g.add_production("x", &["A"], SourceLoc::default()).unwrap();
        g.add_production("x", &[], SourceLoc::default()).unwrap();
        g.set_start(Some("s")).unwrap();
        g.build_lritems();
        g
    }

    #[test]
    fn one_item_per_dot_position() {
        let g = small_grammar();
        // S' -> s (2 items), s -> x B (3), x -> A (2), x -> <empty> (1)
        assert_eq!(g.items().len(), 8);
    }

    #[test]
    fn chains_link_forward() {
        let g = small_grammar();
        let arena = g.items();
        let i0 = arena.start(1);
        let it = arena.item(i0);
        assert_eq!(it.dot, 0);
        assert_eq!(it.before, None);
        let it1 = arena.item(it.next.unwrap());
        assert_eq!(it1.dot, 1);
        assert_eq!(it1.before.as_deref(), Some("x"));
        let it2 = arena.item(it1.next.unwrap());
        assert_eq!(it2.next, None);
        assert_eq!(it2.before.as_deref(), Some("B"));
    }

    #[test]
    fn after_lists_productions_of_dotted_nonterminal() {
        let g = small_grammar();
        let arena = g.items();
        // s -> . x B : the nonterminal x has productions 2 and 3.
        let it = arena.item(arena.start(1));
        assert_eq!(it.after, vec![2, 3]);
        // s -> x . B : B is a terminal, no productions.
        let it1 = arena.item(arena.index_of(1, 1));
        assert!(it1.after.is_empty());
        // Augmented item S' -> . s closes over s's single production.
        let it0 = arena.item(arena.start(0));
        assert_eq!(it0.after, vec![1]);
    }
}
