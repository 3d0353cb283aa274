//! Grammar model: productions, precedence, FIRST/FOLLOW and the sanity
//! analyses that run before table construction.
//!
//! A `Grammar` is built incrementally (`set_precedence`, `add_production`,
//! `set_start`) and then frozen; the LALR builder only ever sees a frozen
//! grammar. Production 0 is always the synthetic augmented rule
//! `S' -> start`.

use crate::error::ConfigError;
use crate::lritems::LrItemArena;
use crate::master;
use crate::token::{Name, END_KIND, ERROR_KIND};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashSet;
use std::fmt;

/// Marker used inside FIRST sets for the empty string.
pub const EMPTY_MARK: &str = "<empty>";
/// Left-hand side of the synthetic start production.
pub const AUGMENTED_LHS: &str = "S'";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
    Nonassoc,
}

impl Assoc {
    pub fn as_str(self) -> &'static str {
        match self {
            Assoc::Left => "left",
            Assoc::Right => "right",
            Assoc::Nonassoc => "nonassoc",
        }
    }
}

/// Where a production was declared, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLoc {
    pub file: Name,
    pub line: usize,
}

impl SourceLoc {
    pub fn new(file: impl Into<Name>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

/// A single grammar production `lhs -> rhs`.
///
/// `prec` is the resolved precedence: either from a `%prec` override or
/// from the rightmost terminal of the rhs, defaulting to `(Right, 0)`.
#[derive(Debug, Clone)]
pub struct Production {
    pub number: usize,
    pub lhs: Name,
    pub rhs: Vec<Name>,
    pub prec: (Assoc, usize),
    pub loc: SourceLoc,
}

impl fmt::Display for Production {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ->", self.lhs)?;
        if self.rhs.is_empty() {
            write!(f, " {}", EMPTY_MARK)?;
        } else {
            for s in &self.rhs {
                write!(f, " {}", s)?;
            }
        }
        Ok(())
    }
}

pub struct Grammar {
    productions: Vec<Production>,
    /// Nonterminal -> numbers of the productions defining it.
    prodnames: IndexMap<Name, Vec<usize>>,
    /// Terminal -> numbers of the productions mentioning it.
    terminals: IndexMap<Name, Vec<usize>>,
    /// Nonterminal -> numbers of the productions mentioning it in a rhs.
    nonterminals: IndexMap<Name, Vec<usize>>,
    precedence: IndexMap<Name, (Assoc, usize)>,
    used_precedence: HashSet<Name>,
    first: IndexMap<Name, IndexSet<Name>>,
    follow: IndexMap<Name, IndexSet<Name>>,
    start: Option<Name>,
    items: LrItemArena,
}

impl Grammar {
    /// Creates a grammar over the given terminal alphabet. The reserved
    /// `error` terminal is always present.
    pub fn new(tokens: &[Name]) -> Result<Self, ConfigError> {
        let mut terminals: IndexMap<Name, Vec<usize>> = IndexMap::new();
        terminals.insert(ERROR_KIND.into(), Vec::new());
        for t in tokens {
            if t == ERROR_KIND || t == END_KIND {
                return Err(ConfigError::ReservedToken(t.clone()));
            }
            master::validate_name(t)?;
            if terminals.insert(t.clone(), Vec::new()).is_some() {
                return Err(ConfigError::DuplicateToken(t.clone()));
            }
        }
        let augmented = Production {
            number: 0,
            lhs: AUGMENTED_LHS.into(),
            rhs: Vec::new(),
            prec: (Assoc::Right, 0),
            loc: SourceLoc::default(),
        };
        Ok(Self {
            productions: vec![augmented],
            prodnames: IndexMap::new(),
            terminals,
            nonterminals: IndexMap::new(),
            precedence: IndexMap::new(),
            used_precedence: HashSet::new(),
            first: IndexMap::new(),
            follow: IndexMap::new(),
            start: None,
            items: LrItemArena::default(),
        })
    }

    pub fn is_terminal(&self, sym: &str) -> bool {
        self.terminals.contains_key(sym)
    }

    /// Declares an additional terminal after construction.
    pub fn declare_terminal(&mut self, name: &str) -> Result<(), ConfigError> {
        let name: Name = name.into();
        if name == ERROR_KIND || name == END_KIND {
            return Err(ConfigError::ReservedToken(name));
        }
        master::validate_name(&name)?;
        if self.terminals.insert(name.clone(), Vec::new()).is_some() {
            return Err(ConfigError::DuplicateToken(name));
        }
        Ok(())
    }

    /// Declares associativity and level for a terminal. Must happen before
    /// any production is added.
    pub fn set_precedence(
        &mut self,
        term: &str,
        assoc: Assoc,
        level: usize,
    ) -> Result<(), ConfigError> {
        if self.productions.len() > 1 {
            return Err(ConfigError::LatePrecedence(term.into()));
        }
        if self.precedence.contains_key(term) {
            return Err(ConfigError::DuplicatePrecedence(term.into()));
        }
        self.precedence.insert(term.into(), (assoc, level));
        Ok(())
    }

    /// Adds a production. Symbols in `rhs` may be quoted single characters
    /// (implicitly declared literal terminals) and the sequence may end in
    /// `%prec TERM` to override the precedence.
    pub fn add_production(
        &mut self,
        lhs: &str,
        rhs: &[&str],
        loc: SourceLoc,
    ) -> Result<usize, ConfigError> {
        let lhs: Name = lhs.into();
        if self.terminals.contains_key(&lhs) {
            return Err(ConfigError::TerminalOnLhs(lhs));
        }
        master::validate_name(&lhs)?;

        let mut syms: Vec<Name> = Vec::with_capacity(rhs.len());
        for raw in rhs {
            let sym = Name::from(*raw);
            if *raw != "%prec" && !raw.starts_with('\'') && !raw.starts_with('"') {
                master::validate_name(&sym)?;
            }
            syms.push(sym);
        }

        // Quoted single characters become literal terminals on first use.
        for s in syms.iter_mut() {
            if (s.starts_with('\'') && s.ends_with('\'') && s.len() == 3)
                || (s.starts_with('"') && s.ends_with('"') && s.len() == 3)
            {
                let lit: Name = s[1..2].into();
                if !self.terminals.contains_key(&lit) {
                    self.terminals.insert(lit.clone(), Vec::new());
                }
                *s = lit;
            }
        }

        let number = self.productions.len();
        let mut prec = None;
        if let Some(pos) = syms.iter().position(|s| s == "%prec") {
            if pos + 2 != syms.len() {
                return Err(ConfigError::DanglingPrec);
            }
            let term = syms[pos + 1].clone();
            // The %prec symbol need not be a real token; a bare precedence
            // declaration is enough (the usual UMINUS idiom).
            let p = self
                .precedence
                .get(&term)
                .copied()
                .ok_or(ConfigError::UnknownPrecedence(term.clone()))?;
            self.used_precedence.insert(term);
            syms.truncate(pos);
            prec = Some(p);
        }

        let prec = prec.unwrap_or_else(|| {
            syms.iter()
                .rev()
                .find(|s| self.terminals.contains_key(s.as_str()))
                .and_then(|t| self.precedence.get(t).copied())
                .unwrap_or((Assoc::Right, 0))
        });

        for s in &syms {
            if let Some(refs) = self.terminals.get_mut(s.as_str()) {
                refs.push(number);
            } else {
                self.nonterminals.entry(s.clone()).or_default().push(number);
            }
        }
        self.prodnames.entry(lhs.clone()).or_default().push(number);

        self.productions.push(Production {
            number,
            lhs,
            rhs: syms,
            prec,
            loc,
        });
        Ok(number)
    }

    /// Fixes the start symbol (default: lhs of the first production) and
    /// completes the augmented production.
    pub fn set_start(&mut self, start: Option<&str>) -> Result<(), ConfigError> {
        if self.productions.len() <= 1 {
            return Err(ConfigError::EmptyGrammar);
        }
        let start: Name = match start {
            Some(s) => s.into(),
            None => self.productions[1].lhs.clone(),
        };
        if self.terminals.contains_key(&start) {
            return Err(ConfigError::TerminalStart(start));
        }
        if !self.prodnames.contains_key(&start) {
            return Err(ConfigError::UndefinedStart(start));
        }
        self.productions[0].rhs = vec![start.clone()];
        self.nonterminals.entry(start.clone()).or_default().push(0);
        self.start = Some(start);
        Ok(())
    }

    pub fn start(&self) -> Option<&Name> {
        self.start.as_ref()
    }

    pub fn productions(&self) -> &[Production] {
        &self.productions
    }

    pub fn production(&self, number: usize) -> &Production {
        &self.productions[number]
    }

    pub fn prods_for(&self, nonterminal: &str) -> Option<&Vec<usize>> {
        self.prodnames.get(nonterminal)
    }

    pub fn terminals(&self) -> &IndexMap<Name, Vec<usize>> {
        &self.terminals
    }

    pub fn nonterminals(&self) -> &IndexMap<Name, Vec<usize>> {
        &self.nonterminals
    }

    pub fn prodnames(&self) -> &IndexMap<Name, Vec<usize>> {
        &self.prodnames
    }

    pub fn precedence(&self) -> &IndexMap<Name, (Assoc, usize)> {
        &self.precedence
    }

    pub fn precedence_of(&self, term: &str) -> (Assoc, usize) {
        self.precedence
            .get(term)
            .copied()
            .unwrap_or((Assoc::Right, 0))
    }

    pub fn first(&self) -> &IndexMap<Name, IndexSet<Name>> {
        &self.first
    }

    pub fn follow(&self) -> &IndexMap<Name, IndexSet<Name>> {
        &self.follow
    }

    pub(crate) fn items(&self) -> &LrItemArena {
        &self.items
    }

    /// Symbols used in some rhs that are neither terminals nor defined
    /// nonterminals. Returned as (symbol, production number).
    pub fn undefined_symbols(&self) -> Vec<(Name, usize)> {
        let mut out = Vec::new();
        for p in self.productions.iter().skip(1) {
            for s in &p.rhs {
                if !self.terminals.contains_key(s.as_str())
                    && !self.prodnames.contains_key(s.as_str())
                {
                    out.push((s.clone(), p.number));
                }
            }
        }
        out
    }

    /// Declared terminals never mentioned by any production. `error` is
    /// exempt.
    pub fn unused_terminals(&self) -> Vec<Name> {
        self.terminals
            .iter()
            .filter(|(name, refs)| *name != ERROR_KIND && refs.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Precedence entries for terminals the grammar never exercises.
    pub fn unused_precedence(&self) -> Vec<(Name, Assoc)> {
        self.precedence
            .iter()
            .filter(|(term, _)| {
                let mentioned = self
                    .terminals
                    .get(term.as_str())
                    .map(|refs| !refs.is_empty())
                    .unwrap_or(false);
                !mentioned && !self.used_precedence.contains(term.as_str())
            })
            .map(|(term, (assoc, _))| (term.clone(), *assoc))
            .collect()
    }

    /// Nonterminals not reachable from the start symbol.
    pub fn unreachable(&self) -> Vec<Name> {
        let mut reachable: HashSet<Name> = HashSet::new();
        let mut stack: Vec<Name> = Vec::new();
        if let Some(start) = &self.start {
            stack.push(start.clone());
        }
        while let Some(sym) = stack.pop() {
            if !reachable.insert(sym.clone()) {
                continue;
            }
            if let Some(prods) = self.prodnames.get(&sym) {
                for &n in prods {
                    for s in &self.productions[n].rhs {
                        if self.prodnames.contains_key(s.as_str()) && !reachable.contains(s) {
                            stack.push(s.clone());
                        }
                    }
                }
            }
        }
        self.prodnames
            .keys()
            .filter(|n| !reachable.contains(n.as_str()))
            .cloned()
            .collect()
    }

    /// Nonterminals that can never derive a terminal string.
    pub fn infinite_cycles(&self) -> Vec<Name> {
        let mut terminates: IndexMap<Name, bool> = IndexMap::new();
        for t in self.terminals.keys() {
            terminates.insert(t.clone(), true);
        }
        terminates.insert(END_KIND.into(), true);
        for n in self.prodnames.keys() {
            terminates.insert(n.clone(), false);
        }
        terminates.insert(AUGMENTED_LHS.into(), false);

        let mut changed = true;
        while changed {
            changed = false;
            for p in &self.productions {
                if p.number == 0 && self.start.is_none() {
                    continue;
                }
                let ok = p
                    .rhs
                    .iter()
                    .all(|s| terminates.get(s.as_str()).copied().unwrap_or(false));
                if ok && !terminates.get(p.lhs.as_str()).copied().unwrap_or(false) {
                    terminates.insert(p.lhs.clone(), true);
                    changed = true;
                }
            }
        }
        self.prodnames
            .keys()
            .filter(|n| !terminates.get(n.as_str()).copied().unwrap_or(false))
            .cloned()
            .collect()
    }

    /// FIRST of a symbol string, with epsilon handling.
    pub(crate) fn first_of(&self, beta: &[Name]) -> IndexSet<Name> {
        let mut result = IndexSet::new();
        let mut all_empty = true;
        for x in beta {
            let mut x_empty = false;
            if let Some(fs) = self.first.get(x.as_str()) {
                for f in fs {
                    if f == EMPTY_MARK {
                        x_empty = true;
                    } else {
                        result.insert(f.clone());
                    }
                }
            }
            if !x_empty {
                all_empty = false;
                break;
            }
        }
        if all_empty {
            result.insert(EMPTY_MARK.into());
        }
        result
    }

    /// Standard fixpoint FIRST computation over all symbols.
    pub fn compute_first(&mut self) {
        if !self.first.is_empty() {
            return;
        }
        for t in self.terminals.keys() {
            let mut s = IndexSet::new();
            s.insert(t.clone());
            self.first.insert(t.clone(), s);
        }
        let mut s = IndexSet::new();
        s.insert(Name::from(END_KIND));
        self.first.insert(END_KIND.into(), s);
        for n in self.prodnames.keys() {
            self.first.insert(n.clone(), IndexSet::new());
        }

        let mut changed = true;
        while changed {
            changed = false;
            let names: Vec<Name> = self.prodnames.keys().cloned().collect();
            for n in names {
                let prods = self.prodnames.get(&n).cloned().unwrap_or_default();
                for pn in prods {
                    let add = self.first_of(&self.productions[pn].rhs.clone());
                    let set = self.first.get_mut(&n).expect("first set preallocated");
                    for f in add {
                        if set.insert(f) {
                            changed = true;
                        }
                    }
                }
            }
        }
    }

    /// FOLLOW sets for every nonterminal; the start symbol gets `$end`.
    pub fn compute_follow(&mut self) {
        if !self.follow.is_empty() {
            return;
        }
        self.compute_first();
        for n in self.prodnames.keys() {
            self.follow.insert(n.clone(), IndexSet::new());
        }
        let start = match &self.start {
            Some(s) => s.clone(),
            None => return,
        };
        self.follow
            .get_mut(&start)
            .expect("start has a follow set")
            .insert(END_KIND.into());

        let mut changed = true;
        while changed {
            changed = false;
            for pn in 1..self.productions.len() {
                let (lhs, rhs) = {
                    let p = &self.productions[pn];
                    (p.lhs.clone(), p.rhs.clone())
                };
                for (i, b) in rhs.iter().enumerate() {
                    if !self.prodnames.contains_key(b.as_str()) {
                        continue;
                    }
                    let beta = &rhs[i + 1..];
                    let first_beta = self.first_of(beta);
                    let has_empty = first_beta.contains(EMPTY_MARK);
                    {
                        let set = self.follow.get_mut(b.as_str()).expect("preallocated");
                        for f in &first_beta {
                            if f != EMPTY_MARK && set.insert(f.clone()) {
                                changed = true;
                            }
                        }
                    }
                    if has_empty || beta.is_empty() {
                        let from = self
                            .follow
                            .get(lhs.as_str())
                            .cloned()
                            .unwrap_or_default();
                        let set = self.follow.get_mut(b.as_str()).expect("preallocated");
                        for f in from {
                            if set.insert(f) {
                                changed = true;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Builds the LR(0) item chains for every production.
    pub fn build_lritems(&mut self) {
        self.items = LrItemArena::build(&self.productions, &self.prodnames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(line: usize) -> SourceLoc {
        SourceLoc::new("test", line)
    }

    fn names(ts: &[&str]) -> Vec<Name> {
        ts.iter().map(|t| Name::from(*t)).collect()
    }

    fn expr_grammar() -> Grammar {
        let mut g = Grammar::new(&names(&["NUM", "PLUS", "TIMES", "LPAREN", "RPAREN"])).unwrap();
        g.add_production("expr", &["expr", "PLUS", "term"], loc(1)).unwrap();
        g.add_production("expr", &["term"], loc(2)).unwrap();
        g.add_production("term", &["term", "TIMES", "factor"], loc(3)).unwrap();
        g.add_production("term", &["factor"], loc(4)).unwrap();
        g.add_production("factor", &["NUM"], loc(5)).unwrap();
        g.add_production("factor", &["LPAREN", "expr", "RPAREN"], loc(6)).unwrap();
        g.set_start(None).unwrap();
        g
    }

    #[test]
    fn start_defaults_to_first_production() {
        let g = expr_grammar();
        assert_eq!(g.start().unwrap(), "expr");
        assert_eq!(g.production(0).lhs, AUGMENTED_LHS);
        assert_eq!(g.production(0).rhs, names(&["expr"]));
        assert_eq!(g.production(5).number, 5);
    }

    #[test]
    fn first_sets_with_epsilon() {
        let mut g = Grammar::new(&names(&["A", "B"])).unwrap();
        g.add_production("s", &["x", "B"], loc(1)).unwrap();
        g.add_production("x", &["A"], loc(2)).unwrap();
        g.add_production("x", &[], loc(3)).unwrap();
        g.set_start(Some("s")).unwrap();
        g.compute_first();
        let fx = g.first().get("x").unwrap();
        assert!(fx.contains("A"));
        assert!(fx.contains(EMPTY_MARK));
        let fs = g.first().get("s").unwrap();
        assert!(fs.contains("A"));
        assert!(fs.contains("B"));
        assert!(!fs.contains(EMPTY_MARK));
        assert_eq!(g.first().get("A").unwrap().len(), 1);
    }

    #[test]
    fn follow_sets() {
        let mut g = expr_grammar();
        g.compute_follow();
        let f_expr = g.follow().get("expr").unwrap();
        assert!(f_expr.contains(END_KIND));
        assert!(f_expr.contains("PLUS"));
        assert!(f_expr.contains("RPAREN"));
        let f_factor = g.follow().get("factor").unwrap();
        assert!(f_factor.contains("TIMES"));
        assert!(f_factor.contains("PLUS"));
    }

    #[test]
    fn undefined_symbols_are_reported() {
        let mut g = Grammar::new(&names(&["NUM"])).unwrap();
        g.add_production("expr", &["expr", "BOGUS"], loc(1)).unwrap();
        g.set_start(None).unwrap();
        let undef = g.undefined_symbols();
        assert_eq!(undef.len(), 1);
        assert_eq!(undef[0].0, "BOGUS");
    }

    #[test]
    fn infinite_cycle_is_detected() {
        let mut g = Grammar::new(&names(&["NUM"])).unwrap();
        g.add_production("s", &["a"], loc(1)).unwrap();
        g.add_production("a", &["a", "NUM"], loc(2)).unwrap();
        g.set_start(Some("s")).unwrap();
        let inf = g.infinite_cycles();
        assert!(inf.contains(&Name::from("a")));
        assert!(inf.contains(&Name::from("s")));
    }

    #[test]
    fn rightmost_terminal_sets_default_precedence() {
        let mut g = Grammar::new(&names(&["PLUS", "TIMES", "NUM"])).unwrap();
        g.set_precedence("PLUS", Assoc::Left, 1).unwrap();
        g.set_precedence("TIMES", Assoc::Left, 2).unwrap();
        g.add_production("e", &["e", "PLUS", "e"], loc(1)).unwrap();
        g.add_production("e", &["e", "TIMES", "e"], loc(2)).unwrap();
        g.add_production("e", &["NUM"], loc(3)).unwrap();
        g.set_start(None).unwrap();
        assert_eq!(g.production(1).prec, (Assoc::Left, 1));
        assert_eq!(g.production(2).prec, (Assoc::Left, 2));
        assert_eq!(g.production(3).prec, (Assoc::Right, 0));
    }

    #[test]
    fn prec_override_beats_rightmost_terminal() {
        let mut g = Grammar::new(&names(&["MINUS", "NUM", "UMINUS"])).unwrap();
        g.set_precedence("MINUS", Assoc::Left, 1).unwrap();
        g.set_precedence("UMINUS", Assoc::Right, 2).unwrap();
        g.add_production("e", &["e", "MINUS", "e"], loc(1)).unwrap();
        g.add_production("e", &["MINUS", "e", "%prec", "UMINUS"], loc(2)).unwrap();
        g.add_production("e", &["NUM"], loc(3)).unwrap();
        g.set_start(None).unwrap();
        assert_eq!(g.production(2).prec, (Assoc::Right, 2));
        assert_eq!(g.production(2).rhs, names(&["MINUS", "e"]));
    }

    #[test]
    fn prec_without_declared_precedence_is_an_error() {
        let mut g = Grammar::new(&names(&["MINUS", "NUM"])).unwrap();
        let err = g
            .add_production("e", &["MINUS", "e", "%prec", "UMINUS"], loc(1))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPrecedence(_)));
    }

    #[test]
    fn late_precedence_is_an_error() {
        let mut g = Grammar::new(&names(&["PLUS"])).unwrap();
        g.add_production("e", &["e", "PLUS", "e"], loc(1)).unwrap();
        let err = g.set_precedence("PLUS", Assoc::Left, 1).unwrap_err();
        assert!(matches!(err, ConfigError::LatePrecedence(_)));
    }

    #[test]
    fn quoted_literals_become_terminals() {
        let mut g = Grammar::new(&names(&["NUM"])).unwrap();
        g.add_production("e", &["e", "'+'", "e"], loc(1)).unwrap();
        g.add_production("e", &["NUM"], loc(2)).unwrap();
        g.set_start(None).unwrap();
        assert!(g.is_terminal("+"));
        assert_eq!(g.production(1).rhs, names(&["e", "+", "e"]));
    }

    #[test]
    fn unused_terminals_and_precedence() {
        let mut g = Grammar::new(&names(&["NUM", "NEVER"])).unwrap();
        g.set_precedence("NUM", Assoc::Left, 1).unwrap();
        g.set_precedence("NEVER", Assoc::Left, 2).unwrap();
        g.add_production("e", &["NUM"], loc(1)).unwrap();
        g.set_start(None).unwrap();
        assert_eq!(g.unused_terminals(), vec![Name::from("NEVER")]);
        let up = g.unused_precedence();
        assert_eq!(up.len(), 1);
        assert_eq!(up[0].0, "NEVER");
    }

    #[test]
    fn unreachable_nonterminals() {
        let mut g = Grammar::new(&names(&["NUM"])).unwrap();
        g.add_production("s", &["NUM"], loc(1)).unwrap();
        g.add_production("orphan", &["NUM"], loc(2)).unwrap();
        g.set_start(Some("s")).unwrap();
        assert_eq!(g.unreachable(), vec![Name::from("orphan")]);
    }

    #[test]
    fn repeated_productions_surface_as_conflicts_not_errors() {
        // Identical rule text is not a construction error; the table
        // builder reports a reduce/reduce conflict resolved in favor of
        // the earlier rule.
        let mut g = Grammar::new(&names(&["NUM"])).unwrap();
        g.add_production("e", &["NUM"], loc(1)).unwrap();
        g.add_production("e", &["NUM"], loc(2)).unwrap();
        g.set_start(None).unwrap();
        g.build_lritems();
        let t = crate::lalr::LrTables::build(&g);
        assert_eq!(t.rr_conflicts.len(), 1);
        assert_eq!(t.rr_conflicts[0].chosen, 1);
        assert_eq!(t.rr_conflicts[0].rejected, 2);
    }

    #[test]
    fn terminals_can_be_declared_incrementally() {
        let mut g = Grammar::new(&names(&["NUM"])).unwrap();
        g.declare_terminal("COMMA").unwrap();
        assert!(g.is_terminal("COMMA"));
        assert!(matches!(
            g.declare_terminal("NUM").unwrap_err(),
            ConfigError::DuplicateToken(_)
        ));
        assert!(matches!(
            g.declare_terminal("error").unwrap_err(),
            ConfigError::ReservedToken(_)
        ));
    }

    #[test]
    fn terminal_as_lhs_is_an_error() {
        let mut g = Grammar::new(&names(&["NUM"])).unwrap();
        let err = g.add_production("NUM", &[], loc(1)).unwrap_err();
        assert!(matches!(err, ConfigError::TerminalOnLhs(_)));
    }
}
