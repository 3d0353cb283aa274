//! LALR(1) table construction.
//!
//! The pipeline is the classical one: build the canonical LR(0) collection,
//! compute lookahead sets for the kernel items with the
//! DeRemer/Pennello relations (DR, reads, includes, lookback, all joined by
//! the digraph traversal), then fill ACTION/GOTO with precedence-driven
//! conflict resolution. States whose every action is the same reduction are
//! marked defaulted so the engine can reduce without fetching a lookahead.

use crate::grammar::{Assoc, Grammar, AUGMENTED_LHS};
use crate::symtab::Symtab;
use crate::token::{Name, END_KIND};
use indexmap::{IndexMap, IndexSet};
use std::collections::{HashMap, HashSet};

/// One parse-table entry. Missing entries are `Error`; `Goto` entries live
/// in the nonterminal columns of the same table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LrAction {
    Error,
    Accept,
    Shift(usize),
    Reduce(usize),
    Goto(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    AsShift,
    AsReduce,
}

/// A shift/reduce conflict that was resolved by the silent default rule
/// (neither side had precedence). Precedence-resolved conflicts are not
/// reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrConflict {
    pub state: usize,
    pub token: Name,
    pub resolved: Resolved,
}

/// A reduce/reduce conflict, resolved in favor of the production declared
/// earlier (lower number).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrConflict {
    pub state: usize,
    pub token: Name,
    pub chosen: usize,
    pub rejected: usize,
}

/// Frozen ACTION/GOTO tables plus everything the dump needs.
pub struct LrTables {
    pub(crate) symtab: Symtab,
    pub n_nonterminals: usize,
    table: Vec<Vec<LrAction>>,
    defaults: Vec<Option<usize>>,
    pub(crate) state_items: Vec<Vec<(usize, usize)>>,
    pub sr_conflicts: Vec<SrConflict>,
    pub rr_conflicts: Vec<RrConflict>,
}

impl LrTables {
    pub fn n_states(&self) -> usize {
        self.table.len()
    }

    pub fn sym_id(&self, name: &str) -> Option<usize> {
        self.symtab.idx(name)
    }

    pub fn sym_name(&self, id: usize) -> Option<&str> {
        self.symtab.sym(id)
    }

    pub fn action(&self, state: usize, sym: usize) -> LrAction {
        self.table[state][sym]
    }

    /// The production a defaulted state reduces by, if any.
    pub fn default_reduction(&self, state: usize) -> Option<usize> {
        self.defaults[state]
    }

    pub(crate) fn row(&self, state: usize) -> &[LrAction] {
        &self.table[state]
    }

    /// Runs the whole construction for a frozen grammar.
    pub fn build(g: &Grammar) -> LrTables {
        let states = lr0_collection(g);
        log::debug!("LR(0) collection: {} states", states.len());

        let nullable = nullable_nonterminals(g);
        let trans = nonterminal_transitions(g, &states);
        let dr = dr_sets(g, &states, &trans);
        let reads = reads_relation(g, &states, &trans, &nullable);
        let readsets = digraph(&trans, &reads, &dr);
        let (lookback, includes) = lookback_includes(g, &states, &trans, &nullable);
        let followsets = digraph(&trans, &includes, &readsets);
        let lookaheads = add_lookaheads(&trans, &lookback, &followsets);
        log::debug!("lookaheads computed for {} kernel items", lookaheads.len());

        fill_tables(g, &states, &lookaheads)
    }
}

struct StateRec {
    /// Closed item set, kernel first, as arena indices.
    items: Vec<usize>,
    trans: IndexMap<Name, usize>,
}

fn sym_after<'g>(g: &'g Grammar, item_idx: usize) -> Option<&'g Name> {
    let it = g.items().item(item_idx);
    g.production(it.prod).rhs.get(it.dot)
}

/// Closure of a kernel. Only ever adds dot-0 items, which the arena's
/// `after` links enumerate directly.
fn close(g: &Grammar, kernel: &[usize]) -> Vec<usize> {
    let arena = g.items();
    let mut out = kernel.to_vec();
    let mut added: HashSet<usize> = kernel
        .iter()
        .filter(|&&i| arena.item(i).dot == 0)
        .map(|&i| arena.item(i).prod)
        .collect();
    let mut w = 0;
    while w < out.len() {
        let after = arena.item(out[w]).after.clone();
        for p in after {
            if added.insert(p) {
                out.push(arena.start(p));
            }
        }
        w += 1;
    }
    out
}

/// Canonical LR(0) collection. States are interned by their sorted kernel.
fn lr0_collection(g: &Grammar) -> Vec<StateRec> {
    let arena = g.items();
    let start_kernel = vec![arena.start(0)];
    let mut states = vec![StateRec {
        items: close(g, &start_kernel),
        trans: IndexMap::new(),
    }];
    let mut kernel_map: HashMap<Vec<usize>, usize> = HashMap::new();
    kernel_map.insert(start_kernel, 0);

    let mut i = 0;
    while i < states.len() {
        let mut syms: IndexSet<Name> = IndexSet::new();
        for &it in &states[i].items {
            if let Some(s) = sym_after(g, it) {
                syms.insert(s.clone());
            }
        }
        for sym in syms {
            let mut kernel: Vec<usize> = states[i]
                .items
                .iter()
                .filter_map(|&it| {
                    if sym_after(g, it) == Some(&sym) {
                        arena.item(it).next
                    } else {
                        None
                    }
                })
                .collect();
            kernel.sort_unstable();
            if kernel.is_empty() {
                continue;
            }
            let id = match kernel_map.get(&kernel) {
                Some(&id) => id,
                None => {
                    let id = states.len();
                    let closed = close(g, &kernel);
                    kernel_map.insert(kernel, id);
                    states.push(StateRec {
                        items: closed,
                        trans: IndexMap::new(),
                    });
                    id
                }
            };
            states[i].trans.insert(sym, id);
        }
        i += 1;
    }
    states
}

fn nullable_nonterminals(g: &Grammar) -> HashSet<Name> {
    let mut nullable: HashSet<Name> = HashSet::new();
    let mut changed = true;
    while changed {
        changed = false;
        for p in g.productions().iter().skip(1) {
            if p.rhs.iter().all(|s| nullable.contains(s)) && nullable.insert(p.lhs.clone()) {
                changed = true;
            }
        }
    }
    nullable
}

type Trans = (usize, Name);

/// Every (state, nonterminal) pair with a goto transition, in discovery
/// order.
fn nonterminal_transitions(g: &Grammar, states: &[StateRec]) -> Vec<Trans> {
    let mut trans = Vec::new();
    let mut seen: HashSet<Trans> = HashSet::new();
    for (i, st) in states.iter().enumerate() {
        for sym in st.trans.keys() {
            if !g.is_terminal(sym) && seen.insert((i, sym.clone())) {
                trans.push((i, sym.clone()));
            }
        }
    }
    trans
}

/// DR(p, A): terminals readable directly after taking the transition.
fn dr_sets(
    g: &Grammar,
    states: &[StateRec],
    trans: &[Trans],
) -> HashMap<Trans, IndexSet<Name>> {
    let mut dr = HashMap::new();
    for t in trans {
        let (state, n) = t;
        let j = states[*state]
            .trans
            .get(n)
            .copied()
            .expect("nonterminal transition has a target");
        let mut set = IndexSet::new();
        for &it in &states[j].items {
            if let Some(a) = sym_after(g, it) {
                if g.is_terminal(a) {
                    set.insert(a.clone());
                }
            }
        }
        if *state == 0 && Some(n) == g.start() {
            set.insert(END_KIND.into());
        }
        dr.insert(t.clone(), set);
    }
    dr
}

/// (p, A) reads (r, C) when r = goto(p, A) and C is a nullable nonterminal
/// with a transition out of r.
fn reads_relation(
    g: &Grammar,
    states: &[StateRec],
    trans: &[Trans],
    nullable: &HashSet<Name>,
) -> HashMap<Trans, Vec<Trans>> {
    let mut reads = HashMap::new();
    for t in trans {
        let (state, n) = t;
        let j = states[*state]
            .trans
            .get(n)
            .copied()
            .expect("nonterminal transition has a target");
        let rel: Vec<Trans> = states[j]
            .trans
            .keys()
            .filter(|c| !g.is_terminal(c) && nullable.contains(c.as_str()))
            .map(|c| (j, c.clone()))
            .collect();
        reads.insert(t.clone(), rel);
    }
    reads
}

/// Builds the lookback pairs (which completed item each transition's
/// follow set flows into) and the includes relation between transitions.
#[allow(clippy::type_complexity)]
fn lookback_includes(
    g: &Grammar,
    states: &[StateRec],
    trans: &[Trans],
    nullable: &HashSet<Name>,
) -> (
    HashMap<Trans, Vec<(usize, usize)>>,
    HashMap<Trans, Vec<Trans>>,
) {
    let arena = g.items();
    let tset: HashSet<Trans> = trans.iter().cloned().collect();
    let mut lookback: HashMap<Trans, Vec<(usize, usize)>> = HashMap::new();
    let mut includes: HashMap<Trans, Vec<Trans>> = HashMap::new();

    for (state, n) in trans {
        let mut lookb = Vec::new();
        for &itidx in &states[*state].items {
            let item = arena.item(itidx);
            if &g.production(item.prod).lhs != n {
                continue;
            }
            let rhs = g.production(item.prod).rhs.clone();
            let mut dot = item.dot;
            let mut j = *state;
            while dot < rhs.len() {
                let t = &rhs[dot];
                if tset.contains(&(j, t.clone())) {
                    // The rest of the rhs must derive the empty string for
                    // the follow sets to be related.
                    let rest_nullable = rhs[dot + 1..]
                        .iter()
                        .all(|s| !g.is_terminal(s) && nullable.contains(s.as_str()));
                    if rest_nullable {
                        includes
                            .entry((j, t.clone()))
                            .or_default()
                            .push((*state, n.clone()));
                    }
                }
                j = states[j]
                    .trans
                    .get(t)
                    .copied()
                    .expect("item walk follows existing transitions");
                dot += 1;
            }
            lookb.push((j, item.prod));
        }
        lookback.insert((*state, n.clone()), lookb);
    }
    (lookback, includes)
}

/// The digraph algorithm of DeRemer and Pennello: computes
/// `F(x) = FP(x) ∪ ⋃ { F(y) | y ∈ R(x) }` with SCC collapsing.
fn digraph(
    x: &[Trans],
    r: &HashMap<Trans, Vec<Trans>>,
    fp: &HashMap<Trans, IndexSet<Name>>,
) -> HashMap<Trans, IndexSet<Name>> {
    let mut n: HashMap<Trans, usize> = x.iter().map(|t| (t.clone(), 0)).collect();
    let mut stack: Vec<Trans> = Vec::new();
    let mut f: HashMap<Trans, IndexSet<Name>> = HashMap::new();
    for t in x {
        if n.get(t).copied() == Some(0) {
            traverse(t, &mut n, &mut stack, &mut f, r, fp);
        }
    }
    f
}

fn traverse(
    x: &Trans,
    n: &mut HashMap<Trans, usize>,
    stack: &mut Vec<Trans>,
    f: &mut HashMap<Trans, IndexSet<Name>>,
    r: &HashMap<Trans, Vec<Trans>>,
    fp: &HashMap<Trans, IndexSet<Name>>,
) {
    stack.push(x.clone());
    let d = stack.len();
    n.insert(x.clone(), d);
    f.insert(x.clone(), fp.get(x).cloned().unwrap_or_default());

    if let Some(rel) = r.get(x) {
        for y in rel.clone() {
            if n.get(&y).copied().unwrap_or(0) == 0 {
                traverse(&y, n, stack, f, r, fp);
            }
            let ny = n.get(&y).copied().unwrap_or(0);
            if ny < n[x] {
                n.insert(x.clone(), ny);
            }
            let fy = f.get(&y).cloned().unwrap_or_default();
            let fx = f.get_mut(x).expect("F(x) was just inserted");
            for a in fy {
                fx.insert(a);
            }
        }
    }

    if n[x] == d {
        let fx = f[x].clone();
        loop {
            let top = stack.pop().expect("x is still on the stack");
            n.insert(top.clone(), usize::MAX);
            let done = top == *x;
            f.insert(top, fx.clone());
            if done {
                break;
            }
        }
    }
}

/// Unions each transition's follow set into the lookahead sets of the
/// completed items its lookback pairs name.
fn add_lookaheads(
    trans: &[Trans],
    lookback: &HashMap<Trans, Vec<(usize, usize)>>,
    followsets: &HashMap<Trans, IndexSet<Name>>,
) -> HashMap<(usize, usize), IndexSet<Name>> {
    let mut la: HashMap<(usize, usize), IndexSet<Name>> = HashMap::new();
    for t in trans {
        let follow = match followsets.get(t) {
            Some(f) => f,
            None => continue,
        };
        if let Some(pairs) = lookback.get(t) {
            for &(st, prod) in pairs {
                la.entry((st, prod))
                    .or_default()
                    .extend(follow.iter().cloned());
            }
        }
    }
    la
}

fn fill_tables(
    g: &Grammar,
    states: &[StateRec],
    lookaheads: &HashMap<(usize, usize), IndexSet<Name>>,
) -> LrTables {
    let arena = g.items();

    let mut symtab = Symtab::new();
    symtab.add(AUGMENTED_LHS);
    for n in g.prodnames().keys() {
        symtab.add(n);
    }
    let n_nonterminals = symtab.len();
    for t in g.terminals().keys() {
        symtab.add(t);
    }
    symtab.add(END_KIND);
    let n_syms = symtab.len();

    let mut table = vec![vec![LrAction::Error; n_syms]; states.len()];
    let mut sr_conflicts = Vec::new();
    let mut rr_conflicts = Vec::new();

    for (i, st) in states.iter().enumerate() {
        for (sym, &j) in &st.trans {
            if !g.is_terminal(sym) {
                let col = symtab.idx(sym).expect("every nonterminal has a column");
                table[i][col] = LrAction::Goto(j);
            }
        }

        for &itidx in &st.items {
            let item = arena.item(itidx);
            let prod = g.production(item.prod);
            if item.dot == prod.rhs.len() {
                if item.prod == 0 {
                    let col = symtab.idx(END_KIND).expect("$end has a column");
                    table[i][col] = LrAction::Accept;
                    continue;
                }
                let las = match lookaheads.get(&(i, item.prod)) {
                    Some(s) => s,
                    None => continue,
                };
                for a in las {
                    let col = symtab.idx(a).expect("every lookahead has a column");
                    match table[i][col] {
                        LrAction::Error => table[i][col] = LrAction::Reduce(item.prod),
                        LrAction::Shift(_) => {
                            let (_, slevel) = g.precedence_of(a);
                            let (rassoc, rlevel) = prod.prec;
                            if slevel < rlevel || (slevel == rlevel && rassoc == Assoc::Left) {
                                table[i][col] = LrAction::Reduce(item.prod);
                                if slevel == 0 && rlevel == 0 {
                                    sr_conflicts.push(SrConflict {
                                        state: i,
                                        token: a.clone(),
                                        resolved: Resolved::AsReduce,
                                    });
                                }
                            } else if slevel == rlevel && rassoc == Assoc::Nonassoc {
                                // The grammar forbids chaining; legitimate
                                // error entry, not a reported conflict.
                                table[i][col] = LrAction::Error;
                            } else if slevel == 0 && rlevel == 0 {
                                sr_conflicts.push(SrConflict {
                                    state: i,
                                    token: a.clone(),
                                    resolved: Resolved::AsShift,
                                });
                            }
                        }
                        LrAction::Reduce(old) => {
                            let (chosen, rejected) = if item.prod < old {
                                (item.prod, old)
                            } else {
                                (old, item.prod)
                            };
                            table[i][col] = LrAction::Reduce(chosen);
                            rr_conflicts.push(RrConflict {
                                state: i,
                                token: a.clone(),
                                chosen,
                                rejected,
                            });
                        }
                        LrAction::Accept => {}
                        LrAction::Goto(_) => unreachable!("goto in a terminal column"),
                    }
                }
            } else {
                let a = &prod.rhs[item.dot];
                if !g.is_terminal(a) {
                    continue;
                }
                let j = st
                    .trans
                    .get(a)
                    .copied()
                    .expect("terminal after dot has a transition");
                let col = symtab.idx(a).expect("every terminal has a column");
                match table[i][col] {
                    LrAction::Error => table[i][col] = LrAction::Shift(j),
                    LrAction::Shift(_) => {}
                    LrAction::Reduce(old) => {
                        let (_, slevel) = g.precedence_of(a);
                        let (rassoc, rlevel) = g.production(old).prec;
                        if slevel > rlevel || (slevel == rlevel && rassoc == Assoc::Right) {
                            table[i][col] = LrAction::Shift(j);
                            if slevel == 0 && rlevel == 0 {
                                sr_conflicts.push(SrConflict {
                                    state: i,
                                    token: a.clone(),
                                    resolved: Resolved::AsShift,
                                });
                            }
                        } else if slevel == rlevel && rassoc == Assoc::Nonassoc {
                            table[i][col] = LrAction::Error;
                        } else if slevel == 0 && rlevel == 0 {
                            sr_conflicts.push(SrConflict {
                                state: i,
                                token: a.clone(),
                                resolved: Resolved::AsReduce,
                            });
                        }
                    }
                    LrAction::Accept => unreachable!("accept outside the $end column"),
                    LrAction::Goto(_) => unreachable!("goto in a terminal column"),
                }
            }
        }
    }

    let defaults = detect_defaults(&table, n_nonterminals);
    let state_items = states
        .iter()
        .map(|st| {
            st.items
                .iter()
                .map(|&it| {
                    let item = arena.item(it);
                    (item.prod, item.dot)
                })
                .collect()
        })
        .collect();

    if !sr_conflicts.is_empty() {
        log::warn!("{} shift/reduce conflicts", sr_conflicts.len());
    }
    if !rr_conflicts.is_empty() {
        log::warn!("{} reduce/reduce conflicts", rr_conflicts.len());
    }

    LrTables {
        symtab,
        n_nonterminals,
        table,
        defaults,
        state_items,
        sr_conflicts,
        rr_conflicts,
    }
}

/// A state is defaulted when every terminal entry is the same reduction.
fn detect_defaults(table: &[Vec<LrAction>], n_nonterminals: usize) -> Vec<Option<usize>> {
    table
        .iter()
        .map(|row| {
            let mut red = None;
            for &a in &row[n_nonterminals..] {
                match a {
                    LrAction::Error => {}
                    LrAction::Reduce(p) => match red {
                        None => red = Some(p),
                        Some(q) if q == p => {}
                        Some(_) => return None,
                    },
                    _ => return None,
                }
            }
            red
        })
        .collect()
}
