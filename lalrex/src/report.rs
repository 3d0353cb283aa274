//! Human-readable dump of a grammar and its LALR tables.
//!
//! Text-only diagnostic output: the grammar listing, symbol usage,
//! precedence, FIRST/FOLLOW sets, and one section per state with its item
//! set, action and goto lines, and conflict annotations.

use crate::grammar::Grammar;
use crate::lalr::{LrAction, LrTables, Resolved};
use std::io::{self, Write};

fn write_item<W: Write>(out: &mut W, g: &Grammar, prod: usize, dot: usize) -> io::Result<()> {
    let p = g.production(prod);
    write!(out, "({}) {} ->", prod, p.lhs)?;
    for (i, s) in p.rhs.iter().enumerate() {
        if i == dot {
            write!(out, " .")?;
        }
        write!(out, " {}", s)?;
    }
    if dot == p.rhs.len() {
        write!(out, " .")?;
    }
    writeln!(out)
}

/// Writes the full dump for a frozen grammar and its tables.
pub fn write_tables<W: Write>(out: &mut W, g: &Grammar, t: &LrTables) -> io::Result<()> {
    writeln!(out, "Grammar\n")?;
    for p in g.productions() {
        writeln!(out, "Rule {:<5} {}", p.number, p)?;
    }

    writeln!(out, "\nTerminals, with rules where they appear\n")?;
    for (name, refs) in g.terminals() {
        let nums: Vec<String> = refs.iter().map(|n| n.to_string()).collect();
        writeln!(out, "{:<20}: {}", name, nums.join(" "))?;
    }

    writeln!(out, "\nNonterminals, with rules where they appear\n")?;
    for (name, refs) in g.nonterminals() {
        let nums: Vec<String> = refs.iter().map(|n| n.to_string()).collect();
        writeln!(out, "{:<20}: {}", name, nums.join(" "))?;
    }

    if !g.precedence().is_empty() {
        writeln!(out, "\nPrecedence\n")?;
        for (term, (assoc, level)) in g.precedence() {
            writeln!(out, "{:<9}{} (level {})", assoc.as_str(), term, level)?;
        }
    }

    writeln!(out, "\nFirst\n")?;
    for (name, _) in g.prodnames() {
        if let Some(set) = g.first().get(name.as_str()) {
            let syms: Vec<&str> = set.iter().map(|s| s.as_str()).collect();
            writeln!(out, "FIRST({}) = {{ {} }}", name, syms.join(" "))?;
        }
    }

    writeln!(out, "\nFollow\n")?;
    for (name, _) in g.prodnames() {
        if let Some(set) = g.follow().get(name.as_str()) {
            let syms: Vec<&str> = set.iter().map(|s| s.as_str()).collect();
            writeln!(out, "FOLLOW({}) = {{ {} }}", name, syms.join(" "))?;
        }
    }

    for state in 0..t.n_states() {
        writeln!(out, "\nstate {}\n", state)?;
        for &(prod, dot) in &t.state_items[state] {
            write!(out, "    ")?;
            write_item(out, g, prod, dot)?;
        }
        writeln!(out)?;

        if let Some(p) = t.default_reduction(state) {
            writeln!(
                out,
                "    . {:<15} reduce using rule {} ({}) [defaulted]",
                "", p, g.production(p)
            )?;
        }
        for (col, action) in t.row(state).iter().enumerate() {
            let name = t.sym_name(col).unwrap_or("?");
            match action {
                LrAction::Error => {}
                LrAction::Accept => writeln!(out, "    {:<15} accept", name)?,
                LrAction::Shift(j) => {
                    writeln!(out, "    {:<15} shift and go to state {}", name, j)?
                }
                LrAction::Reduce(p) => writeln!(
                    out,
                    "    {:<15} reduce using rule {} ({})",
                    name,
                    p,
                    g.production(*p)
                )?,
                LrAction::Goto(j) => writeln!(out, "    {:<15} go to state {}", name, j)?,
            }
        }

        for c in t.sr_conflicts.iter().filter(|c| c.state == state) {
            let how = match c.resolved {
                Resolved::AsShift => "shift",
                Resolved::AsReduce => "reduce",
            };
            writeln!(
                out,
                "  ! shift/reduce conflict for {} resolved as {}",
                c.token, how
            )?;
        }
        for c in t.rr_conflicts.iter().filter(|c| c.state == state) {
            writeln!(
                out,
                "  ! reduce/reduce conflict for {} resolved using rule {} ({}), rejected rule {} ({})",
                c.token,
                c.chosen,
                g.production(c.chosen),
                c.rejected,
                g.production(c.rejected)
            )?;
        }
    }

    writeln!(
        out,
        "\n{} shift/reduce conflicts, {} reduce/reduce conflicts",
        t.sr_conflicts.len(),
        t.rr_conflicts.len()
    )?;
    Ok(())
}
