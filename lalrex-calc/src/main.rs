//! Command-line interface for the lalrex-calc example.
//!
//! Evaluates calculator statements from a file or an inline expression,
//! or writes the generated parse tables in their human-readable form.

use anyhow::{Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use lalrex_calc::Calc;

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Command
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluates statements from a file
    Run {
        /// Input file with calculator statements
        #[arg(short, long)]
        input: String,
    },
    /// Evaluates a single inline expression or statement list
    Eval {
        /// Statements, e.g. "x = 2; print x * 3;"
        text: String,
    },
    /// Writes the human-readable parse tables to stdout
    Tables,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let mut calc = Calc::new()?;

    match args.command {
        Commands::Run { input } => {
            let text = std::fs::read_to_string(&input)
                .with_context(|| format!("can't open {:?}", input))?;
            for r in calc.eval(&text)? {
                println!("{:?}", r);
            }
        }
        Commands::Eval { text } => {
            for r in calc.eval(&text)? {
                println!("{:?}", r);
            }
        }
        Commands::Tables => {
            let mut out = std::io::stdout();
            calc.write_tables(&mut out)?;
        }
    }
    Ok(())
}
