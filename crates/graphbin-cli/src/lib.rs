//! graphbin command line: ingest PGDF files into a binary store and query it

pub mod commands;
pub mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

use commands::OutputContext;
use commands::ingest::IngestArgs;
use commands::query::QueryCommands;
use config::Config;

#[derive(Parser, Debug)]
#[command(name = "graphbin")]
#[command(author, version, about = "Write-once binary property-graph store", long_about = None)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (TOML)
    #[arg(long, global = true, env = "GRAPHBIN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a store from a node file and an edge file
    Ingest(IngestArgs),

    #[command(flatten)]
    Query(QueryCommands),
}

impl Cli {
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub fn default_log_filter(&self) -> &'static str {
        if self.verbose {
            "graphbin_core=debug,graphbin_cli=debug"
        } else {
            "graphbin_core=warn,graphbin_cli=warn"
        }
    }

    pub fn output(&self) -> OutputContext {
        OutputContext {
            json: self.json,
            verbose: self.verbose,
        }
    }
}

pub fn run<W: Write>(cli: Cli, out: &mut W) -> Result<()> {
    let output = cli.output();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest(args) => commands::ingest::execute(args, &config.ingest, &output, out),
        Commands::Query(command) => commands::query::execute(command, &output, out),
    }
}
