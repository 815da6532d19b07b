// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `opgraph`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "opgraph",
    version,
    about = "Run an operation plan as a dataflow graph derived from buffer reads and writes.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the plan file (TOML).
    ///
    /// Default: `Opgraph.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Opgraph.toml")]
    pub config: String,

    /// Override `[config].workers` (0 runs everything inline).
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Execute on the main thread without a dispatcher.
    #[arg(long)]
    pub inline: bool,

    /// Execute the plan this many times, sharing one dependency graph.
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub runs: usize,

    /// Drop edges implied by other dependency paths.
    #[arg(long)]
    pub transitive_reduction: bool,

    /// Build and print the dependency graph, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the dependency graph as Graphviz DOT and exit.
    #[arg(long)]
    pub dot: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `OPGRAPH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
