// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `pkgwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pkgwatch",
    version,
    about = "Watch and rebuild every package of a workspace, keeping peer dependencies external.",
    long_about = None
)]
pub struct CliArgs {
    /// Package or workspace root directory.
    #[arg(value_name = "DIRECTORY", default_value = ".")]
    pub directory: String,

    /// Path to a `pkgwatch.toml` config file.
    ///
    /// Default: `pkgwatch.toml` in DIRECTORY, if present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PKGWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Discover packages and print their external modules per build
    /// target, without starting the build engine.
    #[arg(long)]
    pub dry_run: bool,
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
