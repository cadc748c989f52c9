//! CLI argument parsing for bridges.

use std::path::PathBuf;

use clap::{CommandFactory, FromArgMatches, Parser};

/// Common CLI arguments for all bridges.
#[derive(Parser, Debug, Clone)]
#[command(about = "emonlink interfacer bridge")]
pub struct BridgeArgs {
    /// Path to configuration file (JSON5).
    #[arg(short, long)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

impl BridgeArgs {
    /// Parse CLI arguments, falling back to `default_config` when `--config` is absent.
    ///
    /// Exits the process with clap's usage message on invalid arguments.
    pub fn parse_with_default(default_config: &'static str) -> Self {
        Self::parse_from_with_default(std::env::args_os(), default_config)
    }

    /// Like [`parse_with_default`](Self::parse_with_default), over an explicit argument list.
    pub fn parse_from_with_default<I, T>(args: I, default_config: &'static str) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = Self::command()
            .mut_arg("config", |arg| arg.default_value(default_config).required(false))
            .get_matches_from(args);

        Self::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
    }
}
