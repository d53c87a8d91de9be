//! Command-line argument parsing for Lookout.

use clap::Parser;
use std::path::PathBuf;

/// An ad-hoc SQL console with a separate audit trail for failed queries.
#[derive(Parser, Debug)]
#[command(name = "lookout")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, value_name = "PATH", env = "LOOKOUT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Run one query, print the result and exit (no terminal UI)
    #[arg(short = 'q', long, value_name = "SQL")]
    pub query: Option<String>,

    /// With --query, also hand the result to the visual explorer
    #[arg(long, requires = "query")]
    pub visualize: bool,

    /// Reject statements recognized as writes, whatever the config says
    #[arg(long)]
    pub read_only: bool,

    /// Create the audit table if it does not exist, then exit
    #[arg(long, conflicts_with = "query")]
    pub init_audit_table: bool,

    /// Use the in-memory engine instead of PostgreSQL
    #[arg(long)]
    pub mock_db: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(db_lookout::config::Config::default_path)
    }

    /// True when no terminal UI should be started.
    pub fn is_one_shot(&self) -> bool {
        self.query.is_some() || self.init_audit_table
    }
}
