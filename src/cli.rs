mod help_text;

use crate::payload::parse_json_arg;
use clap::{ArgAction, Parser, ValueEnum};
use std::fs::{self, File};
use std::path::PathBuf;

/// Inspect, render and bulk-provision znodes of a ZooKeeper ensemble
#[derive(Parser, Debug)]
#[command(name = "zkcli", version, about, long_about = help_text::ROOT_LONG_ABOUT)]
pub struct Cli {
    /// ZooKeeper connect string [default: zk:2181]
    #[arg(short, long, value_name = "HOSTS")]
    pub target: Option<String>,

    /// What to do
    #[arg(short, long, value_enum)]
    pub action: Action,

    /// Target znode (tree defaults to /)
    #[arg(short, long, value_name = "PATH")]
    pub znode: Option<String>,

    /// JSON value for set, canonicalized before writing
    #[arg(short, long, value_name = "JSON", value_parser = parse_json_arg, conflicts_with = "input")]
    pub values: Option<String>,

    /// JSON payload file for set, or mapping file (<znode>:<file> per line) for deploy
    #[arg(short, long, value_name = "FILE", value_parser = readable_file)]
    pub input: Option<PathBuf>,

    /// Seconds to wait for the session to be established [default: 5]
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// TOML file providing defaults for target and timeout_secs
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (once for info, twice for debug). Takes precedence over RUST_LOG.
    #[arg(long, action = ArgAction::Count, conflicts_with = "log_level")]
    pub verbose: u8,

    /// Set the log level explicitly. Takes precedence over RUST_LOG.
    #[arg(long, value_name = "LEVEL", value_enum)]
    pub log_level: Option<LogLevel>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Print the payload of a znode
    Get,
    /// Print the metadata of a znode
    Stats,
    /// Create a znode if needed and set its JSON payload
    Set,
    /// Create or update every znode listed in a mapping file
    Deploy,
    /// Render a znode and all its descendants
    Tree,
    /// Delete a znode and its descendants
    Del,
    /// List the immediate children of a znode
    List,
    /// Send the ruok health check
    Status,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn readable_file(raw: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(raw);
    let readable = match fs::metadata(&path) {
        Ok(metadata) if metadata.is_file() => File::open(&path).is_ok(),
        _ => false,
    };
    if readable {
        Ok(path)
    } else {
        Err(format!("Can't access or open file {}", raw))
    }
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
