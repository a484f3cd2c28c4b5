mod cli;
mod config;
mod deploy;
mod namespace;
mod ops;
mod payload;
mod shutdown;
mod tree;

use cli::{Cli, LogLevel};
use config::Config;
use namespace::zk::ZkNamespace;
use ops::{Operation, OperationArgs, Outcome};
use shutdown::ShutdownGuard;
use std::fmt as stdfmt;
use std::io::{IsTerminal, Write, stderr};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Event, Level, Subscriber, error};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt as tracing_fmt;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;

struct ZkExitCode;

impl ZkExitCode {
    /// Exit code for any reported error, failed deploy entries and unhealthy status probes.
    fn failure() -> ExitCode {
        ExitCode::from(1)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_level);

    // Before connecting: the session spawns threads which must inherit the signal mask.
    let shutdown = match ShutdownGuard::install() {
        Ok(guard) => guard,
        Err(e) => {
            error!("Failed to install signal handling: {}", e);
            return ZkExitCode::failure();
        }
    };

    let result = run(cli, &shutdown);

    shutdown.release();

    match result {
        Ok(exit_code) => exit_code,
        Err(err) => {
            error!("{err}");
            ZkExitCode::failure()
        }
    }
}

fn run(cli: Cli, shutdown: &ShutdownGuard) -> anyhow::Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let settings = config.resolve(cli.target, cli.timeout);

    let operation = Operation::prepare(
        cli.action,
        OperationArgs {
            znode: cli.znode,
            values: cli.values,
            input: cli.input,
        },
    )?;

    let namespace = Arc::new(ZkNamespace::connect(&settings.target, settings.timeout)?);
    shutdown.register(namespace.clone());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let outcome = ops::run(operation, namespace.as_ref(), &mut out)?;
    out.flush()?;

    match outcome {
        Outcome::Done => Ok(ExitCode::SUCCESS),
        Outcome::Unhealthy => Ok(ZkExitCode::failure()),
        Outcome::EntriesFailed(count) => {
            error!("{} deployment entries failed", count);
            Ok(ZkExitCode::failure())
        }
    }
}

fn default_filter(verbose: u8, log_level: Option<LogLevel>) -> Option<&'static str> {
    match (log_level, verbose) {
        (Some(level), _) => Some(level.as_filter()),
        (None, 0) => None,
        (None, 1) => Some("info"),
        (None, _) => Some("debug"),
    }
}

fn init_tracing(verbose: u8, log_level: Option<LogLevel>) {
    let stderr_is_terminal = stderr().is_terminal();
    let formatter = EmojiFormatter { stderr_is_terminal };

    // Explicit flags win over RUST_LOG, which wins over the quiet default.
    let filter = match default_filter(verbose, log_level) {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    let fmt_layer = tracing_fmt::layer()
        .event_format(formatter)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

struct EmojiFormatter {
    stderr_is_terminal: bool,
}

impl<S, N> FormatEvent<S, N> for EmojiFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        if self.stderr_is_terminal {
            match *event.metadata().level() {
                Level::DEBUG => write!(writer, "🔍 ")?,
                Level::INFO => write!(writer, "ℹ️ ")?,
                Level::WARN => write!(writer, "⚠️  ")?,
                Level::ERROR => write!(writer, "❌️ ")?,
                _ => {}
            }
        } else {
            match *event.metadata().level() {
                Level::DEBUG => writer.write_str("DEBUG: ")?,
                Level::INFO => writer.write_str("INFO: ")?,
                Level::WARN => writer.write_str("WARN: ")?,
                Level::ERROR => writer.write_str("ERROR: ")?,
                _ => {}
            }
        }

        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
