//! Logging for the navigation executables
//!
//! Records go to stdout with coloured levels and to the session log file without colour. Each
//! line starts with the time since the session epoch and a three letter level:
//!
//! ```text
//! [  12.345678 INF] Control loop started
//! [  12.346001 DBG] nav_lib::orchestrator (main): Wheels: L 0.0 cm/s (100 %), R 0.0 cm/s (100 %)
//! ```
//!
//! Debug and trace records also carry the target and the name of the thread which logged them.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use colored::Colorize;
use log::{info, Level, Record};
use thiserror::Error;

use crate::session::{self, Session};

pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Dependencies which are too chatty below `INFO`.
const QUIET_TARGETS: [&str; 2] = ["rppal", "pwm_pca9685"];

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("The log level must be at least `INFO`, got `{0}`")]
    InvalidMinLogLevel(LevelFilter),

    #[error("Cannot open the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("Cannot install the logger: {0}")]
    FernInitError(log::SetLoggerError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Install the logger for this execution.
///
/// `min_level` must let `INFO` records through. Must only be called once per process.
pub fn logger_init(min_level: LevelFilter, session: &Session) -> Result<(), LoggerInitError> {
    if min_level < Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level));
    }

    let log_file =
        fern::log_file(&session.log_file_path).map_err(LoggerInitError::LogFileInitError)?;

    let mut dispatch = fern::Dispatch::new().level(min_level);
    for target in QUIET_TARGETS.iter() {
        dispatch = dispatch.level_for(*target, LevelFilter::Info);
    }

    let stdout = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("{}", format_line(record, message, true)))
        })
        .chain(std::io::stdout());

    let file = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("{}", format_line(record, message, false)))
        })
        .chain(log_file);

    dispatch
        .chain(stdout)
        .chain(file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised at {:?}", min_level);
    if let Ok(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    Log file: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn format_line(record: &Record, message: &std::fmt::Arguments, colour: bool) -> String {
    let thread = std::thread::current();

    render(
        session::get_elapsed_seconds(),
        record.level(),
        record.target(),
        thread.name(),
        &message.to_string(),
        colour,
    )
}

/// Lay out one log line.
fn render(
    elapsed_s: f64,
    level: Level,
    target: &str,
    thread: Option<&str>,
    message: &str,
    colour: bool,
) -> String {
    let tag = level_tag(level);
    let tag = match colour {
        true => paint(level, tag),
        false => tag.to_string(),
    };

    if level <= Level::Info {
        return format!("[{:10.6} {}] {}", elapsed_s, tag, message);
    }

    format!(
        "[{:10.6} {}] {} ({}): {}",
        elapsed_s,
        tag,
        target,
        thread.unwrap_or("unnamed"),
        message
    )
}

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Trace => "TRC",
        Level::Debug => "DBG",
        Level::Info => "INF",
        Level::Warn => "WRN",
        Level::Error => "ERR",
    }
}

fn paint(level: Level, tag: &str) -> String {
    let painted = match level {
        Level::Trace => tag.dimmed().italic(),
        Level::Debug => tag.dimmed(),
        Level::Info => tag.normal(),
        Level::Warn => tag.yellow(),
        Level::Error => tag.red().bold(),
    };

    painted.to_string()
}
