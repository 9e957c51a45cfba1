//! Logging backend
//!
//! Routes the `log` facade to a platform console. The platform supplies a sink
//! that writes one formatted line (UART, semihosting, RTT, ...). Lines are
//! prefixed with a sequence number since the crate has no clock of its own.

use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

use log::{Level, LevelFilter, Metadata, Record};
use spin::Once;

/// Platform console writer for one log line
pub type LogSink = fn(&fmt::Arguments<'_>);

static SINK: Once<LogSink> = Once::new();

/// Number of records emitted so far
static SEQUENCE: AtomicUsize = AtomicUsize::new(0);

fn level_str(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN ",
        Level::Info => "INFO ",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

struct SinkLogger;

impl log::Log for SinkLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let Some(sink) = SINK.get() else {
            return;
        };
        let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        sink(&format_args!(
            "[{:>10}] [{}] {}",
            seq,
            level_str(record.level()),
            record.args()
        ));
    }

    fn flush(&self) {}
}

static LOGGER: SinkLogger = SinkLogger;

/// Install the logger with `sink` as output.
///
/// Only the first sink is kept; a second call fails like [`log::set_logger`].
pub fn init(sink: LogSink, level: LevelFilter) -> Result<(), log::SetLoggerError> {
    SINK.call_once(|| sink);
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

/// Set the maximum log level
pub fn set_level(level: LevelFilter) {
    log::set_max_level(level);
}
