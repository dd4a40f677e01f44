use colored::{Color, ColoredString, Colorize};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard};

struct LoggerState {
    level: LevelFilter,
    output: Box<dyn Write + Send>,
    /// Messages logged before the configured level is known. `None` once
    /// flushed, after which lines are written as they come.
    deferred: Option<Vec<(Level, ColoredString)>>,
}

/**
 * Colored stderr logger. Config files can change the log level, so anything
 * logged while they are being read is held back and replayed through the final
 * level by `print_deferred`.
 */
pub struct ArchSandboxLogger {
    state: Mutex<LoggerState>,
}

impl ArchSandboxLogger {
    pub fn new(level: LevelFilter) -> &'static Self {
        Self::with_output(level, Box::new(io::stderr()))
    }

    fn with_output(
        level: LevelFilter,
        output: Box<dyn Write + Send>,
    ) -> &'static Self {
        Box::leak(Box::new(Self {
            state: Mutex::new(LoggerState {
                level,
                output,
                deferred: Some(Vec::new()),
            }),
        }))
    }

    pub fn init(&'static self) -> Result<&'static Self, log::SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(LevelFilter::Trace);
        Ok(self)
    }

    fn state(&self) -> MutexGuard<'_, LoggerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn set_level(&self, level: LevelFilter) {
        self.state().level = level;
    }

    pub fn print_deferred(&self) {
        let mut state = self.state();
        let Some(deferred) = state.deferred.take() else {
            return;
        };
        let level = state.level;
        for (message_level, message) in deferred {
            if message_level <= level {
                let _ = writeln!(state.output, "{}", message);
            }
        }
    }
}

fn style(level: Level) -> (String, Color) {
    match level {
        Level::Error => (level.to_string(), Color::Red),
        Level::Warn => (format!("{} ", level), Color::Yellow),
        Level::Info => (format!("{} ", level), Color::White),
        Level::Debug => (level.to_string(), Color::Blue),
        Level::Trace => (level.to_string(), Color::BrightBlack),
    }
}

impl Log for ArchSandboxLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.state().level
    }

    fn log(&self, record: &Record) {
        let (level_str, color) = style(record.level());
        let line = format!(
            "[{}] {}: {}",
            level_str.color(color),
            record.target(),
            record.args()
        )
        .color(color);

        let mut guard = self.state();
        let state = &mut *guard;
        if let Some(deferred) = state.deferred.as_mut() {
            deferred.push((record.level(), line));
        } else if record.level() <= state.level {
            let _ = writeln!(state.output, "{}", line);
        }
    }

    fn flush(&self) {
        let _ = self.state().output.flush();
    }
}
