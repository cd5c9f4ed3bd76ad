use crate::util::ROOT_LOG;
use colored::{ColoredString, Colorize};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::io::{self, Write};
use std::sync::Mutex;

/// Console logger. Holds records back until the configured level is known,
/// then replays the ones that pass.
pub struct BuildrootLogger {
    level: Mutex<LevelFilter>,
    output: Mutex<Box<dyn Write + Send>>,
    deferred: Mutex<Vec<(Level, ColoredString)>>,
    defer_output: Mutex<bool>,
}

impl BuildrootLogger {
    pub fn new(level: LevelFilter) -> &'static Self {
        Box::leak(Box::new(Self {
            level: Mutex::new(level),
            output: Mutex::new(Box::new(io::stderr())),
            deferred: Mutex::new(Vec::new()),
            defer_output: Mutex::new(true),
        }))
    }

    pub fn init(&'static self) -> Result<&'static Self, log::SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(LevelFilter::Trace);
        Ok(self)
    }

    pub fn set_level(&self, level: LevelFilter) {
        *self.level.lock().expect("Failed to lock level") = level;
    }

    pub fn print_deferred(&self) {
        {
            let deferred =
                self.deferred.lock().expect("Failed to lock deferred");
            let level_filter =
                *self.level.lock().expect("Failed to lock level");
            let mut output = self.output.lock().expect("Failed to lock output");
            for (level, message) in deferred.iter() {
                if level <= &level_filter {
                    let _ = writeln!(output, "{}", message);
                }
            }
        }
        self.deferred
            .lock()
            .expect("Failed to lock deferred")
            .clear();
        *self
            .defer_output
            .lock()
            .expect("Failed to lock defer_output") = false;
    }
}

/// `buildroot::root::prep` becomes `root::prep`; lines mirrored from the
/// root log keep the log's name.
fn short_target(target: &str) -> &str {
    target.strip_prefix("buildroot::").unwrap_or(target)
}

pub fn format_line(level: Level, target: &str, message: &str) -> ColoredString {
    let (level_str, color) = match level {
        Level::Error => (level.to_string(), colored::Color::Red),
        Level::Warn => (format!("{} ", level), colored::Color::Yellow),
        Level::Info => (format!("{} ", level), colored::Color::White),
        Level::Debug => (level.to_string(), colored::Color::Blue),
        Level::Trace => (level.to_string(), colored::Color::BrightBlack),
    };
    let line = if target == ROOT_LOG {
        format!("[{}] {} | {}", level_str, ROOT_LOG, message)
    } else {
        format!("[{}] {}: {}", level_str, short_target(target), message)
    };
    line.color(color)
}

impl Log for BuildrootLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= *self.level.lock().expect("Failed to lock level")
    }

    fn log(&self, record: &Record) {
        let line = format_line(
            record.level(),
            record.target(),
            &record.args().to_string(),
        );
        if *self
            .defer_output
            .lock()
            .expect("Failed to lock defer_output")
        {
            self.deferred
                .lock()
                .expect("Failed to lock deferred")
                .push((record.level(), line));
        } else if self.enabled(record.metadata()) {
            let mut output = self.output.lock().expect("Failed to lock output");
            let _ = writeln!(output, "{}", line);
        }
    }

    fn flush(&self) {
        let _ = self.output.lock().expect("Failed to lock output").flush();
    }
}
