use log::{debug, info, trace, warn};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const ROOT_LOG: &str = "root.log";
pub const BUILD_LOG: &str = "build.log";

/// An in-memory log that can be inspected while the build root still holds
/// the writing end.
#[derive(Clone, Default)]
pub struct SharedLog(Arc<Mutex<Vec<String>>>);

impl SharedLog {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }

    fn push(&self, line: &str) {
        if let Ok(mut lines) = self.0.lock() {
            lines.push(line.to_string());
        }
    }
}

enum Sink {
    /// Lines written before the result directory exists
    Pending(Vec<String>),
    File(File),
    Shared(SharedLog),
    Closed,
}

impl Sink {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        match self {
            Sink::Pending(lines) => {
                lines.push(line.to_string());
                Ok(())
            }
            Sink::File(file) => writeln!(file, "{}", line),
            Sink::Shared(shared) => {
                shared.push(line);
                Ok(())
            }
            Sink::Closed => {
                trace!("Dropping log line written after close: {}", line);
                Ok(())
            }
        }
    }

    fn open(&mut self, path: &Path) -> io::Result<()> {
        if let Sink::Pending(lines) = self {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)?;
            for line in lines.iter() {
                writeln!(file, "{}", line)?;
            }
            file.flush()?;
            *self = Sink::File(file);
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Sink::File(file) = self {
            let _ = file.flush();
        }
        *self = Sink::Closed;
    }
}

/// The operational (`root.log`) and build output (`build.log`) logs of a
/// single build root. Owned by the root for its whole lifetime.
pub struct LogSinks {
    root: Sink,
    build: Sink,
    verbose: bool,
}

impl LogSinks {
    /// Logs that land in `root.log` and `build.log` inside the result
    /// directory once `open` is called. Anything logged before that is kept
    /// in memory and written out first.
    pub fn files(verbose: bool) -> Self {
        Self {
            root: Sink::Pending(Vec::new()),
            build: Sink::Pending(Vec::new()),
            verbose,
        }
    }

    /// Logs kept in memory, returning handles to read the root and build
    /// logs back.
    pub fn shared(verbose: bool) -> (Self, SharedLog, SharedLog) {
        let root = SharedLog::default();
        let build = SharedLog::default();
        (
            Self {
                root: Sink::Shared(root.clone()),
                build: Sink::Shared(build.clone()),
                verbose,
            },
            root,
            build,
        )
    }

    pub fn open(&mut self, result_dir: &Path) -> io::Result<()> {
        self.root.open(&result_dir.join(ROOT_LOG))?;
        self.build.open(&result_dir.join(BUILD_LOG))?;
        Ok(())
    }

    pub fn root(&mut self, message: &str) {
        for line in message.lines() {
            if self.verbose {
                info!(target: "root.log", "{}", line);
            } else {
                debug!(target: "root.log", "{}", line);
            }
            if let Err(e) = self.root.write_line(line) {
                warn!("Failed to write to {}: {}", ROOT_LOG, e);
            }
        }
    }

    pub fn build(&mut self, message: &str) {
        for line in message.lines() {
            trace!(target: "build.log", "{}", line);
            if let Err(e) = self.build.write_line(line) {
                warn!("Failed to write to {}: {}", BUILD_LOG, e);
            }
        }
    }

    pub fn close_build(&mut self) {
        self.build.close();
    }

    pub fn close_root(&mut self) {
        self.root.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_lines_are_flushed_on_open() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let mut logs = LogSinks::files(false);
        logs.root("ensuring dir /somewhere");
        logs.open(tmp.path())?;
        logs.root("second\nthird");
        logs.build("compiling");
        logs.close_build();
        logs.close_root();

        let root = std::fs::read_to_string(tmp.path().join(ROOT_LOG))?;
        assert_eq!(root, "ensuring dir /somewhere\nsecond\nthird\n");
        let build = std::fs::read_to_string(tmp.path().join(BUILD_LOG))?;
        assert_eq!(build, "compiling\n");
        Ok(())
    }

    #[test]
    fn test_writes_after_close_are_dropped() {
        let (mut logs, root, _build) = LogSinks::shared(false);
        logs.root("before");
        logs.close_root();
        logs.root("after");
        assert_eq!(root.lines(), vec!["before".to_string()]);
    }
}
