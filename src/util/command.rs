use crate::error::{BuildrootError, BuildrootResult};
use crate::util::LogSinks;
use log::{error, trace};
use nix::sys::signal::{Signal, killpg};
use nix::unistd::{Pid, pipe};
use std::borrow::Cow;
use std::fs::File;
use std::io::Read;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// A single external command. Host commands run through `/bin/sh -c`;
/// when `chroot` is set the shell is started inside that directory with the
/// configured chroot tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub chroot: Option<PathBuf>,
    pub timeout: Option<u64>,
}

impl Invocation {
    pub fn host(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            chroot: None,
            timeout: None,
        }
    }

    pub fn chroot(root: impl Into<PathBuf>, command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            chroot: Some(root.into()),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = if seconds == 0 { None } else { Some(seconds) };
        self
    }
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.chroot {
            Some(root) => write!(f, "[chroot {}] {}", root.display(), self.command),
            None => write!(f, "{}", self.command),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    /// stdout and stderr interleaved in the order they were written
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Runs external commands. Implementations only report what happened;
/// deciding which error kind a failure becomes is left to the caller.
pub trait CommandRunner {
    fn run(&mut self, invocation: &Invocation) -> BuildrootResult<CommandOutput>;
}

/// Runs commands for real. Each command becomes the leader of its own
/// process group so a timeout can take down everything it spawned.
pub struct ShellRunner {
    chroot_cmd: String,
}

impl ShellRunner {
    pub fn new(chroot_cmd: impl Into<String>) -> Self {
        Self {
            chroot_cmd: chroot_cmd.into(),
        }
    }

    fn build_command(&self, invocation: &Invocation) -> Command {
        match &invocation.chroot {
            Some(root) => {
                let mut cmd = Command::new(&self.chroot_cmd);
                cmd.arg(root).args(["/bin/sh", "-c", &invocation.command]);
                cmd
            }
            None => {
                let mut cmd = Command::new("/bin/sh");
                cmd.args(["-c", &invocation.command]);
                cmd
            }
        }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&mut self, invocation: &Invocation) -> BuildrootResult<CommandOutput> {
        trace!("Running {}", invocation);

        // One pipe shared by stdout and stderr keeps the output interleaved
        let (read_fd, write_fd) = pipe().map_err(|e| {
            BuildrootError::Generic(format!("Failed to create output pipe: {}", e))
        })?;
        let stderr_fd = write_fd.try_clone()?;

        let mut cmd = self.build_command(invocation);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(write_fd))
            .stderr(Stdio::from(stderr_fd))
            .process_group(0);

        let mut child = cmd.spawn().map_err(|e| {
            BuildrootError::Generic(format!(
                "Failed to execute {}: {}",
                invocation, e
            ))
        })?;
        // Our copies of the write ends must go away or the reader never sees EOF
        drop(cmd);

        let reader = thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = File::from(read_fd).read_to_end(&mut buf);
            buf
        });

        let pgid = Pid::from_raw(child.id() as i32);
        let timed_out = Arc::new(AtomicBool::new(false));
        let watchdog = invocation.timeout.map(|seconds| {
            spawn_watchdog(pgid, seconds, timed_out.clone())
        });

        let status = child.wait();
        // Anything left in the group can still hold the pipe open, so the
        // deadline covers the read as well as the leader
        let output = reader.join().unwrap_or_default();

        if let Some((done, handle)) = watchdog {
            let _ = done.send(());
            let _ = handle.join();
        }

        let output = String::from_utf8_lossy(&output).into_owned();
        let status = status.map_err(|e| {
            BuildrootError::Generic(format!(
                "Failed to wait for {}: {}",
                invocation, e
            ))
        })?;

        if timed_out.load(Ordering::Acquire) {
            return Err(BuildrootError::CommandTimeoutExpired {
                command: invocation.command.clone(),
                timeout: invocation.timeout.unwrap_or_default(),
                output,
            });
        }

        let status = status
            .code()
            .unwrap_or_else(|| 128 + status.signal().unwrap_or(0));
        trace!("{} exited with {}", invocation, status);

        Ok(CommandOutput { status, output })
    }
}

/// Starts the countdown for a running command. Dropping or signalling the
/// returned sender before the deadline disarms it; otherwise the whole
/// process group is killed and `timed_out` is raised.
fn spawn_watchdog(
    pgid: Pid,
    seconds: u64,
    timed_out: Arc<AtomicBool>,
) -> (mpsc::Sender<()>, thread::JoinHandle<()>) {
    let (done, finished) = mpsc::channel::<()>();
    let handle = thread::spawn(move || {
        if let Err(mpsc::RecvTimeoutError::Timeout) =
            finished.recv_timeout(Duration::from_secs(seconds))
        {
            error!(
                "Timeout ({}s) exceeded, killing process group {}",
                seconds, pgid
            );
            timed_out.store(true, Ordering::Release);
            if let Err(e) = killpg(pgid, Signal::SIGKILL) {
                error!("Failed to kill process group {}: {}", pgid, e);
            }
        }
    });
    (done, handle)
}

/// Quotes a single word for `/bin/sh`.
pub fn quote(word: &str) -> String {
    shell_escape::unix::escape(Cow::Borrowed(word)).into_owned()
}

pub fn quote_path(path: &Path) -> String {
    quote(&path.to_string_lossy())
}

/// Pairs a runner with the root's logs so that every command line and its
/// result ends up in `root.log`.
pub struct Executor {
    runner: Box<dyn CommandRunner>,
    pub logs: LogSinks,
}

impl Executor {
    pub fn new(runner: Box<dyn CommandRunner>, logs: LogSinks) -> Self {
        Self { runner, logs }
    }

    pub fn run(&mut self, invocation: &Invocation) -> BuildrootResult<CommandOutput> {
        self.logs.root(&format!("Executing command: {}", invocation));
        let result = self.runner.run(invocation);
        match &result {
            Ok(out) => {
                self.logs.root(&out.output);
                self.logs
                    .root(&format!("Child returncode was: {}", out.status));
            }
            Err(e) => self.logs.root(&e.to_string()),
        }
        result
    }

    /// Like `run`, but the command's output goes to `build.log`.
    pub fn run_build(
        &mut self,
        invocation: &Invocation,
    ) -> BuildrootResult<CommandOutput> {
        self.logs.root(&format!("Executing command: {}", invocation));
        let result = self.runner.run(invocation);
        match &result {
            Ok(out) => {
                self.logs.build(&out.output);
                self.logs
                    .root(&format!("Child returncode was: {}", out.status));
            }
            Err(e) => {
                if let BuildrootError::CommandTimeoutExpired { output, .. } = e {
                    self.logs.build(output);
                }
                self.logs.root(&e.to_string());
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote() {
        assert_eq!(quote("gcc"), "gcc");
        assert_eq!(quote("libfoo >= 1.2"), "'libfoo >= 1.2'");
    }

    #[test]
    fn test_executor_logs_commands() {
        let (logs, root, _build) = LogSinks::shared(false);
        let mut exec = Executor::new(Box::new(ShellRunner::new("chroot")), logs);
        exec.run(&Invocation::host("echo hello")).unwrap();
        assert!(root.contains("Executing command: echo hello"));
        assert!(root.contains("hello"));
        assert!(root.contains("Child returncode was: 0"));

        let out = exec.run(&Invocation::host("exit 2")).unwrap();
        assert!(!out.success());
        assert!(root.contains("Child returncode was: 2"));
    }

    #[test]
    fn test_captures_combined_output() {
        let mut runner = ShellRunner::new("/usr/sbin/chroot");
        let out = runner
            .run(&Invocation::host("echo out; echo err 1>&2; exit 3"))
            .unwrap();
        assert_eq!(out.status, 3);
        assert!(out.output.contains("out"));
        assert!(out.output.contains("err"));
        assert!(!out.success());
    }

    #[test]
    fn test_zero_timeout_means_none() {
        let inv = Invocation::host("true").with_timeout(0);
        assert_eq!(inv.timeout, None);
        let inv = Invocation::host("true").with_timeout(5);
        assert_eq!(inv.timeout, Some(5));
    }

    #[test]
    fn test_display_marks_chroot() {
        let inv = Invocation::chroot("/var/lib/buildroot/x/root", "ls");
        assert_eq!(inv.to_string(), "[chroot /var/lib/buildroot/x/root] ls");
    }
}
