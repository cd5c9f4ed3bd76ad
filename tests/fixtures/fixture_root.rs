use buildroot::config::Config;
use buildroot::error::{BuildrootError, BuildrootResult};
use buildroot::root::{Collaborators, Root};
use buildroot::util::{
    CommandOutput, CommandRunner, Executor, Invocation, LogSinks,
    RequiresReader, SharedLog,
};
use rand::Rng;
use rstest::*;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const SRPM_NAME: &str = "foo-1.0-1.src.rpm";

pub fn rid() -> String {
    let mut rng = rand::rng();
    let rid: String = (0..10)
        .map(|_| rng.sample(rand::distr::Alphanumeric) as char)
        .collect();
    rid.to_lowercase()
}

pub fn ok(output: &str) -> BuildrootResult<CommandOutput> {
    Ok(CommandOutput {
        status: 0,
        output: output.to_string(),
    })
}

pub fn exit(status: i32, output: &str) -> BuildrootResult<CommandOutput> {
    Ok(CommandOutput {
        status,
        output: output.to_string(),
    })
}

type Responder = Box<dyn FnMut(&Invocation) -> BuildrootResult<CommandOutput>>;

/// Every command the runner was asked to execute, in order.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Invocation>>>);

impl CallLog {
    pub fn invocations(&self) -> Vec<Invocation> {
        self.0.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.invocations().into_iter().map(|i| i.command).collect()
    }

    pub fn matching(&self, needle: &str) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.contains(needle))
            .collect()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.matching(needle).len()
    }

    /// Package manager invocations, reduced to their subcommand.
    pub fn package_manager_calls(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter_map(|c| {
                let (_, rest) = c.split_once("--installroot ")?;
                let (_, subcommand) = rest.split_once(' ')?;
                Some(subcommand.to_string())
            })
            .collect()
    }
}

/// Stands in for every external tool. The first rule whose needle occurs
/// in the command line answers; anything unmatched succeeds silently.
pub struct FakeRunner {
    calls: CallLog,
    rules: Vec<(String, Responder)>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            calls: CallLog::default(),
            rules: Vec::new(),
        }
    }

    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }

    /// Adds a rule that takes precedence over every rule added before it.
    pub fn on(
        mut self,
        needle: &str,
        respond: impl FnMut(&Invocation) -> BuildrootResult<CommandOutput> + 'static,
    ) -> Self {
        self.rules.insert(0, (needle.to_string(), Box::new(respond)));
        self
    }
}

impl CommandRunner for FakeRunner {
    fn run(&mut self, invocation: &Invocation) -> BuildrootResult<CommandOutput> {
        self.calls.0.lock().unwrap().push(invocation.clone());
        for (needle, respond) in self.rules.iter_mut() {
            if invocation.command.contains(needle.as_str()) {
                return respond(invocation);
            }
        }
        ok("")
    }
}

pub struct FakeRequires {
    requires: Vec<String>,
    calls: Arc<Mutex<usize>>,
}

impl RequiresReader for FakeRequires {
    fn build_requires(
        &self,
        _exec: &mut Executor,
        package: &Path,
        _install_root: &Path,
    ) -> BuildrootResult<Vec<String>> {
        *self.calls.lock().unwrap() += 1;
        if !package.exists() {
            return Err(BuildrootError::Package(format!(
                "{} does not exist",
                package.display()
            )));
        }
        Ok(self.requires.clone())
    }
}

fn touch(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, "").unwrap();
}

/// A build root under a scratch directory, driven by fake tools that leave
/// behind the files the real ones would.
pub struct Harness {
    pub dir: TempDir,
    pub config: Config,
    pub srpm: PathBuf,
}

pub struct Opened {
    pub root: Root,
    pub calls: CallLog,
    pub root_log: SharedLog,
    pub build_log: SharedLog,
    pub requires_calls: Arc<Mutex<usize>>,
}

impl Opened {
    /// Every state the root passed through, as recorded in its log.
    pub fn states(&self) -> Vec<String> {
        self.root_log
            .lines()
            .into_iter()
            .filter_map(|l| l.strip_prefix("State changed: ").map(String::from))
            .collect()
    }
}

#[fixture]
pub fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        root: format!("test-{}", rid()),
        basedir: dir.path().join("roots"),
        storage_prefix: dir.path().to_path_buf(),
        target_arch: "x86_64".to_string(),
        use_cache: false,
        clean: true,
        use_host_resolv: false,
        build_timeout: 0,
        ..Config::default()
    };
    let srpm = dir.path().join(SRPM_NAME);
    std::fs::write(&srpm, "source package").unwrap();
    Harness { dir, config, srpm }
}

impl Harness {
    pub fn base_dir(&self) -> PathBuf {
        self.config.basedir.join(&self.config.root)
    }

    pub fn root_dir(&self) -> PathBuf {
        self.base_dir().join("root")
    }

    pub fn build_dir(&self) -> PathBuf {
        self.root_dir().join("builddir/build")
    }

    pub fn cache_file(&self) -> PathBuf {
        self.config
            .basedir
            .join(&self.config.cache_topdir)
            .join(format!("{}{}", self.config.root, self.config.cache_ext))
    }

    /// Fake tools that behave enough like the real ones for a whole build.
    pub fn tools(&self) -> FakeRunner {
        let root_dir = self.root_dir();
        let build_dir = self.build_dir();
        let cache_file = self.cache_file();

        let useradd = root_dir.join("usr/sbin/useradd");
        let useradd_after_unpack = useradd.clone();
        let spec = build_dir.join("SPECS/foo.spec");
        let srpm = build_dir.join("SRPMS").join(SRPM_NAME);
        let rpm = build_dir.join("RPMS/foo-1.0-1.x86_64.rpm");

        FakeRunner::new()
            .on("/bin/rm -rf", |inv| {
                let path = inv.command.split_whitespace().last().unwrap();
                let _ = std::fs::remove_dir_all(path);
                ok("")
            })
            .on(&self.config.chroot_setup_cmd, move |_| {
                touch(&useradd);
                ok("Installing: bash gcc make rpm-build shadow-utils\n")
            })
            .on("-xzf", move |_| {
                touch(&useradd_after_unpack);
                ok("")
            })
            .on("-czf", move |_| {
                touch(&cache_file);
                ok("")
            })
            .on("rpm -Uvh", move |_| {
                touch(&spec);
                ok("foo-1.0-1\n")
            })
            .on("rpmbuild -bs", move |_| {
                touch(&srpm);
                ok("Wrote: /builddir/build/SRPMS/foo-1.0-1.src.rpm\n")
            })
            .on("rpmbuild --rebuild", move |_| {
                touch(&rpm);
                ok("+ make\ncompiling foo\nWrote: foo-1.0-1.x86_64.rpm\n")
            })
    }

    pub fn open(
        &self,
        runner: FakeRunner,
        requires: &[&str],
    ) -> BuildrootResult<Opened> {
        self.open_with(self.config.clone(), runner, requires)
    }

    pub fn open_with(
        &self,
        config: Config,
        runner: FakeRunner,
        requires: &[&str],
    ) -> BuildrootResult<Opened> {
        let calls = runner.calls();
        let requires_calls = Arc::new(Mutex::new(0));
        let collaborators = Collaborators {
            runner: Box::new(runner),
            requires: Box::new(FakeRequires {
                requires: requires.iter().map(|r| r.to_string()).collect(),
                calls: requires_calls.clone(),
            }),
        };
        let (logs, root_log, build_log) = LogSinks::shared(false);
        let root = Root::new(config, collaborators, logs)?;
        Ok(Opened {
            root,
            calls,
            root_log,
            build_log,
            requires_calls,
        })
    }
}
