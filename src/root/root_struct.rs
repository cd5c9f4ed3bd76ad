use super::state::{State, StateTracker};
use crate::config::Config;
use crate::util::{
    CommandRunner, Executor, MountEntry, MountTable, RequiresReader, RpmQuery,
    ShellRunner,
};
use std::path::{Path, PathBuf};

/// A build root: the directory tree packages are built in, the mounts that
/// make it usable, and the logs and state file describing what happened.
/// Owns all of it exclusively until `close`.
pub struct Root {
    pub config: Config,
    /// `<basedir>/<root>[-<unique_ext>]`
    pub base_dir: PathBuf,
    /// The filesystem root the build runs in, `<base_dir>/root`
    pub root_dir: PathBuf,
    pub state_dir: PathBuf,
    pub result_dir: PathBuf,
    /// Build user's home, as seen from inside the root
    pub home_dir: PathBuf,
    /// rpm topdir, as seen from inside the root
    pub build_dir: PathBuf,
    pub cache_file: PathBuf,
    pub(crate) state: StateTracker,
    pub(crate) mounts: MountTable,
    pub(crate) exec: Executor,
    pub(crate) requires: Box<dyn RequiresReader>,
    /// Last line `fail` wrote, so an error isn't recorded twice
    pub(crate) last_failure: Option<String>,
}

/// The external tools a root drives.
pub struct Collaborators {
    pub runner: Box<dyn CommandRunner>,
    pub requires: Box<dyn RequiresReader>,
}

impl Collaborators {
    pub fn system(config: &Config) -> Self {
        Self {
            runner: Box::new(ShellRunner::new(config.chroot.as_str())),
            requires: Box::new(RpmQuery::new(config.rpm.as_str())),
        }
    }
}

impl Root {
    pub fn state(&self) -> State {
        self.state.get()
    }

    pub fn mounts(&self) -> &[MountEntry] {
        self.mounts.entries()
    }

    /// Where a path inside the root lives on the host.
    pub fn host_path(&self, inner: &Path) -> PathBuf {
        self.root_dir
            .join(inner.strip_prefix("/").unwrap_or(inner))
    }

    /// The inverse of `host_path`.
    pub fn inner_path(&self, host: &Path) -> PathBuf {
        match host.strip_prefix(&self.root_dir) {
            Ok(rel) => Path::new("/").join(rel),
            Err(_) => host.to_path_buf(),
        }
    }
}
