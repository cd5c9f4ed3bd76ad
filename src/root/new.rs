use super::root_struct::{Collaborators, Root};
use super::state::{State, StateTracker};
use crate::config::{Config, is_strictly_under, is_valid_name};
use crate::error::{BuildrootError, BuildrootResult};
use crate::util::{
    CommandOutput, Executor, Invocation, LogSinks, MountTable, ensure_dir,
    quote,
};
use log::{debug, error};
use std::path::Path;

pub const CONFIG_LOG: &str = "mockconfig.log";
const MOUNT_TRACK_FILE: &str = "mounted-locations";

impl Root {
    /// Lays out the root's directories, cleaning them first when the config
    /// asks for it, and opens the logs in the result directory.
    pub fn new(
        config: Config,
        collaborators: Collaborators,
        logs: LogSinks,
    ) -> BuildrootResult<Root> {
        let root_name = match &config.unique_ext {
            Some(ext) => format!("{}-{}", config.root, ext),
            None => config.root.clone(),
        };
        let mut names = std::iter::once(&config.root).chain(config.unique_ext.as_ref());
        if let Some(bad) = names.find(|name| !is_valid_name(name)) {
            return Err(BuildrootError::Root(format!(
                "Invalid build root name: {:?}",
                bad
            )));
        }
        let base_dir = config.basedir.join(&root_name);
        if !is_strictly_under(&base_dir, &config.storage_prefix) {
            return Err(BuildrootError::Root(format!(
                "Cannot change basedir location! {} is not under {}",
                base_dir.display(),
                config.storage_prefix.display()
            )));
        }

        let root_dir = base_dir.join("root");
        let home_dir = config.chroot_home.clone();
        let build_dir = home_dir.join("build");
        let cache_file = config
            .basedir
            .join(&config.cache_topdir)
            .join(format!("{}{}", config.root, config.cache_ext));
        let result_dir = config
            .resultdir
            .clone()
            .unwrap_or_else(|| base_dir.join("result"));
        let state_dir = config
            .statedir
            .clone()
            .unwrap_or_else(|| base_dir.join("state"));

        let mounts = MountTable::new(
            &root_dir,
            &config.mount,
            &config.umount,
            &state_dir.join(MOUNT_TRACK_FILE),
        );
        let clean = config.clean;

        let mut root = Root {
            state: StateTracker::new(&state_dir),
            exec: Executor::new(collaborators.runner, logs),
            requires: collaborators.requires,
            config,
            base_dir,
            root_dir,
            state_dir,
            result_dir,
            home_dir,
            build_dir,
            cache_file,
            mounts,
            last_failure: None,
        };

        root.ensure_dir(&root.state_dir.clone())?;
        root.set_state(State::Init)?;

        if clean {
            root.clean()?;
            // clean took the state directory with it when it lives in the base dir
            root.ensure_dir(&root.state_dir.clone())?;
            root.set_state(State::Init)?;
        }

        for dir in [
            root.base_dir.clone(),
            root.root_dir.clone(),
            root.state_dir.clone(),
            root.result_dir.clone(),
        ] {
            root.ensure_dir(&dir)?;
        }

        root.exec.logs.open(&root.result_dir).map_err(|e| {
            BuildrootError::Generic(format!(
                "Failed to open logs in {}: {}",
                root.result_dir.display(),
                e
            ))
        })?;

        let cfg_log = format!(
            "rootdir = {}\nresultdir = {}\nstatedir = {}\n",
            root.root_dir.display(),
            root.result_dir.display(),
            root.state_dir.display()
        );
        std::fs::write(root.result_dir.join(CONFIG_LOG), cfg_log)
            .map_err(|e| root.fail(e.into()))?;

        Ok(root)
    }

    pub(crate) fn set_state(&mut self, state: State) -> BuildrootResult<()> {
        self.state.set(state)?;
        self.exec.logs.root(&format!("State changed: {}", state));
        Ok(())
    }

    pub(crate) fn ensure_dir(&mut self, path: &Path) -> BuildrootResult<()> {
        let msg = format!("ensuring dir {}", path.display());
        debug!("{}", msg);
        self.exec.logs.root(&msg);
        ensure_dir(path)
    }

    /// Records an error in `root.log` on its way out.
    pub(crate) fn fail(&mut self, err: BuildrootError) -> BuildrootError {
        let line = format!("{}: {}", err.kind(), err);
        error!("{}", line);
        self.exec.logs.root(&line);
        self.last_failure = Some(line);
        err
    }

    /// Like `fail`, for errors that may already have been through it.
    pub(crate) fn report(&mut self, err: BuildrootError) -> BuildrootError {
        let line = format!("{}: {}", err.kind(), err);
        if self.last_failure.as_deref() == Some(line.as_str()) {
            return err;
        }
        self.fail(err)
    }

    pub(crate) fn mount_all(&mut self) -> BuildrootResult<()> {
        self.mounts.attach_all(&mut self.exec)
    }

    pub(crate) fn umount_all(&mut self) -> BuildrootResult<()> {
        self.mounts.detach_all(&mut self.exec)
    }

    /// Wraps a command so it runs as the unprivileged build user.
    pub(crate) fn as_build_user(&self, command: &str) -> String {
        format!(
            "{} -c {} {}",
            self.config.runuser,
            quote(command),
            quote(&self.config.chroot_user)
        )
    }

    /// Runs a command as root inside the build root.
    pub(crate) fn do_chroot(
        &mut self,
        command: String,
    ) -> BuildrootResult<CommandOutput> {
        let invocation = Invocation::chroot(&self.root_dir, command);
        self.exec.run(&invocation)
    }

    pub(crate) fn do_host(
        &mut self,
        command: String,
    ) -> BuildrootResult<CommandOutput> {
        self.exec.run(&Invocation::host(command))
    }
}
