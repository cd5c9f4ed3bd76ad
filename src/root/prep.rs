use super::root_struct::Root;
use super::state::State;
use crate::config::Config;
use crate::error::{BuildrootError, BuildrootResult};
use crate::util::{CommandOutput, quote_path};
use chrono::{DateTime, Local};
use log::{debug, info, warn};
use nix::unistd::{getgid, getuid};
use std::fs::{self, File};
use std::os::unix::fs::symlink;
use std::path::{Component, Path, PathBuf};

/// Directories every root needs before the package manager can run in it.
const SCAFFOLD_DIRS: &[&str] = &[
    "var/lib/rpm",
    "var/log",
    "var/lock/rpm",
    "dev",
    "etc/rpm",
    "tmp",
    "var/tmp",
    "etc/yum.repos.d",
];

/// Files that tools inside the root expect to exist, even empty.
const TOUCHED_FILES: &[&str] = &["etc/mtab", "etc/fstab", "var/log/yum.log"];

const HOST_RESOLV: &str = "/etc/resolv.conf";
const PACKAGE_MANAGER_CONF: &str = "etc/yum.conf";

/// How `prep` gets the root's package set into shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepPlan {
    /// Restore the root from the cache archive first
    pub unpack_cache: bool,
    /// Package manager subcommand to run against the root
    pub command: String,
    /// Archive the freshly bootstrapped root afterwards
    pub create_cache: bool,
}

/// Chooses between restoring from the cache and bootstrapping from scratch.
/// `cache_age_days` is `None` when there is no cache archive.
pub fn plan_prep(config: &Config, cache_age_days: Option<f64>) -> PrepPlan {
    let update = "update".to_string();

    if !config.use_cache {
        return PrepPlan {
            unpack_cache: false,
            command: if config.clean {
                config.chroot_setup_cmd.clone()
            } else {
                update
            },
            create_cache: false,
        };
    }

    let expired = match cache_age_days {
        Some(age) => {
            config.max_cache_age_days > 0
                && age > config.max_cache_age_days as f64
        }
        None => false,
    };

    if cache_age_days.is_some() && !config.rebuild_cache && !expired {
        // A root that wasn't cleaned still has everything the cache would give it
        PrepPlan {
            unpack_cache: config.clean,
            command: update,
            create_cache: false,
        }
    } else {
        PrepPlan {
            unpack_cache: false,
            command: config.chroot_setup_cmd.clone(),
            create_cache: config.clean,
        }
    }
}

/// Age of a file's last modification in days.
pub fn file_age_days(path: &Path) -> Option<f64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let modified: DateTime<Local> = modified.into();
    let age = Local::now().signed_duration_since(modified);
    Some(age.num_seconds() as f64 / 86_400.0)
}

impl Root {
    /// Brings the root to the point where build dependencies can be
    /// installed: scaffolding, package set, build user and build directory.
    pub fn prep(&mut self) -> BuildrootResult<()> {
        self.set_state(State::Prep)?;
        info!("Preparing build root {}, this may take a while", self.root_dir.display());
        debug!("uid:{}, gid:{}", getuid(), getgid());

        let cache_age = file_age_days(&self.cache_file);
        if let Some(age) = cache_age {
            debug!("cache {} is {:.1} days old", self.cache_file.display(), age);
        }
        let plan = plan_prep(&self.config, cache_age);
        debug!("prep plan: {:?}", plan);

        if plan.unpack_cache {
            self.unpack()?;
        }

        let mut scope = self.unmount_on_failure();
        scope.prep_install()?;
        scope.package_manager(&plan.command)?;
        scope.prep_build()?;
        scope.succeed();

        if plan.create_cache {
            self.pack()?;
        }

        Ok(())
    }

    /// Lays out the skeleton the package manager installs into.
    pub(crate) fn prep_install(&mut self) -> BuildrootResult<()> {
        let mut dirs = vec![
            self.base_dir.clone(),
            self.root_dir.clone(),
            self.state_dir.clone(),
            self.result_dir.clone(),
        ];
        dirs.extend(SCAFFOLD_DIRS.iter().map(|d| self.root_dir.join(d)));
        for dir in dirs {
            self.ensure_dir(&dir)?;
        }

        self.mount_all()?;

        for file in TOUCHED_FILES {
            let path = self.root_dir.join(file);
            if !path.exists() {
                File::create(&path)?;
            }
        }

        self.fix_etc_permissions()?;

        // Always rewritten so a changed configuration takes effect
        let conf = self.root_dir.join(PACKAGE_MANAGER_CONF);
        fs::write(&conf, &self.config.package_manager_conf)?;
        let conf_dir = self.root_dir.join("etc/yum");
        self.ensure_dir(&conf_dir)?;
        let conf_link = conf_dir.join("yum.conf");
        if fs::symlink_metadata(&conf_link).is_err() {
            symlink("../yum.conf", &conf_link)?;
        }

        if self.config.use_host_resolv {
            self.copy_host_resolv()?;
        }

        let files = self.config.files.clone();
        for (path, content) in &files {
            let target = self.overlay_path(path)?;
            if target.exists() {
                continue;
            }
            if let Some(parent) = target.parent() {
                self.ensure_dir(parent)?;
            }
            fs::write(&target, content)?;
        }

        Ok(())
    }

    /// Gets the root ready for a build once its packages are in place.
    pub(crate) fn prep_build(&mut self) -> BuildrootResult<()> {
        self.make_build_user()?;
        self.build_dir_setup()?;
        // The package manager may have shadowed the mount points
        self.mount_all()
    }

    /// Runs the package manager against the root and returns what it said,
    /// whatever its exit status.
    pub(crate) fn package_manager_output(
        &mut self,
        subcommand: &str,
    ) -> BuildrootResult<(String, CommandOutput)> {
        self.mount_all()?;
        let command = format!(
            "{} --installroot {} {}",
            self.config.package_manager,
            quote_path(&self.root_dir),
            subcommand
        );
        debug!("package manager: {}", command);
        let out = self.do_host(command.clone()).map_err(|e| {
            self.fail(BuildrootError::PackageManager(format!(
                "Error performing package manager command: {}: {}",
                command, e
            )))
        })?;
        Ok((command, out))
    }

    pub(crate) fn package_manager(
        &mut self,
        subcommand: &str,
    ) -> BuildrootResult<CommandOutput> {
        let (command, out) = self.package_manager_output(subcommand)?;
        if !out.success() {
            return Err(self.fail(BuildrootError::PackageManager(format!(
                "Error performing package manager command: {}",
                command
            ))));
        }
        Ok(out)
    }

    pub(crate) fn fix_etc_permissions(&mut self) -> BuildrootResult<()> {
        let etc = quote_path(&self.root_dir.join("etc"));
        self.do_host(format!("{} 2775 {}", self.config.chmod, etc))?;
        self.do_host(format!(
            "{} {}.{} {}",
            self.config.chown, self.config.chroot_uid, self.config.chroot_gid, etc
        ))?;
        Ok(())
    }

    fn copy_host_resolv(&mut self) -> BuildrootResult<()> {
        let host = Path::new(HOST_RESOLV);
        if !host.exists() {
            warn!("{} does not exist, the build root has no name resolution", HOST_RESOLV);
            return Ok(());
        }
        let dest = self.root_dir.join("etc/resolv.conf");
        if fs::symlink_metadata(&dest).is_ok() {
            fs::remove_file(&dest)?;
        }
        fs::copy(host, &dest)?;
        Ok(())
    }

    /// Maps a configured file path into the root, refusing anything that
    /// would land outside it.
    fn overlay_path(&mut self, path: &str) -> BuildrootResult<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if relative.as_os_str().is_empty() || escapes {
            return Err(self.fail(BuildrootError::Root(format!(
                "Invalid path for file in build root: {}",
                path
            ))));
        }
        Ok(self.root_dir.join(relative))
    }
}
