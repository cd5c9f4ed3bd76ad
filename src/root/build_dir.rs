use super::root_struct::Root;
use crate::error::{BuildrootError, BuildrootResult};
use crate::util::quote_path;
use std::fs;

/// rpm's topdir layout, plus a place to keep the source package as given.
pub const BUILD_SUBDIRS: &[&str] =
    &["RPMS", "SRPMS", "SOURCES", "SPECS", "BUILD", "originals"];

const MACROS_FILE: &str = ".rpmmacros";

/* rpm's lock file has to be somewhere the build user can write */
const RPMLOCK_MACRO: &str = "%_rpmlock_path /var/lib/rpm/__db.000";

impl Root {
    /// Gives the build user a fresh, empty rpm topdir in its home.
    pub(crate) fn build_dir_setup(&mut self) -> BuildrootResult<()> {
        self.fix_etc_permissions()?;

        let build_dir = self.host_path(&self.build_dir);
        if fs::symlink_metadata(&build_dir).is_ok() {
            fs::remove_dir_all(&build_dir).map_err(|e| {
                self.fail(BuildrootError::Root(format!(
                    "Failed to remove old build dir {}: {}",
                    build_dir.display(),
                    e
                )))
            })?;
        }
        for sub in BUILD_SUBDIRS {
            self.ensure_dir(&build_dir.join(sub))?;
        }

        let home = quote_path(&self.home_dir);
        let owner = format!(
            "{}.{}",
            self.config.chroot_user, self.config.chroot_group
        );
        for command in [
            format!("chown -R {} {}", owner, home),
            format!("chmod -R 0777 {}", home),
        ] {
            let out = self.do_chroot(command.clone())?;
            if !out.success() {
                return Err(self.fail(BuildrootError::Root(format!(
                    "Failed to set up build dir: {}",
                    command
                ))));
            }
        }

        let macros = self.host_path(&self.home_dir).join(MACROS_FILE);
        if !macros.exists() {
            let mut contents = self.config.macros.clone();
            if !contents.ends_with('\n') {
                contents.push('\n');
            }
            contents.push_str(RPMLOCK_MACRO);
            contents.push('\n');
            fs::write(&macros, contents)?;
        }

        Ok(())
    }
}
