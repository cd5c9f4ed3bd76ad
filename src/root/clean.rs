use super::root_struct::Root;
use super::state::State;
use crate::error::{BuildrootError, BuildrootResult};
use crate::util::{get_mounts, quote_path};
use log::{error, warn};
use std::path::Path;

impl Root {
    /// Unmounts everything under the root and removes the whole base
    /// directory.
    pub fn clean(&mut self) -> BuildrootResult<()> {
        self.set_state(State::Clean)?;
        self.exec.logs.root("Cleaning Root");

        if let Err(e) = self.umount_all() {
            warn!("{}", e);
        }

        // A crashed run leaves mounts behind that this process never tracked
        for mount in self.host_mounts() {
            if !self.mounts.detach_path(Path::new(&mount), &mut self.exec)? {
                warn!("Stale mount {} is still attached", mount);
            }
        }
        let leftover = self.host_mounts();
        if !leftover.is_empty() {
            return Err(self.fail(BuildrootError::Root(format!(
                "Refusing to remove {} while these are still mounted: {}",
                self.base_dir.display(),
                leftover.join(", ")
            ))));
        }

        if self.base_dir.exists() {
            let command =
                format!("{} -rf {}", self.config.rm, quote_path(&self.base_dir));
            let out = self.do_host(command)?;
            if !out.success() {
                error!("{}", out.output.trim_end());
            }
            if self.root_dir.exists() {
                return Err(self.fail(BuildrootError::Root(
                    "Failed to clean basedir, exiting".to_string(),
                )));
            }
        }

        Ok(())
    }

    fn host_mounts(&self) -> Vec<String> {
        match get_mounts(&self.root_dir) {
            Ok(mounts) => mounts,
            Err(e) => {
                warn!("Could not read the host mount table: {:#}", e);
                Vec::new()
            }
        }
    }
}
