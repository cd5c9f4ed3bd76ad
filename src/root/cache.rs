use super::root_struct::Root;
use super::state::State;
use crate::error::{BuildrootError, BuildrootResult};
use crate::util::quote_path;
use log::{error, info};
use std::path::Path;

impl Root {
    /// Restores the root from the cache archive.
    pub(crate) fn unpack(&mut self) -> BuildrootResult<()> {
        self.set_state(State::UnpackCache)?;
        info!("Unpacking {}", self.cache_file.display());
        let command = self.archive_command(&self.config.unpack_cmd);
        let out = self.do_host(command)?;
        if !out.success() {
            error!("{}", out.output.trim_end());
            return Err(self.fail(BuildrootError::Root(format!(
                "Failed to unpack cache {}",
                self.cache_file.display()
            ))));
        }
        Ok(())
    }

    /// Archives the freshly prepared root so later runs can skip the
    /// bootstrap.
    pub(crate) fn pack(&mut self) -> BuildrootResult<()> {
        self.set_state(State::CreateCache)?;
        if let Some(cache_dir) = self.cache_file.parent().map(Path::to_path_buf) {
            self.ensure_dir(&cache_dir)?;
        }
        info!("Creating cache {}", self.cache_file.display());
        let command = self.archive_command(&self.config.pack_cmd);
        let out = self.do_host(command)?;
        if !out.success() {
            error!("{}", out.output.trim_end());
            return Err(self.fail(BuildrootError::Root(format!(
                "Failed to create cache {}",
                self.cache_file.display()
            ))));
        }
        Ok(())
    }

    fn archive_command(&self, template: &str) -> String {
        template
            .replace("{basedir}", &quote_path(&self.base_dir))
            .replace("{cache}", &quote_path(&self.cache_file))
    }
}
