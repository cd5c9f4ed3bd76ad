use crate::error::{BuildrootError, BuildrootResult};
use log::trace;
use std::path::Path;

/* Makes the directory (and any missing parents) if it doesn't exist. Errors
 * if something other than a directory is already sitting at the path.
*/
pub fn ensure_dir(path: &Path) -> BuildrootResult<()> {
    match std::fs::symlink_metadata(path) {
        Ok(metadata) => {
            if metadata.is_dir() {
                return Ok(());
            }
            // A symlink to a directory is fine, anything else is not
            if metadata.file_type().is_symlink() && path.is_dir() {
                return Ok(());
            }
            Err(BuildrootError::Generic(format!(
                "Could not create dir {}. Error: already exists but is not a directory",
                path.display()
            )))
        }
        Err(_) => {
            trace!("Creating directory {}", path.display());
            std::fs::create_dir_all(path).map_err(|e| {
                BuildrootError::Generic(format!(
                    "Could not create dir {}. Error: {}",
                    path.display(),
                    e
                ))
            })
        }
    }
}
