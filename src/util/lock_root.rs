use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use log::trace;
use nix::fcntl::Flock;

use anyhow::{Result, anyhow};

/// Holds an exclusive lock on one build root name for as long as it lives.
/// The lock file sits next to the root's directory, not inside it, so
/// cleaning the root doesn't drop the lock.
pub struct Lock {
    path: PathBuf,
    #[allow(dead_code)]
    lock: Flock<File>,
}

impl Lock {
    /** Acquire a lock on a build root, waiting if another run holds it. */
    pub fn root(basedir: &Path, root_name: &str) -> Result<Box<Lock>> {
        let lock_file = basedir.join(format!("{}.lock", root_name));
        trace!("Acquiring lock {}", lock_file.display());
        let file = match OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_file)
        {
            Ok(file) => file,
            Err(e) => {
                return Err(anyhow!(
                    "Failed to open lock file for build root {}: {}",
                    root_name,
                    e
                ));
            }
        };

        let lock =
            nix::fcntl::Flock::lock(file, nix::fcntl::FlockArg::LockExclusive)
                .map_err(|(_, e)| anyhow!("Failed to acquire lock: {}", e))?;

        trace!("Acquired lock {}", lock_file.display());
        Ok(Box::new(Lock {
            path: lock_file,
            lock,
        }))
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        trace!("Unlocking lock {}", self.path.display());
    }
}
