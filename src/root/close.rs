use super::root_struct::Root;
use super::state::State;
use crate::error::BuildrootResult;
use log::error;

impl Root {
    /// Detaches every mount and finishes the logs. Mounts are released even
    /// when the state file can't be written. Safe to call more than once.
    pub fn close(&mut self) -> BuildrootResult<()> {
        self.exec.logs.root("Cleaning up...");
        let ending = self.set_state(State::Ending);
        let unmounted = self.umount_all();
        self.exec.logs.close_build();
        let done = self.set_state(State::Done);
        let result = ending.and(unmounted).and(done).map_err(|e| self.report(e));
        self.exec.logs.root("Done.");
        self.exec.logs.close_root();
        result
    }

    /// Runs `work` and closes the root whatever happened. The error from
    /// `work` wins over one from closing.
    pub fn run_and_close<T>(
        &mut self,
        work: impl FnOnce(&mut Root) -> BuildrootResult<T>,
    ) -> BuildrootResult<T> {
        // Errors that skipped `fail` still belong in root.log
        let result = work(self).map_err(|e| self.report(e));
        let closed = self.close();
        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    error!("Also failed to close the build root: {}", close_err);
                }
                Err(e)
            }
        }
    }
}
