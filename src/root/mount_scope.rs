use super::root_struct::Root;
use log::error;
use std::ops::{Deref, DerefMut};

/// Borrows a root for the duration of a phase. Unless the phase calls
/// `succeed`, every tracked mount is released when the scope goes away,
/// whether that is through an early `?` return or a panic.
pub(crate) struct MountScope<'a> {
    root: &'a mut Root,
    keep: bool,
}

impl Root {
    pub(crate) fn unmount_on_failure(&mut self) -> MountScope<'_> {
        MountScope {
            root: self,
            keep: false,
        }
    }
}

impl MountScope<'_> {
    /// Leaves the mounts attached for the next phase.
    pub(crate) fn succeed(mut self) {
        self.keep = true;
    }
}

impl Deref for MountScope<'_> {
    type Target = Root;

    fn deref(&self) -> &Root {
        self.root
    }
}

impl DerefMut for MountScope<'_> {
    fn deref_mut(&mut self) -> &mut Root {
        self.root
    }
}

impl Drop for MountScope<'_> {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        self.root
            .exec
            .logs
            .root("Phase failed, unmounting everything");
        if let Err(e) = self.root.umount_all() {
            error!("{}", e);
        }
    }
}
