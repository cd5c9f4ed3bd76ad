use crate::error::{BuildrootError, BuildrootResult};
use crate::util::output_checks::already_mounted;
use crate::util::{Executor, Invocation, ensure_dir, quote_path};
use anyhow::anyhow;
use log::{debug, error, warn};
use serde::Serialize;
use std::ffi::CStr;
use std::path::{Path, PathBuf};

/// The pseudo-filesystems a build root needs for a working userspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MountKind {
    Proc,
    DevBind,
    DevPts,
}

impl MountKind {
    /// `/dev` has to be bound before `devpts` can be mounted underneath it.
    pub const ATTACH_ORDER: [MountKind; 3] =
        [MountKind::Proc, MountKind::DevBind, MountKind::DevPts];

    pub fn relative_target(&self) -> &'static str {
        match self {
            MountKind::Proc => "proc",
            MountKind::DevBind => "dev",
            MountKind::DevPts => "dev/pts",
        }
    }

    fn mount_args(&self, target: &Path) -> String {
        let target = quote_path(target);
        match self {
            MountKind::Proc => format!("-t proc proc {}", target),
            MountKind::DevBind => format!("--bind /dev {}", target),
            MountKind::DevPts => format!("-t devpts devpts {}", target),
        }
    }

    /// proc and the /dev bind may fail without stopping the build; devpts
    /// may not.
    fn failure_is_fatal(&self) -> bool {
        matches!(self, MountKind::DevPts)
    }
}

impl std::fmt::Display for MountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MountKind::Proc => write!(f, "proc"),
            MountKind::DevBind => write!(f, "dev"),
            MountKind::DevPts => write!(f, "devpts"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountEntry {
    pub kind: MountKind,
    pub target: PathBuf,
    pub position: usize,
}

/// Everything this build root has mounted, in the order it was mounted.
/// Unmounting always walks this list backwards.
pub struct MountTable {
    root_dir: PathBuf,
    mount_cmd: String,
    umount_cmd: String,
    track_file: PathBuf,
    entries: Vec<MountEntry>,
}

impl MountTable {
    pub fn new(
        root_dir: &Path,
        mount_cmd: &str,
        umount_cmd: &str,
        track_file: &Path,
    ) -> Self {
        Self {
            root_dir: root_dir.to_path_buf(),
            mount_cmd: mount_cmd.to_string(),
            umount_cmd: umount_cmd.to_string(),
            track_file: track_file.to_path_buf(),
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[MountEntry] {
        &self.entries
    }

    pub fn is_attached(&self, kind: MountKind) -> bool {
        self.entries.iter().any(|entry| entry.kind == kind)
    }

    pub fn attach_all(&mut self, exec: &mut Executor) -> BuildrootResult<()> {
        for kind in MountKind::ATTACH_ORDER {
            self.attach(kind, exec)?;
        }
        Ok(())
    }

    pub fn attach(
        &mut self,
        kind: MountKind,
        exec: &mut Executor,
    ) -> BuildrootResult<()> {
        if self.is_attached(kind) {
            return Ok(());
        }

        let target = self.root_dir.join(kind.relative_target());
        ensure_dir(&target)?;

        debug!("mounting {} in {}", kind, target.display());
        let out = exec.run(&Invocation::host(format!(
            "{} {}",
            self.mount_cmd,
            kind.mount_args(&target)
        )))?;

        // "already mounted" counts as mounted, except where any failure is fatal
        let tolerated = !kind.failure_is_fatal() && already_mounted(&out.output);
        if !out.success() && !tolerated {
            let msg = format!(
                "could not mount {} error was: {}",
                kind,
                out.output.trim_end()
            );
            exec.logs.root(&msg);
            if kind.failure_is_fatal() {
                return Err(BuildrootError::Root(msg));
            }
            error!("{}", msg);
            return Ok(());
        }

        self.entries.push(MountEntry {
            kind,
            target,
            position: self.entries.len(),
        });
        self.write_track_file();
        debug!("mounted {}", kind);
        Ok(())
    }

    /// Unmounts every tracked entry, last mounted first. Keeps going past
    /// failures so one busy mount doesn't leak the rest, then reports them.
    pub fn detach_all(&mut self, exec: &mut Executor) -> BuildrootResult<()> {
        let mut failed = Vec::new();
        while let Some(entry) = self.entries.pop() {
            debug!("umounting {}", entry.target.display());
            match self.detach_path(&entry.target, exec) {
                Ok(true) => (),
                Ok(false) => failed.push(entry.target.display().to_string()),
                Err(e) => {
                    failed.push(format!("{} ({})", entry.target.display(), e))
                }
            }
        }
        self.write_track_file();

        if failed.is_empty() {
            Ok(())
        } else {
            Err(BuildrootError::Root(format!(
                "Failed to unmount: {}",
                failed.join(", ")
            )))
        }
    }

    /// Unmounts a single path whether or not it is tracked.
    pub fn detach_path(
        &self,
        path: &Path,
        exec: &mut Executor,
    ) -> BuildrootResult<bool> {
        let out = exec.run(&Invocation::host(format!(
            "{} -n {}",
            self.umount_cmd,
            quote_path(path)
        )))?;
        if !out.success() {
            error!("Failed to unmount {}: {}", path.display(), out.output.trim_end());
        }
        Ok(out.success())
    }

    /* Best effort record of what is mounted for anyone inspecting a crashed root */
    fn write_track_file(&self) {
        let contents: String = self
            .entries
            .iter()
            .map(|entry| format!("{}\n", entry.kind.relative_target()))
            .collect();
        if let Err(e) = std::fs::write(&self.track_file, contents) {
            warn!(
                "Failed to write {}: {}",
                self.track_file.display(),
                e
            );
        }
    }
}

/// Mount points on the host that live under `base`, deepest first.
pub fn get_mounts(base: &Path) -> anyhow::Result<Vec<String>> {
    let mut mounts = Vec::new();

    let system_mounts =
        unsafe { libc::setmntent(c"/proc/mounts".as_ptr(), c"r".as_ptr()) };

    if system_mounts.is_null() {
        return Err(anyhow!("Failed to open /proc/mounts"));
    }

    loop {
        let mnt = unsafe { libc::getmntent(system_mounts) };
        if mnt.is_null() {
            break;
        }

        let mnt_dir = String::from(unsafe {
            CStr::from_ptr((*mnt).mnt_dir).to_string_lossy()
        });

        if Path::new(&mnt_dir).starts_with(base) {
            mounts.push(mnt_dir);
        }
    }

    unsafe { libc::endmntent(system_mounts) };

    mounts.sort_by(|a, b| b.cmp(a));

    Ok(mounts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_order_puts_dev_before_devpts() {
        let order = MountKind::ATTACH_ORDER;
        let dev = order.iter().position(|k| *k == MountKind::DevBind);
        let pts = order.iter().position(|k| *k == MountKind::DevPts);
        assert!(dev < pts);
        assert_eq!(order[0], MountKind::Proc);
    }

    #[test]
    fn test_mount_args() {
        let target = Path::new("/var/lib/buildroot/f/root/dev/pts");
        assert_eq!(
            MountKind::DevPts.mount_args(target),
            "-t devpts devpts /var/lib/buildroot/f/root/dev/pts"
        );
        assert_eq!(
            MountKind::DevBind.mount_args(Path::new("/r/dev")),
            "--bind /dev /r/dev"
        );
    }

    #[test]
    fn test_get_mounts_outside_any_mount() {
        let tmp = tempfile::tempdir().unwrap();
        let mounts = get_mounts(tmp.path()).unwrap();
        assert!(mounts.is_empty());
    }
}
