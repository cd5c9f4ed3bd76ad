use super::root_struct::Root;
use crate::error::{BuildrootError, BuildrootResult};
use crate::util::quote;
use log::{debug, info};
use std::path::Path;

const USERADD: &str = "usr/sbin/useradd";

/// The uid recorded for `user` in a passwd file.
pub fn passwd_uid(passwd: &str, user: &str) -> Option<u32> {
    passwd.lines().find_map(|line| {
        let mut fields = line.split(':');
        if fields.next()? != user {
            return None;
        }
        fields.nth(1)?.parse().ok()
    })
}

impl Root {
    /// Creates the unprivileged build user with the configured uid, or
    /// recreates it when an earlier run left one behind with another uid.
    pub(crate) fn make_build_user(&mut self) -> BuildrootResult<()> {
        if !self.root_dir.join(USERADD).exists() {
            return Err(self.fail(BuildrootError::Root(
                "Could not find useradd in the build root, maybe the install failed?"
                    .to_string(),
            )));
        }

        let user = quote(&self.config.chroot_user);
        let group = quote(&self.config.chroot_group);
        let uid = self.config.chroot_uid;
        let gid = self.config.chroot_gid;
        let home = self.home_dir.clone();

        let mut need_add = !self.host_path(&home).exists();
        if !need_add {
            let passwd = self.read_root_file(Path::new("etc/passwd"));
            match passwd_uid(&passwd, &self.config.chroot_user) {
                Some(recorded) if recorded != uid => {
                    info!(
                        "Build user {} has uid {}, recreating it with uid {}",
                        self.config.chroot_user, recorded, uid
                    );
                    self.do_chroot(format!("/usr/sbin/userdel -r {}", user))?;
                    self.do_chroot(format!("/usr/sbin/groupdel {}", group))?;
                    self.do_chroot(format!(
                        "chown -R {}.{} {}",
                        uid,
                        gid,
                        quote(&home.to_string_lossy())
                    ))?;
                    need_add = true;
                }
                Some(_) => debug!("build user {} already exists", self.config.chroot_user),
                None => need_add = true,
            }
        }

        if need_add {
            // Fails harmlessly when the group is already there
            self.do_chroot(format!("/usr/sbin/groupadd -g {} {}", gid, group))?;
            let out = self.do_chroot(format!(
                "/usr/sbin/useradd -m -u {} -g {} -d {} {}",
                uid,
                group,
                quote(&home.to_string_lossy()),
                user
            ))?;
            if !out.success() {
                return Err(self.fail(BuildrootError::Root(format!(
                    "Could not create build user {}",
                    self.config.chroot_user
                ))));
            }
        }

        Ok(())
    }

    fn read_root_file(&self, relative: &Path) -> String {
        std::fs::read_to_string(self.root_dir.join(relative)).unwrap_or_default()
    }
}
