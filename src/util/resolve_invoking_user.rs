use anyhow::{Result, anyhow};
use nix::unistd::{Gid, Uid, getresgid, getresuid};

/// The user who asked for the build, as opposed to root which we run as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvokingUser {
    pub uid: Uid,
    pub gid: Gid,
}

/**
 * We are normally run through sudo or with setuid bits. The build user inside
 * the root defaults to the ids of whoever invoked us so that the results they
 * get back are owned by them.
 */
pub fn resolve_invoking_user() -> Result<InvokingUser> {
    let resuid = getresuid()?;
    let resgid = getresgid()?;

    // setuid: real uid is the user, effective uid is root. Don't trust SUDO_ vars then.
    let is_setuid =
        resuid.real != resuid.effective && resuid.effective == Uid::from_raw(0);
    if is_setuid {
        return Ok(InvokingUser {
            uid: resuid.real,
            gid: resgid.real,
        });
    }

    let uid = match std::env::var("SUDO_UID") {
        Ok(uid) => match uid.parse::<u32>() {
            Ok(uid) => Uid::from_raw(uid),
            Err(_) => {
                return Err(anyhow!("Failed to parse SUDO_UID: {:?}", uid));
            }
        },
        Err(_) => resuid.real,
    };

    let gid = match std::env::var("SUDO_GID") {
        Ok(gid) => match gid.parse::<u32>() {
            Ok(gid) => Gid::from_raw(gid),
            Err(_) => {
                return Err(anyhow!("Failed to parse SUDO_GID: {:?}", gid));
            }
        },
        Err(_) => resgid.real,
    };

    Ok(InvokingUser { uid, gid })
}
