mod build;
mod build_deps;
mod build_dir;
mod cache;
mod clean;
mod close;
mod mount_scope;
mod new;
mod prep;
mod root_struct;
mod state;
mod user;

pub use build::BuildArtifactSet;
pub use build_dir::BUILD_SUBDIRS;
pub use new::CONFIG_LOG;
pub use prep::{PrepPlan, file_age_days, plan_prep};
pub use root_struct::{Collaborators, Root};
pub use state::{STATUS_FILE, State, StateTracker, read_state};
pub use user::passwd_uid;
