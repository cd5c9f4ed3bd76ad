mod command;
mod find_files;
mod lock_root;
mod log_sinks;
mod mkdir;
mod mounts;
pub mod output_checks;
mod output;
mod requires;
mod resolve_invoking_user;

pub use command::*;
pub use find_files::*;
pub use lock_root::*;
pub use log_sinks::*;
pub use mkdir::*;
pub use mounts::*;
pub use output::*;
pub use requires::*;
pub use resolve_invoking_user::*;
