mod clean;
mod config;
mod init;
mod installdeps;
mod rebuild;

pub use clean::*;
pub use config::*;
pub use init::*;
pub use installdeps::*;
pub use rebuild::*;
