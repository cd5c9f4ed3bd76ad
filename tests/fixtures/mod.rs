#![allow(dead_code)]
mod fixture_cli;
mod fixture_root;

pub use fixture_cli::*;
pub use fixture_root::*;

use rstest::fixture;

#[fixture]
pub fn cli() -> BuildrootCli {
    BuildrootCli::new()
}
