pub mod cli;
pub mod impls;
pub mod resolve;
pub mod structs;

pub use resolve::{is_strictly_under, is_valid_name, resolve_config};
pub use structs::*;

