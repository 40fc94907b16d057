//! Shared cursor and formatting utilities used across the [gbapack](https://crates.io/crates/gbapack)
//! workspace.

pub mod cursor;
pub mod prelude;
pub mod time;
pub mod util;
