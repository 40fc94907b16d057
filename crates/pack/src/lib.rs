//! The packing planner for [gbapack](https://crates.io/crates/gbapack): classifies an input
//! image's loadable segments by memory region, compresses runtime-writable data, and assembles a
//! boot-ready output image with an in-image command stream for the crt0 loader.

pub mod aggregator;
pub mod builder;
pub mod classify;
pub mod compress;
pub mod entry;
pub mod error;
pub mod layout;
pub mod plan;
pub mod prelude;
pub mod region;
