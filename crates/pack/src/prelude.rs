//! Convenient re-exports of commonly used data types, designed to make crate usage painless.
//!
//! The contents of this module can be used by including the following in any module:
//! ```
//! use gbapack_pack::prelude::*;
//! ```

#[doc(inline)]
pub use crate::plan::{pack, PackConfig};

pub mod error {
    pub use crate::error::Error;
}
