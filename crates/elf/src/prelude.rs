//! Convenient re-exports of commonly used data types, designed to make crate usage painless.
//!
//! The contents of this module can be used by including the following in any module:
//! ```
//! use gbapack_elf::prelude::*;
//! ```

#[doc(inline)]
pub use crate::recognize::{InputImage, Mode};
#[doc(inline)]
pub use crate::segment::Segment;

pub mod error {
    pub use crate::error::Error;
}
