//! Convenient re-exports of commonly used data types, designed to make crate usage painless.
//!
//! The contents of this module can be used by including the following in any module:
//! ```
//! use gbapack_core::prelude::*;
//! ```

#[doc(inline)]
pub use crate::cursor::{ByteReader, ImageWriter};

/// Contains [`cursor::Error`], which is used in Results returned by [`ByteReader`]
pub mod cursor {
    pub use crate::cursor::Error;
}

pub mod time {
    pub use crate::time::*;
}

pub mod util {
    pub use crate::util::format_size;
}
