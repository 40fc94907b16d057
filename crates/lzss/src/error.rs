//! Error conditions for compression and decompression.

use snafu::prelude::*;

/// Error conditions thrown by [`compress`](crate::compress) and [`decompress`](crate::decompress).
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// Thrown if a compressed stream ends before its declared decompressed size is reached.
    #[snafu(display("Compressed stream truncated before reaching its declared size"))]
    Truncated,
    /// Thrown if a match token's back-reference points before the start of the output.
    #[snafu(display("Malformed compressed stream: back-reference out of range"))]
    InvalidBackref,
}

pub type Result<T> = core::result::Result<T, Error>;
