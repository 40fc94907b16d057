//! Fatal error conditions for the packing planner (spec §7). Every variant here terminates the run;
//! the only recoverable conditions (compression rejection, a content-free ROM segment) are handled
//! inside the classifier and never surface as an [`Error`].

use std::path::PathBuf;

use snafu::prelude::*;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// Reading the input file, or writing the output file, failed.
    #[snafu(display("I/O error: {source}"))]
    Io { source: std::io::Error },

    /// The input image was recognized as neither a raw multiboot image nor a valid ELF32
    /// executable, or one of its segments is malformed: a non-`LOAD`/`ARM_EXIDX` segment with file
    /// content inside the ROM window, or `file_size` larger than `mem_size` (spec §7's
    /// `UnsupportedSegment` kind is folded into this one — both originate from parsing the input).
    #[snafu(transparent)]
    InputMalformed { source: gbapack_elf::error::Error },

    /// Too many command-stream entries, a unit count too large for the 21-bit BIOS encoding, or
    /// not enough trailing EWRAM for a decompressor's scratch space.
    #[snafu(display("Capacity exceeded: {reason}"))]
    CapacityExceeded { reason: String },

    /// A fill length is odd, or a VRAM-bound compressed length is not a multiple of four.
    #[snafu(display("Alignment violation: {reason}"))]
    AlignmentViolation { reason: String },

    /// The external LZSS tool exited with a nonzero status, or its output could not be read back.
    #[snafu(display("External LZSS tool failed: {reason}"))]
    ExternalToolFailure { reason: String, path: PathBuf },
}

pub type Result<T> = core::result::Result<T, Error>;
