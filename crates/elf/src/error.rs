//! Error conditions for parsing an input image.

use snafu::prelude::*;

/// Error conditions for when recognizing or parsing an input image.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// Thrown if the file is too small to contain a valid ELF32 header.
    #[snafu(display("File too small to be a valid ELF image"))]
    Truncated,
    /// Thrown if the ELF magic number does not match `\x7fELF`.
    #[snafu(display("Invalid ELF magic number"))]
    InvalidMagic,
    /// Thrown if the ELF class is not `ELFCLASS32`.
    #[snafu(display("Unsupported ELF class, only 32-bit is supported"))]
    UnsupportedClass,
    /// Thrown if the ELF data encoding is not `ELFDATA2LSB`.
    #[snafu(display("Unsupported ELF data encoding, only little-endian is supported"))]
    UnsupportedEndian,
    /// Thrown if the ELF type is not `ET_EXEC`.
    #[snafu(display("Unsupported ELF type, only executables are supported"))]
    UnsupportedType,
    /// Thrown if the ELF machine is not `EM_ARM`.
    #[snafu(display("Unsupported ELF machine, only ARM is supported"))]
    UnsupportedMachine,
    /// Thrown if the ELF version is not `EV_CURRENT`.
    #[snafu(display("Unsupported ELF version"))]
    UnsupportedVersion,
    /// Thrown if a raw image's branch-at-0xC0 signature doesn't decode to a valid multiboot header.
    #[snafu(display("Not a valid multiboot image"))]
    InvalidMultiboot,
    /// Thrown if a raw multiboot image is larger than EWRAM.
    #[snafu(display("Raw multiboot image is larger than EWRAM ({length} > {limit} bytes)"))]
    RawTooLarge { length: usize, limit: usize },
    /// Thrown if a program header with file content lands inside the ROM window but isn't
    /// `PT_LOAD` or `PT_ARM_EXIDX`.
    #[snafu(display("Program header {index}, which is in ROM, has unsupported type {ph_type:#010X}"))]
    UnsupportedSegmentType { index: usize, ph_type: u32 },
    /// Thrown if a program header's file-backed size exceeds its memory footprint.
    #[snafu(display("Program header {index} has file_size ({file_size}) larger than mem_size ({mem_size})"))]
    SegmentFileSizeExceedsMemSize { index: usize, file_size: usize, mem_size: usize },
}

pub type Result<T> = core::result::Result<T, Error>;
