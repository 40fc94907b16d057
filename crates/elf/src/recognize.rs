//! Top-level input recognition: distinguishes a raw multiboot image from an ELF32 executable and
//! extracts a uniform view of its loadable segments and entry point (spec component G).

use gbapack_core::cursor::ByteReader;
use log::debug;
use snafu::prelude::*;

use crate::error::{self, Result};
use crate::header::{Elf32Ehdr, PT_ARM_EXIDX, PT_LOAD};
use crate::segment::{loadable_segments, Segment};

/// Base address and size of EWRAM, the destination region for raw multiboot images.
const EWRAM_START: u32 = 0x0200_0000;
const EWRAM_SIZE: u32 = 0x0004_0000;

/// Bounds of the ROM window: an ELF segment that lands here marks the whole image as a cartridge
/// boot rather than a multiboot one, independent of where any other segment lands.
const ROM_START: u32 = 0x0800_0000;
const ROM_END: u32 = 0x09FF_FFFF;

const RAW_MIN_LENGTH: usize = 0xE0;
const RAW_BRANCH_OPCODE: u8 = 0xEA;
const RAW_LOGO_SIGNATURE_OFFSET: usize = 0xB2;
const RAW_LOGO_SIGNATURE: u8 = 0x96;
const RAW_HEADER_BRANCH_TAIL_OFFSET: usize = 0xC2;
const RAW_HEADER_BRANCH_TAIL: [u8; 2] = [0x00, 0xEA];
const RAW_ENTRY_BRANCH_OFFSET: usize = 0xC0;
const RAW_ENTRY_BASE: u32 = 0xC8;

/// Which of the two boot paths an input image takes, carrying whatever each path needs to finish
/// laying out the output file (spec §4.F, §4.G).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Booted from a cartridge at `ROM_START`; `entry_point` is absolute.
    Rom,
    /// Booted entirely into EWRAM by the platform's serial transfer protocol.
    Multiboot,
}

/// A recognized input image: its raw bytes, boot mode, entry point, and loadable segments.
#[derive(Debug)]
pub struct InputImage<'d> {
    pub data: &'d [u8],
    pub mode: Mode,
    pub entry_point: u32,
    pub segments: Vec<Segment>,
    /// Whether this image was recognized from the raw heuristic rather than parsed as ELF32; the
    /// layout pass uses this to decide whether to reproduce the source's logo/header bytes.
    pub is_raw: bool,
}

impl<'d> InputImage<'d> {
    /// Recognizes `data` as either a raw multiboot image or an ELF32 executable, per the
    /// heuristic in spec §4.G: a raw image is any blob at least `0xE0` bytes long whose first
    /// four bytes are an ARM branch (opcode byte `0xEA`) and whose Nintendo logo signature byte
    /// and header checksum tail match: anything else is parsed as ELF32.
    ///
    /// # Errors
    /// Returns an error if the input is shaped like neither: too short, a malformed raw header,
    /// a raw image larger than EWRAM, or an ELF header that fails validation.
    pub fn recognize(data: &'d [u8]) -> Result<Self> {
        if looks_like_raw_multiboot(data) {
            Self::parse_raw(data)
        } else {
            Self::parse_elf(data)
        }
    }

    fn parse_raw(data: &'d [u8]) -> Result<Self> {
        let length = data.len();
        ensure!(
            u32::try_from(length).is_ok_and(|length| length <= EWRAM_SIZE),
            error::RawTooLargeSnafu { length, limit: EWRAM_SIZE as usize }
        );

        // The three markers in `looks_like_raw_multiboot` only decide that this *looks* like a
        // raw image; the header checksum tail is what actually confirms it, and its failure is
        // fatal rather than a reason to fall through to ELF parsing (spec §4.G, `original_source`).
        ensure!(
            data[RAW_HEADER_BRANCH_TAIL_OFFSET..RAW_HEADER_BRANCH_TAIL_OFFSET + 2] == RAW_HEADER_BRANCH_TAIL,
            error::InvalidMultibootSnafu
        );

        let mut reader = ByteReader::new(data);
        reader.set_position(RAW_ENTRY_BRANCH_OFFSET);
        let branch = reader.read_u32().map_err(|_| error::Error::InvalidMultiboot)?;
        let entry_point = RAW_ENTRY_BASE.wrapping_add((branch & 0x00FF_FFFF) << 2).wrapping_add(EWRAM_START);

        debug!("recognized raw multiboot image, entry point {entry_point:#010X}");

        // A raw image has no ELF segment table: everything past its logo/header region (already
        // reproduced verbatim by the layout pass) is one EWRAM-bound blob, staged at offset 0xC8.
        let body_len = length - RAW_ENTRY_BASE as usize;
        let segment = Segment {
            file_offset: RAW_ENTRY_BASE as usize,
            phys_addr: EWRAM_START + RAW_ENTRY_BASE,
            file_size: body_len,
            mem_size: body_len,
        };

        Ok(Self { data, mode: Mode::Multiboot, entry_point, segments: vec![segment], is_raw: true })
    }

    fn parse_elf(data: &'d [u8]) -> Result<Self> {
        let ehdr = Elf32Ehdr::parse(data)?;
        let phdrs = ehdr.program_headers(data)?;

        // A program header with file content inside the ROM window must be one of the two types
        // this packer understands; anything else is fatal, not silently skipped, because we can't
        // safely leave cartridge content unaccounted for.
        for (index, phdr) in phdrs.iter().enumerate() {
            let p_type = phdr.p_type.get();
            let in_rom = is_rom_address(phdr.paddr.get());
            let has_content = phdr.filesz.get() > 0;
            if in_rom && has_content && p_type != PT_LOAD && p_type != PT_ARM_EXIDX {
                return error::UnsupportedSegmentTypeSnafu { index, ph_type: p_type }.fail();
            }
        }

        let segments = loadable_segments(&phdrs)?;
        let entry_point = ehdr.entry.get();

        let mode = if segments.iter().any(|segment| is_rom_address(segment.phys_addr)) {
            Mode::Rom
        } else {
            Mode::Multiboot
        };

        debug!("recognized ELF32 executable, entry point {entry_point:#010X}, mode {mode:?}");

        Ok(Self { data, mode, entry_point, segments, is_raw: false })
    }
}

/// Whether `address` falls inside the ROM cartridge window. Shared by the recognizer (to decide
/// boot mode and to reject unsupported program header types with ROM-resident content) and by
/// `gbapack-pack`'s planner (to route a segment to the raw-copy path vs. the command-stream
/// classifier), so the two crates can't drift on what counts as "in ROM".
#[must_use]
pub const fn is_rom_address(address: u32) -> bool {
    address >= ROM_START && address <= ROM_END
}

/// Whether `data` looks like a raw multiboot image: at least `RAW_MIN_LENGTH` bytes long, with an
/// ARM branch opcode at offset 3 and the Nintendo logo signature byte at `0xB2`. This only decides
/// which parse path to take; the header checksum tail is validated (fatally) inside `parse_raw`,
/// not folded in here (spec §4.G, `original_source/src/main.c:311-318`).
fn looks_like_raw_multiboot(data: &[u8]) -> bool {
    data.len() >= RAW_MIN_LENGTH && data[3] == RAW_BRANCH_OPCODE && data[RAW_LOGO_SIGNATURE_OFFSET] == RAW_LOGO_SIGNATURE
}
