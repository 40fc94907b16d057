//! The 12-byte `SectionEntry` command-stream record and its payload-carrying counterpart,
//! `CopyRecord` (spec §3, §4.E, §9 design notes).
//!
//! A `SectionEntry` is built from a [`SectionOp`] rather than a raw `u32`, so call sites never
//! hand-assemble the tag bits; [`SectionEntry::to_le_bytes`] is the one place that flattens a
//! `SectionOp` to the exact little-endian wire encoding the loader expects.

/// Tag bits selecting a command-stream operation (spec §4.E).
const FLAG_DECOMPRESS_NORMAL: u32 = 1 << 31;
const FLAG_DECOMPRESS_EWRAM_FINAL: u32 = 1 << 30;
const FLAG_DECOMPRESS_INTERMEDIARY: u32 = 1 << 29;
const FLAG_BIOS_FILL: u32 = 1 << 24;
const FLAG_BIOS_WORD: u32 = 1 << 26;
const BIOS_COUNT_MASK: u32 = (1 << 21) - 1;

/// Whether a BIOS bulk operation copies or fills, and at what unit size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiosUnit {
    Halfword,
    Word,
}

/// The operation a [`SectionEntry`] encodes, independent of the raw bit-tagging the loader expects
/// (spec §9: "an implementation should use a tagged variant internally").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionOp {
    /// Decompress a payload residing in the ROM payload blob straight to `dest`. Low bits of
    /// `flags` are the packed length (spec: `bit31`).
    DecompressNormal { packed_len: u32 },
    /// Copy the payload to the end of EWRAM first, then decompress to `dest`. Low bits of `flags`
    /// are `packed_len` rounded up to a multiple of 32 (spec: `bit30`).
    DecompressEwramFinal { packed_len: u32 },
    /// Decompress the payload to an intermediary scratch address ahead of a BIOS copy. Low bits
    /// of `flags` are the packed length (spec: `bit29`).
    DecompressIntermediary { packed_len: u32 },
    /// A plain BIOS bulk copy or fill; no tag bits set.
    Bios { fill: bool, unit: BiosUnit, count: u32 },
    /// The terminal entry's raw `flags` value, already computed as a negative two's-complement
    /// PC-relative offset (spec §4.E, invariant #5). Not a tagged operation in its own right.
    Terminal { flags: u32 },
}

/// A single 12-byte command-stream record: `{source, dest, flags}`, little-endian.
#[derive(Debug, Clone, Copy)]
pub struct SectionEntry {
    pub source: u32,
    pub dest: u32,
    pub op: SectionOp,
}

impl SectionEntry {
    /// Packs this entry's tagged operation into its exact 12-byte wire form.
    #[must_use]
    pub fn to_le_bytes(self) -> [u8; 12] {
        let flags = match self.op {
            SectionOp::DecompressNormal { packed_len } => FLAG_DECOMPRESS_NORMAL | packed_len,
            SectionOp::DecompressEwramFinal { packed_len } => {
                FLAG_DECOMPRESS_EWRAM_FINAL | ((packed_len + 31) & !31)
            }
            SectionOp::DecompressIntermediary { packed_len } => FLAG_DECOMPRESS_INTERMEDIARY | packed_len,
            SectionOp::Bios { fill, unit, count } => {
                debug_assert!(count <= BIOS_COUNT_MASK, "unit count must fit in 21 bits");
                let mut flags = count & BIOS_COUNT_MASK;
                if fill {
                    flags |= FLAG_BIOS_FILL;
                }
                if unit == BiosUnit::Word {
                    flags |= FLAG_BIOS_WORD;
                }
                flags
            }
            SectionOp::Terminal { flags } => flags,
        };

        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&self.source.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.dest.to_le_bytes());
        bytes[8..12].copy_from_slice(&flags.to_le_bytes());
        bytes
    }

    /// Builds the terminal entry: `source = 0`, `dest = entrypoint`, `flags` a negative
    /// PC-relative offset back to the entrypoint (spec §4.E, invariant #5).
    ///
    /// `entries_before` is the number of entries already pushed, *not including* this one.
    #[must_use]
    pub fn terminal(entrypoint: u32, entries_before: usize) -> Self {
        let flags = -(((entries_before as i64 + 1) * 12) + 4) as i32 as u32;
        Self { source: 0, dest: entrypoint, op: SectionOp::Terminal { flags } }
    }
}

/// Where a [`CopyRecord`]'s bytes come from: owned planner-produced bytes awaiting a payload-blob
/// offset, or a fixed address already known (spec §9 design note on `CopyRecord.source`'s dual
/// role).
#[derive(Debug, Clone)]
pub enum CopySource {
    Owned(Box<[u8]>),
    Fixed(u32),
}

/// An in-planner auxiliary paired one-to-one with a [`SectionEntry`] that needs a payload (spec
/// §3). `assigned_offset` is filled in by the layout pass once the payload-blob base is known.
#[derive(Debug, Clone)]
pub struct CopyRecord {
    pub source: CopySource,
    pub length: u32,
    /// Trailing bytes of EWRAM the loader must keep untouched for scratch while this record's
    /// decompression runs.
    pub reserve_at_end: u32,
    pub assigned_offset: Option<u32>,
}

impl CopyRecord {
    #[must_use]
    pub const fn owned(bytes: Box<[u8]>, length: u32, reserve_at_end: u32) -> Self {
        Self { source: CopySource::Owned(bytes), length, reserve_at_end, assigned_offset: None }
    }

    /// Rounds `self.length` up to the next multiple of 4, the payload-blob padding rule (spec §3,
    /// §4.F step 5).
    #[must_use]
    pub const fn padded_length(&self) -> u32 {
        (self.length + 3) & !3
    }
}
