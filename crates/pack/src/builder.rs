//! Command-stream builder (component E): the ordered sequence of `SectionEntry`/`CopyRecord`
//! pairs the layout pass will serialize, with the capacity and encoding rules of spec §4.E
//! enforced at push time.

use snafu::prelude::*;

use crate::entry::{BiosUnit, CopyRecord, SectionEntry, SectionOp};
use crate::error::{self, Result};

/// At most this many command-stream entries may be emitted (spec §3, §4.E).
pub const MAX_ENTRIES: usize = 1024;

const BIOS_COUNT_LIMIT: u32 = 1 << 21;

/// Ordered sequence of `SectionEntry` with parallel optional `CopyRecord` (spec §3). Insertion
/// order is load order: the loader executes entries in sequence.
#[derive(Default)]
pub struct PackState {
    entries: Vec<SectionEntry>,
    records: Vec<Option<CopyRecord>>,
}

impl PackState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[SectionEntry] {
        &self.entries
    }

    #[must_use]
    pub fn records(&self) -> &[Option<CopyRecord>] {
        &self.records
    }

    #[must_use]
    pub fn records_mut(&mut self) -> &mut [Option<CopyRecord>] {
        &mut self.records
    }

    /// Pairs each entry with its record for the layout pass's source-rewriting step, without
    /// borrowing the whole `PackState` mutably twice.
    pub fn entries_mut_with_records(&mut self) -> impl Iterator<Item = (&mut SectionEntry, &Option<CopyRecord>)> {
        self.entries.iter_mut().zip(self.records.iter())
    }

    fn push(&mut self, entry: SectionEntry, record: Option<CopyRecord>) -> Result<()> {
        ensure!(
            self.entries.len() < MAX_ENTRIES,
            error::CapacityExceededSnafu { reason: format!("more than {MAX_ENTRIES} command-stream entries") }
        );
        self.entries.push(entry);
        self.records.push(record);
        Ok(())
    }

    /// Appends a `DecompressNormal` entry with its packed payload.
    pub fn push_decompress_normal(&mut self, dest: u32, packed: Vec<u8>) -> Result<()> {
        let packed_len = packed.len() as u32;
        let entry = SectionEntry { source: 0, dest, op: SectionOp::DecompressNormal { packed_len } };
        let record = CopyRecord::owned(packed.into_boxed_slice(), packed_len, 0);
        self.push(entry, Some(record))
    }

    /// Appends a `DecompressEwramFinal` entry; its decompressor needs `window_bytes` bytes of
    /// trailing scratch space reserved at the end of EWRAM.
    pub fn push_decompress_ewram_final(&mut self, dest: u32, packed: Vec<u8>) -> Result<()> {
        let packed_len = packed.len() as u32;
        let entry = SectionEntry { source: 0, dest, op: SectionOp::DecompressEwramFinal { packed_len } };
        let record = CopyRecord::owned(packed.into_boxed_slice(), packed_len, 32);
        self.push(entry, Some(record))
    }

    /// Appends the two-entry VRAM-copy pipeline atomically (spec §4.E, §9): decompress to an
    /// intermediary scratch address, then a BIOS word-copy from there to `dest`.
    ///
    /// # Errors
    /// Returns [`AlignmentViolation`](error::Error::AlignmentViolation) if `uncompressed_len` is
    /// not a multiple of 4.
    pub fn push_vram_pipeline(&mut self, dest: u32, uncompressed_len: u32, packed: Vec<u8>) -> Result<()> {
        ensure!(
            uncompressed_len % 4 == 0,
            error::AlignmentViolationSnafu { reason: format!("VRAM section length {uncompressed_len} is not a multiple of 4") }
        );

        let intermediary = crate::region::EWRAM_END + 1 - uncompressed_len;
        let packed_len = packed.len() as u32;

        let stage1 = SectionEntry { source: 0, dest: intermediary, op: SectionOp::DecompressIntermediary { packed_len } };
        let record = CopyRecord::owned(packed.into_boxed_slice(), packed_len, uncompressed_len);
        self.push(stage1, Some(record))?;

        let stage2 = SectionEntry {
            source: intermediary,
            dest,
            op: SectionOp::Bios { fill: false, unit: BiosUnit::Word, count: uncompressed_len >> 2 },
        };
        self.push(stage2, None)
    }

    /// Appends the two-entry pipeline for a VRAM section packed by the external LZSS tool: the
    /// already-packed bytes are emitted with the `bit31` tag overloaded to mean "plain copy to the
    /// intermediary" rather than "decompress normal" (spec §9 open question — preserved
    /// bit-for-bit, not normalized).
    ///
    /// # Errors
    /// Returns [`AlignmentViolation`](error::Error::AlignmentViolation) if `uncompressed_len` is
    /// not a multiple of 4.
    pub fn push_external_vram_pipeline(&mut self, dest: u32, uncompressed_len: u32, packed: Vec<u8>) -> Result<()> {
        ensure!(
            uncompressed_len % 4 == 0,
            error::AlignmentViolationSnafu { reason: format!("VRAM section length {uncompressed_len} is not a multiple of 4") }
        );

        let intermediary = crate::region::EWRAM_END + 1 - uncompressed_len;
        let packed_len = packed.len() as u32;

        let stage1 = SectionEntry { source: 0, dest: intermediary, op: SectionOp::DecompressNormal { packed_len } };
        let record = CopyRecord::owned(packed.into_boxed_slice(), packed_len, uncompressed_len);
        self.push(stage1, Some(record))?;

        let stage2 = SectionEntry {
            source: intermediary,
            dest,
            op: SectionOp::Bios { fill: false, unit: BiosUnit::Word, count: uncompressed_len >> 2 },
        };
        self.push(stage2, None)
    }

    /// Appends a plain BIOS bulk copy of `bytes` to `dest`. `source` is left `0`; the layout pass
    /// fills it in once the payload-blob base is known.
    ///
    /// # Errors
    /// Returns [`AlignmentViolation`](error::Error::AlignmentViolation) if `bytes.len()` is odd,
    /// or [`CapacityExceeded`](error::Error::CapacityExceeded) if the unit count overflows 21 bits.
    pub fn push_bios_copy(&mut self, dest: u32, bytes: Vec<u8>) -> Result<()> {
        let (unit, count) = bios_unit_and_count(bytes.len() as u32, dest)?;
        let length = bytes.len() as u32;
        let entry = SectionEntry { source: 0, dest, op: SectionOp::Bios { fill: false, unit, count } };
        let record = CopyRecord::owned(bytes.into_boxed_slice(), length, 0);
        self.push(entry, Some(record))
    }

    /// Appends a BIOS fill of `length` zero bytes at `dest`, reading from the firmware's
    /// zero-fill sentinel address.
    ///
    /// # Errors
    /// Same as [`push_bios_copy`](Self::push_bios_copy).
    pub fn push_bios_fill(&mut self, dest: u32, length: u32) -> Result<()> {
        let (unit, count) = bios_unit_and_count(length, dest)?;
        let entry = SectionEntry {
            source: crate::region::ZERO_FILL_ADDRESS,
            dest,
            op: SectionOp::Bios { fill: true, unit, count },
        };
        self.push(entry, None)
    }

    /// Appends the terminal branch-back entry; must be the last entry pushed.
    pub fn push_terminal(&mut self, entrypoint: u32) -> Result<()> {
        let entry = SectionEntry::terminal(entrypoint, self.entries.len());
        self.push(entry, None)
    }
}

/// Chooses a BIOS unit (word if 4-byte aligned, else halfword if 2-byte aligned) and the
/// resulting unit count, checked against the 21-bit field width (spec §4.E unit-selection rule).
fn bios_unit_and_count(length: u32, dest: u32) -> Result<(BiosUnit, u32)> {
    let (unit, count) = if length % 4 == 0 {
        (BiosUnit::Word, length / 4)
    } else if length % 2 == 0 {
        (BiosUnit::Halfword, length / 2)
    } else {
        return error::AlignmentViolationSnafu { reason: format!("fill/copy area not aligned: {length} @ {dest:#010X}") }
            .fail();
    };

    ensure!(
        count < BIOS_COUNT_LIMIT,
        error::CapacityExceededSnafu { reason: format!("fill/copy area too large: {length} @ {dest:#010X}") }
    );

    Ok((unit, count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bios_copy_picks_word_unit_when_aligned() {
        let (unit, count) = bios_unit_and_count(64, 0x0300_0000).unwrap();
        assert_eq!(unit, BiosUnit::Word);
        assert_eq!(count, 16);
    }

    #[test]
    fn bios_copy_picks_halfword_unit_when_only_2_aligned() {
        let (unit, count) = bios_unit_and_count(6, 0x0300_0000).unwrap();
        assert_eq!(unit, BiosUnit::Halfword);
        assert_eq!(count, 3);
    }

    #[test]
    fn odd_length_is_alignment_violation() {
        let error = bios_unit_and_count(31, 0x0300_0000).unwrap_err();
        assert!(matches!(error, error::Error::AlignmentViolation { .. }));
    }

    #[test]
    fn capacity_is_enforced() {
        let mut state = PackState::new();
        for _ in 0..MAX_ENTRIES {
            state.push_bios_fill(0x0300_0000, 4).unwrap();
        }
        let error = state.push_bios_fill(0x0300_0000, 4).unwrap_err();
        assert!(matches!(error, error::Error::CapacityExceeded { .. }));
    }

    #[test]
    fn vram_pipeline_rejects_unaligned_length() {
        let mut state = PackState::new();
        let error = state.push_vram_pipeline(0x0600_0000, 13, vec![0xAA; 4]).unwrap_err();
        assert!(matches!(error, error::Error::AlignmentViolation { .. }));
    }

    #[test]
    fn external_vram_pipeline_rejects_unaligned_length() {
        let mut state = PackState::new();
        let error = state.push_external_vram_pipeline(0x0600_0000, 13, vec![0xAA; 4]).unwrap_err();
        assert!(matches!(error, error::Error::AlignmentViolation { .. }));
    }
}
