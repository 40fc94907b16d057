//! Loadable segment extraction from ELF32 program headers.

use snafu::ensure;

use crate::error::{self, Result};
use crate::header::{Elf32Phdr, PT_ARM_EXIDX, PT_LOAD};

/// A single loadable (or `.ARM.exidx`) segment, with the fields of its program header already
/// widened to `usize`/`u32` and the file-size/mem-size relationship validated.
///
/// Mirrors `phdr_supports_type()` and friends in the original packer: only `PT_LOAD` and
/// `PT_ARM_EXIDX` segments are ever handed to the classifier, and a `mem_size` of zero marks a
/// segment to be skipped entirely rather than packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub file_offset: usize,
    pub phys_addr: u32,
    pub file_size: usize,
    pub mem_size: usize,
}

impl Segment {
    fn from_phdr(phdr: &Elf32Phdr) -> Self {
        Self {
            file_offset: phdr.offset.get() as usize,
            phys_addr: phdr.paddr.get(),
            file_size: phdr.filesz.get() as usize,
            mem_size: phdr.memsz.get() as usize,
        }
    }

    /// Whether this segment is a no-op marker that should be skipped rather than packed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.mem_size == 0
    }

    /// The portion of the segment's memory image present in the file (may be shorter than
    /// `mem_size` for BSS-style tail padding, but never longer).
    #[must_use]
    pub fn file_bytes<'d>(&self, data: &'d [u8]) -> &'d [u8] {
        let end = self.file_offset + self.file_size;
        &data[self.file_offset..end]
    }
}

/// Filters a raw program header table down to the segments this packer actually cares about:
/// `PT_LOAD` and `PT_ARM_EXIDX` entries with a nonzero memory footprint, in file order.
///
/// # Errors
/// Returns [`SegmentFileSizeExceedsMemSize`](error::Error::SegmentFileSizeExceedsMemSize) if any
/// `PT_LOAD`/`PT_ARM_EXIDX` entry's `file_size` exceeds its `mem_size` (spec §3 data-model
/// invariant). This is checked for every such entry, including ones with `mem_size == 0`, before
/// the empty-segment filter ever gets a chance to skip it.
pub fn loadable_segments(phdrs: &[Elf32Phdr]) -> Result<Vec<Segment>> {
    phdrs
        .iter()
        .enumerate()
        .filter(|(_, phdr)| {
            let p_type = phdr.p_type.get();
            p_type == PT_LOAD || p_type == PT_ARM_EXIDX
        })
        .map(|(index, phdr)| (index, Segment::from_phdr(phdr)))
        .map(|(index, segment)| {
            ensure!(
                segment.file_size <= segment.mem_size,
                error::SegmentFileSizeExceedsMemSizeSnafu { index, file_size: segment.file_size, mem_size: segment.mem_size }
            );
            Ok((index, segment))
        })
        .filter(|result| !matches!(result, Ok((_, segment)) if segment.is_empty()))
        .map(|result| result.map(|(_, segment)| segment))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Elf32Phdr as RawPhdr;
    use zerocopy::little_endian::U32;

    fn phdr(p_type: u32, offset: u32, paddr: u32, filesz: u32, memsz: u32) -> RawPhdr {
        RawPhdr {
            p_type: U32::new(p_type),
            offset: U32::new(offset),
            vaddr: U32::new(paddr),
            paddr: U32::new(paddr),
            filesz: U32::new(filesz),
            memsz: U32::new(memsz),
            flags: U32::new(0),
            align: U32::new(4),
        }
    }

    #[test]
    fn filters_out_non_load_and_empty_segments() {
        let phdrs = [
            phdr(PT_LOAD, 0x94, 0x0800_0000, 0x100, 0x100),
            phdr(0x6474_e551, 0, 0, 0, 0), // PT_GNU_STACK, not interesting here
            phdr(PT_LOAD, 0x200, 0x0200_0000, 0x40, 0x40),
            phdr(PT_LOAD, 0, 0x0300_0000, 0, 0), // zero mem_size marker
            phdr(PT_ARM_EXIDX, 0x240, 0x0800_0100, 0x20, 0x20),
        ];

        let segments = loadable_segments(&phdrs).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].phys_addr, 0x0800_0000);
        assert_eq!(segments[1].phys_addr, 0x0200_0000);
        assert_eq!(segments[2].phys_addr, 0x0800_0100);
    }

    #[test]
    fn file_size_larger_than_mem_size_is_fatal() {
        let phdrs = [phdr(PT_LOAD, 0, 0x0300_0000, 0x40, 0x20)];
        let error = loadable_segments(&phdrs).unwrap_err();
        assert!(matches!(error, error::Error::SegmentFileSizeExceedsMemSize { .. }));
    }

    #[test]
    fn file_size_nonzero_with_zero_mem_size_is_fatal_not_silently_skipped() {
        let phdrs = [phdr(PT_LOAD, 0, 0x0300_0000, 0x40, 0)];
        let error = loadable_segments(&phdrs).unwrap_err();
        assert!(matches!(error, error::Error::SegmentFileSizeExceedsMemSize { .. }));
    }

    #[test]
    fn file_bytes_slices_only_the_file_backed_portion() {
        let data = [0xAAu8, 0xBB, 0xCC, 0xDD, 0xEE];
        let segment = Segment { file_offset: 1, phys_addr: 0, file_size: 3, mem_size: 8 };
        assert_eq!(segment.file_bytes(&data), &[0xBB, 0xCC, 0xDD]);
    }
}
