//! Top-level orchestration: recognizes the input image, classifies its segments, and emits the
//! final packed output (spec §4 end-to-end, driving components A-G).

use std::path::PathBuf;

use gbapack_elf::recognize::{is_rom_address, InputImage, Mode};
use log::info;

use crate::aggregator::EwramAggregator;
use crate::builder::PackState;
use crate::classify::classify_segments;
use crate::compress::CompressionConfig;
use crate::error::Result;
use crate::layout;

/// Explicit configuration threaded through the planner in place of the reference tool's
/// process-wide mutable state (spec §9 design note).
#[derive(Debug, Clone, Default)]
pub struct PackConfig {
    /// `-0`: disables compression entirely, so every section falls back to BIOS copy/fill.
    pub compress: bool,
    /// `-L <path>`: delegates VRAM-bound section compression to an external LZSS tool.
    pub external_tool: Option<PathBuf>,
}

/// Packs `data` (an ELF32 executable or a raw multiboot image) into a boot-ready output image.
/// `loader_multiboot`/`loader_rom` are the two pre-built crt0 blobs; the one matching the
/// recognized boot mode is appended to the output.
///
/// # Errors
/// Returns an error if the input can't be recognized, a segment violates a capacity or alignment
/// invariant, or the external LZSS tool (when configured) fails.
pub fn pack(data: &[u8], loader_multiboot: &[u8], loader_rom: &[u8], config: &PackConfig) -> Result<Vec<u8>> {
    let image = InputImage::recognize(data)?;
    info!("recognized input as {:?}, entry point {:#010X}", image.mode, image.entry_point);
    let loader = match image.mode {
        Mode::Multiboot => loader_multiboot,
        Mode::Rom => loader_rom,
    };

    let compression = CompressionConfig { enabled: config.compress };

    let mut state = PackState::new();
    let mut aggregator = EwramAggregator::new();

    // ROM-resident segments are written directly to their file-relative offsets by the layout
    // pass; only non-ROM segments ever need a command-stream entry. A ROM-mode image can still
    // carry IWRAM/EWRAM/VRAM `PT_LOAD` segments alongside its ROM one, so this must filter by
    // the same ROM-range predicate the layout pass uses, not just "below ROM_START".
    let non_rom_segments: Vec<_> = match image.mode {
        Mode::Rom => image.segments.iter().filter(|segment| !is_rom_address(segment.phys_addr)).copied().collect(),
        Mode::Multiboot => image.segments.clone(),
    };

    classify_segments(
        &non_rom_segments,
        image.data,
        image.mode,
        &compression,
        config.external_tool.as_deref(),
        &mut state,
        &mut aggregator,
    )?;

    state.push_terminal(image.entry_point)?;

    layout::emit(&image, loader, state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elf_image(phdrs: &[(u32, u32, u32, u32, u32)]) -> Vec<u8> {
        const EHDR_LEN: usize = 52;
        const PHDR_LEN: usize = 32;
        let phoff = EHDR_LEN as u32;
        let mut data = vec![0u8; EHDR_LEN + phdrs.len() * PHDR_LEN];
        data[0..4].copy_from_slice(&[0x7f, b'E', b'L', b'F']);
        data[4] = 1;
        data[5] = 1;
        data[16..18].copy_from_slice(&2u16.to_le_bytes());
        data[18..20].copy_from_slice(&40u16.to_le_bytes());
        data[20..24].copy_from_slice(&1u32.to_le_bytes());
        data[24..28].copy_from_slice(&0x0800_0100u32.to_le_bytes());
        data[28..32].copy_from_slice(&phoff.to_le_bytes());
        data[42..44].copy_from_slice(&(PHDR_LEN as u16).to_le_bytes());
        data[44..46].copy_from_slice(&(phdrs.len() as u16).to_le_bytes());
        for (i, &(p_type, offset, paddr, filesz, memsz)) in phdrs.iter().enumerate() {
            let base = EHDR_LEN + i * PHDR_LEN;
            data[base..base + 4].copy_from_slice(&p_type.to_le_bytes());
            data[base + 4..base + 8].copy_from_slice(&offset.to_le_bytes());
            data[base + 12..base + 16].copy_from_slice(&paddr.to_le_bytes());
            data[base + 16..base + 20].copy_from_slice(&filesz.to_le_bytes());
            data[base + 20..base + 24].copy_from_slice(&memsz.to_le_bytes());
        }
        data
    }

    #[test]
    fn s1_rom_only_elf_has_no_commanded_sections() {
        const PT_LOAD: u32 = 1;
        let mut data = elf_image(&[(PT_LOAD, 84, 0x0800_0100, 1024, 1024)]);
        data.resize(84 + 1024, 0xAA);

        let config = PackConfig { compress: true, external_tool: None };
        let output = pack(&data, &[0u8; 16], &[0u8; 16], &config).unwrap();

        let branch = u32::from_le_bytes(output[0..4].try_into().unwrap());
        assert_eq!(branch & 0xFF00_0000, 0xEA00_0000);
        assert_eq!(&output[0x100..0x100 + 1024], &vec![0xAAu8; 1024][..]);
    }

    #[test]
    fn s6_over_capacity_segments_are_fatal() {
        const PT_LOAD: u32 = 1;
        let phdrs: Vec<_> = (0..1025).map(|i| (PT_LOAD, 52, 0x0300_0000 + i * 4, 4, 4)).collect();
        let data = elf_image(&phdrs);

        let config = PackConfig { compress: false, external_tool: None };
        let error = pack(&data, &[0u8; 4], &[0u8; 4], &config).unwrap_err();
        assert!(matches!(error, crate::error::Error::CapacityExceeded { .. }));
    }

    #[test]
    fn rom_mode_with_coexisting_non_rom_segment_does_not_underflow() {
        // A ROM-mode image can legitimately carry an IWRAM `PT_LOAD` alongside its ROM one; the
        // IWRAM segment must be routed to the command-stream classifier, never treated as a raw
        // ROM-relative write (`phys_addr - ROM_START` would underflow for an IWRAM address).
        const PT_LOAD: u32 = 1;
        let mut data = elf_image(&[(PT_LOAD, 84, 0x0800_0100, 16, 16), (PT_LOAD, 100, 0x0300_0000, 4, 4)]);
        data.resize(84 + 16, 0xAA);
        data.extend_from_slice(&[0x11, 0x22, 0x33, 0x44]);

        let config = PackConfig { compress: false, external_tool: None };
        let output = pack(&data, &[0u8; 16], &[0u8; 16], &config).unwrap();

        assert_eq!(&output[0x100..0x100 + 16], &vec![0xAAu8; 16][..]);
    }
}
