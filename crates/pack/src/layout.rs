//! Output image layout and emitter (component F): assembles the final byte-exact image from a
//! recognized input, a loader blob, and a built [`PackState`] (spec §4.F).

use gbapack_core::cursor::ImageWriter;
use gbapack_elf::recognize::{is_rom_address, InputImage, Mode};
use log::debug;
use snafu::prelude::*;

use crate::builder::PackState;
use crate::entry::CopySource;
use crate::error::{self, Result};
use crate::region::{EWRAM_SIZE, EWRAM_START, ROM_START};

const ROM_HEADER_COPY_START: usize = 4;
const ROM_HEADER_COPY_END: usize = 0xC0;

/// Lays out and serializes the final output image, consuming `state`'s accumulated entries and
/// records (spec §4.F steps 1-9).
///
/// # Errors
/// Returns [`CapacityExceeded`](error::Error::CapacityExceeded) if, in multiboot mode, the
/// emitted payload plus the largest `reserve_at_end` would overrun EWRAM.
pub fn emit(image: &InputImage<'_>, loader: &[u8], mut state: PackState) -> Result<Vec<u8>> {
    let mut writer = ImageWriter::new();

    // Step 1: ROM mode reserves the branch placeholder at offset 0 and seeks each raw segment to
    // its ROM-relative file offset. A ROM-mode image can still carry non-ROM segments (IWRAM,
    // EWRAM, VRAM) alongside its ROM one, so this must skip anything outside the ROM window —
    // those were already routed to the command-stream classifier instead (see `plan.rs`).
    if image.mode == Mode::Rom {
        writer.write_u32(0);
        for segment in &image.segments {
            if segment.file_size == 0 || !is_rom_address(segment.phys_addr) {
                continue;
            }
            let file_offset = (segment.phys_addr - ROM_START) as usize;
            writer.seek_start(file_offset);
            writer.write_bytes(segment.file_bytes(image.data));
        }
    }

    // Step 2: append the loader at end-of-file.
    writer.seek_end();
    let loader_offset = writer.position();
    writer.write_bytes(loader);

    // Step 3: raw/multiboot input copies its logo+header bytes into the same window of the
    // output. The first 4 bytes are left alone: that's the loader's own branch slot, not the
    // source image's (spec §9 design note on this asymmetry).
    if image.is_raw {
        writer.seek_start(ROM_HEADER_COPY_START);
        writer.write_bytes(&image.data[ROM_HEADER_COPY_START..ROM_HEADER_COPY_END]);
    }
    writer.seek_end();

    // Step 4: assign each CopyRecord's payload-blob offset and rewrite its owning entry's source.
    let payload_base = match image.mode {
        Mode::Multiboot => EWRAM_START,
        Mode::Rom => ROM_START,
    } + writer.position() as u32
        + 4;

    let mut running_offset = 0u32;
    for record in state.records_mut().iter_mut().flatten() {
        record.assigned_offset = Some(running_offset);
        running_offset += record.padded_length();
    }
    let rom_data_length = running_offset;

    for (entry, record) in state.entries_mut_with_records() {
        if let Some(record) = record {
            let offset = record.assigned_offset.expect("assigned in the pass above");
            entry.source = match &record.source {
                CopySource::Owned(_) => payload_base + offset,
                CopySource::Fixed(address) => *address,
            };
        }
    }

    // Step 5: rom_data_length, then each payload's bytes, zero-padded to a 4-byte boundary.
    writer.write_u32(rom_data_length);
    for record in state.records().iter().flatten() {
        if let CopySource::Owned(bytes) = &record.source {
            writer.write_bytes(bytes);
            let pad = record.padded_length() - record.length;
            if pad > 0 {
                writer.write_bytes(&vec![0u8; pad as usize]);
            }
        }
    }

    // Step 6-7: command_stream_length (in 32-bit words; 3 words per entry), then the entries.
    let command_stream_length = state.len() as u32 * 3;
    writer.write_u32(command_stream_length);
    for entry in state.entries() {
        writer.write_bytes(&entry.to_le_bytes());
    }

    // Step 8: multiboot output must leave room for the largest decompressor's trailing scratch.
    if image.mode == Mode::Multiboot {
        let max_reserve = state.records().iter().flatten().map(|record| record.reserve_at_end).max().unwrap_or(0);
        let file_size = writer.position() as u32;
        ensure!(
            file_size + max_reserve <= EWRAM_SIZE,
            error::CapacityExceededSnafu {
                reason: format!("output ({file_size} bytes) plus scratch reserve ({max_reserve}) exceeds EWRAM")
            }
        );
    }

    // Step 9: patch the ROM-mode branch at offset 0 now that loader_offset is known.
    if image.mode == Mode::Rom {
        let branch = 0xEA00_0000u32 | (((loader_offset as u32) - 8) >> 2);
        writer.seek_start(0);
        writer.write_u32(branch);
    }

    debug!("emitted {} byte image, {} command-stream entries", writer.len(), state.len());
    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use gbapack_elf::prelude::Segment;

    use super::*;
    use crate::builder::PackState;

    fn rom_image(data: &'static [u8]) -> InputImage<'static> {
        InputImage {
            data,
            mode: Mode::Rom,
            entry_point: ROM_START + 0x100,
            segments: vec![Segment { file_offset: 0, phys_addr: ROM_START + 0x100, file_size: data.len(), mem_size: data.len() }],
            is_raw: false,
        }
    }

    #[test]
    fn rom_mode_patches_branch_at_offset_zero() {
        let data: &'static [u8] = &[0xAAu8; 16];
        let image = rom_image(data);
        let mut state = PackState::new();
        state.push_terminal(image.entry_point).unwrap();

        let output = emit(&image, &[0u8; 8], state).unwrap();
        let branch = u32::from_le_bytes(output[0..4].try_into().unwrap());
        assert_eq!(branch & 0xFF00_0000, 0xEA00_0000);
    }

    #[test]
    fn payload_records_are_assigned_sequential_padded_offsets() {
        let data: &'static [u8] = &[0u8; 16];
        let image = rom_image(data);
        let loader = [0u8; 4];
        let mut state = PackState::new();
        state.push_decompress_normal(ROM_START + 0x200, vec![1, 2, 3, 4, 5]).unwrap();
        state.push_decompress_normal(ROM_START + 0x300, vec![6, 7]).unwrap();
        state.push_terminal(image.entry_point).unwrap();

        let output = emit(&image, &loader, state).unwrap();

        // ROM mode places the segment at its paddr-relative offset, then the loader right after.
        let rom_segment_end = 0x100 + data.len();
        let loader_end = rom_segment_end + loader.len();
        let payload_base = ROM_START + loader_end as u32 + 4;

        // Invariant 3 (spec §8): rom_data_length == sum of round_up_4(record.length).
        let rom_data_length_offset = loader_end;
        let rom_data_length = u32::from_le_bytes(output[rom_data_length_offset..rom_data_length_offset + 4].try_into().unwrap());
        assert_eq!(rom_data_length, 8 + 4); // 5 bytes padded to 8, 2 bytes padded to 4

        let payload_start = rom_data_length_offset + 4;
        assert_eq!(&output[payload_start..payload_start + 5], &[1, 2, 3, 4, 5]);
        assert_eq!(&output[payload_start + 5..payload_start + 8], &[0, 0, 0]); // pad to 4-byte boundary
        assert_eq!(&output[payload_start + 8..payload_start + 10], &[6, 7]);
        assert_eq!(&output[payload_start + 10..payload_start + 12], &[0, 0]); // pad to 4-byte boundary

        // Invariant 4 (spec §8): command_stream_length == entries_count * 3 (words per entry).
        let command_stream_length_offset = payload_start + rom_data_length as usize;
        let command_stream_length =
            u32::from_le_bytes(output[command_stream_length_offset..command_stream_length_offset + 4].try_into().unwrap());
        assert_eq!(command_stream_length, 3 * 3);

        // Invariant 2 (spec §8): each CopyRecord's source lands inside [payload_base, payload_base
        // + rom_data_length) and the output bytes there match the record's contents.
        let entries_start = command_stream_length_offset + 4;
        let first_source = u32::from_le_bytes(output[entries_start..entries_start + 4].try_into().unwrap());
        let second_source = u32::from_le_bytes(output[entries_start + 12..entries_start + 16].try_into().unwrap());
        assert_eq!(first_source, payload_base);
        assert_eq!(second_source, payload_base + 8);
        assert!(first_source >= payload_base && first_source < payload_base + rom_data_length);
        assert!(second_source >= payload_base && second_source < payload_base + rom_data_length);
    }

    #[test]
    fn multiboot_output_rejects_insufficient_trailing_ewram() {
        let data: &'static [u8] = &[0u8; EWRAM_SIZE as usize];
        let image = InputImage {
            data,
            mode: Mode::Multiboot,
            entry_point: EWRAM_START,
            segments: vec![Segment { file_offset: 0, phys_addr: EWRAM_START, file_size: data.len(), mem_size: data.len() }],
            is_raw: false,
        };
        let mut state = PackState::new();
        state.push_decompress_ewram_final(EWRAM_START, vec![0u8; (EWRAM_SIZE - 64) as usize]).unwrap();
        state.push_terminal(image.entry_point).unwrap();

        let error = emit(&image, &[0u8; 4], state).unwrap_err();
        assert!(matches!(error, error::Error::CapacityExceeded { .. }));
    }
}
