//! Segment classifier (component C): walks the non-ROM loadable segments in strict pass order,
//! turning each into a command-stream entry (or staging it into the EWRAM aggregator) per the
//! rules of spec §4.C.

use std::path::Path;

use gbapack_core::util::format_size;
use gbapack_elf::prelude::Segment;
use gbapack_elf::recognize::Mode;
use log::trace;

use crate::aggregator::EwramAggregator;
use crate::builder::PackState;
use crate::compress::{self, Compressed, CompressionConfig};
use crate::error::Result;
use crate::region::{self, RegionKind};

/// Runs all four classification passes over `segments` (already filtered to exclude any ROM-range
/// segments, which the layout pass writes directly), staging EWRAM data into `aggregator` and
/// appending everything else to `state`.
///
/// # Errors
/// Propagates alignment/capacity errors from the command-stream builder, or failure from an
/// external LZSS tool invocation.
pub fn classify_segments(
    segments: &[Segment],
    data: &[u8],
    mode: Mode,
    config: &CompressionConfig,
    external_tool: Option<&Path>,
    state: &mut PackState,
    aggregator: &mut EwramAggregator,
) -> Result<()> {
    let mut processed = vec![false; segments.len()];

    // Pass 1: destinations that don't support 8-bit writes (VRAM-like).
    for (index, segment) in segments.iter().enumerate() {
        if segment.file_size == 0 || region::supports_8bit_writes(segment.phys_addr) {
            continue;
        }
        classify_vram(segment, data, config, external_tool, state, index as u32)?;
        processed[index] = true;
    }

    // Pass 2: remaining file-backed segments; EWRAM ones feed the aggregator, others compress or
    // copy/fill immediately.
    for (index, segment) in segments.iter().enumerate() {
        if processed[index] {
            continue;
        }

        let is_ewram = region::classify(segment.phys_addr) == RegionKind::Ewram;
        if mode == Mode::Multiboot && is_ewram {
            if segment.file_size > 0 {
                aggregator.stage(segment.phys_addr, segment.file_bytes(data));
                processed[index] = true;
            }
            continue;
        }

        if segment.file_size > 0 {
            classify_normal(segment, data, config, state)?;
        } else {
            state.push_bios_fill(segment.phys_addr, segment.mem_size as u32)?;
        }
        processed[index] = true;
    }

    // Pass 3: the aggregated EWRAM blob, compressed as one `COMPRESSED_EWRAM_FINAL` section.
    if let Some((dest, bytes)) = aggregator.finish() {
        let window = aggregator.window_bytes();
        trace!("compressing aggregated EWRAM data ({}, window {window})", format_size(bytes.len()));
        match compress::try_compress(config, bytes, window) {
            Compressed::Accepted(packed) => state.push_decompress_ewram_final(dest, packed)?,
            Compressed::Rejected => state.push_bios_copy(dest, bytes.to_vec())?,
        }
    }

    // Pass 4: whatever's left is EWRAM BSS (multiboot mode, file_size == 0, deferred past the
    // aggregated blob so the blob's section always precedes its region's fills).
    for (index, segment) in segments.iter().enumerate() {
        if processed[index] {
            continue;
        }
        state.push_bios_fill(segment.phys_addr, segment.mem_size as u32)?;
    }

    Ok(())
}

fn classify_vram(
    segment: &Segment,
    data: &[u8],
    config: &CompressionConfig,
    external_tool: Option<&Path>,
    state: &mut PackState,
    nonce: u32,
) -> Result<()> {
    let bytes = segment.file_bytes(data);
    let length = segment.file_size as u32;

    let compressed = if !config.enabled {
        Compressed::Rejected
    } else if let Some(tool) = external_tool {
        compress::try_compress_external(tool, bytes, nonce)?
    } else {
        compress::try_compress(config, bytes, 0)
    };

    match compressed {
        Compressed::Accepted(packed) if external_tool.is_some() => {
            state.push_external_vram_pipeline(segment.phys_addr, length, packed)
        }
        Compressed::Accepted(packed) => state.push_vram_pipeline(segment.phys_addr, length, packed),
        Compressed::Rejected => state.push_bios_copy(segment.phys_addr, bytes.to_vec()),
    }
}

fn classify_normal(segment: &Segment, data: &[u8], config: &CompressionConfig, state: &mut PackState) -> Result<()> {
    let bytes = segment.file_bytes(data);
    match compress::try_compress(config, bytes, 0) {
        Compressed::Accepted(packed) => state.push_decompress_normal(segment.phys_addr, packed),
        Compressed::Rejected => state.push_bios_copy(segment.phys_addr, bytes.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(phys_addr: u32, file_size: usize, mem_size: usize) -> Segment {
        Segment { file_offset: 0, phys_addr, file_size, mem_size }
    }

    #[test]
    fn iwram_bss_gets_bios_fill_immediately() {
        let segments = vec![segment(0x0300_0400, 0, 256)];
        let data = vec![];
        let mut state = PackState::new();
        let mut aggregator = EwramAggregator::new();
        let config = CompressionConfig { enabled: true };

        classify_segments(&segments, &data, Mode::Multiboot, &config, None, &mut state, &mut aggregator).unwrap();

        assert_eq!(state.len(), 1);
        assert!(state.records()[0].is_none());
    }

    #[test]
    fn ewram_segment_is_staged_not_emitted_directly() {
        let segments = vec![segment(0x0200_1000, 16, 16)];
        let data = vec![0xAAu8; 16];
        let mut state = PackState::new();
        let mut aggregator = EwramAggregator::new();
        let config = CompressionConfig { enabled: true };

        classify_segments(&segments, &data, Mode::Multiboot, &config, None, &mut state, &mut aggregator).unwrap();

        assert_eq!(state.len(), 1); // the aggregated blob's own entry
        assert!(aggregator.finish().is_some());
    }

    #[test]
    fn vram_segment_emits_two_entry_pipeline_when_compressed() {
        let segments = vec![segment(0x0600_0000, 256, 256)];
        let data = vec![0xAAu8; 256];
        let mut state = PackState::new();
        let mut aggregator = EwramAggregator::new();
        let config = CompressionConfig { enabled: true };

        classify_segments(&segments, &data, Mode::Multiboot, &config, None, &mut state, &mut aggregator).unwrap();

        assert_eq!(state.len(), 2);
    }
}
