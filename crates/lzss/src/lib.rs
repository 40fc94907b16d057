//! A small self-contained LZSS-family compressor, standing in for the packer's opaque
//! `compress(src) -> packed|err` collaborator: the packer only depends on this crate's contract
//! (accept/reject a source buffer against a configurable window size, and decompress what was
//! accepted), not on any particular bitstream. Kept alongside, rather than delegating to an
//! external tool, only the `-L` path shells out to one (see `gbapack-pack::compress`).
//!
//! # Format
//! A 4-byte little-endian decompressed size, followed by a stream of control-byte groups: each
//! control byte's bits (MSB first) say whether the next token is a literal byte or a 2-byte match
//! token (4-bit length, 3..18, plus a 12-bit back-reference distance). The 12-bit distance field
//! is why [`MAX_WINDOW_BYTES`](window::MAX_WINDOW_BYTES) caps the window this crate will search.

pub mod error;
pub mod prelude;
pub mod window;

use error::{InvalidBackrefSnafu, Result, TruncatedSnafu};
use log::trace;
use snafu::{ensure, OptionExt};
use window::{Window, MAX_WINDOW_BYTES, MIN_MATCH};

const MAX_MATCH: usize = MIN_MATCH + 0xF;
const HEADER_LEN: usize = 4;

/// Compresses `input` against a sliding window of at most `window_bytes` bytes back.
///
/// `window_bytes` must be a power of two no larger than [`MAX_WINDOW_BYTES`]; the packer uses this
/// to keep a segment's decompressor from ever reading before the start of its scratch region.
///
/// # Panics
/// Panics if `window_bytes` is zero, not a power of two, or exceeds [`MAX_WINDOW_BYTES`].
#[must_use]
pub fn compress(input: &[u8], window_bytes: usize) -> Vec<u8> {
    assert!(window_bytes.is_power_of_two() && window_bytes <= MAX_WINDOW_BYTES);

    let mut output = Vec::with_capacity(HEADER_LEN + input.len());
    output.extend_from_slice(&(input.len() as u32).to_le_bytes());

    if input.is_empty() {
        return output;
    }

    let mut window = Window::new(input, window_bytes, MAX_MATCH);
    let mut input_pos = 0;
    let mut flag_byte_pos = output.len();
    let mut flag_byte_shift: u8 = 0x80;
    output.push(0);

    while input_pos < input.len() {
        let (match_offset, match_length) = window.search(input_pos);

        if match_length < MIN_MATCH as u32 {
            output[flag_byte_pos] |= flag_byte_shift;
            output.push(input[input_pos]);
            input_pos += 1;
        } else {
            let distance = (input_pos - match_offset as usize - 1) as u16;
            let length = match_length as u8;
            output.push(((length - MIN_MATCH as u8) << 4) | ((distance >> 8) as u8 & 0x0F));
            output.push(distance as u8);
            input_pos += match_length as usize;
        }

        flag_byte_shift >>= 1;
        if flag_byte_shift == 0 {
            flag_byte_shift = 0x80;
            flag_byte_pos = output.len();
            output.push(0);
        }
    }

    trace!("compressed {} bytes to {} bytes (window {window_bytes})", input.len(), output.len());
    output
}

/// Decompresses a stream produced by [`compress`].
///
/// # Errors
/// Returns [`Truncated`](error::Error::Truncated) if the stream ends before its declared size is
/// reached, or [`InvalidBackref`](error::Error::InvalidBackref) if a match token's distance points
/// before the start of the output.
pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    ensure!(input.len() >= HEADER_LEN, TruncatedSnafu);
    let decompressed_size = u32::from_le_bytes(input[0..4].try_into().unwrap()) as usize;

    let mut output = Vec::with_capacity(decompressed_size);
    let mut input_pos = HEADER_LEN;
    let mut mask: u8 = 0;
    let mut flags: u8 = 0;

    while output.len() < decompressed_size {
        if mask == 0 {
            flags = *input.get(input_pos).context(TruncatedSnafu)?;
            input_pos += 1;
            mask = 0x80;
        }

        if flags & mask != 0 {
            output.push(*input.get(input_pos).context(TruncatedSnafu)?);
            input_pos += 1;
        } else {
            let byte0 = *input.get(input_pos).context(TruncatedSnafu)?;
            let byte1 = *input.get(input_pos + 1).context(TruncatedSnafu)?;
            input_pos += 2;

            let length = (byte0 >> 4) as usize + MIN_MATCH;
            let distance = (usize::from(byte0 & 0x0F) << 8) | usize::from(byte1);
            let back = distance + 1;

            ensure!(output.len() >= back, InvalidBackrefSnafu);
            let start = output.len() - back;
            for i in 0..length {
                let byte = output[start + i];
                output.push(byte);
            }
        }

        mask >>= 1;
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_repetitive_data() {
        let input: Vec<u8> = (0..512).map(|i| (i % 7) as u8).collect();
        let packed = compress(&input, 0x1000);
        let unpacked = decompress(&packed).unwrap();
        assert_eq!(unpacked, input);
    }

    #[test]
    fn round_trips_incompressible_data() {
        let input: Vec<u8> = (0..256).map(|i| ((i * 61) ^ 0x5A) as u8).collect();
        let packed = compress(&input, 0x1000);
        let unpacked = decompress(&packed).unwrap();
        assert_eq!(unpacked, input);
    }

    #[test]
    fn empty_input_round_trips() {
        let packed = compress(&[], 0x1000);
        assert_eq!(decompress(&packed).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn rejects_truncated_stream() {
        let packed = compress(b"abcabcabcabc", 0x1000);
        let truncated = &packed[..packed.len() - 1];
        assert!(decompress(truncated).is_err());
    }

    #[test]
    fn respects_window_limit() {
        // Force a window far smaller than the repeat distance: the match can't be found, so the
        // whole stream is encoded as literals and still round-trips correctly.
        let mut input = vec![0xAAu8; 16];
        input.extend(std::iter::repeat(0xBB).take(16));
        input.extend_from_slice(&[0xAA; 16]);
        let packed = compress(&input, 16);
        assert_eq!(decompress(&packed).unwrap(), input);
    }
}
