//! Compression adapter (component B): wraps the opaque compressor behind the planner's
//! accept/reject contract, and optionally delegates to an external LZSS tool for VRAM-bound
//! payloads.

use std::path::{Path, PathBuf};
use std::process::Command;

use gbapack_core::util::format_size;
use gbapack_lzss::window::MAX_WINDOW_BYTES;
use log::trace;
use snafu::prelude::*;

use crate::error::{self, ExternalToolFailureSnafu, Result};

/// Explicit configuration threaded through the planner in place of the reference tool's
/// process-wide verbose flag (spec §9 design note). The external-tool path, when present, lives
/// alongside this in [`crate::plan::PackConfig`] since only the VRAM-copy path ever consults it.
#[derive(Debug, Clone, Copy)]
pub struct CompressionConfig {
    pub enabled: bool,
}

/// The outcome of attempting to compress a buffer. Rejection is not an error (spec §4.B): it is a
/// signal to the classifier to fall back to an uncompressed copy.
#[derive(Debug)]
pub enum Compressed {
    Accepted(Vec<u8>),
    Rejected,
}

/// Chooses a window size for `gbapack_lzss::compress`: `0` asks for the crate's largest supported
/// window, and any other request is clamped down to the nearest power of two no larger than
/// [`MAX_WINDOW_BYTES`] (our compressor's 12-bit back-reference field cannot express a wider one).
fn effective_window(window_bytes: u32) -> usize {
    let requested = if window_bytes == 0 { MAX_WINDOW_BYTES as u32 } else { window_bytes };
    let clamped = requested.clamp(1, MAX_WINDOW_BYTES as u32) as usize;
    round_down_to_power_of_two(clamped)
}

/// Attempts to compress `bytes` against a window of at most `window_bytes` bytes (`0` picks a
/// default). Accepted only if the packed form is strictly smaller than the input (spec §4.B).
pub fn try_compress(config: &CompressionConfig, bytes: &[u8], window_bytes: u32) -> Compressed {
    if !config.enabled || bytes.is_empty() {
        return Compressed::Rejected;
    }

    let window = effective_window(window_bytes);
    let packed = gbapack_lzss::compress(bytes, window);

    if !packed.is_empty() && packed.len() < bytes.len() {
        trace!("compressed {} to {}", format_size(bytes.len()), format_size(packed.len()));
        Compressed::Accepted(packed)
    } else {
        trace!("compression rejected for {} (window {window})", format_size(bytes.len()));
        Compressed::Rejected
    }
}

const fn round_down_to_power_of_two(value: usize) -> usize {
    1 << (usize::BITS - 1 - value.leading_zeros())
}

/// Delegates compression of `bytes` to an external LZSS tool, invoked as
/// `"<path>" -evo <tmp_in> <tmp_out>` (spec §6). Blocks until the child exits; a nonzero exit is
/// fatal. Temp files are named from the host PID plus a caller-supplied nonce and removed on a
/// best-effort basis once the child has run.
///
/// # Errors
/// Returns [`ExternalToolFailure`](error::Error::ExternalToolFailure) if the child can't be
/// spawned, exits nonzero, or its output can't be read back.
pub fn try_compress_external(tool: &Path, bytes: &[u8], nonce: u32) -> Result<Compressed> {
    let pid = std::process::id();
    let tmp_in = PathBuf::from(format!(".gbapack.i{pid}.{nonce}.bin"));
    let tmp_out = PathBuf::from(format!(".gbapack.o{pid}.{nonce}.bin"));

    std::fs::write(&tmp_in, bytes).context(error::IoSnafu)?;

    let status = Command::new(tool).arg("-evo").arg(&tmp_in).arg(&tmp_out).status();
    let cleanup = |tool_result: Result<Compressed>| -> Result<Compressed> {
        let _ = std::fs::remove_file(&tmp_in);
        let _ = std::fs::remove_file(&tmp_out);
        tool_result
    };

    let status = match status {
        Ok(status) => status,
        Err(source) => {
            return cleanup(Err(error::Error::Io { source }));
        }
    };

    if !status.success() {
        return cleanup(ExternalToolFailureSnafu { reason: format!("exited with {status}"), path: tool.to_path_buf() }.fail());
    }

    let packed = match std::fs::read(&tmp_out) {
        Ok(packed) => packed,
        Err(_) => {
            return cleanup(
                ExternalToolFailureSnafu { reason: "output file missing".to_string(), path: tool.to_path_buf() }.fail(),
            );
        }
    };

    cleanup(Ok(if !packed.is_empty() && packed.len() < bytes.len() {
        Compressed::Accepted(packed)
    } else {
        Compressed::Rejected
    }))
}
