//! Utility functions that can't be grouped into any other module.

/// Converts a byte length into a human-readable format.
///
/// This condenses the length of a buffer until it can't be shrunk any further and returns that
/// with the relevant unit (bytes, KB, MB, GB, etc). Used by verbose planner tracing to report
/// compression ratios.
///
/// # Warnings
/// This function uses f64, which on a 64-bit system will lose precision if the length is too
/// large, but it should still round to a close-enough value.
#[must_use]
pub fn format_size(length: usize) -> String {
    const UNITS: [&str; 7] = ["bytes", "KB", "MB", "GB", "TB", "PB", "EB"];
    let mut size = length as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_size_picks_unit() {
        assert_eq!(format_size(512), "512.00 bytes");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(1024 * 1024 * 3), "3.00 MB");
    }
}
