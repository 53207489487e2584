//! # ACPI Checksums
//!
//! Every ACPI table carries a checksum byte chosen so that all bytes of the
//! table, the checksum included, sum to zero modulo 256.

/// Wrapping 8-bit sum of `bytes`.
#[inline]
#[must_use]
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |a, &b| a.wrapping_add(b))
}

/// Whether `bytes` sum to zero.
#[inline]
#[must_use]
pub fn verify(bytes: &[u8]) -> bool {
    checksum(bytes) == 0
}

/// Checksum byte that brings a table back to a zero sum.
///
/// `old` is the checksum byte currently stored in the table and `full_sum`
/// the sum over the whole table, `old` included.
#[inline]
#[must_use]
pub const fn corrective(old: u8, full_sum: u8) -> u8 {
    old.wrapping_sub(full_sum)
}
