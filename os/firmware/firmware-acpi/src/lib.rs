//! # ACPI Table Discovery and FADT Patching
//!
//! This crate locates the firmware's ACPI tables during the UEFI boot phase and
//! rewrites a single bit of the Fixed ACPI Description Table (FADT): the
//! "PCIe ASPM Controls" flag of the IA-PC boot architecture field. Firmware
//! sets this flag to tell the operating system not to touch Active State Power
//! Management; clearing it lets the OS manage ASPM on its own.
//!
//! ## Architecture
//!
//! The tables form a short pointer chain that is walked front to back:
//!
//! ```text
//! UEFI Configuration Table (GUID, address) entries
//!     ↓  ACPI_GUID / ACPI2_GUID
//! RSDP/XSDP (Root System Description Pointer, revision ≥ 2)
//!     ↓  64-bit XSDT address
//! XSDT (Extended System Description Table)
//!     ↓  one 64-bit address per table, in firmware order
//! FADT ("FACP") → IA-PC boot architecture flags, bit 4
//! ```
//!
//! ## Key Components
//!
//! * [`checksum`]: 8-bit wrapping byte sums and the corrective checksum byte
//! * [`header`]: read-only view over the common 36-byte table header
//! * [`rsdp`]: configuration-table scan for the version 2 root pointer
//! * [`xsdt`]: extended table validation and lazy entry iteration
//! * [`fadt`]: boot architecture flags and the in-place patch
//! * [`aspm`]: the driver that composes the above and derives a status
//!
//! ## Memory Access
//!
//! Nothing in here dereferences a raw address. Every table is accessed through
//! the [`PhysMap`] trait, which hands out bounds-checked byte slices for a
//! physical range. The UEFI application implements it over identity-mapped
//! boot memory; tests and host tools use [`PhysBuffer`] over an owned image.
//!
//! ## Mutation
//!
//! Exactly two byte ranges are ever written: the 16-bit boot architecture
//! flags at FADT offset 109, and the FADT checksum byte at offset 9. Nothing is
//! persisted; the change lives in memory for the current boot only.
//!
//! ## Usage
//!
//! ```rust
//! use firmware_acpi::{PhysBuffer, PhysicalAddress, aspm::enable_aspm, rsdp::ConfigEntry};
//!
//! let mut image = [0u8; 64];
//! let mut map = PhysBuffer::new(PhysicalAddress::new(0x1000), &mut image);
//! let entries: [ConfigEntry; 0] = [];
//!
//! let report = enable_aspm(&mut map, entries);
//! assert!(report.result().is_err());
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod address;
pub mod aspm;
pub mod checksum;
pub mod fadt;
pub mod header;
mod memory;
pub mod rsdp;
pub mod xsdt;

pub use address::PhysicalAddress;
pub use aspm::{AspmError, AspmReport, AspmStatus};
pub use memory::{PhysBuffer, PhysMap};

/// Reads a little-endian `u16` at `offset`, if in bounds.
fn read_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    let raw = bytes.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([raw[0], raw[1]]))
}

/// Reads a little-endian `u32` at `offset`, if in bounds.
fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw = bytes.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

/// Reads a little-endian `u64` at `offset`, if in bounds.
fn read_u64(bytes: &[u8], offset: usize) -> Option<u64> {
    let raw = bytes.get(offset..offset.checked_add(8)?)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(raw);
    Some(u64::from_le_bytes(buf))
}

/// Printable view of a fixed ASCII field such as an OEM ID.
///
/// Non-printable bytes are shown as `.` so firmware garbage cannot corrupt
/// console output.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct AsciiField<'a>(pub &'a [u8]);

impl core::fmt::Display for AsciiField<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use core::fmt::Write;
        for &b in self.0 {
            let c = if b.is_ascii_graphic() || b == b' ' {
                char::from(b)
            } else {
                '.'
            };
            f.write_char(c)?;
        }
        Ok(())
    }
}

impl core::fmt::Debug for AsciiField<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn little_endian_reads_respect_bounds() {
        let bytes = [0x34, 0x12, 0x78, 0x56, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE];
        assert_eq!(read_u16(&bytes, 0), Some(0x1234));
        assert_eq!(read_u32(&bytes, 0), Some(0x5678_1234));
        assert_eq!(read_u64(&bytes, 1), Some(0xEEDD_CCBB_AA56_7812));
        assert_eq!(read_u64(&bytes, 2), None);
        assert_eq!(read_u16(&bytes, usize::MAX), None);
    }

    #[test]
    fn ascii_field_masks_non_printables() {
        let field = AsciiField(b"AB\x00C\x7f");
        assert_eq!(format!("{field}"), "AB.C.");
        assert_eq!(format!("{field:?}"), "\"AB.C.\"");
    }
}
