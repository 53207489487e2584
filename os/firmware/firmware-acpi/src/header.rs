//! # System Description Table Header
//!
//! All ACPI tables except the RSDP start with the same 36-byte header:
//!
//! ```text
//! 0   Signature        [u8; 4]
//! 4   Length           u32   (whole table, header included)
//! 8   Revision         u8
//! 9   Checksum         u8
//! 10  OEM ID           [u8; 6]
//! 16  OEM Table ID     [u8; 8]
//! 24  OEM Revision     u32
//! 28  Creator ID       u32
//! 32  Creator Revision u32
//! ```

use crate::{AsciiField, PhysMap, PhysicalAddress, read_u32};
use core::fmt;

/// Four-character table signature.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Signature(pub [u8; 4]);

impl Signature {
    /// Extended System Description Table.
    pub const XSDT: Self = Self(*b"XSDT");
    /// Fixed ACPI Description Table.
    pub const FACP: Self = Self(*b"FACP");

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&AsciiField(&self.0), f)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature(\"{self}\")")
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    #[error("table at {0} is not accessible")]
    Unmapped(PhysicalAddress),
    #[error("table length {0} is shorter than its header")]
    LengthTooShort(u32),
}

const HEADER_SIZE: usize = 36;

/// Read-only view over a table header.
#[derive(Copy, Clone)]
pub struct SdtHeader<'a> {
    bytes: &'a [u8; HEADER_SIZE],
}

impl<'a> SdtHeader<'a> {
    pub const SIZE: usize = HEADER_SIZE;

    /// Offset of the checksum byte within the table.
    pub const CHECKSUM_OFFSET: usize = 9;

    /// Interprets the first [`SdtHeader::SIZE`] bytes of `bytes`.
    #[must_use]
    pub fn from_bytes(bytes: &'a [u8]) -> Option<Self> {
        let bytes = bytes.get(..Self::SIZE)?.try_into().ok()?;
        Some(Self { bytes })
    }

    /// Maps the header of the table at `paddr`.
    ///
    /// # Errors
    /// Returns [`HeaderError::Unmapped`] if the header cannot be mapped.
    pub fn map<M: PhysMap + ?Sized>(map: &'a M, paddr: PhysicalAddress) -> Result<Self, HeaderError> {
        map.map_ro(paddr, Self::SIZE)
            .and_then(Self::from_bytes)
            .ok_or(HeaderError::Unmapped(paddr))
    }

    #[must_use]
    pub fn signature(self) -> Signature {
        Signature([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]])
    }

    #[must_use]
    pub fn length(self) -> u32 {
        read_u32(self.bytes, 4).unwrap_or_default()
    }

    #[must_use]
    pub const fn revision(self) -> u8 {
        self.bytes[8]
    }

    #[must_use]
    pub const fn checksum(self) -> u8 {
        self.bytes[Self::CHECKSUM_OFFSET]
    }

    #[must_use]
    pub fn oem_id(self) -> AsciiField<'a> {
        AsciiField(&self.bytes[10..16])
    }

    #[must_use]
    pub fn oem_table_id(self) -> AsciiField<'a> {
        AsciiField(&self.bytes[16..24])
    }

    #[must_use]
    pub fn oem_revision(self) -> u32 {
        read_u32(self.bytes, 24).unwrap_or_default()
    }

    #[must_use]
    pub fn creator_id(self) -> AsciiField<'a> {
        AsciiField(&self.bytes[28..32])
    }

    #[must_use]
    pub fn creator_revision(self) -> u32 {
        read_u32(self.bytes, 32).unwrap_or_default()
    }

    /// The table length as a `usize`, rejecting lengths below the header size.
    ///
    /// # Errors
    /// Returns [`HeaderError::LengthTooShort`] for lengths below 36 bytes.
    pub fn table_len(self) -> Result<usize, HeaderError> {
        let length = self.length();
        match usize::try_from(length) {
            Ok(len) if len >= Self::SIZE => Ok(len),
            _ => Err(HeaderError::LengthTooShort(length)),
        }
    }
}

impl fmt::Debug for SdtHeader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SdtHeader")
            .field("signature", &self.signature())
            .field("length", &self.length())
            .field("revision", &self.revision())
            .field("checksum", &self.checksum())
            .field("oem_id", &self.oem_id())
            .field("oem_table_id", &self.oem_table_id())
            .field("oem_revision", &self.oem_revision())
            .finish_non_exhaustive()
    }
}

/// Maps the whole table at `paddr`, as far as its header's length field says.
///
/// # Errors
/// Fails if the header or the full table cannot be mapped, or if the table
/// claims to be shorter than its own header.
pub fn table_bytes<M: PhysMap + ?Sized>(
    map: &M,
    paddr: PhysicalAddress,
) -> Result<&[u8], HeaderError> {
    let len = SdtHeader::map(map, paddr)?.table_len()?;
    map.map_ro(paddr, len).ok_or(HeaderError::Unmapped(paddr))
}

/// Mutable counterpart of [`table_bytes`].
///
/// # Errors
/// See [`table_bytes`].
pub fn table_bytes_mut<M: PhysMap + ?Sized>(
    map: &mut M,
    paddr: PhysicalAddress,
) -> Result<&mut [u8], HeaderError> {
    let len = SdtHeader::map(&*map, paddr)?.table_len()?;
    map.map_rw(paddr, len).ok_or(HeaderError::Unmapped(paddr))
}
