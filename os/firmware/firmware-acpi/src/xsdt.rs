//! # XSDT (Extended System Description Table)
//!
//! A standard header with signature `"XSDT"`, followed by one little-endian
//! 64-bit physical address per contained table.

use crate::header::{SdtHeader, Signature, table_bytes};
use crate::{AsciiField, AspmError, PhysMap, PhysicalAddress, read_u64};
use core::iter::FusedIterator;
use log::{debug, warn};

const ENTRY_SIZE: usize = size_of::<u64>();

/// Number of entries in an XSDT of `length` bytes.
///
/// Trailing bytes that do not fill a full entry are not counted.
#[inline]
#[must_use]
pub const fn entry_count(length: usize) -> usize {
    length.saturating_sub(SdtHeader::SIZE) / ENTRY_SIZE
}

/// A validated XSDT.
#[derive(Clone)]
pub struct Xsdt<'a> {
    header: SdtHeader<'a>,
    bytes: &'a [u8],
}

impl<'a> Xsdt<'a> {
    /// Maps and validates the XSDT at `paddr`.
    ///
    /// # Errors
    /// Returns [`AspmError::InvalidExtendedTable`] if the table cannot be
    /// mapped or its signature is not exactly `"XSDT"`.
    pub fn map<M: PhysMap + ?Sized>(map: &'a M, paddr: PhysicalAddress) -> Result<Self, AspmError> {
        let header = SdtHeader::map(map, paddr).map_err(|e| {
            warn!("XSDT at {paddr}: {e}");
            AspmError::InvalidExtendedTable
        })?;
        if header.signature() != Signature::XSDT {
            warn!("Expected XSDT at {paddr}, found {}", header.signature());
            return Err(AspmError::InvalidExtendedTable);
        }

        let bytes = table_bytes(map, paddr).map_err(|e| {
            warn!("XSDT at {paddr}: {e}");
            AspmError::InvalidExtendedTable
        })?;

        let this = Self { header, bytes };
        if (bytes.len() - SdtHeader::SIZE) % ENTRY_SIZE != 0 {
            warn!(
                "XSDT length {} leaves a partial entry, ignoring the trailing bytes",
                bytes.len()
            );
        }

        debug!(
            "XSDT at {paddr}: OEM ID {}, {} tables",
            this.oem_id(),
            this.len()
        );
        Ok(this)
    }

    #[must_use]
    pub fn oem_id(&self) -> AsciiField<'a> {
        self.header.oem_id()
    }

    /// Number of contained tables.
    #[must_use]
    pub const fn len(&self) -> usize {
        entry_count(self.bytes.len())
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates the contained table addresses in firmware order.
    ///
    /// Each call starts from the first entry again.
    #[must_use]
    pub fn entries(&self) -> XsdtEntries<'a> {
        let end = SdtHeader::SIZE + self.len() * ENTRY_SIZE;
        XsdtEntries {
            slots: &self.bytes[SdtHeader::SIZE..end],
        }
    }
}

/// Lazy iterator over the table addresses of an [`Xsdt`].
#[derive(Clone)]
pub struct XsdtEntries<'a> {
    slots: &'a [u8],
}

impl Iterator for XsdtEntries<'_> {
    type Item = PhysicalAddress;

    fn next(&mut self) -> Option<Self::Item> {
        let value = read_u64(self.slots, 0)?;
        self.slots = &self.slots[ENTRY_SIZE..];
        Some(PhysicalAddress::new(value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.slots.len() / ENTRY_SIZE;
        (n, Some(n))
    }
}

impl ExactSizeIterator for XsdtEntries<'_> {}
impl FusedIterator for XsdtEntries<'_> {}
