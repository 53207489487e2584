//! # RSDP/XSDP (Root/Extended System Description Pointer)
//!
//! UEFI publishes the root pointer through its configuration table, tagged
//! with either the ACPI 1.0 or the ACPI 2.0 GUID. Firmware often installs both,
//! pointing at the same structure. Only revision 2 and later carry the 64-bit
//! XSDT address; the 32-bit RSDT path is not supported.

use crate::checksum::checksum;
use crate::{AsciiField, AspmError, PhysMap, PhysicalAddress, read_u32, read_u64};
use log::{debug, warn};
use uefi::Guid;

pub use uefi::table::cfg::{ACPI_GUID, ACPI2_GUID};

/// One entry of the UEFI configuration table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub guid: Guid,
    pub address: PhysicalAddress,
}

impl ConfigEntry {
    #[must_use]
    pub const fn new(guid: Guid, address: PhysicalAddress) -> Self {
        Self { guid, address }
    }

    /// Whether this entry is tagged with one of the ACPI GUIDs.
    #[must_use]
    pub fn is_acpi(&self) -> bool {
        self.guid == ACPI_GUID || self.guid == ACPI2_GUID
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RsdpError {
    #[error("configuration entry is not an ACPI table")]
    NotAcpi,
    #[error("root pointer at {0} is not accessible")]
    Unmapped(PhysicalAddress),
    #[error("missing \"RSD PTR \" signature")]
    BadSignature,
    #[error("revision {0} has no XSDT")]
    LegacyRevision(u8),
}

/// A validated revision 2+ root pointer.
///
/// Values are copied out of firmware memory, so the struct does not borrow
/// the map.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Rsdp {
    pub address: PhysicalAddress,
    pub revision: u8,
    pub oem_id: [u8; 6],
    pub rsdt_address: u32,
    pub length: u32,
    pub xsdt_address: PhysicalAddress,
}

impl Rsdp {
    pub const SIGNATURE: &'static [u8; 8] = b"RSD PTR ";

    /// Size of the ACPI 1.0 structure covered by the first checksum.
    pub const V1_SIZE: usize = 20;

    /// Size of the ACPI 2.0 structure.
    pub const V2_SIZE: usize = 36;

    /// First revision that carries the XSDT address.
    pub const XSDT_REVISION: u8 = 2;

    /// Examines one configuration entry.
    ///
    /// The entry must carry an ACPI GUID and point at memory starting with
    /// `"RSD PTR "`, and the structure must be revision 2 or later.
    ///
    /// # Errors
    /// Returns the reason the entry does not yield a usable root pointer.
    pub fn probe<M: PhysMap + ?Sized>(map: &M, entry: &ConfigEntry) -> Result<Self, RsdpError> {
        if !entry.is_acpi() {
            return Err(RsdpError::NotAcpi);
        }

        let v1 = map
            .map_ro(entry.address, Self::V1_SIZE)
            .ok_or(RsdpError::Unmapped(entry.address))?;
        if !v1.starts_with(Self::SIGNATURE) {
            return Err(RsdpError::BadSignature);
        }

        let revision = v1[15];
        if checksum(v1) != 0 {
            warn!("RSDP at {} has a bad checksum, continuing", entry.address);
        }
        if revision < Self::XSDT_REVISION {
            return Err(RsdpError::LegacyRevision(revision));
        }

        // Need full v2 to read length + xsdt
        let v2 = map
            .map_ro(entry.address, Self::V2_SIZE)
            .ok_or(RsdpError::Unmapped(entry.address))?;
        if checksum(v2) != 0 {
            warn!("RSDP at {} has a bad extended checksum, continuing", entry.address);
        }

        let mut oem_id = [0u8; 6];
        oem_id.copy_from_slice(&v2[9..15]);

        Ok(Self {
            address: entry.address,
            revision,
            oem_id,
            rsdt_address: read_u32(v2, 16).unwrap_or_default(),
            length: read_u32(v2, 20).unwrap_or_default(),
            xsdt_address: PhysicalAddress::new(read_u64(v2, 24).unwrap_or_default()),
        })
    }

    #[must_use]
    pub fn oem_id(&self) -> AsciiField<'_> {
        AsciiField(&self.oem_id)
    }
}

/// Returns the first usable root pointer among `entries`.
///
/// # Errors
/// Returns [`AspmError::RootPointerNotFound`] if no entry yields one.
pub fn find_rsdp<M, I>(map: &M, entries: I) -> Result<Rsdp, AspmError>
where
    M: PhysMap + ?Sized,
    I: IntoIterator<Item = ConfigEntry>,
{
    entries
        .into_iter()
        .find_map(|entry| match Rsdp::probe(map, &entry) {
            Ok(rsdp) => Some(rsdp),
            Err(e) => {
                debug!("Skipping configuration entry {}: {e}", entry.guid);
                None
            }
        })
        .ok_or(AspmError::RootPointerNotFound)
}
