//! # FADT (Fixed ACPI Description Table)
//!
//! Signature `"FACP"`. The only field touched here is `IAPC_BOOT_ARCH`, the
//! IA-PC boot architecture flags at byte offset 109 (ACPI 2.0 and later). Linux
//! calls bit 4 `ACPI_FADT_NO_ASPM`: when set, the OS must not enable ASPM on
//! its own.

use crate::checksum::{checksum, corrective, verify};
use crate::header::{SdtHeader, Signature, table_bytes_mut};
use crate::xsdt::Xsdt;
use crate::{AspmError, PhysMap, PhysicalAddress, read_u16};
use bitfield_struct::bitfield;
use log::{debug, error, info, warn};

/// Byte offset of `IAPC_BOOT_ARCH` within the FADT.
pub const BOOT_ARCH_FLAGS_OFFSET: usize = 109;

/// Smallest FADT that still contains the whole flags field.
pub const MIN_PATCHABLE_LENGTH: usize = BOOT_ARCH_FLAGS_OFFSET + size_of::<u16>();

/// IA-PC boot architecture flags (ACPI 6.5, table 5.11).
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct IaPcBootArch {
    /// Bit 0 — Legacy devices.
    ///
    /// The motherboard supports user-visible devices on the LPC or ISA bus.
    pub legacy_devices: bool,

    /// Bit 1 — 8042.
    ///
    /// The motherboard contains an 8042 compatible keyboard controller.
    pub has_8042: bool,

    /// Bit 2 — VGA Not Present.
    pub vga_not_present: bool,

    /// Bit 3 — MSI Not Supported.
    pub msi_not_supported: bool,

    /// Bit 4 — PCIe ASPM Controls.
    ///
    /// If set, OSPM must not enable ASPM control on this platform.
    pub no_aspm: bool,

    /// Bit 5 — CMOS RTC Not Present.
    pub cmos_rtc_not_present: bool,

    /// Bits 6–15 — Reserved.
    ///
    /// Carried through untouched.
    #[bits(10)]
    _reserved_6_15: u16,
}

/// What a successful patch changed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FadtPatch {
    pub flags_before: IaPcBootArch,
    pub flags_after: IaPcBootArch,
    pub checksum_before: u8,
    pub checksum_after: u8,
}

impl FadtPatch {
    /// Whether the table was modified at all.
    #[must_use]
    pub fn changed(self) -> bool {
        self.flags_before != self.flags_after || self.checksum_before != self.checksum_after
    }
}

/// Returns the first table in `xsdt` whose signature is `"FACP"`.
///
/// Tables that cannot be mapped are logged and skipped.
pub fn find_fadt<M: PhysMap + ?Sized>(map: &M, xsdt: &Xsdt<'_>) -> Option<PhysicalAddress> {
    let count = xsdt.len();
    xsdt.entries().enumerate().find_map(|(index, paddr)| {
        let header = match SdtHeader::map(map, paddr) {
            Ok(header) => header,
            Err(e) => {
                warn!("ACPI table #{}/{count}: {e}", index + 1);
                return None;
            }
        };

        debug!(
            "ACPI table #{}/{count}: {} Rev {} OEM ID: {} @ {paddr}",
            index + 1,
            header.signature(),
            header.revision(),
            header.oem_id()
        );

        (header.signature() == Signature::FACP).then_some(paddr)
    })
}

/// Clears the `no_aspm` flag of the FADT at `paddr` and fixes its checksum.
///
/// # Errors
/// * [`AspmError::TargetTableNotFound`] if `paddr` does not hold a mappable FADT.
/// * See [`patch_table`] for the remaining cases.
pub fn patch_fadt<M: PhysMap + ?Sized>(
    map: &mut M,
    paddr: PhysicalAddress,
) -> Result<FadtPatch, AspmError> {
    let signature = SdtHeader::map(&*map, paddr)
        .map_err(|_| AspmError::TargetTableNotFound)?
        .signature();
    if signature != Signature::FACP {
        return Err(AspmError::TargetTableNotFound);
    }

    let table = table_bytes_mut(map, paddr).map_err(|e| {
        error!("FADT at {paddr}: {e}");
        AspmError::TargetTableNotFound
    })?;

    patch_table(table)
}

/// Clears the `no_aspm` flag in a complete FADT image and fixes its checksum.
///
/// The table is only written if its checksum is valid beforehand. Exactly two
/// byte ranges are written: the flags field and the checksum byte.
///
/// # Errors
/// * [`AspmError::PrecheckChecksumMismatch`] if the table is corrupt; nothing is written.
/// * [`AspmError::TargetTableTooShort`] if the flags field is out of bounds; nothing is written.
/// * [`AspmError::PostpatchChecksumMismatch`] if the written table does not verify.
///   The change is not rolled back.
pub fn patch_table(table: &mut [u8]) -> Result<FadtPatch, AspmError> {
    info!("Checking initial checksum ...");
    if !verify(table) {
        error!("FADT checksum is invalid, refusing to patch");
        return Err(AspmError::PrecheckChecksumMismatch);
    }

    let Some(raw) = read_u16(table, BOOT_ARCH_FLAGS_OFFSET) else {
        error!(
            "FADT is {} bytes long, the boot architecture flags need {MIN_PATCHABLE_LENGTH}",
            table.len()
        );
        return Err(AspmError::TargetTableTooShort);
    };

    let flags_before = IaPcBootArch::from_bits(raw);
    let flags_after = flags_before.with_no_aspm(false);
    info!(
        "FADT::IaPcBootArch: {:#06x} -> {:#06x}",
        flags_before.into_bits(),
        flags_after.into_bits()
    );
    table[BOOT_ARCH_FLAGS_OFFSET..MIN_PATCHABLE_LENGTH]
        .copy_from_slice(&flags_after.into_bits().to_le_bytes());

    let checksum_before = table[SdtHeader::CHECKSUM_OFFSET];
    let checksum_after = corrective(checksum_before, checksum(table));
    table[SdtHeader::CHECKSUM_OFFSET] = checksum_after;
    info!("FADT checksum: {checksum_before:#04x} -> {checksum_after:#04x}");

    if !verify(table) {
        error!("FADT checksum does not verify after patching");
        return Err(AspmError::PostpatchChecksumMismatch);
    }

    Ok(FadtPatch {
        flags_before,
        flags_after,
        checksum_before,
        checksum_after,
    })
}
