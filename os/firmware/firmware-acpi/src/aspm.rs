//! # ASPM Enablement
//!
//! Drives the lookup chain for every UEFI configuration table entry until the
//! FADT has been patched, then folds what happened into a single status.
//!
//! ```text
//! for each configuration entry:
//!     RSDP? ──no──▶ next entry
//!     XSDT? ──no──▶ next entry
//!     FADT? ──no──▶ next entry
//!     patch ──precheck failed──▶ next entry
//!           ──postpatch failed──▶ stop (ChecksumError)
//!           ──ok──▶ stop (Success)
//! ```
//!
//! Running this assumes nothing else writes the FADT while it executes, which
//! holds during single-threaded UEFI boot services.

use crate::fadt::{FadtPatch, find_fadt, patch_fadt};
use crate::rsdp::{ConfigEntry, Rsdp, RsdpError};
use crate::xsdt::Xsdt;
use crate::PhysMap;
use core::ops::ControlFlow;
use log::{debug, error, info, warn};

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AspmError {
    #[error("RSDP could not be found")]
    RootPointerNotFound,
    #[error("XSDT is invalid")]
    InvalidExtendedTable,
    #[error("FADT could not be found")]
    TargetTableNotFound,
    #[error("FADT checksum is invalid")]
    PrecheckChecksumMismatch,
    #[error("FADT checksum does not verify after patching")]
    PostpatchChecksumMismatch,
    #[error("FADT is too short to hold the boot architecture flags")]
    TargetTableTooShort,
}

impl AspmError {
    /// Whether the error ends the whole run instead of moving on to the next
    /// candidate.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::PostpatchChecksumMismatch)
    }

    #[must_use]
    pub const fn status(self) -> AspmStatus {
        match self {
            Self::PostpatchChecksumMismatch => AspmStatus::ChecksumError,
            Self::RootPointerNotFound
            | Self::InvalidExtendedTable
            | Self::TargetTableNotFound
            | Self::PrecheckChecksumMismatch
            | Self::TargetTableTooShort => AspmStatus::Unsupported,
        }
    }
}

/// Final status handed back to the boot environment.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AspmStatus {
    Success,
    Unsupported,
    ChecksumError,
}

impl From<AspmStatus> for uefi::Status {
    fn from(value: AspmStatus) -> Self {
        match value {
            AspmStatus::Success => Self::SUCCESS,
            AspmStatus::Unsupported => Self::UNSUPPORTED,
            AspmStatus::ChecksumError => Self::CRC_ERROR,
        }
    }
}

impl From<AspmError> for uefi::Status {
    fn from(value: AspmError) -> Self {
        value.status().into()
    }
}

/// Outcome of [`enable_aspm`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct AspmReport {
    /// A revision 2+ RSDP was found.
    pub rsdp_found: bool,
    /// At least one XSDT passed validation.
    pub xsdt_found: bool,
    /// An XSDT contained a `"FACP"` table.
    pub fadt_found: bool,
    /// The applied patch, if any.
    pub patch: Option<FadtPatch>,
    /// The last error raised while patching a FADT.
    pub fadt_error: Option<AspmError>,
}

impl AspmReport {
    #[must_use]
    pub const fn patch_successful(&self) -> bool {
        self.patch.is_some()
    }

    /// The patch, or the error that best explains why there is none.
    ///
    /// # Errors
    /// In order of precedence: a post-patch checksum mismatch, a missing RSDP,
    /// an invalid XSDT, a missing FADT, and finally the last FADT-level error.
    /// XSDT failures seen after a FADT was found do not mask the FADT error.
    pub fn result(&self) -> Result<FadtPatch, AspmError> {
        if let Some(patch) = self.patch {
            return Ok(patch);
        }

        match self.fadt_error {
            Some(e) if e.is_fatal() => Err(e),
            _ if !self.rsdp_found => Err(AspmError::RootPointerNotFound),
            _ if !self.xsdt_found => Err(AspmError::InvalidExtendedTable),
            _ if !self.fadt_found => Err(AspmError::TargetTableNotFound),
            Some(e) => Err(e),
            None => Err(AspmError::TargetTableNotFound),
        }
    }

    #[must_use]
    pub fn status(&self) -> AspmStatus {
        match self.result() {
            Ok(_) => AspmStatus::Success,
            Err(e) => e.status(),
        }
    }
}

/// Locates the FADT through the configuration table and clears its `no_aspm`
/// flag.
///
/// Entries are tried in order. The first successful patch, or a post-patch
/// checksum failure, stops the scan.
pub fn enable_aspm<M, I>(map: &mut M, entries: I) -> AspmReport
where
    M: PhysMap + ?Sized,
    I: IntoIterator<Item = ConfigEntry>,
{
    let mut report = AspmReport::default();

    for (index, entry) in entries.into_iter().enumerate() {
        if visit_entry(map, index, &entry, &mut report).is_break() {
            debug!("Stopped scanning after configuration table #{}", index + 1);
            break;
        }
    }

    match report.result() {
        Ok(patch) if patch.changed() => info!("FADT patch finished"),
        Ok(_) => info!("FADT already allows OS ASPM control, nothing changed"),
        Err(e) => error!("Patch failed: {e}"),
    }

    report
}

fn visit_entry<M: PhysMap + ?Sized>(
    map: &mut M,
    index: usize,
    entry: &ConfigEntry,
    report: &mut AspmReport,
) -> ControlFlow<()> {
    let table = index + 1;
    let rsdp = match Rsdp::probe(&*map, entry) {
        Ok(rsdp) => rsdp,
        Err(RsdpError::NotAcpi) => {
            debug!("Table #{table}: Not ACPI");
            return ControlFlow::Continue(());
        }
        Err(e) => {
            info!("Table #{table}: {e}");
            return ControlFlow::Continue(());
        }
    };

    report.rsdp_found = true;
    info!(
        "Table #{table}: RSDP Rev {} @ {}, OEM ID: {}",
        rsdp.revision,
        rsdp.address,
        rsdp.oem_id()
    );

    let fadt = {
        let xsdt = match Xsdt::map(&*map, rsdp.xsdt_address) {
            Ok(xsdt) => xsdt,
            Err(e) => {
                warn!("Table #{table}: {e}");
                return ControlFlow::Continue(());
            }
        };

        report.xsdt_found = true;
        info!("XSDT OEM ID: {} Tables: {}", xsdt.oem_id(), xsdt.len());
        find_fadt(&*map, &xsdt)
    };

    let Some(fadt) = fadt else {
        warn!("XSDT at {} has no FADT", rsdp.xsdt_address);
        return ControlFlow::Continue(());
    };

    report.fadt_found = true;
    info!("Patching FADT at {fadt} ...");
    match patch_fadt(map, fadt) {
        Ok(patch) => {
            report.patch = Some(patch);
            ControlFlow::Break(())
        }
        Err(e) if e.is_fatal() => {
            report.fadt_error = Some(e);
            ControlFlow::Break(())
        }
        Err(e) => {
            report.fadt_error = Some(e);
            ControlFlow::Continue(())
        }
    }
}
