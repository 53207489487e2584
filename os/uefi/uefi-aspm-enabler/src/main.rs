//! # UEFI ASPM Enabler
//!
//! A UEFI application that runs before the operating system loader and clears
//! the FADT's "PCIe ASPM Controls" flag, so the OS is allowed to manage Active
//! State Power Management even when the firmware asks it not to.
//!
//! ## Boot Flow
//!
//! ```text
//! UEFI Shell / Boot Manager
//!         ↓
//! ┌─────────────────────────────────────────────┐
//! │              ASPM Enabler                   │
//! ├─────────────────────────────────────────────┤
//! │  1. Initialize helpers and logging          │
//! │  2. Report firmware vendor and revision     │
//! │  3. Walk the configuration table:           │
//! │     RSDP → XSDT → FADT                      │
//! │  4. Clear IAPC_BOOT_ARCH bit 4, fix checksum│
//! │  5. Return the outcome as EFI_STATUS        │
//! └─────────────────────────────────────────────┘
//!         ↓
//! OS Loader (sees the patched FADT)
//! ```
//!
//! The patch lives in memory only and is lost on reboot, so the application
//! has to run on every boot, typically from `startup.nsh` or a boot option
//! placed in front of the OS loader.
//!
//! ## Exit Status
//!
//! | Outcome                                        | `EFI_STATUS`      |
//! |------------------------------------------------|-------------------|
//! | FADT patched (or already permissive)           | `EFI_SUCCESS`     |
//! | No RSDP/XSDT/FADT, or FADT checksum invalid    | `EFI_UNSUPPORTED` |
//! | FADT does not verify after writing             | `EFI_CRC_ERROR`   |
//!
//! ## Features
//!
//! * `qemu` (default): mirror every log line to the QEMU debug console,
//!   I/O port `0x402` (`-debugcon file:debug.log`).

#![cfg_attr(not(any(test, doctest)), no_std)]
#![no_main]
#![allow(unsafe_code)]

#[cfg(all(feature = "qemu", target_arch = "x86_64"))]
mod debugcon;
mod logger;
mod memory;

use crate::logger::UefiLogger;
use crate::memory::IdentityMap;
use firmware_acpi::{PhysicalAddress, aspm::enable_aspm, rsdp::ConfigEntry};
use log::{LevelFilter, info};
use uefi::prelude::*;

/// Most verbose level that is logged.
const LOG_LEVEL: LevelFilter = LevelFilter::Info;

#[entry]
fn efi_main() -> Status {
    // Initialize the allocator and console helpers
    if uefi::helpers::init().is_err() {
        return Status::UNSUPPORTED;
    }

    if UefiLogger::init(LOG_LEVEL).is_err() {
        return Status::UNSUPPORTED;
    }

    info!(
        "Firmware Vendor: {}, Revision: {:#x}",
        system::firmware_vendor(),
        system::firmware_revision()
    );
    info!("UEFI Revision: {}", system::uefi_revision());

    let report = system::with_config_table(|table| {
        // SAFETY: Boot services are still active. Firmware tables are
        // identity-mapped and this application is the only code running.
        let mut memory = unsafe { IdentityMap::new() };

        info!("Configuration tables: {}", table.len());
        let entries = table
            .iter()
            .map(|entry| ConfigEntry::new(entry.guid, PhysicalAddress::from_ptr(entry.address)));
        enable_aspm(&mut memory, entries)
    });

    report.status().into()
}
