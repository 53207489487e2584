//! Configuration-space access through sysfs.

use std::{
    fmt,
    fs::{self, OpenOptions},
    os::unix::fs::FileExt,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use firmware_pcie::{AspmControl, ConfigSpace, LinkControl, plan_aspm};
use log::{debug, info, warn};

use crate::cli::PciAddress;

/// Bytes of configuration space readable by privileged users.
pub const CONFIG_SPACE_LEN: usize = 256;

/// A PCI function exposed under `<sysfs-root>/<address>/config`.
#[derive(Clone, Debug)]
pub struct Device {
    address: PciAddress,
    config: PathBuf,
}

impl Device {
    #[must_use]
    pub fn new(sysfs_root: &Path, address: PciAddress) -> Self {
        Self {
            address,
            config: sysfs_root.join(address.to_string()).join("config"),
        }
    }

    #[must_use]
    pub const fn address(&self) -> PciAddress {
        self.address
    }

    /// Reads the configuration space.
    ///
    /// # Errors
    /// Fails if the file cannot be read or holds less than the legacy 256
    /// bytes, which is what unprivileged users get.
    pub fn read_config(&self) -> Result<Vec<u8>> {
        let bytes = fs::read(&self.config)
            .with_context(|| format!("failed to read {}", self.config.display()))?;

        if bytes.len() < CONFIG_SPACE_LEN {
            bail!(
                "expected {CONFIG_SPACE_LEN} bytes of configuration space for {}, only got {}; are you running as root?",
                self.address,
                bytes.len()
            );
        }

        Ok(bytes)
    }

    /// Writes a single configuration-space byte.
    ///
    /// # Errors
    /// Fails if the file cannot be opened for writing or the write fails.
    pub fn write_byte(&self, offset: usize, value: u8) -> Result<()> {
        let file = OpenOptions::new()
            .write(true)
            .open(&self.config)
            .with_context(|| format!("failed to open {} for writing", self.config.display()))?;

        file.write_all_at(&[value], u64::try_from(offset)?)
            .with_context(|| {
                format!("failed to write {value:#04x} at {offset:#x} for {}", self.address)
            })
    }
}

/// What [`apply`] did to a device.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The link already had the wanted setting.
    Unchanged(AspmControl),
    /// A write was needed but suppressed.
    DryRun { from: AspmControl, to: AspmControl },
    /// The byte was written and read back.
    Written { from: AspmControl, to: AspmControl },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchanged(aspm) => write!(f, "ASPM {aspm}, nothing to do"),
            Self::DryRun { from, to } => write!(f, "ASPM {from} -> {to} (dry run)"),
            Self::Written { from, to } => write!(f, "ASPM {from} -> {to}"),
        }
    }
}

/// Sets the ASPM control of the device's link to `wanted`.
///
/// # Errors
/// Fails if the configuration space cannot be read or written, the device has
/// no PCI Express capability, or the device does not take the new value.
pub fn apply(device: &Device, wanted: AspmControl, dry_run: bool) -> Result<Outcome> {
    let address = device.address();
    let bytes = device.read_config()?;
    let space = ConfigSpace::new(&bytes)?;
    info!(
        "{address}: vendor {:04x} device {:04x}",
        space.vendor_id(),
        space.device_id()
    );

    let plan = plan_aspm(&space, wanted)
        .with_context(|| format!("{address}: cannot locate Link Control"))?;
    let from = plan.current.aspm_control();
    debug!(
        "{address}: Link Control at {:#x} reads {:#06x}",
        plan.register,
        plan.current.into_bits()
    );

    if !plan.supported() {
        warn!(
            "{address}: link advertises ASPM support for {} only, setting {wanted} anyway",
            plan.capabilities.aspm_support()
        );
    }

    if !plan.needs_write() {
        return Ok(Outcome::Unchanged(from));
    }

    if dry_run {
        info!("{address}: would write {:#04x} at {:#x}", plan.byte(), plan.register);
        return Ok(Outcome::DryRun { from, to: wanted });
    }

    info!("{address}: writing {:#04x} at {:#x}", plan.byte(), plan.register);
    device.write_byte(plan.register, plan.byte())?;

    let bytes = device.read_config()?;
    let readback = ConfigSpace::new(&bytes)?.read_u16(plan.register)?;
    let to = LinkControl::from_bits(readback).aspm_control();
    if to != wanted {
        bail!("{address}: device reports ASPM {to} after writing {wanted}");
    }

    Ok(Outcome::Written { from, to })
}
