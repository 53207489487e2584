//! Sets the ASPM control field of PCI Express links through Linux sysfs.
//!
//! Clearing the FADT's `no_aspm` flag lets the OS manage ASPM, but some
//! kernels still leave the Link Control register of a port or endpoint at
//! "disabled". This tool programs it directly:
//!
//! ```text
//! pcie-aspm [--set disabled|l0s|l1|l0s-l1] [--dry-run] [-v] <device>...
//! ```
//!
//! Each device is read from `<sysfs-root>/<dddd:bb:dd.f>/config`, which needs
//! root privileges for the full 256 bytes.

use anyhow::{Result, bail};
use log::error;

use crate::{
    cli::Config,
    device::{Device, apply},
    logger::StderrLogger,
};

pub mod cli;
pub mod device;
pub mod logger;

fn main() -> Result<()> {
    let config = cli::get_config();
    StderrLogger::init(config.log_level())?;

    run(&config)
}

fn run(config: &Config) -> Result<()> {
    let wanted = config.aspm.into();

    let mut failed = 0usize;
    for &address in &config.devices {
        let device = Device::new(&config.sysfs_root, address);
        match apply(&device, wanted, config.dry_run) {
            Ok(outcome) => println!("{address}: {outcome}"),
            Err(e) => {
                error!("{e:#}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} devices could not be updated", config.devices.len());
    }

    Ok(())
}
