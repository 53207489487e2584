//! Command line parsing and [`Config`] construction.

use std::{fmt, path::PathBuf, str::FromStr};

use clap::{Arg, ArgAction, ArgMatches, Command, builder::EnumValueParser, value_parser};
use firmware_pcie::AspmControl;
use log::LevelFilter;

/// Default location of the PCI device directories.
pub const DEFAULT_SYSFS_ROOT: &str = "/sys/bus/pci/devices";

/// Everything the tool needs to know to run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Devices to update, in command line order.
    pub devices: Vec<PciAddress>,
    /// The ASPM state to set.
    pub aspm: AspmSetting,
    /// Report what would change without writing.
    pub dry_run: bool,
    /// Directory holding one sub-directory per device.
    pub sysfs_root: PathBuf,
    /// Number of `-v` flags.
    pub verbosity: u8,
}

impl Config {
    #[must_use]
    pub const fn log_level(&self) -> LevelFilter {
        match self.verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// ASPM state as spelled on the command line.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
pub enum AspmSetting {
    Disabled,
    L0s,
    L1,
    #[default]
    L0sL1,
}

impl AspmSetting {
    /// Returns the textual representation of the [`AspmSetting`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::L0s => "l0s",
            Self::L1 => "l1",
            Self::L0sL1 => "l0s-l1",
        }
    }
}

impl From<AspmSetting> for AspmControl {
    fn from(value: AspmSetting) -> Self {
        match value {
            AspmSetting::Disabled => Self::Disabled,
            AspmSetting::L0s => Self::L0sOnly,
            AspmSetting::L1 => Self::L1Only,
            AspmSetting::L0sL1 => Self::L1AndL0s,
        }
    }
}

impl clap::ValueEnum for AspmSetting {
    fn value_variants<'a>() -> &'a [Self] {
        static SETTINGS: &[AspmSetting] = &[
            AspmSetting::Disabled,
            AspmSetting::L0s,
            AspmSetting::L1,
            AspmSetting::L0sL1,
        ];

        SETTINGS
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

/// A PCI function address, `domain:bus:device.function`.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct PciAddress {
    pub domain: u16,
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid PCI address {0:?}, expected [dddd:]bb:dd.f")]
pub struct AddressError(String);

impl FromStr for PciAddress {
    type Err = AddressError;

    /// Accepts both `bb:dd.f` and `dddd:bb:dd.f`, in hexadecimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || AddressError(s.to_owned());

        let (rest, function) = s.rsplit_once('.').ok_or_else(malformed)?;
        let parts: Vec<&str> = rest.split(':').collect();
        let (domain, bus, device) = match parts.as_slice() {
            [bus, device] => ("0", *bus, *device),
            [domain, bus, device] => (*domain, *bus, *device),
            _ => return Err(malformed()),
        };

        let hex_u8 = |v: &str| u8::from_str_radix(v, 16).map_err(|_| malformed());
        let address = Self {
            domain: u16::from_str_radix(domain, 16).map_err(|_| malformed())?,
            bus: hex_u8(bus)?,
            device: hex_u8(device)?,
            function: hex_u8(function)?,
        };

        if address.device > 0x1F || address.function > 0x7 {
            return Err(malformed());
        }
        Ok(address)
    }
}

impl fmt::Display for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{:x}",
            self.domain, self.bus, self.device, self.function
        )
    }
}

/// Parses the process arguments into a [`Config`].
#[must_use]
pub fn get_config() -> Config {
    parse_arguments(&command_parser().get_matches())
}

/// Builds a [`Config`] from already matched arguments.
#[must_use]
pub fn parse_arguments(matches: &ArgMatches) -> Config {
    let devices = matches
        .get_many::<PciAddress>("device")
        .unwrap_or_default()
        .copied()
        .collect();

    let aspm = matches
        .get_one::<AspmSetting>("set")
        .copied()
        .unwrap_or_else(|| unreachable!("`set` should have a default value"));

    let sysfs_root = matches
        .get_one::<PathBuf>("sysfs-root")
        .cloned()
        .unwrap_or_else(|| unreachable!("`sysfs-root` should have a default value"));

    Config {
        devices,
        aspm,
        dry_run: matches.get_flag("dry-run"),
        sysfs_root,
        verbosity: matches.get_count("verbose"),
    }
}

/// Returns the command parser for the tool.
#[must_use]
pub fn command_parser() -> Command {
    let device = Arg::new("device")
        .help("PCI addresses of the devices, e.g. 00:1c.4 or 0000:05:00.0")
        .value_parser(value_parser!(PciAddress))
        .num_args(1..)
        .required(true);

    let set = Arg::new("set")
        .long("set")
        .help("ASPM state to program into Link Control")
        .value_parser(EnumValueParser::<AspmSetting>::new())
        .default_value(AspmSetting::default().as_str());

    let dry_run = Arg::new("dry-run")
        .long("dry-run")
        .help("Only report what would change")
        .action(ArgAction::SetTrue);

    let sysfs_root = Arg::new("sysfs-root")
        .long("sysfs-root")
        .env("PCIE_ASPM_SYSFS_ROOT")
        .value_parser(value_parser!(PathBuf))
        .default_value(DEFAULT_SYSFS_ROOT);

    let verbose = Arg::new("verbose")
        .short('v')
        .long("verbose")
        .help("Increase logging verbosity")
        .action(ArgAction::Count);

    Command::new("pcie-aspm")
        .about("Sets the ASPM control of PCI Express links through sysfs")
        .arg(device)
        .arg(set)
        .arg(dry_run)
        .arg(sysfs_root)
        .arg(verbose)
}
