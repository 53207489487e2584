//! # PCI Express Link ASPM Control
//!
//! Clearing the FADT's `no_aspm` flag allows the OS to manage Active State
//! Power Management, but the link itself is only power-managed once the ASPM
//! control field of a device's PCIe Link Control register is set. This crate
//! reads a PCI configuration-space image and works out which byte to write.
//!
//! ## Configuration Space Layout
//!
//! ```text
//! 0x06  Status            u16   bit 4: capability list present
//! 0x34  Capabilities Ptr  u8    offset of the first capability
//!       ...
//! cap   [id: u8, next: u8, ...]
//!       PCI Express capability (id 0x10):
//!         +0x0C  Link Capabilities  u32   bits 10-11: ASPM support
//!         +0x10  Link Control       u16   bits 0-1:   ASPM control
//! ```
//!
//! The crate never touches hardware. The host tool feeds it the `config`
//! file from sysfs and writes back the single byte it is told to.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod capability;
mod link;

pub use capability::{Capabilities, Capability, ConfigSpace};
pub use link::{AspmControl, LinkCapabilities, LinkControl};

use log::debug;

/// Capability ID of the PCI Express capability structure.
pub const CAP_ID_PCIE: u8 = 0x10;

/// Offset of Link Capabilities within the PCIe capability.
pub const LINK_CAPABILITIES_OFFSET: usize = 0x0C;

/// Offset of Link Control within the PCIe capability.
pub const LINK_CONTROL_OFFSET: usize = 0x10;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PcieError {
    #[error("configuration space has {len} bytes, need at least {needed}")]
    Truncated { len: usize, needed: usize },
    #[error("device has no capability list")]
    NoCapabilityList,
    #[error("device has no PCI Express capability")]
    PcieCapabilityNotFound,
    #[error("capability list does not terminate")]
    CapabilityLoop,
}

/// The Link Control write needed to reach a wanted ASPM state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AspmPlan {
    /// Configuration-space offset of the Link Control register.
    pub register: usize,
    pub capabilities: LinkCapabilities,
    pub current: LinkControl,
    pub wanted: LinkControl,
}

impl AspmPlan {
    #[must_use]
    pub fn needs_write(&self) -> bool {
        self.current != self.wanted
    }

    /// Low byte of the wanted Link Control value, which holds the ASPM bits.
    #[must_use]
    pub fn byte(&self) -> u8 {
        self.wanted.into_bits().to_le_bytes()[0]
    }

    /// Whether the link advertises support for the wanted ASPM states.
    #[must_use]
    pub fn supported(&self) -> bool {
        let wanted = self.wanted.aspm_control();
        let support = self.capabilities.aspm_support();
        (!wanted.l0s() || support.l0s()) && (!wanted.l1() || support.l1())
    }
}

/// Works out the Link Control change that sets the ASPM control to `wanted`.
///
/// Only bits 0–1 of Link Control differ between `current` and `wanted`.
///
/// # Errors
/// Fails if the image is too short or the device has no PCIe capability.
pub fn plan_aspm(space: &ConfigSpace<'_>, wanted: AspmControl) -> Result<AspmPlan, PcieError> {
    let cap = space.find_capability(CAP_ID_PCIE)?;
    let base = usize::from(cap.offset);
    debug!("PCIe capability at {:#04x}", cap.offset);

    let register = base + LINK_CONTROL_OFFSET;
    let capabilities =
        LinkCapabilities::from_bits(space.read_u32(base + LINK_CAPABILITIES_OFFSET)?);
    let current = LinkControl::from_bits(space.read_u16(register)?);

    Ok(AspmPlan {
        register,
        capabilities,
        current,
        wanted: current.with_aspm_control(wanted),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A 256-byte image with a power management capability at 0x40 and a
    /// PCIe capability at 0x50.
    fn endpoint(link_control: u16, aspm_support: u8) -> [u8; 256] {
        let mut cfg = [0u8; 256];
        cfg[0..2].copy_from_slice(&0x8086u16.to_le_bytes());
        cfg[2..4].copy_from_slice(&0x2723u16.to_le_bytes());
        cfg[0x06] = 0x10;
        cfg[0x34] = 0x40;

        cfg[0x40] = 0x01;
        cfg[0x41] = 0x50;

        cfg[0x50] = CAP_ID_PCIE;
        cfg[0x51] = 0x00;
        let link_caps = LinkCapabilities::new()
            .with_max_link_speed(2)
            .with_max_link_width(1)
            .with_aspm_support(AspmControl::from_bits(aspm_support));
        cfg[0x5C..0x60].copy_from_slice(&link_caps.into_bits().to_le_bytes());
        cfg[0x60..0x62].copy_from_slice(&link_control.to_le_bytes());
        cfg
    }

    #[test]
    fn plan_enables_l0s_and_l1() {
        let cfg = endpoint(0x0040, 0b11);
        let space = ConfigSpace::new(&cfg).unwrap();

        let plan = plan_aspm(&space, AspmControl::L1AndL0s).unwrap();
        assert_eq!(plan.register, 0x60);
        assert_eq!(plan.current.aspm_control(), AspmControl::Disabled);
        assert!(plan.needs_write());
        assert!(plan.supported());
        assert_eq!(plan.byte(), 0x43);
    }

    #[test]
    fn plan_keeps_other_bits() {
        let cfg = endpoint(0x0FFE, 0b11);
        let space = ConfigSpace::new(&cfg).unwrap();

        let plan = plan_aspm(&space, AspmControl::L0sOnly).unwrap();
        assert_eq!(plan.wanted.into_bits(), 0x0FFD);
        assert_eq!(plan.byte(), 0xFD);
    }

    #[test]
    fn nothing_to_do() {
        let cfg = endpoint(0x0002, 0b10);
        let space = ConfigSpace::new(&cfg).unwrap();

        let plan = plan_aspm(&space, AspmControl::L1Only).unwrap();
        assert!(!plan.needs_write());
        assert!(plan.supported());
    }

    #[test]
    fn unsupported_state_is_flagged() {
        let cfg = endpoint(0x0000, 0b10);
        let space = ConfigSpace::new(&cfg).unwrap();

        let plan = plan_aspm(&space, AspmControl::L1AndL0s).unwrap();
        assert!(!plan.supported());

        let plan = plan_aspm(&space, AspmControl::Disabled).unwrap();
        assert!(plan.supported());
    }

    #[test]
    fn conventional_pci_device() {
        let mut cfg = endpoint(0, 0);
        cfg[0x41] = 0x00; // drop the PCIe capability from the list
        let space = ConfigSpace::new(&cfg).unwrap();

        assert_eq!(
            plan_aspm(&space, AspmControl::L1Only),
            Err(PcieError::PcieCapabilityNotFound)
        );
    }
}
