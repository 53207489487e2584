//! Link Capabilities and Link Control registers of the PCIe capability.

use bitfield_struct::bitfield;

/// Two-bit ASPM field, shared by the ASPM support bits of Link Capabilities
/// and the ASPM control bits of Link Control.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum AspmControl {
    Disabled = 0b00,
    L0sOnly = 0b01,
    L1Only = 0b10,
    L1AndL0s = 0b11,
}

impl AspmControl {
    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }

    #[inline]
    #[must_use]
    pub const fn from_bits(v: u8) -> Self {
        match v & 0b11 {
            0 => Self::Disabled,
            1 => Self::L0sOnly,
            2 => Self::L1Only,
            _ => Self::L1AndL0s,
        }
    }

    #[must_use]
    pub const fn l0s(self) -> bool {
        self.into_bits() & 0b01 != 0
    }

    #[must_use]
    pub const fn l1(self) -> bool {
        self.into_bits() & 0b10 != 0
    }
}

impl core::fmt::Display for AspmControl {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Disabled => "disabled",
            Self::L0sOnly => "L0s",
            Self::L1Only => "L1",
            Self::L1AndL0s => "L0s L1",
        })
    }
}

/// Link Capabilities register (PCIe capability + 0x0C).
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct LinkCapabilities {
    /// Bits 0–3 — Max Link Speed, as an index into the supported speeds vector.
    #[bits(4)]
    pub max_link_speed: u8,

    /// Bits 4–9 — Maximum Link Width.
    #[bits(6)]
    pub max_link_width: u8,

    /// Bits 10–11 — ASPM Support.
    #[bits(2)]
    pub aspm_support: AspmControl,

    /// Bits 12–14 — L0s Exit Latency.
    #[bits(3)]
    pub l0s_exit_latency: u8,

    /// Bits 15–17 — L1 Exit Latency.
    #[bits(3)]
    pub l1_exit_latency: u8,

    /// Bit 18 — Clock Power Management.
    pub clock_power_management: bool,

    /// Bit 19 — Surprise Down Error Reporting Capable.
    pub surprise_down_error_reporting: bool,

    /// Bit 20 — Data Link Layer Link Active Reporting Capable.
    pub dll_link_active_reporting: bool,

    /// Bit 21 — Link Bandwidth Notification Capability.
    pub link_bandwidth_notification: bool,

    /// Bit 22 — ASPM Optionality Compliance.
    pub aspm_optionality_compliance: bool,

    #[bits(default = false)]
    _reserved_23: bool,

    /// Bits 24–31 — Port Number.
    #[bits(8)]
    pub port_number: u8,
}

/// Link Control register (PCIe capability + 0x10).
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct LinkControl {
    /// Bits 0–1 — ASPM Control.
    #[bits(2)]
    pub aspm_control: AspmControl,

    #[bits(default = false)]
    _reserved_2: bool,

    /// Bit 3 — Read Completion Boundary.
    pub read_completion_boundary: bool,
    /// Bit 4 — Link Disable.
    pub link_disable: bool,
    /// Bit 5 — Retrain Link.
    pub retrain_link: bool,
    /// Bit 6 — Common Clock Configuration.
    pub common_clock_configuration: bool,
    /// Bit 7 — Extended Synch.
    pub extended_synch: bool,
    /// Bit 8 — Enable Clock Power Management.
    pub enable_clock_power_management: bool,
    /// Bit 9 — Hardware Autonomous Width Disable.
    pub hw_autonomous_width_disable: bool,
    /// Bit 10 — Link Bandwidth Management Interrupt Enable.
    pub link_bandwidth_management_irq: bool,
    /// Bit 11 — Link Autonomous Bandwidth Interrupt Enable.
    pub link_autonomous_bandwidth_irq: bool,

    /// Bits 12–15 — Reserved or newer fields; carried through untouched.
    #[bits(4)]
    _reserved_12_15: u8,
}
