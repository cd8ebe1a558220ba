//! Vendor-specific controller sequences.
//!
//! Atheros/Qualcomm controllers are switched to normal mode with vendor
//! requests on the control endpoint. Broadcom and Intel controllers are
//! configured with vendor-specific HCI commands (OGF 0x3F).

use crate::{hci, host, UsbVendor};

pub use {ath3k::*, bcm::*, intel::*, qca::*};

mod ath3k;
mod bcm;
mod intel;
mod qca;

#[cfg(test)]
mod tests;

/// Error type returned by vendor sequences.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Host(#[from] host::Error),
    #[error(transparent)]
    Hci(#[from] hci::Error),
    #[error("unsupported chip [rom={rom_version:#010X}]")]
    UnsupportedChip { rom_version: u32 },
    #[error("invalid firmware: {0}")]
    InvalidFirmware(&'static str),
    #[error("short vendor reply (want {want} bytes, got {got})")]
    ShortReply { want: usize, got: usize },
}

/// Common vendor result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Controller family, which determines the mode-switch sequence.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Chip {
    /// Atheros AR3011/AR3012 and Qualcomm Rome/WCN controllers.
    Atheros,
    /// Broadcom controllers, including those in Apple hardware.
    Broadcom,
    Intel,
    Unknown,
}

/// Third-party modules and their controllers.
const MODULES: &[(UsbVendor, u16, Chip)] = &[
    (UsbVendor::Foxconn, 0xE027, Chip::Atheros),
    (UsbVendor::Foxconn, 0xE03C, Chip::Atheros),
    (UsbVendor::LiteOn, 0x3004, Chip::Atheros),
    (UsbVendor::LiteOn, 0x3005, Chip::Atheros),
    (UsbVendor::Azurewave, 0x3375, Chip::Atheros),
    (UsbVendor::Azurewave, 0x3393, Chip::Atheros),
    (UsbVendor::Dell, 0x8197, Chip::Broadcom),
];

impl Chip {
    /// Returns the controller family for the specified USB vendor and
    /// product IDs.
    #[must_use]
    pub fn detect(vid: u16, pid: u16) -> Self {
        let Some(v) = UsbVendor::from_vid(vid) else {
            return Self::Unknown;
        };
        match v {
            UsbVendor::Atheros => Self::Atheros,
            UsbVendor::Broadcom | UsbVendor::Apple => Self::Broadcom,
            UsbVendor::Intel => Self::Intel,
            _ => (MODULES.iter())
                .find(|&&(mv, mp, _)| mv == v && mp == pid)
                .map_or(Self::Unknown, |&(_, _, c)| c),
        }
    }
}
