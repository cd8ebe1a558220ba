//! Host Controller Interface ([Vol 4] Part E).
//!
//! Commands are sent as class requests on the control endpoint and events are
//! received from the interrupt IN endpoint of the Bluetooth interface
//! ([Vol 4] Part B, Section 2.1).

use std::fmt::{Debug, Display, Formatter};

pub use {cmd::*, consts::*, event::*, info::*};

use crate::host;

mod cmd;
mod consts;
mod event;
mod info;

#[cfg(test)]
mod tests;

/// Error type returned by the HCI layer.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Host(#[from] host::Error),
    #[error("command parameters too long ({len} bytes)")]
    CommandTooLong { len: usize },
    #[error("invalid command: {0:02X?}")]
    InvalidCommand(Vec<u8>),
    #[error("invalid event: {0:02X?}")]
    InvalidEvent(Vec<u8>),
    #[error("unknown event [code={code:#04X}]: {params:02X?}")]
    UnknownEvent { code: u8, params: Vec<u8> },
    #[error("{opcode} command failed: {status}")]
    CommandFailed { opcode: Opcode, status: Status },
    #[error("no response to {opcode} command")]
    NoResponse { opcode: Opcode },
}

impl Error {
    /// Returns the HCI status code, if any.
    #[must_use]
    pub const fn status(&self) -> Option<Status> {
        match *self {
            Self::CommandFailed { status, .. } => Some(status),
            _ => None,
        }
    }
}

/// Common HCI result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Command opcode ([Vol 4] Part E, Section 5.4.1). The upper 6 bits are the
/// Opcode Group Field (OGF) and the lower 10 bits are the Opcode Command Field
/// (OCF).
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct Opcode(pub u16);

impl Opcode {
    /// Creates an opcode from OGF and OCF. OCF is truncated to 10 bits.
    #[inline]
    #[must_use]
    pub const fn new(ogf: u16, ocf: u16) -> Self {
        Self((ocf & 0x3FF) | ogf << 10)
    }

    /// Returns the Opcode Group Field.
    #[inline]
    #[must_use]
    pub const fn ogf(self) -> u16 {
        self.0 >> 10
    }

    /// Returns the Opcode Command Field.
    #[inline]
    #[must_use]
    pub const fn ocf(self) -> u16 {
        self.0 & 0x3FF
    }

    /// Returns the opcode group or `None` if the group is not known.
    #[inline]
    #[must_use]
    pub fn group(self) -> Option<OpcodeGroup> {
        OpcodeGroup::try_from(self.ogf()).ok()
    }

    /// Returns whether this is a vendor-specific opcode.
    #[inline]
    #[must_use]
    pub const fn is_vendor(self) -> bool {
        self.ogf() == OpcodeGroup::Vendor as u16
    }
}

impl From<u16> for Opcode {
    #[inline(always)]
    fn from(v: u16) -> Self {
        Self(v)
    }
}

impl From<Opcode> for u16 {
    #[inline(always)]
    fn from(op: Opcode) -> Self {
        op.0
    }
}

impl Debug for Opcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{:#06X} ({name})", self.0),
            None => write!(f, "{:#06X}", self.0),
        }
    }
}
