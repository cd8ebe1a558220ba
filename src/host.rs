//! Host USB stack capability interface.
//!
//! Everything above this module talks to the controller through [`Backend`],
//! which is the minimal set of primitives a host USB stack has to provide.
//! The libusb backend is enabled by the `usb` feature. The in-memory
//! [`mock`] backend is enabled by the `mock` feature and in tests.

use std::fmt::Debug;
use std::time::Duration;

#[cfg(any(test, feature = "usb"))]
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
#[cfg(any(test, feature = "usb"))]
use tracing::warn;

pub use desc::*;
#[cfg(feature = "usb")]
pub use usb::*;

mod desc;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
#[cfg(feature = "usb")]
mod usb;

/// Local host errors. Backend status codes are passed through unchanged.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[cfg(feature = "usb")]
    #[error("usb error: {source}")]
    Usb {
        #[from]
        source: rusb::Error,
    },
    #[error("transfer timed out")]
    Timeout,
    #[error("endpoint stalled")]
    Stall,
    #[error("device not available")]
    NoDevice,
    #[error("operation not supported")]
    NotSupported,
    #[error("transfer aborted")]
    Aborted,
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("invalid {0} descriptor")]
    InvalidDescriptor(&'static str),
    #[error("short transfer [want={want}, got={got}]")]
    ShortTransfer { want: usize, got: usize },
}

impl Error {
    /// Returns whether the error is a result of a timeout.
    #[inline]
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        match *self {
            Self::Timeout => true,
            #[cfg(feature = "usb")]
            Self::Usb {
                source: rusb::Error::Timeout,
            } => true,
            _ => false,
        }
    }
}

/// Common host result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Host USB stack primitives for one opened device.
///
/// Implementations are shared between [`crate::dev`] handles through `Arc`,
/// so all methods take `&self`. Transfer methods block for at most `timeout`
/// ([`Duration::ZERO`] means no timeout) and return the number of bytes
/// transferred. Configuration, interface, halt, and reset operations may fail
/// with [`Error::Timeout`] while transfers are still in progress.
pub trait Backend: Debug + Send + Sync + 'static {
    /// Prepares the device for exclusive use by the caller.
    fn open(&self) -> Result<()>;

    /// Gives up exclusive use of the device.
    fn close(&self);

    /// Performs a device-to-host control transfer on endpoint 0.
    fn control_in(&self, req: Request, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Performs a host-to-device control transfer on endpoint 0.
    fn control_out(&self, req: Request, data: &[u8], timeout: Duration) -> Result<usize>;

    /// Selects device configuration `value`. Configuration 0 returns the
    /// device to the unconfigured state, which releases all interfaces and
    /// pipes.
    fn set_configuration(&self, value: u8) -> Result<()>;

    /// Performs a USB port reset.
    fn reset(&self) -> Result<()>;

    /// Claims interface `iface` for exclusive use.
    fn claim_interface(&self, iface: u8) -> Result<()>;

    /// Releases a previously claimed interface.
    fn release_interface(&self, iface: u8) -> Result<()>;

    /// Reads from an IN endpoint using the transfer type of `ep`. The libusb
    /// backend returns [`Error::NotSupported`] for isochronous endpoints.
    fn read(&self, ep: &EndpointDescriptor, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Writes to an OUT endpoint using the transfer type of `ep`. The libusb
    /// backend returns [`Error::NotSupported`] for isochronous endpoints.
    fn write(&self, ep: &EndpointDescriptor, data: &[u8], timeout: Duration) -> Result<usize>;

    /// Clears the halt (stall) condition of endpoint `addr`.
    fn clear_halt(&self, addr: u8) -> Result<()>;
}

/// Transfer direction.
#[allow(clippy::exhaustive_enums)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    /// Returns the direction encoded in bit 7 of an endpoint address or
    /// `bmRequestType`.
    #[inline]
    #[must_use]
    pub const fn from_bit7(v: u8) -> Self {
        if v & 0x80 == 0 {
            Self::Out
        } else {
            Self::In
        }
    }
}

/// Endpoint transfer type (USB 2.0 Section 9.6.6, `bmAttributes` bits 0-1).
#[allow(clippy::exhaustive_enums)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, num_enum::IntoPrimitive)]
#[repr(u8)]
pub enum TransferType {
    Control = 0,
    Isochronous = 1,
    Bulk = 2,
    Interrupt = 3,
}

impl TransferType {
    /// Returns the transfer type encoded in endpoint attributes.
    #[inline]
    #[must_use]
    pub const fn from_attributes(attrs: u8) -> Self {
        match attrs & 0x03 {
            0 => Self::Control,
            1 => Self::Isochronous,
            2 => Self::Bulk,
            _ => Self::Interrupt,
        }
    }
}

/// Control request type (`bmRequestType` bits 5-6).
#[allow(clippy::exhaustive_enums)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, num_enum::IntoPrimitive)]
#[repr(u8)]
pub enum RequestKind {
    Standard = 0,
    Class = 1,
    Vendor = 2,
}

/// Control request recipient (`bmRequestType` bits 0-4).
#[allow(clippy::exhaustive_enums)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, num_enum::IntoPrimitive)]
#[repr(u8)]
pub enum Recipient {
    Device = 0,
    Interface = 1,
    Endpoint = 2,
    Other = 3,
}

/// Standard request codes (USB 2.0 Section 9.4).
pub mod std_req {
    pub const GET_STATUS: u8 = 0x00;
    pub const GET_DESCRIPTOR: u8 = 0x06;
    pub const GET_CONFIGURATION: u8 = 0x08;
}

/// Control transfer setup packet (USB 2.0 Section 9.3).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Request {
    pub dir: Direction,
    pub kind: RequestKind,
    pub recipient: Recipient,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

impl Request {
    /// Creates a device-recipient request with zero `wValue` and `wIndex`.
    #[inline]
    #[must_use]
    pub const fn device(dir: Direction, kind: RequestKind, request: u8, length: u16) -> Self {
        Self {
            dir,
            kind,
            recipient: Recipient::Device,
            request,
            value: 0,
            index: 0,
            length,
        }
    }

    /// Returns the encoded `bmRequestType` field.
    #[inline]
    #[must_use]
    pub const fn request_type(&self) -> u8 {
        let dir = match self.dir {
            Direction::In => 0x80,
            Direction::Out => 0x00,
        };
        dir | (self.kind as u8) << 5 | self.recipient as u8
    }
}

/// Converts a buffer length into `wLength`.
#[inline]
pub(crate) fn w_length(n: usize) -> Result<u16> {
    u16::try_from(n).map_err(|_| Error::InvalidArgument("control transfer too long"))
}

/// Device handle shared by concurrent transfers. Exclusive operations
/// (configuration changes, interface claims, resets) wait for in-flight
/// transfers for a bounded time and fail with [`Error::Timeout`] otherwise,
/// since a transfer without a timeout may never finish.
#[cfg(any(test, feature = "usb"))]
#[derive(Debug)]
pub(crate) struct HandleLock<T> {
    h: RwLock<T>,
    wait: Duration,
}

#[cfg(any(test, feature = "usb"))]
impl<T> HandleLock<T> {
    /// Default wait for exclusive access.
    pub(crate) const EXCLUSIVE_WAIT: Duration = Duration::from_secs(5);

    #[inline]
    pub(crate) fn new(h: T, wait: Duration) -> Self {
        Self {
            h: RwLock::new(h),
            wait,
        }
    }

    /// Returns shared access for transfers.
    #[inline]
    pub(crate) fn shared(&self) -> RwLockReadGuard<'_, T> {
        self.h.read()
    }

    /// Returns exclusive access once all transfers are finished.
    pub(crate) fn exclusive(&self) -> Result<RwLockWriteGuard<'_, T>> {
        self.h.try_write_for(self.wait).ok_or_else(|| {
            warn!("Transfers still in progress after {:?}", self.wait);
            Error::Timeout
        })
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn exclusive_blocked_by_transfer() {
        let h = HandleLock::new(0_u8, Duration::from_millis(20));
        let xfer = h.shared();
        assert_eq!(h.exclusive().unwrap_err(), Error::Timeout);
        drop(xfer);
        *h.exclusive().unwrap() = 1;
        assert_eq!(*h.shared(), 1);
    }

    #[test]
    fn exclusive_after_transfer() {
        let h = HandleLock::new(0_u8, Duration::from_secs(2));
        let (tx, rx) = std::sync::mpsc::channel();
        let lock = &h;
        thread::scope(|s| {
            s.spawn(move || {
                let _xfer = lock.shared();
                tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(20));
            });
            rx.recv().unwrap();
            *h.exclusive().unwrap() = 2;
        });
        assert_eq!(*h.shared(), 2);
    }
}
