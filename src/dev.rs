//! Exclusively owned USB device, interface, and pipe handles.
//!
//! Each handle shares the backend through an `Arc` and releases what it
//! acquired when it is closed or dropped: [`Device`] closes the device,
//! [`Interface`] releases its claim, and [`Pipe`] aborts its pending
//! asynchronous transfers.

use bitflags::bitflags;

pub use {device::*, interface::*, pipe::*};

use crate::host::InterfaceDescriptor;

mod device;
mod interface;
mod pipe;

#[cfg(test)]
mod tests;

bitflags! {
    /// Device status returned by GET_STATUS (USB 2.0 Figure 9-4).
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[repr(transparent)]
    pub struct DeviceStatus: u16 {
        const SELF_POWERED = 1 << 0;
        const REMOTE_WAKEUP = 1 << 1;
    }
}

/// Interface search criteria. `None` fields match any value.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct InterfaceFilter {
    pub class: Option<u8>,
    pub subclass: Option<u8>,
    pub protocol: Option<u8>,
    pub alt_setting: Option<u8>,
}

impl InterfaceFilter {
    /// Filter that matches any interface.
    pub const ANY: Self = Self {
        class: None,
        subclass: None,
        protocol: None,
        alt_setting: None,
    };

    /// Filter that matches the default setting of a Bluetooth Primary
    /// Controller interface ([Vol 4] Part B, Section 6.2).
    pub const BLUETOOTH: Self = Self {
        class: Some(0xE0),
        subclass: Some(0x01),
        protocol: Some(0x01),
        alt_setting: Some(0),
    };

    /// Returns whether interface descriptor `d` matches the filter.
    #[must_use]
    pub fn matches(&self, d: &InterfaceDescriptor) -> bool {
        let eq = |want: Option<u8>, have: u8| want.map_or(true, |v| v == have);
        eq(self.class, d.class)
            && eq(self.subclass, d.subclass)
            && eq(self.protocol, d.protocol)
            && eq(self.alt_setting, d.alt_setting)
    }
}
