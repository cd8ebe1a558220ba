use std::fmt::{Display, Formatter};
use std::time::Duration;

use rusb::UsbContext;
use tracing::{debug, trace, warn};

use super::*;

type RusbDevice = rusb::Device<rusb::Context>;
type DeviceHandle = rusb::DeviceHandle<rusb::Context>;

/// Provides access to USB devices through libusb.
#[derive(Debug)]
pub struct Usb {
    ctx: rusb::Context,
}

impl Usb {
    /// Returns a new `Usb` instance for accessing USB devices.
    pub fn new() -> Result<Self> {
        Ok(Self {
            ctx: Self::new_ctx()?,
        })
    }

    #[cfg(windows)]
    fn new_ctx() -> rusb::Result<rusb::Context> {
        // UsbDk isn't required, but it's more feature-rich and simpler to use
        // than WinUSB or other alternatives
        rusb::Context::with_options(&[rusb::UsbOption::use_usbdk()])
    }

    #[cfg(not(windows))]
    fn new_ctx() -> rusb::Result<rusb::Context> {
        rusb::Context::new()
    }

    /// Returns information about all available USB devices.
    pub fn devices(&self) -> Result<Vec<UsbDeviceInfo>> {
        Ok((self.ctx.devices()?.iter())
            .filter_map(UsbDeviceInfo::for_device)
            .collect())
    }

    /// Returns information about all devices with a Bluetooth Primary
    /// Controller interface. Controllers that are still in bootloader mode
    /// usually do not have one and are only returned by [`Self::devices`].
    pub fn controllers(&self) -> Result<Vec<UsbDeviceInfo>> {
        let mut v = self.devices()?;
        v.retain(|d| d.bluetooth);
        Ok(v)
    }

    /// Opens the first device with the specified vendor and product IDs.
    pub fn open_first(&self, vid: u16, pid: u16) -> Result<UsbDevice> {
        (self.devices()?.into_iter())
            .find(|d| d.vendor_id() == vid && d.product_id() == pid)
            .ok_or(Error::NoDevice)?
            .open()
    }
}

/// Information about an unopened USB device.
#[derive(Debug)]
pub struct UsbDeviceInfo {
    dev: RusbDevice,
    desc: rusb::DeviceDescriptor,
    bluetooth: bool,
}

impl UsbDeviceInfo {
    fn for_device(dev: RusbDevice) -> Option<Self> {
        let desc = dev
            .device_descriptor()
            .map_err(|e| warn!("Failed to get device descriptor for {dev:?} ({e})"))
            .ok()?;
        let bluetooth = Self::has_bluetooth_interface(&dev);
        if bluetooth {
            debug!("Bluetooth device at {dev:?}");
            trace!("|__ {desc:?}");
        }
        Some(Self {
            dev,
            desc,
            bluetooth,
        })
    }

    /// Returns the USB vendor ID.
    #[inline]
    #[must_use]
    pub fn vendor_id(&self) -> u16 {
        self.desc.vendor_id()
    }

    /// Returns the USB product ID.
    #[inline]
    #[must_use]
    pub fn product_id(&self) -> u16 {
        self.desc.product_id()
    }

    /// Returns whether the active configuration has a Bluetooth Primary
    /// Controller interface.
    #[inline]
    #[must_use]
    pub const fn is_bluetooth(&self) -> bool {
        self.bluetooth
    }

    /// Opens the device.
    pub fn open(&self) -> Result<UsbDevice> {
        debug!("Opening {:?}", self.dev);
        Ok(UsbDevice {
            h: HandleLock::new(
                self.dev.open()?,
                HandleLock::<DeviceHandle>::EXCLUSIVE_WAIT,
            ),
        })
    }

    fn has_bluetooth_interface(dev: &RusbDevice) -> bool {
        let Ok(cfg) = dev.active_config_descriptor() else {
            return false;
        };
        cfg.interfaces().any(|ifc| {
            ifc.descriptors().next().map_or(false, |d| {
                // [Vol 4] Part B, Section 6.2
                d.class_code() == 0xE0 && d.sub_class_code() == 0x01 && d.protocol_code() == 0x01
            })
        })
    }
}

impl Display for UsbDeviceInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let (bus, addr) = (self.dev.bus_number(), self.dev.address());
        write!(f, "Bus {bus:03} Device {addr:03}:")
    }
}

/// Opened libusb device. Transfers share the handle, while configuration
/// changes and interface claims require exclusive access to it.
#[derive(Debug)]
pub struct UsbDevice {
    h: HandleLock<DeviceHandle>,
}

impl Backend for UsbDevice {
    fn open(&self) -> Result<()> {
        if cfg!(unix) {
            // Not supported on Windows
            debug!("Enabling automatic kernel driver detachment");
            self.h.exclusive()?.set_auto_detach_kernel_driver(true)?;
        }
        Ok(())
    }

    fn close(&self) {
        debug!("Closing {:?}", self.h.shared().device());
    }

    fn control_in(&self, req: Request, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let n = usize::from(req.length).min(buf.len());
        Ok(self.h.shared().read_control(
            req.request_type(),
            req.request,
            req.value,
            req.index,
            &mut buf[..n],
            timeout,
        )?)
    }

    fn control_out(&self, req: Request, data: &[u8], timeout: Duration) -> Result<usize> {
        let n = usize::from(req.length).min(data.len());
        Ok(self.h.shared().write_control(
            req.request_type(),
            req.request,
            req.value,
            req.index,
            &data[..n],
            timeout,
        )?)
    }

    fn set_configuration(&self, value: u8) -> Result<()> {
        Ok(self.h.exclusive()?.set_active_configuration(value)?)
    }

    fn reset(&self) -> Result<()> {
        Ok(self.h.exclusive()?.reset()?)
    }

    fn claim_interface(&self, iface: u8) -> Result<()> {
        Ok(self.h.exclusive()?.claim_interface(iface)?)
    }

    fn release_interface(&self, iface: u8) -> Result<()> {
        Ok(self.h.exclusive()?.release_interface(iface)?)
    }

    fn read(&self, ep: &EndpointDescriptor, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        match ep.transfer_type() {
            TransferType::Bulk => Ok(self.h.shared().read_bulk(ep.address, buf, timeout)?),
            TransferType::Interrupt => {
                Ok(self.h.shared().read_interrupt(ep.address, buf, timeout)?)
            }
            TransferType::Isochronous => Err(Error::NotSupported),
            TransferType::Control => Err(Error::InvalidArgument("control endpoint")),
        }
    }

    fn write(&self, ep: &EndpointDescriptor, data: &[u8], timeout: Duration) -> Result<usize> {
        match ep.transfer_type() {
            TransferType::Bulk => Ok(self.h.shared().write_bulk(ep.address, data, timeout)?),
            TransferType::Interrupt => {
                Ok(self.h.shared().write_interrupt(ep.address, data, timeout)?)
            }
            TransferType::Isochronous => Err(Error::NotSupported),
            TransferType::Control => Err(Error::InvalidArgument("control endpoint")),
        }
    }

    fn clear_halt(&self, addr: u8) -> Result<()> {
        Ok(self.h.exclusive()?.clear_halt(addr)?)
    }
}
