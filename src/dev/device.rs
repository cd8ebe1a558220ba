use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::hci::Opcode;
use crate::host::*;
use crate::UsbVendor;

use super::*;

/// Opened or unopened USB device.
#[derive(Debug)]
pub struct Device<B: Backend> {
    b: Arc<B>,
    desc: DeviceDescriptor,
    cfg: Config,
    open: bool,
}

impl<B: Backend> Device<B> {
    /// Creates a device handle with the default configuration.
    #[inline]
    pub fn new(b: Arc<B>) -> Result<Self> {
        Self::with_config(b, Config::default())
    }

    /// Creates a device handle and reads the device descriptor.
    pub fn with_config(b: Arc<B>, cfg: Config) -> Result<Self> {
        let mut buf = [0; DEVICE_DESC_LEN];
        let n = get_descriptor(b.as_ref(), &cfg, desc_type::DEVICE, 0, 0, &mut buf)?;
        let desc = DeviceDescriptor::unpack(&buf[..n])?;
        debug!(
            "USB device {:04X}:{:04X} (release {:#06X}, {} configuration(s))",
            desc.vendor_id, desc.product_id, desc.device_release, desc.num_configurations
        );
        Ok(Self {
            b,
            desc,
            cfg,
            open: false,
        })
    }

    /// Returns the backend.
    #[inline(always)]
    #[must_use]
    pub const fn backend(&self) -> &Arc<B> {
        &self.b
    }

    /// Returns the device configuration.
    #[inline(always)]
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.cfg
    }

    /// Returns the cached device descriptor.
    #[inline(always)]
    #[must_use]
    pub const fn descriptor(&self) -> &DeviceDescriptor {
        &self.desc
    }

    #[inline(always)]
    #[must_use]
    pub const fn vendor_id(&self) -> u16 {
        self.desc.vendor_id
    }

    #[inline(always)]
    #[must_use]
    pub const fn product_id(&self) -> u16 {
        self.desc.product_id
    }

    /// Returns the device release number in binary-coded decimal.
    #[inline(always)]
    #[must_use]
    pub const fn device_release(&self) -> u16 {
        self.desc.device_release
    }

    #[inline(always)]
    #[must_use]
    pub const fn num_configurations(&self) -> u8 {
        self.desc.num_configurations
    }

    #[inline(always)]
    #[must_use]
    pub const fn manufacturer_string_index(&self) -> u8 {
        self.desc.manufacturer_index
    }

    #[inline(always)]
    #[must_use]
    pub const fn product_string_index(&self) -> u8 {
        self.desc.product_index
    }

    #[inline(always)]
    #[must_use]
    pub const fn serial_number_string_index(&self) -> u8 {
        self.desc.serial_number_index
    }

    /// Returns the known USB vendor of the device.
    #[inline]
    #[must_use]
    pub fn usb_vendor(&self) -> Option<UsbVendor> {
        UsbVendor::from_vid(self.desc.vendor_id)
    }

    /// Returns whether the device is open.
    #[inline(always)]
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// Opens the device for exclusive use.
    pub fn open(&mut self) -> Result<()> {
        if !self.open {
            self.b.open()?;
            self.open = true;
            debug!("Opened {:04X}:{:04X}", self.vendor_id(), self.product_id());
        }
        Ok(())
    }

    /// Closes the device if it is open.
    pub fn close(&mut self) {
        if self.open {
            self.b.close();
            self.open = false;
            debug!("Closed {:04X}:{:04X}", self.vendor_id(), self.product_id());
        }
    }

    /// Reads string descriptor `index` in language `lang`.
    pub fn string_descriptor(&self, index: u8, lang: u16) -> Result<String> {
        if index == 0 {
            return Err(Error::InvalidArgument("string descriptor index 0"));
        }
        let mut buf = [0; u8::MAX as usize];
        let n = get_descriptor(self.b.as_ref(), &self.cfg, desc_type::STRING, index, lang, &mut buf)?;
        decode_string(&buf[..n])
    }

    /// Reads string descriptor `index` in the configured language.
    #[inline]
    pub fn string(&self, index: u8) -> Result<String> {
        self.string_descriptor(index, self.cfg.lang_id)
    }

    /// Returns the device status.
    pub fn device_status(&self) -> Result<DeviceStatus> {
        let mut buf = [0; 2];
        let n = self.standard_request_in(std_req::GET_STATUS, &mut buf)?;
        if n != buf.len() {
            return Err(Error::ShortTransfer {
                want: buf.len(),
                got: n,
            });
        }
        Ok(DeviceStatus::from_bits_truncate(u16::from_le_bytes(buf)))
    }

    /// Returns the current configuration value. Zero means that the device is
    /// not configured.
    pub fn configuration(&self) -> Result<u8> {
        let mut buf = [0; 1];
        match self.standard_request_in(std_req::GET_CONFIGURATION, &mut buf)? {
            1 => Ok(buf[0]),
            n => Err(Error::ShortTransfer { want: 1, got: n }),
        }
    }

    /// Selects configuration `value`. Configuration 0 releases all interfaces
    /// and pipes.
    pub fn set_configuration(&self, value: u8) -> Result<()> {
        debug!("Setting configuration {value}");
        self.b.set_configuration(value)
    }

    /// Reads the full configuration descriptor at `index`, including all
    /// interface and endpoint descriptors.
    pub fn full_configuration_descriptor(&self, index: u8) -> Result<ConfigDescriptor> {
        let mut hdr = [0; CONFIG_DESC_LEN];
        let n = self.get_descriptor(desc_type::CONFIGURATION, index, &mut hdr)?;
        let total = ConfigDescriptor::total_len(&hdr[..n])?;
        let mut buf = vec![0; total];
        let n = self.get_descriptor(desc_type::CONFIGURATION, index, &mut buf)?;
        if n != total {
            return Err(Error::ShortTransfer {
                want: total,
                got: n,
            });
        }
        trace!("Configuration descriptor {index}: {buf:02X?}");
        ConfigDescriptor::unpack(&buf)
    }

    /// Returns the descriptor of the active configuration.
    pub fn active_configuration_descriptor(&self) -> Result<ConfigDescriptor> {
        let value = self.configuration()?;
        if value == 0 {
            return Err(Error::InvalidArgument("device not configured"));
        }
        for i in 0..self.desc.num_configurations {
            let cfg = self.full_configuration_descriptor(i)?;
            if cfg.value == value {
                return Ok(cfg);
            }
        }
        Err(Error::InvalidDescriptor("active configuration"))
    }

    /// Returns the first interface of the active configuration.
    pub fn find_first_interface(&self) -> Result<Option<Interface<B>>> {
        self.find_interface(&InterfaceFilter {
            alt_setting: Some(0),
            ..InterfaceFilter::ANY
        })
    }

    /// Returns the first interface of the active configuration that matches
    /// filter `f`.
    pub fn find_interface(&self, f: &InterfaceFilter) -> Result<Option<Interface<B>>> {
        let cfg = self.active_configuration_descriptor()?;
        let ifc = (cfg.interfaces.into_iter()).find(|d| f.matches(d));
        match ifc {
            Some(ref d) => info!(
                "Found interface {} (alt {}, class {:02X}/{:02X}/{:02X})",
                d.number, d.alt_setting, d.class, d.subclass, d.protocol
            ),
            None => debug!("No interface matches {f:?}"),
        }
        Ok(ifc.map(|d| Interface::new(Arc::clone(&self.b), d)))
    }

    /// Sends a device-recipient IN request and returns the number of bytes
    /// received.
    pub fn send_request_in(
        &self,
        kind: RequestKind,
        request: u8,
        buf: &mut [u8],
    ) -> Result<usize> {
        let req = Request::device(Direction::In, kind, request, w_length(buf.len())?);
        self.b.control_in(req, buf, self.cfg.timeouts.control)
    }

    /// Sends a device-recipient OUT request and returns the number of bytes
    /// sent.
    pub fn send_request_out(
        &self,
        kind: RequestKind,
        request: u8,
        data: &[u8],
    ) -> Result<usize> {
        let req = Request::device(Direction::Out, kind, request, w_length(data.len())?);
        self.b.control_out(req, data, self.cfg.timeouts.control)
    }

    #[inline]
    pub fn vendor_request_in(&self, request: u8, buf: &mut [u8]) -> Result<usize> {
        self.send_request_in(RequestKind::Vendor, request, buf)
    }

    #[inline]
    pub fn vendor_request_out(&self, request: u8, data: &[u8]) -> Result<usize> {
        self.send_request_out(RequestKind::Vendor, request, data)
    }

    #[inline]
    pub fn standard_request_in(&self, request: u8, buf: &mut [u8]) -> Result<usize> {
        self.send_request_in(RequestKind::Standard, request, buf)
    }

    #[inline]
    pub fn standard_request_out(&self, request: u8, data: &[u8]) -> Result<usize> {
        self.send_request_out(RequestKind::Standard, request, data)
    }

    /// Resets the controller with an HCI Reset command and returns the device
    /// to the unconfigured state, which releases all interfaces and pipes. A
    /// failed HCI Reset is not fatal.
    pub fn reset(&self) -> Result<()> {
        if let Err(e) = self.send_hci_request_out(Opcode::RESET, &[]) {
            warn!("HCI Reset failed: {e}");
        }
        self.set_configuration(0)
    }

    /// Performs a USB port reset.
    pub fn reset_port(&self) -> Result<()> {
        info!("Resetting port of {:04X}:{:04X}", self.vendor_id(), self.product_id());
        self.b.reset()
    }

    #[inline]
    fn get_descriptor(&self, typ: u8, index: u8, buf: &mut [u8]) -> Result<usize> {
        get_descriptor(self.b.as_ref(), &self.cfg, typ, index, 0, buf)
    }
}

impl<B: Backend> Drop for Device<B> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Issues a GET_DESCRIPTOR request.
fn get_descriptor<B: Backend>(
    b: &B,
    cfg: &Config,
    typ: u8,
    index: u8,
    lang: u16,
    buf: &mut [u8],
) -> Result<usize> {
    let req = Request {
        value: u16::from(typ) << 8 | u16::from(index),
        index: lang,
        ..Request::device(
            Direction::In,
            RequestKind::Standard,
            std_req::GET_DESCRIPTOR,
            w_length(buf.len())?,
        )
    };
    b.control_in(req, buf, cfg.timeouts.control)
}
