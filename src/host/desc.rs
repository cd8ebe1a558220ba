//! USB descriptor decoding (USB 2.0 Section 9.6).

use bitflags::bitflags;
use structbuf::Unpacker;
use tracing::trace;

use super::*;

/// Descriptor types (USB 2.0 Table 9-5).
pub mod desc_type {
    pub const DEVICE: u8 = 0x01;
    pub const CONFIGURATION: u8 = 0x02;
    pub const STRING: u8 = 0x03;
    pub const INTERFACE: u8 = 0x04;
    pub const ENDPOINT: u8 = 0x05;
}

/// Common descriptor header size (`bLength` and `bDescriptorType`).
pub const DESC_HDR: usize = 2;
/// Device descriptor size.
pub const DEVICE_DESC_LEN: usize = 18;
/// Configuration descriptor header size.
pub const CONFIG_DESC_LEN: usize = 9;
const IFACE_DESC_LEN: usize = 9;
const EP_DESC_LEN: usize = 7;

/// Standard device descriptor.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DeviceDescriptor {
    pub usb_release: u16,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    pub max_packet_size0: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    /// Device release number in binary-coded decimal (`bcdDevice`).
    pub device_release: u16,
    pub manufacturer_index: u8,
    pub product_index: u8,
    pub serial_number_index: u8,
    pub num_configurations: u8,
}

impl DeviceDescriptor {
    /// Decodes a device descriptor.
    pub fn unpack(b: &[u8]) -> Result<Self> {
        let mut p = Unpacker::new(b);
        let (len, typ) = (p.u8(), p.u8());
        if usize::from(len) < DEVICE_DESC_LEN || typ != desc_type::DEVICE {
            return Err(Error::InvalidDescriptor("device"));
        }
        let d = Self {
            usb_release: p.u16(),
            class: p.u8(),
            subclass: p.u8(),
            protocol: p.u8(),
            max_packet_size0: p.u8(),
            vendor_id: p.u16(),
            product_id: p.u16(),
            device_release: p.u16(),
            manufacturer_index: p.u8(),
            product_index: p.u8(),
            serial_number_index: p.u8(),
            num_configurations: p.u8(),
        };
        if p.is_ok() {
            Ok(d)
        } else {
            Err(Error::InvalidDescriptor("device"))
        }
    }
}

bitflags! {
    /// Configuration characteristics (`bmAttributes`).
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[repr(transparent)]
    pub struct ConfigAttributes: u8 {
        const REMOTE_WAKEUP = 1 << 5;
        const SELF_POWERED = 1 << 6;
    }
}

/// Full configuration descriptor with all of its interfaces and endpoints.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConfigDescriptor {
    pub value: u8,
    pub string_index: u8,
    pub attributes: ConfigAttributes,
    /// Maximum power consumption in 2 mA units.
    pub max_power: u8,
    pub num_interfaces: u8,
    /// Interface descriptors, one per alternate setting.
    pub interfaces: Vec<InterfaceDescriptor>,
}

impl ConfigDescriptor {
    /// Returns the total length of the configuration descriptor set from its
    /// header.
    pub fn total_len(hdr: &[u8]) -> Result<usize> {
        let mut p = Unpacker::new(hdr);
        let (len, typ, total) = (p.u8(), p.u8(), p.u16());
        if !p.is_ok()
            || usize::from(len) < CONFIG_DESC_LEN
            || typ != desc_type::CONFIGURATION
            || usize::from(total) < CONFIG_DESC_LEN
        {
            return Err(Error::InvalidDescriptor("configuration"));
        }
        Ok(usize::from(total))
    }

    /// Decodes a configuration descriptor set. Interface descriptors start a
    /// new [`InterfaceDescriptor`] and endpoint descriptors are attached to the
    /// most recent interface. All other descriptor types are skipped.
    pub fn unpack(b: &[u8]) -> Result<Self> {
        let total = Self::total_len(b)?;
        let b = b.get(..total).ok_or(Error::InvalidDescriptor("configuration"))?;
        let mut p = Unpacker::new(b);
        let len = usize::from(p.u8());
        let _ = (p.u8(), p.u16());
        let mut cfg = Self {
            num_interfaces: p.u8(),
            value: p.u8(),
            string_index: p.u8(),
            attributes: ConfigAttributes::from_bits_truncate(p.u8()),
            max_power: p.u8(),
            interfaces: Vec::new(),
        };
        let mut i = len;
        while i < b.len() {
            let rest = &b[i..];
            let len = usize::from(rest[0]);
            if len < DESC_HDR || rest.len() < len {
                return Err(Error::InvalidDescriptor("configuration"));
            }
            let d = &rest[..len];
            match d[1] {
                desc_type::INTERFACE => cfg.interfaces.push(InterfaceDescriptor::unpack(d)?),
                desc_type::ENDPOINT => {
                    let ep = EndpointDescriptor::unpack(d)?;
                    let Some(ifd) = cfg.interfaces.last_mut() else {
                        return Err(Error::InvalidDescriptor("endpoint"));
                    };
                    ifd.endpoints.push(ep);
                }
                typ => trace!("Skipping descriptor type {typ:#04X}"),
            }
            i += len;
        }
        Ok(cfg)
    }

    /// Returns the interface descriptor for interface number `iface` and
    /// alternate setting `alt`.
    #[must_use]
    pub fn interface(&self, iface: u8, alt: u8) -> Option<&InterfaceDescriptor> {
        (self.interfaces.iter()).find(|d| d.number == iface && d.alt_setting == alt)
    }
}

/// Standard interface descriptor with its endpoints.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InterfaceDescriptor {
    pub number: u8,
    pub alt_setting: u8,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    pub string_index: u8,
    pub endpoints: Vec<EndpointDescriptor>,
}

impl InterfaceDescriptor {
    fn unpack(b: &[u8]) -> Result<Self> {
        if b.len() < IFACE_DESC_LEN {
            return Err(Error::InvalidDescriptor("interface"));
        }
        let mut p = Unpacker::new(&b[DESC_HDR..]);
        let number = p.u8();
        let alt_setting = p.u8();
        let num_endpoints = p.u8();
        Ok(Self {
            number,
            alt_setting,
            class: p.u8(),
            subclass: p.u8(),
            protocol: p.u8(),
            string_index: p.u8(),
            endpoints: Vec::with_capacity(usize::from(num_endpoints)),
        })
    }

    /// Returns whether this is a Bluetooth Primary Controller interface
    /// ([Vol 4] Part B, Section 6.2).
    #[inline]
    #[must_use]
    pub const fn is_bluetooth(&self) -> bool {
        self.class == 0xE0 && self.subclass == 0x01 && self.protocol == 0x01
    }
}

/// Standard endpoint descriptor.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EndpointDescriptor {
    pub address: u8,
    pub attributes: u8,
    pub max_packet_size: u16,
    pub interval: u8,
}

impl EndpointDescriptor {
    fn unpack(b: &[u8]) -> Result<Self> {
        if b.len() < EP_DESC_LEN {
            return Err(Error::InvalidDescriptor("endpoint"));
        }
        let mut p = Unpacker::new(&b[DESC_HDR..]);
        Ok(Self {
            address: p.u8(),
            attributes: p.u8(),
            max_packet_size: p.u16(),
            interval: p.u8(),
        })
    }

    /// Returns the endpoint number without the direction bit.
    #[inline]
    #[must_use]
    pub const fn number(&self) -> u8 {
        self.address & 0x0F
    }

    /// Returns the endpoint direction.
    #[inline]
    #[must_use]
    pub const fn direction(&self) -> Direction {
        Direction::from_bit7(self.address)
    }

    /// Returns the endpoint transfer type.
    #[inline]
    #[must_use]
    pub const fn transfer_type(&self) -> TransferType {
        TransferType::from_attributes(self.attributes)
    }
}

/// Decodes a UTF-16LE string descriptor. Descriptors without any string data
/// are rejected.
pub fn decode_string(b: &[u8]) -> Result<String> {
    let len = usize::from(*b.first().unwrap_or(&0)).min(b.len());
    if len <= DESC_HDR || b[1] != desc_type::STRING {
        return Err(Error::InvalidArgument("empty string descriptor"));
    }
    let units: Vec<u16> = (b[DESC_HDR..len].chunks_exact(2))
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    Ok(String::from_utf16_lossy(&units))
}

#[cfg(test)]
mod tests {
    use super::super::mock::{bluetooth_config, device_descriptor, string_descriptor};
    use super::*;

    #[test]
    fn device() {
        let d = DeviceDescriptor::unpack(&device_descriptor(0x0A5C, 0x21E8, 0x0112, 1)).unwrap();
        assert_eq!((d.vendor_id, d.product_id), (0x0A5C, 0x21E8));
        assert_eq!((d.usb_release, d.device_release), (0x0200, 0x0112));
        assert_eq!((d.class, d.subclass, d.protocol), (0xE0, 0x01, 0x01));
        assert_eq!(d.num_configurations, 1);

        let mut b = device_descriptor(0x0A5C, 0x21E8, 0x0112, 1);
        b[1] = desc_type::CONFIGURATION;
        assert!(DeviceDescriptor::unpack(&b).is_err());
        assert!(DeviceDescriptor::unpack(&b[..DEVICE_DESC_LEN - 1]).is_err());
    }

    #[test]
    fn config() {
        let b = bluetooth_config();
        assert_eq!(ConfigDescriptor::total_len(&b[..CONFIG_DESC_LEN]).unwrap(), b.len());
        let cfg = ConfigDescriptor::unpack(&b).unwrap();
        assert_eq!(cfg.value, 1);
        assert_eq!(cfg.max_power, 50);
        assert_eq!(cfg.attributes, ConfigAttributes::REMOTE_WAKEUP | ConfigAttributes::SELF_POWERED);
        assert!(cfg.interfaces.iter().all(InterfaceDescriptor::is_bluetooth));

        let ifc = cfg.interface(0, 0).unwrap();
        let ep: Vec<_> = (ifc.endpoints.iter())
            .map(|ep| (ep.address, ep.number(), ep.direction(), ep.transfer_type()))
            .collect();
        assert_eq!(
            ep,
            [
                (0x81, 1, Direction::In, TransferType::Interrupt),
                (0x82, 2, Direction::In, TransferType::Bulk),
                (0x02, 2, Direction::Out, TransferType::Bulk),
            ]
        );
        assert_eq!(cfg.interface(1, 1).unwrap().endpoints[1].transfer_type(), TransferType::Isochronous);
        assert!(cfg.interface(2, 0).is_none());
    }

    #[test]
    fn config_skip_unknown() {
        let cfg = bluetooth_config();
        let mut b = cfg[..CONFIG_DESC_LEN].to_vec();
        // Interface association descriptor before the first interface
        b.extend_from_slice(&[8, 0x0B, 0, 2, 0xE0, 0x01, 0x01, 0]);
        b.extend_from_slice(&cfg[CONFIG_DESC_LEN..]);
        let [lo, hi] = (b.len() as u16).to_le_bytes();
        (b[2], b[3]) = (lo, hi);
        let cfg = ConfigDescriptor::unpack(&b).unwrap();
        assert_eq!(cfg.interfaces.len(), 3);
    }

    #[test]
    fn config_invalid() {
        let b = bluetooth_config();
        assert!(ConfigDescriptor::unpack(&b[..b.len() - 1]).is_err());
        assert!(ConfigDescriptor::total_len(&b[..3]).is_err());

        let mut bad = b.clone();
        bad[CONFIG_DESC_LEN] = 1; // bLength < 2
        assert_eq!(
            ConfigDescriptor::unpack(&bad).unwrap_err(),
            Error::InvalidDescriptor("configuration")
        );

        // Endpoint without an interface
        let mut bad = b[..CONFIG_DESC_LEN].to_vec();
        bad.extend_from_slice(&[7, desc_type::ENDPOINT, 0x81, 0x03, 16, 0, 1]);
        bad[2] = bad.len() as u8;
        assert_eq!(
            ConfigDescriptor::unpack(&bad).unwrap_err(),
            Error::InvalidDescriptor("endpoint")
        );
    }

    #[test]
    fn strings() {
        assert_eq!(decode_string(&string_descriptor("Bluetooth")).unwrap(), "Bluetooth");
        assert_eq!(decode_string(&string_descriptor("µ")).unwrap(), "µ");
        assert!(matches!(
            decode_string(&string_descriptor("")),
            Err(Error::InvalidArgument(_))
        ));
        assert!(decode_string(&[]).is_err());
        assert!(decode_string(&[4, desc_type::DEVICE, 0x41, 0]).is_err());
        // bLength limits the decoded data
        assert_eq!(decode_string(&[4, desc_type::STRING, 0x41, 0, 0x42, 0]).unwrap(), "A");
    }
}
