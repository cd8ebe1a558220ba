//! Scripted in-memory backend.
//!
//! [`MockBackend`] answers standard requests from its descriptor tables,
//! replies to vendor requests with scripted data, queues endpoint reads, and
//! records every control transfer and endpoint write for inspection.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use super::*;

/// Control transfer recorded by [`MockBackend`]. For IN transfers, `data`
/// contains the reply.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ControlRecord {
    pub req: Request,
    pub data: Vec<u8>,
}

/// In-memory device. Reads from an empty endpoint queue wait for up to the
/// transfer timeout, or fail immediately when there is no timeout.
#[derive(Debug, Default)]
pub struct MockBackend {
    st: Mutex<State>,
    cv: Condvar,
}

#[derive(Debug, Default)]
struct State {
    device: Vec<u8>,
    configs: Vec<Vec<u8>>,
    strings: BTreeMap<u8, Vec<u8>>,
    configuration: u8,
    status: u16,
    open: bool,
    claimed: BTreeSet<u8>,
    vendor_in: BTreeMap<u8, Vec<u8>>,
    fail: BTreeMap<(u8, u8), Error>,
    log: Vec<ControlRecord>,
    reads: BTreeMap<u8, VecDeque<Result<Vec<u8>>>>,
    writes: BTreeMap<u8, Vec<Vec<u8>>>,
    cleared: Vec<u8>,
    port_resets: usize,
}

impl MockBackend {
    /// Creates a device from raw device and configuration descriptors. The
    /// first configuration is active.
    #[must_use]
    pub fn new(device: Vec<u8>, configs: Vec<Vec<u8>>) -> Self {
        let configuration = (configs.first())
            .and_then(|c| c.get(5).copied())
            .unwrap_or_default();
        // English (United States) only
        let strings = BTreeMap::from([(0, vec![4, desc_type::STRING, 0x09, 0x04])]);
        Self {
            st: Mutex::new(State {
                device,
                configs,
                strings,
                configuration,
                ..State::default()
            }),
            cv: Condvar::new(),
        }
    }

    /// Creates a Bluetooth Primary Controller with the standard interface
    /// layout ([Vol 4] Part B, Section 2.1.1): interface 0 with interrupt IN
    /// 0x81, bulk IN 0x82, and bulk OUT 0x02, and interface 1 with
    /// isochronous IN 0x83 and OUT 0x03.
    #[must_use]
    pub fn bluetooth(vid: u16, pid: u16) -> Self {
        let m = Self::new(device_descriptor(vid, pid, 0x0001, 1), vec![bluetooth_config()]);
        m.set_string(1, "Mock");
        m.set_string(2, "Bluetooth USB Controller");
        m
    }

    /// Sets the string descriptor at `index` (language 0x0409).
    pub fn set_string(&self, index: u8, s: &str) {
        let mut st = self.st.lock();
        if index == 1 || index == 2 {
            let i = if index == 1 { 14 } else { 15 };
            if let Some(b) = st.device.get_mut(i) {
                *b = index;
            }
        }
        st.strings.insert(index, string_descriptor(s));
    }

    /// Sets the reply for vendor IN request `request`.
    pub fn set_vendor_reply(&self, request: u8, data: &[u8]) {
        self.st.lock().vendor_in.insert(request, data.to_vec());
    }

    /// Sets the value returned by GET_STATUS.
    pub fn set_status(&self, status: u16) {
        self.st.lock().status = status;
    }

    /// Makes all control requests of the given kind and code fail with
    /// `err`.
    pub fn fail_request(&self, kind: RequestKind, request: u8, err: Error) {
        self.st.lock().fail.insert((kind as u8, request), err);
    }

    /// Queues data for the next read from endpoint `addr`.
    pub fn push_read(&self, addr: u8, data: &[u8]) {
        self.push_read_result(addr, Ok(data.to_vec()));
    }

    /// Queues a result for the next read from endpoint `addr`.
    pub fn push_read_result(&self, addr: u8, r: Result<Vec<u8>>) {
        let mut st = self.st.lock();
        st.reads.entry(addr).or_default().push_back(r);
        self.cv.notify_all();
    }

    /// Returns and clears all recorded control transfers.
    pub fn take_control_log(&self) -> Vec<ControlRecord> {
        std::mem::take(&mut self.st.lock().log)
    }

    /// Returns all data written to endpoint `addr`.
    #[must_use]
    pub fn writes(&self, addr: u8) -> Vec<Vec<u8>> {
        (self.st.lock().writes.get(&addr)).map_or_else(Vec::new, Clone::clone)
    }

    /// Returns the claimed interface numbers.
    #[must_use]
    pub fn claimed(&self) -> Vec<u8> {
        self.st.lock().claimed.iter().copied().collect()
    }

    /// Returns whether the device is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.st.lock().open
    }

    /// Returns the current configuration value.
    #[must_use]
    pub fn configuration(&self) -> u8 {
        self.st.lock().configuration
    }

    /// Returns the number of port resets.
    #[must_use]
    pub fn port_resets(&self) -> usize {
        self.st.lock().port_resets
    }

    /// Returns endpoint addresses that had their halt condition cleared.
    #[must_use]
    pub fn cleared_halts(&self) -> Vec<u8> {
        self.st.lock().cleared.clone()
    }
}

impl State {
    fn standard_in(&self, req: &Request) -> Result<Vec<u8>> {
        match req.request {
            std_req::GET_DESCRIPTOR => {
                let [typ, idx] = req.value.to_be_bytes();
                let d = match typ {
                    desc_type::DEVICE => Some(&self.device),
                    desc_type::CONFIGURATION => self.configs.get(usize::from(idx)),
                    desc_type::STRING => self.strings.get(&idx),
                    _ => None,
                };
                d.cloned().ok_or(Error::Stall)
            }
            std_req::GET_CONFIGURATION => Ok(vec![self.configuration]),
            std_req::GET_STATUS => Ok(self.status.to_le_bytes().to_vec()),
            _ => Err(Error::Stall),
        }
    }
}

impl Backend for MockBackend {
    fn open(&self) -> Result<()> {
        self.st.lock().open = true;
        Ok(())
    }

    fn close(&self) {
        self.st.lock().open = false;
    }

    fn control_in(&self, req: Request, buf: &mut [u8], _: Duration) -> Result<usize> {
        let mut st = self.st.lock();
        if let Some(&e) = st.fail.get(&(req.kind as u8, req.request)) {
            return Err(e);
        }
        let reply = match req.kind {
            RequestKind::Standard => st.standard_in(&req)?,
            RequestKind::Vendor => st.vendor_in.get(&req.request).cloned().unwrap_or_default(),
            RequestKind::Class => Vec::new(),
        };
        let n = reply.len().min(buf.len()).min(usize::from(req.length));
        buf[..n].copy_from_slice(&reply[..n]);
        trace!("Mock control IN {req:?} -> {:02X?}", &buf[..n]);
        st.log.push(ControlRecord {
            req,
            data: buf[..n].to_vec(),
        });
        Ok(n)
    }

    fn control_out(&self, req: Request, data: &[u8], _: Duration) -> Result<usize> {
        let mut st = self.st.lock();
        if let Some(&e) = st.fail.get(&(req.kind as u8, req.request)) {
            return Err(e);
        }
        let n = data.len().min(usize::from(req.length));
        trace!("Mock control OUT {req:?} {:02X?}", &data[..n]);
        st.log.push(ControlRecord {
            req,
            data: data[..n].to_vec(),
        });
        Ok(n)
    }

    fn set_configuration(&self, value: u8) -> Result<()> {
        let mut st = self.st.lock();
        if value != 0 && !st.configs.iter().any(|c| c.get(5) == Some(&value)) {
            return Err(Error::InvalidArgument("unknown configuration"));
        }
        st.configuration = value;
        if value == 0 {
            st.claimed.clear();
        }
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        let mut st = self.st.lock();
        st.port_resets += 1;
        st.claimed.clear();
        Ok(())
    }

    fn claim_interface(&self, iface: u8) -> Result<()> {
        let mut st = self.st.lock();
        let cfg = (st.configs.iter())
            .find(|c| c.get(5) == Some(&st.configuration))
            .map(|c| ConfigDescriptor::unpack(c))
            .transpose()?;
        if !cfg.map_or(false, |c| c.interfaces.iter().any(|d| d.number == iface)) {
            return Err(Error::InvalidArgument("unknown interface"));
        }
        st.claimed.insert(iface);
        Ok(())
    }

    fn release_interface(&self, iface: u8) -> Result<()> {
        if self.st.lock().claimed.remove(&iface) {
            Ok(())
        } else {
            Err(Error::InvalidArgument("interface not claimed"))
        }
    }

    fn read(&self, ep: &EndpointDescriptor, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let mut st = self.st.lock();
        loop {
            if let Some(r) = st.reads.get_mut(&ep.address).and_then(VecDeque::pop_front) {
                let data = r?;
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                return Ok(n);
            }
            if timeout.is_zero() || self.cv.wait_for(&mut st, timeout).timed_out() {
                // A final check covers data queued right before the timeout
                if st.reads.get(&ep.address).map_or(true, VecDeque::is_empty) {
                    return Err(Error::Timeout);
                }
            }
        }
    }

    fn write(&self, ep: &EndpointDescriptor, data: &[u8], _: Duration) -> Result<usize> {
        let mut st = self.st.lock();
        st.writes.entry(ep.address).or_default().push(data.to_vec());
        Ok(data.len())
    }

    fn clear_halt(&self, addr: u8) -> Result<()> {
        self.st.lock().cleared.push(addr);
        Ok(())
    }
}

/// Returns an encoded device descriptor.
#[must_use]
pub fn device_descriptor(vid: u16, pid: u16, release: u16, num_configs: u8) -> Vec<u8> {
    let mut b = vec![DEVICE_DESC_LEN as u8, desc_type::DEVICE, 0x00, 0x02];
    b.extend_from_slice(&[0xE0, 0x01, 0x01, 64]);
    b.extend_from_slice(&vid.to_le_bytes());
    b.extend_from_slice(&pid.to_le_bytes());
    b.extend_from_slice(&release.to_le_bytes());
    b.extend_from_slice(&[0, 0, 0, num_configs]);
    b
}

/// Returns the configuration descriptor set of a Bluetooth Primary
/// Controller with configuration value 1.
#[must_use]
pub fn bluetooth_config() -> Vec<u8> {
    let iface = |n: u8, alt: u8, eps: u8| [9, desc_type::INTERFACE, n, alt, eps, 0xE0, 0x01, 0x01, 0];
    let ep = |addr: u8, attrs: u8, mps: u16, interval: u8| {
        let [lo, hi] = mps.to_le_bytes();
        [7, desc_type::ENDPOINT, addr, attrs, lo, hi, interval]
    };
    let mut b = vec![9, desc_type::CONFIGURATION, 0, 0, 2, 1, 0, 0xE0, 50];
    b.extend_from_slice(&iface(0, 0, 3));
    b.extend_from_slice(&ep(0x81, 0x03, 16, 1));
    b.extend_from_slice(&ep(0x82, 0x02, 64, 1));
    b.extend_from_slice(&ep(0x02, 0x02, 64, 1));
    b.extend_from_slice(&iface(1, 0, 2));
    b.extend_from_slice(&ep(0x83, 0x01, 0, 1));
    b.extend_from_slice(&ep(0x03, 0x01, 0, 1));
    b.extend_from_slice(&iface(1, 1, 2));
    b.extend_from_slice(&ep(0x83, 0x01, 9, 1));
    b.extend_from_slice(&ep(0x03, 0x01, 9, 1));
    let [lo, hi] = (b.len() as u16).to_le_bytes();
    (b[2], b[3]) = (lo, hi);
    b
}

/// Returns an encoded UTF-16LE string descriptor.
#[must_use]
pub fn string_descriptor(s: &str) -> Vec<u8> {
    let mut b = vec![0, desc_type::STRING];
    b.extend(s.encode_utf16().flat_map(u16::to_le_bytes));
    b[0] = b.len() as u8;
    b
}
