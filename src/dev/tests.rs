use std::sync::Arc;
use std::time::Duration;

use crate::host::mock::MockBackend;
use crate::host::{Direction, Error, RequestKind, TransferType};
use crate::UsbVendor;

use super::*;

fn device() -> (Arc<MockBackend>, Device<MockBackend>) {
    let m = Arc::new(MockBackend::bluetooth(0x0CF3, 0x3004));
    let dev = Device::new(Arc::clone(&m)).unwrap();
    (m, dev)
}

fn bt_interface(dev: &Device<MockBackend>) -> Interface<MockBackend> {
    dev.find_interface(&InterfaceFilter::BLUETOOTH).unwrap().unwrap()
}

#[test]
fn device_descriptor() {
    let (_, dev) = device();
    assert_eq!((dev.vendor_id(), dev.product_id()), (0x0CF3, 0x3004));
    assert_eq!(dev.device_release(), 0x0001);
    assert_eq!(dev.num_configurations(), 1);
    assert_eq!(dev.manufacturer_string_index(), 1);
    assert_eq!(dev.product_string_index(), 2);
    assert_eq!(dev.serial_number_string_index(), 0);
    assert_eq!(dev.usb_vendor(), Some(UsbVendor::Atheros));
    assert_eq!(dev.descriptor().class, 0xE0);
}

#[test]
fn strings() {
    let (m, dev) = device();
    assert_eq!(dev.string(1).unwrap(), "Mock");
    assert_eq!(
        dev.string_descriptor(2, 0x0409).unwrap(),
        "Bluetooth USB Controller"
    );
    assert!(matches!(dev.string(0), Err(Error::InvalidArgument(_))));
    assert_eq!(dev.string(9).unwrap_err(), Error::Stall);
    m.set_string(3, "");
    assert!(matches!(dev.string(3), Err(Error::InvalidArgument(_))));
    let log = m.take_control_log();
    let r = log.iter().find(|r| r.req.value == 0x0302).unwrap().req;
    assert_eq!(r.index, 0x0409);
}

#[test]
fn status_and_configuration() {
    let (m, dev) = device();
    assert_eq!(dev.device_status().unwrap(), DeviceStatus::empty());
    m.set_status(0x0003);
    assert_eq!(
        dev.device_status().unwrap(),
        DeviceStatus::SELF_POWERED | DeviceStatus::REMOTE_WAKEUP
    );
    assert_eq!(dev.configuration().unwrap(), 1);
    dev.set_configuration(0).unwrap();
    assert_eq!(dev.configuration().unwrap(), 0);
    assert!(matches!(
        dev.active_configuration_descriptor(),
        Err(Error::InvalidArgument(_))
    ));
    assert!(dev.set_configuration(2).is_err());
    dev.set_configuration(1).unwrap();
    assert_eq!(dev.active_configuration_descriptor().unwrap().value, 1);
}

#[test]
fn configuration_descriptor() {
    let (m, dev) = device();
    let cfg = dev.full_configuration_descriptor(0).unwrap();
    assert_eq!((cfg.value, cfg.num_interfaces), (1, 2));
    assert_eq!(cfg.interfaces.len(), 3);
    assert_eq!(cfg.interfaces[0].endpoints.len(), 3);
    assert_eq!(cfg.interface(1, 1).unwrap().endpoints[0].max_packet_size, 9);
    assert_eq!(dev.full_configuration_descriptor(1).unwrap_err(), Error::Stall);

    // Header first, then the full descriptor set
    let lens: Vec<u16> = (m.take_control_log().iter())
        .filter(|r| r.req.value == 0x0200)
        .map(|r| r.req.length)
        .collect();
    assert_eq!(lens[..2], [9, u16::try_from(cfg_len()).unwrap()]);
}

fn cfg_len() -> usize {
    crate::host::mock::bluetooth_config().len()
}

#[test]
fn find_interface() {
    let (_, dev) = device();
    let ifc = bt_interface(&dev);
    assert_eq!((ifc.number(), ifc.alternate_setting()), (0, 0));
    assert_eq!((ifc.class(), ifc.subclass(), ifc.protocol()), (0xE0, 0x01, 0x01));
    assert_eq!(ifc.descriptor().endpoints.len(), 3);

    let ifc = dev.find_first_interface().unwrap().unwrap();
    assert_eq!(ifc.number(), 0);

    let f = InterfaceFilter {
        alt_setting: Some(1),
        ..InterfaceFilter::BLUETOOTH
    };
    let ifc = dev.find_interface(&f).unwrap().unwrap();
    assert_eq!((ifc.number(), ifc.alternate_setting()), (1, 1));

    let f = InterfaceFilter {
        class: Some(0xFF),
        ..InterfaceFilter::ANY
    };
    assert!(dev.find_interface(&f).unwrap().is_none());
}

#[test]
fn open_close() {
    let (m, mut dev) = device();
    assert!(!dev.is_open());
    dev.open().unwrap();
    dev.open().unwrap();
    assert!(dev.is_open() && m.is_open());
    dev.close();
    dev.close();
    assert!(!m.is_open());
    dev.open().unwrap();
    drop(dev);
    assert!(!m.is_open());
}

#[test]
fn interface_claim() {
    let (m, dev) = device();
    let mut ifc = bt_interface(&dev);
    ifc.open().unwrap();
    assert!(ifc.is_open());
    assert_eq!(m.claimed(), [0]);
    ifc.close();
    assert!(m.claimed().is_empty());
    ifc.open().unwrap();
    drop(ifc);
    assert!(m.claimed().is_empty());

    // Unconfiguring releases all interfaces
    let mut ifc = bt_interface(&dev);
    ifc.open().unwrap();
    dev.set_configuration(0).unwrap();
    assert!(m.claimed().is_empty());
    ifc.close();
    assert!(!ifc.is_open());
}

#[test]
fn find_pipe() {
    let (_, dev) = device();
    let ifc = bt_interface(&dev);
    let addr = |t, d| (ifc.find_pipe(t, d)).map(|p| p.endpoint_descriptor().address);
    assert_eq!(addr(TransferType::Interrupt, Direction::In), Some(0x81));
    assert_eq!(addr(TransferType::Bulk, Direction::In), Some(0x82));
    assert_eq!(addr(TransferType::Bulk, Direction::Out), Some(0x02));
    assert_eq!(addr(TransferType::Interrupt, Direction::Out), None);
    assert_eq!(addr(TransferType::Isochronous, Direction::In), None);

    let f = InterfaceFilter {
        alt_setting: Some(1),
        ..InterfaceFilter::BLUETOOTH
    };
    let iso = dev.find_interface(&f).unwrap().unwrap();
    let p = iso.find_pipe(TransferType::Isochronous, Direction::Out).unwrap();
    assert_eq!(p.endpoint_descriptor().address, 0x03);
    assert_eq!(p.endpoint_descriptor().max_packet_size, 9);
}

#[test]
fn pipe_io() {
    let (m, dev) = device();
    let ifc = bt_interface(&dev);
    let rx = ifc.find_pipe(TransferType::Bulk, Direction::In).unwrap();
    let tx = ifc.find_pipe(TransferType::Bulk, Direction::Out).unwrap();
    let t = Duration::from_millis(10);

    tx.write(&[1, 2, 3], t).unwrap();
    assert_eq!(m.writes(0x02), [vec![1, 2, 3]]);
    assert!(matches!(tx.read(&mut [0; 4], t), Err(Error::InvalidArgument(_))));
    assert!(matches!(rx.write(&[1], t), Err(Error::InvalidArgument(_))));

    m.push_read(0x82, &[4, 5]);
    let mut buf = [0; 8];
    assert_eq!(rx.read(&mut buf, t).unwrap(), 2);
    assert_eq!(buf[..2], [4, 5]);
    assert_eq!(rx.read(&mut buf, t).unwrap_err(), Error::Timeout);

    m.push_read_result(0x82, Err(Error::Stall));
    assert_eq!(rx.read(&mut buf, t).unwrap_err(), Error::Stall);
    rx.clear_stall().unwrap();
    assert_eq!(m.cleared_halts(), [0x82]);
}

#[tokio::test]
async fn pipe_async() {
    let (m, dev) = device();
    let ifc = bt_interface(&dev);
    let rx = ifc.find_pipe(TransferType::Bulk, Direction::In).unwrap();
    let tx = ifc.find_pipe(TransferType::Bulk, Direction::Out).unwrap();
    let t = Duration::from_millis(100);

    tx.write_async(vec![9, 8, 7], t).await.unwrap();
    assert_eq!(m.writes(0x02), [vec![9, 8, 7]]);

    m.push_read(0x82, &[1, 2, 3, 4]);
    assert_eq!(rx.read_async(2, t).await.unwrap(), [1, 2]);
    assert_eq!(rx.read_async(2, t).await.unwrap_err(), Error::Timeout);
    assert!(matches!(
        tx.read_async(2, t).await,
        Err(Error::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn pipe_abort() {
    let (_, dev) = device();
    let ifc = bt_interface(&dev);
    let rx = ifc.find_pipe(TransferType::Interrupt, Direction::In).unwrap();
    let (r, ()) = tokio::join!(rx.read_async(16, Duration::from_millis(200)), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        rx.abort();
    });
    assert_eq!(r.unwrap_err(), Error::Aborted);
}

#[test]
fn reset() {
    let (m, dev) = device();
    m.take_control_log();
    dev.reset().unwrap();
    assert_eq!(m.configuration(), 0);
    let log = m.take_control_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].req.kind, RequestKind::Class);
    assert_eq!(log[0].data, [0x03, 0x0C, 0x00]);

    // HCI Reset failure is not fatal
    dev.set_configuration(1).unwrap();
    m.fail_request(RequestKind::Class, 0, Error::NoDevice);
    dev.reset().unwrap();
    assert_eq!(m.configuration(), 0);

    dev.reset_port().unwrap();
    assert_eq!(m.port_resets(), 1);
}

#[test]
fn vendor_requests() {
    let (m, dev) = device();
    m.set_vendor_reply(0x05, &[0x0E]);
    let mut buf = [0; 1];
    assert_eq!(dev.vendor_request_in(0x05, &mut buf).unwrap(), 1);
    assert_eq!(buf, [0x0E]);
    assert_eq!(dev.vendor_request_out(0x07, &[1, 2]).unwrap(), 2);
    let log = m.take_control_log();
    let r = log.last().unwrap().req;
    assert_eq!((r.request_type(), r.request, r.length), (0x40, 0x07, 2));
}
