use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::dev::{Device, InterfaceFilter, Pipe};
use crate::host::mock::MockBackend;
use crate::host::{Direction, Recipient, RequestKind, TransferType};
use crate::CompanyId;

use super::*;

const EVT: u8 = 0x81;

fn device(cfg: Config) -> (Arc<MockBackend>, Device<MockBackend>) {
    let m = Arc::new(MockBackend::bluetooth(0x0CF3, 0x3004));
    let dev = Device::with_config(Arc::clone(&m), cfg).unwrap();
    (m, dev)
}

fn event_pipe(dev: &Device<MockBackend>) -> Pipe<MockBackend> {
    let ifc = dev.find_interface(&InterfaceFilter::BLUETOOTH).unwrap().unwrap();
    ifc.find_pipe(TransferType::Interrupt, Direction::In).unwrap()
}

fn cmd_complete(opcode: Opcode, status: Status, params: &[u8]) -> Vec<u8> {
    let [lo, hi] = opcode.0.to_le_bytes();
    let mut b = vec![EventCode::CommandComplete.into(), 0, 1, lo, hi, status.0];
    b.extend_from_slice(params);
    b[1] = (b.len() - EVT_HDR) as u8;
    b
}

#[test]
fn opcode_pack_unpack() {
    for ogf in 0..=0x3F {
        for ocf in 0..=0x3FF {
            let op = Opcode::new(ogf, ocf);
            assert_eq!((op.ogf(), op.ocf()), (ogf, ocf));
            assert_eq!(op.0, (ocf & 0x3FF) | ogf << 10);
        }
    }
    assert_eq!(Opcode::new(0x01, 0x7FF).ocf(), 0x3FF);
}

#[test]
fn opcode_names() {
    assert_eq!(Opcode::RESET, Opcode(0x0C03));
    assert_eq!(Opcode::READ_LOCAL_VERSION_INFORMATION, Opcode(0x1001));
    assert_eq!(Opcode::BCM_READ_VERBOSE_CONFIG, Opcode(0xFC79));
    assert_eq!(Opcode::QCA_COMMAND_COMPLETE, Opcode(0xFC00));
    assert_eq!(Opcode::RESET.group(), Some(OpcodeGroup::HciControl));
    assert!(Opcode::INTEL_RESET.is_vendor());
    assert_eq!(Opcode::RESET.to_string(), "0x0C03 (RESET)");
    assert_eq!(Opcode(0x2001).to_string(), "0x2001");
    assert_eq!(Opcode(0x2001).name(), None);
}

#[test]
fn command_header() {
    for n in 0..=CMD_MAX_PARAMS {
        let params = vec![0xA5; n];
        let cmd = Command::new(Opcode::RESET, &params).unwrap();
        assert_eq!(cmd.transfer_len(), CMD_HDR + n);
        assert_eq!(cmd.as_ref().len(), CMD_HDR + n);
        assert_eq!(&cmd.as_ref()[..CMD_HDR], &[0x03, 0x0C, n as u8]);
        assert_eq!(cmd.params(), params.as_slice());
        assert_eq!(cmd.opcode(), Opcode::RESET);
    }
    assert_eq!(
        Command::new(Opcode::RESET, &[0; CMD_MAX_PARAMS + 1]).unwrap_err(),
        Error::CommandTooLong { len: 256 }
    );
}

#[test]
fn fixed_commands() {
    assert_eq!(Command::reset().as_ref(), &[0x03, 0x0C, 0x00]);
    assert_eq!(Command::read_local_version().as_ref(), &[0x01, 0x10, 0x00]);
    assert_eq!(Command::read_local_commands().as_ref(), &[0x02, 0x10, 0x00]);
    assert_eq!(Command::read_local_features().as_ref(), &[0x03, 0x10, 0x00]);
}

#[test]
fn command_unpack() {
    let cmd = Command::unpack(&[0x53, 0xFC, 0x01, 0x13]).unwrap();
    assert_eq!(cmd.opcode(), Opcode::BCM_WAKEUP);
    assert_eq!(cmd.params(), &[0x13]);
    let invalid: [&[u8]; 3] = [&[0x53, 0xFC], &[0x53, 0xFC, 0x02, 0x13], &[0x53, 0xFC, 0x00, 0x13]];
    for raw in invalid {
        assert!(matches!(Command::unpack(raw), Err(Error::InvalidCommand(_))));
    }
}

#[test]
fn event_unpack() {
    let raw = cmd_complete(Opcode::RESET, Status::SUCCESS, &[]);
    let e = Event::unpack(&raw).unwrap();
    assert_eq!(e.code(), EventCode::CommandComplete);
    let cc = e.command_complete().unwrap();
    assert_eq!((cc.quota, cc.opcode, cc.status), (1, Opcode::RESET, Status::SUCCESS));
    assert!(cc.params.is_empty());
    assert!(e.command_status().is_none());

    let e = Event::unpack(&[0x0F, 4, 0x01, 1, 0x03, 0x0C]).unwrap();
    let cs = e.command_status().unwrap();
    assert_eq!(cs.status, Status::UNKNOWN_COMMAND);
    assert_eq!(cs.opcode, Opcode::RESET);

    // Quota update without status
    let cc = (Event::unpack(&[0x0E, 3, 1, 0, 0]).unwrap())
        .command_complete()
        .unwrap();
    assert_eq!((cc.opcode, cc.status), (Opcode::NONE, Status::SUCCESS));

    assert!(matches!(Event::unpack(&[0x0E]), Err(Error::InvalidEvent(_))));
    assert!(matches!(Event::unpack(&[0x0E, 3, 1, 0]), Err(Error::InvalidEvent(_))));
    assert!(matches!(Event::unpack(&[0x0F, 1, 0]), Err(Error::InvalidEvent(_))));
    assert_eq!(
        Event::unpack(&[0x99, 1, 7]).unwrap_err(),
        Error::UnknownEvent {
            code: 0x99,
            params: vec![7]
        }
    );
}

#[test]
fn status() {
    assert!(Status::SUCCESS.is_ok());
    assert!(!Status::HARDWARE_FAILURE.is_ok());
    assert_eq!(Status(0x0C).to_string(), "Command Disallowed (0x0C)");
    assert_eq!(Status(0x70).to_string(), "0x70");
    let e = Error::CommandFailed {
        opcode: Opcode::RESET,
        status: Status::HARDWARE_FAILURE,
    };
    assert_eq!(e.status(), Some(Status::HARDWARE_FAILURE));
}

#[test]
fn packet_types() {
    assert_eq!(u8::from(PacketType::Command), 0x01);
    assert_eq!(PacketType::try_from(0x04).unwrap(), PacketType::Event);
    assert_eq!(PacketType::try_from(0xF0).unwrap(), PacketType::Diagnostic);
    assert!(PacketType::try_from(0x05).is_err());
}

#[test]
fn request_out() {
    let (m, dev) = device(Config::default());
    m.take_control_log();
    dev.send_hci_request_out(Opcode::RESET, &[]).unwrap();
    dev.send_hci_command_out(&[0x53, 0xFC, 0x01, 0x13]).unwrap();
    let log = m.take_control_log();
    assert_eq!(log.len(), 2);
    let r = log[0].req;
    assert_eq!((r.dir, r.kind, r.recipient), (Direction::Out, RequestKind::Class, Recipient::Device));
    assert_eq!((r.request, r.value, r.index, r.length), (0, 0, 0, 3));
    assert_eq!(r.request_type(), 0x20);
    assert_eq!(log[0].data, [0x03, 0x0C, 0x00]);
    assert_eq!(log[1].req.length, 4);
    assert_eq!(log[1].data, [0x53, 0xFC, 0x01, 0x13]);
}

#[test]
fn raw_command_length_mismatch() {
    let (m, dev) = device(Config::default());
    m.take_control_log();
    for cmd in [&[0x03, 0x0C, 0x05][..], &[0x03, 0x0C, 0x00, 0x01], &[0x03, 0x0C]] {
        assert!(matches!(dev.send_hci_command_out(cmd), Err(Error::InvalidCommand(_))));
        assert!(matches!(dev.send_hci_command_in(cmd), Err(Error::InvalidCommand(_))));
    }
    assert!(m.take_control_log().is_empty());
}

#[test]
fn request_in() {
    let (m, dev) = device(Config::default());
    m.take_control_log();
    assert!(dev.send_hci_request_in(Opcode::RESET, &[1, 2]).unwrap().is_empty());
    let log = m.take_control_log();
    assert_eq!(log[0].req.dir, Direction::In);
    assert_eq!(log[0].req.request_type(), 0xA0);
    assert_eq!(log[0].req.length, 5);
}

#[test]
fn request_error() {
    let (m, dev) = device(Config::default());
    m.fail_request(RequestKind::Class, 0, host::Error::Stall);
    assert_eq!(
        dev.send_hci_request_out(Opcode::RESET, &[]).unwrap_err(),
        Error::Host(host::Error::Stall)
    );
    assert!(matches!(
        dev.send_hci_request_out(Opcode::RESET, &[0; 300]),
        Err(Error::CommandTooLong { len: 300 })
    ));
}

#[test]
fn exec_local_version() {
    let (m, dev) = device(Config::default());
    let evt = event_pipe(&dev);
    m.push_read(EVT, &[0x13, 5, 1, 0x40, 0x00, 0x01, 0x00]); // NumberOfCompletedPackets
    m.push_read(EVT, &[0x99, 0]);
    m.push_read(EVT, &cmd_complete(Opcode::RESET, Status::SUCCESS, &[]));
    m.push_read(
        EVT,
        &cmd_complete(
            Opcode::READ_LOCAL_VERSION_INFORMATION,
            Status::SUCCESS,
            &[0x08, 0x01, 0x00, 0x08, 0x1D, 0x00, 0x02, 0x00],
        ),
    );
    let v = dev.read_local_version_info(&evt).unwrap();
    assert_eq!(
        v,
        LocalVersion {
            hci_version: 0x08,
            hci_subversion: 0x0001,
            lmp_version: 0x08,
            company_id: CompanyId::QUALCOMM,
            lmp_subversion: 0x0002,
        }
    );
    let log = m.take_control_log();
    assert_eq!(log.last().unwrap().data, [0x01, 0x10, 0x00]);
}

#[test]
fn exec_failure() {
    let (m, dev) = device(Config::default());
    let evt = event_pipe(&dev);
    m.push_read(EVT, &[0x0F, 4, 0x01, 1, 0x03, 0x0C]);
    assert_eq!(
        dev.hci_exec(&evt, Opcode::RESET, &[]).unwrap_err(),
        Error::CommandFailed {
            opcode: Opcode::RESET,
            status: Status::UNKNOWN_COMMAND
        }
    );
    m.push_read(EVT, &cmd_complete(Opcode::RESET, Status::HARDWARE_FAILURE, &[]));
    assert_eq!(
        dev.hci_exec(&evt, Opcode::RESET, &[]).unwrap_err().status(),
        Some(Status::HARDWARE_FAILURE)
    );
}

#[test]
fn exec_no_response() {
    let mut cfg = Config::default();
    cfg.max_event_reads = 2;
    cfg.timeouts.command = Duration::from_millis(10);
    let (m, dev) = device(cfg);
    let evt = event_pipe(&dev);
    m.push_read(EVT, &[0x10, 1, 0]); // HardwareError
    m.push_read(EVT, &[0x10, 1, 0]);
    assert_eq!(
        dev.hci_exec(&evt, Opcode::RESET, &[]).unwrap_err(),
        Error::NoResponse {
            opcode: Opcode::RESET
        }
    );
    assert_eq!(
        dev.hci_exec(&evt, Opcode::RESET, &[]).unwrap_err(),
        Error::Host(host::Error::Timeout)
    );
}
