use structbuf::Unpacker;
use tracing::trace;

use super::*;

/// HCI event packet header size.
pub const EVT_HDR: usize = 2;
/// HCI ACL data packet header size.
pub const ACL_HDR: usize = 4;
/// HCI synchronous data packet header size.
pub const SCO_HDR: usize = 3;

/// Received HCI event ([Vol 4] Part E, Section 5.4.4).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Event {
    code: EventCode,
    params: Vec<u8>,
}

impl Event {
    /// Decodes an event, verifying that the parameter length field matches the
    /// number of parameter bytes. Command completion events are also checked
    /// for their fixed parameters.
    pub fn unpack(raw: &[u8]) -> Result<Self> {
        let mut p = Unpacker::new(raw);
        let (code, n) = (p.u8(), p.u8());
        if !p.is_ok() || p.len() != usize::from(n) {
            return Err(Error::InvalidEvent(Vec::from(raw)));
        }
        let Ok(code) = EventCode::try_from(code) else {
            return Err(Error::UnknownEvent {
                code,
                params: Vec::from(p.as_ref()),
            });
        };
        let min = match code {
            EventCode::CommandComplete => 3,
            EventCode::CommandStatus => 4,
            _ => 0,
        };
        if p.len() < min {
            return Err(Error::InvalidEvent(Vec::from(raw)));
        }
        let e = Self {
            code,
            params: Vec::from(p.as_ref()),
        };
        trace!("{e:?}");
        Ok(e)
    }

    /// Returns the event code.
    #[inline(always)]
    #[must_use]
    pub const fn code(&self) -> EventCode {
        self.code
    }

    /// Returns the event parameters.
    #[inline(always)]
    #[must_use]
    pub fn params(&self) -> &[u8] {
        &self.params
    }

    /// Returns the decoded parameters of a `CommandComplete` event.
    #[must_use]
    pub fn command_complete(&self) -> Option<CommandComplete> {
        if self.code != EventCode::CommandComplete {
            return None;
        }
        let mut p = Unpacker::new(self.params.as_slice());
        let (quota, opcode) = (p.u8(), Opcode(p.u16()));
        // Opcode 0x0000 has no status ([Vol 4] Part E, Section 7.7.14)
        let status = if p.is_empty() {
            Status::SUCCESS
        } else {
            Status(p.u8())
        };
        Some(CommandComplete {
            quota,
            opcode,
            status,
            params: Vec::from(p.as_ref()),
        })
    }

    /// Returns the decoded parameters of a `CommandStatus` event.
    #[must_use]
    pub fn command_status(&self) -> Option<CommandStatus> {
        if self.code != EventCode::CommandStatus {
            return None;
        }
        let mut p = Unpacker::new(self.params.as_slice());
        Some(CommandStatus {
            status: Status(p.u8()),
            quota: p.u8(),
            opcode: Opcode(p.u16()),
        })
    }
}

/// `HCI_Command_Complete` event parameters ([Vol 4] Part E, Section 7.7.14).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommandComplete {
    /// Number of commands the controller can accept.
    pub quota: u8,
    pub opcode: Opcode,
    pub status: Status,
    /// Return parameters following the status.
    pub params: Vec<u8>,
}

/// `HCI_Command_Status` event parameters ([Vol 4] Part E, Section 7.7.15).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CommandStatus {
    pub status: Status,
    pub quota: u8,
    pub opcode: Opcode,
}
