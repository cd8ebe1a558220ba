use std::fmt::{Debug, Formatter};
use std::time::Duration;

use structbuf::{Pack, StructBuf, Unpacker};
use tracing::{debug, error, trace};

use crate::dev::{Device, Pipe};
use crate::host::{Backend, RequestKind};

use super::*;

/// HCI command packet header size.
pub const CMD_HDR: usize = 3;
/// Maximum command parameter length.
pub const CMD_MAX_PARAMS: usize = u8::MAX as usize;

/// Encoded HCI command packet ([Vol 4] Part E, Section 5.4.1).
#[derive(Clone)]
pub struct Command(StructBuf);

impl Command {
    /// Encodes a command with the specified parameters.
    pub fn new(opcode: Opcode, params: &[u8]) -> Result<Self> {
        let Ok(n) = u8::try_from(params.len()) else {
            return Err(Error::CommandTooLong { len: params.len() });
        };
        let mut b = StructBuf::new(CMD_HDR + CMD_MAX_PARAMS);
        b.append().u16(opcode).u8(n).put(params);
        Ok(Self(b))
    }

    /// Decodes a command, verifying that the parameter length field matches
    /// the number of parameter bytes.
    pub fn unpack(raw: &[u8]) -> Result<Self> {
        let mut p = Unpacker::new(raw);
        let (opcode, n) = (Opcode(p.u16()), p.u8());
        if !p.is_ok() || p.len() != usize::from(n) {
            return Err(Error::InvalidCommand(Vec::from(raw)));
        }
        Self::new(opcode, p.as_ref())
    }

    /// HCI_Reset command.
    #[must_use]
    pub fn reset() -> Self {
        Self::fixed(Opcode::RESET)
    }

    /// HCI_Read_Local_Version_Information command.
    #[must_use]
    pub fn read_local_version() -> Self {
        Self::fixed(Opcode::READ_LOCAL_VERSION_INFORMATION)
    }

    /// HCI_Read_Local_Supported_Commands command.
    #[must_use]
    pub fn read_local_commands() -> Self {
        Self::fixed(Opcode::READ_LOCAL_SUPPORTED_COMMANDS)
    }

    /// HCI_Read_Local_Supported_Features command.
    #[must_use]
    pub fn read_local_features() -> Self {
        Self::fixed(Opcode::READ_LOCAL_SUPPORTED_FEATURES)
    }

    /// Returns the command opcode.
    #[inline]
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        Opcode(u16::from_le_bytes([self.0[0], self.0[1]]))
    }

    /// Returns the command parameters.
    #[inline]
    #[must_use]
    pub fn params(&self) -> &[u8] {
        &self.0[CMD_HDR..]
    }

    /// Returns the parameter length field.
    #[inline]
    #[must_use]
    pub fn param_len(&self) -> u8 {
        self.0[CMD_HDR - 1]
    }

    /// Returns the total packet length, which is also the control transfer
    /// length.
    #[inline]
    #[must_use]
    pub fn transfer_len(&self) -> usize {
        CMD_HDR + usize::from(self.param_len())
    }

    fn fixed(opcode: Opcode) -> Self {
        let mut b = StructBuf::new(CMD_HDR);
        b.append().u16(opcode).u8(0);
        Self(b)
    }
}

impl AsRef<[u8]> for Command {
    #[inline(always)]
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl Debug for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Command({} {:02X?})", self.opcode(), self.params())
    }
}

/// HCI requests sent over the control endpoint. All requests are class
/// requests to the device with `bRequest`, `wValue`, and `wIndex` set to 0
/// ([Vol 4] Part B, Section 2.1.1).
impl<B: Backend> Device<B> {
    /// Sends an HCI command.
    pub fn send_hci_request_out(&self, opcode: Opcode, params: &[u8]) -> Result<()> {
        self.send_hci_command_out(Command::new(opcode, params)?.as_ref())
    }

    /// Sends an HCI command as an IN request and returns the reply. The
    /// encoded command occupies the data stage buffer before the transfer.
    pub fn send_hci_request_in(&self, opcode: Opcode, params: &[u8]) -> Result<Vec<u8>> {
        self.send_hci_command_in(Command::new(opcode, params)?.as_ref())
    }

    /// Sends a pre-encoded HCI command. The parameter length field must match
    /// the number of parameter bytes.
    pub fn send_hci_command_out(&self, cmd: &[u8]) -> Result<()> {
        trace!("Command: {cmd:02X?}");
        Command::unpack(cmd)?;
        let n = (self.send_request_out(RequestKind::Class, 0, cmd)).map_err(|e| {
            error!("Failed to send HCI command {cmd:02X?}: {e}");
            e
        })?;
        if n != cmd.len() {
            return Err(Error::Host(host::Error::ShortTransfer {
                want: cmd.len(),
                got: n,
            }));
        }
        Ok(())
    }

    /// Sends a pre-encoded HCI command as an IN request and returns the reply.
    pub fn send_hci_command_in(&self, cmd: &[u8]) -> Result<Vec<u8>> {
        Command::unpack(cmd)?;
        let mut buf = Vec::from(cmd);
        let n = self.send_request_in(RequestKind::Class, 0, &mut buf)?;
        buf.truncate(n);
        trace!("Command {cmd:02X?} reply: {buf:02X?}");
        Ok(buf)
    }

    /// Executes a command and waits for its completion on event pipe `evt`.
    /// Unrelated events are skipped. A failed command status or completion
    /// status is returned as [`Error::CommandFailed`].
    #[inline]
    pub fn hci_exec(
        &self,
        evt: &Pipe<B>,
        opcode: Opcode,
        params: &[u8],
    ) -> Result<CommandComplete> {
        self.hci_exec_timeout(evt, opcode, params, self.config().timeouts.command)
    }

    /// Executes a command with a custom timeout for each event read.
    pub fn hci_exec_timeout(
        &self,
        evt: &Pipe<B>,
        opcode: Opcode,
        params: &[u8],
        timeout: Duration,
    ) -> Result<CommandComplete> {
        self.send_hci_request_out(opcode, params)?;
        let mut buf = [0; EVT_HDR + u8::MAX as usize];
        // [Vol 4] Part E, Section 4.4
        for _ in 0..self.config().max_event_reads {
            let n = evt.read(&mut buf, timeout)?;
            let e = match Event::unpack(&buf[..n]) {
                Ok(e) => e,
                Err(Error::UnknownEvent { code, .. }) => {
                    debug!("Ignoring unknown event {code:#04X}");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if let Some(cc) = e.command_complete() {
                if cc.opcode == opcode {
                    return if cc.status.is_ok() {
                        Ok(cc)
                    } else {
                        Err(Error::CommandFailed {
                            opcode,
                            status: cc.status,
                        })
                    };
                }
            } else if let Some(cs) = e.command_status() {
                if cs.opcode == opcode && !cs.status.is_ok() {
                    return Err(Error::CommandFailed {
                        opcode,
                        status: cs.status,
                    });
                }
            } else {
                debug!("Ignoring {:?} event while waiting for {opcode}", e.code());
            }
        }
        error!("No completion for {opcode}");
        Err(Error::NoResponse { opcode })
    }

    /// Returns the controller's version information.
    pub fn read_local_version_info(&self, evt: &Pipe<B>) -> Result<LocalVersion> {
        let cc = self.hci_exec(evt, Opcode::READ_LOCAL_VERSION_INFORMATION, &[])?;
        LocalVersion::unpack(&cc.params)
    }
}
