use structbuf::Unpacker;

use crate::CompanyId;

use super::*;

/// `HCI_Read_Local_Version_Information` return parameters
/// ([Vol 4] Part E, Section 7.4.1).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LocalVersion {
    pub hci_version: u8,
    pub hci_subversion: u16,
    pub lmp_version: u8,
    pub company_id: CompanyId,
    pub lmp_subversion: u16,
}

impl LocalVersion {
    /// Decodes the return parameters that follow the status.
    pub fn unpack(params: &[u8]) -> Result<Self> {
        let mut p = Unpacker::new(params);
        let v = Self {
            hci_version: p.u8(),
            hci_subversion: p.u16(),
            lmp_version: p.u8(),
            company_id: CompanyId(p.u16()),
            lmp_subversion: p.u16(),
        };
        if p.is_ok() {
            Ok(v)
        } else {
            Err(Error::InvalidEvent(Vec::from(params)))
        }
    }
}
