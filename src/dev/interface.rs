use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::host::*;

use super::*;

/// USB interface handle. The interface is claimed by [`Self::open`] and
/// released when the handle is closed or dropped.
#[derive(Debug)]
pub struct Interface<B: Backend> {
    b: Arc<B>,
    desc: InterfaceDescriptor,
    claimed: bool,
}

impl<B: Backend> Interface<B> {
    #[inline]
    pub(super) const fn new(b: Arc<B>, desc: InterfaceDescriptor) -> Self {
        Self {
            b,
            desc,
            claimed: false,
        }
    }

    /// Claims the interface for exclusive use.
    pub fn open(&mut self) -> Result<()> {
        if !self.claimed {
            self.b.claim_interface(self.desc.number)?;
            self.claimed = true;
            debug!("Claimed interface {}", self.desc.number);
        }
        Ok(())
    }

    /// Releases the interface if it is claimed.
    pub fn close(&mut self) {
        if !self.claimed {
            return;
        }
        self.claimed = false;
        match self.b.release_interface(self.desc.number) {
            Ok(()) => debug!("Released interface {}", self.desc.number),
            // Unconfiguring the device releases all interfaces
            Err(e) => warn!("Failed to release interface {} ({e})", self.desc.number),
        }
    }

    /// Returns whether the interface is claimed.
    #[inline(always)]
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.claimed
    }

    #[inline(always)]
    #[must_use]
    pub const fn descriptor(&self) -> &InterfaceDescriptor {
        &self.desc
    }

    #[inline(always)]
    #[must_use]
    pub const fn number(&self) -> u8 {
        self.desc.number
    }

    #[inline(always)]
    #[must_use]
    pub const fn alternate_setting(&self) -> u8 {
        self.desc.alt_setting
    }

    #[inline(always)]
    #[must_use]
    pub const fn class(&self) -> u8 {
        self.desc.class
    }

    #[inline(always)]
    #[must_use]
    pub const fn subclass(&self) -> u8 {
        self.desc.subclass
    }

    #[inline(always)]
    #[must_use]
    pub const fn protocol(&self) -> u8 {
        self.desc.protocol
    }

    /// Returns a pipe for the first endpoint with the specified transfer type
    /// and direction.
    #[must_use]
    pub fn find_pipe(&self, typ: TransferType, dir: Direction) -> Option<Pipe<B>> {
        let ep = (self.desc.endpoints.iter())
            .find(|ep| ep.transfer_type() == typ && ep.direction() == dir);
        match ep {
            Some(ep) => {
                debug!("Found {typ:?} {dir:?} endpoint {:#04X}", ep.address);
                Some(Pipe::new(Arc::clone(&self.b), *ep))
            }
            None => {
                error!(
                    "No {typ:?} {dir:?} endpoint on interface {}",
                    self.desc.number
                );
                None
            }
        }
    }
}

impl<B: Backend> Drop for Interface<B> {
    fn drop(&mut self) {
        self.close();
    }
}
