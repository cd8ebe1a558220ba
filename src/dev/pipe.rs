use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::host::*;

/// Endpoint handle for bulk, interrupt, and isochronous transfers.
///
/// Asynchronous transfers run on the blocking thread pool. [`Self::abort`]
/// completes all pending asynchronous transfers with [`Error::Aborted`], but
/// the underlying transfer continues until it finishes or times out.
#[derive(Debug)]
pub struct Pipe<B: Backend> {
    b: Arc<B>,
    ep: EndpointDescriptor,
    abort: Mutex<CancellationToken>,
}

impl<B: Backend> Pipe<B> {
    #[inline]
    pub(super) fn new(b: Arc<B>, ep: EndpointDescriptor) -> Self {
        Self {
            b,
            ep,
            abort: Mutex::new(CancellationToken::new()),
        }
    }

    #[inline(always)]
    #[must_use]
    pub const fn endpoint_descriptor(&self) -> &EndpointDescriptor {
        &self.ep
    }

    /// Reads from an IN pipe and returns the number of bytes received.
    pub fn read(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        self.check_dir(Direction::In)?;
        let n = self.b.read(&self.ep, buf, timeout)?;
        trace!("Read {:#04X}: {:02X?}", self.ep.address, &buf[..n]);
        Ok(n)
    }

    /// Writes all of `data` to an OUT pipe.
    pub fn write(&self, data: &[u8], timeout: Duration) -> Result<()> {
        self.check_dir(Direction::Out)?;
        trace!("Write {:#04X}: {data:02X?}", self.ep.address);
        write_all(self.b.as_ref(), &self.ep, data, timeout)
    }

    /// Reads up to `len` bytes from an IN pipe without blocking the caller.
    pub async fn read_async(&self, len: usize, timeout: Duration) -> Result<Vec<u8>> {
        self.check_dir(Direction::In)?;
        let (b, ep) = (Arc::clone(&self.b), self.ep);
        self.complete(tokio::task::spawn_blocking(move || {
            let mut buf = vec![0; len];
            let n = b.read(&ep, &mut buf, timeout)?;
            buf.truncate(n);
            Ok(buf)
        }))
        .await
    }

    /// Writes `data` to an OUT pipe without blocking the caller.
    pub async fn write_async(&self, data: Vec<u8>, timeout: Duration) -> Result<()> {
        self.check_dir(Direction::Out)?;
        let (b, ep) = (Arc::clone(&self.b), self.ep);
        (self.complete(tokio::task::spawn_blocking(move || {
            write_all(b.as_ref(), &ep, &data, timeout)
        })))
        .await
    }

    /// Completes all pending asynchronous transfers with [`Error::Aborted`].
    /// The underlying transfers keep running until their own timeouts
    /// expire. Until then, exclusive device operations such as interface
    /// release or reset may fail with [`Error::Timeout`].
    pub fn abort(&self) {
        let c = std::mem::take(&mut *self.abort.lock());
        debug!("Aborting transfers on {:#04X}", self.ep.address);
        c.cancel();
    }

    /// Clears the halt condition of the endpoint.
    pub fn clear_stall(&self) -> Result<()> {
        debug!("Clearing stall on {:#04X}", self.ep.address);
        self.b.clear_halt(self.ep.address)
    }

    /// Waits for a blocking transfer to finish or for the pipe to be aborted.
    async fn complete<T>(&self, t: JoinHandle<Result<T>>) -> Result<T> {
        let c = self.abort.lock().clone();
        tokio::select! {
            r = t => match r {
                Ok(r) => r,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => Err(Error::Aborted),
            },
            _ = c.cancelled() => Err(Error::Aborted),
        }
    }

    #[inline]
    fn check_dir(&self, dir: Direction) -> Result<()> {
        if self.ep.direction() == dir {
            Ok(())
        } else {
            Err(Error::InvalidArgument(match dir {
                Direction::In => "read from an OUT pipe",
                Direction::Out => "write to an IN pipe",
            }))
        }
    }
}

impl<B: Backend> Drop for Pipe<B> {
    fn drop(&mut self) {
        self.abort.get_mut().cancel();
    }
}

fn write_all<B: Backend>(
    b: &B,
    ep: &EndpointDescriptor,
    data: &[u8],
    timeout: Duration,
) -> Result<()> {
    let n = b.write(ep, data, timeout)?;
    if n == data.len() {
        Ok(())
    } else {
        Err(Error::ShortTransfer {
            want: data.len(),
            got: n,
        })
    }
}
