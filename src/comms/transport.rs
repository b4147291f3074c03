//! transport.rs
//! Byte transport under the field link (the 115200-baud radio serial bridge
//! on the robot; channels or a mock in simulation and tests).

use std::collections::VecDeque;
use std::sync::Arc;

use crossbeam::channel::{Receiver, Sender, TryRecvError, unbounded};
use parking_lot::Mutex;

use crate::error::{Error, Result};

pub trait Transport: Send {
    /// Read whatever is buffered into `buffer` without waiting; returns bytes read.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    fn write(&mut self, data: &[u8]) -> Result<usize>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Mock transport
// ============================================================================

/// In-memory transport; clones share the same buffers so a test can inject
/// inbound bytes and inspect outbound ones while the link owns a copy.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockInner>>,
}

#[derive(Default)]
struct MockInner {
    read_buffer: VecDeque<u8>,
    write_buffer: Vec<u8>,
    fail_writes: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject_read(&self, data: &[u8]) {
        self.inner.lock().read_buffer.extend(data);
    }

    pub fn written(&self) -> Vec<u8> {
        self.inner.lock().write_buffer.clone()
    }

    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.inner.lock().write_buffer)
    }

    /// Make every subsequent write fail (simulates a dead radio).
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        let n = inner.read_buffer.len().min(buffer.len());
        for (slot, byte) in buffer.iter_mut().zip(inner.read_buffer.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        if inner.fail_writes {
            return Err(Error::Transport("mock write failure".into()));
        }
        inner.write_buffer.extend_from_slice(data);
        Ok(data.len())
    }
}

// ============================================================================
// Channel transport
// ============================================================================

/// One end of a full-duplex byte pipe built on crossbeam channels.
pub struct ChannelTransport {
    tx: Sender<u8>,
    rx: Receiver<u8>,
}

/// Two connected ends: bytes written on one are read on the other.
pub fn channel_pair() -> (ChannelTransport, ChannelTransport) {
    let (tx_a, rx_b) = unbounded();
    let (tx_b, rx_a) = unbounded();
    (
        ChannelTransport { tx: tx_a, rx: rx_a },
        ChannelTransport { tx: tx_b, rx: rx_b },
    )
}

impl Transport for ChannelTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut n = 0;
        while n < buffer.len() {
            match self.rx.try_recv() {
                Ok(b) => {
                    buffer[n] = b;
                    n += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if n == 0 {
                        return Err(Error::Disconnected);
                    }
                    break;
                }
            }
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        for &b in data {
            self.tx.send(b).map_err(|_| Error::Disconnected)?;
        }
        Ok(data.len())
    }
}
