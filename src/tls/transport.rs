//! Transport buffer pair
//!
//! Two bounded byte regions stand in for the network socket. The engine
//! reads ciphertext from `inbound` and writes ciphertext to `outbound`;
//! the caller feeds the former and drains the latter.
//!
//! An empty inbound region reads as `WouldBlock` and a full outbound region
//! writes as `WouldBlock`, which the engine reports as a retryable
//! want-read / want-write condition instead of end of stream.

use bytes::{Buf, BytesMut};
use std::io::{self, Read, Write};

/// Inbound/outbound byte regions handed to the engine as its transport
#[derive(Debug)]
pub struct TransportBuffers {
    inbound: BytesMut,
    outbound: BytesMut,
    capacity: usize,
    /// Current bound on `outbound`; raised above `capacity` only while a
    /// single plaintext write is being encrypted
    outbound_limit: usize,
}

impl TransportBuffers {
    /// Create a buffer pair; each direction holds at most `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        TransportBuffers {
            inbound: BytesMut::with_capacity(capacity.min(16 * 1024)),
            outbound: BytesMut::with_capacity(capacity.min(16 * 1024)),
            capacity,
            outbound_limit: capacity,
        }
    }

    /// Per-direction capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append received bytes to the inbound region
    ///
    /// Returns the number of bytes accepted, which is short only when the
    /// region is full.
    pub fn feed(&mut self, bytes: &[u8]) -> usize {
        let room = self.capacity.saturating_sub(self.inbound.len());
        let n = room.min(bytes.len());
        self.inbound.extend_from_slice(&bytes[..n]);
        n
    }

    /// Bytes received but not yet consumed by the engine
    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }

    /// Bytes the engine produced that have not been drained yet
    pub fn pending_outbound(&self) -> usize {
        self.outbound.len()
    }

    /// Move up to `out.len()` pending bytes into `out`
    pub fn drain_outbound(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.outbound.len());
        self.outbound.copy_to_slice(&mut out[..n]);
        n
    }

    /// Drop every pending outbound byte, returning how many were dropped
    pub(crate) fn discard_outbound(&mut self) -> usize {
        let n = self.outbound.len();
        self.outbound.clear();
        n
    }

    /// Let `outbound` accept at least `extra` more bytes
    pub(crate) fn raise_outbound_limit(&mut self, extra: usize) {
        self.outbound_limit = self
            .outbound_limit
            .max(self.outbound.len())
            .saturating_add(extra);
    }

    /// Restore the configured bound; queued bytes are kept
    pub(crate) fn reset_outbound_limit(&mut self) {
        self.outbound_limit = self.capacity;
    }
}

impl Read for TransportBuffers {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.inbound.is_empty() {
            return Err(io::ErrorKind::WouldBlock.into());
        }

        let n = buf.len().min(self.inbound.len());
        self.inbound.copy_to_slice(&mut buf[..n]);
        Ok(n)
    }
}

impl Write for TransportBuffers {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let room = self.outbound_limit.saturating_sub(self.outbound.len());
        if room == 0 {
            return Err(io::ErrorKind::WouldBlock.into());
        }

        let n = room.min(buf.len());
        self.outbound.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
