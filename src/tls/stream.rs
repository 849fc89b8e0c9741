//! Blocking stream adapter
//!
//! `SecureStream` runs a `SecureContext` over any blocking transport that
//! implements `Read + Write`, such as a `TcpStream`. It is how a transport
//! layer (an HTTP client, for instance) consumes the channel: drive the
//! handshake once, then read and write plaintext.

use super::config::Role;
use super::context::SecureContext;
use super::error::ChannelError;
use super::status::Status;
use super::Result;
use log::debug;
use std::io::{self, Read, Write};

/// Largest plaintext chunk encrypted per `write` call (one full record)
const MAX_PLAINTEXT_CHUNK: usize = 16 * 1024;

/// Scratch space for ciphertext in either direction
const CIPHERTEXT_BUF: usize = 64 * 1024;

/// TLS channel over a blocking byte transport
pub struct SecureStream<S> {
    context: SecureContext,
    io: S,
    inbuf: Vec<u8>,
    outbuf: Vec<u8>,
}

impl<S: Read + Write> SecureStream<S> {
    /// Perform the client handshake over `io`
    pub fn connect(context: SecureContext, io: S) -> Result<Self> {
        if context.role() != Role::Client {
            return Err(ChannelError::InvalidState("connect requires a client context"));
        }
        Self::new(context, io).handshake()
    }

    /// Perform the server handshake over `io`
    pub fn accept(context: SecureContext, io: S) -> Result<Self> {
        if context.role() != Role::Server {
            return Err(ChannelError::InvalidState("accept requires a server context"));
        }
        Self::new(context, io).handshake()
    }

    fn new(context: SecureContext, io: S) -> Self {
        SecureStream {
            context,
            io,
            inbuf: vec![0u8; CIPHERTEXT_BUF],
            outbuf: vec![0u8; CIPHERTEXT_BUF],
        }
    }

    fn handshake(mut self) -> Result<Self> {
        let mut received = 0;
        loop {
            let progress = self.context.step(&self.inbuf[..received], &mut self.outbuf)?;
            if progress.written > 0 {
                self.io.write_all(&self.outbuf[..progress.written])?;
                self.io.flush()?;
            }
            if progress.done {
                debug!("{:?} stream handshake finished", self.context.role());
                return Ok(self);
            }

            received = self.io.read(&mut self.inbuf)?;
            if received == 0 {
                return Err(ChannelError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "transport closed during handshake",
                )));
            }
        }
    }

    /// Send anything the engine queued outside of `encrypt`
    fn flush_pending(&mut self) -> Result<()> {
        while self.context.pending_outbound()? > 0 {
            let n = self.context.drain_outbound(&mut self.outbuf)?;
            self.io.write_all(&self.outbuf[..n])?;
        }
        self.io.flush()?;
        Ok(())
    }

    fn read_plaintext(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut received = 0;
        loop {
            match self.context.decrypt(&self.inbuf[..received], buf)? {
                Status::Done(n) => return Ok(n),
                Status::ConnectionClosed => return Ok(0),
                Status::NeedMoreInput => {}
                Status::RenegotiationRequired => {
                    let progress = self.context.step(&[], &mut self.outbuf)?;
                    self.io.write_all(&self.outbuf[..progress.written])?;
                }
            }

            self.flush_pending()?;
            received = self.io.read(&mut self.inbuf)?;
            if received == 0 {
                return Ok(0);
            }
        }
    }

    fn write_plaintext(&mut self, buf: &[u8]) -> Result<usize> {
        let chunk = &buf[..buf.len().min(MAX_PLAINTEXT_CHUNK)];
        match self.context.encrypt(chunk, &mut self.outbuf)? {
            Status::Done(n) => {
                self.io.write_all(&self.outbuf[..n])?;
                Ok(chunk.len())
            }
            Status::ConnectionClosed => Err(ChannelError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "channel closed by peer",
            ))),
            Status::NeedMoreInput | Status::RenegotiationRequired => {
                Err(ChannelError::Io(io::ErrorKind::WouldBlock.into()))
            }
        }
    }

    /// Send close-notify, release the context and hand back the transport
    pub fn shutdown(mut self) -> Result<S> {
        let n = self.context.close(&mut self.outbuf)?;
        self.io.write_all(&self.outbuf[..n])?;
        self.io.flush()?;
        self.context.release();
        Ok(self.io)
    }

    pub fn context(&self) -> &SecureContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut SecureContext {
        &mut self.context
    }

    /// Get reference to underlying transport
    pub fn get_ref(&self) -> &S {
        &self.io
    }

    /// Get mutable reference to underlying transport
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.io
    }
}

fn into_io(err: ChannelError) -> io::Error {
    match err {
        ChannelError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}

impl<S: Read + Write> Read for SecureStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.read_plaintext(buf).map_err(into_io)
    }
}

impl<S: Read + Write> Write for SecureStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.write_plaintext(buf).map_err(into_io)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.io.flush()
    }
}
