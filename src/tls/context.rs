//! Secure context lifecycle
//!
//! A `SecureContext` owns one engine session together with the transport
//! buffers it reads from and writes to. It is created by the channel
//! factory, mutated only by `step`, `encrypt`, `decrypt` and `close`, and
//! released exactly once.

use super::config::{ChannelConfig, RenegotiationPolicy, Role};
use super::error::{ChannelError, ConfigStep, EngineFailure};
use super::transport::TransportBuffers;
use super::Result;
use log::{debug, error};
use openssl::ssl::{ShutdownState, Ssl, SslStream};
use std::fmt;

/// Handshake progress of a context
///
/// Moves forward only; `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    NotStarted,
    InProgress,
    Complete,
    Failed,
}

/// One TLS session bound to a pair of in-memory transport buffers
///
/// Every operation takes `&mut self`; the engine session is not reentrant.
pub struct SecureContext {
    pub(crate) stream: Option<SslStream<TransportBuffers>>,
    pub(crate) role: Role,
    pub(crate) state: HandshakeState,
    pub(crate) renegotiation: RenegotiationPolicy,
    /// Decrypt failure held back while earlier plaintext is returned
    pub(crate) deferred_failure: Option<EngineFailure>,
    require_remote_certificate: bool,
    quiet_shutdown: bool,
}

impl SecureContext {
    pub(crate) fn new(config: &ChannelConfig) -> Result<Self> {
        let mut ssl = Ssl::new(&config.ctx).map_err(|e| {
            ChannelError::configuration(
                ConfigStep::CreateSession,
                format!("Failed to create SSL object from SSL context: {}", e),
            )
        })?;

        match config.role {
            Role::Client => ssl.set_connect_state(),
            Role::Server => ssl.set_accept_state(),
        }

        let buffers = TransportBuffers::new(config.buffer_capacity);
        let stream = SslStream::new(ssl, buffers).map_err(|e| {
            ChannelError::configuration(
                ConfigStep::CreateSession,
                format!("Failed to attach transport buffers: {}", e),
            )
        })?;

        debug!("Allocated {:?} context ({:?})", config.role, config.method);

        Ok(SecureContext {
            stream: Some(stream),
            role: config.role,
            state: HandshakeState::NotStarted,
            renegotiation: config.renegotiation,
            deferred_failure: None,
            require_remote_certificate: config.require_remote_certificate,
            quiet_shutdown: config.quiet_shutdown,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_handshake_complete(&self) -> bool {
        self.state == HandshakeState::Complete
    }

    pub fn is_released(&self) -> bool {
        self.stream.is_none()
    }

    /// Whether the peer was asked for a certificate
    ///
    /// Acting on a missing certificate is up to the caller.
    pub fn require_remote_certificate(&self) -> bool {
        self.require_remote_certificate
    }

    pub(crate) fn stream(&self) -> Result<&SslStream<TransportBuffers>> {
        self.stream.as_ref().ok_or(ChannelError::Released)
    }

    pub(crate) fn stream_mut(&mut self) -> Result<&mut SslStream<TransportBuffers>> {
        self.stream.as_mut().ok_or(ChannelError::Released)
    }

    /// Append received ciphertext to the inbound buffer; a short accept is fatal
    pub(crate) fn feed(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }

        let accepted = self.stream_mut()?.get_mut().feed(bytes);
        if accepted != bytes.len() {
            return Err(ChannelError::BufferContract {
                accepted,
                offered: bytes.len(),
            });
        }
        Ok(())
    }

    /// Move every pending outbound byte into `output`, or nothing at all
    pub(crate) fn drain_pending(&mut self, output: &mut [u8]) -> Result<usize> {
        let buffers = self.stream_mut()?.get_mut();
        let pending = buffers.pending_outbound();
        if pending == 0 {
            return Ok(0);
        }
        if pending > output.len() {
            return Err(ChannelError::TransportCapacity {
                needed: pending,
                capacity: output.len(),
            });
        }

        let drained = buffers.drain_outbound(&mut output[..pending]);
        if drained != pending {
            return Err(ChannelError::BufferContract {
                accepted: drained,
                offered: pending,
            });
        }
        Ok(drained)
    }

    /// Ciphertext produced by the engine and not yet handed to the caller
    pub fn pending_outbound(&self) -> Result<usize> {
        Ok(self.stream()?.get_ref().pending_outbound())
    }

    /// Collect queued ciphertext in pieces
    ///
    /// Used after a `TransportCapacity` error, which leaves the produced
    /// records queued instead of emitting a partial result.
    pub fn drain_outbound(&mut self, output: &mut [u8]) -> Result<usize> {
        Ok(self.stream_mut()?.get_mut().drain_outbound(output))
    }

    /// Shut the session down and free it
    ///
    /// The shutdown is best effort: its outcome is logged, never returned.
    /// With quiet shutdown no close-notify alert is produced. Releasing an
    /// already released context is a usage fault.
    pub fn release(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            debug_assert!(false, "SecureContext released twice");
            error!("release called on an already released {:?} context", self.role);
            return;
        };

        if self.quiet_shutdown {
            stream.set_shutdown(ShutdownState::SENT | ShutdownState::RECEIVED);
        }

        match stream.shutdown() {
            Ok(result) => debug!("Released {:?} context ({:?})", self.role, result),
            Err(e) => debug!("Released {:?} context, shutdown failed: {}", self.role, e),
        }
    }
}

impl Drop for SecureContext {
    fn drop(&mut self) {
        if self.stream.is_some() {
            self.release();
        }
    }
}

impl fmt::Debug for SecureContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureContext")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("released", &self.is_released())
            .finish()
    }
}
