//! Record codec
//!
//! Once the handshake is complete, `encrypt` turns application bytes into
//! ciphertext records and `decrypt` turns received records back into
//! application bytes. Flow-control outcomes come back as `Status` values.

use super::config::RenegotiationPolicy;
use super::context::{HandshakeState, SecureContext};
use super::error::{ChannelError, EngineFailure, FailureCategory};
use super::status::{classify, Signal, Status};
use super::Result;
use log::{debug, trace, warn};
use openssl::ssl::{ErrorCode, SslVersion};

/// Extra outbound room granted each time one write fills the region
const OUTBOUND_GROWTH: usize = 64 * 1024;

impl SecureContext {
    fn require_complete(&self) -> Result<()> {
        self.stream()?;
        if self.state != HandshakeState::Complete {
            return Err(ChannelError::InvalidState("handshake not complete"));
        }
        Ok(())
    }

    /// Encrypt `plaintext` into `output`
    ///
    /// The engine always takes the whole plaintext; the outbound region grows
    /// for the duration of the call when one write spans more records than it
    /// holds. All produced ciphertext is then written to `output` or none of
    /// it is: when it does not fit, `TransportCapacity` is returned and the
    /// complete records stay queued for `drain_outbound`.
    pub fn encrypt(&mut self, plaintext: &[u8], output: &mut [u8]) -> Result<Status> {
        self.require_complete()?;
        if plaintext.is_empty() {
            return Ok(Status::Done(0));
        }

        let stream = self.stream_mut()?;
        let result = loop {
            match stream.ssl_write(plaintext) {
                // Outbound region full; the retry must pass the same buffer
                Err(e) if e.code() == ErrorCode::WANT_WRITE => {
                    stream.get_mut().raise_outbound_limit(OUTBOUND_GROWTH);
                }
                other => break other,
            }
        };
        stream.get_mut().reset_outbound_limit();

        match result {
            Ok(n) if n == plaintext.len() => {
                let written = self.drain_pending(output)?;
                trace!("{:?} encrypt: {} -> {} bytes", self.role, n, written);
                Ok(Status::Done(written))
            }
            Ok(n) => Err(ChannelError::Encrypt(EngineFailure {
                category: FailureCategory::Other,
                code: 0,
                message: format!("short write: {} of {} bytes accepted", n, plaintext.len()),
            })),
            Err(e) => match classify(&e) {
                Signal::ZeroReturn => Ok(Status::ConnectionClosed),
                Signal::NeedMoreInput => Ok(Status::NeedMoreInput),
                Signal::Fatal(failure) => Err(ChannelError::Encrypt(failure)),
            },
        }
    }

    /// Feed `ciphertext` and decrypt into `output`
    ///
    /// Reads until `output` is full or the engine has no complete record
    /// left. An empty `output` only feeds the ciphertext. A failure hit after
    /// some plaintext was produced is reported by the next call, so the
    /// plaintext is returned first.
    pub fn decrypt(&mut self, ciphertext: &[u8], output: &mut [u8]) -> Result<Status> {
        self.require_complete()?;
        if let Some(failure) = self.deferred_failure.take() {
            return Err(ChannelError::Decrypt(failure));
        }
        self.feed(ciphertext)?;
        if output.is_empty() {
            return Ok(Status::Done(0));
        }

        let mut total = 0;
        while total < output.len() {
            match self.stream_mut()?.ssl_read(&mut output[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) => match classify(&e) {
                    Signal::Fatal(failure) if total > 0 => {
                        debug!("{:?} decrypt failed after {} bytes: {}", self.role, total, failure);
                        self.deferred_failure = Some(failure);
                        break;
                    }
                    Signal::Fatal(failure) => return Err(ChannelError::Decrypt(failure)),
                    _ if total > 0 => break,
                    Signal::ZeroReturn => {
                        debug!("{:?} peer closed the channel", self.role);
                        return Ok(Status::ConnectionClosed);
                    }
                    Signal::NeedMoreInput => return self.want_read_status(),
                },
            }
        }

        trace!("{:?} decrypt: {} -> {} bytes", self.role, ciphertext.len(), total);
        Ok(Status::Done(total))
    }

    /// Emit a close-notify alert into `output`
    ///
    /// The peer's `decrypt` then reports `ConnectionClosed`. Returns the
    /// number of bytes to transmit.
    pub fn close(&mut self, output: &mut [u8]) -> Result<usize> {
        if let Err(e) = self.stream_mut()?.shutdown() {
            if let Signal::Fatal(failure) = classify(&e) {
                return Err(ChannelError::Encrypt(failure));
            }
        }
        self.drain_pending(output)
    }

    /// Whether the peer has started a renegotiation
    ///
    /// Only sessions below TLS 1.3 can renegotiate; there the engine drops
    /// back into its handshake state once a renegotiation begins.
    pub fn renegotiation_pending(&self) -> Result<bool> {
        let ssl = self.stream()?.ssl();
        let legacy = ssl.version2().map_or(false, |v| v != SslVersion::TLS1_3);
        Ok(self.state == HandshakeState::Complete && legacy && !ssl.is_init_finished())
    }

    /// Apply the renegotiation policy to a want-read return
    ///
    /// A refusal discards whatever the engine already queued in answer to
    /// the peer, so no renegotiation handshake bytes reach the caller.
    fn want_read_status(&mut self) -> Result<Status> {
        if !self.renegotiation_pending()? {
            return Ok(Status::NeedMoreInput);
        }

        match self.renegotiation {
            RenegotiationPolicy::Signal => {
                debug!("{:?} peer requested renegotiation", self.role);
                Ok(Status::RenegotiationRequired)
            }
            RenegotiationPolicy::Refuse => {
                let dropped = self.stream_mut()?.get_mut().discard_outbound();
                warn!(
                    "{:?} refusing peer-initiated renegotiation ({} queued bytes dropped)",
                    self.role, dropped
                );
                Err(ChannelError::Decrypt(EngineFailure {
                    category: FailureCategory::Protocol,
                    code: 0,
                    message: "peer-initiated renegotiation refused".to_string(),
                }))
            }
        }
    }
}
