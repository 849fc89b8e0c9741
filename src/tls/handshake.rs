//! Handshake driver
//!
//! `SecureContext::step` advances the handshake by one engine call. The
//! caller moves the produced bytes to the peer and calls `step` again with
//! whatever came back, until `done` is reported.

use super::context::{HandshakeState, SecureContext};
use super::error::ChannelError;
use super::status::{classify, describe, Signal};
use super::Result;
use log::{debug, trace};

/// Result of one handshake step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    /// The engine reports the connection as established
    pub done: bool,
    /// Bytes written to the output buffer; the caller must transmit them
    pub written: usize,
}

impl SecureContext {
    /// Advance the handshake
    ///
    /// `inbound` holds bytes received from the peer since the last call
    /// (empty on the first client step). Bytes the engine wants sent are
    /// written to the start of `output`; if they do not fit, nothing is
    /// written and `TransportCapacity` is returned.
    ///
    /// Only a want-read return is a continuation. Any other engine failure
    /// marks the context `Failed`; alerts the engine queued for the peer
    /// stay available through `drain_outbound`.
    pub fn step(&mut self, inbound: &[u8], output: &mut [u8]) -> Result<Handshake> {
        self.stream()?;
        if self.state == HandshakeState::Failed {
            return Err(ChannelError::InvalidState("handshake already failed"));
        }

        self.feed(inbound)?;
        if self.state == HandshakeState::NotStarted {
            self.state = HandshakeState::InProgress;
        }

        if let Err(e) = self.stream_mut()?.do_handshake() {
            match classify(&e) {
                Signal::NeedMoreInput => {}
                Signal::ZeroReturn | Signal::Fatal(_) => {
                    self.state = HandshakeState::Failed;
                    let failure = describe(&e);
                    debug!("{:?} handshake failed: {}", self.role, failure);
                    return Err(ChannelError::Handshake(failure));
                }
            }
        }

        // The client's final flight (its Finished under TLS 1.3) is drained
        // here as well, so success never strands bytes in the buffer.
        let written = self.drain_pending(output)?;

        // Completion comes from the connection state, not the return code:
        // a server only learns the peer's last message through it.
        let ssl = self.stream()?.ssl();
        let done = ssl.is_init_finished();
        trace!(
            "{:?} step: {} bytes in, {} bytes out, done={}",
            self.role,
            inbound.len(),
            written,
            done
        );

        if done && self.state != HandshakeState::Complete {
            debug!(
                "{:?} handshake complete: {} {}",
                self.role,
                ssl.version_str(),
                ssl.current_cipher().map(|c| c.name()).unwrap_or("<undef>")
            );
            self.state = HandshakeState::Complete;
        }

        Ok(Handshake { done, written })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::config::{ChannelConfig, ProtocolVersion};
    use crate::tls::identity::CertificateBinding;

    const BUF: usize = 64 * 1024;

    fn pair(version: ProtocolVersion) -> (SecureContext, SecureContext) {
        let binding = CertificateBinding::self_signed("example.com").unwrap();
        let client = ChannelConfig::client()
            .version(version)
            .build()
            .unwrap()
            .allocate()
            .unwrap();
        let server = ChannelConfig::server()
            .version(version)
            .certificate(binding)
            .build()
            .unwrap()
            .allocate()
            .unwrap();
        (client, server)
    }

    #[test]
    fn test_first_client_step_emits_hello() {
        let (mut client, _server) = pair(ProtocolVersion::Tls12);
        let mut out = vec![0u8; BUF];

        let progress = client.step(&[], &mut out).unwrap();
        assert!(!progress.done);
        assert!(progress.written > 0);
        // Handshake record content type
        assert_eq!(out[0], 0x16);
        assert_eq!(client.state(), HandshakeState::InProgress);
    }

    #[test]
    fn test_server_waits_for_input() {
        let (_client, mut server) = pair(ProtocolVersion::Tls12);
        let mut out = vec![0u8; BUF];

        let progress = server.step(&[], &mut out).unwrap();
        assert_eq!(progress, Handshake { done: false, written: 0 });
        assert_eq!(server.state(), HandshakeState::InProgress);
    }

    #[test]
    fn test_small_output_is_capacity_error() {
        let (mut client, mut server) = pair(ProtocolVersion::Tls12);
        let mut out = vec![0u8; BUF];
        let hello = client.step(&[], &mut out).unwrap();

        let mut tiny = [0u8; 8];
        let err = server.step(&out[..hello.written], &mut tiny).unwrap_err();
        assert!(matches!(err, ChannelError::TransportCapacity { capacity: 8, .. }));
        assert_eq!(tiny, [0u8; 8]);

        // The flight stays queued
        assert!(server.pending_outbound().unwrap() > 8);
    }

    #[test]
    fn test_garbage_fails_and_is_terminal() {
        let (_client, mut server) = pair(ProtocolVersion::Tls12);
        let mut out = vec![0u8; BUF];

        let err = server.step(b"this is not a tls record at all", &mut out).unwrap_err();
        assert!(matches!(err, ChannelError::Handshake(_)));
        assert_eq!(server.state(), HandshakeState::Failed);

        let err = server.step(&[], &mut out).unwrap_err();
        assert!(matches!(err, ChannelError::InvalidState(_)));
    }

    #[test]
    fn test_step_after_release() {
        let (mut client, _server) = pair(ProtocolVersion::Tls12);
        client.release();

        let mut out = vec![0u8; BUF];
        assert!(matches!(client.step(&[], &mut out), Err(ChannelError::Released)));
    }
}
