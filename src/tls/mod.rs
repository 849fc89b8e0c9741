//! TLS secure channel engine
//!
//! This module drives an OpenSSL session over a pair of in-memory transport
//! buffers. The caller owns the real transport (socket, pipe, test harness)
//! and moves ciphertext between the peer and the engine.
//!
//! # Architecture
//!
//! 1. `ChannelConfig` defines the channel settings (versions, certificate, role)
//! 2. `SecureContext` owns one engine session and its `TransportBuffers`
//! 3. `SecureContext::step` advances the handshake one flight at a time
//! 4. `SecureContext::encrypt` / `SecureContext::decrypt` protect application data
//! 5. Engine return codes are translated into `Status` values or a `ChannelError`
//!
//! Benign flow-control outcomes (`NeedMoreInput`, `ConnectionClosed`,
//! `RenegotiationRequired`) are returned as values, so callers can loop on
//! them without treating them as errors.
//!
//! # Examples
//!
//! ## In-memory handshake
//!
//! ```no_run
//! use sslchannel::tls::{ChannelConfig, CertificateBinding, VersionSet, ProtocolVersion};
//!
//! let identity = CertificateBinding::self_signed("example.com").unwrap();
//!
//! let mut client = ChannelConfig::client()
//!     .version(ProtocolVersion::Tls12)
//!     .build()
//!     .unwrap()
//!     .allocate()
//!     .unwrap();
//!
//! let mut server = ChannelConfig::server()
//!     .versions(VersionSet::from_str_list("TLSv1.2,TLSv1.3").unwrap())
//!     .certificate(identity)
//!     .build()
//!     .unwrap()
//!     .allocate()
//!     .unwrap();
//!
//! let mut to_server = vec![0u8; 32 * 1024];
//! let mut to_client = vec![0u8; 32 * 1024];
//!
//! let hello = client.step(&[], &mut to_server).unwrap();
//! let flight = server.step(&to_server[..hello.written], &mut to_client).unwrap();
//! // ... keep alternating until both sides report `done`
//! # let _ = flight;
//! ```
//!
//! ## Blocking stream
//!
//! ```no_run
//! use sslchannel::tls::{ChannelConfig, SecureStream};
//! use std::io::{Read, Write};
//! use std::net::TcpStream;
//!
//! let context = ChannelConfig::client().build().unwrap().allocate().unwrap();
//! let tcp_stream = TcpStream::connect("example.com:443").unwrap();
//! let mut stream = SecureStream::connect(context, tcp_stream).unwrap();
//!
//! stream.write_all(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n").unwrap();
//! let mut buf = [0u8; 1024];
//! let n = stream.read(&mut buf).unwrap();
//! # let _ = n;
//! ```

pub mod cert;
pub mod config;
pub mod context;
pub mod error;
pub mod handshake;
pub mod identity;
pub mod record;
pub mod status;
pub mod stream;
pub mod transport;

pub use cert::{CertInfo, CipherDescriptor};
pub use config::{
    allocate, ChannelConfig, ChannelConfigBuilder, NegotiationMethod, ProtocolVersion,
    RenegotiationPolicy, Role, VersionSet,
};
pub use context::{HandshakeState, SecureContext};
pub use error::{ChannelError, ConfigStep, EngineFailure, FailureCategory};
pub use handshake::Handshake;
pub use identity::CertificateBinding;
pub use status::Status;
pub use stream::SecureStream;
pub use transport::TransportBuffers;

/// Result type for channel operations
pub type Result<T> = std::result::Result<T, ChannelError>;

/// Default capacity of each transport buffer, in bytes
pub const DEFAULT_BUFFER_CAPACITY: usize = 256 * 1024;
