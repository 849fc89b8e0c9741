//! sslchannel - TLS secure channel over in-memory transport buffers
//!
//! This crate drives a TLS handshake and protects application data without
//! ever touching a socket. Callers hand in the bytes they received and get
//! back the bytes they must transmit.

pub mod tls;
