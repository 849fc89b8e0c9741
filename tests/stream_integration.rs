//! Blocking stream integration tests
//!
//! A `SecureStream` pair talks over a real loopback `TcpStream`, the server
//! side running on its own thread.

use sslchannel::tls::{
    CertificateBinding, ChannelConfig, ChannelError, ProtocolVersion, SecureContext, SecureStream,
};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

fn server_context(version: ProtocolVersion, require_remote_certificate: bool) -> SecureContext {
    ChannelConfig::server()
        .version(version)
        .certificate(CertificateBinding::self_signed("stream.test").unwrap())
        .require_remote_certificate(require_remote_certificate)
        .build()
        .unwrap()
        .allocate()
        .unwrap()
}

/// Accept one connection, read `len` bytes and send them back
fn spawn_echo_server(context: SecureContext, len: usize) -> (u16, thread::JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let (tcp_stream, _) = listener.accept().unwrap();
        let mut stream = SecureStream::accept(context, tcp_stream).unwrap();

        let mut data = vec![0u8; len];
        stream.read_exact(&mut data).unwrap();
        stream.write_all(&data).unwrap();
        stream.flush().unwrap();

        let peer = stream.context().peer_certificate().unwrap().unwrap_or_default();
        stream.shutdown().unwrap();
        peer
    });

    (port, handle)
}

#[test]
fn test_echo_tls13() {
    let _ = env_logger::try_init();
    let (port, server) = spawn_echo_server(server_context(ProtocolVersion::Tls13, false), 5);

    let client = ChannelConfig::client()
        .version(ProtocolVersion::Tls13)
        .build()
        .unwrap()
        .allocate()
        .unwrap();
    let tcp_stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    let mut stream = SecureStream::connect(client, tcp_stream).unwrap();
    assert_eq!(
        stream.context().protocol_version().unwrap(),
        Some(ProtocolVersion::Tls13)
    );

    stream.write_all(b"Hello").unwrap();
    let mut echo = [0u8; 5];
    stream.read_exact(&mut echo).unwrap();
    assert_eq!(&echo, b"Hello");

    server.join().unwrap();
}

#[test]
fn test_large_echo_spans_many_records() {
    let _ = env_logger::try_init();
    let len = 512 * 1024;
    let (port, server) = spawn_echo_server(server_context(ProtocolVersion::Tls12, false), len);

    let client = ChannelConfig::client()
        .version(ProtocolVersion::Tls12)
        .build()
        .unwrap()
        .allocate()
        .unwrap();
    let tcp_stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    let mut stream = SecureStream::connect(client, tcp_stream).unwrap();

    let payload: Vec<u8> = (0..len).map(|i| (i % 253) as u8).collect();
    stream.write_all(&payload).unwrap();

    let mut echo = vec![0u8; len];
    stream.read_exact(&mut echo).unwrap();
    assert_eq!(echo, payload);

    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).unwrap();
    assert!(rest.is_empty());

    server.join().unwrap();
}

#[test]
fn test_client_certificate_over_tcp() {
    let (port, server) = spawn_echo_server(server_context(ProtocolVersion::Tls12, true), 4);

    let identity = CertificateBinding::self_signed("client.stream.test").unwrap();
    let expected = identity.certificate().to_der().unwrap();
    let client = ChannelConfig::client()
        .version(ProtocolVersion::Tls12)
        .certificate(identity)
        .build()
        .unwrap()
        .allocate()
        .unwrap();
    let tcp_stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    let mut stream = SecureStream::connect(client, tcp_stream).unwrap();

    stream.write_all(b"ping").unwrap();
    let mut echo = [0u8; 4];
    stream.read_exact(&mut echo).unwrap();

    assert_eq!(server.join().unwrap(), expected);
}

#[test]
fn test_peer_hangup_during_handshake() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (tcp_stream, _) = listener.accept().unwrap();
        drop(tcp_stream);
    });

    let client = ChannelConfig::client().build().unwrap().allocate().unwrap();
    let tcp_stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    let err = SecureStream::connect(client, tcp_stream).err().unwrap();
    assert!(matches!(err, ChannelError::Io(_)));

    server.join().unwrap();
}
