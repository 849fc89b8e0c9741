//! Certificate loading integration tests
//!
//! Bindings are written to disk as PEM bundles and loaded back through the
//! configuration builder.

use sslchannel::tls::{
    allocate, CertificateBinding, ChannelConfig, ChannelError, ProtocolVersion, Role, VersionSet,
};
use std::io::Write;
use tempfile::NamedTempFile;

fn bundle_on_disk(binding: &CertificateBinding) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&binding.to_pem().unwrap()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_server_from_pem_file_handshakes() {
    let _ = env_logger::try_init();
    let binding = CertificateBinding::self_signed("file.test").unwrap();
    let file = bundle_on_disk(&binding);

    let mut server = ChannelConfig::server()
        .version(ProtocolVersion::Tls12)
        .certificate_file(file.path())
        .unwrap()
        .build()
        .unwrap()
        .allocate()
        .unwrap();
    let mut client = allocate(
        VersionSet::only(ProtocolVersion::Tls12),
        None,
        Role::Client,
        false,
    )
    .unwrap();

    let mut buf = vec![0u8; 64 * 1024];
    let mut for_server = Vec::new();
    let mut for_client = Vec::new();
    for _ in 0..5 {
        if !client.is_handshake_complete() {
            let progress = client.step(&for_client, &mut buf).unwrap();
            for_client.clear();
            for_server.extend_from_slice(&buf[..progress.written]);
        }
        if !server.is_handshake_complete() {
            let progress = server.step(&for_server, &mut buf).unwrap();
            for_server.clear();
            for_client.extend_from_slice(&buf[..progress.written]);
        }
        if client.is_handshake_complete() && server.is_handshake_complete() {
            break;
        }
    }
    assert!(client.is_handshake_complete());

    let info = client.peer_certificate_info().unwrap().unwrap();
    assert_eq!(info.subject, "file.test");
    assert!(info.subject_alt_names.contains(&"DNS:file.test".to_string()));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ChannelConfig::server()
        .certificate_file(dir.path().join("absent.pem"))
        .err()
        .unwrap();
    assert!(matches!(err, ChannelError::Io(_)));
}

#[test]
fn test_garbage_file_is_certificate_error() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"not a pem document").unwrap();
    file.flush().unwrap();

    let err = CertificateBinding::from_pem_file(file.path()).unwrap_err();
    assert!(matches!(err, ChannelError::Certificate(_)));
}

#[test]
fn test_certificate_without_key_is_certificate_error() {
    let binding = CertificateBinding::self_signed("nokey.test").unwrap();
    let cert_only = binding.certificate().to_pem().unwrap();

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&cert_only).unwrap();
    file.flush().unwrap();

    let err = CertificateBinding::from_pem_file(file.path()).unwrap_err();
    assert!(matches!(err, ChannelError::Certificate(_)));
}

#[test]
fn test_bundle_from_two_identities_is_rejected() {
    let first = CertificateBinding::self_signed("first.test").unwrap();
    let second = CertificateBinding::self_signed("second.test").unwrap();

    let mut pem = first.certificate().to_pem().unwrap();
    pem.extend_from_slice(&second.key().private_key_to_pem_pkcs8().unwrap());
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&pem).unwrap();
    file.flush().unwrap();

    let err = ChannelConfig::server()
        .certificate_file(file.path())
        .unwrap()
        .build()
        .unwrap_err();
    assert!(err.is_configuration());
}
