//! Peer certificate and cipher introspection
//!
//! Every accessor is a pure read that copies its result out of the engine,
//! so nothing returned here borrows from the session.

use super::config::ProtocolVersion;
use super::context::{HandshakeState, SecureContext};
use super::Result;
use openssl::nid::Nid;
use openssl::x509::{X509NameRef, X509Ref, X509VerifyResult, X509};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Negotiated cipher snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherDescriptor {
    /// Cipher name (e.g. "ECDHE-ECDSA-AES256-GCM-SHA384")
    pub name: String,
    /// Negotiated protocol version (e.g. "TLSv1.2")
    pub protocol: String,
    /// Effective key strength in bits
    pub strength_bits: i32,
    /// Key size of the bulk cipher algorithm in bits
    pub algorithm_bits: i32,
}

/// Certificate information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertInfo {
    /// Certificate subject (Common Name)
    pub subject: String,
    /// Certificate issuer (Common Name)
    pub issuer: String,
    /// Subject Alternative Names (DNS names and IP addresses)
    pub subject_alt_names: Vec<String>,
}

impl CertInfo {
    /// Extract certificate information from an X.509 certificate reference
    pub fn from_x509_ref(cert: &X509Ref) -> Self {
        CertInfo {
            subject: common_name(cert.subject_name()),
            issuer: common_name(cert.issuer_name()),
            subject_alt_names: subject_alt_names(cert),
        }
    }

    /// Extract certificate information from DER bytes
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let cert = X509::from_der(der)?;
        Ok(Self::from_x509_ref(&cert))
    }
}

fn common_name(name: &X509NameRef) -> String {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().to_string().ok())
        .unwrap_or_else(|| "<undef>".to_string())
}

fn subject_alt_names(cert: &X509Ref) -> Vec<String> {
    let Some(names) = cert.subject_alt_names() else {
        return Vec::new();
    };

    names
        .iter()
        .filter_map(|name| {
            if let Some(dns) = name.dnsname() {
                return Some(format!("DNS:{}", dns));
            }
            match name.ipaddress()? {
                ip if ip.len() == 4 => {
                    let octets: [u8; 4] = ip.try_into().ok()?;
                    Some(format!("IP:{}", Ipv4Addr::from(octets)))
                }
                ip if ip.len() == 16 => {
                    let octets: [u8; 16] = ip.try_into().ok()?;
                    Some(format!("IP:{}", Ipv6Addr::from(octets)))
                }
                _ => None,
            }
        })
        .collect()
}

impl SecureContext {
    /// DER encoding of the certificate the peer presented, if any
    pub fn peer_certificate(&self) -> Result<Option<Vec<u8>>> {
        match self.stream()?.ssl().peer_certificate() {
            Some(cert) => Ok(Some(cert.to_der()?)),
            None => Ok(None),
        }
    }

    /// DER encodings of the peer's certificate chain
    ///
    /// On a client the chain starts with the server's own certificate; on a
    /// server it holds only the intermediates the client sent.
    pub fn peer_certificate_chain(&self) -> Result<Vec<Vec<u8>>> {
        let Some(chain) = self.stream()?.ssl().peer_cert_chain() else {
            return Ok(Vec::new());
        };

        let mut ders = Vec::with_capacity(chain.len());
        for cert in chain {
            ders.push(cert.to_der()?);
        }
        Ok(ders)
    }

    /// Snapshot of the negotiated cipher
    pub fn cipher_descriptor(&self) -> Result<Option<CipherDescriptor>> {
        let ssl = self.stream()?.ssl();
        Ok(ssl.current_cipher().map(|cipher| {
            let bits = cipher.bits();
            CipherDescriptor {
                name: cipher.name().to_string(),
                protocol: ssl.version_str().to_string(),
                strength_bits: bits.secret,
                algorithm_bits: bits.algorithm,
            }
        }))
    }

    /// Negotiated protocol version, once the handshake is complete
    pub fn protocol_version(&self) -> Result<Option<ProtocolVersion>> {
        let ssl = self.stream()?.ssl();
        if self.state != HandshakeState::Complete {
            return Ok(None);
        }
        Ok(ssl.version2().and_then(ProtocolVersion::from_openssl_version))
    }

    /// Subject, issuer and alternative names of the peer certificate
    pub fn peer_certificate_info(&self) -> Result<Option<CertInfo>> {
        Ok(self
            .stream()?
            .ssl()
            .peer_certificate()
            .map(|cert| CertInfo::from_x509_ref(&cert)))
    }

    /// The engine's chain verification verdict for the peer certificate
    ///
    /// `None` when verification passed or never ran. The handshake is not
    /// failed on a bad verdict; acting on it is up to the caller.
    pub fn verify_result(&self) -> Result<Option<String>> {
        let result = self.stream()?.ssl().verify_result();
        if result == X509VerifyResult::OK {
            Ok(None)
        } else {
            Ok(Some(result.error_string().to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::config::ChannelConfig;
    use crate::tls::error::ChannelError;
    use crate::tls::identity::CertificateBinding;
    use openssl::x509::extension::SubjectAlternativeName;

    #[test]
    fn test_cert_info_from_der() {
        let binding = CertificateBinding::self_signed("example.com").unwrap();
        let der = binding.certificate().to_der().unwrap();
        let info = CertInfo::from_der(&der).unwrap();

        assert_eq!(info.subject, "example.com");
        assert_eq!(info.issuer, "example.com");
        assert!(info.subject_alt_names.contains(&"DNS:example.com".to_string()));
    }

    #[test]
    fn test_cert_info_from_bad_der() {
        assert!(CertInfo::from_der(b"\x30\x03junk").is_err());
    }

    #[test]
    fn test_ip_subject_alt_names() {
        let binding = CertificateBinding::self_signed("ip.test").unwrap();
        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        builder.set_subject_name(binding.certificate().subject_name()).unwrap();
        builder.set_issuer_name(binding.certificate().subject_name()).unwrap();
        builder.set_pubkey(binding.key()).unwrap();
        let san = SubjectAlternativeName::new()
            .ip("127.0.0.1")
            .ip("::1")
            .build(&builder.x509v3_context(None, None))
            .unwrap();
        builder.append_extension(san).unwrap();
        builder
            .sign(binding.key(), openssl::hash::MessageDigest::sha256())
            .unwrap();
        let cert = builder.build();

        let info = CertInfo::from_x509_ref(&cert);
        assert_eq!(
            info.subject_alt_names,
            vec!["IP:127.0.0.1".to_string(), "IP:::1".to_string()]
        );
    }

    #[test]
    fn test_accessors_before_handshake() {
        let context = ChannelConfig::client().build().unwrap().allocate().unwrap();

        assert_eq!(context.peer_certificate().unwrap(), None);
        assert!(context.peer_certificate_chain().unwrap().is_empty());
        assert_eq!(context.cipher_descriptor().unwrap(), None);
        assert_eq!(context.protocol_version().unwrap(), None);
        assert_eq!(context.peer_certificate_info().unwrap(), None);
    }

    #[test]
    fn test_accessors_after_release() {
        let mut context = ChannelConfig::client().build().unwrap().allocate().unwrap();
        context.release();

        assert!(matches!(context.peer_certificate(), Err(ChannelError::Released)));
        assert!(matches!(context.peer_certificate_chain(), Err(ChannelError::Released)));
        assert!(matches!(context.cipher_descriptor(), Err(ChannelError::Released)));
        assert!(matches!(context.verify_result(), Err(ChannelError::Released)));
    }
}
