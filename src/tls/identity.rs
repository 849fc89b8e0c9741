//! Certificate and private key material
//!
//! A `CertificateBinding` is the (certificate, private key) pair attached to
//! a context. Whether the two belong together is checked by the channel
//! factory when the pair is bound, not here.

use super::error::ChannelError;
use super::Result;
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, PKeyRef, Private};
use openssl::x509::extension::SubjectAlternativeName;
use openssl::x509::{X509NameBuilder, X509Ref, X509};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Validity of generated self-signed certificates
const SELF_SIGNED_DAYS: u32 = 365;

/// Certificate and private key bound to a context
#[derive(Clone)]
pub struct CertificateBinding {
    certificate: X509,
    key: PKey<Private>,
}

impl CertificateBinding {
    /// Pair an already loaded certificate with its private key
    pub fn new(certificate: X509, key: PKey<Private>) -> Self {
        CertificateBinding { certificate, key }
    }

    /// Load certificate and private key from a single PEM bundle
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        Self::from_pem_parts(pem, pem)
    }

    /// Load certificate and private key from separate PEM documents
    pub fn from_pem_parts(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self> {
        let certificate = X509::from_pem(cert_pem)
            .map_err(|e| ChannelError::Certificate(format!("Failed to load certificate: {}", e)))?;

        let key = PKey::private_key_from_pem(key_pem)
            .map_err(|e| ChannelError::Certificate(format!("Failed to load private key: {}", e)))?;

        Ok(CertificateBinding { certificate, key })
    }

    /// Load certificate and private key from a PEM bundle on disk
    pub fn from_pem_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut pem = Vec::new();
        File::open(path.as_ref())?.read_to_end(&mut pem)?;
        Self::from_pem(&pem)
    }

    /// Generate a fresh self-signed P-256 certificate for `common_name`
    ///
    /// The name is also written as a DNS subject alternative name.
    pub fn self_signed(common_name: &str) -> Result<Self> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?;
        let key = PKey::from_ec_key(EcKey::generate(&group)?)?;

        let mut name = X509NameBuilder::new()?;
        name.append_entry_by_nid(Nid::COMMONNAME, common_name)?;
        let name = name.build();

        let serial = {
            let mut bn = BigNum::new()?;
            bn.rand(127, MsbOption::MAYBE_ZERO, false)?;
            bn.to_asn1_integer()?
        };

        let mut builder = X509::builder()?;
        builder.set_version(2)?;
        builder.set_serial_number(&serial)?;
        builder.set_subject_name(&name)?;
        builder.set_issuer_name(&name)?;
        builder.set_pubkey(&key)?;
        let not_before = Asn1Time::days_from_now(0)?;
        let not_after = Asn1Time::days_from_now(SELF_SIGNED_DAYS)?;
        builder.set_not_before(&not_before)?;
        builder.set_not_after(&not_after)?;

        let san = SubjectAlternativeName::new()
            .dns(common_name)
            .build(&builder.x509v3_context(None, None))?;
        builder.append_extension(san)?;
        builder.sign(&key, MessageDigest::sha256())?;

        Ok(CertificateBinding {
            certificate: builder.build(),
            key,
        })
    }

    /// The certificate
    pub fn certificate(&self) -> &X509Ref {
        &self.certificate
    }

    /// The private key
    pub fn key(&self) -> &PKeyRef<Private> {
        &self.key
    }

    /// Encode as a PEM bundle (certificate followed by PKCS#8 key)
    pub fn to_pem(&self) -> Result<Vec<u8>> {
        let mut pem = self.certificate.to_pem()?;
        pem.extend_from_slice(&self.key.private_key_to_pem_pkcs8()?);
        Ok(pem)
    }
}

impl fmt::Debug for CertificateBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subject = self
            .certificate
            .subject_name()
            .entries_by_nid(Nid::COMMONNAME)
            .next()
            .and_then(|entry| entry.data().to_string().ok());

        f.debug_struct("CertificateBinding")
            .field("subject", &subject)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::cert::CertInfo;

    #[test]
    fn test_self_signed_names() {
        let binding = CertificateBinding::self_signed("example.com").unwrap();
        let info = CertInfo::from_x509_ref(binding.certificate());

        assert_eq!(info.subject, "example.com");
        assert_eq!(info.issuer, "example.com"); // Self-signed
        assert_eq!(info.subject_alt_names, vec!["DNS:example.com".to_string()]);
    }

    #[test]
    fn test_self_signed_key_matches() {
        let binding = CertificateBinding::self_signed("example.com").unwrap();
        let public = binding.certificate().public_key().unwrap();
        assert!(binding.key().public_eq(&public));
    }

    #[test]
    fn test_pem_bundle_reload() {
        let binding = CertificateBinding::self_signed("reload.test").unwrap();
        let pem = binding.to_pem().unwrap();

        let reloaded = CertificateBinding::from_pem(&pem).unwrap();
        assert_eq!(
            reloaded.certificate().to_der().unwrap(),
            binding.certificate().to_der().unwrap()
        );
        assert!(reloaded.key().public_eq(binding.key()));
    }

    #[test]
    fn test_debug_shows_subject_only() {
        let binding = CertificateBinding::self_signed("debug.test").unwrap();
        let text = format!("{:?}", binding);
        assert!(text.contains("\"debug.test\""));
        assert!(!text.contains("PRIVATE KEY"));
    }

    #[test]
    fn test_from_pem_rejects_garbage() {
        let err = CertificateBinding::from_pem(b"not a pem").unwrap_err();
        assert!(matches!(err, ChannelError::Certificate(_)));
    }

    #[test]
    fn test_from_pem_file_missing() {
        let err = CertificateBinding::from_pem_file("/nonexistent/bundle.pem").unwrap_err();
        assert!(matches!(err, ChannelError::Io(_)));
    }
}
