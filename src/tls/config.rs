//! Channel configuration
//!
//! This module is the channel factory: it turns a protocol-version set, an
//! optional certificate binding and a role into a configured engine context,
//! from which per-connection `SecureContext`s are allocated.

use super::context::SecureContext;
use super::error::{ChannelError, ConfigStep};
use super::identity::CertificateBinding;
use super::{Result, DEFAULT_BUFFER_CAPACITY};
use log::debug;
use openssl::ssl::{SslContext, SslContextBuilder, SslMethod, SslOptions, SslVerifyMode, SslVersion};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolVersion {
    /// SSL 2.0 (never negotiated by the engine)
    Ssl2,
    /// SSL 3.0 (deprecated, rarely compiled in)
    Ssl3,
    /// TLS 1.0
    Tls10,
    /// TLS 1.1
    Tls11,
    /// TLS 1.2
    Tls12,
    /// TLS 1.3
    Tls13,
}

impl ProtocolVersion {
    /// Every version, oldest first
    pub const ALL: [ProtocolVersion; 6] = [
        ProtocolVersion::Ssl2,
        ProtocolVersion::Ssl3,
        ProtocolVersion::Tls10,
        ProtocolVersion::Tls11,
        ProtocolVersion::Tls12,
        ProtocolVersion::Tls13,
    ];

    fn bit(self) -> u8 {
        1 << (self as u8)
    }

    /// Get version as string
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::Ssl2 => "SSLv2",
            ProtocolVersion::Ssl3 => "SSLv3",
            ProtocolVersion::Tls10 => "TLSv1.0",
            ProtocolVersion::Tls11 => "TLSv1.1",
            ProtocolVersion::Tls12 => "TLSv1.2",
            ProtocolVersion::Tls13 => "TLSv1.3",
        }
    }

    /// Engine protocol version constant (the engine has none for SSLv2)
    pub(crate) fn to_openssl_version(self) -> Option<SslVersion> {
        match self {
            ProtocolVersion::Ssl2 => None,
            ProtocolVersion::Ssl3 => Some(SslVersion::SSL3),
            ProtocolVersion::Tls10 => Some(SslVersion::TLS1),
            ProtocolVersion::Tls11 => Some(SslVersion::TLS1_1),
            ProtocolVersion::Tls12 => Some(SslVersion::TLS1_2),
            ProtocolVersion::Tls13 => Some(SslVersion::TLS1_3),
        }
    }

    pub(crate) fn from_openssl_version(version: SslVersion) -> Option<Self> {
        ProtocolVersion::ALL
            .into_iter()
            .find(|v| v.to_openssl_version() == Some(version))
    }

    /// Engine option that disables this version
    fn disable_option(self) -> SslOptions {
        match self {
            ProtocolVersion::Ssl2 => SslOptions::empty(),
            ProtocolVersion::Ssl3 => SslOptions::NO_SSLV3,
            ProtocolVersion::Tls10 => SslOptions::NO_TLSV1,
            ProtocolVersion::Tls11 => SslOptions::NO_TLSV1_1,
            ProtocolVersion::Tls12 => SslOptions::NO_TLSV1_2,
            ProtocolVersion::Tls13 => SslOptions::NO_TLSV1_3,
        }
    }
}

impl FromStr for ProtocolVersion {
    type Err = ChannelError;

    /// Parse protocol version from string (case-insensitive)
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "SSLV2" | "SSL2" => Ok(ProtocolVersion::Ssl2),
            "SSLV3" | "SSL3" => Ok(ProtocolVersion::Ssl3),
            "TLSV1.0" | "TLS1.0" | "TLSV1" | "TLS1" => Ok(ProtocolVersion::Tls10),
            "TLSV1.1" | "TLS1.1" => Ok(ProtocolVersion::Tls11),
            "TLSV1.2" | "TLS1.2" => Ok(ProtocolVersion::Tls12),
            "TLSV1.3" | "TLS1.3" => Ok(ProtocolVersion::Tls13),
            _ => Err(ChannelError::configuration(
                ConfigStep::SelectVersions,
                format!("unknown protocol version: {}", s),
            )),
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of enabled protocol versions
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VersionSet(u8);

impl VersionSet {
    /// No version enabled
    pub const fn empty() -> Self {
        VersionSet(0)
    }

    /// Every version the engine knows about
    pub fn all() -> Self {
        ProtocolVersion::ALL.into_iter().collect()
    }

    /// Exactly one version
    pub fn only(version: ProtocolVersion) -> Self {
        VersionSet(version.bit())
    }

    /// Parse a comma separated list such as `"TLSv1.2,TLSv1.3"`
    pub fn from_str_list(list: &str) -> Result<Self> {
        list.split(',')
            .filter(|s| !s.trim().is_empty())
            .map(ProtocolVersion::from_str)
            .collect()
    }

    /// Copy of this set with `version` added
    pub fn with(mut self, version: ProtocolVersion) -> Self {
        self.insert(version);
        self
    }

    pub fn insert(&mut self, version: ProtocolVersion) {
        self.0 |= version.bit();
    }

    pub fn remove(&mut self, version: ProtocolVersion) {
        self.0 &= !version.bit();
    }

    pub fn contains(&self, version: ProtocolVersion) -> bool {
        self.0 & version.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Enabled versions, oldest first
    pub fn iter(&self) -> impl Iterator<Item = ProtocolVersion> + '_ {
        ProtocolVersion::ALL.into_iter().filter(|v| self.contains(*v))
    }

    /// Negotiation method for this set, or `None` when the set is empty
    ///
    /// A set holding exactly one version gets that version's dedicated
    /// method, checked in the order TLS 1.0, TLS 1.1, TLS 1.2, SSLv3, TLS 1.3.
    /// Every other set negotiates across its members.
    pub fn negotiation_method(&self) -> Option<NegotiationMethod> {
        const DEDICATED: [(ProtocolVersion, NegotiationMethod); 5] = [
            (ProtocolVersion::Tls10, NegotiationMethod::Tls10Only),
            (ProtocolVersion::Tls11, NegotiationMethod::Tls11Only),
            (ProtocolVersion::Tls12, NegotiationMethod::Tls12Only),
            (ProtocolVersion::Ssl3, NegotiationMethod::Ssl3Only),
            (ProtocolVersion::Tls13, NegotiationMethod::Tls13Only),
        ];

        if self.is_empty() {
            return None;
        }

        let method = DEDICATED
            .into_iter()
            .find(|(version, _)| *self == VersionSet::only(*version))
            .map(|(_, method)| method)
            .unwrap_or(NegotiationMethod::Negotiate);

        Some(method)
    }

    /// Engine options disabling every version outside this set
    pub(crate) fn disable_options(&self) -> SslOptions {
        ProtocolVersion::ALL
            .into_iter()
            .filter(|v| !self.contains(*v))
            .fold(SslOptions::empty(), |opts, v| opts | v.disable_option())
    }
}

impl FromIterator<ProtocolVersion> for VersionSet {
    fn from_iter<I: IntoIterator<Item = ProtocolVersion>>(iter: I) -> Self {
        let mut set = VersionSet::empty();
        for version in iter {
            set.insert(version);
        }
        set
    }
}

impl fmt::Debug for VersionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Engine negotiation method selected from the version set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationMethod {
    Tls10Only,
    Tls11Only,
    Tls12Only,
    Ssl3Only,
    Tls13Only,
    /// Negotiate across every enabled version
    Negotiate,
}

impl NegotiationMethod {
    /// The single version a dedicated method is pinned to
    pub fn pinned_version(&self) -> Option<ProtocolVersion> {
        match self {
            NegotiationMethod::Tls10Only => Some(ProtocolVersion::Tls10),
            NegotiationMethod::Tls11Only => Some(ProtocolVersion::Tls11),
            NegotiationMethod::Tls12Only => Some(ProtocolVersion::Tls12),
            NegotiationMethod::Ssl3Only => Some(ProtocolVersion::Ssl3),
            NegotiationMethod::Tls13Only => Some(ProtocolVersion::Tls13),
            NegotiationMethod::Negotiate => None,
        }
    }
}

/// Side of the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// How `decrypt` reacts to a peer-initiated renegotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenegotiationPolicy {
    /// Treat it as a fatal decrypt error
    #[default]
    Refuse,
    /// Report `Status::RenegotiationRequired` and let the caller re-drive `step`
    Signal,
}

/// Channel configuration (immutable after building)
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub(crate) ctx: SslContext,
    pub(crate) role: Role,
    pub(crate) versions: VersionSet,
    pub(crate) method: NegotiationMethod,
    pub(crate) require_remote_certificate: bool,
    pub(crate) renegotiation: RenegotiationPolicy,
    pub(crate) buffer_capacity: usize,
    pub(crate) quiet_shutdown: bool,
}

impl ChannelConfig {
    /// Create a new client configuration builder
    pub fn client() -> ChannelConfigBuilder {
        ChannelConfigBuilder::new(Role::Client)
    }

    /// Create a new server configuration builder
    pub fn server() -> ChannelConfigBuilder {
        ChannelConfigBuilder::new(Role::Server)
    }

    /// Allocate a fresh context for one connection attempt
    pub fn allocate(&self) -> Result<SecureContext> {
        SecureContext::new(self)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn versions(&self) -> VersionSet {
        self.versions
    }

    pub fn method(&self) -> NegotiationMethod {
        self.method
    }

    pub fn require_remote_certificate(&self) -> bool {
        self.require_remote_certificate
    }
}

/// Channel configuration builder
pub struct ChannelConfigBuilder {
    role: Role,
    versions: VersionSet,
    binding: Option<CertificateBinding>,
    require_remote_certificate: bool,
    cipher_list: Option<String>,
    ciphersuites: Option<String>,
    renegotiation: RenegotiationPolicy,
    buffer_capacity: usize,
    quiet_shutdown: bool,
}

impl ChannelConfigBuilder {
    /// Builder for `role`, enabling TLS 1.2 and TLS 1.3
    pub fn new(role: Role) -> Self {
        ChannelConfigBuilder {
            role,
            versions: VersionSet::only(ProtocolVersion::Tls12).with(ProtocolVersion::Tls13),
            binding: None,
            require_remote_certificate: false,
            cipher_list: None,
            ciphersuites: None,
            renegotiation: RenegotiationPolicy::default(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            quiet_shutdown: true,
        }
    }

    /// Enable exactly one protocol version
    pub fn version(mut self, version: ProtocolVersion) -> Self {
        self.versions = VersionSet::only(version);
        self
    }

    /// Set the enabled protocol versions
    pub fn versions(mut self, versions: VersionSet) -> Self {
        self.versions = versions;
        self
    }

    /// Bind a certificate and private key
    pub fn certificate(mut self, binding: CertificateBinding) -> Self {
        self.binding = Some(binding);
        self
    }

    /// Load certificate and private key from a PEM bundle
    pub fn certificate_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        let binding = CertificateBinding::from_pem_file(path)?;
        Ok(self.certificate(binding))
    }

    /// Ask the peer for its certificate
    ///
    /// Chain validation never fails the handshake; inspect
    /// `SecureContext::peer_certificate` and `SecureContext::verify_result`.
    pub fn require_remote_certificate(mut self, require: bool) -> Self {
        self.require_remote_certificate = require;
        self
    }

    /// Set cipher list (for TLS <= 1.2)
    pub fn cipher_list(mut self, ciphers: &str) -> Self {
        self.cipher_list = Some(ciphers.to_string());
        self
    }

    /// Set cipher suites (for TLS 1.3)
    pub fn ciphersuites(mut self, ciphers: &str) -> Self {
        self.ciphersuites = Some(ciphers.to_string());
        self
    }

    pub fn renegotiation(mut self, policy: RenegotiationPolicy) -> Self {
        self.renegotiation = policy;
        self
    }

    /// Per-direction capacity of the transport buffers
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Skip the close-notify exchange when a context is released
    pub fn quiet_shutdown(mut self, quiet: bool) -> Self {
        self.quiet_shutdown = quiet;
        self
    }

    /// Build the channel configuration
    pub fn build(self) -> Result<ChannelConfig> {
        let method = self.versions.negotiation_method().ok_or_else(|| {
            ChannelError::configuration(ConfigStep::SelectVersions, "all protocols are disabled")
        })?;

        debug!(
            "{:?} context: versions {:?}, method {:?}",
            self.role, self.versions, method
        );

        let ssl_method = match self.role {
            Role::Client => SslMethod::tls_client(),
            Role::Server => SslMethod::tls_server(),
        };

        let mut ctx_builder = SslContextBuilder::new(ssl_method).map_err(|e| {
            ChannelError::configuration(
                ConfigStep::SelectMethod,
                format!("Failed to allocate SSL/TLS context: {}", e),
            )
        })?;

        if let Some(version) = method.pinned_version().and_then(|v| v.to_openssl_version()) {
            ctx_builder
                .set_min_proto_version(Some(version))
                .and_then(|_| ctx_builder.set_max_proto_version(Some(version)))
                .map_err(|e| {
                    ChannelError::configuration(
                        ConfigStep::SelectMethod,
                        format!("Failed to get SSL method: {}", e),
                    )
                })?;
        }

        ctx_builder.set_options(self.versions.disable_options());

        if let Some(ref ciphers) = self.cipher_list {
            ctx_builder.set_cipher_list(ciphers).map_err(|e| {
                ChannelError::configuration(ConfigStep::Ciphers, format!("{}: {}", ciphers, e))
            })?;
        }
        if let Some(ref ciphers) = self.ciphersuites {
            ctx_builder.set_ciphersuites(ciphers).map_err(|e| {
                ChannelError::configuration(ConfigStep::Ciphers, format!("{}: {}", ciphers, e))
            })?;
        }

        if self.require_remote_certificate {
            // The verdict is recorded for verify_result(); trust policy belongs to the caller.
            ctx_builder.set_verify_callback(SslVerifyMode::PEER, |_preverified, _store| true);
        } else {
            ctx_builder.set_verify(SslVerifyMode::NONE);
        }

        if let Some(ref binding) = self.binding {
            bind_certificate(&mut ctx_builder, binding)?;
        }

        Ok(ChannelConfig {
            ctx: ctx_builder.build(),
            role: self.role,
            versions: self.versions,
            method,
            require_remote_certificate: self.require_remote_certificate,
            renegotiation: self.renegotiation,
            buffer_capacity: self.buffer_capacity,
            quiet_shutdown: self.quiet_shutdown,
        })
    }
}

/// Bind certificate, then key, then check that they belong together
fn bind_certificate(ctx_builder: &mut SslContextBuilder, binding: &CertificateBinding) -> Result<()> {
    ctx_builder.set_certificate(binding.certificate()).map_err(|e| {
        ChannelError::configuration(
            ConfigStep::BindCertificate,
            format!("Failed to use SSL certificate: {}", e),
        )
    })?;

    ctx_builder.set_private_key(binding.key()).map_err(|e| {
        ChannelError::configuration(
            ConfigStep::BindKey,
            format!("Failed to use SSL certificate private key: {}", e),
        )
    })?;

    ctx_builder.check_private_key().map_err(|e| {
        ChannelError::configuration(
            ConfigStep::VerifyKeyPair,
            format!("Certificate private key check failed: {}", e),
        )
    })
}

/// Allocate a context in one call
pub fn allocate(
    versions: VersionSet,
    binding: Option<&CertificateBinding>,
    role: Role,
    require_remote_certificate: bool,
) -> Result<SecureContext> {
    let mut builder = ChannelConfigBuilder::new(role)
        .versions(versions)
        .require_remote_certificate(require_remote_certificate);

    if let Some(binding) = binding {
        builder = builder.certificate(binding.clone());
    }

    builder.build()?.allocate()
}
