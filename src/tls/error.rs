//! Channel error types
//!
//! Every fatal condition surfaces as a single `ChannelError` carrying enough
//! detail to log and diagnose. Benign flow-control signals never appear here;
//! they are returned as `Status` values.

use std::fmt;

/// Setup step that produced a configuration error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigStep {
    /// The enabled protocol-version set was empty
    SelectVersions,
    /// The engine context or negotiation method could not be obtained
    SelectMethod,
    /// Cipher list or TLS 1.3 cipher suites were rejected
    Ciphers,
    /// The certificate was rejected
    BindCertificate,
    /// The private key was rejected
    BindKey,
    /// The private key does not match the certificate
    VerifyKeyPair,
    /// The per-connection session object could not be created
    CreateSession,
}

impl fmt::Display for ConfigStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfigStep::SelectVersions => "select versions",
            ConfigStep::SelectMethod => "select method",
            ConfigStep::Ciphers => "ciphers",
            ConfigStep::BindCertificate => "bind certificate",
            ConfigStep::BindKey => "bind private key",
            ConfigStep::VerifyKeyPair => "verify key pair",
            ConfigStep::CreateSession => "create session",
        };
        f.write_str(name)
    }
}

/// Class of an engine failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// Protocol or library failure (SSL_ERROR_SSL)
    Protocol,
    /// System-call class failure (SSL_ERROR_SYSCALL), resolved through the error queue
    Syscall,
    /// The engine wanted to write but the outbound buffer was full
    WantWrite,
    /// Certificate lookup callback requested a retry
    X509Lookup,
    /// Any other engine code
    Other,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureCategory::Protocol => "protocol",
            FailureCategory::Syscall => "syscall",
            FailureCategory::WantWrite => "want-write",
            FailureCategory::X509Lookup => "x509-lookup",
            FailureCategory::Other => "other",
        };
        f.write_str(name)
    }
}

/// Fatal engine failure: category, numeric code and diagnostic text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFailure {
    pub category: FailureCategory,
    pub code: u64,
    pub message: String,
}

impl fmt::Display for EngineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (category {}, code {})", self.message, self.category, self.code)
    }
}

/// Channel errors
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Configuration error ({step}): {message}")]
    Configuration { step: ConfigStep, message: String },

    #[error("Handshake failed: {0}")]
    Handshake(EngineFailure),

    #[error("Encrypt failed: {0}")]
    Encrypt(EngineFailure),

    #[error("Decrypt failed: {0}")]
    Decrypt(EngineFailure),

    #[error("Transport capacity exceeded: {needed} bytes pending, {capacity} bytes available")]
    TransportCapacity { needed: usize, capacity: usize },

    #[error("Transport buffer accepted {accepted} of {offered} bytes")]
    BufferContract { accepted: usize, offered: usize },

    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    #[error("Context already released")]
    Released,

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),
}

impl ChannelError {
    pub(crate) fn configuration(step: ConfigStep, message: impl Into<String>) -> Self {
        ChannelError::Configuration {
            step,
            message: message.into(),
        }
    }

    /// Engine failure details, if this error came from the engine
    pub fn engine_failure(&self) -> Option<&EngineFailure> {
        match self {
            ChannelError::Handshake(f) | ChannelError::Encrypt(f) | ChannelError::Decrypt(f) => {
                Some(f)
            }
            _ => None,
        }
    }

    /// Whether this error was raised at setup time
    pub fn is_configuration(&self) -> bool {
        matches!(self, ChannelError::Configuration { .. })
    }
}
