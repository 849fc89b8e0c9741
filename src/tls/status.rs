//! Engine outcome translation
//!
//! The engine reports every non-success through a numeric code. This module
//! maps those codes into a closed set: a benign flow-control signal the
//! caller loops on, or a fatal `EngineFailure` with a diagnostic string.

use super::error::{EngineFailure, FailureCategory};
use openssl::error::ErrorStack;
use openssl::ssl::{self, ErrorCode};

/// SSL_ERROR_WANT_X509_LOOKUP; not exported as a named `ErrorCode`
const WANT_X509_LOOKUP: i32 = 4;

/// Benign outcome of a record operation
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The operation completed and wrote this many bytes to the output
    Done(usize),
    /// The engine needs more inbound bytes before it can make progress
    NeedMoreInput,
    /// The peer started a renegotiation; drive `step` before decrypting again
    RenegotiationRequired,
    /// The peer sent close-notify; no more application data will arrive
    ConnectionClosed,
}

impl Status {
    /// Bytes written to the output (zero for every signal other than `Done`)
    pub fn bytes(&self) -> usize {
        match self {
            Status::Done(n) => *n,
            _ => 0,
        }
    }

    /// Whether the operation produced its result
    pub fn is_done(&self) -> bool {
        matches!(self, Status::Done(_))
    }
}

/// Classified engine return
#[derive(Debug)]
pub(crate) enum Signal {
    NeedMoreInput,
    ZeroReturn,
    Fatal(EngineFailure),
}

/// Classify an engine error into a continuation signal or a fatal failure
pub(crate) fn classify(err: &ssl::Error) -> Signal {
    let code = err.code();
    if code == ErrorCode::WANT_READ {
        Signal::NeedMoreInput
    } else if code == ErrorCode::ZERO_RETURN {
        Signal::ZeroReturn
    } else {
        Signal::Fatal(describe(err))
    }
}

/// Map an engine code to its failure category
pub(crate) fn category_of(code: ErrorCode) -> FailureCategory {
    if code == ErrorCode::SSL {
        FailureCategory::Protocol
    } else if code == ErrorCode::SYSCALL {
        FailureCategory::Syscall
    } else if code == ErrorCode::WANT_WRITE {
        FailureCategory::WantWrite
    } else if code.as_raw() == WANT_X509_LOOKUP {
        FailureCategory::X509Lookup
    } else {
        FailureCategory::Other
    }
}

/// Build the failure record for a fatal engine error
///
/// Protocol and system-call failures take their code and text from the
/// engine's error queue; the raw engine code is used only when the queue
/// is empty.
pub(crate) fn describe(err: &ssl::Error) -> EngineFailure {
    let code = err.code();
    let category = category_of(code);
    let raw = code.as_raw() as u64;

    match category {
        FailureCategory::Protocol | FailureCategory::Syscall => {
            if let Some(stack) = err.ssl_error().filter(|s| !s.errors().is_empty()) {
                return from_stack(category, stack);
            }

            let queued = ErrorStack::get();
            if !queued.errors().is_empty() {
                return from_stack(category, &queued);
            }

            let message = match err.io_error() {
                Some(io) => io.to_string(),
                None if category == FailureCategory::Syscall => {
                    "unexpected end of transport".to_string()
                }
                None => err.to_string(),
            };
            EngineFailure {
                category,
                code: raw,
                message,
            }
        }
        _ => EngineFailure {
            category,
            code: raw,
            message: err.to_string(),
        },
    }
}

fn from_stack(category: FailureCategory, stack: &ErrorStack) -> EngineFailure {
    let code = stack
        .errors()
        .first()
        .map(|e| e.code() as u64)
        .unwrap_or_default();

    EngineFailure {
        category,
        code,
        message: stack.to_string(),
    }
}
