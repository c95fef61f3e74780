//! Error taxonomy for the reminder engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use duetrack_smtp::types::{SmtpError, SmtpErrorKind};

/// Kinds of dispatch errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DispatchErrorKind {
    /// Settings are unusable (missing SMTP host, bad sender, failed
    /// settings load); fails before any connection attempt.
    Configuration,
    /// The caller is not permitted to trigger a run. Surfaced to the
    /// caller directly, never recorded as a delivery outcome.
    Authorization,
    /// The SMTP server replied with an unexpected code; the message
    /// carries the raw server text.
    Protocol,
    /// Connect, TLS, timeout or socket failure.
    Network,
    /// The due-item source failed; propagated as the run's failure.
    Dataset,
}

impl fmt::Display for DispatchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Top-level error type for the reminder engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchError {
    pub kind: DispatchErrorKind,
    pub message: String,
    /// SMTP reply code when the failure came off the wire.
    pub code: Option<u16>,
}

impl DispatchError {
    pub fn new(kind: DispatchErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::new(DispatchErrorKind::Configuration, msg)
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        Self::new(DispatchErrorKind::Authorization, msg)
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::new(DispatchErrorKind::Protocol, msg)
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::new(DispatchErrorKind::Network, msg)
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::new(DispatchErrorKind::Dataset, msg)
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "[reminder {}] {}: {}", code, self.kind, self.message)
        } else {
            write!(f, "[reminder] {}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<SmtpError> for DispatchError {
    fn from(e: SmtpError) -> Self {
        let kind = match e.kind {
            SmtpErrorKind::Server | SmtpErrorKind::Auth | SmtpErrorKind::Message => {
                DispatchErrorKind::Protocol
            }
            SmtpErrorKind::Connection
            | SmtpErrorKind::Timeout
            | SmtpErrorKind::Tls
            | SmtpErrorKind::Io => DispatchErrorKind::Network,
            SmtpErrorKind::Config => DispatchErrorKind::Configuration,
        };
        Self {
            kind,
            message: e.message,
            code: e.code,
        }
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;

// ─── Tests ──────────────────────────────────────────────────────────
