//! All data types, error handling and configuration for the SMTP crate.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─── Error ──────────────────────────────────────────────────────────

/// Kinds of SMTP errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SmtpErrorKind {
    /// Connection refused or unreachable.
    Connection,
    /// Connect or read deadline exceeded.
    Timeout,
    /// TLS negotiation failed.
    Tls,
    /// Authentication failed.
    Auth,
    /// Server returned an error reply (4xx / 5xx).
    Server,
    /// The message itself is malformed.
    Message,
    /// Configuration error (missing host, bad sender).
    Config,
    /// I/O error during socket read/write.
    Io,
}

impl fmt::Display for SmtpErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Top-level error type for the SMTP crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpError {
    pub kind: SmtpErrorKind,
    pub message: String,
    /// The SMTP reply code (e.g. 550) if available.
    pub code: Option<u16>,
}

impl SmtpError {
    pub fn new(kind: SmtpErrorKind, msg: impl Into<String>) -> Self {
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

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::new(SmtpErrorKind::Connection, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(SmtpErrorKind::Timeout, msg)
    }

    pub fn tls(msg: impl Into<String>) -> Self {
        Self::new(SmtpErrorKind::Tls, msg)
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::new(SmtpErrorKind::Auth, msg)
    }

    pub fn server(code: u16, msg: impl Into<String>) -> Self {
        Self::new(SmtpErrorKind::Server, msg).with_code(code)
    }

    pub fn message(msg: impl Into<String>) -> Self {
        Self::new(SmtpErrorKind::Message, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(SmtpErrorKind::Config, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(SmtpErrorKind::Io, msg)
    }
}

impl fmt::Display for SmtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "[SMTP {}] {}: {}", code, self.kind, self.message)
        } else {
            write!(f, "[SMTP] {}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for SmtpError {}

impl From<std::io::Error> for SmtpError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut => Self::timeout(e.to_string()),
            std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::ConnectionReset => {
                Self::connection(e.to_string())
            }
            _ => Self::io(e.to_string()),
        }
    }
}

pub type SmtpResult<T> = Result<T, SmtpError>;

// ─── Enums ──────────────────────────────────────────────────────────

/// Transport security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TlsMode {
    /// Unencrypted for the whole session.
    None,
    /// Plaintext greeting, then upgrade via STARTTLS (port 587).
    StartTls,
    /// TLS from the first byte (SMTPS, port 465).
    Implicit,
}

impl Default for TlsMode {
    fn default() -> Self {
        Self::StartTls
    }
}

// ─── Configuration ──────────────────────────────────────────────────

/// SMTP server and sender configuration for one deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SmtpConfig {
    /// Hostname or IP of the SMTP server.
    #[serde(default)]
    pub host: String,
    /// Port (25 / 465 / 587).
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub tls_mode: TlsMode,
    /// Run AUTH LOGIN after the (possibly upgraded) EHLO.
    #[serde(default)]
    pub auth_enabled: bool,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Envelope sender and From header address.
    #[serde(default)]
    pub from_email: String,
    /// Display name for the From header; empty means bare address.
    #[serde(default)]
    pub from_name: String,
    /// Emit a literal Bcc header when blind recipients exist. Most
    /// relays strip it before final delivery; stored settings may
    /// still disable it explicitly.
    #[serde(default = "default_true")]
    pub include_bcc_header: bool,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Per-read timeout in seconds.
    #[serde(default = "default_io_timeout")]
    pub io_timeout_secs: u64,
    /// Domain to use in the EHLO/HELO command.
    #[serde(default = "default_ehlo_domain")]
    pub ehlo_domain: String,
}

fn default_port() -> u16 {
    587
}
fn default_connect_timeout() -> u64 {
    30
}
fn default_io_timeout() -> u64 {
    60
}
fn default_ehlo_domain() -> String {
    "localhost".into()
}
fn default_true() -> bool {
    true
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 587,
            tls_mode: TlsMode::StartTls,
            auth_enabled: false,
            username: String::new(),
            password: String::new(),
            from_email: String::new(),
            from_name: String::new(),
            include_bcc_header: true,
            connect_timeout_secs: default_connect_timeout(),
            io_timeout_secs: default_io_timeout(),
            ehlo_domain: default_ehlo_domain(),
        }
    }
}

// ─── Email Address ──────────────────────────────────────────────────

/// Basic shape check: non-empty local part, one `@`, dotted domain.
pub fn is_valid_address(address: &str) -> bool {
    if let Some(at) = address.find('@') {
        let local = &address[..at];
        let domain = &address[at + 1..];
        !local.is_empty() && !domain.is_empty() && domain.contains('.') && !domain.contains('@')
    } else {
        false
    }
}

/// An email address with an optional display name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailAddress {
    /// Display name (e.g. "Compliance Tracker").
    pub name: Option<String>,
    /// The address itself (e.g. "noreply@example.com").
    pub address: String,
}

impl EmailAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            name: None,
            address: address.into(),
        }
    }

    pub fn with_name(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            address: address.into(),
        }
    }

    /// Format as RFC 5322 mailbox (e.g. `"Jane Doe" <jane@example.com>`).
    pub fn to_mailbox(&self) -> String {
        match &self.name {
            Some(n) if !n.is_empty() => {
                format!("\"{}\" <{}>", n.replace('"', "\\\""), self.address)
            }
            _ => self.address.clone(),
        }
    }

    /// Extract just `<address>` for the SMTP envelope.
    pub fn to_angle_addr(&self) -> String {
        format!("<{}>", self.address)
    }

    /// Parse a mailbox string like `"Name" <addr>` or a bare address.
    pub fn parse(input: &str) -> SmtpResult<Self> {
        let input = input.trim();
        if let (Some(lt), Some(gt)) = (input.find('<'), input.rfind('>')) {
            if lt < gt {
                let address = input[lt + 1..gt].trim();
                if is_valid_address(address) {
                    let name = input[..lt].trim().trim_matches('"').trim();
                    let name = if name.is_empty() {
                        None
                    } else {
                        Some(name.to_string())
                    };
                    return Ok(Self {
                        name,
                        address: address.to_string(),
                    });
                }
            }
        } else if is_valid_address(input) {
            return Ok(Self::new(input));
        }
        Err(SmtpError::message(format!(
            "Invalid email address: {}",
            input
        )))
    }

    pub fn is_valid(&self) -> bool {
        is_valid_address(&self.address)
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_mailbox())
    }
}

// ─── Email Message ──────────────────────────────────────────────────

/// A compiled reminder message ready to be sent.
///
/// The sender comes from [`SmtpConfig`]; recipients are plain addresses
/// already resolved and partitioned by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    pub subject: String,
    pub html_body: String,
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
}

impl EmailMessage {
    /// All envelope recipients (to + cc + bcc, in that order).
    pub fn all_recipients(&self) -> Vec<&str> {
        self.to
            .iter()
            .chain(self.cc.iter())
            .chain(self.bcc.iter())
            .map(String::as_str)
            .collect()
    }

    /// Validate the message before sending.
    pub fn validate(&self) -> SmtpResult<()> {
        if self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty() {
            return Err(SmtpError::message("At least one recipient is required"));
        }
        for r in self.all_recipients() {
            if !is_valid_address(r) {
                return Err(SmtpError::message(format!(
                    "Invalid recipient address: {}",
                    r
                )));
            }
        }
        Ok(())
    }
}

// ─── SMTP Reply ─────────────────────────────────────────────────────

/// A parsed SMTP reply (possibly multi-line).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpReply {
    /// The 3-digit reply code.
    pub code: u16,
    /// Reply text lines.
    pub lines: Vec<String>,
    /// Whether this was a multi-line reply.
    pub is_multiline: bool,
}

impl SmtpReply {
    /// Positive completion (2xx).
    pub fn is_positive(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Positive intermediate (3xx), e.g. 354 after DATA or 334 during AUTH.
    pub fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }

    /// Error reply (4xx / 5xx).
    pub fn is_error(&self) -> bool {
        self.code >= 400
    }

    /// The full reply text.
    pub fn text(&self) -> String {
        self.lines.join(" ")
    }

    /// Parse an SMTP reply from raw lines.
    pub fn parse(raw: &str) -> SmtpResult<Self> {
        let mut code: Option<u16> = None;
        let mut lines = Vec::new();
        let mut multiline = false;

        for line in raw.lines() {
            if line.len() < 3 {
                continue;
            }
            let c: u16 = line[..3]
                .parse()
                .map_err(|_| SmtpError::io(format!("Invalid reply code in: {}", line)))?;
            if code.is_none() {
                code = Some(c);
            }
            let separator = line.as_bytes().get(3).copied().unwrap_or(b' ');
            if separator == b'-' {
                multiline = true;
            }
            let text = if line.len() > 4 { &line[4..] } else { "" };
            lines.push(text.to_string());
        }

        match code {
            Some(c) => Ok(SmtpReply {
                code: c,
                lines,
                is_multiline: multiline,
            }),
            None => Err(SmtpError::io("Empty SMTP reply")),
        }
    }
}

impl fmt::Display for SmtpReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
