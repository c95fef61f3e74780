//! Low-level SMTP protocol engine.
//!
//! Handles TCP connection, STARTTLS upgrade, EHLO/HELO negotiation,
//! AUTH LOGIN, command/response exchange and the DATA transfer. The
//! same command primitive drives the pre-TLS and post-TLS phases.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::types::*;

// ─── Stream Abstraction ─────────────────────────────────────────────

/// Wrapper over plain-text or TLS socket so the rest of the engine is generic.
enum SmtpStream {
    Plain(BufReader<TcpStream>),
    Tls(BufReader<TlsStream<TcpStream>>),
}

impl SmtpStream {
    async fn read_line(&mut self, buf: &mut String) -> SmtpResult<usize> {
        match self {
            Self::Plain(r) => r.read_line(buf).await.map_err(SmtpError::from),
            Self::Tls(r) => r.read_line(buf).await.map_err(SmtpError::from),
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> SmtpResult<()> {
        match self {
            Self::Plain(r) => r.get_mut().write_all(data).await.map_err(SmtpError::from),
            Self::Tls(r) => r.get_mut().write_all(data).await.map_err(SmtpError::from),
        }
    }

    async fn flush(&mut self) -> SmtpResult<()> {
        match self {
            Self::Plain(r) => r.get_mut().flush().await.map_err(SmtpError::from),
            Self::Tls(r) => r.get_mut().flush().await.map_err(SmtpError::from),
        }
    }
}

// ─── SmtpClient ─────────────────────────────────────────────────────

/// The low-level SMTP client.
pub struct SmtpClient {
    stream: Option<SmtpStream>,
    config: SmtpConfig,
    tls_active: bool,
    authenticated: bool,
}

impl SmtpClient {
    /// Create a new SMTP client with the given configuration.
    pub fn new(config: SmtpConfig) -> Self {
        Self {
            stream: None,
            config,
            tls_active: false,
            authenticated: false,
        }
    }

    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn is_tls_active(&self) -> bool {
        self.tls_active
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Mark as authenticated (called by the auth module after success).
    pub fn set_authenticated(&mut self, auth: bool) {
        self.authenticated = auth;
    }

    // ── Connection ──────────────────────────────────────────────

    /// Connect to the SMTP server and read the greeting.
    pub async fn connect(&mut self) -> SmtpResult<SmtpReply> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        debug!("Connecting to SMTP server {}…", addr);

        let timeout = Duration::from_secs(self.config.connect_timeout_secs);
        let tcp = tokio::time::timeout(timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| SmtpError::timeout(format!("Connection timed out: {}", addr)))?
            .map_err(|e| SmtpError::connection(format!("Connection failed: {}", e)))?;
        tcp.set_nodelay(true).ok();

        match self.config.tls_mode {
            TlsMode::Implicit => {
                // TLS handshake before the first protocol byte
                let tls_stream = self.upgrade_to_tls_raw(tcp).await?;
                self.stream = Some(SmtpStream::Tls(BufReader::new(tls_stream)));
                self.tls_active = true;
            }
            _ => {
                self.stream = Some(SmtpStream::Plain(BufReader::new(tcp)));
            }
        }

        // Read server greeting
        let greeting = self.read_reply().await?;
        if greeting.is_error() {
            return Err(SmtpError::server(
                greeting.code,
                format!(
                    "Server rejected connection: {} {}",
                    greeting.code,
                    greeting.text()
                ),
            ));
        }
        info!("SMTP connected to {} – {}", addr, greeting.text());
        Ok(greeting)
    }

    /// Perform EHLO, falling back to HELO on rejection.
    pub async fn ehlo(&mut self) -> SmtpResult<SmtpReply> {
        let domain = self.config.ehlo_domain.clone();
        let reply = self.command(&format!("EHLO {}", domain)).await?;
        if reply.is_positive() {
            return Ok(reply);
        }
        // Fallback to HELO
        debug!("EHLO rejected, trying HELO");
        let reply = self.command(&format!("HELO {}", domain)).await?;
        if reply.is_positive() {
            Ok(reply)
        } else {
            Err(SmtpError::server(
                reply.code,
                format!("HELO rejected: {} {}", reply.code, reply.text()),
            ))
        }
    }

    /// Upgrade the current plain-text connection to TLS via STARTTLS.
    pub async fn starttls(&mut self) -> SmtpResult<()> {
        if self.tls_active {
            return Ok(());
        }
        let reply = self.command("STARTTLS").await?;
        if !reply.is_positive() {
            return Err(SmtpError::tls(format!(
                "STARTTLS rejected: {} {}",
                reply.code,
                reply.text()
            )));
        }

        // Take the existing plain stream
        let stream = self
            .stream
            .take()
            .ok_or_else(|| SmtpError::io("No stream"))?;
        let tcp = match stream {
            SmtpStream::Plain(r) => r.into_inner(),
            _ => return Err(SmtpError::tls("Already using TLS")),
        };

        let tls_stream = self.upgrade_to_tls_raw(tcp).await?;
        self.stream = Some(SmtpStream::Tls(BufReader::new(tls_stream)));
        self.tls_active = true;
        info!("STARTTLS upgrade successful");

        // Re-issue EHLO after STARTTLS (RFC 3207 §4.2)
        self.ehlo().await?;
        Ok(())
    }

    /// Close the connection gracefully via QUIT.
    pub async fn quit(&mut self) -> SmtpResult<()> {
        if self.stream.is_some() {
            let _ = self.command("QUIT").await;
            self.stream = None;
        }
        self.tls_active = false;
        self.authenticated = false;
        info!("SMTP connection closed");
        Ok(())
    }

    // ── Mail Transaction ────────────────────────────────────────

    /// Issue MAIL FROM.
    pub async fn mail_from(&mut self, sender: &str) -> SmtpResult<SmtpReply> {
        let cmd = format!("MAIL FROM:<{}>", sender);
        let reply = self.command(&cmd).await?;
        if reply.is_error() {
            return Err(SmtpError::server(
                reply.code,
                format!("MAIL FROM rejected: {} {}", reply.code, reply.text()),
            ));
        }
        Ok(reply)
    }

    /// Issue RCPT TO.
    pub async fn rcpt_to(&mut self, recipient: &str) -> SmtpResult<SmtpReply> {
        let cmd = format!("RCPT TO:<{}>", recipient);
        let reply = self.command(&cmd).await?;
        if reply.is_error() {
            return Err(SmtpError::server(
                reply.code,
                format!(
                    "RCPT TO rejected for {}: {} {}",
                    recipient,
                    reply.code,
                    reply.text()
                ),
            ));
        }
        Ok(reply)
    }

    /// Issue DATA and send the message body.
    /// Returns the final reply (should be 250).
    pub async fn data(&mut self, body: &str) -> SmtpResult<SmtpReply> {
        let reply = self.command("DATA").await?;
        if !reply.is_intermediate() {
            return Err(SmtpError::server(
                reply.code,
                format!("DATA rejected: {} {}", reply.code, reply.text()),
            ));
        }

        // Send the body (with byte-stuffing for leading dots)
        let body = Self::dot_stuff(body);
        self.write_raw(body.as_bytes()).await?;

        // End with CRLF.CRLF
        if !body.ends_with("\r\n") {
            self.write_raw(b"\r\n").await?;
        }
        self.write_raw(b".\r\n").await?;
        self.flush().await?;

        let reply = self.read_reply().await?;
        if reply.is_error() {
            return Err(SmtpError::server(
                reply.code,
                format!("DATA body rejected: {} {}", reply.code, reply.text()),
            ));
        }
        Ok(reply)
    }

    // ── Low-level I/O ───────────────────────────────────────────

    /// Send a command and read the reply.
    pub async fn command(&mut self, cmd: &str) -> SmtpResult<SmtpReply> {
        self.command_logged(cmd, cmd).await
    }

    /// Send a command, logging `label` in place of the payload.
    /// Used for AUTH continuations carrying credentials.
    pub async fn command_redacted(&mut self, cmd: &str, label: &str) -> SmtpResult<SmtpReply> {
        self.command_logged(cmd, label).await
    }

    async fn command_logged(&mut self, cmd: &str, label: &str) -> SmtpResult<SmtpReply> {
        debug!("C: {}", label);
        self.write_raw(format!("{}\r\n", cmd).as_bytes()).await?;
        self.flush().await?;
        self.read_reply().await
    }

    /// Read a complete SMTP reply (may be multi-line).
    pub async fn read_reply(&mut self) -> SmtpResult<SmtpReply> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| SmtpError::io("Not connected"))?;

        let timeout = Duration::from_secs(self.config.io_timeout_secs);
        let mut full_response = String::new();

        loop {
            let mut line = String::new();
            let n = tokio::time::timeout(timeout, stream.read_line(&mut line))
                .await
                .map_err(|_| SmtpError::timeout("Read timed out"))??;

            if n == 0 {
                return Err(SmtpError::io("Connection closed by server"));
            }
            full_response.push_str(&line);
            debug!("S: {}", line.trim_end());

            // Continuation lines carry a dash after the code; anything
            // else, including a bare code with no text, ends the reply.
            let trimmed = line.trim_end_matches(['\r', '\n']);
            if trimmed.len() < 4 || trimmed.as_bytes()[3] != b'-' {
                break;
            }
        }

        SmtpReply::parse(&full_response)
    }

    /// Write raw bytes to the stream.
    pub async fn write_raw(&mut self, data: &[u8]) -> SmtpResult<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| SmtpError::io("Not connected"))?;
        stream.write_all(data).await
    }

    async fn flush(&mut self) -> SmtpResult<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| SmtpError::io("Not connected"))?;
        stream.flush().await
    }

    // ── TLS helper ──────────────────────────────────────────────

    async fn upgrade_to_tls_raw(&self, tcp: TcpStream) -> SmtpResult<TlsStream<TcpStream>> {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let connector = TlsConnector::from(Arc::new(tls_config));
        let server_name = rustls::pki_types::ServerName::try_from(self.config.host.clone())
            .map_err(|e| SmtpError::tls(format!("Invalid server name: {}", e)))?;

        connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| SmtpError::tls(format!("TLS handshake failed: {}", e)))
    }

    // ── Dot-stuffing ────────────────────────────────────────────

    /// Perform SMTP dot-stuffing on the message body.
    /// Lines starting with '.' get an extra '.' prepended.
    fn dot_stuff(body: &str) -> String {
        let mut result = String::with_capacity(body.len() + 64);
        for line in body.split('\n') {
            let line = line.trim_end_matches('\r');
            if line.starts_with('.') {
                result.push('.');
            }
            result.push_str(line);
            result.push_str("\r\n");
        }
        result
    }

    // ── Full transaction ────────────────────────────────────────

    async fn transaction(&mut self, message: &EmailMessage, mime: &str) -> SmtpResult<SmtpReply> {
        self.ehlo().await?;

        if self.config.tls_mode == TlsMode::StartTls {
            self.starttls().await?;
        }

        if self.config.auth_enabled {
            let username = self.config.username.clone();
            let password = self.config.password.clone();
            crate::auth::auth_login(self, &username, &password).await?;
        }

        let sender = self.config.from_email.clone();
        self.mail_from(&sender).await?;
        for recipient in message.all_recipients() {
            self.rcpt_to(recipient).await?;
        }
        self.data(mime).await
    }
}

/// Send one message through a fresh connection.
///
/// Drives the full state machine (connect, EHLO, optional STARTTLS with
/// re-EHLO, optional AUTH LOGIN, envelope, DATA) and releases the socket
/// on every path once it was opened, including mid-transaction errors.
pub async fn send_mail(config: &SmtpConfig, message: &EmailMessage) -> SmtpResult<SmtpReply> {
    if config.host.is_empty() {
        return Err(SmtpError::config("SMTP host is not configured"));
    }
    if !is_valid_address(&config.from_email) {
        return Err(SmtpError::config(format!(
            "Invalid sender address: {:?}",
            config.from_email
        )));
    }

    let mime = crate::message::build_mime(config, message)?;

    let mut client = SmtpClient::new(config.clone());
    client.connect().await?;
    let result = client.transaction(message, &mime).await;
    let _ = client.quit().await;
    result
}

// ─── Tests ──────────────────────────────────────────────────────────
