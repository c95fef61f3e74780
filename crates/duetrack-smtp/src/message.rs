//! MIME message assembly.
//!
//! Converts an [`EmailMessage`] plus the sender configuration into an
//! RFC 5322 message string suitable for the SMTP DATA command. Reminder
//! mail is single-part HTML; there is no multipart or attachment
//! handling here.

use base64::Engine;
use chrono::Utc;

use crate::types::*;

/// Build the full MIME message string.
pub fn build_mime(config: &SmtpConfig, msg: &EmailMessage) -> SmtpResult<String> {
    msg.validate()?;

    let mut out = String::with_capacity(msg.html_body.len() + 1024);

    write_header(
        &mut out,
        "Message-ID",
        &format!(
            "<{}@{}>",
            uuid::Uuid::new_v4().simple(),
            config.ehlo_domain
        ),
    );
    write_header(
        &mut out,
        "Date",
        &Utc::now().format("%a, %d %b %Y %H:%M:%S %z").to_string(),
    );
    write_header(&mut out, "From", &sender_mailbox(config));
    write_header(&mut out, "To", &msg.to.join(", "));
    if !msg.cc.is_empty() {
        write_header(&mut out, "Cc", &msg.cc.join(", "));
    }
    if config.include_bcc_header && !msg.bcc.is_empty() {
        // Legacy header; see SmtpConfig::include_bcc_header.
        write_header(&mut out, "Bcc", &msg.bcc.join(", "));
    }
    write_header(&mut out, "Subject", &encode_header_value(&msg.subject));
    write_header(&mut out, "MIME-Version", "1.0");
    write_header(&mut out, "Content-Type", "text/html; charset=UTF-8");

    out.push_str("\r\n");
    out.push_str(&msg.html_body);

    Ok(out)
}

/// The From header mailbox for this deployment.
pub fn sender_mailbox(config: &SmtpConfig) -> String {
    if config.from_name.is_empty() {
        EmailAddress::new(&config.from_email).to_mailbox()
    } else {
        EmailAddress::with_name(&config.from_email, &config.from_name).to_mailbox()
    }
}

fn write_header(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push_str("\r\n");
}

/// RFC 2047 encode a header value if it contains non-ASCII characters.
pub fn encode_header_value(value: &str) -> String {
    if value.is_ascii() {
        return value.to_string();
    }
    // RFC 2047 Base64 encoding for the whole value
    let encoded = base64::engine::general_purpose::STANDARD.encode(value.as_bytes());
    format!("=?UTF-8?B?{}?=", encoded)
}

// ─── Tests ──────────────────────────────────────────────────────────
