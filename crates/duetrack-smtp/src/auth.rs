//! SMTP authentication.
//!
//! The engine speaks AUTH LOGIN only: base64 username and password in
//! separate continuation steps, each answered with a 334 intermediate
//! reply. Credential payloads are redacted from the wire log.

use base64::Engine;
use log::debug;

use crate::client::SmtpClient;
use crate::types::{SmtpError, SmtpResult};

/// AUTH LOGIN: challenge-response with base64 username then password.
pub async fn auth_login(
    client: &mut SmtpClient,
    username: &str,
    password: &str,
) -> SmtpResult<()> {
    debug!("Authenticating with LOGIN");
    let reply = client.command("AUTH LOGIN").await?;
    if !reply.is_intermediate() && !reply.is_positive() {
        return Err(SmtpError::auth(format!(
            "AUTH LOGIN rejected: {} {}",
            reply.code,
            reply.text()
        )));
    }

    // Server sends 334 VXNlcm5hbWU6 (base64 "Username:")
    let reply = client
        .command_redacted(&encode_credential(username), "<username>")
        .await?;
    if !reply.is_intermediate() && !reply.is_positive() {
        return Err(SmtpError::auth(format!(
            "AUTH LOGIN username rejected: {} {}",
            reply.code,
            reply.text()
        )));
    }

    // Server sends 334 UGFzc3dvcmQ6 (base64 "Password:")
    let reply = client
        .command_redacted(&encode_credential(password), "<password>")
        .await?;

    if reply.is_positive() {
        client.set_authenticated(true);
        Ok(())
    } else {
        Err(SmtpError::auth(format!(
            "AUTH LOGIN password rejected: {} {}",
            reply.code,
            reply.text()
        )))
    }
}

/// Base64-encode one AUTH LOGIN continuation payload (useful for testing).
pub fn encode_credential(value: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(value.as_bytes())
}

// ─── Tests ──────────────────────────────────────────────────────────
