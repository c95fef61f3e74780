//! **duetrack-smtp** — hand-rolled async SMTP client.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | All data types, error handling, configuration |
//! | [`client`] | Low-level SMTP protocol engine (EHLO, STARTTLS, AUTH, DATA) |
//! | [`auth`] | AUTH LOGIN exchange |
//! | [`message`] | Single-part HTML MIME assembly |
//!
//! One fresh connection per message: [`client::send_mail`] drives the
//! whole state machine and releases the socket on every path.

pub mod types;
pub mod client;
pub mod auth;
pub mod message;
