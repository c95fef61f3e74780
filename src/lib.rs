//! **duetrack-reminders** — reminder scheduling and email delivery
//! engine for the duetrack compliance tracker.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Settings bundle, due items, templates, run results |
//! | [`error`] | Dispatch error taxonomy |
//! | [`template`] | Placeholder substitution and the due-item table |
//! | [`recipients`] | Group expansion, validation, dedup, partitioning |
//! | [`sources`] | Collaborator seams: settings, items, directory, outcomes |
//! | [`transport`] | Mail transport seam and the SMTP implementation |
//! | [`dispatch`] | Run pipeline, next-send preview, trigger auth |
//!
//! Cadence math lives in `duetrack-schedule`, the wire client in
//! `duetrack-smtp`. Every run loads settings and due items fresh
//! through the [`sources`] seams, sends at most one message over one
//! connection, and records one delivery outcome per attempt.

pub mod dispatch;
pub mod error;
pub mod recipients;
pub mod sources;
pub mod template;
pub mod transport;
pub mod types;
