//! Collaborator seams for settings, due items, the user directory and
//! the outcome log.
//!
//! The engine loads fresh state through these traits at the start of
//! every run and holds nothing across runs, so edits made between runs
//! always take effect on the next one.

use async_trait::async_trait;

use crate::error::DispatchResult;
use crate::types::{DeliveryOutcome, DueItem, ReminderSettings};

/// Per-reminder settings storage.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Loads the named reminder configuration.
    async fn load(&self, reminder: &str) -> DispatchResult<ReminderSettings>;
}

/// Supplies the items already past due plus those due within the
/// lookahead window, in no particular order.
#[async_trait]
pub trait DueItemSource: Send + Sync {
    async fn due_items(&self, lookahead_days: i64) -> DispatchResult<Vec<DueItem>>;
}

/// User and group directory for recipient expansion.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Email addresses of the members of `group_ref`.
    async fn group_members(&self, group_ref: &str) -> DispatchResult<Vec<String>>;
}

/// Receives one delivery outcome per attempted send. Sink failures are
/// logged and never fail the run.
#[async_trait]
pub trait OutcomeSink: Send + Sync {
    async fn record(&self, outcome: &DeliveryOutcome) -> DispatchResult<()>;
}
