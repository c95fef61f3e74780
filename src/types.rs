//! Core data types of the reminder engine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use duetrack_schedule::types::{FrequencyConfig, ScheduleConfig};
use duetrack_smtp::types::SmtpConfig;

// ─── Due items ──────────────────────────────────────────────────────

/// One tracked item with a deadline, as supplied by the due-item
/// source for a single run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DueItem {
    pub id: String,
    /// Compliance area, e.g. "Training" or "Medical".
    pub category: String,
    /// Human-readable label (who and what).
    pub label: String,
    pub due_date: NaiveDate,
}

impl DueItem {
    /// Whole days from `on` to the deadline; negative once expired.
    pub fn days_remaining(&self, on: NaiveDate) -> i64 {
        (self.due_date - on).num_days()
    }
}

// ─── Reminder template ──────────────────────────────────────────────

fn default_subject() -> String {
    "Compliance reminder".to_string()
}

fn default_date_format() -> String {
    crate::template::DEFAULT_DATE_FORMAT.to_string()
}

fn default_true() -> bool {
    true
}

/// Stored reminder template. Subject and body may carry the literal
/// placeholders `{totalCount}`, `{expiringCount}`, `{expiredCount}`
/// and `{reportDate}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmailTemplate {
    #[serde(default = "default_subject")]
    pub subject: String,
    /// HTML body; placeholders are substituted, markup is kept as-is.
    #[serde(default)]
    pub body: String,
    /// strftime pattern for `{reportDate}` and table due dates.
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// Append the due-item table after the body.
    #[serde(default = "default_true")]
    pub include_table: bool,
}

impl Default for EmailTemplate {
    fn default() -> Self {
        Self {
            subject: default_subject(),
            body: String::new(),
            date_format: default_date_format(),
            include_table: true,
        }
    }
}

// ─── Recipients ─────────────────────────────────────────────────────

/// Which header group the resolved recipients land in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    #[default]
    To,
    Cc,
    Bcc,
}

/// Configured recipient references, resolved against the directory on
/// every run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RecipientConfig {
    /// Direct email addresses.
    #[serde(default)]
    pub user_refs: Vec<String>,
    /// Group names expanded through the directory.
    #[serde(default)]
    pub group_refs: Vec<String>,
    #[serde(default)]
    pub delivery_mode: DeliveryMode,
}

// ─── Settings bundle ────────────────────────────────────────────────

/// Everything the settings store supplies for one reminder
/// configuration. Loaded fresh at the start of every run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReminderSettings {
    #[serde(default)]
    pub frequency: FrequencyConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub recipients: RecipientConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub template: EmailTemplate,
}

// ─── Run results ────────────────────────────────────────────────────

/// Terminal state of one pipeline run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The reminder email went out.
    Sent,
    /// The reminder is disabled; nothing was attempted.
    Paused,
    /// Resolution produced zero valid recipients; nothing was sent.
    NoRecipients,
    /// Loading, compiling or delivery failed; see `error`.
    Failed,
}

/// What a single run did, returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub status: RunStatus,
    /// Name of the reminder configuration that ran.
    pub reminder: String,
    pub items_considered: usize,
    pub expired_count: usize,
    pub warning_count: usize,
    pub recipient_count: usize,
    pub emails_sent: u32,
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl RunSummary {
    /// Short-circuit summary with zero counters.
    pub fn skipped(reminder: &str, status: RunStatus, completed_at: DateTime<Utc>) -> Self {
        Self {
            status,
            reminder: reminder.to_string(),
            items_considered: 0,
            expired_count: 0,
            warning_count: 0,
            recipient_count: 0,
            emails_sent: 0,
            error: None,
            completed_at,
        }
    }
}

/// Audit record for one delivery attempt, handed to the outcome sink.
/// Skipped runs (paused, no recipients) record nothing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOutcome {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Reminder configuration the attempt belongs to.
    pub template_name: String,
    pub recipient_count: usize,
    /// Envelope addresses in send order (To, then Cc, then Bcc).
    pub recipients: Vec<String>,
    /// Header set the recipients were addressed under.
    pub delivery_mode: DeliveryMode,
    /// Subject as sent; empty when the run failed before compiling.
    pub subject: String,
    /// Full HTML body as sent.
    pub rendered_body: String,
    pub success: bool,
    pub error: Option<String>,
    /// Transport label, e.g. "smtp".
    pub provider: String,
    pub test_mode: bool,
}

// ─── Tests ──────────────────────────────────────────────────────────
