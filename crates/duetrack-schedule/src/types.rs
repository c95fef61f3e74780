//! Shared types for the schedule crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Cadence ─────────────────────────────────────────────────────────

/// Reminder cadence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    TwiceDaily,
    Weekly,
    Biweekly,
    Monthly,
    /// Admin-defined interval. The stored `intervalDays` is informational;
    /// the next-send computation treats this cadence like [`Frequency::Daily`].
    Custom,
}

impl Default for Frequency {
    fn default() -> Self {
        Self::Weekly
    }
}

/// Cadence settings for one reminder configuration.
///
/// The dual-mode fields drive two independent cadences (expired items vs
/// soon-to-expire items) sharing the same timezone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FrequencyConfig {
    /// Master switch; a disabled config always evaluates to paused.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub frequency: Frequency,
    /// Local send time as `HH:MM`; malformed values fall back to 08:00.
    #[serde(default = "default_start_time")]
    pub start_time: String,
    /// IANA zone name; unknown names fall back to UTC.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Interval for the `custom` cadence, kept for the admin UI.
    #[serde(default = "default_interval_days")]
    pub interval_days: u32,
    /// Evaluate the expired and warning cadences independently.
    #[serde(default)]
    pub dual_mode: bool,
    #[serde(default = "default_expired_frequency")]
    pub expired_frequency: Frequency,
    #[serde(default = "default_start_time")]
    pub expired_start_time: String,
    #[serde(default)]
    pub warning_frequency: Frequency,
    #[serde(default = "default_start_time")]
    pub warning_start_time: String,
    /// Weekday for weekly-type warning cadences (0 = Sunday … 6 = Saturday).
    #[serde(default = "default_day_of_week")]
    pub warning_day_of_week: u8,
}

fn default_start_time() -> String {
    "08:00".to_string()
}
fn default_timezone() -> String {
    "UTC".to_string()
}
fn default_interval_days() -> u32 {
    1
}
fn default_expired_frequency() -> Frequency {
    Frequency::Daily
}
fn default_day_of_week() -> u8 {
    1
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            frequency: Frequency::Weekly,
            start_time: default_start_time(),
            timezone: default_timezone(),
            interval_days: default_interval_days(),
            dual_mode: false,
            expired_frequency: default_expired_frequency(),
            expired_start_time: default_start_time(),
            warning_frequency: Frequency::Weekly,
            warning_start_time: default_start_time(),
            warning_day_of_week: default_day_of_week(),
        }
    }
}

/// Calendar settings shared by all cadences of a reminder configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfig {
    /// Weekday for weekly-type cadences (0 = Sunday … 6 = Saturday).
    #[serde(default = "default_day_of_week")]
    pub day_of_week: u8,
    /// Push weekend candidates forward to the next Monday.
    #[serde(default)]
    pub skip_weekends: bool,
    /// Days ahead the due-item window extends.
    #[serde(default = "default_lookahead_days")]
    pub lookahead_days: i64,
}

fn default_lookahead_days() -> i64 {
    30
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            day_of_week: default_day_of_week(),
            skip_weekends: false,
            lookahead_days: default_lookahead_days(),
        }
    }
}

// ─── Policy ──────────────────────────────────────────────────────────

/// Default minutes after the nominal send time during which today's slot
/// still counts as handled.
pub const DEFAULT_GRACE_MINUTES: i64 = 60;
/// Default day-of-month after which a monthly run rolls to the first of
/// the next month.
pub const DEFAULT_MONTHLY_ROLLOVER_DAY: u32 = 7;

/// Tunable scheduling heuristics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePolicy {
    /// Minutes after the nominal send time during which today's slot still
    /// counts as handled (the candidate stays on today's date).
    #[serde(default = "default_grace_minutes")]
    pub grace_minutes: i64,
    /// Monthly runs on a later day of month roll to the first of the next
    /// month regardless of the time of day.
    #[serde(default = "default_monthly_rollover_day")]
    pub monthly_rollover_day: u32,
}

fn default_grace_minutes() -> i64 {
    DEFAULT_GRACE_MINUTES
}
fn default_monthly_rollover_day() -> u32 {
    DEFAULT_MONTHLY_ROLLOVER_DAY
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self {
            grace_minutes: DEFAULT_GRACE_MINUTES,
            monthly_rollover_day: DEFAULT_MONTHLY_ROLLOVER_DAY,
        }
    }
}

// ─── Evaluation result ───────────────────────────────────────────────

/// Why (or when) the next reminder goes out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NextSendStatus {
    /// The cadence is disabled.
    Paused,
    /// Enabled, but nobody would receive the mail.
    NoRecipients,
    Scheduled,
}

/// Outcome of evaluating a reminder configuration at a given instant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NextSendResult {
    pub status: NextSendStatus,
    /// Earliest upcoming send (the minimum of the dual instants when
    /// dual mode is active).
    pub next_send: Option<DateTime<Utc>>,
    pub next_expired_send: Option<DateTime<Utc>>,
    pub next_warning_send: Option<DateTime<Utc>>,
}

impl NextSendResult {
    pub fn paused() -> Self {
        Self {
            status: NextSendStatus::Paused,
            next_send: None,
            next_expired_send: None,
            next_warning_send: None,
        }
    }

    pub fn no_recipients() -> Self {
        Self {
            status: NextSendStatus::NoRecipients,
            next_send: None,
            next_expired_send: None,
            next_warning_send: None,
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
