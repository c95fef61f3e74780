//! Next-send instant computation.
//!
//! Every function here is a pure function of an explicit `now`; nothing
//! reads the clock or performs I/O. Callers inject the current instant,
//! tests pin arbitrary ones.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Timelike, Utc,
    Weekday,
};
use chrono_tz::Tz;

use crate::types::{
    Frequency, FrequencyConfig, NextSendResult, NextSendStatus, ScheduleConfig, SchedulePolicy,
};

/// Fallback local send time when `startTime` does not parse.
pub const DEFAULT_START_HOUR: u32 = 8;
/// Fallback minute component.
pub const DEFAULT_START_MINUTE: u32 = 0;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Input normalization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse `HH:MM`; malformed or out-of-range values fall back to 08:00.
fn parse_start_time(raw: &str) -> (u32, u32) {
    let mut parts = raw.splitn(2, ':');
    let hour = parts.next().and_then(|p| p.trim().parse::<u32>().ok());
    let minute = parts.next().and_then(|p| p.trim().parse::<u32>().ok());
    match (hour, minute) {
        (Some(h), Some(m)) if h < 24 && m < 60 => (h, m),
        _ => {
            log::warn!(
                "[schedule] unparseable start time {:?}, using {:02}:{:02}",
                raw,
                DEFAULT_START_HOUR,
                DEFAULT_START_MINUTE
            );
            (DEFAULT_START_HOUR, DEFAULT_START_MINUTE)
        }
    }
}

/// Resolve an IANA zone name; unknown names fall back to UTC.
pub fn resolve_timezone(name: &str) -> Tz {
    match name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            log::warn!("[schedule] unknown timezone {:?}, using UTC", name);
            Tz::UTC
        }
    }
}

/// Weekday as 0 = Sunday … 6 = Saturday.
fn weekday_index(day: Weekday) -> i64 {
    i64::from(day.num_days_from_sunday())
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn first_of_next_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
}

/// Materialize a local wall-clock time in `tz` as a UTC instant.
///
/// DST gaps step forward in one-hour increments until the wall clock
/// exists; ambiguous times take the earlier of the two mappings.
fn materialize_local(tz: Tz, date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    let mut naive = match date.and_hms_opt(hour, minute, 0) {
        Some(n) => n,
        None => date.and_time(NaiveTime::MIN),
    };
    for _ in 0..4 {
        match tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => return dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
            LocalResult::None => naive += Duration::hours(1),
        }
    }
    // No real zone has a transition this wide; read the wall clock as UTC.
    Utc.from_utc_datetime(&naive)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Next-send computation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compute the next send instant for one cadence.
///
/// Total over arbitrary `start_time` and `timezone` strings. The result
/// may sit up to `policy.grace_minutes` before `now`: inside the grace
/// window today's slot counts as the current send. Outside the window
/// the result is strictly in the future.
pub fn compute_next(
    frequency: Frequency,
    start_time: &str,
    day_of_week: u8,
    skip_weekends: bool,
    timezone: &str,
    policy: &SchedulePolicy,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let tz = resolve_timezone(timezone);
    let local = now.with_timezone(&tz);
    let (hour, minute) = parse_start_time(start_time);

    let target_minutes = i64::from(hour * 60 + minute);
    let current_minutes = i64::from(local.hour() * 60 + local.minute());
    let past_window = current_minutes >= target_minutes + policy.grace_minutes;

    let today = local.date_naive();
    let mut candidate = match frequency {
        Frequency::Daily | Frequency::TwiceDaily | Frequency::Custom => {
            if past_window {
                today + Duration::days(1)
            } else {
                today
            }
        }
        Frequency::Weekly | Frequency::Biweekly => {
            let target = i64::from(day_of_week % 7);
            let mut delta = (target - weekday_index(local.weekday())).rem_euclid(7);
            if delta == 0 && past_window {
                delta = 7;
            }
            today + Duration::days(delta)
        }
        Frequency::Monthly => {
            if past_window || local.day() > policy.monthly_rollover_day {
                first_of_next_month(today)
            } else {
                today
            }
        }
    };

    while skip_weekends && is_weekend(candidate) {
        candidate += Duration::days(1);
    }

    materialize_local(tz, candidate, hour, minute)
}

/// Evaluate a full reminder configuration at `now`.
///
/// Status precedence: paused over no-recipients over scheduled. In dual
/// mode the expired and warning cadences are computed independently and
/// `next_send` carries the earlier of the two.
pub fn evaluate(
    frequency: &FrequencyConfig,
    schedule: &ScheduleConfig,
    policy: &SchedulePolicy,
    has_recipients: bool,
    now: DateTime<Utc>,
) -> NextSendResult {
    if !frequency.enabled {
        return NextSendResult::paused();
    }
    if !has_recipients {
        return NextSendResult::no_recipients();
    }

    if frequency.dual_mode {
        let expired = compute_next(
            frequency.expired_frequency,
            &frequency.expired_start_time,
            schedule.day_of_week,
            schedule.skip_weekends,
            &frequency.timezone,
            policy,
            now,
        );
        let warning = compute_next(
            frequency.warning_frequency,
            &frequency.warning_start_time,
            frequency.warning_day_of_week,
            schedule.skip_weekends,
            &frequency.timezone,
            policy,
            now,
        );
        NextSendResult {
            status: NextSendStatus::Scheduled,
            next_send: Some(expired.min(warning)),
            next_expired_send: Some(expired),
            next_warning_send: Some(warning),
        }
    } else {
        let next = compute_next(
            frequency.frequency,
            &frequency.start_time,
            schedule.day_of_week,
            schedule.skip_weekends,
            &frequency.timezone,
            policy,
            now,
        );
        NextSendResult {
            status: NextSendStatus::Scheduled,
            next_send: Some(next),
            next_expired_send: None,
            next_warning_send: None,
        }
    }
}
