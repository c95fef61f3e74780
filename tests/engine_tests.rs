use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use duetrack_reminders::dispatch::ReminderService;
use duetrack_reminders::error::{DispatchError, DispatchResult};
use duetrack_reminders::sources::{Directory, DueItemSource, OutcomeSink, SettingsStore};
use duetrack_reminders::transport::SmtpMailTransport;
use duetrack_reminders::types::{
    DeliveryMode, DeliveryOutcome, DueItem, ReminderSettings, RunStatus,
};
use duetrack_smtp::types::TlsMode;

/// Accept-everything SMTP server; the RCPT reply is configurable so a
/// run can be made to fail at the envelope stage.
async fn accepting_server(rcpt_reply: &'static str) -> (u16, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let shared = seen.clone();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut stream = BufReader::new(stream);
        stream.write_all(b"220 mock ready\r\n").await.unwrap();
        let mut in_data = false;
        loop {
            let mut line = String::new();
            if stream.read_line(&mut line).await.unwrap_or(0) == 0 {
                break;
            }
            let line = line.trim_end().to_string();
            shared.lock().await.push(line.clone());
            if in_data {
                if line == "." {
                    in_data = false;
                    stream.write_all(b"250 queued\r\n").await.unwrap();
                }
                continue;
            }
            let reply: &str = if line.starts_with("EHLO") || line.starts_with("HELO") {
                "250 mock\r\n"
            } else if line.starts_with("MAIL FROM") {
                "250 ok\r\n"
            } else if line.starts_with("RCPT TO") {
                rcpt_reply
            } else if line == "DATA" {
                in_data = true;
                "354 go ahead\r\n"
            } else if line == "QUIT" {
                stream.write_all(b"221 bye\r\n").await.unwrap();
                break;
            } else {
                "250 ok\r\n"
            };
            stream.write_all(reply.as_bytes()).await.unwrap();
        }
    });

    (port, seen)
}

struct FixedStore {
    settings: ReminderSettings,
}

#[async_trait]
impl SettingsStore for FixedStore {
    async fn load(&self, _reminder: &str) -> DispatchResult<ReminderSettings> {
        Ok(self.settings.clone())
    }
}

struct FixedItems {
    items: Vec<DueItem>,
}

#[async_trait]
impl DueItemSource for FixedItems {
    async fn due_items(&self, _lookahead_days: i64) -> DispatchResult<Vec<DueItem>> {
        Ok(self.items.clone())
    }
}

struct NoGroups;

#[async_trait]
impl Directory for NoGroups {
    async fn group_members(&self, group_ref: &str) -> DispatchResult<Vec<String>> {
        Err(DispatchError::dataset(format!(
            "unknown group {:?}",
            group_ref
        )))
    }
}

#[derive(Default)]
struct MemorySink {
    outcomes: StdMutex<Vec<DeliveryOutcome>>,
}

#[async_trait]
impl OutcomeSink for MemorySink {
    async fn record(&self, outcome: &DeliveryOutcome) -> DispatchResult<()> {
        self.outcomes.lock().unwrap().push(outcome.clone());
        Ok(())
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn due_item(id: &str, category: &str, label: &str, due: NaiveDate) -> DueItem {
    DueItem {
        id: id.into(),
        category: category.into(),
        label: label.into(),
        due_date: due,
    }
}

fn test_items() -> Vec<DueItem> {
    vec![
        due_item("1", "Training", "First aid refresher", date(2025, 6, 1)),
        due_item("2", "Medical", "Annual checkup", date(2025, 6, 20)),
        due_item("3", "Equipment", "Ladder inspection", date(2025, 9, 1)),
    ]
}

fn settings_for(port: u16) -> ReminderSettings {
    let mut settings = ReminderSettings::default();
    settings.frequency.enabled = true;
    settings.recipients.user_refs =
        vec!["alice@example.com".into(), "bob@example.com".into()];
    settings.smtp.host = "127.0.0.1".into();
    settings.smtp.port = port;
    settings.smtp.tls_mode = TlsMode::None;
    settings.smtp.from_email = "noreply@example.com".into();
    settings.template.subject = "{expiredCount} expired, {expiringCount} expiring".into();
    settings.template.body = "<p>{totalCount} items as of {reportDate}</p>".into();
    settings
}

fn run_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 11, 12, 0, 0).unwrap()
}

fn engine(settings: ReminderSettings, sink: Arc<MemorySink>) -> ReminderService {
    ReminderService::new(
        Arc::new(FixedStore { settings }),
        Arc::new(FixedItems {
            items: test_items(),
        }),
        Arc::new(NoGroups),
        sink,
        Arc::new(SmtpMailTransport),
    )
}

#[tokio::test]
async fn test_full_run_delivers_compiled_report() {
    let (port, seen) = accepting_server("250 ok\r\n").await;
    let sink = Arc::new(MemorySink::default());
    let service = engine(settings_for(port), sink.clone());

    let summary = service.run("expired", run_instant(), false).await;

    assert_eq!(summary.status, RunStatus::Sent);
    assert_eq!(summary.items_considered, 3);
    assert_eq!(summary.expired_count, 1);
    assert_eq!(summary.warning_count, 1);
    assert_eq!(summary.recipient_count, 2);
    assert_eq!(summary.emails_sent, 1);

    let lines = seen.lock().await;
    assert!(lines.iter().any(|l| l == "MAIL FROM:<noreply@example.com>"));
    assert!(lines.iter().any(|l| l == "RCPT TO:<alice@example.com>"));
    assert!(lines.iter().any(|l| l == "RCPT TO:<bob@example.com>"));
    assert!(lines
        .iter()
        .any(|l| l == "Subject: 1 expired, 1 expiring"));
    // Body carries the substituted counts and the severity table.
    assert!(lines
        .iter()
        .any(|l| l.contains("3 items as of 11.06.2025") && l.contains("<table")));
    assert!(lines
        .iter()
        .any(|l| l.contains("First aid refresher")));

    let outcomes = sink.outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].success);
    assert_eq!(outcomes[0].provider, "smtp");
    assert_eq!(outcomes[0].recipient_count, 2);
    assert_eq!(outcomes[0].template_name, "expired");
    assert_eq!(outcomes[0].delivery_mode, DeliveryMode::To);
    assert_eq!(outcomes[0].subject, "1 expired, 1 expiring");
    assert!(outcomes[0].rendered_body.contains("3 items as of 11.06.2025"));
}

#[tokio::test]
async fn test_recipient_rejection_fails_the_run() {
    let (port, _seen) = accepting_server("550 5.1.1 no such user\r\n").await;
    let sink = Arc::new(MemorySink::default());
    let service = engine(settings_for(port), sink.clone());

    let summary = service.run("expired", run_instant(), false).await;

    assert_eq!(summary.status, RunStatus::Failed);
    assert_eq!(summary.emails_sent, 0);
    assert!(summary.error.unwrap().contains("550"));

    let outcomes = sink.outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].success);
    assert!(outcomes[0].error.as_ref().unwrap().contains("550"));
}

#[tokio::test]
async fn test_paused_reminder_never_connects() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let connected = Arc::new(AtomicBool::new(false));
    let flag = connected.clone();
    tokio::spawn(async move {
        if listener.accept().await.is_ok() {
            flag.store(true, Ordering::SeqCst);
        }
    });

    let mut settings = settings_for(port);
    settings.frequency.enabled = false;
    let sink = Arc::new(MemorySink::default());
    let service = engine(settings, sink.clone());

    let summary = service.run("expired", run_instant(), false).await;

    assert_eq!(summary.status, RunStatus::Paused);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!connected.load(Ordering::SeqCst));
    assert!(sink.outcomes.lock().unwrap().is_empty());
}
