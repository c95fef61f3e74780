//! Reminder compilation: placeholder substitution plus the due-item
//! severity table.

use std::fmt::Write as _;

use chrono::NaiveDate;
use log::warn;

use crate::types::{DueItem, EmailTemplate};

/// Fallback strftime pattern for report and due dates.
pub const DEFAULT_DATE_FORMAT: &str = "%d.%m.%Y";

/// Days-remaining ceiling for the amber table band. Items due within
/// this many days render amber regardless of the configured lookahead.
pub const AMBER_BAND_DAYS: i64 = 7;

const BAND_EXPIRED: &str = "#d9534f";
const BAND_WARNING: &str = "#f0ad4e";
const BAND_OK: &str = "#5cb85c";

/// A compiled reminder ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledReminder {
    pub subject: String,
    pub html_body: String,
}

/// Item counts for one run, derived from the due items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueCounts {
    pub total: usize,
    /// Not yet due but inside the lookahead window.
    pub expiring: usize,
    /// Past due on the report date.
    pub expired: usize,
}

/// Classifies `items` against `report_date`. An item counts as
/// expiring when `0 <= days_remaining <= lookahead_days`.
pub fn count_items(items: &[DueItem], report_date: NaiveDate, lookahead_days: i64) -> DueCounts {
    let mut counts = DueCounts {
        total: items.len(),
        expiring: 0,
        expired: 0,
    };
    for item in items {
        let days = item.days_remaining(report_date);
        if days < 0 {
            counts.expired += 1;
        } else if days <= lookahead_days {
            counts.expiring += 1;
        }
    }
    counts
}

/// Compiles subject and body from the stored template. Substitution is
/// literal text replacement; template markup passes through untouched,
/// item fields in the table are escaped.
pub fn compile(
    template: &EmailTemplate,
    items: &[DueItem],
    report_date: NaiveDate,
    lookahead_days: i64,
) -> CompiledReminder {
    let counts = count_items(items, report_date, lookahead_days);
    let date_text = format_date(report_date, &template.date_format);

    let subject = substitute(&template.subject, &counts, &date_text);
    let mut html_body = substitute(&template.body, &counts, &date_text);
    if template.include_table && !items.is_empty() {
        html_body.push_str(&render_table(items, report_date, &template.date_format));
    }

    CompiledReminder { subject, html_body }
}

/// Global literal substitution; unknown placeholders stay verbatim.
fn substitute(text: &str, counts: &DueCounts, report_date: &str) -> String {
    text.replace("{totalCount}", &counts.total.to_string())
        .replace("{expiringCount}", &counts.expiring.to_string())
        .replace("{expiredCount}", &counts.expired.to_string())
        .replace("{reportDate}", report_date)
}

/// Renders `date` with the configured pattern, falling back to
/// [`DEFAULT_DATE_FORMAT`] when the pattern is not valid strftime.
fn format_date(date: NaiveDate, pattern: &str) -> String {
    let mut out = String::new();
    if write!(&mut out, "{}", date.format(pattern)).is_ok() {
        return out;
    }
    warn!(
        "[reminder] invalid date format {:?}, using {}",
        pattern, DEFAULT_DATE_FORMAT
    );
    date.format(DEFAULT_DATE_FORMAT).to_string()
}

/// Builds the due-item table, most urgent first. Inline styles only,
/// mail clients strip everything else.
fn render_table(items: &[DueItem], report_date: NaiveDate, date_format: &str) -> String {
    let mut rows: Vec<&DueItem> = items.iter().collect();
    rows.sort_by_key(|item| item.days_remaining(report_date));

    let mut out = String::with_capacity(rows.len() * 160 + 256);
    out.push_str(
        "<table style=\"border-collapse:collapse;width:100%\">\
         <thead><tr>\
         <th style=\"text-align:left;padding:4px 8px\">Category</th>\
         <th style=\"text-align:left;padding:4px 8px\">Item</th>\
         <th style=\"text-align:left;padding:4px 8px\">Due date</th>\
         <th style=\"text-align:right;padding:4px 8px\">Days</th>\
         </tr></thead><tbody>",
    );
    for item in rows {
        let days = item.days_remaining(report_date);
        let _ = write!(
            out,
            "<tr style=\"background-color:{}\">\
             <td style=\"padding:4px 8px\">{}</td>\
             <td style=\"padding:4px 8px\">{}</td>\
             <td style=\"padding:4px 8px\">{}</td>\
             <td style=\"text-align:right;padding:4px 8px\">{}</td>\
             </tr>",
            band_color(days),
            escape_html(&item.category),
            escape_html(&item.label),
            format_date(item.due_date, date_format),
            days,
        );
    }
    out.push_str("</tbody></table>");
    out
}

fn band_color(days_remaining: i64) -> &'static str {
    if days_remaining < 0 {
        BAND_EXPIRED
    } else if days_remaining <= AMBER_BAND_DAYS {
        BAND_WARNING
    } else {
        BAND_OK
    }
}

/// Escapes the five HTML-special characters.
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn item(id: &str, category: &str, label: &str, due: NaiveDate) -> DueItem {
        DueItem {
            id: id.into(),
            category: category.into(),
            label: label.into(),
            due_date: due,
        }
    }

    fn template(subject: &str, body: &str) -> EmailTemplate {
        EmailTemplate {
            subject: subject.into(),
            body: body.into(),
            ..EmailTemplate::default()
        }
    }

    // ── Counting tests ────────────────────────────────────────────

    #[test]
    fn counts_classify_by_days_remaining() {
        let report = date(2025, 6, 11);
        let items = vec![
            item("1", "Training", "Expired last week", date(2025, 6, 4)),
            item("2", "Medical", "Due in five days", date(2025, 6, 16)),
            item("3", "Equipment", "Due in sixty days", date(2025, 8, 10)),
        ];
        let counts = count_items(&items, report, 30);
        assert_eq!(counts.total, 3);
        assert_eq!(counts.expired, 1);
        assert_eq!(counts.expiring, 1);
    }

    #[test]
    fn due_today_counts_as_expiring_not_expired() {
        let report = date(2025, 6, 11);
        let items = vec![item("1", "Training", "Due today", report)];
        let counts = count_items(&items, report, 30);
        assert_eq!(counts.expired, 0);
        assert_eq!(counts.expiring, 1);
    }

    #[test]
    fn lookahead_bounds_the_expiring_count() {
        let report = date(2025, 6, 11);
        let items = vec![
            item("1", "A", "On the boundary", date(2025, 6, 18)),
            item("2", "B", "One past it", date(2025, 6, 19)),
        ];
        let counts = count_items(&items, report, 7);
        assert_eq!(counts.expiring, 1);
    }

    // ── Substitution tests ────────────────────────────────────────

    #[test]
    fn substitutes_all_placeholders_globally() {
        let tpl = template(
            "{expiredCount} expired of {totalCount}",
            "<p>Total: {totalCount}, again: {totalCount}. Date: {reportDate}</p>",
        );
        let report = date(2025, 6, 11);
        let items = vec![item("1", "T", "Old", date(2025, 6, 1))];
        let compiled = compile(&tpl, &items, report, 30);
        assert_eq!(compiled.subject, "1 expired of 1");
        assert!(compiled
            .html_body
            .starts_with("<p>Total: 1, again: 1. Date: 11.06.2025</p>"));
    }

    #[test]
    fn unknown_placeholders_stay_verbatim() {
        let tpl = template("Hello {name}", "{unknown} and {totalCount}");
        let compiled = compile(&tpl, &[], date(2025, 6, 11), 30);
        assert_eq!(compiled.subject, "Hello {name}");
        assert_eq!(compiled.html_body, "{unknown} and 0");
    }

    #[test]
    fn report_date_honors_custom_pattern() {
        let mut tpl = template("{reportDate}", "");
        tpl.date_format = "%Y/%m/%d".into();
        let compiled = compile(&tpl, &[], date(2025, 6, 11), 30);
        assert_eq!(compiled.subject, "2025/06/11");
    }

    #[test]
    fn invalid_date_pattern_falls_back_to_default() {
        let mut tpl = template("{reportDate}", "");
        tpl.date_format = "%q".into();
        let compiled = compile(&tpl, &[], date(2025, 6, 11), 30);
        assert_eq!(compiled.subject, "11.06.2025");
    }

    // ── Table tests ───────────────────────────────────────────────

    #[test]
    fn table_rows_sorted_most_urgent_first() {
        let report = date(2025, 6, 11);
        let tpl = template("s", "");
        let items = vec![
            item("1", "A", "Later", date(2025, 7, 1)),
            item("2", "B", "Oldest", date(2025, 5, 1)),
            item("3", "C", "Soon", date(2025, 6, 13)),
        ];
        let compiled = compile(&tpl, &items, report, 30);
        let oldest = compiled.html_body.find("Oldest").unwrap();
        let soon = compiled.html_body.find("Soon").unwrap();
        let later = compiled.html_body.find("Later").unwrap();
        assert!(oldest < soon && soon < later);
    }

    #[test]
    fn band_color_thresholds() {
        assert_eq!(band_color(-1), BAND_EXPIRED);
        assert_eq!(band_color(0), BAND_WARNING);
        assert_eq!(band_color(AMBER_BAND_DAYS), BAND_WARNING);
        assert_eq!(band_color(AMBER_BAND_DAYS + 1), BAND_OK);
    }

    #[test]
    fn table_uses_band_colors_per_row() {
        let report = date(2025, 6, 11);
        let tpl = template("s", "");
        let items = vec![
            item("1", "A", "Expired", date(2025, 6, 1)),
            item("2", "B", "Amber", date(2025, 6, 15)),
            item("3", "C", "Green", date(2025, 9, 1)),
        ];
        let compiled = compile(&tpl, &items, report, 30);
        assert!(compiled.html_body.contains(BAND_EXPIRED));
        assert!(compiled.html_body.contains(BAND_WARNING));
        assert!(compiled.html_body.contains(BAND_OK));
    }

    #[test]
    fn item_fields_are_escaped_in_table() {
        let report = date(2025, 6, 11);
        let tpl = template("s", "");
        let items = vec![item(
            "1",
            "R&D",
            "<script>alert('x')</script>",
            date(2025, 6, 15),
        )];
        let compiled = compile(&tpl, &items, report, 30);
        assert!(compiled.html_body.contains("R&amp;D"));
        assert!(compiled
            .html_body
            .contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
        assert!(!compiled.html_body.contains("<script>"));
    }

    #[test]
    fn template_markup_is_not_escaped() {
        let tpl = template("s", "<h1>Report</h1>");
        let compiled = compile(&tpl, &[], date(2025, 6, 11), 30);
        assert_eq!(compiled.html_body, "<h1>Report</h1>");
    }

    #[test]
    fn empty_item_list_renders_no_table() {
        let tpl = template("s", "<p>All clear</p>");
        let compiled = compile(&tpl, &[], date(2025, 6, 11), 30);
        assert!(!compiled.html_body.contains("<table"));
    }

    #[test]
    fn include_table_false_suppresses_table() {
        let mut tpl = template("s", "<p>Summary only</p>");
        tpl.include_table = false;
        let items = vec![item("1", "A", "Due", date(2025, 6, 15))];
        let compiled = compile(&tpl, &items, date(2025, 6, 11), 30);
        assert!(!compiled.html_body.contains("<table"));
    }

    #[test]
    fn escape_html_covers_all_five_specials() {
        assert_eq!(
            escape_html(r#"<a href="x">&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;"
        );
    }
}
