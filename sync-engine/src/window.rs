//! Report date-window clamping.
//!
//! Analytics-style providers are asked for a date-ranged report. The window
//! bounds report size while maximizing coverage:
//!
//! - linked more than a year ago: start one year back (report-size cap);
//! - linked within the last year but more than 30 days ago: start at the
//!   linkage date (no point requesting data predating the connection);
//! - linked within the last 30 days: clamp the start to 30 days back.

use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Computes the `[start, end]` report window for a link.
///
/// `end` is always `today`. See the module docs for the three-way start
/// clamp.
pub fn report_window(linked_at: DateTime<Utc>, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let year_ago = today - Duration::days(365);
    let thirty_days_ago = today - Duration::days(30);

    let linked = linked_at.date_naive();
    let start = if linked <= year_ago {
        year_ago
    } else if linked > thirty_days_ago {
        thirty_days_ago
    } else {
        linked
    };

    (start, today)
}
