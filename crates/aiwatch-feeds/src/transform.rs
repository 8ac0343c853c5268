//! Raw entry → [`FeedItem`] normalization.
//!
//! Transformation never fails for an individual entry: gaps and bad values
//! produce a best-effort item plus [`TransformWarning`]s.

use std::collections::{BTreeSet, HashSet};
use std::time::Instant;

use aiwatch_core::items::fallback_feed_item_id;
use aiwatch_core::{feed_item_id, normalize, FeedItem, TransformWarning};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::error::FeedError;
use crate::parser::{RawEntries, RawEntry};

/// Naive formats interpreted as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Offset-carrying formats that RFC 2822 parsing rejects, e.g. a missing weekday
/// with a numeric offset.
const OFFSET_DATETIME_FORMATS: &[&str] = &["%d %b %Y %H:%M:%S %z", "%Y-%m-%d %H:%M:%S %z"];

/// Epoch values at or above this are taken as milliseconds.
const EPOCH_MILLIS_CUTOFF: i64 = 100_000_000_000;

/// Normalize one raw entry from `source_id`.
///
/// `ingested_at` stands in for the publication date when it is missing or
/// unparseable.
#[must_use]
pub fn transform(raw: &RawEntry, source_id: &str, ingested_at: DateTime<Utc>) -> FeedItem {
    let mut warnings = Vec::new();

    let title = raw.title.as_deref().map(clean_text).unwrap_or_default();
    let body = raw.body.as_deref().map(clean_text).unwrap_or_default();
    let url = raw
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string);
    let raw_date = raw
        .published
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());

    let feed_item_id = if let Some(key) = raw.guid_or_url() {
        feed_item_id(source_id, key)
    } else {
        warnings.push(TransformWarning::MissingGuid);
        fallback_feed_item_id(source_id, &title, raw_date.unwrap_or_default())
    };

    let published_at = match raw_date {
        None => {
            warnings.push(TransformWarning::MissingDate);
            ingested_at
        }
        Some(raw_date) => parse_published_date(raw_date).unwrap_or_else(|| {
            warnings.push(TransformWarning::UnparseableDate {
                raw: raw_date.to_string(),
            });
            ingested_at
        }),
    };

    let raw_categories: BTreeSet<String> = raw
        .categories
        .iter()
        .map(|c| normalize(c))
        .filter(|c| !c.is_empty())
        .collect();

    FeedItem {
        feed_item_id,
        source_id: source_id.to_string(),
        title,
        body,
        url,
        published_at,
        raw_categories,
        warnings,
    }
}

/// Items produced from one fetch, after within-source deduplication.
#[derive(Debug, Default)]
pub struct TransformOutput {
    pub items: Vec<FeedItem>,
    /// Entries dropped because an earlier entry had the same `feed_item_id`.
    pub duplicates: usize,
    /// Total warnings across `items`.
    pub warnings: usize,
}

/// Drain `entries`, transforming each one and dropping repeats of an already
/// seen `feed_item_id` (the first occurrence wins).
///
/// # Errors
///
/// Returns the first document-level [`FeedError`] the sequence yields. Items
/// decoded before it are discarded so a source is never half-ingested.
pub fn transform_all(
    entries: RawEntries,
    source_id: &str,
    ingested_at: DateTime<Utc>,
) -> Result<TransformOutput, FeedError> {
    drain(entries, source_id, ingested_at, None)
}

/// [`transform_all`], abandoning the sequence once `deadline` has passed.
///
/// The deadline is checked before each entry is pulled, so one slow entry can
/// overrun it by at most its own decode time. Blocking; run it off the async
/// executor.
///
/// # Errors
///
/// Returns [`FeedError::DeadlineExceeded`] when the deadline passes before the
/// sequence ends, otherwise as [`transform_all`].
pub fn transform_all_until(
    entries: RawEntries,
    source_id: &str,
    ingested_at: DateTime<Utc>,
    deadline: Instant,
) -> Result<TransformOutput, FeedError> {
    drain(entries, source_id, ingested_at, Some(deadline))
}

fn drain(
    mut entries: RawEntries,
    source_id: &str,
    ingested_at: DateTime<Utc>,
    deadline: Option<Instant>,
) -> Result<TransformOutput, FeedError> {
    let mut output = TransformOutput::default();
    let mut seen = HashSet::new();

    loop {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(FeedError::DeadlineExceeded {
                source_id: source_id.to_string(),
            });
        }
        let Some(entry) = entries.next() else {
            break;
        };
        let item = transform(&entry?, source_id, ingested_at);

        for warning in &item.warnings {
            tracing::debug!(
                source = source_id,
                feed_item = %item.feed_item_id,
                warning = %warning,
                "transform warning"
            );
        }

        if !seen.insert(item.feed_item_id.clone()) {
            output.duplicates += 1;
            continue;
        }
        output.warnings += item.warnings.len();
        output.items.push(item);
    }

    Ok(output)
}

/// Permissive publication-date parsing.
///
/// Tries RFC 3339, RFC 2822, a few common naive and offset layouts, a bare
/// `YYYY-MM-DD`, and Unix epoch seconds or milliseconds. Naive values are UTC.
#[must_use]
pub fn parse_published_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive));
    }
    if raw.bytes().all(|b| b.is_ascii_digit()) {
        let value: i64 = raw.parse().ok()?;
        return if value >= EPOCH_MILLIS_CUTOFF {
            DateTime::from_timestamp_millis(value)
        } else {
            DateTime::from_timestamp(value, 0)
        };
    }

    None
}

/// Strip HTML tags, decode the handful of entities feeds commonly leave
/// behind, and collapse whitespace.
#[must_use]
pub fn clean_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }

    let decoded = out
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
