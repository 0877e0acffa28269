//! Public holidays from an iCalendar feed.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, instrument};

use signals_common::{SignalError, SignalResult};

use crate::http::{HttpClient, Timeouts};

/// Holiday labels by date.
pub type HolidayMap = BTreeMap<NaiveDate, String>;

#[derive(Debug, Clone)]
pub struct HolidayClient {
    http: HttpClient,
    url: Option<String>,
    timeouts: Timeouts,
}

impl HolidayClient {
    pub fn new(http: HttpClient, url: Option<String>, timeouts: Timeouts) -> Self {
        Self {
            http,
            url: url.filter(|u| !u.trim().is_empty()),
            timeouts,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    #[instrument(skip(self))]
    pub async fn fetch(&self) -> SignalResult<HolidayMap> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| SignalError::ConfigurationMissing("holiday calendar URL".into()))?;
        let request = self.http.get(url, self.timeouts.feed());
        let body = self.http.text(url, request).await?;
        let holidays = parse_ics(&body);
        debug!(count = holidays.len(), "Parsed holiday calendar");
        Ok(holidays)
    }
}

/// Collect `DTSTART` date and `SUMMARY` of every event.
///
/// Folded lines are joined first. Dates use the first eight digits after
/// the last `:` of the `DTSTART` line, so both `VALUE=DATE` and date-time
/// forms work. Events without a parsable date or a summary are dropped;
/// a later event on the same date replaces an earlier one.
pub fn parse_ics(text: &str) -> HolidayMap {
    let mut out = HolidayMap::new();
    let mut date: Option<NaiveDate> = None;
    let mut summary: Option<String> = None;

    for line in unfold(text) {
        let Some((name, value)) = split_property(&line) else {
            continue;
        };
        match name.as_str() {
            "BEGIN" if value == "VEVENT" => {
                date = None;
                summary = None;
            }
            "DTSTART" => {
                date = value
                    .get(..8)
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok());
            }
            "SUMMARY" => summary = Some(unescape(value)),
            "END" if value == "VEVENT" => {
                if let (Some(d), Some(s)) = (date.take(), summary.take()) {
                    out.insert(d, s);
                }
            }
            _ => {}
        }
    }
    out
}

/// Property name (parameters dropped, upper-cased) and raw value.
fn split_property(line: &str) -> Option<(String, &str)> {
    let (head, value) = line.split_once(':')?;
    let name = head.split(';').next().unwrap_or(head).trim();
    Some((name.to_ascii_uppercase(), value.trim()))
}

/// Join continuation lines (leading space or tab) onto their predecessor.
fn unfold(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in text.lines() {
        let raw = raw.trim_end_matches('\r');
        if let Some(rest) = raw.strip_prefix([' ', '\t']) {
            if let Some(last) = lines.last_mut() {
                last.push_str(rest);
                continue;
            }
        }
        lines.push(raw.to_string());
    }
    lines
}

fn unescape(value: &str) -> String {
    value
        .replace("\\,", ",")
        .replace("\\;", ";")
        .replace("\\n", " ")
        .replace("\\N", " ")
        .replace("\\\\", "\\")
}
