//! Headlines from a syndication feed.

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::instrument;

use signals_common::{SignalError, SignalResult};

use crate::http::{HttpClient, Timeouts};

/// Headlines kept per request.
pub const DEFAULT_HEADLINES: usize = 3;

#[derive(Debug, Clone)]
pub struct NewsClient {
    http: HttpClient,
    url: Option<String>,
    limit: usize,
    timeouts: Timeouts,
}

impl NewsClient {
    pub fn new(http: HttpClient, url: Option<String>, timeouts: Timeouts) -> Self {
        Self {
            http,
            url: url.filter(|u| !u.trim().is_empty()),
            limit: DEFAULT_HEADLINES,
            timeouts,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    #[instrument(skip(self))]
    pub async fn fetch(&self) -> SignalResult<Vec<String>> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| SignalError::ConfigurationMissing("news feed URL".into()))?;
        let request = self.http.get(url, self.timeouts.feed());
        let body = self.http.text(url, request).await?;
        parse_headlines(&body, self.limit)
    }
}

/// Item headlines of a feed document.
///
/// Takes every `<title>` in document order, skips the first (the channel
/// title), keeps `limit` and strips any markup left inside.
pub fn parse_headlines(xml: &str, limit: usize) -> SignalResult<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut titles = Vec::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"title" => {
                current = Some(String::new());
            }
            Ok(Event::Text(t)) => {
                if let Some(text) = current.as_mut() {
                    let unescaped = t
                        .unescape()
                        .map_err(|e| SignalError::SchemaMismatch(format!("feed: {}", e)))?;
                    text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(text) = current.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"title" => {
                if let Some(text) = current.take() {
                    titles.push(text);
                    if titles.len() > limit {
                        break;
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SignalError::SchemaMismatch(format!(
                    "feed XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(titles
        .into_iter()
        .skip(1)
        .take(limit)
        .map(|t| strip_tags(&t).trim().to_string())
        .collect())
}

/// Remove `<...>` runs from a string.
pub fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}
