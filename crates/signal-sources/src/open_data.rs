//! Client for the meteorological open-data platform.
//!
//! The platform exposes datasets by name and version; each version has a
//! chronological list of runs ("instances") holding files, and a file is
//! downloaded through a short-lived pre-signed URL. Response shapes vary
//! between releases, so every listing accepts a few known key names.

use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, info, instrument};

use signals_common::{SignalError, SignalResult};

use crate::http::{segments_url, HttpClient, Timeouts};

pub const DEFAULT_BASE_URL: &str = "https://api.dataplatform.knmi.nl/open-data/v1";

/// One model run of a dataset version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRun {
    pub id: String,
}

/// A file inside a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastFile {
    pub filename: String,
    pub size: Option<u64>,
}

/// Open-data platform client.
///
/// Requests are authenticated by sending the API key as the raw
/// `Authorization` header value. Without a key every call fails with
/// [`SignalError::ConfigurationMissing`] before touching the network.
#[derive(Debug, Clone)]
pub struct OpenDataClient {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
    timeouts: Timeouts,
}

impl OpenDataClient {
    pub fn new(
        http: HttpClient,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            timeouts,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> SignalResult<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| SignalError::ConfigurationMissing("open-data API key".into()))
    }

    async fn get_json(&self, path: &[&str], timeout: std::time::Duration) -> SignalResult<Value> {
        let key = self.api_key()?;
        let url = segments_url(&self.base_url, path)?;
        let request = self
            .http
            .get(&url, timeout)
            .header(reqwest::header::AUTHORIZATION, key);
        self.http.json(&url, request).await
    }

    /// Versions published for a dataset, in provider order.
    #[instrument(skip(self))]
    pub async fn list_versions(&self, dataset: &str) -> SignalResult<Vec<String>> {
        let js = self
            .get_json(&["datasets", dataset, "versions"], self.timeouts.metadata())
            .await?;
        let versions: Vec<String> = listing(&js, "versions")?
            .iter()
            .filter_map(|v| string_field(v, &["version", "id", "name"]))
            .collect();
        debug!(count = versions.len(), "Listed versions");
        Ok(versions)
    }

    /// Runs of a dataset version, oldest first.
    #[instrument(skip(self))]
    pub async fn list_instances(
        &self,
        dataset: &str,
        version: &str,
    ) -> SignalResult<Vec<DatasetRun>> {
        let js = self
            .get_json(
                &["datasets", dataset, "versions", version, "instances"],
                self.timeouts.listing(),
            )
            .await?;
        let runs: Vec<DatasetRun> = listing(&js, "instances")?
            .iter()
            .filter_map(|v| string_field(v, &["instanceId", "id", "name"]))
            .map(|id| DatasetRun { id })
            .collect();
        debug!(count = runs.len(), "Listed runs");
        Ok(runs)
    }

    /// Files of one run.
    #[instrument(skip(self))]
    pub async fn list_files(
        &self,
        dataset: &str,
        version: &str,
        run: &str,
    ) -> SignalResult<Vec<ForecastFile>> {
        let js = self
            .get_json(
                &["datasets", dataset, "versions", version, "instances", run, "files"],
                self.timeouts.listing(),
            )
            .await?;
        let files: Vec<ForecastFile> = listing(&js, "files")?
            .iter()
            .filter_map(|v| {
                let filename = string_field(v, &["filename", "name"])?;
                let size = v.get("size").and_then(Value::as_u64);
                Some(ForecastFile { filename, size })
            })
            .collect();
        debug!(count = files.len(), "Listed files");
        Ok(files)
    }

    /// Resolve the temporary download URL of a file.
    #[instrument(skip(self))]
    pub async fn download_url(
        &self,
        dataset: &str,
        version: &str,
        run: &str,
        filename: &str,
    ) -> SignalResult<String> {
        let js = self
            .get_json(
                &[
                    "datasets", dataset, "versions", version, "instances", run, "files",
                    filename, "url",
                ],
                self.timeouts.listing(),
            )
            .await?;
        ["temporaryDownloadUrl", "url"]
            .iter()
            .find_map(|k| js.get(*k).and_then(Value::as_str))
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .ok_or_else(|| SignalError::SchemaMismatch("no download URL in response".into()))
    }

    /// Fetch a payload from a pre-signed URL (no platform credentials).
    #[instrument(skip(self, url))]
    pub async fn fetch(&self, url: &str) -> SignalResult<Bytes> {
        let request = self.http.get(url, self.timeouts.payload());
        let bytes = self.http.bytes(url, request).await?;
        info!(size = bytes.len(), "Downloaded forecast payload");
        Ok(bytes)
    }
}

/// The array under `key`, under `data`, or the document itself.
fn listing<'a>(js: &'a Value, key: &str) -> SignalResult<&'a Vec<Value>> {
    js.get(key)
        .or_else(|| js.get("data"))
        .unwrap_or(js)
        .as_array()
        .ok_or_else(|| SignalError::SchemaMismatch(format!("expected a '{}' array", key)))
}

/// A bare string, or the first string-valued key of an object.
fn string_field(v: &Value, keys: &[&str]) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(_) => keys.iter().find_map(|k| match v.get(*k) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_listing_key_variants() {
        let a = json!({ "instances": [{ "instanceId": "r1" }] });
        let b = json!({ "data": [{ "id": "r2" }] });
        let c = json!([{ "name": "r3" }]);
        for (js, want) in [(a, "r1"), (b, "r2"), (c, "r3")] {
            let items = listing(&js, "instances").unwrap();
            assert_eq!(
                string_field(&items[0], &["instanceId", "id", "name"]).as_deref(),
                Some(want)
            );
        }
    }

    #[test]
    fn test_listing_wrong_shape() {
        let js = json!({ "instances": "nope" });
        assert!(matches!(
            listing(&js, "instances"),
            Err(SignalError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_versions_as_strings_or_numbers() {
        assert_eq!(string_field(&json!("2"), &[]).as_deref(), Some("2"));
        assert_eq!(string_field(&json!(3), &[]).as_deref(), Some("3"));
        assert_eq!(
            string_field(&json!({ "version": "1.0" }), &["version"]).as_deref(),
            Some("1.0")
        );
        assert_eq!(string_field(&json!({ "other": 1 }), &["version"]), None);
    }

    #[tokio::test]
    async fn test_missing_key_never_touches_network() {
        let client = OpenDataClient::new(
            HttpClient::new().unwrap(),
            "http://127.0.0.1:9",
            Some("  ".into()),
            Timeouts::default(),
        );
        assert!(!client.is_configured());
        let err = client.list_versions("harmonie").await.unwrap_err();
        assert!(err.is_unconfigured());
    }
}
