//! Locate and download the latest gridded forecast file.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use signals_common::{SignalError, SignalResult};

use crate::open_data::{ForecastFile, OpenDataClient};

/// A dataset to try, with an optional pinned version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetCandidate {
    pub dataset: String,
    #[serde(default)]
    pub version: Option<String>,
}

impl DatasetCandidate {
    pub fn new(dataset: &str, version: Option<&str>) -> Self {
        Self {
            dataset: dataset.to_string(),
            version: version.map(str::to_string),
        }
    }
}

/// HARMONIE-AROME, newest known version first.
pub fn default_candidates() -> Vec<DatasetCandidate> {
    vec![
        DatasetCandidate::new("harmonie_arome_cy43_p1", Some("2")),
        DatasetCandidate::new("harmonie_arome_cy43_p1", Some("1")),
    ]
}

/// A downloaded forecast file.
#[derive(Debug, Clone)]
pub struct ForecastPayload {
    pub dataset: String,
    pub version: String,
    pub run: String,
    pub filename: String,
    pub bytes: Bytes,
}

/// Pick the file to decode: GRIB first, then NetCDF, then whatever is first.
pub fn select_file(files: &[ForecastFile]) -> Option<&ForecastFile> {
    let has_suffix = |f: &&ForecastFile, suffixes: &[&str]| {
        let name = f.filename.to_lowercase();
        suffixes.iter().any(|s| name.ends_with(s))
    };
    files
        .iter()
        .find(|f| has_suffix(f, &[".grib2", ".grb2", ".grb"]))
        .or_else(|| files.iter().find(|f| has_suffix(f, &[".nc"])))
        .or_else(|| files.first())
}

/// Greatest version string.
///
/// Dotted numeric versions compare numerically ("10" > "9", "1.10" > "1.9");
/// anything else falls back to string order.
pub fn latest_version(versions: &[String]) -> Option<&String> {
    versions.iter().max_by(|a, b| match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.cmp(b),
    })
}

fn numeric(v: &str) -> Option<Vec<u64>> {
    v.trim_start_matches(['v', 'V'])
        .split('.')
        .map(|part| part.parse().ok())
        .collect()
}

/// Walks dataset, version, run and file listings down to a payload.
#[derive(Debug, Clone)]
pub struct ForecastResolver {
    client: OpenDataClient,
    candidates: Vec<DatasetCandidate>,
}

impl ForecastResolver {
    pub fn new(client: OpenDataClient, candidates: Vec<DatasetCandidate>) -> Self {
        Self { client, candidates }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_configured()
    }

    /// First candidate with a resolvable version and at least one run.
    ///
    /// A pinned version is used as is; otherwise the greatest listed version
    /// is taken. Candidates whose listings fail are skipped.
    #[instrument(skip(self))]
    pub async fn select_dataset(&self) -> SignalResult<(String, String)> {
        for candidate in &self.candidates {
            let version = match &candidate.version {
                Some(v) => v.clone(),
                None => match self.client.list_versions(&candidate.dataset).await {
                    Ok(versions) => match latest_version(&versions) {
                        Some(v) => v.clone(),
                        None => {
                            debug!(dataset = %candidate.dataset, "No versions listed");
                            continue;
                        }
                    },
                    Err(e) if e.is_unconfigured() => return Err(e),
                    Err(e) => {
                        debug!(dataset = %candidate.dataset, error = %e, "Cannot list versions");
                        continue;
                    }
                },
            };

            match self.client.list_instances(&candidate.dataset, &version).await {
                Ok(runs) if !runs.is_empty() => {
                    info!(dataset = %candidate.dataset, version = %version, runs = runs.len(), "Selected dataset");
                    return Ok((candidate.dataset.clone(), version));
                }
                Ok(_) => {
                    debug!(dataset = %candidate.dataset, version = %version, "No runs listed");
                }
                Err(e) if e.is_unconfigured() => return Err(e),
                Err(e) => {
                    debug!(dataset = %candidate.dataset, version = %version, error = %e, "Cannot list runs");
                }
            }
        }
        Err(SignalError::EmptyListing(
            "no dataset candidate has a published run".into(),
        ))
    }

    /// Download the preferred file of the most recent run.
    #[instrument(skip(self))]
    pub async fn fetch_latest(&self) -> SignalResult<ForecastPayload> {
        let (dataset, version) = self.select_dataset().await?;

        let runs = self.client.list_instances(&dataset, &version).await?;
        let run = runs
            .last()
            .ok_or_else(|| SignalError::EmptyListing(format!("{} v{} has no runs", dataset, version)))?
            .id
            .clone();

        let files = self.client.list_files(&dataset, &version, &run).await?;
        let filename = select_file(&files)
            .ok_or_else(|| SignalError::EmptyListing(format!("run {} has no files", run)))?
            .filename
            .clone();
        info!(dataset = %dataset, run = %run, filename = %filename, "Selected forecast file");

        let url = self
            .client
            .download_url(&dataset, &version, &run, &filename)
            .await?;
        let bytes = self.client.fetch(&url).await?;

        Ok(ForecastPayload {
            dataset,
            version,
            run,
            filename,
            bytes,
        })
    }

    /// [`fetch_latest`](Self::fetch_latest), with failures logged and
    /// turned into `None`.
    pub async fn try_fetch_latest(&self) -> Option<ForecastPayload> {
        match self.fetch_latest().await {
            Ok(payload) => Some(payload),
            Err(e) if e.is_unconfigured() => {
                debug!(error = %e, "Gridded forecast not configured");
                None
            }
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "Gridded forecast unavailable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(names: &[&str]) -> Vec<ForecastFile> {
        names
            .iter()
            .map(|n| ForecastFile {
                filename: n.to_string(),
                size: None,
            })
            .collect()
    }

    #[test]
    fn test_grib_wins_over_netcdf_in_any_order() {
        let list = files(&["a.nc", "readme.txt", "HA43_N20_202405010000.GRB2"]);
        assert_eq!(
            select_file(&list).unwrap().filename,
            "HA43_N20_202405010000.GRB2"
        );
        let list = files(&["b.grib2", "a.nc"]);
        assert_eq!(select_file(&list).unwrap().filename, "b.grib2");
    }

    #[test]
    fn test_netcdf_then_first() {
        assert_eq!(
            select_file(&files(&["x.tar", "y.nc"])).unwrap().filename,
            "y.nc"
        );
        assert_eq!(
            select_file(&files(&["x.tar", "z.zip"])).unwrap().filename,
            "x.tar"
        );
        assert!(select_file(&[]).is_none());
    }

    #[test]
    fn test_latest_version_numeric() {
        let v: Vec<String> = ["1", "10", "9"].iter().map(|s| s.to_string()).collect();
        assert_eq!(latest_version(&v).map(String::as_str), Some("10"));
        let v: Vec<String> = ["1.9", "1.10"].iter().map(|s| s.to_string()).collect();
        assert_eq!(latest_version(&v).map(String::as_str), Some("1.10"));
        assert!(latest_version(&[]).is_none());
    }
}
