//! Directory store: the static MEP dataset plus a 24 hour local cache.
//!
//! Loading tries the cached snapshot first and falls back to reading the
//! dataset. Only a failed dataset read surfaces as an error; cache problems
//! (missing, stale, corrupt, unwritable) are logged and ignored.

use crate::model::{DirectoryData, Representative};
use crate::store::KvStore;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

pub const CACHE_KEY: &str = "mep_directory_cache";

/// Dataset compiled into the binary.
pub const BUNDLED_DATASET: &str = include_str!("../data/meps.json");

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("failed to read MEP data from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse MEP data: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Where the dataset comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Bundled,
    File(PathBuf),
}

impl DataSource {
    pub fn from_config(path: Option<&str>) -> Self {
        match path {
            Some(p) => DataSource::File(PathBuf::from(p)),
            None => DataSource::Bundled,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedData {
    meps: Vec<Representative>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    timestamp: DateTime<Utc>,
}

/// Loaded representatives plus derived lookups.
#[derive(Debug, Clone)]
pub struct Directory {
    meps: Vec<Representative>,
    from_cache: bool,
}

impl Directory {
    pub fn new(meps: Vec<Representative>) -> Self {
        Self { meps, from_cache: false }
    }

    pub fn meps(&self) -> &[Representative] {
        &self.meps
    }

    pub fn len(&self) -> usize {
        self.meps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meps.is_empty()
    }

    pub fn from_cache(&self) -> bool {
        self.from_cache
    }

    pub fn find(&self, id: i64) -> Option<&Representative> {
        self.meps.iter().find(|m| m.id == id)
    }

    /// Distinct non-empty countries, sorted.
    pub fn countries(&self) -> Vec<String> {
        distinct(self.meps.iter().map(|m| m.country.as_str()))
    }

    /// Distinct non-empty political groups, sorted.
    pub fn groups(&self) -> Vec<String> {
        distinct(self.meps.iter().map(|m| m.group.as_str()))
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Full name of a political group code, if known.
pub fn group_name(code: &str) -> Option<&'static str> {
    let name = match code {
        "EPP" => "European People's Party",
        "S&D" => "Socialists & Democrats",
        "Renew" => "Renew Europe",
        "Greens/EFA" => "Greens/European Free Alliance",
        "ECR" => "European Conservatives and Reformists",
        "PfE" => "Patriots for Europe",
        "The Left" => "The Left in the European Parliament",
        "ESN" => "Europe of Sovereign Nations",
        "NI" => "Non-Inscrits (Non-attached)",
        _ => return None,
    };
    Some(name)
}

pub fn parse_dataset(content: &str) -> Result<DirectoryData, DirectoryError> {
    Ok(serde_json::from_str(content)?)
}

/// Read the dataset, bypassing the cache.
#[instrument(skip_all)]
pub async fn fetch(source: &DataSource) -> Result<Vec<Representative>, DirectoryError> {
    let data = match source {
        DataSource::Bundled => parse_dataset(BUNDLED_DATASET)?,
        DataSource::File(path) => {
            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| DirectoryError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
            parse_dataset(&content)?
        }
    };
    if data.total_meps != data.meps.len() {
        debug!(
            declared = data.total_meps,
            actual = data.meps.len(),
            "dataset count mismatch"
        );
    }
    info!(count = data.meps.len(), last_updated = %data.last_updated, "loaded MEP dataset");
    Ok(data.meps)
}

/// Cached representatives if present and younger than `ttl`. A stale entry is
/// removed.
pub async fn load_cached(
    store: &dyn KvStore,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Option<Vec<Representative>> {
    let raw = match store.get(CACHE_KEY).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            warn!(?err, "failed to read directory cache");
            return None;
        }
    };
    let cached: CachedData = match serde_json::from_str(&raw) {
        Ok(c) => c,
        Err(err) => {
            warn!(?err, "ignoring corrupt directory cache");
            return None;
        }
    };
    if now - cached.timestamp > ttl {
        debug!(cached_at = %cached.timestamp, "directory cache expired");
        if let Err(err) = store.remove(CACHE_KEY).await {
            warn!(?err, "failed to drop stale directory cache");
        }
        return None;
    }
    Some(cached.meps)
}

/// Best-effort write of the cache snapshot.
pub async fn store_cache(store: &dyn KvStore, meps: &[Representative], now: DateTime<Utc>) {
    let data = CachedData {
        meps: meps.to_vec(),
        timestamp: now,
    };
    let json = match serde_json::to_string(&data) {
        Ok(json) => json,
        Err(err) => {
            warn!(?err, "failed to serialize directory cache");
            return;
        }
    };
    if let Err(err) = store.set(CACHE_KEY, &json).await {
        warn!(?err, "failed to write directory cache");
    }
}

/// Load the directory, preferring a fresh non-empty cache.
#[instrument(skip_all)]
pub async fn load(
    store: &dyn KvStore,
    source: &DataSource,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Result<Directory, DirectoryError> {
    if let Some(meps) = load_cached(store, now, ttl).await {
        if !meps.is_empty() {
            debug!(count = meps.len(), "using cached directory");
            return Ok(Directory { meps, from_cache: true });
        }
    }
    let meps = fetch(source).await?;
    store_cache(store, &meps, now).await;
    Ok(Directory::new(meps))
}

/// Drop the cache and read the dataset again (the "retry" action).
#[instrument(skip_all)]
pub async fn refetch(
    store: &dyn KvStore,
    source: &DataSource,
    now: DateTime<Utc>,
) -> Result<Directory, DirectoryError> {
    if let Err(err) = store.remove(CACHE_KEY).await {
        warn!(?err, "failed to clear directory cache");
    }
    let meps = fetch(source).await?;
    store_cache(store, &meps, now).await;
    Ok(Directory::new(meps))
}
