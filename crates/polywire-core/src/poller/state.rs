//! Persisted deduplication state for the poller
//!
//! Holds every fingerprint ever emitted plus the caching validators of each
//! source. The file is rewritten atomically (temp file in the same directory,
//! then rename) so a crash mid-write leaves the previous state intact.

use std::collections::{BTreeMap, HashSet};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize, Serializer};

use crate::feed::CacheValidator;
use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollerState {
    #[serde(default, serialize_with = "serialize_sorted")]
    seen_keys: HashSet<String>,
    #[serde(default)]
    feed_state: BTreeMap<String, CacheValidator>,
}

fn serialize_sorted<S>(keys: &HashSet<String>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut sorted: Vec<&String> = keys.iter().collect();
    sorted.sort();
    serializer.collect_seq(sorted)
}

/// Sibling path used for the write-then-rename step
pub fn temp_path(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Config(format!("State path has no file name: {}", path.display())))?;
    let mut tmp: OsString = file_name.to_os_string();
    tmp.push(".tmp");
    Ok(path.with_file_name(tmp))
}

impl PollerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load state from disk. Missing, unreadable or corrupt files yield an
    /// empty state; the failure is logged, never returned.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(state) => {
                tracing::info!(
                    "Loaded state from {}: {} seen keys",
                    path.display(),
                    state.seen_keys.len()
                );
                state
            }
            Err(e) => {
                tracing::warn!("Failed to load state from {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load state from disk, surfacing read and decode errors
    pub fn try_load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read(path)?;
        Ok(serde_json::from_slice(&content)?)
    }

    /// Persist state. A failed write is logged and the in-memory state is
    /// kept, so the next successful save catches up.
    pub fn save(&self, path: &Path) -> bool {
        match self.write_atomic(path) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to save state to {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Serialize to a temp file next to `path`, then rename it over `path`
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = temp_path(path)?;
        let content = serde_json::to_vec_pretty(self)?;
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&content)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn is_seen(&self, fingerprint: &str) -> bool {
        self.seen_keys.contains(fingerprint)
    }

    /// Record a fingerprint; returns false if it was already present
    pub fn mark_seen(&mut self, fingerprint: impl Into<String>) -> bool {
        self.seen_keys.insert(fingerprint.into())
    }

    pub fn seen_count(&self) -> usize {
        self.seen_keys.len()
    }

    /// Validator stored for a source (empty if never fetched)
    pub fn validator(&self, source: &str) -> CacheValidator {
        self.feed_state.get(source).cloned().unwrap_or_default()
    }

    pub fn set_validator(&mut self, source: &str, validator: CacheValidator) {
        if validator.is_empty() && !self.feed_state.contains_key(source) {
            return;
        }
        self.feed_state.insert(source.to_string(), validator);
    }

    pub fn validators(&self) -> impl Iterator<Item = (&str, &CacheValidator)> {
        self.feed_state.iter().map(|(k, v)| (k.as_str(), v))
    }
}
