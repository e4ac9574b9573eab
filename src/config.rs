//! Construction-time configuration for the manager and scheduler.
//!
//! Everything here is validated synchronously: a bad configuration fails the
//! constructor, it is never discovered later by the background loop.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::app::{Result, TokenbookError};
use crate::domain::ListDetails;

/// How often the scheduler wakes up versus how often it actually refreshes.
/// The check interval must not exceed the refresh interval, otherwise whole
/// refresh windows would be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshIntervals {
    check_interval: Duration,
    refresh_interval: Duration,
}

impl RefreshIntervals {
    pub fn new(check_interval: Duration, refresh_interval: Duration) -> Result<Self> {
        if check_interval.is_zero() || refresh_interval.is_zero() {
            return Err(TokenbookError::Config(
                "refresh intervals must be non-zero".into(),
            ));
        }
        if check_interval > refresh_interval {
            return Err(TokenbookError::Config(format!(
                "check interval ({:?}) must not exceed refresh interval ({:?})",
                check_interval, refresh_interval
            )));
        }
        Ok(Self {
            check_interval,
            refresh_interval,
        })
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }
}

/// A statically configured list: where it lives remotely plus the bundled
/// bytes used until (and whenever) no fetched copy is available.
#[derive(Debug, Clone)]
pub struct InitialList {
    pub details: ListDetails,
    pub raw: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Chain allow-list; tokens on other chains never enter the index.
    pub chains: Vec<u64>,
    /// Bundled lists, always present in the catalog.
    pub initial_lists: Vec<InitialList>,
    /// Which initial list is the designated main list.
    pub main_list_id: String,
    /// Id under which the remote "list of lists" manifest is persisted, if
    /// one is configured; excluded from the extra-lists merge pass.
    pub manifest_list_id: Option<String>,
}

impl ManagerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chains.is_empty() {
            return Err(TokenbookError::Config(
                "at least one chain must be configured".into(),
            ));
        }
        let mut seen = Vec::new();
        for list in &self.initial_lists {
            list.details.validate()?;
            if seen.contains(&&list.details.id) {
                return Err(TokenbookError::Config(format!(
                    "duplicate initial list id {:?}",
                    list.details.id
                )));
            }
            seen.push(&list.details.id);
        }
        if !seen.iter().any(|id| **id == self.main_list_id) {
            return Err(TokenbookError::Config(format!(
                "main list {:?} is not among the initial lists",
                self.main_list_id
            )));
        }
        Ok(())
    }

    /// Loads a config file, resolving each initial list's `file` entry
    /// relative to the file's own directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&content, base)
    }

    pub fn from_toml_str(content: &str, base: &Path) -> Result<Self> {
        let raw: RawConfig =
            toml::from_str(content).map_err(|e| TokenbookError::Config(e.to_string()))?;

        let mut initial_lists = Vec::with_capacity(raw.initial_lists.len());
        for entry in raw.initial_lists {
            let bytes = match entry.file {
                Some(file) => {
                    let file_path = resolve(base, &file);
                    fs::read(&file_path)?
                }
                None => Vec::new(),
            };
            initial_lists.push(InitialList {
                details: ListDetails {
                    id: entry.id,
                    source_url: entry.source_url,
                    schema: entry.schema,
                },
                raw: bytes,
            });
        }

        let config = Self {
            chains: raw.chains,
            initial_lists,
            main_list_id: raw.main_list_id,
            manifest_list_id: raw.manifest_list_id,
        };
        config.validate()?;
        Ok(config)
    }
}

fn resolve(base: &Path, file: &str) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    chains: Vec<u64>,
    main_list_id: String,
    #[serde(default)]
    manifest_list_id: Option<String>,
    #[serde(default)]
    initial_lists: Vec<RawInitialList>,
}

#[derive(Debug, Deserialize)]
struct RawInitialList {
    id: String,
    source_url: String,
    #[serde(default)]
    schema: Option<String>,
    /// Path to the bundled copy of this list, relative to the config file.
    #[serde(default)]
    file: Option<String>,
}
