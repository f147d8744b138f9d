//! Store configuration and factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use safetrain_core::memory::MemoryRepository;
use safetrain_core::traits::Repository;
use safetrain_core::EngineConfig;

use crate::airtable::{AirtableStore, TableNames};

pub const CONFIG_FILE: &str = "safetrain.toml";
pub const API_KEY_ENV: &str = "SAFETRAIN_API_KEY";

/// Which record store backs the engine.
///
/// Note: Custom Debug impl masks the API key.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    Airtable {
        #[serde(default)]
        api_key: String,
        base_id: String,
        #[serde(default)]
        base_url: Option<String>,
    },
    /// JSON snapshot loaded into memory and written back after submissions.
    Fixture {
        #[serde(default = "default_fixture_path")]
        path: PathBuf,
    },
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreConfig::Airtable {
                api_key: _,
                base_id,
                base_url,
            } => f
                .debug_struct("Airtable")
                .field("api_key", &"***")
                .field("base_id", base_id)
                .field("base_url", base_url)
                .finish(),
            StoreConfig::Fixture { path } => {
                f.debug_struct("Fixture").field("path", path).finish()
            }
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Fixture {
            path: default_fixture_path(),
        }
    }
}

fn default_fixture_path() -> PathBuf {
    PathBuf::from("fixtures/store.json")
}

/// Top-level safetrain configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetrainConfig {
    #[serde(default)]
    pub store: StoreConfig,
    /// Table names in the record store.
    #[serde(default)]
    pub tables: TableNames,
    /// Most answer rows per create call.
    #[serde(default = "default_answer_batch_size")]
    pub answer_batch_size: usize,
    /// Most employee IDs per approved-attempt query.
    #[serde(default = "default_employee_chunk_size")]
    pub employee_chunk_size: usize,
}

fn default_answer_batch_size() -> usize {
    10
}
fn default_employee_chunk_size() -> usize {
    25
}

impl Default for SafetrainConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            tables: TableNames::default(),
            answer_batch_size: default_answer_batch_size(),
            employee_chunk_size: default_employee_chunk_size(),
        }
    }
}

impl SafetrainConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            answer_batch_size: self.answer_batch_size.max(1),
            employee_chunk_size: self.employee_chunk_size.max(1),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let value = std::env::var(&result[start + 2..start + end]).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
    }
    result
}

fn resolve_store_config(config: &StoreConfig) -> StoreConfig {
    match config {
        StoreConfig::Airtable {
            api_key,
            base_id,
            base_url,
        } => StoreConfig::Airtable {
            api_key: resolve_env_vars(api_key),
            base_id: resolve_env_vars(base_id),
            base_url: base_url.as_deref().map(resolve_env_vars),
        },
        StoreConfig::Fixture { path } => StoreConfig::Fixture {
            path: PathBuf::from(resolve_env_vars(&path.to_string_lossy())),
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `safetrain.toml` in the current directory
/// 2. `~/.config/safetrain/config.toml`
///
/// `SAFETRAIN_API_KEY` overrides the Airtable API key.
pub fn load_config() -> Result<SafetrainConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<SafetrainConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from(CONFIG_FILE);
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|dir| dir.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<SafetrainConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => SafetrainConfig::default(),
    };

    config.store = resolve_store_config(&config.store);

    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if let StoreConfig::Airtable { api_key, .. } = &mut config.store {
            *api_key = key;
        }
    }

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("safetrain"))
}

/// A configured record store.
pub enum Backend {
    Airtable(Arc<AirtableStore>),
    Fixture {
        repo: Arc<MemoryRepository>,
        path: PathBuf,
    },
}

impl Backend {
    pub fn repository(&self) -> Arc<dyn Repository> {
        match self {
            Backend::Airtable(store) => store.clone(),
            Backend::Fixture { repo, .. } => repo.clone(),
        }
    }

    /// Persist in-memory writes. A no-op for remote stores.
    pub fn flush(&self) -> Result<()> {
        match self {
            Backend::Airtable(_) => Ok(()),
            Backend::Fixture { repo, path } => repo.snapshot().save_json(path),
        }
    }
}

/// Create the record store described by the configuration.
pub fn create_backend(config: &SafetrainConfig) -> Result<Backend> {
    match &config.store {
        StoreConfig::Airtable {
            api_key,
            base_id,
            base_url,
        } => {
            if api_key.is_empty() {
                anyhow::bail!("no Airtable API key configured; set {API_KEY_ENV}");
            }
            Ok(Backend::Airtable(Arc::new(AirtableStore::new(
                api_key,
                base_id,
                base_url.clone(),
                config.tables.clone(),
            ))))
        }
        StoreConfig::Fixture { path } => {
            let repo = MemoryRepository::load_json(path)
                .with_context(|| format!("failed to load fixture: {}", path.display()))?;
            Ok(Backend::Fixture {
                repo: Arc::new(repo),
                path: path.clone(),
            })
        }
    }
}
