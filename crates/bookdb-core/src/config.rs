use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Where the record and chunk collections live and what their indexes are called.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: String,
    /// Vector store endpoint; defaults to `<data_dir>/<db_name>/lance`.
    pub uri: Option<String>,
    pub db_name: String,
    pub collection_name: String,
    pub vector_index_name: String,
    pub text_index_name: String,
    pub embedding_field: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            uri: None,
            db_name: "genai_devday_vs".to_string(),
            collection_name: "book".to_string(),
            vector_index_name: "vector_index".to_string(),
            text_index_name: "full_text_index_book".to_string(),
            embedding_field: "embedding".to_string(),
        }
    }
}

impl StoreConfig {
    pub fn db_dir(&self) -> PathBuf {
        expand_path(&self.data_dir).join(&self.db_name)
    }

    pub fn text_index_dir(&self) -> PathBuf {
        self.db_dir().join(&self.text_index_name)
    }

    pub fn vector_uri(&self) -> String {
        match &self.uri {
            Some(uri) => expand_path(uri).to_string_lossy().to_string(),
            None => self.db_dir().join("lance").to_string_lossy().to_string(),
        }
    }

    pub fn chunk_table(&self) -> String {
        format!("{}_chunks", self.collection_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub candidate_pool: usize,
    pub limit: usize,
    pub max_limit: usize,
    pub request_timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { candidate_pool: 50, limit: 6, max_limit: 50, request_timeout_ms: 10_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub model_dir: Option<String>,
    pub use_fake: bool,
    pub fake_dim: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { model: "thenlper/gte-base".to_string(), model_dir: None, use_fake: false, fake_dim: 768 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8000, static_dir: "ux/dist".to_string() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub search: SearchConfig,
    pub retry: RetryPolicy,
    pub embedding: EmbeddingConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(&env_name)
    }

    pub fn load_for_env(env_name: &str) -> Result<Self> {
        Self::from_figment(Self::figment(env_name))
    }

    /// Defaults <- `config.toml` <- `config.<env>.toml` <- `APP_*` env vars.
    pub fn figment(env_name: &str) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default())).merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment.merge(Env::prefixed("APP_").split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: AppConfig = figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let names = [
            ("store.db_name", &self.store.db_name),
            ("store.collection_name", &self.store.collection_name),
            ("store.vector_index_name", &self.store.vector_index_name),
            ("store.text_index_name", &self.store.text_index_name),
            ("store.embedding_field", &self.store.embedding_field),
        ];
        for (key, value) in names {
            if value.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("{key} must not be empty")));
            }
        }
        let search = &self.search;
        if search.limit == 0 {
            return Err(Error::InvalidConfig("search.limit must be at least 1".into()));
        }
        if search.limit > search.max_limit {
            return Err(Error::InvalidConfig(format!(
                "search.limit ({}) exceeds search.max_limit ({})",
                search.limit, search.max_limit
            )));
        }
        if search.candidate_pool < search.limit {
            return Err(Error::InvalidConfig(format!(
                "search.candidate_pool ({}) must be >= search.limit ({})",
                search.candidate_pool, search.limit
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::InvalidConfig("retry.max_attempts must be at least 1".into()));
        }
        if self.embedding.use_fake && self.embedding.fake_dim == 0 {
            return Err(Error::InvalidConfig("embedding.fake_dim must be at least 1".into()));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
