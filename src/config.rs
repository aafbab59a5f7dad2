use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_CHAT_MAX_TOKENS: u32 = 1000;
const DEFAULT_CHAT_TEMPERATURE: f32 = 0.3;
const DEFAULT_KNOWLEDGE_COLLECTION: &str = "project-knowledge";
const DEFAULT_RETRIEVAL_TOP_K: usize = 5;
const DEFAULT_INPUT_MAX_LENGTH: usize = 800;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
const DEFAULT_READER_URL: &str = "https://r.jina.ai";
const DEFAULT_SITE_BASE_URL: &str = "https://www.example-floors.bg";
const DEFAULT_PRODUCT_CATALOG_PATH: &str = "data/products.json";
const DEFAULT_DOCUMENTS_DIR: &str = "data/documents";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// Configuration was already installed for this process.
    #[error("Configuration already initialized")]
    AlreadyInitialized,
}

/// Runtime configuration shared by the chat server and the indexer.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// API key sent to the hosted embedding and chat-completion services.
    pub openai_api_key: String,
    /// Base URL of the OpenAI-compatible API.
    pub openai_base_url: String,
    /// Embedding model identifier.
    pub embedding_model: String,
    /// Dimensionality of every vector in the knowledge base.
    pub embedding_dimension: usize,
    /// Chat model used to answer questions.
    pub chat_model: String,
    /// Upper bound on generated tokens per answer.
    pub chat_max_tokens: u32,
    /// Sampling temperature for answers.
    pub chat_temperature: f32,
    /// Base URL of the Qdrant instance holding the knowledge base.
    pub qdrant_url: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Name of the collection storing knowledge chunks.
    pub knowledge_collection: String,
    /// Number of chunks retrieved per question.
    pub retrieval_top_k: usize,
    /// Maximum accepted length of a user message, in characters.
    pub input_max_length: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Timeout applied to every outbound HTTP request.
    pub http_timeout_secs: u64,
    /// Base URL of the page reader service used by the indexer.
    pub reader_url: String,
    /// Optional API key for the page reader service.
    pub reader_api_key: Option<String>,
    /// Public storefront URL whose pages are indexed.
    pub site_base_url: String,
    /// JSON product catalog consumed by the indexer.
    pub product_catalog_path: PathBuf,
    /// Directory scanned by the document indexer.
    pub documents_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Blank values are treated as absent so that an empty `.env` entry falls back to the default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Lookup(lookup);
        let config = Self {
            openai_api_key: vars.required("OPENAI_API_KEY")?,
            openai_base_url: vars.or("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
            embedding_model: vars.or("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            embedding_dimension: vars.parsed("EMBEDDING_DIMENSION", DEFAULT_EMBEDDING_DIMENSION)?,
            chat_model: vars.or("CHAT_MODEL", DEFAULT_CHAT_MODEL),
            chat_max_tokens: vars.parsed("CHAT_MAX_TOKENS", DEFAULT_CHAT_MAX_TOKENS)?,
            chat_temperature: vars.parsed("CHAT_TEMPERATURE", DEFAULT_CHAT_TEMPERATURE)?,
            qdrant_url: vars.required("QDRANT_URL")?,
            qdrant_api_key: vars.optional("QDRANT_API_KEY"),
            knowledge_collection: vars.or("KNOWLEDGE_COLLECTION", DEFAULT_KNOWLEDGE_COLLECTION),
            retrieval_top_k: vars.parsed("RETRIEVAL_TOP_K", DEFAULT_RETRIEVAL_TOP_K)?,
            input_max_length: vars.parsed("INPUT_MAX_LENGTH", DEFAULT_INPUT_MAX_LENGTH)?,
            server_port: vars
                .optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
            http_timeout_secs: vars.parsed("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
            reader_url: vars.or("READER_URL", DEFAULT_READER_URL),
            reader_api_key: vars.optional("READER_API_KEY"),
            site_base_url: vars.or("SITE_BASE_URL", DEFAULT_SITE_BASE_URL),
            product_catalog_path: vars
                .or("PRODUCT_CATALOG_PATH", DEFAULT_PRODUCT_CATALOG_PATH)
                .into(),
            documents_dir: vars.or("DOCUMENTS_DIR", DEFAULT_DOCUMENTS_DIR).into(),
        };

        if config.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
        }
        if config.retrieval_top_k == 0 {
            return Err(ConfigError::InvalidValue("RETRIEVAL_TOP_K".into()));
        }
        if config.input_max_length == 0 {
            return Err(ConfigError::InvalidValue("INPUT_MAX_LENGTH".into()));
        }

        Ok(config)
    }
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.optional(key) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string())),
            None => Ok(default),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.knowledge_collection,
        embedding_model = %config.embedding_model,
        chat_model = %config.chat_model,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG
        .set(config)
        .map_err(|_| ConfigError::AlreadyInitialized)?;
    CONFIG.get().ok_or(ConfigError::AlreadyInitialized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn applies_defaults_for_optional_values() {
        let config = Config::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("QDRANT_URL", "http://127.0.0.1:6333"),
        ]))
        .expect("config");

        assert_eq!(config.knowledge_collection, "project-knowledge");
        assert_eq!(config.embedding_dimension, 1536);
        assert_eq!(config.retrieval_top_k, 5);
        assert_eq!(config.input_max_length, 800);
        assert_eq!(config.server_port, None);
        assert!(config.qdrant_api_key.is_none());
    }

    #[test]
    fn missing_required_variable_is_reported() {
        let error = Config::from_lookup(lookup(&[("QDRANT_URL", "http://127.0.0.1:6333")]))
            .expect_err("missing key");
        assert!(matches!(error, ConfigError::MissingVariable(key) if key == "OPENAI_API_KEY"));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("QDRANT_URL", "http://127.0.0.1:6333"),
            ("CHAT_MODEL", "   "),
            ("QDRANT_API_KEY", ""),
        ]))
        .expect("config");
        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert!(config.qdrant_api_key.is_none());
    }

    #[test]
    fn rejects_unparseable_numbers() {
        let error = Config::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("QDRANT_URL", "http://127.0.0.1:6333"),
            ("RETRIEVAL_TOP_K", "five"),
        ]))
        .expect_err("invalid number");
        assert!(matches!(error, ConfigError::InvalidValue(key) if key == "RETRIEVAL_TOP_K"));
    }

    #[test]
    fn rejects_zero_dimension() {
        let error = Config::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("QDRANT_URL", "http://127.0.0.1:6333"),
            ("EMBEDDING_DIMENSION", "0"),
        ]))
        .expect_err("zero dimension");
        assert!(matches!(error, ConfigError::InvalidValue(key) if key == "EMBEDDING_DIMENSION"));
    }
}
