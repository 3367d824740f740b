use crate::index::HnswParams;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the DocuMind server.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the Gemini embedding/generation endpoints.
    pub gemini_api_key: Option<String>,
    /// Base URL of the Gemini REST API (overridable for tests and proxies).
    pub gemini_base_url: String,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Provider used to generate answers.
    pub generation_provider: GenerationProvider,
    /// Generation model identifier passed to the provider.
    pub generation_model: String,
    /// Sampling temperature for answer generation.
    pub generation_temperature: f32,
    /// Base URL of a local Ollama runtime.
    pub ollama_url: String,
    /// Timeout applied to every outbound provider request.
    pub request_timeout_secs: u64,
    /// Root of the transient upload area; wiped at startup, emptied after each request.
    pub temp_upload_dir: PathBuf,
    /// Largest accepted request body for uploads.
    pub max_upload_bytes: usize,
    /// Path or name of the `pdftotext` executable.
    pub pdftotext_bin: String,
    /// Chunking strategy applied to extracted text.
    pub chunk_strategy: ChunkStrategy,
    /// Chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Drop non-ASCII characters while cleaning extracted text.
    pub strip_non_ascii: bool,
    /// HNSW construction and search parameters.
    pub hnsw: HnswParams,
    /// Default number of chunks retrieved per query.
    pub query_top_k: usize,
    /// Chunks retrieved per document in multi-document sessions.
    pub multi_query_top_k: usize,
    /// Upper bound accepted for caller-supplied `k`.
    pub query_max_top_k: usize,
    /// Origins allowed by CORS; empty allows any origin.
    pub cors_allowed_origins: Vec<String>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Log file path; `None` writes to `logs/documind.log`.
    pub log_file: Option<PathBuf>,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// Hosted Gemini embeddings API.
    Gemini,
    /// Local Ollama runtime.
    Ollama,
    /// Deterministic in-process byte hashing, for offline use and tests.
    Hashed,
}

/// Supported answer-generation backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationProvider {
    /// Hosted Gemini `generateContent` API.
    Gemini,
    /// Local Ollama runtime.
    Ollama,
}

/// How extracted text is split into chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkStrategy {
    /// Fixed character windows advancing by `size - overlap`.
    Window,
    /// Boundary-aware splitting with a trailing character overlap.
    Semantic,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            embedding_provider: EmbeddingProvider::Gemini,
            embedding_model: "gemini-embedding-001".to_string(),
            embedding_dimension: 768,
            generation_provider: GenerationProvider::Gemini,
            generation_model: "gemini-2.5-flash".to_string(),
            generation_temperature: 0.2,
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            request_timeout_secs: 60,
            temp_upload_dir: PathBuf::from("./temp_uploads"),
            max_upload_bytes: 25 * 1024 * 1024,
            pdftotext_bin: "pdftotext".to_string(),
            chunk_strategy: ChunkStrategy::Window,
            chunk_size: 1000,
            chunk_overlap: 150,
            strip_non_ascii: false,
            hnsw: HnswParams::default(),
            query_top_k: 5,
            multi_query_top_k: 4,
            query_max_top_k: 50,
            cors_allowed_origins: Vec::new(),
            server_port: None,
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup, applying defaults for absent keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let hnsw = HnswParams {
            m: parse_or(&lookup, "HNSW_M", defaults.hnsw.m)?,
            ef_construction: parse_or(&lookup, "HNSW_EF_CONSTRUCTION", defaults.hnsw.ef_construction)?,
            ef_search: parse_or(&lookup, "HNSW_EF_SEARCH", defaults.hnsw.ef_search)?,
        };

        let config = Self {
            gemini_api_key: load_optional(&lookup, "GEMINI_API_KEY")
                .or_else(|| load_optional(&lookup, "GOOGLE_API_KEY")),
            gemini_base_url: load_optional(&lookup, "GEMINI_BASE_URL")
                .unwrap_or(defaults.gemini_base_url),
            embedding_provider: parse_or(&lookup, "EMBEDDING_PROVIDER", defaults.embedding_provider)?,
            embedding_model: load_optional(&lookup, "EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
            embedding_dimension: parse_or(&lookup, "EMBEDDING_DIMENSION", defaults.embedding_dimension)?,
            generation_provider: parse_or(&lookup, "GENERATION_PROVIDER", defaults.generation_provider)?,
            generation_model: load_optional(&lookup, "GENERATION_MODEL")
                .unwrap_or(defaults.generation_model),
            generation_temperature: parse_or(
                &lookup,
                "GENERATION_TEMPERATURE",
                defaults.generation_temperature,
            )?,
            ollama_url: load_optional(&lookup, "OLLAMA_URL").unwrap_or(defaults.ollama_url),
            request_timeout_secs: parse_or(&lookup, "REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?,
            temp_upload_dir: load_optional(&lookup, "TEMP_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_upload_dir),
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            pdftotext_bin: load_optional(&lookup, "PDFTOTEXT_BIN").unwrap_or(defaults.pdftotext_bin),
            chunk_strategy: parse_or(&lookup, "TEXT_SPLITTER_STRATEGY", defaults.chunk_strategy)?,
            chunk_size: parse_or(&lookup, "TEXT_SPLITTER_CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: parse_or(&lookup, "TEXT_SPLITTER_CHUNK_OVERLAP", defaults.chunk_overlap)?,
            strip_non_ascii: load_optional(&lookup, "TEXT_STRIP_NON_ASCII")
                .map(|value| parse_flag(&value, "TEXT_STRIP_NON_ASCII"))
                .transpose()?
                .unwrap_or(defaults.strip_non_ascii),
            hnsw,
            query_top_k: parse_or(&lookup, "QUERY_TOP_K", defaults.query_top_k)?,
            multi_query_top_k: parse_or(&lookup, "MULTI_QUERY_TOP_K", defaults.multi_query_top_k)?,
            query_max_top_k: parse_or(&lookup, "QUERY_MAX_TOP_K", defaults.query_max_top_k)?,
            cors_allowed_origins: load_optional(&lookup, "CORS_ALLOWED_ORIGINS")
                .map(|value| {
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|origin| !origin.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            server_port: load_optional(&lookup, "SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
            log_file: load_optional(&lookup, "DOCUMIND_LOG_FILE").map(PathBuf::from),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that would make the pipeline misbehave at request time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidValue("TEXT_SPLITTER_CHUNK_SIZE".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::InvalidValue(
                "TEXT_SPLITTER_CHUNK_OVERLAP (must be smaller than the chunk size)".into(),
            ));
        }
        if self.hnsw.m < 2 {
            return Err(ConfigError::InvalidValue("HNSW_M (must be at least 2)".into()));
        }
        if self.hnsw.ef_construction == 0 || self.hnsw.ef_search == 0 {
            return Err(ConfigError::InvalidValue("HNSW_EF_CONSTRUCTION/HNSW_EF_SEARCH".into()));
        }
        if self.query_top_k == 0 || self.multi_query_top_k == 0 || self.query_max_top_k == 0 {
            return Err(ConfigError::InvalidValue("QUERY_TOP_K".into()));
        }
        Ok(())
    }

    /// Whether any configured provider talks to the hosted Gemini API.
    pub fn requires_gemini_credential(&self) -> bool {
        self.embedding_provider == EmbeddingProvider::Gemini
            || self.generation_provider == GenerationProvider::Gemini
    }

    /// Emit the non-secret parts of the configuration.
    pub fn log_summary(&self) {
        tracing::info!(
            embedding_provider = ?self.embedding_provider,
            embedding_model = %self.embedding_model,
            generation_provider = ?self.generation_provider,
            generation_model = %self.generation_model,
            chunk_strategy = ?self.chunk_strategy,
            temp_upload_dir = %self.temp_upload_dir.display(),
            server_port = ?self.server_port,
            has_gemini_key = self.gemini_api_key.is_some(),
            "Loaded configuration"
        );
    }

    /// Fail when a Gemini provider is configured without a credential.
    pub fn ensure_credentials(&self) -> Result<(), ConfigError> {
        if self.requires_gemini_credential() && self.gemini_api_key.is_none() {
            return Err(ConfigError::MissingVariable("GEMINI_API_KEY".to_string()));
        }
        Ok(())
    }
}

fn load_optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|value| !value.trim().is_empty())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match load_optional(lookup, key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

fn parse_flag(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue(key.to_string())),
    }
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            "hashed" | "local" => Ok(Self::Hashed),
            _ => Err(()),
        }
    }
}

impl FromStr for GenerationProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

impl FromStr for ChunkStrategy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "window" | "fixed" => Ok(Self::Window),
            "semantic" | "recursive" => Ok(Self::Semantic),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
///
/// Runs before tracing is installed; call [`Config::log_summary`] once a subscriber exists.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    CONFIG.set(config).expect("Failed to set config");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = Config::from_lookup(lookup_from(&[])).expect("config");
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 150);
        assert_eq!(config.hnsw.m, 32);
        assert_eq!(config.hnsw.ef_construction, 200);
        assert_eq!(config.hnsw.ef_search, 64);
        assert_eq!(config.temp_upload_dir, PathBuf::from("./temp_uploads"));
        assert_eq!(config.embedding_provider, EmbeddingProvider::Gemini);
        assert!(config.gemini_api_key.is_none());
        assert!(config.log_file.is_none());
    }

    #[derive(Clone, Default)]
    struct CapturedLog(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("log buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn log_summary_is_recorded_without_secrets() {
        let captured = CapturedLog::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let config = Config {
            gemini_api_key: Some("super-secret-key".into()),
            ..Config::default()
        };

        tracing::subscriber::with_default(subscriber, || config.log_summary());

        let output = String::from_utf8(captured.0.lock().expect("log buffer").clone()).expect("utf8");
        assert!(output.contains("Loaded configuration"), "{output}");
        assert!(output.contains("has_gemini_key=true"), "{output}");
        assert!(!output.contains("super-secret-key"));
    }

    #[test]
    fn log_file_is_read_from_environment() {
        let config = Config::from_lookup(lookup_from(&[("DOCUMIND_LOG_FILE", "/var/log/documind/app.log")]))
            .expect("config");
        assert_eq!(config.log_file, Some(PathBuf::from("/var/log/documind/app.log")));
    }

    #[test]
    fn google_api_key_is_accepted_as_fallback() {
        let config =
            Config::from_lookup(lookup_from(&[("GOOGLE_API_KEY", "secret")])).expect("config");
        assert_eq!(config.gemini_api_key.as_deref(), Some("secret"));
        assert!(config.ensure_credentials().is_ok());
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk_size() {
        let error = Config::from_lookup(lookup_from(&[
            ("TEXT_SPLITTER_CHUNK_SIZE", "100"),
            ("TEXT_SPLITTER_CHUNK_OVERLAP", "100"),
        ]))
        .unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue(key) if key.contains("OVERLAP")));
    }

    #[test]
    fn rejects_unknown_provider() {
        let error =
            Config::from_lookup(lookup_from(&[("EMBEDDING_PROVIDER", "quantum")])).unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue(key) if key == "EMBEDDING_PROVIDER"));
    }

    #[test]
    fn missing_credential_is_reported_for_gemini_providers() {
        let config = Config::default();
        assert!(matches!(
            config.ensure_credentials(),
            Err(ConfigError::MissingVariable(key)) if key == "GEMINI_API_KEY"
        ));

        let local = Config {
            embedding_provider: EmbeddingProvider::Hashed,
            generation_provider: GenerationProvider::Ollama,
            ..Config::default()
        };
        assert!(local.ensure_credentials().is_ok());
    }

    #[test]
    fn parses_cors_origins_list() {
        let config = Config::from_lookup(lookup_from(&[(
            "CORS_ALLOWED_ORIGINS",
            "https://a.example, https://b.example,,",
        )]))
        .expect("config");
        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }
}
