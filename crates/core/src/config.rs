//! Configuration management for the Umrah Guide engine and CLI.
//!
//! Configuration is layered, later layers winning:
//! 1. Built-in defaults
//! 2. Config file (`.umrah/config.yaml` in the workspace, or an explicit path)
//! 3. Environment variables (`UMRAH_*`, `RUST_LOG`, `NO_COLOR`)
//! 4. Command-line flags
//!
//! Secrets are never stored in the file: providers name the environment
//! variable holding their API key.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

const KNOWN_EMBEDDING_PROVIDERS: [&str; 3] = ["mock", "ollama", "gemini"];
const KNOWN_GENERATION_PROVIDERS: [&str; 2] = ["ollama", "gemini"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .umrah/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Collected source records (JSON snapshot), relative to the workspace
    pub data_path: PathBuf,

    /// Persisted index snapshot, relative to the workspace
    pub index_path: PathBuf,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    pub embedding: EmbeddingSettings,

    pub generation: GenerationSettings,

    pub retrieval: RetrievalSettings,
}

/// Embedding provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbeddingSettings {
    /// "mock", "ollama" or "gemini"
    pub provider: String,

    /// Provider-specific model identifier
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Custom endpoint (provider default when unset)
    pub endpoint: Option<String>,

    /// Environment variable holding the API key
    pub api_key_env: Option<String>,

    /// Texts per provider request
    pub batch_size: usize,

    /// Concurrent embedding requests during ingestion
    pub concurrency: usize,

    /// Attempts per request before a transient failure escalates
    pub max_retries: u32,

    /// Backoff before the first retry, doubled on each further attempt
    pub initial_backoff_ms: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            endpoint: None,
            api_key_env: None,
            batch_size: 16,
            concurrency: 4,
            max_retries: 3,
            initial_backoff_ms: 200,
        }
    }
}

/// Generative model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationSettings {
    /// "ollama" or "gemini"
    pub provider: String,

    /// Model identifier
    pub model: String,

    pub endpoint: Option<String>,

    pub api_key_env: Option<String>,

    pub temperature: f32,

    pub max_tokens: u32,

    /// Deadline for a single generative call
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            endpoint: None,
            api_key_env: None,
            temperature: 0.3,
            max_tokens: 1000,
            timeout_secs: 60,
        }
    }
}

/// Chunking and retrieval settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrievalSettings {
    /// Maximum chunk length in characters
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,

    /// Nearest neighbours retrieved per question
    pub top_k: usize,

    /// Sources cited per answer
    pub source_cap: usize,

    /// Characters of chunk text shown per cited source
    pub excerpt_chars: usize,

    /// Answer without retrieved context when the grounded call fails
    pub ungrounded_fallback: bool,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 5,
            source_cap: 3,
            excerpt_chars: 200,
            ungrounded_fallback: false,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    data_path: Option<String>,
    index_path: Option<String>,
    embedding: Option<EmbeddingSettings>,
    generation: Option<GenerationSettings>,
    retrieval: Option<RetrievalSettings>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            data_path: PathBuf::from(".umrah/umrah_scraped_data.json"),
            index_path: PathBuf::from(".umrah/index.sqlite"),
            log_level: None,
            verbose: false,
            no_color: false,
            embedding: EmbeddingSettings::default(),
            generation: GenerationSettings::default(),
            retrieval: RetrievalSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, config file and environment.
    ///
    /// Environment variables:
    /// - `UMRAH_WORKSPACE`: Override workspace path
    /// - `UMRAH_CONFIG`: Path to config file
    /// - `UMRAH_DATA`: Source records snapshot
    /// - `UMRAH_INDEX`: Index snapshot location
    /// - `UMRAH_PROVIDER` / `UMRAH_MODEL`: Generative provider and model
    /// - `UMRAH_EMBEDDING_PROVIDER` / `UMRAH_EMBEDDING_MODEL`: Embedding provider and model
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        Self::load_with(None, None)
    }

    /// Load configuration, letting explicit paths win over the environment.
    pub fn load_with(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace.or_else(|| env_path("UMRAH_WORKSPACE")) {
            config.workspace = workspace;
        }
        config.config_file = config_file.or_else(|| env_path("UMRAH_CONFIG"));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.umrah_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        config.apply_env();
        Ok(config)
    }

    /// Environment variables override the config file.
    fn apply_env(&mut self) {
        if let Some(data) = env_path("UMRAH_DATA") {
            self.data_path = data;
        }
        if let Some(index) = env_path("UMRAH_INDEX") {
            self.index_path = index;
        }
        if let Ok(provider) = std::env::var("UMRAH_PROVIDER") {
            self.generation.provider = provider;
        }
        if let Ok(model) = std::env::var("UMRAH_MODEL") {
            self.generation.model = model;
        }
        if let Ok(provider) = std::env::var("UMRAH_EMBEDDING_PROVIDER") {
            self.embedding.provider = provider;
        }
        if let Ok(model) = std::env::var("UMRAH_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.log_level = Some(level);
        }
        if std::env::var("NO_COLOR").is_ok() {
            self.no_color = true;
        }
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        Ok(self.clone().merge_file(file))
    }

    fn merge_file(mut self, file: ConfigFile) -> Self {
        if let Some(data) = file.data_path {
            self.data_path = PathBuf::from(data);
        }
        if let Some(index) = file.index_path {
            self.index_path = PathBuf::from(index);
        }
        if let Some(embedding) = file.embedding {
            self.embedding = embedding;
        }
        if let Some(generation) = file.generation {
            self.generation = generation;
        }
        if let Some(retrieval) = file.retrieval {
            self.retrieval = retrieval;
        }
        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                self.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                self.no_color = !color;
            }
        }
        self
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Flags take precedence over environment variables and the config file.
    pub fn with_overrides(
        mut self,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(provider) = provider {
            self.generation.provider = provider;
        }

        if let Some(model) = model {
            self.generation.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .umrah directory.
    pub fn umrah_dir(&self) -> PathBuf {
        self.workspace.join(".umrah")
    }

    /// Ensure the .umrah directory exists.
    pub fn ensure_umrah_dir(&self) -> AppResult<()> {
        let dir = self.umrah_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .umrah directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Absolute location of the source records snapshot.
    pub fn data_file(&self) -> PathBuf {
        self.resolve(&self.data_path)
    }

    /// Absolute location of the persisted index.
    pub fn index_file(&self) -> PathBuf {
        self.resolve(&self.index_path)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    /// Resolve the embedding provider API key from its environment variable.
    pub fn embedding_api_key(&self) -> Option<String> {
        resolve_api_key(self.embedding.api_key_env.as_deref(), &self.embedding.provider)
    }

    /// Resolve the generative provider API key from its environment variable.
    pub fn generation_api_key(&self) -> Option<String> {
        resolve_api_key(
            self.generation.api_key_env.as_deref(),
            &self.generation.provider,
        )
    }

    /// Validate provider names and retrieval bounds.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_EMBEDDING_PROVIDERS.contains(&self.embedding.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embedding.provider,
                KNOWN_EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        if !KNOWN_GENERATION_PROVIDERS.contains(&self.generation.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown generation provider: {}. Supported: {}",
                self.generation.provider,
                KNOWN_GENERATION_PROVIDERS.join(", ")
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be positive".to_string(),
            ));
        }

        if self.embedding.batch_size == 0 || self.embedding.concurrency == 0 {
            return Err(AppError::Config(
                "Embedding batch size and concurrency must be positive".to_string(),
            ));
        }

        if self.embedding.max_retries == 0 {
            return Err(AppError::Config(
                "Embedding max retries must be at least 1".to_string(),
            ));
        }

        if self.generation.timeout_secs == 0 {
            return Err(AppError::Config(
                "Generation timeout must be positive".to_string(),
            ));
        }

        let retrieval = &self.retrieval;
        if retrieval.chunk_size == 0 || retrieval.chunk_overlap >= retrieval.chunk_size {
            return Err(AppError::Config(format!(
                "Chunk overlap ({}) must be smaller than chunk size ({})",
                retrieval.chunk_overlap, retrieval.chunk_size
            )));
        }

        if retrieval.top_k == 0 || retrieval.source_cap == 0 {
            return Err(AppError::Config(
                "top_k and source_cap must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name).ok().map(PathBuf::from)
}

/// Look up an API key, falling back to the provider's conventional variables.
fn resolve_api_key(explicit_env: Option<&str>, provider: &str) -> Option<String> {
    if let Some(name) = explicit_env {
        return std::env::var(name).ok();
    }

    let fallbacks: &[&str] = match provider {
        "gemini" => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        _ => &[],
    };

    fallbacks.iter().find_map(|name| std::env::var(name).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.generation.provider, "ollama");
        assert_eq!(config.retrieval.chunk_size, 1000);
        assert_eq!(config.retrieval.chunk_overlap, 200);
        assert_eq!(config.retrieval.source_cap, 3);
        assert!(!config.retrieval.ungrounded_fallback);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_paths_resolve_against_workspace() {
        let config = AppConfig {
            workspace: PathBuf::from("/srv/umrah"),
            ..AppConfig::default()
        };
        assert_eq!(
            config.index_file(),
            PathBuf::from("/srv/umrah/.umrah/index.sqlite")
        );
        assert!(config.umrah_dir().ends_with(".umrah"));
    }

    #[test]
    fn test_merge_partial_yaml_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
indexPath: store/index.sqlite
embedding:
  provider: mock
  model: trigram-v1
  dimensions: 256
retrieval:
  topK: 8
logging:
  level: warn
  color: false
"#,
        )
        .unwrap();

        let config = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(config.index_path, PathBuf::from("store/index.sqlite"));
        assert_eq!(config.embedding.provider, "mock");
        assert_eq!(config.embedding.dimensions, 256);
        assert_eq!(config.embedding.max_retries, 3);
        assert_eq!(config.retrieval.top_k, 8);
        assert_eq!(config.retrieval.chunk_size, 1000);
        assert_eq!(config.log_level.as_deref(), Some("warn"));
        assert!(config.no_color);
    }

    #[test]
    fn test_with_overrides() {
        let overridden = AppConfig::default().with_overrides(
            Some("gemini".to_string()),
            Some("gemini-1.5-flash".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.generation.provider, "gemini");
        assert_eq!(overridden.generation.model, "gemini-1.5-flash");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.embedding.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_overlap_must_be_smaller_than_chunk() {
        let mut config = AppConfig::default();
        config.retrieval.chunk_overlap = config.retrieval.chunk_size;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_explicit_missing_config_file_is_error() {
        let temp = TempDir::new().unwrap();
        let result = AppConfig::load_with(
            Some(temp.path().to_path_buf()),
            Some(temp.path().join("missing.yaml")),
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
