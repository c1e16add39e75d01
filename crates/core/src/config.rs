//! Configuration management for llamaserve.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config files (.llamaserve/config.yaml or an explicit path)
//! - Environment variables
//! - Command-line flags
//!
//! Later sources win. Relative model paths are resolved against the workspace.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers the inference service knows how to construct.
pub const KNOWN_PROVIDERS: [&str; 2] = ["gguf", "ollama"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .llamaserve/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// HTTP bind settings
    pub server: ServerConfig,

    /// Language model settings
    pub llm: LlmSettings,

    /// Optional YAML prompt definition replacing the built-in one
    pub prompt_file: Option<PathBuf>,

    /// API docs theme carried over from deployments that set one
    pub docs_theme: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit JSON log lines
    pub log_json: bool,
}

/// HTTP bind settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Language model settings shared by every provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSettings {
    /// Provider identifier ("gguf" or "ollama")
    pub provider: String,

    /// Quantized GGUF weight file (gguf provider)
    pub model_path: PathBuf,

    /// tokenizer.json matching the weights (gguf provider)
    pub tokenizer_path: PathBuf,

    /// Ollama base URL (ollama provider)
    pub endpoint: String,

    /// Ollama model tag (ollama provider)
    pub model: String,

    /// Maximum number of generated tokens
    pub max_new_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Sampling seed; unset draws a fresh seed for every request
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "gguf".to_string(),
            model_path: PathBuf::from("model/llama-2-7b.Q2_K.gguf"),
            tokenizer_path: PathBuf::from("model/tokenizer.json"),
            endpoint: "http://localhost:11434".to_string(),
            model: "llama2".to_string(),
            max_new_tokens: 256,
            temperature: 0.2,
            seed: None,
        }
    }
}

/// Command-line values that take precedence over every other source.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub workspace: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub provider: Option<String>,
    pub model_path: Option<PathBuf>,
    pub tokenizer_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub verbose: bool,
    pub no_color: bool,
    pub log_json: bool,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    server: Option<ServerSection>,
    llm: Option<LlmSection>,
    prompt: Option<PromptSection>,
    logging: Option<LoggingSection>,
    docs: Option<DocsSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ServerSection {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LlmSection {
    provider: Option<String>,
    #[serde(rename = "modelPath")]
    model_path: Option<PathBuf>,
    #[serde(rename = "tokenizerPath")]
    tokenizer_path: Option<PathBuf>,
    endpoint: Option<String>,
    model: Option<String>,
    #[serde(rename = "maxNewTokens")]
    max_new_tokens: Option<u32>,
    temperature: Option<f32>,
    seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PromptSection {
    file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocsSection {
    theme: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            server: ServerConfig::default(),
            llm: LlmSettings::default(),
            prompt_file: None,
            docs_theme: None,
            log_level: None,
            verbose: false,
            no_color: false,
            log_json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML file and environment variables.
    ///
    /// Environment variables:
    /// - `LLAMASERVE_WORKSPACE`: Override workspace path
    /// - `LLAMASERVE_CONFIG`: Path to config file
    /// - `LLAMASERVE_HOST` / `LLAMASERVE_PORT`: Bind address
    /// - `LLAMASERVE_PROVIDER`: LLM provider
    /// - `LLAMASERVE_MODEL_PATH` / `LLAMASERVE_TOKENIZER_PATH`: Local model files
    /// - `NO_COLOR`: Disable colored output
    ///
    /// `overrides.workspace` and `overrides.config_file` are consulted here
    /// because they decide which file is read; the rest is applied later by
    /// [`AppConfig::with_overrides`].
    pub fn load(overrides: &ConfigOverrides) -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("LLAMASERVE_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }
        if let Some(ref workspace) = overrides.workspace {
            config.workspace = workspace.clone();
        }

        if let Ok(config_file) = std::env::var("LLAMASERVE_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }
        if let Some(ref config_file) = overrides.config_file {
            config.config_file = Some(config_file.clone());
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.settings_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        config.apply_env()?;

        Ok(config)
    }

    /// Apply `LLAMASERVE_*` environment variables.
    fn apply_env(&mut self) -> AppResult<()> {
        if let Ok(host) = std::env::var("LLAMASERVE_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("LLAMASERVE_PORT") {
            self.server.port = port.parse().map_err(|_| {
                AppError::Config(format!("LLAMASERVE_PORT is not a valid port: {}", port))
            })?;
        }

        if let Ok(provider) = std::env::var("LLAMASERVE_PROVIDER") {
            self.llm.provider = provider;
        }

        if let Ok(path) = std::env::var("LLAMASERVE_MODEL_PATH") {
            self.llm.model_path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("LLAMASERVE_TOKENIZER_PATH") {
            self.llm.tokenizer_path = PathBuf::from(path);
        }

        if std::env::var("NO_COLOR").is_ok() {
            self.no_color = true;
        }

        Ok(())
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&self, contents: &str) -> AppResult<Self> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;
        let mut result = self.clone();

        if let Some(server) = config_file.server {
            if let Some(host) = server.host {
                result.server.host = host;
            }
            if let Some(port) = server.port {
                result.server.port = port;
            }
        }

        if let Some(llm) = config_file.llm {
            if let Some(provider) = llm.provider {
                result.llm.provider = provider;
            }
            if let Some(model_path) = llm.model_path {
                result.llm.model_path = model_path;
            }
            if let Some(tokenizer_path) = llm.tokenizer_path {
                result.llm.tokenizer_path = tokenizer_path;
            }
            if let Some(endpoint) = llm.endpoint {
                result.llm.endpoint = endpoint;
            }
            if let Some(model) = llm.model {
                result.llm.model = model;
            }
            if let Some(max_new_tokens) = llm.max_new_tokens {
                result.llm.max_new_tokens = max_new_tokens;
            }
            if let Some(temperature) = llm.temperature {
                result.llm.temperature = temperature;
            }
            if let Some(seed) = llm.seed {
                result.llm.seed = Some(seed);
            }
        }

        if let Some(prompt) = config_file.prompt {
            result.prompt_file = prompt.file;
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.log_json = json;
            }
        }

        if let Some(docs) = config_file.docs {
            result.docs_theme = docs.theme;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and the
    /// config file.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(workspace) = overrides.workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = overrides.config_file {
            self.config_file = Some(config_file);
        }

        if let Some(host) = overrides.host {
            self.server.host = host;
        }

        if let Some(port) = overrides.port {
            self.server.port = port;
        }

        if let Some(provider) = overrides.provider {
            self.llm.provider = provider;
        }

        if let Some(model_path) = overrides.model_path {
            self.llm.model_path = model_path;
        }

        if let Some(tokenizer_path) = overrides.tokenizer_path {
            self.llm.tokenizer_path = tokenizer_path;
        }

        // --log-level beats --verbose, which beats the config file
        if let Some(log_level) = overrides.log_level {
            self.log_level = Some(log_level);
            self.verbose |= overrides.verbose;
        } else if overrides.verbose {
            self.verbose = true;
            self.log_level = Some("debug".to_string());
        }

        if overrides.no_color {
            self.no_color = true;
        }

        if overrides.log_json {
            self.log_json = true;
        }

        self
    }

    /// Get the path to the .llamaserve directory.
    pub fn settings_dir(&self) -> PathBuf {
        self.workspace.join(".llamaserve")
    }

    /// Resolve a possibly relative path against the workspace.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    /// LLM settings with model paths resolved against the workspace.
    pub fn resolved_llm(&self) -> LlmSettings {
        LlmSettings {
            model_path: self.resolve_path(&self.llm.model_path),
            tokenizer_path: self.resolve_path(&self.llm.tokenizer_path),
            ..self.llm.clone()
        }
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.llm.provider.as_str();

        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if self.server.port == 0 {
            return Err(AppError::Config("Server port must not be 0".to_string()));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(AppError::Config(format!(
                "Temperature must be within 0.0-2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.llm.max_new_tokens == 0 {
            return Err(AppError::Config(
                "maxNewTokens must be greater than 0".to_string(),
            ));
        }

        if provider == "gguf" {
            let llm = self.resolved_llm();
            if !llm.model_path.exists() {
                return Err(AppError::Config(format!(
                    "GGUF model file not found: {:?}",
                    llm.model_path
                )));
            }
            if !llm.tokenizer_path.exists() {
                return Err(AppError::Config(format!(
                    "Tokenizer file not found: {:?}",
                    llm.tokenizer_path
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ollama_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.llm.provider = "ollama".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.llm.provider, "gguf");
        assert_eq!(
            config.llm.model_path,
            PathBuf::from("model/llama-2-7b.Q2_K.gguf")
        );
        assert_eq!(config.llm.max_new_tokens, 256);
        assert!((config.llm.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.llm.seed, None);
        assert_eq!(config.server.bind_address(), "127.0.0.1:8000");
        assert!(!config.verbose);
    }

    #[test]
    fn test_settings_dir() {
        let config = AppConfig::default();
        assert!(config.settings_dir().ends_with(".llamaserve"));
    }

    #[test]
    fn test_merge_yaml() {
        let yaml = r#"
server:
  port: 9000
llm:
  provider: ollama
  model: mistral
  maxNewTokens: 64
  temperature: 0.7
  seed: 7
logging:
  level: warn
  color: false
docs:
  theme: obsidian
"#;
        let merged = AppConfig::default().merge_yaml_str(yaml).unwrap();
        assert_eq!(merged.server.port, 9000);
        assert_eq!(merged.server.host, "127.0.0.1");
        assert_eq!(merged.llm.provider, "ollama");
        assert_eq!(merged.llm.model, "mistral");
        assert_eq!(merged.llm.max_new_tokens, 64);
        assert_eq!(merged.llm.seed, Some(7));
        assert_eq!(merged.log_level, Some("warn".to_string()));
        assert!(merged.no_color);
        assert_eq!(merged.docs_theme, Some("obsidian".to_string()));
    }

    #[test]
    fn test_merge_yaml_rejects_garbage() {
        let result = AppConfig::default().merge_yaml_str("server: [1, 2");
        assert!(result.is_err());
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(ConfigOverrides {
            provider: Some("ollama".to_string()),
            port: Some(8080),
            verbose: true,
            ..Default::default()
        });

        assert_eq!(overridden.llm.provider, "ollama");
        assert_eq!(overridden.server.port, 8080);
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_verbose_beats_config_file_level() {
        let config = AppConfig::default()
            .merge_yaml_str("logging:\n  level: warn\n")
            .unwrap();

        let verbose = config.clone().with_overrides(ConfigOverrides {
            verbose: true,
            ..Default::default()
        });
        assert_eq!(verbose.log_level, Some("debug".to_string()));

        let explicit = config.with_overrides(ConfigOverrides {
            verbose: true,
            log_level: Some("trace".to_string()),
            ..Default::default()
        });
        assert_eq!(explicit.log_level, Some("trace".to_string()));
        assert!(explicit.verbose);
    }

    #[test]
    fn test_resolve_path() {
        let mut config = AppConfig::default();
        config.workspace = PathBuf::from("/srv/app");
        assert_eq!(
            config.resolve_path(Path::new("model/x.gguf")),
            PathBuf::from("/srv/app/model/x.gguf")
        );
        assert_eq!(
            config.resolve_path(Path::new("/opt/x.gguf")),
            PathBuf::from("/opt/x.gguf")
        );
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.llm.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ollama() {
        assert!(ollama_config().validate().is_ok());
    }

    #[test]
    fn test_validate_temperature_range() {
        let mut config = ollama_config();
        config.llm.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_gguf_missing_model() {
        let temp = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.workspace = temp.path().to_path_buf();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("GGUF model file not found"));
    }

    #[test]
    fn test_validate_gguf_present() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("model")).unwrap();
        std::fs::write(temp.path().join("model/llama-2-7b.Q2_K.gguf"), b"GGUF").unwrap();
        std::fs::write(temp.path().join("model/tokenizer.json"), b"{}").unwrap();

        let mut config = AppConfig::default();
        config.workspace = temp.path().to_path_buf();
        assert!(config.validate().is_ok());
    }
}
