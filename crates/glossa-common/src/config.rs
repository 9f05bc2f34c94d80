use miette::Result;
use miette::miette;
use serde::{Deserialize, Serialize};

use std::future::Future;
use std::path::Path;
use std::path::PathBuf;

use crate::error::{ParseError, SerDeError};

/// System prompt sent with every analysis request.
pub const DEFAULT_SYSTEM_PROMPT: &str = "Identify 2-3 important terms or concepts strictly from the text (if there are any) and provide very brief definitions. Return as JSON array with 'term' and 'definition' fields.";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External term analyzer settings.
    pub analyzer: AnalyzerConfig,
    /// Editing surface settings.
    pub editor: EditorConfig,
    /// Where documents are persisted.
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`).
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the api key.
    pub api_key_env: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.groq.com/openai/v1".to_owned(),
            model: "mixtral-8x7b-32768".to_owned(),
            api_key_env: "GROQ_API_KEY".to_owned(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
            temperature: 0.3,
            max_tokens: 250,
            timeout_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Quiet period after the last edit before analysis runs.
    pub debounce_ms: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self { debounce_ms: 1000 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the document store. `None` uses the platform data dir.
    pub path: Option<PathBuf>,
}

impl Config {
    /// Loads the configuration from the provided loader.
    pub async fn load(loader: &impl Loader) -> Result<Self> {
        loader
            .load()
            .await
            .map_err(|e| miette!("Failed to load configuration: {e}"))
    }
    /// Saves the configuration using the provided saver.
    pub async fn save(&self, saver: &impl Saver) -> Result<()> {
        saver
            .save(self)
            .await
            .map_err(|e| miette!("Failed to save configuration: {e}"))
    }
}

/// The trait for loading configuration data.
pub trait Loader {
    /// Loads the configuration data.
    fn load(
        &self,
    ) -> impl Future<
        Output = core::result::Result<Config, Box<dyn std::error::Error + Send + Sync + 'static>>,
    > + Send;
}

/// The trait for saving configuration data.
pub trait Saver {
    /// Saves the configuration data.
    fn save(
        &self,
        config: &Config,
    ) -> impl Future<
        Output = core::result::Result<(), Box<dyn std::error::Error + Send + Sync + 'static>>,
    > + Send;
}

/// An implementation of [`Loader`] and [`Saver`] that reads and writes a configuration file.
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    /// Create a new [`ConfigFile`] with the given path.
    ///
    /// [`Config`] data will be serialized and deserialized using the file extension.
    /// `.json` and `.toml` are supported.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Loader for ConfigFile {
    async fn load(
        &self,
    ) -> core::result::Result<Config, Box<dyn std::error::Error + Send + Sync + 'static>> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }
        let text = std::fs::read_to_string(&self.path)?;
        match self.path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(ParseError::parse_json("config.json", &text)?),
            Some("toml") => Ok(toml::from_str(&text).map_err(ParseError::from)?),
            _ => Err(miette!("Unsupported file format").into()),
        }
    }
}

impl Saver for ConfigFile {
    async fn save(
        &self,
        config: &Config,
    ) -> core::result::Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        match self.path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(std::fs::write(
                &self.path,
                serde_json::to_string_pretty(config).map_err(SerDeError::from)?,
            )?),
            Some("toml") => Ok(std::fs::write(
                &self.path,
                toml::to_string_pretty(config).map_err(SerDeError::from)?,
            )?),
            _ => Err(miette!("Unsupported file format").into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let file = ConfigFile::new(dir.path().join("glossa.toml"));
        let config = Config::load(&file).await.unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.editor.debounce_ms, 1000);
    }

    #[tokio::test]
    async fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = ConfigFile::new(dir.path().join("glossa.toml"));
        let mut config = Config::default();
        config.editor.debounce_ms = 250;
        config.analyzer.model = "llama3-8b-8192".into();
        config.save(&file).await.unwrap();

        let loaded = Config::load(&file).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_partial_json_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glossa.json");
        std::fs::write(&path, r#"{"editor": {"debounce_ms": 50}}"#).unwrap();

        let config = Config::load(&ConfigFile::new(&path)).await.unwrap();
        assert_eq!(config.editor.debounce_ms, 50);
        assert_eq!(config.analyzer, AnalyzerConfig::default());
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glossa.ini");
        std::fs::write(&path, "x=1").unwrap();
        assert!(Config::load(&ConfigFile::new(&path)).await.is_err());
    }
}
