use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Configuration for generating and storing protocols.
///
/// Secrets are never part of the file; see [`Secrets`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// Settings for the language model endpoint.
    pub generation: GenerationSettings,

    /// Which backend stores protocols, and where.
    pub storage: StorageSettings,

    /// Public base URL of the site, used to build share links.
    ///
    /// Always ends with a `/`.
    public_url: String,
}

/// Settings for the chat-completions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// URL of an OpenAI-compatible chat completions endpoint.
    pub endpoint: String,
    /// Model name sent with each request.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound on the length of the response.
    pub max_tokens: u32,
    /// Seconds to wait for the model before giving up.
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            temperature: 0.7,
            max_tokens: 3500,
            timeout_secs: 60,
        }
    }
}

/// The storage backends protocols can live in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// A local SQLite file whose schema is evolved in place on startup.
    #[default]
    Sqlite,
    /// A hosted table behind a REST interface with a fixed schema.
    Remote,
}

/// Storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Which backend to use.
    pub backend: Backend,
    /// Path of the SQLite database file.
    pub path: PathBuf,
    /// Table name, shared by both backends.
    pub table: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: Backend::Sqlite,
            path: PathBuf::from("protocolos.db"),
            table: "protocolos".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            generation: GenerationSettings::default(),
            storage: StorageSettings::default(),
            public_url: default_public_url(),
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the configuration if the file exists, otherwise returns the
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Public base URL of the site, ending with a `/`.
    #[must_use]
    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    /// Sets the public base URL, appending a trailing `/` if needed.
    pub fn set_public_url(&mut self, url: &str) {
        self.public_url = normalise_base_url(url);
    }
}

/// Secrets read from the environment (or a `.env` file loaded beforehand).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Secrets {
    /// API key for the language model endpoint (`GROQ_API_KEY`).
    pub generation_api_key: Option<String>,
    /// Base URL of the remote table service (`SUPABASE_URL`).
    pub remote_url: Option<String>,
    /// API key of the remote table service (`SUPABASE_KEY`).
    pub remote_key: Option<String>,
}

impl Secrets {
    /// Reads secrets from the process environment.
    ///
    /// Empty variables count as unset.
    #[must_use]
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            generation_api_key: var("GROQ_API_KEY"),
            remote_url: var("SUPABASE_URL"),
            remote_key: var("SUPABASE_KEY"),
        }
    }

    /// Returns a setting or a [`ConfigError::MissingSetting`] naming it.
    ///
    /// # Errors
    ///
    /// Returns an error if the setting is absent.
    pub fn require<'a>(
        value: Option<&'a String>,
        name: &'static str,
    ) -> Result<&'a str, ConfigError> {
        value
            .map(String::as_str)
            .ok_or(ConfigError::MissingSetting(name))
    }
}

/// Errors raised while loading or saving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
    /// The file is not valid configuration TOML.
    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        source: toml::de::Error,
    },
    /// The configuration could not be serialized.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// The file could not be written.
    #[error("failed to write config file {}: {source}", path.display())]
    Write {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
    /// A required setting is not set.
    #[error("{0} is not set")]
    MissingSetting(&'static str),
}

fn default_public_url() -> String {
    "http://127.0.0.1:5000/".to_string()
}

fn normalise_base_url(url: &str) -> String {
    let url = url.trim();
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_public_url")]
        public_url: String,

        #[serde(default)]
        generation: GenerationSettings,

        #[serde(default)]
        storage: StorageSettings,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                public_url,
                generation,
                storage,
            } => Self {
                generation,
                storage,
                public_url: normalise_base_url(&public_url),
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            public_url: config.public_url,
            generation: config.generation,
            storage: config.storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn load_reads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            b"_version = \"1\"\npublic_url = \"https://labs.example.pt\"\n\n[generation]\nmodel = \"llama-3.1-8b-instant\"\nmax_tokens = 2000\n\n[storage]\nbackend = \"remote\"\ntable = \"protocolos_v2\"\n",
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.public_url(), "https://labs.example.pt/");
        assert_eq!(config.generation.model, "llama-3.1-8b-instant");
        assert_eq!(config.generation.max_tokens, 2000);
        assert_eq!(config.generation.timeout_secs, 60);
        assert_eq!(config.storage.backend, Backend::Remote);
        assert_eq!(config.storage.table, "protocolos_v2");
        assert_eq!(config.storage.path, PathBuf::from("protocolos.db"));
    }

    #[test]
    fn load_missing_file_returns_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.toml");

        let error = Config::load(&missing).unwrap_err();
        assert!(matches!(error, ConfigError::Read { .. }));
        assert!(error.to_string().starts_with("failed to read config file"));
    }

    #[test]
    fn load_or_default_tolerates_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.toml");

        assert_eq!(Config::load_or_default(&missing).unwrap(), Config::default());
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"_version = \"1\"\n[storage]\nbackend = \"postgres\"\n")
            .unwrap();

        let error = Config::load(file.path()).unwrap_err();
        assert!(matches!(error, ConfigError::Parse { .. }));
    }

    #[test]
    fn empty_file_returns_default() {
        // Tests that deserialising an empty file returns the default configuration.
        let expected = Config::default();
        let actual: Config = toml::from_str(r#"_version = "1""#).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("protolab.toml");
        let mut config = Config::default();
        config.set_public_url("https://escola.pt/labs");
        config.storage.backend = Backend::Remote;

        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn require_names_missing_setting() {
        let secrets = Secrets::default();
        let error = Secrets::require(secrets.generation_api_key.as_ref(), "GROQ_API_KEY")
            .unwrap_err();
        assert_eq!(error.to_string(), "GROQ_API_KEY is not set");
    }
}
