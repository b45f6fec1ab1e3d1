//! Pylon Settings - endpoints, sampling and artifact paths
//!
//! Config file: $PYLON_CONFIG, ~/.config/pylon/config.toml or /etc/pylon/config.toml
//! Secrets never live in the file; it only names the environment variables
//! that hold them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::llm::SamplingParams;

/// Model API settings (OpenAI-compatible endpoint)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Base URL, e.g. "https://models.inference.ai.azure.com"
    pub endpoint: String,

    /// Chat completion model
    pub model: String,

    /// Model used for query and sample embeddings
    pub embedding_model: String,

    /// Environment variable holding the API token
    pub api_key_env: String,

    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,

    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://models.inference.ai.azure.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            api_key_env: "GITHUB_TOKEN".to_string(),
            temperature: 1.0,
            top_p: 1.0,
            max_tokens: 1000,
            timeout_secs: 60,
        }
    }
}

impl LlmSettings {
    /// Sampling parameters shared by classification and generation
    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
        }
    }

    /// Read the API token from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        read_env(&self.api_key_env)
    }
}

/// Messaging platform settings (Intercom)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingSettings {
    pub endpoint: String,

    /// Environment variable holding the access token
    pub access_token_env: String,

    /// Environment variable holding the admin id replies are attributed to
    pub admin_id_env: String,

    /// Admin id used when the environment variable is unset
    pub default_admin_id: String,

    pub timeout_secs: u64,
}

impl Default for MessagingSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.intercom.io".to_string(),
            access_token_env: "INTERCOM_ACCESS_TOKEN".to_string(),
            admin_id_env: "INTERCOM_ADMIN_ID".to_string(),
            default_admin_id: "1234567890".to_string(),
            timeout_secs: 30,
        }
    }
}

impl MessagingSettings {
    pub fn access_token(&self) -> Option<String> {
        read_env(&self.access_token_env)
    }

    pub fn admin_id(&self) -> String {
        read_env(&self.admin_id_env).unwrap_or_else(|| self.default_admin_id.clone())
    }
}

/// Artifact locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Intent enumeration
    pub model_config: PathBuf,

    /// Canned replies per intent
    pub macros: PathBuf,

    /// Labeled sample queries (input to `embed`)
    pub sample_queries: PathBuf,

    /// Precomputed sample embeddings; optional at runtime
    pub sample_embeddings: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            model_config: PathBuf::from("config/pylon_model_config.json"),
            macros: PathBuf::from("config/intercom_macros.json"),
            sample_queries: PathBuf::from("data/sample_queries.json"),
            sample_embeddings: PathBuf::from("data/sample_embeddings.json"),
        }
    }
}

/// Main Pylon settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PylonSettings {
    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub messaging: MessagingSettings,

    #[serde(default)]
    pub paths: PathSettings,
}

impl PylonSettings {
    /// Get default user config path: ~/.config/pylon/config.toml
    pub fn user_config_path() -> Result<PathBuf> {
        let config_dir = match std::env::var("XDG_CONFIG_HOME") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => {
                let home = std::env::var("HOME").context("Cannot determine home directory")?;
                Path::new(&home).join(".config")
            }
        };

        Ok(config_dir.join("pylon").join("config.toml"))
    }

    /// Get system config path: /etc/pylon/config.toml
    pub fn system_config_path() -> PathBuf {
        PathBuf::from("/etc/pylon/config.toml")
    }

    /// Load configuration
    ///
    /// Priority:
    /// 1. $PYLON_CONFIG
    /// 2. User config (~/.config/pylon/config.toml)
    /// 3. System config (/etc/pylon/config.toml)
    /// 4. Defaults
    pub fn load() -> Result<Self> {
        if let Some(path) = read_env("PYLON_CONFIG") {
            return Self::load_from(Path::new(&path));
        }

        if let Ok(user_path) = Self::user_config_path() {
            if user_path.exists() {
                return Self::load_from(&user_path);
            }
        }

        let system_path = Self::system_config_path();
        if system_path.exists() {
            return Self::load_from(&system_path);
        }

        Ok(Self::default())
    }

    /// Load from an explicit file; missing file is an error
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

fn read_env(var: &str) -> Option<String> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = PylonSettings::default();
        assert_eq!(settings.llm.api_key_env, "GITHUB_TOKEN");
        assert_eq!(settings.messaging.access_token_env, "INTERCOM_ACCESS_TOKEN");
        assert_eq!(settings.messaging.default_admin_id, "1234567890");
        assert_eq!(settings.paths.macros, PathBuf::from("config/intercom_macros.json"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[llm]\nmodel = \"gpt-4o\"\ntemperature = 0.2\n\n[paths]\nmacros = \"/srv/macros.json\""
        )
        .unwrap();

        let settings = PylonSettings::load_from(file.path()).unwrap();
        assert_eq!(settings.llm.model, "gpt-4o");
        assert!((settings.llm.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(settings.llm.max_tokens, 1000);
        assert_eq!(settings.paths.macros, PathBuf::from("/srv/macros.json"));
        assert_eq!(settings.messaging, MessagingSettings::default());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = PylonSettings::load_from(&dir.path().join("nope.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[llm\nmodel = ").unwrap();
        assert!(PylonSettings::load_from(file.path()).is_err());
    }

    #[test]
    fn test_sampling_mirrors_llm_settings() {
        let llm = LlmSettings {
            temperature: 0.3,
            top_p: 0.9,
            max_tokens: 256,
            ..Default::default()
        };
        let sampling = llm.sampling();
        assert_eq!(sampling.max_tokens, 256);
        assert!((sampling.top_p - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_admin_id_falls_back_to_default() {
        let messaging = MessagingSettings {
            admin_id_env: "PYLON_TEST_ADMIN_ID_THAT_IS_NEVER_SET".to_string(),
            default_admin_id: "42".to_string(),
            ..Default::default()
        };
        assert_eq!(messaging.admin_id(), "42");
    }
}
