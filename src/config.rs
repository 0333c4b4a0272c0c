//! Configuration for the model registry
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (models.toml)
//! - Environment variables (MODELS__*)
//!
//! ## Example config file (models.toml):
//! ```toml
//! [registry]
//! model_dir = "./models"
//! skip_prefixes = ["drafts/"]
//! disable_validation = false
//!
//! [serializer.encode]
//! validate = true
//! utc_offset = 60
//!
//! [serializer.decode]
//! strict_qualified_date_times = false
//!
//! [generator]
//! mode = "sample"
//! include_optional_fields = true
//! seed = 42
//! ```

use std::path::{Path, PathBuf};

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::generator::GenerateOptions;
use crate::loader::LoadConfig;
use crate::serializer::{DecodeOptions, EncodeOptions};

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Defaults for the generic serializer
    #[serde(default)]
    pub serializer: SerializerConfig,

    /// Defaults for the instance generator
    #[serde(default)]
    pub generator: GenerateOptions,
}

/// Where model files come from and how they are validated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Directory scanned for model AST files (`*.json`)
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Skip files matching these relative path prefixes
    #[serde(default = "default_skip_prefixes")]
    pub skip_prefixes: Vec<String>,

    /// Only load files matching these relative path prefixes
    #[serde(default)]
    pub include_prefixes: Vec<String>,

    /// Skip declarations that fail validation instead of rejecting the load
    #[serde(default)]
    pub disable_validation: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializerConfig {
    #[serde(default)]
    pub encode: EncodeOptions,

    #[serde(default)]
    pub decode: DecodeOptions,
}

// Default value functions
fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_skip_prefixes() -> Vec<String> {
    LoadConfig::default().skip_prefixes
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            skip_prefixes: default_skip_prefixes(),
            include_prefixes: Vec::new(),
            disable_validation: false,
        }
    }
}

impl RegistryConfig {
    pub fn load_config(&self) -> LoadConfig {
        LoadConfig {
            skip_prefixes: self.skip_prefixes.clone(),
            include_prefixes: self.include_prefixes.clone(),
        }
    }
}

impl ModelsConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a required file on top of the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["models.toml", ".models.toml", "config/models.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "models") {
            let xdg_config = config_dir.config_dir().join("models.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // MODELS__REGISTRY__MODEL_DIR=...
        builder = builder.add_source(
            Environment::with_prefix("MODELS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Model directory (resolves relative paths against the working directory)
    pub fn model_dir_path(&self) -> PathBuf {
        if self.registry.model_dir.is_absolute() {
            self.registry.model_dir.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.registry.model_dir)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::GeneratorMode;

    #[test]
    fn test_default_config() {
        let config = ModelsConfig::default();
        assert!(!config.registry.disable_validation);
        assert!(config.serializer.encode.validate);
        assert!(config.serializer.decode.strict_qualified_date_times);
        assert_eq!(config.generator.mode, GeneratorMode::Empty);
        assert!(config.registry.skip_prefixes.contains(&"target/".to_string()));
    }

    #[test]
    fn test_serialize_config() {
        let config = ModelsConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[registry]"));
        assert!(toml_str.contains("[serializer.encode]"));
        assert!(toml_str.contains("[generator]"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
[registry]
model_dir = "/srv/models"
disable_validation = true

[serializer.decode]
strict_qualified_date_times = false
utc_offset = 120

[generator]
mode = "sample"
seed = 7
"#,
        )
        .unwrap();

        let config = ModelsConfig::load_from(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.model_dir_path(), PathBuf::from("/srv/models"));
        assert!(config.registry.disable_validation);
        assert!(!config.serializer.decode.strict_qualified_date_times);
        assert_eq!(config.serializer.decode.utc_offset, 120);
        assert!(config.serializer.decode.validate);
        assert_eq!(config.generator.mode, GeneratorMode::Sample);
        assert_eq!(config.generator.seed, Some(7));
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.toml");
        let mut config = ModelsConfig::default();
        config.serializer.encode.deduplicate_resources = true;
        config.save(&path).unwrap();

        let loaded = ModelsConfig::load_from(Some(path.to_str().unwrap())).unwrap();
        assert!(loaded.serializer.encode.deduplicate_resources);
    }
}
