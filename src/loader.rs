//! Model loading
//!
//! Reads metamodel AST files (`*.json`, one `Model` or a `Models` bundle per
//! file) from the filesystem.

use std::fs;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::ast;
use crate::error::{ModelError, Result};
use crate::registry::ModelInput;

/// Configuration for model loading
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Skip files matching these path prefixes
    pub skip_prefixes: Vec<String>,
    /// Only load files matching these path prefixes
    pub include_prefixes: Vec<String>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            skip_prefixes: vec![
                "target/".to_string(),
                ".git/".to_string(),
                "node_modules/".to_string(),
                ".cargo/".to_string(),
            ],
            include_prefixes: Vec::new(),
        }
    }
}

/// Load every model file under `dir`, in file name order
pub fn load_directory(dir: &Path, config: &LoadConfig) -> Result<Vec<ModelInput>> {
    let mut inputs = Vec::new();

    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().map(|e| e != "json").unwrap_or(true) {
            continue;
        }

        let relative = path.strip_prefix(dir).unwrap_or(path);
        let relative_str = relative.to_string_lossy().replace('\\', "/");

        if !config.include_prefixes.is_empty()
            && !config.include_prefixes.iter().any(|p| relative_str.starts_with(p))
        {
            continue;
        }
        if config.skip_prefixes.iter().any(|p| relative_str.starts_with(p)) {
            continue;
        }

        inputs.extend(read_models(path, &relative_str)?);
    }

    debug!(dir = %dir.display(), models = inputs.len(), "Loaded model directory");
    Ok(inputs)
}

/// Load the models in a single file
pub fn load_file(path: &Path) -> Result<Vec<ModelInput>> {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    read_models(path, &name)
}

fn read_models(path: &Path, file_name: &str) -> Result<Vec<ModelInput>> {
    let content = fs::read_to_string(path)?;
    let json: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
        ModelError::illegal_model_at(format!("Failed to parse JSON: {}", e), Some(file_name), None)
    })?;
    Ok(ast::parse_models(&json)?
        .into_iter()
        .map(|model| ModelInput::new(model, Some(file_name.to_string())))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_model(dir: &Path, relative: &str, namespace: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let model = json!({
            "$class": "concerto.metamodel@1.0.0.Model",
            "namespace": namespace,
            "declarations": []
        });
        fs::write(path, serde_json::to_string_pretty(&model).unwrap()).unwrap();
    }

    #[test]
    fn test_load_directory_filters() {
        let dir = tempfile::tempdir().unwrap();
        write_model(dir.path(), "b.json", "org.b@1.0.0");
        write_model(dir.path(), "a.json", "org.a@1.0.0");
        write_model(dir.path(), "target/skip.json", "org.skip@1.0.0");
        fs::write(dir.path().join("notes.txt"), "not a model").unwrap();

        let inputs = load_directory(dir.path(), &LoadConfig::default()).unwrap();
        let namespaces: Vec<&str> = inputs.iter().map(|i| i.ast.namespace.as_str()).collect();
        assert_eq!(namespaces, ["org.a@1.0.0", "org.b@1.0.0"]);
        assert_eq!(inputs[0].file_name.as_deref(), Some("a.json"));
    }

    #[test]
    fn test_include_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        write_model(dir.path(), "core/a.json", "org.a@1.0.0");
        write_model(dir.path(), "extra/b.json", "org.b@1.0.0");

        let config = LoadConfig {
            include_prefixes: vec!["core/".to_string()],
            ..LoadConfig::default()
        };
        let inputs = load_directory(dir.path(), &config).unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].file_name.as_deref(), Some("core/a.json"));
    }

    #[test]
    fn test_invalid_json_names_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "{ nope").unwrap();
        let err = load_directory(dir.path(), &LoadConfig::default()).unwrap_err();
        assert!(err.to_string().contains("File 'broken.json'"));
    }
}
