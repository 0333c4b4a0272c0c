//! Model Registry
//!
//! Holds the loaded model files keyed by namespace, together with the
//! [`TypeIndex`] computed from them. Every mutation builds the next state off
//! to the side (new namespace map, new index) and swaps it in only when it
//! validates, so a failed add or update leaves the registry untouched.
//!
//! The built-in root namespace (`concerto@1.0.0`) is always present and cannot
//! be replaced or removed.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde_json::Value as Json;
use tracing::{debug, info};

use crate::ast;
use crate::config::ModelsConfig;
use crate::error::{ModelError, Result};
use crate::factory::ModelFactory;
use crate::generator::InstanceGenerator;
use crate::graph::{
    root_model_file, BuildMode, Declaration, DecoratorFactory, ModelFile, ModelFiles, PrimitiveType, ResolvedClass,
    ResolvedMap, TypeIndex,
};
use crate::loader::{load_directory, LoadConfig};
use crate::names::{split_fqn, ROOT_NAMESPACE};
use crate::serializer::Serializer;

/// A model AST waiting to be added, with the file it came from
#[derive(Debug, Clone)]
pub struct ModelInput {
    pub ast: ast::Model,
    pub file_name: Option<String>,
}

impl ModelInput {
    pub fn new(ast: ast::Model, file_name: Option<String>) -> Self {
        Self { ast, file_name }
    }

    /// Parse a `Model` or a `Models` bundle
    pub fn from_json(value: &Json, file_name: Option<&str>) -> Result<Vec<Self>> {
        Ok(ast::parse_models(value)?
            .into_iter()
            .map(|model| Self::new(model, file_name.map(String::from)))
            .collect())
    }
}

/// An imported namespace that is not loaded yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalImport {
    pub namespace: String,
    /// Source URI declared on the import, if any
    pub uri: Option<String>,
}

/// Supplies models for imported namespaces the registry does not hold
pub trait ExternalModelSource {
    fn fetch(&self, imports: &[ExternalImport]) -> Result<Vec<ModelInput>>;
}

#[derive(Clone)]
pub struct ModelRegistry {
    files: Arc<ModelFiles>,
    index: Arc<TypeIndex>,
    decorator_factories: Vec<Arc<dyn DecoratorFactory>>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("namespaces", &self.files.keys().collect::<Vec<_>>())
            .field("decorator_factories", &self.decorator_factories.len())
            .finish()
    }
}

impl ModelRegistry {
    /// Registry holding only the root model
    pub fn new() -> Result<Self> {
        let files = root_files()?;
        let index = TypeIndex::build(&files, BuildMode::Strict)?;
        Ok(Self {
            files: Arc::new(files),
            index: Arc::new(index),
            decorator_factories: Vec::new(),
        })
    }

    /// Load every model under `dir` and validate them together
    pub fn from_directory(dir: &Path, config: &LoadConfig) -> Result<Self> {
        let inputs = load_directory(dir, config)?;
        let mut registry = Self::new()?;
        registry.add_model_files(inputs, false)?;
        Ok(registry)
    }

    pub fn from_config(config: &ModelsConfig) -> Result<Self> {
        let inputs = load_directory(&config.model_dir_path(), &config.registry.load_config())?;
        let mut registry = Self::new()?;
        registry.add_model_files(inputs, config.registry.disable_validation)?;
        Ok(registry)
    }

    /// Used for model files added after this call
    pub fn add_decorator_factory(&mut self, factory: Arc<dyn DecoratorFactory>) {
        self.decorator_factories.push(factory);
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    pub fn add_model_file(&mut self, input: ModelInput) -> Result<Arc<ModelFile>> {
        let file = Arc::new(self.build_file(input)?);
        let namespace = file.namespace().to_string();
        check_new_namespace(&self.files, &namespace)?;

        let mut files = (*self.files).clone();
        files.insert(namespace.clone(), file.clone());
        self.commit(files, BuildMode::Strict)?;

        info!(namespace = %namespace, "Added model file");
        Ok(file)
    }

    /// Add several files as one transaction.
    ///
    /// With `disable_validation`, declarations that fail validation are left
    /// out of the type index instead of failing the whole batch.
    pub fn add_model_files(&mut self, inputs: Vec<ModelInput>, disable_validation: bool) -> Result<Vec<Arc<ModelFile>>> {
        let mut files = (*self.files).clone();
        let mut added = Vec::with_capacity(inputs.len());
        for input in inputs {
            let file = Arc::new(self.build_file(input)?);
            check_new_namespace(&files, file.namespace())?;
            files.insert(file.namespace().to_string(), file.clone());
            added.push(file);
        }

        let mode = if disable_validation { BuildMode::Lenient } else { BuildMode::Strict };
        self.commit(files, mode)?;

        info!(count = added.len(), "Added model files");
        Ok(added)
    }

    /// Replace the file of an existing namespace
    pub fn update_model_file(&mut self, input: ModelInput) -> Result<Arc<ModelFile>> {
        let file = self.build_file(input)?;
        let namespace = file.namespace().to_string();
        check_not_system(&namespace)?;

        let existing = self.files.get(&namespace).ok_or_else(|| {
            ModelError::type_not_found(
                namespace.clone(),
                format!("Model file for namespace {} has not been added", namespace),
            )
        })?;
        if existing.checksum() == file.checksum() {
            debug!(namespace = %namespace, "Model file unchanged, skipping update");
            return Ok(existing.clone());
        }

        let file = Arc::new(file);
        let mut files = (*self.files).clone();
        files.insert(namespace.clone(), file.clone());
        self.commit(files, BuildMode::Strict)?;

        info!(namespace = %namespace, checksum = %file.checksum(), "Updated model file");
        Ok(file)
    }

    /// Remove a namespace. Files importing it keep loading; their classes that
    /// depended on it drop out of the type index.
    pub fn delete_model_file(&mut self, namespace: &str) -> Result<()> {
        check_not_system(namespace)?;
        if !self.files.contains_key(namespace) {
            return Err(ModelError::type_not_found(
                namespace,
                format!("Model file for namespace {} has not been added", namespace),
            ));
        }

        let mut files = (*self.files).clone();
        files.remove(namespace);
        self.commit(files, BuildMode::Lenient)?;

        info!(namespace, "Deleted model file");
        Ok(())
    }

    /// Back to the root model only
    pub fn clear_model_files(&mut self) -> Result<()> {
        self.commit(root_files()?, BuildMode::Strict)?;
        info!("Cleared model files");
        Ok(())
    }

    /// Validate the current state strictly
    pub fn validate_model_files(&self) -> Result<()> {
        TypeIndex::build(&self.files, BuildMode::Strict).map(|_| ())
    }

    /// Fetch imported namespaces that are not loaded until none are missing.
    ///
    /// Returns the namespaces added or replaced.
    pub fn update_external_models(&mut self, source: &dyn ExternalModelSource) -> Result<Vec<String>> {
        let mut files = (*self.files).clone();
        let mut fetched = Vec::new();

        loop {
            let missing = missing_imports(&files);
            if missing.is_empty() {
                break;
            }

            let mut progress = false;
            for input in source.fetch(&missing)? {
                let file = self.build_file(input)?;
                let namespace = file.namespace().to_string();
                check_not_system(&namespace)?;
                progress |= missing.iter().any(|m| m.namespace == namespace);
                files.insert(namespace.clone(), Arc::new(file));
                if !fetched.contains(&namespace) {
                    fetched.push(namespace);
                }
            }

            if !progress {
                let namespaces: Vec<&str> = missing.iter().map(|m| m.namespace.as_str()).collect();
                return Err(ModelError::type_not_found(
                    namespaces.join(", "),
                    format!("Failed to load external models for namespaces: {}", namespaces.join(", ")),
                ));
            }
        }

        if !fetched.is_empty() {
            self.commit(files, BuildMode::Strict)?;
            info!(namespaces = ?fetched, "Updated external models");
        }
        Ok(fetched)
    }

    fn build_file(&self, input: ModelInput) -> Result<ModelFile> {
        ModelFile::from_ast(input.ast, input.file_name.as_deref(), &self.decorator_factories)
    }

    /// Swap in a new state once its type index builds
    fn commit(&mut self, files: ModelFiles, mode: BuildMode) -> Result<()> {
        let index = TypeIndex::build(&files, mode)?;
        self.files = Arc::new(files);
        self.index = Arc::new(index);
        Ok(())
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Declaration by fully-qualified name
    pub fn get_type(&self, fqn: &str) -> Result<&Declaration> {
        if PrimitiveType::from_name(fqn).is_some() {
            return Err(ModelError::type_not_found(
                fqn,
                format!("{} is a primitive type and is not declared in a model file", fqn),
            ));
        }
        let (namespace, name) = split_fqn(fqn).ok_or_else(|| {
            ModelError::type_not_found(fqn, format!("Type {} is not a fully qualified name", fqn))
        })?;
        let file = self.files.get(namespace).ok_or_else(|| {
            ModelError::type_not_found(
                fqn,
                format!("Namespace {} for type {} is not registered", namespace, name),
            )
        })?;
        file.declaration(name).ok_or_else(|| {
            let hint = suggest(name, file.declarations().iter().map(Declaration::name))
                .map(|s| format!(". Did you mean {}?", s))
                .unwrap_or_default();
            ModelError::type_not_found(
                fqn,
                format!("Type {} is not declared in namespace {}{}", name, namespace, hint),
            )
        })
    }

    pub fn resolved_class(&self, fqn: &str) -> Result<&ResolvedClass> {
        if let Some(class) = self.index.class(fqn) {
            return Ok(class);
        }
        match self.get_type(fqn)? {
            Declaration::Class(_) => Err(ModelError::type_not_found(
                fqn,
                format!("Class {} failed validation and is not available", fqn),
            )),
            other => Err(ModelError::type_not_found(
                fqn,
                format!("Type {} is a {}, not a class", fqn, other.kind()),
            )),
        }
    }

    pub fn resolved_map(&self, fqn: &str) -> Result<&ResolvedMap> {
        if let Some(map) = self.index.map(fqn) {
            return Ok(map);
        }
        match self.get_type(fqn)? {
            Declaration::Map(_) => Err(ModelError::type_not_found(
                fqn,
                format!("Map {} failed validation and is not available", fqn),
            )),
            other => Err(ModelError::type_not_found(
                fqn,
                format!("Type {} is a {}, not a map", fqn, other.kind()),
            )),
        }
    }

    pub fn is_assignable(&self, sub: &str, sup: &str) -> bool {
        self.index.is_assignable(sub, sup)
    }

    /// The class and its descendants, depth-first in declaration order
    pub fn assignable_classes(&self, fqn: &str) -> Vec<&ResolvedClass> {
        self.index.assignable_classes(fqn)
    }

    pub fn model_file(&self, namespace: &str) -> Option<&Arc<ModelFile>> {
        self.files.get(namespace)
    }

    /// User namespaces, sorted
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str).filter(|ns| *ns != ROOT_NAMESPACE)
    }

    /// User model files, sorted by namespace
    pub fn model_files(&self) -> impl Iterator<Item = &Arc<ModelFile>> {
        self.files.values().filter(|f| f.namespace() != ROOT_NAMESPACE)
    }

    pub fn index(&self) -> &TypeIndex {
        &self.index
    }

    // =========================================================================
    // Services
    // =========================================================================

    pub fn serializer(&self) -> Serializer {
        Serializer::new(self.clone())
    }

    pub fn factory(&self) -> ModelFactory {
        ModelFactory::new(self.clone())
    }

    pub fn instance_generator(&self) -> InstanceGenerator {
        InstanceGenerator::new(self.clone())
    }
}

fn root_files() -> Result<ModelFiles> {
    let root = root_model_file()?;
    let mut files = ModelFiles::new();
    files.insert(root.namespace().to_string(), Arc::new(root));
    Ok(files)
}

fn check_not_system(namespace: &str) -> Result<()> {
    if namespace == ROOT_NAMESPACE {
        return Err(ModelError::illegal_model(format!(
            "The system namespace {} cannot be modified",
            ROOT_NAMESPACE
        )));
    }
    Ok(())
}

fn check_new_namespace(files: &ModelFiles, namespace: &str) -> Result<()> {
    check_not_system(namespace)?;
    if files.contains_key(namespace) {
        return Err(ModelError::illegal_model(format!(
            "Namespace {} is already declared",
            namespace
        )));
    }
    Ok(())
}

fn missing_imports(files: &ModelFiles) -> Vec<ExternalImport> {
    let mut missing: BTreeMap<&str, Option<&str>> = BTreeMap::new();
    for file in files.values() {
        for (namespace, uri) in file.imported_namespaces() {
            if !files.contains_key(namespace) {
                let entry = missing.entry(namespace).or_default();
                if entry.is_none() {
                    *entry = uri;
                }
            }
        }
    }
    missing
        .into_iter()
        .map(|(namespace, uri)| ExternalImport {
            namespace: namespace.to_string(),
            uri: uri.map(String::from),
        })
        .collect()
}

/// Closest declared name by fuzzy score
fn suggest<'a>(name: &str, candidates: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let matcher = SkimMatcherV2::default().ignore_case();
    candidates
        .filter_map(|candidate| matcher.fuzzy_match(candidate, name).map(|score| (score, candidate)))
        .max_by_key(|(score, _)| *score)
        .map(|(_, candidate)| candidate)
}
