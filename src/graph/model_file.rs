//! Model files
//!
//! A `ModelFile` holds the declarations of one versioned namespace together
//! with its import table. It is immutable once built; the registry replaces
//! whole files on update.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::declaration::Declaration;
use super::decorator::{build_decorators, Decorator, DecoratorFactory, DecoratorTarget};
use crate::ast;
use crate::checksum::Checksum;
use crate::error::{Location, ModelError, Result};
use crate::names::fully_qualified_name;
use crate::version::VersionedNamespace;

/// Shared state while converting one AST into declarations
pub(crate) struct BuildContext<'a> {
    pub namespace: &'a str,
    pub file_name: Option<&'a str>,
    pub factories: &'a [Arc<dyn DecoratorFactory>],
}

impl<'a> BuildContext<'a> {
    pub fn illegal(&self, message: impl Into<String>, location: Option<&Location>) -> ModelError {
        ModelError::illegal_model_at(message, self.file_name, location)
    }

    /// Attach file and location to an illegal-model error that has none
    pub fn locate(&self, err: ModelError, location: Option<&Location>) -> ModelError {
        match err {
            ModelError::IllegalModel { message, file_name: None, location: None } => {
                self.illegal(message, location)
            }
            other => other,
        }
    }

    pub fn target<'b>(&'b self, declaration: &'b str) -> DecoratorTarget<'b> {
        DecoratorTarget {
            namespace: self.namespace,
            declaration: Some(declaration),
            property: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelFile {
    namespace: String,
    version: VersionedNamespace,
    file_name: Option<String>,
    checksum: Checksum,
    ast: ast::Model,
    declarations: Vec<Declaration>,
    by_name: HashMap<String, usize>,
    /// Short name -> FQN for `ImportType` / `ImportTypes`
    explicit_imports: BTreeMap<String, String>,
    /// Namespaces imported with `ImportAll`, in import order
    wildcard_imports: Vec<String>,
    decorators: Vec<Decorator>,
}

impl ModelFile {
    /// Build a model file from its AST, checking file-local invariants
    pub fn from_ast(
        ast: ast::Model,
        file_name: Option<&str>,
        factories: &[Arc<dyn DecoratorFactory>],
    ) -> Result<Self> {
        let version = VersionedNamespace::parse_versioned(&ast.namespace)
            .map_err(|e| relocate(e, file_name))?;
        let namespace = ast.namespace.clone();
        let ctx = BuildContext {
            namespace: &namespace,
            file_name,
            factories,
        };

        let mut explicit_imports = BTreeMap::new();
        let mut wildcard_imports = Vec::new();
        for import in &ast.imports {
            VersionedNamespace::parse_versioned(import.namespace()).map_err(|_| {
                ctx.illegal(
                    format!(
                        "Import of namespace \"{}\" in \"{}\" must specify a version",
                        import.namespace(),
                        namespace
                    ),
                    None,
                )
            })?;

            let names: Vec<&str> = match import {
                ast::Import::All(i) => {
                    if !wildcard_imports.contains(&i.namespace) {
                        wildcard_imports.push(i.namespace.clone());
                    }
                    Vec::new()
                }
                ast::Import::Type(i) => vec![i.name.as_str()],
                ast::Import::Types(i) => i.types.iter().map(String::as_str).collect(),
            };
            for name in names {
                let fqn = fully_qualified_name(import.namespace(), name);
                if let Some(existing) = explicit_imports.get(name) {
                    if existing != &fqn {
                        return Err(ctx.illegal(
                            format!("Import of {} conflicts with the import of {}", fqn, existing),
                            None,
                        ));
                    }
                }
                explicit_imports.insert(name.to_string(), fqn);
            }
        }

        let mut declarations = Vec::with_capacity(ast.declarations.len());
        let mut by_name = HashMap::with_capacity(ast.declarations.len());
        for node in &ast.declarations {
            let declaration = Declaration::from_ast(node, &ctx)?;
            let name = declaration.name().to_string();

            if by_name.contains_key(&name) {
                return Err(ctx.illegal(
                    format!("Duplicate class name {}", name),
                    declaration.location(),
                ));
            }
            if let Some(imported) = explicit_imports.get(&name) {
                return Err(ctx.illegal(
                    format!("Type {} is declared locally and also imported as {}", name, imported),
                    declaration.location(),
                ));
            }

            by_name.insert(name, declarations.len());
            declarations.push(declaration);
        }

        let file_target = DecoratorTarget {
            namespace: &namespace,
            declaration: None,
            property: None,
        };
        let decorators = build_decorators(&ast.decorators, &file_target, factories, file_name)?;
        let checksum = Checksum::from_json(&ast.to_json()?);

        Ok(Self {
            version,
            file_name: file_name.map(String::from),
            checksum,
            declarations,
            by_name,
            explicit_imports,
            wildcard_imports,
            decorators,
            namespace,
            ast,
        })
    }

    /// Versioned namespace, e.g. `org.acme@1.0.0`
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn version(&self) -> &VersionedNamespace {
        &self.version
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    pub fn ast(&self) -> &ast::Model {
        &self.ast
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    pub fn declaration(&self, name: &str) -> Option<&Declaration> {
        self.by_name.get(name).map(|&i| &self.declarations[i])
    }

    pub fn decorators(&self) -> &[Decorator] {
        &self.decorators
    }

    pub fn imports(&self) -> &[ast::Import] {
        &self.ast.imports
    }

    /// FQN bound to a short name by an explicit import
    pub fn explicit_import(&self, name: &str) -> Option<&str> {
        self.explicit_imports.get(name).map(String::as_str)
    }

    pub fn explicit_imports(&self) -> impl Iterator<Item = (&str, &str)> {
        self.explicit_imports.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn wildcard_imports(&self) -> &[String] {
        &self.wildcard_imports
    }

    /// Every imported namespace with its optional source URI, deduplicated
    pub fn imported_namespaces(&self) -> Vec<(&str, Option<&str>)> {
        let mut seen: Vec<(&str, Option<&str>)> = Vec::new();
        for import in &self.ast.imports {
            if !seen.iter().any(|(ns, _)| *ns == import.namespace()) {
                seen.push((import.namespace(), import.uri()));
            }
        }
        seen
    }
}

fn relocate(err: ModelError, file_name: Option<&str>) -> ModelError {
    match err {
        ModelError::IllegalModel { message, file_name: None, location } => {
            ModelError::illegal_model_at(message, file_name, location.as_ref())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model(value: serde_json::Value) -> ast::Model {
        ast::Model::from_json(&value).unwrap()
    }

    #[test]
    fn test_build_model_file() {
        let file = ModelFile::from_ast(
            model(json!({
                "$class": "concerto.metamodel@1.0.0.Model",
                "namespace": "org.acme@1.0.0",
                "imports": [
                    {"$class": "concerto.metamodel@1.0.0.ImportTypes", "namespace": "org.base@2.0.0", "types": ["Address", "Phone"]},
                    {"$class": "concerto.metamodel@1.0.0.ImportAll", "namespace": "org.util@1.0.0"}
                ],
                "declarations": [
                    {"$class": "concerto.metamodel@1.0.0.EnumDeclaration", "name": "Color", "properties": [
                        {"$class": "concerto.metamodel@1.0.0.EnumProperty", "name": "RED"}
                    ]}
                ]
            })),
            Some("acme.json"),
            &[],
        )
        .unwrap();

        assert_eq!(file.version().name, "org.acme");
        assert_eq!(file.explicit_import("Phone"), Some("org.base@2.0.0.Phone"));
        assert_eq!(file.wildcard_imports(), ["org.util@1.0.0".to_string()]);
        assert!(file.declaration("Color").is_some());
        assert_eq!(file.imported_namespaces().len(), 2);
        assert_eq!(file.checksum().as_str().len(), 64);
    }

    #[test]
    fn test_unversioned_namespace_rejected() {
        let err = ModelFile::from_ast(
            model(json!({"$class": "concerto.metamodel@1.0.0.Model", "namespace": "org.acme", "declarations": []})),
            Some("acme.json"),
            &[],
        )
        .unwrap_err();
        assert!(err.is_illegal_model());
        assert!(err.to_string().contains("File 'acme.json'"));
    }

    #[test]
    fn test_unversioned_import_rejected() {
        let err = ModelFile::from_ast(
            model(json!({
                "$class": "concerto.metamodel@1.0.0.Model",
                "namespace": "org.acme@1.0.0",
                "imports": [{"$class": "concerto.metamodel@1.0.0.ImportAll", "namespace": "org.util"}],
                "declarations": []
            })),
            None,
            &[],
        )
        .unwrap_err();
        assert!(err.to_string().contains("must specify a version"));
    }

    #[test]
    fn test_duplicate_and_shadowed_names() {
        let duplicate = json!({
            "$class": "concerto.metamodel@1.0.0.Model",
            "namespace": "org.acme@1.0.0",
            "declarations": [
                {"$class": "concerto.metamodel@1.0.0.ConceptDeclaration", "name": "A", "properties": []},
                {"$class": "concerto.metamodel@1.0.0.AssetDeclaration", "name": "A", "properties": []}
            ]
        });
        let err = ModelFile::from_ast(model(duplicate), None, &[]).unwrap_err();
        assert!(err.to_string().starts_with("Duplicate class name A"));

        let shadowed = json!({
            "$class": "concerto.metamodel@1.0.0.Model",
            "namespace": "org.acme@1.0.0",
            "imports": [{"$class": "concerto.metamodel@1.0.0.ImportType", "namespace": "org.base@1.0.0", "name": "A"}],
            "declarations": [
                {"$class": "concerto.metamodel@1.0.0.ConceptDeclaration", "name": "A", "properties": []}
            ]
        });
        let err = ModelFile::from_ast(model(shadowed), None, &[]).unwrap_err();
        assert!(err.to_string().contains("declared locally and also imported"));
    }

    #[test]
    fn test_construction_leaves_type_checks_to_the_index() {
        let value = json!({
            "$class": "concerto.metamodel@1.0.0.Model",
            "namespace": "org.acme@1.0.0",
            "declarations": [
                {"$class": "concerto.metamodel@1.0.0.ConceptDeclaration", "name": "A", "properties": [
                    {"$class": "concerto.metamodel@1.0.0.StringProperty", "name": "$secret"},
                    {"$class": "concerto.metamodel@1.0.0.StringProperty", "name": "b"},
                    {"$class": "concerto.metamodel@1.0.0.StringProperty", "name": "b"}
                ]},
                {"$class": "concerto.metamodel@1.0.0.MapDeclaration", "name": "Scores",
                 "key": {"$class": "concerto.metamodel@1.0.0.IntegerMapKeyType"},
                 "value": {"$class": "concerto.metamodel@1.0.0.StringMapValueType"}}
            ]
        });
        let file = ModelFile::from_ast(model(value), None, &[]).unwrap();
        assert!(file.declaration("A").is_some());
        assert!(file.declaration("Scores").is_some());
    }
}
