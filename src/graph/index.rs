//! Type Index
//!
//! Side-table computed once per registry state. For every class it records the
//! resolved supertype, the full ordered property list (own properties first,
//! then inherited), the effective identifier and the scalar-unboxed form of
//! each field. Maps get their synthetic `$key` / `$value` properties resolved
//! the same way. An inheritance graph answers subclass queries.
//!
//! ## Build passes
//!
//! 1. Per file: imports exist, decorator type references resolve.
//! 2. Per class, depth-first with memoization: supertype first, then own
//!    properties, system fields, identifier rules. A visiting stack rejects
//!    cyclic inheritance.
//! 3. Per map: key restriction, value resolution.
//! 4. Relationships (and relationship map values) target identified classes.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use tracing::{debug, warn};

use super::declaration::{ClassDeclaration, ClassKind, Declaration, Identifier, MapDeclaration};
use super::decorator::Decorator;
use super::model_file::ModelFile;
use super::property::{DefaultValue, Field, PrimitiveType, Property, TypeRef};
use crate::ast;
use crate::error::{ModelError, Result};
use crate::names::{fully_qualified_name, is_root_type, is_system_property, split_fqn, IDENTIFIER_FIELD, ROOT_NAMESPACE, ROOT_TYPES, TIMESTAMP_FIELD};

/// Model files keyed by namespace
pub type ModelFiles = BTreeMap<String, Arc<ModelFile>>;

/// Strict builds fail on the first invalid declaration; lenient builds skip it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Strict,
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTarget {
    Primitive(PrimitiveType),
    /// FQN of a declaration
    Declared(String),
}

/// A property with its target type resolved
#[derive(Debug, Clone)]
pub struct ResolvedProperty {
    pub property: Property,
    /// FQN of the declaring class or map
    pub owner: String,
    /// `None` for enum values
    pub target: Option<TypeTarget>,
    /// Synthetic primitive field when the target is a scalar
    pub unboxed: Option<Field>,
}

impl ResolvedProperty {
    pub fn name(&self) -> &str {
        self.property.name()
    }

    pub fn is_array(&self) -> bool {
        self.property.is_array()
    }

    pub fn is_optional(&self) -> bool {
        self.property.is_optional()
    }

    pub fn is_relationship(&self) -> bool {
        matches!(self.property, Property::Relationship(_))
    }

    /// The field values are checked against: the unboxed field for scalars
    pub fn effective_field(&self) -> Option<&Field> {
        self.unboxed.as_ref().or_else(|| self.property.as_field())
    }

    pub fn primitive(&self) -> Option<PrimitiveType> {
        self.effective_field().and_then(Field::primitive)
    }

    pub fn target_fqn(&self) -> Option<&str> {
        match (&self.target, &self.unboxed) {
            (Some(TypeTarget::Declared(fqn)), None) => Some(fqn),
            _ => None,
        }
    }

    /// Label of a single element, without the array suffix
    pub fn item_type_label(&self) -> String {
        match (self.primitive(), &self.target) {
            (Some(p), _) => p.name().to_string(),
            (None, Some(TypeTarget::Declared(fqn))) => fqn.clone(),
            (None, _) => "Unknown".to_string(),
        }
    }

    /// Human readable type label used in error messages
    pub fn type_label(&self) -> String {
        let base = self.item_type_label();
        if self.is_array() {
            format!("{}[]", base)
        } else {
            base
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedClass {
    pub fqn: String,
    pub name: String,
    pub namespace: String,
    pub kind: ClassKind,
    pub is_abstract: bool,
    pub super_type: Option<String>,
    /// Own properties (declared, then system) followed by inherited ones
    pub properties: Vec<ResolvedProperty>,
    /// Effective identifying field name
    pub identifier: Option<String>,
    identifier_owner: Option<String>,
    pub decorators: Vec<Decorator>,
}

impl ResolvedClass {
    pub fn property(&self, name: &str) -> Option<&ResolvedProperty> {
        self.properties.iter().find(|p| p.name() == name)
    }

    pub fn own_properties(&self) -> impl Iterator<Item = &ResolvedProperty> {
        self.properties.iter().filter(move |p| p.owner == self.fqn)
    }

    pub fn is_identified(&self) -> bool {
        self.identifier.is_some()
    }

    /// Identified by a declared field rather than `$identifier`
    pub fn has_explicit_identifier(&self) -> bool {
        matches!(&self.identifier, Some(id) if id != IDENTIFIER_FIELD)
    }

    pub fn is_timestamped(&self) -> bool {
        self.kind.is_timestamped()
    }
}

/// Resolved `$key` / `$value` of a map declaration
#[derive(Debug, Clone)]
pub struct ResolvedMap {
    pub fqn: String,
    pub key: ResolvedProperty,
    pub value: ResolvedProperty,
}

#[derive(Debug, Clone, Default)]
pub struct TypeIndex {
    classes: HashMap<String, ResolvedClass>,
    maps: HashMap<String, ResolvedMap>,
    /// Edges point from subclass to superclass
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl TypeIndex {
    pub fn build(files: &ModelFiles, mode: BuildMode) -> Result<Self> {
        let mut builder = IndexBuilder {
            files,
            mode,
            classes: HashMap::new(),
            failed: HashMap::new(),
            visiting: Vec::new(),
        };

        for file in files.values() {
            let result = builder.check_file(file);
            builder.tolerate(file.namespace(), result)?;
        }

        for file in files.values() {
            for declaration in file.declarations() {
                if let Declaration::Class(class) = declaration {
                    let fqn = class.fqn();
                    let result = builder.resolve_class(&fqn);
                    builder.tolerate(&fqn, result)?;
                }
            }
        }

        let mut maps = HashMap::new();
        for file in files.values() {
            for declaration in file.declarations() {
                if let Declaration::Map(map) = declaration {
                    let fqn = map.fqn();
                    match builder.resolve_map(file, map) {
                        Ok(resolved) => {
                            maps.insert(fqn, resolved);
                        }
                        Err(e) => builder.tolerate(&fqn, Err(e))?,
                    }
                }
            }
        }

        builder.check_relationships(&mut maps)?;

        let IndexBuilder { classes, .. } = builder;
        let mut graph = DiGraph::with_capacity(classes.len(), classes.len());
        let mut nodes = HashMap::with_capacity(classes.len());
        for file in files.values() {
            for declaration in file.declarations() {
                let fqn = declaration.fqn();
                if classes.contains_key(&fqn) {
                    nodes.insert(fqn.clone(), graph.add_node(fqn));
                }
            }
        }
        for class in classes.values() {
            if let (Some(super_type), Some(&node)) = (&class.super_type, nodes.get(&class.fqn)) {
                if let Some(&parent) = nodes.get(super_type) {
                    graph.add_edge(node, parent, ());
                }
            }
        }

        debug!(
            classes = classes.len(),
            maps = maps.len(),
            namespaces = files.len(),
            "Built type index"
        );

        Ok(Self { classes, maps, graph, nodes })
    }

    pub fn class(&self, fqn: &str) -> Option<&ResolvedClass> {
        self.classes.get(fqn)
    }

    pub fn classes(&self) -> impl Iterator<Item = &ResolvedClass> {
        self.classes.values()
    }

    pub fn map(&self, fqn: &str) -> Option<&ResolvedMap> {
        self.maps.get(fqn)
    }

    /// `sub` is `sup` or one of its descendants
    pub fn is_assignable(&self, sub: &str, sup: &str) -> bool {
        let mut current = Some(sub);
        while let Some(fqn) = current {
            if fqn == sup {
                return true;
            }
            current = self.classes.get(fqn).and_then(|c| c.super_type.as_deref());
        }
        false
    }

    /// Direct subclasses in declaration order
    pub fn subclasses(&self, fqn: &str) -> Vec<&ResolvedClass> {
        let Some(&node) = self.nodes.get(fqn) else {
            return Vec::new();
        };
        let mut children: Vec<NodeIndex> = self.graph.neighbors_directed(node, Direction::Incoming).collect();
        children.sort();
        children
            .into_iter()
            .filter_map(|n| self.classes.get(&self.graph[n]))
            .collect()
    }

    /// The class itself, then its descendants depth-first in declaration order
    pub fn assignable_classes(&self, fqn: &str) -> Vec<&ResolvedClass> {
        let Some(&start) = self.nodes.get(fqn) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            if let Some(class) = self.classes.get(&self.graph[node]) {
                out.push(class);
            }
            let mut children: Vec<NodeIndex> = self.graph.neighbors_directed(node, Direction::Incoming).collect();
            children.sort();
            stack.extend(children.into_iter().rev());
        }
        out
    }
}

// =============================================================================
// Name resolution
// =============================================================================

/// Declaration named by `fqn` across all registered files, or `None` when
/// the namespace is not registered or does not declare the name
fn lookup<'f>(files: &'f ModelFiles, fqn: &str) -> Option<&'f Declaration> {
    let (namespace, name) = split_fqn(fqn)?;
    files.get(namespace)?.declaration(name)
}

/// Resolve a type reference from `file` to an FQN.
///
/// A namespace-qualified reference must name a declaration in that
/// namespace. Otherwise the name is looked up locally, then in the explicit
/// imports, then in the wildcard imports, and finally among the implicit
/// root types. Fails with `TypeNotFound` when nothing matches.
fn resolve_type(files: &ModelFiles, file: &ModelFile, type_id: &ast::TypeIdentifier) -> Result<String> {
    if let Some(namespace) = &type_id.namespace {
        return match files.get(namespace) {
            Some(target) if target.declaration(&type_id.name).is_some() => {
                Ok(fully_qualified_name(namespace, &type_id.name))
            }
            Some(_) => Err(ModelError::type_not_found(
                type_id.reference(),
                format!("Type {} is not declared in namespace {}", type_id.name, namespace),
            )),
            None => Err(ModelError::type_not_found(
                type_id.reference(),
                format!("Namespace {} is not declared", namespace),
            )),
        };
    }

    let name = type_id.name.as_str();
    if file.declaration(name).is_some() {
        return Ok(fully_qualified_name(file.namespace(), name));
    }
    if let Some(fqn) = file.explicit_import(name) {
        if lookup(files, fqn).is_some() {
            return Ok(fqn.to_string());
        }
        return Err(ModelError::type_not_found(
            fqn,
            format!("Type {} imported by {} is not declared", fqn, file.namespace()),
        ));
    }
    for namespace in file.wildcard_imports() {
        if files.get(namespace).and_then(|f| f.declaration(name)).is_some() {
            return Ok(fully_qualified_name(namespace, name));
        }
    }
    if ROOT_TYPES.contains(&name) {
        return Ok(fully_qualified_name(ROOT_NAMESPACE, name));
    }

    Err(ModelError::type_not_found(
        name,
        format!("Undeclared type \"{}\" in namespace \"{}\"", name, file.namespace()),
    ))
}

// =============================================================================
// Builder
// =============================================================================

struct IndexBuilder<'f> {
    files: &'f ModelFiles,
    mode: BuildMode,
    classes: HashMap<String, ResolvedClass>,
    /// Classes that already failed, with their error message
    failed: HashMap<String, String>,
    visiting: Vec<String>,
}

impl<'f> IndexBuilder<'f> {
    fn tolerate(&self, subject: &str, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(e) if self.mode == BuildMode::Lenient => {
                warn!(subject, error = %e, "Skipping declaration that failed validation");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn check_file(&self, file: &ModelFile) -> Result<()> {
        for import in file.imports() {
            let Some(target) = self.files.get(import.namespace()) else {
                return Err(ModelError::type_not_found(
                    import.namespace(),
                    format!(
                        "Namespace {} imported by {} is not declared",
                        import.namespace(),
                        file.namespace()
                    ),
                ));
            };
            let names: Vec<&str> = match import {
                ast::Import::All(_) => Vec::new(),
                ast::Import::Type(i) => vec![i.name.as_str()],
                ast::Import::Types(i) => i.types.iter().map(String::as_str).collect(),
            };
            for name in names {
                if target.declaration(name).is_none() {
                    let fqn = fully_qualified_name(import.namespace(), name);
                    return Err(ModelError::type_not_found(
                        fqn.clone(),
                        format!("Type {} imported by {} is not declared", fqn, file.namespace()),
                    ));
                }
            }
        }

        let mut decorators: Vec<&Decorator> = file.decorators().iter().collect();
        for declaration in file.declarations() {
            decorators.extend(declaration.decorators());
            match declaration {
                Declaration::Class(c) => {
                    for prop in &c.properties {
                        decorators.extend(prop.decorators());
                    }
                }
                Declaration::Enum(e) => {
                    for value in &e.values {
                        decorators.extend(&value.decorators);
                    }
                }
                Declaration::Scalar(_) | Declaration::Map(_) => {}
            }
        }
        for decorator in decorators {
            for type_id in decorator.type_references() {
                resolve_type(self.files, file, type_id).map_err(|e| {
                    ModelError::illegal_model_at(
                        format!("Decorator {} references an unknown type: {}", decorator.name, e),
                        file.file_name(),
                        decorator.location.as_ref(),
                    )
                })?;
            }
        }
        Ok(())
    }

    fn class_declaration(&self, fqn: &str) -> Result<(&'f ModelFile, &'f ClassDeclaration)> {
        let not_found = || ModelError::type_not_found(fqn, format!("Type {} is not declared", fqn));
        let (namespace, name) = split_fqn(fqn).ok_or_else(not_found)?;
        let file = self.files.get(namespace).ok_or_else(not_found)?;
        match file.declaration(name) {
            Some(Declaration::Class(class)) => Ok((file, class)),
            Some(other) => Err(ModelError::illegal_model(format!(
                "Type {} is a {}, not a class",
                fqn,
                other.kind()
            ))),
            None => Err(not_found()),
        }
    }

    fn resolve_class(&mut self, fqn: &str) -> Result<()> {
        if self.classes.contains_key(fqn) {
            return Ok(());
        }
        if let Some(message) = self.failed.get(fqn) {
            return Err(ModelError::illegal_model(message.clone()));
        }
        if let Some(pos) = self.visiting.iter().position(|v| v == fqn) {
            let mut cycle = self.visiting[pos..].to_vec();
            cycle.push(fqn.to_string());
            return Err(ModelError::illegal_model(format!(
                "Cyclic inheritance detected: {}",
                cycle.join(" -> ")
            )));
        }

        let (file, class) = self.class_declaration(fqn)?;
        self.visiting.push(fqn.to_string());
        let result = self.build_class(file, class);
        self.visiting.pop();

        match result {
            Ok(resolved) => {
                self.classes.insert(fqn.to_string(), resolved);
                Ok(())
            }
            Err(e) => {
                self.failed.insert(fqn.to_string(), e.to_string());
                Err(e)
            }
        }
    }

    fn build_class(&mut self, file: &'f ModelFile, class: &'f ClassDeclaration) -> Result<ResolvedClass> {
        let fqn = class.fqn();
        let illegal = |message: String| ModelError::illegal_model_at(message, file.file_name(), class.location.as_ref());

        let super_fqn = match &class.super_type {
            Some(type_id) => {
                let target = resolve_type(self.files, file, type_id)?;
                if target == fqn {
                    if class.namespace != ROOT_NAMESPACE {
                        return Err(illegal(format!("Class {} cannot extend itself", class.name)));
                    }
                    None
                } else {
                    Some(target)
                }
            }
            None if class.namespace == ROOT_NAMESPACE => None,
            None => Some(class.kind.root_fqn()),
        };

        if let Some(super_fqn) = &super_fqn {
            match lookup(self.files, super_fqn) {
                Some(Declaration::Class(parent)) => {
                    if parent.kind != class.kind && *super_fqn != ClassKind::Concept.root_fqn() {
                        return Err(illegal(format!(
                            "{} {} cannot extend {} {}",
                            class.kind, class.name, parent.kind, super_fqn
                        )));
                    }
                }
                Some(other) => {
                    return Err(illegal(format!(
                        "Class {} cannot extend {}: it is a {}, not a class",
                        class.name,
                        super_fqn,
                        other.kind()
                    )))
                }
                None => {
                    return Err(ModelError::type_not_found(
                        super_fqn.clone(),
                        format!("Could not find super type {} of class {}", super_fqn, fqn),
                    ))
                }
            }
            self.resolve_class(super_fqn)?;
        }

        let (inherited, inherited_id, inherited_id_owner) =
            match super_fqn.as_ref().and_then(|s| self.classes.get(s)) {
                Some(parent) => (
                    parent.properties.clone(),
                    parent.identifier.clone(),
                    parent.identifier_owner.clone(),
                ),
                None => (Vec::new(), None, None),
            };

        if class.identified.is_some() {
            if let Some(owner) = &inherited_id_owner {
                if !is_root_type(owner) {
                    return Err(illegal(
                        "Identifier defined in super class, identifiers cannot be overridden".to_string(),
                    ));
                }
            }
        }

        let mut names = HashSet::new();
        let mut properties = Vec::with_capacity(class.properties.len() + inherited.len() + 2);
        for prop in &class.properties {
            if is_system_property(prop.name()) && class.namespace != ROOT_NAMESPACE {
                return Err(illegal(format!(
                    "Invalid field name '{}' in class {}: names starting with $ are reserved",
                    prop.name(),
                    class.name
                )));
            }
            if !names.insert(prop.name()) {
                return Err(illegal(format!(
                    "Class {} has more than one field named {}",
                    class.name,
                    prop.name()
                )));
            }
            properties.push(self.resolve_property(file, &fqn, prop)?);
        }

        let inherits = |name: &str| inherited.iter().any(|p| p.name() == name);
        if class.identified == Some(Identifier::System) && !inherits(IDENTIFIER_FIELD) {
            properties.push(system_property(IDENTIFIER_FIELD, PrimitiveType::String, &fqn));
        }
        if class.kind.is_timestamped() && !inherits(TIMESTAMP_FIELD) {
            properties.push(system_property(TIMESTAMP_FIELD, PrimitiveType::DateTime, &fqn));
        }

        for prop in &properties {
            if let Some(existing) = inherited.iter().find(|p| p.name() == prop.name()) {
                return Err(illegal(format!(
                    "Field {} in class {} is already declared in super class {}",
                    prop.name(),
                    class.name,
                    existing.owner
                )));
            }
        }
        properties.extend(inherited);

        let (identifier, identifier_owner) = match &class.identified {
            Some(Identifier::System) => (Some(IDENTIFIER_FIELD.to_string()), Some(fqn.clone())),
            Some(Identifier::Explicit(name)) => (Some(name.clone()), Some(fqn.clone())),
            None => (inherited_id, inherited_id_owner),
        };

        if let Some(Identifier::Explicit(name)) = &class.identified {
            let prop = properties.iter().find(|p| p.name() == name).ok_or_else(|| {
                illegal(format!(
                    "Class {} is identified by field {}, but the field is not declared",
                    class.name, name
                ))
            })?;
            let field = prop
                .effective_field()
                .filter(|f| f.primitive() == Some(PrimitiveType::String))
                .ok_or_else(|| {
                    illegal(format!(
                        "Class {} is identified by field {}, but the type of the field is not String",
                        class.name, name
                    ))
                })?;
            if field.is_optional {
                return Err(illegal(format!("Identifying field {} of class {} cannot be optional", name, class.name)));
            }
            if field.is_array {
                return Err(illegal(format!("Identifying field {} of class {} cannot be an array", name, class.name)));
            }
        }

        Ok(ResolvedClass {
            name: class.name.clone(),
            namespace: class.namespace.clone(),
            kind: class.kind,
            is_abstract: class.is_abstract,
            super_type: super_fqn,
            properties,
            identifier,
            identifier_owner,
            decorators: class.decorators.clone(),
            fqn,
        })
    }

    fn resolve_property(&self, file: &ModelFile, owner: &str, prop: &Property) -> Result<ResolvedProperty> {
        let illegal = |message: String| ModelError::illegal_model_at(message, file.file_name(), prop.location());

        let (target, unboxed) = match prop {
            Property::Field(field) => match &field.type_ref {
                TypeRef::Primitive(p) => (Some(TypeTarget::Primitive(*p)), None),
                TypeRef::Named(type_id) => {
                    let target = resolve_type(self.files, file, type_id)?;
                    let unboxed = match lookup(self.files, &target) {
                        Some(Declaration::Scalar(scalar)) => Some(scalar.unbox(field)),
                        Some(Declaration::Enum(e)) => {
                            if let Some(DefaultValue::String(default)) = &field.default_value {
                                if !e.has_value(default) {
                                    return Err(illegal(format!(
                                        "Default value {} of field {} is not a value of enum {}",
                                        default, field.name, target
                                    )));
                                }
                            }
                            None
                        }
                        _ => None,
                    };
                    (Some(TypeTarget::Declared(target)), unboxed)
                }
            },
            Property::Relationship(rel) => {
                let target = resolve_type(self.files, file, &rel.type_id)?;
                if !matches!(lookup(self.files, &target), Some(Declaration::Class(_))) {
                    return Err(illegal(format!(
                        "Relationship {} must target a class, but {} is not a class",
                        rel.name, target
                    )));
                }
                (Some(TypeTarget::Declared(target)), None)
            }
            Property::EnumValue(_) => (None, None),
        };

        Ok(ResolvedProperty {
            property: prop.clone(),
            owner: owner.to_string(),
            target,
            unboxed,
        })
    }

    fn resolve_map(&self, file: &ModelFile, map: &MapDeclaration) -> Result<ResolvedMap> {
        let fqn = map.fqn();
        let key = self.resolve_property(file, &fqn, &Property::Field(map.key_field()))?;

        if !matches!(key.primitive(), Some(PrimitiveType::String | PrimitiveType::DateTime)) {
            let key_type = match &key.target {
                Some(TypeTarget::Declared(target)) => target.clone(),
                _ => map.key_type.to_string(),
            };
            return Err(ModelError::illegal_model_at(
                format!(
                    "Invalid map key type {} in map {}: keys must be String, DateTime or a scalar of those",
                    key_type, map.name
                ),
                file.file_name(),
                map.location.as_ref(),
            ));
        }

        let value = self.resolve_property(file, &fqn, &map.value_property())?;
        Ok(ResolvedMap { fqn, key, value })
    }

    /// Relationships must point at identified classes
    fn check_relationships(&mut self, maps: &mut HashMap<String, ResolvedMap>) -> Result<()> {
        let mut offending: Vec<(String, ModelError)> = Vec::new();

        for class in self.classes.values() {
            for prop in class.own_properties().filter(|p| p.is_relationship()) {
                if let Some(TypeTarget::Declared(target)) = &prop.target {
                    if let Some(err) = self.unidentified_target(&prop.property, target) {
                        offending.push((class.fqn.clone(), err));
                    }
                }
            }
        }
        for map in maps.values() {
            if let Some(TypeTarget::Declared(target)) = &map.value.target {
                if map.value.is_relationship() {
                    if let Some(err) = self.unidentified_target(&map.value.property, target) {
                        offending.push((map.fqn.clone(), err));
                    }
                }
            }
        }

        offending.sort_by(|a, b| a.0.cmp(&b.0));
        for (subject, err) in offending {
            self.tolerate(&subject, Err(err))?;
            self.classes.remove(&subject);
            maps.remove(&subject);
        }
        Ok(())
    }

    fn unidentified_target(&self, property: &Property, target: &str) -> Option<ModelError> {
        match self.classes.get(target) {
            Some(class) if !class.is_identified() => Some(ModelError::illegal_model_at(
                format!(
                    "Relationship {} must be to a class that has an identifier, but this is not the case for class {}",
                    property.name(),
                    target
                ),
                None,
                property.location(),
            )),
            _ => None,
        }
    }
}

fn system_property(name: &str, primitive: PrimitiveType, owner: &str) -> ResolvedProperty {
    ResolvedProperty {
        property: Property::Field(Field::synthetic(name, TypeRef::Primitive(primitive))),
        owner: owner.to_string(),
        target: Some(TypeTarget::Primitive(primitive)),
        unboxed: None,
    }
}
