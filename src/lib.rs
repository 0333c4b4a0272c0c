//! Model Registry
//!
//! A registry of versioned model namespaces, the declaration graph resolved
//! from them, and a generic serializer that converts typed instances to and
//! from JSON by walking those declarations.
//!
//! ## Features
//!
//! - **Declaration Graph**: classes, scalars, maps and enums with resolved
//!   supertypes, ordered property lists and identifier rules
//! - **Copy-on-write Registry**: adds, updates and deletes validate a new
//!   state before swapping it in
//! - **Generic Serializer**: JSON encode/decode driven by declarations, with
//!   relationship URIs, deduplication and DateTime normalization
//! - **Instance Generator**: empty or sample instances of any concrete class
//!
//! ## Architecture
//!
//! ```text
//! metamodel AST (JSON)
//!   └── ModelFile (one namespace, imports, declarations)
//!         └── ModelRegistry (namespace -> ModelFile, TypeIndex)
//!               ├── Serializer (Resource <-> JSON)
//!               ├── InstanceGenerator
//!               └── ModelFactory
//! ```

pub mod ast;
pub mod checksum;
pub mod config;
pub mod error;
pub mod factory;
pub mod generator;
pub mod graph;
pub mod loader;
pub mod names;
pub mod registry;
pub mod resource;
pub mod serializer;
pub mod version;

pub use checksum::Checksum;
pub use config::ModelsConfig;
pub use error::{Location, ModelError, Result};
pub use factory::{Factory, ModelFactory};
pub use generator::{GenerateOptions, GeneratorMode, InstanceGenerator};
pub use graph::{Declaration, ModelFile, ResolvedClass, TypeIndex};
pub use loader::LoadConfig;
pub use names::{fully_qualified_name, split_fqn};
pub use registry::{ExternalImport, ExternalModelSource, ModelInput, ModelRegistry};
pub use resource::{Relationship, Resource, Value};
pub use serializer::{DecodeOptions, EncodeOptions, Serializer};
pub use version::VersionedNamespace;
