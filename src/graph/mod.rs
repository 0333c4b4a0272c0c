//! Declaration Graph
//!
//! Converts metamodel ASTs into validated declarations and resolves them into
//! the [`TypeIndex`]:
//!
//! - [`ModelFile`]: one namespace, its imports and declarations
//! - [`Declaration`]: class, scalar, map or enum
//! - [`Property`]: field, relationship or enum value
//! - [`TypeIndex`]: supertypes, ordered property lists, identifiers, unboxed
//!   scalars, map descriptors and the inheritance graph
//!
//! The registry, serializer and instance generator all read from the same
//! index so that property order and identifier rules agree everywhere.

pub mod declaration;
pub mod decorator;
pub mod index;
pub mod model_file;
pub mod property;
pub mod root;
pub mod validator;

pub use declaration::{
    ClassDeclaration, ClassKind, Declaration, DeclarationKind, EnumDeclaration, Identifier, MapDeclaration,
    ScalarDeclaration,
};
pub use decorator::{Decorator, DecoratorFactory, DecoratorTarget, DecoratorValue};
pub use index::{BuildMode, ModelFiles, ResolvedClass, ResolvedMap, ResolvedProperty, TypeIndex, TypeTarget};
pub use model_file::ModelFile;
pub use property::{
    DefaultValue, EnumValue, Field, PrimitiveType, Property, RelationshipDeclaration, TypeRef,
};
pub use root::{root_model_ast, root_model_file};
pub use validator::{NumberValidator, StringValidator, Validator};
