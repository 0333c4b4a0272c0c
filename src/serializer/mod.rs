//! Generic Serializer
//!
//! Schema-driven conversion between [`Resource`]s and the JSON wire tree.
//! Encode and decode walk instances in the same shape, dispatching on the
//! declaration kind of each property: class, relationship, map, scalar
//! (unboxed to its primitive) or primitive field.
//!
//! ```text
//! {
//!   "$class": "org.acme@1.0.0.Car",
//!   "vin": "ABC123",
//!   "owner": "resource:org.acme@1.0.0.Person#alice%40example.com",
//!   "$identifier": "ABC123"
//! }
//! ```

pub mod datetime;
mod decode;
mod encode;
pub mod path;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::Result;
use crate::factory::{Factory, ModelFactory};
use crate::registry::ModelRegistry;
use crate::resource::Resource;

pub use path::{PathSegment, WirePath};

/// Encoder settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    /// Check required fields, types, validators, enum values and subtypes
    pub validate: bool,
    /// Embed resources found where a relationship is declared
    pub permit_resources_for_relationships: bool,
    /// Write resources found where a relationship is declared as URIs
    pub convert_resources_to_relationships: bool,
    /// First occurrence of an identified resource carries `$id`, later ones are its URI
    pub deduplicate_resources: bool,
    /// Write relationships as their bare identifier instead of the URI
    pub convert_resources_to_id: bool,
    /// Offset in minutes DateTimes are rendered in
    pub utc_offset: i32,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            validate: true,
            permit_resources_for_relationships: false,
            convert_resources_to_relationships: false,
            deduplicate_resources: false,
            convert_resources_to_id: false,
            utc_offset: 0,
        }
    }
}

/// Decoder settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    pub validate: bool,
    /// Accept nested objects where a relationship is declared
    pub accept_resources_for_relationships: bool,
    /// Require DateTimes to carry `Z` or an explicit offset
    pub strict_qualified_date_times: bool,
    /// Offset in minutes applied to DateTimes without one (lenient mode)
    pub utc_offset: i32,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            validate: true,
            accept_resources_for_relationships: false,
            strict_qualified_date_times: true,
            utc_offset: 0,
        }
    }
}

#[derive(Clone)]
pub struct Serializer {
    registry: ModelRegistry,
    factory: Arc<dyn Factory>,
    encode_options: EncodeOptions,
    decode_options: DecodeOptions,
}

impl Serializer {
    pub fn new(registry: ModelRegistry) -> Self {
        let factory = Arc::new(ModelFactory::new(registry.clone()));
        Self::with_factory(registry, factory)
    }

    pub fn with_factory(registry: ModelRegistry, factory: Arc<dyn Factory>) -> Self {
        Self {
            registry,
            factory,
            encode_options: EncodeOptions::default(),
            decode_options: DecodeOptions::default(),
        }
    }

    /// Replace the options used by [`to_json`](Self::to_json)
    pub fn with_encode_options(mut self, options: EncodeOptions) -> Self {
        self.encode_options = options;
        self
    }

    /// Replace the options used by [`from_json`](Self::from_json)
    pub fn with_decode_options(mut self, options: DecodeOptions) -> Self {
        self.decode_options = options;
        self
    }

    pub fn encode_options(&self) -> &EncodeOptions {
        &self.encode_options
    }

    pub fn decode_options(&self) -> &DecodeOptions {
        &self.decode_options
    }

    pub fn to_json(&self, resource: &Resource) -> Result<Json> {
        self.to_json_with(resource, &self.encode_options)
    }

    pub fn to_json_with(&self, resource: &Resource, options: &EncodeOptions) -> Result<Json> {
        encode::Encoder::new(&self.registry, options).encode_root(resource)
    }

    pub fn from_json(&self, json: &Json) -> Result<Resource> {
        self.from_json_with(json, &self.decode_options)
    }

    pub fn from_json_with(&self, json: &Json, options: &DecodeOptions) -> Result<Resource> {
        decode::Decoder::new(&self.registry, self.factory.as_ref(), options).decode_root(json)
    }
}
