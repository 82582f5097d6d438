//! Low-level schema: every field source-mapped and presence-flagged.
use indexmap::IndexMap;
use serde_json::Value;

use super::node::{NodeReference, Origin};

/// Index of a low-level schema inside its owning [`super::Document`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(pub(crate) usize);

impl SchemaId {
    pub fn index(self) -> usize { self.0 }
}

/// `type`: a single string in OpenAPI 3.0, a list of strings in 3.1.
#[derive(Clone, Debug, PartialEq)]
pub enum SchemaType {
    Single(String),
    Multiple(Vec<NodeReference<String>>),
}

impl Default for SchemaType {
    fn default() -> Self { SchemaType::Multiple(Vec::new()) }
}

/// `exclusiveMinimum` / `exclusiveMaximum`: a flag in 3.0, the bound itself in 3.1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ExclusiveBound {
    Flag(bool),
    Bound(f64),
}

impl Default for ExclusiveBound {
    fn default() -> Self { ExclusiveBound::Flag(false) }
}

/// Reference to a nested schema, resolved to an arena slot when possible.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchemaProxy {
    pub reference: Option<String>,
    pub target: Option<SchemaId>,
}

impl SchemaProxy {
    pub fn inline(target: SchemaId) -> Self {
        Self { reference: None, target: Some(target) }
    }

    pub fn is_reference(&self) -> bool { self.reference.is_some() }
}

pub type SchemaRefs = Vec<NodeReference<SchemaProxy>>;
pub type PropertyRefs = IndexMap<String, NodeReference<SchemaProxy>>;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Discriminator {
    pub property_name: NodeReference<String>,
    pub mapping: NodeReference<IndexMap<String, NodeReference<String>>>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Xml {
    pub name: NodeReference<String>,
    pub namespace: NodeReference<String>,
    pub prefix: NodeReference<String>,
    pub attribute: NodeReference<bool>,
    pub wrapped: NodeReference<bool>,
    pub extensions: IndexMap<String, NodeReference<Value>>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExternalDoc {
    pub description: NodeReference<String>,
    pub url: NodeReference<String>,
    pub extensions: IndexMap<String, NodeReference<Value>>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schema {
    /// Pointer of the schema object itself.
    pub origin: Origin,
    pub title: NodeReference<String>,
    pub multiple_of: NodeReference<f64>,
    pub maximum: NodeReference<f64>,
    pub exclusive_maximum: NodeReference<ExclusiveBound>,
    pub minimum: NodeReference<f64>,
    pub exclusive_minimum: NodeReference<ExclusiveBound>,
    pub max_length: NodeReference<u64>,
    pub min_length: NodeReference<u64>,
    pub pattern: NodeReference<String>,
    pub format: NodeReference<String>,
    pub max_items: NodeReference<u64>,
    pub min_items: NodeReference<u64>,
    pub unique_items: NodeReference<bool>,
    pub max_properties: NodeReference<u64>,
    pub min_properties: NodeReference<u64>,
    pub required: NodeReference<Vec<NodeReference<String>>>,
    pub enum_: NodeReference<Vec<NodeReference<Value>>>,
    pub type_: NodeReference<SchemaType>,
    pub all_of: NodeReference<SchemaRefs>,
    pub one_of: NodeReference<SchemaRefs>,
    pub any_of: NodeReference<SchemaRefs>,
    pub not: NodeReference<SchemaRefs>,
    pub items: NodeReference<SchemaRefs>,
    pub properties: NodeReference<PropertyRefs>,
    pub additional_properties: NodeReference<Value>,
    pub description: NodeReference<String>,
    pub default: NodeReference<Value>,
    pub nullable: NodeReference<bool>,
    pub discriminator: NodeReference<Discriminator>,
    pub read_only: NodeReference<bool>,
    pub write_only: NodeReference<bool>,
    pub xml: NodeReference<Xml>,
    pub external_docs: NodeReference<ExternalDoc>,
    pub example: NodeReference<Value>,
    pub deprecated: NodeReference<bool>,
    pub extensions: IndexMap<String, NodeReference<Value>>,
}
