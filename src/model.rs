//! High-level, application-facing schema model.
//!
//! A [`Schema`] is derived one way from a low-level [`crate::low::Schema`] and
//! keeps a borrowed back-reference to it. Nested schemas are never built
//! eagerly: they sit behind [`SchemaProxy`] handles that materialize on first
//! access, so recursive schema graphs stay finite.
pub mod base;
pub mod proxy;
pub mod builder;

use indexmap::IndexMap;
use serde_json::Value;

use crate::dialect::{self, Dialect};
use crate::low::{self, Origin};

pub use base::{Discriminator, ExternalDoc, Xml};
pub use builder::{BuildStats, SchemaBuilder};
pub use proxy::SchemaProxy;

/// The five keywords holding ordered sequences of nested schemas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Composition {
    AllOf = 0,
    OneOf = 1,
    AnyOf = 2,
    Not = 3,
    Items = 4,
}

impl Composition {
    pub const ALL: [Composition; 5] = [
        Composition::AllOf,
        Composition::OneOf,
        Composition::AnyOf,
        Composition::Not,
        Composition::Items,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            Composition::AllOf => "allOf",
            Composition::OneOf => "oneOf",
            Composition::AnyOf => "anyOf",
            Composition::Not => "not",
            Composition::Items => "items",
        }
    }

    pub(crate) fn slot(self) -> usize { self as usize }

    /// Source entries of this keyword in a low-level schema.
    pub fn refs(self, low: &low::Schema) -> &[low::NodeReference<low::SchemaProxy>] {
        match self {
            Composition::AllOf => low.all_of.value(),
            Composition::OneOf => low.one_of.value(),
            Composition::AnyOf => low.any_of.value(),
            Composition::Not => low.not.value(),
            Composition::Items => low.items.value(),
        }
    }
}

/// A fully built schema node. Structural fields are complete once a value of
/// this type exists; there is no partially joined state to observe.
#[derive(Debug, PartialEq)]
pub struct Schema<'a> {
    pub title: String,
    pub multiple_of: f64,
    pub maximum: f64,
    /// 3.0 form: `maximum` is exclusive.
    pub exclusive_maximum_flag: bool,
    /// 3.1 form: the exclusive bound itself.
    pub exclusive_maximum: f64,
    pub minimum: f64,
    pub exclusive_minimum_flag: bool,
    pub exclusive_minimum: f64,
    pub max_length: u64,
    pub min_length: u64,
    pub pattern: String,
    pub format: String,
    pub max_items: u64,
    pub min_items: u64,
    pub unique_items: bool,
    pub max_properties: u64,
    pub min_properties: u64,
    pub required: Vec<String>,
    pub enum_: Vec<Value>,
    pub type_: Vec<String>,
    pub all_of: Vec<SchemaProxy<'a>>,
    pub one_of: Vec<SchemaProxy<'a>>,
    pub any_of: Vec<SchemaProxy<'a>>,
    pub not: Vec<SchemaProxy<'a>>,
    pub items: Vec<SchemaProxy<'a>>,
    pub properties: IndexMap<String, SchemaProxy<'a>>,
    pub additional_properties: Option<Value>,
    pub description: String,
    pub default: Option<Value>,
    pub nullable: bool,
    pub discriminator: Option<Discriminator>,
    pub read_only: bool,
    pub write_only: bool,
    pub xml: Option<Xml>,
    pub external_docs: Option<ExternalDoc>,
    pub example: Option<Value>,
    pub deprecated: bool,
    pub extensions: IndexMap<String, Value>,
    pub(crate) low: &'a low::Schema,
}

impl<'a> Schema<'a> {
    /// The low-level node this schema was built from.
    pub fn low(&self) -> &'a low::Schema { self.low }

    pub fn origin(&self) -> &'a Origin { &self.low.origin }

    pub fn composition(&self, keyword: Composition) -> &[SchemaProxy<'a>] {
        match keyword {
            Composition::AllOf => &self.all_of,
            Composition::OneOf => &self.one_of,
            Composition::AnyOf => &self.any_of,
            Composition::Not => &self.not,
            Composition::Items => &self.items,
        }
    }

    pub fn type_dialect(&self) -> Option<Dialect> {
        dialect::type_dialect(&self.low.type_)
    }

    pub fn exclusive_maximum_dialect(&self) -> Option<Dialect> {
        dialect::exclusive_dialect(&self.low.exclusive_maximum)
    }

    pub fn exclusive_minimum_dialect(&self) -> Option<Dialect> {
        dialect::exclusive_dialect(&self.low.exclusive_minimum)
    }
}
