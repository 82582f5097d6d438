//! Small descriptive objects a schema carries by value.
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::low::{self, NodeReference};

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Discriminator {
    pub property_name: String,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub mapping: IndexMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Xml {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub prefix: String,
    #[serde(skip_serializing_if = "is_false")]
    pub attribute: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub wrapped: bool,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ExternalDoc {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub url: String,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

fn is_false(b: &bool) -> bool { !*b }

/// Copy `x-` extensions out of their source-mapped wrappers.
pub fn extract_extensions(ext: &IndexMap<String, NodeReference<Value>>) -> IndexMap<String, Value> {
    ext.iter().map(|(k, v)| (k.clone(), v.value().clone())).collect()
}

impl From<&low::Discriminator> for Discriminator {
    fn from(d: &low::Discriminator) -> Self {
        Self {
            property_name: d.property_name.value().clone(),
            mapping: d.mapping.value()
                .iter()
                .map(|(k, v)| (k.clone(), v.value().clone()))
                .collect(),
        }
    }
}

impl From<&low::Xml> for Xml {
    fn from(x: &low::Xml) -> Self {
        Self {
            name: x.name.value().clone(),
            namespace: x.namespace.value().clone(),
            prefix: x.prefix.value().clone(),
            attribute: *x.attribute.value(),
            wrapped: *x.wrapped.value(),
            extensions: extract_extensions(&x.extensions),
        }
    }
}

impl From<&low::ExternalDoc> for ExternalDoc {
    fn from(d: &low::ExternalDoc) -> Self {
        Self {
            description: d.description.value().clone(),
            url: d.url.value().clone(),
            extensions: extract_extensions(&d.extensions),
        }
    }
}
