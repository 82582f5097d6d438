//! Building a low-level [`Document`] out of a parsed JSON value.
//!
//! Each schema object is allocated once per JSON pointer. The slot is reserved
//! before its children are walked, which is what lets self-referencing
//! documents load in finite time. Only in-document `$ref`s are followed.
use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::node::{NodeReference, Origin};
use super::schema::*;
use crate::error::LoadError;

/// Longest chain of `$ref` -> `$ref` hops followed before giving up.
const MAX_REF_HOPS: usize = 32;

const EXTENSION_PREFIX: &str = "x-";

/// Arena owning every low-level schema reachable from one root.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    schemas: Vec<Schema>,
    pointers: IndexMap<String, SchemaId>,
    root: SchemaId,
    root_node: NodeReference<SchemaProxy>,
}

impl Document {
    /// Load the schema rooted at the top of `source`.
    pub fn from_value(source: &Value) -> Self {
        Loader::new(source).load_root(Origin::root(), source)
    }

    /// Load the schema found at `pointer` inside `source`. `$ref`s are still
    /// resolved against the whole of `source`.
    pub fn from_value_at(source: &Value, pointer: &str) -> Result<Self, LoadError> {
        let pointer = pointer.strip_prefix('#').unwrap_or(pointer);
        let node = source.pointer(pointer).ok_or_else(|| LoadError::MissingPointer {
            pointer: pointer.to_string(),
        })?;
        Ok(Loader::new(source).load_root(Origin::new(pointer), node))
    }

    pub fn parse(src: &str) -> Result<Self, LoadError> {
        let value = crate::path_de::from_str_with_path::<Value>(src)?;
        Ok(Self::from_value(&value))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, LoadError> {
        let value = crate::path_de::from_slice_with_path::<Value>(bytes)?;
        Ok(Self::from_value(&value))
    }

    /// Id of the root schema. When the root is a `$ref`, this is its target
    /// (or an empty placeholder if the reference does not resolve).
    pub fn root(&self) -> SchemaId { self.root }

    /// The root as a schema slot, keeping a root-level `$ref` visible.
    pub fn root_node(&self) -> &NodeReference<SchemaProxy> { &self.root_node }

    pub fn root_schema(&self) -> &Schema { &self.schemas[self.root.0] }

    pub fn schema(&self, id: SchemaId) -> Option<&Schema> { self.schemas.get(id.0) }

    /// Id of the schema loaded from `pointer`, if any.
    pub fn lookup(&self, pointer: &str) -> Option<SchemaId> {
        self.pointers.get(pointer).copied()
    }

    pub fn len(&self) -> usize { self.schemas.len() }

    pub fn is_empty(&self) -> bool { self.schemas.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (SchemaId, &Schema)> {
        self.schemas.iter().enumerate().map(|(i, s)| (SchemaId(i), s))
    }
}

struct Loader<'v> {
    source: &'v Value,
    schemas: Vec<Schema>,
    pointers: IndexMap<String, SchemaId>,
}

impl<'v> Loader<'v> {
    fn new(source: &'v Value) -> Self {
        Self { source, schemas: Vec::new(), pointers: IndexMap::new() }
    }

    fn load_root(mut self, origin: Origin, value: &'v Value) -> Document {
        let reference = match value.get("$ref") {
            Some(Value::String(reference)) => Some(reference.clone()),
            _ => None,
        };
        let target = reference.as_deref().and_then(|r| self.resolve(r));
        let root = match target {
            Some(id) => id,
            None => self.schema_at(origin.clone(), value),
        };
        let proxy = match reference {
            Some(reference) => SchemaProxy { reference: Some(reference), target },
            None => SchemaProxy::inline(root),
        };
        tracing::debug!(schemas = self.schemas.len(), "loaded low-level document");
        Document {
            schemas: self.schemas,
            pointers: self.pointers,
            root,
            root_node: NodeReference::present(proxy, origin),
        }
    }

    fn schema_at(&mut self, origin: Origin, value: &'v Value) -> SchemaId {
        if let Some(id) = self.pointers.get(&origin.pointer) {
            return *id;
        }
        let id = SchemaId(self.schemas.len());
        self.schemas.push(Schema::default());
        self.pointers.insert(origin.pointer.clone(), id);
        let schema = match value {
            Value::Object(map) => self.read_schema(origin, map),
            _ => Schema { origin, ..Schema::default() },
        };
        self.schemas[id.0] = schema;
        id
    }

    fn proxy_at(&mut self, origin: Origin, value: &'v Value) -> NodeReference<SchemaProxy> {
        let Value::Object(map) = value else {
            return NodeReference::absent_at(origin);
        };
        match map.get("$ref") {
            Some(Value::String(reference)) => {
                let target = self.resolve(reference);
                let proxy = SchemaProxy { reference: Some(reference.clone()), target };
                NodeReference::present(proxy, origin)
            }
            _ => {
                let id = self.schema_at(origin.clone(), value);
                NodeReference::present(SchemaProxy::inline(id), origin)
            }
        }
    }

    fn resolve(&mut self, reference: &str) -> Option<SchemaId> {
        let source = self.source;
        let mut reference = reference.to_string();
        for _ in 0..MAX_REF_HOPS {
            let Some(fragment) = reference.strip_prefix('#') else {
                tracing::trace!(%reference, "leaving external reference unresolved");
                return None;
            };
            // fragments are URI-encoded JSON pointers
            let pointer = match urlencoding::decode(fragment) {
                Ok(pointer) => pointer.into_owned(),
                Err(error) => {
                    tracing::warn!(%reference, %error, "reference fragment is not valid UTF-8");
                    return None;
                }
            };
            let Some(target) = source.pointer(&pointer) else {
                tracing::warn!(%reference, "reference does not resolve inside the document");
                return None;
            };
            match target.get("$ref") {
                Some(Value::String(next)) => reference = next.clone(),
                _ => return Some(self.schema_at(Origin::new(pointer), target)),
            }
        }
        tracing::warn!(%reference, hops = MAX_REF_HOPS, "reference chain too long");
        None
    }

    fn read_schema(&mut self, origin: Origin, map: &'v Map<String, Value>) -> Schema {
        let at = &origin;
        Schema {
            title: read(map, at, "title", string),
            multiple_of: read(map, at, "multipleOf", Value::as_f64),
            maximum: read(map, at, "maximum", Value::as_f64),
            exclusive_maximum: read(map, at, "exclusiveMaximum", exclusive_bound),
            minimum: read(map, at, "minimum", Value::as_f64),
            exclusive_minimum: read(map, at, "exclusiveMinimum", exclusive_bound),
            max_length: read(map, at, "maxLength", Value::as_u64),
            min_length: read(map, at, "minLength", Value::as_u64),
            pattern: read(map, at, "pattern", string),
            format: read(map, at, "format", string),
            max_items: read(map, at, "maxItems", Value::as_u64),
            min_items: read(map, at, "minItems", Value::as_u64),
            unique_items: read(map, at, "uniqueItems", Value::as_bool),
            max_properties: read(map, at, "maxProperties", Value::as_u64),
            min_properties: read(map, at, "minProperties", Value::as_u64),
            required: read_strings(map, at, "required"),
            enum_: read_values(map, at, "enum"),
            type_: read_type(map, at),
            all_of: self.read_refs(map, at, "allOf"),
            one_of: self.read_refs(map, at, "oneOf"),
            any_of: self.read_refs(map, at, "anyOf"),
            not: self.read_refs(map, at, "not"),
            items: self.read_refs(map, at, "items"),
            properties: self.read_properties(map, at),
            additional_properties: read(map, at, "additionalProperties", |v| Some(v.clone())),
            description: read(map, at, "description", string),
            default: read(map, at, "default", |v| Some(v.clone())),
            nullable: read(map, at, "nullable", Value::as_bool),
            discriminator: read_object(map, at, "discriminator", read_discriminator),
            read_only: read(map, at, "readOnly", Value::as_bool),
            write_only: read(map, at, "writeOnly", Value::as_bool),
            xml: read_object(map, at, "xml", read_xml),
            external_docs: read_object(map, at, "externalDocs", read_external_doc),
            example: read(map, at, "example", |v| Some(v.clone())),
            deprecated: read(map, at, "deprecated", Value::as_bool),
            extensions: read_extensions(map, at),
            origin,
        }
    }

    /// Composition keywords. A lone schema object (3.0 `items`, `not`) loads
    /// as a one-element sequence.
    fn read_refs(&mut self, map: &'v Map<String, Value>, at: &Origin, key: &str) -> NodeReference<SchemaRefs> {
        let origin = at.child(key);
        match map.get(key) {
            None => NodeReference::absent(),
            Some(Value::Array(xs)) => {
                let refs = xs.iter()
                    .enumerate()
                    .map(|(i, x)| self.proxy_at(origin.index(i), x))
                    .collect();
                NodeReference::present(refs, origin)
            }
            Some(x) => {
                let refs = vec![self.proxy_at(origin.clone(), x)];
                NodeReference::present(refs, origin)
            }
        }
    }

    fn read_properties(&mut self, map: &'v Map<String, Value>, at: &Origin) -> NodeReference<PropertyRefs> {
        let origin = at.child("properties");
        match map.get("properties") {
            Some(Value::Object(props)) => {
                let mut out = PropertyRefs::with_capacity(props.len());
                for (name, value) in props {
                    let proxy = self.proxy_at(origin.child(name), value);
                    out.insert(name.clone(), proxy);
                }
                NodeReference::present(out, origin)
            }
            Some(_) => NodeReference::absent_at(origin),
            None => NodeReference::absent(),
        }
    }
}

// ------------------------------ Field readers ----------------------------- //

/// Read `key` through `f`. A value of the wrong shape degrades to absent.
fn read<T: Default>(
    map: &Map<String, Value>,
    at: &Origin,
    key: &str,
    f: impl FnOnce(&Value) -> Option<T>,
) -> NodeReference<T> {
    let Some(value) = map.get(key) else {
        return NodeReference::absent();
    };
    let origin = at.child(key);
    match f(value) {
        Some(x) => NodeReference::present(x, origin),
        None => {
            tracing::trace!(%origin, "ignoring field with unexpected shape");
            NodeReference::absent_at(origin)
        }
    }
}

fn read_object<T: Default>(
    map: &Map<String, Value>,
    at: &Origin,
    key: &str,
    f: impl FnOnce(&Map<String, Value>, &Origin) -> T,
) -> NodeReference<T> {
    let origin = at.child(key);
    read(map, at, key, |v| v.as_object().map(|m| f(m, &origin)))
}

fn string(v: &Value) -> Option<String> {
    v.as_str().map(str::to_string)
}

fn exclusive_bound(v: &Value) -> Option<ExclusiveBound> {
    match v {
        Value::Bool(b) => Some(ExclusiveBound::Flag(*b)),
        Value::Number(n) => n.as_f64().map(ExclusiveBound::Bound),
        _ => None,
    }
}

fn read_type(map: &Map<String, Value>, at: &Origin) -> NodeReference<SchemaType> {
    let origin = at.child("type");
    read(map, at, "type", |v| match v {
        Value::String(s) => Some(SchemaType::Single(s.clone())),
        Value::Array(xs) => Some(SchemaType::Multiple(
            xs.iter()
                .enumerate()
                .filter_map(|(i, x)| x.as_str().map(|s| NodeReference::present(s.to_string(), origin.index(i))))
                .collect(),
        )),
        _ => None,
    })
}

fn read_strings(map: &Map<String, Value>, at: &Origin, key: &str) -> NodeReference<Vec<NodeReference<String>>> {
    let origin = at.child(key);
    read(map, at, key, |v| {
        v.as_array().map(|xs| {
            xs.iter()
                .enumerate()
                .filter_map(|(i, x)| x.as_str().map(|s| NodeReference::present(s.to_string(), origin.index(i))))
                .collect()
        })
    })
}

fn read_values(map: &Map<String, Value>, at: &Origin, key: &str) -> NodeReference<Vec<NodeReference<Value>>> {
    let origin = at.child(key);
    read(map, at, key, |v| {
        v.as_array().map(|xs| {
            xs.iter()
                .enumerate()
                .map(|(i, x)| NodeReference::present(x.clone(), origin.index(i)))
                .collect()
        })
    })
}

fn read_extensions(map: &Map<String, Value>, at: &Origin) -> IndexMap<String, NodeReference<Value>> {
    map.iter()
        .filter(|(k, _)| k.starts_with(EXTENSION_PREFIX))
        .map(|(k, v)| (k.clone(), NodeReference::present(v.clone(), at.child(k))))
        .collect()
}

fn read_discriminator(map: &Map<String, Value>, at: &Origin) -> Discriminator {
    let mapping_origin = at.child("mapping");
    Discriminator {
        property_name: read(map, at, "propertyName", string),
        mapping: read(map, at, "mapping", |v| {
            v.as_object().map(|m| {
                m.iter()
                    .filter_map(|(k, x)| {
                        x.as_str().map(|s| (k.clone(), NodeReference::present(s.to_string(), mapping_origin.child(k))))
                    })
                    .collect()
            })
        }),
    }
}

fn read_xml(map: &Map<String, Value>, at: &Origin) -> Xml {
    Xml {
        name: read(map, at, "name", string),
        namespace: read(map, at, "namespace", string),
        prefix: read(map, at, "prefix", string),
        attribute: read(map, at, "attribute", Value::as_bool),
        wrapped: read(map, at, "wrapped", Value::as_bool),
        extensions: read_extensions(map, at),
    }
}

fn read_external_doc(map: &Map<String, Value>, at: &Origin) -> ExternalDoc {
    ExternalDoc {
        description: read(map, at, "description", string),
        url: read(map, at, "url", string),
        extensions: read_extensions(map, at),
    }
}
