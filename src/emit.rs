//! JSON view of a high-level schema.
//!
//! Fields are emitted when the source had them, so present zero values
//! survive a round trip. Exclusivity goes out in the dialect it came in.
//! Nested schemas are materialized down to `max_depth`; past that, and for
//! `$ref`s unless `expand_refs` is set, a `{"$ref": ...}` stub is written.
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::EmitOptions;
use crate::dialect::Dialect;
use crate::low::{self, NodeReference};
use crate::model::{Composition, Schema, SchemaProxy};

pub fn emit_schema(schema: &Schema<'_>, options: &EmitOptions) -> Value {
    emit_at(schema, options, 0)
}

/// Like [`emit_schema`], starting from a proxy: a top-level `$ref` is written
/// as a stub unless `expand_refs` is set.
pub fn emit_proxy(proxy: &SchemaProxy<'_>, options: &EmitOptions) -> Value {
    match proxy.reference() {
        Some(reference) if !options.expand_refs || !proxy.is_resolved() => ref_stub(reference),
        _ => emit_at(proxy.materialize(), options, 0),
    }
}

fn emit_at(schema: &Schema<'_>, options: &EmitOptions, depth: usize) -> Value {
    let low = schema.low();
    let mut o = Map::new();

    if options.origins {
        o.insert("x-origin".into(), Value::from(schema.origin().to_string()));
    }
    put(&mut o, "title", &low.title, || Value::from(schema.title.clone()));
    match (schema.type_dialect(), schema.type_.as_slice()) {
        (None, _) => {}
        (Some(Dialect::V30), [single]) => { o.insert("type".into(), Value::from(single.clone())); }
        (Some(_), names) => { o.insert("type".into(), Value::from(names.to_vec())); }
    }
    put(&mut o, "format", &low.format, || Value::from(schema.format.clone()));
    put(&mut o, "description", &low.description, || Value::from(schema.description.clone()));

    // ---- numeric ----
    put(&mut o, "multipleOf", &low.multiple_of, || num_pref_i64(schema.multiple_of));
    put(&mut o, "minimum", &low.minimum, || num_pref_i64(schema.minimum));
    match schema.exclusive_minimum_dialect() {
        Some(Dialect::V30) => { o.insert("exclusiveMinimum".into(), Value::from(schema.exclusive_minimum_flag)); }
        Some(Dialect::V31) => { o.insert("exclusiveMinimum".into(), num_pref_i64(schema.exclusive_minimum)); }
        None => {}
    }
    put(&mut o, "maximum", &low.maximum, || num_pref_i64(schema.maximum));
    match schema.exclusive_maximum_dialect() {
        Some(Dialect::V30) => { o.insert("exclusiveMaximum".into(), Value::from(schema.exclusive_maximum_flag)); }
        Some(Dialect::V31) => { o.insert("exclusiveMaximum".into(), num_pref_i64(schema.exclusive_maximum)); }
        None => {}
    }

    // ---- string / array / object bounds ----
    put(&mut o, "minLength", &low.min_length, || Value::from(schema.min_length));
    put(&mut o, "maxLength", &low.max_length, || Value::from(schema.max_length));
    put(&mut o, "pattern", &low.pattern, || Value::from(schema.pattern.clone()));
    put(&mut o, "minItems", &low.min_items, || Value::from(schema.min_items));
    put(&mut o, "maxItems", &low.max_items, || Value::from(schema.max_items));
    put(&mut o, "uniqueItems", &low.unique_items, || Value::from(schema.unique_items));
    put(&mut o, "minProperties", &low.min_properties, || Value::from(schema.min_properties));
    put(&mut o, "maxProperties", &low.max_properties, || Value::from(schema.max_properties));
    put(&mut o, "required", &low.required, || Value::from(schema.required.clone()));
    put(&mut o, "enum", &low.enum_, || Value::Array(schema.enum_.clone()));

    // ---- children ----
    if low.properties.is_present() {
        let props: Map<String, Value> = schema.properties
            .iter()
            .map(|(name, p)| (name.clone(), emit_child(p, options, depth)))
            .collect();
        o.insert("properties".into(), Value::Object(props));
    }
    for keyword in Composition::ALL {
        let node = keyword_node(low, keyword);
        if node.is_empty() {
            continue;
        }
        let children = schema.composition(keyword);
        let value = match children {
            [only] if is_single_form(node) => emit_child(only, options, depth),
            _ => Value::Array(children.iter().map(|p| emit_child(p, options, depth)).collect()),
        };
        o.insert(keyword.keyword().into(), value);
    }
    if let Some(v) = &schema.additional_properties {
        o.insert("additionalProperties".into(), v.clone());
    }

    // ---- annotations ----
    if let Some(v) = &schema.default {
        o.insert("default".into(), v.clone());
    }
    put(&mut o, "nullable", &low.nullable, || Value::from(schema.nullable));
    put(&mut o, "readOnly", &low.read_only, || Value::from(schema.read_only));
    put(&mut o, "writeOnly", &low.write_only, || Value::from(schema.write_only));
    put(&mut o, "deprecated", &low.deprecated, || Value::from(schema.deprecated));
    if let Some(v) = &schema.example {
        o.insert("example".into(), v.clone());
    }
    put_serialized(&mut o, "discriminator", schema.discriminator.as_ref());
    put_serialized(&mut o, "xml", schema.xml.as_ref());
    put_serialized(&mut o, "externalDocs", schema.external_docs.as_ref());
    for (k, v) in &schema.extensions {
        o.insert(k.clone(), v.clone());
    }

    Value::Object(o)
}

fn emit_child(proxy: &SchemaProxy<'_>, options: &EmitOptions, depth: usize) -> Value {
    if !proxy.is_present() {
        return Value::Object(Map::new());
    }
    if let Some(reference) = proxy.reference() {
        if !options.expand_refs || !proxy.is_resolved() {
            return ref_stub(reference);
        }
    }
    if depth + 1 > options.max_depth {
        let pointer = proxy.reference()
            .map(str::to_string)
            .or_else(|| proxy.origin().map(|o| o.to_string()))
            .unwrap_or_else(|| "#".to_string());
        return ref_stub(&pointer);
    }
    emit_at(proxy.materialize(), options, depth + 1)
}

fn ref_stub(reference: &str) -> Value {
    let mut o = Map::new();
    o.insert("$ref".into(), Value::from(reference));
    Value::Object(o)
}

fn put<T>(o: &mut Map<String, Value>, key: &str, node: &NodeReference<T>, value: impl FnOnce() -> Value) {
    if node.is_present() {
        o.insert(key.into(), value());
    }
}

fn put_serialized<T: Serialize>(o: &mut Map<String, Value>, key: &str, value: Option<&T>) {
    let Some(value) = value else { return };
    match serde_json::to_value(value) {
        Ok(v) => { o.insert(key.into(), v); }
        Err(error) => tracing::warn!(key, %error, "dropping field that failed to serialize"),
    }
}

fn keyword_node(low: &low::Schema, keyword: Composition) -> &NodeReference<low::SchemaRefs> {
    match keyword {
        Composition::AllOf => &low.all_of,
        Composition::OneOf => &low.one_of,
        Composition::AnyOf => &low.any_of,
        Composition::Not => &low.not,
        Composition::Items => &low.items,
    }
}

/// A lone schema object (3.0 `items: {...}`) shares its keyword's origin.
fn is_single_form(node: &NodeReference<low::SchemaRefs>) -> bool {
    match node.value().as_slice() {
        [only] => only.origin() == node.origin(),
        _ => false,
    }
}

// Helper: prefer emitting integers when exact
fn num_pref_i64(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}
