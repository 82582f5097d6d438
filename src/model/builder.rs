//! Schema assembly and the concurrent child fan-out.
//!
//! Building a schema copies its scalars, runs the dialect normalizer, then
//! creates one proxy per property and per composition entry:
//!
//! ```text
//! Idle → Dispatching → Awaiting → Joined
//! ```
//!
//! - Dispatching spawns one task per child inside a scope on the builder's
//!   own rayon pool. Property tasks insert into a mutex-guarded map, holding
//!   the lock for that insert only. Composition tasks send their proxy back
//!   with its source index.
//! - Awaiting is the scope join, then draining one completion per task.
//! - Joined places composition proxies by index and restores property source
//!   order, then hands everything to the [`Schema`] in one move.
//!
//! A build runs inside a proxy's one-time initialization, so it must never
//! wait on work that could try to materialize that same proxy. Pool workers
//! only create proxies, and callers that are already rayon workers (which
//! would steal other jobs while waiting on a scope) run the tasks inline.
//!
//! Proxy creation cannot fail, so there is no error path out of a build.
use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Mutex, PoisonError};

use indexmap::IndexMap;
use once_cell::sync::OnceCell;

use super::base::{extract_extensions, Discriminator, ExternalDoc, Xml};
use super::{Composition, Schema, SchemaProxy};
use crate::config::BuildConfig;
use crate::dialect;
use crate::error::BuildError;
use crate::low::{self, Document, NodeReference, SchemaId};

/// Counters for work done by a builder.
#[derive(Debug, Default)]
pub struct BuildStats {
    schemas_built: AtomicUsize,
    children_dispatched: AtomicUsize,
}

impl BuildStats {
    /// Number of schemas materialized so far.
    pub fn schemas_built(&self) -> usize { self.schemas_built.load(Ordering::Relaxed) }

    /// Number of child proxies created by fan-out so far.
    pub fn children_dispatched(&self) -> usize { self.children_dispatched.load(Ordering::Relaxed) }
}

pub struct SchemaBuilder<'a> {
    document: &'a Document,
    /// `None` inside means the pool could not be started; children are then
    /// created inline.
    pool: OnceCell<Option<rayon::ThreadPool>>,
    stats: BuildStats,
}

enum Completion<'a> {
    Property,
    Composition { keyword: Composition, index: usize, proxy: SchemaProxy<'a> },
}

#[derive(Default)]
struct Children<'a> {
    properties: IndexMap<String, SchemaProxy<'a>>,
    compositions: [Vec<SchemaProxy<'a>>; 5],
}

impl<'a> SchemaBuilder<'a> {
    /// Builder whose pool is started on first fan-out, sized to the
    /// available parallelism.
    pub fn new(document: &'a Document) -> Self {
        Self { document, pool: OnceCell::new(), stats: BuildStats::default() }
    }

    pub fn with_config(document: &'a Document, config: &BuildConfig) -> Result<Self, BuildError> {
        let pool = fan_out_pool(config.threads)?;
        Ok(Self { document, pool: OnceCell::with_value(Some(pool)), stats: BuildStats::default() })
    }

    pub fn document(&self) -> &'a Document { self.document }

    pub fn stats(&self) -> &BuildStats { &self.stats }

    /// Proxy for the document's root. A root `$ref` stays a reference.
    pub fn root(&'a self) -> SchemaProxy<'a> {
        self.proxy(self.document.root_node())
    }

    /// Proxy for an arbitrary schema of the document.
    pub fn proxy_for(&'a self, id: SchemaId) -> SchemaProxy<'a> {
        let origin = self.document.schema(id).map(|s| s.origin.clone()).unwrap_or_default();
        let node = NodeReference::present(low::SchemaProxy::inline(id), origin);
        SchemaProxy::new(self, Cow::Owned(node))
    }

    /// Wrap a low-level child reference. O(1): nothing is resolved here.
    pub fn proxy(&'a self, node: &'a NodeReference<low::SchemaProxy>) -> SchemaProxy<'a> {
        SchemaProxy::new(self, Cow::Borrowed(node))
    }

    /// Build the high-level schema for `low`. Children come back as
    /// unmaterialized proxies.
    pub fn build(&'a self, low: &'a low::Schema) -> Schema<'a> {
        let exclusive_maximum = dialect::normalize_exclusive(&low.exclusive_maximum);
        let exclusive_minimum = dialect::normalize_exclusive(&low.exclusive_minimum);
        let Children { properties, compositions } = self.build_children(low);
        let [all_of, one_of, any_of, not, items] = compositions;
        self.stats.schemas_built.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(origin = %low.origin, properties = properties.len(), "built schema");

        Schema {
            title: low.title.value().clone(),
            multiple_of: *low.multiple_of.value(),
            maximum: *low.maximum.value(),
            exclusive_maximum_flag: exclusive_maximum.flag,
            exclusive_maximum: exclusive_maximum.bound,
            minimum: *low.minimum.value(),
            exclusive_minimum_flag: exclusive_minimum.flag,
            exclusive_minimum: exclusive_minimum.bound,
            max_length: *low.max_length.value(),
            min_length: *low.min_length.value(),
            pattern: low.pattern.value().clone(),
            format: low.format.value().clone(),
            max_items: *low.max_items.value(),
            min_items: *low.min_items.value(),
            unique_items: *low.unique_items.value(),
            max_properties: *low.max_properties.value(),
            min_properties: *low.min_properties.value(),
            required: low.required.value().iter().map(|r| r.value().clone()).collect(),
            enum_: low.enum_.value().iter().map(|e| e.value().clone()).collect(),
            type_: dialect::normalize_type(&low.type_),
            all_of,
            one_of,
            any_of,
            not,
            items,
            properties,
            additional_properties: present_clone(&low.additional_properties),
            description: low.description.value().clone(),
            default: present_clone(&low.default),
            nullable: *low.nullable.value(),
            discriminator: low.discriminator.is_present().then(|| Discriminator::from(low.discriminator.value())),
            read_only: *low.read_only.value(),
            write_only: *low.write_only.value(),
            xml: low.xml.is_present().then(|| Xml::from(low.xml.value())),
            external_docs: low.external_docs.is_present().then(|| ExternalDoc::from(low.external_docs.value())),
            example: present_clone(&low.example),
            deprecated: *low.deprecated.value(),
            extensions: extract_extensions(&low.extensions),
            low,
        }
    }

    fn build_children(&'a self, low: &'a low::Schema) -> Children<'a> {
        let source_props = low.properties.value();
        let sources = Composition::ALL.map(|keyword| keyword.refs(low));
        let expected = source_props.len() + sources.iter().map(|s| s.len()).sum::<usize>();
        if expected == 0 {
            return Children::default();
        }

        // dispatching
        let pool = self.fan_out();
        tracing::trace!(origin = %low.origin, expected, inline = pool.is_none(), "dispatching schema children");
        let properties = Mutex::new(IndexMap::with_capacity(source_props.len()));
        let (tx, rx) = mpsc::channel::<Completion<'a>>();
        let property = |name: &'a String, node: &'a NodeReference<low::SchemaProxy>| {
            let proxy = self.proxy(node);
            properties
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(name.clone(), proxy);
            // the receiver outlives every sender
            let _ = tx.send(Completion::Property);
        };
        let composition = |keyword: Composition, index: usize, node: &'a NodeReference<low::SchemaProxy>| {
            let proxy = self.proxy(node);
            let _ = tx.send(Completion::Composition { keyword, index, proxy });
        };
        let entries = || {
            Composition::ALL.into_iter().zip(sources).flat_map(|(keyword, nodes)| {
                nodes.iter().enumerate().map(move |(index, node)| (keyword, index, node))
            })
        };
        match pool {
            Some(pool) => pool.scope(|scope| {
                let (property, composition) = (&property, &composition);
                for (name, node) in source_props {
                    scope.spawn(move |_| property(name, node));
                }
                for (keyword, index, node) in entries() {
                    scope.spawn(move |_| composition(keyword, index, node));
                }
            }),
            None => {
                for (name, node) in source_props {
                    property(name, node);
                }
                for (keyword, index, node) in entries() {
                    composition(keyword, index, node);
                }
            }
        }
        drop(tx);

        // awaiting
        let mut slots: [Vec<Option<SchemaProxy<'a>>>; 5] =
            sources.map(|s| std::iter::repeat_with(|| None).take(s.len()).collect());
        let mut completed = 0;
        for completion in rx.iter() {
            completed += 1;
            if let Completion::Composition { keyword, index, proxy } = completion {
                slots[keyword.slot()][index] = Some(proxy);
            }
        }
        debug_assert_eq!(completed, expected, "every dispatched child completes exactly once");
        self.stats.children_dispatched.fetch_add(completed, Ordering::Relaxed);

        // joined
        let mut properties = properties.into_inner().unwrap_or_else(PoisonError::into_inner);
        properties.sort_by(|a, _, b, _| source_props.get_index_of(a).cmp(&source_props.get_index_of(b)));
        Children {
            properties,
            compositions: slots.map(|slot| slot.into_iter().flatten().collect()),
        }
    }

    /// Pool for child fan-out, or `None` to create children on the calling
    /// thread. Rayon workers never block on a scope here: while waiting they
    /// would steal jobs that may re-enter the proxy being initialized.
    fn fan_out(&self) -> Option<&rayon::ThreadPool> {
        if rayon::current_thread_index().is_some() {
            return None;
        }
        self.pool
            .get_or_init(|| match fan_out_pool(None) {
                Ok(pool) => Some(pool),
                Err(error) => {
                    tracing::warn!(%error, "fan-out pool unavailable, building children inline");
                    None
                }
            })
            .as_ref()
    }
}

impl fmt::Debug for SchemaBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaBuilder")
            .field("schemas", &self.document.len())
            .field("threads", &self.pool.get().and_then(Option::as_ref).map(|p| p.current_num_threads()))
            .field("stats", &self.stats)
            .finish()
    }
}

fn fan_out_pool(threads: Option<usize>) -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("schema-build-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder.build()
}

fn present_clone<T: Clone>(node: &NodeReference<T>) -> Option<T> {
    node.is_present().then(|| node.value().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use rayon::prelude::*;
    use serde_json::{json, Map, Value};

    #[test]
    fn empty_schema_builds_empty_containers() {
        let doc = Document::from_value(&json!({}));
        let builder = SchemaBuilder::new(&doc);
        let root = builder.root();
        let s = root.materialize();
        assert!(s.properties.is_empty());
        for keyword in Composition::ALL {
            assert!(s.composition(keyword).is_empty());
        }
        assert_eq!(builder.stats().children_dispatched(), 0);
        assert_eq!(s.title, "");
        assert_eq!(s.maximum, 0.0);
        assert!(s.type_.is_empty());
        assert!(s.discriminator.is_none());
    }

    #[test]
    fn scalars_and_dialect_fields_are_copied() {
        let doc = Document::from_value(&json!({
            "title": "Limit",
            "type": "integer",
            "maximum": 10,
            "exclusiveMaximum": true,
            "exclusiveMinimum": 2,
            "minLength": 1,
            "required": ["a", "b"],
            "enum": [1, "two"],
            "nullable": true,
            "default": 3,
            "x-tag": "keep",
            "externalDocs": {"url": "https://example.com/limit"},
        }));
        let builder = SchemaBuilder::new(&doc);
        let root = builder.root();
        let s = root.materialize();
        assert_eq!(s.title, "Limit");
        assert_eq!(s.type_, ["integer"]);
        assert_eq!(s.maximum, 10.0);
        assert!(s.exclusive_maximum_flag);
        assert_eq!(s.exclusive_maximum, 0.0);
        assert!(!s.exclusive_minimum_flag);
        assert_eq!(s.exclusive_minimum, 2.0);
        assert_eq!(s.exclusive_maximum_dialect(), Some(dialect::Dialect::V30));
        assert_eq!(s.exclusive_minimum_dialect(), Some(dialect::Dialect::V31));
        assert_eq!(s.min_length, 1);
        assert_eq!(s.required, ["a", "b"]);
        assert_eq!(s.enum_, [json!(1), json!("two")]);
        assert!(s.nullable);
        assert_eq!(s.default, Some(json!(3)));
        assert!(s.example.is_none());
        assert_eq!(s.extensions["x-tag"], json!("keep"));
        assert_eq!(s.external_docs.as_ref().map(|d| d.url.as_str()), Some("https://example.com/limit"));
        assert!(std::ptr::eq(s.low(), doc.root_schema()));
    }

    #[test]
    fn numeric_exclusive_maximum_leaves_flag_unset() {
        let doc = Document::from_value(&json!({"type": ["string", "null"], "exclusiveMaximum": 5}));
        let builder = SchemaBuilder::new(&doc);
        let root = builder.root();
        let s = root.materialize();
        assert_eq!(s.type_, ["string", "null"]);
        assert_eq!(s.exclusive_maximum, 5.0);
        assert!(!s.exclusive_maximum_flag);
    }

    #[test]
    fn children_match_source_counts_presence_and_order() {
        let doc = Document::from_value(&json!({
            "properties": {
                "id": {"type": "string"},
                "anything": true,
                "owner": {"$ref": "#/properties/id"},
            },
            "allOf": [{"title": "a0"}, {"title": "a1"}, {"title": "a2"}],
            "oneOf": [{"title": "o0"}, null, {"title": "o2"}],
            "anyOf": [{"title": "y0"}],
            "not": {"title": "n0"},
            "items": [{"title": "i0"}, {"title": "i1"}],
        }));
        let builder = SchemaBuilder::new(&doc);
        let root = builder.root();
        let s = root.materialize();

        let source = doc.root_schema().properties.value();
        assert_eq!(s.properties.len(), source.len());
        for (name, node) in source {
            assert_eq!(s.properties[name].is_present(), node.is_present());
        }
        let names: Vec<_> = s.properties.keys().map(String::as_str).collect();
        assert_eq!(names, ["id", "anything", "owner"]);

        let titles = |keyword: Composition| -> Vec<String> {
            s.composition(keyword).iter().map(|p| p.materialize().title.clone()).collect()
        };
        assert_eq!(titles(Composition::AllOf), ["a0", "a1", "a2"]);
        assert_eq!(titles(Composition::OneOf), ["o0", "", "o2"]);
        assert!(!s.one_of[1].is_present());
        assert_eq!(titles(Composition::AnyOf), ["y0"]);
        assert_eq!(titles(Composition::Not), ["n0"]);
        assert_eq!(titles(Composition::Items), ["i0", "i1"]);
        assert_eq!(builder.stats().children_dispatched(), 3 + 3 + 3 + 1 + 1 + 2);
    }

    #[test]
    fn materialize_is_idempotent_and_builds_once() {
        let doc = Document::from_value(&json!({
            "properties": {"child": {"type": "object", "properties": {"leaf": {"type": "string"}}}}
        }));
        let builder = SchemaBuilder::new(&doc);
        let root = builder.root();
        let child = &root.materialize().properties["child"];
        assert!(!child.is_materialized());
        let built = builder.stats().schemas_built();

        let first = child.materialize();
        assert_eq!(builder.stats().schemas_built(), built + 1);
        let second = child.materialize();
        assert_eq!(builder.stats().schemas_built(), built + 1);
        assert!(std::ptr::eq(first, second));
        assert_eq!(first, second);
        assert_eq!(first.properties.len(), 1);
    }

    #[test]
    fn concurrent_first_access_builds_once() {
        let doc = Document::from_value(&json!({"properties": {"p": {"title": "shared"}}}));
        let builder = SchemaBuilder::new(&doc);
        let root = builder.root();
        let child = &root.materialize().properties["p"];
        let before = builder.stats().schemas_built();
        let seen: Vec<usize> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| child.materialize() as *const Schema<'_> as usize))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(seen.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(builder.stats().schemas_built(), before + 1);
    }

    fn wide_child(width: usize) -> Document {
        let props: Map<String, Value> = (0..width).map(|i| (format!("p{i}"), json!({"title": i}))).collect();
        Document::from_value(&json!({"properties": {"wide": {"properties": props}}}))
    }

    #[test]
    fn materialize_from_rayon_workers_completes() {
        let doc = wide_child(2000);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(8).build().unwrap();
        for _ in 0..50 {
            let builder = SchemaBuilder::new(&doc);
            let root = builder.root();
            let wide = &root.materialize().properties["wide"];
            let before = builder.stats().schemas_built();
            pool.install(|| {
                (0..256).into_par_iter().for_each(|_| {
                    assert_eq!(wide.materialize().properties.len(), 2000);
                });
            });
            assert_eq!(builder.stats().schemas_built(), before + 1);
        }
    }

    #[test]
    fn plain_threads_and_rayon_workers_share_one_build() {
        let doc = wide_child(500);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
        for _ in 0..20 {
            let builder = SchemaBuilder::with_config(&doc, &BuildConfig { threads: Some(2) }).unwrap();
            let root = builder.root();
            let wide = &root.materialize().properties["wide"];
            let before = builder.stats().schemas_built();
            std::thread::scope(|scope| {
                for _ in 0..4 {
                    scope.spawn(|| assert_eq!(wide.materialize().properties.len(), 500));
                }
                scope.spawn(|| {
                    pool.install(|| {
                        (0..64).into_par_iter().for_each(|_| {
                            assert_eq!(wide.materialize().properties.len(), 500);
                        });
                    });
                });
            });
            assert_eq!(builder.stats().schemas_built(), before + 1);
        }
    }

    #[test]
    fn root_reference_is_visible_on_the_root_proxy() {
        let source = json!({"components": {"schemas": {
            "Pet": {"$ref": "#/components/schemas/Animal"},
            "Animal": {"title": "Animal", "type": "object"},
        }}});
        let doc = Document::from_value_at(&source, "/components/schemas/Pet").unwrap();
        let builder = SchemaBuilder::new(&doc);
        let root = builder.root();
        assert!(root.is_reference());
        assert!(root.is_resolved());
        assert_eq!(root.reference(), Some("#/components/schemas/Animal"));
        let s = root.materialize();
        assert_eq!(s.title, "Animal");
        assert_eq!(s.type_, ["object"]);
    }

    #[test]
    fn self_reference_stays_lazy() {
        let source = json!({
            "components": {"schemas": {"Tree": {
                "type": "object",
                "properties": {
                    "children": {"type": "array", "items": {"$ref": "#/components/schemas/Tree"}},
                    "parent": {"$ref": "#/components/schemas/Tree"},
                },
                "anyOf": [{"$ref": "#/components/schemas/Tree"}],
            }}}
        });
        let doc = Document::from_value_at(&source, "#/components/schemas/Tree").unwrap();
        let builder = SchemaBuilder::new(&doc);
        let root = builder.root();
        let tree = root.materialize();
        assert_eq!(builder.stats().schemas_built(), 1);

        let parent = &tree.properties["parent"];
        assert!(parent.is_reference());
        assert!(!parent.is_materialized());
        assert!(std::ptr::eq(parent.target().unwrap(), doc.root_schema()));

        // walking the cycle a few steps builds exactly one schema per step
        let again = parent.materialize();
        let deeper = again.properties["parent"].materialize();
        assert_eq!(deeper.properties.len(), 2);
        assert_eq!(builder.stats().schemas_built(), 3);
        let items = tree.properties["children"].materialize();
        assert_eq!(items.items[0].reference(), Some("#/components/schemas/Tree"));
    }

    #[test]
    fn unresolved_reference_materializes_to_defaults() {
        let doc = Document::from_value(&json!({"allOf": [{"$ref": "remote.json#/Pet"}]}));
        let builder = SchemaBuilder::new(&doc);
        let root = builder.root();
        let proxy = &root.materialize().all_of[0];
        assert!(proxy.is_present());
        assert!(!proxy.is_resolved());
        let s = proxy.materialize();
        assert!(s.properties.is_empty());
        assert_eq!(s.title, "");
    }

    #[test]
    fn dedicated_pool_from_config() {
        let doc = Document::from_value(&json!({"properties": {"a": {}, "b": {}}, "oneOf": [{}, {}]}));
        let builder = SchemaBuilder::with_config(&doc, &BuildConfig { threads: Some(1) }).unwrap();
        let root = builder.root();
        let s = root.materialize();
        assert_eq!(s.properties.len(), 2);
        assert_eq!(s.one_of.len(), 2);
    }

    #[test]
    fn wide_schema_stress() {
        const N: usize = 10_000;
        const M: usize = 257;
        let mut rng = rand::thread_rng();
        for _ in 0..3 {
            let mut names: Vec<String> = (0..N).map(|i| format!("p{i}")).collect();
            names.shuffle(&mut rng);
            let mut props = Map::new();
            for (i, name) in names.iter().enumerate() {
                let value = if i % 97 == 0 { Value::Bool(true) } else { json!({"title": name}) };
                props.insert(name.clone(), value);
            }
            let seq = |tag: &str| -> Value {
                Value::Array((0..M).map(|i| json!({"title": format!("{tag}{i}")})).collect())
            };
            let doc = Document::from_value(&json!({
                "properties": props,
                "allOf": seq("a"), "oneOf": seq("o"), "anyOf": seq("y"), "not": seq("n"), "items": seq("i"),
            }));
            let builder = SchemaBuilder::with_config(&doc, &BuildConfig { threads: Some(4) }).unwrap();
            let root = builder.root();
            let s = root.materialize();

            assert_eq!(s.properties.len(), N);
            let keys: Vec<&String> = s.properties.keys().collect();
            let expected: Vec<&String> = names.iter().collect();
            assert_eq!(keys, expected, "properties keep source order");
            for (i, name) in names.iter().enumerate() {
                assert_eq!(s.properties[name].is_present(), i % 97 != 0);
            }
            for (keyword, tag) in Composition::ALL.into_iter().zip(["a", "o", "y", "n", "i"]) {
                let seq = s.composition(keyword);
                assert_eq!(seq.len(), M);
                for (i, proxy) in seq.iter().enumerate() {
                    let pointer = format!("/{}/{}", keyword.keyword(), i);
                    assert_eq!(proxy.origin().map(|o| o.pointer.as_str()), Some(pointer.as_str()));
                }
                assert_eq!(seq[M - 1].materialize().title, format!("{tag}{}", M - 1));
            }
        }
    }
}
