use std::borrow::Cow;
use std::fmt;

use once_cell::sync::{Lazy, OnceCell};

use super::{Schema, SchemaBuilder};
use crate::low::{self, NodeReference, Origin};

/// Backing node for proxies with nothing to point at.
static EMPTY: Lazy<low::Schema> = Lazy::new(low::Schema::default);

/// Deferred, memoizing handle to a nested schema.
///
/// Creating one does no work beyond storing the low-level node. The first
/// [`materialize`](Self::materialize) builds the target schema and caches it;
/// concurrent first calls block on the same initialization and every caller
/// sees the one cached result.
pub struct SchemaProxy<'a> {
    builder: &'a SchemaBuilder<'a>,
    node: Cow<'a, NodeReference<low::SchemaProxy>>,
    cache: OnceCell<Schema<'a>>,
}

impl<'a> SchemaProxy<'a> {
    pub(crate) fn new(builder: &'a SchemaBuilder<'a>, node: Cow<'a, NodeReference<low::SchemaProxy>>) -> Self {
        Self { builder, node, cache: OnceCell::new() }
    }

    /// False when the source slot held no schema object.
    pub fn is_present(&self) -> bool { self.node.is_present() }

    pub fn is_reference(&self) -> bool { self.node.value().is_reference() }

    /// The `$ref` text, for references.
    pub fn reference(&self) -> Option<&str> { self.node.value().reference.as_deref() }

    /// True when the proxy points at a schema in the document.
    pub fn is_resolved(&self) -> bool { self.target().is_some() }

    pub fn origin(&self) -> Option<&Origin> { self.node.origin() }

    pub fn node(&self) -> &NodeReference<low::SchemaProxy> { &self.node }

    /// The low-level schema behind this proxy, if it resolves.
    pub fn target(&self) -> Option<&'a low::Schema> {
        let document = self.builder.document();
        self.node.value().target.and_then(|id| document.schema(id))
    }

    pub fn is_materialized(&self) -> bool { self.cache.get().is_some() }

    /// Build (once) and return the target schema. Absent and unresolved
    /// proxies yield a schema whose fields are all defaults.
    pub fn materialize(&self) -> &Schema<'a> {
        self.cache.get_or_init(|| {
            let low = self.target().unwrap_or(&*EMPTY);
            self.builder.build(low)
        })
    }
}

impl PartialEq for SchemaProxy<'_> {
    fn eq(&self, other: &Self) -> bool {
        *self.node == *other.node
    }
}

impl fmt::Debug for SchemaProxy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaProxy")
            .field("present", &self.is_present())
            .field("reference", &self.reference())
            .field("target", &self.node.value().target)
            .field("materialized", &self.is_materialized())
            .finish()
    }
}
