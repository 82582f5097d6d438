//! Dialect normalization.
//!
//! OpenAPI 3.0 and 3.1 disagree on the shape of a few schema keywords. The
//! low level keeps them as tagged unions; here they are flattened into the
//! canonical high-level fields. Exclusivity is flattened into *two* fields
//! (flag and bound) rather than one, so readers can still tell which dialect
//! wrote the value.
use crate::low::{ExclusiveBound, NodeReference, SchemaType};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Single `type` string, boolean `exclusiveMinimum` / `exclusiveMaximum`.
    V30,
    /// `type` list, numeric `exclusiveMinimum` / `exclusiveMaximum`.
    V31,
}

/// Canonical exclusivity: whichever form the source did not use stays zero.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Exclusive {
    pub flag: bool,
    pub bound: f64,
}

/// `type` as an ordered sequence. Empty only when the keyword is absent.
pub fn normalize_type(node: &NodeReference<SchemaType>) -> Vec<String> {
    if node.is_empty() {
        return Vec::new();
    }
    match node.value() {
        SchemaType::Single(name) => vec![name.clone()],
        SchemaType::Multiple(names) => names.iter().map(|n| n.value().clone()).collect(),
    }
}

pub fn normalize_exclusive(node: &NodeReference<ExclusiveBound>) -> Exclusive {
    if node.is_empty() {
        return Exclusive::default();
    }
    match *node.value() {
        ExclusiveBound::Flag(flag) => Exclusive { flag, ..Exclusive::default() },
        ExclusiveBound::Bound(bound) => Exclusive { bound, ..Exclusive::default() },
    }
}

pub fn type_dialect(node: &NodeReference<SchemaType>) -> Option<Dialect> {
    match node.value() {
        _ if node.is_empty() => None,
        SchemaType::Single(_) => Some(Dialect::V30),
        SchemaType::Multiple(_) => Some(Dialect::V31),
    }
}

pub fn exclusive_dialect(node: &NodeReference<ExclusiveBound>) -> Option<Dialect> {
    match node.value() {
        _ if node.is_empty() => None,
        ExclusiveBound::Flag(_) => Some(Dialect::V30),
        ExclusiveBound::Bound(_) => Some(Dialect::V31),
    }
}
