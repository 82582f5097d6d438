//! Low-level, source-mapped schema tree.
//!
//! This is the input side of the model: every value is wrapped in a
//! [`NodeReference`] that remembers where it came from and whether it was
//! there at all. Nested schemas live in a [`Document`] arena and are linked by
//! [`SchemaId`], so recursive documents are plain data here.
pub mod node;
pub mod schema;
pub mod load;

pub use node::{NodeReference, Origin};
pub use schema::{
    Discriminator, ExclusiveBound, ExternalDoc, PropertyRefs, Schema, SchemaId, SchemaProxy,
    SchemaRefs, SchemaType, Xml,
};
pub use load::Document;
