//! High-level schema model for OpenAPI / JSON Schema documents.
//!
//! A low-level, source-mapped [`low::Document`] is turned into strongly typed
//! [`model::Schema`] values by a [`model::SchemaBuilder`]:
//!
//! - dialect differences (OpenAPI 3.0 vs 3.1) are normalized on the way in,
//! - nested schemas sit behind lazy [`model::SchemaProxy`] handles, so
//!   recursive schemas never build unboundedly,
//! - properties and composition entries of one schema are fanned out on a
//!   rayon pool and joined before the schema is handed out.
//!
//! ```
//! use schema_model::low::Document;
//! use schema_model::model::SchemaBuilder;
//!
//! let doc = Document::parse(r#"{"type": "string", "exclusiveMaximum": 5}"#).unwrap();
//! let builder = SchemaBuilder::new(&doc);
//! let root = builder.root();
//! let schema = root.materialize();
//! assert_eq!(schema.type_, ["string"]);
//! assert_eq!(schema.exclusive_maximum, 5.0);
//! assert!(!schema.exclusive_maximum_flag);
//! ```
pub mod low;
pub mod dialect;
pub mod model;
pub mod emit;
pub mod config;
pub mod error;
pub mod path_de;
pub mod jq_exec;
pub mod cli;
