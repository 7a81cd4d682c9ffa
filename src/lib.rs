//! ixbrl-core - Fact/context model and projection engine for inline XBRL
//!
//! Licensed under AGPL-3.0

pub mod builder;
pub mod config;
pub mod diff;
pub mod instance;
pub mod labels;
pub mod model;
pub mod ordered;
pub mod projection;
pub mod qname;
pub mod reader;

#[cfg(test)]
pub(crate) mod fixtures;

// Re-export main types
pub use builder::{ContextRecord, FactRecord, TreeBuilder};
pub use config::Config;
pub use diff::{diff, diff_table, DiffRecord};
pub use instance::Instance;
pub use labels::{LabelMap, LabelResolver};
pub use model::{
    Context, ContextId, Decimals, Dimension, Entity, Instant, Period, Relation, TypedValue, Unit,
    UnitKind, Value, ValueId,
};
pub use projection::{render, render_all, Format};
pub use qname::QName;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Malformed context {id}: {reason}")]
    MalformedContext { id: String, reason: String },

    #[error("Unresolved {kind} reference: {id}")]
    UnresolvedReference { kind: &'static str, id: String },

    #[error("Unknown output format: {0}")]
    UnknownFormat(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Conflict at {path}: {detail}")]
    Conflict { path: String, detail: String },

    #[error("XML error: {0}")]
    Xml(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
