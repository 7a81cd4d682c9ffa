//! Read-only transforms from an [`Instance`] into output representations.

pub mod flatten;
pub mod nested;
pub mod table;
pub mod triples;
pub mod xbrl;

pub use flatten::{flatten, key_values, KeyValue};
pub use nested::{to_flat_form, to_nested};
pub use table::{ColumnRegistry, Table, FACT_COLUMNS};
pub use triples::{context_uri, to_triples, Term, Triple};
pub use xbrl::{to_xbrl_document, NamespaceAllocator};

use crate::config::Config;
use crate::instance::Instance;
use crate::labels::LabelResolver;
use crate::{Error, Result};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    KeyValue,
    Csv,
    Json,
    JsonFlat,
    Xbrl,
    Triples,
}

impl Format {
    pub const ALL: [Format; 6] = [
        Format::KeyValue,
        Format::Csv,
        Format::Json,
        Format::JsonFlat,
        Format::Xbrl,
        Format::Triples,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Format::KeyValue => "kv",
            Format::Csv => "csv",
            Format::Json => "json",
            Format::JsonFlat => "json-flat",
            Format::Xbrl => "xbrl",
            Format::Triples => "triples",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "kv" => Ok(Format::KeyValue),
            "csv" => Ok(Format::Csv),
            "json" => Ok(Format::Json),
            "json-flat" => Ok(Format::JsonFlat),
            "xbrl" => Ok(Format::Xbrl),
            "triples" | "rdf" => Ok(Format::Triples),
            _ => Err(Error::UnknownFormat(s.to_string())),
        }
    }
}

/// Renders one projection as text.
pub fn render(
    inst: &Instance,
    format: Format,
    config: &Config,
    labels: Option<&dyn LabelResolver>,
) -> Result<String> {
    match format {
        Format::KeyValue => Ok(lines(key_values(inst))),
        Format::Csv => {
            let mut buf = Vec::new();
            Table::from_instance(inst, labels).write_csv(&mut buf, config.csv_delimiter)?;
            String::from_utf8(buf).map_err(|e| Error::Parse(e.to_string()))
        }
        Format::Json => Ok(serde_json::to_string_pretty(&to_nested(inst, labels))?),
        Format::JsonFlat => Ok(serde_json::to_string_pretty(&to_flat_form(inst, labels))?),
        Format::Xbrl => to_xbrl_document(inst, config),
        Format::Triples => Ok(to_triples(inst)
            .iter()
            .map(|t| format!("{} .\n", t))
            .collect()),
    }
}

fn lines<T: fmt::Display>(items: Vec<T>) -> String {
    items.iter().map(|item| format!("{}\n", item)).collect()
}

/// Renders several projections of the same instance. The instance is only
/// read, so with the `parallel` feature the formats run concurrently.
pub fn render_all(
    inst: &Instance,
    formats: &[Format],
    config: &Config,
    labels: Option<&dyn LabelResolver>,
) -> Vec<Result<String>> {
    #[cfg(feature = "parallel")]
    {
        formats
            .par_iter()
            .map(|&f| render(inst, f, config, labels))
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        formats
            .iter()
            .map(|&f| render(inst, f, config, labels))
            .collect()
    }
}
