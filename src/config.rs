use crate::Result;
use serde::Deserialize;

/// Output settings shared by the projections and the diff engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Characters of each decoded value compared and shown by the diff.
    pub diff_width: usize,
    pub csv_delimiter: u8,
    /// Spaces per level in XBRL output; `None` writes a single line.
    pub xml_indent: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            diff_width: 40,
            csv_delimiter: b',',
            xml_indent: Some(2),
        }
    }
}

impl Config {
    /// Unindented XML, tab-separated tables.
    pub fn compact() -> Self {
        Self {
            csv_delimiter: b'\t',
            xml_indent: None,
            ..Self::default()
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn with_diff_width(mut self, width: usize) -> Self {
        self.diff_width = width;
        self
    }

    pub fn with_csv_delimiter(mut self, delimiter: u8) -> Self {
        self.csv_delimiter = delimiter;
        self
    }

    pub fn with_xml_indent(mut self, indent: Option<usize>) -> Self {
        self.xml_indent = indent;
        self
    }
}
