//! Namespace-qualified names

use compact_str::CompactString;
use std::fmt;

/// A namespace + local-name pair identifying concepts, axes and members.
///
/// Two names are the same key only when both parts match exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub namespace: CompactString,
    pub localname: CompactString,
}

impl QName {
    pub fn new(namespace: impl Into<CompactString>, localname: impl Into<CompactString>) -> Self {
        Self {
            namespace: namespace.into(),
            localname: localname.into(),
        }
    }

    /// Parses Clark notation (`{ns}local`) or a bare local name.
    pub fn from_clark(text: &str) -> Option<Self> {
        match text.strip_prefix('{') {
            Some(rest) => {
                let (ns, local) = rest.split_once('}')?;
                if local.is_empty() {
                    return None;
                }
                Some(Self::new(ns, local))
            }
            None if !text.is_empty() => Some(Self::new("", text)),
            None => None,
        }
    }

    /// `{namespace}#{localname}`, the form used for RDF resources.
    pub fn uri(&self) -> String {
        format!("{}#{}", self.namespace, self.localname)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.localname)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.localname)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clark_notation() {
        let q = QName::new("http://fasb.org/us-gaap/2023", "Revenues");
        assert_eq!(q.to_string(), "{http://fasb.org/us-gaap/2023}Revenues");
        assert_eq!(QName::from_clark(&q.to_string()), Some(q));
        assert_eq!(QName::from_clark("Revenues"), Some(QName::new("", "Revenues")));
        assert_eq!(QName::from_clark("{ns}"), None);
    }

    #[test]
    fn test_equality_needs_both_parts() {
        let a = QName::new("http://a", "Revenue");
        let b = QName::new("http://b", "Revenue");
        assert_ne!(a, b);
        assert!(a < b);
    }
}
