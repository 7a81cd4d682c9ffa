// Label lookup seam. Taxonomy loading lives outside this crate; callers hand
// in whatever resolver they have.
use crate::qname::QName;
use ahash::AHashMap;

pub trait LabelResolver: Sync {
    /// Human label for a concept, axis or member.
    fn label(&self, name: &QName) -> Option<String>;
}

impl<F> LabelResolver for F
where
    F: Fn(&QName) -> Option<String> + Sync,
{
    fn label(&self, name: &QName) -> Option<String> {
        self(name)
    }
}

/// In-memory labels, e.g. collected from a label linkbase.
#[derive(Debug, Clone, Default)]
pub struct LabelMap {
    labels: AHashMap<QName, String>,
}

impl LabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: QName, label: impl Into<String>) {
        self.labels.insert(name, label.into());
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl FromIterator<(QName, String)> for LabelMap {
    fn from_iter<I: IntoIterator<Item = (QName, String)>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().collect(),
        }
    }
}

impl LabelResolver for LabelMap {
    fn label(&self, name: &QName) -> Option<String> {
        self.labels.get(name).cloned()
    }
}

/// Label if one resolves, otherwise the raw QName form.
pub(crate) fn display_name(labels: Option<&dyn LabelResolver>, name: &QName) -> String {
    labels
        .and_then(|l| l.label(name))
        .unwrap_or_else(|| name.to_string())
}
