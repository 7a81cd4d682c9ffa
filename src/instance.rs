use crate::model::{Context, ContextId, Relation, Unit, Value, ValueId};
use crate::ordered::OrderedMap;
use compact_str::CompactString;

// Fact names carrying the reporting entity's name (Companies House, SEC, ESEF).
const ENTITY_NAME_CONCEPTS: [&str; 3] = [
    "EntityCurrentLegalOrRegisteredName",
    "EntityRegistrantName",
    "NameOfReportingEntityOrOtherMeansOfIdentification",
];

/// A parsed report: flat lookups plus the context tree they index into.
///
/// Built once by [`crate::TreeBuilder`] and read-only afterwards, so it can be
/// shared across threads by reference.
#[derive(Debug, Clone)]
pub struct Instance {
    pub(crate) schemas: Vec<String>,
    pub(crate) nodes: Vec<Context>,
    pub(crate) contexts: OrderedMap<CompactString, ContextId>,
    pub(crate) values: Vec<Value>,
    pub(crate) units: OrderedMap<CompactString, Unit>,
}

impl Instance {
    pub(crate) fn empty() -> Self {
        Self {
            schemas: Vec::new(),
            nodes: vec![Context::root()],
            contexts: OrderedMap::new(),
            values: Vec::new(),
            units: OrderedMap::new(),
        }
    }

    pub fn schemas(&self) -> &[String] {
        &self.schemas
    }

    pub fn root(&self) -> &Context {
        &self.nodes[ContextId::ROOT.index()]
    }

    #[inline]
    pub fn context(&self, id: ContextId) -> &Context {
        &self.nodes[id.index()]
    }

    /// Tree node a raw context id was mapped to.
    pub fn context_by_id(&self, id: &str) -> Option<&Context> {
        self.contexts.get(id).map(|&c| self.context(c))
    }

    /// Raw context ids in document order, with the node each maps to.
    pub fn contexts(&self) -> impl Iterator<Item = (&str, &Context)> + '_ {
        self.contexts
            .iter()
            .map(move |(id, &c)| (id.as_str(), self.context(c)))
    }

    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// Every tree node, root first.
    pub fn nodes(&self) -> &[Context] {
        &self.nodes
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.index()]
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> + '_ {
        self.units.values()
    }

    pub fn unit(&self, id: &str) -> Option<&Unit> {
        self.units.get(id)
    }

    /// Relations from the root down to `id`.
    pub fn path(&self, id: ContextId) -> Vec<&Relation> {
        let mut path = Vec::new();
        let mut node = self.context(id);
        while let (Some(rel), Some(parent)) = (node.relation(), node.parent()) {
            path.push(rel);
            node = self.context(parent);
        }
        path.reverse();
        path
    }

    pub(crate) fn path_string(&self, id: ContextId) -> String {
        let path = self.path(id);
        if path.is_empty() {
            return "root".to_string();
        }
        path.iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Name of the reporting entity, if the report states one.
    pub fn entity_name(&self) -> Option<String> {
        self.values
            .iter()
            .find(|v| ENTITY_NAME_CONCEPTS.contains(&v.name.localname.as_str()))
            .map(|v| v.decode().to_string())
    }
}
