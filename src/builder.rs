// Tree builder: flat context records into the shared context tree
use crate::instance::Instance;
use crate::model::*;
use crate::qname::QName;
use crate::{Error, Result};
use chrono::NaiveDate;
use compact_str::CompactString;
use tracing::{debug, trace};

/// A context as it appears in the source document, before tree sharing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextRecord {
    pub id: CompactString,
    pub entity: Option<Entity>,
    pub period: Option<Period>,
    pub instant: Option<Instant>,
    pub dimensions: Vec<Dimension>,
}

impl ContextRecord {
    pub fn new(id: impl Into<CompactString>) -> Self {
        Self {
            id: id.into(),
            entity: None,
            period: None,
            instant: None,
            dimensions: Vec::new(),
        }
    }

    pub fn with_entity(mut self, id: &str, scheme: &str) -> Self {
        self.entity = Some(Entity::new(id, scheme));
        self
    }

    pub fn with_period(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.period = Some(Period { start, end });
        self
    }

    pub fn with_instant(mut self, date: NaiveDate) -> Self {
        self.instant = Some(Instant { date });
        self
    }

    pub fn with_dimension(mut self, dimension: QName, value: QName) -> Self {
        self.dimensions.push(Dimension::new(dimension, value));
        self
    }

    /// Qualifiers in precedence order: entity, period or instant, then
    /// dimensions sorted so insertion order never changes the tree path.
    pub fn qualifiers(&self) -> Result<Vec<Relation>> {
        let malformed = |reason: String| Error::MalformedContext {
            id: self.id.to_string(),
            reason,
        };

        if self.period.is_some() && self.instant.is_some() {
            return Err(malformed("both period and instant present".to_string()));
        }
        if let Some(p) = &self.period {
            if p.start > p.end {
                return Err(malformed(format!("period start {} > end {}", p.start, p.end)));
            }
        }

        let mut dims = self.dimensions.clone();
        dims.sort();
        dims.dedup();
        for pair in dims.windows(2) {
            if pair[0].dimension == pair[1].dimension {
                return Err(malformed(format!(
                    "dimension {} has members {} and {}",
                    pair[0].dimension, pair[0].value, pair[1].value
                )));
            }
        }

        let mut rels = Vec::with_capacity(2 + dims.len());
        if let Some(e) = &self.entity {
            rels.push(Relation::Entity(e.clone()));
        }
        if let Some(p) = self.period {
            rels.push(Relation::Period(p));
        }
        if let Some(i) = self.instant {
            rels.push(Relation::Instant(i));
        }
        rels.extend(dims.into_iter().map(Relation::Dimension));
        Ok(rels)
    }
}

/// A fact as extracted from the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactRecord {
    pub id: Option<CompactString>,
    pub name: QName,
    pub context_ref: CompactString,
    pub unit_ref: Option<CompactString>,
    pub decimals: Option<Decimals>,
    pub scale: Option<i32>,
    pub raw: String,
}

impl FactRecord {
    pub fn new(name: QName, context_ref: &str, raw: impl Into<String>) -> Self {
        Self {
            id: None,
            name,
            context_ref: context_ref.into(),
            unit_ref: None,
            decimals: None,
            scale: None,
            raw: raw.into(),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_unit(mut self, unit_ref: &str) -> Self {
        self.unit_ref = Some(unit_ref.into());
        self
    }

    pub fn with_decimals(mut self, decimals: impl Into<Decimals>) -> Self {
        self.decimals = Some(decimals.into());
        self
    }

    pub fn with_scale(mut self, scale: i32) -> Self {
        self.scale = Some(scale);
        self
    }
}

/// Collects the parser's output and produces an immutable [`Instance`].
#[derive(Debug, Default)]
pub struct TreeBuilder {
    schemas: Vec<String>,
    units: Vec<Unit>,
    contexts: Vec<ContextRecord>,
    facts: Vec<FactRecord>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_ref(mut self, href: impl Into<String>) -> Self {
        self.schemas.push(href.into());
        self
    }

    pub fn unit(mut self, unit: Unit) -> Self {
        self.units.push(unit);
        self
    }

    pub fn context(mut self, record: ContextRecord) -> Self {
        self.contexts.push(record);
        self
    }

    pub fn fact(mut self, record: FactRecord) -> Self {
        self.facts.push(record);
        self
    }

    pub fn build(self) -> Result<Instance> {
        debug!(
            contexts = self.contexts.len(),
            facts = self.facts.len(),
            units = self.units.len(),
            "building context tree"
        );

        let mut inst = Instance::empty();
        inst.schemas = self.schemas;

        for unit in self.units {
            match inst.units.get(unit.id.as_str()) {
                Some(existing) if *existing != unit => {
                    return Err(Error::Conflict {
                        path: format!("unit {}", unit.id),
                        detail: format!("redefined as {}, was {}", unit, existing),
                    });
                }
                Some(_) => continue,
                None => {
                    inst.units.insert_new(unit.id.clone(), unit);
                }
            }
        }

        for record in &self.contexts {
            let rels = record.qualifiers()?;
            if let Some(&existing) = inst.contexts.get(record.id.as_str()) {
                if inst.context(existing).relations() != rels {
                    return Err(Error::Conflict {
                        path: inst.path_string(existing),
                        detail: format!("context id {} defined twice", record.id),
                    });
                }
                continue;
            }
            let node = insert_path(&mut inst.nodes, &rels);
            let ctx = &mut inst.nodes[node.index()];
            if ctx.id.is_none() {
                ctx.id = Some(record.id.clone());
            }
            inst.contexts.insert_new(record.id.clone(), node);
        }

        for fact in self.facts {
            let node = *inst
                .contexts
                .get(fact.context_ref.as_str())
                .ok_or_else(|| Error::UnresolvedReference {
                    kind: "context",
                    id: fact.context_ref.to_string(),
                })?;
            if let Some(unit) = &fact.unit_ref {
                if !inst.units.contains_key(unit.as_str()) {
                    return Err(Error::UnresolvedReference {
                        kind: "unit",
                        id: unit.to_string(),
                    });
                }
            }

            let value_id = ValueId(inst.values.len() as u32);
            let value = Value {
                id: fact.id,
                name: fact.name,
                context: node,
                context_ref: fact.context_ref,
                unit_ref: fact.unit_ref,
                decimals: fact.decimals,
                scale: fact.scale,
                raw: fact.raw,
            };

            // Repeats stay in the flat list; the node keeps the first.
            match inst.context(node).value_id(&value.name) {
                Some(prior) => {
                    let prior = inst.value(prior);
                    let consistent =
                        prior.unit_ref == value.unit_ref && prior.decode() == value.decode();
                    debug!(
                        name = %value.name,
                        context = %value.context_ref,
                        unit = value.unit_ref.as_deref().unwrap_or(""),
                        consistent,
                        "repeated fact at shared node"
                    );
                }
                None => {
                    inst.nodes[node.index()]
                        .values
                        .insert_new(value.name.clone(), value_id);
                }
            }
            inst.values.push(value);
        }

        debug!(
            nodes = inst.nodes.len(),
            contexts = inst.contexts.len(),
            values = inst.values.len(),
            "context tree built"
        );
        Ok(inst)
    }
}

// Walks the trie from the root, creating nodes for unseen qualifiers.
fn insert_path(nodes: &mut Vec<Context>, rels: &[Relation]) -> ContextId {
    let mut current = ContextId::ROOT;
    for rel in rels {
        current = match nodes[current.index()].child(rel) {
            Some(next) => next,
            None => {
                let handle = ContextId(nodes.len() as u32);
                let child = nodes[current.index()].refine(rel, handle);
                nodes[current.index()]
                    .children
                    .insert_new(rel.clone(), handle);
                nodes.push(child);
                trace!(relation = %rel, node = handle.index(), "new context node");
                handle
            }
        };
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{date, gaap, ns};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_shared_prefix_is_shared() {
        let inst = TreeBuilder::new()
            .context(
                ContextRecord::new("c1")
                    .with_entity("X", "s")
                    .with_period(date(2023, 1, 1), date(2023, 12, 31)),
            )
            .context(
                ContextRecord::new("c2")
                    .with_entity("X", "s")
                    .with_instant(date(2023, 12, 31)),
            )
            .build()
            .unwrap();

        // root -> entity -> {period, instant}
        assert_eq!(inst.nodes().len(), 4);
        assert_eq!(inst.root().children().count(), 1);
        let (_, entity) = inst.root().children().next().unwrap();
        assert_eq!(inst.context(entity).children().count(), 2);
        assert!(inst.context(entity).id.is_none());
    }

    #[test]
    fn test_dimension_order_does_not_matter() {
        let a = QName::new(ns::EX, "AAxis");
        let b = QName::new(ns::EX, "BAxis");
        let m = QName::new(ns::EX, "Member");
        let inst = TreeBuilder::new()
            .context(
                ContextRecord::new("c1")
                    .with_entity("X", "s")
                    .with_dimension(a.clone(), m.clone())
                    .with_dimension(b.clone(), m.clone()),
            )
            .context(
                ContextRecord::new("c2")
                    .with_entity("X", "s")
                    .with_dimension(b, m.clone())
                    .with_dimension(a, m),
            )
            .build()
            .unwrap();
        let c1 = inst.context_by_id("c1").unwrap();
        let c2 = inst.context_by_id("c2").unwrap();
        assert_eq!(c1.handle(), c2.handle());
        // The node keeps the first id that reached it.
        assert_eq!(c1.id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_interior_node_holds_its_own_values() {
        let inst = TreeBuilder::new()
            .unit(Unit::measure("usd", QName::new(ns::ISO4217, "USD")))
            .context(ContextRecord::new("e").with_entity("X", "s"))
            .context(
                ContextRecord::new("p")
                    .with_entity("X", "s")
                    .with_instant(date(2023, 12, 31)),
            )
            .fact(FactRecord::new(gaap("Name"), "e", "Acme"))
            .fact(FactRecord::new(gaap("Cash"), "p", "10").with_unit("usd"))
            .build()
            .unwrap();
        let e = inst.context_by_id("e").unwrap();
        let p = inst.context_by_id("p").unwrap();
        assert_eq!(p.parent(), Some(e.handle()));
        assert_eq!(e.values().count(), 1);
        assert!(e.value_id(&gaap("Cash")).is_none());
        assert!(p.value_id(&gaap("Cash")).is_some());
    }

    #[test]
    fn test_period_and_instant_is_malformed() {
        let err = TreeBuilder::new()
            .context(
                ContextRecord::new("bad")
                    .with_entity("X", "s")
                    .with_period(date(2023, 1, 1), date(2023, 12, 31))
                    .with_instant(date(2023, 12, 31)),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::MalformedContext { ref id, .. } if id == "bad"));
    }

    #[test]
    fn test_repeated_axis_is_malformed() {
        let axis = QName::new(ns::EX, "Axis");
        let err = TreeBuilder::new()
            .context(
                ContextRecord::new("bad")
                    .with_dimension(axis.clone(), QName::new(ns::EX, "A"))
                    .with_dimension(axis, QName::new(ns::EX, "B")),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::MalformedContext { .. }));
    }

    #[test]
    fn test_unresolved_references() {
        let err = TreeBuilder::new()
            .fact(FactRecord::new(gaap("Cash"), "nowhere", "1"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference { kind: "context", .. }));

        let err = TreeBuilder::new()
            .context(ContextRecord::new("c").with_entity("X", "s"))
            .fact(FactRecord::new(gaap("Cash"), "c", "1").with_unit("eur"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference { kind: "unit", ref id } if id == "eur"));
    }

    #[test]
    fn test_repeated_facts_on_shared_node() {
        let builder = || {
            TreeBuilder::new()
                .unit(Unit::measure("usd", QName::new(ns::ISO4217, "USD")))
                .context(ContextRecord::new("c1").with_entity("X", "s"))
                .context(ContextRecord::new("c2").with_entity("X", "s"))
                .fact(FactRecord::new(gaap("Revenue"), "c1", "1,000").with_unit("usd"))
        };

        // Same value under an alias context: both kept flat, node keeps one.
        let inst = builder()
            .fact(FactRecord::new(gaap("Revenue"), "c2", "1000").with_unit("usd"))
            .build()
            .unwrap();
        assert_eq!(inst.values().len(), 2);
        assert_eq!(inst.context_by_id("c2").unwrap().values().count(), 1);

        // A different value is kept too; nothing is dropped.
        let inst = builder()
            .fact(FactRecord::new(gaap("Revenue"), "c2", "2000").with_unit("usd"))
            .build()
            .unwrap();
        let raws: Vec<&str> = inst.values().iter().map(|v| v.raw.as_str()).collect();
        assert_eq!(raws, vec!["1,000", "2000"]);
        assert_eq!(inst.values()[1].context_ref, "c2");
    }

    #[test]
    fn test_one_concept_in_two_currencies() {
        let inst = TreeBuilder::new()
            .unit(Unit::measure("usd", QName::new(ns::ISO4217, "USD")))
            .unit(Unit::measure("eur", QName::new(ns::ISO4217, "EUR")))
            .context(
                ContextRecord::new("c")
                    .with_entity("X", "s")
                    .with_instant(date(2023, 12, 31)),
            )
            .fact(FactRecord::new(gaap("Revenue"), "c", "100").with_unit("usd"))
            .fact(FactRecord::new(gaap("Revenue"), "c", "92").with_unit("eur"))
            .build()
            .unwrap();

        let units: Vec<_> = inst
            .values()
            .iter()
            .map(|v| (v.unit_ref.as_deref(), v.decode()))
            .collect();
        assert_eq!(
            units,
            vec![
                (Some("usd"), TypedValue::Number(100.0)),
                (Some("eur"), TypedValue::Number(92.0)),
            ]
        );
        let ctx = inst.context_by_id("c").unwrap();
        let first = ctx.value_id(&gaap("Revenue")).unwrap();
        assert_eq!(inst.value(first).unit_ref.as_deref(), Some("usd"));
    }

    #[test]
    fn test_context_id_redefined() {
        let err = TreeBuilder::new()
            .context(ContextRecord::new("c").with_entity("X", "s"))
            .context(ContextRecord::new("c").with_entity("Y", "s"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
    }

    // (entity, period kind, [(axis, member)])
    type Spec = (u8, u8, Vec<(u8, u8)>);

    fn to_records(specs: &[Spec]) -> Vec<ContextRecord> {
        specs
            .iter()
            .enumerate()
            .map(|(i, (entity, period, dims))| {
                let mut rec =
                    ContextRecord::new(format!("c{}", i)).with_entity(&format!("E{}", entity), "s");
                rec = match period {
                    1 => rec.with_period(date(2022, 1, 1), date(2022, 12, 31)),
                    2 => rec.with_instant(date(2022, 12, 31)),
                    3 => rec.with_instant(date(2023, 12, 31)),
                    _ => rec,
                };
                let mut axes = BTreeSet::new();
                for (axis, member) in dims {
                    if axes.insert(*axis) {
                        rec = rec.with_dimension(
                            QName::new(ns::EX, format!("Axis{}", axis)),
                            QName::new(ns::EX, format!("Member{}", member)),
                        );
                    }
                }
                rec
            })
            .collect()
    }

    fn build(records: Vec<ContextRecord>) -> Instance {
        records
            .into_iter()
            .fold(TreeBuilder::new(), |b, r| b.context(r))
            .build()
            .unwrap()
    }

    fn node_paths(inst: &Instance) -> Vec<Vec<Relation>> {
        inst.nodes()
            .iter()
            .map(|c| inst.path(c.handle()).into_iter().cloned().collect())
            .collect()
    }

    proptest! {
        #[test]
        fn prop_tree_is_order_independent(
            specs in prop::collection::vec(
                (0u8..2, 0u8..4, prop::collection::vec((0u8..3, 0u8..3), 0..3)),
                1..12,
            ),
            rotate in 0usize..12,
        ) {
            let records = to_records(&specs);
            let mut permuted = records.clone();
            permuted.reverse();
            let k = rotate % permuted.len();
            permuted.rotate_left(k);

            let a = build(records.clone());
            let b = build(permuted);

            let paths_a: BTreeSet<_> = node_paths(&a).into_iter().collect();
            let paths_b: BTreeSet<_> = node_paths(&b).into_iter().collect();
            prop_assert_eq!(&paths_a, &paths_b);

            for rec in &records {
                let pa: Vec<_> = a.path(a.context_by_id(&rec.id).unwrap().handle());
                let pb: Vec<_> = b.path(b.context_by_id(&rec.id).unwrap().handle());
                prop_assert_eq!(pa, pb);
            }
        }

        #[test]
        fn prop_no_two_nodes_share_a_path(
            specs in prop::collection::vec(
                (0u8..2, 0u8..4, prop::collection::vec((0u8..3, 0u8..3), 0..3)),
                1..12,
            ),
        ) {
            let inst = build(to_records(&specs));
            let paths = node_paths(&inst);
            let unique: BTreeSet<_> = paths.iter().cloned().collect();
            prop_assert_eq!(paths.len(), unique.len());
        }
    }
}
