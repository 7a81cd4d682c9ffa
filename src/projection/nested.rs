// JSON-compatible dumps of the context tree
use crate::instance::Instance;
use crate::labels::{display_name, LabelResolver};
use crate::model::{Context, Relation, TypedValue};
use ahash::AHashMap;
use serde_json::{Map, Value as Json};

/// Depth-first nested mapping: each node's facts as leaves, each child under
/// the key of the relation leading to it.
pub fn to_nested(inst: &Instance, labels: Option<&dyn LabelResolver>) -> Json {
    node_to_json(inst, inst.root(), labels)
}

fn node_to_json(inst: &Instance, ctx: &Context, labels: Option<&dyn LabelResolver>) -> Json {
    let mut map = Map::new();
    for (name, id) in ctx.values() {
        map.insert(display_name(labels, name), typed_json(&inst.value(id).decode()));
    }
    for (rel, child) in ctx.children() {
        map.insert(
            relation_key(rel, labels),
            node_to_json(inst, inst.context(child), labels),
        );
    }
    Json::Object(map)
}

pub(crate) fn relation_key(rel: &Relation, labels: Option<&dyn LabelResolver>) -> String {
    match rel {
        Relation::Dimension(d) => format!(
            "{}={}",
            display_name(labels, &d.dimension),
            display_name(labels, &d.value)
        ),
        other => other.description(),
    }
}

fn typed_json(value: &TypedValue) -> Json {
    match value {
        TypedValue::Number(n) => serde_json::Number::from_f64(*n)
            .map(Json::Number)
            .unwrap_or_else(|| Json::String(value.to_string())),
        other => Json::String(other.to_string()),
    }
}

/// One object per raw context id with its qualifiers and the facts asserted
/// against that id.
pub fn to_flat_form(inst: &Instance, labels: Option<&dyn LabelResolver>) -> Json {
    let mut facts: AHashMap<&str, Map<String, Json>> = AHashMap::new();
    for v in inst.values() {
        facts
            .entry(v.context_ref.as_str())
            .or_default()
            .insert(display_name(labels, &v.name), typed_json(&v.decode()));
    }

    let mut out = Map::new();
    for (id, ctx) in inst.contexts() {
        let mut entry = Map::new();
        if let Some(e) = &ctx.entity {
            entry.insert("entity".into(), Json::String(e.id.to_string()));
            entry.insert("scheme".into(), Json::String(e.scheme.to_string()));
        }
        if let Some(p) = &ctx.period {
            entry.insert("start".into(), Json::String(p.start.to_string()));
            entry.insert("end".into(), Json::String(p.end.to_string()));
        }
        if let Some(i) = &ctx.instant {
            entry.insert("instant".into(), Json::String(i.date.to_string()));
        }
        if !ctx.dimensions.is_empty() {
            let dims = ctx
                .dimensions
                .iter()
                .map(|d| {
                    (
                        display_name(labels, &d.dimension),
                        Json::String(display_name(labels, &d.value)),
                    )
                })
                .collect();
            entry.insert("dimensions".into(), Json::Object(dims));
        }
        entry.insert(
            "values".into(),
            Json::Object(facts.remove(id).unwrap_or_default()),
        );
        out.insert(id.to_string(), Json::Object(entry));
    }
    Json::Object(out)
}
