use crate::instance::Instance;
use crate::model::{Context, Relation, Value};
use crate::qname::QName;
use std::fmt;

/// Every fact paired with the context node it was asserted under, in
/// document order. Each call rescans the instance.
pub fn flatten(inst: &Instance) -> impl Iterator<Item = (&Context, &Value)> + '_ {
    inst.values().iter().map(move |v| (inst.context(v.context), v))
}

/// One line of the key-value dump.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValue {
    pub path: Vec<Relation>,
    pub name: QName,
    pub value: String,
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str("root")?;
        }
        for (i, rel) in self.path.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}", rel)?;
        }
        write!(f, ": {} = {}", self.name, self.value)
    }
}

pub fn key_values(inst: &Instance) -> Vec<KeyValue> {
    flatten(inst)
        .map(|(ctx, v)| KeyValue {
            path: inst.path(ctx.handle()).into_iter().cloned().collect(),
            name: v.name.clone(),
            value: v.decode().to_string(),
        })
        .collect()
}
