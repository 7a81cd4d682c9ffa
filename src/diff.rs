//! Context-aware comparison of two reports.
//!
//! Both context trees are walked in lock-step. Children correspond when their
//! relation keys are equal; a subtree present on one side only is skipped.
//! Facts are paired by local name only, so `a:Revenue` and `b:Revenue` under
//! the same context are compared with each other.

use crate::config::Config;
use crate::instance::Instance;
use crate::labels::LabelResolver;
use crate::model::{Context, Relation};
use crate::projection::table::Table;
use compact_str::CompactString;
use tracing::debug;

pub const DIFF_COLUMNS: [&str; 8] = [
    "name", "value_a", "value_b", "entity", "scheme", "start", "end", "instant",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRecord {
    pub path: Vec<Relation>,
    pub name: CompactString,
    pub value_a: String,
    pub value_b: String,
}

/// Every fact present under corresponding contexts of both reports whose
/// displayed values differ, in depth-first order of `a`'s tree.
pub fn diff(a: &Instance, b: &Instance, config: &Config) -> Vec<DiffRecord> {
    let mut walk = Walk {
        a,
        b,
        width: config.diff_width,
        path: Vec::new(),
        out: Vec::new(),
    };
    walk.visit(a.root(), b.root());
    debug!(records = walk.out.len(), width = config.diff_width, "diff complete");
    walk.out
}

struct Walk<'a> {
    a: &'a Instance,
    b: &'a Instance,
    width: usize,
    path: Vec<Relation>,
    out: Vec<DiffRecord>,
}

impl<'a> Walk<'a> {
    fn visit(&mut self, node_a: &'a Context, node_b: &'a Context) {
        let (a, b) = (self.a, self.b);
        for (name, id) in node_a.values() {
            // First same-localname fact in b's node, namespace ignored.
            let Some(other) = node_b
                .values()
                .find(|(n, _)| n.localname == name.localname)
                .map(|(_, id)| b.value(id))
            else {
                continue;
            };
            let value_a = truncate(&a.value(id).decode().to_string(), self.width);
            let value_b = truncate(&other.decode().to_string(), self.width);
            if value_a != value_b {
                self.out.push(DiffRecord {
                    path: self.path.clone(),
                    name: name.localname.clone(),
                    value_a,
                    value_b,
                });
            }
        }

        for (rel, child_a) in node_a.children() {
            let Some(child_b) = node_b.child(rel) else {
                continue;
            };
            self.path.push(rel.clone());
            self.visit(a.context(child_a), b.context(child_b));
            self.path.pop();
        }
    }
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

/// Wide table of diff records: fixed columns, then one column per distinct
/// dimension met across all records.
pub fn diff_table(records: &[DiffRecord], labels: Option<&dyn LabelResolver>) -> Table {
    let mut table = Table::new(&DIFF_COLUMNS);
    for record in records {
        let mut cells = vec![
            ("name".to_string(), record.name.to_string()),
            ("value_a".to_string(), record.value_a.clone()),
            ("value_b".to_string(), record.value_b.clone()),
        ];
        cells.extend(table.relation_cells(&record.path, labels));
        table.push_row(cells);
    }
    table
}
