// Row-oriented tables with a column set discovered while rows are added
use super::flatten::flatten;
use crate::instance::Instance;
use crate::labels::LabelResolver;
use crate::model::Relation;
use crate::ordered::OrderedSet;
use crate::qname::QName;
use crate::Result;
use ahash::AHashMap;
use std::io::Write;

pub const FACT_COLUMNS: [&str; 9] = [
    "namespace",
    "name",
    "value",
    "unit",
    "entity",
    "scheme",
    "start",
    "end",
    "instant",
];

/// Column names in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct ColumnRegistry {
    columns: OrderedSet<String>,
}

impl ColumnRegistry {
    pub fn with_prefix(prefix: &[&str]) -> Self {
        let mut registry = Self::default();
        for name in prefix {
            registry.register(name);
        }
        registry
    }

    pub fn register(&mut self, name: &str) -> usize {
        match self.columns.position(name) {
            Some(i) => i,
            None => self.columns.register(name.to_string()),
        }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.position(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Sparse rows over a growing column set. The header is only known once
/// every row is in, so writing happens as a separate step.
#[derive(Debug, Clone)]
pub struct Table {
    columns: ColumnRegistry,
    // Column name given to each dimension axis
    axes: AHashMap<QName, String>,
    rows: Vec<Vec<(usize, String)>>,
}

impl Table {
    pub fn new(prefix: &[&str]) -> Self {
        Self {
            columns: ColumnRegistry::with_prefix(prefix),
            axes: AHashMap::new(),
            rows: Vec::new(),
        }
    }

    /// Builds the fact table: fixed prefix, then one column per dimension.
    pub fn from_instance(inst: &Instance, labels: Option<&dyn LabelResolver>) -> Self {
        let mut table = Self::new(&FACT_COLUMNS);
        for (ctx, v) in flatten(inst) {
            let mut cells = vec![
                ("namespace".to_string(), v.name.namespace.to_string()),
                ("name".to_string(), v.name.localname.to_string()),
                ("value".to_string(), v.decode().to_string()),
            ];
            if let Some(unit) = v.unit_ref.as_deref().and_then(|u| inst.unit(u)) {
                cells.push(("unit".to_string(), unit.to_string()));
            }
            cells.extend(table.relation_cells(&ctx.relations(), labels));
            table.push_row(cells);
        }
        table
    }

    pub fn push_row(&mut self, cells: impl IntoIterator<Item = (String, String)>) {
        let row = cells
            .into_iter()
            .map(|(column, value)| (self.columns.register(&column), value))
            .collect();
        self.rows.push(row);
    }

    pub fn header(&self) -> Vec<&str> {
        self.columns.names().collect()
    }

    pub fn columns(&self) -> &ColumnRegistry {
        &self.columns
    }

    /// Rows padded to the full header width.
    pub fn rows(&self) -> impl Iterator<Item = Vec<&str>> + '_ {
        let width = self.columns.len();
        self.rows.iter().map(move |row| {
            let mut padded = vec![""; width];
            for (i, value) in row {
                padded[*i] = value.as_str();
            }
            padded
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn write_csv<W: Write>(&self, writer: W, delimiter: u8) -> Result<()> {
        let mut out = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(writer);
        out.write_record(self.header())?;
        for row in self.rows() {
            out.write_record(&row)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Entity, period and dimension cells for a qualifier path.
    pub(crate) fn relation_cells<'a>(
        &mut self,
        rels: impl IntoIterator<Item = &'a Relation>,
        labels: Option<&dyn LabelResolver>,
    ) -> Vec<(String, String)> {
        let mut cells = Vec::new();
        for rel in rels {
            match rel {
                Relation::Entity(e) => {
                    cells.push(("entity".to_string(), e.id.to_string()));
                    cells.push(("scheme".to_string(), e.scheme.to_string()));
                }
                Relation::Period(p) => {
                    cells.push(("start".to_string(), p.start.to_string()));
                    cells.push(("end".to_string(), p.end.to_string()));
                }
                Relation::Instant(i) => cells.push(("instant".to_string(), i.date.to_string())),
                Relation::Dimension(d) => {
                    let column = self.axis_column(&d.dimension, labels);
                    let member = labels
                        .and_then(|l| l.label(&d.value))
                        .unwrap_or_else(|| d.value.localname.to_string());
                    cells.push((column, member));
                }
            }
        }
        cells
    }

    /// An axis is headed by its label, else its localname. When that name
    /// is already a fixed column or another axis's column, the axis gets
    /// `{namespace}localname` instead.
    fn axis_column(&mut self, axis: &QName, labels: Option<&dyn LabelResolver>) -> String {
        if let Some(name) = self.axes.get(axis) {
            return name.clone();
        }
        let preferred = labels
            .and_then(|l| l.label(axis))
            .unwrap_or_else(|| axis.localname.to_string());
        let taken = self.columns.position(&preferred).is_some()
            || self.axes.values().any(|name| *name == preferred);
        let name = if taken {
            format!("{{{}}}{}", axis.namespace, axis.localname)
        } else {
            preferred
        };
        self.axes.insert(axis.clone(), name.clone());
        name
    }
}
