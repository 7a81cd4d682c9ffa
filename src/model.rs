use crate::ordered::OrderedMap;
use crate::qname::QName;
use chrono::NaiveDate;
use compact_str::CompactString;
use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Handles into an Instance
// ============================================================================

/// Index of a context node in its instance's arena. The root is always 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub(crate) u32);

impl ContextId {
    pub const ROOT: ContextId = ContextId(0);

    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Position of a fact in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub(crate) u32);

impl ValueId {
    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ============================================================================
// Units
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub id: CompactString,
    pub kind: UnitKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitKind {
    Measure(QName),
    Divide { numerator: QName, denominator: QName },
}

impl Unit {
    pub fn measure(id: impl Into<CompactString>, measure: QName) -> Self {
        Self {
            id: id.into(),
            kind: UnitKind::Measure(measure),
        }
    }

    pub fn divide(id: impl Into<CompactString>, numerator: QName, denominator: QName) -> Self {
        Self {
            id: id.into(),
            kind: UnitKind::Divide {
                numerator,
                denominator,
            },
        }
    }

    /// Every measure QName, numerator before denominator.
    pub fn measures(&self) -> impl Iterator<Item = &QName> {
        let (first, second) = match &self.kind {
            UnitKind::Measure(m) => (m, None),
            UnitKind::Divide {
                numerator,
                denominator,
            } => (numerator, Some(denominator)),
        };
        std::iter::once(first).chain(second)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            UnitKind::Measure(m) => write!(f, "{}", m.localname),
            UnitKind::Divide {
                numerator,
                denominator,
            } => write!(f, "{}/{}", numerator.localname, denominator.localname),
        }
    }
}

// ============================================================================
// Facts
// ============================================================================

#[derive(Debug, Clone)]
pub struct Value {
    pub id: Option<CompactString>,
    pub name: QName,
    pub context: ContextId,
    /// Raw context id the fact was asserted against; several ids may share
    /// one tree node.
    pub context_ref: CompactString,
    pub unit_ref: Option<CompactString>,
    pub decimals: Option<Decimals>,
    pub scale: Option<i32>,
    pub raw: String,
}

/// Stated accuracy of a numeric fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decimals {
    Inf,
    Digits(i32),
}

impl From<i32> for Decimals {
    fn from(digits: i32) -> Self {
        Decimals::Digits(digits)
    }
}

impl fmt::Display for Decimals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decimals::Inf => f.write_str("INF"),
            Decimals::Digits(d) => write!(f, "{}", d),
        }
    }
}

impl FromStr for Decimals {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "INF" => Ok(Decimals::Inf),
            d => d
                .parse()
                .map(Decimals::Digits)
                .map_err(|_| Error::Parse(format!("invalid decimals {:?}", s))),
        }
    }
}

/// Decoded payload of a fact.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Number(f64),
    Date(NaiveDate),
    String(String),
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Number(n) => write!(f, "{}", n),
            TypedValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            TypedValue::String(s) => f.write_str(s),
        }
    }
}

impl Value {
    /// Facts carrying a unit are numeric.
    pub fn is_numeric(&self) -> bool {
        self.unit_ref.is_some()
    }

    pub fn decode(&self) -> TypedValue {
        let text = self.raw.trim();
        if self.is_numeric() {
            return match decode_number(text, self.scale.unwrap_or(0)) {
                Some(n) => TypedValue::Number(n),
                None => TypedValue::String(text.to_string()),
            };
        }
        match NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            Ok(d) => TypedValue::Date(d),
            Err(_) => TypedValue::String(text.to_string()),
        }
    }
}

fn decode_number(text: &str, scale: i32) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    match cleaned.to_ascii_lowercase().as_str() {
        "no" | "none" | "zero" | "-" => return Some(0.0),
        "" => return None,
        _ => {}
    }
    let n = cleaned.parse::<f64>().ok()?;
    if !n.is_finite() {
        return None;
    }
    if scale == 0 {
        return Some(n);
    }
    // Shift the exponent in the text so the scaled figure rounds once.
    let (mantissa, exponent) = match cleaned.split_once(|c| c == 'e' || c == 'E') {
        Some((m, e)) => (m, e.parse::<i32>().ok()?),
        None => (cleaned.as_str(), 0),
    };
    let scaled = format!("{}e{}", mantissa, exponent.checked_add(scale)?)
        .parse::<f64>()
        .ok()?;
    scaled.is_finite().then_some(scaled)
}

// ============================================================================
// Context qualifiers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    pub id: CompactString,
    pub scheme: CompactString,
}

impl Entity {
    pub fn new(id: impl Into<CompactString>, scheme: impl Into<CompactString>) -> Self {
        Self {
            id: id.into(),
            scheme: scheme.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Instant {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Dimension {
    pub dimension: QName,
    pub value: QName,
}

impl Dimension {
    pub fn new(dimension: QName, value: QName) -> Self {
        Self { dimension, value }
    }
}

/// A single qualifier refining a context; the edge label of the tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Relation {
    Entity(Entity),
    Period(Period),
    Instant(Instant),
    Dimension(Dimension),
}

impl Relation {
    /// Human-readable key used by the nested and tabular dumps.
    pub fn description(&self) -> String {
        match self {
            Relation::Entity(e) => format!("Entity {} ({})", e.id, e.scheme),
            Relation::Period(p) => format!("{} - {}", p.start, p.end),
            Relation::Instant(i) => i.date.to_string(),
            Relation::Dimension(d) => format!("{}={}", d.dimension, d.value),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Entity(e) => write!(f, "entity({},{})", e.id, e.scheme),
            Relation::Period(p) => write!(f, "period({},{})", p.start, p.end),
            Relation::Instant(i) => write!(f, "instant({})", i.date),
            Relation::Dimension(d) => write!(f, "dimension({},{})", d.dimension, d.value),
        }
    }
}

// ============================================================================
// Context tree node
// ============================================================================

/// A node of the context tree. It carries every qualifier accumulated on the
/// path from the root, the facts asserted at exactly that combination, and
/// the children refining it further.
#[derive(Debug, Clone)]
pub struct Context {
    pub id: Option<CompactString>,
    pub entity: Option<Entity>,
    pub period: Option<Period>,
    pub instant: Option<Instant>,
    pub dimensions: Vec<Dimension>,
    pub(crate) handle: ContextId,
    pub(crate) parent: Option<ContextId>,
    pub(crate) relation: Option<Relation>,
    pub(crate) values: OrderedMap<QName, ValueId>,
    pub(crate) children: OrderedMap<Relation, ContextId>,
}

impl Context {
    pub(crate) fn root() -> Self {
        Self {
            id: None,
            entity: None,
            period: None,
            instant: None,
            dimensions: Vec::new(),
            handle: ContextId::ROOT,
            parent: None,
            relation: None,
            values: OrderedMap::new(),
            children: OrderedMap::new(),
        }
    }

    /// Copy of this node's qualifiers with `rel` applied, detached from the
    /// tree.
    pub(crate) fn refine(&self, rel: &Relation, handle: ContextId) -> Self {
        let mut child = Self {
            id: None,
            entity: self.entity.clone(),
            period: self.period,
            instant: self.instant,
            dimensions: self.dimensions.clone(),
            handle,
            parent: Some(self.handle),
            relation: Some(rel.clone()),
            values: OrderedMap::new(),
            children: OrderedMap::new(),
        };
        match rel {
            Relation::Entity(e) => child.entity = Some(e.clone()),
            Relation::Period(p) => child.period = Some(*p),
            Relation::Instant(i) => child.instant = Some(*i),
            Relation::Dimension(d) => child.dimensions.push(d.clone()),
        }
        child
    }

    pub fn handle(&self) -> ContextId {
        self.handle
    }

    pub fn parent(&self) -> Option<ContextId> {
        self.parent
    }

    /// The edge leading here from the parent; `None` only for the root.
    pub fn relation(&self) -> Option<&Relation> {
        self.relation.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn values(&self) -> impl Iterator<Item = (&QName, ValueId)> + '_ {
        self.values.iter().map(|(k, v)| (k, *v))
    }

    pub fn value_id(&self, name: &QName) -> Option<ValueId> {
        self.values.get(name).copied()
    }

    pub fn children(&self) -> impl Iterator<Item = (&Relation, ContextId)> + '_ {
        self.children.iter().map(|(k, v)| (k, *v))
    }

    pub fn child(&self, rel: &Relation) -> Option<ContextId> {
        self.children.get(rel).copied()
    }

    /// Qualifiers in builder precedence order.
    pub fn relations(&self) -> Vec<Relation> {
        let mut rels = Vec::with_capacity(2 + self.dimensions.len());
        if let Some(e) = &self.entity {
            rels.push(Relation::Entity(e.clone()));
        }
        if let Some(p) = self.period {
            rels.push(Relation::Period(p));
        }
        if let Some(i) = self.instant {
            rels.push(Relation::Instant(i));
        }
        rels.extend(self.dimensions.iter().cloned().map(Relation::Dimension));
        rels
    }
}
