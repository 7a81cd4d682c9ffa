// Canonical XBRL instance serialization
use crate::config::Config;
use crate::instance::Instance;
use crate::model::{Context, TypedValue, UnitKind};
use crate::ordered::OrderedMap;
use crate::qname::QName;
use crate::{Error, Result};
use compact_str::{format_compact, CompactString};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::{debug, trace};

pub const XBRLI: &str = "http://www.xbrl.org/2003/instance";
pub const XBRLDI: &str = "http://xbrl.org/2006/xbrldi";
pub const LINK: &str = "http://www.xbrl.org/2003/linkbase";
pub const XLINK: &str = "http://www.w3.org/1999/xlink";

pub const BASE_NAMESPACES: [(&str, &str); 4] = [
    ("xbrli", XBRLI),
    ("xbrldi", XBRLDI),
    ("link", LINK),
    ("xlink", XLINK),
];

/// Prefix assignment for one serialization. Namespaces outside the base set
/// get `ns0`, `ns1`, ... in the order they are first seen.
#[derive(Debug, Clone)]
pub struct NamespaceAllocator {
    prefixes: OrderedMap<CompactString, CompactString>,
    next: usize,
}

impl Default for NamespaceAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceAllocator {
    pub fn new() -> Self {
        let mut prefixes = OrderedMap::new();
        for (prefix, ns) in BASE_NAMESPACES {
            prefixes.insert_new(CompactString::from(ns), CompactString::from(prefix));
        }
        Self { prefixes, next: 0 }
    }

    /// Scans dimension axes and members of every context, then fact names,
    /// then unit measures.
    pub fn from_instance(inst: &Instance) -> Self {
        let mut alloc = Self::new();
        for (_, ctx) in inst.contexts() {
            for d in &ctx.dimensions {
                alloc.allocate(&d.dimension.namespace);
                alloc.allocate(&d.value.namespace);
            }
        }
        for v in inst.values() {
            alloc.allocate(&v.name.namespace);
        }
        for unit in inst.units() {
            for m in unit.measures() {
                alloc.allocate(&m.namespace);
            }
        }
        debug!(namespaces = alloc.prefixes.len(), "namespace prefixes allocated");
        alloc
    }

    /// Prefix for `namespace`, assigning the next synthetic one if unseen.
    /// The empty namespace never gets a prefix.
    pub fn allocate(&mut self, namespace: &str) -> Option<&str> {
        if namespace.is_empty() {
            return None;
        }
        if !self.prefixes.contains_key(namespace) {
            let prefix = format_compact!("ns{}", self.next);
            self.next += 1;
            trace!(namespace, prefix = %prefix, "new namespace prefix");
            self.prefixes.insert_new(CompactString::from(namespace), prefix);
        }
        self.prefix(namespace)
    }

    pub fn prefix(&self, namespace: &str) -> Option<&str> {
        self.prefixes.get(namespace).map(CompactString::as_str)
    }

    /// `prefix:local`, or the bare local name when there is no namespace.
    pub fn qualify(&self, name: &QName) -> Result<String> {
        if name.namespace.is_empty() {
            return Ok(name.localname.to_string());
        }
        let prefix = self
            .prefix(&name.namespace)
            .ok_or_else(|| Error::UnresolvedReference {
                kind: "namespace",
                id: name.namespace.to_string(),
            })?;
        Ok(format!("{}:{}", prefix, name.localname))
    }

    /// `(prefix, namespace)` in declaration order.
    pub fn declarations(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.prefixes
            .iter()
            .map(|(ns, prefix)| (prefix.as_str(), ns.as_str()))
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn event(&mut self, event: Event<'_>) -> Result<()> {
        self.writer
            .write_event(event)
            .map_err(|e| Error::Xml(e.to_string()))
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        let mut el = BytesStart::new(name);
        for attr in attrs {
            el.push_attribute(*attr);
        }
        self.event(Event::Start(el))
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        let mut el = BytesStart::new(name);
        for attr in attrs {
            el.push_attribute(*attr);
        }
        self.event(Event::Empty(el))
    }

    fn leaf(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> Result<()> {
        self.start(name, attrs)?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }
}

/// Serializes the instance as a canonical XBRL 2.1 instance document.
///
/// Contexts, units and facts come from the flat maps in insertion order, so
/// repeated calls are byte-identical. A context without an entity, or with
/// neither period nor instant, is refused.
pub fn to_xbrl_document(inst: &Instance, config: &Config) -> Result<String> {
    let alloc = NamespaceAllocator::from_instance(inst);
    let writer = match config.xml_indent {
        Some(indent) => Writer::new_with_indent(Vec::new(), b' ', indent),
        None => Writer::new(Vec::new()),
    };
    let mut out = XmlOut { writer };

    out.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let decls: Vec<(String, &str)> = alloc
        .declarations()
        .map(|(prefix, ns)| (format!("xmlns:{}", prefix), ns))
        .collect();
    let root_attrs: Vec<(&str, &str)> = decls.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    out.start("xbrli:xbrl", &root_attrs)?;

    for href in inst.schemas() {
        out.empty(
            "link:schemaRef",
            &[("xlink:type", "simple"), ("xlink:href", href.as_str())],
        )?;
    }

    for (id, ctx) in inst.contexts() {
        write_context(&mut out, &alloc, id, ctx)?;
    }

    for unit in inst.units() {
        out.start("xbrli:unit", &[("id", unit.id.as_str())])?;
        match &unit.kind {
            UnitKind::Measure(m) => out.leaf("xbrli:measure", &[], &alloc.qualify(m)?)?,
            UnitKind::Divide {
                numerator,
                denominator,
            } => {
                out.start("xbrli:divide", &[])?;
                out.start("xbrli:unitNumerator", &[])?;
                out.leaf("xbrli:measure", &[], &alloc.qualify(numerator)?)?;
                out.end("xbrli:unitNumerator")?;
                out.start("xbrli:unitDenominator", &[])?;
                out.leaf("xbrli:measure", &[], &alloc.qualify(denominator)?)?;
                out.end("xbrli:unitDenominator")?;
                out.end("xbrli:divide")?;
            }
        }
        out.end("xbrli:unit")?;
    }

    for v in inst.values() {
        let name = alloc.qualify(&v.name)?;
        let decimals = v.decimals.map(|d| d.to_string());
        let mut attrs: Vec<(&str, &str)> = Vec::with_capacity(4);
        if let Some(id) = &v.id {
            attrs.push(("id", id.as_str()));
        }
        attrs.push(("contextRef", v.context_ref.as_str()));
        if let Some(unit) = &v.unit_ref {
            if inst.unit(unit).is_none() {
                return Err(Error::UnresolvedReference {
                    kind: "unit",
                    id: unit.to_string(),
                });
            }
            attrs.push(("unitRef", unit.as_str()));
        }
        if let Some(d) = &decimals {
            attrs.push(("decimals", d.as_str()));
        }
        let text = match v.decode() {
            TypedValue::String(raw) if v.is_numeric() => {
                return Err(Error::InvalidValue {
                    name: v.name.to_string(),
                    reason: format!(
                        "{:?} under unit {} is not a number",
                        raw,
                        v.unit_ref.as_deref().unwrap_or_default()
                    ),
                });
            }
            decoded => decoded.to_string(),
        };
        out.leaf(&name, &attrs, &text)?;
    }

    out.end("xbrli:xbrl")?;

    let bytes = out.writer.into_inner();
    debug!(bytes = bytes.len(), facts = inst.values().len(), "xbrl document written");
    String::from_utf8(bytes).map_err(|e| Error::Xml(e.to_string()))
}

fn write_context(out: &mut XmlOut, alloc: &NamespaceAllocator, id: &str, ctx: &Context) -> Result<()> {
    let malformed = |reason: &str| Error::MalformedContext {
        id: id.to_string(),
        reason: reason.to_string(),
    };
    let entity = ctx.entity.as_ref().ok_or_else(|| malformed("no entity"))?;
    if ctx.period.is_none() && ctx.instant.is_none() {
        return Err(malformed("neither period nor instant"));
    }

    out.start("xbrli:context", &[("id", id)])?;
    out.start("xbrli:entity", &[])?;
    out.leaf(
        "xbrli:identifier",
        &[("scheme", entity.scheme.as_str())],
        &entity.id,
    )?;
    if !ctx.dimensions.is_empty() {
        out.start("xbrli:segment", &[])?;
        for d in &ctx.dimensions {
            let axis = alloc.qualify(&d.dimension)?;
            out.leaf(
                "xbrldi:explicitMember",
                &[("dimension", axis.as_str())],
                &alloc.qualify(&d.value)?,
            )?;
        }
        out.end("xbrli:segment")?;
    }
    out.end("xbrli:entity")?;

    out.start("xbrli:period", &[])?;
    match (&ctx.instant, &ctx.period) {
        (Some(i), _) => out.leaf("xbrli:instant", &[], &i.date.to_string())?,
        (None, Some(p)) => {
            out.leaf("xbrli:startDate", &[], &p.start.to_string())?;
            out.leaf("xbrli:endDate", &[], &p.end.to_string())?;
        }
        (None, None) => return Err(malformed("neither period nor instant")),
    }
    out.end("xbrli:period")?;
    out.end("xbrli:context")
}
