// Reader for canonical XBRL instance documents, the format written by
// `projection::xbrl`. Inline XBRL is out of scope here.
use crate::builder::{ContextRecord, FactRecord, TreeBuilder};
use crate::instance::Instance;
use crate::model::{Dimension, Entity, Instant, Period, Unit};
use crate::projection::xbrl::{LINK, XBRLI};
use crate::qname::QName;
use crate::{Error, Result};
use chrono::NaiveDate;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, QName as XmlName, ResolveResult};
use quick_xml::NsReader;
use std::fmt::Display;
use tracing::debug;

pub fn parse_str(text: &str) -> Result<Instance> {
    InstanceReader::new(text).read()?.build()
}

pub fn parse_bytes(data: &[u8]) -> Result<Instance> {
    // Skip BOM if present
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
    let text = std::str::from_utf8(data)
        .map_err(|_| Error::Parse("Invalid UTF-8 in instance".to_string()))?;
    parse_str(text)
}

fn parse_err<E: Display>(e: E) -> Error {
    Error::Parse(e.to_string())
}

fn parse_date(text: &str) -> Result<NaiveDate> {
    let text = text.trim();
    // xs:dateTime values keep only their date part
    let day = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| Error::Parse(format!("invalid date {:?}: {}", text, e)))
}

fn attr(e: &BytesStart<'_>, local: &[u8]) -> Result<Option<String>> {
    for a in e.attributes() {
        let a = a.map_err(parse_err)?;
        if a.key.local_name().as_ref() == local {
            return Ok(Some(a.unescape_value().map_err(parse_err)?.into_owned()));
        }
    }
    Ok(None)
}

fn required_attr(e: &BytesStart<'_>, local: &[u8]) -> Result<String> {
    attr(e, local)?.ok_or_else(|| {
        Error::Parse(format!(
            "<{}> missing {} attribute",
            String::from_utf8_lossy(e.name().as_ref()),
            String::from_utf8_lossy(local)
        ))
    })
}

/// Name of a fact element, or `None` for instance structure. Elements in
/// no namespace count as facts when they carry a `contextRef`.
fn fact_name(ns: Option<&str>, local: &[u8], e: &BytesStart<'_>) -> Result<Option<QName>> {
    let local = String::from_utf8_lossy(local);
    match ns {
        Some(XBRLI) | Some(LINK) => Ok(None),
        Some(ns) => Ok(Some(QName::new(ns, local))),
        None if attr(e, b"contextRef")?.is_some() => Ok(Some(QName::new("", local))),
        None => Ok(None),
    }
}

fn namespace_of(ns: ResolveResult<'_>) -> Option<String> {
    match ns {
        ResolveResult::Bound(Namespace(n)) => Some(String::from_utf8_lossy(n).into_owned()),
        _ => None,
    }
}

struct InstanceReader<'i> {
    reader: NsReader<&'i [u8]>,
    builder: TreeBuilder,
}

impl<'i> InstanceReader<'i> {
    fn new(text: &'i str) -> Self {
        let mut reader = NsReader::from_str(text);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            builder: TreeBuilder::new(),
        }
    }

    fn next(&mut self) -> Result<(Option<String>, Event<'i>)> {
        let (ns, event) = self.reader.read_resolved_event().map_err(parse_err)?;
        Ok((namespace_of(ns), event))
    }

    /// Resolves a prefixed name appearing in attribute or text content
    /// against the prefixes currently in scope.
    fn resolve(&self, text: &str) -> Result<QName> {
        let text = text.trim();
        let (ns, local) = self.reader.resolve_element(XmlName(text.as_bytes()));
        let local = String::from_utf8_lossy(local.into_inner()).into_owned();
        match ns {
            ResolveResult::Bound(Namespace(n)) => Ok(QName::new(String::from_utf8_lossy(n), local)),
            ResolveResult::Unbound => Ok(QName::new("", local)),
            ResolveResult::Unknown(prefix) => Err(Error::Parse(format!(
                "unknown prefix {:?} in {:?}",
                String::from_utf8_lossy(&prefix),
                text
            ))),
        }
    }

    fn read(mut self) -> Result<TreeBuilder> {
        loop {
            match self.next()? {
                (ns, Event::Start(e)) => {
                    if ns.as_deref() != Some(XBRLI) || e.local_name().as_ref() != b"xbrl" {
                        return Err(Error::Parse("document root is not xbrli:xbrl".to_string()));
                    }
                    break;
                }
                (ns, Event::Empty(e)) => {
                    if ns.as_deref() == Some(XBRLI) && e.local_name().as_ref() == b"xbrl" {
                        return Ok(self.builder);
                    }
                    return Err(Error::Parse("document root is not xbrli:xbrl".to_string()));
                }
                (_, Event::Eof) => return Err(Error::Parse("empty document".to_string())),
                _ => {}
            }
        }

        loop {
            match self.next()? {
                (ns, Event::Start(e)) => match (ns.as_deref(), e.local_name().as_ref()) {
                    (Some(XBRLI), b"context") => {
                        let record = self.read_context(required_attr(&e, b"id")?)?;
                        self.builder = self.builder.context(record);
                    }
                    (Some(XBRLI), b"unit") => {
                        let unit = self.read_unit(required_attr(&e, b"id")?)?;
                        self.builder = self.builder.unit(unit);
                    }
                    (Some(LINK), b"schemaRef") => {
                        let href = required_attr(&e, b"href")?;
                        self.builder = self.builder.schema_ref(href);
                        self.reader.read_to_end(e.name()).map_err(parse_err)?;
                    }
                    (ns, local) => match fact_name(ns, local, &e)? {
                        Some(name) => {
                            let fact = self.fact_record(name, &e)?;
                            let raw = self.read_text()?;
                            self.builder = self.builder.fact(FactRecord { raw, ..fact });
                        }
                        None => {
                            debug!(element = %String::from_utf8_lossy(e.name().as_ref()), "skipped");
                            self.reader.read_to_end(e.name()).map_err(parse_err)?;
                        }
                    },
                },
                (ns, Event::Empty(e)) => match (ns.as_deref(), e.local_name().as_ref()) {
                    (Some(LINK), b"schemaRef") => {
                        let href = required_attr(&e, b"href")?;
                        self.builder = self.builder.schema_ref(href);
                    }
                    (ns, local) => {
                        if let Some(name) = fact_name(ns, local, &e)? {
                            let fact = self.fact_record(name, &e)?;
                            self.builder = self.builder.fact(fact);
                        }
                    }
                },
                (_, Event::End(_)) => break,
                (_, Event::Eof) => return Err(Error::Parse("unexpected end of document".to_string())),
                _ => {}
            }
        }
        Ok(self.builder)
    }

    fn fact_record(&self, name: QName, e: &BytesStart<'_>) -> Result<FactRecord> {
        let context_ref = required_attr(e, b"contextRef")?;
        let mut fact = FactRecord::new(name, &context_ref, String::new());
        fact.id = attr(e, b"id")?.map(Into::into);
        fact.unit_ref = attr(e, b"unitRef")?.map(Into::into);
        fact.decimals = attr(e, b"decimals")?.map(|d| d.parse()).transpose()?;
        Ok(fact)
    }

    /// Concatenated text up to the end of the current element.
    fn read_text(&mut self) -> Result<String> {
        let mut text = String::new();
        let mut depth = 0usize;
        loop {
            match self.next()?.1 {
                Event::Text(t) => text.push_str(&t.unescape().map_err(parse_err)?),
                Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
                Event::Start(_) => depth += 1,
                Event::End(_) if depth == 0 => return Ok(text),
                Event::End(_) => depth -= 1,
                Event::Eof => return Err(Error::Parse("unexpected end of document".to_string())),
                _ => {}
            }
        }
    }

    fn read_context(&mut self, id: String) -> Result<ContextRecord> {
        let mut record = ContextRecord::new(id.as_str());
        let mut start = None;
        let mut end = None;
        let mut depth = 0usize;
        loop {
            match self.next()?.1 {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"identifier" => {
                        let scheme = attr(&e, b"scheme")?.unwrap_or_default();
                        let ident = self.read_text()?;
                        record.entity = Some(Entity::new(ident.trim(), scheme));
                    }
                    b"startDate" => start = Some(parse_date(&self.read_text()?)?),
                    b"endDate" => end = Some(parse_date(&self.read_text()?)?),
                    b"instant" => {
                        record.instant = Some(Instant {
                            date: parse_date(&self.read_text()?)?,
                        })
                    }
                    b"explicitMember" => {
                        let axis = required_attr(&e, b"dimension")?;
                        let dimension = self.resolve(&axis)?;
                        let member = self.read_text()?;
                        let value = self.resolve(&member)?;
                        record.dimensions.push(Dimension::new(dimension, value));
                    }
                    b"typedMember" => {
                        debug!(context = %id, "typed dimension member skipped");
                        self.reader.read_to_end(e.name()).map_err(parse_err)?;
                    }
                    _ => depth += 1,
                },
                Event::End(_) if depth == 0 => break,
                Event::End(_) => depth -= 1,
                Event::Eof => return Err(Error::Parse(format!("context {} not closed", id))),
                _ => {}
            }
        }

        match (start, end) {
            (Some(start), Some(end)) => record.period = Some(Period { start, end }),
            (None, None) => {}
            _ => {
                return Err(Error::MalformedContext {
                    id,
                    reason: "period needs both startDate and endDate".to_string(),
                })
            }
        }
        Ok(record)
    }

    fn read_unit(&mut self, id: String) -> Result<Unit> {
        let mut simple = None;
        let mut numerator = None;
        let mut denominator = None;
        // 0: directly under unit, 1: numerator, 2: denominator
        let mut slot = 0u8;
        let mut depth = 0usize;
        loop {
            match self.next()?.1 {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"measure" => {
                        let text = self.read_text()?;
                        let measure = self.resolve(&text)?;
                        match slot {
                            1 => numerator = Some(measure),
                            2 => denominator = Some(measure),
                            _ => simple = Some(measure),
                        }
                    }
                    b"unitNumerator" => {
                        slot = 1;
                        depth += 1;
                    }
                    b"unitDenominator" => {
                        slot = 2;
                        depth += 1;
                    }
                    _ => depth += 1,
                },
                Event::End(_) if depth == 0 => break,
                Event::End(_) => {
                    depth -= 1;
                    slot = 0;
                }
                Event::Eof => return Err(Error::Parse(format!("unit {} not closed", id))),
                _ => {}
            }
        }

        match (simple, numerator, denominator) {
            (_, Some(n), Some(d)) => Ok(Unit::divide(id, n, d)),
            (Some(m), None, None) => Ok(Unit::measure(id, m)),
            _ => Err(Error::Parse(format!("unit {} has no usable measure", id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::fixtures::{self, ex, gaap};
    use crate::model::{Decimals, UnitKind};
    use crate::projection::to_xbrl_document;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip_preserves_flat_content() {
        let original = fixtures::filing();
        for config in [Config::default(), Config::compact()] {
            let doc = to_xbrl_document(&original, &config).unwrap();
            let parsed = parse_str(&doc).unwrap();

            assert_eq!(parsed.schemas(), original.schemas());

            let ids = |inst: &Instance| {
                inst.contexts()
                    .map(|(id, ctx)| (id.to_string(), ctx.relations()))
                    .collect::<Vec<_>>()
            };
            assert_eq!(ids(&parsed), ids(&original));

            let facts = |inst: &Instance| {
                inst.values()
                    .iter()
                    .map(|v| {
                        (
                            v.id.clone(),
                            v.name.clone(),
                            v.context_ref.clone(),
                            v.unit_ref.clone(),
                            v.decimals,
                            v.decode(),
                        )
                    })
                    .collect::<Vec<_>>()
            };
            assert_eq!(facts(&parsed), facts(&original));

            let units = |inst: &Instance| inst.units().cloned().collect::<Vec<_>>();
            assert_eq!(units(&parsed), units(&original));
        }
    }

    #[test]
    fn test_infinite_decimals_survive_round_trip() {
        let original = TreeBuilder::new()
            .unit(Unit::measure("usd", QName::new(fixtures::ns::ISO4217, "USD")))
            .context(
                ContextRecord::new("c")
                    .with_entity("X", "s")
                    .with_instant(fixtures::date(2023, 12, 31)),
            )
            .fact(
                FactRecord::new(gaap("Cash"), "c", "10")
                    .with_unit("usd")
                    .with_decimals(Decimals::Inf),
            )
            .build()
            .unwrap();
        let doc = to_xbrl_document(&original, &Config::default()).unwrap();
        assert!(doc.contains("decimals=\"INF\""));
        let parsed = parse_str(&doc).unwrap();
        assert_eq!(parsed.values()[0].decimals, Some(Decimals::Inf));
    }

    #[test]
    fn test_round_trip_keeps_facts_in_no_namespace() {
        let original = TreeBuilder::new()
            .context(
                ContextRecord::new("c")
                    .with_entity("X", "s")
                    .with_instant(fixtures::date(2023, 12, 31)),
            )
            .fact(FactRecord::new(QName::new("", "Note"), "c", "unaudited"))
            .fact(FactRecord::new(QName::new("", "Flag"), "c", ""))
            .build()
            .unwrap();
        let doc = to_xbrl_document(&original, &Config::default()).unwrap();
        assert!(doc.contains("<Note contextRef=\"c\">unaudited</Note>"));

        let parsed = parse_str(&doc).unwrap();
        let names: Vec<_> = parsed.values().iter().map(|v| (v.name.clone(), v.raw.clone())).collect();
        assert_eq!(
            names,
            vec![
                (QName::new("", "Note"), "unaudited".to_string()),
                (QName::new("", "Flag"), String::new()),
            ]
        );
    }

    #[test]
    fn test_reads_foreign_prefixes() {
        let doc = r#"<?xml version="1.0" encoding="UTF-8"?>
<xbrl xmlns="http://www.xbrl.org/2003/instance"
      xmlns:xbrldi="http://xbrl.org/2006/xbrldi"
      xmlns:link="http://www.xbrl.org/2003/linkbase"
      xmlns:xlink="http://www.w3.org/1999/xlink"
      xmlns:iso4217="http://www.xbrl.org/2003/iso4217"
      xmlns:us-gaap="http://fasb.org/us-gaap/2023"
      xmlns:ex="http://example.com/2023">
  <link:schemaRef xlink:type="simple" xlink:href="acme.xsd"/>
  <context id="ctx1">
    <entity>
      <identifier scheme="http://www.sec.gov/CIK">0000000000</identifier>
      <segment>
        <xbrldi:explicitMember dimension="ex:SegmentAxis"> ex:EuropeMember </xbrldi:explicitMember>
      </segment>
    </entity>
    <period>
      <startDate>2023-01-01</startDate>
      <endDate>2023-12-31T00:00:00</endDate>
    </period>
  </context>
  <unit id="usd">
    <measure>iso4217:USD</measure>
  </unit>
  <us-gaap:Revenue contextRef="ctx1" unitRef="usd" decimals="INF">1 000</us-gaap:Revenue>
  <us-gaap:Note contextRef="ctx1"/>
</xbrl>"#;
        let inst = parse_str(doc).unwrap();
        assert_eq!(inst.schemas(), ["acme.xsd".to_string()]);
        let ctx = inst.context_by_id("ctx1").unwrap();
        assert_eq!(ctx.dimensions, vec![Dimension::new(ex("SegmentAxis"), ex("EuropeMember"))]);
        assert_eq!(ctx.period.unwrap().end, fixtures::date(2023, 12, 31));
        assert!(matches!(inst.unit("usd").unwrap().kind, UnitKind::Measure(ref m) if m.localname == "USD"));

        let revenue = &inst.values()[0];
        assert_eq!(revenue.name, gaap("Revenue"));
        assert_eq!(revenue.decimals, Some(Decimals::Inf));
        assert_eq!(revenue.decode().to_string(), "1000");
        assert_eq!(inst.values()[1].raw, "");
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(parse_str("<root/>"), Err(Error::Parse(_))));
        assert!(matches!(parse_str(""), Err(Error::Parse(_))));

        let missing_id = r#"<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance">
            <xbrli:context><xbrli:entity/></xbrli:context></xbrli:xbrl>"#;
        assert!(matches!(parse_str(missing_id), Err(Error::Parse(_))));

        let unknown_prefix = r#"<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance">
            <xbrli:unit id="u"><xbrli:measure>nope:USD</xbrli:measure></xbrli:unit></xbrli:xbrl>"#;
        assert!(matches!(parse_str(unknown_prefix), Err(Error::Parse(_))));
    }

    #[test]
    fn test_bom_is_skipped() {
        let doc = to_xbrl_document(&fixtures::filing(), &Config::default()).unwrap();
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(doc.as_bytes());
        assert_eq!(parse_bytes(&bytes).unwrap().values().len(), 6);
    }
}
