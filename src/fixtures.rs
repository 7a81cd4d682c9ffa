// Test fixtures shared by module tests
use crate::builder::{ContextRecord, FactRecord, TreeBuilder};
use crate::instance::Instance;
use crate::model::Unit;
use crate::qname::QName;
use chrono::NaiveDate;

pub mod ns {
    pub const GAAP: &str = "http://fasb.org/us-gaap/2023";
    pub const DEI: &str = "http://xbrl.sec.gov/dei/2023";
    pub const EX: &str = "http://example.com/2023";
    pub const ISO4217: &str = "http://www.xbrl.org/2003/iso4217";
    pub const XBRLI: &str = "http://www.xbrl.org/2003/instance";
}

pub const CIK: &str = "http://www.sec.gov/CIK";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn gaap(local: &str) -> QName {
    QName::new(ns::GAAP, local)
}

pub fn dei(local: &str) -> QName {
    QName::new(ns::DEI, local)
}

pub fn ex(local: &str) -> QName {
    QName::new(ns::EX, local)
}

pub fn units(builder: TreeBuilder) -> TreeBuilder {
    builder
        .unit(Unit::measure("usd", QName::new(ns::ISO4217, "USD")))
        .unit(Unit::measure("shares", QName::new(ns::XBRLI, "shares")))
        .unit(Unit::divide(
            "usdPerShare",
            QName::new(ns::ISO4217, "USD"),
            QName::new(ns::XBRLI, "shares"),
        ))
}

pub fn contexts(builder: TreeBuilder) -> TreeBuilder {
    dated_contexts(builder.context(ContextRecord::new("c_ent").with_entity("0123", CIK)))
}

/// Contexts that all carry a period or instant.
pub fn dated_contexts(builder: TreeBuilder) -> TreeBuilder {
    builder
        .context(
            ContextRecord::new("c_dur")
                .with_entity("0123", CIK)
                .with_period(date(2023, 1, 1), date(2023, 12, 31)),
        )
        .context(
            ContextRecord::new("c_inst")
                .with_entity("0123", CIK)
                .with_instant(date(2023, 12, 31)),
        )
        .context(
            ContextRecord::new("c_seg")
                .with_entity("0123", CIK)
                .with_period(date(2023, 1, 1), date(2023, 12, 31))
                .with_dimension(ex("SegmentAxis"), ex("EuropeMember")),
        )
}

/// A small report exercising every qualifier kind and both unit kinds.
/// The registrant name sits on the entity-only context `c_ent`.
pub fn sample() -> Instance {
    facts(contexts(units(base())), "c_ent").build().unwrap()
}

/// Same facts as [`sample`] with every context dated, as a filing would be,
/// so the instance can be written as XBRL.
pub fn filing() -> Instance {
    facts(dated_contexts(units(base())), "c_dur").build().unwrap()
}

fn base() -> TreeBuilder {
    TreeBuilder::new().schema_ref("https://example.com/acme-2023.xsd")
}

fn facts(builder: TreeBuilder, name_context: &str) -> TreeBuilder {
    builder
        .fact(FactRecord::new(dei("EntityRegistrantName"), name_context, "Acme Widgets Ltd"))
        .fact(
            FactRecord::new(gaap("Revenue"), "c_dur", "100")
                .with_unit("usd")
                .with_decimals(0)
                .with_id("f1"),
        )
        .fact(FactRecord::new(gaap("Assets"), "c_inst", "500").with_unit("usd"))
        .fact(FactRecord::new(gaap("Revenue"), "c_seg", "40").with_unit("usd"))
        .fact(
            FactRecord::new(gaap("EarningsPerShare"), "c_dur", "1.25")
                .with_unit("usdPerShare")
                .with_decimals(2),
        )
        .fact(FactRecord::new(dei("DocumentPeriodEndDate"), "c_dur", "2023-12-31"))
}
