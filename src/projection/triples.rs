// RDF-style triples for graph export. Picking a concrete serialization is
// left to the caller; `Display` renders N-Triples terms for convenience.
use crate::instance::Instance;
use crate::model::{Context, Relation};
use crate::qname::QName;
use ahash::AHashSet;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;
use urlencoding::encode;

const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
const LOCAL: &str = "http://local/";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Uri(String),
    Literal(String),
}

impl Term {
    fn uri(s: impl Into<String>) -> Self {
        Term::Uri(s.into())
    }

    fn literal(s: impl Into<String>) -> Self {
        Term::Literal(s.into())
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Uri(u) => write!(f, "<{}>", u),
            Term::Literal(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '\\' => f.write_str("\\\\")?,
                        '"' => f.write_str("\\\"")?,
                        '\n' => f.write_str("\\n")?,
                        '\r' => f.write_str("\\r")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                f.write_str("\"")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

fn rdf(local: &str) -> Term {
    Term::uri(format!("{}{}", RDF, local))
}

fn rdfs(local: &str) -> Term {
    Term::uri(format!("{}{}", RDFS, local))
}

fn local(local: &str) -> Term {
    Term::uri(format!("{}{}", LOCAL, local))
}

fn kind_type(rel: &Relation) -> Term {
    match rel {
        Relation::Entity(_) => local("t#entity"),
        Relation::Period(_) => local("t#period"),
        Relation::Instant(_) => local("t#instant"),
        Relation::Dimension(_) => local("t#dimension"),
    }
}

fn sha256_hex(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

// Entity paths carry a short SHA-1 of the scheme, matching URIs already
// published for these graphs.
fn scheme_tag(scheme: &str) -> String {
    let mut tag = hex::encode(Sha1::digest(scheme.as_bytes()));
    tag.truncate(4);
    tag
}

fn url_part(rel: &Relation) -> String {
    match rel {
        Relation::Entity(e) => format!("/{}/{}", scheme_tag(&e.scheme), encode(&e.id)),
        Relation::Period(p) => format!("/{}-{}", p.start, p.end),
        Relation::Instant(i) => format!("/{}", i.date),
        Relation::Dimension(d) => format!(
            "/{}={}",
            encode(&d.dimension.localname),
            encode(&d.value.localname)
        ),
    }
}

/// Stable URI of a context node, built from its qualifiers.
pub fn context_uri(ctx: &Context) -> String {
    let rels = ctx.relations();
    if rels.is_empty() {
        return format!("{}root", LOCAL);
    }
    let mut uri = LOCAL.trim_end_matches('/').to_string();
    for rel in &rels {
        uri.push_str(&url_part(rel));
    }
    uri
}

struct Emitter<'a> {
    inst: &'a Instance,
    entity_name: Option<String>,
    declared: AHashSet<QName>,
    out: Vec<Triple>,
}

impl Emitter<'_> {
    fn push(&mut self, subject: Term, predicate: Term, object: Term) {
        self.out.push(Triple {
            subject,
            predicate,
            object,
        });
    }

    fn schema(&mut self) {
        let classes = [
            ("t#context", "Context"),
            ("t#entity", "Entity"),
            ("t#period", "Period"),
            ("t#instant", "Instant"),
            ("t#dimension", "Dimension"),
        ];
        for (class, label) in classes {
            self.push(local(class), rdfs("label"), Term::literal(label));
        }
        for (class, _) in classes {
            self.push(local(class), rdf("type"), rdfs("Class"));
        }
    }

    // Axes and concepts are declared once however often they occur.
    fn declare(&mut self, name: &QName, class: Term) {
        if self.declared.insert(name.clone()) {
            self.push(Term::uri(name.uri()), rdf("type"), class);
            self.push(
                Term::uri(name.uri()),
                rdfs("label"),
                Term::literal(name.localname.as_str()),
            );
        }
    }

    fn node(&mut self, ctx: &Context) {
        let uri = Term::uri(context_uri(ctx));
        match ctx.relation() {
            None => {
                self.push(uri.clone(), rdf("type"), local("t#root"));
                self.push(uri.clone(), rdfs("label"), Term::literal("everything"));
            }
            Some(rel) => {
                self.push(uri.clone(), rdf("type"), kind_type(rel));
                let label = match (rel, &self.entity_name) {
                    (Relation::Entity(_), Some(name)) => name.clone(),
                    (Relation::Dimension(d), _) => d.value.localname.to_string(),
                    _ => rel.description(),
                };
                self.push(uri.clone(), rdfs("label"), Term::literal(label));
            }
        }

        let inst = self.inst;
        for (rel, child) in ctx.children() {
            let child = inst.context(child);
            let child_uri = Term::uri(context_uri(child));
            match rel {
                Relation::Entity(_) => self.push(uri.clone(), local("contains"), child_uri),
                Relation::Period(_) | Relation::Instant(_) => {
                    self.push(uri.clone(), local("reports"), child_uri)
                }
                Relation::Dimension(d) => {
                    self.push(uri.clone(), Term::uri(d.dimension.uri()), child_uri);
                    self.declare(&d.dimension, local("t#axis"));
                }
            }
            self.node(child);
        }
    }

    fn facts(&mut self) {
        let inst = self.inst;
        for (index, v) in inst.values().iter().enumerate() {
            let ctx = inst.context(v.context);
            let ctx_uri = context_uri(ctx);
            let key = format!("{}|{}|{}", ctx_uri, v.name, index);
            let fact = Term::uri(format!("{}fact/{}", LOCAL, &sha256_hex(&key)[..16]));

            self.push(fact.clone(), rdf("type"), Term::uri(v.name.uri()));
            self.push(fact.clone(), local("hasValue"), Term::literal(v.decode().to_string()));
            self.push(fact.clone(), local("context"), Term::uri(ctx_uri));
            if let Some(unit) = v.unit_ref.as_deref().and_then(|u| inst.unit(u)) {
                self.push(fact.clone(), local("unit"), Term::literal(unit.to_string()));
            }

            // Direct links to the qualifier nodes on the context's path.
            let mut node = ctx;
            while let (Some(rel), Some(parent)) = (node.relation(), node.parent()) {
                let predicate = match rel {
                    Relation::Entity(_) => local("entity"),
                    Relation::Period(_) | Relation::Instant(_) => local("period"),
                    Relation::Dimension(_) => local("dimension"),
                };
                self.push(fact.clone(), predicate, Term::uri(context_uri(node)));
                node = inst.context(parent);
            }

            self.declare(&v.name, rdf("Property"));
        }
    }
}

/// Graph form of the instance: class declarations, the context tree, then
/// one node per fact linked into it.
pub fn to_triples(inst: &Instance) -> Vec<Triple> {
    let mut emitter = Emitter {
        inst,
        entity_name: inst.entity_name(),
        declared: AHashSet::new(),
        out: Vec::new(),
    };
    emitter.schema();
    emitter.node(inst.root());
    emitter.facts();
    emitter.out
}
