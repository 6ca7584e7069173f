//! Structural validation of handler output.
//!
//! Typed [`Response`]s are valid by construction. Loose JSON records must look like:
//!
//! ```json
//! { "type": "A", "ttl": 300, "ip": "192.0.2.1", "authoritative": true }
//! { "type": "CNAME", "ttl": 300, "target": "www.example.com" }
//! ```
//!
//! `authoritative` is optional and defaults to `false`. `name` is optional: a string answers the
//! record under that name instead of the name it would be owned by in answer order, anything
//! else is ignored. An object with `"special": true` is an
//! escalation marker and must carry `name`, `rrtype` and `rrclass`:
//!
//! ```json
//! { "special": true, "specialType": "queryUpstream", "name": "example.com", "rrtype": 1, "rrclass": 1 }
//! ```

use crate::resolver::record::{Candidate, Response};
use serde_json::{Map, Value};
use std::str::FromStr;
use tracing::warn;
use trust_dns_proto::rr::RecordType;

/// Why a loose record was rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} contents: required fields {missing:?}")]
pub struct ValidationFailure {
    pub kind: &'static str,
    pub missing: Vec<&'static str>,
}

impl ValidationFailure {
    fn new(kind: &'static str, missing: Vec<&'static str>) -> Self {
        Self { kind, missing }
    }
}

/// Returns `true` when the candidate can be answered with. Failures are logged.
pub fn validate(candidate: &Candidate) -> bool {
    match parse(candidate) {
        Ok(_) => true,
        Err(failure) => {
            warn!("validate: {failure}");
            false
        }
    }
}

/// Convert a candidate to a [`Response`], or describe the fields that are missing or
/// mis-typed. A record is never partially accepted.
///
/// # Errors
///
/// Returns a [`ValidationFailure`] naming the offending fields.
pub fn parse(candidate: &Candidate) -> Result<Response, ValidationFailure> {
    match candidate {
        Candidate::Record(response) => Ok(response.clone()),
        Candidate::Loose(Value::Object(object)) => parse_object(object),
        Candidate::Loose(_) => Err(ValidationFailure::new("record", vec!["ttl", "type"])),
    }
}

fn parse_object(object: &Map<String, Value>) -> Result<Response, ValidationFailure> {
    if object.get("special").and_then(Value::as_bool) == Some(true) {
        return parse_special(object);
    }

    let ttl = object
        .get("ttl")
        .and_then(Value::as_u64)
        .and_then(|ttl| u32::try_from(ttl).ok());
    let rtype = object
        .get("type")
        .and_then(Value::as_str)
        .filter(|t| matches!(*t, "A" | "AAAA" | "CNAME"));

    let (ttl, rtype) = match (ttl, rtype) {
        (Some(ttl), Some(rtype)) => (ttl, rtype),
        (ttl, rtype) => {
            let mut missing = vec![];
            if ttl.is_none() {
                missing.push("ttl");
            }
            if rtype.is_none() {
                missing.push("type");
            }
            return Err(ValidationFailure::new("generic", missing));
        }
    };

    let authoritative = object
        .get("authoritative")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let string_field = |field: &'static str, kind: &'static str| {
        object
            .get(field)
            .and_then(Value::as_str)
            .ok_or_else(|| ValidationFailure::new(kind, vec![field]))
    };

    let response = match rtype {
        "A" => Response::a(string_field("ip", "A")?, ttl),
        "AAAA" => Response::aaaa(string_field("ip", "AAAA")?, ttl),
        _ => Response::cname(string_field("target", "CNAME")?, ttl),
    };
    let response = match object.get("name").and_then(Value::as_str) {
        Some(owner) => response.owned_by(owner),
        None => response,
    };
    Ok(if authoritative {
        response.authoritative()
    } else {
        response
    })
}

fn parse_special(object: &Map<String, Value>) -> Result<Response, ValidationFailure> {
    let name = object.get("name").and_then(Value::as_str);
    let rrtype = object.get("rrtype").and_then(|rrtype| match rrtype {
        Value::Number(code) => code
            .as_u64()
            .and_then(|code| u16::try_from(code).ok())
            .map(RecordType::from),
        Value::String(mnemonic) => RecordType::from_str(mnemonic).ok(),
        _ => None,
    });
    let rrclass = object
        .get("rrclass")
        .and_then(Value::as_u64)
        .and_then(|class| u16::try_from(class).ok());

    match (name, rrtype, rrclass) {
        (Some(name), Some(rrtype), Some(rrclass)) => Ok(Response::escalate(name, rrtype, rrclass)),
        (name, rrtype, rrclass) => {
            let missing = [
                ("name", name.is_none()),
                ("rrtype", rrtype.is_none()),
                ("rrclass", rrclass.is_none()),
            ]
            .into_iter()
            .filter_map(|(field, absent)| absent.then_some(field))
            .collect();
            Err(ValidationFailure::new("escalation", missing))
        }
    }
}
