//! Answer records produced by [`Handler`][super::Handler]s.

use serde_json::Value;
use trust_dns_proto::rr::RecordType;

/// A validated answer record.
///
/// Records are built through the type-specific constructors ([`Response::a`],
/// [`Response::cname`], ...) so a `Response` is always well-formed. `Escalate` is an internal
/// marker that is never encoded on the wire: it asks the caller to query upstream for the given
/// question and splice the answers in its place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    A {
        ip: String,
        ttl: u32,
        authoritative: bool,
        owner: Option<String>,
    },
    Aaaa {
        ip: String,
        ttl: u32,
        authoritative: bool,
        owner: Option<String>,
    },
    Cname {
        target: String,
        ttl: u32,
        authoritative: bool,
        owner: Option<String>,
    },
    Escalate {
        name: String,
        rrtype: RecordType,
        rrclass: u16,
    },
}

impl Response {
    pub fn a(ip: impl Into<String>, ttl: u32) -> Self {
        Response::A {
            ip: ip.into(),
            ttl,
            authoritative: false,
            owner: None,
        }
    }

    pub fn aaaa(ip: impl Into<String>, ttl: u32) -> Self {
        Response::Aaaa {
            ip: ip.into(),
            ttl,
            authoritative: false,
            owner: None,
        }
    }

    pub fn cname(target: impl Into<String>, ttl: u32) -> Self {
        Response::Cname {
            target: target.into(),
            ttl,
            authoritative: false,
            owner: None,
        }
    }

    pub fn escalate(name: impl Into<String>, rrtype: RecordType, rrclass: u16) -> Self {
        Response::Escalate {
            name: name.into(),
            rrtype,
            rrclass,
        }
    }

    /// Mark the record as authoritative. Has no effect on `Escalate` markers.
    #[must_use]
    pub fn authoritative(mut self) -> Self {
        match &mut self {
            Response::A { authoritative, .. }
            | Response::Aaaa { authoritative, .. }
            | Response::Cname { authoritative, .. } => *authoritative = true,
            Response::Escalate { .. } => {}
        }
        self
    }

    /// Answer the record under `name` instead of the name it would be owned by in answer order.
    /// Has no effect on `Escalate` markers.
    #[must_use]
    pub fn owned_by(mut self, name: impl Into<String>) -> Self {
        match &mut self {
            Response::A { owner, .. } | Response::Aaaa { owner, .. } | Response::Cname { owner, .. } => {
                *owner = Some(name.into());
            }
            Response::Escalate { .. } => {}
        }
        self
    }

    /// The explicit owner set with [`Response::owned_by`].
    pub fn owner(&self) -> Option<&str> {
        match self {
            Response::A { owner, .. } | Response::Aaaa { owner, .. } | Response::Cname { owner, .. } => {
                owner.as_deref()
            }
            Response::Escalate { .. } => None,
        }
    }

    pub fn is_authoritative(&self) -> bool {
        match self {
            Response::A { authoritative, .. }
            | Response::Aaaa { authoritative, .. }
            | Response::Cname { authoritative, .. } => *authoritative,
            Response::Escalate { .. } => false,
        }
    }

    pub fn ttl(&self) -> Option<u32> {
        match self {
            Response::A { ttl, .. } | Response::Aaaa { ttl, .. } | Response::Cname { ttl, .. } => {
                Some(*ttl)
            }
            Response::Escalate { .. } => None,
        }
    }

    pub fn cname_target(&self) -> Option<&str> {
        match self {
            Response::Cname { target, .. } => Some(target),
            _ => None,
        }
    }
}

/// The not-yet-validated output of a handler.
///
/// Handlers written in Rust hand back typed [`Response`]s. Records that come from
/// user-supplied configuration arrive as loose JSON objects and must pass
/// [`validate`][super::validate::validate] before they are answered with.
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    Record(Response),
    Loose(Value),
}

impl Candidate {
    /// The CNAME target, if this candidate looks like a CNAME record.
    ///
    /// Loose candidates are inspected without validating them; a CNAME missing its target
    /// yields `None` here and is rejected later by the validator.
    pub fn cname_target(&self) -> Option<&str> {
        match self {
            Candidate::Record(response) => response.cname_target(),
            Candidate::Loose(value) => match value.get("type").and_then(Value::as_str) {
                Some("CNAME") => value.get("target").and_then(Value::as_str),
                _ => None,
            },
        }
    }
}

impl From<Response> for Candidate {
    fn from(response: Response) -> Self {
        Candidate::Record(response)
    }
}

impl From<Value> for Candidate {
    fn from(value: Value) -> Self {
        Candidate::Loose(value)
    }
}
