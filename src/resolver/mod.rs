//! Binding resolution engine.
//!
//! Every question the server receives is turned into a [`Query`] and handed to
//! [`Engine::resolve`], which walks the handlers bound for it:
//!
//! 1. the handler registered for exactly the query's type and name, if any;
//! 2. every universal handler, in registration order.
//!
//! The first handler with an opinion wins. If its first record is a CNAME, the target is
//! resolved the same way (up to a maximum depth) and the answers are appended; a target nothing
//! local can answer is appended as an [`Escalate`][Response::Escalate] marker so the caller can
//! fetch it upstream. The combined list is then validated as a whole: a single malformed record
//! makes the query go unanswered, and the remaining handlers are not consulted.
//!
//! When no handler has an opinion the outcome is [`ResolutionOutcome::Escalate`] if upstream
//! servers are configured, otherwise [`ResolutionOutcome::Empty`].

pub mod record;
pub mod registry;
pub mod validate;

pub use record::{Candidate, Response};
pub use registry::{handler_fn, stub, BindingRegistry, Bindings, Handler, StaticHandler};
pub use validate::{validate, ValidationFailure};

use std::sync::Arc;
use tracing::{debug, warn};
use trust_dns_proto::rr::RecordType;

/// A question to resolve.
///
/// `name` is always lowercase and carries no trailing dot. `peer_address` and `own_address` are
/// `ip` or `ip:port` strings describing the two ends of the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub name: String,
    pub rrtype: RecordType,
    pub rrclass: u16,
    pub peer_address: String,
    pub own_address: String,
}

impl Query {
    pub fn new(
        name: &str,
        rrtype: RecordType,
        rrclass: u16,
        peer_address: impl Into<String>,
        own_address: impl Into<String>,
    ) -> Self {
        Self {
            name: normalize_name(name),
            rrtype,
            rrclass,
            peer_address: peer_address.into(),
            own_address: own_address.into(),
        }
    }

    /// The same question asked about another name.
    fn redirect(&self, name: &str) -> Self {
        Self {
            name: normalize_name(name),
            ..self.clone()
        }
    }
}

pub(crate) fn normalize_name(name: &str) -> String {
    name.strip_suffix('.').unwrap_or(name).to_ascii_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// Validated records, in answer order. May contain `Escalate` markers after a CNAME.
    Answered(Vec<Response>),
    /// Nothing local applies; ask upstream.
    Escalate {
        name: String,
        rrtype: RecordType,
        rrclass: u16,
    },
    /// Nothing local applies and there is no upstream, or the answer failed validation.
    Empty,
}

/// Resolves queries against a frozen set of [`Bindings`]. Cheap to share between tasks.
#[derive(Debug, Clone)]
pub struct Engine {
    bindings: Arc<Bindings>,
    upstream_configured: bool,
}

impl Engine {
    pub fn new(bindings: Arc<Bindings>, upstream_configured: bool) -> Self {
        Self {
            bindings,
            upstream_configured,
        }
    }

    /// Resolve `query`, following at most `max_depth` CNAMEs.
    pub fn resolve(&self, query: &Query, max_depth: u8) -> ResolutionOutcome {
        debug!("requested response for {} ({})", query.name, query.rrtype);

        for handler in self.bindings.candidates(query.rrtype, &query.name) {
            let mut candidates = match handler.respond(query) {
                Some(candidates) if !candidates.is_empty() => candidates,
                _ => continue,
            };
            debug!("responder {} replied for {}", handler.name(), query.name);

            let target = candidates
                .first()
                .and_then(Candidate::cname_target)
                .map(str::to_string);
            if let Some(target) = target {
                let chased = self.chase(query, &target, max_depth);
                candidates.extend(chased);
            }

            let parsed: Result<Vec<Response>, _> =
                candidates.iter().map(validate::parse).collect();
            return match parsed {
                Ok(records) => ResolutionOutcome::Answered(records),
                Err(failure) => {
                    warn!(
                        "validation failed for {} from responder {}: {failure}",
                        query.name,
                        handler.name()
                    );
                    ResolutionOutcome::Empty
                }
            };
        }

        if self.upstream_configured {
            ResolutionOutcome::Escalate {
                name: query.name.clone(),
                rrtype: query.rrtype,
                rrclass: query.rrclass,
            }
        } else {
            ResolutionOutcome::Empty
        }
    }

    /// Records to append after a CNAME to `target`.
    fn chase(&self, query: &Query, target: &str, max_depth: u8) -> Vec<Candidate> {
        let outcome = match max_depth.checked_sub(1) {
            Some(remaining) => self.resolve(&query.redirect(target), remaining),
            None => {
                debug!("CNAME recursion limit reached at {target}");
                ResolutionOutcome::Empty
            }
        };
        match outcome {
            ResolutionOutcome::Answered(records) => {
                records.into_iter().map(Candidate::Record).collect()
            }
            ResolutionOutcome::Escalate { .. } | ResolutionOutcome::Empty => vec![
                Response::escalate(normalize_name(target), query.rrtype, query.rrclass).into(),
            ],
        }
    }
}
