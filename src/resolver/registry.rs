//! Handler bindings.
//!
//! A [`BindingRegistry`] is filled while the server is configured and then frozen into a
//! read-only [`Bindings`] table shared by every resolving query.

use crate::error::Error;
use crate::resolver::record::{Candidate, Response};
use crate::resolver::{normalize_name, Query};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::sync::Arc;
use trust_dns_proto::rr::RecordType;

/// TTL of the [`stub`] record.
pub const STUB_TTL: u32 = 99_999_999;

/// Something that may answer a [`Query`].
///
/// Returning `None` means "no opinion": the engine moves on to the next candidate handler.
pub trait Handler: Send + Sync {
    fn respond(&self, query: &Query) -> Option<Vec<Candidate>>;

    /// Name used when logging which responder replied.
    fn name(&self) -> &str {
        "<anon>"
    }
}

pub type DynHandler = Arc<dyn Handler>;

/// Frozen handler table.
#[derive(Default)]
pub struct Bindings {
    named: HashMap<(RecordType, String), DynHandler>,
    universal: Vec<DynHandler>,
}

impl Bindings {
    /// The handler bound to exactly this (type, name) pair, if any, and all universal handlers
    /// in registration order.
    pub fn lookup(&self, rrtype: RecordType, name: &str) -> (Option<&DynHandler>, &[DynHandler]) {
        (
            self.named.get(&(rrtype, normalize_name(name))),
            &self.universal,
        )
    }

    /// The sequence of handlers the engine walks for a query: the named handler first, then the
    /// universal handlers.
    pub fn candidates(
        &self,
        rrtype: RecordType,
        name: &str,
    ) -> impl Iterator<Item = &DynHandler> + '_ {
        let (named, universal) = self.lookup(rrtype, name);
        named.into_iter().chain(universal)
    }
}

impl fmt::Debug for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bindings")
            .field("named", &self.named.keys().collect::<Vec<_>>())
            .field("universal", &self.universal.len())
            .finish()
    }
}

enum Phase {
    Configuring(Bindings),
    Serving(Arc<Bindings>),
}

/// Two-phase handler registry.
///
/// While configuring, bindings may be added. [`BindingRegistry::freeze`] moves the registry to
/// serving, after which every mutation fails with [`Error::Configuration`] and leaves the
/// bindings untouched.
pub struct BindingRegistry {
    phase: Phase,
}

impl Default for BindingRegistry {
    fn default() -> Self {
        Self {
            phase: Phase::Configuring(Bindings::default()),
        }
    }
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to queries of type `rrtype` for exactly `name`. A second registration for
    /// the same pair replaces the first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] once the registry is frozen.
    pub fn register<H>(&mut self, rrtype: RecordType, name: &str, handler: H) -> Result<(), Error>
    where
        H: Handler + 'static,
    {
        let bindings = self.configuring()?;
        bindings
            .named
            .insert((rrtype, normalize_name(name)), Arc::new(handler));
        Ok(())
    }

    /// Add a handler tried for every name, after the named handler and after every universal
    /// handler registered before it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] once the registry is frozen.
    pub fn register_universal<H>(&mut self, handler: H) -> Result<(), Error>
    where
        H: Handler + 'static,
    {
        self.configuring()?.universal.push(Arc::new(handler));
        Ok(())
    }

    /// Switch to serving and return the read-only bindings. Freezing twice returns the same
    /// table.
    pub fn freeze(&mut self) -> Arc<Bindings> {
        let bindings = match mem::replace(&mut self.phase, Phase::Serving(Arc::default())) {
            Phase::Configuring(bindings) => Arc::new(bindings),
            Phase::Serving(bindings) => bindings,
        };
        self.phase = Phase::Serving(bindings.clone());
        bindings
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self.phase, Phase::Serving(_))
    }

    /// See [`Bindings::lookup`]. Handlers are returned as shared references so the result does
    /// not borrow the registry.
    pub fn lookup(&self, rrtype: RecordType, name: &str) -> (Option<DynHandler>, Vec<DynHandler>) {
        let bindings = match &self.phase {
            Phase::Configuring(bindings) => bindings,
            Phase::Serving(bindings) => bindings.as_ref(),
        };
        let (named, universal) = bindings.lookup(rrtype, name);
        (named.cloned(), universal.to_vec())
    }

    fn configuring(&mut self) -> Result<&mut Bindings, Error> {
        match &mut self.phase {
            Phase::Configuring(bindings) => Ok(bindings),
            Phase::Serving(_) => Err(Error::frozen()),
        }
    }
}

/// Answers with a fixed list of loose records taken from configuration. The records are
/// validated on every answer, like any user-provided record.
#[derive(Debug, Clone)]
pub struct StaticHandler {
    name: String,
    records: Vec<Value>,
}

impl StaticHandler {
    pub fn new(name: impl Into<String>, records: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }
}

impl Handler for StaticHandler {
    fn respond(&self, _query: &Query) -> Option<Vec<Candidate>> {
        Some(self.records.iter().cloned().map(Candidate::Loose).collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A handler computed by a closure.
pub struct FnHandler<F> {
    name: String,
    respond: F,
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&Query) -> Option<Vec<Candidate>> + Send + Sync,
{
    fn respond(&self, query: &Query) -> Option<Vec<Candidate>> {
        (self.respond)(query)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub fn handler_fn<F>(name: impl Into<String>, respond: F) -> FnHandler<F>
where
    F: Fn(&Query) -> Option<Vec<Candidate>> + Send + Sync,
{
    FnHandler {
        name: name.into(),
        respond,
    }
}

/// An A record for `0.0.0.0` that never expires. Used to ban names and to anchor the
/// dynamic DNS status names.
pub fn stub() -> Response {
    Response::a("0.0.0.0", STUB_TTL)
}

/// A handler always answering with [`stub`].
pub fn stub_handler() -> impl Handler {
    handler_fn("stub", |_: &Query| Some(vec![stub().into()]))
}
