//! Dynamic DNS over plain DNS queries.
//!
//! Clients keep a name in the dynamic zone pointed at their current address by issuing an
//! ordinary DNS query whose name carries an authenticated command. No other transport is
//! involved: any resolver path that reaches this server can be used.
//!
//! # Zone layout
//!
//! With the zone root `dyn.example.com` and the secret key table `{ "home": "hunter2" }`:
//!
//! * `home.dyn.example.com` (A) answers with the address last registered for `home`, or with a
//!   CNAME to `unbound.dyn.example.com` when nothing has been registered yet.
//! * `<checksum>.<timestamp>.configure.home.dyn.example.com` (any type) registers the address
//!   the query came from for `home`, and answers with a CNAME to `ok.dyn.example.com`.
//!
//! `timestamp` is the current Unix time in seconds and must be within 60 seconds of the
//! server's clock. `checksum` is the first 16 hex characters of
//! `SHA-256("<secret>/<timestamp>")`:
//!
//! ```bash
//! ❯ ts=$(date +%s)
//! ❯ sum=$(printf 'hunter2/%s' "$ts" | sha256sum | cut -c1-16)
//! ❯ dig @127.0.0.1 -p 5353 +short "$sum.$ts.configure.home.dyn.example.com" A
//! ok.dyn.example.com.
//! 0.0.0.0
//! ```
//!
//! Rejected updates look exactly like names the server knows nothing about.

mod lookup;
mod update;

pub use lookup::DynamicLookup;
pub use update::DynamicUpdate;

use crate::binding_store::DynBindingStore;
use crate::error::Error;
use crate::resolver::{handler_fn, stub, BindingRegistry, Query};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use time::OffsetDateTime;

/// Label answered with when a domain has no binding yet.
pub const UNBOUND_LABEL: &str = "unbound";
/// Label answered with after a successful update.
pub const OK_LABEL: &str = "ok";

const CHECKSUM_LEN: usize = 16;

/// The label suffix framing the dynamic zone, e.g. `["dyn", "example", "com"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneRoot {
    labels: Vec<String>,
    joined: String,
}

impl ZoneRoot {
    /// # Errors
    ///
    /// Returns [`Error::InvalidZoneRoot`] for an empty root or one with empty labels.
    pub fn new<I, S>(labels: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let labels: Vec<String> = labels
            .into_iter()
            .map(|label| label.as_ref().to_ascii_lowercase())
            .collect();
        let joined = labels.join(".");
        if labels.is_empty() || labels.iter().any(String::is_empty) {
            return Err(Error::InvalidZoneRoot(joined));
        }
        Ok(Self { labels, joined })
    }

    /// `<label>.<root>`
    pub fn prefixed(&self, label: &str) -> String {
        format!("{label}.{}", self.joined)
    }

    /// The labels of `name` in front of the root, nearest to the root first. `None` when `name`
    /// is not strictly below the root.
    pub fn extra_labels<'a>(&self, name: &'a str) -> Option<Vec<&'a str>> {
        let mut labels: Vec<&str> = name.split('.').collect();
        if labels.len() <= self.labels.len() {
            return None;
        }
        let extra = labels.len() - self.labels.len();
        if labels[extra..] != self.labels[..] {
            return None;
        }
        labels.truncate(extra);
        labels.reverse();
        Some(labels)
    }
}

impl FromStr for ZoneRoot {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.strip_suffix('.').unwrap_or(s).split('.'))
    }
}

/// Wall clock in whole seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        OffsetDateTime::now_utc().unix_timestamp()
    }
}

/// The checksum a client must present to update a domain at `timestamp`.
pub fn checksum(secret: &str, timestamp: &str) -> String {
    let digest = Sha256::digest(format!("{secret}/{timestamp}").as_bytes());
    let mut hex = format!("{digest:x}");
    hex.truncate(CHECKSUM_LEN);
    hex
}

/// Register the dynamic zone with `registry` as universal handlers: the status names, the lookup
/// handler, then the update handler.
///
/// The `unbound` and `ok` names answer every query type with the [`stub`] A record, so CNAMEs
/// to them are never forwarded upstream.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the registry is already frozen.
pub fn install(
    registry: &mut BindingRegistry,
    root: ZoneRoot,
    keys: HashMap<String, String>,
    store: DynBindingStore,
    clock: Arc<dyn Clock>,
) -> Result<(), Error> {
    let root = Arc::new(root);
    let status_names = [root.prefixed(UNBOUND_LABEL), root.prefixed(OK_LABEL)];
    registry.register_universal(handler_fn("dyndns-status", move |query: &Query| {
        status_names
            .contains(&query.name)
            .then(|| vec![stub().into()])
    }))?;
    registry.register_universal(DynamicLookup::new(root.clone(), store.clone()))?;
    registry.register_universal(DynamicUpdate::new(root, keys, store, clock))?;
    Ok(())
}
