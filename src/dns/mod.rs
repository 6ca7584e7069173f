//! DNS wire adapter.
//!
//! Every question received over UDP or TCP is handed to the binding
//! [`Engine`][crate::resolver::Engine] and its outcome is encoded as a DNS response:
//!
//! * Answered records are written in order. The owner of the first record is the question name,
//!   and each `CNAME` moves the owner of the records after it to its target.
//! * Escalation markers among the answers, and questions nothing local answers, are forwarded
//!   to the configured [`upstreams`][crate::config::Config::upstreams] in order. The first
//!   upstream with answers wins, and its answers are cached until their smallest TTL expires.
//! * Anything that yields no records is answered with `NXDOMAIN`.
//!
//! The `AA` flag is set when at least one local record was marked authoritative.
//!
//! # Static Records
//!
//! With config:
//! ```json
//! {
//!   "bindings": [
//!     { "type": "A", "name": "www.example.com", "records": [
//!       { "type": "CNAME", "ttl": 300, "target": "web.example.com" }
//!     ] },
//!     { "type": "A", "name": "web.example.com", "records": [
//!       { "type": "A", "ttl": 300, "ip": "93.184.216.34", "authoritative": true }
//!     ] }
//!   ],
//!   ...
//! }
//! ```
//!
//! An `A` query for `www.example.com` would return:
//!
//! ```bash
//! ❯ dig @127.0.0.1 -p 5353 www.example.com +short A
//! web.example.com.
//! 93.184.216.34
//! ```
//!
//! # Dynamic Records
//!
//! See [`crate::dyndns`].

mod cache;
mod handlers;
pub mod server;
pub mod upstream;

pub use server::new;

use std::str::FromStr;
use trust_dns_proto::error::ProtoError;
use trust_dns_server::client::rr::Name;

/// Parse `name` as a fully qualified name.
pub(crate) fn fqdn(name: &str) -> Result<Name, ProtoError> {
    let mut name = Name::from_str(name)?;
    name.set_fqdn(true);
    Ok(name)
}
