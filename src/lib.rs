//! DynCrab
//!
//! A small programmable DNS server. Questions are answered by handlers bound to a record type
//! and name, or to every name, and anything no handler answers is forwarded upstream.
//!
//! On top of the [binding engine][resolver] sit:
//!
//! * static records, permanent addresses and banned names read from the [config];
//! * a [dynamic DNS zone][dyndns] whose clients update their own address with an authenticated
//!   DNS query, with no other protocol involved;
//! * a read-only [status API][api] listing the dynamic bindings.
//!
#![warn(clippy::pedantic)]

pub mod api;
pub mod binding_store;
pub mod config;
pub mod dns;
pub mod dyndns;
pub mod error;
pub mod resolver;

pub use api::new as new_http;
pub use binding_store::InMemoryBindingStore;
pub use config::{Config, Shared};
pub use dns::new as new_dns;
pub use resolver::{BindingRegistry, Engine, Query, ResolutionOutcome};
