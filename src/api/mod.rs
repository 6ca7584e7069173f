//! Read-only HTTP status API for the dynamic DNS zone.
//!
//! Bindings are only ever changed over DNS (see [`crate::dyndns`]). The API lets operators see
//! what the server currently answers. It is disabled unless
//! [`Config::api_bind_addr`][crate::config::Config::api_bind_addr] is set, and must be bound to
//! a loopback or private address.
//!
//! # API Endpoints
//!
//! ## `/healthcheck` (GET)
//!
//!   Returns HTTP 200 (OK) and the JSON body `{"ok":"healthy"}` when the service is operational.
//!
//! ## `/dyndns` (GET)
//!
//!   Returns HTTP 200 (OK) and a JSON object mapping every bound domain to its address:
//!
//!   ```json
//!   { "home": "203.0.113.7", "office": "2001:db8::1" }
//!   ```
//!
//! ## `/dyndns/:domain` (GET)
//!
//!   Returns HTTP 200 (OK) and a JSON body of the form:
//!
//!   ```json
//!   { "domain": "home", "address": "203.0.113.7" }
//!   ```
//!
//!   Returns HTTP 404 (Not Found) when `domain` has no binding.

mod api_error;
mod model;
mod routes;
pub mod server;

pub use server::new;
