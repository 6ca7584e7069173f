//! Error types.

use std::net::IpAddr;
use trust_dns_server::proto::error::ProtoError;

/// Error enumerates the possible dyncrab error states.
///
/// Resolution itself never fails: every query ends in a
/// [`ResolutionOutcome`][crate::resolver::ResolutionOutcome]. These errors come from startup
/// (configuration, binding registration, socket setup) and from the status API.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Returned when the [`BindingRegistry`][crate::resolver::BindingRegistry] is mutated after
    /// it has been frozen, or when startup parameters are malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Returned when the dynamic DNS zone root is empty or contains empty labels.
    #[error("invalid zone root: \"{0}\"")]
    InvalidZoneRoot(String),

    /// Returned when a configured binding names a record type other than A, AAAA or CNAME.
    #[error("unsupported binding type: \"{0}\"")]
    UnsupportedBindingType(String),

    /// Returned when a [`Config::permanent`][crate::config::Config::permanent] entry does not
    /// hold an IP address.
    #[error("invalid address \"{0}\" for \"{1}\"")]
    InvalidAddress(String, String),

    /// Returned when the [`Config::api_bind_addr`][crate::config::Config::api_bind_addr] is
    /// not a loopback address, or an address within a private network space. The status API
    /// exposes the addresses of every dynamic DNS client and is never meant to be public.
    #[error("API bind address ({0}) must be a loopback or private IP")]
    InsecureAPIBind(IpAddr),

    /// Returned by the [status API][crate::api] for a domain with no dynamic binding.
    #[error("no dynamic binding for \"{0}\"")]
    UnknownDomain(String),

    /// Returned when a generic IO error occurs.
    #[error("an IO error occurred")]
    IO(#[from] std::io::Error),

    /// Returned when [loading a `Config`][crate::config::Config::try_from_file] fails due to
    /// invalid JSON content.
    #[error("invalid JSON")]
    InvalidJSON(#[from] serde_json::Error),

    /// Returned when the DNS server encounters a generic DNS protocol error.
    #[error("DNS error")]
    DNSError(#[from] ProtoError),
}

impl Error {
    pub(crate) fn frozen() -> Self {
        Error::Configuration("cannot alter state after initialization".to_string())
    }
}
