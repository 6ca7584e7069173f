use crate::binding_store::DynBindingStore;
use crate::dyndns::{self, Clock, ZoneRoot};
use crate::error::Error;
use crate::resolver::registry::{handler_fn, stub_handler, STUB_TTL};
use crate::resolver::{normalize_name, BindingRegistry, Candidate, Query, Response, StaticHandler};
use ipnetwork::IpNetwork;
use lazy_static::lazy_static;
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use trust_dns_proto::rr::RecordType;

pub type Shared = Arc<Config>;

/// Server configuration, read from a JSON file.
///
/// ```json
/// {
///   "dns_udp_bind_addrs": ["0.0.0.0:5353"],
///   "dns_tcp_bind_addrs": ["0.0.0.0:5353"],
///   "api_bind_addr": "127.0.0.1:3000",
///   "upstreams": ["1.1.1.1:53"],
///   "dyndns": {
///     "zone_root": "dyn.example.com",
///     "keys": { "home": "hunter2" }
///   },
///   "bindings": [
///     { "type": "A", "name": "example.net",
///       "records": [{ "type": "CNAME", "target": "example.com", "ttl": 100 }] }
///   ],
///   "permanent": { "nas.example.com": "192.168.1.10" },
///   "bans": ["ads.example.com"]
/// }
/// ```
#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default)]
    pub dns_udp_bind_addrs: Vec<SocketAddr>,
    #[serde(default)]
    pub dns_tcp_bind_addrs: Vec<SocketAddr>,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_dns_tcp_timeout")]
    pub dns_tcp_timeout: Duration,
    /// Address of the status API. The API is disabled when unset.
    pub api_bind_addr: Option<SocketAddr>,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_api_timeout")]
    pub api_timeout: Duration,
    /// Servers asked, in order, about names no binding answers.
    #[serde(default)]
    pub upstreams: Vec<SocketAddr>,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout: Duration,
    /// Maximum number of CNAMEs followed locally for one query.
    #[serde(default = "default_max_cname_depth")]
    pub max_cname_depth: u8,
    pub dyndns: Option<DynDnsConfig>,
    #[serde(default)]
    pub bindings: Vec<BindingConfig>,
    /// Names answered with a fixed address: A for IPv4, AAAA for IPv6. A name may appear once
    /// per address family.
    #[serde(default)]
    pub permanent: BTreeMap<String, String>,
    /// Names answered with `0.0.0.0`.
    #[serde(default)]
    pub bans: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DynDnsConfig {
    pub zone_root: String,
    /// Shared secret per managed subdomain label.
    pub keys: HashMap<String, String>,
}

/// A named binding answering with loose JSON records. See
/// [`validate`][crate::resolver::validate] for the record format.
#[derive(Deserialize, Debug, Clone)]
pub struct BindingConfig {
    #[serde(rename = "type")]
    pub rrtype: String,
    pub name: String,
    pub records: Vec<serde_json::Value>,
}

fn default_dns_tcp_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_api_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_upstream_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_max_cname_depth() -> u8 {
    8
}

lazy_static! {
    // NOTE(XXX): Once the "ip" feature has stabilized we can use Ipv6Addr.is_unique_local[0].
    //            Presently this feature is unstable so we home-roll. See also RFC 4193[1].
    // [0]: https://doc.rust-lang.org/std/net/struct.Ipv6Addr.html#method.is_unique_local
    // [1]: https://www.rfc-editor.org/rfc/rfc4193.html
    static ref IPV6_UNIQUE_LOCAL_NETWORK: IpNetwork = IpNetwork::from_str("fc00::/7").unwrap();
}

impl Config {
    /// Load and check a config file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] or [`Error::InvalidJSON`] when the file can't be read or parsed,
    /// and the errors of [`Config::check`] when its contents are unusable.
    pub fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        let f = File::open(p)?;
        let reader = BufReader::new(f);
        let conf: Config = serde_json::from_reader(reader)?;
        conf.check()?;
        Ok(conf)
    }

    /// # Errors
    ///
    /// See [`Config::try_from_file`].
    pub fn try_from_str(s: &str) -> Result<Self, Error> {
        let conf: Config = serde_json::from_str(s)?;
        conf.check()?;
        Ok(conf)
    }

    /// Reject configurations that can't serve anything, or that would expose the status API.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] without any listen address, and
    /// [`Error::InsecureAPIBind`] for a public API bind address.
    pub fn check(&self) -> Result<(), Error> {
        if self.dns_udp_bind_addrs.is_empty() && self.dns_tcp_bind_addrs.is_empty() {
            return Err(Error::Configuration(
                "at least one DNS bind address is required".to_string(),
            ));
        }
        self.bind_addr_is_secure()
    }

    pub fn upstream_configured(&self) -> bool {
        !self.upstreams.is_empty()
    }

    /// Build the binding registry described by this config, still open for registration.
    ///
    /// Named bindings are registered first, then permanent addresses, then bans, so a ban
    /// overrides any other binding for the same name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedBindingType`], [`Error::InvalidAddress`] or
    /// [`Error::InvalidZoneRoot`] for malformed entries, and [`Error::Configuration`] for a
    /// permanent name given twice for the same address family.
    pub fn registry(
        &self,
        store: DynBindingStore,
        clock: Arc<dyn Clock>,
    ) -> Result<BindingRegistry, Error> {
        let mut registry = BindingRegistry::new();

        for binding in &self.bindings {
            let rrtype = binding_type(&binding.rrtype)?;
            let handler = StaticHandler::new(
                format!("{} {}", binding.rrtype, binding.name),
                binding.records.clone(),
            );
            registry.register(rrtype, &binding.name, handler)?;
        }

        let mut permanent_names = HashSet::new();
        for (name, address) in &self.permanent {
            let ip: IpAddr = address
                .parse()
                .map_err(|_| Error::InvalidAddress(address.clone(), name.clone()))?;
            let (rrtype, response) = match ip {
                IpAddr::V4(_) => (RecordType::A, Response::a(address, STUB_TTL)),
                IpAddr::V6(_) => (RecordType::AAAA, Response::aaaa(address, STUB_TTL)),
            };
            if !permanent_names.insert((rrtype, normalize_name(name))) {
                return Err(Error::Configuration(format!(
                    "permanent {rrtype} address for {name} is configured twice"
                )));
            }
            let handler = handler_fn(format!("permanent {name}"), move |_: &Query| {
                Some(vec![Candidate::from(response.clone())])
            });
            registry.register(rrtype, name, handler)?;
        }

        for name in &self.bans {
            registry.register(RecordType::A, name, stub_handler())?;
        }

        if let Some(zone) = &self.dyndns {
            let root: ZoneRoot = zone.zone_root.parse()?;
            dyndns::install(&mut registry, root, zone.keys.clone(), store, clock)?;
        }

        Ok(registry)
    }

    fn bind_addr_is_secure(&self) -> Result<(), Error> {
        match self.api_bind_addr {
            None => Ok(()),
            Some(SocketAddr::V4(v4_addr)) => {
                let ip = v4_addr.ip();
                if !ip.is_loopback() && !ip.is_private() {
                    return Err(Error::InsecureAPIBind(IpAddr::V4(*ip)));
                }
                Ok(())
            }
            Some(SocketAddr::V6(v6_addr)) => {
                let ip = v6_addr.ip();
                if !ip.is_loopback() && !IPV6_UNIQUE_LOCAL_NETWORK.contains(IpAddr::V6(*ip)) {
                    return Err(Error::InsecureAPIBind(IpAddr::V6(*ip)));
                }
                Ok(())
            }
        }
    }
}

fn binding_type(rrtype: &str) -> Result<RecordType, Error> {
    match RecordType::from_str(&rrtype.to_ascii_uppercase()) {
        Ok(rrtype @ (RecordType::A | RecordType::AAAA | RecordType::CNAME)) => Ok(rrtype),
        _ => Err(Error::UnsupportedBindingType(rrtype.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding_store::InMemoryBindingStore;
    use crate::dyndns::SystemClock;
    use crate::resolver::{Engine, ResolutionOutcome};

    const CONFIG: &str = r#"{
        "dns_udp_bind_addrs": ["127.0.0.1:5353"],
        "api_bind_addr": "10.0.0.1:3000",
        "upstreams": ["1.1.1.1:53"],
        "dyndns": { "zone_root": "dyn.domain.tld", "keys": { "subdomain": "secret_key1" } },
        "bindings": [
            { "type": "A", "name": "example.net",
              "records": [{ "type": "CNAME", "target": "example.com", "ttl": 100 }] },
            { "type": "cname", "name": "alias.example.com",
              "records": [{ "type": "CNAME", "target": "example.net", "ttl": 60 }] }
        ],
        "permanent": { "example.com": "93.184.216.34", "v6.example.com": "2001:db8::1" },
        "bans": ["ads.example.com"]
    }"#;

    fn resolve(config: &Config, name: &str, rrtype: RecordType) -> ResolutionOutcome {
        let store = Arc::new(InMemoryBindingStore::new());
        let mut registry = config.registry(store, Arc::new(SystemClock)).unwrap();
        let engine = Engine::new(registry.freeze(), config.upstream_configured());
        engine.resolve(
            &Query::new(name, rrtype, 1, "127.0.0.1:1000", "127.0.0.1:5353"),
            config.max_cname_depth,
        )
    }

    #[test]
    fn parses_with_defaults() {
        let config = Config::try_from_str(CONFIG).unwrap();
        assert_eq!(config.dns_tcp_timeout, Duration::from_secs(10));
        assert_eq!(config.upstream_timeout, Duration::from_secs(5));
        assert_eq!(config.max_cname_depth, 8);
        assert!(config.dns_tcp_bind_addrs.is_empty());
        assert!(config.upstream_configured());
    }

    #[test]
    fn builds_bindings() {
        let config = Config::try_from_str(CONFIG).unwrap();

        assert_eq!(
            resolve(&config, "example.net", RecordType::A),
            ResolutionOutcome::Answered(vec![
                Response::cname("example.com", 100),
                Response::a("93.184.216.34", STUB_TTL),
            ])
        );
        assert_eq!(
            resolve(&config, "v6.example.com", RecordType::AAAA),
            ResolutionOutcome::Answered(vec![Response::aaaa("2001:db8::1", STUB_TTL)])
        );
        assert_eq!(
            resolve(&config, "ads.example.com", RecordType::A),
            ResolutionOutcome::Answered(vec![crate::resolver::stub()])
        );
        assert_eq!(
            resolve(&config, "subdomain.dyn.domain.tld", RecordType::A),
            ResolutionOutcome::Answered(vec![
                Response::cname("unbound.dyn.domain.tld", 0).authoritative(),
                crate::resolver::stub(),
            ])
        );
        assert_eq!(
            resolve(&config, "elsewhere.example", RecordType::A),
            ResolutionOutcome::Escalate {
                name: "elsewhere.example".to_string(),
                rrtype: RecordType::A,
                rrclass: 1,
            }
        );
    }

    #[test]
    fn rejects_bad_entries() {
        let store: DynBindingStore = Arc::new(InMemoryBindingStore::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let mut config = Config::try_from_str(CONFIG).unwrap();
        config.bindings[0].rrtype = "TXT".to_string();
        assert!(matches!(
            config.registry(store.clone(), clock.clone()),
            Err(Error::UnsupportedBindingType(t)) if t == "TXT"
        ));

        let mut config = Config::try_from_str(CONFIG).unwrap();
        config
            .permanent
            .insert("bad.example.com".to_string(), "not-an-ip".to_string());
        assert!(matches!(
            config.registry(store.clone(), clock.clone()),
            Err(Error::InvalidAddress(..))
        ));

        let mut config = Config::try_from_str(CONFIG).unwrap();
        if let Some(dyndns) = config.dyndns.as_mut() {
            dyndns.zone_root = String::new();
        }
        assert!(matches!(
            config.registry(store, clock),
            Err(Error::InvalidZoneRoot(_))
        ));
    }

    #[test]
    fn rejects_duplicate_permanent_names() {
        let store: DynBindingStore = Arc::new(InMemoryBindingStore::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let mut config = Config::try_from_str(CONFIG).unwrap();
        config
            .permanent
            .insert("Example.COM.".to_string(), "192.0.2.1".to_string());
        assert!(matches!(
            config.registry(store.clone(), clock.clone()),
            Err(Error::Configuration(msg)) if msg.contains("configured twice")
        ));

        let mut config = Config::try_from_str(CONFIG).unwrap();
        config
            .permanent
            .insert("Example.COM.".to_string(), "2001:db8::2".to_string());
        assert!(config.registry(store, clock).is_ok());
    }

    #[test]
    fn rejects_public_api_bind() {
        let public = CONFIG.replace("10.0.0.1:3000", "8.8.8.8:3000");
        assert!(matches!(
            Config::try_from_str(&public),
            Err(Error::InsecureAPIBind(_))
        ));

        let ula = CONFIG.replace("10.0.0.1:3000", "[fd00::1]:3000");
        assert!(Config::try_from_str(&ula).is_ok());
    }

    #[test]
    fn requires_a_listener() {
        assert!(matches!(
            Config::try_from_str("{}"),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            Config::try_from_str("{\"dns_udp_bind_addrs\": 53}"),
            Err(Error::InvalidJSON(_))
        ));
    }
}
