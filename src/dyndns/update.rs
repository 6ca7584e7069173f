use crate::binding_store::DynBindingStore;
use crate::dyndns::{checksum, Clock, ZoneRoot, OK_LABEL};
use crate::resolver::{Candidate, Handler, Query, Response};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{debug, info};

/// Label marking an update command.
pub const CONFIGURE_LABEL: &str = "configure";
/// Largest accepted difference, in seconds, between a command's timestamp and the clock.
pub const MAX_CLOCK_SKEW: u64 = 60;

/// Why an update command was ignored. Only ever logged locally: on the wire every rejection
/// looks like a name nobody answers for.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
enum Rejection {
    #[error("no key for domain")]
    UnknownDomain,
    #[error("timestamp is not an integer")]
    MalformedTimestamp,
    #[error("timestamp is {0}s away from the clock")]
    ClockSkew(u64),
    #[error("checksum mismatch")]
    BadChecksum,
}

/// Applies `<checksum>.<timestamp>.configure.<domain>.<root>` commands to the binding store.
pub struct DynamicUpdate {
    root: Arc<ZoneRoot>,
    keys: HashMap<String, String>,
    store: DynBindingStore,
    clock: Arc<dyn Clock>,
}

impl DynamicUpdate {
    pub fn new(
        root: Arc<ZoneRoot>,
        keys: HashMap<String, String>,
        store: DynBindingStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let keys = keys
            .into_iter()
            .map(|(domain, secret)| (domain.to_ascii_lowercase(), secret))
            .collect();
        Self {
            root,
            keys,
            store,
            clock,
        }
    }

    fn authenticate(&self, domain: &str, timestamp: &str, sum: &str) -> Result<(), Rejection> {
        let secret = self.keys.get(domain).ok_or(Rejection::UnknownDomain)?;
        let issued: i64 = timestamp
            .parse()
            .map_err(|_| Rejection::MalformedTimestamp)?;
        let skew = self.clock.now().abs_diff(issued);
        if skew > MAX_CLOCK_SKEW {
            return Err(Rejection::ClockSkew(skew));
        }
        if !checksum(secret, timestamp).eq_ignore_ascii_case(sum) {
            return Err(Rejection::BadChecksum);
        }
        Ok(())
    }
}

impl Handler for DynamicUpdate {
    fn respond(&self, query: &Query) -> Option<Vec<Candidate>> {
        let (domain, timestamp, sum) = match self.root.extra_labels(&query.name)?.as_slice() {
            [domain, CONFIGURE_LABEL, timestamp, sum] => (*domain, *timestamp, *sum),
            _ => return None,
        };

        if let Err(rejection) = self.authenticate(domain, timestamp, sum) {
            debug!("ignored update for {domain} from {}: {rejection}", query.peer_address);
            return None;
        }

        let address = bare_address(&query.peer_address);
        info!("updated dynamic record for domain {domain} to {address}");
        self.store.set(domain, address);
        Some(vec![Response::cname(self.root.prefixed(OK_LABEL), 0).into()])
    }

    fn name(&self) -> &str {
        "dyndns-update"
    }
}

/// Strip the port from an `ip:port` peer address. Bracketed IPv6 socket addresses and bare IPv6
/// addresses are understood; anything else is cut at the first `:`.
fn bare_address(peer: &str) -> String {
    if let Ok(socket_addr) = peer.parse::<SocketAddr>() {
        return socket_addr.ip().to_string();
    }
    if peer.parse::<IpAddr>().is_ok() {
        return peer.to_string();
    }
    peer.split_once(':')
        .map_or(peer, |(host, _)| host)
        .to_string()
}
