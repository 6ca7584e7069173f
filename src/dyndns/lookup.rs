use crate::binding_store::DynBindingStore;
use crate::dyndns::{ZoneRoot, UNBOUND_LABEL};
use crate::resolver::{Candidate, Handler, Query, Response};
use std::sync::Arc;
use trust_dns_proto::rr::RecordType;

/// TTL of answers served from the binding store.
pub const BOUND_TTL: u32 = 3600;

/// Answers `A` queries for `<domain>.<root>` from the binding store.
pub struct DynamicLookup {
    root: Arc<ZoneRoot>,
    store: DynBindingStore,
}

impl DynamicLookup {
    pub fn new(root: Arc<ZoneRoot>, store: DynBindingStore) -> Self {
        Self { root, store }
    }
}

impl Handler for DynamicLookup {
    fn respond(&self, query: &Query) -> Option<Vec<Candidate>> {
        if query.rrtype != RecordType::A {
            return None;
        }
        let domain = match self.root.extra_labels(&query.name)?.as_slice() {
            [domain] => (*domain).to_string(),
            _ => return None,
        };

        let response = match self.store.get(&domain) {
            Some(address) => Response::a(address, BOUND_TTL),
            None => Response::cname(self.root.prefixed(UNBOUND_LABEL), 0),
        };
        Some(vec![response.authoritative().into()])
    }

    fn name(&self) -> &str {
        "dyndns-lookup"
    }
}
