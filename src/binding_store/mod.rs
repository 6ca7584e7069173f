//! Dynamic binding storage.
//!
//! Holds the address last reported by each dynamic DNS client, keyed by the subdomain label it
//! manages. Entries are written by the [update handler][crate::dyndns::DynamicUpdate] and read
//! by the [lookup handler][crate::dyndns::DynamicLookup] and the [status API][crate::api].
//!
//! Only an in-memory implementation, [`memory::InMemoryBindingStore`], is provided. Bindings
//! are not durable across restarts: clients are expected to re-announce themselves.

use std::collections::BTreeMap;
use std::sync::Arc;

pub mod memory;

#[allow(clippy::module_name_repetitions)]
pub use memory::InMemoryBindingStore;

/// `DynBindingStore` is a type alias for a [`BindingStore`] shared between resolving queries
/// and the status API. Implementations synchronize internally, per key.
#[allow(clippy::module_name_repetitions)]
pub type DynBindingStore = Arc<dyn BindingStore + Send + Sync>;

/// Keyed storage of dynamic bindings with last-write-wins semantics per domain.
#[allow(clippy::module_name_repetitions)]
pub trait BindingStore {
    /// Get the address bound to `domain` (if any).
    fn get(&self, domain: &str) -> Option<String>;

    /// Bind `domain` to `address`, replacing any previous address.
    fn set(&self, domain: &str, address: String);

    /// A point-in-time copy of every binding, ordered by domain.
    fn snapshot(&self) -> BTreeMap<String, String>;
}
