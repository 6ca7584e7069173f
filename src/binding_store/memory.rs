use crate::binding_store::BindingStore;
use dashmap::DashMap;
use std::collections::BTreeMap;

/// Sharded in-memory binding store. Writers for different domains never contend on the same
/// lock.
#[derive(Default, Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct InMemoryBindingStore {
    bindings: DashMap<String, String>,
}

impl InMemoryBindingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BindingStore for InMemoryBindingStore {
    fn get(&self, domain: &str) -> Option<String> {
        self.bindings.get(domain).map(|entry| entry.value().clone())
    }

    fn set(&self, domain: &str, address: String) {
        self.bindings.insert(domain.to_string(), address);
    }

    fn snapshot(&self) -> BTreeMap<String, String> {
        self.bindings
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn last_write_wins() {
        let store = InMemoryBindingStore::new();
        assert_eq!(store.get("home"), None);

        store.set("home", "192.0.2.1".to_string());
        store.set("home", "192.0.2.2".to_string());
        store.set("office", "198.51.100.7".to_string());

        assert_eq!(store.get("home"), Some("192.0.2.2".to_string()));
        assert_eq!(
            store.snapshot().into_iter().collect::<Vec<_>>(),
            vec![
                ("home".to_string(), "192.0.2.2".to_string()),
                ("office".to_string(), "198.51.100.7".to_string()),
            ]
        );
    }

    #[test]
    fn concurrent_writers_on_distinct_keys() {
        let store = Arc::new(InMemoryBindingStore::new());
        let writers: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || {
                    for n in 0..100 {
                        store.set(&format!("host{i}"), format!("10.0.{i}.{n}"));
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 8);
        assert_eq!(snapshot["host3"], "10.0.3.99");
    }
}
