//! Cache of upstream answers.
//!
//! Only escalated questions are cached. Local answers are computed on every query so dynamic
//! updates take effect immediately.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use trust_dns_server::client::rr::{Record, RecordType};

/// `(name, rrtype, rrclass)` of an escalated question. `name` is normalized.
pub type CacheKey = (String, RecordType, u16);

struct CachedAnswer {
    records: Vec<Record>,
    stored: Instant,
    expires: Instant,
}

/// Upstream answers kept until their smallest TTL runs out.
#[derive(Default)]
pub struct AnswerCache {
    entries: DashMap<CacheKey, CachedAnswer>,
}

impl AnswerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Vec<Record>> {
        self.get_at(key, Instant::now())
    }

    pub fn insert(&self, key: CacheKey, records: &[Record]) {
        self.insert_at(key, records, Instant::now());
    }

    /// The cached records with their TTLs reduced by the time spent in the cache.
    fn get_at(&self, key: &CacheKey, now: Instant) -> Option<Vec<Record>> {
        let records = {
            let entry = self.entries.get(key)?;
            if now < entry.expires {
                let elapsed = now.duration_since(entry.stored).as_secs();
                let elapsed = u32::try_from(elapsed).unwrap_or(u32::MAX);
                Some(
                    entry
                        .records
                        .iter()
                        .map(|record| {
                            let mut record = record.clone();
                            record.set_ttl(record.ttl().saturating_sub(elapsed));
                            record
                        })
                        .collect(),
                )
            } else {
                None
            }
        };
        if records.is_none() {
            self.entries.remove_if(key, |_, entry| now >= entry.expires);
        }
        records
    }

    /// Answers without records, or with a zero TTL, are not stored.
    fn insert_at(&self, key: CacheKey, records: &[Record], now: Instant) {
        let ttl = match records.iter().map(Record::ttl).min() {
            Some(ttl) if ttl > 0 => ttl,
            _ => return,
        };
        self.entries.insert(
            key,
            CachedAnswer {
                records: records.to_vec(),
                stored: now,
                expires: now + Duration::from_secs(u64::from(ttl)),
            },
        );
    }
}
