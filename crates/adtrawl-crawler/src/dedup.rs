use std::collections::HashSet;

use adtrawl_core::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Rejected,
}

/// Identities already admitted during one crawl session.
#[derive(Debug, Default)]
pub struct IdentityDeduplicator {
    seen: HashSet<String>,
}

impl IdentityDeduplicator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits `record` if its identity has not been seen; remembers it on
    /// acceptance.
    pub fn admit(&mut self, record: &Record) -> Admission {
        if self.seen.insert(record.identity().to_owned()) {
            Admission::Accepted
        } else {
            tracing::debug!(identity = record.identity(), "duplicate identity rejected");
            Admission::Rejected
        }
    }

    #[must_use]
    pub fn contains(&self, identity: &str) -> bool {
        self.seen.contains(identity)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
