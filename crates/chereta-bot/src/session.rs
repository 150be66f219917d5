//! Short-lived cache of summaries handed out in range replies, so a
//! follow-up detail request avoids a database round trip.

use std::collections::{HashMap, VecDeque};

use chereta_core::TenderSummary;

#[derive(Debug)]
pub struct SessionCache {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, TenderSummary>,
}

impl SessionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    /// Caches a summary, evicting the oldest entry once at capacity.
    /// Re-inserting an id refreshes its value but not its age.
    pub fn insert(&mut self, summary: TenderSummary) {
        if self.entries.insert(summary.id.clone(), summary.clone()).is_none() {
            self.order.push_back(summary.id);
            while self.order.len() > self.capacity {
                if let Some(evicted) = self.order.pop_front() {
                    self.entries.remove(&evicted);
                }
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&TenderSummary> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str) -> TenderSummary {
        TenderSummary {
            id: id.to_string(),
            title: id.to_string(),
            url: format!("https://tender.example.test/tenders/{id}"),
            bid_closing_date: None,
            bid_opening_date: None,
            published_on: None,
        }
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let mut cache = SessionCache::new(2);
        cache.insert(summary("a"));
        cache.insert(summary("b"));
        cache.insert(summary("c"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn reinsert_refreshes_value_without_growing() {
        let mut cache = SessionCache::new(2);
        cache.insert(summary("a"));
        let mut updated = summary("a");
        updated.title = "renamed".to_string();
        cache.insert(updated);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a").unwrap().title, "renamed");
    }
}
