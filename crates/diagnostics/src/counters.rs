use std::collections::BTreeMap;

pub const RECONCILE_COLLISIONS: &str = "reconcile.collisions";
pub const RECONCILE_UNMATCHED_RECORDS: &str = "reconcile.unmatched_records";
pub const RECONCILE_FEATURES_WITHOUT_DATA: &str = "reconcile.features_without_data";
pub const STALE_RESPONSES: &str = "requests.stale";
pub const STYLE_SKIPPED_MUTATIONS: &str = "style.skipped_mutations";
pub const MARKERS_WITHOUT_COORDINATES: &str = "markers.without_coordinates";

/// Named monotonic counters.
///
/// Backed by a `BTreeMap` so snapshots come out sorted by name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Counters {
    values: BTreeMap<String, u64>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> u64 {
        self.values.get(name).copied().unwrap_or(0)
    }

    pub fn add(&mut self, name: &str, by: u64) {
        if by == 0 {
            return;
        }
        *self.values.entry(name.to_string()).or_insert(0) += by;
    }

    pub fn inc(&mut self, name: &str) {
        self.add(name, 1);
    }

    pub fn snapshot(&self) -> Vec<(String, u64)> {
        self.values.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Counters, RECONCILE_COLLISIONS, STALE_RESPONSES};

    #[test]
    fn accumulates_and_ignores_zero() {
        let mut c = Counters::new();
        c.inc(STALE_RESPONSES);
        c.add(STALE_RESPONSES, 2);
        c.add(RECONCILE_COLLISIONS, 0);
        assert_eq!(c.get(STALE_RESPONSES), 3);
        assert_eq!(c.get(RECONCILE_COLLISIONS), 0);
        assert_eq!(c.snapshot(), vec![(STALE_RESPONSES.to_string(), 3)]);
    }

    #[test]
    fn snapshot_is_sorted() {
        let mut c = Counters::new();
        c.inc("b");
        c.inc("a");
        let names: Vec<String> = c.snapshot().into_iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }
}
