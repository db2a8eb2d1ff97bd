//! Installed-route set
//!
//! Tracks the routes this process believes it has pushed into the kernel.
//! Entries are only ever added one at a time and removed all at once.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::types::{InstalledRoute, RouteKey};

/// Routes installed by this process, keyed by (destination, prefix, metric)
#[derive(Debug, Default)]
pub struct InstalledRouteSet {
    routes: BTreeMap<RouteKey, InstalledRoute>,
}

impl InstalledRouteSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a route with this identity is tracked
    pub fn contains(&self, key: &RouteKey) -> bool {
        self.routes.contains_key(key)
    }

    /// Track a route. Returns false if the identity was already tracked,
    /// in which case the existing entry is kept.
    pub fn insert(&mut self, route: InstalledRoute) -> bool {
        match self.routes.entry(route.key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(route);
                true
            }
        }
    }

    /// Number of tracked routes
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Remove and return every tracked route in key order
    pub fn drain(&mut self) -> Vec<InstalledRoute> {
        std::mem::take(&mut self.routes).into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn route(dest: [u8; 4], prefix_len: u8, metric: u32, next_hop: [u8; 4]) -> InstalledRoute {
        InstalledRoute {
            key: RouteKey {
                destination: Ipv4Addr::from(dest),
                prefix_len,
                metric,
            },
            next_hop: Ipv4Addr::from(next_hop),
        }
    }

    #[test]
    fn test_insert_and_contains() {
        let mut set = InstalledRouteSet::new();
        let r = route([10, 0, 0, 0], 24, 2, [192, 168, 1, 1]);

        assert!(set.insert(r));
        assert!(set.contains(&r.key));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_duplicate_key_keeps_first_entry() {
        let mut set = InstalledRouteSet::new();
        let first = route([10, 0, 0, 0], 24, 2, [192, 168, 1, 1]);
        let second = route([10, 0, 0, 0], 24, 2, [192, 168, 1, 2]);

        assert!(set.insert(first));
        assert!(!set.insert(second));
        assert_eq!(set.len(), 1);
        assert_eq!(set.drain()[0].next_hop, Ipv4Addr::new(192, 168, 1, 1));
    }

    #[test]
    fn test_metric_is_part_of_identity() {
        let mut set = InstalledRouteSet::new();
        assert!(set.insert(route([10, 0, 0, 0], 24, 2, [192, 168, 1, 1])));
        assert!(set.insert(route([10, 0, 0, 0], 24, 3, [192, 168, 1, 1])));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_drain_empties_set() {
        let mut set = InstalledRouteSet::new();
        set.insert(route([10, 1, 0, 0], 16, 1, [192, 168, 1, 1]));
        set.insert(route([10, 0, 0, 0], 24, 1, [192, 168, 1, 1]));

        let drained = set.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].key.destination, Ipv4Addr::new(10, 0, 0, 0));
        assert!(set.is_empty());
        assert!(set.drain().is_empty());
    }
}
