//! Pending asset loads keyed by owning node

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::handle::{LoadRequest, LoadTicket, LoadToken};
use super::path::AssetPath;
use crate::scene::{GameObject, tree};

/// Tracks in-flight loads so that deleting a node cancels them
#[derive(Debug, Default)]
pub struct PendingLoads {
    by_node: FxHashMap<String, Vec<LoadTicket>>,
}

impl PendingLoads {
    /// Create an empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or join) a load of `path` for `node_id`
    pub fn request(&mut self, node_id: &str, path: &AssetPath) -> LoadToken {
        let tickets = self.by_node.entry(node_id.to_string()).or_default();
        if let Some(existing) = tickets.iter().find(|t| &t.request().path == path) {
            return existing.token();
        }

        let ticket = LoadTicket::new(LoadRequest {
            node_id: node_id.to_string(),
            path: path.clone(),
        });
        let token = ticket.token();
        tickets.push(ticket);
        token
    }

    /// Mark a load finished. Returns false if it had been cancelled.
    pub fn complete(&mut self, token: &LoadToken) -> bool {
        let Some(request) = token.request() else {
            return false;
        };
        let Some(tickets) = self.by_node.get_mut(&request.node_id) else {
            return false;
        };
        let before = tickets.len();
        tickets.retain(|t| t.id() != token.id());
        let removed = tickets.len() != before;
        if tickets.is_empty() {
            self.by_node.remove(&request.node_id);
        }
        removed
    }

    /// Cancel every load owned by `node_id`
    pub fn cancel_node(&mut self, node_id: &str) -> usize {
        self.by_node.remove(node_id).map_or(0, |tickets| tickets.len())
    }

    /// Cancel loads whose node no longer exists in `root`
    pub fn retain_live(&mut self, root: &Arc<GameObject>) -> usize {
        let live: FxHashSet<String> = tree::collect_ids(root).into_iter().collect();
        self.retain_requests(|node_id, _| live.contains(node_id))
    }

    /// Cancel every load for which `keep(node_id, path)` is false
    pub fn retain_requests<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&str, &AssetPath) -> bool,
    {
        let mut cancelled = 0;
        self.by_node.retain(|node_id, tickets| {
            tickets.retain(|ticket| {
                let path = &ticket.request().path;
                if keep(node_id, path) {
                    true
                } else {
                    log::debug!("Cancelling load of '{path}' for node '{node_id}'");
                    cancelled += 1;
                    false
                }
            });
            !tickets.is_empty()
        });
        cancelled
    }

    /// Number of loads still in flight
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.by_node.values().map(Vec::len).sum()
    }

    /// Check if nothing is in flight
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> AssetPath {
        AssetPath::parse(p, "public").unwrap()
    }

    #[test]
    fn test_request_deduplicates_per_node() {
        let mut loads = PendingLoads::new();
        let a = loads.request("tree", &path("/models/tree.glb"));
        let b = loads.request("tree", &path("/models/tree.glb"));
        assert_eq!(a, b);
        assert_eq!(loads.pending_count(), 1);
    }

    #[test]
    fn test_complete() {
        let mut loads = PendingLoads::new();
        let token = loads.request("tree", &path("/models/tree.glb"));
        assert!(loads.complete(&token));
        assert!(loads.is_empty());
        assert!(token.is_cancelled());
        assert!(!loads.complete(&token));
    }

    #[test]
    fn test_deleted_node_cancels_load() {
        let mut loads = PendingLoads::new();
        let kept = loads.request("kept", &path("/a.glb"));
        let gone = loads.request("gone", &path("/b.glb"));

        let root = GameObject::new("root")
            .with_child(GameObject::new("kept"))
            .into_shared();
        assert_eq!(loads.retain_live(&root), 1);

        assert!(!kept.is_cancelled());
        assert!(gone.is_cancelled());
        assert_eq!(loads.cancel_node("kept"), 1);
        assert!(kept.is_cancelled());
    }

    #[test]
    fn test_retain_requests_drops_stale_paths() {
        let mut loads = PendingLoads::new();
        let old = loads.request("tree", &path("/models/oak.glb"));
        let other = loads.request("rock", &path("/models/rock.glb"));

        let current = path("/models/pine.glb");
        let cancelled = loads.retain_requests(|node_id, p| node_id != "tree" || p == &current);
        assert_eq!(cancelled, 1);
        assert!(old.is_cancelled());
        assert!(!other.is_cancelled());
        assert_eq!(loads.pending_count(), 1);
    }
}
