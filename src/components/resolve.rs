//! Resolution pass: scene tree to materialized components
//!
//! [`SceneResolver`] keeps the resolved form of every node keyed by the
//! identity of the source node. Unchanged subtrees (same `Arc`, same registry
//! generation) come back as the very same resolved `Arc`, which lets the
//! presentation layer skip them by pointer comparison.

use std::sync::Arc;

use glam::Mat4;
use rustc_hash::FxHashMap;

use super::props::{
    Component, CustomComponent, GeometryProps, MaterialProps, ModelProps, PhysicsProps, TextProps,
    TransformProps,
};
use super::registry::{ComponentRegistry, ResolveIssue};
use crate::scene::GameObject;

/// A non-fatal problem found while resolving one component entry
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveWarning {
    pub node_id: String,
    /// Key of the component entry on the node
    pub component_key: String,
    pub issue: ResolveIssue,
}

impl std::fmt::Display for ResolveWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "node '{}', component '{}': {}",
            self.node_id, self.component_key, self.issue
        )
    }
}

/// A materialized component together with its key on the node
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedComponent {
    pub key: String,
    pub component: Component,
}

/// Resolved form of one [`GameObject`]
#[derive(Debug)]
pub struct ResolvedNode {
    pub id: String,
    pub disabled: bool,
    pub hidden: bool,
    /// Components that resolved, in key order
    pub components: Vec<ResolvedComponent>,
    /// Entries that were skipped, with the reason
    pub warnings: Vec<ResolveWarning>,
    pub children: Vec<Arc<ResolvedNode>>,
    source: Arc<GameObject>,
}

impl ResolvedNode {
    /// The node this was resolved from
    #[must_use]
    pub fn source(&self) -> &Arc<GameObject> {
        &self.source
    }

    fn first<'a, T>(&'a self, pick: impl Fn(&'a Component) -> Option<&'a T>) -> Option<&'a T> {
        self.components.iter().find_map(|c| pick(&c.component))
    }

    /// Local transform, identity when the node has none
    #[must_use]
    pub fn transform(&self) -> TransformProps {
        self.transform_component().copied().unwrap_or_default()
    }

    /// The Transform component, if present and valid
    #[must_use]
    pub fn transform_component(&self) -> Option<&TransformProps> {
        self.first(|c| match c {
            Component::Transform(t) => Some(t),
            _ => None,
        })
    }

    #[must_use]
    pub fn geometry(&self) -> Option<&GeometryProps> {
        self.first(|c| match c {
            Component::Geometry(g) => Some(g),
            _ => None,
        })
    }

    #[must_use]
    pub fn material(&self) -> Option<&MaterialProps> {
        self.first(|c| match c {
            Component::Material(m) => Some(m),
            _ => None,
        })
    }

    #[must_use]
    pub fn physics(&self) -> Option<&PhysicsProps> {
        self.first(|c| match c {
            Component::Physics(p) => Some(p),
            _ => None,
        })
    }

    #[must_use]
    pub fn model(&self) -> Option<&ModelProps> {
        self.first(|c| match c {
            Component::Model(m) => Some(m),
            _ => None,
        })
    }

    #[must_use]
    pub fn text(&self) -> Option<&TextProps> {
        self.first(|c| match c {
            Component::Text(t) => Some(t),
            _ => None,
        })
    }

    /// First custom component of the given type
    #[must_use]
    pub fn custom(&self, type_name: &str) -> Option<&CustomComponent> {
        self.first(|c| match c {
            Component::Custom(custom) if custom.type_name == type_name => Some(custom),
            _ => None,
        })
    }

    /// Light components on this node
    pub fn lights(&self) -> impl Iterator<Item = &Component> {
        self.components
            .iter()
            .map(|c| &c.component)
            .filter(|c| c.is_light())
    }

    /// Check if the entry of this type was skipped because it did not resolve
    #[must_use]
    pub fn has_invalid(&self, type_name: &str) -> bool {
        self.warnings.iter().any(|w| {
            matches!(&w.issue, ResolveIssue::InvalidProperties { type_name: t, .. } if t == type_name)
        })
    }

    /// Depth-first visit with world matrices. `visit` returns false to prune.
    pub fn walk_world<V>(self: &Arc<Self>, parent: Mat4, visit: &mut V)
    where
        V: FnMut(&Arc<ResolvedNode>, Mat4) -> bool,
    {
        let world = parent * self.transform().matrix();
        if !visit(self, world) {
            return;
        }
        for child in &self.children {
            child.walk_world(world, visit);
        }
    }
}

/// Depth-first search, children visited in order
#[must_use]
pub fn find_resolved<'a>(node: &'a Arc<ResolvedNode>, id: &str) -> Option<&'a Arc<ResolvedNode>> {
    if node.id == id {
        return Some(node);
    }
    node.children.iter().find_map(|child| find_resolved(child, id))
}

/// Output of one resolution pass
#[derive(Debug, Clone)]
pub struct ResolvedScene {
    pub root: Arc<ResolvedNode>,
    /// Registry generation the scene was resolved against
    pub generation: u64,
}

impl ResolvedScene {
    /// Look up a resolved node by id
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Arc<ResolvedNode>> {
        find_resolved(&self.root, id)
    }

    /// Every warning in the scene, pre-order
    #[must_use]
    pub fn warnings(&self) -> Vec<&ResolveWarning> {
        fn collect<'a>(node: &'a ResolvedNode, out: &mut Vec<&'a ResolveWarning>) {
            out.extend(node.warnings.iter());
            for child in &node.children {
                collect(child, out);
            }
        }
        let mut out = Vec::new();
        collect(&self.root, &mut out);
        out
    }
}

struct CacheEntry {
    /// Keeps the keyed allocation alive so its address cannot be reused
    source: Arc<GameObject>,
    resolved: Arc<ResolvedNode>,
}

/// Counters of the last pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    /// Nodes resolved from scratch
    pub resolved: usize,
    /// Subtrees taken from the cache
    pub reused: usize,
}

/// Incremental resolver with identity caching
#[derive(Default)]
pub struct SceneResolver {
    cache: FxHashMap<usize, CacheEntry>,
    generation: Option<u64>,
    stats: ResolveStats,
}

fn key_of(node: &Arc<GameObject>) -> usize {
    Arc::as_ptr(node) as usize
}

impl SceneResolver {
    /// Create a resolver with an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a tree, reusing every subtree that did not change
    pub fn resolve(&mut self, root: &Arc<GameObject>, registry: &ComponentRegistry) -> ResolvedScene {
        let generation = registry.generation();
        if self.generation != Some(generation) {
            if !self.cache.is_empty() {
                log::debug!("Component registry changed, dropping {} cached nodes", self.cache.len());
            }
            self.cache.clear();
            self.generation = Some(generation);
        }

        self.stats = ResolveStats::default();
        let mut next = FxHashMap::default();
        let root = self.resolve_node(root, registry, &mut next);
        self.cache = next;

        ResolvedScene { root, generation }
    }

    /// Counters of the last pass
    #[must_use]
    pub fn stats(&self) -> ResolveStats {
        self.stats
    }

    /// Number of cached nodes
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Drop the cache
    pub fn clear(&mut self) {
        self.cache.clear();
        self.generation = None;
    }

    fn resolve_node(
        &mut self,
        node: &Arc<GameObject>,
        registry: &ComponentRegistry,
        next: &mut FxHashMap<usize, CacheEntry>,
    ) -> Arc<ResolvedNode> {
        let key = key_of(node);
        if let Some(entry) = next.get(&key) {
            return Arc::clone(&entry.resolved);
        }
        if let Some(entry) = self.cache.remove(&key) {
            self.stats.reused += 1;
            let resolved = Arc::clone(&entry.resolved);
            self.carry_descendants(&resolved, next);
            next.insert(key, entry);
            return resolved;
        }

        let children: Vec<_> = node
            .children
            .iter()
            .map(|child| self.resolve_node(child, registry, next))
            .collect();

        let mut components = Vec::with_capacity(node.components.len());
        let mut warnings = Vec::new();
        // one entry per type name; the first key in order wins
        let mut seen: FxHashMap<&str, &str> = FxHashMap::default();
        for (key, entry) in &node.components {
            let result = if let Some(kept) = seen.get(entry.type_name.as_str()) {
                Err(ResolveIssue::DuplicateType {
                    type_name: entry.type_name.clone(),
                    kept_key: (*kept).to_string(),
                })
            } else if node.children.is_empty() || registry.is_composable(&entry.type_name) {
                seen.insert(&entry.type_name, key);
                registry.resolve(entry)
            } else {
                Err(ResolveIssue::NonComposable(entry.type_name.clone()))
            };
            match result {
                Ok(component) => components.push(ResolvedComponent {
                    key: key.clone(),
                    component,
                }),
                Err(issue) => {
                    let warning = ResolveWarning {
                        node_id: node.id.clone(),
                        component_key: key.clone(),
                        issue,
                    };
                    log::warn!("Skipping component: {warning}");
                    warnings.push(warning);
                }
            }
        }

        self.stats.resolved += 1;
        let resolved = Arc::new(ResolvedNode {
            id: node.id.clone(),
            disabled: node.disabled,
            hidden: node.hidden,
            components,
            warnings,
            children,
            source: Arc::clone(node),
        });
        next.insert(
            key,
            CacheEntry {
                source: Arc::clone(node),
                resolved: Arc::clone(&resolved),
            },
        );
        resolved
    }

    /// Move cache entries of a reused subtree into the next cache
    fn carry_descendants(&mut self, resolved: &ResolvedNode, next: &mut FxHashMap<usize, CacheEntry>) {
        for child in &resolved.children {
            let key = key_of(&child.source);
            if let Some(entry) = self.cache.remove(&key) {
                next.insert(key, entry);
            }
            self.carry_descendants(child, next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ComponentType;
    use crate::scene::{ComponentEntry, update_node_by_id};
    use serde_json::json;

    fn transform(x: f32) -> ComponentEntry {
        ComponentEntry::new("Transform").with_property("position", json!([x, 0.0, 0.0]))
    }

    fn scene() -> Arc<GameObject> {
        GameObject::new("scene")
            .with_child(
                GameObject::new("left")
                    .with_component("transform", transform(1.0))
                    .with_child(GameObject::new("left-leaf").with_component("transform", transform(2.0))),
            )
            .with_child(
                GameObject::new("right")
                    .with_component("transform", transform(-1.0))
                    .with_component("mystery", ComponentEntry::new("Hologram")),
            )
            .into_shared()
    }

    #[test]
    fn test_resolve_components_and_warnings() {
        let registry = ComponentRegistry::with_builtins();
        let mut resolver = SceneResolver::new();
        let resolved = resolver.resolve(&scene(), &registry);

        let right = resolved.find("right").unwrap();
        assert_eq!(right.transform().position, [-1.0, 0.0, 0.0]);
        assert_eq!(right.components.len(), 1);
        assert_eq!(right.warnings.len(), 1);
        assert_eq!(right.warnings[0].issue, ResolveIssue::UnknownType("Hologram".to_string()));

        // unknown entry still on the source node
        assert!(right.source().components.contains_key("mystery"));
        assert_eq!(resolved.warnings().len(), 1);
        assert_eq!(resolver.stats().resolved, 4);
    }

    #[test]
    fn test_unchanged_subtrees_reused() {
        let registry = ComponentRegistry::with_builtins();
        let mut resolver = SceneResolver::new();
        let root = scene();
        let first = resolver.resolve(&root, &registry);

        let edited = update_node_by_id(&root, "right", |n| {
            Arc::new(GameObject {
                hidden: true,
                ..(**n).clone()
            })
        });
        let second = resolver.resolve(&edited, &registry);

        assert!(!Arc::ptr_eq(&first.root, &second.root));
        assert!(Arc::ptr_eq(first.find("left").unwrap(), second.find("left").unwrap()));
        assert!(Arc::ptr_eq(
            first.find("left-leaf").unwrap(),
            second.find("left-leaf").unwrap()
        ));
        assert!(second.find("right").unwrap().hidden);
        assert_eq!(resolver.stats(), ResolveStats { resolved: 2, reused: 1 });

        // descendants of a reused subtree stay cached for the pass after
        let third = update_node_by_id(&edited, "left", |n| {
            Arc::new(GameObject {
                disabled: true,
                ..(**n).clone()
            })
        });
        let third = resolver.resolve(&third, &registry);
        assert!(Arc::ptr_eq(
            first.find("left-leaf").unwrap(),
            third.find("left-leaf").unwrap()
        ));
        assert_eq!(resolver.cached_len(), 4);
    }

    #[test]
    fn test_registry_change_invalidates_on_next_pass() {
        let mut registry = ComponentRegistry::with_builtins();
        let mut resolver = SceneResolver::new();
        let root = GameObject::new("scene")
            .with_component("spin", ComponentEntry::new("Spin"))
            .into_shared();

        let before = resolver.resolve(&root, &registry);
        assert_eq!(before.root.warnings.len(), 1);

        registry.register(ComponentType::new("Spin").with_default("speed", 1));
        // previously resolved nodes are untouched
        assert_eq!(before.root.warnings.len(), 1);

        let after = resolver.resolve(&root, &registry);
        assert!(after.root.warnings.is_empty());
        assert_eq!(after.root.custom("Spin").unwrap().number("speed"), Some(1.0));
    }

    #[test]
    fn test_text_with_children_not_composed() {
        let registry = ComponentRegistry::with_builtins();
        let root = GameObject::new("label")
            .with_component("text", ComponentEntry::new("Text").with_property("text", json!("hi")))
            .with_child(GameObject::new("child"))
            .into_shared();
        let resolved = SceneResolver::new().resolve(&root, &registry);
        assert!(resolved.root.text().is_none());
        assert_eq!(
            resolved.root.warnings[0].issue,
            ResolveIssue::NonComposable("Text".to_string())
        );

        let leaf = GameObject::new("label")
            .with_component("text", ComponentEntry::new("Text").with_property("text", json!("hi")))
            .into_shared();
        let resolved = SceneResolver::new().resolve(&leaf, &registry);
        assert_eq!(resolved.root.text().unwrap().text, "hi");
    }

    #[test]
    fn test_duplicate_type_reported() {
        let registry = ComponentRegistry::with_builtins();
        let root = GameObject::new("box")
            .with_component("a_transform", transform(1.0))
            .with_component("b_transform", transform(5.0))
            .into_shared();
        let resolved = SceneResolver::new().resolve(&root, &registry);

        assert_eq!(resolved.root.transform().position, [1.0, 0.0, 0.0]);
        assert_eq!(resolved.root.components.len(), 1);
        assert_eq!(
            resolved.root.warnings[0],
            ResolveWarning {
                node_id: "box".to_string(),
                component_key: "b_transform".to_string(),
                issue: ResolveIssue::DuplicateType {
                    type_name: "Transform".to_string(),
                    kept_key: "a_transform".to_string(),
                },
            }
        );
        // both entries stay on the node
        assert_eq!(resolved.root.source().components.len(), 2);
    }

    #[test]
    fn test_walk_world_composes_transforms() {
        let registry = ComponentRegistry::with_builtins();
        let resolved = SceneResolver::new().resolve(&scene(), &registry);
        let mut positions = FxHashMap::default();
        resolved.root.walk_world(Mat4::IDENTITY, &mut |node, world| {
            positions.insert(node.id.clone(), world.w_axis.truncate());
            node.id != "right"
        });
        assert_eq!(positions["left-leaf"].x, 3.0);
        assert_eq!(positions["right"].x, -1.0);
    }
}
