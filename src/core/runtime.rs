//! Frame driver
//!
//! Edits are queued during frame N and committed at the start of the next
//! tick, so they become visible to resolution, physics and export in frame
//! N+1. Everything runs on the caller's thread.

use std::sync::Arc;

use glam::Vec3;
use rustc_hash::{FxHashMap, FxHashSet};

use super::config::SceneConfig;
use super::context::SceneContext;
use crate::assets::{AssetPath, AssetSource, LoadToken, PendingLoads};
use crate::components::{ResolveStats, ResolvedNode, ResolvedScene, SceneResolver};
use crate::export::{ExportError, GlbExport, export_glb};
use crate::physics::{Physics, PhysicsResolver, SyncReport};
use crate::scene::{GameObject, TreeError, tree};

type Edit = Box<dyn FnOnce(&Arc<GameObject>) -> Result<Arc<GameObject>, TreeError>>;

/// What one tick did
#[derive(Debug, Default)]
pub struct FrameReport {
    /// Frame number after the tick
    pub frame: u64,
    pub edits_applied: usize,
    /// Edits that were rejected; the tree is left as it was before each
    pub edit_errors: Vec<TreeError>,
    pub resolve: ResolveStats,
    pub sync: SyncReport,
    /// Simulation steps taken
    pub steps: u32,
    /// Contact events published on the bus
    pub events: usize,
    pub loads_cancelled: usize,
}

/// Owns a live scene tree and drives it frame by frame
pub struct SceneRuntime {
    config: SceneConfig,
    root: Arc<GameObject>,
    queued: Vec<Edit>,
    resolver: SceneResolver,
    resolved: ResolvedScene,
    physics: PhysicsResolver,
    loads: PendingLoads,
    requested: FxHashSet<(String, AssetPath)>,
    new_loads: Vec<LoadToken>,
    accumulator: f32,
    frame: u64,
}

impl SceneRuntime {
    /// Start a runtime on `root`, resolving it once against `ctx`
    pub fn new(ctx: &SceneContext, config: SceneConfig, root: Arc<GameObject>) -> Self {
        let mut resolver = SceneResolver::new();
        let resolved = resolver.resolve(&root, ctx.registry());
        let physics = PhysicsResolver::new(Physics::with_gravity(Vec3::from(config.gravity)));
        Self {
            config,
            root,
            queued: Vec::new(),
            resolver,
            resolved,
            physics,
            loads: PendingLoads::new(),
            requested: FxHashSet::default(),
            new_loads: Vec::new(),
            accumulator: 0.0,
            frame: 0,
        }
    }

    /// Committed tree
    #[must_use]
    pub fn root(&self) -> &Arc<GameObject> {
        &self.root
    }

    /// Last resolved scene
    #[must_use]
    pub fn scene(&self) -> &ResolvedScene {
        &self.resolved
    }

    #[must_use]
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    #[must_use]
    pub fn physics(&self) -> &PhysicsResolver {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut PhysicsResolver {
        &mut self.physics
    }

    /// Number of completed ticks
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Edits waiting for the next tick
    #[must_use]
    pub fn queued_edits(&self) -> usize {
        self.queued.len()
    }

    /// Queue an arbitrary tree edit for the next tick
    pub fn queue_edit<F>(&mut self, edit: F)
    where
        F: FnOnce(&Arc<GameObject>) -> Result<Arc<GameObject>, TreeError> + 'static,
    {
        self.queued.push(Box::new(edit));
    }

    /// Queue an in-place change to one node (no-op if the id is gone)
    pub fn queue_update<F>(&mut self, id: impl Into<String>, modify: F)
    where
        F: FnOnce(&mut GameObject) + 'static,
    {
        let id = id.into();
        self.queue_edit(move |root| Ok(tree::modify_node_by_id(root, &id, modify)));
    }

    /// Queue removal of a node and its subtree
    pub fn queue_delete(&mut self, id: impl Into<String>) {
        let id = id.into();
        self.queue_edit(move |root| tree::delete_node(root, &id));
    }

    /// Queue insertion of a subtree as the last child of `parent_id`
    pub fn queue_insert(&mut self, parent_id: impl Into<String>, child: Arc<GameObject>) {
        let parent_id = parent_id.into();
        self.queue_edit(move |root| tree::insert_child(root, &parent_id, child, None));
    }

    /// Advance one frame
    ///
    /// Commits queued edits, re-resolves, cancels loads of deleted or
    /// retargeted models, syncs bodies, runs fixed simulation steps for `dt` and publishes
    /// contacts on the context's bus.
    pub fn tick(&mut self, ctx: &SceneContext, dt: f32) -> FrameReport {
        let mut report = FrameReport::default();

        for edit in std::mem::take(&mut self.queued) {
            match edit(&self.root) {
                Ok(root) => {
                    self.root = root;
                    report.edits_applied += 1;
                }
                Err(e) => {
                    log::warn!("Rejected tree edit: {e}");
                    report.edit_errors.push(e);
                }
            }
        }

        self.resolved = self.resolver.resolve(&self.root, ctx.registry());
        report.resolve = self.resolver.stats();
        report.loads_cancelled = self.request_models();

        report.sync = self.physics.sync(&self.resolved);

        let step = self.config.fixed_timestep.max(f32::EPSILON);
        self.accumulator += dt.max(0.0);
        while self.accumulator >= step && report.steps < self.config.max_steps_per_tick {
            self.physics.step(step);
            self.accumulator -= step;
            report.steps += 1;
        }
        if report.steps == self.config.max_steps_per_tick {
            // Drop the backlog rather than spiral
            self.accumulator = self.accumulator.min(step);
        }

        report.events = self.physics.dispatch(ctx.bus());

        self.frame += 1;
        report.frame = self.frame;
        report
    }

    /// Bring model loads in line with the resolved scene. Loads whose node is
    /// gone or now points at another file are cancelled and forgotten, so a
    /// node that comes back is requested again. Returns the number cancelled.
    fn request_models(&mut self) -> usize {
        fn visit(node: &ResolvedNode, enabled: bool, out: &mut Vec<(String, AssetPath, bool)>) {
            let enabled = enabled && !node.disabled;
            if let Some(model) = node.model() {
                match AssetPath::parse(&model.filename, "") {
                    Ok(path) => out.push((node.id.clone(), path, enabled)),
                    Err(e) => log::warn!("Node '{}' has an unusable model path: {e}", node.id),
                }
            }
            for child in &node.children {
                visit(child, enabled, out);
            }
        }

        let mut models = Vec::new();
        visit(&self.resolved.root, true, &mut models);
        let live: FxHashMap<&str, &AssetPath> = models
            .iter()
            .map(|(node_id, path, _)| (node_id.as_str(), path))
            .collect();

        let cancelled = self
            .loads
            .retain_requests(|node_id, path| live.get(node_id) == Some(&path));
        self.requested
            .retain(|(node_id, path)| live.get(node_id.as_str()) == Some(&path));
        self.new_loads.retain(|token| !token.is_cancelled());

        for (node_id, path, enabled) in &models {
            if !enabled {
                continue;
            }
            let key = (node_id.clone(), path.clone());
            if self.requested.contains(&key) {
                continue;
            }
            let token = self.loads.request(node_id, path);
            log::debug!("Requested model '{path}' for node '{node_id}'");
            self.new_loads.push(token);
            self.requested.insert(key);
        }
        cancelled
    }

    /// Model loads started since the last call
    pub fn take_load_requests(&mut self) -> Vec<LoadToken> {
        std::mem::take(&mut self.new_loads)
    }

    /// Report a load as done; false if its node was deleted meanwhile
    pub fn finish_load(&mut self, token: &LoadToken) -> bool {
        self.loads.complete(token)
    }

    /// Loads still in flight
    #[must_use]
    pub fn pending_loads(&self) -> usize {
        self.loads.pending_count()
    }

    /// Export the last resolved scene
    ///
    /// # Errors
    ///
    /// See [`export_glb`]
    pub async fn export<A: AssetSource>(&self, assets: &A) -> Result<GlbExport, ExportError> {
        export_glb(&self.resolved, assets, &self.config.export).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::NoAssets;
    use crate::events::{CollisionEnter, ContactEvent, ScopedSubscription};
    use crate::scene::ComponentEntry;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn body(id: &str, kind: &str, y: f32, size: [f32; 3]) -> GameObject {
        GameObject::new(id)
            .with_component(
                "transform",
                ComponentEntry::new("Transform").with_property("position", json!([0.0, y, 0.0])),
            )
            .with_component(
                "geometry",
                ComponentEntry::new("Geometry")
                    .with_property("type", json!("box"))
                    .with_property("args", json!(size)),
            )
            .with_component(
                "physics",
                ComponentEntry::new("Physics").with_property("type", json!(kind)),
            )
    }

    fn setup(root: GameObject) -> (SceneContext, SceneRuntime) {
        let config = SceneConfig::default();
        let ctx = SceneContext::init(&config);
        let runtime = SceneRuntime::new(&ctx, config, root.into_shared());
        (ctx, runtime)
    }

    #[test]
    fn test_edit_visible_next_frame() {
        let (ctx, mut runtime) = setup(GameObject::new("root").with_child(GameObject::new("lamp")));
        runtime.queue_update("lamp", |node| node.hidden = true);

        assert_eq!(runtime.queued_edits(), 1);
        assert!(!runtime.scene().find("lamp").unwrap().hidden);
        assert!(!tree::find_node(runtime.root(), "lamp").unwrap().hidden);

        let report = runtime.tick(&ctx, 1.0 / 60.0);
        assert_eq!(report.edits_applied, 1);
        assert_eq!(report.frame, 1);
        assert!(runtime.scene().find("lamp").unwrap().hidden);
    }

    #[test]
    fn test_rejected_edit_keeps_tree() {
        let (ctx, mut runtime) = setup(GameObject::new("root"));
        let before = Arc::clone(runtime.root());
        runtime.queue_delete("root");
        let report = runtime.tick(&ctx, 0.0);
        assert_eq!(report.edit_errors, vec![TreeError::RootDeletion("root".to_string())]);
        assert!(Arc::ptr_eq(runtime.root(), &before));
    }

    #[test]
    fn test_fixed_steps() {
        let (ctx, mut runtime) = setup(GameObject::new("root"));
        assert_eq!(runtime.tick(&ctx, 1.0 / 60.0).steps, 1);
        assert_eq!(runtime.tick(&ctx, 0.0).steps, 0);
        assert_eq!(runtime.tick(&ctx, 1.0).steps, 5);
    }

    #[test]
    fn test_falling_box_publishes_collision() {
        let root = GameObject::new("root")
            .with_child(body("ground", "fixed", 0.0, [10.0, 1.0, 10.0]))
            .with_child(body("crate", "dynamic", 2.0, [1.0, 1.0, 1.0]));
        let (ctx, mut runtime) = setup(root);

        let hits = Rc::new(RefCell::new(Vec::new()));
        let mut sub = ScopedSubscription::for_event::<CollisionEnter>(ctx.bus());
        let sink = Rc::clone(&hits);
        sub.update_event::<CollisionEnter, _>((), move |event: &ContactEvent| {
            sink.borrow_mut().push(event.clone());
        });

        let mut events = 0;
        for _ in 0..180 {
            events += runtime.tick(&ctx, 1.0 / 60.0).events;
        }

        assert!(events >= 1);
        let hits = hits.borrow();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].source_entity_id, "crate");
        assert_eq!(hits[0].target_entity_id, "ground");

        let (position, _) = runtime.physics().pose("crate").unwrap();
        assert!(position.y < 2.0);
    }

    #[test]
    fn test_deleted_node_cancels_model_load() {
        let model = |id: &str| {
            GameObject::new(id).with_component(
                "model",
                ComponentEntry::new("Model").with_property("filename", json!("/models/tree.glb")),
            )
        };
        let root = GameObject::new("root").with_child(model("a")).with_child(model("b"));
        let (ctx, mut runtime) = setup(root);

        runtime.tick(&ctx, 0.0);
        let tokens = runtime.take_load_requests();
        assert_eq!(tokens.len(), 2);
        assert_eq!(runtime.pending_loads(), 2);

        // Not requested again while in flight
        runtime.tick(&ctx, 0.0);
        assert!(runtime.take_load_requests().is_empty());

        runtime.queue_delete("b");
        let report = runtime.tick(&ctx, 0.0);
        assert_eq!(report.loads_cancelled, 1);

        let (a, b): (Vec<_>, Vec<_>) = tokens
            .iter()
            .partition(|t| t.request().is_some_and(|r| r.node_id == "a"));
        assert_eq!(a.len(), 1);
        assert!(b.iter().all(|t| t.is_cancelled()));
        assert!(runtime.finish_load(a[0]));
        assert_eq!(runtime.pending_loads(), 0);
    }

    fn model(id: &str, filename: &str) -> GameObject {
        GameObject::new(id).with_component(
            "model",
            ComponentEntry::new("Model").with_property("filename", json!(filename)),
        )
    }

    #[test]
    fn test_reinserted_node_requests_model_again() {
        let (ctx, mut runtime) = setup(GameObject::new("root").with_child(model("a", "/models/tree.glb")));

        runtime.tick(&ctx, 0.0);
        let tokens = runtime.take_load_requests();
        assert_eq!(tokens.len(), 1);
        assert!(runtime.finish_load(&tokens[0]));

        runtime.queue_delete("a");
        runtime.tick(&ctx, 0.0);
        assert!(runtime.take_load_requests().is_empty());

        runtime.queue_insert("root", model("a", "/models/tree.glb").into_shared());
        runtime.tick(&ctx, 0.0);
        let again = runtime.take_load_requests();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].request().unwrap().node_id, "a");
    }

    #[test]
    fn test_changed_model_cancels_stale_load() {
        let (ctx, mut runtime) = setup(GameObject::new("root").with_child(model("a", "/models/oak.glb")));

        runtime.tick(&ctx, 0.0);
        let old = runtime.take_load_requests();
        assert_eq!(old.len(), 1);

        runtime.queue_update("a", |node| {
            node.components.insert(
                "model".to_string(),
                ComponentEntry::new("Model").with_property("filename", json!("/models/pine.glb")),
            );
        });
        let report = runtime.tick(&ctx, 0.0);
        assert_eq!(report.loads_cancelled, 1);
        assert!(old[0].is_cancelled());

        let new = runtime.take_load_requests();
        assert_eq!(new.len(), 1);
        assert_eq!(new[0].request().unwrap().path.as_str(), "/models/pine.glb");
        assert_eq!(runtime.pending_loads(), 1);
    }

    #[test]
    fn test_export_uses_last_resolved_scene() {
        let (ctx, mut runtime) = setup(
            GameObject::new("root").with_child(body("crate", "dynamic", 1.0, [1.0, 1.0, 1.0])),
        );
        runtime.queue_insert("root", GameObject::new("late").into_shared());

        let before = pollster::block_on(runtime.export(&NoAssets)).unwrap();
        let gltf = gltf::Gltf::from_slice(&before.data).unwrap();
        assert!(gltf.nodes().all(|n| n.name() != Some("late")));

        runtime.tick(&ctx, 0.0);
        let after = pollster::block_on(runtime.export(&NoAssets)).unwrap();
        let gltf = gltf::Gltf::from_slice(&after.data).unwrap();
        assert!(gltf.nodes().any(|n| n.name() == Some("late")));
    }
}
