//! Process-scoped shared state
//!
//! The registry and the event bus live here instead of in globals. A context
//! is created with [`SceneContext::init`] and passed by reference to whatever
//! resolves, simulates or exports scenes.

use crate::components::{ComponentRegistry, ComponentType};
use crate::events::EventBus;

use super::config::SceneConfig;

/// Component registry and event bus shared by every scene in the process
#[derive(Debug, Default)]
pub struct SceneContext {
    registry: ComponentRegistry,
    bus: EventBus,
}

impl SceneContext {
    /// Empty context: no component types, no subscribers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with the built-in component types registered
    #[must_use]
    pub fn init(config: &SceneConfig) -> Self {
        let mut registry = ComponentRegistry::with_builtins();
        registry.set_asset_root(config.asset_root.clone());
        log::info!("Scene context initialized with {} component types", registry.len());
        Self {
            registry,
            bus: EventBus::new(),
        }
    }

    /// Drop every registered type and subscriber
    pub fn teardown(&mut self) {
        log::info!(
            "Scene context teardown ({} component types)",
            self.registry.len()
        );
        self.registry.clear();
        self.bus.clear();
    }

    /// Register or overwrite a component type
    pub fn register_component(&mut self, component_type: ComponentType) -> Option<ComponentType> {
        self.registry.register(component_type)
    }

    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    /// Event bus; clones share subscribers
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}
