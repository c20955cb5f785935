//! Scene graph node types
//!
//! A [`GameObject`] is immutable once shared: children are held behind `Arc`
//! so that tree edits can copy the path to the edited node and re-link every
//! other subtree by identity.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Loosely-typed property record of a component entry
pub type Properties = Map<String, Value>;

/// A component as declared on a node: a registered type name plus its properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentEntry {
    /// Name of the registered component type
    #[serde(rename = "type")]
    pub type_name: String,
    /// Property record, shape defined by the component type
    #[serde(default)]
    pub properties: Properties,
}

impl ComponentEntry {
    /// Create an entry with no properties
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            properties: Properties::new(),
        }
    }

    /// Builder: set one property
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// One node of the scene tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameObject {
    /// Identity, unique within one tree snapshot
    pub id: String,
    /// Excludes the subtree from behavior and physics
    #[serde(default, skip_serializing_if = "is_false")]
    pub disabled: bool,
    /// Excludes the subtree from visual presentation only
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    /// Components keyed by a per-node name (at most one entry per name)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, ComponentEntry>,
    /// Ordered children; order is render and traversal order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Arc<GameObject>>,
}

impl GameObject {
    /// Create an empty, enabled, visible node
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            disabled: false,
            hidden: false,
            components: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Builder: attach a component under `key`
    #[must_use]
    pub fn with_component(mut self, key: impl Into<String>, entry: ComponentEntry) -> Self {
        self.components.insert(key.into(), entry);
        self
    }

    /// Builder: append a child
    #[must_use]
    pub fn with_child(mut self, child: GameObject) -> Self {
        self.children.push(Arc::new(child));
        self
    }

    /// Builder: set the disabled flag
    #[must_use]
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Builder: set the hidden flag
    #[must_use]
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Wrap into a shareable node
    #[must_use]
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Find the first component entry of the given registered type
    #[must_use]
    pub fn component_of_type(&self, type_name: &str) -> Option<&ComponentEntry> {
        self.components
            .values()
            .find(|entry| entry.type_name == type_name)
    }

    /// Check if the node has no children
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}
