//! Prefab serialization and deserialization
//!
//! Prefabs are stored as JSON (the interchange format) or RON. Loading
//! validates the id invariants; unknown component types and properties are
//! kept verbatim so a load/save cycle reproduces the input structure.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::SceneError;
use super::node::GameObject;
use super::tree;

/// A named, persistable scene unit with a single root node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prefab {
    /// Optional prefab identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Optional display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Root of the scene tree
    pub root: Arc<GameObject>,
}

impl Prefab {
    /// Create a prefab around an existing root
    #[must_use]
    pub fn new(name: impl Into<String>, root: Arc<GameObject>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            root,
        }
    }

    /// Builder: set the prefab id
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Embed this prefab's root as a child subtree of `parent` in another tree
    pub fn instantiate_into(
        &self,
        target: &Arc<GameObject>,
        parent: &str,
    ) -> Result<Arc<GameObject>, super::TreeError> {
        let copy = tree::clone_node(&self.root, target);
        tree::insert_child(target, parent, copy, None)
    }

    /// Check the id invariants of the root tree
    ///
    /// # Errors
    ///
    /// Returns an error on an empty or duplicated node id
    pub fn validate(&self) -> Result<(), SceneError> {
        tree::validate_ids(&self.root)
    }

    /// Parse a prefab from a JSON string
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or violates the id invariants
    pub fn from_json_str(json: &str) -> Result<Self, SceneError> {
        let prefab: Prefab =
            serde_json::from_str(json).map_err(|e| SceneError::DeserializeError(e.to_string()))?;
        prefab.validate()?;
        Ok(prefab)
    }

    /// Serialize the prefab to a pretty JSON string
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn to_json_string(&self) -> Result<String, SceneError> {
        serde_json::to_string_pretty(self).map_err(|e| SceneError::SerializeError(e.to_string()))
    }

    /// Save the prefab to a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), SceneError> {
        let json_string = self.to_json_string()?;
        fs::write(path, json_string).map_err(|e| SceneError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Load a prefab from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let content = fs::read_to_string(path).map_err(|e| SceneError::IoError(e.to_string()))?;
        Self::from_json_str(&content)
    }

    /// Save the prefab to a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_ron(&self, path: impl AsRef<Path>) -> Result<(), SceneError> {
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| SceneError::SerializeError(e.to_string()))?;
        fs::write(path, ron_string).map_err(|e| SceneError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Load a prefab from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let content = fs::read_to_string(path).map_err(|e| SceneError::IoError(e.to_string()))?;
        let prefab: Prefab =
            ron::from_str(&content).map_err(|e| SceneError::DeserializeError(e.to_string()))?;
        prefab.validate()?;
        Ok(prefab)
    }

    /// Get the number of nodes in the prefab
    #[must_use]
    pub fn node_count(&self) -> usize {
        tree::count_nodes(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    const PREFAB: &str = r##"{
        "id": "level-1",
        "name": "Level 1",
        "root": {
            "id": "scene",
            "children": [
                {
                    "id": "cube",
                    "components": {
                        "transform": { "type": "Transform", "properties": { "position": [0, 1, 0] } },
                        "wobble": { "type": "Wobble", "properties": { "amplitude": 0.5, "axis": "y" } }
                    }
                },
                { "id": "floor", "hidden": true }
            ]
        }
    }"##;

    #[test]
    fn test_prefab_roundtrip_json() {
        let prefab = Prefab::from_json_str(PREFAB).unwrap();
        assert_eq!(prefab.name.as_deref(), Some("Level 1"));
        assert_eq!(prefab.node_count(), 3);

        let out = prefab.to_json_string().unwrap();
        let original: Value = serde_json::from_str(PREFAB).unwrap();
        let reserialized: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(original, reserialized);
    }

    #[test]
    fn test_unknown_component_preserved() {
        let prefab = Prefab::from_json_str(PREFAB).unwrap();
        let out: Value = serde_json::from_str(&prefab.to_json_string().unwrap()).unwrap();
        let wobble = &out["root"]["children"][0]["components"]["wobble"];
        assert_eq!(wobble["type"], json!("Wobble"));
        assert_eq!(wobble["properties"]["axis"], json!("y"));
    }

    #[test]
    fn test_missing_root_is_schema_violation() {
        let result = Prefab::from_json_str(r#"{ "name": "broken" }"#);
        assert!(matches!(result, Err(SceneError::DeserializeError(_))));
    }

    #[test]
    fn test_missing_node_id_is_schema_violation() {
        let result = Prefab::from_json_str(r#"{ "root": { "children": [] } }"#);
        assert!(matches!(result, Err(SceneError::DeserializeError(_))));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let json = r#"{ "root": { "id": "a", "children": [ { "id": "a" } ] } }"#;
        assert_eq!(
            Prefab::from_json_str(json),
            Err(SceneError::DuplicateId("a".to_string()))
        );
    }

    #[test]
    fn test_prefab_serialization_ron() {
        let prefab = Prefab::from_json_str(PREFAB).unwrap();
        let ron_str =
            ron::ser::to_string_pretty(&prefab, ron::ser::PrettyConfig::default()).unwrap();
        assert!(ron_str.contains("cube"));

        let loaded: Prefab = ron::from_str(&ron_str).unwrap();
        assert_eq!(loaded, prefab);
    }

    #[test]
    fn test_instantiate_nested_prefab() {
        let level = Prefab::from_json_str(PREFAB).unwrap();
        let crate_prefab = Prefab::new(
            "crate",
            GameObject::new("cube")
                .with_child(GameObject::new("lid"))
                .into_shared(),
        );

        let root = crate_prefab.instantiate_into(&level.root, "scene").unwrap();
        assert_eq!(tree::count_nodes(&root), 5);
        assert!(tree::find_node(&root, "cube-1").is_some());
        assert!(tree::find_node(&root, "lid-1").is_some());
        assert!(tree::validate_ids(&root).is_ok());
    }
}
