//! Scene graph data model
//!
//! Prefabs, game objects and the immutable tree algebra over them.

mod error;
mod node;
mod prefab;
pub mod tree;

pub use error::{SceneError, TreeError};
pub use node::{ComponentEntry, GameObject, Properties};
pub use prefab::Prefab;
pub use tree::{
    TreeDiff, changed_subtrees, clone_node, clone_node_with, delete_node, find_node, insert_child,
    modify_node_by_id, update_node, update_node_by_id,
};
