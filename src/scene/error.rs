//! Scene and tree error types

/// Errors that can occur while loading or saving prefabs
#[derive(Debug, Clone, PartialEq)]
pub enum SceneError {
    /// IO error
    IoError(String),
    /// Serialization error
    SerializeError(String),
    /// Deserialization error (malformed document, missing `root` or `id`)
    DeserializeError(String),
    /// A node has an empty id
    EmptyId,
    /// Two nodes in one tree share an id
    DuplicateId(String),
}

impl std::fmt::Display for SceneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(e) => write!(f, "IO error: {e}"),
            Self::SerializeError(e) => write!(f, "Serialization error: {e}"),
            Self::DeserializeError(e) => write!(f, "Deserialization error: {e}"),
            Self::EmptyId => write!(f, "Schema violation: node with empty id"),
            Self::DuplicateId(id) => write!(f, "Schema violation: duplicate node id '{id}'"),
        }
    }
}

impl std::error::Error for SceneError {}

/// Errors produced by tree edits that cannot be expressed as a no-op
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Deleting the root node is rejected
    RootDeletion(String),
    /// Inserting a subtree whose ids collide with the tree
    DuplicateId(String),
    /// Insertion target does not exist
    ParentNotFound(String),
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RootDeletion(id) => write!(f, "cannot delete root node '{id}'"),
            Self::DuplicateId(id) => write!(f, "node id '{id}' already exists in the tree"),
            Self::ParentNotFound(id) => write!(f, "parent node '{id}' not found"),
        }
    }
}

impl std::error::Error for TreeError {}
