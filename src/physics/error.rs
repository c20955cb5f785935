//! Errors for addressing simulation bodies by node id

/// Why a per-node body operation was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhysicsError {
    /// The node has no simulation body
    NoBody(String),
    /// The node's body belongs to an instanced batch
    InstancedBody(String),
}

impl std::fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoBody(id) => write!(f, "node '{id}' has no physics body"),
            Self::InstancedBody(id) => write!(
                f,
                "node '{id}' is part of an instanced batch; opt out of instancing to address it"
            ),
        }
    }
}

impl std::error::Error for PhysicsError {}
