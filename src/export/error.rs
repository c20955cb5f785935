//! Export errors and warnings

/// Fatal export failures
#[derive(Debug, Clone, PartialEq)]
pub enum ExportError {
    /// The root node itself could not be resolved
    UnresolvableRoot { node_id: String, reason: String },
    /// The asset JSON could not be serialized
    SerializeError(String),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnresolvableRoot { node_id, reason } => {
                write!(f, "cannot export root node '{node_id}': {reason}")
            }
            Self::SerializeError(e) => write!(f, "JSON serialization failed: {e}"),
        }
    }
}

impl std::error::Error for ExportError {}

/// A node that was exported with less than it declared
#[derive(Debug, Clone, PartialEq)]
pub enum ExportWarning {
    /// Geometry could not be turned into a mesh; the node is exported empty
    SkippedGeometry { node_id: String, reason: String },
    /// The referenced model is not available
    MissingModel { node_id: String, path: String },
    /// The referenced texture is not available or not embeddable
    MissingTexture { node_id: String, path: String },
    /// A material color did not parse; white was used
    InvalidColor { node_id: String, value: String },
}

impl ExportWarning {
    /// Node the warning is about
    #[must_use]
    pub fn node_id(&self) -> &str {
        match self {
            Self::SkippedGeometry { node_id, .. }
            | Self::MissingModel { node_id, .. }
            | Self::MissingTexture { node_id, .. }
            | Self::InvalidColor { node_id, .. } => node_id,
        }
    }
}

impl std::fmt::Display for ExportWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SkippedGeometry { node_id, reason } => {
                write!(f, "node '{node_id}': geometry skipped ({reason})")
            }
            Self::MissingModel { node_id, path } => write!(f, "node '{node_id}': missing model '{path}'"),
            Self::MissingTexture { node_id, path } => {
                write!(f, "node '{node_id}': missing texture '{path}'")
            }
            Self::InvalidColor { node_id, value } => {
                write!(f, "node '{node_id}': invalid color '{value}'")
            }
        }
    }
}
