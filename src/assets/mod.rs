//! Asset references and sources
//!
//! Provides:
//! - Canonical asset paths rooted at the public asset directory
//! - Cancellable per-node load tickets
//! - Async sources for decoded models and texture bytes

mod handle;
mod loads;
mod path;
mod source;

pub use handle::{LoadRequest, LoadTicket, LoadToken};
pub use loads::PendingLoads;
pub use path::{AssetPath, AssetPathError};
pub use source::{AssetSource, DirectoryAssets, InMemoryAssets, NoAssets, TextureData};
