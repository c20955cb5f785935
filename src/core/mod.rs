//! Scene runtime module
//!
//! Configuration, the shared registry/event-bus context and the frame driver

mod config;
mod context;
mod runtime;

pub use config::{ConfigError, SceneConfig};
pub use context::SceneContext;
pub use runtime::{FrameReport, SceneRuntime};
