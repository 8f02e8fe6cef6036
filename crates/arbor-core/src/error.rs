//! Error types surfaced by the engine.
//!
//! Stale actions and `done` calls for entries that do not exist are not
//! errors; they never show up here.

use thiserror::Error;

use crate::ComposerId;

/// Failure to reach a component in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("component {id} is not mounted")]
    Missing { id: ComposerId },
    #[error("component {id} type mismatch; expected {expected}")]
    TypeMismatch {
        id: ComposerId,
        expected: &'static str,
    },
    #[error("component {id} is busy")]
    Busy { id: ComposerId },
}

/// Failure reported by a component's render.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RenderError {
    message: String,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure to enqueue an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("event queue is full (capacity: {capacity})")]
    QueueFull { capacity: usize },
    #[error("engine is closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("queue capacity must be greater than zero")]
    ZeroQueueCapacity,
    #[error("update rate must be greater than zero")]
    ZeroUpdateRate,
    #[error("max settle cycles must be greater than zero")]
    ZeroSettleCycles,
    #[error("invalid origin {origin:?}: {source}")]
    InvalidOrigin {
        origin: String,
        #[source]
        source: url::ParseError,
    },
    #[error("origin {0} cannot be used as a base location")]
    OpaqueOrigin(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("encoding value for key {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("decoding value for key {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("rendering component {id} failed: {source}")]
    Render {
        id: ComposerId,
        #[source]
        source: RenderError,
    },
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid location {input:?}: {source}")]
    InvalidLocation {
        input: String,
        #[source]
        source: url::ParseError,
    },
    #[error("location {location} is outside the engine origin")]
    ForeignLocation { location: String },
    #[error("no component routed at {path}")]
    NotFound { path: String },
    #[error("engine did not settle after {cycles} cycles")]
    Unsettled { cycles: usize },
}
