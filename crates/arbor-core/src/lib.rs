#![doc = r"Event dispatch and update scheduling for component trees."]

pub mod collections;
mod composer;
pub mod config;
mod context;
mod deferred;
mod engine;
pub mod error;
mod messages;
pub mod platform;
mod queue;
pub mod routing;
pub mod storage;
mod tree;
mod update_manager;

pub use composer::{AsAny, Composer, ComposerId, Depth};
pub use config::EngineConfig;
pub use context::Context;
pub use deferred::{Deferred, DeferredList};
pub use engine::{CycleReport, Engine};
pub use error::{ConfigError, DispatchError, EngineError, RenderError, StorageError, TreeError};
pub use messages::{Message, MessageHandler};
pub use platform::{DefaultScheduler, EngineScheduler};
pub use queue::{Action, ActionFn, EngineHandle};
pub use routing::Routes;
pub use storage::{MemoryStorage, Storage, Storages};
pub use tree::ComponentTree;
pub use update_manager::UpdateManager;
