//! The orchestration crate: level-parallel scheduling and reference-node
//! sub-workflow composition, built on top of the workflow/context/registry/
//! expression crates.

pub mod error;
pub mod reference;
pub mod scheduler;

pub use error::EngineError;
pub use reference::config::{ExecutionMode, ReferenceConfig};
pub use reference::ReferenceNodeExecutor;
pub use scheduler::Scheduler;
