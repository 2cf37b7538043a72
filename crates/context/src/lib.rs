//! Execution context, input resolution, node lifecycle, and result model.

pub mod contract;
pub mod error;
pub mod resolver;
pub mod result;
pub mod runtime;
pub mod store;

pub use contract::NodeExecutor;
pub use error::{ContextError, ErrorKind};
pub use resolver::{InputResolver, ResolvedInput};
pub use result::{NodeExecutionResult, NodeStatus, Statistics, WorkflowExecutionResult};
pub use runtime::NodeRuntime;
pub use store::{ContextStore, ExecutionContext};
