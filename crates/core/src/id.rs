//! Strongly-typed identifiers for workflow-graph entities.
//!
//! Each identifier is a [`domain_key`] `Uuid<D>` wrapper parameterized by a
//! unique domain marker, so `NodeId` and `WorkflowId` are distinct types at
//! compile time even though both are backed by a `uuid::Uuid`. All of them
//! are `Copy`, serialize as plain UUID strings, and support `v4()`/`parse()`.

use domain_key::define_uuid;

pub use domain_key::UuidParseError;

define_uuid!(WorkflowIdDomain => WorkflowId);
define_uuid!(NodeIdDomain => NodeId);
define_uuid!(ExecutionIdDomain => ExecutionId);
define_uuid!(ConnectionIdDomain => ConnectionId);
