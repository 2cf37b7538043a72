//! Gathers a node's declared inputs from the `ExecutionContext` (§4.2).

use dagforge_core::NodeId;
use dagforge_workflow::{InputMode, InputSpec};
use serde_json::{Map, Value};

use crate::error::ContextError;
use crate::store::ExecutionContext;

/// The resolved inputs for one node dispatch, plus the bookkeeping metadata
/// a `NodeExecutionResult` attaches alongside its data.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInput {
    /// `alias → value`, in declaration order of appearance.
    values: Map<String, Value>,
    /// MULTIPLE or MERGED, per the spec's input-mode derivation.
    pub mode: InputMode,
    /// Number of parameters declared on the spec.
    pub total_inputs: usize,
    /// Number of those parameters marked `required`.
    pub required_inputs: usize,
    /// Number of parameters actually bound (present or defaulted).
    pub available_inputs: usize,
}

impl ResolvedInput {
    /// The flat `alias → value` map, regardless of mode.
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// The value a node implementation passes to its computation: the flat
    /// map for MULTIPLE mode, or that map wrapped under `merge_key` for
    /// MERGED mode.
    pub fn into_value(self, merge_key: Option<&str>) -> Value {
        match (self.mode, merge_key) {
            (InputMode::Merged, Some(key)) => {
                let mut outer = Map::new();
                outer.insert(key.to_string(), Value::Object(self.values));
                Value::Object(outer)
            }
            _ => Value::Object(self.values),
        }
    }
}

/// Resolves a node's `InputSpec` against an `ExecutionContext`.
#[derive(Debug, Default)]
pub struct InputResolver;

impl InputResolver {
    /// A stateless resolver.
    pub fn new() -> Self {
        Self
    }

    /// Resolve `spec` for `node_id` against `ctx`, failing on the first
    /// unmet required parameter.
    pub fn resolve(
        &self,
        node_id: NodeId,
        spec: &InputSpec,
        ctx: &ExecutionContext,
    ) -> Result<ResolvedInput, ContextError> {
        let mut values = Map::new();
        let mut available = 0usize;
        let required_inputs = spec.inputs.iter().filter(|p| p.required).count();

        for param in &spec.inputs {
            match ctx.get(&param.key) {
                Some(value) => {
                    values.insert(param.alias.clone(), value);
                    available += 1;
                }
                None => match &param.default_value {
                    Some(default) => {
                        values.insert(param.alias.clone(), default.clone());
                        available += 1;
                    }
                    None if param.required => {
                        return Err(ContextError::MissingInput {
                            node: node_id,
                            key: param.key.clone(),
                            alias: param.alias.clone(),
                        });
                    }
                    None => {}
                },
            }
        }

        Ok(ResolvedInput {
            values,
            mode: spec.mode(),
            total_inputs: spec.inputs.len(),
            required_inputs,
            available_inputs: available,
        })
    }
}
