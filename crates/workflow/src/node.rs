//! Node definitions: identity, configuration, and input/output specs.

use std::collections::HashMap;

use dagforge_core::NodeId;
use serde::{Deserialize, Serialize};

/// The closed set of node kinds the engine knows how to route.
///
/// Concrete behaviour for every variant except [`NodeKind::Reference`] is an
/// external concern (script engines, diagnostic heuristics, notification
/// transports, data sources) — this crate only needs the tag, both to report
/// per-kind statistics and to let the [`Validator`](crate::validator::Validator)
/// name the offending kind in an error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Ingests data into the workflow (file, HTTP, queue, ...).
    Input,
    /// A generic pluggable node whose behaviour is supplied externally.
    Plugin,
    /// Runs a user-provided script against the context.
    Script,
    /// Runs a diagnostic heuristic over upstream data.
    Diagnosis,
    /// Invokes another registered workflow. The only kind this core fully
    /// specifies the runtime behaviour of — see `dagforge-engine`.
    Reference,
    /// Sends a notification through an external transport.
    Notification,
    /// Branches the graph based on upstream data.
    Decision,
    /// Aggregates multiple upstream outputs into one value.
    Aggregation,
}

/// A node's mutable configuration, as hydrated by a workflow loader.
pub type NodeConfig = HashMap<String, serde_json::Value>;

/// A node in a workflow graph.
///
/// A node owns no state that survives an execution — everything produced or
/// consumed at runtime lives in the [`ExecutionContext`](dagforge_context::ExecutionContext)
/// keyed by [`OutputSpec::output_key`] and the node's [`InputSpec`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier within its workflow.
    pub id: NodeId,
    /// Human-readable name, used in error messages and statistics.
    pub name: String,
    /// The node's kind.
    pub kind: NodeKind,
    /// Arbitrary configuration, interpreted by the node implementation.
    #[serde(default)]
    pub config: NodeConfig,
    /// How this node reads its inputs from the context.
    #[serde(default)]
    pub inputs: InputSpec,
    /// Where this node's primary output is written.
    #[serde(default)]
    pub output: OutputSpec,
}

impl Node {
    /// Create a node with empty config and default input/output specs.
    pub fn new(id: NodeId, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            config: NodeConfig::new(),
            inputs: InputSpec::default(),
            output: OutputSpec::default(),
        }
    }

    /// Attach an input spec.
    #[must_use]
    pub fn with_inputs(mut self, inputs: InputSpec) -> Self {
        self.inputs = inputs;
        self
    }

    /// Attach an output spec.
    #[must_use]
    pub fn with_output(mut self, output: OutputSpec) -> Self {
        self.output = output;
        self
    }

    /// Set a single config entry.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// Read a config entry, returning `None` if absent or of the wrong shape.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(serde_json::Value::as_str)
    }
}

/// A single input parameter a node declares in its [`InputSpec`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputParameter {
    /// The context key to read.
    pub key: String,
    /// The name this value is bound to in the node's resolved input map.
    pub alias: String,
    /// Whether resolution fails if the key is absent and no default is set.
    #[serde(default)]
    pub required: bool,
    /// Value substituted when the key is absent.
    #[serde(default)]
    pub default_value: Option<serde_json::Value>,
    /// Informational data type tag (not enforced by the resolver).
    #[serde(default)]
    pub data_type: Option<String>,
    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
}

impl InputParameter {
    /// Create a required parameter with `alias == key`.
    pub fn required(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            alias: key.clone(),
            key,
            required: true,
            default_value: None,
            data_type: None,
            description: None,
        }
    }

    /// Create an optional parameter with an explicit default.
    pub fn optional(key: impl Into<String>, default_value: serde_json::Value) -> Self {
        let key = key.into();
        Self {
            alias: key.clone(),
            key,
            required: false,
            default_value: Some(default_value),
            data_type: None,
            description: None,
        }
    }

    /// Bind this parameter's resolved value to a different alias.
    #[must_use]
    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }
}

/// The derived input-gathering mode for a node, per §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// The node receives a flat `alias → value` map.
    Multiple,
    /// The flat map is additionally wrapped under a single outer key.
    Merged,
}

/// A node's declared inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputSpec {
    /// Parameters, read from the context in this order.
    #[serde(default)]
    pub inputs: Vec<InputParameter>,
    /// When non-empty, the resolved map is wrapped under this key and the
    /// mode is [`InputMode::Merged`]; otherwise [`InputMode::Multiple`].
    #[serde(default)]
    pub merge_key: Option<String>,
}

impl InputSpec {
    /// Build a spec from a list of parameters, defaulting to MULTIPLE mode.
    pub fn new(inputs: Vec<InputParameter>) -> Self {
        Self {
            inputs,
            merge_key: None,
        }
    }

    /// Switch the spec to MERGED mode under `merge_key`.
    #[must_use]
    pub fn merged_under(mut self, merge_key: impl Into<String>) -> Self {
        self.merge_key = Some(merge_key.into());
        self
    }

    /// The derived input mode.
    pub fn mode(&self) -> InputMode {
        match &self.merge_key {
            Some(key) if !key.is_empty() => InputMode::Merged,
            _ => InputMode::Multiple,
        }
    }
}

/// Where a node's primary result is written back to the context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSpec {
    /// Context key the primary result is written under, if any.
    #[serde(default)]
    pub output_key: Option<String>,
}

impl OutputSpec {
    /// Write the primary result under `key`.
    pub fn keyed(key: impl Into<String>) -> Self {
        Self {
            output_key: Some(key.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_spec_defaults_to_multiple() {
        let spec = InputSpec::new(vec![InputParameter::required("v")]);
        assert_eq!(spec.mode(), InputMode::Multiple);
    }

    #[test]
    fn input_spec_empty_merge_key_is_multiple() {
        let spec = InputSpec::new(vec![]).merged_under("");
        assert_eq!(spec.mode(), InputMode::Multiple);
    }

    #[test]
    fn input_spec_non_empty_merge_key_is_merged() {
        let spec = InputSpec::new(vec![]).merged_under("payload");
        assert_eq!(spec.mode(), InputMode::Merged);
    }

    #[test]
    fn node_config_str_reads_string_value() {
        let node = Node::new(NodeId::v4(), "n", NodeKind::Script)
            .with_config("script", serde_json::json!("print(1)"));
        assert_eq!(node.config_str("script"), Some("print(1)"));
    }

    #[test]
    fn node_config_str_missing_key_is_none() {
        let node = Node::new(NodeId::v4(), "n", NodeKind::Script);
        assert_eq!(node.config_str("missing"), None);
    }

    #[test]
    fn node_kind_serde_snake_case() {
        let json = serde_json::to_string(&NodeKind::Reference).unwrap();
        assert_eq!(json, "\"reference\"");
    }
}
