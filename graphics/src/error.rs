//! Error types of the render graph.
//!
//! Compile-time errors are returned synchronously from
//! [`RenderGraph::compile`](crate::graph::RenderGraph::compile), execution
//! errors from [`RenderGraph::execute`](crate::graph::RenderGraph::execute).
//! Pass callbacks report failures with [`PassError`].

use thiserror::Error;

use crate::backend::BackendError;

/// Errors that can occur during graph construction, compilation or execution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A pass with the same name already exists.
    #[error("a pass named '{0}' already exists in the graph")]
    NameCollision(String),

    /// No pass with the given name exists.
    #[error("unknown pass '{0}'")]
    UnknownPass(String),

    /// The pass does not declare the field (with the required direction).
    #[error("pass '{pass}' has no {direction} field named '{field}'")]
    UnknownField {
        /// Pass name.
        pass: String,
        /// Field name.
        field: String,
        /// `input` or `output`.
        direction: &'static str,
    },

    /// A `pass.field` string could not be parsed.
    #[error("invalid field name '{0}', expected 'pass.field'")]
    InvalidFieldName(String),

    /// The edge cannot be added or removed.
    #[error("edge '{src}' -> '{dst}': {reason}")]
    EdgeConflict {
        /// Source endpoint.
        src: String,
        /// Destination endpoint.
        dst: String,
        /// What is wrong with the edge.
        reason: String,
    },

    /// No constructor is registered for the pass type.
    #[error("no render pass type '{0}' is registered")]
    UnknownPassType(String),

    /// The registered constructor rejected the properties.
    #[error("failed to create pass of type '{type_name}': {source}")]
    PassCreation {
        /// Registered type name.
        type_name: String,
        /// The constructor's error.
        #[source]
        source: PassError,
    },

    /// A required input has neither an edge, an auto-resolved producer nor
    /// an external resource.
    #[error("required input '{pass}.{field}' is not connected to any producer")]
    UnresolvedInput {
        /// Consumer pass.
        pass: String,
        /// Consumer field.
        field: String,
    },

    /// A required input matches more than one producer output by name.
    #[error(
        "required input '{pass}.{field}' matches several producers ({}), add an explicit edge",
        .candidates.join(", ")
    )]
    AmbiguousInput {
        /// Consumer pass.
        pass: String,
        /// Consumer field.
        field: String,
        /// Matching `pass.field` outputs.
        candidates: Vec<String>,
    },

    /// The dependency graph contains a cycle.
    #[error("render graph contains a cycle: {}", .cycle.join(" -> "))]
    CyclicGraph {
        /// Pass names forming the cycle, the first repeated at the end.
        cycle: Vec<String>,
    },

    /// A pass failed to reflect or returned an inconsistent reflection.
    #[error("reflection of pass '{pass}' failed: {reason}")]
    Reflection {
        /// Pass name.
        pass: String,
        /// Failure description.
        reason: String,
    },

    /// Two fields that alias one resource have incompatible properties.
    #[error("incompatible fields for resource '{resource}': {reason}")]
    FieldConflict {
        /// Name of the aliased resource.
        resource: String,
        /// Conflict description.
        reason: String,
    },

    /// A pass failed during execution; the rest of the frame was skipped.
    #[error("pass '{pass}' failed during execution: {source}")]
    Execution {
        /// Pass name.
        pass: String,
        /// The error returned by the pass.
        #[source]
        source: PassError,
    },

    /// The device refused to create a resource.
    #[error("failed to allocate '{resource}': {source}")]
    Allocation {
        /// Resource name.
        resource: String,
        /// The device error.
        #[source]
        source: BackendError,
    },

    /// Recorded commands could not be submitted to the device.
    #[error("failed to submit commands: {0}")]
    Submit(#[source] BackendError),
}

/// Alias for `Result<T, GraphError>`.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors returned by render pass callbacks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PassError {
    /// Free-form failure.
    #[error("{0}")]
    Message(String),

    /// A field the pass relies on has no bound resource.
    #[error("no resource bound to field '{0}'")]
    MissingResource(String),

    /// A construction property has the wrong type or value.
    #[error("invalid property '{name}': {reason}")]
    InvalidProperty {
        /// Property name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A device call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl PassError {
    /// Create a [`PassError::Message`].
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}
