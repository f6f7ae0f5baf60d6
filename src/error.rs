//! Error taxonomy of the query engine
//!
//! Every variant describes a deterministic, programmer-visible failure. None of
//! them is retried: a failure aborts the traversal that raised it and the host
//! decides whether to continue with other files.

use thiserror::Error;

use crate::ir::node::SyntaxKind;
use crate::ir::virtual_node::VirtualNodeKind;

/// Failures raised by the matcher library, the query builder, the virtual
/// node rules, override routing and the tree walker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// A constructor or method received an argument it cannot work with
    /// (blank pattern, empty modifier set, inverted span, ...).
    #[error("invalid argument `{argument}`: {reason}")]
    InvalidArgument {
        argument: &'static str,
        reason: String,
    },

    /// A regex pattern failed to compile.
    #[error("invalid regex `{pattern}`: {reason}")]
    InvalidRegex { pattern: String, reason: String },

    /// A descriptor value has no registered translation.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// A synthesis rule was handed a node of a structurally incompatible kind.
    #[error("{rule} cannot be synthesized from a {actual} node (expected {expected})")]
    SynthesisMisuse {
        rule: VirtualNodeKind,
        expected: &'static str,
        actual: SyntaxKind,
    },

    /// Several overridable rules apply to one node and none of them dominates
    /// all the others.
    #[error("override conflict on a {node} node between {}", join_kinds(.rules))]
    OverrideConflict {
        node: SyntaxKind,
        rules: Vec<VirtualNodeKind>,
    },

    /// A rule declares that it overrides a rule that is not registered.
    #[error("{rule} declares an override of {target}, which is not registered")]
    IsolatedOverride {
        rule: VirtualNodeKind,
        target: VirtualNodeKind,
    },

    /// Routing produced more than one replacement for a single node.
    #[error("{count} virtual nodes claim to replace the same {node} node")]
    DoubleReplacement { node: SyntaxKind, count: usize },

    /// Peek or pop on an empty match accumulator.
    #[error("the match accumulator is empty")]
    EmptyAccumulator,

    /// Identifier resolution was required to succeed but the node has none.
    #[error("a {0} node has no identifier")]
    MissingIdentifier(SyntaxKind),
}

fn join_kinds(kinds: &[VirtualNodeKind]) -> String {
    kinds
        .iter()
        .map(|kind| kind.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl QueryError {
    pub(crate) fn invalid_argument(argument: &'static str, reason: impl Into<String>) -> Self {
        QueryError::InvalidArgument {
            argument,
            reason: reason.into(),
        }
    }
}
