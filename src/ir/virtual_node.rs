//! Virtual nodes and the combined result element
//!
//! A virtual node is a semantically meaningful sub-structure that has no node
//! of its own in the syntax tree: a method body regardless of its `{ }` or
//! `=> expr` form, an auto-property, the body of an `else`, and so on. Each
//! variant keeps the concrete node(s) it was synthesized from.
//!
//! [`CombinedNode`] is what the walker emits: either a real node or a virtual
//! one, never both.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::ir::identifier;
use crate::ir::node::{NodeRef, Position, Span, SyntaxKind};

/// Closed set of virtual node kinds. `Empty` stands for "no virtual
/// interpretation" and is what real nodes report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum VirtualNodeKind {
    Empty,
    MethodBody,
    NestedBlock,
    AutoProperty,
    ReadOnlyProperty,
    TryBody,
    IfCondition,
    IfBody,
    ElseBody,
}

impl VirtualNodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VirtualNodeKind::Empty => "Empty",
            VirtualNodeKind::MethodBody => "MethodBody",
            VirtualNodeKind::NestedBlock => "NestedBlock",
            VirtualNodeKind::AutoProperty => "AutoProperty",
            VirtualNodeKind::ReadOnlyProperty => "ReadOnlyProperty",
            VirtualNodeKind::TryBody => "TryBody",
            VirtualNodeKind::IfCondition => "IfCondition",
            VirtualNodeKind::IfBody => "IfBody",
            VirtualNodeKind::ElseBody => "ElseBody",
        }
    }
}

impl fmt::Display for VirtualNodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A synthesized node, one variant per non-empty [`VirtualNodeKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtualNode<'t> {
    /// `body` is the method's block or arrow clause.
    MethodBody { method: NodeRef<'t>, body: NodeRef<'t> },
    NestedBlock { container: NodeRef<'t> },
    AutoProperty { property: NodeRef<'t>, accessors: NodeRef<'t> },
    ReadOnlyProperty { property: NodeRef<'t>, arrow: NodeRef<'t> },
    TryBody { try_statement: NodeRef<'t>, block: NodeRef<'t> },
    IfCondition { if_statement: NodeRef<'t>, condition: NodeRef<'t> },
    IfBody { if_statement: NodeRef<'t>, statement: NodeRef<'t> },
    ElseBody { else_clause: NodeRef<'t>, statement: NodeRef<'t> },
}

impl<'t> VirtualNode<'t> {
    pub fn kind(&self) -> VirtualNodeKind {
        match self {
            VirtualNode::MethodBody { .. } => VirtualNodeKind::MethodBody,
            VirtualNode::NestedBlock { .. } => VirtualNodeKind::NestedBlock,
            VirtualNode::AutoProperty { .. } => VirtualNodeKind::AutoProperty,
            VirtualNode::ReadOnlyProperty { .. } => VirtualNodeKind::ReadOnlyProperty,
            VirtualNode::TryBody { .. } => VirtualNodeKind::TryBody,
            VirtualNode::IfCondition { .. } => VirtualNodeKind::IfCondition,
            VirtualNode::IfBody { .. } => VirtualNodeKind::IfBody,
            VirtualNode::ElseBody { .. } => VirtualNodeKind::ElseBody,
        }
    }

    /// The concrete node the virtual node wraps.
    pub fn base(&self) -> NodeRef<'t> {
        match *self {
            VirtualNode::MethodBody { body, .. } => body,
            VirtualNode::NestedBlock { container } => container,
            VirtualNode::AutoProperty { property, .. } => property,
            VirtualNode::ReadOnlyProperty { arrow, .. } => arrow,
            VirtualNode::TryBody { block, .. } => block,
            VirtualNode::IfCondition { condition, .. } => condition,
            VirtualNode::IfBody { statement, .. } => statement,
            VirtualNode::ElseBody { statement, .. } => statement,
        }
    }

    /// The visited node the synthesis rule was applied to.
    pub fn origin(&self) -> NodeRef<'t> {
        match *self {
            VirtualNode::MethodBody { method, .. } => method,
            VirtualNode::NestedBlock { container } => container,
            VirtualNode::AutoProperty { property, .. } => property,
            VirtualNode::ReadOnlyProperty { property, .. } => property,
            VirtualNode::TryBody { block, .. } => block,
            VirtualNode::IfCondition { condition, .. } => condition,
            VirtualNode::IfBody { statement, .. } => statement,
            VirtualNode::ElseBody { statement, .. } => statement,
        }
    }

    /// Node used for kind, identifier, modifier, path and scope tests.
    ///
    /// Replacements stand in for the node they were applied to. A method body
    /// is inserted next to its method, so it is tested as the body itself.
    pub fn anchor(&self) -> NodeRef<'t> {
        match self {
            VirtualNode::MethodBody { body, .. } => *body,
            _ => self.origin(),
        }
    }

    /// Effective span. An if condition covers its parenthesised region
    /// rather than the bare expression.
    pub fn span(&self) -> Span {
        match self {
            VirtualNode::IfCondition { if_statement, condition } => {
                match (if_statement.token("("), if_statement.token(")")) {
                    (Some(open), Some(close)) => Span::new(open.span.start, close.span.end),
                    _ => condition.span(),
                }
            }
            _ => self.base().span(),
        }
    }
}

/// One element of the result stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinedNode<'t> {
    Real(NodeRef<'t>),
    Virtual(VirtualNode<'t>),
}

impl<'t> CombinedNode<'t> {
    pub fn anchor(&self) -> NodeRef<'t> {
        match self {
            CombinedNode::Real(node) => *node,
            CombinedNode::Virtual(virtual_node) => virtual_node.anchor(),
        }
    }

    /// Kind of the anchor node.
    pub fn kind(&self) -> SyntaxKind {
        self.anchor().kind()
    }

    pub fn virtual_kind(&self) -> VirtualNodeKind {
        match self {
            CombinedNode::Real(_) => VirtualNodeKind::Empty,
            CombinedNode::Virtual(virtual_node) => virtual_node.kind(),
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, CombinedNode::Virtual(_))
    }

    pub fn as_real(&self) -> Option<NodeRef<'t>> {
        match self {
            CombinedNode::Real(node) => Some(*node),
            CombinedNode::Virtual(_) => None,
        }
    }

    pub fn as_virtual(&self) -> Option<&VirtualNode<'t>> {
        match self {
            CombinedNode::Real(_) => None,
            CombinedNode::Virtual(virtual_node) => Some(virtual_node),
        }
    }

    pub fn span(&self) -> Span {
        match self {
            CombinedNode::Real(node) => node.span(),
            CombinedNode::Virtual(virtual_node) => virtual_node.span(),
        }
    }

    pub fn start(&self) -> Position {
        self.span().start
    }

    pub fn identifier(&self) -> Option<String> {
        identifier::identifier(self.anchor())
    }

    pub fn path(&self) -> Option<&'t Path> {
        self.anchor().path()
    }
}

impl<'t> From<NodeRef<'t>> for CombinedNode<'t> {
    fn from(node: NodeRef<'t>) -> Self {
        CombinedNode::Real(node)
    }
}

impl<'t> From<VirtualNode<'t>> for CombinedNode<'t> {
    fn from(virtual_node: VirtualNode<'t>) -> Self {
        CombinedNode::Virtual(virtual_node)
    }
}
