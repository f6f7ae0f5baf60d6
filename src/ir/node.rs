//! Arena-backed syntax tree consumed by the query engine
//!
//! Front ends lower their concrete syntax trees into a [`SyntaxTree`]: a flat
//! vector of nodes linked by index. Each node records its kind, the field it
//! occupies in its parent, its ordered children, its declared name, its
//! modifier keywords, its source span and the anonymous tokens (punctuation,
//! keywords) that sit directly under it.
//!
//! Nodes are addressed through [`NodeRef`], a copyable handle borrowing the
//! tree. The engine never mutates a tree once [`SyntaxTreeBuilder::finish`]
//! has produced it.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use ropey::Rope;
use serde::Serialize;
use tracing::warn;

use crate::error::QueryError;

/// Represents an absolute position in the source code.
/// Coordinates are zero-based (row, column, byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Position {
    pub row: usize,    // Line number (0-based)
    pub column: usize, // Column number (0-based, in bytes)
    pub byte: usize,   // Byte offset from the start of the source code
}

impl Position {
    pub fn new(row: usize, column: usize, byte: usize) -> Self {
        Position { row, column, byte }
    }

    /// A line/column position whose byte offset is unknown.
    pub fn at(row: usize, column: usize) -> Self {
        Position { row, column, byte: 0 }
    }

    /// Line-first ordering key. Byte offsets are deliberately left out so that
    /// positions built from editor coordinates compare against parsed ones.
    pub fn line_col(&self) -> (usize, usize) {
        (self.row, self.column)
    }
}

/// Start (inclusive) and end (exclusive) of a node in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Span { start, end }
    }

    /// Smallest span covering both `first` and `last`.
    pub fn covering(first: Span, last: Span) -> Self {
        let start = if first.start.line_col() <= last.start.line_col() { first.start } else { last.start };
        let end = if first.end.line_col() >= last.end.line_col() { first.end } else { last.end };
        Span { start, end }
    }

    /// `start <= point < end`
    pub fn contains_point(&self, point: Position) -> bool {
        self.start.line_col() <= point.line_col() && point.line_col() < self.end.line_col()
    }

    /// `start <= range.start && range.end <= end`
    pub fn contains_range(&self, start: Position, end: Position) -> bool {
        self.start.line_col() <= start.line_col() && end.line_col() <= self.end.line_col()
    }

    pub fn byte_len(&self) -> usize {
        self.end.byte.saturating_sub(self.start.byte)
    }
}

/// Closed set of node kinds understood by the engine.
///
/// Every dispatch site matches this enum exhaustively, so adding a kind forces
/// each of them to be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SyntaxKind {
    CompilationUnit,
    NamespaceDeclaration,
    FileScopedNamespaceDeclaration,
    ClassDeclaration,
    StructDeclaration,
    InterfaceDeclaration,
    EnumDeclaration,
    RecordDeclaration,
    EnumMemberDeclaration,
    DeclarationList,
    FieldDeclaration,
    EventFieldDeclaration,
    PropertyDeclaration,
    EventDeclaration,
    MethodDeclaration,
    ConstructorDeclaration,
    AccessorList,
    AccessorDeclaration,
    ParameterList,
    Parameter,
    VariableDeclaration,
    VariableDeclarator,
    LocalDeclarationStatement,
    Block,
    ArrowExpressionClause,
    IfStatement,
    ElseClause,
    TryStatement,
    CatchClause,
    FinallyClause,
    ForStatement,
    ForEachStatement,
    WhileStatement,
    DoStatement,
    ExpressionStatement,
    ReturnStatement,
    /// Any other statement (`switch`, `using`, `lock`, `throw`, ...).
    Statement,
    ArgumentList,
    Argument,
    InvocationExpression,
    IdentifierName,
    Literal,
    /// Any other expression.
    Expression,
    /// A node in type position.
    TypeSyntax,
    /// Attributes, type parameter lists, error nodes and everything else.
    Other,
}

impl SyntaxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyntaxKind::CompilationUnit => "CompilationUnit",
            SyntaxKind::NamespaceDeclaration => "NamespaceDeclaration",
            SyntaxKind::FileScopedNamespaceDeclaration => "FileScopedNamespaceDeclaration",
            SyntaxKind::ClassDeclaration => "ClassDeclaration",
            SyntaxKind::StructDeclaration => "StructDeclaration",
            SyntaxKind::InterfaceDeclaration => "InterfaceDeclaration",
            SyntaxKind::EnumDeclaration => "EnumDeclaration",
            SyntaxKind::RecordDeclaration => "RecordDeclaration",
            SyntaxKind::EnumMemberDeclaration => "EnumMemberDeclaration",
            SyntaxKind::DeclarationList => "DeclarationList",
            SyntaxKind::FieldDeclaration => "FieldDeclaration",
            SyntaxKind::EventFieldDeclaration => "EventFieldDeclaration",
            SyntaxKind::PropertyDeclaration => "PropertyDeclaration",
            SyntaxKind::EventDeclaration => "EventDeclaration",
            SyntaxKind::MethodDeclaration => "MethodDeclaration",
            SyntaxKind::ConstructorDeclaration => "ConstructorDeclaration",
            SyntaxKind::AccessorList => "AccessorList",
            SyntaxKind::AccessorDeclaration => "AccessorDeclaration",
            SyntaxKind::ParameterList => "ParameterList",
            SyntaxKind::Parameter => "Parameter",
            SyntaxKind::VariableDeclaration => "VariableDeclaration",
            SyntaxKind::VariableDeclarator => "VariableDeclarator",
            SyntaxKind::LocalDeclarationStatement => "LocalDeclarationStatement",
            SyntaxKind::Block => "Block",
            SyntaxKind::ArrowExpressionClause => "ArrowExpressionClause",
            SyntaxKind::IfStatement => "IfStatement",
            SyntaxKind::ElseClause => "ElseClause",
            SyntaxKind::TryStatement => "TryStatement",
            SyntaxKind::CatchClause => "CatchClause",
            SyntaxKind::FinallyClause => "FinallyClause",
            SyntaxKind::ForStatement => "ForStatement",
            SyntaxKind::ForEachStatement => "ForEachStatement",
            SyntaxKind::WhileStatement => "WhileStatement",
            SyntaxKind::DoStatement => "DoStatement",
            SyntaxKind::ExpressionStatement => "ExpressionStatement",
            SyntaxKind::ReturnStatement => "ReturnStatement",
            SyntaxKind::Statement => "Statement",
            SyntaxKind::ArgumentList => "ArgumentList",
            SyntaxKind::Argument => "Argument",
            SyntaxKind::InvocationExpression => "InvocationExpression",
            SyntaxKind::IdentifierName => "IdentifierName",
            SyntaxKind::Literal => "Literal",
            SyntaxKind::Expression => "Expression",
            SyntaxKind::TypeSyntax => "TypeSyntax",
            SyntaxKind::Other => "Other",
        }
    }

    pub fn is_namespace(&self) -> bool {
        matches!(
            self,
            SyntaxKind::NamespaceDeclaration | SyntaxKind::FileScopedNamespaceDeclaration
        )
    }

    pub fn is_type_declaration(&self) -> bool {
        matches!(
            self,
            SyntaxKind::ClassDeclaration
                | SyntaxKind::StructDeclaration
                | SyntaxKind::InterfaceDeclaration
                | SyntaxKind::EnumDeclaration
                | SyntaxKind::RecordDeclaration
        )
    }

    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            SyntaxKind::Block
                | SyntaxKind::LocalDeclarationStatement
                | SyntaxKind::IfStatement
                | SyntaxKind::TryStatement
                | SyntaxKind::ForStatement
                | SyntaxKind::ForEachStatement
                | SyntaxKind::WhileStatement
                | SyntaxKind::DoStatement
                | SyntaxKind::ExpressionStatement
                | SyntaxKind::ReturnStatement
                | SyntaxKind::Statement
        )
    }

    /// Non-type expressions. Nodes in type position are lowered to
    /// [`SyntaxKind::TypeSyntax`] and never count.
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            SyntaxKind::InvocationExpression
                | SyntaxKind::IdentifierName
                | SyntaxKind::Literal
                | SyntaxKind::Expression
        )
    }
}

impl fmt::Display for SyntaxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The field a node occupies in its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildRole {
    Name,
    Type,
    Condition,
    Consequence,
    Alternative,
    Body,
    Value,
    Accessors,
    Parameters,
    Arguments,
}

impl ChildRole {
    /// Maps a grammar field name to a role; unknown fields carry no role.
    pub fn from_field(field: &str) -> Option<Self> {
        match field {
            "name" => Some(ChildRole::Name),
            "type" | "returns" => Some(ChildRole::Type),
            "condition" => Some(ChildRole::Condition),
            "consequence" => Some(ChildRole::Consequence),
            "alternative" => Some(ChildRole::Alternative),
            "body" => Some(ChildRole::Body),
            "value" => Some(ChildRole::Value),
            "accessors" => Some(ChildRole::Accessors),
            "parameters" => Some(ChildRole::Parameters),
            "arguments" => Some(ChildRole::Arguments),
            _ => None,
        }
    }
}

/// Modifier keywords. Access modifiers are the first four; the rest only
/// matter because a declaration may carry them next to an access modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Modifier {
    Public,
    Private,
    Protected,
    Internal,
    Static,
    Abstract,
    Virtual,
    Override,
    Sealed,
    Readonly,
    Const,
    Async,
    Partial,
    Extern,
    New,
    Unsafe,
    Volatile,
    Required,
    File,
    Ref,
    Fixed,
}

impl Modifier {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "public" => Some(Modifier::Public),
            "private" => Some(Modifier::Private),
            "protected" => Some(Modifier::Protected),
            "internal" => Some(Modifier::Internal),
            "static" => Some(Modifier::Static),
            "abstract" => Some(Modifier::Abstract),
            "virtual" => Some(Modifier::Virtual),
            "override" => Some(Modifier::Override),
            "sealed" => Some(Modifier::Sealed),
            "readonly" => Some(Modifier::Readonly),
            "const" => Some(Modifier::Const),
            "async" => Some(Modifier::Async),
            "partial" => Some(Modifier::Partial),
            "extern" => Some(Modifier::Extern),
            "new" => Some(Modifier::New),
            "unsafe" => Some(Modifier::Unsafe),
            "volatile" => Some(Modifier::Volatile),
            "required" => Some(Modifier::Required),
            "file" => Some(Modifier::File),
            "ref" => Some(Modifier::Ref),
            "fixed" => Some(Modifier::Fixed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Modifier::Public => "public",
            Modifier::Private => "private",
            Modifier::Protected => "protected",
            Modifier::Internal => "internal",
            Modifier::Static => "static",
            Modifier::Abstract => "abstract",
            Modifier::Virtual => "virtual",
            Modifier::Override => "override",
            Modifier::Sealed => "sealed",
            Modifier::Readonly => "readonly",
            Modifier::Const => "const",
            Modifier::Async => "async",
            Modifier::Partial => "partial",
            Modifier::Extern => "extern",
            Modifier::New => "new",
            Modifier::Unsafe => "unsafe",
            Modifier::Volatile => "volatile",
            Modifier::Required => "required",
            Modifier::File => "file",
            Modifier::Ref => "ref",
            Modifier::Fixed => "fixed",
        }
    }

    pub fn is_access(&self) -> bool {
        matches!(
            self,
            Modifier::Public | Modifier::Private | Modifier::Protected | Modifier::Internal
        )
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An anonymous token (keyword or punctuation) directly under a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub span: Span,
}

/// Index of a node inside its [`SyntaxTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: SyntaxKind,
    grammar_kind: &'static str,
    role: Option<ChildRole>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    name: Option<String>,
    modifiers: BTreeSet<Modifier>,
    span: Span,
    tokens: Vec<Token>,
}

/// An immutable, parent-linked syntax tree for one source file.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    nodes: Vec<NodeData>,
    path: Option<PathBuf>,
    source: Rope,
}

impl SyntaxTree {
    pub fn root(&self) -> NodeRef<'_> {
        NodeRef { tree: self, id: NodeId(0) }
    }

    /// Number of nodes in the tree (always at least one: the root).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn source(&self) -> &Rope {
        &self.source
    }

    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_>> {
        (id.0 < self.nodes.len()).then_some(NodeRef { tree: self, id })
    }

    /// Depth-first pre-order iterator over every node of the tree.
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder {
            tree: self,
            stack: vec![NodeId(0)],
        }
    }

    /// Slices the source by byte range, returning an empty string on an
    /// invalid range.
    fn slice(&self, span: &Span) -> String {
        let (start, end) = (span.start.byte, span.end.byte);
        if end > self.source.len_bytes() || start > end {
            warn!("Invalid byte range {}-{} (source len={})", start, end, self.source.len_bytes());
            return String::new();
        }
        self.source.byte_slice(start..end).to_string()
    }
}

/// Copyable handle to one node of a [`SyntaxTree`].
#[derive(Clone, Copy)]
pub struct NodeRef<'t> {
    tree: &'t SyntaxTree,
    id: NodeId,
}

impl<'t> NodeRef<'t> {
    fn data(&self) -> &'t NodeData {
        &self.tree.nodes[self.id.0]
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'t SyntaxTree {
        self.tree
    }

    pub fn kind(&self) -> SyntaxKind {
        self.data().kind
    }

    /// Raw kind reported by the front end, for diagnostics only.
    pub fn grammar_kind(&self) -> &'static str {
        self.data().grammar_kind
    }

    pub fn role(&self) -> Option<ChildRole> {
        self.data().role
    }

    pub fn parent(&self) -> Option<NodeRef<'t>> {
        self.data().parent.map(|id| NodeRef { tree: self.tree, id })
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'t>> + use<'t> {
        let tree = self.tree;
        self.data().children.iter().map(move |&id| NodeRef { tree, id })
    }

    pub fn child_count(&self) -> usize {
        self.data().children.len()
    }

    pub fn first_child_of_kind(&self, kind: SyntaxKind) -> Option<NodeRef<'t>> {
        self.children().find(|child| child.kind() == kind)
    }

    pub fn has_child_of_kind(&self, kind: SyntaxKind) -> bool {
        self.first_child_of_kind(kind).is_some()
    }

    /// Declared name, if the front end recorded one.
    pub fn name(&self) -> Option<&'t str> {
        self.data().name.as_deref()
    }

    pub fn modifiers(&self) -> &'t BTreeSet<Modifier> {
        &self.data().modifiers
    }

    pub fn has_modifier(&self, modifier: Modifier) -> bool {
        self.data().modifiers.contains(&modifier)
    }

    pub fn span(&self) -> Span {
        self.data().span
    }

    pub fn tokens(&self) -> &'t [Token] {
        &self.data().tokens
    }

    /// First direct token with the given text.
    pub fn token(&self, text: &str) -> Option<&'t Token> {
        self.data().tokens.iter().find(|token| token.text == text)
    }

    /// Source text covered by the node.
    pub fn text(&self) -> String {
        self.tree.slice(&self.data().span)
    }

    pub fn path(&self) -> Option<&'t Path> {
        self.tree.path()
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors(&self) -> Ancestors<'t> {
        Ancestors { next: self.parent() }
    }

    /// Strict descendant check through parent links.
    pub fn is_descendant_of(&self, other: NodeRef<'_>) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.ancestors().any(|ancestor| ancestor.id == other.id)
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl Eq for NodeRef<'_> {}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let span = self.span();
        write!(
            f,
            "{}#{}@{}:{}-{}:{}",
            self.kind(),
            self.id.0,
            span.start.row,
            span.start.column,
            span.end.row,
            span.end.column
        )?;
        if let Some(name) = self.name() {
            write!(f, "({})", name)?;
        }
        Ok(())
    }
}

/// Iterator returned by [`NodeRef::ancestors`].
pub struct Ancestors<'t> {
    next: Option<NodeRef<'t>>,
}

impl<'t> Iterator for Ancestors<'t> {
    type Item = NodeRef<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent();
        Some(current)
    }
}

/// Iterator returned by [`SyntaxTree::preorder`].
pub struct Preorder<'t> {
    tree: &'t SyntaxTree,
    stack: Vec<NodeId>,
}

impl<'t> Iterator for Preorder<'t> {
    type Item = NodeRef<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let data = self.tree.nodes.get(id.0)?;
        self.stack.extend(data.children.iter().rev().copied());
        Some(NodeRef { tree: self.tree, id })
    }
}

/// Incremental builder used by front ends (and tests) to assemble a tree.
///
/// Nodes are opened with [`start_node`](Self::start_node) and closed with
/// [`finish_node`](Self::finish_node); the first node opened becomes the root.
pub struct SyntaxTreeBuilder {
    nodes: Vec<NodeData>,
    open: Vec<NodeId>,
    path: Option<PathBuf>,
    source: Rope,
}

impl SyntaxTreeBuilder {
    pub fn new(source: Rope, path: Option<PathBuf>) -> Self {
        SyntaxTreeBuilder {
            nodes: Vec::new(),
            open: Vec::new(),
            path,
            source,
        }
    }

    pub fn from_text(text: &str, path: Option<PathBuf>) -> Self {
        Self::new(Rope::from_str(text), path)
    }

    /// Opens a node as the last child of the currently open node.
    ///
    /// Fails when a root has already been closed, since a tree has exactly one
    /// root.
    pub fn start_node(&mut self, kind: SyntaxKind, span: Span) -> Result<NodeId, QueryError> {
        let parent = self.open.last().copied();
        if parent.is_none() && !self.nodes.is_empty() {
            return Err(QueryError::invalid_argument(
                "kind",
                format!("cannot open a second root ({})", kind),
            ));
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            grammar_kind: kind.as_str(),
            role: None,
            parent,
            children: Vec::new(),
            name: None,
            modifiers: BTreeSet::new(),
            span,
            tokens: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        self.open.push(id);
        Ok(id)
    }

    /// Closes the most recently opened node.
    pub fn finish_node(&mut self) -> Result<NodeId, QueryError> {
        self.open
            .pop()
            .ok_or_else(|| QueryError::invalid_argument("finish_node", "no node is open"))
    }

    pub fn set_grammar_kind(&mut self, id: NodeId, grammar_kind: &'static str) {
        self.nodes[id.0].grammar_kind = grammar_kind;
    }

    pub fn set_role(&mut self, id: NodeId, role: ChildRole) {
        self.nodes[id.0].role = Some(role);
    }

    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) {
        self.nodes[id.0].name = Some(name.into());
    }

    pub fn add_modifier(&mut self, id: NodeId, modifier: Modifier) {
        self.nodes[id.0].modifiers.insert(modifier);
    }

    pub fn push_token(&mut self, id: NodeId, token: Token) {
        self.nodes[id.0].tokens.push(token);
    }

    pub fn finish(self) -> Result<SyntaxTree, QueryError> {
        if self.nodes.is_empty() {
            return Err(QueryError::invalid_argument("builder", "tree has no root"));
        }
        if !self.open.is_empty() {
            return Err(QueryError::invalid_argument(
                "builder",
                format!("{} node(s) still open", self.open.len()),
            ));
        }
        Ok(SyntaxTree {
            nodes: self.nodes,
            path: self.path,
            source: self.source,
        })
    }
}
