//! C# Tree-Sitter CST to syntax tree lowering
//!
//! Lowering walks the concrete syntax tree once and feeds a
//! [`SyntaxTreeBuilder`]. Along the way it:
//!
//! - folds `modifier` nodes into the declaring node's modifier set,
//! - records declaration names instead of emitting name nodes,
//! - keeps anonymous tokens (`(`, `)`, keywords) on their parent node,
//! - drops comments and other extras,
//! - wraps the `else` branch of an if statement in a synthetic
//!   [`SyntaxKind::ElseClause`] node,
//! - nests the declarations following `namespace Zoo;` inside the file-scoped
//!   namespace node,
//! - records a `foreach` loop variable as the statement's name,
//! - classifies everything in type position as [`SyntaxKind::TypeSyntax`].

use ropey::Rope;
use tracing::{trace, warn};
use tree_sitter::Node as TSNode;

use crate::error::QueryError;
use crate::ir::node::{
    ChildRole, Modifier, NodeId, Position, Span, SyntaxKind, SyntaxTreeBuilder, Token,
};

/// Grammar kind recorded on synthetic else clauses.
const ELSE_CLAUSE_KIND: &str = "else_clause";

const FILE_SCOPED_NAMESPACE_KIND: &str = "file_scoped_namespace_declaration";

/// Safely slice a rope by byte range, returning empty string on invalid range
pub(crate) fn safe_byte_slice(rope: &Rope, start: usize, end: usize) -> String {
    if end > rope.len_bytes() || start > end {
        warn!(
            "Invalid byte range {}-{} (rope len={})",
            start,
            end,
            rope.len_bytes()
        );
        return String::new();
    }
    rope.byte_slice(start..end).to_string()
}

fn span_of(node: TSNode) -> Span {
    let start = node.start_position();
    let end = node.end_position();
    Span::new(
        Position::new(start.row, start.column, node.start_byte()),
        Position::new(end.row, end.column, node.end_byte()),
    )
}

/// Maps a grammar kind to a [`SyntaxKind`].
///
/// # Arguments
/// * `grammar_kind` - Tree-Sitter kind of a named node
/// * `in_type` - Whether the node sits in type position
pub(crate) fn classify(grammar_kind: &str, in_type: bool) -> SyntaxKind {
    if in_type {
        return SyntaxKind::TypeSyntax;
    }
    match grammar_kind {
        "compilation_unit" => SyntaxKind::CompilationUnit,
        "namespace_declaration" => SyntaxKind::NamespaceDeclaration,
        "file_scoped_namespace_declaration" => SyntaxKind::FileScopedNamespaceDeclaration,
        "class_declaration" => SyntaxKind::ClassDeclaration,
        "struct_declaration" => SyntaxKind::StructDeclaration,
        "interface_declaration" => SyntaxKind::InterfaceDeclaration,
        "enum_declaration" => SyntaxKind::EnumDeclaration,
        "record_declaration" | "record_struct_declaration" => SyntaxKind::RecordDeclaration,
        "enum_member_declaration" => SyntaxKind::EnumMemberDeclaration,
        "declaration_list" | "enum_member_declaration_list" => SyntaxKind::DeclarationList,
        "field_declaration" => SyntaxKind::FieldDeclaration,
        "event_field_declaration" => SyntaxKind::EventFieldDeclaration,
        "property_declaration" => SyntaxKind::PropertyDeclaration,
        "event_declaration" => SyntaxKind::EventDeclaration,
        "method_declaration" => SyntaxKind::MethodDeclaration,
        "constructor_declaration" => SyntaxKind::ConstructorDeclaration,
        "accessor_list" => SyntaxKind::AccessorList,
        "accessor_declaration" => SyntaxKind::AccessorDeclaration,
        "parameter_list" | "bracketed_parameter_list" => SyntaxKind::ParameterList,
        "parameter" => SyntaxKind::Parameter,
        "variable_declaration" => SyntaxKind::VariableDeclaration,
        "variable_declarator" => SyntaxKind::VariableDeclarator,
        "local_declaration_statement" => SyntaxKind::LocalDeclarationStatement,
        "block" => SyntaxKind::Block,
        "arrow_expression_clause" => SyntaxKind::ArrowExpressionClause,
        "if_statement" => SyntaxKind::IfStatement,
        "try_statement" => SyntaxKind::TryStatement,
        "catch_clause" => SyntaxKind::CatchClause,
        "finally_clause" => SyntaxKind::FinallyClause,
        "for_statement" => SyntaxKind::ForStatement,
        "foreach_statement" => SyntaxKind::ForEachStatement,
        "while_statement" => SyntaxKind::WhileStatement,
        "do_statement" => SyntaxKind::DoStatement,
        "expression_statement" => SyntaxKind::ExpressionStatement,
        "return_statement" => SyntaxKind::ReturnStatement,
        "argument_list" => SyntaxKind::ArgumentList,
        "argument" => SyntaxKind::Argument,
        "invocation_expression" => SyntaxKind::InvocationExpression,
        "identifier" => SyntaxKind::IdentifierName,
        "predefined_type" | "implicit_type" | "array_type" | "nullable_type" | "pointer_type"
        | "tuple_type" | "function_pointer_type" | "ref_type" | "scoped_type" => SyntaxKind::TypeSyntax,
        "generic_name" | "this" | "base" => SyntaxKind::Expression,
        kind if kind.ends_with("_literal") => SyntaxKind::Literal,
        kind if kind.ends_with("_statement") => SyntaxKind::Statement,
        kind if kind.ends_with("_expression") => SyntaxKind::Expression,
        _ => SyntaxKind::Other,
    }
}

/// Kinds whose `name` field is recorded as the node's name.
fn takes_name(kind: SyntaxKind) -> bool {
    kind.is_namespace()
        || kind.is_type_declaration()
        || matches!(
            kind,
            SyntaxKind::EnumMemberDeclaration
                | SyntaxKind::PropertyDeclaration
                | SyntaxKind::EventDeclaration
                | SyntaxKind::MethodDeclaration
                | SyntaxKind::ConstructorDeclaration
                | SyntaxKind::Parameter
                | SyntaxKind::VariableDeclarator
        )
}

/// Kinds whose modifier keywords are collected.
fn carries_modifiers(kind: SyntaxKind) -> bool {
    takes_name(kind)
        || matches!(
            kind,
            SyntaxKind::FieldDeclaration
                | SyntaxKind::EventFieldDeclaration
                | SyntaxKind::LocalDeclarationStatement
                | SyntaxKind::AccessorDeclaration
        )
}

fn is_type_field(field: Option<&str>) -> bool {
    matches!(field, Some("type") | Some("returns"))
}

/// Lowers one Tree-Sitter tree into a [`SyntaxTreeBuilder`].
pub(crate) struct Lowering<'a> {
    builder: SyntaxTreeBuilder,
    rope: &'a Rope,
}

impl<'a> Lowering<'a> {
    pub(crate) fn new(builder: SyntaxTreeBuilder, rope: &'a Rope) -> Self {
        Self { builder, rope }
    }

    pub(crate) fn into_builder(self) -> SyntaxTreeBuilder {
        self.builder
    }

    fn text(&self, node: TSNode) -> String {
        safe_byte_slice(self.rope, node.start_byte(), node.end_byte())
    }

    /// Converts `node` and its subtree.
    ///
    /// # Arguments
    /// * `node` - The Tree-Sitter node to convert
    /// * `field` - Field the node occupies in its parent, if any
    /// * `in_type` - Whether an ancestor already sits in type position
    pub(crate) fn lower_node(
        &mut self,
        node: TSNode,
        field: Option<&str>,
        in_type: bool,
    ) -> Result<NodeId, QueryError> {
        self.open_node(node, field, in_type, span_of(node))?;
        self.builder.finish_node()
    }

    /// Like [`lower_node`](Self::lower_node), but leaves the node open so
    /// that later siblings can be lowered into it.
    fn open_node(
        &mut self,
        node: TSNode,
        field: Option<&str>,
        in_type: bool,
        span: Span,
    ) -> Result<NodeId, QueryError> {
        let in_type = in_type || is_type_field(field);
        let kind = classify(node.kind(), in_type);
        trace!("Lowering {} as {} at {:?}", node.kind(), kind, node.start_position());

        let id = self.builder.start_node(kind, span)?;
        self.builder.set_grammar_kind(id, node.kind());
        if let Some(role) = field.and_then(ChildRole::from_field) {
            self.builder.set_role(id, role);
        }

        self.lower_children(node, id, kind, in_type || kind == SyntaxKind::TypeSyntax)?;
        Ok(id)
    }

    fn lower_children(
        &mut self,
        node: TSNode,
        id: NodeId,
        kind: SyntaxKind,
        in_type: bool,
    ) -> Result<(), QueryError> {
        let mut cursor = node.walk();
        if !cursor.goto_first_child() {
            return Ok(());
        }

        let mut pending_else: Option<Token> = None;
        let mut file_namespace_open = false;
        loop {
            let child = cursor.node();
            let field = cursor.field_name();

            if child.is_extra() || child.is_missing() {
                trace!("Skipping {} at {:?}", child.kind(), child.start_position());
            } else if !child.is_named() {
                let token = Token {
                    text: child.kind().to_string(),
                    span: span_of(child),
                };
                if kind == SyntaxKind::IfStatement && token.text == "else" {
                    pending_else = Some(token);
                } else {
                    // Some grammar versions inline modifier keywords.
                    if carries_modifiers(kind) {
                        if let Some(modifier) = Modifier::from_keyword(&token.text) {
                            self.builder.add_modifier(id, modifier);
                        }
                    }
                    self.builder.push_token(id, token);
                }
            } else if child.kind() == "modifier" && carries_modifiers(kind) {
                let keyword = self.text(child);
                match Modifier::from_keyword(keyword.trim()) {
                    Some(modifier) => self.builder.add_modifier(id, modifier),
                    None => trace!("Ignoring modifier `{}`", keyword.trim()),
                }
            } else if field == Some("name") && takes_name(kind) {
                let name = self.text(child);
                self.builder.set_name(id, name);
            } else if field == Some("left") && kind == SyntaxKind::ForEachStatement {
                // The loop variable is a declaration, not an expression.
                let name = self.text(child);
                self.builder.set_name(id, name);
            } else if kind == SyntaxKind::CompilationUnit
                && child.kind() == FILE_SCOPED_NAMESPACE_KIND
                && !file_namespace_open
            {
                // `namespace Zoo;` owns every declaration after it.
                let span = Span::new(span_of(child).start, span_of(node).end);
                self.open_node(child, field, in_type, span)?;
                file_namespace_open = true;
            } else if let Some(else_token) = pending_else.take() {
                self.lower_else_clause(else_token, child, in_type)?;
            } else {
                self.lower_node(child, field, in_type)?;
            }

            if !cursor.goto_next_sibling() {
                break;
            }
        }

        if file_namespace_open {
            self.builder.finish_node()?;
        }
        if let Some(dangling) = pending_else {
            self.builder.push_token(id, dangling);
        }
        Ok(())
    }

    /// Wraps the alternative of an if statement, together with its `else`
    /// keyword, in an else clause node.
    fn lower_else_clause(
        &mut self,
        else_token: Token,
        alternative: TSNode,
        in_type: bool,
    ) -> Result<(), QueryError> {
        let span = Span::new(else_token.span.start, span_of(alternative).end);
        let clause = self.builder.start_node(SyntaxKind::ElseClause, span)?;
        self.builder.set_grammar_kind(clause, ELSE_CLAUSE_KIND);
        self.builder.set_role(clause, ChildRole::Alternative);
        self.builder.push_token(clause, else_token);
        self.lower_node(alternative, None, in_type)?;
        self.builder.finish_node()?;
        Ok(())
    }
}
