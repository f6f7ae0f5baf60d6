//! Identifier and full-name resolution
//!
//! Resolution dispatches on [`SyntaxKind`]. Declarations report their declared
//! name. Field, event-field and local declarations report their first
//! declarator, since one statement may declare several variables. Namespaces
//! report their dotted path. Arguments report their whole source text, as they
//! have no name of their own.

use tracing::trace;

use crate::error::QueryError;
use crate::ir::node::{NodeRef, SyntaxKind};

/// Resolves the human-readable identifier of a node.
///
/// # Returns
/// `None` when the node kind carries no identifier. This is not an error; use
/// [`required_identifier`] when resolution must succeed.
pub fn identifier(node: NodeRef<'_>) -> Option<String> {
    match node.kind() {
        SyntaxKind::ClassDeclaration
        | SyntaxKind::StructDeclaration
        | SyntaxKind::InterfaceDeclaration
        | SyntaxKind::EnumDeclaration
        | SyntaxKind::RecordDeclaration
        | SyntaxKind::EnumMemberDeclaration
        | SyntaxKind::PropertyDeclaration
        | SyntaxKind::EventDeclaration
        | SyntaxKind::MethodDeclaration
        | SyntaxKind::ConstructorDeclaration
        | SyntaxKind::Parameter
        | SyntaxKind::VariableDeclarator => node.name().map(str::to_string),

        SyntaxKind::FieldDeclaration
        | SyntaxKind::EventFieldDeclaration
        | SyntaxKind::LocalDeclarationStatement => declarators(node).next().and_then(|d| d.name().map(str::to_string)),

        SyntaxKind::NamespaceDeclaration | SyntaxKind::FileScopedNamespaceDeclaration => node
            .name()
            .map(|name| name.chars().filter(|c| !c.is_whitespace()).collect()),

        SyntaxKind::Argument => Some(node.text()),

        SyntaxKind::CompilationUnit
        | SyntaxKind::DeclarationList
        | SyntaxKind::AccessorList
        | SyntaxKind::AccessorDeclaration
        | SyntaxKind::ParameterList
        | SyntaxKind::VariableDeclaration
        | SyntaxKind::Block
        | SyntaxKind::ArrowExpressionClause
        | SyntaxKind::IfStatement
        | SyntaxKind::ElseClause
        | SyntaxKind::TryStatement
        | SyntaxKind::CatchClause
        | SyntaxKind::FinallyClause
        | SyntaxKind::ForStatement
        | SyntaxKind::ForEachStatement
        | SyntaxKind::WhileStatement
        | SyntaxKind::DoStatement
        | SyntaxKind::ExpressionStatement
        | SyntaxKind::ReturnStatement
        | SyntaxKind::Statement
        | SyntaxKind::ArgumentList
        | SyntaxKind::InvocationExpression
        | SyntaxKind::IdentifierName
        | SyntaxKind::Literal
        | SyntaxKind::Expression
        | SyntaxKind::TypeSyntax
        | SyntaxKind::Other => None,
    }
}

/// Like [`identifier`], but a node without one is an error.
pub fn required_identifier(node: NodeRef<'_>) -> Result<String, QueryError> {
    identifier(node).ok_or(QueryError::MissingIdentifier(node.kind()))
}

/// Every name declared by a field, event-field or local declaration, in
/// source order. Other nodes yield their single identifier, if any.
pub fn declared_identifiers(node: NodeRef<'_>) -> Vec<String> {
    match node.kind() {
        SyntaxKind::FieldDeclaration
        | SyntaxKind::EventFieldDeclaration
        | SyntaxKind::LocalDeclarationStatement => declarators(node)
            .filter_map(|declarator| declarator.name().map(str::to_string))
            .collect(),
        _ => identifier(node).into_iter().collect(),
    }
}

/// Builds the dotted name of a node from its enclosing declarations.
///
/// Only namespaces, type declarations and member declarations contribute a
/// segment; blocks, statements and lists in between are skipped.
///
/// # Arguments
/// * `node` - The node to name
/// * `skip_namespaces` - Leave namespace segments out of the result
///
/// # Returns
/// `Zoo.Cat.lives` for a field `lives` in class `Cat` in namespace `Zoo`, or
/// [`QueryError::MissingIdentifier`] when the node itself has no identifier.
pub fn full_name(node: NodeRef<'_>, skip_namespaces: bool) -> Result<String, QueryError> {
    let mut segments = vec![required_identifier(node)?];

    for ancestor in node.ancestors() {
        let kind = ancestor.kind();
        if !contributes_segment(kind) || (skip_namespaces && kind.is_namespace()) {
            continue;
        }
        if let Some(segment) = identifier(ancestor) {
            segments.push(segment);
        }
    }

    segments.reverse();
    let name = segments.join(".");
    trace!("Resolved full name {} for {:?}", name, node);
    Ok(name)
}

fn contributes_segment(kind: SyntaxKind) -> bool {
    kind.is_namespace()
        || kind.is_type_declaration()
        || matches!(
            kind,
            SyntaxKind::MethodDeclaration
                | SyntaxKind::ConstructorDeclaration
                | SyntaxKind::PropertyDeclaration
                | SyntaxKind::EventDeclaration
        )
}

/// Variable declarators of a field, event-field or local declaration, found
/// through its variable declaration child.
fn declarators<'t>(node: NodeRef<'t>) -> impl Iterator<Item = NodeRef<'t>> + 't {
    node.first_child_of_kind(SyntaxKind::VariableDeclaration)
        .into_iter()
        .flat_map(|declaration| declaration.children())
        .filter(|child| child.kind() == SyntaxKind::VariableDeclarator)
}
