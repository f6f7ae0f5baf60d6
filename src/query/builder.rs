//! Compiles a [`QueryDescriptor`] into matcher sets
//!
//! The mapping is closed: every descriptor enum variant has an explicit arm,
//! so a new variant does not compile until it is given a translation.

use tracing::debug;

use crate::error::QueryError;
use crate::ir::node::{Modifier, NodeRef, SyntaxKind};
use crate::ir::virtual_node::CombinedNode;
use crate::query::descriptor::{AccessModifier, QueryDescriptor, ScopeKind, TargetKind};
use crate::query::matchers::{
    AccessModifierMatcher, AndMatcher, KnownTargetMatcher, NameMatcher, NodeMatcher, PathMatcher,
    PositionMatcher, TextSpan, TypeMatcher,
};

/// An immutable, compiled query.
///
/// Each matcher set is an implicit AND. An empty set places no constraint.
#[derive(Debug, Default)]
pub struct Query {
    target_matchers: Vec<Box<dyn NodeMatcher>>,
    scope_matchers: Vec<Box<dyn NodeMatcher>>,
    access_matchers: Vec<Box<dyn NodeMatcher>>,
    path_matchers: Vec<Box<dyn NodeMatcher>>,
}

impl Query {
    pub fn target_matchers(&self) -> &[Box<dyn NodeMatcher>] {
        &self.target_matchers
    }

    pub fn scope_matchers(&self) -> &[Box<dyn NodeMatcher>] {
        &self.scope_matchers
    }

    pub fn access_matchers(&self) -> &[Box<dyn NodeMatcher>] {
        &self.access_matchers
    }

    pub fn path_matchers(&self) -> &[Box<dyn NodeMatcher>] {
        &self.path_matchers
    }

    pub fn has_target(&self) -> bool {
        !self.target_matchers.is_empty()
    }

    pub fn has_scope(&self) -> bool {
        !self.scope_matchers.is_empty()
    }

    pub fn has_access_modifiers(&self) -> bool {
        !self.access_matchers.is_empty()
    }

    pub fn has_path_matchers(&self) -> bool {
        !self.path_matchers.is_empty()
    }

    /// Target, access and path matchers all accept the candidate. Scope is
    /// checked separately by the walker, which owns the scope cursor.
    pub fn matches(&self, candidate: &CombinedNode<'_>) -> bool {
        all(&self.target_matchers, candidate)
            && all(&self.access_matchers, candidate)
            && all(&self.path_matchers, candidate)
    }

    /// Whether a real node opens a scope that later targets must sit inside.
    pub fn is_scope(&self, node: NodeRef<'_>) -> bool {
        self.has_scope() && all(&self.scope_matchers, &CombinedNode::Real(node))
    }
}

fn all(matchers: &[Box<dyn NodeMatcher>], candidate: &CombinedNode<'_>) -> bool {
    matchers.iter().all(|matcher| matcher.matches(candidate))
}

/// Stateless compiler from descriptors (or spans) to [`Query`] values.
pub struct QueryBuilder;

impl QueryBuilder {
    /// Compiles a descriptor.
    ///
    /// # Errors
    /// Propagates matcher construction failures: blank names or paths
    /// ([`QueryError::InvalidArgument`]) and malformed regexes
    /// ([`QueryError::InvalidRegex`]).
    pub fn build(descriptor: &QueryDescriptor) -> Result<Query, QueryError> {
        let mut query = Query::default();

        if let Some(kinds) = target_kinds(descriptor.target) {
            query.target_matchers.push(Box::new(TypeMatcher::new(kinds.iter().copied())?));
        }

        if !descriptor.name_contains.is_empty() || !descriptor.name_excludes.is_empty() {
            let contains = descriptor.name_contains.iter().cloned();
            let excludes = descriptor.name_excludes.iter().cloned();
            let matcher = if descriptor.regex {
                NameMatcher::regex(contains, excludes)?
            } else {
                NameMatcher::literal(contains, excludes)?
            };
            query.target_matchers.push(Box::new(matcher));
        }

        if let Some(modifiers) = access_modifiers(descriptor.access) {
            query
                .access_matchers
                .push(Box::new(AccessModifierMatcher::new(modifiers.iter().copied())?));
        }

        let scope_kinds = scope_kinds(descriptor.scope);
        if let Some(kinds) = scope_kinds {
            query.scope_matchers.push(Box::new(TypeMatcher::new(kinds.iter().copied())?));
        }
        if let Some(scope_name) = &descriptor.scope_name {
            let kinds = scope_kinds.unwrap_or(ALL_SCOPE_KINDS);
            let matcher = if descriptor.regex {
                NameMatcher::regex([scope_name.clone()], Vec::<String>::new())?
            } else {
                NameMatcher::literal([scope_name.clone()], Vec::<String>::new())?
            };
            query
                .scope_matchers
                .push(Box::new(matcher.with_kinds(kinds.iter().copied())));
        }

        for fragment in &descriptor.path_contains {
            let matcher = if descriptor.regex {
                PathMatcher::regex(fragment.clone())?
            } else {
                PathMatcher::literal(fragment.clone())?
            };
            query.path_matchers.push(Box::new(matcher));
        }

        debug!(
            "Compiled query: {} target, {} scope, {} access, {} path matcher(s)",
            query.target_matchers.len(),
            query.scope_matchers.len(),
            query.access_matchers.len(),
            query.path_matchers.len()
        );
        Ok(query)
    }

    /// Builds a "what is here" query: a known target kind whose effective
    /// span contains `span`.
    pub fn from_span(span: TextSpan) -> Query {
        debug!("Compiled position query at {:?}", span);
        Query {
            target_matchers: vec![Box::new(AndMatcher::new(
                Box::new(KnownTargetMatcher),
                Box::new(PositionMatcher::new(span)),
            ))],
            ..Query::default()
        }
    }
}

const NAMESPACE_KINDS: &[SyntaxKind] = &[
    SyntaxKind::NamespaceDeclaration,
    SyntaxKind::FileScopedNamespaceDeclaration,
];

const ALL_SCOPE_KINDS: &[SyntaxKind] = &[
    SyntaxKind::NamespaceDeclaration,
    SyntaxKind::FileScopedNamespaceDeclaration,
    SyntaxKind::ClassDeclaration,
    SyntaxKind::StructDeclaration,
    SyntaxKind::InterfaceDeclaration,
];

fn target_kinds(target: TargetKind) -> Option<&'static [SyntaxKind]> {
    match target {
        TargetKind::Any => None,
        TargetKind::Namespace => Some(NAMESPACE_KINDS),
        TargetKind::Class => Some(&[SyntaxKind::ClassDeclaration]),
        TargetKind::Struct => Some(&[SyntaxKind::StructDeclaration]),
        TargetKind::Enum => Some(&[SyntaxKind::EnumDeclaration]),
        TargetKind::Interface => Some(&[SyntaxKind::InterfaceDeclaration]),
        TargetKind::Field => Some(&[SyntaxKind::FieldDeclaration]),
        TargetKind::Property => Some(&[SyntaxKind::PropertyDeclaration]),
        TargetKind::Method => Some(&[SyntaxKind::MethodDeclaration]),
        TargetKind::LocalVariable => Some(&[SyntaxKind::LocalDeclarationStatement]),
        TargetKind::Parameter => Some(&[SyntaxKind::Parameter]),
        TargetKind::Argument => Some(&[SyntaxKind::Argument]),
    }
}

fn access_modifiers(access: AccessModifier) -> Option<&'static [Modifier]> {
    match access {
        AccessModifier::Any => None,
        AccessModifier::Public => Some(&[Modifier::Public]),
        AccessModifier::Private => Some(&[Modifier::Private]),
        AccessModifier::Protected => Some(&[Modifier::Protected]),
        AccessModifier::Internal => Some(&[Modifier::Internal]),
        AccessModifier::ProtectedInternal => Some(&[Modifier::Protected, Modifier::Internal]),
        AccessModifier::PrivateProtected => Some(&[Modifier::Private, Modifier::Protected]),
    }
}

fn scope_kinds(scope: ScopeKind) -> Option<&'static [SyntaxKind]> {
    match scope {
        ScopeKind::Any => None,
        ScopeKind::Namespace => Some(NAMESPACE_KINDS),
        ScopeKind::Class => Some(&[SyntaxKind::ClassDeclaration]),
        ScopeKind::Struct => Some(&[SyntaxKind::StructDeclaration]),
        ScopeKind::Interface => Some(&[SyntaxKind::InterfaceDeclaration]),
    }
}
