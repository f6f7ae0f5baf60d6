//! Composable node predicates
//!
//! Every matcher is a small value closed over the configuration captured at
//! construction. [`NodeMatcher::matches`] is a pure function of the candidate
//! and that configuration, so one matcher can be shared across threads and
//! evaluated any number of times.
//!
//! Matchers evaluate the candidate's *anchor* (see
//! [`CombinedNode::anchor`]): a virtual replacement is tested as the node it
//! stands in for, a method body as the body container. Only
//! [`PositionMatcher`] looks at the candidate's own effective span.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use regex::Regex;
use tracing::trace;

use crate::error::QueryError;
use crate::ir::node::{Modifier, Position, SyntaxKind};
use crate::ir::virtual_node::CombinedNode;

/// A predicate over one result-stream candidate.
pub trait NodeMatcher: Send + Sync + fmt::Debug {
    /// Returns `true` if the candidate satisfies the predicate.
    fn matches(&self, node: &CombinedNode<'_>) -> bool;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Kinds a "what is here" query may resolve to.
const KNOWN_TARGET_KINDS: &[SyntaxKind] = &[
    SyntaxKind::NamespaceDeclaration,
    SyntaxKind::FileScopedNamespaceDeclaration,
    SyntaxKind::ClassDeclaration,
    SyntaxKind::StructDeclaration,
    SyntaxKind::EnumDeclaration,
    SyntaxKind::InterfaceDeclaration,
    SyntaxKind::FieldDeclaration,
    SyntaxKind::PropertyDeclaration,
    SyntaxKind::MethodDeclaration,
    SyntaxKind::LocalDeclarationStatement,
    SyntaxKind::Parameter,
    SyntaxKind::Argument,
];

/// Matches when the anchor's kind is one of a fixed set.
#[derive(Debug, Clone)]
pub struct TypeMatcher {
    kinds: Vec<SyntaxKind>,
}

impl TypeMatcher {
    pub fn new(kinds: impl IntoIterator<Item = SyntaxKind>) -> Result<Self, QueryError> {
        let kinds: Vec<_> = kinds.into_iter().collect();
        if kinds.is_empty() {
            return Err(QueryError::invalid_argument("kinds", "at least one kind is required"));
        }
        Ok(Self { kinds })
    }

    pub fn kinds(&self) -> &[SyntaxKind] {
        &self.kinds
    }
}

impl NodeMatcher for TypeMatcher {
    fn matches(&self, node: &CombinedNode<'_>) -> bool {
        self.kinds.contains(&node.kind())
    }

    fn name(&self) -> &'static str {
        "type"
    }
}

/// Matches real nodes of a known queryable kind and every virtual node.
#[derive(Debug, Clone, Copy, Default)]
pub struct KnownTargetMatcher;

impl NodeMatcher for KnownTargetMatcher {
    fn matches(&self, node: &CombinedNode<'_>) -> bool {
        match node {
            CombinedNode::Real(real) => KNOWN_TARGET_KINDS.contains(&real.kind()),
            CombinedNode::Virtual(_) => true,
        }
    }

    fn name(&self) -> &'static str {
        "known_target"
    }
}

/// Matches when every required modifier is present on the anchor. Extra
/// modifiers on the node are irrelevant.
#[derive(Debug, Clone)]
pub struct AccessModifierMatcher {
    required: BTreeSet<Modifier>,
}

impl AccessModifierMatcher {
    /// # Errors
    /// An empty set is rejected: "any modifier" is expressed by not adding
    /// an access matcher at all.
    pub fn new(required: impl IntoIterator<Item = Modifier>) -> Result<Self, QueryError> {
        let required: BTreeSet<_> = required.into_iter().collect();
        if required.is_empty() {
            return Err(QueryError::invalid_argument(
                "modifiers",
                "an empty modifier set means any access and must be omitted",
            ));
        }
        Ok(Self { required })
    }

    pub fn required(&self) -> &BTreeSet<Modifier> {
        &self.required
    }
}

impl NodeMatcher for AccessModifierMatcher {
    fn matches(&self, node: &CombinedNode<'_>) -> bool {
        let present = node.anchor().modifiers();
        self.required.intersection(present).count() == self.required.len()
    }

    fn name(&self) -> &'static str {
        "access_modifier"
    }
}

/// A literal substring or a compiled regex.
#[derive(Debug, Clone)]
enum TextPattern {
    Literal(String),
    Regex(Regex),
}

impl TextPattern {
    fn literal(argument: &'static str, text: impl Into<String>) -> Result<Self, QueryError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QueryError::invalid_argument(argument, "pattern must not be blank"));
        }
        Ok(TextPattern::Literal(text))
    }

    fn regex(argument: &'static str, pattern: impl Into<String>) -> Result<Self, QueryError> {
        let pattern = pattern.into();
        if pattern.trim().is_empty() {
            return Err(QueryError::invalid_argument(argument, "pattern must not be blank"));
        }
        Regex::new(&pattern)
            .map(TextPattern::Regex)
            .map_err(|err| QueryError::InvalidRegex {
                pattern,
                reason: err.to_string(),
            })
    }

    fn is_match(&self, haystack: &str) -> bool {
        match self {
            TextPattern::Literal(text) => haystack.contains(text.as_str()),
            TextPattern::Regex(regex) => regex.is_match(haystack),
        }
    }
}

fn literals<I, S>(argument: &'static str, items: I) -> Result<Vec<TextPattern>, QueryError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(|item| TextPattern::literal(argument, item)).collect()
}

fn regexes<I, S>(argument: &'static str, items: I) -> Result<Vec<TextPattern>, QueryError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(|item| TextPattern::regex(argument, item)).collect()
}

/// Filters on the anchor's resolved identifier.
///
/// The identifier must contain at least one of the `contains` patterns (when
/// any are given) and none of the `excludes` patterns. Candidates without an
/// identifier never match. Literal matching is case-sensitive.
#[derive(Debug, Clone)]
pub struct NameMatcher {
    kinds: Option<Vec<SyntaxKind>>,
    contains: Vec<TextPattern>,
    excludes: Vec<TextPattern>,
    regex: bool,
}

impl NameMatcher {
    /// Substring variant.
    ///
    /// # Errors
    /// [`QueryError::InvalidArgument`] if any entry is empty or whitespace.
    pub fn literal<I, J, S, T>(contains: I, excludes: J) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Ok(Self {
            kinds: None,
            contains: literals("contains", contains)?,
            excludes: literals("excludes", excludes)?,
            regex: false,
        })
    }

    /// Regex variant with the same semantics as [`NameMatcher::literal`].
    ///
    /// # Errors
    /// [`QueryError::InvalidArgument`] for blank patterns,
    /// [`QueryError::InvalidRegex`] for patterns that fail to compile.
    pub fn regex<I, J, S, T>(contains: I, excludes: J) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Ok(Self {
            kinds: None,
            contains: regexes("contains", contains)?,
            excludes: regexes("excludes", excludes)?,
            regex: true,
        })
    }

    /// Restricts the matcher to candidates of the given kinds.
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = SyntaxKind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }
}

impl NodeMatcher for NameMatcher {
    fn matches(&self, node: &CombinedNode<'_>) -> bool {
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&node.kind()) {
                return false;
            }
        }

        let Some(identifier) = node.identifier() else {
            trace!("{} has no identifier", node.kind());
            return false;
        };

        let included = self.contains.is_empty()
            || self.contains.iter().any(|pattern| pattern.is_match(&identifier));
        included && !self.excludes.iter().any(|pattern| pattern.is_match(&identifier))
    }

    fn name(&self) -> &'static str {
        if self.regex { "regex_name" } else { "name" }
    }
}

/// Matches the path of the file the candidate came from. A tree without a
/// path is matched as the empty string.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    pattern: TextPattern,
}

impl PathMatcher {
    pub fn literal(fragment: impl Into<String>) -> Result<Self, QueryError> {
        Ok(Self {
            pattern: TextPattern::literal("path", fragment)?,
        })
    }

    pub fn regex(pattern: impl Into<String>) -> Result<Self, QueryError> {
        Ok(Self {
            pattern: TextPattern::regex("path", pattern)?,
        })
    }
}

impl NodeMatcher for PathMatcher {
    fn matches(&self, node: &CombinedNode<'_>) -> bool {
        let path = node
            .path()
            .map(|path| path.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.pattern.is_match(&path)
    }

    fn name(&self) -> &'static str {
        match self.pattern {
            TextPattern::Literal(_) => "path",
            TextPattern::Regex(_) => "regex_path",
        }
    }
}

/// A location in a file: a single point (`start == end`) or a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub path: Option<PathBuf>,
    pub start: Position,
    pub end: Position,
}

impl TextSpan {
    pub fn point(path: Option<PathBuf>, position: Position) -> Self {
        Self {
            path,
            start: position,
            end: position,
        }
    }

    /// # Errors
    /// [`QueryError::InvalidArgument`] if `end` precedes `start`.
    pub fn range(path: Option<PathBuf>, start: Position, end: Position) -> Result<Self, QueryError> {
        if end.line_col() < start.line_col() {
            return Err(QueryError::invalid_argument("span", "end precedes start"));
        }
        Ok(Self { path, start, end })
    }

    pub fn is_point(&self) -> bool {
        self.start.line_col() == self.end.line_col()
    }
}

/// Matches candidates whose effective span contains the target span.
#[derive(Debug, Clone)]
pub struct PositionMatcher {
    target: TextSpan,
}

impl PositionMatcher {
    pub fn new(target: TextSpan) -> Self {
        Self { target }
    }
}

impl NodeMatcher for PositionMatcher {
    fn matches(&self, node: &CombinedNode<'_>) -> bool {
        if let Some(path) = &self.target.path {
            if node.path() != Some(path.as_path()) {
                return false;
            }
        }

        let span = node.span();
        if self.target.is_point() {
            span.contains_point(self.target.start)
        } else {
            span.contains_range(self.target.start, self.target.end)
        }
    }

    fn name(&self) -> &'static str {
        "position"
    }
}

/// Matches when both operands match.
#[derive(Debug)]
pub struct AndMatcher {
    lhs: Box<dyn NodeMatcher>,
    rhs: Box<dyn NodeMatcher>,
}

impl AndMatcher {
    pub fn new(lhs: Box<dyn NodeMatcher>, rhs: Box<dyn NodeMatcher>) -> Self {
        Self { lhs, rhs }
    }
}

impl NodeMatcher for AndMatcher {
    fn matches(&self, node: &CombinedNode<'_>) -> bool {
        self.lhs.matches(node) && self.rhs.matches(node)
    }

    fn name(&self) -> &'static str {
        "and"
    }
}

/// Inverts its operand.
#[derive(Debug)]
pub struct NotMatcher {
    inner: Box<dyn NodeMatcher>,
}

impl NotMatcher {
    pub fn new(inner: Box<dyn NodeMatcher>) -> Self {
        Self { inner }
    }
}

impl NodeMatcher for NotMatcher {
    fn matches(&self, node: &CombinedNode<'_>) -> bool {
        !self.inner.matches(node)
    }

    fn name(&self) -> &'static str {
        "not"
    }
}
