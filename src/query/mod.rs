//! Declarative queries and the predicates they compile to

pub mod builder;
pub mod descriptor;
pub mod matchers;

pub use builder::{Query, QueryBuilder};
pub use descriptor::{AccessModifier, QueryDescriptor, ScopeKind, TargetKind};
pub use matchers::{NodeMatcher, TextSpan};
