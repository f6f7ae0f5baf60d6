//! User-facing query descriptor
//!
//! The descriptor is what a CLI or a JSON query file produces. Its enums parse
//! from strings (case-insensitive, `-`/`_` tolerant) and an unknown name is a
//! [`QueryError::NotImplemented`] failure rather than a silent fallback.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::QueryError;

/// Lowercases and strips `-`/`_` so that `ProtectedInternal`,
/// `protected-internal` and `protected_internal` compare equal.
fn normalize(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

macro_rules! descriptor_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $what:literal {
            $($variant:ident => [$($alias:literal),+]),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
        #[serde(try_from = "String")]
        pub enum $name {
            #[default]
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }

        impl FromStr for $name {
            type Err = QueryError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let normalized = normalize(value);
                $(
                    if [$($alias),+].contains(&normalized.as_str()) {
                        return Ok($name::$variant);
                    }
                )+
                Err(QueryError::NotImplemented(format!("{} `{}`", $what, value)))
            }
        }

        impl TryFrom<String> for $name {
            type Error = QueryError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

descriptor_enum! {
    /// The kind of construct a query looks for. `Any` adds no kind filter.
    TargetKind, "target kind" {
        Any => ["any", "all", "*"],
        Namespace => ["namespace", "ns"],
        Class => ["class"],
        Struct => ["struct"],
        Enum => ["enum"],
        Interface => ["interface"],
        Field => ["field"],
        Property => ["property", "prop"],
        Method => ["method"],
        LocalVariable => ["localvariable", "local", "variable", "var"],
        Parameter => ["parameter", "param"],
        Argument => ["argument", "arg"],
    }
}

descriptor_enum! {
    /// Required access modifier. `Any` adds no access filter.
    AccessModifier, "access modifier" {
        Any => ["any", "all", "*"],
        Public => ["public"],
        Private => ["private"],
        Protected => ["protected"],
        Internal => ["internal"],
        ProtectedInternal => ["protectedinternal"],
        PrivateProtected => ["privateprotected"],
    }
}

descriptor_enum! {
    /// Kind of the enclosing declaration results must be nested in.
    ScopeKind, "scope kind" {
        Any => ["any", "all", "*"],
        Namespace => ["namespace", "ns"],
        Class => ["class"],
        Struct => ["struct"],
        Interface => ["interface"],
    }
}

/// Declarative description of a query, compiled by
/// [`QueryBuilder::build`](crate::query::builder::QueryBuilder::build).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryDescriptor {
    pub target: TargetKind,
    pub access: AccessModifier,
    pub scope: ScopeKind,
    /// Identifier must contain at least one of these.
    pub name_contains: Vec<String>,
    /// Identifier must contain none of these.
    pub name_excludes: Vec<String>,
    /// Enclosing scope's identifier must contain this.
    pub scope_name: Option<String>,
    /// File path must contain every one of these.
    pub path_contains: Vec<String>,
    /// Treat name and path entries as regular expressions.
    pub regex: bool,
}

impl QueryDescriptor {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
