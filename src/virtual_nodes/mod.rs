//! Virtual node synthesis and override routing

pub mod routing;
pub mod rules;

pub use routing::{RoutedNode, VirtualNodeRegistry, VirtualNodeSource};
pub use rules::{InsertionHint, Overridability, VirtualNodeQuery};
