pub mod error;
pub mod ir;
pub mod logging;
pub mod parsers;
pub mod query;
pub mod search;
pub mod virtual_nodes;
pub mod walker;
