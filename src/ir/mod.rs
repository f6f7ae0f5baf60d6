pub mod identifier;
pub mod node;
pub mod virtual_node;
