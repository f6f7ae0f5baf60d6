//! Parser modules for different languages

pub mod csharp;
