// Battle Schema - Shared type definitions
// This crate contains the static reference data and core enums shared between
// the battle engine and any tooling that prepares encounters, enabling the use
// of postcard for compact serialization of definition tables.

// Re-export the main types
pub use battle_data::*;
pub use combat_types::*;

pub mod battle_data;
pub mod combat_types;
