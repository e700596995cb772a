//! Atomic persistence primitives: positional path resolution and modifier
//! aggregation.

pub mod modifiers;
pub mod paths;

pub use modifiers::Modifiers;
pub use paths::{container_position, delete_modifier, insert_modifier, path, position};
