//! Fluent construction of model graphs.
//!
//! Vertices and transitions are declared by name; [`ModelBuilder::build`]
//! resolves every name to an arena index, checks the few structural rules
//! the engine relies on, and freezes the result into a shared
//! [`ModelGraph`](crate::core::ModelGraph).

pub mod error;
pub mod machine;
mod region;
pub mod transition;

pub use error::BuildError;
pub use machine::ModelBuilder;
pub use region::{RegionBuilder, StateBuilder};
pub use transition::TransitionBuilder;
