//! Build errors for model construction.

use thiserror::Error;

/// Errors that can occur when freezing a model graph.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BuildError {
    #[error("Machine '{0}' has no vertices. Add at least one state")]
    EmptyMachine(String),

    #[error("Vertex name '{0}' is used more than once")]
    DuplicateName(String),

    #[error("Transition '{transition}' refers to unknown vertex '{name}'")]
    UnknownVertex { transition: String, name: String },

    #[error("Region '{region}' declares more than one {kind} pseudostate")]
    DuplicatePseudostate { region: String, kind: String },

    #[error("Local transition on orthogonal state '{state}' targets the state itself")]
    UnsupportedLocalTransition { state: String },

    #[error("Transition from entry point to exit point of orthogonal state '{state}' is not supported")]
    UnsupportedEntryExitTransition { state: String },

    #[error("Internal transition '{transition}' must start and end at the same state")]
    InvalidInternalTransition { transition: String },

    #[error("Connection point '{0}' is declared on the machine itself; machine connection points only exist in submachine definitions")]
    DanglingConnectionPoint(String),

    #[error("Connection point reference '{reference}' names unknown point '{point}'")]
    UnknownConnectionPoint { reference: String, point: String },
}
