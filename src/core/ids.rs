//! Arena indices for model graph records.
//!
//! Every region, vertex and transition of a [`ModelGraph`](super::ModelGraph)
//! lives in one arena and is addressed by a typed index. Indices are assigned
//! in declaration order by the builder, so two graphs built from the same
//! definition agree on every id. Snapshots rely on that to move between
//! instances of the identical model.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub(crate) usize);

        impl $name {
            /// Position of the record inside its arena.
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

arena_id!(
    /// Index of a vertex (state, pseudostate, final state or connection point reference).
    VertexId,
    "vertex"
);

arena_id!(
    /// Index of a region.
    RegionId,
    "region"
);

arena_id!(
    /// Index of a transition.
    TransitionId,
    "transition"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_with_kind_prefix() {
        assert_eq!(VertexId(3).to_string(), "vertex#3");
        assert_eq!(RegionId(0).to_string(), "region#0");
        assert_eq!(TransitionId(12).to_string(), "transition#12");
    }

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&VertexId(7)).unwrap();
        assert_eq!(json, "7");
        let back: VertexId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, VertexId(7));
    }
}
