//! Compatibility checks between a snapshot and the model it is applied to.
//!
//! Every check runs and all violations are reported together, so a caller
//! sees everything wrong with a snapshot at once.

use super::{Snapshot, SNAPSHOT_VERSION};
use crate::core::{ModelGraph, RegionId, VertexId};
use crate::engine::ActiveTree;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;

/// One reason a snapshot does not fit a model.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SnapshotViolation {
    #[error("Snapshot version {found} is not supported (expected {expected})")]
    Version { found: u32, expected: u32 },

    #[error("Snapshot belongs to machine '{found}', not '{expected}'")]
    MachineMismatch { expected: String, found: String },

    #[error("Unknown region {region}")]
    UnknownRegion { region: RegionId },

    #[error("Unknown vertex {vertex}")]
    UnknownVertex { vertex: VertexId },

    #[error("Vertex {vertex} is not a state or final state")]
    NotConfigurable { vertex: VertexId },

    #[error("Vertex {vertex} does not belong to region {region}")]
    MisplacedVertex { vertex: VertexId, region: RegionId },

    #[error("Region {region} is not a region of its parent in the tree")]
    MisplacedRegion { region: RegionId },

    #[error("Region {region} has no history pseudostate")]
    NoHistory { region: RegionId },

    #[error("Vertex {vertex} is not a join")]
    NotAJoin { vertex: VertexId },
}

type Check = Validation<(), NonEmptyVec<SnapshotViolation>>;

fn require(condition: bool, violation: impl FnOnce() -> SnapshotViolation) -> Check {
    if condition {
        Validation::success(())
    } else {
        Validation::fail(violation())
    }
}

/// Check every node of an active tree against the model.
fn check_tree<C>(model: &ModelGraph<C>, tree: &ActiveTree, parent_regions: &[RegionId], checks: &mut Vec<Check>) {
    if model.get_region(tree.region).is_none() {
        checks.push(Validation::fail(SnapshotViolation::UnknownRegion {
            region: tree.region,
        }));
        return;
    }
    checks.push(require(parent_regions.contains(&tree.region), || {
        SnapshotViolation::MisplacedRegion {
            region: tree.region,
        }
    }));

    let Some(vertex) = model.get_vertex(tree.vertex) else {
        checks.push(Validation::fail(SnapshotViolation::UnknownVertex {
            vertex: tree.vertex,
        }));
        return;
    };
    checks.push(require(vertex.is_configurable(), || {
        SnapshotViolation::NotConfigurable {
            vertex: tree.vertex,
        }
    }));
    checks.push(require(vertex.container() == Some(tree.region), || {
        SnapshotViolation::MisplacedVertex {
            vertex: tree.vertex,
            region: tree.region,
        }
    }));
    for child in &tree.children {
        check_tree(model, child, vertex.regions(), checks);
    }
}

/// Validate `snapshot` against `model`, accumulating all violations.
pub fn validate<C>(model: &ModelGraph<C>, snapshot: &Snapshot<C>) -> Validation<(), NonEmptyVec<SnapshotViolation>> {
    let mut checks = vec![
        require(snapshot.version == SNAPSHOT_VERSION, || SnapshotViolation::Version {
            found: snapshot.version,
            expected: SNAPSHOT_VERSION,
        }),
        require(snapshot.state_machine_id == model.id(), || {
            SnapshotViolation::MachineMismatch {
                expected: model.id().to_string(),
                found: snapshot.state_machine_id.clone(),
            }
        }),
    ];

    for tree in snapshot.state_configuration.iter().flatten() {
        check_tree(model, tree, model.root_regions(), &mut checks);
    }

    for (region, record) in &snapshot.history {
        let known = model.get_region(*region);
        checks.push(require(
            known.is_some_and(|r| r.history_depth().is_some()),
            || SnapshotViolation::NoHistory { region: *region },
        ));
        if let Some(known) = known {
            let regions = [known.id()];
            check_tree(model, &record.tree, &regions, &mut checks);
        }
    }

    for region in &snapshot.unresolved {
        checks.push(require(model.get_region(*region).is_some(), || {
            SnapshotViolation::UnknownRegion { region: *region }
        }));
    }

    for join in snapshot.join_arrivals.keys() {
        checks.push(require(
            model
                .get_vertex(*join)
                .is_some_and(|v| v.pseudo_kind() == Some(crate::core::PseudoKind::Join)),
            || SnapshotViolation::NotAJoin { vertex: *join },
        ));
    }

    Validation::all_vec(checks).map(|_| ())
}
