//! Builder for whole machines and the name-resolution pass that freezes them.

use super::error::BuildError;
use super::region::{
    ConnectionDef, RegionBuilder, RegionDef, StateBuilder, StateDef, VertexDef, VertexDefKind,
};
use super::transition::{TransitionBuilder, TransitionDef};
use crate::core::{
    ModelGraph, PseudoKind, Region, RegionId, RegionOwner, StateData, Transition, TransitionId,
    TransitionKind, Vertex, VertexId, VertexKind,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Builder for a state machine model.
///
/// The builder itself stands for the machine's first top-level region, so
/// simple machines need no explicit region. Vertices are referenced by name;
/// [`ModelBuilder::build`] resolves every name to an arena index and freezes
/// the graph.
///
/// # Example
///
/// ```rust
/// use statewise::ModelBuilder;
///
/// let model = ModelBuilder::<Vec<String>>::new("door")
///     .initial("init")
///     .state("Closed", |s| s.entry(|log, _| log.push("closed".to_string())))
///     .state("Open", |s| s)
///     .transition("init", "Closed", |t| t)
///     .transition("Closed", "Open", |t| t.on("open"))
///     .transition("Open", "Closed", |t| t.on("close"))
///     .build()
///     .unwrap();
///
/// assert_eq!(model.id(), "door");
/// assert!(model.find("Open").is_some());
/// ```
pub struct ModelBuilder<C> {
    id: String,
    root: RegionBuilder<C>,
    extra_regions: Vec<RegionDef<C>>,
    connection_points: Vec<(String, ConnectionDef)>,
}

impl<C> ModelBuilder<C> {
    /// Create a builder; `id` becomes the machine id carried by snapshots.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            root: RegionBuilder::new(id.clone()),
            id,
            extra_regions: Vec::new(),
            connection_points: Vec::new(),
        }
    }

    fn with_root(mut self, f: impl FnOnce(RegionBuilder<C>) -> RegionBuilder<C>) -> Self {
        self.root = f(self.root);
        self
    }

    pub fn initial(self, name: impl Into<String>) -> Self {
        self.with_root(|r| r.initial(name))
    }

    pub fn junction(self, name: impl Into<String>) -> Self {
        self.with_root(|r| r.junction(name))
    }

    pub fn choice(self, name: impl Into<String>) -> Self {
        self.with_root(|r| r.choice(name))
    }

    pub fn fork(self, name: impl Into<String>) -> Self {
        self.with_root(|r| r.fork(name))
    }

    pub fn join(self, name: impl Into<String>) -> Self {
        self.with_root(|r| r.join(name))
    }

    pub fn shallow_history(self, name: impl Into<String>) -> Self {
        self.with_root(|r| r.shallow_history(name))
    }

    pub fn deep_history(self, name: impl Into<String>) -> Self {
        self.with_root(|r| r.deep_history(name))
    }

    pub fn final_state(self, name: impl Into<String>) -> Self {
        self.with_root(|r| r.final_state(name))
    }

    pub fn state<F>(self, name: impl Into<String>, configure: F) -> Self
    where
        F: FnOnce(StateBuilder<C>) -> StateBuilder<C>,
    {
        self.with_root(|r| r.state(name, configure))
    }

    pub fn transition<F>(
        self,
        source: impl Into<String>,
        target: impl Into<String>,
        configure: F,
    ) -> Self
    where
        F: FnOnce(TransitionBuilder<C>) -> TransitionBuilder<C>,
    {
        self.with_root(|r| r.transition(source, target, configure))
    }

    /// Add another top-level region, orthogonal to the default one.
    pub fn region<F>(mut self, name: impl Into<String>, configure: F) -> Self
    where
        F: FnOnce(RegionBuilder<C>) -> RegionBuilder<C>,
    {
        let region = configure(RegionBuilder::new(name));
        self.extra_regions.push(region.finish());
        self
    }

    /// Machine-level entry point; only meaningful for submachine definitions.
    pub fn entry_point(mut self, name: impl Into<String>) -> Self {
        self.connection_points
            .push((name.into(), ConnectionDef::Entry));
        self
    }

    /// Machine-level exit point; only meaningful for submachine definitions.
    pub fn exit_point(mut self, name: impl Into<String>) -> Self {
        self.connection_points.push((name.into(), ConnectionDef::Exit));
        self
    }

    pub(crate) fn into_parts(self) -> (Vec<RegionDef<C>>, Vec<(String, ConnectionDef)>) {
        let mut regions = vec![self.root.finish()];
        regions.extend(self.extra_regions);
        regions.retain(|r| !r.vertices.is_empty() || !r.transitions.is_empty());
        (regions, self.connection_points)
    }

    /// Resolve names and freeze the graph.
    pub fn build(self) -> Result<Arc<ModelGraph<C>>, BuildError> {
        if let Some((name, _)) = self.connection_points.first() {
            return Err(BuildError::DanglingConnectionPoint(name.clone()));
        }
        let id = self.id.clone();
        let (regions, _) = self.into_parts();
        if regions.iter().all(|r| r.vertices.is_empty()) {
            return Err(BuildError::EmptyMachine(id));
        }

        let mut arena = Arena::new(id);
        let mut root_regions = Vec::new();
        for region in regions {
            root_regions.push(arena.add_region(region, RegionOwner::Machine)?);
        }
        arena.root_regions = root_regions;
        arena.resolve_references()?;
        arena.resolve_transitions()?;
        arena.check_transitions()?;
        Ok(Arc::new(arena.freeze()))
    }
}

struct PendingReference {
    reference: VertexId,
    owner_name: String,
    points: Vec<String>,
}

/// Mutable graph under construction.
struct Arena<C> {
    id: String,
    regions: Vec<Region>,
    vertices: Vec<Vertex<C>>,
    transitions: Vec<Transition<C>>,
    root_regions: Vec<RegionId>,
    names: HashMap<String, VertexId>,
    pending_transitions: Vec<(RegionId, TransitionDef<C>)>,
    pending_references: Vec<PendingReference>,
}

impl<C> Arena<C> {
    fn new(id: String) -> Self {
        Self {
            id,
            regions: Vec::new(),
            vertices: Vec::new(),
            transitions: Vec::new(),
            root_regions: Vec::new(),
            names: HashMap::new(),
            pending_transitions: Vec::new(),
            pending_references: Vec::new(),
        }
    }

    fn register(&mut self, name: &str, id: VertexId) -> Result<(), BuildError> {
        if self.names.insert(name.to_string(), id).is_some() {
            return Err(BuildError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    fn push_vertex(
        &mut self,
        name: String,
        container: Option<RegionId>,
        owner: Option<VertexId>,
        kind: VertexKind<C>,
    ) -> Result<VertexId, BuildError> {
        let id = VertexId(self.vertices.len());
        self.register(&name, id)?;
        self.vertices.push(Vertex {
            id,
            name,
            container,
            owner,
            kind,
            outgoing: Vec::new(),
            incoming: Vec::new(),
        });
        Ok(id)
    }

    fn add_region(&mut self, def: RegionDef<C>, owner: RegionOwner) -> Result<RegionId, BuildError> {
        let region_id = RegionId(self.regions.len());
        self.regions.push(Region {
            id: region_id,
            name: def.name,
            owner,
            vertices: Vec::new(),
            transitions: Vec::new(),
            initial: None,
            shallow_history: None,
            deep_history: None,
        });

        for vertex in def.vertices {
            let id = self.add_vertex(vertex, region_id)?;
            self.regions[region_id.0].vertices.push(id);
        }
        for transition in def.transitions {
            self.pending_transitions.push((region_id, transition));
        }
        Ok(region_id)
    }

    fn add_vertex(&mut self, def: VertexDef<C>, region: RegionId) -> Result<VertexId, BuildError> {
        match def.kind {
            VertexDefKind::Final => self.push_vertex(def.name, Some(region), None, VertexKind::Final),
            VertexDefKind::Pseudo(kind) => {
                let id = self.push_vertex(def.name, Some(region), None, VertexKind::Pseudo(kind))?;
                self.mark_pseudo(region, kind, id)?;
                Ok(id)
            }
            VertexDefKind::State(state) => self.add_state(def.name, state, region),
        }
    }

    fn mark_pseudo(&mut self, region: RegionId, kind: PseudoKind, id: VertexId) -> Result<(), BuildError> {
        let r = &mut self.regions[region.0];
        let slot = match kind {
            PseudoKind::Initial => &mut r.initial,
            PseudoKind::ShallowHistory => &mut r.shallow_history,
            PseudoKind::DeepHistory => &mut r.deep_history,
            _ => return Ok(()),
        };
        if slot.is_some() {
            return Err(BuildError::DuplicatePseudostate {
                region: r.name.clone(),
                kind: format!("{kind:?}"),
            });
        }
        *slot = Some(id);
        Ok(())
    }

    fn add_state(&mut self, name: String, def: StateDef<C>, region: RegionId) -> Result<VertexId, BuildError> {
        let StateDef {
            regions,
            connection_points,
            entry,
            exit,
            activities,
            submachine,
        } = def;
        let state_name = name.clone();
        let id = self.push_vertex(
            name,
            Some(region),
            None,
            VertexKind::State(StateData {
                regions: Vec::new(),
                connection_points: Vec::new(),
                entry,
                exit,
                activities,
                submachine,
            }),
        )?;

        let mut points = Vec::new();
        for (point_name, point) in connection_points {
            let point_id = match point {
                ConnectionDef::Entry => {
                    self.push_vertex(point_name, None, Some(id), VertexKind::Pseudo(PseudoKind::EntryPoint))?
                }
                ConnectionDef::Exit => {
                    self.push_vertex(point_name, None, Some(id), VertexKind::Pseudo(PseudoKind::ExitPoint))?
                }
                ConnectionDef::Reference(targets) => {
                    let reference = self.push_vertex(
                        point_name,
                        None,
                        Some(id),
                        VertexKind::ConnectionPointReference(Vec::new()),
                    )?;
                    self.pending_references.push(PendingReference {
                        reference,
                        owner_name: state_name.clone(),
                        points: targets,
                    });
                    reference
                }
            };
            points.push(point_id);
        }

        let mut region_ids = Vec::new();
        for child in regions {
            region_ids.push(self.add_region(child, RegionOwner::State(id))?);
        }

        if let VertexKind::State(data) = &mut self.vertices[id.0].kind {
            data.regions = region_ids;
            data.connection_points = points;
        }
        Ok(id)
    }

    fn resolve_references(&mut self) -> Result<(), BuildError> {
        for pending in std::mem::take(&mut self.pending_references) {
            let mut resolved = Vec::new();
            for point in &pending.points {
                let qualified = format!("{}/{point}", pending.owner_name);
                let id = self
                    .names
                    .get(&qualified)
                    .or_else(|| self.names.get(point))
                    .copied()
                    .filter(|id| {
                        self.vertices[id.0]
                            .pseudo_kind()
                            .is_some_and(PseudoKind::is_connection_point)
                    })
                    .ok_or_else(|| BuildError::UnknownConnectionPoint {
                        reference: self.vertices[pending.reference.0].name.clone(),
                        point: point.clone(),
                    })?;
                resolved.push(id);
            }
            self.vertices[pending.reference.0].kind = VertexKind::ConnectionPointReference(resolved);
        }
        Ok(())
    }

    fn lookup(&self, name: &str, transition: &TransitionDef<C>) -> Result<VertexId, BuildError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| BuildError::UnknownVertex {
                transition: transition.label(),
                name: name.to_string(),
            })
    }

    fn resolve_transitions(&mut self) -> Result<(), BuildError> {
        for (region, def) in std::mem::take(&mut self.pending_transitions) {
            let source = self.lookup(&def.source, &def)?;
            let target = self.lookup(&def.target, &def)?;
            let id = TransitionId(self.transitions.len());
            self.transitions.push(Transition {
                id,
                name: def.name,
                source,
                target,
                kind: def.kind,
                triggers: def.triggers,
                guard: def.guard,
                effect: def.effect,
                container: region,
            });
            self.vertices[source.0].outgoing.push(id);
            self.vertices[target.0].incoming.push(id);
            self.regions[region.0].transitions.push(id);
        }
        Ok(())
    }

    fn orthogonal(&self, id: VertexId) -> bool {
        self.vertices[id.0].regions().len() > 1
    }

    /// Reject the transition shapes the engine does not execute.
    fn check_transitions(&self) -> Result<(), BuildError> {
        for t in &self.transitions {
            let source = &self.vertices[t.source.0];
            let target = &self.vertices[t.target.0];
            match t.kind {
                TransitionKind::Internal if !source.is_state() || t.source != t.target => {
                    return Err(BuildError::InvalidInternalTransition {
                        transition: t.label(),
                    });
                }
                TransitionKind::Local if t.source == t.target && self.orthogonal(t.source) => {
                    return Err(BuildError::UnsupportedLocalTransition {
                        state: source.name.clone(),
                    });
                }
                _ => {}
            }
            if source.pseudo_kind() == Some(PseudoKind::EntryPoint)
                && target.pseudo_kind() == Some(PseudoKind::ExitPoint)
                && source.owner.is_some()
                && source.owner == target.owner
                && source.owner.is_some_and(|owner| self.orthogonal(owner))
            {
                let owner = source.owner.map(|o| self.vertices[o.0].name.clone());
                return Err(BuildError::UnsupportedEntryExitTransition {
                    state: owner.unwrap_or_default(),
                });
            }
        }
        Ok(())
    }

    fn freeze(self) -> ModelGraph<C> {
        ModelGraph {
            id: self.id,
            regions: self.regions,
            vertices: self.vertices,
            transitions: self.transitions,
            root_regions: self.root_regions,
            names: self.names,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_vertices() {
        let result = ModelBuilder::<()>::new("empty").build();
        assert!(matches!(result, Err(BuildError::EmptyMachine(id)) if id == "empty"));
    }

    #[test]
    fn build_rejects_unknown_targets() {
        let result = ModelBuilder::<()>::new("m")
            .state("A", |s| s)
            .transition("A", "Nowhere", |t| t.on("x"))
            .build();
        assert!(matches!(
            result,
            Err(BuildError::UnknownVertex { name, .. }) if name == "Nowhere"
        ));
    }

    #[test]
    fn build_rejects_duplicate_names() {
        let result = ModelBuilder::<()>::new("m")
            .state("A", |s| s)
            .state("A", |s| s)
            .build();
        assert_eq!(result.unwrap_err(), BuildError::DuplicateName("A".to_string()));
    }

    #[test]
    fn build_rejects_second_initial() {
        let result = ModelBuilder::<()>::new("m")
            .initial("i1")
            .initial("i2")
            .state("A", |s| s)
            .build();
        assert!(matches!(result, Err(BuildError::DuplicatePseudostate { .. })));
    }

    #[test]
    fn build_rejects_local_self_transition_on_orthogonal_state() {
        let result = ModelBuilder::<()>::new("m")
            .state("O", |s| {
                s.region("r1", |r| r.state("A", |s| s))
                    .region("r2", |r| r.state("B", |s| s))
            })
            .transition("O", "O", |t| t.on("x").local())
            .build();
        assert_eq!(
            result.unwrap_err(),
            BuildError::UnsupportedLocalTransition {
                state: "O".to_string()
            }
        );
    }

    #[test]
    fn build_rejects_entry_to_exit_on_orthogonal_state() {
        let result = ModelBuilder::<()>::new("m")
            .state("O", |s| {
                s.region("r1", |r| r.state("A", |s| s))
                    .region("r2", |r| r.state("B", |s| s))
                    .entry_point("O.in")
                    .exit_point("O.out")
            })
            .transition("O.in", "O.out", |t| t)
            .build();
        assert!(matches!(
            result,
            Err(BuildError::UnsupportedEntryExitTransition { .. })
        ));
    }

    #[test]
    fn build_rejects_internal_transition_between_states() {
        let result = ModelBuilder::<()>::new("m")
            .state("A", |s| s)
            .state("B", |s| s)
            .transition("A", "B", |t| t.on("x").internal())
            .build();
        assert!(matches!(
            result,
            Err(BuildError::InvalidInternalTransition { .. })
        ));
    }

    #[test]
    fn build_assigns_ids_in_declaration_order() {
        let model = ModelBuilder::<()>::new("m")
            .initial("i")
            .state("A", |s| s.region("ar", |r| r.state("A1", |s| s)))
            .state("B", |s| s)
            .transition("i", "A", |t| t)
            .build()
            .unwrap();

        assert_eq!(model.find("i"), Some(VertexId(0)));
        assert_eq!(model.find("A"), Some(VertexId(1)));
        assert_eq!(model.find("A1"), Some(VertexId(2)));
        assert_eq!(model.find("B"), Some(VertexId(3)));
        assert_eq!(model.root_regions(), &[RegionId(0)]);
        assert_eq!(model.region(RegionId(0)).initial(), Some(VertexId(0)));
    }

    #[test]
    fn extra_root_regions_are_orthogonal() {
        let model = ModelBuilder::<()>::new("m")
            .state("A", |s| s)
            .region("second", |r| r.state("B", |s| s))
            .build()
            .unwrap();
        assert_eq!(model.root_regions().len(), 2);
    }

    #[test]
    fn submachine_connection_references_resolve() {
        let model = ModelBuilder::<()>::new("m")
            .initial("i")
            .state("Sub", |s| {
                s.submachine("worker", |m| {
                    m.entry_point("start")
                        .initial("si")
                        .state("Step", |s| s)
                        .transition("si", "Step", |t| t)
                        .transition("start", "Step", |t| t)
                })
                .connection_point_ref("Sub.start", ["start"])
            })
            .transition("i", "Sub.start", |t| t)
            .build()
            .unwrap();

        let reference = model.find("Sub.start").unwrap();
        let point = model.find("Sub/start").unwrap();
        match model.vertex(reference).kind() {
            VertexKind::ConnectionPointReference(points) => assert_eq!(points, &vec![point]),
            _ => panic!("expected a connection point reference"),
        }
        assert!(model.find("Sub/Step").is_some());
    }

    #[test]
    fn machine_connection_points_need_a_submachine_state() {
        let result = ModelBuilder::<()>::new("m")
            .entry_point("in")
            .state("A", |s| s)
            .build();
        assert!(matches!(result, Err(BuildError::DanglingConnectionPoint(_))));
    }
}
