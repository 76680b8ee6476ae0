//! Builders for regions and states.

use super::machine::ModelBuilder;
use super::transition::{TransitionBuilder, TransitionDef};
use crate::core::{Activity, Behavior, BehaviorOutput, Event, PseudoKind};

pub(crate) struct RegionDef<C> {
    pub(crate) name: String,
    pub(crate) vertices: Vec<VertexDef<C>>,
    pub(crate) transitions: Vec<TransitionDef<C>>,
}

pub(crate) struct VertexDef<C> {
    pub(crate) name: String,
    pub(crate) kind: VertexDefKind<C>,
}

pub(crate) enum VertexDefKind<C> {
    State(StateDef<C>),
    Pseudo(PseudoKind),
    Final,
}

pub(crate) enum ConnectionDef {
    Entry,
    Exit,
    Reference(Vec<String>),
}

pub(crate) struct StateDef<C> {
    pub(crate) regions: Vec<RegionDef<C>>,
    pub(crate) connection_points: Vec<(String, ConnectionDef)>,
    pub(crate) entry: Vec<Behavior<C>>,
    pub(crate) exit: Vec<Behavior<C>>,
    pub(crate) activities: Vec<Activity>,
    pub(crate) submachine: Option<String>,
}

impl<C> RegionDef<C> {
    /// Prefix every vertex name, region name and transition endpoint.
    /// Used when a machine definition is inlined under a submachine state.
    pub(crate) fn qualify(&mut self, prefix: &str) {
        self.name = format!("{prefix}/{}", self.name);
        for vertex in &mut self.vertices {
            vertex.name = format!("{prefix}/{}", vertex.name);
            if let VertexDefKind::State(state) = &mut vertex.kind {
                state.qualify(prefix);
            }
        }
        for transition in &mut self.transitions {
            transition.source = format!("{prefix}/{}", transition.source);
            transition.target = format!("{prefix}/{}", transition.target);
        }
    }
}

impl<C> StateDef<C> {
    fn qualify(&mut self, prefix: &str) {
        // Reference targets stay relative; they resolve against the owner's
        // qualified name at build time.
        for (name, _) in &mut self.connection_points {
            *name = format!("{prefix}/{name}");
        }
        for region in &mut self.regions {
            region.qualify(prefix);
        }
    }
}

/// Collects the vertices and transitions of one region.
pub struct RegionBuilder<C> {
    def: RegionDef<C>,
}

impl<C> RegionBuilder<C> {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            def: RegionDef {
                name: name.into(),
                vertices: Vec::new(),
                transitions: Vec::new(),
            },
        }
    }

    fn pseudo(mut self, name: impl Into<String>, kind: PseudoKind) -> Self {
        self.def.vertices.push(VertexDef {
            name: name.into(),
            kind: VertexDefKind::Pseudo(kind),
        });
        self
    }

    pub fn initial(self, name: impl Into<String>) -> Self {
        self.pseudo(name, PseudoKind::Initial)
    }

    pub fn junction(self, name: impl Into<String>) -> Self {
        self.pseudo(name, PseudoKind::Junction)
    }

    pub fn choice(self, name: impl Into<String>) -> Self {
        self.pseudo(name, PseudoKind::Choice)
    }

    pub fn fork(self, name: impl Into<String>) -> Self {
        self.pseudo(name, PseudoKind::Fork)
    }

    pub fn join(self, name: impl Into<String>) -> Self {
        self.pseudo(name, PseudoKind::Join)
    }

    pub fn shallow_history(self, name: impl Into<String>) -> Self {
        self.pseudo(name, PseudoKind::ShallowHistory)
    }

    pub fn deep_history(self, name: impl Into<String>) -> Self {
        self.pseudo(name, PseudoKind::DeepHistory)
    }

    pub fn final_state(mut self, name: impl Into<String>) -> Self {
        self.def.vertices.push(VertexDef {
            name: name.into(),
            kind: VertexDefKind::Final,
        });
        self
    }

    /// Add a state; the closure configures behaviors and nested regions.
    pub fn state<F>(mut self, name: impl Into<String>, configure: F) -> Self
    where
        F: FnOnce(StateBuilder<C>) -> StateBuilder<C>,
    {
        let name = name.into();
        let state = configure(StateBuilder::new(name.clone()));
        self.def.vertices.push(VertexDef {
            name,
            kind: VertexDefKind::State(state.def),
        });
        self
    }

    /// Add a transition between two named vertices.
    ///
    /// Names are resolved when the model is built, so forward references are
    /// fine.
    pub fn transition<F>(
        mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        configure: F,
    ) -> Self
    where
        F: FnOnce(TransitionBuilder<C>) -> TransitionBuilder<C>,
    {
        let builder = configure(TransitionBuilder::new(source.into(), target.into()));
        self.def.transitions.push(builder.finish());
        self
    }

    pub(crate) fn finish(self) -> RegionDef<C> {
        self.def
    }
}

/// Configures a state: behaviors, nested regions, connection points.
pub struct StateBuilder<C> {
    name: String,
    def: StateDef<C>,
}

impl<C> StateBuilder<C> {
    fn new(name: String) -> Self {
        Self {
            name,
            def: StateDef {
                regions: Vec::new(),
                connection_points: Vec::new(),
                entry: Vec::new(),
                exit: Vec::new(),
                activities: Vec::new(),
                submachine: None,
            },
        }
    }

    /// Add an entry behavior. Multiple behaviors run in declaration order.
    pub fn entry<F, R>(mut self, f: F) -> Self
    where
        F: Fn(&mut C, &Event) -> R + Send + Sync + 'static,
        R: BehaviorOutput,
    {
        self.def.entry.push(Behavior::new(f));
        self
    }

    /// Add an exit behavior. Multiple behaviors run in declaration order.
    pub fn exit<F, R>(mut self, f: F) -> Self
    where
        F: Fn(&mut C, &Event) -> R + Send + Sync + 'static,
        R: BehaviorOutput,
    {
        self.def.exit.push(Behavior::new(f));
        self
    }

    /// Attach a do-activity. Requires the pool-backed executor.
    pub fn activity(mut self, activity: Activity) -> Self {
        self.def.activities.push(activity);
        self
    }

    /// Add a nested region. One region makes a composite state, two or
    /// more an orthogonal one.
    pub fn region<F>(mut self, name: impl Into<String>, configure: F) -> Self
    where
        F: FnOnce(RegionBuilder<C>) -> RegionBuilder<C>,
    {
        let region = configure(RegionBuilder::new(name));
        self.def.regions.push(region.finish());
        self
    }

    pub fn entry_point(mut self, name: impl Into<String>) -> Self {
        self.def
            .connection_points
            .push((name.into(), ConnectionDef::Entry));
        self
    }

    pub fn exit_point(mut self, name: impl Into<String>) -> Self {
        self.def
            .connection_points
            .push((name.into(), ConnectionDef::Exit));
        self
    }

    /// Reference entry/exit points of the inlined submachine. Point names
    /// are given as declared inside the submachine definition.
    pub fn connection_point_ref<I, S>(mut self, name: impl Into<String>, points: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let points = points.into_iter().map(Into::into).collect();
        self.def
            .connection_points
            .push((name.into(), ConnectionDef::Reference(points)));
        self
    }

    /// Inline a machine definition under this state.
    ///
    /// The definition's regions become this state's regions and its machine
    /// connection points become this state's entry/exit points. Every name
    /// inside it is qualified as `"<state>/<name>"`.
    pub fn submachine<F>(mut self, machine_id: impl Into<String>, define: F) -> Self
    where
        F: FnOnce(ModelBuilder<C>) -> ModelBuilder<C>,
    {
        let machine_id = machine_id.into();
        let fragment = define(ModelBuilder::new(machine_id.clone()));
        let (mut regions, points) = fragment.into_parts();
        for region in &mut regions {
            region.qualify(&self.name);
        }
        for (name, def) in points {
            self.def
                .connection_points
                .push((format!("{}/{name}", self.name), def));
        }
        self.def.regions.extend(regions);
        self.def.submachine = Some(machine_id);
        self
    }

    pub(crate) fn into_def(self) -> StateDef<C> {
        self.def
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_builder_keeps_declaration_order() {
        let region = RegionBuilder::<()>::new("r")
            .initial("i")
            .state("A", |s| s)
            .final_state("F")
            .transition("i", "A", |t| t)
            .finish();

        let names: Vec<_> = region.vertices.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["i", "A", "F"]);
        assert_eq!(region.transitions.len(), 1);
    }

    #[test]
    fn qualify_prefixes_names_and_endpoints() {
        let mut region = RegionBuilder::<()>::new("r")
            .state("A", |s| s.region("inner", |r| r.state("B", |s| s)))
            .transition("A", "A", |t| t)
            .finish();
        region.qualify("Sub");

        assert_eq!(region.name, "Sub/r");
        assert_eq!(region.vertices[0].name, "Sub/A");
        assert_eq!(region.transitions[0].source, "Sub/A");
        match &region.vertices[0].kind {
            VertexDefKind::State(state) => {
                assert_eq!(state.regions[0].vertices[0].name, "Sub/B");
            }
            _ => panic!("expected a state"),
        }
    }

    #[test]
    fn submachine_points_are_owned_by_the_state() {
        let state = StateBuilder::<()>::new("Sub".into())
            .submachine("inner", |m| {
                m.entry_point("in")
                    .initial("i")
                    .state("Work", |s| s)
                    .transition("i", "Work", |t| t)
            })
            .into_def();

        assert_eq!(state.submachine.as_deref(), Some("inner"));
        assert_eq!(state.connection_points[0].0, "Sub/in");
        assert_eq!(state.regions.len(), 1);
        assert_eq!(state.regions[0].vertices[1].name, "Sub/Work");
    }
}
