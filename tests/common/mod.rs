//! Shared model fixtures for the integration tests.
#![allow(dead_code)]

use statewise::builder::StateBuilder;
use statewise::{Event, ModelBuilder, ModelGraph};
use std::sync::Arc;

/// Execution context that records every behavior as a label.
pub type Trace = Vec<String>;

/// Record `enter:<name>` and `exit:<name>`.
pub fn traced(state: StateBuilder<Trace>, name: &str) -> StateBuilder<Trace> {
    let enter = format!("enter:{name}");
    let exit = format!("exit:{name}");
    state
        .entry(move |trace: &mut Trace, _e: &Event| trace.push(enter.clone()))
        .exit(move |trace: &mut Trace, _e: &Event| trace.push(exit.clone()))
}

/// Transition effect recording `effect:<label>`.
pub fn effect(label: &str) -> impl Fn(&mut Trace, &Event) + Send + Sync + 'static {
    let label = format!("effect:{label}");
    move |trace: &mut Trace, _e: &Event| trace.push(label.clone())
}

/// Initial -> A -t1-> B(Ba) -t2 on finishIt-> C -t3-> Final.
pub fn delivery() -> Arc<ModelGraph<Trace>> {
    ModelBuilder::new("delivery")
        .initial("init")
        .state("A", |s| traced(s, "A"))
        .state("B", |s| {
            traced(s, "B").region("b", |r| {
                r.initial("b.init")
                    .state("Ba", |s| traced(s, "Ba"))
                    .transition("b.init", "Ba", |t| t)
            })
        })
        .state("C", |s| traced(s, "C"))
        .final_state("Final")
        .transition("init", "A", |t| t)
        .transition("A", "B", |t| t.named("t1").effect(effect("t1")))
        .transition("B", "C", |t| t.named("t2").on("finishIt").effect(effect("t2")))
        .transition("C", "Final", |t| t.named("t3").effect(effect("t3")))
        .build()
        .expect("delivery model builds")
}

/// Orthogonal state `Work` with regions `left` and `right`; each finishes
/// on its own event, and `Work` completes into `Done` once both have.
pub fn parallel() -> Arc<ModelGraph<Trace>> {
    ModelBuilder::new("parallel")
        .initial("init")
        .state("Work", |s| {
            traced(s, "Work")
                .region("left", |r| {
                    r.initial("l.init")
                        .state("L", |s| traced(s, "L"))
                        .final_state("L.done")
                        .transition("l.init", "L", |t| t)
                        .transition("L", "L.done", |t| t.on("left").effect(effect("left")))
                })
                .region("right", |r| {
                    r.initial("r.init")
                        .state("R", |s| traced(s, "R"))
                        .final_state("R.done")
                        .transition("r.init", "R", |t| t)
                        .transition("R", "R.done", |t| t.on("right").effect(effect("right")))
                })
        })
        .state("Done", |s| traced(s, "Done"))
        .transition("init", "Work", |t| t)
        .transition("Work", "Done", |t| t.effect(effect("joined")))
        .build()
        .expect("parallel model builds")
}

/// `Outer` holds `Inner1 <-> Inner2` and keeps a shallow or deep history;
/// `Inner2` nests `Leaf1 <-> Leaf2`. `leave` goes to `Away`, `back`
/// returns through the history pseudostate.
pub fn remembering(deep: bool) -> Arc<ModelGraph<Trace>> {
    ModelBuilder::new("remembering")
        .initial("init")
        .state("Outer", |s| {
            traced(s, "Outer").region("outer", |r| {
                let r = if deep {
                    r.deep_history("h")
                } else {
                    r.shallow_history("h")
                };
                r.initial("o.init")
                    .state("Inner1", |s| traced(s, "Inner1"))
                    .state("Inner2", |s| {
                        traced(s, "Inner2").region("inner", |r| {
                            r.initial("i.init")
                                .state("Leaf1", |s| traced(s, "Leaf1"))
                                .state("Leaf2", |s| traced(s, "Leaf2"))
                                .transition("i.init", "Leaf1", |t| t)
                                .transition("Leaf1", "Leaf2", |t| t.on("next"))
                                .transition("Leaf2", "Leaf1", |t| t.on("next"))
                        })
                    })
                    .transition("o.init", "Inner1", |t| t)
                    .transition("Inner1", "Inner2", |t| t.on("swap"))
                    .transition("Inner2", "Inner1", |t| t.on("swap"))
            })
        })
        .state("Away", |s| traced(s, "Away"))
        .transition("init", "Outer", |t| t)
        .transition("Outer", "Away", |t| t.on("leave"))
        .transition("Away", "h", |t| t.on("back"))
        .build()
        .expect("history model builds")
}
