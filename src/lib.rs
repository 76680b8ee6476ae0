//! Statewise: a run-to-completion engine for hierarchical statecharts
//!
//! Statewise executes UML-style state machines: nested composite states,
//! orthogonal regions, history, fork/join, junction/choice, entry/exit
//! points and submachines. A model is built once into an immutable
//! [`ModelGraph`](core::ModelGraph) and shared by any number of instances;
//! each instance owns its active configuration, history and execution
//! context.
//!
//! # Core Concepts
//!
//! - **Model**: built with [`ModelBuilder`], frozen behind an `Arc`
//! - **Executors**: [`SyncExecutor`], [`LockedExecutor`] and
//!   [`PooledExecutor`] drive the same step engine under different
//!   concurrency disciplines
//! - **Listeners**: every entry, exit, effect and guard is reported to the
//!   registered [`Listener`]s
//! - **Snapshots**: [`Snapshot`] captures an instance and can be applied to
//!   another instance of the same model
//!
//! # Example
//!
//! ```rust
//! use statewise::{Event, Executor, ModelBuilder, SyncExecutor};
//!
//! let model = ModelBuilder::new("order")
//!     .initial("init")
//!     .state("Open", |s| s.entry(|log: &mut Vec<String>, _e: &Event| log.push("open".into())))
//!     .state("Shipped", |s| s)
//!     .final_state("Done")
//!     .transition("init", "Open", |t| t)
//!     .transition("Open", "Shipped", |t| t.on("ship"))
//!     .transition("Shipped", "Done", |t| t.on("deliver"))
//!     .build()
//!     .unwrap();
//!
//! let mut order = SyncExecutor::new(model, Vec::new()).unwrap();
//! order.go().unwrap();
//! order.take(Event::new("ship")).unwrap();
//! assert_eq!(order.active_states(), vec!["Shipped"]);
//!
//! order.take(Event::new("deliver")).unwrap();
//! assert_eq!(order.status(), statewise::Status::Terminated);
//! assert_eq!(order.context(), vec!["open"]);
//! ```

pub mod builder;
pub mod checkpoint;
pub mod core;
pub mod engine;
pub mod error;
pub mod executor;
pub mod listener;

// Re-export commonly used types
pub use builder::{BuildError, ModelBuilder};
pub use checkpoint::{Snapshot, SnapshotError, SnapshotViolation};
pub use self::core::{Activity, ActivityContext, Behavior, BehaviorError, Event, Guard, ModelGraph, TransitionKind};
pub use engine::{ActiveTree, DefaultEntryRule, HistoryRecord, Status};
pub use error::EngineError;
pub use executor::{Executor, ExecutorConfig, LockedExecutor, PooledExecutor, SyncExecutor};
pub use listener::{LifecycleEvent, Listener, Phase, RecordingListener, TracingListener};
