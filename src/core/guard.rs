//! Guard predicates for controlling transitions.
//!
//! Guards are boolean functions over the execution context and the current
//! event. A transition may also carry the `else` guard, which is enabled only
//! when no sibling transition of the same vertex is.

use super::behavior::BehaviorError;
use super::event::Event;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

type Predicate<C> = Arc<dyn Fn(&C, &Event) -> Result<bool, BehaviorError> + Send + Sync>;

enum GuardKind<C> {
    Predicate(Predicate<C>),
    Else,
}

/// Predicate that determines if a transition can fire.
///
/// Guards should be side-effect free. A guard that fails (returns an error
/// or panics) is treated as `false` by the engine.
///
/// # Example
///
/// ```rust
/// use statewise::{Event, Guard};
///
/// struct Account {
///     balance: i64,
/// }
///
/// let solvent = Guard::new(|acc: &Account, _e: &Event| acc.balance >= 0);
///
/// assert!(solvent.check(&Account { balance: 10 }, &Event::new("pay")).unwrap());
/// assert!(!solvent.check(&Account { balance: -1 }, &Event::new("pay")).unwrap());
/// ```
pub struct Guard<C> {
    kind: GuardKind<C>,
}

impl<C> Guard<C> {
    /// Create a guard from an infallible predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&C, &Event) -> bool + Send + Sync + 'static,
    {
        Guard {
            kind: GuardKind::Predicate(Arc::new(move |ctx: &C, event: &Event| {
                Ok(predicate(ctx, event))
            })),
        }
    }

    /// Create a guard from a predicate that may fail.
    pub fn fallible<F>(predicate: F) -> Self
    where
        F: Fn(&C, &Event) -> Result<bool, BehaviorError> + Send + Sync + 'static,
    {
        Guard {
            kind: GuardKind::Predicate(Arc::new(predicate)),
        }
    }

    /// The `else` guard.
    pub fn otherwise() -> Self {
        Guard {
            kind: GuardKind::Else,
        }
    }

    pub fn is_else(&self) -> bool {
        matches!(self.kind, GuardKind::Else)
    }

    /// Evaluate the guard.
    ///
    /// The `else` guard always reports `true`; sibling arbitration is the
    /// resolver's job. Panics are caught and reported as errors.
    pub fn check(&self, context: &C, event: &Event) -> Result<bool, BehaviorError> {
        match &self.kind {
            GuardKind::Else => Ok(true),
            GuardKind::Predicate(predicate) => {
                catch_unwind(AssertUnwindSafe(|| predicate(context, event))).unwrap_or_else(
                    |_| Err(BehaviorError::Panicked("guard panicked".to_string())),
                )
            }
        }
    }
}

impl<C> Clone for Guard<C> {
    fn clone(&self) -> Self {
        let kind = match &self.kind {
            GuardKind::Predicate(p) => GuardKind::Predicate(Arc::clone(p)),
            GuardKind::Else => GuardKind::Else,
        };
        Guard { kind }
    }
}

impl<C> std::fmt::Debug for Guard<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            GuardKind::Predicate(_) => f.write_str("Guard(<predicate>)"),
            GuardKind::Else => f.write_str("Guard(else)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        value: i32,
    }

    #[test]
    fn guard_allows_matching_context() {
        let guard = Guard::new(|c: &Counter, _e: &Event| c.value > 0);

        assert!(guard.check(&Counter { value: 1 }, &Event::new("t")).unwrap());
        assert!(!guard.check(&Counter { value: 0 }, &Event::new("t")).unwrap());
    }

    #[test]
    fn guard_can_inspect_event_payload() {
        let guard = Guard::new(|_c: &Counter, e: &Event| {
            e.payload().and_then(|p| p.as_i64()).unwrap_or(0) > 10
        });

        let big = Event::new("t").with_payload(serde_json::json!(11));
        let small = Event::new("t").with_payload(serde_json::json!(3));
        assert!(guard.check(&Counter { value: 0 }, &big).unwrap());
        assert!(!guard.check(&Counter { value: 0 }, &small).unwrap());
    }

    #[test]
    fn guard_is_deterministic() {
        let guard = Guard::new(|c: &Counter, _e: &Event| c.value % 2 == 0);
        let ctx = Counter { value: 4 };
        let event = Event::new("t");

        assert_eq!(
            guard.check(&ctx, &event).unwrap(),
            guard.check(&ctx, &event).unwrap()
        );
    }

    #[test]
    fn fallible_guard_propagates_error() {
        let guard = Guard::fallible(|_c: &Counter, _e: &Event| Err(BehaviorError::msg("db down")));
        let result = guard.check(&Counter { value: 0 }, &Event::new("t"));
        assert_eq!(result, Err(BehaviorError::Failed("db down".to_string())));
    }

    #[test]
    fn panicking_guard_is_reported_as_error() {
        let guard = Guard::new(|_c: &Counter, _e: &Event| -> bool { panic!("bad guard") });
        assert!(guard.check(&Counter { value: 0 }, &Event::new("t")).is_err());
    }

    #[test]
    fn else_guard_is_flagged() {
        let guard: Guard<Counter> = Guard::otherwise();
        assert!(guard.is_else());
        assert!(guard.check(&Counter { value: 0 }, &Event::new("t")).unwrap());
    }
}
