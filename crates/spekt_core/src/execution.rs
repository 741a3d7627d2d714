//! Per-example execution: collaborator resolution, memoization and cleanup.

use std::any::Any;
use std::cell::{Cell, OnceCell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::collaborator::{Collaborator, CollaboratorDef, CollaboratorId};
use crate::errors::{CleanupFailure, ExampleFailure, PanicPayload, panic_message};
use crate::tree::{ExampleId, NodeId, SpecTree};

#[derive(Default)]
struct MemoSlot {
    /// Empty means "not resolved in this run"; a resolved `None`/`()` is still a value.
    value: OnceCell<Box<dyn Any>>,
    disposed: Cell<bool>,
}

/// The object an example body runs against: resolves collaborators for exactly one run of one example.
///
/// Each run gets a fresh context, so memoized values are never shared between examples or between two runs of the
/// same example. It deliberately offers no tree-building operations.
pub struct ExecutionContext {
    tree: Arc<SpecTree>,
    example: ExampleId,
    owner: NodeId,
    memo: Vec<MemoSlot>,
    /// Resolution order, used to clean up in reverse.
    resolved: RefCell<Vec<CollaboratorId>>,
    /// Collaborators whose initializer is currently running.
    resolving: RefCell<Vec<CollaboratorId>>,
}

impl ExecutionContext {
    pub(crate) fn new(tree: Arc<SpecTree>, example: ExampleId) -> Self {
        let owner = tree.example(example).owner;
        let memo = (0..tree.collaborator_count()).map(|_| MemoSlot::default()).collect();
        Self {
            tree,
            example,
            owner,
            memo,
            resolved: RefCell::new(Vec::new()),
            resolving: RefCell::new(Vec::new()),
        }
    }

    /// Display name of the running example.
    pub fn example_name(&self) -> &str {
        &self.tree.example(self.example).display_name
    }

    /// Names of the contexts enclosing the running example, root first.
    pub fn context_path(&self) -> Vec<&str> {
        self.tree.path(self.owner).collect()
    }

    pub(crate) fn ancestors(&self) -> &[NodeId] {
        &self.tree.node(self.owner).ancestors
    }

    /// Resolve `collaborator`, building and refining it on first use in this run.
    ///
    /// # Panics
    ///
    /// Panics if the handle belongs to another specification, if the collaborator (transitively) depends on itself,
    /// or if it is resolved again after it was cleaned up. Panics from the initializer or a refinement propagate;
    /// nothing is memoized for the collaborator in that case.
    #[track_caller]
    pub fn get<T: 'static>(&self, collaborator: &Collaborator<T>) -> &T {
        if collaborator.spec != self.tree.id() {
            panic!("{collaborator} belongs to another specification than `{}`", self.example_name());
        }
        let slot = &self.memo[collaborator.id.index()];
        if slot.disposed.get() {
            panic!("{collaborator} was resolved again after it was cleaned up");
        }
        let value = slot.value.get_or_init(|| {
            let _guard = self.enter(collaborator);
            let def = self.tree.collaborators[collaborator.id.index()]
                .as_any()
                .downcast_ref::<CollaboratorDef<T>>()
                .expect("INVARIANT: a typed handle always matches its definition");
            tracing::trace!(%collaborator, example = %self.example_name(), "resolving collaborator");
            let value = def.produce(self);
            self.resolved.borrow_mut().push(collaborator.id);
            Box::new(value)
        });
        value
            .downcast_ref::<T>()
            .expect("INVARIANT: memoized values have the collaborator's type")
    }

    /// Ensure a collaborator is evaluated, e.g. for its side effects.
    #[track_caller]
    pub fn force<T: 'static>(&self, collaborator: &Collaborator<T>) {
        self.get(collaborator);
    }

    /// Whether `collaborator` has been resolved in this run.
    pub fn is_resolved<T>(&self, collaborator: &Collaborator<T>) -> bool {
        collaborator.spec == self.tree.id()
            && self
                .memo
                .get(collaborator.id.index())
                .is_some_and(|slot| slot.value.get().is_some())
    }

    #[track_caller]
    fn enter<T>(&self, collaborator: &Collaborator<T>) -> ResolutionGuard<'_> {
        let mut resolving = self.resolving.borrow_mut();
        if resolving.contains(&collaborator.id) {
            let chain = resolving
                .iter()
                .map(|id| self.tree.describe_collaborator(*id))
                .collect::<Vec<_>>()
                .join(" -> ");
            drop(resolving);
            panic!("{collaborator} depends on itself ({chain} -> {collaborator})");
        }
        resolving.push(collaborator.id);
        ResolutionGuard {
            resolving: &self.resolving,
        }
    }

    /// Clean up everything resolved during the run, most recently resolved first.
    ///
    /// Every memoized value is released exactly once: through its explicit destructor, or by dropping it. A panicking
    /// destructor is recorded and does not stop the sweep. Destructors may resolve collaborators that were not
    /// resolved yet; those are swept as well.
    pub(crate) fn sweep(&mut self) -> Vec<CleanupFailure> {
        let mut failures = Vec::new();
        while let Some(id) = self.resolved.get_mut().pop() {
            let slot = &mut self.memo[id.index()];
            let Some(value) = slot.value.take() else {
                continue;
            };
            slot.disposed.set(true);

            let tree = Arc::clone(&self.tree);
            let def = &tree.collaborators[id.index()];
            let this = &*self;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| def.dispose(this, value)));
            if let Err(payload) = outcome {
                let failure = CleanupFailure {
                    collaborator: tree.describe_collaborator(id),
                    message: panic_message(payload.as_ref()).to_string(),
                };
                tracing::warn!(example = %self.example_name(), %failure, "cleanup failed");
                failures.push(failure);
            } else {
                tracing::trace!(collaborator = %tree.describe_collaborator(id), "cleaned up collaborator");
            }
        }
        failures
    }
}

struct ResolutionGuard<'a> {
    resolving: &'a RefCell<Vec<CollaboratorId>>,
}

impl Drop for ResolutionGuard<'_> {
    fn drop(&mut self) {
        self.resolving.borrow_mut().pop();
    }
}

/// Run one example under a fresh execution context, then clean up, whatever the body did.
#[tracing::instrument(skip_all, fields(example = %tree.example(example).display_name))]
pub(crate) fn run_example(tree: &Arc<SpecTree>, example: ExampleId) -> Result<(), ExampleFailure> {
    let data = tree.example(example);
    let mut cx = ExecutionContext::new(Arc::clone(tree), example);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| (data.body)(&cx)));
    let cleanup = cx.sweep();

    match outcome {
        Ok(()) if cleanup.is_empty() => {
            tracing::debug!("example passed");
            Ok(())
        }
        Ok(()) => Err(ExampleFailure::Cleanup {
            example: data.display_name.clone(),
            cleanup,
        }),
        Err(payload) => {
            let body = PanicPayload::new(payload);
            tracing::debug!(failure = %body, "example failed");
            Err(ExampleFailure::Body {
                example: data.display_name.clone(),
                body,
                cleanup,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::NamingMode;
    use crate::tree::build_spec;
    use std::sync::Mutex;

    #[test]
    fn cleanup_runs_in_reverse_resolution_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let root = build_spec("Order", NamingMode::Nested, |s| {
            let first_log = Arc::clone(&log);
            let first = s.support_with(|_| "first", move |_, v| first_log.lock().unwrap().push(v));
            let second_log = Arc::clone(&log);
            let second = s.support_with(
                move |cx| {
                    first.get(cx);
                    "second"
                },
                move |_, v| second_log.lock().unwrap().push(v),
            );
            s.it("uses both", move |cx| {
                second.get(cx);
            });
        })
        .unwrap();
        root.leaves()[0].run();
        assert_eq!(*log.lock().unwrap(), vec!["second", "first"]);
    }

    #[test]
    fn destructors_can_still_see_other_collaborators() {
        let seen = Arc::new(Mutex::new(None));
        let root = build_spec("Teardown", NamingMode::Nested, |s| {
            let name = s.support(|_| String::from("db"));
            let seen = Arc::clone(&seen);
            let conn = s.support_with(
                |_| 1_u8,
                move |cx, _| *seen.lock().unwrap() = Some(name.get(cx).clone()),
            );
            s.it("connects", move |cx| {
                conn.get(cx);
            });
        })
        .unwrap();
        root.leaves()[0].run();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("db"));
    }

    #[test]
    fn self_dependency_fails_the_example() {
        let root = build_spec("Cycle", NamingMode::Nested, |s| {
            let slot: Arc<Mutex<Option<Collaborator<u8>>>> = Arc::new(Mutex::new(None));
            let inner = Arc::clone(&slot);
            let looping = s.support(move |cx| {
                let me = inner.lock().unwrap().expect("handle stored");
                *me.get(cx)
            });
            *slot.lock().unwrap() = Some(looping);
            s.it("loops", move |cx| {
                looping.get(cx);
            });
        })
        .unwrap();
        let failure = root.leaves()[0].try_run().unwrap_err();
        let message = failure.body_failure().unwrap().message().to_string();
        assert!(message.contains("depends on itself"), "{message}");
    }

    #[test]
    fn context_path_and_example_name_are_visible_to_bodies() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let root = build_spec("Stack", NamingMode::Flat, |s| {
            let seen = Arc::clone(&seen);
            s.context("when empty", move |s| {
                s.it("pops nothing", move |cx| {
                    let mut seen = seen.lock().unwrap();
                    seen.push(cx.example_name().to_string());
                    seen.extend(cx.context_path().into_iter().map(String::from));
                });
            });
        })
        .unwrap();
        root.leaves()[0].run();
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["Stack when empty pops nothing", "Stack", "when empty"]
        );
    }

    #[test]
    fn is_resolved_tracks_the_current_run_only() {
        let root = build_spec("Lazy", NamingMode::Nested, |s| {
            let value = s.support(|_| 5);
            s.it("first", move |cx| {
                assert!(!cx.is_resolved(&value));
                cx.force(&value);
                assert!(cx.is_resolved(&value));
            });
            s.it("second", move |cx| assert!(!cx.is_resolved(&value)));
        })
        .unwrap();
        for leaf in root.leaves() {
            leaf.run();
        }
    }
}
