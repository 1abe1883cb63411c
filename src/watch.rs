use std::any::TypeId;
use std::panic::Location;

use crate::debug::CallPatternDebug;
use crate::matcher::{InputMatcher, Matching};
use crate::state::{CoroId, Handler, ObjectId, SharedState};
use crate::{DynMockFn, MockFn, MockObject};

/// A coroutine's registration in the priority list.
///
/// Whether a call is fulfilled is decided by the coroutine; the watcher only
/// decides whether the call is offered.
pub(crate) struct Watcher {
    pub priority: usize,
    pub coro: CoroId,
    pub target: WatchTarget,
    pub location: &'static Location<'static>,
    /// Calls accepted through this watcher plus over-saturating calls.
    pub calls: usize,
}

pub(crate) enum WatchTarget {
    All,
    Object(ObjectId),
    Call {
        object: ObjectId,
        mock_fn: DynMockFn,
        matcher: InputMatcher,
    },
}

/// What a watcher rejected a call for.
pub(crate) enum Rejection {
    Target,
    Matcher(CallPatternDebug),
}

impl Watcher {
    pub fn check_target<F: MockFn>(
        &self,
        object: ObjectId,
        inputs: &F::Inputs,
    ) -> Result<(), Rejection> {
        match &self.target {
            WatchTarget::All => Ok(()),
            WatchTarget::Object(id) if *id == object => Ok(()),
            WatchTarget::Call {
                object: id,
                mock_fn,
                matcher,
            } if *id == object && mock_fn.type_id == TypeId::of::<F>() => {
                if matcher.matches::<F>(inputs) {
                    Ok(())
                } else {
                    Err(Rejection::Matcher(CallPatternDebug {
                        mock_fn: *mock_fn,
                        matcher: matcher.debug,
                        location: self.location,
                    }))
                }
            }
            _ => Err(Rejection::Target),
        }
    }
}

impl SharedState {
    pub fn add_watcher(
        &self,
        coro: CoroId,
        target: WatchTarget,
        location: &'static Location<'static>,
    ) {
        let priority = self.engine.locked(|engine| {
            engine.push_handler(|priority| {
                Handler::Watcher(Watcher {
                    priority,
                    coro,
                    target,
                    location,
                    calls: 0,
                })
            })
        });

        tracing::trace!(coroutine = %coro, priority, "watch declared");
    }
}

/// Watch declarations, shared by [crate::Coroutine] and [crate::Co].
pub(crate) fn target_all() -> WatchTarget {
    WatchTarget::All
}

pub(crate) fn target_object(object: &MockObject) -> WatchTarget {
    WatchTarget::Object(object.id())
}

pub(crate) fn target_call<F: MockFn>(
    object: &MockObject,
    matching_fn: Option<&dyn Fn(&mut Matching<F>)>,
) -> WatchTarget {
    WatchTarget::Call {
        object: object.id(),
        mock_fn: DynMockFn::new::<F>(),
        matcher: match matching_fn {
            Some(matching_fn) => InputMatcher::from_matching_fn(matching_fn),
            None => InputMatcher::any(),
        },
    }
}
