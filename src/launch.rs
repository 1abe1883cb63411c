use std::panic::Location;
use std::rc::Rc;

use once_cell::unsync::OnceCell;
use tracing::debug;

use crate::debug::DeclaredAt;
use crate::event::{EventData, EventKind};
use crate::fiber::{Fiber, Suspender};
use crate::state::{CoroId, Engine, EventId, LaunchId, SharedState, TaskId};

pub(crate) struct LaunchState {
    pub parent: CoroId,
    /// `None` once the launch finished and its fiber went back to the pool.
    pub fiber: Option<Rc<Fiber>>,
    pub scheduled: bool,
    pub observed: bool,
    pub location: &'static Location<'static>,
}

/// A piece of code under test, running interleaved with the coroutine that launched it.
///
/// Its completion is delivered to that coroutine as an event. The result lives
/// in the handle, and is read with [crate::EventHandle::result] after observing
/// the completion with [crate::EventHandle::is_result].
pub struct LaunchHandle<R> {
    id: LaunchId,
    result: Rc<OnceCell<R>>,
    location: &'static Location<'static>,
}

impl<R> LaunchHandle<R> {
    pub(crate) fn id(&self) -> LaunchId {
        self.id
    }

    pub(crate) fn completed(&self) -> Option<&R> {
        self.result.get()
    }

    pub(crate) fn declared_at(&self) -> DeclaredAt {
        DeclaredAt(self.location)
    }

    /// Whether the launched code has run to completion.
    pub fn is_complete(&self) -> bool {
        self.result.get().is_some()
    }
}

impl<R> std::fmt::Debug for LaunchHandle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LaunchHandle({} at {})", self.id, self.declared_at())
    }
}

impl SharedState {
    /// Start `code` on a pooled or fresh fiber, on behalf of coroutine `parent`.
    ///
    /// The launch runs first; `parent` continues once the launch blocks or completes.
    pub fn launch<R, L>(
        self: &Rc<Self>,
        parent: CoroId,
        suspender: &Suspender,
        code: L,
        location: &'static Location<'static>,
    ) -> LaunchHandle<R>
    where
        L: FnOnce() -> R + 'static,
        R: 'static,
    {
        let (id, pooled) = self
            .engine
            .locked(|engine| (LaunchId(engine.next_id()), engine.pool.pop()));

        let fiber = match pooled {
            Some(fiber) => {
                debug!(launch = %id, "reusing pooled fiber");
                fiber
            }
            None => Rc::new(Fiber::spawn("launch")),
        };

        let result = Rc::new(OnceCell::new());

        fiber.assign(Box::new({
            let shared = self.clone();
            let result = result.clone();
            move |_: &Suspender| {
                debug!(launch = %id, "launch started");

                let value = code();
                let _ = result.set(value);

                debug!(launch = %id, "launch completed");
                shared.engine.locked(|engine| engine.complete_launch(id));
            }
        }));

        self.engine.locked(|engine| {
            engine.launches.insert(
                id,
                LaunchState {
                    parent,
                    fiber: Some(fiber),
                    scheduled: false,
                    observed: false,
                    location,
                },
            );
            if let Some(coro) = engine.coroutines.get_mut(&parent) {
                coro.launches.push(id);
            }
            engine.schedule(TaskId::Launch(id));
        });

        self.yield_task(TaskId::Coroutine(parent), suspender);

        LaunchHandle {
            id,
            result,
            location,
        }
    }

    /// Free the stacks of idle launch fibers, returning how many there were.
    pub fn cleanup_launches(&self) -> usize {
        let pool = self.engine.locked(|engine| std::mem::take(&mut engine.pool));
        let count = pool.len();
        drop(pool);

        debug!(count, "cleaned up launch fibers");
        count
    }
}

impl Engine {
    /// Deliver the completion event to the parent coroutine and recycle the fiber.
    fn complete_launch(&mut self, id: LaunchId) {
        let Some(parent) = self.finish_launch(id) else {
            return;
        };

        let event = Rc::new(EventData {
            id: EventId(self.next_id()),
            kind: EventKind::LaunchResult(id),
        });
        self.deliver(parent, event);
    }

    /// Retire the fiber of a launch that will not run again, returning its parent.
    pub fn finish_launch(&mut self, id: LaunchId) -> Option<CoroId> {
        let state = self.launches.get_mut(&id)?;
        let parent = state.parent;
        if let Some(fiber) = state.fiber.take() {
            self.pool.push(fiber);
        }
        Some(parent)
    }

    /// Forget the launches of a coroutine, returning the fibers of unfinished ones for cancellation.
    pub fn abandon_launches(&mut self, parent: CoroId) -> Vec<(LaunchId, Rc<Fiber>)> {
        let ids: Vec<LaunchId> = self
            .launches
            .iter()
            .filter(|(_, state)| state.parent == parent)
            .map(|(id, _)| *id)
            .collect();

        let mut fibers = vec![];
        for id in ids {
            self.unschedule(TaskId::Launch(id));
            if let Some(fiber) = self.launches.remove(&id).and_then(|state| state.fiber) {
                fibers.push((id, fiber));
            }
        }
        fibers
    }
}
