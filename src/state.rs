use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use crate::coroutine::CoroState;
use crate::error::MockError;
use crate::event::CallSlot;
use crate::expectation::Expectation;
use crate::fiber::Fiber;
use crate::launch::LaunchState;
use crate::private::MutexIsh;
use crate::watch::Watcher;

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        pub(crate) struct $name(pub usize);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "#{}", self.0)
            }
        }
    };
}

id_type!(ObjectId);
id_type!(CoroId);
id_type!(LaunchId);
id_type!(EventId);

/// Anything the router can resume.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum TaskId {
    Coroutine(CoroId),
    Launch(LaunchId),
}

/// One entry in the priority list.
pub(crate) enum Handler {
    Expectation(Expectation),
    Watcher(Watcher),
}

impl Handler {
    pub fn priority(&self) -> usize {
        match self {
            Self::Expectation(expectation) => expectation.priority,
            Self::Watcher(watcher) => watcher.priority,
        }
    }
}

/// All mutable bookkeeping of one [crate::Cotest] context.
///
/// Only ever touched through [MutexIsh::locked], and never while another fiber runs.
pub(crate) struct Engine {
    next_id: usize,
    next_priority: usize,

    /// Sorted by ascending priority: newest declarations last.
    pub handlers: Vec<Handler>,
    pub coroutines: BTreeMap<CoroId, CoroState>,
    pub launches: BTreeMap<LaunchId, LaunchState>,
    pub calls: BTreeMap<EventId, CallSlot>,

    /// Tasks that can run, in order of readiness.
    pub ready: VecDeque<TaskId>,
    /// Launches about to dispatch a mock call, run once nothing else is ready.
    pub settling: VecDeque<LaunchId>,

    /// Idle launch fibers.
    pub pool: Vec<Rc<Fiber>>,
}

impl Engine {
    fn new() -> Self {
        Self {
            next_id: 0,
            next_priority: 0,
            handlers: vec![],
            coroutines: BTreeMap::new(),
            launches: BTreeMap::new(),
            calls: BTreeMap::new(),
            ready: VecDeque::new(),
            settling: VecDeque::new(),
            pool: vec![],
        }
    }

    pub fn next_id(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }

    /// Register a handler. It gets the next priority, which beats every earlier declaration.
    pub fn push_handler(&mut self, make: impl FnOnce(usize) -> Handler) -> usize {
        self.next_priority += 1;
        let priority = self.next_priority;
        self.handlers.push(make(priority));
        priority
    }

    pub fn handler_mut(&mut self, priority: usize) -> Option<&mut Handler> {
        let index = self
            .handlers
            .binary_search_by_key(&priority, Handler::priority)
            .ok()?;
        self.handlers.get_mut(index)
    }

    /// Snapshot of the priority list, newest first.
    pub fn priorities_newest_first(&self) -> Vec<usize> {
        self.handlers.iter().rev().map(Handler::priority).collect()
    }

    /// Put a task at the back of the ready queue, unless it is already queued.
    pub fn schedule(&mut self, task: TaskId) {
        let scheduled = match task {
            TaskId::Coroutine(id) => self.coroutines.get_mut(&id).map(|coro| &mut coro.scheduled),
            TaskId::Launch(id) => self.launches.get_mut(&id).map(|launch| &mut launch.scheduled),
        };

        if let Some(scheduled) = scheduled {
            if !*scheduled {
                *scheduled = true;
                self.ready.push_back(task);
            }
        }
    }

    pub fn unschedule(&mut self, task: TaskId) {
        self.ready.retain(|queued| *queued != task);
        if let TaskId::Launch(id) = task {
            self.settling.retain(|queued| *queued != id);
        }
    }
}

pub(crate) struct SharedState {
    pub engine: MutexIsh<Engine>,
    failures: MutexIsh<Vec<MockError>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            engine: MutexIsh::new(Engine::new()),
            failures: MutexIsh::new(vec![]),
        }
    }

    pub fn next_id(&self) -> usize {
        self.engine.locked(Engine::next_id)
    }

    /// Record a test-outcome failure, reported when the context is torn down.
    pub fn record_failure(&self, error: MockError) {
        tracing::debug!(%error, "recorded failure");
        self.failures.locked(|failures| failures.push(error));
    }

    /// Record a failure that must also abort the current call, returning the panic message.
    pub fn prepare_panic(&self, error: MockError) -> String {
        let msg = format!("{error}");
        self.failures.locked(|failures| failures.push(error));
        msg
    }

    pub fn take_failures(&self) -> Vec<MockError> {
        self.failures.locked(std::mem::take)
    }
}
