use std::collections::{BTreeSet, VecDeque};
use std::panic::Location;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::counter::{Cardinality, NCalls};
use crate::debug::{CoroutineDebug, DeclaredAt};
use crate::error::{usage_error, MockError};
use crate::event::{EventData, EventHandle, EventKind, SignatureHandle};
use crate::fiber::{Fiber, Suspender};
use crate::launch::LaunchHandle;
use crate::matcher::{InputMatcher, Matching};
use crate::router::Caller;
use crate::state::{CoroId, Engine, EventId, LaunchId, SharedState, TaskId};
use crate::watch::{self, WatchTarget};
use crate::{MockFn, MockObject};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Exec {
    NotStarted,
    Running,
    /// Suspended in `next_event` with nothing queued.
    Waiting,
    /// Suspended, and runnable as soon as the router gets to it.
    Parked,
    Exited,
    /// The body panicked.
    Crashed,
}

pub(crate) struct CoroState {
    pub name: Rc<str>,
    pub location: &'static Location<'static>,
    pub fiber: Rc<Fiber>,
    pub exec: Exec,
    pub scheduled: bool,
    /// Delivered events not yet handed out by `next_event`.
    pub queue: VecDeque<Rc<EventData>>,
    /// Mock call handed out, but neither accepted nor dropped.
    pub current: Option<EventId>,
    /// Accepted mock calls not yet returned.
    pub open: BTreeSet<EventId>,
    pub launches: Vec<LaunchId>,
    pub cardinality: Cardinality,
    pub retired: bool,
    pub accepted: usize,
}

impl CoroState {
    pub fn mark_running(&mut self) {
        if matches!(self.exec, Exec::NotStarted | Exec::Waiting | Exec::Parked) {
            self.exec = Exec::Running;
        }
    }

    pub fn mark_parked(&mut self) {
        if self.exec == Exec::Running {
            self.exec = Exec::Parked;
        }
    }

    pub fn mark_crashed(&mut self) {
        self.exec = Exec::Crashed;
    }

    pub fn is_exited(&self) -> bool {
        matches!(self.exec, Exec::Exited | Exec::Crashed)
    }

    pub fn debug(&self) -> CoroutineDebug {
        CoroutineDebug {
            name: self.name.clone(),
            location: self.location,
        }
    }
}

enum NextEvent {
    Ready(Rc<EventData>),
    Wait,
    Unresolved(String),
}

enum Verdict {
    Exited,
    SatisfiedCancel { queued: usize },
    Unsatisfied(MockError),
}

impl Engine {
    /// Queue an event on a coroutine, waking it if it waits for one.
    pub fn deliver(&mut self, coro: CoroId, event: Rc<EventData>) {
        let Some(state) = self.coroutines.get_mut(&coro) else {
            return;
        };
        state.queue.push_back(event);
        if state.exec == Exec::Waiting {
            self.schedule(TaskId::Coroutine(coro));
        }
    }

    /// Make a deferred coroutine runnable. Returns whether it had not started yet.
    pub fn start_coroutine(&mut self, coro: CoroId) -> bool {
        let not_started = self
            .coroutines
            .get(&coro)
            .map(|state| state.exec == Exec::NotStarted)
            .unwrap_or(false);
        if not_started {
            self.schedule(TaskId::Coroutine(coro));
        }
        not_started
    }

    fn next_event(&mut self, coro: CoroId) -> NextEvent {
        let Some(state) = self.coroutines.get_mut(&coro) else {
            return NextEvent::Wait;
        };

        if let Some(current) = state.current {
            let call = self
                .calls
                .get(&current)
                .map(|slot| slot.fn_call.to_string())
                .unwrap_or_default();
            return NextEvent::Unresolved(call);
        }

        match state.queue.pop_front() {
            Some(event) => {
                if let EventKind::MockCall(_) = event.kind {
                    state.current = Some(event.id);
                }
                NextEvent::Ready(event)
            }
            None => {
                state.exec = Exec::Waiting;
                NextEvent::Wait
            }
        }
    }

    fn exit_coroutine(&mut self, coro: CoroId) -> Result<(), String> {
        let Some(state) = self.coroutines.get(&coro) else {
            return Ok(());
        };

        let describe = |id: &EventId| {
            self.calls
                .get(id)
                .map(|slot| slot.fn_call.to_string())
                .unwrap_or_default()
        };

        if let Some(current) = &state.current {
            return Err(format!(
                "coroutine \"{}\" exited without accepting or dropping the mock call {}",
                state.name,
                describe(current)
            ));
        }
        if let Some(open) = state.open.iter().next() {
            return Err(format!(
                "coroutine \"{}\" exited without returning from the accepted mock call {}",
                state.name,
                describe(open)
            ));
        }
        for launch in &state.launches {
            if let Some(launch) = self.launches.get(launch).filter(|launch| !launch.observed) {
                return Err(format!(
                    "coroutine \"{}\" exited without observing the result of the launch at {}",
                    state.name,
                    DeclaredAt(launch.location)
                ));
            }
        }

        let Some(state) = self.coroutines.get_mut(&coro) else {
            return Ok(());
        };
        state.exec = Exec::Exited;
        state.cardinality.exit();

        // every launch has completed and been observed by now
        for launch in std::mem::take(&mut state.launches) {
            self.launches.remove(&launch);
        }

        let undelivered: Vec<EventId> = state
            .queue
            .drain(..)
            .filter(|event| matches!(event.kind, EventKind::MockCall(_)))
            .map(|event| event.id)
            .collect();
        for id in undelivered {
            self.force_drop(coro, id);
        }

        Ok(())
    }

    fn verdict(&self, coro: CoroId) -> Verdict {
        let Some(state) = self.coroutines.get(&coro) else {
            return Verdict::Exited;
        };

        if state.is_exited() {
            Verdict::Exited
        } else if state.cardinality.is_satisfied() {
            Verdict::SatisfiedCancel {
                queued: state.queue.len(),
            }
        } else {
            Verdict::Unsatisfied(MockError::CoroutineUnsatisfied {
                coroutine: state.debug(),
                calls: NCalls(state.accepted),
                retired: state.retired,
            })
        }
    }

    /// Remove a coroutine, declining every call it still holds.
    ///
    /// Returns the coroutine fiber and the fibers of its unfinished launches, to be cancelled outside the lock.
    fn discard_coroutine(
        &mut self,
        coro: CoroId,
    ) -> Option<(Rc<Fiber>, Vec<(LaunchId, Rc<Fiber>)>)> {
        self.unschedule(TaskId::Coroutine(coro));
        let state = self.coroutines.remove(&coro)?;

        let held = state
            .queue
            .iter()
            .filter(|event| matches!(event.kind, EventKind::MockCall(_)))
            .map(|event| event.id)
            .chain(state.current)
            .chain(state.open.iter().copied());
        for id in held.collect::<Vec<_>>() {
            self.force_drop(coro, id);
        }

        let launches = self.abandon_launches(coro);
        Some((state.fiber, launches))
    }

    fn requeue_front(&mut self, coro: CoroId, events: Vec<Rc<EventData>>) {
        if let Some(state) = self.coroutines.get_mut(&coro) {
            for event in events.into_iter().rev() {
                state.queue.push_front(event);
            }
        }
    }
}

impl SharedState {
    pub fn create_coroutine<B>(
        self: &Rc<Self>,
        name: String,
        body: B,
        location: &'static Location<'static>,
    ) -> Coroutine
    where
        B: FnOnce(&Co) + 'static,
    {
        if let Caller::Task(..) = self.caller() {
            usage_error("coroutines cannot be created from inside a coroutine or a launch");
        }

        let name: Rc<str> = name.into();
        let id = CoroId(self.next_id());
        let fiber = Rc::new(Fiber::spawn(&name));

        fiber.assign(Box::new({
            let shared = self.clone();
            let name = name.clone();
            move |suspender: &Suspender| {
                let co = Co {
                    shared,
                    id,
                    name,
                    suspender: suspender.clone(),
                };

                debug!(coroutine = %co.name, "coroutine started");
                body(&co);
                co.exit();
            }
        }));

        self.engine.locked(|engine| {
            engine.coroutines.insert(
                id,
                CoroState {
                    name: name.clone(),
                    location,
                    fiber,
                    exec: Exec::NotStarted,
                    scheduled: false,
                    queue: VecDeque::new(),
                    current: None,
                    open: BTreeSet::new(),
                    launches: vec![],
                    cardinality: Cardinality::Unsatisfied,
                    retired: false,
                    accepted: 0,
                },
            );
        });

        Coroutine {
            shared: self.clone(),
            id,
            name,
        }
    }

    fn set_flag(&self, coro: CoroId, update: impl FnOnce(&mut CoroState)) {
        self.engine.locked(|engine| {
            if let Some(state) = engine.coroutines.get_mut(&coro) {
                update(state);
            }
        });
    }

    /// Cancel a coroutine without running anything else.
    pub fn cancel_coroutine(&self, coro: CoroId) {
        let Some((fiber, launches)) = self.engine.locked(|engine| engine.discard_coroutine(coro))
        else {
            return;
        };

        if self.cancel_task(TaskId::Coroutine(coro), &fiber) {
            debug!(coroutine = fiber.name(), "coroutine cancelled");
        }
        drop(fiber);

        for (launch, fiber) in &launches {
            self.cancel_task(TaskId::Launch(*launch), fiber);
        }
        self.engine
            .locked(|engine| engine.pool.extend(launches.into_iter().map(|(_, fiber)| fiber)));
    }
}

/// The handle owning a coroutine, held by the test.
///
/// Dropping it first lets every ready task run. If the coroutine has then not
/// exited and is not satisfied, that is a test failure. Afterwards the
/// coroutine and its unfinished launches are cancelled, and its watches keep
/// declining calls.
pub struct Coroutine {
    shared: Rc<SharedState>,
    id: CoroId,
    name: Rc<str>,
}

impl Coroutine {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start a coroutine created with [crate::Cotest::new_coroutine], and run it until it first blocks.
    pub fn start(&self) {
        if let Caller::Task(..) = self.shared.caller() {
            usage_error("Coroutine::start() cannot be called from inside a coroutine or a launch");
        }

        let started = self
            .shared
            .engine
            .locked(|engine| engine.start_coroutine(self.id));
        if started {
            self.shared.settle();
        }
    }

    pub fn is_exited(&self) -> bool {
        self.shared.engine.locked(|engine| {
            engine
                .coroutines
                .get(&self.id)
                .map(CoroState::is_exited)
                .unwrap_or(true)
        })
    }

    /// Mark the coroutine satisfied: dropping it before it exits is no longer a failure.
    pub fn satisfy(&self) {
        self.shared
            .set_flag(self.id, |state| state.cardinality.satisfy());
    }

    /// Stop offering calls to the coroutine. Its watches decline everything from now on.
    pub fn retire(&self) {
        self.shared.set_flag(self.id, |state| state.retired = true);
    }

    /// Offer every mock call to this coroutine.
    #[track_caller]
    pub fn watch_all(&self) -> &Self {
        self.shared
            .add_watcher(self.id, watch::target_all(), Location::caller());
        self
    }

    /// Offer every call made on `object` to this coroutine.
    #[track_caller]
    pub fn watch_object(&self, object: &MockObject) -> &Self {
        self.shared.check_object(object);
        self.shared
            .add_watcher(self.id, watch::target_object(object), Location::caller());
        self
    }

    /// Offer calls of `F` on `object` to this coroutine.
    #[track_caller]
    pub fn watch_call<F: MockFn>(&self, object: &MockObject, _: F) -> &Self {
        self.watch_target(watch::target_call::<F>(object, None), object)
    }

    /// Offer calls of `F` on `object` whose inputs match the pattern.
    #[track_caller]
    pub fn watch_call_matching<F: MockFn>(
        &self,
        object: &MockObject,
        _: F,
        matching: &dyn Fn(&mut Matching<F>),
    ) -> &Self {
        self.watch_target(watch::target_call::<F>(object, Some(matching)), object)
    }

    #[track_caller]
    fn watch_target(&self, target: WatchTarget, object: &MockObject) -> &Self {
        self.shared.check_object(object);
        self.shared.add_watcher(self.id, target, Location::caller());
        self
    }
}

impl Drop for Coroutine {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.shared.cancel_coroutine(self.id);
            return;
        }

        if let Caller::Driver = self.shared.caller() {
            self.shared
                .engine
                .locked(|engine| engine.start_coroutine(self.id));
            self.shared.settle();
        }

        match self.shared.engine.locked(|engine| engine.verdict(self.id)) {
            Verdict::Exited => {}
            Verdict::SatisfiedCancel { queued } => {
                if queued > 0 {
                    warn!(coroutine = %self.name, queued, "cancelling satisfied coroutine with undelivered events");
                } else {
                    debug!(coroutine = %self.name, "cancelling satisfied coroutine");
                }
            }
            Verdict::Unsatisfied(error) => self.shared.record_failure(error),
        }

        self.shared.cancel_coroutine(self.id);
    }
}

impl std::fmt::Debug for Coroutine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Coroutine({:?})", self.name)
    }
}

/// The handle a coroutine body uses to receive and resolve events.
pub struct Co {
    shared: Rc<SharedState>,
    id: CoroId,
    name: Rc<str>,
    suspender: Suspender,
}

impl Co {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the next event delivered to this coroutine.
    ///
    /// The previous mock call must have been accepted or dropped first.
    #[track_caller]
    pub fn next_event(&self) -> EventHandle {
        loop {
            let next = self
                .shared
                .engine
                .locked(|engine| engine.next_event(self.id));

            match next {
                NextEvent::Ready(event) => {
                    return EventHandle::new(self.shared.clone(), self.id, event);
                }
                NextEvent::Wait => self.suspender.suspend(),
                NextEvent::Unresolved(call) => usage_error(format_args!(
                    "next_event() in coroutine \"{}\" while the mock call {call} is neither accepted nor dropped",
                    self.name
                )),
            }
        }
    }

    /// Run `code` as a launch. It runs first, until it blocks in a mock call or completes.
    #[track_caller]
    pub fn launch<R, L>(&self, code: L) -> LaunchHandle<R>
    where
        L: FnOnce() -> R + 'static,
        R: 'static,
    {
        self.shared
            .launch(self.id, &self.suspender, code, Location::caller())
    }

    pub fn satisfy(&self) {
        self.shared
            .set_flag(self.id, |state| state.cardinality.satisfy());
    }

    pub fn retire(&self) {
        self.shared.set_flag(self.id, |state| state.retired = true);
    }

    #[track_caller]
    pub fn watch_all(&self) -> &Self {
        self.shared
            .add_watcher(self.id, watch::target_all(), Location::caller());
        self
    }

    #[track_caller]
    pub fn watch_object(&self, object: &MockObject) -> &Self {
        self.shared.check_object(object);
        self.shared
            .add_watcher(self.id, watch::target_object(object), Location::caller());
        self
    }

    #[track_caller]
    pub fn watch_call<F: MockFn>(&self, object: &MockObject, _: F) -> &Self {
        self.shared.check_object(object);
        self.shared.add_watcher(
            self.id,
            watch::target_call::<F>(object, None),
            Location::caller(),
        );
        self
    }

    #[track_caller]
    pub fn watch_call_matching<F: MockFn>(
        &self,
        object: &MockObject,
        _: F,
        matching: &dyn Fn(&mut Matching<F>),
    ) -> &Self {
        self.shared.check_object(object);
        self.shared.add_watcher(
            self.id,
            watch::target_call::<F>(object, Some(matching)),
            Location::caller(),
        );
        self
    }

    /// Drop mock calls until one is narrowed by `narrow`.
    #[track_caller]
    fn wait_for<T>(&self, what: &dyn std::fmt::Display, narrow: impl Fn(&EventHandle) -> Option<T>) -> T {
        loop {
            let event = self.next_event();
            if event.is_launch_result().is_some() {
                usage_error(format_args!(
                    "{event} arrived in coroutine \"{}\" while waiting for {what}",
                    self.name
                ));
            }

            match narrow(&event) {
                Some(found) => return found,
                None => event.drop_call(),
            }
        }
    }

    /// Wait for a call of `F` on `object`, dropping other mock calls, and accept it.
    #[track_caller]
    pub fn wait_for_call<F: MockFn>(&self, object: &MockObject, _: F) -> SignatureHandle<F> {
        let call = self.wait_for(&F::NAME, |event| event.narrow_call::<F>(object));
        call.accept();
        call
    }

    /// Wait for a call of `F` on `object` matching the pattern, dropping other mock calls, and accept it.
    #[track_caller]
    pub fn wait_for_call_matching<F: MockFn>(
        &self,
        object: &MockObject,
        _: F,
        matching: &dyn Fn(&mut Matching<F>),
    ) -> SignatureHandle<F> {
        let matcher = InputMatcher::from_matching_fn(matching);
        let call = self.wait_for(&F::NAME, |event| {
            event
                .narrow_call::<F>(object)
                .filter(|call| matcher.matches::<F>(call.args()))
        });
        call.accept();
        call
    }

    /// Wait for a call of `F` on `object` made by `launch`, dropping other mock calls, and accept it.
    #[track_caller]
    pub fn wait_for_call_from<F: MockFn, R>(
        &self,
        object: &MockObject,
        _: F,
        launch: &LaunchHandle<R>,
    ) -> SignatureHandle<F> {
        let call = self.wait_for(&F::NAME, |event| {
            event.narrow_call::<F>(object)?.from(launch)
        });
        call.accept();
        call
    }

    /// Wait for any mock call and accept it.
    #[track_caller]
    pub fn wait_for_any_call(&self) -> EventHandle {
        let event = self.wait_for(&"any mock call", EventHandle::is_mock_call);
        event.accept();
        event
    }

    /// Wait for any mock call made by `launch`, dropping other mock calls, and accept it.
    #[track_caller]
    pub fn wait_for_any_call_from<R>(&self, launch: &LaunchHandle<R>) -> EventHandle {
        let what = format!("any mock call from the launch at {}", launch.declared_at());
        let event = self.wait_for(&what, |event| event.from(launch));
        event.accept();
        event
    }

    /// Wait for any call made on `object`, dropping other mock calls, and accept it.
    #[track_caller]
    pub fn wait_for_object_call(&self, object: &MockObject) -> EventHandle {
        let what = format!("a call on mock object \"{}\"", object.name());
        let event = self.wait_for(&what, |event| event.is_object(object));
        event.accept();
        event
    }

    /// Wait for the completion of `launch`, dropping mock calls.
    ///
    /// Results of other launches arriving meanwhile stay queued, in order.
    #[track_caller]
    pub fn wait_for_result<R>(&self, launch: &LaunchHandle<R>) -> EventHandle {
        let mut others = vec![];
        let found = loop {
            let event = self.next_event();
            if let Some(found) = event.is_result(launch) {
                break found;
            }
            if event.is_launch_result().is_some() {
                others.push(event.data());
            } else {
                event.drop_call();
            }
        };

        if !others.is_empty() {
            self.shared
                .engine
                .locked(|engine| engine.requeue_front(self.id, others));
        }
        found
    }

    fn exit(&self) {
        let result = self
            .shared
            .engine
            .locked(|engine| engine.exit_coroutine(self.id));

        match result {
            Ok(()) => debug!(coroutine = %self.name, "coroutine exited"),
            Err(msg) => usage_error(msg),
        }
    }
}

impl std::fmt::Debug for Co {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Co({:?})", self.name)
    }
}
