use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::rc::Rc;

use tracing::trace;

use crate::args::ArgAt;
use crate::debug::FnActualCall;
use crate::error::usage_error;
use crate::fiber::Suspender;
use crate::launch::LaunchHandle;
use crate::matcher::{InputMatcher, Matching};
use crate::router::Caller;
use crate::state::{CoroId, Engine, EventId, Handler, LaunchId, ObjectId, SharedState, TaskId};
use crate::{DynMockFn, MockFn, MockObject};

pub(crate) type AnyBox = Box<dyn Any>;

/// Where a mock call was made.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Origin {
    Main,
    Launch(LaunchId),
}

/// The immutable part of a delivered event.
pub(crate) struct EventData {
    pub id: EventId,
    pub kind: EventKind,
}

pub(crate) enum EventKind {
    MockCall(MockCallData),
    LaunchResult(LaunchId),
}

pub(crate) struct MockCallData {
    pub object: ObjectId,
    pub mock_fn: DynMockFn,
    pub inputs: Rc<dyn Any>,
    pub origin: Origin,
    pub fn_call: FnActualCall,
}

/// Resolution state of one offered mock call. Removed by the source once resolved.
pub(crate) struct CallSlot {
    pub phase: CallPhase,
    pub origin: Origin,
    /// Priority of the watcher that offered the call.
    pub watcher: usize,
    pub fn_call: FnActualCall,
}

pub(crate) enum CallPhase {
    Offered(CoroId),
    Accepted(CoroId),
    Dropped(CoroId),
    Returned(AnyBox),
}

impl CallSlot {
    pub fn is_resolved(&self) -> bool {
        matches!(self.phase, CallPhase::Dropped(_) | CallPhase::Returned(_))
    }
}

impl Engine {
    pub fn call_resolved(&self, id: EventId) -> bool {
        self.calls.get(&id).map(CallSlot::is_resolved).unwrap_or(true)
    }

    fn wake_source(&mut self, origin: Origin) {
        if let Origin::Launch(launch) = origin {
            self.schedule(TaskId::Launch(launch));
        }
    }

    fn accept_call(&mut self, coro: CoroId, id: EventId) -> Result<(), String> {
        if let Some(slot) = self.calls.get(&id) {
            if let CallPhase::Accepted(_) = slot.phase {
                return Err(format!("{} was already accepted", slot.fn_call));
            }
        }
        self.ensure_accepted(coro, id)
    }

    /// Accept a call unless that already happened, as returning does.
    fn ensure_accepted(&mut self, coro: CoroId, id: EventId) -> Result<(), String> {
        let slot = self
            .calls
            .get_mut(&id)
            .ok_or_else(|| "the mock call was already resolved".to_string())?;

        match slot.phase {
            CallPhase::Offered(_) => {
                slot.phase = CallPhase::Accepted(coro);
                let watcher = slot.watcher;

                if let Some(state) = self.coroutines.get_mut(&coro) {
                    if state.current == Some(id) {
                        state.current = None;
                    }
                    state.open.insert(id);
                    state.accepted += 1;
                }
                if let Some(Handler::Watcher(watcher)) = self.handler_mut(watcher) {
                    watcher.calls += 1;
                }
                Ok(())
            }
            CallPhase::Accepted(_) => Ok(()),
            CallPhase::Dropped(_) | CallPhase::Returned(_) => {
                Err(format!("{} was already resolved", slot.fn_call))
            }
        }
    }

    fn drop_call(&mut self, coro: CoroId, id: EventId) -> Result<(), String> {
        let slot = self
            .calls
            .get_mut(&id)
            .ok_or_else(|| "the mock call was already resolved".to_string())?;

        match slot.phase {
            CallPhase::Offered(_) => {
                slot.phase = CallPhase::Dropped(coro);
                let origin = slot.origin;

                if let Some(state) = self.coroutines.get_mut(&coro) {
                    if state.current == Some(id) {
                        state.current = None;
                    }
                }
                self.wake_source(origin);
                Ok(())
            }
            CallPhase::Accepted(_) => Err(format!(
                "{} cannot be dropped after it was accepted",
                slot.fn_call
            )),
            CallPhase::Dropped(_) | CallPhase::Returned(_) => {
                Err(format!("{} was already resolved", slot.fn_call))
            }
        }
    }

    fn return_call(&mut self, coro: CoroId, id: EventId, output: AnyBox) -> Result<(), String> {
        self.ensure_accepted(coro, id)?;

        let slot = self
            .calls
            .get_mut(&id)
            .ok_or_else(|| "the mock call was already resolved".to_string())?;
        slot.phase = CallPhase::Returned(output);
        let origin = slot.origin;

        if let Some(state) = self.coroutines.get_mut(&coro) {
            state.open.remove(&id);
        }
        self.wake_source(origin);
        Ok(())
    }

    /// Decline a call on behalf of a coroutine that can no longer handle it.
    pub fn force_drop(&mut self, coro: CoroId, id: EventId) {
        if let Some(slot) = self.calls.get_mut(&id) {
            if !slot.is_resolved() {
                slot.phase = CallPhase::Dropped(coro);
                let origin = slot.origin;
                self.wake_source(origin);
            }
        }
    }
}

/// An event delivered to a coroutine: a mock call, or the completion of a launch.
///
/// Narrowing methods return `Option`, so that a chain of them reads like a filter:
///
/// ```rust,ignore
/// let event = co.next_event();
/// if let Some(call) = event.is_call(&mock, ServiceMock::mock1).and_then(|c| c.from_main()) {
///     call.returns(10);
/// } else {
///     event.drop_call();
/// }
/// ```
#[derive(Clone)]
pub struct EventHandle {
    shared: Rc<SharedState>,
    coro: CoroId,
    data: Rc<EventData>,
}

impl EventHandle {
    pub(crate) fn new(shared: Rc<SharedState>, coro: CoroId, data: Rc<EventData>) -> Self {
        Self { shared, coro, data }
    }

    pub(crate) fn data(&self) -> Rc<EventData> {
        self.data.clone()
    }

    fn mock_call(&self) -> Option<&MockCallData> {
        match &self.data.kind {
            EventKind::MockCall(call) => Some(call),
            EventKind::LaunchResult(_) => None,
        }
    }

    fn launch_result(&self) -> Option<LaunchId> {
        match &self.data.kind {
            EventKind::MockCall(_) => None,
            EventKind::LaunchResult(launch) => Some(*launch),
        }
    }

    pub fn is_mock_call(&self) -> Option<EventHandle> {
        self.mock_call().map(|_| self.clone())
    }

    pub fn is_launch_result(&self) -> Option<EventHandle> {
        self.launch_result().map(|_| self.clone())
    }

    /// Narrow to calls made on `object`, any method.
    pub fn is_object(&self, object: &MockObject) -> Option<EventHandle> {
        self.mock_call()
            .filter(|call| call.object == object.id())
            .map(|_| self.clone())
    }

    /// Narrow to calls of the mock function `F` on `object`, giving typed access to its inputs.
    pub fn is_call<F: MockFn>(&self, object: &MockObject, _: F) -> Option<SignatureHandle<F>> {
        self.narrow_call::<F>(object)
    }

    pub(crate) fn narrow_call<F: MockFn>(&self, object: &MockObject) -> Option<SignatureHandle<F>> {
        let call = self.mock_call()?;
        if call.object != object.id() || call.mock_fn.type_id != TypeId::of::<F>() {
            return None;
        }

        let inputs = call.inputs.clone().downcast::<F::Inputs>().ok()?;
        Some(SignatureHandle {
            event: self.clone(),
            inputs,
            mock_fn: PhantomData,
        })
    }

    /// Like [EventHandle::is_call], additionally requiring the inputs to match a [matching](crate::matching) pattern.
    pub fn is_call_matching<F: MockFn>(
        &self,
        object: &MockObject,
        mock_fn: F,
        matching: &dyn Fn(&mut Matching<F>),
    ) -> Option<SignatureHandle<F>> {
        let call = self.is_call(object, mock_fn)?;
        InputMatcher::from_matching_fn(matching)
            .matches::<F>(call.args())
            .then_some(call)
    }

    /// Narrow to mock calls made by the given launch.
    pub fn from<R>(&self, launch: &LaunchHandle<R>) -> Option<EventHandle> {
        self.mock_call()
            .filter(|call| call.origin == Origin::Launch(launch.id()))
            .map(|_| self.clone())
    }

    /// Narrow to mock calls made by the test thread itself.
    pub fn from_main(&self) -> Option<EventHandle> {
        self.mock_call()
            .filter(|call| call.origin == Origin::Main)
            .map(|_| self.clone())
    }

    /// Narrow to the completion of the given launch, marking its result as observed.
    pub fn is_result<R>(&self, launch: &LaunchHandle<R>) -> Option<EventHandle> {
        if self.launch_result()? != launch.id() {
            return None;
        }

        self.shared.engine.locked(|engine| {
            if let Some(state) = engine.launches.get_mut(&launch.id()) {
                state.observed = true;
            }
        });
        Some(self.clone())
    }

    /// The result of a launch, after observing its completion with [EventHandle::is_result].
    #[track_caller]
    pub fn result<R: Clone>(&self, launch: &LaunchHandle<R>) -> R {
        self.result_ref(launch).clone()
    }

    /// Borrow the result of a launch, after observing its completion with [EventHandle::is_result].
    #[track_caller]
    pub fn result_ref<'l, R>(&self, launch: &'l LaunchHandle<R>) -> &'l R {
        let observed = self.launch_result() == Some(launch.id())
            && self.shared.engine.locked(|engine| {
                engine
                    .launches
                    .get(&launch.id())
                    .map(|state| state.observed)
                    .unwrap_or(false)
            });

        if !observed {
            usage_error(format_args!(
                "the result of the launch at {} was accessed before it was observed with is_result()",
                launch.declared_at()
            ));
        }

        match launch.completed() {
            Some(result) => result,
            None => usage_error("launch result event delivered without a result"),
        }
    }

    /// A diagnostic name: the mock function, or `"launch result"`.
    pub fn name(&self) -> &'static str {
        match &self.data.kind {
            EventKind::MockCall(call) => call.mock_fn.name,
            EventKind::LaunchResult(_) => "launch result",
        }
    }

    /// Commit to handling this mock call. The call must then be returned before the coroutine exits.
    #[track_caller]
    pub fn accept(&self) -> &Self {
        let id = self.require_mock_call("accepted");
        let result = self
            .shared
            .engine
            .locked(|engine| engine.accept_call(self.coro, id));

        if let Err(msg) = result {
            usage_error(msg);
        }
        trace!(event = %id, "accepted");
        self
    }

    /// Decline this mock call. Lower-priority handlers get to see it next.
    #[track_caller]
    pub fn drop_call(self) {
        let id = self.require_mock_call("dropped");
        let suspender = self.resolving_suspender();
        let result = self
            .shared
            .engine
            .locked(|engine| engine.drop_call(self.coro, id));

        if let Err(msg) = result {
            usage_error(msg);
        }
        trace!(event = %id, "dropped");
        self.shared
            .yield_task(TaskId::Coroutine(self.coro), &suspender);
    }

    /// Return from a mock call whose output is `()`.
    #[track_caller]
    pub fn returns_unit(self) {
        let call = match self.mock_call() {
            Some(call) => call,
            None => usage_error("a launch result cannot be returned"),
        };
        if call.mock_fn.output_type_id != TypeId::of::<()>() {
            usage_error(format_args!(
                "{} does not return (), use is_call() to return a typed value",
                call.fn_call
            ));
        }

        self.return_output(Box::new(()));
    }

    #[track_caller]
    pub(crate) fn return_output(self, output: AnyBox) {
        let id = self.require_mock_call("returned");
        let suspender = self.resolving_suspender();
        let result = self
            .shared
            .engine
            .locked(|engine| engine.return_call(self.coro, id, output));

        if let Err(msg) = result {
            usage_error(msg);
        }
        trace!(event = %id, "returned");
        self.shared
            .yield_task(TaskId::Coroutine(self.coro), &suspender);
    }

    #[track_caller]
    fn require_mock_call(&self, verb: &str) -> EventId {
        match &self.data.kind {
            EventKind::MockCall(_) => self.data.id,
            EventKind::LaunchResult(_) if verb == "dropped" => {
                usage_error("Dropping a launch result is not allowed")
            }
            EventKind::LaunchResult(_) => {
                usage_error(format_args!("a launch result cannot be {verb}"))
            }
        }
    }

    #[track_caller]
    fn resolving_suspender(&self) -> Suspender {
        match self.shared.caller() {
            Caller::Task(TaskId::Coroutine(id), suspender) if id == self.coro => suspender,
            _ => usage_error(format_args!(
                "{self} can only be resolved by the coroutine it was delivered to"
            )),
        }
    }
}

impl std::fmt::Display for EventHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.data.kind {
            EventKind::MockCall(call) => write!(f, "{}", call.fn_call),
            EventKind::LaunchResult(launch) => write!(f, "result of launch {launch}"),
        }
    }
}

impl std::fmt::Debug for EventHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EventHandle({self})")
    }
}

/// A mock call narrowed to one mock function, with typed inputs.
pub struct SignatureHandle<F: MockFn> {
    event: EventHandle,
    inputs: Rc<F::Inputs>,
    mock_fn: PhantomData<fn() -> F>,
}

impl<F: MockFn> Clone for SignatureHandle<F> {
    fn clone(&self) -> Self {
        Self {
            event: self.event.clone(),
            inputs: self.inputs.clone(),
            mock_fn: PhantomData,
        }
    }
}

impl<F: MockFn> SignatureHandle<F> {
    /// The inputs tuple.
    pub fn args(&self) -> &F::Inputs {
        &self.inputs
    }

    /// One argument, by position.
    pub fn arg<const I: usize>(&self) -> &<F::Inputs as ArgAt<I>>::Arg
    where
        F::Inputs: ArgAt<I>,
    {
        <F::Inputs as ArgAt<I>>::arg_at(&self.inputs)
    }

    /// Narrow by a predicate over the inputs tuple.
    pub fn with(self, predicate: impl FnOnce(&F::Inputs) -> bool) -> Option<Self> {
        predicate(&*self.inputs).then_some(self)
    }

    /// Narrow by a predicate over one argument.
    pub fn with_arg<const I: usize>(
        self,
        predicate: impl FnOnce(&<F::Inputs as ArgAt<I>>::Arg) -> bool,
    ) -> Option<Self>
    where
        F::Inputs: ArgAt<I>,
    {
        predicate(self.arg::<I>()).then_some(self)
    }

    pub fn from<R>(self, launch: &LaunchHandle<R>) -> Option<Self> {
        self.event.from(launch)?;
        Some(self)
    }

    pub fn from_main(self) -> Option<Self> {
        self.event.from_main()?;
        Some(self)
    }

    #[track_caller]
    pub fn accept(&self) -> &Self {
        self.event.accept();
        self
    }

    #[track_caller]
    pub fn drop_call(self) {
        self.event.drop_call();
    }

    /// Return `output` to the caller, accepting the call first if needed.
    #[track_caller]
    pub fn returns(self, output: F::Output) {
        self.event.return_output(Box::new(output));
    }

    pub fn event(&self) -> &EventHandle {
        &self.event
    }

    pub fn name(&self) -> &'static str {
        F::NAME
    }
}

impl<F: MockFn> std::fmt::Debug for SignatureHandle<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SignatureHandle({})", self.event)
    }
}
