//! Dispatch of one mock call through the priority list.

use std::any::TypeId;
use std::collections::BTreeSet;
use std::panic::Location;
use std::rc::Rc;

use tracing::trace;

use crate::debug::{CoroutineDebug, FnActualCall};
use crate::error::{usage_error, MockError};
use crate::event::{CallPhase, CallSlot, EventData, EventKind, MockCallData, Origin};
use crate::expectation::{DynResponder, Expectation, Responder};
use crate::fiber::Suspender;
use crate::mismatch::{Explanation, Explanations};
use crate::router::Caller;
use crate::state::{CoroId, Engine, EventId, Handler, LaunchId, ObjectId, SharedState, TaskId};
use crate::watch::Rejection;
use crate::{DynMockFn, MockFn, MockObject};

struct Call<F: MockFn> {
    object: ObjectId,
    object_name: Rc<str>,
    inputs: Rc<F::Inputs>,
    origin: Origin,
    fn_call: FnActualCall,
}

/// Where the call is made from, which decides how it waits.
enum Source {
    Driver,
    Launch(LaunchId, Suspender),
}

impl Source {
    fn origin(&self) -> Origin {
        match self {
            Self::Driver => Origin::Main,
            Self::Launch(id, _) => Origin::Launch(*id),
        }
    }

    /// Let every other ready task progress before the call is dispatched.
    fn catch_up(&self, shared: &SharedState) {
        match self {
            Self::Driver => shared.settle(),
            Self::Launch(id, suspender) => {
                shared.engine.locked(|engine| engine.settling.push_back(*id));
                suspender.suspend();
            }
        }
    }

    fn await_resolution(&self, shared: &SharedState, event: EventId, fn_call: &FnActualCall, coroutine: &CoroutineDebug) {
        match self {
            Self::Driver => {
                if !shared.run_until(|engine| engine.call_resolved(event)) {
                    usage_error(format_args!(
                        "{fn_call} was offered to the {coroutine}, which blocked without returning or dropping it"
                    ));
                }
            }
            Self::Launch(_, suspender) => {
                while !shared.engine.locked(|engine| engine.call_resolved(event)) {
                    suspender.suspend();
                }
            }
        }
    }
}

/// State of one walk over the priority list.
#[derive(Default)]
struct Walk {
    /// Coroutines that already declined this call.
    dropped_by: BTreeSet<CoroId>,
    explanations: Explanations,
}

enum Step {
    Next,
    Start(CoroId),
    Respond(Option<DynResponder>, crate::debug::CallPatternDebug),
    Default(MockError),
    Offered {
        event: EventId,
        coro: CoroId,
        coroutine: CoroutineDebug,
        watch: &'static Location<'static>,
    },
}

pub(crate) fn eval<F: MockFn>(object: &MockObject, inputs: F::Inputs) -> F::Output {
    let shared = object.shared().clone();
    let source = match shared.caller() {
        Caller::Driver => Source::Driver,
        Caller::Task(TaskId::Launch(id), suspender) => Source::Launch(id, suspender),
        Caller::Task(TaskId::Coroutine(_), _) => usage_error(format_args!(
            "{}: Cannot invoke mock functions from within test coroutines",
            F::NAME
        )),
    };
    let fn_call = FnActualCall {
        mock_fn: DynMockFn::new::<F>(),
        inputs_debug: F::debug_inputs(&inputs),
    };
    let call = Call::<F> {
        object: object.id(),
        object_name: object.name_arc(),
        inputs: Rc::new(inputs),
        origin: source.origin(),
        fn_call,
    };

    source.catch_up(&shared);
    trace!(call = %call.fn_call, origin = ?call.origin, "dispatching mock call");

    let priorities = shared
        .engine
        .locked(|engine| engine.priorities_newest_first());
    let mut walk = Walk::default();

    for priority in priorities {
        loop {
            let step = shared
                .engine
                .locked(|engine| engine.step(priority, &call, &mut walk));

            match step {
                Step::Next => break,
                Step::Start(coro) => {
                    trace!(coroutine = %coro, "starting deferred coroutine for call");
                    shared.engine.locked(|engine| engine.start_coroutine(coro));
                    source.catch_up(&shared);
                }
                Step::Respond(responder, pattern) => {
                    trace!(priority, "claimed by expectation");
                    return respond(&shared, &call, responder, pattern);
                }
                Step::Default(error) => return default_or_panic::<F>(&shared, error),
                Step::Offered {
                    event,
                    coro,
                    coroutine,
                    watch,
                } => {
                    trace!(priority, %event, coroutine = %coroutine.name, "offered");
                    source.await_resolution(&shared, event, &call.fn_call, &coroutine);

                    let slot = shared.engine.locked(|engine| engine.calls.remove(&event));
                    match slot.map(|slot| slot.phase) {
                        Some(CallPhase::Returned(output)) => match output.downcast::<F::Output>() {
                            Ok(output) => return *output,
                            Err(_) => usage_error(format_args!(
                                "{}: returned value has the wrong type",
                                call.fn_call
                            )),
                        },
                        _ => {
                            trace!(%event, coroutine = %coroutine.name, "dropped");
                            walk.dropped_by.insert(coro);
                            walk.explanations
                                .push(Explanation::Dropped { coroutine, watch });
                            break;
                        }
                    }
                }
            }
        }
    }

    default_or_panic::<F>(
        &shared,
        MockError::UnexpectedCall {
            fn_call: call.fn_call,
            object: call.object_name,
            explanations: walk.explanations,
        },
    )
}

#[inline(never)]
fn respond<F: MockFn>(
    shared: &SharedState,
    call: &Call<F>,
    responder: Option<DynResponder>,
    pattern: crate::debug::CallPatternDebug,
) -> F::Output {
    let responder = responder.as_deref().and_then(|any| any.downcast_ref::<Responder<F>>());

    match responder {
        Some(Responder(func)) => func(&*call.inputs),
        None => F::default_output().unwrap_or_else(|| {
            panic!(
                "{}",
                shared.prepare_panic(MockError::NoOutput {
                    fn_call: call.fn_call.clone(),
                    object: call.object_name.clone(),
                    pattern,
                })
            )
        }),
    }
}

#[inline(never)]
fn default_or_panic<F: MockFn>(shared: &SharedState, error: MockError) -> F::Output {
    match F::default_output() {
        Some(output) => {
            shared.record_failure(error);
            output
        }
        None => panic!("{}", shared.prepare_panic(error)),
    }
}

impl Engine {
    fn step<F: MockFn>(&mut self, priority: usize, call: &Call<F>, walk: &mut Walk) -> Step {
        let (coro, watch) = match self.handler_mut(priority) {
            None => return Step::Next,
            Some(Handler::Expectation(expectation)) => {
                return step_expectation(expectation, call, walk)
            }
            Some(Handler::Watcher(watcher)) => {
                match watcher.check_target::<F>(call.object, &call.inputs) {
                    Ok(()) => {}
                    Err(Rejection::Target) => return Step::Next,
                    Err(Rejection::Matcher(pattern)) => {
                        walk.explanations.push(Explanation::Mismatch {
                            pattern,
                            actual: call.fn_call.inputs_debug.clone(),
                        });
                        return Step::Next;
                    }
                }
                (watcher.coro, watcher.location)
            }
        };

        // detached: the owning coroutine is gone
        let Some(state) = self.coroutines.get_mut(&coro) else {
            return Step::Next;
        };
        let coroutine = state.debug();

        if state.retired {
            walk.explanations
                .push(Explanation::CoroutineRetired { coroutine, watch });
            return Step::Next;
        }

        // declined once, declined for good, even if the coroutine has exited since
        if walk.dropped_by.contains(&coro) {
            return Step::Next;
        }

        if state.is_exited() {
            if state.exec == crate::coroutine::Exec::Crashed {
                return Step::Next;
            }
            state.cardinality.oversaturate();

            let mut calls = 0;
            if let Some(Handler::Watcher(watcher)) = self.handler_mut(priority) {
                watcher.calls += 1;
                calls = watcher.calls;
            }
            return Step::Default(MockError::WatcherOversaturated {
                fn_call: call.fn_call.clone(),
                object: call.object_name.clone(),
                coroutine,
                watch,
                calls: crate::counter::NCalls(calls),
            });
        }

        if state.exec == crate::coroutine::Exec::NotStarted {
            return Step::Start(coro);
        }

        let event = EventId(self.next_id());
        self.calls.insert(
            event,
            CallSlot {
                phase: CallPhase::Offered(coro),
                origin: call.origin,
                watcher: priority,
                fn_call: call.fn_call.clone(),
            },
        );
        let inputs: Rc<dyn std::any::Any> = call.inputs.clone();
        self.deliver(
            coro,
            Rc::new(EventData {
                id: event,
                kind: EventKind::MockCall(MockCallData {
                    object: call.object,
                    mock_fn: DynMockFn::new::<F>(),
                    inputs,
                    origin: call.origin,
                    fn_call: call.fn_call.clone(),
                }),
            }),
        );

        Step::Offered {
            event,
            coro,
            coroutine,
            watch,
        }
    }
}

fn step_expectation<F: MockFn>(
    expectation: &mut Expectation,
    call: &Call<F>,
    walk: &mut Walk,
) -> Step {
    if expectation.object != call.object || expectation.mock_fn.type_id != TypeId::of::<F>() {
        return Step::Next;
    }

    if expectation.retired {
        walk.explanations.push(Explanation::ExpectationRetired {
            pattern: expectation.pattern_debug(),
            calls: expectation.counter.actual(),
        });
        return Step::Next;
    }

    if !expectation.matcher.matches::<F>(&call.inputs) {
        walk.explanations.push(Explanation::Mismatch {
            pattern: expectation.pattern_debug(),
            actual: call.fn_call.inputs_debug.clone(),
        });
        return Step::Next;
    }

    let calls = expectation.counter.tick();
    if expectation.retires_on_saturation && expectation.counter.is_saturated() {
        expectation.retired = true;
    }

    if expectation.counter.is_oversaturated() {
        return Step::Default(MockError::ExpectationOversaturated {
            fn_call: call.fn_call.clone(),
            object: call.object_name.clone(),
            pattern: expectation.pattern_debug(),
            expected: expectation.counter.expectation(),
            calls,
        });
    }

    Step::Respond(expectation.responder.clone(), expectation.pattern_debug())
}
