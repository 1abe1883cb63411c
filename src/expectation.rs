use std::any::Any;
use std::marker::PhantomData;
use std::panic::Location;
use std::rc::Rc;

use crate::counter::{CallCounter, CountExpectation};
use crate::debug::CallPatternDebug;
use crate::error::MockError;
use crate::matcher::InputMatcher;
use crate::state::{Engine, Handler, ObjectId, SharedState};
use crate::{DynMockFn, MockFn};

pub(crate) type DynResponder = Rc<dyn Any>;

/// Typed response function, stored type-erased in [Expectation].
pub(crate) struct Responder<F: MockFn>(pub Box<dyn Fn(&F::Inputs) -> F::Output>);

/// An ordinary expectation: it claims matching calls and responds on its own.
pub(crate) struct Expectation {
    pub priority: usize,
    pub object: ObjectId,
    pub object_name: Rc<str>,
    pub mock_fn: DynMockFn,
    pub matcher: InputMatcher,
    pub responder: Option<DynResponder>,
    pub counter: CallCounter,
    pub retires_on_saturation: bool,
    pub retired: bool,
    pub verified: bool,
    pub location: &'static Location<'static>,
}

impl Expectation {
    pub fn pattern_debug(&self) -> CallPatternDebug {
        CallPatternDebug {
            mock_fn: self.mock_fn,
            matcher: self.matcher.debug,
            location: self.location,
        }
    }

    fn verify(&mut self, errors: &mut Vec<MockError>) {
        if self.verified {
            return;
        }
        self.verified = true;

        if !self.counter.is_satisfied() {
            errors.push(MockError::ExpectationUnsatisfied {
                object: self.object_name.clone(),
                pattern: self.pattern_debug(),
                expected: self.counter.expectation(),
                calls: self.counter.actual(),
            });
        }
    }
}

impl Engine {
    /// Verify call counts of the expectations on `object`, or on every object.
    pub fn verify_expectations(&mut self, object: Option<ObjectId>) -> Vec<MockError> {
        let mut errors = vec![];
        for handler in &mut self.handlers {
            if let Handler::Expectation(expectation) = handler {
                if object.map(|id| id == expectation.object).unwrap_or(true) {
                    expectation.verify(&mut errors);
                }
            }
        }
        errors
    }
}

/// Builder returned by [crate::MockObject::expect].
///
/// The expectation is registered when created; each method refines it. By default it
/// must be called exactly once, and answers with the default value of the output type.
pub struct Expect<F: MockFn> {
    shared: Rc<SharedState>,
    priority: usize,
    mock_fn: PhantomData<fn() -> F>,
}

impl<F: MockFn> Expect<F> {
    pub(crate) fn new(shared: Rc<SharedState>, priority: usize) -> Self {
        Self {
            shared,
            priority,
            mock_fn: PhantomData,
        }
    }

    fn update(self, func: impl FnOnce(&mut Expectation)) -> Self {
        self.shared.engine.locked(|engine| {
            if let Some(Handler::Expectation(expectation)) = engine.handler_mut(self.priority) {
                func(expectation);
            }
        });
        self
    }

    /// Expect exactly `n` calls.
    pub fn times(self, n: usize) -> Self {
        self.update(|e| e.counter.set_expectation(CountExpectation::Exactly(n)))
    }

    pub fn at_least(self, n: usize) -> Self {
        self.update(|e| e.counter.set_expectation(CountExpectation::AtLeast(n)))
    }

    pub fn at_most(self, n: usize) -> Self {
        self.update(|e| e.counter.set_expectation(CountExpectation::AtMost(n)))
    }

    pub fn any_number(self) -> Self {
        self.update(|e| e.counter.set_expectation(CountExpectation::AnyNumber))
    }

    /// Stop claiming calls once the upper bound is reached, letting older handlers see them.
    pub fn retires_on_saturation(self) -> Self {
        self.update(|e| e.retires_on_saturation = true)
    }

    /// Respond with a clone of `value` on every call.
    pub fn returns(self, value: F::Output) -> Self
    where
        F::Output: Clone,
    {
        self.answers(move |_| value.clone())
    }

    /// Respond by computing the output from the inputs.
    pub fn answers(self, func: impl Fn(&F::Inputs) -> F::Output + 'static) -> Self {
        let responder: DynResponder = Rc::new(Responder::<F>(Box::new(func)));
        self.update(|e| e.responder = Some(responder))
    }
}

impl SharedState {
    pub fn add_expectation(
        &self,
        object: ObjectId,
        object_name: Rc<str>,
        mock_fn: DynMockFn,
        matcher: InputMatcher,
        location: &'static Location<'static>,
    ) -> usize {
        self.engine.locked(|engine| {
            engine.push_handler(|priority| {
                Handler::Expectation(Expectation {
                    priority,
                    object,
                    object_name,
                    mock_fn,
                    matcher,
                    responder: None,
                    counter: CallCounter::new(CountExpectation::Exactly(1)),
                    retires_on_saturation: false,
                    retired: false,
                    verified: false,
                    location,
                })
            })
        })
    }
}
