use std::panic::Location;
use std::rc::Rc;

use crate::error::usage_error;
use crate::expectation::Expect;
use crate::matcher::{InputMatcher, Matching};
use crate::state::{ObjectId, SharedState};
use crate::{DynMockFn, MockFn};

/// A registered mock instance.
///
/// Traits annotated with [mock](crate::mock) are implemented for `MockObject`.
/// Clones share identity. Expectations declared on the object are verified
/// when its last clone is dropped.
#[derive(Clone)]
pub struct MockObject {
    inner: Rc<ObjectInner>,
}

struct ObjectInner {
    shared: Rc<SharedState>,
    id: ObjectId,
    name: Rc<str>,
}

impl MockObject {
    pub(crate) fn new(shared: Rc<SharedState>, name: String) -> Self {
        let id = ObjectId(shared.next_id());
        Self {
            inner: Rc::new(ObjectInner {
                shared,
                id,
                name: name.into(),
            }),
        }
    }

    pub(crate) fn id(&self) -> ObjectId {
        self.inner.id
    }

    pub(crate) fn shared(&self) -> &Rc<SharedState> {
        &self.inner.shared
    }

    pub(crate) fn name_arc(&self) -> Rc<str> {
        self.inner.name.clone()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Expect a call of `F` on this object with inputs matching the pattern.
    ///
    /// Expectations and coroutine watches share one priority list: the latest declaration is consulted first.
    ///
    /// ```rust,ignore
    /// mock.expect(ServiceMock::mock2, matching!(_)).times(2).returns(7);
    /// ```
    #[track_caller]
    pub fn expect<F: MockFn>(&self, _: F, matching: &dyn Fn(&mut Matching<F>)) -> Expect<F> {
        let priority = self.inner.shared.add_expectation(
            self.id(),
            self.name_arc(),
            DynMockFn::new::<F>(),
            InputMatcher::from_matching_fn(matching),
            Location::caller(),
        );
        Expect::new(self.inner.shared.clone(), priority)
    }
}

impl Drop for ObjectInner {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }

        let errors = self
            .shared
            .engine
            .locked(|engine| engine.verify_expectations(Some(self.id)));
        for error in errors {
            self.shared.record_failure(error);
        }
    }
}

impl std::fmt::Debug for MockObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockObject({:?})", self.inner.name)
    }
}

impl SharedState {
    /// Mock objects only work with the context that created them.
    #[track_caller]
    pub fn check_object(&self, object: &MockObject) {
        if !std::ptr::eq(Rc::as_ptr(object.shared()), self) {
            usage_error(format_args!(
                "mock object \"{}\" belongs to another Cotest",
                object.name()
            ));
        }
    }
}
