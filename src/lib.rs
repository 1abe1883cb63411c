//! `cotest` runs a test body as a coroutine that consumes mock calls as events.
//!
//! The test thread, and code under test launched from the coroutine, make calls
//! on [MockObject]s. Calls a coroutine watches are delivered to it one at a time,
//! in order, and the caller stays suspended until the coroutine returns a value
//! or drops the call. Dropped calls fall through to older declarations, which
//! may be other coroutines or plain expectations.
//!
//! ```rust
//! use cotest::*;
//!
//! #[mock(api = ServiceMock)]
//! trait Service {
//!     fn mock1(&self, i: i32) -> i32;
//! }
//!
//! fn example1(service: &impl Service, i: i32) -> i32 {
//!     service.mock1(i + 1) * 2
//! }
//!
//! let cotest = Cotest::new();
//! let m = cotest.mock_object("m");
//!
//! let coro = cotest.coroutine("answer", {
//!     let m = m.clone();
//!     move |co| {
//!         co.watch_call(&m, ServiceMock::mock1);
//!
//!         let launch = co.launch({
//!             let m = m.clone();
//!             move || example1(&m, 4)
//!         });
//!         co.wait_for_call(&m, ServiceMock::mock1).returns(1000);
//!
//!         let done = co.wait_for_result(&launch);
//!         assert_eq!(2000, done.result(&launch));
//!     }
//! });
//! ```
//!
//! # Execution model
//! Everything runs on the test thread, and only one piece of code runs at a time.
//! Coroutines and launches live on their own stacks, and hand control back and forth
//! at well-defined points: waiting for an event, resolving a call, launching, and a
//! launch making a call. Nothing needs to be `Send`.
//!
//! # Failures
//! Misuse of the API panics immediately with a `cotest usage error:` message.
//! Test outcomes, like unexpected calls or unsatisfied coroutines, are recorded
//! and reported when the [Cotest] is dropped.

#![deny(unsafe_code)]

mod args;
mod counter;
mod coroutine;
mod debug;
mod error;
mod eval;
mod event;
mod expectation;
mod fiber;
mod launch;
mod matcher;
mod mismatch;
mod mock_object;
mod router;
mod state;
mod teardown;
mod watch;

/// Internal API used by macro expansions. Not part of the public API.
#[doc(hidden)]
pub mod private;

use std::any::TypeId;
use std::panic::Location;
use std::rc::Rc;

use tracing::debug;

use state::SharedState;

pub use args::ArgAt;
pub use coroutine::{Co, Coroutine};
pub use event::{EventHandle, SignatureHandle};
pub use expectation::Expect;
pub use launch::LaunchHandle;
pub use matcher::Matching;
pub use mock_object::MockObject;

/// Generate `MockFn` markers for the methods of a trait, and implement the trait for [MockObject].
///
/// The `api` attribute names a module that receives one marker type per method:
///
/// ```rust
/// #[cotest::mock(api = ServiceMock)]
/// trait Service {
///     fn mock1(&self, i: i32) -> i32;
///     fn mock2(&self);
/// }
///
/// // ServiceMock::mock1 and ServiceMock::mock2 implement cotest::MockFn
/// ```
///
/// Every method must take `&self`, and every argument must be an owned `'static` value.
pub use cotest_macros::mock;

/// Macro to ease argument pattern matching.
///
/// It expands to a closure that configures a [Matching] builder, accepted everywhere
/// an argument matcher is expected:
///
/// ```rust
/// # use cotest::*;
/// # #[mock(api = ServiceMock)]
/// # trait Service { fn mock1(&self, i: i32) -> i32; fn greet(&self, name: String); }
/// # let cotest = Cotest::new();
/// # let m = cotest.mock_object("m");
/// m.expect(ServiceMock::mock1, matching!(1 | 2)).returns(3);
/// m.expect(ServiceMock::greet, matching!("world")).times(0);
/// m.expect(ServiceMock::mock1, matching!((i) if *i > 100)).any_number();
/// ```
///
/// String literal patterns match `String` arguments.
pub use cotest_macros::matching;

/// The static description of one mocked method.
///
/// Implemented by the marker types generated by [mock].
pub trait MockFn: Sized + 'static {
    /// Tuple of the method arguments, excluding `self`.
    type Inputs: 'static;

    /// The method return type.
    type Output: 'static;

    /// `Trait::method`, used in diagnostics.
    const NAME: &'static str;

    /// Debug representation of the inputs, `?` for arguments without [std::fmt::Debug].
    fn debug_inputs(inputs: &Self::Inputs) -> String;

    /// The value returned for calls nobody handles, if the output type has a [Default].
    fn default_output() -> Option<Self::Output>;
}

/// Type-erased identity of a [MockFn].
#[derive(Clone, Copy)]
pub(crate) struct DynMockFn {
    pub type_id: TypeId,
    pub output_type_id: TypeId,
    pub name: &'static str,
}

impl DynMockFn {
    pub fn new<F: MockFn>() -> Self {
        Self {
            type_id: TypeId::of::<F>(),
            output_type_id: TypeId::of::<F::Output>(),
            name: F::NAME,
        }
    }
}

/// The context of one test: mock objects, coroutines and their shared priority list.
///
/// Dropping it reports every recorded failure in a single panic, one failure per line.
/// All coroutines must be dropped before it.
pub struct Cotest {
    shared: Rc<SharedState>,
}

impl Cotest {
    /// Create an empty context.
    pub fn new() -> Self {
        Self {
            shared: Rc::new(SharedState::new()),
        }
    }

    /// Register a new mock object.
    pub fn mock_object(&self, name: impl Into<String>) -> MockObject {
        MockObject::new(self.shared.clone(), name.into())
    }

    /// Create a coroutine and run it until it first blocks or exits.
    #[track_caller]
    pub fn coroutine<B>(&self, name: impl Into<String>, body: B) -> Coroutine
    where
        B: FnOnce(&Co) + 'static,
    {
        let coroutine = self
            .shared
            .create_coroutine(name.into(), body, Location::caller());
        coroutine.start();
        coroutine
    }

    /// Create a coroutine without starting it.
    ///
    /// The body starts when the coroutine is first needed: an incoming call it watches,
    /// [Coroutine::start], or its destruction.
    #[track_caller]
    pub fn new_coroutine<B>(&self, name: impl Into<String>, body: B) -> Coroutine
    where
        B: FnOnce(&Co) + 'static,
    {
        self.shared
            .create_coroutine(name.into(), body, Location::caller())
    }

    /// Join idle launch fibers, returning how many there were.
    pub fn cleanup_launches(&self) -> usize {
        self.shared.cleanup_launches()
    }

    /// Take the failures recorded so far, so that they are not reported at teardown.
    pub fn take_failures(&self) -> Vec<String> {
        self.shared
            .take_failures()
            .into_iter()
            .map(|error| error.to_string())
            .collect()
    }
}

impl Default for Cotest {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cotest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cotest").finish_non_exhaustive()
    }
}

impl Drop for Cotest {
    fn drop(&mut self) {
        if let Err(errors) = teardown::teardown(&self.shared) {
            let message = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n");

            debug!(count = errors.len(), "reporting failures");
            panic!("{message}");
        }
    }
}
