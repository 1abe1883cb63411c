use std::marker::PhantomData;
use std::cell::RefCell;

use crate::{MockFn, MockObject};

/// Evaluate a [MockFn] against a mock object, to produce its output.
///
/// This is the entry point of every generated trait method.
#[track_caller]
pub fn eval<F: MockFn>(object: &MockObject, inputs: F::Inputs) -> F::Output {
    crate::eval::eval::<F>(object, inputs)
}

/// Format the inputs of a call, one optional debug representation per argument.
pub fn format_inputs(inputs: &[Option<String>]) -> String {
    let inner = inputs
        .iter()
        .map(|input| match input {
            Some(debug) => debug.as_str(),
            None => "?",
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!("({inner})")
}

/// Trait for computing the proper [std::fmt::Debug] representation of a value.
pub trait ProperDebug {
    /// Optionally format a debug representation.
    fn cotest_try_debug(&self) -> Option<String>;
}

/// Fallback trait (using autoref specialization) for returning [None] when the implementing value does not implement [std::fmt::Debug].
pub trait NoDebug {
    /// Optionally format a debug representation.
    fn cotest_try_debug(&self) -> Option<String>;
}

// Autoref specialization:
// https://github.com/dtolnay/case-studies/blob/master/autoref-specialization/README.md

impl<T: core::fmt::Debug> ProperDebug for T {
    fn cotest_try_debug(&self) -> Option<String> {
        Some(format!("{self:?}"))
    }
}

impl<T> NoDebug for &T {
    fn cotest_try_debug(&self) -> Option<String> {
        None
    }
}

/// Autoref helper that finds out whether a mock output implements [Default].
pub struct DefaultOf<T>(PhantomData<T>);

impl<T> DefaultOf<T> {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

/// Produces `Some(T::default())` for outputs implementing [Default].
pub trait ProperDefault<T> {
    fn cotest_try_default(&self) -> Option<T>;
}

/// Fallback for outputs without a [Default] implementation.
pub trait NoDefault<T> {
    fn cotest_try_default(&self) -> Option<T>;
}

impl<T: Default> ProperDefault<T> for DefaultOf<T> {
    fn cotest_try_default(&self) -> Option<T> {
        Some(T::default())
    }
}

impl<T> NoDefault<T> for &DefaultOf<T> {
    fn cotest_try_default(&self) -> Option<T> {
        None
    }
}

/// Convert any type implementing `AsRef<str>` to a `&str`.
#[inline]
pub fn as_str_ref<T>(input: &T) -> &str
where
    T: AsRef<str>,
{
    input.as_ref()
}

/// Convert any type implementing `AsRef<[I]>` to a `&[I]`.
#[inline]
pub fn as_slice<T, I>(input: &T) -> &[I]
where
    T: AsRef<[I]>,
{
    input.as_ref()
}

/// Exclusive access to state shared by the fibers of one context.
///
/// Access is scoped to a closure, so it can never be held across a fiber switch.
pub(crate) struct MutexIsh<T> {
    inner: RefCell<T>,
}

impl<T> MutexIsh<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: RefCell::new(value),
        }
    }

    /// Run `func` with exclusive access. Re-entering is a bug, and panics.
    pub fn locked<U>(&self, func: impl FnOnce(&mut T) -> U) -> U {
        func(&mut self.inner.borrow_mut())
    }
}
