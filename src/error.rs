use std::panic::Location;
use std::rc::Rc;

use crate::counter::{CountExpectation, NCalls};
use crate::debug::{self, DeclaredAt};
use crate::mismatch::Explanations;

/// A test-outcome failure. Recorded in the context and reported at teardown.
#[derive(Clone)]
pub(crate) enum MockError {
    UnexpectedCall {
        fn_call: debug::FnActualCall,
        object: Rc<str>,
        explanations: Explanations,
    },
    WatcherOversaturated {
        fn_call: debug::FnActualCall,
        object: Rc<str>,
        coroutine: debug::CoroutineDebug,
        watch: &'static Location<'static>,
        calls: NCalls,
    },
    ExpectationOversaturated {
        fn_call: debug::FnActualCall,
        object: Rc<str>,
        pattern: debug::CallPatternDebug,
        expected: CountExpectation,
        calls: NCalls,
    },
    ExpectationUnsatisfied {
        object: Rc<str>,
        pattern: debug::CallPatternDebug,
        expected: CountExpectation,
        calls: NCalls,
    },
    CoroutineUnsatisfied {
        coroutine: debug::CoroutineDebug,
        calls: NCalls,
        retired: bool,
    },
    NoOutput {
        fn_call: debug::FnActualCall,
        object: Rc<str>,
        pattern: debug::CallPatternDebug,
    },
}

impl std::fmt::Display for MockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedCall {
                fn_call,
                object,
                explanations,
            } => {
                write!(f, "{fn_call} on mock object \"{object}\": Unexpected mock function call - returning default value.{explanations}")
            }
            Self::WatcherOversaturated {
                fn_call,
                object,
                coroutine,
                watch,
                calls,
            } => {
                writeln!(f, "{fn_call} on mock object \"{object}\": Mock function called more times than expected - returning default value.")?;
                writeln!(
                    f,
                    "    Watched at {} by {coroutine}, which has exited",
                    DeclaredAt(watch)
                )?;
                writeln!(f, "         Expected: to be handled by the coroutine")?;
                write!(f, "           Actual: {calls} - over-saturated and active")
            }
            Self::ExpectationOversaturated {
                fn_call,
                object,
                pattern,
                expected,
                calls,
            } => {
                writeln!(f, "{fn_call} on mock object \"{object}\": Mock function called more times than expected - returning default value.")?;
                writeln!(f, "    Expectation: {pattern}")?;
                writeln!(f, "         Expected: to be {expected}")?;
                write!(f, "           Actual: {calls} - over-saturated and active")
            }
            Self::ExpectationUnsatisfied {
                object,
                pattern,
                expected,
                calls,
            } => {
                writeln!(f, "Actual function call count doesn't match {pattern} on mock object \"{object}\".")?;
                writeln!(f, "         Expected: to be {expected}")?;
                write!(f, "           Actual: {calls} - unsatisfied and active")
            }
            Self::CoroutineUnsatisfied {
                coroutine,
                calls,
                retired,
            } => {
                let activity = if *retired { "retired" } else { "active" };
                writeln!(f, "The {coroutine} was destroyed before it exited or got satisfied.")?;
                writeln!(f, "         Expected: the coroutine to exit or be satisfied")?;
                write!(f, "           Actual: {calls} - unsatisfied and {activity}")
            }
            Self::NoOutput {
                fn_call,
                object,
                pattern,
            } => {
                write!(f, "{fn_call} on mock object \"{object}\": No output available after matching {pattern}, and the output type has no default value.")
            }
        }
    }
}

/// Abort the current test because the engine was used incorrectly.
#[track_caller]
pub(crate) fn usage_error(msg: impl std::fmt::Display) -> ! {
    panic!("cotest usage error: {msg}")
}
