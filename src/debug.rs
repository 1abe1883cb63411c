use std::panic::Location;
use std::rc::Rc;

use crate::DynMockFn;

#[derive(Clone)]
pub(crate) struct FnActualCall {
    pub mock_fn: DynMockFn,
    pub inputs_debug: String,
}

impl std::fmt::Display for FnActualCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.mock_fn.name, self.inputs_debug)
    }
}

/// An expectation or typed watch, as written by the user.
#[derive(Clone)]
pub(crate) struct CallPatternDebug {
    pub mock_fn: DynMockFn,
    pub matcher: Option<InputMatcherDebug>,
    pub location: &'static Location<'static>,
}

impl std::fmt::Display for CallPatternDebug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = self.mock_fn.name;
        match &self.matcher {
            Some(InputMatcherDebug {
                pat_debug,
                file,
                line,
            }) => write!(f, "{name}{pat_debug} at {file}:{line}"),
            None => write!(f, "{name}(..) at {}", DeclaredAt(self.location)),
        }
    }
}

#[derive(Copy, Clone)]
pub(crate) struct InputMatcherDebug {
    pub pat_debug: &'static str,
    pub file: &'static str,
    pub line: u32,
}

#[derive(Clone)]
pub(crate) struct CoroutineDebug {
    pub name: Rc<str>,
    pub location: &'static Location<'static>,
}

impl std::fmt::Display for CoroutineDebug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "coroutine \"{}\" declared at {}",
            self.name,
            DeclaredAt(self.location)
        )
    }
}

pub(crate) struct DeclaredAt(pub &'static Location<'static>);

impl std::fmt::Display for DeclaredAt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.0.file(), self.0.line())
    }
}
