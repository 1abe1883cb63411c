use std::any::Any;
use std::marker::PhantomData;

use crate::debug::InputMatcherDebug;
use crate::MockFn;

type MatchingFn<F> = Box<dyn Fn(&<F as MockFn>::Inputs) -> bool>;

/// A builder for argument matchers.
///
/// Normally populated by the [matching](crate::matching) macro.
pub struct Matching<F: MockFn> {
    mock_fn: PhantomData<F>,
    matching_fn: Option<MatchingFn<F>>,
    matcher_debug: Option<InputMatcherDebug>,
}

impl<F: MockFn> Matching<F> {
    fn new() -> Self {
        Self {
            mock_fn: PhantomData,
            matching_fn: None,
            matcher_debug: None,
        }
    }

    /// Set the matching function.
    ///
    /// The function receives a reference to the inputs tuple and answers match or no match.
    #[inline]
    pub fn func<M>(&mut self, matching_fn: M)
    where
        M: Fn(&F::Inputs) -> bool + 'static,
    {
        self.matching_fn = Some(Box::new(matching_fn));
    }

    /// Register debug info on the matching builder.
    ///
    /// Printed as part of failure messages when the matcher rejects a call.
    pub fn pat_debug(&mut self, pat_debug: &'static str, file: &'static str, line: u32) {
        self.matcher_debug = Some(InputMatcherDebug {
            pat_debug,
            file,
            line,
        });
    }
}

/// Type-erased argument matcher, stored in the priority list.
pub(crate) struct InputMatcher {
    func: Option<Box<dyn Any>>,
    pub debug: Option<InputMatcherDebug>,
}

impl InputMatcher {
    pub fn from_matching_fn<F: MockFn>(matching_fn: &dyn Fn(&mut Matching<F>)) -> Self {
        let mut builder = Matching::new();
        matching_fn(&mut builder);

        Self {
            func: builder
                .matching_fn
                .map(|func| Box::new(func) as Box<dyn Any>),
            debug: builder.matcher_debug,
        }
    }

    /// Matches any inputs.
    pub fn any() -> Self {
        Self {
            func: None,
            debug: None,
        }
    }

    pub fn matches<F: MockFn>(&self, inputs: &F::Inputs) -> bool {
        match &self.func {
            None => true,
            Some(func) => match func.downcast_ref::<MatchingFn<F>>() {
                Some(func) => func(inputs),
                None => false,
            },
        }
    }
}
