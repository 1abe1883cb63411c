use std::fmt::Display;

/// Counts the calls claimed by one expectation.
pub(crate) struct CallCounter {
    actual_count: usize,
    expectation: CountExpectation,
}

impl CallCounter {
    pub fn new(expectation: CountExpectation) -> Self {
        Self {
            actual_count: 0,
            expectation,
        }
    }

    pub fn set_expectation(&mut self, expectation: CountExpectation) {
        self.expectation = expectation;
    }

    pub fn expectation(&self) -> CountExpectation {
        self.expectation
    }

    pub fn tick(&mut self) -> NCalls {
        self.actual_count += 1;
        NCalls(self.actual_count)
    }

    pub fn actual(&self) -> NCalls {
        NCalls(self.actual_count)
    }

    /// The upper bound is reached: one more call would over-saturate.
    pub fn is_saturated(&self) -> bool {
        match self.expectation.upper_bound() {
            Some(upper) => self.actual_count >= upper,
            None => false,
        }
    }

    pub fn is_oversaturated(&self) -> bool {
        match self.expectation.upper_bound() {
            Some(upper) => self.actual_count > upper,
            None => false,
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.actual_count >= self.expectation.lower_bound()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum CountExpectation {
    Exactly(usize),
    AtLeast(usize),
    AtMost(usize),
    AnyNumber,
}

impl CountExpectation {
    fn lower_bound(self) -> usize {
        match self {
            Self::Exactly(n) | Self::AtLeast(n) => n,
            Self::AtMost(_) | Self::AnyNumber => 0,
        }
    }

    fn upper_bound(self) -> Option<usize> {
        match self {
            Self::Exactly(n) | Self::AtMost(n) => Some(n),
            Self::AtLeast(_) | Self::AnyNumber => None,
        }
    }
}

impl Display for CountExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exactly(0) => write!(f, "never called"),
            Self::Exactly(n) => write!(f, "called exactly {}", Times(*n)),
            Self::AtLeast(n) => write!(f, "called at least {}", Times(*n)),
            Self::AtMost(n) => write!(f, "called at most {}", Times(*n)),
            Self::AnyNumber => write!(f, "called any number of times"),
        }
    }
}

/// Satisfaction state of a coroutine, as seen from its watchers.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Cardinality {
    Unsatisfied,
    SatisfiedByUser,
    SatisfiedByExit,
    Oversaturated,
}

impl Cardinality {
    pub fn is_satisfied(self) -> bool {
        !matches!(self, Self::Unsatisfied)
    }

    pub fn satisfy(&mut self) {
        if *self == Self::Unsatisfied {
            *self = Self::SatisfiedByUser;
        }
    }

    pub fn exit(&mut self) {
        if matches!(self, Self::Unsatisfied | Self::SatisfiedByUser) {
            *self = Self::SatisfiedByExit;
        }
    }

    pub fn oversaturate(&mut self) {
        *self = Self::Oversaturated;
    }
}

/// A call count, in the vocabulary of failure messages.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct NCalls(pub usize);

impl Display for NCalls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            0 => write!(f, "never called"),
            n => write!(f, "called {}", Times(n)),
        }
    }
}

struct Times(usize);

impl Display for Times {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            1 => write!(f, "once"),
            2 => write!(f, "twice"),
            n => write!(f, "{n} times"),
        }
    }
}
