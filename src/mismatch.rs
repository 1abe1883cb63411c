use std::fmt::Display;
use std::panic::Location;

use crate::counter::NCalls;
use crate::debug::{CallPatternDebug, CoroutineDebug, DeclaredAt};

/// Why each candidate handler did not claim an unexpected call.
#[derive(Clone, Default)]
pub(crate) struct Explanations {
    explanations: Vec<Explanation>,
}

#[derive(Clone)]
pub(crate) enum Explanation {
    /// Matcher of an expectation or typed watch rejected the inputs.
    Mismatch {
        pattern: CallPatternDebug,
        actual: String,
    },
    ExpectationRetired {
        pattern: CallPatternDebug,
        calls: NCalls,
    },
    CoroutineRetired {
        coroutine: CoroutineDebug,
        watch: &'static Location<'static>,
    },
    Dropped {
        coroutine: CoroutineDebug,
        watch: &'static Location<'static>,
    },
}

impl Explanations {
    pub fn push(&mut self, explanation: Explanation) {
        self.explanations.push(explanation);
    }
}

impl Display for Explanations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for explanation in &self.explanations {
            writeln!(f)?;
            match explanation {
                Explanation::Mismatch { pattern, actual } => {
                    writeln!(f, "  {pattern}: Pattern mismatch (actual / expected):")?;
                    let expected = pattern.matcher.map(|matcher| matcher.pat_debug).unwrap_or("(..)");
                    Diff::new(actual, &expected).fmt(f)?;
                }
                Explanation::ExpectationRetired { pattern, calls } => {
                    writeln!(f, "  {pattern}:")?;
                    writeln!(f, "         Expected: the expectation is active")?;
                    write!(f, "           Actual: it is retired after being {calls}")?;
                }
                Explanation::CoroutineRetired { coroutine, watch } => {
                    writeln!(f, "  Watch at {} by {coroutine}:", DeclaredAt(watch))?;
                    writeln!(f, "         Expected: the coroutine is active")?;
                    write!(f, "           Actual: it is retired")?;
                }
                Explanation::Dropped { coroutine, watch } => {
                    writeln!(f, "  Watch at {} by {coroutine}:", DeclaredAt(watch))?;
                    writeln!(f, "         Expected: determined by coroutine")?;
                    write!(f, "           Actual: mock call dropped or not seen")?;
                }
            }
        }

        Ok(())
    }
}

struct Diff<'s> {
    actual: &'s str,
    expected: &'s str,
}

impl<'s> Diff<'s> {
    fn new(actual: &'s impl AsRef<str>, expected: &'s impl AsRef<str>) -> Self {
        Self {
            actual: actual.as_ref(),
            expected: expected.as_ref(),
        }
    }
}

impl<'s> Display for Diff<'s> {
    #[cfg(feature = "pretty-print")]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let comparison = pretty_assertions::StrComparison::new(self.actual, self.expected);
        write!(f, "{comparison}")
    }

    #[cfg(not(feature = "pretty-print"))]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "  actual: {}", self.actual)?;
        write!(f, "expected: {}", self.expected)
    }
}
