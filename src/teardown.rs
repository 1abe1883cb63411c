use tracing::debug;

use crate::error::{usage_error, MockError};
use crate::state::SharedState;

impl SharedState {
    /// Cancel every coroutine and its launches, without running anything.
    pub fn cancel_all(&self) {
        let coroutines: Vec<_> = self
            .engine
            .locked(|engine| engine.coroutines.keys().copied().collect());

        for coro in coroutines {
            self.cancel_coroutine(coro);
        }
    }
}

/// Verify and dismantle a context whose `Cotest` is being dropped.
pub(crate) fn teardown(shared: &SharedState) -> Result<(), Vec<MockError>> {
    // skip verification if the test already failed
    if std::thread::panicking() {
        shared.cancel_all();
        return Ok(());
    }

    let alive: Vec<String> = shared.engine.locked(|engine| {
        engine
            .coroutines
            .values()
            .map(|coro| coro.name.to_string())
            .collect()
    });
    if !alive.is_empty() {
        shared.cancel_all();
        usage_error(format_args!(
            "Cotest dropped while coroutines are still alive: {}",
            alive.join(", ")
        ));
    }

    let mut errors = shared.take_failures();
    errors.extend(shared.engine.locked(|engine| engine.verify_expectations(None)));

    shared.cancel_all();
    let reclaimed = shared.cleanup_launches();
    debug!(reclaimed, failures = errors.len(), "context torn down");

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
