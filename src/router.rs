//! Decides which suspended task runs next.
//!
//! The router only ever runs on the driver: the test code calling a mock,
//! creating a coroutine or dropping one. Tasks never resume each other; they
//! update the engine and suspend, and the router picks the next ready task.

use std::cell::RefCell;
use std::panic;
use std::rc::Rc;

use tracing::trace;

use crate::fiber::{Fiber, Suspender, Switch};
use crate::state::{Engine, SharedState, TaskId};

thread_local! {
    static CURRENT_TASK: RefCell<Option<TaskContext>> = const { RefCell::new(None) };
}

#[derive(Clone)]
struct TaskContext {
    context: usize,
    task: TaskId,
    suspender: Suspender,
}

/// Who is calling into the engine.
pub(crate) enum Caller {
    Driver,
    Task(TaskId, Suspender),
}

/// Marks a task as the one currently running, until dropped.
pub(crate) struct EnterTask {
    previous: Option<TaskContext>,
}

impl Drop for EnterTask {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_TASK.with(|current| *current.borrow_mut() = previous);
    }
}

enum Next {
    Done,
    Stalled,
    Run(TaskId, Rc<Fiber>),
}

impl SharedState {
    fn context_key(&self) -> usize {
        self as *const Self as usize
    }

    fn enter_task(&self, task: TaskId, fiber: &Fiber) -> EnterTask {
        let context = TaskContext {
            context: self.context_key(),
            task,
            suspender: fiber.suspender(),
        };
        let previous = CURRENT_TASK.with(|current| current.borrow_mut().replace(context));
        EnterTask { previous }
    }

    /// Find out whether the running code is one of this context's tasks.
    pub fn caller(&self) -> Caller {
        let key = self.context_key();
        CURRENT_TASK.with(|current| match &*current.borrow() {
            Some(context) if context.context == key => {
                Caller::Task(context.task, context.suspender.clone())
            }
            _ => Caller::Driver,
        })
    }

    /// Run ready tasks in order of readiness until `done` holds.
    ///
    /// Returns `false` if every task blocked before `done` became true.
    pub fn run_until(&self, mut done: impl FnMut(&Engine) -> bool) -> bool {
        loop {
            let next = self.engine.locked(|engine| {
                if done(engine) {
                    return Next::Done;
                }

                while let Some(task) = engine.ready.pop_front().or_else(|| {
                    engine.settling.pop_front().map(TaskId::Launch)
                }) {
                    if let Some(fiber) = engine.take_for_running(task) {
                        return Next::Run(task, fiber);
                    }
                }

                Next::Stalled
            });

            match next {
                Next::Done => return true,
                Next::Stalled => return false,
                Next::Run(task, fiber) => self.switch_to(task, &fiber),
            }
        }
    }

    /// Let every runnable task progress until all of them are blocked.
    pub fn settle(&self) {
        self.run_until(|_| false);
    }

    fn switch_to(&self, task: TaskId, fiber: &Fiber) {
        trace!(?task, fiber = fiber.name(), "switching to task");

        let switch = {
            let _task = self.enter_task(task, fiber);
            fiber.resume()
        };

        match switch {
            Switch::Suspended => {
                trace!(?task, "back in router");
            }
            Switch::Finished(None) => {
                trace!(?task, "task finished");
            }
            Switch::Finished(Some(payload)) => {
                self.engine.locked(|engine| engine.task_panicked(task));
                panic::resume_unwind(payload);
            }
        }
    }

    /// Unwind a parked task, or discard its job if it never ran.
    ///
    /// Returns whether there was anything to cancel.
    pub fn cancel_task(&self, task: TaskId, fiber: &Fiber) -> bool {
        let _task = self.enter_task(task, fiber);
        fiber.cancel()
    }

    /// Put the calling task back in the ready queue and hand control to the router.
    ///
    /// The tasks readied before this one run first.
    pub fn yield_task(&self, task: TaskId, suspender: &Suspender) {
        self.engine.locked(|engine| engine.park(task));
        suspender.suspend();
    }
}

impl Engine {
    /// Mark a popped task as running and return its fiber, or `None` if it is gone.
    fn take_for_running(&mut self, task: TaskId) -> Option<Rc<Fiber>> {
        match task {
            TaskId::Coroutine(id) => {
                let coro = self.coroutines.get_mut(&id)?;
                coro.scheduled = false;
                coro.mark_running();
                Some(coro.fiber.clone())
            }
            TaskId::Launch(id) => {
                let launch = self.launches.get_mut(&id)?;
                launch.scheduled = false;
                launch.fiber.clone()
            }
        }
    }

    /// Park a task that is able to continue as soon as the router gets to it.
    pub fn park(&mut self, task: TaskId) {
        if let TaskId::Coroutine(id) = task {
            if let Some(coro) = self.coroutines.get_mut(&id) {
                coro.mark_parked();
            }
        }
        self.schedule(task);
    }

    fn task_panicked(&mut self, task: TaskId) {
        match task {
            TaskId::Coroutine(id) => {
                if let Some(coro) = self.coroutines.get_mut(&id) {
                    coro.mark_crashed();
                }
            }
            TaskId::Launch(id) => {
                self.finish_launch(id);
            }
        }
    }
}
