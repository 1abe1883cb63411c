//! Stackful fibers on top of [corosensei].
//!
//! Every coroutine and every launch runs on its own stack, but all of them run
//! on the test thread and only one of them (or the router) runs at a time.
//! A fiber is a long-lived worker: it runs one job at a time, and goes back to
//! waiting for the next job when the current one finishes.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::rc::Rc;

use corosensei::{Coroutine, CoroutineResult, Yielder};

pub(crate) type PanicPayload = Box<dyn Any + Send + 'static>;

pub(crate) type Job = Box<dyn FnOnce(&Suspender)>;

/// Unwind payload of a cancelled fiber. Never reported as a failure.
pub(crate) struct Cancelled;

/// What the router hands to a fiber when resuming it.
enum Resume {
    Run,
    Cancel,
    Shutdown,
}

/// What a fiber hands back to the router.
enum Yielded {
    Suspended,
    Finished(Option<PanicPayload>),
}

type FiberYielder = Yielder<Resume, Yielded>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Phase {
    /// Idle, possibly holding a job that has not been resumed yet.
    Vacant,
    Running,
    /// The job is parked inside [Suspender::suspend].
    Parked,
}

struct Baton {
    phase: Cell<Phase>,
    job: RefCell<Option<Job>>,
    /// Set once the worker has started, and valid for as long as the worker runs.
    yielder: Cell<*const FiberYielder>,
}

thread_local! {
    /// The innermost fiber currently executing on this thread.
    static ACTIVE: Cell<*const Baton> = const { Cell::new(ptr::null()) };
}

/// Restores the previously active fiber when dropped.
struct Activation {
    previous: *const Baton,
}

impl Activation {
    fn enter(baton: &Rc<Baton>) -> Self {
        let previous = ACTIVE.with(|active| active.replace(Rc::as_ptr(baton)));
        Self { previous }
    }
}

impl Drop for Activation {
    fn drop(&mut self) {
        ACTIVE.with(|active| active.set(self.previous));
    }
}

/// Outcome of handing control to a fiber.
pub(crate) enum Switch {
    /// The job suspended itself and handed control back.
    Suspended,
    /// The job ran to completion, carrying its panic payload if it panicked.
    Finished(Option<PanicPayload>),
}

pub(crate) struct Fiber {
    name: String,
    baton: Rc<Baton>,
    coroutine: RefCell<Coroutine<Resume, Yielded, ()>>,
}

impl Fiber {
    pub fn spawn(name: &str) -> Self {
        let baton = Rc::new(Baton {
            phase: Cell::new(Phase::Vacant),
            job: RefCell::new(None),
            yielder: Cell::new(ptr::null()),
        });

        let coroutine = Coroutine::new({
            let baton = baton.clone();
            move |yielder: &FiberYielder, resume: Resume| run_worker(baton, yielder, resume)
        });

        Self {
            name: name.to_string(),
            baton,
            coroutine: RefCell::new(coroutine),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn suspender(&self) -> Suspender {
        Suspender {
            baton: self.baton.clone(),
        }
    }

    /// Give an idle fiber a job. It starts running at the next [Fiber::resume].
    pub fn assign(&self, job: Job) {
        debug_assert_eq!(Phase::Vacant, self.baton.phase.get());
        let previous = self.baton.job.borrow_mut().replace(job);
        debug_assert!(previous.is_none());
    }

    #[cfg(test)]
    pub fn has_job(&self) -> bool {
        self.baton.job.borrow().is_some() || self.baton.phase.get() == Phase::Parked
    }

    /// Run the fiber until its job suspends or finishes.
    pub fn resume(&self) -> Switch {
        debug_assert!(matches!(
            self.baton.phase.get(),
            Phase::Vacant | Phase::Parked
        ));
        self.switch(Resume::Run)
    }

    /// Discard the job of this fiber, unwinding it if it is parked.
    ///
    /// Returns whether there was anything to cancel.
    pub fn cancel(&self) -> bool {
        match self.baton.phase.get() {
            Phase::Vacant => self.baton.job.borrow_mut().take().is_some(),
            Phase::Parked => {
                // a job catching the unwind may suspend again
                while let Switch::Suspended = self.switch(Resume::Cancel) {}
                true
            }
            Phase::Running => false,
        }
    }

    fn switch(&self, resume: Resume) -> Switch {
        self.baton.phase.set(Phase::Running);

        let result = {
            let _active = Activation::enter(&self.baton);
            self.coroutine.borrow_mut().resume(resume)
        };

        match result {
            CoroutineResult::Yield(Yielded::Suspended) => {
                self.baton.phase.set(Phase::Parked);
                Switch::Suspended
            }
            CoroutineResult::Yield(Yielded::Finished(panic)) => {
                self.baton.phase.set(Phase::Vacant);
                Switch::Finished(panic)
            }
            CoroutineResult::Return(()) => {
                self.baton.phase.set(Phase::Vacant);
                Switch::Finished(None)
            }
        }
    }
}

impl Drop for Fiber {
    fn drop(&mut self) {
        self.cancel();

        let mut coroutine = self.coroutine.borrow_mut();
        if coroutine.started() && !coroutine.done() {
            let _active = Activation::enter(&self.baton);
            let _ = coroutine.resume(Resume::Shutdown);
        }
    }
}

/// The fiber-side end of a switch, used by a job to give control back.
#[derive(Clone)]
pub(crate) struct Suspender {
    baton: Rc<Baton>,
}

impl Suspender {
    /// Park the current job and hand control back to the router.
    ///
    /// Returns when the router resumes this fiber. If the fiber is cancelled
    /// instead, this unwinds with a [Cancelled] payload.
    pub fn suspend(&self) {
        let active = ACTIVE.with(Cell::get);
        let yielder = self.baton.yielder.get();
        if active != Rc::as_ptr(&self.baton) || yielder.is_null() {
            panic!("cotest: a fiber can only suspend itself");
        }

        // SAFETY: the fiber is the innermost one running on this thread, so we
        // are on its stack, below the worker frame that owns the yielder.
        #[allow(unsafe_code)]
        let yielder = unsafe { &*yielder };

        match yielder.suspend(Yielded::Suspended) {
            Resume::Run => {}
            Resume::Cancel | Resume::Shutdown => panic::resume_unwind(Box::new(Cancelled)),
        }
    }
}

fn run_worker(baton: Rc<Baton>, yielder: &FiberYielder, mut resume: Resume) {
    baton.yielder.set(yielder as *const FiberYielder);
    let suspender = Suspender {
        baton: baton.clone(),
    };

    loop {
        let panic = match resume {
            Resume::Shutdown => break,
            Resume::Cancel => None,
            Resume::Run => {
                let job = baton.job.borrow_mut().take();
                let outcome = match job {
                    Some(job) => panic::catch_unwind(AssertUnwindSafe(|| job(&suspender))),
                    None => Ok(()),
                };

                match outcome {
                    Ok(()) => None,
                    Err(payload) if payload.is::<Cancelled>() => None,
                    Err(payload) => Some(payload),
                }
            }
        };

        resume = yielder.suspend(Yielded::Finished(panic));
    }

    baton.yielder.set(ptr::null());
}
