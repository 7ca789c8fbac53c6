//! Completion tokens for jobs scheduled inside a [`std::thread::Scope`].
//!
//! A [`JobHandle`] is the dependency edge between two pieces of work: a dependent job takes its
//! predecessor's handle by value and receives whatever the predecessor produced (typically the
//! buffers it was granted exclusive access to). Ownership of the data flows along the handles.
//!
//! A job chained with [`JobHandle::then`] does not start until its predecessor has finished. It runs
//! as a continuation on the predecessor's thread, so a chain of stages occupies one thread and no
//! thread ever sits waiting on another inside the chain.

use std::mem;
use std::panic;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{Scope, ScopedJoinHandle};

/// Work whose completion is deferred until someone asks for it, without owning a thread.
trait PendingJob<T> {
    fn is_completed(&self) -> bool;
    fn complete(self: Box<Self>) -> T;
}

type Continuation<'scope, T> = Box<dyn FnOnce(T) + Send + 'scope>;

enum SlotState<'scope, T> {
    Pending,
    Ready(T),
    Continued(Continuation<'scope, T>),
    Taken,
}

/// Where a running job leaves its output, or finds the job that consumes it.
struct OutputSlot<'scope, T> {
    state: Mutex<SlotState<'scope, T>>,
}

impl<'scope, T> OutputSlot<'scope, T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Pending),
        }
    }

    /// Hands `value` to the registered continuation, running it on the calling thread, or stores it.
    fn finish(&self, value: T) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match mem::replace(&mut *state, SlotState::Taken) {
            SlotState::Continued(next) => {
                drop(state);
                next(value);
            }
            SlotState::Pending => *state = SlotState::Ready(value),
            SlotState::Ready(_) | SlotState::Taken => unreachable!("A job finishes exactly once."),
        }
    }

    /// Registers `next` to run on the finishing thread. Gives both back when the output is already there.
    fn continue_with(&self, next: Continuation<'scope, T>) -> Result<(), (Continuation<'scope, T>, T)> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match mem::replace(&mut *state, SlotState::Taken) {
            SlotState::Pending => {
                *state = SlotState::Continued(next);
                Ok(())
            }
            SlotState::Ready(value) => Err((next, value)),
            SlotState::Continued(_) | SlotState::Taken => unreachable!("A job output is consumed exactly once."),
        }
    }

    fn take(&self) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match mem::replace(&mut *state, SlotState::Taken) {
            SlotState::Ready(value) => value,
            _ => unreachable!("A joined job always leaves its output."),
        }
    }
}

/// A job running on a scoped thread. The thread may run further continuations after the job itself.
struct ScheduledJob<'scope, T> {
    thread: ScopedJoinHandle<'scope, ()>,
    output: Arc<OutputSlot<'scope, T>>,
}

impl<'scope, T: Send + 'scope> ScheduledJob<'scope, T> {
    fn spawn<'env, F>(scope: &'scope Scope<'scope, 'env>, work: F) -> Self
    where
        F: FnOnce() -> T + Send + 'scope,
    {
        let output = Arc::new(OutputSlot::new());
        let result = Arc::clone(&output);
        let thread = scope.spawn(move || result.finish(work()));
        Self { thread, output }
    }

    fn complete(self) -> T {
        if let Err(payload) = self.thread.join() {
            panic::resume_unwind(payload);
        }
        self.output.take()
    }
}

enum HandleState<'scope, T> {
    Completed(T),
    Scheduled(ScheduledJob<'scope, T>),
    Deferred(Box<dyn PendingJob<T> + Send + 'scope>),
}

/// Refers to a job scheduled in a scope.
///
/// Completing the handle blocks until the job (and everything it was chained onto) has finished.
/// A panic inside the job is re-raised on the completing thread.
#[must_use = "a job handle must be completed or chained for its work to be observed"]
pub struct JobHandle<'scope, T = ()> {
    state: HandleState<'scope, T>,
}

impl<'scope> JobHandle<'scope> {
    /// Gets a handle with no outstanding work.
    #[inline(always)]
    pub fn null() -> Self {
        Self::completed(())
    }

    /// AND-joins a set of unit handles: the result completes once every input has completed.
    pub fn combine_all(handles: Vec<JobHandle<'scope>>) -> Self {
        if handles.iter().all(JobHandle::is_completed) {
            for handle in handles {
                handle.complete();
            }
            return Self::null();
        }
        Self {
            state: HandleState::Deferred(Box::new(AllOf { handles })),
        }
    }
}

impl<'scope, T: Send + 'scope> JobHandle<'scope, T> {
    /// Wraps an already available value.
    #[inline(always)]
    pub fn completed(value: T) -> Self {
        Self {
            state: HandleState::Completed(value),
        }
    }

    /// Schedules `work` on a new thread of `scope`.
    pub fn schedule<'env, F>(scope: &'scope Scope<'scope, 'env>, work: F) -> Self
    where
        F: FnOnce() -> T + Send + 'scope,
    {
        Self {
            state: HandleState::Scheduled(ScheduledJob::spawn(scope, work)),
        }
    }

    /// Gets whether the work behind this handle has finished. Never blocks.
    pub fn is_completed(&self) -> bool {
        match &self.state {
            HandleState::Completed(_) => true,
            HandleState::Scheduled(job) => job.thread.is_finished(),
            HandleState::Deferred(pending) => pending.is_completed(),
        }
    }

    /// Waits for the job and returns what it produced.
    pub fn complete(self) -> T {
        match self.state {
            HandleState::Completed(value) => value,
            HandleState::Scheduled(job) => job.complete(),
            HandleState::Deferred(pending) => pending.complete(),
        }
    }
}

impl<'scope, T: Send + 'scope> JobHandle<'scope, T> {
    /// Schedules `work` to run once this job has completed, handing it this job's output.
    ///
    /// A running predecessor runs `work` on its own thread when it finishes. A finished predecessor hands its
    /// output to a new thread. Chaining onto a [`JobHandle::map`] or [`JobHandle::join`] result spawns a thread
    /// that completes those inputs first.
    pub fn then<'env, U, F>(self, scope: &'scope Scope<'scope, 'env>, work: F) -> JobHandle<'scope, U>
    where
        U: Send + 'scope,
        F: FnOnce(T) -> U + Send + 'scope,
    {
        match self.state {
            HandleState::Completed(value) => JobHandle::schedule(scope, move || work(value)),
            HandleState::Scheduled(ScheduledJob { thread, output }) => {
                let next_output = Arc::new(OutputSlot::new());
                let result = Arc::clone(&next_output);
                let next: Continuation<'scope, T> = Box::new(move |value| result.finish(work(value)));
                let thread = match output.continue_with(next) {
                    Ok(()) => thread,
                    Err((next, value)) => scope.spawn(move || next(value)),
                };
                JobHandle {
                    state: HandleState::Scheduled(ScheduledJob {
                        thread,
                        output: next_output,
                    }),
                }
            }
            state @ HandleState::Deferred(_) => {
                let pending = JobHandle { state };
                JobHandle::schedule(scope, move || work(pending.complete()))
            }
        }
    }

    /// Transforms the output when it is completed, on the completing thread. Spawns nothing.
    pub fn map<U, F>(self, transform: F) -> JobHandle<'scope, U>
    where
        U: Send + 'scope,
        F: FnOnce(T) -> U + Send + 'scope,
    {
        match self.state {
            HandleState::Completed(value) => JobHandle::completed(transform(value)),
            state => JobHandle {
                state: HandleState::Deferred(Box::new(Mapped {
                    source: JobHandle { state },
                    transform,
                })),
            },
        }
    }

    /// AND-joins two handles; the result completes with both outputs once both jobs have completed.
    pub fn join<U>(self, other: JobHandle<'scope, U>) -> JobHandle<'scope, (T, U)>
    where
        U: Send + 'scope,
    {
        JobHandle {
            state: HandleState::Deferred(Box::new(Both {
                first: self,
                second: other,
            })),
        }
    }
}

struct Mapped<'scope, T, F> {
    source: JobHandle<'scope, T>,
    transform: F,
}

impl<'scope, T: Send + 'scope, U, F: FnOnce(T) -> U> PendingJob<U> for Mapped<'scope, T, F> {
    fn is_completed(&self) -> bool {
        self.source.is_completed()
    }

    fn complete(self: Box<Self>) -> U {
        let Mapped { source, transform } = *self;
        transform(source.complete())
    }
}

struct Both<'scope, A, B> {
    first: JobHandle<'scope, A>,
    second: JobHandle<'scope, B>,
}

impl<'scope, A: Send + 'scope, B: Send + 'scope> PendingJob<(A, B)> for Both<'scope, A, B> {
    fn is_completed(&self) -> bool {
        self.first.is_completed() && self.second.is_completed()
    }

    fn complete(self: Box<Self>) -> (A, B) {
        let Both { first, second } = *self;
        (first.complete(), second.complete())
    }
}

struct AllOf<'scope> {
    handles: Vec<JobHandle<'scope>>,
}

impl<'scope> PendingJob<()> for AllOf<'scope> {
    fn is_completed(&self) -> bool {
        self.handles.iter().all(JobHandle::is_completed)
    }

    fn complete(self: Box<Self>) {
        for handle in self.handles {
            handle.complete();
        }
    }
}
