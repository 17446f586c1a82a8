use std::fmt::Debug;
use std::future::Future;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;

use crate::park::DriverWaker;
use crate::Step;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Flags: u8 {
        const STARTED = 1 << 0;
        const DONE = 1 << 1;
        const PANICKED = 1 << 2;
    }
}

type Body<'a, R> = Pin<Box<dyn Future<Output = R> + Send + 'a>>;
type Start<'a, T, R> = Box<dyn FnOnce(Co<T>) -> Body<'a, R> + Send + 'a>;

enum Frame<'a, T, R> {
    /// Body closure kept aside until the first step
    Unstarted(Start<'a, T, R>),
    Suspended(Body<'a, R>),
    Finished,
}

struct Airlock<T> {
    value: Mutex<Option<T>>,
}

/// The routine side of a [`Generator`]: handed to the body, used to produce.
pub struct Co<T> {
    airlock: Arc<Airlock<T>>,
}

impl<T> Debug for Co<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Co").finish_non_exhaustive()
    }
}

impl<T> Co<T> {
    /// Suspends the routine, handing `value` to whoever is stepping it.
    ///
    /// Execution continues after the `.await` on the next step.
    pub fn produce(&self, value: T) -> Produce<'_, T> {
        Produce {
            airlock: &self.airlock,
            value: Some(value),
        }
    }
}

#[must_use = "a produced value is only handed over when awaited"]
pub struct Produce<'c, T> {
    airlock: &'c Airlock<T>,
    value: Option<T>,
}

// The value is moved out, never pinned.
impl<T> Unpin for Produce<'_, T> {}

impl<T> Future for Produce<'_, T> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        match self.value.take() {
            Some(value) => {
                let mut slot = self.airlock.value.lock();
                assert!(
                    slot.is_none(),
                    "produce called while a previous value is still pending"
                );
                *slot = Some(value);
                Poll::Pending
            }
            None => Poll::Ready(()),
        }
    }
}

/// A suspendable routine producing values of type `T` and returning `R`.
///
/// The handle uniquely owns the paused routine. Nothing of the body runs
/// before the first [`step`](Generator::step); dropping the handle at any
/// point releases everything the body holds.
///
/// ```
/// use coro::{Generator, Step};
///
/// let mut gen = Generator::new(|co| async move {
///     co.produce(1).await;
///     co.produce(2).await;
///     "done"
/// });
/// assert_eq!(gen.step(), Step::Produced(1));
/// assert_eq!(gen.step(), Step::Produced(2));
/// assert_eq!(gen.step(), Step::Completed);
/// assert_eq!(gen.take_output(), Some("done"));
/// ```
pub struct Generator<'a, T, R = ()> {
    frame: Frame<'a, T, R>,
    airlock: Arc<Airlock<T>>,
    output: Option<R>,
    flags: Flags,
    waker: DriverWaker,
}

impl<T, R> Debug for Generator<'_, T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl<'a, T: Send + 'a, R: 'a> Generator<'a, T, R> {
    pub fn new<F, Fut>(body: F) -> Self
    where
        F: FnOnce(Co<T>) -> Fut + Send + 'a,
        Fut: Future<Output = R> + Send + 'a,
    {
        let start: Start<'a, T, R> = Box::new(move |co| Box::pin(body(co)) as Body<'a, R>);
        Self {
            frame: Frame::Unstarted(start),
            airlock: Arc::new(Airlock {
                value: Mutex::new(None),
            }),
            output: None,
            flags: Flags::empty(),
            waker: DriverWaker::default(),
        }
    }
}

impl<'a, T, R> Generator<'a, T, R> {
    /// Resumes the routine until its next produce point or its end.
    ///
    /// Once `Completed` has been returned every later call returns
    /// `Completed` again without entering the body. A panic raised by the
    /// body is re-raised here after the routine has been torn down.
    pub fn step(&mut self) -> Step<T> {
        if let Frame::Unstarted(_) = self.frame {
            self.start();
        }
        match self.frame {
            Frame::Suspended(_) => self.resume(),
            _ => Step::Completed,
        }
    }

    /// Steps to completion, discarding produced values.
    pub fn drain(&mut self) -> Option<R> {
        while self.step().is_produced() {}
        self.take_output()
    }

    /// The value returned by the body, available once after completion.
    pub fn take_output(&mut self) -> Option<R> {
        self.output.take()
    }

    /// Tears the routine down now; equivalent to dropping the handle.
    pub fn destroy(self) {
        drop(self)
    }

    /// Returns a cursor positioned before the first value.
    pub fn cursor(&mut self) -> crate::Cursor<'_, 'a, T, R> {
        crate::Cursor::new(self)
    }

    #[inline(always)]
    pub fn is_started(&self) -> bool {
        self.flags.contains(Flags::STARTED)
    }

    #[inline(always)]
    pub fn is_done(&self) -> bool {
        self.flags.contains(Flags::DONE)
    }

    #[inline(always)]
    pub fn has_panicked(&self) -> bool {
        self.flags.contains(Flags::PANICKED)
    }

    fn start(&mut self) {
        let Frame::Unstarted(start) = std::mem::replace(&mut self.frame, Frame::Finished) else {
            unreachable!("start called on a started routine")
        };
        self.flags |= Flags::STARTED;
        log::trace!("generator: start");
        let co = Co {
            airlock: self.airlock.clone(),
        };
        match catch_unwind(AssertUnwindSafe(move || start(co))) {
            Ok(body) => self.frame = Frame::Suspended(body),
            Err(cause) => self.fault(cause),
        }
    }

    fn resume(&mut self) -> Step<T> {
        let (park, waker) = self.waker.get();
        let mut cx = Context::from_waker(&waker);
        loop {
            let Frame::Suspended(body) = &mut self.frame else {
                unreachable!("resume called on a routine that is not suspended")
            };
            match catch_unwind(AssertUnwindSafe(|| body.as_mut().poll(&mut cx))) {
                Ok(Poll::Ready(output)) => {
                    self.output = Some(output);
                    self.finish();
                    return Step::Completed;
                }
                Ok(Poll::Pending) => {
                    if let Some(value) = self.airlock.value.lock().take() {
                        return Step::Produced(value);
                    }
                    log::trace!("generator: pending without a value, parking driver");
                    park.park();
                }
                Err(cause) => self.fault(cause),
            }
        }
    }

    fn finish(&mut self) {
        self.flags |= Flags::DONE;
        log::trace!("generator: completed");
        self.teardown();
    }

    fn fault(&mut self, cause: Box<dyn std::any::Any + Send>) -> ! {
        self.flags |= Flags::DONE | Flags::PANICKED;
        log::trace!("generator: body panicked: {}", panic_message(&*cause));
        self.teardown();
        resume_unwind(cause)
    }

    /// Drops the frame; never unwinds.
    fn teardown(&mut self) {
        let frame = std::mem::replace(&mut self.frame, Frame::Finished);
        if matches!(frame, Frame::Finished) {
            return;
        }
        if let Err(cause) = catch_unwind(AssertUnwindSafe(move || drop(frame))) {
            log::error!(
                "generator: panic while releasing routine state: {}",
                panic_message(&*cause)
            );
        }
        if let Some(mut slot) = self.airlock.value.try_lock() {
            slot.take();
        }
    }
}

impl<T, R> Drop for Generator<'_, T, R> {
    fn drop(&mut self) {
        if !self.is_done() {
            log::trace!(
                "generator: abandoned (started: {})",
                self.flags.contains(Flags::STARTED)
            );
        }
        self.teardown();
    }
}

pub(crate) fn panic_message(cause: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = cause.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = cause.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}
