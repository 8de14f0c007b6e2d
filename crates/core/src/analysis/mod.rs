//! Analysis over raw code bytes.
//!
//! - [`scanner`]: function boundary discovery.
//! - [`ScanObserver`]: progress reporting and cooperative cancellation for
//!   the long-running operations (scanning, signature hashing).

pub mod scanner;

pub use scanner::{ScanReport, Scanner};

/// Hooks invoked by long-running operations.
///
/// Both methods are best-effort and must not block. Cancellation is checked at
/// every unit-of-work boundary; work committed before cancellation stays
/// applied.
pub trait ScanObserver {
    /// Called periodically with the number of units completed so far.
    fn on_progress(&mut self, _done: usize) {}

    /// Return `true` to stop at the next boundary.
    fn should_cancel(&self) -> bool {
        false
    }
}

/// Observer that never reports and never cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ScanObserver for NoopObserver {}

/// Adapter turning a pair of closures into a [`ScanObserver`].
pub struct FnObserver<P, C>
where
    P: FnMut(usize),
    C: Fn() -> bool,
{
    pub progress: P,
    pub cancel: C,
}

impl<P, C> ScanObserver for FnObserver<P, C>
where
    P: FnMut(usize),
    C: Fn() -> bool,
{
    fn on_progress(&mut self, done: usize) {
        (self.progress)(done)
    }

    fn should_cancel(&self) -> bool {
        (self.cancel)()
    }
}

/// Throttles `on_progress` calls to every `interval` units plus a final call.
pub(crate) struct Progress<'a> {
    observer: &'a mut dyn ScanObserver,
    interval: usize,
    last_reported: usize,
}

impl<'a> Progress<'a> {
    pub(crate) fn new(observer: &'a mut dyn ScanObserver, interval: usize) -> Self {
        Self { observer, interval: interval.max(1), last_reported: 0 }
    }

    pub(crate) fn tick(&mut self, done: usize) {
        if done - self.last_reported >= self.interval {
            self.last_reported = done;
            self.observer.on_progress(done);
        }
    }

    pub(crate) fn finish(&mut self, done: usize) {
        self.last_reported = done;
        self.observer.on_progress(done);
    }

    pub(crate) fn cancelled(&self) -> bool {
        self.observer.should_cancel()
    }
}
