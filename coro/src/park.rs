use std::sync::Arc;
use std::task::{Wake, Waker};
use std::thread::{Thread, ThreadId};

/// Wakes the thread that is driving a routine.
///
/// A routine awaiting something other than its own produce point returns
/// `Pending` with nothing produced; the driver then parks until this waker
/// fires.
#[derive(Debug, Clone)]
pub(crate) struct ThreadPark {
    thread: Thread,
}

impl ThreadPark {
    pub(crate) fn current() -> Self {
        Self {
            thread: std::thread::current(),
        }
    }

    #[inline(always)]
    pub(crate) fn park(&self) {
        debug_assert_eq!(self.thread.id(), std::thread::current().id());
        std::thread::park();
    }
}

impl Wake for ThreadPark {
    fn wake(self: Arc<Self>) {
        self.thread.unpark();
    }
    fn wake_by_ref(self: &Arc<Self>) {
        self.thread.unpark();
    }
}

/// Waker cache keyed on the driving thread.
///
/// A generator is `Send`, so consecutive steps may come from different
/// threads; the waker is rebuilt whenever the driver changes.
#[derive(Debug, Default)]
pub(crate) struct DriverWaker {
    cached: Option<(ThreadId, Arc<ThreadPark>, Waker)>,
}

impl DriverWaker {
    pub(crate) fn get(&mut self) -> (Arc<ThreadPark>, Waker) {
        let id = std::thread::current().id();
        match &self.cached {
            Some((owner, park, waker)) if *owner == id => (park.clone(), waker.clone()),
            _ => {
                let park = Arc::new(ThreadPark::current());
                let waker = Waker::from(park.clone());
                self.cached = Some((id, park.clone(), waker.clone()));
                (park, waker)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_waker_unparks_driver() {
        let mut cache = DriverWaker::default();
        let (park, waker) = cache.get();
        let (_, again) = cache.get();
        assert!(waker.will_wake(&again));

        let remote = std::thread::spawn(move || waker.wake());
        // Either the unpark happens first and park returns immediately, or
        // park blocks until it arrives.
        park.park();
        remote.join().unwrap();
    }

    #[test]
    fn test_cache_follows_thread() {
        let mut cache = DriverWaker::default();
        let (_, here) = cache.get();
        let (cache, there) = std::thread::spawn(move || {
            let (_, there) = cache.get();
            (cache, there)
        })
        .join()
        .unwrap();
        assert!(!here.will_wake(&there));
        drop(cache);
    }
}
