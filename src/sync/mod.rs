use std::fmt;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;

use parking_lot::{Condvar, Mutex, MutexGuard};

/// How a blocked side of a [`Monitor`] waits for its predicate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum WaitMode {
    /// Sleep on the condition variable until notified.
    #[default]
    Block,
    /// Release the lock and `yield_now` between predicate checks.
    ///
    /// No notification is needed, at the price of a core busy for as long as
    /// the peer keeps it waiting.
    Spin,
}

impl FromStr for WaitMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "block" | "condvar" => Ok(Self::Block),
            "spin" | "yield" => Ok(Self::Spin),
            _ => Err(crate::Error::InvalidWaitMode(s.to_owned())),
        }
    }
}

impl fmt::Display for WaitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Block => "block",
            Self::Spin => "spin",
        })
    }
}

/// A state `S` guarded by one mutex and paired with a condition variable.
///
/// Every read and write of `S` goes through a [`MonitorGuard`].
#[derive(Debug)]
pub struct Monitor<S> {
    locked: Mutex<Locked<S>>,
    cond: Condvar,
    mode: WaitMode,
}

#[derive(Debug)]
struct Locked<S> {
    state: S,
    n_waiters: usize,
}

impl<S> Monitor<S> {
    pub fn new(state: S, mode: WaitMode) -> Self {
        Self {
            locked: Mutex::new(Locked {
                state,
                n_waiters: 0,
            }),
            cond: Condvar::new(),
            mode,
        }
    }

    #[inline(always)]
    pub fn mode(&self) -> WaitMode {
        self.mode
    }

    pub fn lock(&self) -> MonitorGuard<'_, S> {
        MonitorGuard {
            monitor: self,
            guard: self.locked.lock(),
        }
    }
}

pub struct MonitorGuard<'m, S> {
    monitor: &'m Monitor<S>,
    guard: MutexGuard<'m, Locked<S>>,
}

impl<S> MonitorGuard<'_, S> {
    /// Blocks until `ready` holds for the guarded state.
    ///
    /// The predicate is re-checked after every wakeup, spurious or not.
    pub fn wait_until<P: FnMut(&S) -> bool>(&mut self, mut ready: P) {
        while !ready(&self.guard.state) {
            match self.monitor.mode {
                WaitMode::Block => {
                    self.guard.n_waiters += 1;
                    self.monitor.cond.wait(&mut self.guard);
                    self.guard.n_waiters -= 1;
                }
                WaitMode::Spin => MutexGuard::unlocked(&mut self.guard, std::thread::yield_now),
            }
        }
    }

    /// Wakes every waiter, if any is sleeping on the condition variable.
    pub fn notify(&self) {
        if self.guard.n_waiters > 0 {
            self.monitor.cond.notify_all();
        }
    }
}

impl<S> Deref for MonitorGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.guard.state
    }
}

impl<S> DerefMut for MonitorGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.guard.state
    }
}
