use sqlock_common::prelude::*;

/// Interrupt flag a waiting lock observes between attempts.
///
/// Clones share the flag, so a handle can be given to another thread that wants to abort a wait.
#[derive(Clone, Default)]
pub struct InterruptSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl InterruptSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag and wakes every pause in progress.
    pub fn interrupt(&self) {
        let (flag, wakeup) = &*self.inner;
        *flag.lock() = true;
        wakeup.notify_all();
    }

    pub fn is_interrupted(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Returns whether the flag was raised and lowers it.
    pub fn take(&self) -> bool {
        std::mem::replace(&mut *self.inner.0.lock(), false)
    }

    pub fn clear(&self) {
        *self.inner.0.lock() = false;
    }

    /// Sleeps for `duration`, returning early when interrupted. Returns the flag.
    pub fn sleep(&self, duration: Duration) -> bool {
        let (flag, wakeup) = &*self.inner;
        let mut interrupted = flag.lock();
        let deadline = match Instant::now().checked_add(duration) {
            Some(deadline) => deadline,
            None => {
                while !*interrupted {
                    wakeup.wait(&mut interrupted);
                }
                return true;
            }
        };
        while !*interrupted {
            if wakeup.wait_until(&mut interrupted, deadline).timed_out() {
                break;
            }
        }
        *interrupted
    }
}

impl std::fmt::Debug for InterruptSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptSignal")
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}
