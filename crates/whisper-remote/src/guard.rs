//! Per-resource admission for mutating requests.
//!
//! A slider drag and a button press can land in the same tick; only the
//! first one gets through.  Rejected actions are dropped, not queued: the
//! next user input or the next poll brings the display back in line.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    Volume,
    Program,
    Station,
    Playback,
}

impl ResourceClass {
    pub const ALL: [ResourceClass; 4] = [
        ResourceClass::Volume,
        ResourceClass::Program,
        ResourceClass::Station,
        ResourceClass::Playback,
    ];

    fn slot(self) -> usize {
        match self {
            ResourceClass::Volume => 0,
            ResourceClass::Program => 1,
            ResourceClass::Station => 2,
            ResourceClass::Playback => 3,
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceClass::Volume => "volume",
            ResourceClass::Program => "program",
            ResourceClass::Station => "station",
            ResourceClass::Playback => "playback",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Default)]
pub struct MutationGuard {
    locks: [AtomicBool; 4],
}

impl MutationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `class` if it is free.  Never waits.
    pub fn try_acquire(&self, class: ResourceClass) -> bool {
        self.locks[class.slot()]
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Clear the lock for `class`, held or not.
    pub fn release(&self, class: ResourceClass) {
        self.locks[class.slot()].store(false, Ordering::Release);
    }

    pub fn is_held(&self, class: ResourceClass) -> bool {
        self.locks[class.slot()].load(Ordering::Acquire)
    }

    /// Like `try_acquire`, but the returned permit releases on drop, so
    /// early returns and `?` can't leak the lock.
    pub fn acquire(self: &Arc<Self>, class: ResourceClass) -> Option<MutationPermit> {
        if self.try_acquire(class) {
            Some(MutationPermit {
                guard: Arc::clone(self),
                class,
            })
        } else {
            None
        }
    }
}

/// Held while one mutating request for `class` is in flight.
#[derive(Debug)]
pub struct MutationPermit {
    guard: Arc<MutationGuard>,
    class: ResourceClass,
}

impl MutationPermit {
    pub fn class(&self) -> ResourceClass {
        self.class
    }
}

impl Drop for MutationPermit {
    fn drop(&mut self) {
        self.guard.release(self.class);
    }
}
