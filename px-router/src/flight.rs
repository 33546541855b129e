//! Single-flight guard for proposal attempts.
//!
//! One process runs at most one attempt at a time. A trigger that arrives
//! while the flag is up is rejected, never queued, so two attempts can't
//! interleave their replies.

use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct SingleFlight {
    flag: Arc<Mutex<bool>>,
}

/// Holds the flag up for the lifetime of one attempt. Dropping the guard
/// lowers the flag on every exit path, cancellation included.
pub struct FlightGuard {
    flag: Arc<Mutex<bool>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag, or refuse because an attempt is already in flight.
    pub fn begin(&self) -> Option<FlightGuard> {
        let mut up = self.flag.lock().unwrap();
        if *up {
            None
        } else {
            *up = true;
            Some(FlightGuard {
                flag: self.flag.clone(),
            })
        }
    }

    pub fn is_up(&self) -> bool {
        *self.flag.lock().unwrap()
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        *self.flag.lock().unwrap() = false;
    }
}
