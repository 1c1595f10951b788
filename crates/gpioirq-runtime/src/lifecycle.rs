//! LifecycleController - at most one dispatcher at a time
//!
//! ```text
//!            activate()               fault()
//!   Idle ────────────────▶ Active ───────────────▶ Faulted
//!    ▲                       │                       │
//!    └──────── retire() ─────┘                       │
//!    └──────────────────── clear_fault() ────────────┘
//! ```
//!
//! Every transition is a compare-and-swap on one state word, and the
//! engine performs them while holding the registry lock. "Registry is
//! empty, so stop" and "registry became non-empty, so start" therefore
//! cannot interleave: a registration racing a retiring dispatcher either
//! lands before the emptiness check (the dispatcher keeps running) or
//! after the retire (the registration starts a new one).

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};

/// Dispatcher run state
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No dispatcher running
    Idle = 0,
    /// Exactly one dispatcher running
    Active = 1,
    /// The last dispatcher died of a fatal error; nothing is restarted
    /// until `clear_fault()`
    Faulted = 2,
}

impl RunState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => RunState::Idle,
            1 => RunState::Active,
            _ => RunState::Faulted,
        }
    }
}

pub struct LifecycleController {
    state: AtomicU8,
    /// Dispatchers ever started; doubles as the next generation number
    started: AtomicU64,
    /// Dispatchers between activate() and retire()/fault()
    running: AtomicUsize,
    /// High-water mark of `running`
    peak_running: AtomicUsize,
}

impl LifecycleController {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(RunState::Idle as u8),
            started: AtomicU64::new(0),
            running: AtomicUsize::new(0),
            peak_running: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state() == RunState::Active
    }

    fn transition(&self, from: RunState, to: RunState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Idle → Active. Returns the new dispatcher's generation, or `None`
    /// if a dispatcher is already running or the controller is faulted.
    pub fn activate(&self) -> Option<u64> {
        if !self.transition(RunState::Idle, RunState::Active) {
            return None;
        }
        let now = self.running.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_running.fetch_max(now, Ordering::AcqRel);
        Some(self.started.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Undo `activate()` when the thread could not be spawned
    pub fn abort_activation(&self) {
        if self.transition(RunState::Active, RunState::Idle) {
            self.running.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Active → Idle, the dispatcher's last action on a clean exit
    pub fn retire(&self) -> bool {
        let ok = self.transition(RunState::Active, RunState::Idle);
        if ok {
            self.running.fetch_sub(1, Ordering::AcqRel);
        }
        ok
    }

    /// Active → Faulted, the dispatcher's last action on a fatal error
    pub fn fault(&self) -> bool {
        let ok = self.transition(RunState::Active, RunState::Faulted);
        if ok {
            self.running.fetch_sub(1, Ordering::AcqRel);
        }
        ok
    }

    /// Faulted → Idle
    pub fn clear_fault(&self) -> bool {
        self.transition(RunState::Faulted, RunState::Idle)
    }

    /// Dispatchers currently running (0 or 1)
    pub fn running(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    /// Most dispatchers ever running at once
    pub fn peak_running(&self) -> usize {
        self.peak_running.load(Ordering::Acquire)
    }

    /// Dispatchers started so far
    pub fn generations(&self) -> u64 {
        self.started.load(Ordering::Acquire)
    }
}

impl Default for LifecycleController {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("state", &self.state())
            .field("running", &self.running())
            .field("generations", &self.generations())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_idle_active_idle() {
        let lc = LifecycleController::new();
        assert_eq!(lc.state(), RunState::Idle);

        assert_eq!(lc.activate(), Some(1));
        assert_eq!(lc.state(), RunState::Active);
        assert_eq!(lc.running(), 1);

        // Already active: no second dispatcher
        assert_eq!(lc.activate(), None);
        assert_eq!(lc.running(), 1);

        assert!(lc.retire());
        assert_eq!(lc.state(), RunState::Idle);
        assert_eq!(lc.running(), 0);
        assert!(!lc.retire());

        assert_eq!(lc.activate(), Some(2));
        assert_eq!(lc.generations(), 2);
    }

    #[test]
    fn test_fault_blocks_restart() {
        let lc = LifecycleController::new();
        lc.activate().unwrap();
        assert!(lc.fault());
        assert_eq!(lc.state(), RunState::Faulted);
        assert_eq!(lc.running(), 0);

        assert_eq!(lc.activate(), None);
        assert!(lc.clear_fault());
        assert_eq!(lc.state(), RunState::Idle);
        assert!(lc.activate().is_some());
    }

    #[test]
    fn test_abort_activation() {
        let lc = LifecycleController::new();
        lc.activate().unwrap();
        lc.abort_activation();
        assert_eq!(lc.state(), RunState::Idle);
        assert_eq!(lc.running(), 0);
    }

    #[test]
    fn test_concurrent_activate_single_winner() {
        let lc = Arc::new(LifecycleController::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lc = lc.clone();
                thread::spawn(move || lc.activate().is_some())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(lc.running(), 1);
        assert_eq!(lc.peak_running(), 1);
        assert_eq!(lc.generations(), 1);
    }
}
