//! Cooperative scheduling (§4.4, §5 "Concurrency & Resource Model").
//!
//! The validator never blocks and never spawns a thread: a host calls
//! `start()` once, then periodically hands the engine a timeslice via
//! `cycle()`. Deferred resumption between slices is the host's job, modeled
//! here as the [`Scheduler`] trait so tests can use an immediate,
//! call-it-right-back implementation while a real host plugs in its own
//! event loop or timer wheel.

use std::time::Duration;

use crate::errors::EngineError;

/// What a host does to get called back later. `rngval-core` never calls
/// `schedule` itself from inside `cycle()` — the caller of `cycle()` decides
/// whether to schedule another one, based on its return value.
pub trait Scheduler {
    /// Arrange for `callback` to run after approximately `delay`. The
    /// reference implementations below run it synchronously; a real host
    /// would post it to its own event loop instead.
    fn schedule(&mut self, delay: Duration, callback: Box<dyn FnOnce()>);
}

/// A [`Scheduler`] that runs the callback immediately, inline. Useful for
/// tests and for hosts that drive `cycle()` from their own loop and don't
/// need the engine to ask for a specific delay.
#[derive(Debug, Default)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
    fn schedule(&mut self, _delay: Duration, callback: Box<dyn FnOnce()>) {
        callback();
    }
}

/// Whether the scheduler is accepting `cycle()` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
}

/// Cooperative run/stop/cycle bookkeeping, generic over nothing — it only
/// tracks state, not the work being scheduled. [`Cycler`] composes this with
/// the traversal loop in `validator.rs`.
#[derive(Debug)]
pub struct Cycler {
    state: RunState,
    in_cycle: bool,
    /// Set while a `reset_to`/`restart_at` is unwinding state so that the
    /// intermediate `state-update` events a resumed cycle would otherwise
    /// fire are suppressed until the reset completes (§4.5 step 6).
    resetting: bool,
}

impl Default for Cycler {
    fn default() -> Self {
        Self {
            state: RunState::Stopped,
            in_cycle: false,
            resetting: false,
        }
    }
}

impl Cycler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_state(&self) -> RunState {
        self.state
    }

    pub fn start(&mut self) {
        self.state = RunState::Running;
    }

    pub fn stop(&mut self) {
        self.state = RunState::Stopped;
    }

    pub fn is_resetting(&self) -> bool {
        self.resetting
    }

    pub fn begin_reset(&mut self) {
        self.resetting = true;
    }

    pub fn end_reset(&mut self) {
        self.resetting = false;
    }

    /// Rejects a reentrant `cycle()` call (a listener calling back into
    /// `cycle()` from inside dispatch, say) or one made while stopped.
    /// Pairs with [`Cycler::end_cycle`], which the caller must invoke once
    /// its timeslice of work is done — typically via a guard, but kept as
    /// two explicit calls here so `Validator::cycle` can run its loop with
    /// an ordinary `&mut self` instead of a capturing closure.
    pub fn try_begin_cycle(&mut self) -> Result<(), EngineError> {
        if self.in_cycle || self.state != RunState::Running {
            return Err(EngineError::Reentrant);
        }
        self.in_cycle = true;
        Ok(())
    }

    pub fn end_cycle(&mut self) {
        self.in_cycle = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_is_rejected_while_stopped() {
        let mut cycler = Cycler::new();
        let result = cycler.try_begin_cycle();
        assert!(matches!(result, Err(EngineError::Reentrant)));
    }

    #[test]
    fn cycle_runs_once_started() {
        let mut cycler = Cycler::new();
        cycler.start();
        assert!(cycler.try_begin_cycle().is_ok());
        cycler.end_cycle();
    }

    #[test]
    fn reentrant_cycle_is_rejected() {
        let mut cycler = Cycler::new();
        cycler.start();
        // Simulate a callback that tries to re-enter cycle() from within
        // the outer cycle's body.
        cycler.in_cycle = true;
        let result = cycler.try_begin_cycle();
        assert!(matches!(result, Err(EngineError::Reentrant)));
    }

    #[test]
    fn reset_flag_toggles() {
        let mut cycler = Cycler::new();
        assert!(!cycler.is_resetting());
        cycler.begin_reset();
        assert!(cycler.is_resetting());
        cycler.end_reset();
        assert!(!cycler.is_resetting());
    }
}
