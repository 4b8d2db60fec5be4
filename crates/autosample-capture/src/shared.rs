//! Atomics shared by the control handle, audio thread and render worker.

use autosample_core::{AtomicFlag, AtomicJobCursor, LevelMeter};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

/// Capture state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CaptureState {
    #[default]
    Inactive = 0,
    NewNote = 1,
    GatedRecord = 2,
    ReleaseRecord = 3,
    GateReleaseFade = 4,
    SpindownBuffer = 5,
}

impl CaptureState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => CaptureState::NewNote,
            2 => CaptureState::GatedRecord,
            3 => CaptureState::ReleaseRecord,
            4 => CaptureState::GateReleaseFade,
            5 => CaptureState::SpindownBuffer,
            _ => CaptureState::Inactive,
        }
    }

    pub fn is_active(self) -> bool {
        self != CaptureState::Inactive
    }
}

pub(crate) struct CaptureShared {
    pub stop: AtomicFlag,
    /// Held from a queued start until the run returns to idle.
    claimed: AtomicBool,
    state: AtomicU8,
    pub current_job: AtomicJobCursor,
    total_jobs: AtomicUsize,
    pub levels: LevelMeter,
}

impl CaptureShared {
    pub fn new() -> Self {
        Self {
            stop: AtomicFlag::new(false),
            claimed: AtomicBool::new(false),
            state: AtomicU8::new(CaptureState::Inactive as u8),
            current_job: AtomicJobCursor::new(),
            total_jobs: AtomicUsize::new(0),
            levels: LevelMeter::new(),
        }
    }

    #[inline]
    pub fn state(&self) -> CaptureState {
        CaptureState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set_state(&self, state: CaptureState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Take the single run slot. False while a run is queued or active.
    #[inline]
    pub fn try_claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    pub fn release_claim(&self) {
        self.claimed.store(false, Ordering::Release);
    }

    #[inline]
    pub fn total_jobs(&self) -> usize {
        self.total_jobs.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_total_jobs(&self, total: usize) {
        self.total_jobs.store(total, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trip() {
        let shared = CaptureShared::new();
        assert_eq!(shared.state(), CaptureState::Inactive);
        for state in [
            CaptureState::NewNote,
            CaptureState::GatedRecord,
            CaptureState::ReleaseRecord,
            CaptureState::GateReleaseFade,
            CaptureState::SpindownBuffer,
        ] {
            shared.set_state(state);
            assert_eq!(shared.state(), state);
            assert!(state.is_active());
        }
        assert_eq!(CaptureState::from_u8(200), CaptureState::Inactive);
    }

    #[test]
    fn test_run_slot_is_exclusive() {
        let shared = CaptureShared::new();
        assert!(shared.try_claim());
        assert!(!shared.try_claim());
        shared.release_claim();
        assert!(shared.try_claim());
    }
}
