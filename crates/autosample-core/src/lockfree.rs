//! Lock-free primitives shared between the audio thread, the render worker and the UI.

use atomic_float::AtomicF32;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

/// `f32` published by one thread and polled by the others.
#[derive(Debug)]
pub struct AtomicFloat(AtomicF32);

impl AtomicFloat {
    pub fn new(value: f32) -> Self {
        Self(AtomicF32::new(value))
    }

    #[inline]
    pub fn get(&self) -> f32 {
        self.0.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: f32) {
        self.0.store(value, Ordering::Release);
    }

    /// Decay the held peak by `factor`, then raise it to `|input|` if louder.
    ///
    /// Single writer only.
    #[inline]
    pub fn hold_peak(&self, input: f32, factor: f32) -> f32 {
        let peak = (self.get() * factor).max(input.abs());
        self.set(peak);
        peak
    }
}

impl Default for AtomicFloat {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// One-shot request raised by a control thread and consumed by the audio thread.
#[derive(Debug, Default)]
#[repr(align(64))]
pub struct AtomicFlag(AtomicBool);

impl AtomicFlag {
    pub fn new(raised: bool) -> Self {
        Self(AtomicBool::new(raised))
    }

    #[inline]
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, raised: bool) {
        self.0.store(raised, Ordering::Release);
    }

    /// Read and lower in one step.
    #[inline]
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Index of the job being captured, or none while idle.
#[derive(Debug)]
pub struct AtomicJobCursor {
    value: AtomicI64,
}

impl AtomicJobCursor {
    pub fn new() -> Self {
        Self {
            value: AtomicI64::new(-1),
        }
    }

    #[inline]
    pub fn get(&self) -> Option<usize> {
        usize::try_from(self.value.load(Ordering::Acquire)).ok()
    }

    #[inline]
    pub fn set(&self, index: Option<usize>) {
        let raw = index.map_or(-1, |i| i as i64);
        self.value.store(raw, Ordering::Release);
    }
}

impl Default for AtomicJobCursor {
    fn default() -> Self {
        Self::new()
    }
}
