//! Silence detection and level metering.

use crate::lockfree::AtomicFloat;

/// Default silence window in frames.
pub const SILENCE_WINDOW: usize = 4096;

/// A frame counts as silent when `|L| + |R|` is below this.
pub const SILENCE_THRESHOLD: f32 = 1e-6;

/// Per-frame decay of the level meter's peak hold.
pub const LEVEL_DECAY: f32 = 0.9995;

/// Sliding-window silence detector.
///
/// Accumulates `|L| + |R|` per frame into a preallocated window. Every time the
/// window fills it is scanned in full, and the note counts as silent only if
/// every frame of the window is below the threshold.
pub struct SilenceDetector {
    window: Box<[f32]>,
    position: usize,
    threshold: f32,
}

impl SilenceDetector {
    pub fn new(window: usize, threshold: f32) -> Self {
        Self {
            window: vec![0.0; window.max(1)].into_boxed_slice(),
            position: 0,
            threshold,
        }
    }

    /// Clear the window. RT-safe.
    pub fn reset(&mut self) {
        self.window.fill(0.0);
        self.position = 0;
    }

    /// Feed one frame. Returns `Some(silent)` when the window has just filled.
    #[inline]
    pub fn push(&mut self, left: f32, right: f32) -> Option<bool> {
        self.window[self.position] = left.abs() + right.abs();
        self.position += 1;

        if self.position < self.window.len() {
            return None;
        }

        self.position = 0;
        Some(self.window.iter().all(|&energy| energy < self.threshold))
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }
}

impl Default for SilenceDetector {
    fn default() -> Self {
        Self::new(SILENCE_WINDOW, SILENCE_THRESHOLD)
    }
}

/// Decaying peak-hold meter for the UI, one value per channel.
///
/// Written by the render worker, cleared by the audio thread, read by the UI.
#[derive(Debug, Default)]
pub struct LevelMeter {
    left: AtomicFloat,
    right: AtomicFloat,
}

impl LevelMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        self.left.set(0.0);
        self.right.set(0.0);
    }

    /// Decay the held peaks by one frame and rise instantly to a louder input.
    #[inline]
    pub fn update(&self, left: f32, right: f32) {
        self.left.hold_peak(left, LEVEL_DECAY);
        self.right.hold_peak(right, LEVEL_DECAY);
    }

    /// Feed interleaved samples. Mono input lets the right channel decay.
    pub fn update_interleaved(&self, samples: &[f32], channels: u16) {
        let mut left = self.left.get();
        let mut right = self.right.get();
        for frame in samples.chunks_exact(usize::from(channels.max(1))) {
            let r = frame.get(1).copied().unwrap_or(0.0);
            left = (left * LEVEL_DECAY).max(frame[0].abs());
            right = (right * LEVEL_DECAY).max(r.abs());
        }
        self.left.set(left);
        self.right.set(right);
    }

    /// Current `(left, right)` levels.
    pub fn levels(&self) -> (f32, f32) {
        (self.left.get(), self.right.get())
    }
}
