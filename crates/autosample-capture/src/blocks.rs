//! Preallocated arena of stereo audio blocks.
//!
//! The audio thread fills blocks in sequence and announces each one with a
//! `PushAudioBlock` command; the worker reads it back by index. Samples are
//! stored as relaxed atomics; the command ring's release/acquire handoff
//! orders them. A worker that falls a full ring behind reads overwritten
//! data.

use atomic_float::AtomicF32;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Fixed arena of `block_count` blocks of `block_frames` stereo frames.
pub struct BlockRing {
    samples: Box<[AtomicF32]>,
    block_frames: usize,
    block_count: usize,
}

impl BlockRing {
    pub fn new(block_count: usize, block_frames: usize) -> Self {
        let block_count = block_count.max(1);
        let block_frames = block_frames.max(1);
        let samples = (0..block_count * block_frames * 2)
            .map(|_| AtomicF32::new(0.0))
            .collect();
        Self {
            samples,
            block_frames,
            block_count,
        }
    }

    pub fn block_frames(&self) -> usize {
        self.block_frames
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }

    #[inline]
    fn offset(&self, block: usize, frame: usize) -> usize {
        ((block % self.block_count) * self.block_frames + frame.min(self.block_frames - 1)) * 2
    }

    #[inline]
    pub fn write(&self, block: usize, frame: usize, left: f32, right: f32) {
        let at = self.offset(block, frame);
        self.samples[at].store(left, Ordering::Relaxed);
        self.samples[at + 1].store(right, Ordering::Relaxed);
    }

    #[inline]
    pub fn read(&self, block: usize, frame: usize) -> (f32, f32) {
        let at = self.offset(block, frame);
        (
            self.samples[at].load(Ordering::Relaxed),
            self.samples[at + 1].load(Ordering::Relaxed),
        )
    }

    /// Append the first `frames` frames of a block to `out`.
    ///
    /// Stereo output is interleaved; mono output keeps the left channel.
    pub fn read_into(&self, block: usize, frames: usize, channels: u16, out: &mut Vec<f32>) {
        for frame in 0..frames.min(self.block_frames) {
            let (left, right) = self.read(block, frame);
            out.push(left);
            if channels >= 2 {
                out.push(right);
            }
        }
    }
}

/// Audio-thread cursor filling the ring block by block.
pub struct BlockWriter {
    ring: Arc<BlockRing>,
    block: usize,
    frame: usize,
}

impl BlockWriter {
    pub fn new(ring: Arc<BlockRing>) -> Self {
        Self {
            ring,
            block: 0,
            frame: 0,
        }
    }

    /// Store one frame. Returns `(block, frames)` when the block filled up.
    #[inline]
    pub fn push(&mut self, left: f32, right: f32) -> Option<(usize, usize)> {
        self.ring.write(self.block, self.frame, left, right);
        self.frame += 1;
        if self.frame == self.ring.block_frames() {
            self.take_block()
        } else {
            None
        }
    }

    /// Hand off a partially filled block, if any.
    #[inline]
    pub fn flush(&mut self) -> Option<(usize, usize)> {
        if self.frame > 0 {
            self.take_block()
        } else {
            None
        }
    }

    /// Forget the partial block without handing it off.
    #[inline]
    pub fn discard(&mut self) {
        self.frame = 0;
    }

    fn take_block(&mut self) -> Option<(usize, usize)> {
        let ready = (self.block, self.frame);
        self.block = (self.block + 1) % self.ring.block_count();
        self.frame = 0;
        Some(ready)
    }
}
