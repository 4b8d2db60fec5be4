//! Commands from the audio thread to the render worker.
//!
//! The ring is single-producer single-consumer and never blocks the
//! producer: a full ring drops the new command and counts it.

use crate::session::CaptureSession;
use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Work items for the render worker, handled in arrival order.
///
/// Jobs are indices into the session's job list.
#[derive(Debug)]
pub enum Command {
    StartRender(Arc<CaptureSession>),
    EndRender,
    BeginNote {
        job: usize,
        sample_rate: u32,
        channels: u16,
    },
    CloseFile {
        job: usize,
        /// Frames captured while the gate was held.
        sustain_frames: u64,
    },
    /// A block in the block ring is ready; `frames` may be less than a
    /// full block when recording ended mid-block.
    PushAudioBlock {
        block: usize,
        frames: usize,
    },
    PushSingleSample {
        left: f32,
        right: f32,
    },
    /// Close any open file without a manifest entry and leave the manifest
    /// unfinalized.
    Abort,
    /// Drop a superseded session off the audio thread.
    Retire(Arc<CaptureSession>),
}

/// Producer side, owned by the audio thread.
pub struct CommandSender {
    prod: HeapProd<Command>,
    dropped: Arc<AtomicU64>,
}

impl CommandSender {
    /// Enqueue a command; on overflow the command is dropped and counted.
    #[inline]
    pub fn send(&mut self, command: Command) -> bool {
        match self.prod.try_push(command) {
            Ok(()) => true,
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Enqueue a command, handing it back if the ring is full.
    #[inline]
    pub fn try_send(&mut self, command: Command) -> Result<(), Command> {
        self.prod.try_push(command)
    }

    pub fn vacant(&self) -> usize {
        self.prod.vacant_len()
    }
}

/// Consumer side, owned by the render worker.
pub struct CommandReceiver {
    cons: HeapCons<Command>,
    dropped: Arc<AtomicU64>,
}

impl CommandReceiver {
    #[inline]
    pub fn try_recv(&mut self) -> Option<Command> {
        self.cons.try_pop()
    }

    pub fn len(&self) -> usize {
        self.cons.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.cons.is_empty()
    }

    /// Commands dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn dropped_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }
}

/// Create a command ring holding up to `capacity` commands.
pub fn command_channel(capacity: usize) -> (CommandSender, CommandReceiver) {
    let (prod, cons) = HeapRb::<Command>::new(capacity.max(1)).split();
    let dropped = Arc::new(AtomicU64::new(0));
    (
        CommandSender {
            prod,
            dropped: Arc::clone(&dropped),
        },
        CommandReceiver { cons, dropped },
    )
}
