//! Lock-free message log and status lines polled by the UI.
//!
//! Each producing thread owns its own SPSC ring, so the audio thread never
//! contends with the render worker. Entries the poller has not drained when a
//! ring is full are kept and the new entry is counted as dropped.

use crate::job::note_name;
use ringbuf::{
    traits::{Consumer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Default capacity of a message ring.
pub const MESSAGE_CAPACITY: usize = 1024;

/// Default capacity of a status history ring.
pub const STATUS_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Message payload.
///
/// Every variant except `Text` is allocation free, so the audio thread can
/// log without touching the heap. `Text` is reserved for the render worker.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    RenderStarting { test_mode: bool },
    JobsGenerated { count: usize },
    NothingToRestart,
    Stopping,
    Text(String),
}

impl fmt::Display for MessageBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageBody::RenderStarting { test_mode } => write!(
                f,
                "Starting render in {}",
                if *test_mode { "Test Mode" } else { "Record Mode" }
            ),
            MessageBody::JobsGenerated { count } => {
                write!(f, "Generated render jobs: {count} renders")
            }
            MessageBody::NothingToRestart => write!(f, "Go trigger ignored: no session to restart"),
            MessageBody::Stopping => write!(f, "Stopping operation"),
            MessageBody::Text(text) => f.write_str(text),
        }
    }
}

/// One timestamped log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub severity: Severity,
    pub body: MessageBody,
}

impl Message {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Info => write!(f, "{}", self.body),
            Severity::Warning => write!(f, "warning: {}", self.body),
            Severity::Error => write!(f, "error: {}", self.body),
        }
    }
}

#[inline]
fn unix_time() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Write side of one message ring.
pub struct MessageProducer {
    prod: HeapProd<Message>,
    dropped: Arc<AtomicU64>,
}

impl MessageProducer {
    pub fn push(&mut self, severity: Severity, body: MessageBody) {
        let message = Message {
            timestamp: unix_time(),
            severity,
            body,
        };
        if self.prod.try_push(message).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn info(&mut self, body: MessageBody) {
        self.push(Severity::Info, body);
    }

    #[inline]
    pub fn warn(&mut self, body: MessageBody) {
        self.push(Severity::Warning, body);
    }

    #[inline]
    pub fn error(&mut self, body: MessageBody) {
        self.push(Severity::Error, body);
    }

    /// Convenience for free-text info messages.
    pub fn text(&mut self, text: impl Into<String>) {
        self.info(MessageBody::Text(text.into()));
    }

    /// Convenience for free-text error messages.
    pub fn error_text(&mut self, text: impl Into<String>) {
        self.error(MessageBody::Text(text.into()));
    }
}

/// Read side of all message rings.
pub struct MessageLog {
    consumers: Vec<HeapCons<Message>>,
    dropped: Arc<AtomicU64>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self {
            consumers: Vec::new(),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a new ring for one producing thread.
    pub fn producer(&mut self, capacity: usize) -> MessageProducer {
        let (prod, cons) = HeapRb::<Message>::new(capacity.max(1)).split();
        self.consumers.push(cons);
        MessageProducer {
            prod,
            dropped: Arc::clone(&self.dropped),
        }
    }

    /// Take every pending message, oldest first.
    pub fn drain(&mut self) -> Vec<Message> {
        let mut messages: Vec<Message> = Vec::new();
        for cons in &mut self.consumers {
            messages.extend(cons.pop_iter());
        }
        messages.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        messages
    }

    /// Messages lost because a ring was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

/// The two status lines shown at a glance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSlot {
    /// Idle / Test / Record.
    Mode = 0,
    /// Job progress.
    Progress = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusLine {
    #[default]
    Idle,
    Blank,
    Testing,
    Recording,
    Starting,
    Progress {
        index: usize,
        total: usize,
        note: u8,
    },
}

impl StatusLine {
    const INDEX_BITS: u32 = 24;
    const INDEX_MASK: u64 = (1 << Self::INDEX_BITS) - 1;

    // tag:8 | note:8 | index:24 | total:24
    fn pack(self) -> u64 {
        match self {
            StatusLine::Idle => 0,
            StatusLine::Blank => 1,
            StatusLine::Testing => 2,
            StatusLine::Recording => 3,
            StatusLine::Starting => 4,
            StatusLine::Progress { index, total, note } => {
                5 | ((note as u64) << 8)
                    | ((index as u64 & Self::INDEX_MASK) << 16)
                    | ((total as u64 & Self::INDEX_MASK) << 40)
            }
        }
    }

    fn unpack(raw: u64) -> Self {
        match raw & 0xff {
            1 => StatusLine::Blank,
            2 => StatusLine::Testing,
            3 => StatusLine::Recording,
            4 => StatusLine::Starting,
            5 => StatusLine::Progress {
                note: ((raw >> 8) & 0xff) as u8,
                index: ((raw >> 16) & Self::INDEX_MASK) as usize,
                total: ((raw >> 40) & Self::INDEX_MASK) as usize,
            },
            _ => StatusLine::Idle,
        }
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLine::Idle => f.write_str("Idle"),
            StatusLine::Blank => f.write_str("-"),
            StatusLine::Testing => f.write_str("Test"),
            StatusLine::Recording => f.write_str("Record"),
            StatusLine::Starting => f.write_str("Start"),
            StatusLine::Progress { index, total, note } => {
                write!(f, "{}/{} {}", index, total, note_name(*note))
            }
        }
    }
}

struct StatusShared {
    latest: [AtomicU64; 2],
    dropped: AtomicU64,
}

/// Audio-thread side of the status lines.
pub struct StatusWriter {
    shared: Arc<StatusShared>,
    history: [HeapProd<StatusLine>; 2],
}

impl StatusWriter {
    #[inline]
    pub fn publish(&mut self, slot: StatusSlot, line: StatusLine) {
        self.shared.latest[slot as usize].store(line.pack(), Ordering::Release);
        if self.history[slot as usize].try_push(line).is_err() {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn publish_idle(&mut self) {
        self.publish(StatusSlot::Mode, StatusLine::Idle);
        self.publish(StatusSlot::Progress, StatusLine::Blank);
    }
}

/// UI side of the status lines.
pub struct StatusReader {
    shared: Arc<StatusShared>,
    history: [HeapCons<StatusLine>; 2],
}

impl StatusReader {
    /// Most recent line in a slot, regardless of history overflow.
    pub fn latest(&self, slot: StatusSlot) -> StatusLine {
        StatusLine::unpack(self.shared.latest[slot as usize].load(Ordering::Acquire))
    }

    /// Lines published to a slot since the last call, oldest first.
    pub fn history(&mut self, slot: StatusSlot) -> Vec<StatusLine> {
        self.history[slot as usize].pop_iter().collect()
    }

    /// History lines lost to a full ring; `latest` is unaffected.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

/// Create a connected status writer/reader pair.
pub fn status_channel(capacity: usize) -> (StatusWriter, StatusReader) {
    let (mode_prod, mode_cons) = HeapRb::<StatusLine>::new(capacity.max(1)).split();
    let (progress_prod, progress_cons) = HeapRb::<StatusLine>::new(capacity.max(1)).split();

    let shared = Arc::new(StatusShared {
        latest: [
            AtomicU64::new(StatusLine::Idle.pack()),
            AtomicU64::new(StatusLine::Blank.pack()),
        ],
        dropped: AtomicU64::new(0),
    });

    (
        StatusWriter {
            shared: Arc::clone(&shared),
            history: [mode_prod, progress_prod],
        },
        StatusReader {
            shared,
            history: [mode_cons, progress_cons],
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_drain_in_order() {
        let mut log = MessageLog::new();
        let mut rt = log.producer(8);
        let mut worker = log.producer(8);

        rt.info(MessageBody::RenderStarting { test_mode: true });
        worker.text("Starting note C4 (60)");
        rt.info(MessageBody::JobsGenerated { count: 7 });

        let lines: Vec<String> = log.drain().iter().map(|m| m.to_string()).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Starting render in Test Mode");
        assert!(lines.contains(&"Generated render jobs: 7 renders".to_string()));
        assert!(log.drain().is_empty());
    }

    #[test]
    fn test_full_ring_counts_drops() {
        let mut log = MessageLog::new();
        let mut producer = log.producer(2);
        producer.info(MessageBody::Stopping);
        producer.info(MessageBody::Stopping);
        producer.error_text("lost");

        assert_eq!(log.dropped(), 1);
        let drained = log.drain();
        assert_eq!(drained.len(), 2);
        assert!(drained.iter().all(|m| !m.is_error()));
    }

    #[test]
    fn test_error_display() {
        let mut log = MessageLog::new();
        let mut producer = log.producer(4);
        producer.error_text("Failed to open output MultiFile");
        let drained = log.drain();
        assert!(drained[0].is_error());
        assert_eq!(drained[0].to_string(), "error: Failed to open output MultiFile");
    }

    #[test]
    fn test_status_line_display() {
        assert_eq!(StatusLine::Idle.to_string(), "Idle");
        assert_eq!(StatusLine::Blank.to_string(), "-");
        let progress = StatusLine::Progress {
            index: 3,
            total: 7,
            note: 60,
        };
        assert_eq!(progress.to_string(), "3/7 C4 (60)");
    }

    #[test]
    fn test_status_pack_round_trip() {
        let lines = [
            StatusLine::Idle,
            StatusLine::Blank,
            StatusLine::Testing,
            StatusLine::Recording,
            StatusLine::Starting,
            StatusLine::Progress {
                index: 1234,
                total: 99999,
                note: 127,
            },
        ];
        for line in lines {
            assert_eq!(StatusLine::unpack(line.pack()), line);
        }
    }

    #[test]
    fn test_status_latest_survives_history_overflow() {
        let (mut writer, mut reader) = status_channel(2);
        assert_eq!(reader.latest(StatusSlot::Mode), StatusLine::Idle);
        assert_eq!(reader.latest(StatusSlot::Progress), StatusLine::Blank);

        for index in 0..5 {
            writer.publish(
                StatusSlot::Progress,
                StatusLine::Progress {
                    index,
                    total: 5,
                    note: 60,
                },
            );
        }
        writer.publish(StatusSlot::Mode, StatusLine::Recording);

        assert_eq!(reader.history(StatusSlot::Progress).len(), 2);
        assert_eq!(reader.dropped(), 3);
        assert_eq!(
            reader.latest(StatusSlot::Progress),
            StatusLine::Progress {
                index: 4,
                total: 5,
                note: 60
            }
        );
        assert_eq!(reader.history(StatusSlot::Mode), vec![StatusLine::Recording]);

        writer.publish_idle();
        assert_eq!(reader.latest(StatusSlot::Mode), StatusLine::Idle);
        assert_eq!(reader.dropped(), 3);
    }
}
