//! Planned render jobs and the control voltages derived from them.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Pitch CV range in volts (1 V/oct, note 60 = 0 V).
pub const PITCH_CV_LIMIT: f32 = 5.0;

/// Gate CV while a note is held.
pub const GATE_HIGH_VOLTS: f32 = 10.0;

/// Upper bound of the velocity CV.
pub const VELOCITY_CV_MAX: f32 = 10.0;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// One planned capture: a note, a velocity layer and a round-robin slot.
///
/// Jobs are produced by [`JobPlanner`](crate::JobPlanner) and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderJob {
    /// Note sent to the instrument (the zone's root key).
    pub midi_note: u8,
    /// Lowest key covered by this render (inclusive).
    pub note_from: u8,
    /// Highest key covered by this render (inclusive).
    pub note_to: u8,
    /// Velocity sent to the instrument, 1..=127.
    pub velocity: u8,
    /// Lowest velocity covered by this render (inclusive).
    pub vel_from: u8,
    /// Highest velocity covered by this render (inclusive).
    pub vel_to: u8,
    /// Position in the round-robin cycle, starting at 0.
    pub round_robin_index: u32,
    /// Length of the round-robin cycle.
    pub round_robin_out_of: u32,
    /// The two auxiliary round-robin CVs in volts.
    pub control_voltage: [f32; 2],
}

impl RenderJob {
    /// Pitch CV for this job, clamped to ±5 V.
    #[inline]
    pub fn pitch_cv(&self) -> f32 {
        pitch_cv(self.midi_note)
    }

    /// Velocity CV for this job, clamped to 0..10 V.
    #[inline]
    pub fn velocity_cv(&self) -> f32 {
        velocity_cv(self.velocity)
    }

    /// 1-based round-robin position as written to container files.
    pub fn sequence_position(&self) -> u32 {
        self.round_robin_index + 1
    }

    /// Whether this job belongs to a round-robin cycle longer than one.
    pub fn is_round_robin(&self) -> bool {
        self.round_robin_out_of > 1
    }

    /// WAV file name encoding note, velocity and round-robin slot.
    pub fn file_name(&self) -> String {
        format!(
            "sample_note_{}_vel_{}_rr_{}.wav",
            self.midi_note, self.velocity, self.round_robin_index
        )
    }
}

/// V/oct pitch CV for a MIDI note, centered on note 60.
#[inline]
pub fn pitch_cv(note: u8) -> f32 {
    (note as f32 / 12.0 - 5.0).clamp(-PITCH_CV_LIMIT, PITCH_CV_LIMIT)
}

/// Velocity CV for a MIDI velocity.
#[inline]
pub fn velocity_cv(velocity: u8) -> f32 {
    (velocity as f32 / 12.7).clamp(0.0, VELOCITY_CV_MAX)
}

/// Human readable note name, e.g. `"C4 (60)"`.
pub fn note_name(note: u8) -> String {
    let octave = note as i32 / 12 - 1;
    format!("{}{} ({})", NOTE_NAMES[note as usize % 12], octave, note)
}

/// Parse a note name such as `"C4"`, `"f#2"` or `"Bb3"` into a MIDI note.
///
/// Plain integers are accepted as raw note numbers.
pub fn parse_note_name(text: &str) -> Result<u8> {
    let text = text.trim();
    let invalid = || Error::InvalidNoteName(text.to_string());

    let mut chars = text.chars().peekable();
    let letter = chars.next().ok_or_else(invalid)?;

    let base = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => {
            let raw: i32 = text.parse().map_err(|_| invalid())?;
            return u8::try_from(raw)
                .ok()
                .filter(|n| *n <= 127)
                .ok_or_else(invalid);
        }
    };

    let mut accidental = 0;
    while let Some(&c) = chars.peek() {
        match c {
            '#' => accidental += 1,
            'b' => accidental -= 1,
            _ => break,
        }
        chars.next();
    }

    let octave: i32 = chars
        .collect::<String>()
        .parse()
        .ok()
        .filter(|octave| (-1..=9).contains(octave))
        .ok_or_else(invalid)?;
    let note = base + accidental + (octave + 1) * 12;

    u8::try_from(note)
        .ok()
        .filter(|n| *n <= 127)
        .ok_or_else(invalid)
}
