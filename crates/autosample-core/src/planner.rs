//! Expands range/layer parameters into the ordered list of renders.
//!
//! Planning is pure: it never fails and never touches I/O. Out-of-range
//! configuration is clamped. The only non-determinism is the random
//! round-robin CVs, which come from the caller's RNG.

use crate::job::RenderJob;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Largest key step between planned notes.
pub const MAX_MIDI_STEP: u8 = 24;

/// Largest number of velocity layers.
pub const MAX_VELOCITY_LAYERS: u8 = 16;

/// Largest round-robin cycle.
pub const MAX_ROUND_ROBINS: u32 = 16;

/// Curve applied to the unit velocity range before scaling to MIDI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocityCurve {
    Linear,
    #[default]
    Sqrt,
    Square,
}

impl VelocityCurve {
    #[inline]
    pub fn apply(self, x: f64) -> f64 {
        match self {
            VelocityCurve::Linear => x,
            VelocityCurve::Sqrt => x.sqrt(),
            VelocityCurve::Square => x * x,
        }
    }
}

/// How an auxiliary round-robin CV is generated for each job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundRobinCv {
    /// Uniform random value in 0..10 V.
    ZeroToTen,
    /// Uniform random value in -5..5 V.
    PlusMinusFive,
    /// Linear ramp `10 * rr / (N - 1)`.
    Index,
}

impl RoundRobinCv {
    fn voltage<R: Rng + ?Sized>(self, rng: &mut R, index: u32, out_of: u32) -> f32 {
        match self {
            RoundRobinCv::Index => {
                if out_of <= 1 {
                    0.0
                } else {
                    10.0 * index as f32 / (out_of - 1) as f32
                }
            }
            RoundRobinCv::PlusMinusFive => rng.gen::<f32>() * 10.0 - 5.0,
            RoundRobinCv::ZeroToTen => rng.gen::<f32>() * 10.0,
        }
    }
}

/// Parameters the planner expands into jobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub midi_start: u8,
    pub midi_end: u8,
    pub midi_step: u8,
    pub velocity_layers: u8,
    pub round_robins: u32,
    pub velocity_curve: VelocityCurve,
    pub rr_cv: [RoundRobinCv; 2],
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            midi_start: 48,
            midi_end: 72,
            midi_step: 4,
            velocity_layers: 1,
            round_robins: 1,
            velocity_curve: VelocityCurve::Sqrt,
            rr_cv: [RoundRobinCv::ZeroToTen, RoundRobinCv::PlusMinusFive],
        }
    }
}

/// Inclusive key zone with its root note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyZone {
    pub root: u8,
    pub low: u8,
    pub high: u8,
}

/// Inclusive velocity zone with its representative velocity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VelocityZone {
    pub velocity: u8,
    pub low: u8,
    pub high: u8,
}

/// Stateless job planner.
pub struct JobPlanner;

impl JobPlanner {
    /// Plan with a caller supplied RNG for the random round-robin CVs.
    pub fn plan<R: Rng + ?Sized>(config: &PlannerConfig, rng: &mut R) -> Vec<RenderJob> {
        let keys = key_zones(config);
        let velocities = velocity_zones(config.velocity_layers, config.velocity_curve);
        let round_robins = config.round_robins.clamp(1, MAX_ROUND_ROBINS);

        let mut jobs = Vec::with_capacity(keys.len() * velocities.len() * round_robins as usize);

        for key in &keys {
            for vel in &velocities {
                for rr in 0..round_robins {
                    jobs.push(RenderJob {
                        midi_note: key.root,
                        note_from: key.low,
                        note_to: key.high,
                        velocity: vel.velocity,
                        vel_from: vel.low,
                        vel_to: vel.high,
                        round_robin_index: rr,
                        round_robin_out_of: round_robins,
                        control_voltage: [
                            config.rr_cv[0].voltage(rng, rr, round_robins),
                            config.rr_cv[1].voltage(rng, rr, round_robins),
                        ],
                    });
                }
            }
        }

        jobs
    }

    /// Plan with a seeded RNG so the random CVs are reproducible.
    pub fn plan_seeded(config: &PlannerConfig, seed: u64) -> Vec<RenderJob> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::plan(config, &mut rng)
    }

    /// Number of jobs a config expands to, without planning them.
    pub fn job_count(config: &PlannerConfig) -> usize {
        key_zones(config).len()
            * config.velocity_layers.clamp(1, MAX_VELOCITY_LAYERS) as usize
            * config.round_robins.clamp(1, MAX_ROUND_ROBINS) as usize
    }
}

/// Key zones for a config, distributed symmetrically over the range.
pub fn key_zones(config: &PlannerConfig) -> Vec<KeyZone> {
    let mut start = config.midi_start.min(127) as i32;
    let mut end = config.midi_end.min(127) as i32;
    if start > end {
        std::mem::swap(&mut start, &mut end);
    }

    let step = config.midi_step.clamp(1, MAX_MIDI_STEP) as i32;
    let half = if step <= 2 { 0 } else { step / 2 };

    let num_steps = (end - start + 1 + step - 1) / step;
    let cover_diff = num_steps * step - (end - start);

    (0..num_steps)
        .map(|i| {
            let centered = i * step + half + start - cover_diff / 2;
            let low = (centered - half).clamp(start, end);
            let high = (centered - half + step - 1).clamp(start, end);
            let root = ((low + high) / 2).clamp(start, end);

            KeyZone {
                root: root as u8,
                low: low as u8,
                high: high as u8,
            }
        })
        .collect()
}

/// Velocity zones tiling 1..=127 for the given layer count and curve.
pub fn velocity_zones(layers: u8, curve: VelocityCurve) -> Vec<VelocityZone> {
    let layers = layers.clamp(1, MAX_VELOCITY_LAYERS) as i32;
    let d = 1.0 / layers as f64;
    let scale = |x: f64| (curve.apply(x).clamp(0.0, 1.0) * 128.0).round() as i32;

    // Edges are zone starts; the last edge is one past 127. Each zone keeps
    // at least one value, so edges stay strictly increasing with room left
    // for the layers above.
    let mut edges = Vec::with_capacity(layers as usize + 1);
    edges.push(1);
    for k in 1..layers {
        let lower = edges[k as usize - 1] + 1;
        let upper = 128 - (layers - k);
        edges.push(scale(k as f64 * d).clamp(lower, upper));
    }
    edges.push(128);

    edges
        .windows(2)
        .enumerate()
        .map(|(k, edge)| {
            let low = edge[0];
            let high = edge[1] - 1;
            let velocity = scale((k as f64 + 0.5) * d).clamp(low, high);
            VelocityZone {
                velocity: velocity as u8,
                low: low as u8,
                high: high as u8,
            }
        })
        .collect()
}
