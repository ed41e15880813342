//! Fixtures shared by unit tests.

use std::collections::BTreeMap;

use crate::audio::{AudioBuffer, Sample};
use crate::config::{NoteParameters, RenderConfig};
use crate::partial::{Breakpoint, Partial, PartialSet};
use crate::render::NoteInputs;
use crate::tracking::{AnalysisParams, HarmonicTracker, PartialEngine};

pub const RATE: u32 = 8000;

/// Ignores its input and returns decaying partials at `k * fundamental *
/// 1.001` for each harmonic `k`, running from `onset` to one second.
/// Everything else runs the reference tracker.
pub struct ScriptedEngine {
    pub harmonics: Vec<u32>,
    pub fundamental: f64,
    pub onset: f64,
}

impl ScriptedEngine {
    /// Harmonics of A4 starting at time zero.
    pub fn new(harmonics: Vec<u32>) -> Self {
        Self {
            harmonics,
            fundamental: 440.0,
            onset: 0.0,
        }
    }
}

impl PartialEngine for ScriptedEngine {
    fn analyze(&self, _: &[Sample], _: u32, _: &AnalysisParams) -> PartialSet {
        self.harmonics
            .iter()
            .map(|&k| {
                let k_f = f64::from(k);
                let breakpoints = (0..=10)
                    .map(|step| {
                        let t = self.onset + f64::from(step) * (1.0 - self.onset) / 10.0;
                        let amplitude = 0.4 / k_f * (1.0 - 0.6 * t);
                        Breakpoint::new(t, k_f * self.fundamental * 1.001, amplitude)
                    })
                    .collect();
                Partial::from_breakpoints(0, breakpoints)
            })
            .collect()
    }

    fn synthesize(&self, partials: &[Partial], sample_rate: u32) -> Vec<Sample> {
        HarmonicTracker::default().synthesize(partials, sample_rate)
    }

    fn channelize(&self, partials: &mut PartialSet, fundamental: f64, stretch: f64) {
        HarmonicTracker::default().channelize(partials, fundamental, stretch);
    }

    fn distill(&self, partials: &mut PartialSet) {
        HarmonicTracker::default().distill(partials);
    }

    fn crop(&self, partials: &mut PartialSet, start: f64, end: f64) {
        HarmonicTracker::default().crop(partials, start, end);
    }
}

/// One-second A4 (and A#4) at 8 kHz with a 1.5 second output.
pub fn short_config(loop_length: usize, crossover: u32) -> RenderConfig {
    let params = NoteParameters {
        duration: 1.0,
        crossover,
        fade_start: 0.2,
        loop_length,
    };
    let notes: BTreeMap<u8, NoteParameters> = [(69, params), (70, params)].into_iter().collect();
    RenderConfig {
        sample_rate: RATE,
        output_duration: 1.5,
        notes,
        ..RenderConfig::default()
    }
}

pub fn quiet_inputs() -> NoteInputs {
    inputs_with_noise(0.001)
}

/// Silent tonal recording and a constant noise layer of `level`.
pub fn inputs_with_noise(level: Sample) -> NoteInputs {
    NoteInputs {
        tonal: AudioBuffer::new(vec![0.0; RATE as usize * 2], 2, RATE),
        noise: AudioBuffer::new(vec![level; RATE as usize], 2, RATE),
    }
}
