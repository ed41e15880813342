//! # Partial Tracking
//!
//! The renderer only needs five primitives from a sinusoidal analysis and
//! resynthesis engine. They are gathered in [`PartialEngine`] so a different
//! engine can be plugged in; [`HarmonicTracker`] is the built-in one.

mod analysis;
mod channelizer;
mod distiller;
mod synthesis;

pub use analysis::{AnalysisParams, analyze};
pub use channelizer::channelize;
pub use distiller::distill;
pub use synthesis::synthesize;

use crate::audio::Sample;
use crate::partial::{Partial, PartialSet};

/// Sinusoidal analysis and resynthesis primitives used by the renderer.
pub trait PartialEngine {
    /// Extracts partials from a mono signal. Returned partials are unlabeled.
    fn analyze(&self, samples: &[Sample], sample_rate: u32, params: &AnalysisParams)
    -> PartialSet;

    /// Renders partials to a mono signal.
    fn synthesize(&self, partials: &[Partial], sample_rate: u32) -> Vec<Sample>;

    /// Labels each partial with its harmonic number.
    fn channelize(&self, partials: &mut PartialSet, fundamental: f64, stretch: f64);

    /// Leaves at most one partial per label.
    fn distill(&self, partials: &mut PartialSet);

    /// Restricts every partial to `[start, end]`, dropping empty ones.
    fn crop(&self, partials: &mut PartialSet, start: f64, end: f64);
}

/// Short-time Fourier peak tracker with an additive oscillator bank.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmonicTracker {
    /// Length in seconds of the ramps added at each end of a synthesized
    /// partial.
    pub fade_time: f64,
}

impl Default for HarmonicTracker {
    fn default() -> Self {
        Self { fade_time: 0.001 }
    }
}

impl PartialEngine for HarmonicTracker {
    fn analyze(
        &self,
        samples: &[Sample],
        sample_rate: u32,
        params: &AnalysisParams,
    ) -> PartialSet {
        analyze(samples, sample_rate, params)
    }

    fn synthesize(&self, partials: &[Partial], sample_rate: u32) -> Vec<Sample> {
        synthesize(partials, sample_rate, self.fade_time)
    }

    fn channelize(&self, partials: &mut PartialSet, fundamental: f64, stretch: f64) {
        channelize(partials, fundamental, stretch);
    }

    fn distill(&self, partials: &mut PartialSet) {
        distill(partials);
    }

    fn crop(&self, partials: &mut PartialSet, start: f64, end: f64) {
        crop(partials, start, end);
    }
}

/// Crops every partial to `[start, end]` and removes the ones left empty.
pub fn crop(partials: &mut PartialSet, start: f64, end: f64) {
    for p in partials.iter_mut() {
        p.crop(start, end);
    }
    partials.retain(|p| !p.is_empty());
}
