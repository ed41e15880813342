//! Harmonic labeling of analyzed partials.

use crate::inharmonicity::harmonic_number;
use crate::partial::PartialSet;

/// Labels each partial with the harmonic of `fundamental` it follows.
///
/// The label is the amplitude-weighted mean harmonic number of the
/// partial's breakpoints, rounded to the nearest integer, with overtones
/// located on the stretched series for `stretch`. Partials below half the
/// fundamental get label 0.
pub fn channelize(partials: &mut PartialSet, fundamental: f64, stretch: f64) {
    for partial in partials.iter_mut() {
        let bps = partial.breakpoints();
        if bps.is_empty() {
            partial.set_label(0);
            continue;
        }
        let weight: f64 = bps.iter().map(|bp| bp.amplitude).sum();
        let number = if weight > 0.0 {
            bps.iter()
                .map(|bp| harmonic_number(bp.frequency, fundamental, stretch) * bp.amplitude)
                .sum::<f64>()
                / weight
        } else {
            bps.iter()
                .map(|bp| harmonic_number(bp.frequency, fundamental, stretch))
                .sum::<f64>()
                / bps.len() as f64
        };
        let label = number.round();
        partial.set_label(if label >= 1.0 { label as u32 } else { 0 });
    }
}
