//! # Loop Length Search
//!
//! A loop that lasts a whole number of fundamental cycles keeps the waveform
//! in phase across the seam. Such a loop is rarely a whole number of samples
//! long, and counts whose fractional part sits near half a sample resample
//! to an integer length with the least phase error, so candidates are ranked
//! by `|frac(count) - 0.5|`.

use serde::Serialize;
use std::iter::FusedIterator;

use crate::error::{RenderError, Result};

/// A loop length that spans a whole number of cycles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoopCandidate {
    /// Loop length in (fractional) samples.
    pub sample_count: f64,
    /// `|frac(sample_count) - 0.5|`; lower is better.
    pub error: f64,
    /// Number of fundamental cycles in the loop.
    pub cycles: u32,
}

impl LoopCandidate {
    /// Loop length rounded to a whole number of samples.
    pub fn rounded(&self) -> usize {
        self.sample_count.round() as usize
    }

    /// Loop length in seconds.
    pub fn duration(&self, sample_rate: u32) -> f64 {
        self.sample_count / f64::from(sample_rate)
    }
}

/// Lazily enumerates loop candidates inside a duration window, in order of
/// increasing length.
#[derive(Debug, Clone)]
pub struct LoopCandidates {
    cycle_len: f64,
    min_count: f64,
    max_count: f64,
    cycles: u32,
    done: bool,
}

impl LoopCandidates {
    /// Candidates for a fundamental of `frequency` Hz at `sample_rate`,
    /// lasting between `min_secs` and `max_secs` inclusive.
    ///
    /// The fundamental must lie below the Nyquist frequency.
    pub fn new(frequency: f64, sample_rate: u32, min_secs: f64, max_secs: f64) -> Result<Self> {
        let valid = frequency.is_finite()
            && frequency > 0.0
            && sample_rate > 0
            && frequency < f64::from(sample_rate) / 2.0
            && min_secs.is_finite()
            && max_secs.is_finite()
            && min_secs > 0.0
            && min_secs <= max_secs;
        if !valid {
            return Err(RenderError::InvalidLoopWindow {
                frequency,
                sample_rate,
                min_secs,
                max_secs,
            });
        }
        let rate = f64::from(sample_rate);
        Ok(Self {
            cycle_len: rate / frequency,
            min_count: min_secs * rate,
            max_count: max_secs * rate,
            cycles: 0,
            done: false,
        })
    }

    /// Length of one fundamental cycle in samples.
    pub fn cycle_len(&self) -> f64 {
        self.cycle_len
    }
}

impl Iterator for LoopCandidates {
    type Item = LoopCandidate;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let Some(cycles) = self.cycles.checked_add(1) else {
                self.done = true;
                break;
            };
            self.cycles = cycles;
            let sample_count = f64::from(self.cycles) * self.cycle_len;
            if sample_count > self.max_count {
                self.done = true;
                break;
            }
            if sample_count < self.min_count {
                continue;
            }
            return Some(LoopCandidate {
                sample_count,
                error: (sample_count.fract() - 0.5).abs(),
                cycles: self.cycles,
            });
        }
        None
    }
}

impl FusedIterator for LoopCandidates {}

/// All candidates in the window, best first.
///
/// Ties keep the shorter loop first. The list is empty when the window is
/// narrower than one cycle.
pub fn rank_loop_candidates(
    frequency: f64,
    sample_rate: u32,
    min_secs: f64,
    max_secs: f64,
) -> Result<Vec<LoopCandidate>> {
    let mut candidates: Vec<LoopCandidate> =
        LoopCandidates::new(frequency, sample_rate, min_secs, max_secs)?.collect();
    candidates.sort_by(|a, b| {
        a.error
            .total_cmp(&b.error)
            .then(a.sample_count.total_cmp(&b.sample_count))
    });
    Ok(candidates)
}

/// The best candidate in the window.
///
/// # Errors
/// `NoLoopCandidate` when the window holds no whole number of cycles.
pub fn best_loop_candidate(
    frequency: f64,
    sample_rate: u32,
    min_secs: f64,
    max_secs: f64,
) -> Result<LoopCandidate> {
    LoopCandidates::new(frequency, sample_rate, min_secs, max_secs)?
        .min_by(|a, b| {
            a.error
                .total_cmp(&b.error)
                .then(a.sample_count.total_cmp(&b.sample_count))
        })
        .ok_or(RenderError::NoLoopCandidate {
            frequency,
            sample_rate,
            min_secs,
            max_secs,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::midi_to_frequency;
    use approx::assert_abs_diff_eq;

    #[test]
    fn a4_best_candidate_is_pinned() {
        let best = best_loop_candidate(440.0, 44100, 0.05, 0.15).unwrap();
        assert_eq!(best.sample_count, 3307.5);
        assert_eq!(best.cycles, 33);
        assert_eq!(best.error, 0.0);
    }

    #[test]
    fn a4_window_holds_cycles_22_to_66() {
        let cycles: Vec<u32> = LoopCandidates::new(440.0, 44100, 0.05, 0.15)
            .unwrap()
            .map(|c| c.cycles)
            .collect();
        assert_eq!(cycles, (22..=66).collect::<Vec<u32>>());
    }

    #[test]
    fn candidates_stay_in_window_and_on_cycle_multiples() {
        for midi in (36..=84).step_by(4) {
            let frequency = midi_to_frequency(midi);
            let search = LoopCandidates::new(frequency, 22050, 0.05, 0.15).unwrap();
            let cycle_len = search.cycle_len();
            for candidate in search {
                assert!(candidate.sample_count >= 0.05 * 22050.0);
                assert!(candidate.sample_count <= 0.15 * 22050.0);
                let cycles = candidate.sample_count / cycle_len;
                assert_abs_diff_eq!(cycles, cycles.round(), epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn ranking_is_ascending_by_error() {
        let ranked = rank_loop_candidates(midi_to_frequency(36), 22050, 0.05, 0.15).unwrap();
        assert!(!ranked.is_empty());
        for pair in ranked.windows(2) {
            assert!(pair[0].error <= pair[1].error);
        }
        let best = best_loop_candidate(midi_to_frequency(36), 22050, 0.05, 0.15).unwrap();
        assert_eq!(ranked[0], best);
    }

    #[test]
    fn narrow_window_has_no_candidates() {
        // One cycle of 55 Hz is ~18 ms; a 1 ms window cannot hold one.
        let ranked = rank_loop_candidates(55.0, 44100, 0.010, 0.011).unwrap();
        assert!(ranked.is_empty());
        assert!(matches!(
            best_loop_candidate(55.0, 44100, 0.010, 0.011),
            Err(RenderError::NoLoopCandidate { .. })
        ));
    }

    #[test]
    fn inverted_window_is_rejected() {
        assert!(matches!(
            LoopCandidates::new(440.0, 44100, 0.2, 0.1),
            Err(RenderError::InvalidLoopWindow { .. })
        ));
        assert!(LoopCandidates::new(0.0, 44100, 0.05, 0.15).is_err());
    }

    #[test]
    fn fundamental_at_or_above_nyquist_is_rejected() {
        for frequency in [22050.0, 1.0e12, f64::MAX] {
            assert!(matches!(
                LoopCandidates::new(frequency, 44100, 0.05, 0.15),
                Err(RenderError::InvalidLoopWindow { .. })
            ));
        }
        assert!(LoopCandidates::new(22049.0, 44100, 0.05, 0.15).is_ok());
    }

    #[test]
    fn iterator_is_lazy_and_fused() {
        let mut search = LoopCandidates::new(440.0, 44100, 0.05, 0.15).unwrap();
        assert_eq!(search.next().map(|c| c.cycles), Some(22));
        let rest = search.by_ref().count();
        assert_eq!(rest, 44);
        assert!(search.next().is_none());
    }
}
