//! # Harmonic Bands
//!
//! Splitting a partial set at a crossover harmonic and folding the looped
//! low band of both channels down to mono.

use std::collections::BTreeMap;

use crate::partial::{LinearEnvelope, Partial, PartialSet};

/// Splits partials into `(lower, higher)` at `crossover`.
///
/// Partials labeled `<= crossover` go to the lower band, the rest to the
/// higher band. Duplicate labels pass through untouched.
pub fn split_bands(partials: PartialSet, crossover: u32) -> (PartialSet, PartialSet) {
    partials
        .into_iter()
        .partition(|p| p.label() <= crossover)
}

/// Merges left and right partial sets into one mono set.
///
/// Labels from 1 up to the highest label in either set are visited in order;
/// labels missing from both are skipped. A label present on one side only is
/// copied as is. When both sides carry it, the left partial is kept and each
/// of its breakpoint amplitudes becomes the mean of its own value and the
/// right partial's amplitude envelope at the same time.
///
/// If a channel holds the same label more than once, the last one wins.
pub fn merge_channels(left: &[Partial], right: &[Partial]) -> PartialSet {
    let left_map = by_label(left);
    let right_map = by_label(right);
    let max_label = left_map
        .keys()
        .chain(right_map.keys())
        .copied()
        .max()
        .unwrap_or(0);

    (1..=max_label)
        .filter_map(|label| match (left_map.get(&label), right_map.get(&label)) {
            (Some(l), Some(r)) => {
                let mut merged = (*l).clone();
                blend_amplitudes(&mut merged, r);
                Some(merged)
            }
            (Some(only), None) | (None, Some(only)) => Some((*only).clone()),
            (None, None) => None,
        })
        .collect()
}

fn by_label(partials: &[Partial]) -> BTreeMap<u32, &Partial> {
    partials.iter().map(|p| (p.label(), p)).collect()
}

/// Averages `base`'s amplitudes with `other`'s amplitude envelope.
fn blend_amplitudes(base: &mut Partial, other: &Partial) {
    let envelope: LinearEnvelope = other
        .breakpoints()
        .iter()
        .map(|bp| (bp.time, bp.amplitude))
        .collect();
    for bp in base.breakpoints_mut() {
        bp.amplitude = (bp.amplitude + envelope.value_at(bp.time)) / 2.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partial::Breakpoint;
    use approx::assert_relative_eq;

    fn partial(label: u32, points: &[(f64, f64)]) -> Partial {
        Partial::from_breakpoints(
            label,
            points
                .iter()
                .map(|&(t, a)| Breakpoint::new(t, 100.0 * f64::from(label), a))
                .collect(),
        )
    }

    fn labels(set: &[Partial]) -> Vec<u32> {
        let mut labels: Vec<u32> = set.iter().map(Partial::label).collect();
        labels.sort_unstable();
        labels
    }

    #[test]
    fn split_is_a_disjoint_cover() {
        let set: PartialSet = [1, 2, 3, 4, 5, 6, 3]
            .iter()
            .map(|&l| partial(l, &[(0.0, 1.0)]))
            .collect();
        let (lower, higher) = split_bands(set.clone(), 3);

        assert_eq!(labels(&lower), vec![1, 2, 3, 3]);
        assert_eq!(labels(&higher), vec![4, 5, 6]);
        let mut union: Vec<u32> = labels(&lower);
        union.extend(labels(&higher));
        union.sort_unstable();
        assert_eq!(union, labels(&set));
        assert!(lower.iter().all(|p| p.label() <= 3));
        assert!(higher.iter().all(|p| p.label() > 3));
    }

    #[test]
    fn split_at_zero_sends_everything_high() {
        let set = vec![partial(1, &[(0.0, 1.0)])];
        let (lower, higher) = split_bands(set, 0);
        assert!(lower.is_empty());
        assert_eq!(higher.len(), 1);
    }

    #[test]
    fn merged_amplitude_is_the_mean() {
        let left = vec![partial(1, &[(0.0, 1.0)])];
        let right = vec![partial(1, &[(0.0, 0.5)])];
        let merged = merge_channels(&left, &right);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].breakpoints()[0].amplitude, 0.75);
    }

    #[test]
    fn right_envelope_is_interpolated_at_left_times() {
        let left = vec![partial(2, &[(0.0, 0.2), (0.5, 0.4), (2.0, 0.6)])];
        let right = vec![partial(2, &[(0.0, 0.0), (1.0, 1.0)])];
        let merged = merge_channels(&left, &right);
        let amps: Vec<f64> = merged[0].breakpoints().iter().map(|bp| bp.amplitude).collect();
        assert_relative_eq!(amps[0], (0.2 + 0.0) / 2.0);
        assert_relative_eq!(amps[1], (0.4 + 0.5) / 2.0);
        // Past the right partial's end its last value is held.
        assert_relative_eq!(amps[2], (0.6 + 1.0) / 2.0);
        assert_eq!(merged[0].breakpoints()[1].frequency, 200.0);
    }

    #[test]
    fn single_channel_labels_are_copied() {
        let left = vec![partial(1, &[(0.0, 0.3)]), partial(4, &[(0.0, 0.9)])];
        let right = vec![partial(2, &[(0.0, 0.7)])];
        let merged = merge_channels(&left, &right);
        assert_eq!(labels(&merged), vec![1, 2, 4]);
        assert_eq!(merged[0], left[0]);
        assert_eq!(merged[1], right[0]);
        assert_eq!(merged[2], left[1]);
    }

    #[test]
    fn unlabeled_partials_are_not_merged() {
        let merged = merge_channels(&[partial(0, &[(0.0, 1.0)])], &[]);
        assert!(merged.is_empty());
    }
}
