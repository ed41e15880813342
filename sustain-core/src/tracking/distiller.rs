//! Collapsing partials that share a label into one.

use std::collections::BTreeMap;

use crate::partial::{Partial, PartialSet};

/// Leaves at most one partial per label, ordered by label.
///
/// Within a label the most energetic partial is kept whole. The others only
/// contribute breakpoints that fall outside every time span already taken,
/// so overlapping fragments never produce two values at once. Unlabeled
/// partials (label 0) are dropped.
pub fn distill(partials: &mut PartialSet) {
    let mut groups: BTreeMap<u32, Vec<Partial>> = BTreeMap::new();
    for partial in partials.drain(..) {
        if partial.label() != 0 && !partial.is_empty() {
            groups.entry(partial.label()).or_default().push(partial);
        }
    }

    for (label, mut group) in groups {
        group.sort_by(|a, b| b.energy().total_cmp(&a.energy()));
        let mut members = group.into_iter();
        let Some(mut fused) = members.next() else {
            continue;
        };
        let mut spans = vec![(fused.start_time(), fused.end_time())];

        for fragment in members {
            for bp in fragment.breakpoints() {
                let covered = spans
                    .iter()
                    .any(|&(start, end)| bp.time >= start && bp.time <= end);
                if !covered {
                    fused.insert(*bp);
                }
            }
            spans.push((fragment.start_time(), fragment.end_time()));
        }
        fused.set_label(label);
        partials.push(fused);
    }
}
