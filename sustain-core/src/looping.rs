//! # Loop Synthesis
//!
//! Turns a synthesized note into a long sustain by crossfading one loop
//! cycle into the audio that precedes it and tiling that cycle.

use tracing::debug;

use crate::audio::{Sample, seconds_to_index};
use crate::error::{RenderError, Result};

/// Blends the loop `[start, start + length)` with the `length` samples before
/// it so the loop's last sample runs smoothly into its first.
///
/// Sample `i` of the loop becomes `before[i] * p + loop[i] * (1 - p)` with
/// `p = i / length`. Samples before index 0 count as silence.
///
/// # Panics
/// * If `start + length` exceeds `frames.len()`.
pub fn crossfade_loop(frames: &mut [Sample], start: usize, length: usize) {
    if length == 0 {
        return;
    }
    let end = start + length;
    assert!(end <= frames.len(), "loop end {end} beyond {} frames", frames.len());

    for i in 0..length {
        let p = i as Sample / length as Sample;
        let before = (start + i)
            .checked_sub(length)
            .map_or(0.0, |index| frames[index]);
        frames[start + i] = before * p + frames[start + i] * (1.0 - p);
    }
}

/// Extends `frames` to `output_secs` by repeating a crossfaded loop.
///
/// The loop begins at `floor(sample_rate * loop_start_secs)` and is
/// `loop_length` samples long. The output holds exactly
/// `round(sample_rate * output_secs)` samples: the input (with the blended
/// loop) up to the loop end, then as many whole copies of the loop as fit.
/// Any space too short for a whole copy is left silent.
///
/// # Errors
/// The errors carry no note; callers attach one with
/// [`RenderError::with_note`].
/// * `DegenerateLoop` if `loop_length` is zero.
/// * `LoopOutOfRange` if the loop extends past the end of `frames`.
pub fn render_loop(
    frames: &[Sample],
    sample_rate: u32,
    loop_start_secs: f64,
    loop_length: usize,
    output_secs: f64,
) -> Result<Vec<Sample>> {
    let start = seconds_to_index(loop_start_secs, sample_rate);
    if loop_length == 0 {
        return Err(RenderError::DegenerateLoop {
            note: None,
            start,
            length: loop_length,
        });
    }
    let end = start + loop_length;
    if end > frames.len() {
        return Err(RenderError::LoopOutOfRange {
            note: None,
            start,
            end,
            available: frames.len(),
        });
    }

    let mut source = frames[..end].to_vec();
    crossfade_loop(&mut source, start, loop_length);
    let tile = &source[start..end];

    let result_len = (f64::from(sample_rate) * output_secs).round().max(0.0) as usize;
    let mut result = vec![0.0; result_len];
    let head = end.min(result_len);
    result[..head].copy_from_slice(&source[..head]);

    let mut x = end;
    let mut tiles = 0;
    while x + loop_length <= result_len {
        result[x..x + loop_length].copy_from_slice(tile);
        x += loop_length;
        tiles += 1;
    }

    debug!(start, loop_length, tiles, result_len, "loop tiled");
    Ok(result)
}
