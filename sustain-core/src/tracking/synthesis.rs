//! Additive resynthesis of partials.

use std::f64::consts::TAU;

use crate::audio::Sample;
use crate::partial::{Breakpoint, Partial};

/// Renders partials with one oscillator each.
///
/// Frequency and amplitude are interpolated linearly between breakpoints.
/// Each partial fades in from silence over `fade_time` seconds before its
/// first breakpoint and out after its last one. Only the sinusoidal share of
/// each breakpoint (`sqrt(1 - bandwidth)`) is rendered.
///
/// The output runs until the last fade-out completes.
pub fn synthesize(partials: &[Partial], sample_rate: u32, fade_time: f64) -> Vec<Sample> {
    let rate = f64::from(sample_rate);
    let end = partials
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| p.end_time() + fade_time)
        .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.max(t))));
    let Some(end) = end else {
        return Vec::new();
    };

    let mut output = vec![0.0; (end * rate).ceil().max(0.0) as usize];
    let mut accumulator = vec![0.0_f64; output.len()];
    for partial in partials {
        render_partial(partial, rate, fade_time, &mut accumulator);
    }
    for (out, acc) in output.iter_mut().zip(&accumulator) {
        *out = *acc as Sample;
    }
    output
}

fn render_partial(partial: &Partial, rate: f64, fade_time: f64, output: &mut [f64]) {
    let (Some(first), Some(last)) = (partial.first(), partial.last()) else {
        return;
    };

    // Envelope with silent points added at both ends.
    let mut envelope: Vec<Breakpoint> = Vec::with_capacity(partial.len() + 2);
    envelope.push(Breakpoint {
        time: first.time - fade_time,
        amplitude: 0.0,
        ..*first
    });
    envelope.extend_from_slice(partial.breakpoints());
    envelope.push(Breakpoint {
        time: last.time + fade_time,
        amplitude: 0.0,
        ..*last
    });

    let start_index = (envelope[0].time * rate).ceil().max(0.0) as usize;
    let end_time = envelope[envelope.len() - 1].time;
    let mut phase = 0.0_f64;
    let mut segment = 0;

    for (n, out) in output.iter_mut().enumerate().skip(start_index) {
        let t = n as f64 / rate;
        if t > end_time {
            break;
        }
        while segment + 2 < envelope.len() && t > envelope[segment + 1].time {
            segment += 1;
        }
        let a = &envelope[segment];
        let b = &envelope[segment + 1];
        let span = b.time - a.time;
        let alpha = if span > 0.0 {
            ((t - a.time) / span).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let frequency = a.frequency + (b.frequency - a.frequency) * alpha;
        let amplitude = a.amplitude + (b.amplitude - a.amplitude) * alpha;
        let bandwidth = (a.bandwidth + (b.bandwidth - a.bandwidth) * alpha).clamp(0.0, 1.0);

        *out += amplitude * (1.0 - bandwidth).sqrt() * phase.sin();
        phase = (phase + TAU * frequency / rate) % TAU;
    }
}
