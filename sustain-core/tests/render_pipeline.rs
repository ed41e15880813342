//! End-to-end renders with the built-in partial tracker, from WAV files on
//! disk to a written result.

use approx::assert_abs_diff_eq;
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::path::Path;
use sustain_core::inharmonicity::harmonic_frequency;
use sustain_core::tuning::midi_to_frequency;
use sustain_core::{
    AudioBuffer, ErrorKind, HarmonicTracker, NoteParameters, NoteRenderer, RenderConfig, Sample,
    best_loop_candidate, render_batch, wav,
};
use tempfile::tempdir;

const RATE: u32 = 8000;
const MIDI: u8 = 57;
const STRETCH: f64 = 1.0e-4;

/// A decaying stiff-string tone with six harmonics, identical in both
/// channels apart from a small level difference.
fn stiff_string(seconds: f64) -> AudioBuffer {
    let f0 = midi_to_frequency(MIDI);
    let frames = (seconds * f64::from(RATE)) as usize;
    let mut left = Vec::with_capacity(frames);
    let mut right = Vec::with_capacity(frames);
    for i in 0..frames {
        let t = i as f64 / f64::from(RATE);
        let envelope = (-t / 0.8).exp();
        let value: f64 = (1..=6)
            .map(|k| {
                let k = f64::from(k);
                let frequency = harmonic_frequency(k, f0, STRETCH);
                0.3 / k * envelope * (2.0 * PI * frequency * t).sin()
            })
            .sum();
        left.push(value as Sample);
        right.push((value * 0.9) as Sample);
    }
    AudioBuffer::from_stereo(&left, &right, RATE)
}

fn hiss(seconds: f64) -> AudioBuffer {
    let frames = (seconds * f64::from(RATE)) as usize;
    let samples: Vec<Sample> = (0..frames)
        .map(|i| ((i * 7919 % 1000) as Sample / 1000.0 - 0.5) * 0.002)
        .collect();
    AudioBuffer::from_stereo(&samples, &samples, RATE)
}

fn config(loop_length: usize) -> RenderConfig {
    let mut notes = BTreeMap::new();
    notes.insert(
        MIDI,
        NoteParameters {
            duration: 1.0,
            crossover: 3,
            fade_start: 0.2,
            loop_length,
        },
    );
    RenderConfig {
        sample_rate: RATE,
        output_duration: 1.5,
        notes,
        ..RenderConfig::default()
    }
}

fn write_inputs(dir: &Path) {
    wav::write_audio(wav::tonal_path(dir, MIDI), &stiff_string(1.2)).unwrap();
    wav::write_audio(wav::noise_path(dir, MIDI), &hiss(0.5)).unwrap();
}

#[test]
fn renders_a_looping_note_from_disk() {
    let dir = tempdir().unwrap();
    write_inputs(dir.path());

    let frequency = midi_to_frequency(MIDI);
    let loop_length = best_loop_candidate(frequency, RATE, 0.05, 0.15).unwrap().rounded();
    let renderer = NoteRenderer::new(config(loop_length), HarmonicTracker::default());
    let report = render_batch(
        &renderer,
        &[MIDI],
        |midi| wav::load_note_inputs(dir.path(), midi, RATE),
        2,
    );
    assert!(report.is_success(), "{:?}", report.failures);
    let note = &report.rendered[0];

    assert_eq!(note.audio.channels, 2);
    assert!(note.audio.data.iter().all(|s| s.is_finite()));

    for estimate in &note.stretch {
        assert!(estimate.reference_harmonic.is_some());
        assert_abs_diff_eq!(estimate.stretch, STRETCH, epsilon = 1e-2);
    }

    // From the loop start on, the render is the mono low band tiled with the
    // loop length.
    let left = note.audio.channel(0);
    let right = note.audio.channel(1);
    let start = note.loop_start_frame;
    assert!(start + 2 * loop_length <= left.len());
    for i in 0..loop_length {
        assert_eq!(left[start + i], left[start + loop_length + i]);
        assert_eq!(left[start + i], right[start + i]);
    }
    let sustain_level = left[start..start + loop_length]
        .iter()
        .fold(0.0f32, |max, s| max.max(s.abs()));
    assert!(sustain_level > 0.01, "sustain is silent: {sustain_level}");

    let out = wav::result_path(dir.path(), MIDI);
    wav::write_audio(&out, &note.audio).unwrap();
    let written = wav::read_audio(&out, RATE).unwrap();
    assert_eq!(written.num_frames(), note.audio.num_frames());
}

#[test]
fn rendering_is_deterministic() {
    let dir = tempdir().unwrap();
    write_inputs(dir.path());
    let renderer = NoteRenderer::new(config(400), HarmonicTracker::default());
    let inputs = wav::load_note_inputs(dir.path(), MIDI, RATE).unwrap();

    let first = renderer.render(MIDI, &inputs).unwrap();
    let second = renderer.render(MIDI, &inputs).unwrap();
    assert_eq!(first.audio, second.audio);
    assert_eq!(first.summary(), second.summary());
}

#[test]
fn batch_reports_missing_and_mismatched_inputs() {
    let dir = tempdir().unwrap();
    write_inputs(dir.path());

    let mut config = config(400);
    config.sample_rate = 16000;
    config.notes.insert(60, config.notes[&MIDI]);
    let renderer = NoteRenderer::new(config, HarmonicTracker::default());
    let report = render_batch(
        &renderer,
        &[MIDI, 60],
        |midi| wav::load_note_inputs(dir.path(), midi, 16000),
        2,
    );

    assert!(report.rendered.is_empty());
    let failed: Vec<u8> = report.failures.iter().map(|f| f.midi).collect();
    assert_eq!(failed, vec![MIDI, 60]);
    assert!(report.failures.iter().all(|f| f.error.kind() == ErrorKind::Input));

    let json = serde_json::to_value(report.summary()).unwrap();
    assert_eq!(json["failures"][0]["kind"], "input");
}
