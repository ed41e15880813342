//! # Note Renderer
//!
//! Renders one note of the library from its tonal and noise recordings:
//!
//! 1. extract partials per channel, estimate stretch, snap to exact harmonics
//! 2. split at the crossover and fold the low band of both channels to mono
//! 3. crop the low band at the loop start and extend it with a held tail
//! 4. synthesize the low band twice, once with amplitudes frozen at the loop
//!    start, and tile the frozen version into a seamless sustain
//! 5. synthesize the high band per channel, add the noise layer and fade both
//!    out before the loop starts
//! 6. sum the layers, trim to just before the peak and fade in
//!
//! Every stage owns the buffers it works on; nothing is shared between notes.

use serde::Serialize;
use tracing::{debug, info, info_span};

use crate::audio::{AudioBuffer, Sample, fade_in, fade_out, mix, peak_index, seconds_to_index};
use crate::bands::{merge_channels, split_bands};
use crate::config::{NoteSpec, RenderConfig};
use crate::error::{RenderError, Result};
use crate::inharmonicity::StretchEstimate;
use crate::looping::render_loop;
use crate::partial::{Breakpoint, Partial, PartialSet};
use crate::tracking::PartialEngine;
use crate::tuning::note_name;

/// The two stereo recordings a note is rendered from.
#[derive(Debug, Clone)]
pub struct NoteInputs {
    /// Recording whose harmonic content is analyzed.
    pub tonal: AudioBuffer,
    /// Noise and transient layer, mixed in unchanged before fading out.
    pub noise: AudioBuffer,
}

/// A rendered note.
#[derive(Debug, Clone)]
pub struct RenderedNote {
    pub midi: u8,
    /// Interleaved stereo output.
    pub audio: AudioBuffer,
    /// Stretch estimates for the left and right channels.
    pub stretch: [StretchEstimate; 2],
    /// Peak position before trimming, in frames.
    pub peak_index: usize,
    /// Frames removed from the start of the render.
    pub trim_start: usize,
    /// First frame of the loop in `audio`.
    pub loop_start_frame: usize,
    /// Loop length in frames.
    pub loop_length: usize,
}

/// Serializable overview of a [`RenderedNote`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteSummary {
    pub midi: u8,
    pub name: &'static str,
    pub frames: usize,
    pub duration_secs: f64,
    pub peak_index: usize,
    pub trim_start: usize,
    pub loop_start_frame: usize,
    pub loop_length: usize,
    pub stretch: [StretchEstimate; 2],
}

impl RenderedNote {
    pub fn summary(&self) -> NoteSummary {
        NoteSummary {
            midi: self.midi,
            name: note_name(self.midi),
            frames: self.audio.num_frames(),
            duration_secs: self.audio.duration_secs(),
            peak_index: self.peak_index,
            trim_start: self.trim_start,
            loop_start_frame: self.loop_start_frame,
            loop_length: self.loop_length,
            stretch: self.stretch.clone(),
        }
    }
}

/// Harmonic content of the tonal recording, split at the crossover.
struct TonalBands {
    /// Mono looped band.
    lower: PartialSet,
    /// Unlooped band per channel.
    higher: [PartialSet; 2],
    stretch: [StretchEstimate; 2],
}

/// Renders notes with a fixed configuration and partial engine.
pub struct NoteRenderer<E> {
    config: RenderConfig,
    engine: E,
}

impl<E: PartialEngine> NoteRenderer<E> {
    pub fn new(config: RenderConfig, engine: E) -> Self {
        Self { config, engine }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Renders `midi` from its recordings.
    ///
    /// # Errors
    /// * `UnknownNote` if the configuration has no entry for `midi`.
    /// * `Configuration` if the inputs are not stereo or the crossover leaves
    ///   the looped band empty.
    /// * `DegenerateLoop` / `LoopOutOfRange` if the loop cannot be cut.
    pub fn render(&self, midi: u8, inputs: &NoteInputs) -> Result<RenderedNote> {
        let note = self.config.note(midi)?;
        let span = info_span!("note", midi, name = note_name(midi));
        let _entered = span.enter();

        if inputs.tonal.channels != 2 || inputs.noise.channels != 2 {
            return Err(RenderError::configuration(
                midi,
                format!(
                    "recordings must be stereo (tonal {} channels, noise {} channels)",
                    inputs.tonal.channels, inputs.noise.channels
                ),
            ));
        }

        let rate = self.config.sample_rate;
        let crossover = note.params.crossover;
        info!(
            frequency = note.frequency,
            loop_start = note.loop_start,
            crossover,
            "rendering note"
        );

        let TonalBands {
            lower,
            higher: [left_higher, right_higher],
            stretch,
        } = self.tonal_bands(&inputs.tonal, &note)?;

        let low_band = self
            .render_low_band(&lower, &note)
            .map_err(|e| e.with_note(midi))?;
        let high_left = self.render_high_band(&left_higher, &inputs.noise.channel(0), &note);
        let high_right = self.render_high_band(&right_higher, &inputs.noise.channel(1), &note);

        let mut left = mix(&low_band, &high_left);
        let mut right = mix(&low_band, &high_right);

        let peak = peak_index(&left).unwrap_or(0);
        let trim_start = peak.saturating_sub(self.config.lead_in);
        left.drain(..trim_start.min(left.len()));
        right.drain(..trim_start.min(right.len()));
        let left_fade = self.config.fade_in.min(left.len());
        fade_in(&mut left[..left_fade]);
        let right_fade = self.config.fade_in.min(right.len());
        fade_in(&mut right[..right_fade]);

        let audio = AudioBuffer::from_stereo(&left, &right, rate);
        let loop_start_frame = seconds_to_index(note.loop_start, rate).saturating_sub(trim_start);
        info!(
            frames = audio.num_frames(),
            peak,
            trim_start,
            loop_start_frame,
            "note rendered"
        );

        Ok(RenderedNote {
            midi,
            audio,
            stretch,
            peak_index: peak,
            trim_start,
            loop_start_frame,
            loop_length: note.params.loop_length,
        })
    }

    /// Extracts both channels' partials and splits them at the crossover.
    /// The low bands are folded to mono, cropped at the loop start and
    /// extended with a held tail.
    fn tonal_bands(&self, tonal: &AudioBuffer, note: &NoteSpec) -> Result<TonalBands> {
        let crossover = note.params.crossover;

        // Only the start of the recording up to a little past the loop start
        // is analyzed.
        let mut tonal = tonal.clone();
        tonal.truncate_frames(seconds_to_index(
            (note.loop_start + self.config.analysis_margin).ceil(),
            self.config.sample_rate,
        ));
        let (left_partials, left_stretch) = self.extract_partials(&tonal.channel(0), note);
        let (right_partials, right_stretch) = self.extract_partials(&tonal.channel(1), note);

        let (left_lower, left_higher) = split_bands(left_partials, crossover);
        let (right_lower, right_higher) = split_bands(right_partials, crossover);
        let mut lower = merge_channels(&left_lower, &right_lower);
        self.crop_and_extend(&mut lower, note);
        if lower.is_empty() {
            return Err(RenderError::configuration(
                note.midi,
                format!("no partials at or below crossover harmonic {crossover}"),
            ));
        }
        debug!(
            lower = lower.len(),
            left_higher = left_higher.len(),
            right_higher = right_higher.len(),
            "bands split"
        );

        Ok(TonalBands {
            lower,
            higher: [left_higher, right_higher],
            stretch: [left_stretch, right_stretch],
        })
    }

    /// Analyzes one channel and returns its partials labeled and retuned to
    /// exact multiples of the fundamental.
    fn extract_partials(&self, samples: &[Sample], note: &NoteSpec) -> (PartialSet, StretchEstimate) {
        let rate = self.config.sample_rate;
        let params = self.config.analysis.params_for(note.frequency);
        let mut partials = self.engine.analyze(samples, rate, &params);

        let estimate = self.config.stretch.estimate(&partials, note.frequency);
        let stretch = estimate.stretch.max(0.0);
        self.engine.channelize(&mut partials, note.frequency, stretch);
        self.engine.distill(&mut partials);

        for partial in partials.iter_mut() {
            let frequency = f64::from(partial.label()) * note.frequency;
            partial.retune(frequency);
        }
        debug!(partials = partials.len(), stretch, "partials extracted");
        (partials, estimate)
    }

    /// Crops to the loop start and holds each partial's last state until
    /// `loop_start + loop_tail`.
    fn crop_and_extend(&self, partials: &mut PartialSet, note: &NoteSpec) {
        self.engine.crop(partials, 0.0, note.loop_start);
        let tail = note.loop_start + self.config.loop_tail;
        for partial in partials.iter_mut() {
            if let Some(&last) = partial.last() {
                partial.insert(Breakpoint {
                    time: tail,
                    bandwidth: 0.0,
                    ..last
                });
            }
        }
    }

    /// Synthesizes the looped band: the evolving attack up to the loop start,
    /// then a tiled loop cut from a frozen-timbre rendering.
    fn render_low_band(&self, lower: &[Partial], note: &NoteSpec) -> Result<Vec<Sample>> {
        let rate = self.config.sample_rate;

        let mut frozen = lower.to_vec();
        for partial in frozen.iter_mut() {
            let amplitude = partial.amplitude_at(note.loop_start);
            partial.freeze_amplitude(amplitude);
        }
        let loop_source = self.engine.synthesize(&frozen, rate);
        let mut low_band = render_loop(
            &loop_source,
            rate,
            note.loop_start,
            note.params.loop_length,
            self.config.output_duration,
        )?;

        let attack = self.engine.synthesize(lower, rate);
        let split = seconds_to_index(note.loop_start, rate).min(low_band.len());
        let copied = split.min(attack.len());
        low_band[..copied].copy_from_slice(&attack[..copied]);
        low_band[copied..split].fill(0.0);
        Ok(low_band)
    }

    /// Synthesizes the unlooped band for one channel and mixes in its noise
    /// layer, faded out before the loop starts and silent afterwards.
    fn render_high_band(&self, higher: &[Partial], noise: &[Sample], note: &NoteSpec) -> Vec<Sample> {
        let rate = self.config.sample_rate;
        let tonal = self.engine.synthesize(higher, rate);
        let mut combined = mix(&tonal, noise);

        let loop_start = seconds_to_index(note.loop_start, rate).min(combined.len());
        let fade_start = seconds_to_index(note.params.fade_start, rate).min(loop_start);
        fade_out(&mut combined[fade_start..loop_start], self.config.fade_out_passes);
        combined[loop_start..].fill(0.0);
        combined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support::{RATE, ScriptedEngine, inputs_with_noise, quiet_inputs, short_config};

    const LOOP_LENGTH: usize = 400;

    fn renderer(loop_length: usize, crossover: u32, harmonics: Vec<u32>) -> NoteRenderer<ScriptedEngine> {
        NoteRenderer::new(
            short_config(loop_length, crossover),
            ScriptedEngine::new(harmonics),
        )
    }

    #[test]
    fn attack_plays_unfrozen_until_the_loop_starts() {
        // No high band and no noise: the output is the low band alone.
        let renderer = renderer(LOOP_LENGTH, 2, vec![1, 2]);
        let inputs = inputs_with_noise(0.0);
        let note = renderer.config().note(69).unwrap();

        let bands = renderer.tonal_bands(&inputs.tonal, &note).unwrap();
        assert!(bands.higher.iter().all(|band| band.is_empty()));
        let attack = renderer.engine.synthesize(&bands.lower, RATE);
        let mut frozen = bands.lower.clone();
        for partial in frozen.iter_mut() {
            let amplitude = partial.amplitude_at(note.loop_start);
            partial.freeze_amplitude(amplitude);
        }
        let sustain = renderer.engine.synthesize(&frozen, RATE);

        let rendered = renderer.render(69, &inputs).unwrap();
        let left = rendered.audio.channel(0);
        let trim = rendered.trim_start;
        let fade = renderer.config().fade_in;
        let loop_frame = rendered.loop_start_frame;
        assert!(fade < loop_frame);

        for i in fade..loop_frame {
            assert_eq!(left[i], attack[i + trim], "frame {i}");
        }
        assert!((fade..loop_frame).any(|i| (left[i] - sustain[i + trim]).abs() > 1e-3));
        // The crossfade leaves the first loop sample untouched.
        let loop_start = seconds_to_index(note.loop_start, RATE);
        assert_eq!(left[loop_frame], sustain[loop_start]);
    }

    #[test]
    fn output_starts_lead_in_frames_before_the_peak() {
        let engine = ScriptedEngine {
            onset: 0.3,
            ..ScriptedEngine::new(vec![1, 2, 3, 4])
        };
        let renderer = NoteRenderer::new(short_config(LOOP_LENGTH, 2), engine);
        let rendered = renderer.render(69, &inputs_with_noise(0.0)).unwrap();
        let lead_in = renderer.config().lead_in;

        assert!(rendered.peak_index > lead_in);
        assert_eq!(rendered.trim_start, rendered.peak_index - lead_in);
        assert_eq!(peak_index(&rendered.audio.channel(0)), Some(lead_in));

        let loop_start = renderer.config().note(69).unwrap().loop_start;
        assert_eq!(
            rendered.loop_start_frame,
            seconds_to_index(loop_start, RATE) - rendered.trim_start
        );
    }

    #[test]
    fn render_is_stereo_finite_and_deterministic() {
        let renderer = renderer(LOOP_LENGTH, 2, vec![1, 2, 3, 4]);
        let first = renderer.render(69, &quiet_inputs()).unwrap();
        let second = renderer.render(69, &quiet_inputs()).unwrap();

        assert_eq!(first.audio.channels, 2);
        assert_eq!(first.audio.sample_rate, RATE);
        assert!(first.audio.num_frames() > 0);
        assert!(first.audio.data.iter().all(|s| s.is_finite()));
        assert_eq!(first.audio.data, second.audio.data);
        assert_eq!(first.loop_length, LOOP_LENGTH);
        // The render starts from silence after the fade-in.
        assert_eq!(first.audio.data[0], 0.0);
        assert_eq!(first.audio.data[1], 0.0);
    }

    #[test]
    fn sustain_repeats_with_the_loop_length() {
        let renderer = renderer(LOOP_LENGTH, 2, vec![1, 2, 3, 4]);
        let note = renderer.render(69, &quiet_inputs()).unwrap();
        let left = note.audio.channel(0);
        let right = note.audio.channel(1);
        let start = note.loop_start_frame;
        assert!(start >= renderer.config().fade_in);
        assert!(start + 3 * LOOP_LENGTH <= left.len());
        for i in 0..LOOP_LENGTH {
            assert_eq!(left[start + i], left[start + LOOP_LENGTH + i]);
            assert_eq!(left[start + i], left[start + 2 * LOOP_LENGTH + i]);
            // Past the loop start only the mono low band remains.
            assert_eq!(left[start + i], right[start + i]);
        }
    }

    #[test]
    fn stretch_of_scaled_harmonics_is_zero() {
        let renderer = renderer(LOOP_LENGTH, 2, vec![1, 2, 3, 4]);
        let note = renderer.render(69, &quiet_inputs()).unwrap();
        for estimate in &note.stretch {
            assert_eq!(estimate.reference_harmonic, Some(4));
            assert!(estimate.stretch.abs() < 1e-9);
        }
        let summary = note.summary();
        assert_eq!(summary.name, "A4");
        assert_eq!(summary.frames, note.audio.num_frames());
    }

    #[test]
    fn zero_loop_length_is_fatal() {
        let err = renderer(0, 2, vec![1, 2]).render(69, &quiet_inputs()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DegenerateLoop);
        assert!(matches!(err, RenderError::DegenerateLoop { note: Some(69), length: 0, .. }));
        assert!(err.to_string().starts_with("note 69: "));
    }

    #[test]
    fn empty_low_band_is_a_configuration_error() {
        let err = renderer(LOOP_LENGTH, 2, vec![3, 4])
            .render(69, &quiet_inputs())
            .unwrap_err();
        assert!(matches!(err, RenderError::Configuration { note: 69, .. }));
    }

    #[test]
    fn mono_input_is_rejected() {
        let mono = NoteInputs {
            tonal: AudioBuffer::new(vec![0.0; 100], 1, RATE),
            noise: AudioBuffer::new(vec![0.0; 100], 1, RATE),
        };
        let err = renderer(LOOP_LENGTH, 2, vec![1]).render(69, &mono).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn unknown_note_is_rejected() {
        let err = renderer(LOOP_LENGTH, 2, vec![1])
            .render(71, &quiet_inputs())
            .unwrap_err();
        assert!(matches!(err, RenderError::UnknownNote(71)));
    }
}
