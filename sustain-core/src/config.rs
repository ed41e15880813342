//! # Render Configuration
//!
//! Everything that tunes a render lives in one immutable [`RenderConfig`]
//! that is handed to the renderer. Per-note values are keyed by MIDI number.
//! The default configuration reproduces the piano library's hand-tuned table.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{RenderError, Result};
use crate::inharmonicity::StretchEstimator;
use crate::tracking::AnalysisParams;
use crate::tuning::midi_to_frequency;

/// Tuning for a single note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteParameters {
    /// Length of the recording used, in seconds.
    pub duration: f64,
    /// Highest harmonic that belongs to the looped band.
    pub crossover: u32,
    /// Time in seconds at which the unlooped layers start fading out.
    pub fade_start: f64,
    /// Loop length in samples at the render sample rate.
    pub loop_length: usize,
}

/// Analysis settings expressed as ratios of the note's fundamental.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub resolution_ratio: f64,
    pub window_ratio: f64,
    pub drift_ratio: f64,
    pub amp_floor_db: f64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            resolution_ratio: 0.8,
            window_ratio: 1.0,
            drift_ratio: 0.48,
            amp_floor_db: -90.0,
        }
    }
}

impl AnalysisSettings {
    pub fn params_for(&self, fundamental: f64) -> AnalysisParams {
        AnalysisParams {
            resolution_hz: self.resolution_ratio * fundamental,
            window_width_hz: self.window_ratio * fundamental,
            freq_drift_hz: self.drift_ratio * fundamental,
            amp_floor_db: self.amp_floor_db,
        }
    }
}

/// Duration window for the loop length search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopSearchSettings {
    pub min_duration: f64,
    pub max_duration: f64,
}

impl Default for LoopSearchSettings {
    fn default() -> Self {
        Self {
            min_duration: 0.05,
            max_duration: 0.15,
        }
    }
}

/// Complete render configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Sample rate of inputs and outputs in Hz.
    pub sample_rate: u32,
    /// The loop starts this many seconds before the end of the recording.
    pub loop_start_offset: f64,
    /// Extra recording (seconds) analyzed past the loop start.
    pub analysis_margin: f64,
    /// How far past the loop start (seconds) the looped band is extended.
    pub loop_tail: f64,
    /// Length of the tiled low band in seconds.
    pub output_duration: f64,
    /// Samples kept before the peak when the render is trimmed.
    pub lead_in: usize,
    /// Length in samples of the fade-in applied after trimming.
    pub fade_in: usize,
    /// Number of compounding fade-out passes on the unlooped layers.
    pub fade_out_passes: u32,
    pub analysis: AnalysisSettings,
    pub stretch: StretchEstimator,
    pub loop_search: LoopSearchSettings,
    pub notes: BTreeMap<u8, NoteParameters>,
}

/// The piano table: (note, duration, crossover, fade start, loop count at
/// 22.05 kHz).
const PIANO_TABLE: [(u8, f64, u32, f64, usize); 13] = [
    (36, 5.0, 9, 2.0, 2697),
    (40, 5.0, 9, 2.0, 1873),
    (44, 4.0, 9, 2.0, 1699),
    (48, 4.0, 8, 2.0, 1517),
    (52, 4.0, 7, 2.0, 1873),
    (56, 3.0, 6, 1.5, 1699),
    (60, 3.0, 5, 1.5, 2107),
    (64, 2.5, 5, 1.5, 1271),
    (68, 2.5, 4, 2.0, 1699),
    (72, 2.0, 4, 1.5, 295),
    (76, 1.5, 3, 1.0, 1572),
    (80, 1.5, 3, 1.0, 1699),
    (84, 1.5, 2, 1.0, 1201),
];

static DEFAULT_NOTES: Lazy<BTreeMap<u8, NoteParameters>> = Lazy::new(|| {
    PIANO_TABLE
        .iter()
        .map(|&(midi, duration, crossover, fade_start, count)| {
            let params = NoteParameters {
                duration,
                crossover,
                fade_start,
                // Counts were measured at 22.05 kHz; renders run at 44.1 kHz.
                loop_length: count * 2,
            };
            (midi, params)
        })
        .collect()
});

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            loop_start_offset: 0.3,
            analysis_margin: 1.0,
            loop_tail: 6.0,
            output_duration: 6.0,
            lead_in: 441,
            fade_in: 441,
            fade_out_passes: 2,
            analysis: AnalysisSettings::default(),
            stretch: StretchEstimator::default(),
            loop_search: LoopSearchSettings::default(),
            notes: DEFAULT_NOTES.clone(),
        }
    }
}

/// Values derived for one note, ready for rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteSpec {
    pub midi: u8,
    pub frequency: f64,
    pub params: NoteParameters,
    /// Loop start in seconds.
    pub loop_start: f64,
}

impl RenderConfig {
    /// Loads a configuration from a JSON file. Missing fields take their
    /// default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: RenderConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Notes configured for rendering, ascending.
    pub fn note_numbers(&self) -> Vec<u8> {
        self.notes.keys().copied().collect()
    }

    /// Resolves the derived values for `midi`.
    pub fn note(&self, midi: u8) -> Result<NoteSpec> {
        let params = *self.notes.get(&midi).ok_or(RenderError::UnknownNote(midi))?;
        Ok(NoteSpec {
            midi,
            frequency: midi_to_frequency(midi),
            params,
            loop_start: params.duration - self.loop_start_offset,
        })
    }

    /// Checks global and per-note invariants.
    ///
    /// Loop lengths are not checked here; a zero-length loop is reported
    /// when the note is rendered.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(RenderError::InvalidSettings(
                "sample rate must be positive".to_string(),
            ));
        }
        let search = &self.loop_search;
        if !(search.min_duration > 0.0 && search.min_duration <= search.max_duration) {
            return Err(RenderError::InvalidSettings(format!(
                "loop search window [{}, {}] is not a positive range",
                search.min_duration, search.max_duration
            )));
        }
        for &midi in self.notes.keys() {
            self.validate_note(midi)?;
        }
        Ok(())
    }

    fn validate_note(&self, midi: u8) -> Result<()> {
        let note = self.note(midi)?;
        let params = &note.params;
        if params.crossover == 0 {
            return Err(RenderError::configuration(midi, "crossover must be at least 1"));
        }
        if !(params.duration > 0.0) {
            return Err(RenderError::configuration(midi, "duration must be positive"));
        }
        if !(note.loop_start > 0.0) {
            return Err(RenderError::configuration(
                midi,
                format!(
                    "duration {}s leaves no room before the loop start offset {}s",
                    params.duration, self.loop_start_offset
                ),
            ));
        }
        if !(params.fade_start >= 0.0 && params.fade_start <= note.loop_start) {
            return Err(RenderError::configuration(
                midi,
                format!(
                    "fade start {}s must lie between 0 and the loop start {}s",
                    params.fade_start, note.loop_start
                ),
            ));
        }
        Ok(())
    }
}
