//! Error types for the sustain renderer.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Broad classification of a [`RenderError`], used when reporting a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The note's parameters cannot produce a render.
    Configuration,
    /// The loop segment resolved to nothing usable.
    DegenerateLoop,
    /// Reading or writing audio failed.
    Input,
}

#[derive(Error, Debug)]
pub enum RenderError {
    /// Loop search parameters that cannot describe a window.
    #[error(
        "invalid loop window: {frequency} Hz at {sample_rate} Hz between {min_secs}s and {max_secs}s"
    )]
    InvalidLoopWindow {
        frequency: f64,
        sample_rate: u32,
        min_secs: f64,
        max_secs: f64,
    },

    /// The window is too narrow to hold a whole number of cycles.
    #[error(
        "no loop candidate for {frequency} Hz at {sample_rate} Hz between {min_secs}s and {max_secs}s"
    )]
    NoLoopCandidate {
        frequency: f64,
        sample_rate: u32,
        min_secs: f64,
        max_secs: f64,
    },

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("invalid configuration for note {note}: {reason}")]
    Configuration { note: u8, reason: String },

    #[error("note {0} has no render parameters")]
    UnknownNote(u8),

    /// `note` is filled in once the loop is cut for a specific note.
    #[error(
        "{}degenerate loop at sample {start}: loop length is {length} samples",
        note_prefix(.note)
    )]
    DegenerateLoop {
        note: Option<u8>,
        start: usize,
        length: usize,
    },

    #[error(
        "{}loop [{start}, {end}) lies outside {available} synthesized samples",
        note_prefix(.note)
    )]
    LoopOutOfRange {
        note: Option<u8>,
        start: usize,
        end: usize,
        available: usize,
    },

    #[error("{path}: sample rate is {found} Hz, expected {expected} Hz")]
    SampleRateMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("{path}: {found} channels, expected {expected}")]
    ChannelMismatch {
        path: PathBuf,
        found: u16,
        expected: u16,
    },

    #[error("WAV: {0}")]
    Wav(#[from] hound::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl RenderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RenderError::InvalidLoopWindow { .. }
            | RenderError::NoLoopCandidate { .. }
            | RenderError::InvalidSettings(_)
            | RenderError::Configuration { .. }
            | RenderError::UnknownNote(_) => ErrorKind::Configuration,
            RenderError::DegenerateLoop { .. } | RenderError::LoopOutOfRange { .. } => {
                ErrorKind::DegenerateLoop
            }
            RenderError::SampleRateMismatch { .. }
            | RenderError::ChannelMismatch { .. }
            | RenderError::Wav(_)
            | RenderError::Json(_)
            | RenderError::Io(_) => ErrorKind::Input,
        }
    }

    /// Attaches `midi` to loop errors that were raised without one.
    pub fn with_note(mut self, midi: u8) -> Self {
        match &mut self {
            RenderError::DegenerateLoop { note, .. } | RenderError::LoopOutOfRange { note, .. } => {
                note.get_or_insert(midi);
            }
            _ => {}
        }
        self
    }

    pub(crate) fn configuration(note: u8, reason: impl Into<String>) -> Self {
        RenderError::Configuration {
            note,
            reason: reason.into(),
        }
    }
}

fn note_prefix(note: &Option<u8>) -> String {
    note.map_or_else(String::new, |midi| format!("note {midi}: "))
}

/// Result type for render operations
pub type Result<T> = std::result::Result<T, RenderError>;
