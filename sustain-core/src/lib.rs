//! The core of the sustain renderer.
//!
//! Turns short instrument recordings into long, seamlessly looping notes:
//! partial analysis and inharmonicity estimation, band splitting, loop
//! length search, loop synthesis and the per-note render pipeline. The crate
//! is headless; the command-line frontend lives in `sustain-cli`.

pub mod audio;
pub mod bands;
pub mod batch;
pub mod config;
pub mod error;
pub mod fft;
pub mod inharmonicity;
pub mod loop_search;
pub mod looping;
pub mod partial;
pub mod render;
pub mod tracking;
pub mod tuning;
pub mod wav;

#[cfg(test)]
mod test_support;

pub use audio::{AudioBuffer, Sample};
pub use batch::{BatchReport, BatchSummary, NoteFailure, render_batch};
pub use config::{NoteParameters, RenderConfig};
pub use error::{ErrorKind, RenderError, Result};
pub use loop_search::{LoopCandidate, best_loop_candidate, rank_loop_candidates};
pub use partial::{Breakpoint, Partial, PartialSet};
pub use render::{NoteInputs, NoteRenderer, RenderedNote};
pub use tracking::{HarmonicTracker, PartialEngine};
