//! # Batch Rendering
//!
//! Renders a list of notes on a small pool of worker threads. Notes share
//! nothing but the read-only renderer, so each worker pulls the next MIDI
//! number from a channel, loads its inputs and renders it in isolation.
//!
//! A failing note is recorded and the batch carries on.

use crossbeam_channel::unbounded;
use serde::Serialize;
use std::thread;
use tracing::{info, warn};

use crate::error::{ErrorKind, RenderError, Result};
use crate::render::{NoteInputs, NoteRenderer, NoteSummary, RenderedNote};
use crate::tracking::PartialEngine;

/// A note that could not be rendered.
#[derive(Debug)]
pub struct NoteFailure {
    pub midi: u8,
    pub error: RenderError,
}

/// Outcome of a batch, both lists in request order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub rendered: Vec<RenderedNote>,
    pub failures: Vec<NoteFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureSummary {
    pub midi: u8,
    pub kind: ErrorKind,
    pub message: String,
}

/// Serializable form of a [`BatchReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub rendered: Vec<NoteSummary>,
    pub failures: Vec<FailureSummary>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            rendered: self.rendered.iter().map(RenderedNote::summary).collect(),
            failures: self
                .failures
                .iter()
                .map(|f| FailureSummary {
                    midi: f.midi,
                    kind: f.error.kind(),
                    message: f.error.to_string(),
                })
                .collect(),
        }
    }
}

/// Renders `notes` using up to `jobs` worker threads.
///
/// `load` supplies the recordings for a note; a load error counts as a
/// failure of that note.
pub fn render_batch<E, L>(renderer: &NoteRenderer<E>, notes: &[u8], load: L, jobs: usize) -> BatchReport
where
    E: PartialEngine + Sync,
    L: Fn(u8) -> Result<NoteInputs> + Sync,
{
    let workers = jobs.clamp(1, notes.len().max(1));
    info!(notes = notes.len(), workers, "starting batch");

    let (job_tx, job_rx) = unbounded::<(usize, u8)>();
    let (result_tx, result_rx) = unbounded::<(usize, u8, Result<RenderedNote>)>();
    for job in notes.iter().copied().enumerate() {
        // The receiver is alive until the end of this function.
        let _ = job_tx.send(job);
    }
    drop(job_tx);

    thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let load = &load;
            scope.spawn(move || {
                for (index, midi) in job_rx.iter() {
                    let outcome = load(midi).and_then(|inputs| renderer.render(midi, &inputs));
                    if result_tx.send((index, midi, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(result_tx);

    let mut outcomes: Vec<(usize, u8, Result<RenderedNote>)> = result_rx.iter().collect();
    outcomes.sort_by_key(|(index, _, _)| *index);

    let mut report = BatchReport::default();
    for (_, midi, outcome) in outcomes {
        match outcome {
            Ok(note) => report.rendered.push(note),
            Err(error) => {
                warn!(midi, kind = ?error.kind(), %error, "note failed");
                report.failures.push(NoteFailure { midi, error });
            }
        }
    }
    info!(
        rendered = report.rendered.len(),
        failed = report.failures.len(),
        "batch finished"
    );
    report
}
