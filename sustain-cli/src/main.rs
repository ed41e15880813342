//! # sustain
//!
//! Command-line frontend for the sustain renderer.
//!
//! - `render`: renders every configured note from `tonal-<midi>.wav` and
//!   `noise-<midi>.wav` into `result-<midi>.wav`
//! - `loops`: prints the best loop lengths for each note, for tuning the
//!   configuration's loop table
//! - `config`: prints the default configuration as JSON

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::thread;
use sustain_core::tuning::{midi_to_frequency, note_name};
use sustain_core::{
    HarmonicTracker, NoteFailure, NoteRenderer, RenderConfig, rank_loop_candidates, render_batch,
    wav,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Renders seamlessly looping sustained notes.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Renders notes from their tonal and noise recordings.
    Render {
        /// Directory holding tonal-<midi>.wav and noise-<midi>.wav.
        #[arg(short, long)]
        input: PathBuf,
        /// Directory that receives result-<midi>.wav.
        #[arg(short, long)]
        output: PathBuf,
        /// JSON configuration; defaults to the built-in piano table.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Notes to render, e.g. 36,40,44. Defaults to every configured note.
        #[arg(short, long, value_delimiter = ',')]
        notes: Option<Vec<u8>>,
        /// Number of notes rendered in parallel.
        #[arg(short, long)]
        jobs: Option<usize>,
        /// Writes a JSON report of stretch estimates, peaks and failures.
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
    /// Prints ranked loop length candidates for each note.
    Loops {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long, value_delimiter = ',')]
        notes: Option<Vec<u8>>,
        /// Overrides the configured sample rate.
        #[arg(short, long)]
        sample_rate: Option<u32>,
        /// Candidates printed per note.
        #[arg(short, long, default_value_t = 5)]
        top: usize,
    },
    /// Prints the default configuration as JSON.
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Render {
            input,
            output,
            config,
            notes,
            jobs,
            report,
        } => render(&input, &output, config.as_deref(), notes, jobs, report.as_deref()),
        Commands::Loops {
            config,
            notes,
            sample_rate,
            top,
        } => loops(config.as_deref(), notes, sample_rate, top),
        Commands::Config => {
            println!("{}", RenderConfig::default().to_json()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<RenderConfig> {
    match path {
        Some(path) => RenderConfig::from_json_file(path)
            .with_context(|| format!("loading configuration {}", path.display())),
        None => {
            let config = RenderConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn render(
    input: &Path,
    output: &Path,
    config: Option<&Path>,
    notes: Option<Vec<u8>>,
    jobs: Option<usize>,
    report_path: Option<&Path>,
) -> Result<()> {
    let config = load_config(config)?;
    let notes = notes.unwrap_or_else(|| config.note_numbers());
    let jobs = jobs.unwrap_or_else(|| thread::available_parallelism().map_or(1, NonZeroUsize::get));
    fs::create_dir_all(output)
        .with_context(|| format!("creating output directory {}", output.display()))?;

    let sample_rate = config.sample_rate;
    let renderer = NoteRenderer::new(config, HarmonicTracker::default());
    let mut report = render_batch(
        &renderer,
        &notes,
        |midi| wav::load_note_inputs(input, midi, sample_rate),
        jobs,
    );

    let rendered = std::mem::take(&mut report.rendered);
    for note in rendered {
        let path = wav::result_path(output, note.midi);
        match wav::write_audio(&path, &note.audio) {
            Ok(()) => {
                info!(midi = note.midi, path = %path.display(), "wrote note");
                report.rendered.push(note);
            }
            Err(error) => report.failures.push(NoteFailure {
                midi: note.midi,
                error,
            }),
        }
    }
    report
        .failures
        .sort_by_key(|failure| notes.iter().position(|&midi| midi == failure.midi));

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report.summary())?;
        fs::write(path, json).with_context(|| format!("writing report {}", path.display()))?;
    }

    for failure in &report.failures {
        error!(midi = failure.midi, "{}", failure.error);
    }
    if !report.is_success() {
        bail!("{} of {} notes failed", report.failures.len(), notes.len());
    }
    Ok(())
}

fn loops(
    config: Option<&Path>,
    notes: Option<Vec<u8>>,
    sample_rate: Option<u32>,
    top: usize,
) -> Result<()> {
    let config = load_config(config)?;
    let notes = notes.unwrap_or_else(|| config.note_numbers());
    let sample_rate = sample_rate.unwrap_or(config.sample_rate);
    let search = config.loop_search;

    for midi in notes {
        let frequency = midi_to_frequency(midi);
        let candidates = rank_loop_candidates(
            frequency,
            sample_rate,
            search.min_duration,
            search.max_duration,
        )
        .with_context(|| format!("searching loops for note {midi}"))?;

        let configured = config
            .notes
            .get(&midi)
            .map_or_else(|| "none".to_string(), |p| p.loop_length.to_string());
        println!(
            "{midi} {} {frequency:.3} Hz (configured loop: {configured})",
            note_name(midi)
        );
        for candidate in candidates.iter().take(top) {
            println!(
                "  {:>9.6}s  {:>10.3} samples  -> {:>6}  ({} cycles, error {:.4})",
                candidate.duration(sample_rate),
                candidate.sample_count,
                candidate.rounded(),
                candidate.cycles,
                candidate.error
            );
        }
    }
    Ok(())
}
