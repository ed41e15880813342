//! WAV input and output via `hound`.
//!
//! Inputs may be 16/24/32-bit integer or 32-bit float; they are converted to
//! `f32` in [-1, 1]. Renders are written as 16-bit PCM.

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::audio::{AudioBuffer, Sample};
use crate::error::{RenderError, Result};
use crate::render::NoteInputs;

/// Reads a WAV file, rejecting any sample rate other than `sample_rate`.
pub fn read_audio(path: impl AsRef<Path>, sample_rate: u32) -> Result<AudioBuffer> {
    let path = path.as_ref();
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    if spec.sample_rate != sample_rate {
        return Err(RenderError::SampleRateMismatch {
            path: path.to_path_buf(),
            found: spec.sample_rate,
            expected: sample_rate,
        });
    }

    let data: Vec<Sample> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    debug!(
        path = %path.display(),
        channels = spec.channels,
        bits = spec.bits_per_sample,
        samples = data.len(),
        "read audio"
    );
    Ok(AudioBuffer::new(data, spec.channels, spec.sample_rate))
}

/// Writes `buffer` as 16-bit PCM, clamping samples to [-1, 1].
pub fn write_audio(path: impl AsRef<Path>, buffer: &AudioBuffer) -> Result<()> {
    let path = path.as_ref();
    let spec = WavSpec {
        channels: buffer.channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &s in &buffer.data {
        let value = (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16;
        writer.write_sample(value)?;
    }
    writer.finalize()?;
    debug!(path = %path.display(), frames = buffer.num_frames(), "wrote audio");
    Ok(())
}

pub fn tonal_path(dir: &Path, midi: u8) -> PathBuf {
    dir.join(format!("tonal-{midi}.wav"))
}

pub fn noise_path(dir: &Path, midi: u8) -> PathBuf {
    dir.join(format!("noise-{midi}.wav"))
}

pub fn result_path(dir: &Path, midi: u8) -> PathBuf {
    dir.join(format!("result-{midi}.wav"))
}

/// Loads `tonal-<midi>.wav` and `noise-<midi>.wav` from `dir`. Both must be
/// stereo at `sample_rate`.
pub fn load_note_inputs(dir: impl AsRef<Path>, midi: u8, sample_rate: u32) -> Result<NoteInputs> {
    let dir = dir.as_ref();
    let tonal = read_stereo(&tonal_path(dir, midi), sample_rate)?;
    let noise = read_stereo(&noise_path(dir, midi), sample_rate)?;
    Ok(NoteInputs { tonal, noise })
}

fn read_stereo(path: &Path, sample_rate: u32) -> Result<AudioBuffer> {
    let buffer = read_audio(path, sample_rate)?;
    if buffer.channels != 2 {
        return Err(RenderError::ChannelMismatch {
            path: path.to_path_buf(),
            found: buffer.channels,
            expected: 2,
        });
    }
    Ok(buffer)
}
