//! # Audio Buffer Module
//!
//! Sample buffers and the small set of in-place operations the renderer
//! applies to them: linear fades, mixing, peak search and interleaving.
//!
//! Stereo buffers are stored interleaved (`[L0, R0, L1, R1, ...]`). While a
//! note is being rendered each channel lives in its own `Vec<Sample>` owned by
//! the stage working on it, and fades mutate only those owned slices.

/// A single audio sample.
pub type Sample = f32;

/// Buffer holding audio samples in interleaved format.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Raw interleaved sample data.
    pub data: Vec<Sample>,
    /// Number of channels (1 = mono, 2 = stereo).
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(data: Vec<Sample>, channels: u16, sample_rate: u32) -> Self {
        Self {
            data,
            channels,
            sample_rate,
        }
    }

    /// Interleaves two channels into a stereo buffer, truncating to the
    /// shorter one.
    pub fn from_stereo(left: &[Sample], right: &[Sample], sample_rate: u32) -> Self {
        let frames = left.len().min(right.len());
        let mut data = Vec::with_capacity(frames * 2);
        for (l, r) in left.iter().zip(right.iter()) {
            data.push(*l);
            data.push(*r);
        }
        Self::new(data, 2, sample_rate)
    }

    /// Number of frames in the buffer (total samples / channels).
    pub fn num_frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.data.len() / usize::from(self.channels)
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.num_frames() as f64 / f64::from(self.sample_rate)
    }

    /// Get a single channel's data as a new vector.
    pub fn channel(&self, channel: u16) -> Vec<Sample> {
        if channel >= self.channels {
            return Vec::new();
        }
        self.data
            .iter()
            .skip(usize::from(channel))
            .step_by(usize::from(self.channels))
            .copied()
            .collect()
    }

    /// Keeps only the first `frames` frames.
    pub fn truncate_frames(&mut self, frames: usize) {
        self.data.truncate(frames * usize::from(self.channels));
    }
}

/// Converts a time in seconds to a sample index, truncating toward zero.
pub fn seconds_to_index(seconds: f64, sample_rate: u32) -> usize {
    (seconds * f64::from(sample_rate)).max(0.0) as usize
}

/// `n` evenly spaced values from `from` to `to`, both ends included.
fn ramp(n: usize, from: f32, to: f32) -> impl Iterator<Item = f32> {
    let span = n.saturating_sub(1).max(1) as f32;
    (0..n).map(move |i| from + (to - from) * (i as f32 / span))
}

/// Applies a linear fade from silence to full level across the slice.
pub fn fade_in(frames: &mut [Sample]) {
    let n = frames.len();
    for (sample, gain) in frames.iter_mut().zip(ramp(n, 0.0, 1.0)) {
        *sample *= gain;
    }
}

/// Applies `passes` linear fades from full level to silence across the slice.
///
/// Each pass multiplies by the same ramp, so two passes give a quadratic
/// curve that drops faster than a single linear fade.
pub fn fade_out(frames: &mut [Sample], passes: u32) {
    let n = frames.len();
    for _ in 0..passes {
        for (sample, gain) in frames.iter_mut().zip(ramp(n, 1.0, 0.0)) {
            *sample *= gain;
        }
    }
}

/// Sums two signals; the result is as long as the longer input.
pub fn mix(a: &[Sample], b: &[Sample]) -> Vec<Sample> {
    let mut result = vec![0.0; a.len().max(b.len())];
    for (out, s) in result.iter_mut().zip(a) {
        *out += *s;
    }
    for (out, s) in result.iter_mut().zip(b) {
        *out += *s;
    }
    result
}

/// Index of the first occurrence of the largest positive sample.
///
/// Returns `None` if no sample is above zero.
pub fn peak_index(frames: &[Sample]) -> Option<usize> {
    let mut peak = None;
    let mut max_value = 0.0;
    for (i, &s) in frames.iter().enumerate() {
        if s > max_value {
            max_value = s;
            peak = Some(i);
        }
    }
    peak
}
