//! Short-time Fourier analysis and frame-to-frame peak tracking.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audio::Sample;
use crate::fft::{SpectralPeak, SpectrumAnalyzer, interpolate_peak};
use crate::partial::{Breakpoint, Partial, PartialSet};

/// Parameters of one analysis pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisParams {
    /// Minimum distance in Hz between two peaks in the same frame.
    pub resolution_hz: f64,
    /// Main-lobe width of the analysis window in Hz.
    pub window_width_hz: f64,
    /// Largest frequency change in Hz a track may make between frames.
    pub freq_drift_hz: f64,
    /// Peaks quieter than this (dBFS) are ignored.
    pub amp_floor_db: f64,
}

impl AnalysisParams {
    /// Hann window length whose main lobe spans `window_width_hz`.
    pub fn window_len(&self, sample_rate: u32) -> usize {
        let len = (4.0 * f64::from(sample_rate) / self.window_width_hz).round();
        (len.max(16.0)) as usize
    }
}

struct Track {
    partial: Partial,
    frequency: f64,
}

/// Extracts unlabeled partials from a mono signal.
pub fn analyze(samples: &[Sample], sample_rate: u32, params: &AnalysisParams) -> PartialSet {
    let window_len = params.window_len(sample_rate);
    if samples.len() < window_len || sample_rate == 0 {
        return Vec::new();
    }
    let hop = (window_len / 4).max(1);
    let mut analyzer = SpectrumAnalyzer::new(window_len, (window_len * 4).next_power_of_two());
    let amp_floor = 10.0_f64.powf(params.amp_floor_db / 20.0);
    let rate = f64::from(sample_rate);

    let mut active: Vec<Track> = Vec::new();
    let mut finished: PartialSet = Vec::new();

    for start in (0..=samples.len() - window_len).step_by(hop) {
        let time = (start as f64 + window_len as f64 / 2.0) / rate;
        let magnitudes = analyzer.magnitudes(&samples[start..start + window_len]);
        let peaks = pick_peaks(&magnitudes, analyzer.fft_len(), sample_rate, amp_floor, params);

        let mut continued: Vec<Track> = Vec::with_capacity(peaks.len());
        for peak in peaks {
            let nearest = active
                .iter()
                .enumerate()
                .map(|(i, track)| (i, (track.frequency - peak.frequency).abs()))
                .filter(|&(_, distance)| distance <= params.freq_drift_hz)
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(i, _)| i);

            let breakpoint = Breakpoint::new(time, peak.frequency, peak.amplitude);
            match nearest {
                Some(i) => {
                    let mut track = active.swap_remove(i);
                    track.partial.insert(breakpoint);
                    track.frequency = peak.frequency;
                    continued.push(track);
                }
                None => {
                    let mut partial = Partial::new(0);
                    partial.insert(breakpoint);
                    continued.push(Track {
                        partial,
                        frequency: peak.frequency,
                    });
                }
            }
        }

        // Tracks that found no peak in this frame are over.
        finished.extend(active.drain(..).map(|track| track.partial));
        active = continued;
    }
    finished.extend(active.into_iter().map(|track| track.partial));
    finished.retain(|p| p.len() >= 2);

    debug!(
        partials = finished.len(),
        window_len, hop, "analysis complete"
    );
    finished
}

/// Local spectral maxima above the floor, loudest first, with peaks closer
/// than the resolution to a louder one removed.
fn pick_peaks(
    magnitudes: &[f32],
    fft_len: usize,
    sample_rate: u32,
    amp_floor: f64,
    params: &AnalysisParams,
) -> Vec<SpectralPeak> {
    let mut candidates: Vec<SpectralPeak> = (1..magnitudes.len().saturating_sub(1))
        .filter(|&k| magnitudes[k] > magnitudes[k - 1] && magnitudes[k] >= magnitudes[k + 1])
        .filter_map(|k| interpolate_peak(magnitudes, k, fft_len, sample_rate))
        .filter(|peak| peak.amplitude >= amp_floor && peak.frequency > 0.0)
        .collect();
    candidates.sort_by(|a, b| b.amplitude.total_cmp(&a.amplitude));

    let mut accepted: Vec<SpectralPeak> = Vec::with_capacity(candidates.len());
    for peak in candidates {
        if accepted
            .iter()
            .all(|kept| (kept.frequency - peak.frequency).abs() >= params.resolution_hz)
        {
            accepted.push(peak);
        }
    }
    accepted
}
