//! # Partial Module
//!
//! Sinusoidal tracks produced by partial analysis. A [`Partial`] is a labeled
//! sequence of [`Breakpoint`]s kept sorted by time; a partial set is simply a
//! `Vec<Partial>` owned by whichever stage is transforming it.

use serde::{Deserialize, Serialize};

/// One point on a partial's frequency/amplitude/bandwidth envelope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    /// Time in seconds.
    pub time: f64,
    /// Frequency in Hz.
    pub frequency: f64,
    /// Linear amplitude.
    pub amplitude: f64,
    /// Noise energy fraction (0.0 is a pure sinusoid).
    pub bandwidth: f64,
}

impl Breakpoint {
    pub fn new(time: f64, frequency: f64, amplitude: f64) -> Self {
        Self {
            time,
            frequency,
            amplitude,
            bandwidth: 0.0,
        }
    }
}

/// A labeled sinusoidal track.
///
/// Label 0 means unlabeled, 1 is the fundamental, 2 the first overtone and
/// so on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Partial {
    label: u32,
    breakpoints: Vec<Breakpoint>,
}

/// An unordered collection of partials for one channel or voice.
pub type PartialSet = Vec<Partial>;

impl Partial {
    pub fn new(label: u32) -> Self {
        Self {
            label,
            breakpoints: Vec::new(),
        }
    }

    /// Builds a partial from breakpoints in any order.
    pub fn from_breakpoints(label: u32, mut breakpoints: Vec<Breakpoint>) -> Self {
        breakpoints.sort_by(|a, b| a.time.total_cmp(&b.time));
        breakpoints.dedup_by(|later, earlier| later.time == earlier.time);
        Self { label, breakpoints }
    }

    pub fn label(&self) -> u32 {
        self.label
    }

    pub fn set_label(&mut self, label: u32) {
        self.label = label;
    }

    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    /// Mutable access to the breakpoints. Callers may change anything except
    /// `time`, which must stay in ascending order.
    pub fn breakpoints_mut(&mut self) -> &mut [Breakpoint] {
        &mut self.breakpoints
    }

    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }

    pub fn first(&self) -> Option<&Breakpoint> {
        self.breakpoints.first()
    }

    pub fn last(&self) -> Option<&Breakpoint> {
        self.breakpoints.last()
    }

    pub fn start_time(&self) -> f64 {
        self.first().map_or(0.0, |bp| bp.time)
    }

    pub fn end_time(&self) -> f64 {
        self.last().map_or(0.0, |bp| bp.time)
    }

    pub fn duration(&self) -> f64 {
        self.end_time() - self.start_time()
    }

    /// Inserts a breakpoint in time order, replacing one at the same time.
    pub fn insert(&mut self, breakpoint: Breakpoint) {
        match self
            .breakpoints
            .binary_search_by(|bp| bp.time.total_cmp(&breakpoint.time))
        {
            Ok(i) => self.breakpoints[i] = breakpoint,
            Err(i) => self.breakpoints.insert(i, breakpoint),
        }
    }

    /// The envelope state at `time`, linearly interpolated between the
    /// surrounding breakpoints and held at the nearest end outside the span.
    pub fn breakpoint_at(&self, time: f64) -> Option<Breakpoint> {
        let first = self.first()?;
        let last = self.last()?;
        if time <= first.time {
            return Some(Breakpoint { time, ..*first });
        }
        if time >= last.time {
            return Some(Breakpoint { time, ..*last });
        }
        let upper = self.breakpoints.partition_point(|bp| bp.time <= time);
        let a = &self.breakpoints[upper - 1];
        let b = &self.breakpoints[upper];
        let alpha = (time - a.time) / (b.time - a.time);
        let lerp = |x: f64, y: f64| x + (y - x) * alpha;
        Some(Breakpoint {
            time,
            frequency: lerp(a.frequency, b.frequency),
            amplitude: lerp(a.amplitude, b.amplitude),
            bandwidth: lerp(a.bandwidth, b.bandwidth),
        })
    }

    /// Amplitude at `time`; zero outside the partial's span.
    pub fn amplitude_at(&self, time: f64) -> f64 {
        if self.is_empty() || time < self.start_time() || time > self.end_time() {
            return 0.0;
        }
        self.breakpoint_at(time).map_or(0.0, |bp| bp.amplitude)
    }

    /// Amplitude-weighted mean frequency over all breakpoints.
    ///
    /// Falls back to the plain mean when every amplitude is zero.
    pub fn average_frequency(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let weight: f64 = self.breakpoints.iter().map(|bp| bp.amplitude).sum();
        if weight > 0.0 {
            self.breakpoints
                .iter()
                .map(|bp| bp.frequency * bp.amplitude)
                .sum::<f64>()
                / weight
        } else {
            self.breakpoints.iter().map(|bp| bp.frequency).sum::<f64>()
                / self.breakpoints.len() as f64
        }
    }

    /// Sum of breakpoint amplitudes, used to rank overlapping partials.
    pub fn energy(&self) -> f64 {
        self.breakpoints.iter().map(|bp| bp.amplitude).sum()
    }

    /// Pins every breakpoint to `frequency` with no noise energy.
    pub fn retune(&mut self, frequency: f64) {
        for bp in &mut self.breakpoints {
            bp.frequency = frequency;
            bp.bandwidth = 0.0;
        }
    }

    /// Sets every breakpoint to the same amplitude.
    pub fn freeze_amplitude(&mut self, amplitude: f64) {
        for bp in &mut self.breakpoints {
            bp.amplitude = amplitude;
        }
    }

    /// Keeps only the portion of the partial inside `[start, end]`.
    ///
    /// Boundary breakpoints are interpolated when the partial spans a bound.
    pub fn crop(&mut self, start: f64, end: f64) {
        if self.is_empty() {
            return;
        }
        if self.end_time() < start || self.start_time() > end {
            self.breakpoints.clear();
            return;
        }
        let head = (self.start_time() < start)
            .then(|| self.breakpoint_at(start))
            .flatten();
        let tail = (self.end_time() > end)
            .then(|| self.breakpoint_at(end))
            .flatten();
        self.breakpoints
            .retain(|bp| bp.time >= start && bp.time <= end);
        for bp in head.into_iter().chain(tail) {
            self.insert(bp);
        }
    }
}

/// Piecewise-linear function of time.
///
/// Between points the value is interpolated; outside the covered range it
/// is held at the nearest endpoint. An empty envelope evaluates to zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearEnvelope {
    points: Vec<(f64, f64)>,
}

impl LinearEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a point, replacing any existing point at the same time.
    pub fn insert(&mut self, time: f64, value: f64) {
        match self.points.binary_search_by(|(t, _)| t.total_cmp(&time)) {
            Ok(i) => self.points[i].1 = value,
            Err(i) => self.points.insert(i, (time, value)),
        }
    }

    pub fn value_at(&self, time: f64) -> f64 {
        let (Some(&(t0, v0)), Some(&(t1, v1))) = (self.points.first(), self.points.last()) else {
            return 0.0;
        };
        if time <= t0 {
            return v0;
        }
        if time >= t1 {
            return v1;
        }
        let upper = self.points.partition_point(|(t, _)| *t <= time);
        let (ta, va) = self.points[upper - 1];
        let (tb, vb) = self.points[upper];
        va + (vb - va) * (time - ta) / (tb - ta)
    }
}

impl FromIterator<(f64, f64)> for LinearEnvelope {
    fn from_iter<I: IntoIterator<Item = (f64, f64)>>(iter: I) -> Self {
        let mut envelope = LinearEnvelope::new();
        for (time, value) in iter {
            envelope.insert(time, value);
        }
        envelope
    }
}
