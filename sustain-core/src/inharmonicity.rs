//! # Inharmonicity Module
//!
//! Estimates how far an instrument's overtones are stretched away from exact
//! integer multiples of the fundamental. Stiff strings follow
//!
//! f_k = k * f0 * sqrt(1 + B * k^2)
//!
//! where `B` is the stretch factor.

use linreg::linear_regression;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::partial::Partial;
use crate::tuning;

/// Represents a single measured harmonic of a note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HarmonicMeasurement {
    pub number: u32,    // The harmonic number (n=1, 2, 3...)
    pub frequency: f64, // The measured frequency in Hz
}

/// Outcome of a stretch estimate for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StretchEstimate {
    /// Two-point stretch factor; 0.0 when no overtone was found.
    pub stretch: f64,
    /// The harmonic paired with the fundamental, if any.
    pub reference_harmonic: Option<u32>,
    /// Every harmonic that was located, in ascending order.
    pub harmonics: Vec<HarmonicMeasurement>,
    /// Least-squares stretch over all harmonics, for diagnostics.
    pub fitted_stretch: Option<f64>,
}

impl StretchEstimate {
    fn unstretched(harmonics: Vec<HarmonicMeasurement>) -> Self {
        Self {
            stretch: 0.0,
            reference_harmonic: None,
            harmonics,
            fitted_stretch: None,
        }
    }
}

/// Locates harmonics among analyzed partials and derives a stretch factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StretchEstimator {
    /// Partials shorter than this (seconds) are ignored.
    pub min_duration: f64,
    /// Highest harmonic index searched.
    pub max_harmonic: u32,
}

impl Default for StretchEstimator {
    fn default() -> Self {
        Self {
            min_duration: 0.05,
            max_harmonic: 19,
        }
    }
}

impl StretchEstimator {
    /// Estimates the stretch factor of `partials` around `fundamental` Hz.
    ///
    /// Harmonics are searched in ascending order. Each one found shifts the
    /// matching window for the next by the measured drift, so high overtones
    /// that have wandered more than half a harmonic from `k * f0` are still
    /// caught.
    pub fn estimate(&self, partials: &[Partial], fundamental: f64) -> StretchEstimate {
        let averages: Vec<f64> = partials
            .iter()
            .filter(|p| p.duration() >= self.min_duration)
            .map(Partial::average_frequency)
            .collect();

        let mut harmonics: BTreeMap<u32, f64> = BTreeMap::new();
        let mut error = 0.0;

        for i in 1..=self.max_harmonic {
            let target = f64::from(i);
            let (found_freqs, found_numbers): (Vec<f64>, Vec<f64>) = averages
                .iter()
                .map(|&freq| (freq, freq / fundamental))
                .filter(|&(_, number)| {
                    let shifted = number + error;
                    shifted >= target - 0.5 && shifted <= target + 0.5
                })
                .unzip();

            if !found_freqs.is_empty() {
                harmonics.insert(i, mean(&found_freqs));
                error = target - mean(&found_numbers);
            }
        }

        let measurements: Vec<HarmonicMeasurement> = harmonics
            .iter()
            .map(|(&number, &frequency)| HarmonicMeasurement { number, frequency })
            .collect();

        let Some(&f1) = harmonics.get(&1) else {
            warn!(fundamental, "fundamental not found, using unstretched harmonics");
            return StretchEstimate::unstretched(measurements);
        };

        let Some((&n, &fn_)) = harmonics.range(2..).next_back() else {
            warn!(fundamental, "no overtone found, using unstretched harmonics");
            return StretchEstimate::unstretched(measurements);
        };

        let stretch = compute_stretch_factor(f1, 1, fn_, n);
        let fitted_stretch = fit_stretch_factor(&measurements);
        debug!(
            fundamental,
            measured_fundamental = f1,
            cents = tuning::calculate_cents_deviation(f1, fundamental),
            reference_harmonic = n,
            stretch,
            ?fitted_stretch,
            "stretch estimated"
        );

        StretchEstimate {
            stretch,
            reference_harmonic: Some(n),
            harmonics: measurements,
            fitted_stretch,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Stretch factor implied by two measured harmonics `fm` (number `m`) and
/// `fn_` (number `n`).
///
/// Solves `(f_k / k)^2 = f0^2 * (1 + B k^2)` for `B` using both points.
/// Returns 0.0 when the pair is degenerate.
pub fn compute_stretch_factor(fm: f64, m: u32, fn_: f64, n: u32) -> f64 {
    let m = f64::from(m);
    let n = f64::from(n);
    let a = (fm / m) * (fm / m);
    let b = (fn_ / n) * (fn_ / n);
    let denominator = n * n * a - m * m * b;
    if denominator.abs() < f64::EPSILON || !denominator.is_finite() {
        return 0.0;
    }
    (b - a) / denominator
}

/// Least-squares stretch factor over any number of harmonics.
///
/// Fits `(f_n / n)^2` against `n^2`; the ratio of slope to intercept is `B`.
/// Needs at least three harmonics for a meaningful regression.
pub fn fit_stretch_factor(harmonics: &[HarmonicMeasurement]) -> Option<f64> {
    // x = n^2, y = (f_n / n)^2
    let (xs, ys): (Vec<f64>, Vec<f64>) = harmonics
        .iter()
        .filter(|h| h.number > 0 && h.frequency > 0.0)
        .map(|h| {
            let n = f64::from(h.number);
            let ratio = h.frequency / n;
            (n * n, ratio * ratio)
        })
        .unzip();

    if xs.len() < 3 {
        return None;
    }

    let (slope, intercept) = linear_regression::<_, _, f64>(&xs, &ys).ok()?;
    (intercept.abs() > 1e-6).then(|| slope / intercept)
}

/// Frequency of harmonic `k` of `fundamental` under stretch `stretch`.
pub fn harmonic_frequency(k: f64, fundamental: f64, stretch: f64) -> f64 {
    k * fundamental * (1.0 + stretch * k * k).sqrt()
}

/// Fractional harmonic number of `frequency`, inverting
/// [`harmonic_frequency`].
pub fn harmonic_number(frequency: f64, fundamental: f64, stretch: f64) -> f64 {
    let ratio = frequency / fundamental;
    if stretch.abs() < 1e-12 {
        return ratio;
    }
    // B k^4 + k^2 - ratio^2 = 0, solved for k^2.
    let discriminant = 1.0 + 4.0 * stretch * ratio * ratio;
    if discriminant <= 0.0 {
        return ratio;
    }
    let k_squared = (discriminant.sqrt() - 1.0) / (2.0 * stretch);
    k_squared.max(0.0).sqrt()
}
