//! # Musical Tuning Module
//!
//! Equal temperament helpers shared by the renderer and the loop search.
//! Notes are identified by MIDI number with A4 (MIDI 69) tuned to 440 Hz.

use once_cell::sync::Lazy;

/// Reference pitch of A4 in Hz.
pub const A4_FREQUENCY: f64 = 440.0;

/// MIDI number of A4.
pub const A4_MIDI: u8 = 69;

/// Statically computed names for all 128 MIDI notes ("C-1" to "G9").
static NOTE_NAMES: Lazy<Vec<String>> = Lazy::new(|| {
    const PITCH_CLASSES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    (0..128u8)
        .map(|midi| {
            // MIDI 0 is C-1; the octave number changes at C.
            let octave = i32::from(midi / 12) - 1;
            format!("{}{}", PITCH_CLASSES[usize::from(midi % 12)], octave)
        })
        .collect()
});

/// Fundamental frequency of a MIDI note in equal temperament.
///
/// f = 440 * 2^((midi - 69) / 12)
pub fn midi_to_frequency(midi: u8) -> f64 {
    A4_FREQUENCY * 2.0_f64.powf((f64::from(midi) - f64::from(A4_MIDI)) / 12.0)
}

/// Name of a MIDI note, e.g. "A4" for 69. Values above 127 read as "?".
pub fn note_name(midi: u8) -> &'static str {
    NOTE_NAMES.get(usize::from(midi)).map_or("?", String::as_str)
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values flat.
pub fn calculate_cents_deviation(freq: f64, target_freq: f64) -> f64 {
    1200.0 * (freq / target_freq).log2()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn a4_is_440() {
        assert_relative_eq!(midi_to_frequency(69), 440.0);
        assert_relative_eq!(midi_to_frequency(81), 880.0, epsilon = 1e-9);
        assert_relative_eq!(midi_to_frequency(60), 261.625_565_300_598_6, epsilon = 1e-9);
    }

    #[test]
    fn note_names_cycle_at_c() {
        assert_eq!(note_name(69), "A4");
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(36), "C2");
        assert_eq!(note_name(0), "C-1");
        assert_eq!(note_name(200), "?");
    }

    #[test]
    fn one_semitone_is_one_hundred_cents() {
        let cents = calculate_cents_deviation(midi_to_frequency(70), midi_to_frequency(69));
        assert_relative_eq!(cents, 100.0, epsilon = 1e-9);
    }
}
