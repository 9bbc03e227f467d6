//! Pitch naming for the ensemble's seven-note scale.

/// Pitch classes the melody generator draws from (C minor / aeolian colour).
pub const SCALE: [&str; 7] = ["C", "D", "Eb", "F", "G", "Ab", "Bb"];

/// Reduce a possibly out-of-range scale degree into `0..SCALE.len()`.
pub fn reduce_degree(degree: i32) -> usize {
    degree.rem_euclid(SCALE.len() as i32) as usize
}

/// Build a note name such as `"Eb3"` from a scale degree and octave.
pub fn pitch_name(degree: i32, octave: i32) -> String {
    format!("{}{}", SCALE[reduce_degree(degree)], octave)
}

/// Parse a note name (`C4`, `F#3`, `Bb-1`) into a MIDI note number.
///
/// `C4` is 60. Returns `None` for anything that is not a letter, an optional
/// `#`/`b` accidental and an integer octave.
pub fn note_to_midi(note: &str) -> Option<i32> {
    let mut chars = note.chars();
    let semitone = match chars.next()? {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let rest = chars.as_str();
    let (accidental, octave) = match rest.as_bytes().first() {
        Some(b'#') => (1, &rest[1..]),
        Some(b'b') => (-1, &rest[1..]),
        _ => (0, rest),
    };

    let octave: i32 = octave.parse().ok()?;
    Some((octave + 1) * 12 + semitone + accidental)
}

/// Frequency of a MIDI note, `tuning_pitch` being the frequency of A4.
pub fn midi_to_frequency(midi: i32, tuning_pitch: f64) -> f64 {
    tuning_pitch * 2.0_f64.powf((midi as f64 - 69.0) / 12.0)
}
