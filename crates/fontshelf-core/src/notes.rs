//! MIDI note numbers and note names.
//!
//! Names use scientific pitch notation with middle C as `C4` (MIDI 60), so the
//! MIDI range runs from `C-1` to `G9`.

use crate::error::{FontshelfError, Result};
use regex::Regex;
use std::ops::RangeInclusive;
use std::sync::LazyLock;

/// Sharp-spelled pitch class names, indexed by `midi % 12`.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Highest valid MIDI note number.
pub const MAX_NOTE: u8 = 127;

/// Octave assumed when a name carries none (`"C"` means `C4`).
pub const DEFAULT_OCTAVE: i32 = 4;

/// Octaves that hold MIDI notes, `C-1` through `G9`.
pub const OCTAVE_RANGE: RangeInclusive<i32> = -1..=9;

static NOTE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Ga-g])([#b]?)(-?\d+)?$").unwrap());

/// Format a MIDI note number as a name, e.g. `60` -> `"C4"`.
pub fn note_name(note: u8) -> String {
    let octave = i32::from(note) / 12 - 1;
    format!("{}{}", NOTE_NAMES[usize::from(note % 12)], octave)
}

/// Pitch class (0..12) of a bare note letter with optional accidental.
///
/// Accepts both sharps and flats: `"C#"` and `"Db"` are both 1.
pub fn pitch_class(name: &str) -> Result<u8> {
    let captures = NOTE_NAME
        .captures(name.trim())
        .filter(|c| c.get(3).is_none())
        .ok_or_else(|| FontshelfError::validation("key", format!("invalid pitch class '{name}'")))?;
    Ok(semitone_offset(&captures[1], &captures[2]).rem_euclid(12) as u8)
}

/// Parse a note name such as `"C4"`, `"G#3"`, `"Bb5"` or `"C-1"`.
///
/// A missing octave defaults to [`DEFAULT_OCTAVE`].
pub fn parse_note_name(name: &str) -> Result<u8> {
    let trimmed = name.trim();
    let captures = NOTE_NAME
        .captures(trimmed)
        .ok_or_else(|| FontshelfError::validation("note", format!("invalid note name '{name}'")))?;

    // Cb4 and B#3 cross the octave boundary, so the offset is not wrapped.
    let class = semitone_offset(&captures[1], &captures[2]);
    let octave = match captures.get(3) {
        Some(m) => m.as_str().parse::<i32>().map_err(|_| {
            FontshelfError::validation("note", format!("invalid octave in '{name}'"))
        })?,
        None => DEFAULT_OCTAVE,
    };
    if !OCTAVE_RANGE.contains(&octave) {
        return Err(FontshelfError::validation(
            "note",
            format!("octave {octave} in '{name}' is outside the MIDI range"),
        ));
    }

    let midi = (octave + 1) * 12 + class;
    u8::try_from(midi)
        .ok()
        .filter(|n| *n <= MAX_NOTE)
        .ok_or_else(|| FontshelfError::validation("note", format!("'{name}' is outside the MIDI range")))
}

fn semitone_offset(letter: &str, accidental: &str) -> i32 {
    let base: i32 = match letter.to_ascii_uppercase().as_str() {
        "C" => 0,
        "D" => 2,
        "E" => 4,
        "F" => 5,
        "G" => 7,
        "A" => 9,
        _ => 11,
    };
    let shift = match accidental {
        "#" => 1,
        "b" => -1,
        _ => 0,
    };
    base + shift
}
