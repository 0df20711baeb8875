//! Scales, chords and style profiles.

use crate::error::{FontshelfError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// General MIDI percussion keys used by the drum patterns.
pub const KICK: u8 = 36;
pub const SNARE: u8 = 38;
pub const CLOSED_HAT: u8 = 42;
pub const OPEN_HAT: u8 = 46;

/// Semitone offsets of the major-scale degrees I..VII.
const DEGREE_OFFSETS: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];

/// Semitones above the key for a 1-based scale degree.
pub fn degree_offset(degree: u8) -> u8 {
    usize::from(degree)
        .checked_sub(1)
        .and_then(|i| DEGREE_OFFSETS.get(i))
        .copied()
        .unwrap_or(0)
}

/// Transpose `root` by each interval, dropping notes beyond the MIDI range.
fn stack(root: u8, intervals: &[u8]) -> Vec<u8> {
    intervals
        .iter()
        .filter_map(|i| root.checked_add(*i))
        .filter(|n| *n <= crate::notes::MAX_NOTE)
        .collect()
}

fn canonical(s: &str) -> String {
    s.trim().to_lowercase().replace(['-', ' '], "_")
}

// ============================================================================
// Scales
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleType {
    #[default]
    Major,
    Minor,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Locrian,
    PentatonicMajor,
    PentatonicMinor,
    Blues,
    Chromatic,
}

impl ScaleType {
    pub const ALL: [ScaleType; 11] = [
        ScaleType::Major,
        ScaleType::Minor,
        ScaleType::Dorian,
        ScaleType::Phrygian,
        ScaleType::Lydian,
        ScaleType::Mixolydian,
        ScaleType::Locrian,
        ScaleType::PentatonicMajor,
        ScaleType::PentatonicMinor,
        ScaleType::Blues,
        ScaleType::Chromatic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleType::Major => "major",
            ScaleType::Minor => "minor",
            ScaleType::Dorian => "dorian",
            ScaleType::Phrygian => "phrygian",
            ScaleType::Lydian => "lydian",
            ScaleType::Mixolydian => "mixolydian",
            ScaleType::Locrian => "locrian",
            ScaleType::PentatonicMajor => "pentatonic_major",
            ScaleType::PentatonicMinor => "pentatonic_minor",
            ScaleType::Blues => "blues",
            ScaleType::Chromatic => "chromatic",
        }
    }

    pub fn intervals(&self) -> &'static [u8] {
        match self {
            ScaleType::Major => &[0, 2, 4, 5, 7, 9, 11],
            ScaleType::Minor => &[0, 2, 3, 5, 7, 8, 10],
            ScaleType::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            ScaleType::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            ScaleType::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            ScaleType::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            ScaleType::Locrian => &[0, 1, 3, 5, 6, 8, 10],
            ScaleType::PentatonicMajor => &[0, 2, 4, 7, 9],
            ScaleType::PentatonicMinor => &[0, 3, 5, 7, 10],
            ScaleType::Blues => &[0, 3, 5, 6, 7, 10],
            ScaleType::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
        }
    }

    /// One octave of the scale starting at `root`.
    pub fn notes(&self, root: u8) -> Vec<u8> {
        stack(root, self.intervals())
    }
}

impl fmt::Display for ScaleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScaleType {
    type Err = FontshelfError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = canonical(s);
        Self::ALL
            .into_iter()
            .find(|scale| scale.as_str() == wanted)
            .ok_or_else(|| FontshelfError::validation("scale", format!("unknown scale '{s}'")))
    }
}

// ============================================================================
// Chords
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChordType {
    Major,
    Minor,
    Diminished,
    Augmented,
    Dominant7th,
    Major7th,
    Minor7th,
    HalfDiminished7th,
    Diminished7th,
    Suspended4th,
    Suspended2nd,
    Sixth,
    Minor6th,
    Ninth,
    Minor9th,
    Power,
}

impl ChordType {
    pub const ALL: [ChordType; 16] = [
        ChordType::Major,
        ChordType::Minor,
        ChordType::Diminished,
        ChordType::Augmented,
        ChordType::Dominant7th,
        ChordType::Major7th,
        ChordType::Minor7th,
        ChordType::HalfDiminished7th,
        ChordType::Diminished7th,
        ChordType::Suspended4th,
        ChordType::Suspended2nd,
        ChordType::Sixth,
        ChordType::Minor6th,
        ChordType::Ninth,
        ChordType::Minor9th,
        ChordType::Power,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChordType::Major => "major",
            ChordType::Minor => "minor",
            ChordType::Diminished => "diminished",
            ChordType::Augmented => "augmented",
            ChordType::Dominant7th => "dominant_7th",
            ChordType::Major7th => "major_7th",
            ChordType::Minor7th => "minor_7th",
            ChordType::HalfDiminished7th => "half_diminished_7th",
            ChordType::Diminished7th => "diminished_7th",
            ChordType::Suspended4th => "suspended_4th",
            ChordType::Suspended2nd => "suspended_2nd",
            ChordType::Sixth => "sixth",
            ChordType::Minor6th => "minor_6th",
            ChordType::Ninth => "ninth",
            ChordType::Minor9th => "minor_9th",
            ChordType::Power => "power",
        }
    }

    pub fn intervals(&self) -> &'static [u8] {
        match self {
            ChordType::Major => &[0, 4, 7],
            ChordType::Minor => &[0, 3, 7],
            ChordType::Diminished => &[0, 3, 6],
            ChordType::Augmented => &[0, 4, 8],
            ChordType::Dominant7th => &[0, 4, 7, 10],
            ChordType::Major7th => &[0, 4, 7, 11],
            ChordType::Minor7th => &[0, 3, 7, 10],
            ChordType::HalfDiminished7th => &[0, 3, 6, 10],
            ChordType::Diminished7th => &[0, 3, 6, 9],
            ChordType::Suspended4th => &[0, 5, 7],
            ChordType::Suspended2nd => &[0, 2, 7],
            ChordType::Sixth => &[0, 4, 7, 9],
            ChordType::Minor6th => &[0, 3, 7, 9],
            ChordType::Ninth => &[0, 4, 7, 10, 14],
            ChordType::Minor9th => &[0, 3, 7, 10, 14],
            ChordType::Power => &[0, 7],
        }
    }

    pub fn notes(&self, root: u8) -> Vec<u8> {
        stack(root, self.intervals())
    }
}

impl fmt::Display for ChordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChordType {
    type Err = FontshelfError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = canonical(s);
        Self::ALL
            .into_iter()
            .find(|chord| chord.as_str() == wanted)
            .ok_or_else(|| FontshelfError::validation("chord", format!("unknown chord '{s}'")))
    }
}

// ============================================================================
// Styles
// ============================================================================

/// A chord on a scale degree (1 = I).
pub type ProgressionStep = (u8, ChordType);

/// Four-chord progression, repeated across the measures.
pub type Progression = [ProgressionStep; 4];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BassPattern {
    /// One note per chord.
    Simple,
    /// Four steps per chord, root first.
    Walking,
    /// Four steps cycling the chord tones.
    Arpeggiated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrumPattern {
    Basic,
    Rock,
    Jazz,
}

impl DrumPattern {
    pub const STEPS: usize = 8;

    /// Eight-step hit grid per percussion key.
    pub fn grid(&self) -> &'static [(u8, [bool; 8])] {
        const X: bool = true;
        const O: bool = false;
        match self {
            DrumPattern::Basic => &[
                (KICK, [X, O, O, O, X, O, O, O]),
                (SNARE, [O, O, X, O, O, O, X, O]),
                (CLOSED_HAT, [X, X, X, X, X, X, X, X]),
            ],
            DrumPattern::Rock => &[
                (KICK, [X, O, O, X, O, X, O, O]),
                (SNARE, [O, O, X, O, O, O, X, O]),
                (CLOSED_HAT, [X, X, X, X, X, X, X, X]),
            ],
            DrumPattern::Jazz => &[
                (KICK, [X, O, O, O, X, O, O, O]),
                (SNARE, [O, O, X, O, O, O, X, O]),
                (CLOSED_HAT, [X, O, X, O, X, O, X, O]),
                (OPEN_HAT, [O, X, O, X, O, X, O, X]),
            ],
        }
    }

    pub fn velocity(key: u8) -> u8 {
        if key == KICK || key == SNARE {
            100
        } else {
            80
        }
    }
}

/// General MIDI programs for the pitched parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Programs {
    pub melody: u8,
    pub chords: u8,
    pub bass: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Pop,
    Rock,
    Jazz,
    Classical,
}

impl Style {
    pub const ALL: [Style; 4] = [Style::Pop, Style::Rock, Style::Jazz, Style::Classical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Pop => "pop",
            Style::Rock => "rock",
            Style::Jazz => "jazz",
            Style::Classical => "classical",
        }
    }

    pub fn progressions(&self) -> &'static [Progression] {
        use ChordType::*;
        match self {
            Style::Pop => &[
                [(1, Major), (4, Major), (5, Major), (5, Major)],
                [(1, Major), (5, Major), (6, Minor), (4, Major)],
                [(1, Major), (4, Major), (5, Major), (1, Major)],
            ],
            Style::Rock => &[
                [(1, Major), (5, Major), (6, Minor), (4, Major)],
                [(1, Major), (4, Major), (1, Major), (5, Major)],
                [(1, Power), (5, Power), (6, Power), (4, Power)],
            ],
            Style::Jazz => &[
                [(2, Minor7th), (5, Dominant7th), (1, Major7th), (1, Major7th)],
                [(1, Major7th), (4, Dominant7th), (3, Minor7th), (6, Minor7th)],
                [(2, Minor7th), (5, Dominant7th), (1, Major7th), (6, Minor7th)],
            ],
            Style::Classical => &[
                [(1, Major), (4, Major), (5, Major), (1, Major)],
                [(1, Major), (5, Major), (6, Minor), (3, Minor)],
                [(1, Major), (4, Major), (5, Dominant7th), (1, Major)],
            ],
        }
    }

    pub fn bass_pattern(&self) -> BassPattern {
        match self {
            Style::Jazz => BassPattern::Walking,
            Style::Rock => BassPattern::Arpeggiated,
            Style::Pop | Style::Classical => BassPattern::Simple,
        }
    }

    /// `None` for styles played without drums.
    pub fn drum_pattern(&self) -> Option<DrumPattern> {
        match self {
            Style::Pop => Some(DrumPattern::Basic),
            Style::Rock => Some(DrumPattern::Rock),
            Style::Jazz => Some(DrumPattern::Jazz),
            Style::Classical => None,
        }
    }

    pub fn programs(&self) -> Programs {
        let (melody, chords, bass) = match self {
            Style::Pop => (0, 0, 33),
            Style::Rock => (29, 29, 33),
            Style::Jazz => (66, 0, 32),
            Style::Classical => (73, 48, 43),
        };
        Programs { melody, chords, bass }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Style {
    type Err = FontshelfError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = canonical(s);
        Self::ALL
            .into_iter()
            .find(|style| style.as_str() == wanted)
            .ok_or_else(|| FontshelfError::validation("style", format!("unknown style '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_tables() {
        assert_eq!(ScaleType::ALL.len(), 11);
        assert_eq!(ScaleType::Major.notes(60), vec![60, 62, 64, 65, 67, 69, 71]);
        assert_eq!(ScaleType::Blues.intervals().len(), 6);
        assert_eq!(ScaleType::Chromatic.intervals().len(), 12);
        assert_eq!("Pentatonic-Minor".parse::<ScaleType>().unwrap(), ScaleType::PentatonicMinor);
        assert!("bebop".parse::<ScaleType>().is_err());
    }

    #[test]
    fn test_chord_tables() {
        assert_eq!(ChordType::ALL.len(), 16);
        assert_eq!(ChordType::Major.notes(48), vec![48, 52, 55]);
        assert_eq!(ChordType::Minor9th.notes(50), vec![50, 53, 57, 60, 64]);
        assert_eq!(ChordType::Power.notes(40), vec![40, 47]);
        assert_eq!("dominant 7th".parse::<ChordType>().unwrap(), ChordType::Dominant7th);
    }

    #[test]
    fn test_notes_stay_in_midi_range() {
        assert_eq!(ChordType::Ninth.notes(120), vec![120, 124, 127]);
    }

    #[test]
    fn test_degree_offsets() {
        assert_eq!(degree_offset(1), 0);
        assert_eq!(degree_offset(5), 7);
        assert_eq!(degree_offset(7), 11);
        assert_eq!(degree_offset(0), 0);
        assert_eq!(degree_offset(9), 0);
    }

    #[test]
    fn test_style_profiles() {
        for style in Style::ALL {
            assert_eq!(style.progressions().len(), 3);
        }
        assert_eq!(Style::Classical.drum_pattern(), None);
        assert_eq!(Style::Jazz.bass_pattern(), BassPattern::Walking);
        assert_eq!(Style::Rock.programs(), Programs { melody: 29, chords: 29, bass: 33 });
        assert_eq!("JAZZ".parse::<Style>().unwrap(), Style::Jazz);
        assert!("polka".parse::<Style>().is_err());
    }

    #[test]
    fn test_drum_grid() {
        let jazz = DrumPattern::Jazz.grid();
        assert_eq!(jazz.len(), 4);
        assert!(jazz.iter().any(|(key, _)| *key == OPEN_HAT));
        assert_eq!(DrumPattern::velocity(KICK), 100);
        assert_eq!(DrumPattern::velocity(CLOSED_HAT), 80);
    }
}
