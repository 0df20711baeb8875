//! Random composition from a key, scale, tempo and style.

use super::theory::{degree_offset, BassPattern, ChordType, DrumPattern, ScaleType, Style};
use crate::error::{FontshelfError, Result};
use crate::notes::{note_name, NOTE_NAMES};
use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::debug;

/// MIDI channel index of the General MIDI percussion channel (channel 10).
pub const DRUM_CHANNEL: u8 = 9;

/// Accepted tempos in beats per minute. The slow end keeps the MIDI tempo
/// meta event within its 24 bits.
pub const MIN_TEMPO: f64 = 20.0;
pub const MAX_TEMPO: f64 = 400.0;

const BEATS_PER_MEASURE: f64 = 4.0;
const MELODY_NOTES_PER_MEASURE: usize = 8;
const MELODY_OCTAVE_ROOT: u8 = 60;
const CHORD_OCTAVE_ROOT: u8 = 48;
const CHORD_VELOCITY: u8 = 80;

/// What to compose.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionRequest {
    /// Pitch class of the key, 0 (C) to 11 (B).
    pub key: u8,
    pub scale: ScaleType,
    /// Beats per minute.
    pub tempo: f64,
    pub measures: u32,
    pub style: Style,
}

impl Default for CompositionRequest {
    fn default() -> Self {
        Self {
            key: 0,
            scale: ScaleType::Major,
            tempo: 120.0,
            measures: 4,
            style: Style::Pop,
        }
    }
}

impl CompositionRequest {
    pub fn validate(&self) -> Result<()> {
        if self.key > 11 {
            return Err(FontshelfError::validation("key", format!("pitch class {} out of range", self.key)));
        }
        if !(MIN_TEMPO..=MAX_TEMPO).contains(&self.tempo) {
            return Err(FontshelfError::validation(
                "tempo",
                format!("must be between {MIN_TEMPO} and {MAX_TEMPO} BPM, got {}", self.tempo),
            ));
        }
        if self.measures == 0 {
            return Err(FontshelfError::validation("measures", "must be at least 1"));
        }
        Ok(())
    }

    pub fn key_name(&self) -> &'static str {
        NOTE_NAMES[usize::from(self.key % 12)]
    }

    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.tempo
    }

    pub fn measure_seconds(&self) -> f64 {
        self.seconds_per_beat() * BEATS_PER_MEASURE
    }
}

/// A single note, timed in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    pub key: u8,
    pub start: f64,
    pub duration: f64,
    pub velocity: u8,
}

impl NoteEvent {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartRole {
    Melody,
    Chords,
    Bass,
    Drums,
}

impl PartRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartRole::Melody => "melody",
            PartRole::Chords => "chords",
            PartRole::Bass => "bass",
            PartRole::Drums => "drums",
        }
    }
}

/// One instrument track.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub role: PartRole,
    pub program: u8,
    pub channel: u8,
    pub notes: Vec<NoteEvent>,
}

/// A chord placed in time.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordEvent {
    pub degree: u8,
    pub chord: ChordType,
    pub notes: Vec<u8>,
    pub start: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub request: CompositionRequest,
    pub chords: Vec<ChordEvent>,
    pub parts: Vec<Part>,
}

impl Composition {
    pub fn part(&self, role: PartRole) -> Option<&Part> {
        self.parts.iter().find(|p| p.role == role)
    }

    /// End of the last sounding note.
    pub fn duration(&self) -> f64 {
        self.parts
            .iter()
            .flat_map(|p| p.notes.iter().map(NoteEvent::end))
            .fold(0.0, f64::max)
    }

    pub fn note_count(&self) -> usize {
        self.parts.iter().map(|p| p.notes.len()).sum()
    }
}

/// Compose a piece for `request`, drawing every random choice from `rng`.
pub fn generate<R: Rng + ?Sized>(request: &CompositionRequest, rng: &mut R) -> Result<Composition> {
    request.validate()?;
    let style = request.style;
    let programs = style.programs();

    let progression = style
        .progressions()
        .choose(rng)
        .ok_or_else(|| FontshelfError::Other(format!("style {style} has no progressions")))?;

    let chords = chord_events(request, progression);
    let mut parts = vec![
        Part {
            role: PartRole::Melody,
            program: programs.melody,
            channel: 0,
            notes: melody(request, rng),
        },
        Part {
            role: PartRole::Chords,
            program: programs.chords,
            channel: 1,
            notes: chords
                .iter()
                .flat_map(|c| {
                    c.notes.iter().map(|key| NoteEvent {
                        key: *key,
                        start: c.start,
                        duration: c.duration,
                        velocity: CHORD_VELOCITY,
                    })
                })
                .collect(),
        },
        Part {
            role: PartRole::Bass,
            program: programs.bass,
            channel: 2,
            notes: bass_line(&chords, style.bass_pattern(), rng),
        },
    ];

    if let Some(pattern) = style.drum_pattern() {
        parts.push(Part {
            role: PartRole::Drums,
            program: 0,
            channel: DRUM_CHANNEL,
            notes: drums(request, pattern),
        });
    }

    let composition = Composition {
        request: request.clone(),
        chords,
        parts,
    };
    debug!(
        "Composed {} {} in {} ({} measures, {} notes, starting on {})",
        request.style,
        request.scale,
        request.key_name(),
        request.measures,
        composition.note_count(),
        composition
            .chords
            .first()
            .and_then(|c| c.notes.first())
            .map(|n| note_name(*n))
            .unwrap_or_default()
    );
    Ok(composition)
}

fn chord_events(request: &CompositionRequest, progression: &[(u8, ChordType)]) -> Vec<ChordEvent> {
    let measure = request.measure_seconds();
    let key_root = CHORD_OCTAVE_ROOT + request.key;
    (0..request.measures as usize)
        .filter_map(|m| {
            let (degree, chord) = *progression.get(m % progression.len().max(1))?;
            Some(ChordEvent {
                degree,
                chord,
                notes: chord.notes(key_root + degree_offset(degree)),
                start: m as f64 * measure,
                duration: measure,
            })
        })
        .collect()
}

fn melody<R: Rng + ?Sized>(request: &CompositionRequest, rng: &mut R) -> Vec<NoteEvent> {
    let scale = request.scale.notes(MELODY_OCTAVE_ROOT + request.key);
    let count = request.measures as usize * MELODY_NOTES_PER_MEASURE;

    let mut notes = Vec::with_capacity(count);
    let mut time = 0.0;
    for _ in 0..count {
        let Some(key) = scale.choose(rng).copied() else {
            break;
        };
        let duration = (rng.random_range(0.1..=0.5_f64) * 100.0).round() / 100.0;
        notes.push(NoteEvent {
            key,
            start: time,
            duration,
            velocity: rng.random_range(70..=100),
        });
        time += duration;
    }
    notes
}

fn bass_line<R: Rng + ?Sized>(chords: &[ChordEvent], pattern: BassPattern, rng: &mut R) -> Vec<NoteEvent> {
    let mut notes = Vec::new();
    for chord in chords {
        let tones: Vec<u8> = chord.notes.iter().map(|n| n.saturating_sub(12)).collect();
        let Some(&root) = tones.iter().min() else {
            continue;
        };
        let step = chord.duration / 4.0;
        let at = |i: usize| chord.start + i as f64 * step;

        match pattern {
            BassPattern::Simple => notes.push(NoteEvent {
                key: root,
                start: chord.start,
                duration: chord.duration,
                velocity: 100,
            }),
            BassPattern::Walking => {
                for i in 0..4 {
                    let key = if i == 0 {
                        root
                    } else {
                        tones.choose(rng).copied().unwrap_or(root)
                    };
                    notes.push(NoteEvent {
                        key,
                        start: at(i),
                        duration: step,
                        velocity: if i == 0 { 90 } else { 80 },
                    });
                }
            }
            BassPattern::Arpeggiated => {
                for i in 0..4 {
                    notes.push(NoteEvent {
                        key: tones[i % tones.len()],
                        start: at(i),
                        duration: step,
                        velocity: 85,
                    });
                }
            }
        }
    }
    notes
}

fn drums(request: &CompositionRequest, pattern: DrumPattern) -> Vec<NoteEvent> {
    let measure = request.measure_seconds();
    let step = request.seconds_per_beat() / 2.0;
    let mut notes = Vec::new();
    for m in 0..request.measures as usize {
        let measure_start = m as f64 * measure;
        for s in 0..DrumPattern::STEPS {
            for (key, hits) in pattern.grid() {
                if hits[s] {
                    notes.push(NoteEvent {
                        key: *key,
                        start: measure_start + s as f64 * step,
                        duration: step,
                        velocity: DrumPattern::velocity(*key),
                    });
                }
            }
        }
    }
    notes
}
