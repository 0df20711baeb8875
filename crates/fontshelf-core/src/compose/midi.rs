//! Standard MIDI file output through `midly`.

use super::generator::{Composition, CompositionRequest, NoteEvent, Part, PartRole};
use crate::analysis::test_phrase;
use crate::error::{FontshelfError, Result};
use crate::persistence::write_file_atomic;
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::path::Path;
use tracing::debug;

/// Resolution of written files.
pub const TICKS_PER_QUARTER: u16 = 480;

/// Encode `composition` as a format 1 file: a tempo track followed by one
/// track per part.
pub fn encode_midi(composition: &Composition) -> Result<Vec<u8>> {
    composition.request.validate()?;
    let seconds_per_beat = composition.request.seconds_per_beat();
    let tempo_us = (seconds_per_beat * 1_000_000.0).round() as u32;

    let mut tracks = Vec::with_capacity(composition.parts.len() + 1);
    tracks.push(vec![
        TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::from(tempo_us))),
        },
        TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Meta(MetaMessage::TimeSignature(4, 2, 24, 8)),
        },
        TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        },
    ]);
    for part in &composition.parts {
        tracks.push(part_track(part, seconds_per_beat));
    }

    let smf = Smf {
        header: Header {
            format: Format::Parallel,
            timing: Timing::Metrical(u15::from(TICKS_PER_QUARTER)),
        },
        tracks,
    };

    let mut bytes = Vec::new();
    smf.write(&mut bytes).map_err(|e| FontshelfError::Midi {
        message: format!("failed to encode MIDI: {e:?}"),
    })?;
    Ok(bytes)
}

/// Write `composition` to `path` atomically.
pub fn write_midi(composition: &Composition, path: &Path) -> Result<()> {
    let bytes = encode_midi(composition)?;
    write_file_atomic(path, &bytes, false)?;
    debug!(
        "Wrote {} ({} tracks, {} bytes)",
        path.display(),
        composition.parts.len() + 1,
        bytes.len()
    );
    Ok(())
}

/// Write a short piano phrase (C4 E4 G4 C5, then the C major chord) used to
/// audition a soundfont.
pub fn write_test_midi(path: &Path) -> Result<()> {
    let notes = test_phrase()
        .into_iter()
        .map(|n| NoteEvent {
            key: n.key,
            start: f64::from(n.start),
            duration: f64::from(n.duration),
            velocity: 100,
        })
        .collect();
    let composition = Composition {
        request: CompositionRequest::default(),
        chords: Vec::new(),
        parts: vec![Part {
            role: PartRole::Melody,
            program: 0,
            channel: 0,
            notes,
        }],
    };
    write_midi(&composition, path)
}

fn to_ticks(seconds: f64, seconds_per_beat: f64) -> u32 {
    (seconds / seconds_per_beat * f64::from(TICKS_PER_QUARTER))
        .round()
        .max(0.0) as u32
}

fn part_track(part: &Part, seconds_per_beat: f64) -> Vec<TrackEvent<'static>> {
    let channel = u4::from(part.channel);

    // (tick, is_on, key, velocity); offs sort before ons at the same tick so a
    // repeated key is released before it is struck again.
    let mut timeline: Vec<(u32, bool, u8, u8)> = Vec::with_capacity(part.notes.len() * 2);
    for note in &part.notes {
        let on = to_ticks(note.start, seconds_per_beat);
        let off = to_ticks(note.end(), seconds_per_beat).max(on + 1);
        timeline.push((on, true, note.key, note.velocity));
        timeline.push((off, false, note.key, 0));
    }
    timeline.sort_by_key(|(tick, is_on, key, _)| (*tick, *is_on, *key));

    let mut events = Vec::with_capacity(timeline.len() + 3);
    events.push(TrackEvent {
        delta: u28::from(0),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(part.role.as_str().as_bytes())),
    });
    events.push(TrackEvent {
        delta: u28::from(0),
        kind: TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange {
                program: u7::from(part.program),
            },
        },
    });

    let mut last_tick = 0;
    for (tick, is_on, key, velocity) in timeline {
        let message = if is_on {
            MidiMessage::NoteOn {
                key: u7::from(key),
                vel: u7::from(velocity),
            }
        } else {
            MidiMessage::NoteOff {
                key: u7::from(key),
                vel: u7::from(0),
            }
        };
        events.push(TrackEvent {
            delta: u28::from(tick - last_tick),
            kind: TrackEventKind::Midi { channel, message },
        });
        last_tick = tick;
    }

    events.push(TrackEvent {
        delta: u28::from(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    events
}
