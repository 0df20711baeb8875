//! Offline rendering of test notes through `rustysynth`.

use crate::config::AnalysisConfig;
use crate::error::{FontshelfError, Result};
use rustysynth::{SoundFont, Synthesizer, SynthesizerSettings};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

/// A note to render: key, start and length in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestNote {
    pub key: u8,
    pub start: f32,
    pub duration: f32,
}

impl TestNote {
    pub fn new(key: u8, start: f32, duration: f32) -> Self {
        Self {
            key,
            start,
            duration,
        }
    }
}

/// Parse an SF2 file into a shareable [`SoundFont`].
pub fn load_soundfont(path: &Path) -> Result<Arc<SoundFont>> {
    let file = File::open(path).map_err(|e| FontshelfError::io_with_path(e, path))?;
    let mut reader = BufReader::new(file);
    let soundfont = SoundFont::new(&mut reader).map_err(|e| FontshelfError::ExtractionFailed {
        path: path.to_path_buf(),
        message: format!("Failed to parse SoundFont: {}", e),
    })?;
    Ok(Arc::new(soundfont))
}

/// Mono offline renderer for one soundfont on channel 0, preset 0.
pub struct OfflineRenderer {
    synthesizer: Synthesizer,
    sample_rate: i32,
}

impl OfflineRenderer {
    pub fn new(soundfont: &Arc<SoundFont>) -> Result<Self> {
        Self::with_sample_rate(soundfont, AnalysisConfig::RENDER_SAMPLE_RATE)
    }

    pub fn with_sample_rate(soundfont: &Arc<SoundFont>, sample_rate: i32) -> Result<Self> {
        let mut settings = SynthesizerSettings::new(sample_rate);
        settings.enable_reverb_and_chorus = false;
        let synthesizer = Synthesizer::new(soundfont, &settings).map_err(|e| {
            FontshelfError::AnalysisFailed {
                message: format!("Failed to create synthesizer: {}", e),
            }
        })?;
        Ok(Self {
            synthesizer,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> i32 {
        self.sample_rate
    }

    fn seconds_to_samples(&self, seconds: f32) -> usize {
        (seconds.max(0.0) * self.sample_rate as f32).round() as usize
    }

    /// Render `notes` and return the mono mix. Output runs until the last
    /// note ends plus `tail` seconds of release.
    pub fn render(&mut self, notes: &[TestNote], velocity: i32, tail: f32) -> Vec<f32> {
        // (sample position, key, is note-on)
        let mut events: Vec<(usize, u8, bool)> = notes
            .iter()
            .flat_map(|n| {
                let on = self.seconds_to_samples(n.start);
                let off = self.seconds_to_samples(n.start + n.duration);
                [(on, n.key, true), (off.max(on + 1), n.key, false)]
            })
            .collect();
        // Note-offs before note-ons at the same position.
        events.sort_by_key(|(pos, key, on)| (*pos, *on, *key));

        let end = events.last().map(|e| e.0).unwrap_or(0) + self.seconds_to_samples(tail);
        let mut left = vec![0.0f32; end];
        let mut right = vec![0.0f32; end];

        let mut cursor = 0;
        for (pos, key, on) in events {
            if pos > cursor {
                self.synthesizer
                    .render(&mut left[cursor..pos], &mut right[cursor..pos]);
                cursor = pos;
            }
            if on {
                self.synthesizer.note_on(0, i32::from(key), velocity);
            } else {
                self.synthesizer.note_off(0, i32::from(key));
            }
        }
        if cursor < end {
            self.synthesizer
                .render(&mut left[cursor..end], &mut right[cursor..end]);
        }
        self.synthesizer.note_off_all(true);

        left.iter().zip(&right).map(|(l, r)| (l + r) * 0.5).collect()
    }

    /// Whether a single key produces audible output.
    pub fn key_sounds(&mut self, key: u8) -> bool {
        let note = TestNote::new(key, 0.0, AnalysisConfig::PROBE_NOTE_SECONDS);
        let samples = self.render(&[note], AnalysisConfig::TEST_VELOCITY, 0.0);
        rms(&samples) > AnalysisConfig::SILENCE_RMS
    }
}

/// Root mean square of a buffer, 0 for an empty one.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy: f32 = samples.iter().map(|s| s * s).sum();
    (energy / samples.len() as f32).sqrt()
}

/// The phrase timbre analysis listens to: C4 E4 G4 C5, then the chord.
pub fn test_phrase() -> Vec<TestNote> {
    let step = AnalysisConfig::TEST_NOTE_SECONDS;
    let mut notes: Vec<TestNote> = [60u8, 64, 67, 72]
        .iter()
        .enumerate()
        .map(|(i, key)| TestNote::new(*key, i as f32 * step, step))
        .collect();
    let chord_start = 4.0 * step;
    notes.extend([60u8, 64, 67].map(|key| TestNote::new(key, chord_start, step * 2.0)));
    notes
}
