//! SF2 extraction through `rustysynth`.

use super::file_stat::collect_file_facts;
use super::{ExtractOptions, Extraction, MetadataExtractor, Sf2Facts};
use crate::analysis::render::{load_soundfont, OfflineRenderer};
use crate::notes::MAX_NOTE;
use rustysynth::SoundFont;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// Semitones around a sample's root key assumed playable when the file
/// declares no key ranges.
const ROOT_KEY_SPREAD: u8 = 12;

/// Marker sample that terminates the sample list in some files.
const END_OF_SAMPLES: &str = "EOS";

/// Reads the INFO chunk, presets, instruments and sample headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sf2Extractor;

impl MetadataExtractor for Sf2Extractor {
    fn name(&self) -> &'static str {
        "sf2"
    }

    fn extract(&self, path: &Path, options: &ExtractOptions) -> Extraction {
        let mut extraction = Extraction::new(path);
        collect_file_facts(path, options, &mut extraction);

        let soundfont = match load_soundfont(path) {
            Ok(soundfont) => soundfont,
            Err(e) => {
                extraction.warn(e.to_string());
                return extraction;
            }
        };

        let mut facts = read_facts(&soundfont);

        if options.probe_note_range {
            match OfflineRenderer::new(&soundfont) {
                Ok(mut renderer) => {
                    facts.covered_keys = (0..=MAX_NOTE).filter(|k| renderer.key_sounds(*k)).collect();
                    facts.probed = true;
                    debug!(
                        "Probed {}: {} of 128 keys sound",
                        path.display(),
                        facts.covered_keys.len()
                    );
                }
                Err(e) => extraction.warn(format!("note range probe skipped: {e}")),
            }
        }

        extraction.sf2 = Some(facts);
        extraction
    }
}

fn clean(text: &str) -> String {
    text.trim_matches(char::from(0)).trim().to_string()
}

fn key_range(start: i32, end: i32) -> Option<(u8, u8)> {
    let lo = u8::try_from(start.clamp(0, i32::from(MAX_NOTE))).ok()?;
    let hi = u8::try_from(end.clamp(0, i32::from(MAX_NOTE))).ok()?;
    (lo <= hi).then_some((lo, hi))
}

fn read_facts(soundfont: &SoundFont) -> Sf2Facts {
    let info = soundfont.get_info();

    let samples: Vec<_> = soundfont
        .get_sample_headers()
        .iter()
        .filter(|s| clean(s.get_name()) != END_OF_SAMPLES)
        .collect();

    let sample_rate = samples
        .iter()
        .filter_map(|s| u32::try_from(s.get_sample_rate()).ok())
        .filter(|rate| *rate > 0)
        .max();

    let original_pitches: BTreeSet<u8> = samples
        .iter()
        .filter_map(|s| u8::try_from(s.get_original_pitch()).ok())
        .filter(|k| *k <= MAX_NOTE)
        .collect();

    // Regions without a keyRange generator report the full 0..=127 range,
    // which says nothing about the samples, so only narrower ranges count.
    let mut covered_keys = BTreeSet::new();
    let instrument_ranges = soundfont
        .get_instruments()
        .iter()
        .flat_map(|i| i.get_regions())
        .map(|r| (r.get_key_range_start(), r.get_key_range_end()));
    let preset_ranges = soundfont
        .get_presets()
        .iter()
        .flat_map(|p| p.get_regions())
        .map(|r| (r.get_key_range_start(), r.get_key_range_end()));
    for (lo, hi) in instrument_ranges.chain(preset_ranges).filter_map(|(s, e)| key_range(s, e)) {
        if (lo, hi) != (0, MAX_NOTE) {
            covered_keys.extend(lo..=hi);
        }
    }

    if covered_keys.is_empty() {
        for root in &original_pitches {
            let lo = root.saturating_sub(ROOT_KEY_SPREAD);
            let hi = root.saturating_add(ROOT_KEY_SPREAD).min(MAX_NOTE);
            covered_keys.extend(lo..=hi);
        }
    }

    let bit_depth = u16::try_from(soundfont.get_bits_per_sample()).unwrap_or(16);

    Sf2Facts {
        bank_name: clean(info.get_bank_name()),
        author: clean(info.get_author()),
        copyright: clean(info.get_copyright()),
        comments: clean(info.get_comments()),
        preset_names: soundfont
            .get_presets()
            .iter()
            .map(|p| clean(p.get_name()))
            .filter(|n| !n.is_empty())
            .collect(),
        instrument_names: soundfont
            .get_instruments()
            .iter()
            .map(|i| clean(i.get_name()))
            .filter(|n| !n.is_empty())
            .collect(),
        sample_count: samples.len(),
        sample_rate,
        bit_depth,
        covered_keys,
        original_pitches,
        probed: false,
    }
}
