//! Timbre analysis: spectral features of a rendered test phrase mapped onto
//! ordered categories.

use super::render::{load_soundfont, rms, test_phrase, OfflineRenderer};
use crate::catalog::{Attack, Brightness, HarmonicQuality, Richness, Timbre, TimbreFeatures};
use crate::config::AnalysisConfig;
use crate::error::{FontshelfError, Result};
use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;
use std::path::Path;
use tracing::debug;

/// Fraction of spectral energy below the rolloff frequency.
const ROLLOFF_FRACTION: f32 = 0.85;
/// A spectral peak must exceed the frame's median bin energy by this factor.
const PEAK_PROMINENCE: f32 = 10.0;
/// Upper bound for a frame's harmonic ratio; a pure tone has no residual.
const MAX_HARMONIC_RATIO: f32 = 1_000.0;
/// Scale applied to the zero-crossing rate before thresholding.
const ZCR_SCALE: f32 = 10_000.0;

/// Short-time spectral feature extractor.
pub struct SpectralAnalyzer {
    sample_rate: f32,
    frame_size: usize,
    hop_size: usize,
    fft_planner: FftPlanner<f32>,
    window: Vec<f32>,
}

#[derive(Default)]
struct FrameFeatures {
    centroid: f32,
    bandwidth: f32,
    rolloff: f32,
    harmonic_ratio: f32,
}

impl SpectralAnalyzer {
    pub fn new(sample_rate: f32) -> Self {
        Self::with_params(sample_rate, AnalysisConfig::FRAME_SIZE, AnalysisConfig::HOP_SIZE)
    }

    pub fn with_params(sample_rate: f32, frame_size: usize, hop_size: usize) -> Self {
        let frame_size = frame_size.next_power_of_two();
        Self {
            sample_rate,
            frame_size,
            hop_size: hop_size.max(1),
            fft_planner: FftPlanner::new(),
            window: create_hann_window(frame_size),
        }
    }

    /// Average features over every non-silent frame of `samples`.
    pub fn analyze(&mut self, samples: &[f32]) -> Result<TimbreFeatures> {
        if rms(samples) <= AnalysisConfig::SILENCE_RMS {
            return Err(FontshelfError::AnalysisFailed {
                message: "rendered audio is silent".into(),
            });
        }

        let mut totals = FrameFeatures::default();
        let mut frames = 0usize;
        let mut start = 0;
        loop {
            let end = (start + self.frame_size).min(samples.len());
            let frame = &samples[start..end];
            if rms(frame) > AnalysisConfig::SILENCE_RMS {
                if let Some(features) = self.frame_features(frame) {
                    totals.centroid += features.centroid;
                    totals.bandwidth += features.bandwidth;
                    totals.rolloff += features.rolloff;
                    totals.harmonic_ratio += features.harmonic_ratio;
                    frames += 1;
                }
            }
            if end == samples.len() {
                break;
            }
            start += self.hop_size;
        }

        if frames == 0 {
            return Err(FontshelfError::AnalysisFailed {
                message: "no frame carried measurable energy".into(),
            });
        }

        let n = frames as f32;
        Ok(TimbreFeatures {
            spectral_centroid: totals.centroid / n,
            spectral_bandwidth: totals.bandwidth / n,
            spectral_rolloff: totals.rolloff / n,
            zero_crossing_rate: zero_crossing_rate(samples),
            harmonic_ratio: totals.harmonic_ratio / n,
        })
    }

    fn frame_features(&mut self, frame: &[f32]) -> Option<FrameFeatures> {
        // Zero-pad short trailing frames.
        let mut buffer: Vec<Complex<f32>> = (0..self.frame_size)
            .map(|i| {
                let sample = frame.get(i).copied().unwrap_or(0.0);
                Complex::new(sample * self.window[i], 0.0)
            })
            .collect();

        let fft = self.fft_planner.plan_fft_forward(self.frame_size);
        fft.process(&mut buffer);

        let bins = self.frame_size / 2;
        let magnitudes: Vec<f32> = buffer[..bins].iter().map(|c| c.norm()).collect();
        let total: f32 = magnitudes.iter().sum();
        if total <= f32::EPSILON {
            return None;
        }

        let bin_hz = self.sample_rate / self.frame_size as f32;
        let freq = |k: usize| k as f32 * bin_hz;

        let centroid = magnitudes
            .iter()
            .enumerate()
            .map(|(k, m)| freq(k) * m)
            .sum::<f32>()
            / total;

        let variance = magnitudes
            .iter()
            .enumerate()
            .map(|(k, m)| (freq(k) - centroid).powi(2) * m)
            .sum::<f32>()
            / total;

        let energy: Vec<f32> = magnitudes.iter().map(|m| m * m).collect();
        let total_energy: f32 = energy.iter().sum();
        let target = total_energy * ROLLOFF_FRACTION;
        let mut cumulative = 0.0;
        let mut rolloff_bin = bins - 1;
        for (k, e) in energy.iter().enumerate() {
            cumulative += e;
            if cumulative >= target {
                rolloff_bin = k;
                break;
            }
        }

        Some(FrameFeatures {
            centroid,
            bandwidth: variance.sqrt(),
            rolloff: freq(rolloff_bin),
            harmonic_ratio: harmonic_ratio(&energy),
        })
    }
}

/// Hann window of `size` samples.
fn create_hann_window(size: usize) -> Vec<f32> {
    if size <= 1 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (size - 1) as f32).cos()))
        .collect()
}

/// Sign changes per sample.
pub fn zero_crossing_rate(samples: &[f32]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f32 / (samples.len() - 1) as f32
}

/// Energy in prominent spectral peaks (a local maximum well above the median
/// bin, plus its two neighbours) relative to the energy everywhere else.
fn harmonic_ratio(energy: &[f32]) -> f32 {
    if energy.len() < 3 {
        return 0.0;
    }
    let mut sorted = energy.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let floor = sorted[sorted.len() / 2] * PEAK_PROMINENCE;

    let mut in_peak = vec![false; energy.len()];
    for k in 1..energy.len() - 1 {
        if energy[k] > floor && energy[k] > energy[k - 1] && energy[k] >= energy[k + 1] {
            in_peak[k - 1] = true;
            in_peak[k] = true;
            in_peak[k + 1] = true;
        }
    }

    let (peak, residual) = energy
        .iter()
        .zip(&in_peak)
        .fold((0.0f32, 0.0f32), |(p, r), (e, is_peak)| {
            if *is_peak {
                (p + e, r)
            } else {
                (p, r + e)
            }
        });
    if peak <= 0.0 {
        return 0.0;
    }
    (peak / residual.max(f32::EPSILON)).min(MAX_HARMONIC_RATIO)
}

/// Map raw features onto the four timbre categories.
pub fn classify(features: &TimbreFeatures) -> Timbre {
    let mut timbre = Timbre::new(
        Brightness::from_thresholds(features.spectral_centroid, AnalysisConfig::BRIGHTNESS_THRESHOLDS),
        Richness::from_thresholds(features.spectral_bandwidth, AnalysisConfig::RICHNESS_THRESHOLDS),
        Attack::from_thresholds(
            features.zero_crossing_rate * ZCR_SCALE,
            AnalysisConfig::ATTACK_THRESHOLDS,
        ),
        HarmonicQuality::from_thresholds(features.harmonic_ratio, AnalysisConfig::HARMONIC_THRESHOLDS),
    );
    timbre.features = Some(*features);
    timbre
}

/// Render the test phrase through the soundfont at `path` and classify it.
pub fn analyze_soundfont(path: &Path) -> Result<Timbre> {
    let soundfont = load_soundfont(path).map_err(|e| FontshelfError::AnalysisFailed {
        message: e.to_string(),
    })?;
    let mut renderer = OfflineRenderer::new(&soundfont)?;
    let samples = renderer.render(
        &test_phrase(),
        AnalysisConfig::TEST_VELOCITY,
        AnalysisConfig::TEST_NOTE_SECONDS,
    );

    let mut analyzer = SpectralAnalyzer::new(renderer.sample_rate() as f32);
    let features = analyzer.analyze(&samples)?;
    let timbre = classify(&features);
    debug!(
        "Timbre of {}: {} (centroid {:.0} Hz, bandwidth {:.0} Hz)",
        path.display(),
        timbre.labels().join(", "),
        features.spectral_centroid,
        features.spectral_bandwidth
    );
    Ok(timbre)
}
