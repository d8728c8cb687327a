//! Pass 2: Spectral Window Analysis & Peak Extraction

use crate::analysis::{FrequencyPeak, Onset, SpectralFrame};
use crate::audio::AudioBuffer;
use crate::config::SpectralConfig;
use crate::spectral::{interpolate_peak, magnitude_spectrum};
use std::ops::Range;

/// Peaks found for one onset. `peaks` is `None` when the analysis window
/// was empty after clipping to the buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct OnsetPeaks {
    pub onset: Onset,
    pub peaks: Option<Vec<FrequencyPeak>>,
}

/// Sample range analysed for an onset, clipped to the buffer
pub fn analysis_window(
    n_samples: usize,
    sr: u32,
    onset_sec: f32,
    config: &SpectralConfig,
) -> Option<Range<usize>> {
    let start_sec = (onset_sec - config.pre_onset_sec).max(0.0);
    let start = ((start_sec * sr as f32) as usize).min(n_samples);
    let length = (config.window_sec * sr as f32) as usize;
    let end = start.saturating_add(length).min(n_samples);

    if end > start {
        Some(start..end)
    } else {
        None
    }
}

/// Strongest local maxima of a spectral frame.
///
/// Peaks under `min_magnitude` are noise. Survivors are ranked by descending
/// magnitude and accepted greedily when at least `min_separation_hz` away
/// from every accepted peak, up to `max_peaks`.
pub fn extract_peaks(frame: &SpectralFrame, config: &SpectralConfig) -> Vec<FrequencyPeak> {
    let mags = &frame.magnitudes;
    if mags.len() < 3 {
        return Vec::new();
    }
    let bin_hz = frame.freqs[1] - frame.freqs[0];

    let mut candidates: Vec<FrequencyPeak> = (1..mags.len() - 1)
        .filter(|&i| {
            mags[i] > mags[i - 1] && mags[i] >= mags[i + 1] && mags[i] >= config.min_magnitude
        })
        .map(|i| FrequencyPeak {
            frequency_hz: (i as f32 + interpolate_peak(mags, i)) * bin_hz,
            magnitude: mags[i],
        })
        .collect();

    // Stable sort keeps ascending frequency order among equal magnitudes
    candidates.sort_by(|a, b| b.magnitude.total_cmp(&a.magnitude));

    let mut accepted: Vec<FrequencyPeak> = Vec::with_capacity(config.max_peaks);
    for peak in candidates {
        if accepted.len() >= config.max_peaks {
            break;
        }
        let separated = accepted
            .iter()
            .all(|p| (p.frequency_hz - peak.frequency_hz).abs() >= config.min_separation_hz);
        if separated {
            accepted.push(peak);
        }
    }

    accepted
}

pub fn run(buffer: &AudioBuffer, onsets: &[Onset], config: &SpectralConfig) -> Vec<OnsetPeaks> {
    log::info!("Pass 2: Spectral Window Analysis");

    let y = buffer.samples();
    let sr = buffer.sample_rate();

    let results: Vec<OnsetPeaks> = onsets
        .iter()
        .map(|onset| {
            let peaks = analysis_window(y.len(), sr, onset.time_sec, config).map(|range| {
                let frame = magnitude_spectrum(&y[range], sr);
                extract_peaks(&frame, config)
            });
            OnsetPeaks {
                onset: *onset,
                peaks,
            }
        })
        .collect();

    let total: usize = results
        .iter()
        .filter_map(|r| r.peaks.as_ref().map(Vec::len))
        .sum();
    log::info!("  ✓ Extracted {} peaks over {} onsets", total, results.len());

    results
}
