//! Pass 1: Onset Detection
//!
//! Half-wave rectified spectral flux over a Hann-windowed STFT, peak picked
//! against a combined relative/adaptive/absolute threshold with a refractory
//! period, then backtracked to the first loud sample of each attack.

use crate::analysis::Onset;
use crate::audio::AudioBuffer;
use crate::config::OnsetConfig;
use crate::spectral::{magnitude_spectrogram, spectral_flux, stft};
use ndarray::{Array2, Axis};

/// Per-frame threshold: max of the relative, adaptive and absolute terms
fn onset_thresholds(flux: &[f32], sr: u32, config: &OnsetConfig) -> Vec<f32> {
    let max_flux = flux.iter().cloned().fold(0.0f32, f32::max);
    let global = config.relative_threshold * max_flux;
    let half_window =
        ((config.adaptive_window_sec * sr as f32) / config.hop_length as f32).round() as usize;

    // Prefix sums in f64 keep the rolling mean independent of frame order
    let mut prefix = vec![0.0f64; flux.len() + 1];
    for (i, &v) in flux.iter().enumerate() {
        prefix[i + 1] = prefix[i] + v as f64;
    }

    (0..flux.len())
        .map(|i| {
            let start = i.saturating_sub(half_window);
            let end = i.saturating_add(half_window).saturating_add(1).min(flux.len());
            let local_mean = ((prefix[end] - prefix[start]) / (end - start) as f64) as f32;
            global
                .max(config.adaptive_k * local_mean)
                .max(config.absolute_floor)
        })
        .collect()
}

/// Frame energy from the magnitude spectrogram
fn frame_energy(mag: &Array2<f32>) -> Vec<f32> {
    mag.axis_iter(Axis(1))
        .map(|column| column.iter().map(|&m| m * m).sum())
        .collect()
}

/// Find local flux maxima above threshold with a refractory period.
/// Candidates must also show rising frame energy over `rise_lag` frames,
/// which rejects spectral smearing at note releases.
fn find_peaks_with_refractory(
    flux: &[f32],
    thresholds: &[f32],
    energy: &[f32],
    rise_lag: usize,
    min_distance_frames: usize,
) -> Vec<usize> {
    let mut peaks = Vec::new();
    let mut last_peak: Option<usize> = None;

    for i in 0..flux.len().saturating_sub(1) {
        if let Some(last) = last_peak {
            if i < last.saturating_add(min_distance_frames) {
                continue;
            }
        }

        // Frames before the buffer start count as silence
        let previous = if i == 0 { 0.0 } else { flux[i - 1] };
        let energy_before = i.checked_sub(rise_lag).map_or(0.0, |j| energy[j]);
        let is_local_max = flux[i] > previous && flux[i] >= flux[i + 1];
        let energy_rising = energy[i] > energy_before;

        if is_local_max && flux[i] > thresholds[i] && energy_rising {
            peaks.push(i);
            last_peak = Some(i);
        }
    }

    peaks
}

/// Walk back from the loudest sample of the peak frame to the end of the
/// preceding quiet run. Falls back to the frame start when no quiet run is
/// found within one frame length before it.
pub fn backtrack_to_sample(y: &[f32], frame_idx: usize, config: &OnsetConfig) -> usize {
    let frame_start = (frame_idx * config.hop_length).min(y.len().saturating_sub(1));
    let frame_end = (frame_start + config.frame_length).min(y.len());
    let search_start = frame_start.saturating_sub(config.frame_length);

    let (offset, peak_level) = y[frame_start..frame_end]
        .iter()
        .enumerate()
        .fold((0usize, 0.0f32), |(best_i, best_v), (i, &x)| {
            if x.abs() > best_v {
                (i, x.abs())
            } else {
                (best_i, best_v)
            }
        });
    if peak_level <= 0.0 {
        return frame_start;
    }

    let quiet_level = config.backtrack_ratio * peak_level;
    let mut quiet_run = 0usize;
    let mut idx = frame_start + offset;

    while idx > search_start {
        idx -= 1;
        if y[idx].abs() < quiet_level {
            quiet_run += 1;
            if quiet_run >= config.backtrack_quiet_run {
                return idx + quiet_run;
            }
        } else {
            quiet_run = 0;
        }
    }

    if search_start == 0 {
        // Buffer start bounds the quiet run
        return quiet_run;
    }

    frame_start
}

/// Sort, deduplicate and re-apply the refractory period in samples
fn finalize_onsets(mut onsets: Vec<Onset>, min_spacing_samples: usize) -> Vec<Onset> {
    onsets.sort_by_key(|o| o.sample_idx);

    let mut kept: Vec<Onset> = Vec::with_capacity(onsets.len());
    for onset in onsets {
        match kept.last() {
            Some(prev)
                if onset.sample_idx < prev.sample_idx.saturating_add(min_spacing_samples.max(1)) =>
            {
                log::debug!(
                    "  Dropping onset at {:.4}s, within refractory period of {:.4}s",
                    onset.time_sec,
                    prev.time_sec
                );
            }
            _ => kept.push(onset),
        }
    }
    kept
}

/// Detect onsets in a buffer. Silent or sub-threshold input yields an empty list.
pub fn run(buffer: &AudioBuffer, config: &OnsetConfig) -> Vec<Onset> {
    log::info!("Pass 1: Onset Detection");

    let y = buffer.samples();
    let sr = buffer.sample_rate();

    let stft_data = stft(y, config.frame_length, config.hop_length, "hann", sr);
    if stft_data.n_frames() < 3 {
        log::info!("  Too few frames for onset detection");
        return Vec::new();
    }

    let mag = magnitude_spectrogram(&stft_data);
    let flux = spectral_flux(&mag);
    let energy = frame_energy(&mag);
    let thresholds = onset_thresholds(&flux, sr, config);

    let min_distance_frames =
        ((config.min_spacing_sec * sr as f32) / config.hop_length as f32).round() as usize;
    let rise_lag = (config.frame_length / config.hop_length).max(1);
    let peak_frames =
        find_peaks_with_refractory(&flux, &thresholds, &energy, rise_lag, min_distance_frames);

    let onsets: Vec<Onset> = peak_frames
        .iter()
        .map(|&frame_idx| {
            let sample_idx = backtrack_to_sample(y, frame_idx, config);
            Onset {
                time_sec: sample_idx as f32 / sr as f32,
                sample_idx,
                frame_idx,
                strength: flux[frame_idx],
            }
        })
        .collect();

    let min_spacing_samples = (config.min_spacing_sec * sr as f32).round() as usize;
    let onsets = finalize_onsets(onsets, min_spacing_samples);

    log::info!("  ✓ Detected {} onsets", onsets.len());
    onsets
}
