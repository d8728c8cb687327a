//! Validation tests for Pass 1: Onset Detection

use piano2score::audio::AudioBuffer;
use piano2score::config::OnsetConfig;
use piano2score::passes::pass_1;
use std::f32::consts::PI;

const SR: u32 = 22050;

/// Sine burst with a sustained body and a short raised-cosine release
fn add_tone_burst(audio: &mut [f32], start_sample: usize, freq: f32, amp: f32, length_sec: f32) {
    let body = (length_sec * SR as f32) as usize;
    let release = (0.03 * SR as f32) as usize;
    for i in 0..body + release {
        let idx = start_sample + i;
        if idx >= audio.len() {
            break;
        }
        let t = i as f32 / SR as f32;
        let envelope = if i < body {
            1.0
        } else {
            0.5 * (1.0 + (PI * (i - body) as f32 / release as f32).cos())
        };
        audio[idx] += amp * envelope * (2.0 * PI * freq * t).sin();
    }
}

fn generate_bursts(n_samples: usize, starts: &[usize], freqs: &[f32]) -> Vec<f32> {
    let mut audio = vec![0.0; n_samples];
    for (i, &start) in starts.iter().enumerate() {
        add_tone_burst(&mut audio, start, freqs[i % freqs.len()], 0.5, 0.3);
    }
    audio
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_onset_detection_recall_and_precision() {
        let starts: Vec<usize> = (0..6).map(|k| 4000 + k * 11025).collect();
        let audio = generate_bursts(SR as usize * 4, &starts, &[329.63, 196.0, 440.0]);
        let buffer = AudioBuffer::new(audio, SR);

        let onsets = pass_1::run(&buffer, &OnsetConfig::default());
        assert_eq!(
            onsets.len(),
            starts.len(),
            "expected one onset per burst, got {:?}",
            onsets.iter().map(|o| o.time_sec).collect::<Vec<_>>()
        );

        for (onset, &start) in onsets.iter().zip(&starts) {
            let expected = start as f32 / SR as f32;
            assert!(
                (onset.time_sec - expected).abs() <= 1.0 / SR as f32 + 1e-6,
                "onset {:.6}s vs injected {:.6}s",
                onset.time_sec,
                expected
            );
        }
    }

    #[test]
    fn test_onsets_ascending_and_inside_buffer() {
        let starts: Vec<usize> = (0..4).map(|k| 2000 + k * 8000).collect();
        let audio = generate_bursts(40000, &starts, &[261.63, 523.25]);
        let buffer = AudioBuffer::new(audio, SR);

        let onsets = pass_1::run(&buffer, &OnsetConfig::default());
        assert!(!onsets.is_empty());
        for pair in onsets.windows(2) {
            assert!(pair[0].time_sec < pair[1].time_sec);
        }
        for onset in &onsets {
            assert!(onset.time_sec >= 0.0 && onset.time_sec < buffer.duration_sec());
        }
    }

    #[test]
    fn test_silence_produces_no_onsets() {
        let buffer = AudioBuffer::new(vec![0.0; SR as usize * 3], SR);
        assert!(pass_1::run(&buffer, &OnsetConfig::default()).is_empty());
    }

    #[test]
    fn test_detection_is_deterministic() {
        let starts: Vec<usize> = (0..5).map(|k| 3000 + k * 9000).collect();
        let audio = generate_bursts(SR as usize * 3, &starts, &[392.0, 146.83]);
        let buffer = AudioBuffer::new(audio, SR);
        let config = OnsetConfig::default();

        let first = pass_1::run(&buffer, &config);
        let second = pass_1::run(&buffer, &config);

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.time_sec.to_bits(), b.time_sec.to_bits());
            assert_eq!(a.sample_idx, b.sample_idx);
            assert_eq!(a.strength.to_bits(), b.strength.to_bits());
        }
    }

    #[test]
    fn test_min_spacing_suppresses_double_trigger() {
        // Second attack 30ms after the first, inside the 100ms refractory period
        let mut audio = vec![0.0; SR as usize * 2];
        add_tone_burst(&mut audio, 6000, 261.63, 0.5, 0.5);
        add_tone_burst(&mut audio, 6000 + 661, 659.25, 0.5, 0.4);
        let buffer = AudioBuffer::new(audio, SR);

        let onsets = pass_1::run(&buffer, &OnsetConfig::default());
        assert_eq!(onsets.len(), 1);
        assert!((onsets[0].time_sec - 6000.0 / SR as f32).abs() < 0.005);
    }

    #[test]
    fn test_note_at_first_sample_is_detected() {
        let mut audio = vec![0.0; SR as usize * 2];
        add_tone_burst(&mut audio, 0, 440.0, 0.5, 0.3);
        add_tone_burst(&mut audio, SR as usize / 2, 261.63, 0.5, 0.3);
        let buffer = AudioBuffer::new(audio, SR);

        let onsets = pass_1::run(&buffer, &OnsetConfig::default());
        assert_eq!(
            onsets.len(),
            2,
            "got {:?}",
            onsets.iter().map(|o| o.time_sec).collect::<Vec<_>>()
        );
        assert!(onsets[0].time_sec < 0.005);
        assert!((onsets[1].time_sec - 0.5).abs() <= 1.0 / SR as f32 + 1e-6);
    }

    #[test]
    fn test_low_level_noise_floor_is_ignored() {
        // Sounding from the first sample, but far below the absolute floor
        let mut audio = vec![0.0; SR as usize * 2];
        add_tone_burst(&mut audio, 0, 440.0, 5e-7, 1.5);
        let buffer = AudioBuffer::new(audio, SR);
        assert!(pass_1::run(&buffer, &OnsetConfig::default()).is_empty());
    }
}
