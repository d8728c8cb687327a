//! Validation tests for Pass 3: Pitch Mapping & Voice Classification

use piano2score::analysis::{DetectionOutcome, FrequencyPeak, Onset, PeakRejection, Pitch, Voice};
use piano2score::config::PitchConfig;
use piano2score::passes::pass_2::OnsetPeaks;
use piano2score::passes::pass_3::{self, FixedSplit, VoiceClassifier};

fn peak(frequency_hz: f32, magnitude: f32) -> FrequencyPeak {
    FrequencyPeak {
        frequency_hz,
        magnitude,
    }
}

fn onset_with_peaks(time_sec: f32, peaks: Option<Vec<FrequencyPeak>>) -> OnsetPeaks {
    OnsetPeaks {
        onset: Onset {
            time_sec,
            sample_idx: (time_sec * 22050.0) as usize,
            frame_idx: 0,
            strength: 1.0,
        },
        peaks,
    }
}

/// Equal-tempered frequency of a MIDI pitch
fn midi_to_hz(midi: u8) -> f32 {
    440.0 * 2f32.powf((midi as f32 - 69.0) / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_tempered_frequencies_map_exactly() {
        let config = PitchConfig::default();
        for midi in 21..=107u8 {
            assert_eq!(
                pass_3::map_frequency(midi_to_hz(midi), &config),
                Some(Pitch(midi)),
                "{} Hz",
                midi_to_hz(midi)
            );
        }
    }

    #[test]
    fn test_mapping_is_monotonic() {
        let config = PitchConfig::default();
        let mut previous: Option<Pitch> = None;
        let mut f = 27.5;
        while f <= 4000.0 {
            if let Some(pitch) = pass_3::map_frequency(f, &config) {
                if let Some(prev) = previous {
                    assert!(pitch >= prev, "{} Hz mapped below the previous pitch", f);
                }
                previous = Some(pitch);
            }
            f *= 1.003;
        }
    }

    #[test]
    fn test_out_of_range_frequency_never_maps() {
        let config = PitchConfig::default();
        for &f in &[0.0, 5.0, 20.0, 4000.5, 6000.0, f32::NAN] {
            for &magnitude in &[0.05, 1.0, 100.0] {
                assert!(
                    pass_3::map_peak(&peak(f, magnitude), &config).is_err(),
                    "{} Hz at magnitude {} mapped to a pitch",
                    f,
                    magnitude
                );
            }
        }
    }

    #[test]
    fn test_voice_split_at_middle_c() {
        let split = FixedSplit::default();
        assert_eq!(split.classify(Pitch(59)), Voice::Bass);
        assert_eq!(split.classify(Pitch(60)), Voice::Treble);
        assert_eq!(split.classify(Pitch(21)), Voice::Bass);
        assert_eq!(split.classify(Pitch(108)), Voice::Treble);
    }

    #[test]
    fn test_voices_contain_only_their_register() {
        let entries: Vec<OnsetPeaks> = (0..20)
            .map(|i| {
                let midi = 36 + i as u8 * 3;
                onset_with_peaks(i as f32 * 0.5, Some(vec![peak(midi_to_hz(midi), 0.5)]))
            })
            .collect();

        let out = pass_3::run(&entries, &PitchConfig::default(), &FixedSplit::default());
        assert_eq!(out.treble.len() + out.bass.len(), 20);
        assert!(out.treble.iter().all(|n| n.pitch.midi() >= 60 && n.voice == Voice::Treble));
        assert!(out.bass.iter().all(|n| n.pitch.midi() < 60 && n.voice == Voice::Bass));
        assert!(out.diagnostics.iter().all(|d| d.outcome.is_accepted()));
    }

    #[test]
    fn test_one_note_per_voice_per_onset() {
        // Strongest treble and strongest bass peak survive
        let entries = vec![onset_with_peaks(
            0.5,
            Some(vec![
                peak(659.25, 0.8),
                peak(523.25, 0.6),
                peak(130.81, 0.4),
                peak(98.0, 0.2),
            ]),
        )];

        let out = pass_3::run(&entries, &PitchConfig::default(), &FixedSplit::default());
        assert_eq!(out.treble.len(), 1);
        assert_eq!(out.bass.len(), 1);
        assert_eq!(out.treble[0].pitch, Pitch(76));
        assert_eq!(out.bass[0].pitch, Pitch(48));
        assert_eq!(out.treble[0].duration_beats, None);

        match &out.diagnostics[0].outcome {
            DetectionOutcome::Accepted {
                pitches,
                rejections,
            } => {
                assert_eq!(pitches, &vec![Pitch(76), Pitch(48)]);
                assert_eq!(rejections.len(), 2);
                assert!(rejections
                    .iter()
                    .all(|r| matches!(r, PeakRejection::VoiceAlreadyFilled { .. })));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_each_miss_is_explained() {
        let entries = vec![
            onset_with_peaks(0.1, None),
            onset_with_peaks(0.6, Some(Vec::new())),
            onset_with_peaks(1.1, Some(vec![peak(15.0, 0.9), peak(4500.0, 0.3)])),
        ];

        let out = pass_3::run(&entries, &PitchConfig::default(), &FixedSplit::default());
        assert!(out.treble.is_empty() && out.bass.is_empty());
        assert_eq!(out.diagnostics.len(), 3);
        assert_eq!(out.diagnostics[0].outcome, DetectionOutcome::EmptyWindow);
        assert_eq!(out.diagnostics[1].outcome, DetectionOutcome::NoPeaks);
        match &out.diagnostics[2].outcome {
            DetectionOutcome::NoValidPitch { rejections } => {
                assert_eq!(rejections.len(), 2);
                assert!(rejections
                    .iter()
                    .all(|r| matches!(r, PeakRejection::FrequencyOutOfRange { .. })));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_custom_classifier_is_honoured() {
        struct EverythingTreble;
        impl VoiceClassifier for EverythingTreble {
            fn classify(&self, _pitch: Pitch) -> Voice {
                Voice::Treble
            }
        }

        let entries = vec![onset_with_peaks(0.0, Some(vec![peak(110.0, 0.5)]))];
        let out = pass_3::run(&entries, &PitchConfig::default(), &EverythingTreble);
        assert_eq!(out.treble.len(), 1);
        assert!(out.bass.is_empty());
    }
}
