//! Pass 3: Pitch Mapping & Voice Classification

use crate::analysis::{
    DetectionOutcome, FrequencyPeak, NoteEvent, OnsetDiagnostic, PeakRejection, Pitch, Voice,
};
use crate::config::PitchConfig;
use crate::passes::pass_2::OnsetPeaks;

/// Assigns a detected pitch to one of the two voices
pub trait VoiceClassifier {
    fn classify(&self, pitch: Pitch) -> Voice;
}

/// Fixed split point: pitches at or above `split` are treble
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSplit {
    pub split: Pitch,
}

impl FixedSplit {
    pub fn new(split: Pitch) -> Self {
        Self { split }
    }
}

impl Default for FixedSplit {
    fn default() -> Self {
        Self::new(Pitch::MIDDLE_C)
    }
}

impl VoiceClassifier for FixedSplit {
    fn classify(&self, pitch: Pitch) -> Voice {
        if pitch >= self.split {
            Voice::Treble
        } else {
            Voice::Bass
        }
    }
}

/// Continuous semitone number, 12-TET relative to `reference_hz` at A4 (69)
pub fn frequency_to_semitone(frequency_hz: f32, reference_hz: f32) -> f32 {
    69.0 + 12.0 * (frequency_hz / reference_hz).log2()
}

/// Round to the nearest semitone. Exact halves go to the even neighbour
/// (`f32::round_ties_even`), so 60.5 maps to 60 and 61.5 maps to 62.
pub fn quantize_semitone(semitone: f32) -> i32 {
    semitone.round_ties_even() as i32
}

/// Map a peak to a pitch or explain why it has none
pub fn map_peak(
    peak: &FrequencyPeak,
    config: &PitchConfig,
) -> std::result::Result<Pitch, PeakRejection> {
    let frequency_hz = peak.frequency_hz;
    if !frequency_hz.is_finite()
        || frequency_hz <= config.low_cutoff_hz
        || frequency_hz > config.high_cutoff_hz
    {
        return Err(PeakRejection::FrequencyOutOfRange { frequency_hz });
    }

    let semitone = quantize_semitone(frequency_to_semitone(frequency_hz, config.reference_hz));
    if semitone < config.min_pitch as i32 || semitone > config.max_pitch as i32 {
        return Err(PeakRejection::PitchOutOfRange {
            frequency_hz,
            semitone,
        });
    }

    Ok(Pitch(semitone as u8))
}

/// Frequency-only mapping: `None` means "no pitch"
pub fn map_frequency(frequency_hz: f32, config: &PitchConfig) -> Option<Pitch> {
    map_peak(
        &FrequencyPeak {
            frequency_hz,
            magnitude: 0.0,
        },
        config,
    )
    .ok()
}

/// Output of pitch mapping: per-voice events plus one diagnostic per onset
#[derive(Debug, Clone, Default)]
pub struct VoicedNotes {
    pub treble: Vec<NoteEvent>,
    pub bass: Vec<NoteEvent>,
    pub diagnostics: Vec<OnsetDiagnostic>,
}

/// Each voice takes at most one note per onset: its strongest mapped peak.
/// Peaks arrive ranked by descending magnitude.
pub fn run<C: VoiceClassifier + ?Sized>(
    onset_peaks: &[OnsetPeaks],
    config: &PitchConfig,
    classifier: &C,
) -> VoicedNotes {
    log::info!("Pass 3: Pitch Mapping & Voice Classification");

    let mut out = VoicedNotes::default();

    for entry in onset_peaks {
        let onset_sec = entry.onset.time_sec;

        let peaks = match &entry.peaks {
            None => {
                log::debug!("  {:.3}s: empty analysis window", onset_sec);
                out.diagnostics.push(OnsetDiagnostic {
                    onset_sec,
                    outcome: DetectionOutcome::EmptyWindow,
                });
                continue;
            }
            Some(peaks) if peaks.is_empty() => {
                log::debug!("  {:.3}s: no peak above threshold", onset_sec);
                out.diagnostics.push(OnsetDiagnostic {
                    onset_sec,
                    outcome: DetectionOutcome::NoPeaks,
                });
                continue;
            }
            Some(peaks) => peaks,
        };

        let mut pitches = Vec::new();
        let mut rejections = Vec::new();
        let mut filled: [Option<Pitch>; 2] = [None, None];

        for peak in peaks {
            let pitch = match map_peak(peak, config) {
                Ok(pitch) => pitch,
                Err(rejection) => {
                    rejections.push(rejection);
                    continue;
                }
            };

            let voice = classifier.classify(pitch);
            let slot = match voice {
                Voice::Treble => 0,
                Voice::Bass => 1,
            };
            if filled[slot].is_some() {
                rejections.push(PeakRejection::VoiceAlreadyFilled {
                    frequency_hz: peak.frequency_hz,
                    pitch,
                    voice,
                });
                continue;
            }
            filled[slot] = Some(pitch);

            log::debug!(
                "  {:.3}s: {} note {} ({:.1} Hz, magnitude {:.3})",
                onset_sec,
                voice.name(),
                pitch.name(),
                peak.frequency_hz,
                peak.magnitude
            );

            let event = NoteEvent {
                onset_sec,
                pitch,
                voice,
                duration_beats: None,
                source_frequency_hz: peak.frequency_hz,
                magnitude: peak.magnitude,
            };
            match voice {
                Voice::Treble => out.treble.push(event),
                Voice::Bass => out.bass.push(event),
            }
            pitches.push(pitch);
        }

        let outcome = if pitches.is_empty() {
            log::debug!("  {:.3}s: no peak mapped to a valid pitch", onset_sec);
            DetectionOutcome::NoValidPitch { rejections }
        } else {
            DetectionOutcome::Accepted {
                pitches,
                rejections,
            }
        };
        out.diagnostics.push(OnsetDiagnostic { onset_sec, outcome });
    }

    log::info!(
        "  ✓ {} treble notes, {} bass notes",
        out.treble.len(),
        out.bass.len()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_pitch_maps_exactly() {
        let config = PitchConfig::default();
        assert_eq!(frequency_to_semitone(440.0, 440.0), 69.0);
        assert_eq!(map_frequency(440.0, &config), Some(Pitch(69)));
        assert_eq!(map_frequency(880.0, &config), Some(Pitch(81)));
        assert_eq!(map_frequency(261.63, &config), Some(Pitch(60)));
    }

    #[test]
    fn test_ties_round_to_even() {
        assert_eq!(quantize_semitone(60.5), 60);
        assert_eq!(quantize_semitone(61.5), 62);
        assert_eq!(quantize_semitone(68.5), 68);
        assert_eq!(quantize_semitone(69.5), 70);
        assert_eq!(quantize_semitone(60.49), 60);
        assert_eq!(quantize_semitone(60.51), 61);
    }

    #[test]
    fn test_cutoffs() {
        let config = PitchConfig::default();
        assert_eq!(map_frequency(20.0, &config), None);
        assert_eq!(map_frequency(0.0, &config), None);
        assert_eq!(map_frequency(4000.5, &config), None);
        // 4000 Hz is inside the cutoff and maps to B7 (107)
        assert_eq!(map_frequency(4000.0, &config), Some(Pitch(107)));
    }

    #[test]
    fn test_pitch_range_rejection_reports_semitone() {
        // 25 Hz passes the cutoff but quantizes below A0
        let config = PitchConfig::default();
        let peak = FrequencyPeak {
            frequency_hz: 25.0,
            magnitude: 1.0,
        };
        match map_peak(&peak, &config) {
            Err(PeakRejection::PitchOutOfRange { semitone, .. }) => assert_eq!(semitone, 19),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_fixed_split() {
        let split = FixedSplit::default();
        assert_eq!(split.classify(Pitch(60)), Voice::Treble);
        assert_eq!(split.classify(Pitch(59)), Voice::Bass);
        assert_eq!(FixedSplit::new(Pitch(48)).classify(Pitch(50)), Voice::Treble);
    }
}
