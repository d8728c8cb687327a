//! Pass 0: Preflight
//!
//! Checks a decoded buffer against the active configuration before any
//! signal processing runs.

use crate::audio::AudioBuffer;
use crate::config::Config;
use crate::error::{Result, TranscribeError};

/// Below this RMS the buffer is reported as silent
const SILENCE_RMS: f32 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct PreflightReport {
    pub n_samples: usize,
    pub duration_sec: f32,
    pub rms: f32,
    pub peak: f32,
    pub is_silent: bool,
}

pub fn run(buffer: &AudioBuffer, config: &Config) -> Result<PreflightReport> {
    log::info!("Pass 0: Preflight");

    if buffer.is_empty() {
        return Err(TranscribeError::EmptyAudio);
    }

    if buffer.sample_rate() != config.audio.sample_rate {
        return Err(TranscribeError::InvalidConfigParameter(format!(
            "buffer sample rate {} Hz differs from configured {} Hz",
            buffer.sample_rate(),
            config.audio.sample_rate
        )));
    }

    if buffer.len() < config.onset.frame_length {
        log::debug!(
            "  Buffer ({} samples) is shorter than one onset frame, expecting no notes",
            buffer.len()
        );
    }

    let rms = buffer.rms();
    let report = PreflightReport {
        n_samples: buffer.len(),
        duration_sec: buffer.duration_sec(),
        rms,
        peak: buffer.peak(),
        is_silent: rms < SILENCE_RMS,
    };

    if report.is_silent {
        log::info!("  Buffer is silent (RMS {:.2e}), expecting no notes", rms);
    }
    log::info!(
        "  {:.2}s at {} Hz, peak {:.3}",
        report.duration_sec,
        buffer.sample_rate(),
        report.peak
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_passes_preflight() {
        let config = Config::default();
        let buffer = AudioBuffer::new(vec![0.0; 22050], 22050);
        let report = run(&buffer, &config).unwrap();
        assert!(report.is_silent);
        assert_eq!(report.n_samples, 22050);
    }

    #[test]
    fn test_buffer_shorter_than_window_passes_preflight() {
        let config = Config::default();
        // Longer than the onset frame, shorter than the 0.3s analysis window
        let report = run(&AudioBuffer::new(vec![0.1; 2048], 22050), &config).unwrap();
        assert_eq!(report.n_samples, 2048);

        let report = run(&AudioBuffer::new(vec![0.0; 100], 22050), &config).unwrap();
        assert!(report.is_silent);
    }

    #[test]
    fn test_empty_buffer_is_load_failure() {
        let config = Config::default();
        let err = run(&AudioBuffer::new(Vec::new(), 22050), &config).unwrap_err();
        assert!(err.is_load_failure());
    }

    #[test]
    fn test_sample_rate_mismatch_rejected() {
        let config = Config::default();
        let buffer = AudioBuffer::new(vec![0.0; 44100], 44100);
        assert!(run(&buffer, &config).is_err());
    }
}
