//! Spectral processing utilities (STFT, windowing, flux, peak interpolation)

use crate::analysis::SpectralFrame;
use ndarray::Array2;
use rustfft::{num_complex::Complex32, FftPlanner};

/// STFT data structure
#[derive(Debug, Clone)]
pub struct StftData {
    pub s: Array2<Complex32>,
    pub freqs: Vec<f32>,
    pub times: Vec<f32>,
}

impl StftData {
    pub fn n_frames(&self) -> usize {
        self.s.shape()[1]
    }
}

/// Compute STFT of audio signal. Signals shorter than `n_fft` yield zero frames.
pub fn stft(y: &[f32], n_fft: usize, hop_length: usize, window: &str, sample_rate: u32) -> StftData {
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n_fft);

    let n_frames = if y.len() < n_fft {
        0
    } else {
        (y.len() - n_fft) / hop_length + 1
    };
    let mut s = Array2::<Complex32>::zeros((n_fft / 2 + 1, n_frames));

    let window_fn = generate_window(window, n_fft);

    for frame_idx in 0..n_frames {
        let start = frame_idx * hop_length;
        let end = start + n_fft;

        let mut frame: Vec<Complex32> = y[start..end]
            .iter()
            .zip(&window_fn)
            .map(|(&sample, &win)| Complex32::new(sample * win, 0.0))
            .collect();

        fft.process(&mut frame);

        // Store positive frequencies
        for (i, &val) in frame[..n_fft / 2 + 1].iter().enumerate() {
            s[[i, frame_idx]] = val;
        }
    }

    let freqs: Vec<f32> = (0..n_fft / 2 + 1)
        .map(|i| i as f32 * sample_rate as f32 / n_fft as f32)
        .collect();

    let times: Vec<f32> = (0..n_frames)
        .map(|i| i as f32 * hop_length as f32 / sample_rate as f32)
        .collect();

    StftData { s, freqs, times }
}

/// Generate window function
pub fn generate_window(window_type: &str, size: usize) -> Vec<f32> {
    match window_type {
        "hann" if size > 1 => (0..size)
            .map(|i| {
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
            })
            .collect(),
        _ => vec![1.0; size], // Rectangular window as fallback
    }
}

/// Compute magnitude spectrogram
pub fn magnitude_spectrogram(stft_data: &StftData) -> Array2<f32> {
    stft_data.s.map(|c| c.norm())
}

/// Compute spectral flux (positive differences only).
///
/// The first frame is compared against silence, so a note sounding from
/// the first sample still produces a flux peak.
pub fn spectral_flux(mag_spec: &Array2<f32>) -> Vec<f32> {
    let n_frames = mag_spec.shape()[1];
    let mut flux = vec![0.0; n_frames];

    for t in 0..n_frames {
        let mut frame_flux = 0.0;
        for f in 0..mag_spec.shape()[0] {
            let previous = if t == 0 { 0.0 } else { mag_spec[[f, t - 1]] };
            let diff = mag_spec[[f, t]] - previous;
            if diff > 0.0 {
                frame_flux += diff;
            }
        }
        flux[t] = frame_flux;
    }

    flux
}

/// Magnitude spectrum of one window over positive frequencies only.
///
/// The window is DC-centred, Hann-tapered and zero padded to the next power
/// of two. Magnitudes are divided by the window's coherent gain so that a
/// sine of amplitude `A` peaks close to `A`.
pub fn magnitude_spectrum(window: &[f32], sample_rate: u32) -> SpectralFrame {
    if window.is_empty() {
        return SpectralFrame {
            freqs: Vec::new(),
            magnitudes: Vec::new(),
        };
    }

    let n = window.len();
    let n_fft = n.next_power_of_two().max(2);

    let mean = window.iter().sum::<f32>() / n as f32;
    let taper = generate_window("hann", n);
    let coherent_gain: f32 = taper.iter().sum::<f32>().max(f32::EPSILON);

    let mut buffer: Vec<Complex32> = window
        .iter()
        .zip(&taper)
        .map(|(&x, &w)| Complex32::new((x - mean) * w, 0.0))
        .collect();
    buffer.resize(n_fft, Complex32::new(0.0, 0.0));

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n_fft);
    fft.process(&mut buffer);

    // Negative-frequency mirror is discarded
    let half = n_fft / 2;
    let scale = 2.0 / coherent_gain;
    let magnitudes: Vec<f32> = buffer[..half].iter().map(|c| c.norm() * scale).collect();
    let freqs: Vec<f32> = (0..half)
        .map(|i| i as f32 * sample_rate as f32 / n_fft as f32)
        .collect();

    SpectralFrame { freqs, magnitudes }
}

/// Sub-bin peak position by parabolic interpolation over log magnitudes.
/// Returns the fractional bin offset in [-0.5, 0.5].
pub fn interpolate_peak(magnitudes: &[f32], peak_bin: usize) -> f32 {
    if peak_bin == 0 || peak_bin + 1 >= magnitudes.len() {
        return 0.0;
    }

    let y1 = magnitudes[peak_bin - 1].max(f32::MIN_POSITIVE).ln();
    let y2 = magnitudes[peak_bin].max(f32::MIN_POSITIVE).ln();
    let y3 = magnitudes[peak_bin + 1].max(f32::MIN_POSITIVE).ln();

    let denominator = 2.0 * y2 - y1 - y3;
    if !denominator.is_finite() || denominator.abs() < 1e-6 {
        return 0.0;
    }

    ((y3 - y1) / (2.0 * denominator)).clamp(-0.5, 0.5)
}
