//! Shared analysis node: ring buffer of recent samples plus byte snapshots

use super::AudioConfig;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Circular buffer of the most recent mono samples
pub struct AudioBuffer {
    samples: Vec<f32>,
    write_pos: usize,
}

impl AudioBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity.max(1)],
            write_pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn push(&mut self, data: &[f32]) {
        for &sample in data {
            self.samples[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % self.samples.len();
        }
    }

    /// Most recent `count` samples in time order, capped to capacity.
    /// Positions never written read as silence.
    pub fn latest(&self, count: usize) -> Vec<f32> {
        let cap = self.samples.len();
        let count = count.min(cap);
        let start = (self.write_pos + cap - count) % cap;
        (0..count)
            .map(|i| self.samples[(start + i) % cap])
            .collect()
    }
}

/// Analysis node shared between an audio graph (which feeds it) and a render
/// task (which reads it).
///
/// Time-domain snapshots are byte samples centered at 128; frequency-domain
/// snapshots are dB-scaled byte magnitudes, one per bin, exponentially
/// smoothed across frames.
pub struct Analyser {
    fft_size: usize,
    sample_rate: u32,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    buffer: AudioBuffer,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
}

impl Analyser {
    pub fn new(config: &AudioConfig, sample_rate: u32) -> Self {
        let fft_size = config.fft_size;

        // Hann window
        let window: Vec<f32> = (0..fft_size)
            .map(|i| {
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (fft_size - 1) as f32).cos())
            })
            .collect();

        Self {
            fft_size,
            sample_rate,
            smoothing: config.smoothing,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
            buffer: AudioBuffer::new(fft_size),
            fft: FftPlanner::new().plan_fft_forward(fft_size),
            window,
            smoothed: vec![0.0; fft_size / 2],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of frequency bins, half the window size.
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Feed mono samples from a stream callback.
    pub fn push_samples(&mut self, samples: &[f32]) {
        self.buffer.push(samples);
    }

    /// Latest window as bytes: 128 * (1 + s), clamped to 0..=255.
    /// Silence maps to 128.
    pub fn time_domain_bytes(&self) -> Vec<u8> {
        self.buffer
            .latest(self.fft_size)
            .iter()
            .map(|&s| (128.0 * (1.0 + s)).clamp(0.0, 255.0) as u8)
            .collect()
    }

    /// Magnitude-per-bin bytes for the latest window.
    ///
    /// Updates the smoothing state, so successive calls on a steady signal
    /// converge toward its spectrum.
    pub fn frequency_bytes(&mut self) -> Vec<u8> {
        let mut buf: Vec<Complex<f32>> = self
            .buffer
            .latest(self.fft_size)
            .iter()
            .zip(self.window.iter())
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();

        self.fft.process(&mut buf);

        let scale = 1.0 / self.fft_size as f32;
        for (smoothed, c) in self.smoothed.iter_mut().zip(buf.iter()) {
            let magnitude = c.norm() * scale;
            *smoothed = self.smoothing * *smoothed + (1.0 - self.smoothing) * magnitude;
        }

        let range = self.max_decibels - self.min_decibels;
        self.smoothed
            .iter()
            .map(|&m| {
                if m <= 0.0 {
                    return 0;
                }
                let db = 20.0 * m.log10();
                (255.0 * (db - self.min_decibels) / range).clamp(0.0, 255.0) as u8
            })
            .collect()
    }
}
