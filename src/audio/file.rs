//! WAV file decoding and playback

use super::source::{run_graph_loop, GraphCommand, GraphError, GraphParts};
use super::{Analyser, AudioConfig, PlaybackOutcome};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;

/// Decoded audio, downmixed to mono.
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decode a WAV file into mono f32 samples.
pub fn decode_wav(path: &Path) -> Result<DecodedAudio, GraphError> {
    let decode_err = |reason: String| GraphError::Decode {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = hound::WavReader::open(path).map_err(|e| decode_err(e.to_string()))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(decode_err("zero channels".into()));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| decode_err(e.to_string()))?,
        hound::SampleFormat::Int => {
            let full_scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / full_scale))
                .collect::<Result<_, _>>()
                .map_err(|e| decode_err(e.to_string()))?
        }
    };

    let samples = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Read position over decoded samples, resampling to the device rate by
/// linear interpolation.
pub struct PlaybackCursor {
    samples: Vec<f32>,
    pos: f64,
    step: f64,
}

impl PlaybackCursor {
    pub fn new(samples: Vec<f32>, source_rate: u32, device_rate: u32) -> Self {
        Self {
            samples,
            pos: 0.0,
            step: source_rate as f64 / device_rate.max(1) as f64,
        }
    }

    /// Next output-rate sample, or `None` once the decoded audio is spent.
    pub fn next_sample(&mut self) -> Option<f32> {
        let index = self.pos as usize;
        if index >= self.samples.len() {
            return None;
        }
        let frac = (self.pos - index as f64) as f32;
        let a = self.samples[index];
        let b = if index + 1 < self.samples.len() {
            self.samples[index + 1]
        } else {
            a
        };
        self.pos += self.step;
        Some(a + (b - a) * frac)
    }

    pub fn is_finished(&self) -> bool {
        self.pos as usize >= self.samples.len()
    }
}

pub(super) async fn spawn(path: PathBuf, config: &AudioConfig) -> Result<GraphParts, GraphError> {
    // Decoding reads the whole file; keep it off the async executor.
    let decode_path = path.clone();
    let decoded = tokio::task::spawn_blocking(move || decode_wav(&decode_path))
        .await
        .map_err(|e| GraphError::Thread(e.to_string()))??;

    log::info!(
        "decoded {}: {} samples at {} Hz",
        path.display(),
        decoded.samples.len(),
        decoded.sample_rate
    );

    let analyser = Arc::new(Mutex::new(Analyser::new(config, config.sample_rate)));
    let (command_tx, command_rx) = mpsc::channel();
    let (ready_tx, ready_rx) = oneshot::channel();
    let (ended_tx, ended_rx) = oneshot::channel();

    let config = config.clone();
    let analyser_clone = analyser.clone();
    let thread = thread::Builder::new()
        .name("file-playback".to_string())
        .spawn(move || {
            run_file_thread(decoded, config, analyser_clone, command_rx, ready_tx, ended_tx)
        })
        .map_err(|e| GraphError::Thread(e.to_string()))?;

    Ok(GraphParts {
        analyser,
        command_tx,
        thread,
        ready_rx,
        ended_rx,
        artifact_rx: None,
    })
}

fn run_file_thread(
    decoded: DecodedAudio,
    config: AudioConfig,
    analyser: Arc<Mutex<Analyser>>,
    command_rx: Receiver<GraphCommand>,
    ready_tx: oneshot::Sender<Result<(), GraphError>>,
    ended_tx: oneshot::Sender<PlaybackOutcome>,
) {
    let started = Arc::new(AtomicBool::new(false));
    let finished = Arc::new(AtomicBool::new(false));

    let stream = match init_file(decoded, &config, &analyser, &started, &finished) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    let _ = ready_tx.send(Ok(()));

    let outcome = run_graph_loop(&command_rx, &started, &finished);
    drop(stream);
    log::info!("file playback {:?}", outcome);
    let _ = ended_tx.send(outcome);
}

fn init_file(
    decoded: DecodedAudio,
    config: &AudioConfig,
    analyser: &Arc<Mutex<Analyser>>,
    started: &Arc<AtomicBool>,
    finished: &Arc<AtomicBool>,
) -> Result<Stream, GraphError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(GraphError::NoOutputDevice)?;
    let device_config = device
        .default_output_config()
        .map_err(|e| GraphError::Config(e.to_string()))?;

    let sample_rate = device_config.sample_rate().0;
    let channels = device_config.channels() as usize;
    log::info!("file playback: {} Hz, {} channels", sample_rate, channels);

    *analyser.lock() = Analyser::new(config, sample_rate);

    let cursor = PlaybackCursor::new(decoded.samples, decoded.sample_rate, sample_rate);

    let stream = match device_config.sample_format() {
        SampleFormat::F32 => build_output::<f32>(
            &device,
            &device_config.into(),
            cursor,
            channels,
            started.clone(),
            finished.clone(),
            analyser.clone(),
        ),
        SampleFormat::I16 => build_output::<i16>(
            &device,
            &device_config.into(),
            cursor,
            channels,
            started.clone(),
            finished.clone(),
            analyser.clone(),
        ),
        SampleFormat::U16 => build_output::<u16>(
            &device,
            &device_config.into(),
            cursor,
            channels,
            started.clone(),
            finished.clone(),
            analyser.clone(),
        ),
        other => return Err(GraphError::UnsupportedFormat(format!("{other:?}"))),
    }
    .map_err(|e| GraphError::Stream(e.to_string()))?;

    stream.play().map_err(|e| GraphError::Play(e.to_string()))?;

    Ok(stream)
}

fn build_output<T>(
    device: &Device,
    stream_config: &StreamConfig,
    mut cursor: PlaybackCursor,
    channels: usize,
    started: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    analyser: Arc<Mutex<Analyser>>,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = channels.max(1);
    device.build_output_stream(
        stream_config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let frames = data.len() / channels;
            let mut mono = Vec::with_capacity(frames);
            let playing = started.load(Ordering::Acquire);

            for frame in 0..frames {
                let sample = if playing {
                    match cursor.next_sample() {
                        Some(s) => s,
                        None => {
                            finished.store(true, Ordering::Release);
                            0.0
                        }
                    }
                } else {
                    0.0
                };

                let value = T::from_sample(sample);
                for ch in 0..channels {
                    data[frame * channels + ch] = value;
                }
                mono.push(sample);
            }

            analyser.lock().push_samples(&mono);
        },
        |err| {
            log::error!("file stream error: {}", err);
        },
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_wav(name: &str, spec: hound::WavSpec, frames: &[Vec<f32>]) -> PathBuf {
        let path =
            std::env::temp_dir().join(format!("wavescope-{}-{}.wav", name, std::process::id()));
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for frame in frames {
            for &sample in frame {
                match spec.sample_format {
                    hound::SampleFormat::Float => writer.write_sample(sample).unwrap(),
                    hound::SampleFormat::Int => {
                        writer.write_sample((sample * 32_767.0) as i16).unwrap()
                    }
                }
            }
        }
        writer.finalize().unwrap();
        path
    }

    #[test]
    fn decode_downmixes_stereo_to_mono() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44_100,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let path = temp_wav(
            "stereo",
            spec,
            &[vec![0.5, -0.5], vec![0.25, 0.75], vec![1.0, 0.0]],
        );

        let decoded = decode_wav(&path).unwrap();
        assert_eq!(decoded.sample_rate, 44_100);
        assert_eq!(decoded.samples, vec![0.0, 0.5, 0.5]);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn decode_scales_int_samples_to_unit_range() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let path = temp_wav("int16", spec, &[vec![1.0], vec![-1.0], vec![0.0]]);

        let decoded = decode_wav(&path).unwrap();
        assert_eq!(decoded.samples.len(), 3);
        assert!((decoded.samples[0] - 1.0).abs() < 1e-3);
        assert!((decoded.samples[1] + 1.0).abs() < 1e-3);
        assert_eq!(decoded.samples[2], 0.0);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn decode_reports_missing_files() {
        let result = decode_wav(Path::new("/nonexistent/audio.wav"));
        assert!(matches!(result, Err(GraphError::Decode { .. })));
    }

    #[test]
    fn cursor_passes_samples_through_at_matching_rates() {
        let samples = vec![0.1, 0.2, 0.3];
        let mut cursor = PlaybackCursor::new(samples.clone(), 48_000, 48_000);

        let mut out = Vec::new();
        while let Some(s) = cursor.next_sample() {
            out.push(s);
        }

        assert_eq!(out, samples);
        assert!(cursor.is_finished());
    }

    #[test]
    fn cursor_upsampling_roughly_doubles_the_output() {
        let samples = vec![0.0; 100];
        let mut cursor = PlaybackCursor::new(samples, 22_050, 44_100);

        let mut count = 0;
        while cursor.next_sample().is_some() {
            count += 1;
        }

        assert!((199..=201).contains(&count), "got {count} samples");
    }

    #[test]
    fn cursor_interpolates_between_source_samples() {
        let mut cursor = PlaybackCursor::new(vec![0.0, 1.0], 22_050, 44_100);

        assert_eq!(cursor.next_sample(), Some(0.0));
        let mid = cursor.next_sample().unwrap();
        assert!((mid - 0.5).abs() < 1e-6);
    }

    #[test]
    fn empty_audio_is_immediately_finished() {
        let mut cursor = PlaybackCursor::new(Vec::new(), 44_100, 44_100);
        assert!(cursor.is_finished());
        assert_eq!(cursor.next_sample(), None);
    }
}
