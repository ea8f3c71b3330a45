//! Live microphone capture feeding the analyser

use super::source::{run_graph_loop, GraphCommand, GraphError, GraphParts};
use super::{Analyser, AudioConfig, PlaybackOutcome};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use parking_lot::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;

pub(super) fn spawn(
    device_name: Option<String>,
    config: &AudioConfig,
) -> Result<GraphParts, GraphError> {
    let analyser = Arc::new(Mutex::new(Analyser::new(config, config.sample_rate)));
    let (command_tx, command_rx) = mpsc::channel();
    let (ready_tx, ready_rx) = oneshot::channel();
    let (ended_tx, ended_rx) = oneshot::channel();

    let config = config.clone();
    let analyser_clone = analyser.clone();
    let thread = thread::Builder::new()
        .name("live-capture".to_string())
        .spawn(move || {
            run_capture_thread(device_name, config, analyser_clone, command_rx, ready_tx, ended_tx)
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

fn run_capture_thread(
    device_name: Option<String>,
    config: AudioConfig,
    analyser: Arc<Mutex<Analyser>>,
    command_rx: Receiver<GraphCommand>,
    ready_tx: oneshot::Sender<Result<(), GraphError>>,
    ended_tx: oneshot::Sender<PlaybackOutcome>,
) {
    let started = Arc::new(AtomicBool::new(true));
    // Capture has no natural end; it runs until stopped.
    let finished = Arc::new(AtomicBool::new(false));

    let stream = match init_capture(device_name, &config, &analyser) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    let _ = ready_tx.send(Ok(()));

    let outcome = run_graph_loop(&command_rx, &started, &finished);
    drop(stream);
    log::info!("live capture stopped");
    let _ = ended_tx.send(outcome);
}

fn init_capture(
    device_name: Option<String>,
    config: &AudioConfig,
    analyser: &Arc<Mutex<Analyser>>,
) -> Result<Stream, GraphError> {
    let host = cpal::default_host();

    let device = match device_name {
        Some(name) => host
            .input_devices()
            .map_err(|e| GraphError::Config(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or(GraphError::DeviceNotFound(name))?,
        None => host
            .default_input_device()
            .ok_or(GraphError::NoInputDevice)?,
    };

    let device_config = device
        .default_input_config()
        .map_err(|e| GraphError::Config(e.to_string()))?;

    let sample_rate = device_config.sample_rate().0;
    let channels = device_config.channels() as usize;
    log::info!("live capture: {} Hz, {} channels", sample_rate, channels);

    *analyser.lock() = Analyser::new(config, sample_rate);

    let stream = match device_config.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(
            &device,
            &device_config.into(),
            channels,
            analyser.clone(),
        ),
        SampleFormat::I16 => build_stream::<i16>(
            &device,
            &device_config.into(),
            channels,
            analyser.clone(),
        ),
        SampleFormat::U16 => build_stream::<u16>(
            &device,
            &device_config.into(),
            channels,
            analyser.clone(),
        ),
        other => return Err(GraphError::UnsupportedFormat(format!("{other:?}"))),
    }
    .map_err(|e| GraphError::Stream(e.to_string()))?;

    stream.play().map_err(|e| GraphError::Play(e.to_string()))?;

    Ok(stream)
}

/// Build the input stream for a given sample type, downmixing to mono.
///
/// The capture path feeds the analyser only; there is no output leg, so a
/// microphone next to a speaker cannot feed back.
fn build_stream<T: cpal::Sample + cpal::SizedSample>(
    device: &Device,
    stream_config: &StreamConfig,
    channels: usize,
    analyser: Arc<Mutex<Analyser>>,
) -> Result<Stream, cpal::BuildStreamError>
where
    f32: cpal::FromSample<T>,
{
    let channels = channels.max(1);
    device.build_input_stream(
        stream_config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let mono: Vec<f32> = data
                .chunks(channels)
                .map(|frame| {
                    let sum: f32 = frame
                        .iter()
                        .map(|s| <f32 as cpal::Sample>::from_sample(*s))
                        .sum();
                    sum / channels as f32
                })
                .collect();

            analyser.lock().push_samples(&mono);
        },
        |err| {
            log::error!("capture stream error: {}", err);
        },
        None,
    )
}
