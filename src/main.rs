//! Demo CLI: play, record, and visualize audio through the graph variants.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use wavescope::audio::{self, AudioConfig, PlaybackOutcome};
use wavescope::render::RenderMode;
use wavescope::state::Controller;

#[derive(Parser, Debug)]
#[command(name = "wavescope")]
#[command(about = "Tone playback, recording, and live audio visualization", long_about = None)]
struct Args {
    /// Canvas width in pixels
    #[arg(long, default_value_t = 640)]
    width: usize,

    /// Canvas height in pixels
    #[arg(long, default_value_t = 100)]
    height: usize,

    /// Write the final canvas frame to this PNG file
    #[arg(long, value_name = "FILE")]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List audio devices
    Devices {
        /// Print the device list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Play a tone and visualize its waveform
    Tone {
        /// Tone frequency in Hz
        #[arg(long, default_value_t = 18_000.0)]
        freq: f32,

        /// Tone duration in seconds
        #[arg(long, default_value_t = 3.0)]
        duration: f32,
    },

    /// Play a tone while recording it to a WAV artifact
    Record {
        #[arg(long, default_value_t = 18_000.0)]
        freq: f32,

        #[arg(long, default_value_t = 3.0)]
        duration: f32,

        /// Directory the artifact is written to
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Play a WAV file and visualize it
    Play {
        /// Path to the WAV file
        file: PathBuf,
    },

    /// Visualize live microphone audio for a while
    Capture {
        /// How long to capture, in seconds
        #[arg(long, default_value_t = 5.0)]
        seconds: f32,

        /// Draw frequency bars instead of the waveform
        #[arg(long)]
        bars: bool,

        /// Capture from a named input device instead of the default
        #[arg(long)]
        device: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(e) = run(Args::parse()).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let caps = audio::probe();
    log::info!("audio host: {}", caps.host);

    let is_capture = matches!(args.command, Command::Capture { .. });
    let controller = Controller::new(args.width, args.height, AudioConfig::default());

    match args.command {
        Command::Devices { json } => return list_devices(json),

        Command::Tone { freq, duration } => {
            require_playback(&caps)?;
            {
                let state = controller.state();
                let mut state = state.lock();
                state.freq = freq;
                state.duration = duration;
            }
            report_outcome(controller.play_tone(false).await?);
        }

        Command::Record {
            freq,
            duration,
            out_dir,
        } => {
            require_playback(&caps)?;
            {
                let state = controller.state();
                let mut state = state.lock();
                state.freq = freq;
                state.duration = duration;
                state.output_dir = out_dir;
            }
            report_outcome(controller.play_tone(true).await?);

            let state = controller.state();
            let recording = state.lock().last_recording.clone();
            match recording {
                Some(artifact) => println!("recorded {}", artifact.path.display()),
                None => println!("no recording was produced"),
            }
        }

        Command::Play { file } => {
            require_playback(&caps)?;
            controller.state().lock().selected_file = Some(file);
            report_outcome(controller.play_file().await?);
        }

        Command::Capture {
            seconds,
            bars,
            device,
        } => {
            if !caps.capture_available() && device.is_none() {
                return Err("no audio input device available".into());
            }
            let mode = if bars {
                RenderMode::FrequencyBars
            } else {
                RenderMode::Waveform
            };
            controller.start_capture(device, mode).await?;
            println!("capturing for {seconds}s...");
            tokio::time::sleep(Duration::from_secs_f32(seconds.max(0.0))).await;
            controller.stop_capture().await;
        }
    }

    if let Some(path) = args.snapshot {
        let canvas = if is_capture {
            controller.capture_canvas()
        } else {
            controller.canvas()
        };
        canvas.lock().save_png(&path)?;
        println!("snapshot written to {}", path.display());
    }

    controller.shutdown().await;
    Ok(())
}

fn require_playback(caps: &audio::Capabilities) -> Result<(), Box<dyn std::error::Error>> {
    if caps.playback_available() {
        Ok(())
    } else {
        Err("no audio output device available".into())
    }
}

fn report_outcome(outcome: PlaybackOutcome) {
    match outcome {
        PlaybackOutcome::Finished => println!("playback finished"),
        PlaybackOutcome::Stopped => println!("playback stopped early"),
    }
}

fn list_devices(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let sources = audio::list_sources()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sources)?);
        return Ok(());
    }

    for source in &sources {
        println!("{:30} {}", source.id, source.name);
    }

    let caps = audio::probe();
    println!();
    println!("host:           {}", caps.host);
    println!(
        "default output: {}",
        caps.default_output.as_deref().unwrap_or("none")
    );
    println!(
        "default input:  {}",
        caps.default_input.as_deref().unwrap_or("none")
    );
    Ok(())
}
