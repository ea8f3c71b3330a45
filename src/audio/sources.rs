//! Audio device enumeration and capability probing

use cpal::traits::{DeviceTrait, HostTrait};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A selectable audio device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSource {
    /// Unique identifier (`output:<name>` or `input:<name>`)
    pub id: String,

    /// Display name
    pub name: String,

    /// Device direction
    pub source_type: SourceType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Playback device
    Output,

    /// Capture device (microphone)
    Input,
}

/// Device enumeration errors
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to enumerate devices: {0}")]
    Enumeration(String),
}

/// List available output and input devices.
pub fn list_sources() -> Result<Vec<AudioSource>, SourceError> {
    let host = cpal::default_host();
    let mut sources = Vec::new();

    let outputs = host
        .output_devices()
        .map_err(|e| SourceError::Enumeration(e.to_string()))?;
    for device in outputs {
        if let Ok(name) = device.name() {
            sources.push(AudioSource {
                id: format!("output:{}", name),
                name,
                source_type: SourceType::Output,
            });
        }
    }

    let inputs = host
        .input_devices()
        .map_err(|e| SourceError::Enumeration(e.to_string()))?;
    for device in inputs {
        if let Ok(name) = device.name() {
            sources.push(AudioSource {
                id: format!("input:{}", name),
                name,
                source_type: SourceType::Input,
            });
        }
    }

    Ok(sources)
}

/// What the audio backend can do on this machine.
///
/// Returned as a plain value so the caller decides how to present
/// unavailability; probing never blocks or panics.
#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    /// Backend host name (e.g. "ALSA", "CoreAudio", "WASAPI")
    pub host: String,

    /// Default playback device, if any
    pub default_output: Option<String>,

    /// Default capture device, if any
    pub default_input: Option<String>,
}

impl Capabilities {
    pub fn playback_available(&self) -> bool {
        self.default_output.is_some()
    }

    pub fn capture_available(&self) -> bool {
        self.default_input.is_some()
    }
}

/// Probe the default host for playback and capture devices.
pub fn probe() -> Capabilities {
    let host = cpal::default_host();
    Capabilities {
        host: host.id().name().to_string(),
        default_output: host.default_output_device().and_then(|d| d.name().ok()),
        default_input: host.default_input_device().and_then(|d| d.name().ok()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_reflect_device_presence() {
        let caps = Capabilities {
            host: "test".to_string(),
            default_output: Some("Speakers".to_string()),
            default_input: None,
        };

        assert!(caps.playback_available());
        assert!(!caps.capture_available());
    }

    #[test]
    fn source_type_serializes_snake_case() {
        let source = AudioSource {
            id: "input:Mic".to_string(),
            name: "Mic".to_string(),
            source_type: SourceType::Input,
        };

        let json = serde_json::to_string(&source).unwrap();
        assert!(json.contains("\"source_type\":\"input\""));
    }

    #[test]
    fn probe_does_not_panic() {
        // Device presence varies by machine; only the shape is guaranteed.
        let caps = probe();
        assert!(!caps.host.is_empty());
    }
}
