use serde::{Deserialize, Serialize};

/// Output device descriptor shared by audios, channels and recalls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Soundcard {
    pub name: String,
    pub samplerate: u32,
    pub buffer_size: usize,
    pub pcm_channels: usize,
}

impl Default for Soundcard {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            samplerate: 48_000,
            buffer_size: 512,
            pcm_channels: 2,
        }
    }
}
