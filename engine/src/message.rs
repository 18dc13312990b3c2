use crate::{
    channel::Direction, flags::CreateFlags, plugin::PluginRef, state::AudioSummary,
};
use std::{ops::Range, path::PathBuf};
use tokio::sync::mpsc::Sender;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelAddress {
    pub audio: String,
    pub direction: Direction,
    pub line: usize,
}

impl ChannelAddress {
    pub fn new(audio: &str, direction: Direction, line: usize) -> Self {
        Self {
            audio: audio.to_string(),
            direction,
            line,
        }
    }
}

#[derive(Clone, Debug)]
pub enum Action {
    Quit,
    AddAudio {
        name: String,
        audio_channels: usize,
        output_pads: usize,
        input_pads: usize,
    },
    RemoveAudio(String),
    ResizePads {
        audio: String,
        direction: Direction,
        pads: usize,
    },
    ResizeAudioChannels {
        audio: String,
        audio_channels: usize,
    },
    LinkChannel {
        channel: ChannelAddress,
        link: Option<ChannelAddress>,
    },
    CreateRecall {
        audio: String,
        family: String,
        channels: Range<usize>,
        pads: Range<usize>,
        flags: CreateFlags,
        plugin: Option<PluginRef>,
    },
    RecallsCreated {
        audio: String,
        family: String,
        recalls: usize,
        containers: Vec<u64>,
        warnings: Vec<String>,
    },
    RemoveEffect {
        audio: String,
        container: u64,
    },
    SaveProject(PathBuf),
    ProjectSaved {
        path: PathBuf,
        diagnostics: Vec<String>,
    },
    LoadProject(PathBuf),
    ProjectLoaded {
        path: PathBuf,
        audios: usize,
        diagnostics: Vec<String>,
    },
    Describe,
    Description(Vec<AudioSummary>),
}

#[derive(Clone, Debug)]
pub enum Message {
    Channel(Sender<Self>),

    Request(Action),
    Response(Result<Action, String>),
}
