use crate::{
    audio::{Audio, AudioHandle},
    flags::AbilityFlags,
    mutex::ObjectMutex,
    recall::{
        Chain, RecallHandle,
        container::{ContainerHandle, RecallContainer},
    },
    routing,
    soundcard::Soundcard,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, Weak},
};
use thiserror::Error;

pub type ChannelHandle = Arc<ObjectMutex<Channel>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Output,
    Input,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Output => "output",
            Direction::Input => "input",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "output" => Some(Direction::Output),
            "input" => Some(Direction::Input),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audio file feeding an input channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLink {
    pub filename: String,
    pub audio_channel: usize,
}

/// Step sequencer payload of an input channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub bank_0: usize,
    pub bank_1: usize,
    pub length: usize,
    pub active_steps: BTreeSet<usize>,
}

impl Pattern {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            ..Self::default()
        }
    }

    pub fn toggle(&mut self, step: usize) {
        if step >= self.length {
            return;
        }
        if !self.active_steps.remove(&step) {
            self.active_steps.insert(step);
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("cannot link two {0} channels")]
    SameDirection(Direction),
    #[error("linking {from} to {to} would loop signal back into {from}")]
    Loop { from: String, to: String },
    #[error("channel no longer belongs to an audio")]
    Stale,
}

#[derive(Debug)]
pub struct Channel {
    pub audio: Weak<ObjectMutex<Audio>>,
    pub direction: Direction,
    pub pad: usize,
    pub audio_channel: usize,
    pub line: usize,
    pub ability: AbilityFlags,
    pub link: Option<Weak<ObjectMutex<Channel>>>,
    pub soundcard: Option<Arc<Soundcard>>,
    pub play: Vec<RecallHandle>,
    pub recall: Vec<RecallHandle>,
    pub containers: Vec<Weak<ObjectMutex<RecallContainer>>>,
    pub file_link: Option<FileLink>,
    pub pattern: Option<Pattern>,
}

impl Channel {
    pub fn new(
        audio: Weak<ObjectMutex<Audio>>,
        direction: Direction,
        pad: usize,
        audio_channel: usize,
        line: usize,
    ) -> Self {
        Self {
            audio,
            direction,
            pad,
            audio_channel,
            line,
            ability: AbilityFlags::empty(),
            link: None,
            soundcard: None,
            play: vec![],
            recall: vec![],
            containers: vec![],
            file_link: None,
            pattern: None,
        }
    }

    pub fn handle(self) -> ChannelHandle {
        Arc::new(ObjectMutex::new(self))
    }

    pub fn link(&self) -> Option<ChannelHandle> {
        self.link.as_ref().and_then(Weak::upgrade)
    }

    pub fn chain(&self, chain: Chain) -> &[RecallHandle] {
        match chain {
            Chain::Play => &self.play,
            Chain::Recall => &self.recall,
        }
    }

    pub fn add_recall(&mut self, recall: RecallHandle, chain: Chain) {
        match chain {
            Chain::Play => self.play.push(recall),
            Chain::Recall => self.recall.push(recall),
        }
    }

    pub fn remove_recall(&mut self, recall: &RecallHandle) -> bool {
        let before = self.play.len() + self.recall.len();
        self.play.retain(|r| !Arc::ptr_eq(r, recall));
        self.recall.retain(|r| !Arc::ptr_eq(r, recall));
        before != self.play.len() + self.recall.len()
    }

    pub fn add_recall_container(&mut self, container: &ContainerHandle) {
        if !self.has_recall_container(container) {
            self.containers.push(Arc::downgrade(container));
        }
    }

    pub fn remove_recall_container(&mut self, container: &ContainerHandle) {
        self.containers
            .retain(|c| c.strong_count() > 0 && !std::ptr::eq(c.as_ptr(), Arc::as_ptr(container)));
    }

    pub fn has_recall_container(&self, container: &ContainerHandle) -> bool {
        self.containers
            .iter()
            .any(|c| std::ptr::eq(c.as_ptr(), Arc::as_ptr(container)))
    }
}

/// Audio identity used as a node of the routing graph.
#[derive(Clone)]
struct AudioNode(AudioHandle);

impl PartialEq for AudioNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for AudioNode {}

impl Hash for AudioNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0), state);
    }
}

fn downstream_audios(audio: &AudioHandle) -> Vec<AudioNode> {
    let outputs = audio.lock().outputs.clone();
    outputs
        .iter()
        .filter_map(|output| output.lock().link())
        .filter_map(|input| input.lock().audio.upgrade())
        .map(AudioNode)
        .collect()
}

/// Links `channel` to `link`, or unlinks it when `link` is `None`.
///
/// Links are symmetric and always join an output with an input of another
/// audio. Former partners of both ends are released.
pub fn set_link(channel: &ChannelHandle, link: Option<&ChannelHandle>) -> Result<(), LinkError> {
    let Some(link) = link else {
        unlink(channel);
        return Ok(());
    };

    let current = channel.lock().link();
    if current.is_some_and(|current| Arc::ptr_eq(&current, link)) {
        return Ok(());
    }

    let direction = channel.lock().direction;
    if direction == link.lock().direction {
        return Err(LinkError::SameDirection(direction));
    }
    let (output, input) = match direction {
        Direction::Output => (channel, link),
        Direction::Input => (link, channel),
    };

    let from = output.lock().audio.upgrade().ok_or(LinkError::Stale)?;
    let to = input.lock().audio.upgrade().ok_or(LinkError::Stale)?;
    if routing::would_create_cycle(
        &AudioNode(from.clone()),
        &AudioNode(to.clone()),
        |node| downstream_audios(&node.0),
    ) {
        let from = from.lock().name.clone();
        let to = to.lock().name.clone();
        return Err(LinkError::Loop { from, to });
    }

    unlink(channel);
    unlink(link);
    channel.lock().link = Some(Arc::downgrade(link));
    link.lock().link = Some(Arc::downgrade(channel));
    Ok(())
}

pub fn unlink(channel: &ChannelHandle) {
    let partner = channel.lock().link.take().and_then(|l| l.upgrade());
    if let Some(partner) = partner {
        let mut partner = partner.lock();
        let points_back = partner
            .link()
            .is_some_and(|back| Arc::ptr_eq(&back, channel));
        if points_back {
            partner.link = None;
        }
    }
}
