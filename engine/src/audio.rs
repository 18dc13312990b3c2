use crate::{
    channel::{self, Channel, ChannelHandle, Direction},
    flags::{AbilityFlags, BehaviourFlags},
    mutex::ObjectMutex,
    recall::{Chain, RecallHandle, container::ContainerHandle},
    soundcard::Soundcard,
};
use std::sync::{Arc, Weak};
use tracing::debug;

pub type AudioHandle = Arc<ObjectMutex<Audio>>;

/// One track: a grid of output and input channels plus the audio-level
/// recall chains and the containers registered on it.
#[derive(Debug)]
pub struct Audio {
    pub name: String,
    pub audio_channels: usize,
    pub output_pads: usize,
    pub input_pads: usize,
    pub ability: AbilityFlags,
    pub behaviour: BehaviourFlags,
    pub outputs: Vec<ChannelHandle>,
    pub inputs: Vec<ChannelHandle>,
    pub play: Vec<RecallHandle>,
    pub recall: Vec<RecallHandle>,
    pub containers: Vec<ContainerHandle>,
    pub soundcard: Option<Arc<Soundcard>>,
    pub connected: bool,
}

fn build_channels(
    audio: &Weak<ObjectMutex<Audio>>,
    direction: Direction,
    pads: std::ops::Range<usize>,
    audio_channels: usize,
    soundcard: &Option<Arc<Soundcard>>,
) -> Vec<ChannelHandle> {
    let mut channels = Vec::with_capacity(pads.len() * audio_channels);
    for pad in pads {
        for audio_channel in 0..audio_channels {
            let mut channel = Channel::new(
                audio.clone(),
                direction,
                pad,
                audio_channel,
                pad * audio_channels + audio_channel,
            );
            channel.soundcard = soundcard.clone();
            channels.push(channel.handle());
        }
    }
    channels
}

impl Audio {
    pub fn create(
        name: String,
        audio_channels: usize,
        output_pads: usize,
        input_pads: usize,
    ) -> AudioHandle {
        Arc::new_cyclic(|weak| {
            ObjectMutex::new(Audio {
                name,
                audio_channels,
                output_pads,
                input_pads,
                ability: AbilityFlags::empty(),
                behaviour: BehaviourFlags::empty(),
                outputs: build_channels(weak, Direction::Output, 0..output_pads, audio_channels, &None),
                inputs: build_channels(weak, Direction::Input, 0..input_pads, audio_channels, &None),
                play: vec![],
                recall: vec![],
                containers: vec![],
                soundcard: None,
                connected: false,
            })
        })
    }

    pub fn channels(&self, direction: Direction) -> &[ChannelHandle] {
        match direction {
            Direction::Output => &self.outputs,
            Direction::Input => &self.inputs,
        }
    }

    fn channels_mut(&mut self, direction: Direction) -> &mut Vec<ChannelHandle> {
        match direction {
            Direction::Output => &mut self.outputs,
            Direction::Input => &mut self.inputs,
        }
    }

    pub fn pads(&self, direction: Direction) -> usize {
        match direction {
            Direction::Output => self.output_pads,
            Direction::Input => self.input_pads,
        }
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

    pub fn add_recall_container(&mut self, container: ContainerHandle) {
        if !self.containers.iter().any(|c| Arc::ptr_eq(c, &container)) {
            self.containers.push(container);
        }
    }

    pub fn remove_recall_container(&mut self, container: &ContainerHandle) -> bool {
        let before = self.containers.len();
        self.containers.retain(|c| !Arc::ptr_eq(c, container));
        before != self.containers.len()
    }
}

pub fn set_soundcard(audio: &AudioHandle, soundcard: Option<Arc<Soundcard>>) {
    let channels = {
        let mut audio = audio.lock();
        audio.soundcard = soundcard.clone();
        all_channels(&audio)
    };
    for channel in channels {
        channel.lock().soundcard = soundcard.clone();
    }
}

fn all_channels(audio: &Audio) -> Vec<ChannelHandle> {
    audio
        .outputs
        .iter()
        .chain(audio.inputs.iter())
        .cloned()
        .collect()
}

/// Releases a channel that left its audio: links, recalls and container
/// registrations go with it.
fn detach_channel(channel: &ChannelHandle) {
    channel::unlink(channel);
    let mut channel = channel.lock();
    channel.play.clear();
    channel.recall.clear();
    channel.containers.clear();
    channel.audio = Weak::new();
}

/// Grows or shrinks the pad count of one direction. Returns the channels
/// that were removed.
pub fn set_pads(audio: &AudioHandle, direction: Direction, pads: usize) -> Vec<ChannelHandle> {
    let weak = Arc::downgrade(audio);
    let removed = {
        let mut guard = audio.lock();
        let audio_channels = guard.audio_channels;
        let current = guard.pads(direction);
        let soundcard = guard.soundcard.clone();
        match direction {
            Direction::Output => guard.output_pads = pads,
            Direction::Input => guard.input_pads = pads,
        }
        let list = guard.channels_mut(direction);
        if pads >= current {
            list.extend(build_channels(
                &weak,
                direction,
                current..pads,
                audio_channels,
                &soundcard,
            ));
            vec![]
        } else {
            list.split_off(pads * audio_channels)
        }
    };
    for channel in &removed {
        detach_channel(channel);
    }
    debug!("{direction} pads set to {pads}, {} channels removed", removed.len());
    removed
}

/// Changes the channel count of every pad, renumbering lines. Existing
/// channels keep their recalls and links. Returns the removed channels.
pub fn set_audio_channels(audio: &AudioHandle, audio_channels: usize) -> Vec<ChannelHandle> {
    let weak = Arc::downgrade(audio);
    let (previous, soundcard) = {
        let audio = audio.lock();
        (audio.audio_channels, audio.soundcard.clone())
    };
    let mut removed = vec![];
    for direction in [Direction::Output, Direction::Input] {
        let (old, pads) = {
            let audio = audio.lock();
            (audio.channels(direction).to_vec(), audio.pads(direction))
        };
        let mut rebuilt = Vec::with_capacity(pads * audio_channels);
        for pad in 0..pads {
            for audio_channel in 0..audio_channels {
                let line = pad * audio_channels + audio_channel;
                let kept = (audio_channel < previous)
                    .then(|| old.get(pad * previous + audio_channel))
                    .flatten();
                match kept {
                    Some(channel) => {
                        channel.lock().line = line;
                        rebuilt.push(channel.clone());
                    }
                    None => {
                        let mut channel = Channel::new(weak.clone(), direction, pad, audio_channel, line);
                        channel.soundcard = soundcard.clone();
                        rebuilt.push(channel.handle());
                    }
                }
            }
            for audio_channel in audio_channels..previous {
                if let Some(channel) = old.get(pad * previous + audio_channel) {
                    removed.push(channel.clone());
                }
            }
        }
        *audio.lock().channels_mut(direction) = rebuilt;
    }
    audio.lock().audio_channels = audio_channels;
    for channel in &removed {
        detach_channel(channel);
    }
    removed
}

fn belongs_to(recall: &RecallHandle, container: &ContainerHandle) -> bool {
    recall
        .lock()
        .container()
        .is_some_and(|c| Arc::ptr_eq(&c, container))
}

/// Removes one effect instance: every recall placed in `container` is
/// detached from the audio and its channels, then the container itself is
/// unregistered and emptied. Returns the number of detached recalls.
pub fn remove_effect(audio: &AudioHandle, container: &ContainerHandle) -> usize {
    let (channels, audio_recalls) = {
        let audio = audio.lock();
        let recalls: Vec<RecallHandle> = audio.play.iter().chain(audio.recall.iter()).cloned().collect();
        (all_channels(&audio), recalls)
    };

    let mut detached = 0;
    for channel in &channels {
        let recalls: Vec<RecallHandle> = {
            let channel = channel.lock();
            channel.play.iter().chain(channel.recall.iter()).cloned().collect()
        };
        let doomed: Vec<RecallHandle> = recalls
            .into_iter()
            .filter(|r| belongs_to(r, container))
            .collect();
        let mut channel = channel.lock();
        for recall in &doomed {
            if channel.remove_recall(recall) {
                detached += 1;
            }
        }
        channel.remove_recall_container(container);
    }

    let doomed: Vec<RecallHandle> = audio_recalls
        .into_iter()
        .filter(|r| belongs_to(r, container))
        .collect();
    {
        let mut audio = audio.lock();
        for recall in &doomed {
            if audio.remove_recall(recall) {
                detached += 1;
            }
        }
        audio.remove_recall_container(container);
    }
    container.lock().clear();
    debug!("removed effect container with {detached} recalls");
    detached
}
