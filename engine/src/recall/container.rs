use super::{Family, RecallHandle, next_id};
use crate::mutex::ObjectMutex;
use std::sync::Arc;

pub type ContainerHandle = Arc<ObjectMutex<RecallContainer>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerSlot {
    AudioTemplate,
    AudioRun,
    ChannelTemplate,
    ChannelRun,
}

impl ContainerSlot {
    pub fn is_audio(self) -> bool {
        matches!(self, ContainerSlot::AudioTemplate | ContainerSlot::AudioRun)
    }
}

/// Correlates the recalls that together form one effect instance.
///
/// Holds the audio-level template and run, plus the channel-level template
/// and run set last. Channels keep the full per-channel lists.
#[derive(Debug, Default)]
pub struct RecallContainer {
    pub id: u64,
    is_play: bool,
    audio_template: Option<RecallHandle>,
    audio_run: Option<RecallHandle>,
    channel_template: Option<RecallHandle>,
    channel_run: Option<RecallHandle>,
}

impl RecallContainer {
    pub fn new() -> Self {
        Self {
            id: next_id(),
            ..Self::default()
        }
    }

    pub fn handle(self) -> ContainerHandle {
        Arc::new(ObjectMutex::new(self))
    }

    pub fn is_play(&self) -> bool {
        self.is_play
    }

    pub fn set_play(&mut self, is_play: bool) {
        self.is_play = is_play;
    }

    fn slot_mut(&mut self, slot: ContainerSlot) -> &mut Option<RecallHandle> {
        match slot {
            ContainerSlot::AudioTemplate => &mut self.audio_template,
            ContainerSlot::AudioRun => &mut self.audio_run,
            ContainerSlot::ChannelTemplate => &mut self.channel_template,
            ContainerSlot::ChannelRun => &mut self.channel_run,
        }
    }

    pub fn slot(&self, slot: ContainerSlot) -> Option<RecallHandle> {
        match slot {
            ContainerSlot::AudioTemplate => self.audio_template.clone(),
            ContainerSlot::AudioRun => self.audio_run.clone(),
            ContainerSlot::ChannelTemplate => self.channel_template.clone(),
            ContainerSlot::ChannelRun => self.channel_run.clone(),
        }
    }

    /// Stores `recall` in `slot`, returning the previous occupant.
    ///
    /// An audio slot holds one recall per container; replacing it with a
    /// different recall trips a debug assertion and silently overwrites in
    /// release builds.
    pub fn set_slot(&mut self, slot: ContainerSlot, recall: RecallHandle) -> Option<RecallHandle> {
        let previous = self.slot_mut(slot).replace(recall.clone());
        debug_assert!(
            !slot.is_audio()
                || previous
                    .as_ref()
                    .is_none_or(|previous| Arc::ptr_eq(previous, &recall)),
            "audio slot {slot:?} of container {} already occupied",
            self.id
        );
        previous
    }

    pub fn audio_template(&self) -> Option<RecallHandle> {
        self.slot(ContainerSlot::AudioTemplate)
    }

    pub fn audio_run(&self) -> Option<RecallHandle> {
        self.slot(ContainerSlot::AudioRun)
    }

    pub fn channel_template(&self) -> Option<RecallHandle> {
        self.slot(ContainerSlot::ChannelTemplate)
    }

    pub fn channel_run(&self) -> Option<RecallHandle> {
        self.slot(ContainerSlot::ChannelRun)
    }

    pub fn clear(&mut self) {
        self.audio_template = None;
        self.audio_run = None;
        self.channel_template = None;
        self.channel_run = None;
    }

    fn occupants(&self) -> impl Iterator<Item = &RecallHandle> {
        [
            &self.audio_template,
            &self.audio_run,
            &self.channel_template,
            &self.channel_run,
        ]
        .into_iter()
        .flatten()
    }
}

/// Family of the effect a container groups, read from any occupied slot.
pub fn family(container: &ContainerHandle) -> Option<Family> {
    let occupant = container.lock().occupants().next().cloned()?;
    let family = occupant.lock().kind.family;
    Some(family)
}
