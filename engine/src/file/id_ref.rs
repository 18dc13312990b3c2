use super::document::NodeId;
use crate::{
    audio::AudioHandle, channel::ChannelHandle, recall::RecallHandle,
    recall::container::ContainerHandle, soundcard::Soundcard,
};
use std::{fmt, sync::Arc};

/// Live object a document node stands for.
#[derive(Clone)]
pub enum FileObject {
    Audio(AudioHandle),
    Channel(ChannelHandle),
    Container(ContainerHandle),
    Recall(RecallHandle),
    Soundcard(Arc<Soundcard>),
}

impl FileObject {
    /// Identity comparison.
    pub fn same_as(&self, other: &FileObject) -> bool {
        match (self, other) {
            (FileObject::Audio(a), FileObject::Audio(b)) => Arc::ptr_eq(a, b),
            (FileObject::Channel(a), FileObject::Channel(b)) => Arc::ptr_eq(a, b),
            (FileObject::Container(a), FileObject::Container(b)) => Arc::ptr_eq(a, b),
            (FileObject::Recall(a), FileObject::Recall(b)) => Arc::ptr_eq(a, b),
            (FileObject::Soundcard(a), FileObject::Soundcard(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FileObject::Audio(_) => "audio",
            FileObject::Channel(_) => "channel",
            FileObject::Container(_) => "recall-container",
            FileObject::Recall(_) => "recall",
            FileObject::Soundcard(_) => "soundcard",
        }
    }

    pub fn as_audio(&self) -> Option<&AudioHandle> {
        match self {
            FileObject::Audio(audio) => Some(audio),
            _ => None,
        }
    }

    pub fn as_channel(&self) -> Option<&ChannelHandle> {
        match self {
            FileObject::Channel(channel) => Some(channel),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<&ContainerHandle> {
        match self {
            FileObject::Container(container) => Some(container),
            _ => None,
        }
    }
}

impl fmt::Debug for FileObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let address = match self {
            FileObject::Audio(a) => Arc::as_ptr(a) as *const (),
            FileObject::Channel(c) => Arc::as_ptr(c) as *const (),
            FileObject::Container(c) => Arc::as_ptr(c) as *const (),
            FileObject::Recall(r) => Arc::as_ptr(r) as *const (),
            FileObject::Soundcard(s) => Arc::as_ptr(s) as *const (),
        };
        write!(f, "{}@{:p}", self.kind(), address)
    }
}

/// Binds a document node to the object it represents for one session.
#[derive(Debug, Clone)]
pub struct IdRef {
    pub node: NodeId,
    /// Expression that selects `node` in a later read, when the node has
    /// an `id` attribute.
    pub xpath: Option<String>,
    pub reference: FileObject,
}
