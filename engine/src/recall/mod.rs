pub mod container;

use crate::{
    audio::Audio,
    channel::{Channel, ChannelHandle},
    flags::{AbilityFlags, RecallFlags},
    mutex::ObjectMutex,
    plugin::{PluginEcosystem, PluginRef},
    soundcard::Soundcard,
};
use container::RecallContainer;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

pub type RecallHandle = Arc<ObjectMutex<Recall>>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// The two parallel processing chains of audios and channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Play,
    Recall,
}

impl Chain {
    pub fn as_str(self) -> &'static str {
        match self {
            Chain::Play => "play",
            Chain::Recall => "recall",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "play" => Some(Chain::Play),
            "recall" => Some(Chain::Recall),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Audio,
    Channel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Template,
    Run,
}

/// How the factory lays a family out over an audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// One audio-level pair per chain.
    Audio,
    /// One channel-level pair per covered channel.
    Channel,
    /// Channel-level pairs, one per source and destination channel.
    Destination,
    /// An audio-level pair plus channel-level pairs.
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    Delay,
    CountBeats,
    Stream,
    RtStream,
    Loop,
    Feed,
    PlayMaster,
    Prepare,
    Copy,
    Buffer,
    Play,
    CopyPattern,
    PlayWave,
    CaptureWave,
    PlayNotation,
    PlayDssi,
    PlayLv2,
    Peak,
    Mute,
    Volume,
    Envelope,
    Ladspa,
    Dssi,
    Lv2,
    RecordMidi,
    RouteDssi,
    RouteLv2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyInfo {
    pub name: &'static str,
    pub layout: Layout,
    pub ability: AbilityFlags,
    /// Type names of the audio template and run.
    pub audio_types: Option<(&'static str, &'static str)>,
    /// Type names of the channel template and run.
    pub channel_types: Option<(&'static str, &'static str)>,
}

const fn audio_family(
    name: &'static str,
    ability: AbilityFlags,
    types: (&'static str, &'static str),
) -> FamilyInfo {
    FamilyInfo {
        name,
        layout: Layout::Audio,
        ability,
        audio_types: Some(types),
        channel_types: None,
    }
}

const fn channel_family(
    name: &'static str,
    layout: Layout,
    ability: AbilityFlags,
    types: (&'static str, &'static str),
) -> FamilyInfo {
    FamilyInfo {
        name,
        layout,
        ability,
        audio_types: None,
        channel_types: Some(types),
    }
}

const fn hybrid_family(
    name: &'static str,
    ability: AbilityFlags,
    audio_types: (&'static str, &'static str),
    channel_types: (&'static str, &'static str),
) -> FamilyInfo {
    FamilyInfo {
        name,
        layout: Layout::Hybrid,
        ability,
        audio_types: Some(audio_types),
        channel_types: Some(channel_types),
    }
}

impl Family {
    pub const ALL: [Family; 27] = [
        Family::Delay,
        Family::CountBeats,
        Family::Stream,
        Family::RtStream,
        Family::Loop,
        Family::Feed,
        Family::PlayMaster,
        Family::Prepare,
        Family::Copy,
        Family::Buffer,
        Family::Play,
        Family::CopyPattern,
        Family::PlayWave,
        Family::CaptureWave,
        Family::PlayNotation,
        Family::PlayDssi,
        Family::PlayLv2,
        Family::Peak,
        Family::Mute,
        Family::Volume,
        Family::Envelope,
        Family::Ladspa,
        Family::Dssi,
        Family::Lv2,
        Family::RecordMidi,
        Family::RouteDssi,
        Family::RouteLv2,
    ];

    pub fn info(self) -> FamilyInfo {
        use Layout::{Channel, Destination};
        const PROCESSING: AbilityFlags = AbilityFlags::PROCESSING;
        match self {
            Family::Delay => audio_family("ags-delay", PROCESSING, ("DelayAudio", "DelayAudioRun")),
            Family::CountBeats => audio_family(
                "ags-count-beats",
                PROCESSING,
                ("CountBeatsAudio", "CountBeatsAudioRun"),
            ),
            Family::Stream => channel_family(
                "ags-stream",
                Channel,
                PROCESSING,
                ("StreamChannel", "StreamChannelRun"),
            ),
            Family::RtStream => channel_family(
                "ags-rt-stream",
                Channel,
                PROCESSING,
                ("RtStreamChannel", "RtStreamChannelRun"),
            ),
            Family::Loop => channel_family("ags-loop", Channel, PROCESSING, ("LoopChannel", "LoopChannelRun")),
            Family::Feed => channel_family("ags-feed", Channel, PROCESSING, ("FeedChannel", "FeedChannelRun")),
            Family::PlayMaster => hybrid_family(
                "ags-play-master",
                PROCESSING,
                ("PlayAudio", "PlayAudioRun"),
                ("PlayChannel", "PlayChannelRunMaster"),
            ),
            Family::Prepare => channel_family(
                "ags-prepare",
                Destination,
                PROCESSING,
                ("PrepareChannel", "PrepareChannelRun"),
            ),
            Family::Copy => channel_family(
                "ags-copy",
                Destination,
                PROCESSING,
                ("CopyChannel", "CopyChannelRun"),
            ),
            Family::Buffer => channel_family(
                "ags-buffer",
                Destination,
                PROCESSING,
                ("BufferChannel", "BufferChannelRun"),
            ),
            Family::Play => channel_family(
                "ags-play",
                Channel,
                AbilityFlags::PLAYBACK,
                ("PlayChannel", "PlayChannelRun"),
            ),
            Family::CopyPattern => hybrid_family(
                "ags-copy-pattern",
                AbilityFlags::SEQUENCER,
                ("CopyPatternAudio", "CopyPatternAudioRun"),
                ("CopyPatternChannel", "CopyPatternChannelRun"),
            ),
            Family::PlayWave => hybrid_family(
                "ags-play-wave",
                AbilityFlags::WAVE,
                ("PlayWaveAudio", "PlayWaveAudioRun"),
                ("PlayWaveChannel", "PlayWaveChannelRun"),
            ),
            Family::CaptureWave => audio_family(
                "ags-capture-wave",
                AbilityFlags::WAVE,
                ("CaptureWaveAudio", "CaptureWaveAudioRun"),
            ),
            Family::PlayNotation => audio_family(
                "ags-play-notation",
                AbilityFlags::NOTATION,
                ("PlayNotationAudio", "PlayNotationAudioRun"),
            ),
            Family::PlayDssi => audio_family(
                "ags-play-dssi",
                AbilityFlags::NOTATION,
                ("PlayDssiAudio", "PlayDssiAudioRun"),
            ),
            Family::PlayLv2 => audio_family(
                "ags-play-lv2",
                AbilityFlags::NOTATION,
                ("PlayLv2Audio", "PlayLv2AudioRun"),
            ),
            Family::Peak => channel_family("ags-peak", Channel, PROCESSING, ("PeakChannel", "PeakChannelRun")),
            Family::Mute => hybrid_family(
                "ags-mute",
                PROCESSING,
                ("MuteAudio", "MuteAudioRun"),
                ("MuteChannel", "MuteChannelRun"),
            ),
            Family::Volume => channel_family(
                "ags-volume",
                Channel,
                PROCESSING,
                ("VolumeChannel", "VolumeChannelRun"),
            ),
            Family::Envelope => channel_family(
                "ags-envelope",
                Channel,
                PROCESSING,
                ("EnvelopeChannel", "EnvelopeChannelRun"),
            ),
            Family::Ladspa => channel_family(
                "ags-ladspa",
                Channel,
                PROCESSING,
                ("RecallLadspa", "RecallLadspaRun"),
            ),
            Family::Dssi => channel_family("ags-dssi", Channel, PROCESSING, ("RecallDssi", "RecallDssiRun")),
            Family::Lv2 => channel_family("ags-lv2", Channel, PROCESSING, ("RecallLv2", "RecallLv2Run")),
            Family::RecordMidi => audio_family(
                "ags-record-midi",
                AbilityFlags::NOTATION.union(AbilityFlags::MIDI),
                ("RecordMidiAudio", "RecordMidiAudioRun"),
            ),
            Family::RouteDssi => audio_family(
                "ags-route-dssi",
                AbilityFlags::NOTATION,
                ("RouteDssiAudio", "RouteDssiAudioRun"),
            ),
            Family::RouteLv2 => audio_family(
                "ags-route-lv2",
                AbilityFlags::NOTATION,
                ("RouteLv2Audio", "RouteLv2AudioRun"),
            ),
        }
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Family::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Plugin ecosystem of the families that host a native plugin per
    /// channel.
    pub fn plugin_ecosystem(self) -> Option<PluginEcosystem> {
        match self {
            Family::Ladspa => Some(PluginEcosystem::Ladspa),
            Family::Dssi => Some(PluginEcosystem::Dssi),
            Family::Lv2 => Some(PluginEcosystem::Lv2),
            _ => None,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecallKind {
    pub family: Family,
    pub scope: Scope,
    pub role: Role,
}

impl RecallKind {
    pub fn type_name(&self) -> &'static str {
        let info = self.family.info();
        let types = match self.scope {
            Scope::Audio => info.audio_types,
            Scope::Channel => info.channel_types,
        };
        match (types, self.role) {
            (Some((template, _)), Role::Template) => template,
            (Some((_, run)), Role::Run) => run,
            (None, _) => info.name,
        }
    }
}

/// One unit of attached processing behaviour.
#[derive(Debug)]
pub struct Recall {
    pub id: u64,
    pub kind: RecallKind,
    pub chain: Chain,
    pub flags: RecallFlags,
    pub ability: AbilityFlags,
    pub soundcard: Option<Arc<Soundcard>>,
    pub audio: Weak<ObjectMutex<Audio>>,
    pub source: Option<Weak<ObjectMutex<Channel>>>,
    pub destination: Option<Weak<ObjectMutex<Channel>>>,
    pub container: Weak<ObjectMutex<RecallContainer>>,
    pub template: Option<Weak<ObjectMutex<Recall>>>,
    /// Port value naming the audio channel a channel-level recall serves.
    pub audio_channel: Option<usize>,
    pub plugin: Option<PluginRef>,
}

impl Recall {
    pub fn new(kind: RecallKind, chain: Chain) -> Self {
        Self {
            id: next_id(),
            kind,
            chain,
            flags: RecallFlags::empty(),
            ability: AbilityFlags::empty(),
            soundcard: None,
            audio: Weak::new(),
            source: None,
            destination: None,
            container: Weak::new(),
            template: None,
            audio_channel: None,
            plugin: None,
        }
    }

    pub fn handle(self) -> RecallHandle {
        Arc::new(ObjectMutex::new(self))
    }

    pub fn is_template(&self) -> bool {
        self.kind.role == Role::Template
    }

    pub fn container(&self) -> Option<container::ContainerHandle> {
        self.container.upgrade()
    }

    pub fn source(&self) -> Option<ChannelHandle> {
        self.source.as_ref().and_then(Weak::upgrade)
    }

    pub fn destination(&self) -> Option<ChannelHandle> {
        self.destination.as_ref().and_then(Weak::upgrade)
    }

    pub fn template(&self) -> Option<RecallHandle> {
        self.template.as_ref().and_then(Weak::upgrade)
    }
}

/// First recall of `family` with `scope` and `role` in `list`.
pub fn find_type(
    list: &[RecallHandle],
    family: Family,
    scope: Scope,
    role: Role,
) -> Option<RecallHandle> {
    list.iter()
        .find(|recall| {
            let kind = recall.lock().kind;
            kind.family == family && kind.scope == scope && kind.role == role
        })
        .cloned()
}

/// Whether `list` already holds a channel template of `family` feeding
/// `destination`.
pub fn template_feeds(list: &[RecallHandle], family: Family, destination: &ChannelHandle) -> bool {
    list.iter().any(|recall| {
        let recall = recall.lock();
        recall.kind.family == family
            && recall.is_template()
            && recall
                .destination()
                .is_some_and(|d| Arc::ptr_eq(&d, destination))
    })
}
