use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Processing abilities an audio offers or a recall takes part in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct AbilityFlags: u32 {
        const PLAYBACK = 1;
        const SEQUENCER = 1 << 1;
        const NOTATION = 1 << 2;
        const MIDI = 1 << 3;
        const WAVE = 1 << 4;
    }
}

impl AbilityFlags {
    /// Ability set of generic audio-processing families.
    pub const PROCESSING: Self = Self::all();
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct BehaviourFlags: u32 {
        /// Destination walks visit output pads last to first.
        const REVERSE_MAPPING = 1;
        const DEFAULTS_TO_INPUT = 1 << 1;
        const BYPASS = 1 << 2;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct RecallFlags: u32 {
        const TEMPLATE = 1;
        const OUTPUT_ORIENTATED = 1 << 1;
        const INPUT_ORIENTATED = 1 << 2;
        const BULK_MODE = 1 << 3;
        const PERSISTENT = 1 << 4;
        const HIDE = 1 << 5;
    }
}

bitflags! {
    /// Modifiers of a single factory invocation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct CreateFlags: u32 {
        const PLAY = 1;
        const RECALL = 1 << 1;
        const OUTPUT = 1 << 2;
        const REMAP = 1 << 3;
        const BULK = 1 << 4;
    }
}

impl CreateFlags {
    pub fn orientation(self) -> RecallFlags {
        if self.contains(CreateFlags::OUTPUT) {
            RecallFlags::OUTPUT_ORIENTATED
        } else {
            RecallFlags::INPUT_ORIENTATED
        }
    }
}

/// Parses a `|` separated list of flag names, the format the project
/// writer uses for flag attributes.
pub fn parse_named<F: bitflags::Flags>(text: &str) -> Option<F> {
    let mut flags = F::empty();
    for part in text.split('|').map(str::trim).filter(|p| !p.is_empty()) {
        flags = flags.union(F::from_name(part)?);
    }
    Some(flags)
}

pub fn format_named<F: bitflags::Flags>(flags: &F) -> String {
    flags
        .iter_names()
        .map(|(name, _)| name)
        .collect::<Vec<_>>()
        .join("|")
}
