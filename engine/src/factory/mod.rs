mod build;
mod families;

use crate::{
    audio::{self, AudioHandle},
    flags::{CreateFlags, RecallFlags},
    plugin::{PluginEcosystem, PluginManagers, PluginRef},
    recall::{Family, RecallHandle, container::ContainerHandle},
};
use build::Construction;
use std::{ops::Range, sync::Arc};
use thiserror::Error;
use tracing::{debug, warn};

/// Parameters of one factory invocation.
#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub play_container: Option<ContainerHandle>,
    pub recall_container: Option<ContainerHandle>,
    pub family: String,
    pub channels: Range<usize>,
    pub pads: Range<usize>,
    pub create_flags: CreateFlags,
    pub recall_flags: RecallFlags,
    pub plugin: Option<PluginRef>,
}

impl CreateRequest {
    pub fn new(
        family: impl Into<String>,
        channels: Range<usize>,
        pads: Range<usize>,
        create_flags: CreateFlags,
    ) -> Self {
        Self {
            play_container: None,
            recall_container: None,
            family: family.into(),
            channels,
            pads,
            create_flags,
            recall_flags: RecallFlags::empty(),
            plugin: None,
        }
    }

    pub fn with_containers(
        mut self,
        play_container: Option<ContainerHandle>,
        recall_container: Option<ContainerHandle>,
    ) -> Self {
        self.play_container = play_container;
        self.recall_container = recall_container;
        self
    }

    pub fn with_recall_flags(mut self, recall_flags: RecallFlags) -> Self {
        self.recall_flags = recall_flags;
        self
    }

    pub fn with_plugin(mut self, plugin: PluginRef) -> Self {
        self.plugin = Some(plugin);
        self
    }
}

#[derive(Debug, Clone)]
pub enum FactoryObject {
    Container(ContainerHandle),
    Recall(RecallHandle),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FactoryWarning {
    #[error("no audio given for {0}")]
    NoAudio(String),
    #[error("unknown recall family {0:?}")]
    UnknownFamily(String),
    #[error("region pads {pads:?} x channels {channels:?} exceeds {audio}, clamped")]
    RegionClamped {
        audio: String,
        pads: Range<usize>,
        channels: Range<usize>,
    },
    #[error("remap found no {family} audio template in the {} chain of {audio}", .chain.as_str())]
    MissingAudioTemplate {
        audio: String,
        family: Family,
        chain: crate::recall::Chain,
    },
    #[error("{ecosystem} plugin {}:{} is not installed", .plugin.filename, .plugin.effect)]
    PluginNotFound {
        ecosystem: PluginEcosystem,
        plugin: PluginRef,
    },
}

/// Everything one `create` call produced, in construction order.
#[derive(Debug, Default)]
pub struct FactoryOutput {
    pub objects: Vec<FactoryObject>,
    pub warnings: Vec<FactoryWarning>,
}

impl FactoryOutput {
    fn warning(warning: FactoryWarning) -> Self {
        warn!("{warning}");
        Self {
            objects: vec![],
            warnings: vec![warning],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn recalls(&self) -> Vec<RecallHandle> {
        self.objects
            .iter()
            .filter_map(|o| match o {
                FactoryObject::Recall(recall) => Some(recall.clone()),
                FactoryObject::Container(_) => None,
            })
            .collect()
    }

    pub fn containers(&self) -> Vec<ContainerHandle> {
        self.objects
            .iter()
            .filter_map(|o| match o {
                FactoryObject::Container(container) => Some(container.clone()),
                FactoryObject::Recall(_) => None,
            })
            .collect()
    }
}

/// Builds and wires recalls for a named family over a region of an audio.
#[derive(Debug, Clone)]
pub struct RecallFactory {
    plugins: Arc<PluginManagers>,
}

impl RecallFactory {
    pub fn new(plugins: Arc<PluginManagers>) -> Self {
        Self { plugins }
    }

    pub fn plugins(&self) -> &PluginManagers {
        &self.plugins
    }

    /// Names the factory dispatches on.
    pub fn families() -> impl Iterator<Item = &'static str> {
        families::DISPATCH.iter().map(|(name, _)| *name)
    }

    /// Creates the recalls of `request.family`.
    ///
    /// A missing audio or an unknown family produce no objects and leave
    /// every audio untouched; the reason is reported in the warnings.
    pub fn create(&self, audio: Option<&AudioHandle>, request: CreateRequest) -> FactoryOutput {
        let Some(audio) = audio else {
            return FactoryOutput::warning(FactoryWarning::NoAudio(request.family));
        };
        let Some(constructor) = families::lookup(&request.family) else {
            return FactoryOutput::warning(FactoryWarning::UnknownFamily(request.family));
        };
        debug!(
            "creating {}[pads {:?}, channels {:?}] flags {:?}",
            request.family, request.pads, request.channels, request.create_flags
        );
        let mut construction = Construction::new(self, audio, request);
        constructor(&mut construction);
        construction.finish()
    }

    /// Removes the effect instance grouped by `container` from `audio`.
    pub fn remove(&self, audio: &AudioHandle, container: &ContainerHandle) -> usize {
        audio::remove_effect(audio, container)
    }
}
