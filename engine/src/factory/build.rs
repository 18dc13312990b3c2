use super::{CreateRequest, FactoryObject, FactoryOutput, FactoryWarning, RecallFactory};
use crate::{
    audio::AudioHandle,
    channel::{ChannelHandle, Direction},
    flags::{BehaviourFlags, CreateFlags, RecallFlags},
    recall::{
        Chain, Family, Recall, RecallHandle, RecallKind, Role, Scope,
        container::{ContainerHandle, ContainerSlot, RecallContainer},
        find_type, template_feeds,
    },
    soundcard::Soundcard,
    traverse::{self, Region},
};
use std::sync::Arc;
use tracing::warn;

/// State of one `create` call: a snapshot of the audio's geometry taken
/// under a single audio lock, plus the objects produced so far.
pub(super) struct Construction<'a> {
    factory: &'a RecallFactory,
    audio: &'a AudioHandle,
    request: CreateRequest,
    audio_name: String,
    audio_channels: usize,
    sources: Vec<ChannelHandle>,
    oriented: Vec<ChannelHandle>,
    outputs: Vec<ChannelHandle>,
    reverse_mapping: bool,
    soundcard: Option<Arc<Soundcard>>,
    output: FactoryOutput,
}

impl<'a> Construction<'a> {
    pub(super) fn new(
        factory: &'a RecallFactory,
        audio: &'a AudioHandle,
        request: CreateRequest,
    ) -> Self {
        let direction = if request.create_flags.contains(CreateFlags::OUTPUT) {
            Direction::Output
        } else {
            Direction::Input
        };
        let (audio_name, audio_channels, pads, oriented, outputs, behaviour, soundcard) = {
            let guard = audio.lock();
            (
                guard.name.clone(),
                guard.audio_channels,
                guard.pads(direction),
                guard.channels(direction).to_vec(),
                guard.outputs.clone(),
                guard.behaviour,
                guard.soundcard.clone(),
            )
        };

        let mut output = FactoryOutput::default();
        let requested = Region::new(request.pads.clone(), request.channels.clone());
        let (region, cut) = requested.clamp(pads, audio_channels);
        if cut {
            let warning = FactoryWarning::RegionClamped {
                audio: audio_name.clone(),
                pads: requested.pads,
                channels: requested.channels,
            };
            warn!("{warning}");
            output.warnings.push(warning);
        }
        let sources = traverse::region_channels(&oriented, audio_channels, &region);

        Self {
            factory,
            audio,
            request,
            audio_name,
            audio_channels,
            sources,
            oriented,
            outputs,
            reverse_mapping: behaviour.contains(BehaviourFlags::REVERSE_MAPPING),
            soundcard,
            output,
        }
    }

    pub(super) fn finish(self) -> FactoryOutput {
        self.output
    }

    fn chains(&self) -> Vec<Chain> {
        let flags = self.request.create_flags;
        let mut chains = Vec::with_capacity(2);
        if flags.contains(CreateFlags::PLAY) {
            chains.push(Chain::Play);
        }
        if flags.contains(CreateFlags::RECALL) {
            chains.push(Chain::Recall);
        }
        chains
    }

    fn remap(&self) -> bool {
        self.request.create_flags.contains(CreateFlags::REMAP)
    }

    fn supplied(&self, chain: Chain) -> Option<ContainerHandle> {
        match chain {
            Chain::Play => self.request.play_container.clone(),
            Chain::Recall => self.request.recall_container.clone(),
        }
    }

    fn push(&mut self, object: FactoryObject) {
        self.output.objects.push(object);
    }

    fn warn(&mut self, warning: FactoryWarning) {
        warn!("{warning}");
        self.output.warnings.push(warning);
    }

    /// Supplied container, else `preferred`, else a fresh one. The result is
    /// registered on the audio either way.
    fn container_for(&mut self, chain: Chain, preferred: Option<ContainerHandle>) -> ContainerHandle {
        let container = match self.supplied(chain).or(preferred) {
            Some(container) => container,
            None => {
                let container = RecallContainer::new().handle();
                self.push(FactoryObject::Container(container.clone()));
                container
            }
        };
        if chain == Chain::Play {
            container.lock().set_play(true);
        }
        self.audio.lock().add_recall_container(container.clone());
        container
    }

    fn is_match(&self, recall: &Recall, family: Family) -> bool {
        recall.kind.family == family
            && (self.request.plugin.is_none() || recall.plugin == self.request.plugin)
    }

    fn new_recall(
        &self,
        kind: RecallKind,
        chain: Chain,
        container: &ContainerHandle,
        source: Option<&ChannelHandle>,
        destination: Option<&ChannelHandle>,
        template: Option<&RecallHandle>,
    ) -> RecallHandle {
        let info = kind.family.info();
        let mut flags = RecallFlags::TEMPLATE
            | self.request.create_flags.orientation()
            | self.request.recall_flags;
        if kind.role == Role::Template && self.request.create_flags.contains(CreateFlags::BULK) {
            flags |= RecallFlags::BULK_MODE;
        }

        let mut recall = Recall::new(kind, chain);
        recall.flags = flags;
        recall.ability = info.ability;
        recall.soundcard = self.soundcard.clone();
        recall.audio = Arc::downgrade(self.audio);
        recall.container = Arc::downgrade(container);
        recall.source = source.map(Arc::downgrade);
        recall.destination = destination.map(Arc::downgrade);
        recall.template = template.map(Arc::downgrade);
        recall.audio_channel = source.map(|s| s.lock().audio_channel);
        if kind.family.plugin_ecosystem().is_some() {
            recall.plugin = self.request.plugin.clone();
        }
        recall.handle()
    }

    fn audio_pair(&mut self, family: Family, chain: Chain, container: &ContainerHandle) {
        let kind = |role| RecallKind {
            family,
            scope: Scope::Audio,
            role,
        };
        let template = self.new_recall(kind(Role::Template), chain, container, None, None, None);
        let run = self.new_recall(kind(Role::Run), chain, container, None, None, Some(&template));
        {
            let mut audio = self.audio.lock();
            audio.add_recall(template.clone(), chain);
            audio.add_recall(run.clone(), chain);
        }
        {
            let mut container = container.lock();
            container.set_slot(ContainerSlot::AudioTemplate, template.clone());
            container.set_slot(ContainerSlot::AudioRun, run.clone());
        }
        self.push(FactoryObject::Recall(template));
        self.push(FactoryObject::Recall(run));
    }

    fn channel_pair(
        &mut self,
        family: Family,
        chain: Chain,
        container: &ContainerHandle,
        source: &ChannelHandle,
        destination: Option<&ChannelHandle>,
    ) {
        let kind = |role| RecallKind {
            family,
            scope: Scope::Channel,
            role,
        };
        let template = self.new_recall(
            kind(Role::Template),
            chain,
            container,
            Some(source),
            destination,
            None,
        );
        let run = self.new_recall(
            kind(Role::Run),
            chain,
            container,
            Some(source),
            destination,
            Some(&template),
        );
        {
            let mut channel = source.lock();
            channel.add_recall_container(container);
            channel.add_recall(template.clone(), chain);
            channel.add_recall(run.clone(), chain);
        }
        {
            let mut container = container.lock();
            container.set_slot(ContainerSlot::ChannelTemplate, template.clone());
            container.set_slot(ContainerSlot::ChannelRun, run.clone());
        }
        self.push(FactoryObject::Recall(template));
        self.push(FactoryObject::Recall(run));
    }

    /// Reads back the audio-level pair of `family` for REMAP, from the
    /// supplied container or the first template in the audio's chain.
    fn existing_audio_pair(&mut self, family: Family, chain: Chain) -> Option<ContainerHandle> {
        let template = match self.supplied(chain) {
            Some(container) => container.lock().audio_template(),
            None => {
                let list = self.audio.lock().chain(chain).to_vec();
                find_type(&list, family, Scope::Audio, Role::Template)
            }
        }?;
        let container = self.supplied(chain).or_else(|| template.lock().container())?;
        let run = container.lock().audio_run();
        self.push(FactoryObject::Recall(template));
        if let Some(run) = run {
            self.push(FactoryObject::Recall(run));
        }
        Some(container)
    }

    /// Container of the first channel template of `family` on the
    /// oriented channels, for REMAP of channel-level families.
    fn existing_channel_container(&self, family: Family, chain: Chain) -> Option<ContainerHandle> {
        self.oriented.iter().find_map(|channel| {
            let list = channel.lock().chain(chain).to_vec();
            list.iter().find_map(|recall| {
                let recall = recall.lock();
                (recall.is_template() && recall.kind.scope == Scope::Channel && self.is_match(&recall, family))
                    .then(|| recall.container())
                    .flatten()
            })
        })
    }

    /// Whether `channel` already carries a template of `family` placed in
    /// `container`.
    fn covers(&self, channel: &ChannelHandle, family: Family, chain: Chain, container: &ContainerHandle) -> bool {
        let list = channel.lock().chain(chain).to_vec();
        list.iter().any(|recall| {
            let recall = recall.lock();
            recall.is_template()
                && self.is_match(&recall, family)
                && recall.container().is_some_and(|c| Arc::ptr_eq(&c, container))
        })
    }

    pub(super) fn audio_scoped(&mut self, family: Family) {
        for chain in self.chains() {
            if self.remap() && self.existing_audio_pair(family, chain).is_some() {
                continue;
            }
            let container = self.container_for(chain, None);
            self.audio_pair(family, chain, &container);
        }
    }

    pub(super) fn channel_scoped(&mut self, family: Family) {
        for chain in self.chains() {
            let existing = if self.remap() {
                self.existing_channel_container(family, chain)
            } else {
                None
            };
            let container = self.container_for(chain, existing);
            for source in self.sources.clone() {
                if self.remap() && self.covers(&source, family, chain, &container) {
                    continue;
                }
                self.channel_pair(family, chain, &container, &source, None);
            }
        }
    }

    /// Channel-level pairs feeding the outputs that share the source's
    /// audio channel. Destinations already fed by a template of the family
    /// are skipped, so repeated calls only fill gaps.
    pub(super) fn destination_bearing(&mut self, family: Family) {
        for chain in self.chains() {
            let preferred = if self.remap() {
                self.existing_channel_container(family, chain)
            } else {
                None
            };
            let mut container: Option<ContainerHandle> = None;
            for source in self.sources.clone() {
                let audio_channel = source.lock().audio_channel;
                let destinations = traverse::pad_walk(
                    &self.outputs,
                    self.audio_channels,
                    audio_channel,
                    self.reverse_mapping,
                );
                for destination in destinations {
                    if Arc::ptr_eq(&destination, &source) {
                        continue;
                    }
                    let list = source.lock().chain(chain).to_vec();
                    if template_feeds(&list, family, &destination) {
                        continue;
                    }
                    let current = match &container {
                        Some(current) => current.clone(),
                        None => {
                            let created = self.container_for(chain, preferred.clone());
                            container = Some(created.clone());
                            created
                        }
                    };
                    self.channel_pair(family, chain, &current, &source, Some(&destination));
                }
            }
        }
    }

    pub(super) fn hybrid(&mut self, family: Family) {
        for chain in self.chains() {
            let existing = if self.remap() {
                let existing = self.existing_audio_pair(family, chain);
                if existing.is_none() {
                    self.warn(FactoryWarning::MissingAudioTemplate {
                        audio: self.audio_name.clone(),
                        family,
                        chain,
                    });
                }
                existing
            } else {
                None
            };
            let container = match existing {
                Some(existing) => self.container_for(chain, Some(existing)),
                None => {
                    let container = self.container_for(chain, None);
                    self.audio_pair(family, chain, &container);
                    container
                }
            };
            for source in self.sources.clone() {
                if self.remap() && self.covers(&source, family, chain, &container) {
                    continue;
                }
                self.channel_pair(family, chain, &container, &source, None);
            }
        }
    }

    /// Channel-scoped plugin host. The plugin's presence is checked but a
    /// missing plugin does not stop creation.
    pub(super) fn plugin(&mut self, family: Family) {
        if let (Some(ecosystem), Some(plugin)) = (family.plugin_ecosystem(), self.request.plugin.clone()) {
            if !self.factory.plugins().contains(ecosystem, &plugin) {
                self.warn(FactoryWarning::PluginNotFound { ecosystem, plugin });
            }
        }
        self.channel_scoped(family);
    }
}
