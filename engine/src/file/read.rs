use super::{
    FileDiagnostic, FileError, FileSession, PROJECT_NODE, SessionMode,
    document::{Document, NodeId},
    id_ref::FileObject,
    launch::{Launch, LaunchKind},
    lookup::{Lookup, LookupKind},
};
use crate::{
    audio::AudioHandle,
    channel::{Direction, FileLink, Pattern},
    factory::{CreateRequest, RecallFactory},
    flags::{self, AbilityFlags, BehaviourFlags, CreateFlags},
    plugin::PluginRef,
    recall::Chain,
    soundcard::Soundcard,
    state::State,
    traverse::Region,
};
use std::{fs::File, io::BufReader, path::Path, str::FromStr};
use tracing::debug;

/// Most channels one direction of an audio may have in a project file.
pub const MAX_LINES: usize = 1 << 16;

#[derive(Debug)]
pub struct ReadReport {
    pub state: State,
    pub diagnostics: Vec<FileDiagnostic>,
}

fn create_flags(chain: Chain, direction: Direction, bulk: bool) -> CreateFlags {
    let mut flags = match chain {
        Chain::Play => CreateFlags::PLAY,
        Chain::Recall => CreateFlags::RECALL,
    };
    if direction == Direction::Output {
        flags |= CreateFlags::OUTPUT;
    }
    if bulk {
        flags |= CreateFlags::BULK;
    }
    flags
}

/// Rebuilds a project from a document in three steps: `walk` creates the
/// audios and channels and queues the deferred work, `resolve_lookups`
/// links channels, `start_launches` runs the factory and connects audios.
/// The graph is usable once `start_launches` returned.
#[derive(Debug)]
pub struct ProjectReader<'a> {
    factory: &'a RecallFactory,
    session: FileSession,
    state: State,
}

impl<'a> ProjectReader<'a> {
    pub fn new(factory: &'a RecallFactory, document: Document) -> Result<Self, FileError> {
        let root = document.root();
        if document.name(root) != PROJECT_NODE {
            return Err(FileError::UnexpectedNode {
                expected: PROJECT_NODE,
                found: document.name(root).to_string(),
            });
        }
        Ok(Self {
            factory,
            session: FileSession::new(document, SessionMode::Read),
            state: State::default(),
        })
    }

    pub fn session(&self) -> &FileSession {
        &self.session
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    fn required(&self, node: NodeId, attribute: &'static str) -> Result<&str, FileError> {
        self.session
            .document
            .attribute(node, attribute)
            .ok_or_else(|| FileError::MissingAttribute {
                node: self.session.describe_node(node),
                attribute,
            })
    }

    fn parse<T: FromStr>(&self, node: NodeId, attribute: &'static str) -> Result<T, FileError> {
        let value = self.required(node, attribute)?;
        value.parse().map_err(|_| FileError::BadAttribute {
            node: self.session.describe_node(node),
            attribute,
            value: value.to_string(),
        })
    }

    /// Like `parse` for attributes whose damage only loses one entry: the
    /// problem is diagnosed and `None` returned.
    fn tolerate<T>(&mut self, node: NodeId, attribute: &'static str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let value = self.session.document.attribute(node, attribute).unwrap_or_default();
        match parse(value) {
            Some(parsed) => Some(parsed),
            None => {
                let value = value.to_string();
                let node = self.session.describe_node(node);
                self.session.diagnose(FileDiagnostic::BadAttribute {
                    node,
                    attribute,
                    value,
                });
                None
            }
        }
    }

    fn nodes(&self, parent: NodeId, list: &str, item: &str) -> Vec<NodeId> {
        let document = &self.session.document;
        document
            .children_named(parent, list)
            .flat_map(|list| document.children_named(list, item).collect::<Vec<_>>())
            .collect()
    }

    pub fn walk(&mut self) -> Result<(), FileError> {
        let root = self.session.document.root();
        if let Some(node) = self.session.document.child_named(root, "soundcard") {
            self.read_soundcard(node)?;
        }
        for node in self.nodes(root, "audio-list", "audio") {
            self.read_audio(node)?;
        }
        debug!(
            "walked {} audios, {} lookups and {} launches queued",
            self.state.audios.len(),
            self.session.pending_lookups(),
            self.session.pending_launches()
        );
        Ok(())
    }

    pub fn resolve_lookups(&mut self) -> Result<(), FileError> {
        self.session.resolve_all_lookups()
    }

    pub fn start_launches(&mut self) -> Result<(), FileError> {
        self.session.start_all_launches(self.factory)
    }

    pub fn finish(mut self) -> ReadReport {
        ReadReport {
            state: self.state,
            diagnostics: self.session.take_diagnostics(),
        }
    }

    fn read_soundcard(&mut self, node: NodeId) -> Result<(), FileError> {
        let soundcard = Soundcard {
            name: self.required(node, "name")?.to_string(),
            samplerate: self.parse(node, "samplerate")?,
            buffer_size: self.parse(node, "buffer-size")?,
            pcm_channels: self.parse(node, "pcm-channels")?,
        };
        self.state = State::new(soundcard);
        self.session
            .add_id_ref(node, FileObject::Soundcard(self.state.soundcard.clone()));
        Ok(())
    }

    fn read_audio(&mut self, node: NodeId) -> Result<(), FileError> {
        let name = self.required(node, "name")?.to_string();
        let audio_channels: usize = self.parse(node, "audio-channels")?;
        let output_pads: usize = self.parse(node, "output-pads")?;
        let input_pads: usize = self.parse(node, "input-pads")?;
        for (attribute, pads) in [("output-pads", output_pads), ("input-pads", input_pads)] {
            let lines = pads
                .checked_mul(audio_channels)
                .filter(|lines| *lines <= MAX_LINES && audio_channels <= MAX_LINES);
            if lines.is_none() {
                return Err(FileError::BadAttribute {
                    node: self.session.describe_node(node),
                    attribute,
                    value: format!("{pads} pads of {audio_channels} channels"),
                });
            }
        }
        let audio = self
            .state
            .add_audio(&name, audio_channels, output_pads, input_pads);
        let ability = self
            .tolerate(node, "ability", flags::parse_named::<AbilityFlags>)
            .unwrap_or_default();
        let behaviour = self
            .tolerate(node, "behaviour", flags::parse_named::<BehaviourFlags>)
            .unwrap_or_default();
        {
            let mut audio = audio.lock();
            audio.ability = ability;
            audio.behaviour = behaviour;
        }
        let object = FileObject::Audio(audio.clone());
        self.session.add_id_ref(node, object.clone());

        let mut effects = vec![];
        let lists: Vec<NodeId> = self
            .session
            .document
            .children_named(node, "channel-list")
            .collect();
        for list in lists {
            let direction = self.parse_direction(list, "direction")?;
            let channels: Vec<NodeId> = self.session.document.children_named(list, "channel").collect();
            for channel in channels {
                self.read_channel(&audio, direction, channel, &mut effects)?;
            }
        }
        let mut containers = vec![];
        for container in self.nodes(node, "recall-container-list", "recall-container") {
            for request in self.container_requests(container)? {
                containers.push((container, request));
            }
        }

        // Launches run last queued first: containers in document order,
        // then effects, then the connect.
        self.session
            .add_launch(Launch::new(node, object.clone(), LaunchKind::Connect));
        for (node, request) in containers.into_iter().chain(effects).rev() {
            self.session
                .add_launch(Launch::create_recalls(node, object.clone(), request));
        }
        Ok(())
    }

    fn parse_direction(&self, node: NodeId, attribute: &'static str) -> Result<Direction, FileError> {
        let value = self.required(node, attribute)?;
        Direction::parse(value).ok_or_else(|| FileError::BadAttribute {
            node: self.session.describe_node(node),
            attribute,
            value: value.to_string(),
        })
    }

    fn read_channel(
        &mut self,
        audio: &AudioHandle,
        direction: Direction,
        node: NodeId,
        effects: &mut Vec<(NodeId, CreateRequest)>,
    ) -> Result<(), FileError> {
        let pad: usize = self.parse(node, "pad")?;
        let audio_channel: usize = self.parse(node, "audio-channel")?;
        let channel = {
            let audio = audio.lock();
            let line = pad * audio.audio_channels + audio_channel;
            let channel = audio.channels(direction).get(line).cloned();
            channel.filter(|_| audio_channel < audio.audio_channels)
        };
        let Some(channel) = channel else {
            return Err(FileError::BadAttribute {
                node: self.session.describe_node(node),
                attribute: "pad",
                value: format!("{pad}:{audio_channel}"),
            });
        };
        let object = FileObject::Channel(channel.clone());
        self.session.add_id_ref(node, object.clone());

        if let Some(xpath) = self.session.document.attribute(node, "link") {
            let kind = LookupKind::ChannelLink {
                xpath: xpath.to_string(),
            };
            self.session.add_lookup(Lookup::new(node, object, kind));
        }

        if let Some(child) = self.session.document.child_named(node, "file-link") {
            let file_link = FileLink {
                filename: self.required(child, "filename")?.to_string(),
                audio_channel: self.parse(child, "audio-channel")?,
            };
            channel.lock().file_link = Some(file_link);
        }
        if let Some(child) = self.session.document.child_named(node, "pattern") {
            let mut pattern = Pattern::new(self.parse(child, "length")?);
            pattern.bank_0 = self.parse(child, "bank-0")?;
            pattern.bank_1 = self.parse(child, "bank-1")?;
            let steps = self
                .tolerate(child, "steps", |steps| {
                    steps
                        .split(',')
                        .filter(|step| !step.is_empty())
                        .map(|step| step.trim().parse::<usize>().ok())
                        .collect::<Option<Vec<_>>>()
                })
                .unwrap_or_default();
            for step in steps {
                pattern.toggle(step);
            }
            channel.lock().pattern = Some(pattern);
        }

        for effect in self.nodes(node, "effect-list", "effect") {
            let plugin = PluginRef::new(
                self.required(effect, "filename")?,
                self.required(effect, "effect")?,
            );
            let Some(chain) = self.tolerate(effect, "chain", Chain::parse) else {
                continue;
            };
            let Some(family) = self.factory.plugins().resolve_family(&plugin) else {
                self.session.diagnose(FileDiagnostic::UnknownPlugin {
                    filename: plugin.filename,
                    effect: plugin.effect,
                });
                continue;
            };
            let request = CreateRequest::new(
                family.name(),
                audio_channel..audio_channel + 1,
                pad..pad + 1,
                create_flags(chain, direction, false),
            )
            .with_plugin(plugin);
            effects.push((effect, request));
        }
        Ok(())
    }

    /// One request per saved region of the container. Later requests land
    /// in the container the first one creates.
    fn container_requests(&mut self, node: NodeId) -> Result<Vec<CreateRequest>, FileError> {
        let family = self.required(node, "family")?.to_string();
        let bulk = self.parse(node, "bulk")?;
        let mut regions = vec![];
        for region in self.nodes(node, "region-list", "region") {
            let pads = self.parse(region, "start-pad")?..self.parse(region, "stop-pad")?;
            let channels = self.parse(region, "start-channel")?..self.parse(region, "stop-channel")?;
            regions.push(Region::new(pads, channels));
        }
        if regions.is_empty() {
            regions.push(Region::new(0..0, 0..0));
        }
        let Some(chain) = self.tolerate(node, "chain", Chain::parse) else {
            return Ok(vec![]);
        };
        let Some(direction) = self.tolerate(node, "orientation", Direction::parse) else {
            return Ok(vec![]);
        };
        let flags = create_flags(chain, direction, bulk);
        Ok(regions
            .into_iter()
            .map(|region| CreateRequest::new(family.clone(), region.channels, region.pads, flags))
            .collect())
    }
}

/// Runs every reader step over `document`.
pub fn read(factory: &RecallFactory, document: Document) -> Result<ReadReport, FileError> {
    let mut reader = ProjectReader::new(factory, document)?;
    reader.walk()?;
    reader.resolve_lookups()?;
    reader.start_launches()?;
    Ok(reader.finish())
}

pub fn load_project(factory: &RecallFactory, path: &Path) -> Result<ReadReport, FileError> {
    let file = File::open(path)?;
    let document = Document::read_from(BufReader::new(file))?;
    read(factory, document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginManagers;
    use rstest::rstest;
    use std::sync::Arc;

    fn factory() -> RecallFactory {
        RecallFactory::new(Arc::new(PluginManagers::new()))
    }

    fn project() -> (Document, NodeId) {
        let mut doc = Document::new(PROJECT_NODE);
        let root = doc.root();
        let list = doc.add_child(root, "audio-list");
        let audio = doc.add_child(list, "audio");
        for (key, value) in [
            ("id", "audio-1"),
            ("name", "drums"),
            ("audio-channels", "2"),
            ("output-pads", "1"),
            ("input-pads", "1"),
        ] {
            doc.set_attribute(audio, key, value);
        }
        (doc, audio)
    }

    #[test]
    fn rejects_foreign_root() {
        let err = ProjectReader::new(&factory(), Document::new("session")).unwrap_err();
        assert!(matches!(err, FileError::UnexpectedNode { .. }));
    }

    #[test]
    fn missing_geometry_is_an_error() {
        let (mut doc, audio) = project();
        doc.set_attribute(audio, "audio-channels", "two");
        let err = read(&factory(), doc).unwrap_err();
        assert!(matches!(
            err,
            FileError::BadAttribute {
                attribute: "audio-channels",
                ..
            }
        ));
    }

    #[rstest]
    #[case("4294967296", "4294967296", "output-pads")]
    #[case("65537", "1", "output-pads")]
    #[case("2", "40000", "output-pads")]
    #[case("1", "0", "input-pads")]
    fn oversized_geometry_is_rejected(
        #[case] audio_channels: &str,
        #[case] output_pads: &str,
        #[case] attribute: &str,
    ) {
        let (mut doc, audio) = project();
        doc.set_attribute(audio, "audio-channels", audio_channels);
        doc.set_attribute(audio, "output-pads", output_pads);
        if attribute == "input-pads" {
            doc.set_attribute(audio, "input-pads", "70000");
        }
        let err = read(&factory(), doc).unwrap_err();
        assert!(matches!(err, FileError::BadAttribute { attribute: a, .. } if a == attribute));
    }

    #[test]
    fn bad_flags_are_diagnosed() {
        let (mut doc, audio) = project();
        doc.set_attribute(audio, "ability", "PLAYBACK|LOUDNESS");
        doc.set_attribute(audio, "behaviour", "BYPASS");
        let report = read(&factory(), doc).unwrap();
        let audio = report.state.audio("drums").unwrap();
        assert!(audio.lock().ability.is_empty());
        assert!(audio.lock().connected);
        assert!(matches!(
            report.diagnostics.as_slice(),
            [FileDiagnostic::BadAttribute {
                attribute: "ability",
                ..
            }]
        ));
    }

    #[test]
    fn unknown_plugin_skips_effect() {
        let (mut doc, audio) = project();
        let list = doc.add_child(audio, "channel-list");
        doc.set_attribute(list, "direction", "input");
        let channel = doc.add_child(list, "channel");
        doc.set_attribute(channel, "pad", 0);
        doc.set_attribute(channel, "audio-channel", 1);
        let effects = doc.add_child(channel, "effect-list");
        let effect = doc.add_child(effects, "effect");
        doc.set_attribute(effect, "filename", "missing.so");
        doc.set_attribute(effect, "effect", "nothing");
        doc.set_attribute(effect, "chain", "play");

        let report = read(&factory(), doc).unwrap();

        assert_eq!(
            report.diagnostics,
            vec![FileDiagnostic::UnknownPlugin {
                filename: "missing.so".to_string(),
                effect: "nothing".to_string()
            }]
        );
        let audio = report.state.audio("drums").unwrap();
        assert!(audio.lock().containers.is_empty());
    }

    #[test]
    fn channel_outside_geometry_is_an_error() {
        let (mut doc, audio) = project();
        let list = doc.add_child(audio, "channel-list");
        doc.set_attribute(list, "direction", "output");
        let channel = doc.add_child(list, "channel");
        doc.set_attribute(channel, "pad", 0);
        doc.set_attribute(channel, "audio-channel", 2);
        assert!(read(&factory(), doc).is_err());
    }
}
