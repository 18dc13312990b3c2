use super::{
    FileDiagnostic, FileError, FileSession, PROJECT_NODE, SessionMode,
    document::{Document, NodeId},
    id_ref::FileObject,
    lookup::{Lookup, LookupKind},
};
use crate::{
    audio::AudioHandle,
    channel::{ChannelHandle, Direction},
    flags::{self, RecallFlags},
    plugin::PluginRef,
    recall::{
        Chain, RecallHandle,
        container::{self, ContainerHandle},
    },
    soundcard::Soundcard,
    state::State,
    traverse::Region,
};
use std::{
    fs::File,
    io::BufWriter,
    path::Path,
    sync::Arc,
};
use tracing::debug;

#[derive(Debug)]
pub struct WriteReport {
    pub document: Document,
    pub diagnostics: Vec<FileDiagnostic>,
}

/// Serializes the project into a document. Links are filled in by
/// write-side lookups once every channel carries an id.
pub fn write_project(state: &State) -> Result<WriteReport, FileError> {
    let mut session = FileSession::new(Document::new(PROJECT_NODE), SessionMode::Write);
    let root = session.document.root();
    session
        .document
        .set_attribute(root, "version", env!("CARGO_PKG_VERSION"));

    write_soundcard(&mut session, root, &state.soundcard);
    let list = session.document.add_child(root, "audio-list");
    for audio in &state.audios {
        write_audio(&mut session, list, audio);
    }

    session.resolve_all_lookups()?;
    let diagnostics = session.take_diagnostics();
    debug!(
        "wrote {} audios into {} nodes",
        state.audios.len(),
        session.document.len()
    );
    Ok(WriteReport {
        document: session.document,
        diagnostics,
    })
}

pub fn save_project(state: &State, path: &Path, pretty: bool) -> Result<Vec<FileDiagnostic>, FileError> {
    let report = write_project(state)?;
    let file = File::create(path)?;
    report.document.write_to(BufWriter::new(file), pretty)?;
    Ok(report.diagnostics)
}

fn write_soundcard(session: &mut FileSession, parent: NodeId, soundcard: &Arc<Soundcard>) {
    let id = session.generate_id("soundcard");
    let document = &mut session.document;
    let node = document.add_child(parent, "soundcard");
    document.set_attribute(node, "id", id);
    document.set_attribute(node, "name", &soundcard.name);
    document.set_attribute(node, "samplerate", soundcard.samplerate);
    document.set_attribute(node, "buffer-size", soundcard.buffer_size);
    document.set_attribute(node, "pcm-channels", soundcard.pcm_channels);
    session.add_id_ref(node, FileObject::Soundcard(soundcard.clone()));
}

fn write_audio(session: &mut FileSession, parent: NodeId, audio: &AudioHandle) {
    let snapshot = audio.lock();
    let name = snapshot.name.clone();
    let attributes = [
        ("audio-channels", snapshot.audio_channels),
        ("output-pads", snapshot.output_pads),
        ("input-pads", snapshot.input_pads),
    ];
    let ability = flags::format_named(&snapshot.ability);
    let behaviour = flags::format_named(&snapshot.behaviour);
    let outputs = snapshot.outputs.clone();
    let inputs = snapshot.inputs.clone();
    let containers = snapshot.containers.clone();
    drop(snapshot);

    let id = session.generate_id("audio");
    let document = &mut session.document;
    let node = document.add_child(parent, "audio");
    document.set_attribute(node, "id", id);
    document.set_attribute(node, "name", name);
    for (key, value) in attributes {
        document.set_attribute(node, key, value);
    }
    document.set_attribute(node, "ability", ability);
    document.set_attribute(node, "behaviour", behaviour);
    session.add_id_ref(node, FileObject::Audio(audio.clone()));

    for (direction, channels) in [(Direction::Output, &outputs), (Direction::Input, &inputs)] {
        let list = session.document.add_child(node, "channel-list");
        session
            .document
            .set_attribute(list, "direction", direction.as_str());
        for channel in channels {
            write_channel(session, list, channel);
        }
    }

    let list = session.document.add_child(node, "recall-container-list");
    let channels: Vec<ChannelHandle> = outputs.into_iter().chain(inputs).collect();
    for container in &containers {
        write_container(session, list, &channels, container);
    }
}

/// Distinct plugin effects hosted by templates in `recalls`, first
/// occurrence first.
fn effect_entries(recalls: &[RecallHandle]) -> Vec<(PluginRef, Chain)> {
    let mut effects = vec![];
    for recall in recalls {
        let recall = recall.lock();
        if !recall.is_template() {
            continue;
        }
        if let Some(plugin) = recall.plugin.clone() {
            let entry = (plugin, recall.chain);
            if !effects.contains(&entry) {
                effects.push(entry);
            }
        }
    }
    effects
}

fn write_channel(session: &mut FileSession, parent: NodeId, channel: &ChannelHandle) {
    let (pad, audio_channel, line, linked, file_link, pattern, recalls) = {
        let channel = channel.lock();
        let recalls: Vec<RecallHandle> = channel.play.iter().chain(channel.recall.iter()).cloned().collect();
        (
            channel.pad,
            channel.audio_channel,
            channel.line,
            channel.link().is_some(),
            channel.file_link.clone(),
            channel.pattern.clone(),
            recalls,
        )
    };

    let id = session.generate_id("channel");
    let document = &mut session.document;
    let node = document.add_child(parent, "channel");
    document.set_attribute(node, "id", id);
    document.set_attribute(node, "pad", pad);
    document.set_attribute(node, "audio-channel", audio_channel);
    document.set_attribute(node, "line", line);

    if let Some(file_link) = file_link {
        let child = document.add_child(node, "file-link");
        document.set_attribute(child, "filename", file_link.filename);
        document.set_attribute(child, "audio-channel", file_link.audio_channel);
    }
    if let Some(pattern) = pattern {
        let child = document.add_child(node, "pattern");
        document.set_attribute(child, "bank-0", pattern.bank_0);
        document.set_attribute(child, "bank-1", pattern.bank_1);
        document.set_attribute(child, "length", pattern.length);
        let steps: Vec<String> = pattern.active_steps.iter().map(usize::to_string).collect();
        document.set_attribute(child, "steps", steps.join(","));
    }

    let effects = effect_entries(&recalls);
    if !effects.is_empty() {
        let list = document.add_child(node, "effect-list");
        for (plugin, chain) in effects {
            let effect = document.add_child(list, "effect");
            document.set_attribute(effect, "filename", plugin.filename);
            document.set_attribute(effect, "effect", plugin.effect);
            document.set_attribute(effect, "chain", chain.as_str());
        }
    }

    let object = FileObject::Channel(channel.clone());
    session.add_id_ref(node, object.clone());
    if linked {
        session.add_lookup(Lookup::new(node, object, LookupKind::WriteLink));
    }
}

/// Smallest pad and channel ranges holding every `(pad, channel)` pair.
/// Covered cells as rectangles: channel runs per pad, with equal runs on
/// consecutive pads folded together.
fn covered_regions(covered: &[(usize, usize)]) -> Vec<Region> {
    let mut cells = covered.to_vec();
    cells.sort_unstable();
    let mut runs: Vec<Region> = vec![];
    for (pad, audio_channel) in cells {
        match runs.last_mut() {
            Some(run) if run.pads.start == pad && run.channels.end == audio_channel => {
                run.channels.end += 1;
            }
            _ => runs.push(Region::new(pad..pad + 1, audio_channel..audio_channel + 1)),
        }
    }
    let mut regions: Vec<Region> = vec![];
    for run in runs {
        match regions.last_mut() {
            Some(region) if region.pads.end == run.pads.start && region.channels == run.channels => {
                region.pads.end = run.pads.end;
            }
            _ => regions.push(run),
        }
    }
    regions
}

/// Emits one node per container of a built-in family. Plugin hosts are
/// written as per-channel effect entries instead.
fn write_container(
    session: &mut FileSession,
    parent: NodeId,
    channels: &[ChannelHandle],
    container: &ContainerHandle,
) {
    let Some(family) = container::family(container) else {
        return;
    };
    if family.plugin_ecosystem().is_some() {
        return;
    }
    let (is_play, template) = {
        let container = container.lock();
        let template = container
            .audio_template()
            .or_else(|| container.channel_template());
        (container.is_play(), template)
    };
    let recall_flags = template.map(|t| t.lock().flags).unwrap_or_default();
    let direction = if recall_flags.contains(RecallFlags::OUTPUT_ORIENTATED) {
        Direction::Output
    } else {
        Direction::Input
    };
    let covered: Vec<(usize, usize)> = channels
        .iter()
        .filter_map(|channel| {
            let channel = channel.lock();
            (channel.direction == direction && channel.has_recall_container(container))
                .then_some((channel.pad, channel.audio_channel))
        })
        .collect();
    let chain = if is_play { Chain::Play } else { Chain::Recall };

    let id = session.generate_id("recall-container");
    let document = &mut session.document;
    let node = document.add_child(parent, "recall-container");
    document.set_attribute(node, "id", id);
    document.set_attribute(node, "family", family.name());
    document.set_attribute(node, "chain", chain.as_str());
    document.set_attribute(node, "orientation", direction.as_str());
    document.set_attribute(
        node,
        "bulk",
        recall_flags.contains(RecallFlags::BULK_MODE),
    );
    let regions = covered_regions(&covered);
    if !regions.is_empty() {
        let list = document.add_child(node, "region-list");
        for region in regions {
            let child = document.add_child(list, "region");
            document.set_attribute(child, "start-pad", region.pads.start);
            document.set_attribute(child, "stop-pad", region.pads.end);
            document.set_attribute(child, "start-channel", region.channels.start);
            document.set_attribute(child, "stop-channel", region.channels.end);
        }
    }
    session.add_id_ref(node, FileObject::Container(container.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::{Pattern, set_link},
        factory::{CreateRequest, RecallFactory},
        flags::CreateFlags,
        plugin::{PluginEcosystem, PluginManagers, StaticPluginRegistry},
    };

    fn factory() -> RecallFactory {
        let mut plugins = PluginManagers::new();
        plugins.register(Arc::new(
            StaticPluginRegistry::new(PluginEcosystem::Ladspa).with("cmt.so", "delay_5s"),
        ));
        RecallFactory::new(Arc::new(plugins))
    }

    #[test]
    fn covered_cells_become_exact_regions() {
        assert!(covered_regions(&[]).is_empty());
        assert_eq!(
            covered_regions(&[(1, 0), (0, 0), (1, 1), (0, 1)]),
            [Region::new(0..2, 0..2)]
        );
        assert_eq!(
            covered_regions(&[(0, 0), (2, 0)]),
            [Region::new(0..1, 0..1), Region::new(2..3, 0..1)]
        );
        assert_eq!(
            covered_regions(&[(0, 0), (0, 2), (1, 0), (1, 2)]),
            [Region::new(0..2, 0..1), Region::new(0..1, 2..3), Region::new(1..2, 2..3)]
        );
    }

    #[test]
    fn links_are_written_as_id_paths() {
        let mut state = State::default();
        let synth = state.add_audio("synth", 1, 1, 0);
        let master = state.add_audio("master", 1, 0, 1);
        let output = synth.lock().outputs[0].clone();
        let input = master.lock().inputs[0].clone();
        set_link(&output, Some(&input)).unwrap();

        let report = write_project(&state).unwrap();
        let doc = &report.document;
        let channels: Vec<NodeId> = doc
            .descendants(doc.root())
            .into_iter()
            .filter(|n| doc.name(*n) == "channel")
            .collect();
        assert_eq!(channels.len(), 2);
        let input_id = doc.attribute(channels[1], "id").unwrap();
        assert_eq!(
            doc.attribute(channels[0], "link"),
            Some(format!("xpath=//*[@id='{input_id}']").as_str())
        );
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn link_outside_project_is_diagnosed() {
        let mut state = State::default();
        let synth = state.add_audio("synth", 1, 1, 0);
        let mut other = State::default();
        let master = other.add_audio("master", 1, 0, 1);
        let output = synth.lock().outputs[0].clone();
        let input = master.lock().inputs[0].clone();
        set_link(&output, Some(&input)).unwrap();

        let report = write_project(&state).unwrap();

        assert!(matches!(
            report.diagnostics.as_slice(),
            [FileDiagnostic::UnwrittenReference { .. }]
        ));
    }

    #[test]
    fn effects_are_distinct_per_channel() {
        let factory = factory();
        let mut state = State::default();
        let audio = state.add_audio("drums", 2, 1, 1);
        let request = CreateRequest::new("ags-ladspa", 0..2, 0..1, CreateFlags::PLAY | CreateFlags::RECALL)
            .with_plugin(PluginRef::new("cmt.so", "delay_5s"));
        factory.create(Some(&audio), request.clone());
        factory.create(Some(&audio), request);
        audio.lock().inputs[0].lock().pattern = Some(Pattern::new(16));

        let report = write_project(&state).unwrap();
        let doc = &report.document;
        let effects: Vec<NodeId> = doc
            .descendants(doc.root())
            .into_iter()
            .filter(|n| doc.name(*n) == "effect")
            .collect();
        // two channels, play and recall chain each
        assert_eq!(effects.len(), 4);
        assert_eq!(doc.attribute(effects[0], "chain"), Some("play"));
        assert_eq!(doc.attribute(effects[1], "chain"), Some("recall"));
        let containers = doc
            .descendants(doc.root())
            .into_iter()
            .filter(|n| doc.name(*n) == "recall-container")
            .count();
        assert_eq!(containers, 0);
    }

    #[test]
    fn containers_record_family_and_region() {
        let factory = factory();
        let mut state = State::default();
        let audio = state.add_audio("drums", 2, 1, 2);
        factory.create(
            Some(&audio),
            CreateRequest::new("ags-volume", 0..2, 1..2, CreateFlags::RECALL),
        );
        factory.create(
            Some(&audio),
            CreateRequest::new("ags-delay", 0..2, 0..2, CreateFlags::PLAY | CreateFlags::BULK),
        );

        let report = write_project(&state).unwrap();
        let doc = &report.document;
        let nodes: Vec<NodeId> = doc
            .descendants(doc.root())
            .into_iter()
            .filter(|n| doc.name(*n) == "recall-container")
            .collect();
        assert_eq!(nodes.len(), 2);
        let attrs = |node: NodeId, keys: &[&str]| -> Vec<String> {
            keys.iter()
                .map(|k| doc.attribute(node, k).unwrap_or_default().to_string())
                .collect()
        };
        let keys = ["family", "chain", "orientation", "bulk"];
        assert_eq!(
            attrs(nodes[0], &keys),
            ["ags-volume", "recall", "input", "false"]
        );
        assert_eq!(attrs(nodes[1], &keys), ["ags-delay", "play", "input", "true"]);

        let regions = |node: NodeId| -> Vec<Vec<String>> {
            doc.children_named(node, "region-list")
                .flat_map(move |list| doc.children_named(list, "region"))
                .map(|region| attrs(region, &["start-pad", "stop-pad", "start-channel", "stop-channel"]))
                .collect()
        };
        assert_eq!(regions(nodes[0]), [["1", "2", "0", "2"]]);
        assert!(regions(nodes[1]).is_empty());
    }
}
