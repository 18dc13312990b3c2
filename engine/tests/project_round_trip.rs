use rackwire_engine::{
    audio,
    channel::{Direction, FileLink, Pattern, set_link},
    factory::{CreateRequest, RecallFactory},
    file::{self, FileDiagnostic, ProjectReader, document::Document, xpath},
    flags::{BehaviourFlags, CreateFlags},
    plugin::{PluginEcosystem, PluginManagers, PluginRef, StaticPluginRegistry},
    state::State,
};
use std::sync::Arc;
use tempfile::tempdir;

fn factory() -> RecallFactory {
    let mut plugins = PluginManagers::new();
    plugins.register(Arc::new(
        StaticPluginRegistry::new(PluginEcosystem::Ladspa).with("cmt.so", "delay_5s"),
    ));
    RecallFactory::new(Arc::new(plugins))
}

/// A synth feeding a master bus, with a channel effect pair, an audio
/// delay, a hosted plugin and some per-channel data.
fn session(factory: &RecallFactory) -> State {
    let mut state = State::default();
    let synth = state.add_audio("synth", 2, 1, 1);
    let master = state.add_audio("master", 2, 0, 1);
    synth.lock().behaviour = BehaviourFlags::DEFAULTS_TO_INPUT;

    for line in 0..2 {
        let output = synth.lock().outputs[line].clone();
        let input = master.lock().inputs[line].clone();
        set_link(&output, Some(&input)).unwrap();
    }

    factory.create(
        Some(&synth),
        CreateRequest::new("ags-volume", 0..2, 0..1, CreateFlags::PLAY | CreateFlags::RECALL),
    );
    factory.create(
        Some(&synth),
        CreateRequest::new("ags-delay", 0..2, 0..1, CreateFlags::PLAY),
    );
    factory.create(
        Some(&synth),
        CreateRequest::new("ags-ladspa", 0..1, 0..1, CreateFlags::PLAY)
            .with_plugin(PluginRef::new("cmt.so", "delay_5s")),
    );
    factory.create(
        Some(&master),
        CreateRequest::new("ags-peak", 0..2, 0..1, CreateFlags::RECALL),
    );

    let input = synth.lock().inputs[1].clone();
    let mut pattern = Pattern::new(16);
    pattern.bank_1 = 2;
    pattern.toggle(0);
    pattern.toggle(8);
    let mut channel = input.lock();
    channel.pattern = Some(pattern);
    channel.file_link = Some(FileLink {
        filename: "kick.wav".to_string(),
        audio_channel: 1,
    });
    drop(channel);
    state
}

#[test]
fn links_are_written_as_id_paths() {
    let factory = factory();
    let state = session(&factory);

    let report = file::write_project(&state).unwrap();

    assert!(report.diagnostics.is_empty());
    let document = &report.document;
    let links: Vec<&str> = document
        .descendants(document.root())
        .into_iter()
        .filter_map(|node| document.attribute(node, "link"))
        .collect();
    assert_eq!(links.len(), 4);
    for link in links {
        assert!(link.starts_with(xpath::PREFIX));
        let found = xpath::PathExpr::parse(link).unwrap().evaluate(document);
        assert_eq!(found.len(), 1);
        assert_eq!(document.name(found[0]), "channel");
    }
}

#[test]
fn reader_defers_links_and_recalls() {
    let factory = factory();
    let state = session(&factory);
    let written = file::write_project(&state).unwrap();
    let mut expected = state.describe();
    for summary in &mut expected {
        summary.connected = true;
    }

    let mut reader = ProjectReader::new(&factory, written.document).unwrap();
    reader.walk().unwrap();

    let synth = reader.state().audio("synth").unwrap();
    let output = synth.lock().outputs[0].clone();
    assert!(output.lock().link().is_none());
    assert!(synth.lock().containers.is_empty());
    assert!(!synth.lock().connected);
    assert_eq!(reader.session().pending_lookups(), 4);

    reader.resolve_lookups().unwrap();

    let partner = output.lock().link().unwrap();
    let to = partner.lock().audio.upgrade().unwrap();
    assert_eq!(to.lock().name, "master");
    assert!(synth.lock().play.is_empty());

    reader.start_launches().unwrap();
    let report = reader.finish();

    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    assert_eq!(report.state.describe(), expected);

    let synth = report.state.audio("synth").unwrap();
    assert_eq!(synth.lock().behaviour, BehaviourFlags::DEFAULTS_TO_INPUT);
    let input = synth.lock().inputs[1].clone();
    let channel = input.lock();
    let pattern = channel.pattern.as_ref().unwrap();
    assert_eq!(pattern.bank_1, 2);
    assert_eq!(pattern.active_steps.iter().copied().collect::<Vec<_>>(), vec![0, 8]);
    assert_eq!(channel.file_link.as_ref().unwrap().filename, "kick.wav");
}

#[test]
fn hosted_plugin_comes_back_on_its_channel() {
    let factory = factory();
    let state = session(&factory);
    let written = file::write_project(&state).unwrap();

    let report = file::read::read(&factory, written.document).unwrap();

    let synth = report.state.audio("synth").unwrap();
    let inputs = synth.lock().channels(Direction::Input).to_vec();
    let hosted: Vec<Option<PluginRef>> = inputs
        .iter()
        .map(|input| {
            let recalls = input.lock().play.clone();
            recalls.iter().find_map(|r| r.lock().plugin.clone())
        })
        .collect();
    assert_eq!(
        hosted,
        vec![Some(PluginRef::new("cmt.so", "delay_5s")), None]
    );
}

#[test]
fn missing_plugin_is_reported_and_skipped() {
    let factory = factory();
    let state = session(&factory);
    let written = file::write_project(&state).unwrap();
    let bare = RecallFactory::new(Arc::new(PluginManagers::new()));

    let report = file::read::read(&bare, written.document).unwrap();

    assert_eq!(
        report.diagnostics,
        vec![FileDiagnostic::UnknownPlugin {
            filename: "cmt.so".to_string(),
            effect: "delay_5s".to_string(),
        }]
    );
    let synth = report.state.audio("synth").unwrap();
    assert_eq!(synth.lock().containers.len(), 3);
}

#[test]
fn container_with_a_gap_keeps_its_shape() {
    let factory = factory();
    let mut state = State::default();
    let pads = state.add_audio("pads", 1, 0, 3);
    factory.create(
        Some(&pads),
        CreateRequest::new("ags-volume", 0..1, 0..1, CreateFlags::PLAY),
    );
    factory.create(
        Some(&pads),
        CreateRequest::new("ags-volume", 0..1, 2..3, CreateFlags::PLAY | CreateFlags::REMAP),
    );
    let play_counts = |state: &State| -> Vec<usize> {
        let audio = state.audio("pads").unwrap();
        let inputs = audio.lock().inputs.clone();
        inputs.iter().map(|input| input.lock().play.len()).collect()
    };
    assert_eq!(play_counts(&state), [2, 0, 2]);
    assert_eq!(pads.lock().containers.len(), 1);

    let written = file::write_project(&state).unwrap();
    let report = file::read::read(&factory, written.document).unwrap();

    assert!(report.diagnostics.is_empty());
    assert_eq!(play_counts(&report.state), [2, 0, 2]);
    let audio = report.state.audio("pads").unwrap();
    assert_eq!(audio.lock().containers.len(), 1);
}

#[test]
fn resized_audio_keeps_its_links_through_a_save() {
    let factory = factory();
    let state = session(&factory);
    let synth = state.audio("synth").unwrap();
    audio::set_pads(&synth, Direction::Input, 2);

    let dir = tempdir().unwrap();
    let path = dir.path().join("session.json");
    let diagnostics = file::save_project(&state, &path, true).unwrap();
    assert!(diagnostics.is_empty());

    let report = file::load_project(&factory, &path).unwrap();

    let summary = report.state.describe();
    assert_eq!(summary[0].input_pads, 2);
    assert_eq!(summary[0].links.len(), 2);
    assert!(summary.iter().all(|s| s.connected));
}

#[test]
fn saved_file_is_plain_json() {
    let factory = factory();
    let state = session(&factory);
    let dir = tempdir().unwrap();
    let path = dir.path().join("compact.json");

    file::save_project(&state, &path, false).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(!text.contains('\n'));
    let document = Document::from_json(&text).unwrap();
    assert_eq!(document.name(document.root()), file::PROJECT_NODE);
}

#[test]
fn loading_a_missing_file_fails() {
    let factory = factory();
    let dir = tempdir().unwrap();
    let error = file::load_project(&factory, &dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(error, file::FileError::Io(_)));
}
