use rackwire_engine::{
    channel::Direction,
    config::EngineConfig,
    flags::CreateFlags,
    init,
    message::{Action, ChannelAddress, Message},
};
use tempfile::tempdir;
use tokio::sync::mpsc::{Receiver, Sender, channel};

struct Client {
    tx: Sender<Message>,
    rx: Receiver<Message>,
}

impl Client {
    async fn connect(tx: Sender<Message>) -> Self {
        let (client_tx, rx) = channel(32);
        tx.send(Message::Channel(client_tx)).await.unwrap();
        Self { tx, rx }
    }

    async fn request(&mut self, action: Action) -> Result<Action, String> {
        self.tx.send(Message::Request(action)).await.unwrap();
        match self.rx.recv().await {
            Some(Message::Response(result)) => result,
            other => panic!("unexpected reply {other:?}"),
        }
    }

    async fn add_audio(&mut self, name: &str, output_pads: usize, input_pads: usize) {
        self.request(Action::AddAudio {
            name: name.to_string(),
            audio_channels: 2,
            output_pads,
            input_pads,
        })
        .await
        .unwrap();
    }
}

#[tokio::test]
async fn builds_links_and_describes_a_session() {
    let (tx, handle) = init(EngineConfig::default());
    let mut client = Client::connect(tx).await;
    client.add_audio("synth", 1, 1).await;
    client.add_audio("master", 0, 1).await;

    client
        .request(Action::LinkChannel {
            channel: ChannelAddress::new("synth", Direction::Output, 1),
            link: Some(ChannelAddress::new("master", Direction::Input, 1)),
        })
        .await
        .unwrap();
    let created = client
        .request(Action::CreateRecall {
            audio: "synth".to_string(),
            family: "ags-volume".to_string(),
            channels: 0..2,
            pads: 0..1,
            flags: CreateFlags::PLAY | CreateFlags::RECALL,
            plugin: None,
        })
        .await
        .unwrap();
    let Action::RecallsCreated {
        recalls,
        containers,
        warnings,
        ..
    } = created
    else {
        panic!("expected created recalls");
    };
    assert_eq!(recalls, 8);
    assert_eq!(containers.len(), 2);
    assert!(warnings.is_empty());

    let Ok(Action::Description(summary)) = client.request(Action::Describe).await else {
        panic!("no description");
    };
    assert_eq!(summary.len(), 2);
    assert_eq!(summary[0].channel_recalls, 8);
    assert_eq!(summary[0].links[0].to_audio, "master");

    client
        .request(Action::RemoveEffect {
            audio: "synth".to_string(),
            container: containers[0],
        })
        .await
        .unwrap();
    let Ok(Action::Description(summary)) = client.request(Action::Describe).await else {
        panic!("no description");
    };
    assert_eq!(summary[0].containers, 1);
    assert_eq!(summary[0].channel_recalls, 4);

    assert!(matches!(client.request(Action::Quit).await, Ok(Action::Quit)));
    handle.await.unwrap();
}

#[tokio::test]
async fn rejects_bad_requests_with_errors() {
    let (tx, handle) = init(EngineConfig::default());
    let mut client = Client::connect(tx).await;
    client.add_audio("synth", 1, 1).await;

    let duplicate = client
        .request(Action::AddAudio {
            name: "synth".to_string(),
            audio_channels: 1,
            output_pads: 1,
            input_pads: 1,
        })
        .await;
    assert!(duplicate.is_err());

    let loop_back = client
        .request(Action::LinkChannel {
            channel: ChannelAddress::new("synth", Direction::Output, 0),
            link: Some(ChannelAddress::new("synth", Direction::Input, 0)),
        })
        .await;
    assert!(loop_back.unwrap_err().contains("loop"));

    let missing = client
        .request(Action::ResizePads {
            audio: "drums".to_string(),
            direction: Direction::Input,
            pads: 2,
        })
        .await;
    assert_eq!(missing.unwrap_err(), "Audio drums not found");

    let unknown = client
        .request(Action::CreateRecall {
            audio: "synth".to_string(),
            family: "ags-reverb".to_string(),
            channels: 0..2,
            pads: 0..1,
            flags: CreateFlags::PLAY,
            plugin: None,
        })
        .await
        .unwrap();
    let Action::RecallsCreated { recalls, warnings, .. } = unknown else {
        panic!("expected created recalls");
    };
    assert_eq!(recalls, 0);
    assert_eq!(warnings.len(), 1);

    client.request(Action::Quit).await.unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn saves_and_loads_through_the_engine() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.json");
    let (tx, handle) = init(EngineConfig::default());
    let mut client = Client::connect(tx).await;
    client.add_audio("synth", 1, 1).await;
    client
        .request(Action::CreateRecall {
            audio: "synth".to_string(),
            family: "ags-delay".to_string(),
            channels: 0..2,
            pads: 0..1,
            flags: CreateFlags::PLAY,
            plugin: None,
        })
        .await
        .unwrap();

    let saved = client.request(Action::SaveProject(path.clone())).await;
    assert!(matches!(saved, Ok(Action::ProjectSaved { ref diagnostics, .. }) if diagnostics.is_empty()));
    client
        .request(Action::RemoveAudio("synth".to_string()))
        .await
        .unwrap();

    let loaded = client.request(Action::LoadProject(path)).await;
    assert!(matches!(loaded, Ok(Action::ProjectLoaded { audios: 1, .. })));
    let Ok(Action::Description(summary)) = client.request(Action::Describe).await else {
        panic!("no description");
    };
    assert_eq!(summary[0].name, "synth");
    assert_eq!(summary[0].audio_recalls, 2);
    assert!(summary[0].connected);

    client.request(Action::Quit).await.unwrap();
    handle.await.unwrap();
}
