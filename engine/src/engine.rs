use tokio::sync::mpsc::{Receiver, Sender};
use tracing::{debug, error};

use crate::{
    audio,
    channel::{self, ChannelHandle},
    config::EngineConfig,
    factory::{CreateRequest, RecallFactory},
    file,
    message::{Action, ChannelAddress, Message},
    state::State,
};

pub struct Engine {
    clients: Vec<Sender<Message>>,
    rx: Receiver<Message>,
    state: State,
    factory: RecallFactory,
    config: EngineConfig,
}

impl Engine {
    pub fn new(
        rx: Receiver<Message>,
        config: EngineConfig,
        factory: RecallFactory,
    ) -> Self {
        Self {
            rx,
            clients: vec![],
            state: State::new(config.soundcard.clone()),
            factory,
            config,
        }
    }

    async fn notify_clients(&self, action: Result<Action, String>) {
        for client in &self.clients {
            if let Err(e) = client.send(Message::Response(action.clone())).await {
                error!("Error sending response to client {e}");
            }
        }
    }

    fn channel(&self, address: &ChannelAddress) -> Result<ChannelHandle, String> {
        let audio = self
            .state
            .audio(&address.audio)
            .ok_or_else(|| format!("Audio {} not found", address.audio))?;
        let channel = audio
            .lock()
            .channels(address.direction)
            .get(address.line)
            .cloned();
        channel.ok_or_else(|| format!(
            "Audio {} has no {} line {}",
            address.audio, address.direction, address.line
        ))
    }

    fn apply(&mut self, a: Action) -> Result<Action, String> {
        match a {
            Action::AddAudio {
                ref name,
                audio_channels,
                output_pads,
                input_pads,
            } => {
                if self.state.audio(name).is_some() {
                    return Err(format!("Audio {name} already exists"));
                }
                self.state
                    .add_audio(name, audio_channels, output_pads, input_pads);
            }
            Action::RemoveAudio(ref name) => {
                self.state
                    .remove_audio(name)
                    .ok_or_else(|| format!("Audio {name} not found"))?;
            }
            Action::ResizePads {
                ref audio,
                direction,
                pads,
            } => {
                let handle = self
                    .state
                    .audio(audio)
                    .ok_or_else(|| format!("Audio {audio} not found"))?;
                audio::set_pads(&handle, direction, pads);
            }
            Action::ResizeAudioChannels {
                ref audio,
                audio_channels,
            } => {
                let handle = self
                    .state
                    .audio(audio)
                    .ok_or_else(|| format!("Audio {audio} not found"))?;
                audio::set_audio_channels(&handle, audio_channels);
            }
            Action::LinkChannel {
                channel: ref address,
                ref link,
            } => {
                let source = self.channel(address)?;
                let target = link.as_ref().map(|l| self.channel(l)).transpose()?;
                channel::set_link(&source, target.as_ref()).map_err(|e| e.to_string())?;
            }
            Action::CreateRecall {
                audio,
                family,
                channels,
                pads,
                flags,
                plugin,
            } => {
                let handle = self.state.audio(&audio);
                let mut request = CreateRequest::new(family.clone(), channels, pads, flags);
                if let Some(plugin) = plugin {
                    request = request.with_plugin(plugin);
                }
                let output = self.factory.create(handle.as_ref(), request);
                return Ok(Action::RecallsCreated {
                    audio,
                    family,
                    recalls: output.recalls().len(),
                    containers: output.containers().iter().map(|c| c.lock().id).collect(),
                    warnings: output.warnings.iter().map(ToString::to_string).collect(),
                });
            }
            Action::RemoveEffect {
                ref audio,
                container,
            } => {
                let handle = self
                    .state
                    .audio(audio)
                    .ok_or_else(|| format!("Audio {audio} not found"))?;
                let containers = handle.lock().containers.clone();
                let found = containers
                    .into_iter()
                    .find(|c| c.lock().id == container)
                    .ok_or_else(|| format!("Audio {audio} has no container {container}"))?;
                self.factory.remove(&handle, &found);
            }
            Action::SaveProject(path) => {
                let diagnostics = file::save_project(&self.state, &path, self.config.pretty_json)
                    .map_err(|e| e.to_string())?;
                return Ok(Action::ProjectSaved {
                    path,
                    diagnostics: diagnostics.iter().map(ToString::to_string).collect(),
                });
            }
            Action::LoadProject(path) => {
                let report = file::load_project(&self.factory, &path)
                    .map_err(|e| e.to_string())?;
                self.state = report.state;
                return Ok(Action::ProjectLoaded {
                    path,
                    audios: self.state.audios.len(),
                    diagnostics: report.diagnostics.iter().map(ToString::to_string).collect(),
                });
            }
            Action::Describe => {
                return Ok(Action::Description(self.state.describe()));
            }
            Action::Quit
            | Action::RecallsCreated { .. }
            | Action::ProjectSaved { .. }
            | Action::ProjectLoaded { .. }
            | Action::Description(_) => {}
        }
        Ok(a)
    }

    async fn handle_request(&mut self, a: Action) {
        debug!("request {a:?}");
        let result = self.apply(a);
        self.notify_clients(result).await;
    }

    pub async fn work(&mut self) {
        while let Some(message) = self.rx.recv().await {
            match message {
                Message::Channel(s) => {
                    self.clients.push(s);
                }
                Message::Request(Action::Quit) => {
                    self.notify_clients(Ok(Action::Quit)).await;
                    break;
                }
                Message::Request(a) => {
                    self.handle_request(a).await;
                }
                Message::Response(_) => {}
            }
        }
    }
}
