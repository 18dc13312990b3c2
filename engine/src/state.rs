use crate::{
    audio::{self, Audio, AudioHandle},
    channel::{self, ChannelHandle, Direction},
    soundcard::Soundcard,
};
use std::sync::Arc;

/// Output channel of one audio feeding an input of another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSummary {
    pub line: usize,
    pub to_audio: String,
    pub to_line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSummary {
    pub name: String,
    pub audio_channels: usize,
    pub output_pads: usize,
    pub input_pads: usize,
    pub containers: usize,
    pub audio_recalls: usize,
    pub channel_recalls: usize,
    pub links: Vec<LinkSummary>,
    pub connected: bool,
}

/// The project: audios in their document order plus the default
/// soundcard every audio is attached to.
#[derive(Debug, Clone)]
pub struct State {
    pub audios: Vec<AudioHandle>,
    pub soundcard: Arc<Soundcard>,
}

impl Default for State {
    fn default() -> Self {
        Self::new(Soundcard::default())
    }
}

impl State {
    pub fn new(soundcard: Soundcard) -> Self {
        Self {
            audios: vec![],
            soundcard: Arc::new(soundcard),
        }
    }

    pub fn audio(&self, name: &str) -> Option<AudioHandle> {
        self.audios
            .iter()
            .find(|audio| audio.lock().name == name)
            .cloned()
    }

    /// Creates an audio attached to the project soundcard.
    pub fn add_audio(
        &mut self,
        name: &str,
        audio_channels: usize,
        output_pads: usize,
        input_pads: usize,
    ) -> AudioHandle {
        let audio = Audio::create(name.to_string(), audio_channels, output_pads, input_pads);
        audio::set_soundcard(&audio, Some(self.soundcard.clone()));
        self.audios.push(audio.clone());
        audio
    }

    /// Removes the named audio, releasing every link into or out of it.
    pub fn remove_audio(&mut self, name: &str) -> Option<AudioHandle> {
        let index = self.audios.iter().position(|a| a.lock().name == name)?;
        let audio = self.audios.remove(index);
        let channels = {
            let audio = audio.lock();
            audio
                .outputs
                .iter()
                .chain(audio.inputs.iter())
                .cloned()
                .collect::<Vec<_>>()
        };
        for channel in &channels {
            channel::unlink(channel);
        }
        Some(audio)
    }

    pub fn describe(&self) -> Vec<AudioSummary> {
        self.audios.iter().map(describe_audio).collect()
    }
}

fn channel_link(channel: &ChannelHandle) -> Option<LinkSummary> {
    let (line, partner) = {
        let channel = channel.lock();
        (channel.line, channel.link()?)
    };
    let (to_line, audio) = {
        let partner = partner.lock();
        (partner.line, partner.audio.upgrade()?)
    };
    let to_audio = audio.lock().name.clone();
    Some(LinkSummary {
        line,
        to_audio,
        to_line,
    })
}

fn describe_audio(audio: &AudioHandle) -> AudioSummary {
    let (mut summary, outputs, inputs) = {
        let audio = audio.lock();
        let summary = AudioSummary {
            name: audio.name.clone(),
            audio_channels: audio.audio_channels,
            output_pads: audio.output_pads,
            input_pads: audio.input_pads,
            containers: audio.containers.len(),
            audio_recalls: audio.play.len() + audio.recall.len(),
            channel_recalls: 0,
            links: vec![],
            connected: audio.connected,
        };
        (
            summary,
            audio.channels(Direction::Output).to_vec(),
            audio.channels(Direction::Input).to_vec(),
        )
    };
    for channel in outputs.iter().chain(inputs.iter()) {
        let channel = channel.lock();
        summary.channel_recalls += channel.play.len() + channel.recall.len();
    }
    summary.links = outputs.iter().filter_map(channel_link).collect();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::set_link;

    #[test]
    fn removing_audio_releases_links() {
        let mut state = State::default();
        let synth = state.add_audio("synth", 2, 1, 0);
        let master = state.add_audio("master", 2, 0, 1);
        let input = master.lock().inputs[0].clone();
        let output = synth.lock().outputs[0].clone();
        set_link(&output, Some(&input)).unwrap();

        assert!(state.remove_audio("synth").is_some());

        assert!(state.audio("synth").is_none());
        assert!(input.lock().link().is_none());
        assert!(state.remove_audio("synth").is_none());
    }

    #[test]
    fn describe_lists_outgoing_links() {
        let mut state = State::default();
        let synth = state.add_audio("synth", 2, 1, 0);
        let master = state.add_audio("master", 2, 0, 1);
        let output = synth.lock().outputs[1].clone();
        let input = master.lock().inputs[0].clone();
        set_link(&output, Some(&input)).unwrap();

        let summary = state.describe();

        assert_eq!(summary.len(), 2);
        assert_eq!(
            summary[0].links,
            vec![LinkSummary {
                line: 1,
                to_audio: "master".to_string(),
                to_line: 0
            }]
        );
        assert!(summary[1].links.is_empty());
    }

    #[test]
    fn audios_share_project_soundcard() {
        let mut state = State::default();
        let audio = state.add_audio("drums", 1, 1, 1);
        let card = audio.lock().soundcard.clone().unwrap();
        assert!(Arc::ptr_eq(&card, &state.soundcard));
    }
}
