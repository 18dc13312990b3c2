use crate::channel::ChannelHandle;
use std::ops::Range;

/// Rectangle of pads by audio channels a factory call covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub pads: Range<usize>,
    pub channels: Range<usize>,
}

impl Region {
    pub fn new(pads: Range<usize>, channels: Range<usize>) -> Self {
        Self { pads, channels }
    }

    pub fn is_empty(&self) -> bool {
        self.pads.is_empty() || self.channels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pads.len().saturating_mul(self.channels.len())
    }

    /// Cuts the region down to an audio with `pads` pads of
    /// `audio_channels` channels. The flag tells whether anything was cut.
    pub fn clamp(&self, pads: usize, audio_channels: usize) -> (Region, bool) {
        let clamp = |range: &Range<usize>, limit: usize| {
            let end = range.end.min(limit);
            range.start.min(end)..end
        };
        let clamped = Region {
            pads: clamp(&self.pads, pads),
            channels: clamp(&self.channels, audio_channels),
        };
        let cut = clamped.pads.len() < self.pads.len() || clamped.channels.len() < self.channels.len();
        (clamped, cut)
    }

    /// Lines covered, pad-major then channel-minor.
    pub fn lines(&self, audio_channels: usize) -> impl Iterator<Item = usize> + '_ {
        self.pads.clone().flat_map(move |pad| {
            self.channels
                .clone()
                .map(move |channel| pad * audio_channels + channel)
        })
    }
}

pub fn nth(channels: &[ChannelHandle], line: usize) -> Option<ChannelHandle> {
    channels.get(line).cloned()
}

/// Channels of `region` in pad-major order.
pub fn region_channels(
    channels: &[ChannelHandle],
    audio_channels: usize,
    region: &Region,
) -> Vec<ChannelHandle> {
    region
        .lines(audio_channels)
        .filter_map(|line| nth(channels, line))
        .collect()
}

/// The channel serving `audio_channel` on every pad, following next-pad
/// order, or previous-pad order when `reverse` is set.
pub fn pad_walk(
    channels: &[ChannelHandle],
    audio_channels: usize,
    audio_channel: usize,
    reverse: bool,
) -> Vec<ChannelHandle> {
    if audio_channels == 0 || audio_channel >= audio_channels {
        return vec![];
    }
    let mut walk: Vec<ChannelHandle> = channels
        .iter()
        .skip(audio_channel)
        .step_by(audio_channels)
        .cloned()
        .collect();
    if reverse {
        walk.reverse();
    }
    walk
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Audio;
    use rstest::rstest;

    #[rstest]
    #[case(0..2, 0..2, 3, 3, 0..2, 0..2, false)]
    #[case(0..4, 1..3, 2, 2, 0..2, 1..2, true)]
    #[case(3..5, 0..1, 2, 1, 2..2, 0..1, true)]
    #[case(1..1, 0..2, 2, 2, 1..1, 0..2, false)]
    #[case(0..usize::MAX, 0..usize::MAX, 2, 2, 0..2, 0..2, true)]
    fn clamp_keeps_region_inside_audio(
        #[case] pads: Range<usize>,
        #[case] channels: Range<usize>,
        #[case] pad_count: usize,
        #[case] audio_channels: usize,
        #[case] expected_pads: Range<usize>,
        #[case] expected_channels: Range<usize>,
        #[case] cut: bool,
    ) {
        let (clamped, was_cut) = Region::new(pads, channels).clamp(pad_count, audio_channels);
        assert_eq!(clamped, Region::new(expected_pads, expected_channels));
        assert_eq!(was_cut, cut);
    }

    #[test]
    fn region_is_pad_major() {
        let region = Region::new(1..3, 0..2);
        assert_eq!(region.lines(3).collect::<Vec<_>>(), vec![3, 4, 6, 7]);
    }

    #[test]
    fn pad_walk_visits_same_audio_channel() {
        let audio = Audio::create("walk".to_string(), 2, 3, 0);
        let outputs = audio.lock().outputs.clone();
        let lines: Vec<usize> = pad_walk(&outputs, 2, 1, false)
            .iter()
            .map(|c| c.lock().line)
            .collect();
        assert_eq!(lines, vec![1, 3, 5]);
        let reversed: Vec<usize> = pad_walk(&outputs, 2, 1, true)
            .iter()
            .map(|c| c.lock().line)
            .collect();
        assert_eq!(reversed, vec![5, 3, 1]);
        assert!(pad_walk(&outputs, 2, 2, false).is_empty());
    }
}
