use super::build::Construction;
use crate::recall::Family;

pub(super) type Constructor = fn(&mut Construction<'_>);

/// Family names the factory recognises. Names match exactly.
pub(super) static DISPATCH: [(&str, Constructor); 27] = [
    ("ags-delay", delay),
    ("ags-count-beats", count_beats),
    ("ags-stream", stream),
    ("ags-rt-stream", rt_stream),
    ("ags-loop", looping),
    ("ags-feed", feed),
    ("ags-play-master", play_master),
    ("ags-prepare", prepare),
    ("ags-copy", copy),
    ("ags-buffer", buffer),
    ("ags-play", play),
    ("ags-copy-pattern", copy_pattern),
    ("ags-play-wave", play_wave),
    ("ags-capture-wave", capture_wave),
    ("ags-play-notation", play_notation),
    ("ags-play-dssi", play_dssi),
    ("ags-play-lv2", play_lv2),
    ("ags-peak", peak),
    ("ags-mute", mute),
    ("ags-volume", volume),
    ("ags-envelope", envelope),
    ("ags-ladspa", ladspa),
    ("ags-dssi", dssi),
    ("ags-lv2", lv2),
    ("ags-record-midi", record_midi),
    ("ags-route-dssi", route_dssi),
    ("ags-route-lv2", route_lv2),
];

pub(super) fn lookup(name: &str) -> Option<Constructor> {
    DISPATCH
        .iter()
        .find(|(family, _)| *family == name)
        .map(|(_, constructor)| *constructor)
}

fn delay(c: &mut Construction<'_>) {
    c.audio_scoped(Family::Delay);
}

fn count_beats(c: &mut Construction<'_>) {
    c.audio_scoped(Family::CountBeats);
}

fn stream(c: &mut Construction<'_>) {
    c.channel_scoped(Family::Stream);
}

fn rt_stream(c: &mut Construction<'_>) {
    c.channel_scoped(Family::RtStream);
}

fn looping(c: &mut Construction<'_>) {
    c.channel_scoped(Family::Loop);
}

fn feed(c: &mut Construction<'_>) {
    c.channel_scoped(Family::Feed);
}

fn play_master(c: &mut Construction<'_>) {
    c.hybrid(Family::PlayMaster);
}

fn prepare(c: &mut Construction<'_>) {
    c.destination_bearing(Family::Prepare);
}

fn copy(c: &mut Construction<'_>) {
    c.destination_bearing(Family::Copy);
}

fn buffer(c: &mut Construction<'_>) {
    c.destination_bearing(Family::Buffer);
}

fn play(c: &mut Construction<'_>) {
    c.channel_scoped(Family::Play);
}

fn copy_pattern(c: &mut Construction<'_>) {
    c.hybrid(Family::CopyPattern);
}

fn play_wave(c: &mut Construction<'_>) {
    c.hybrid(Family::PlayWave);
}

fn capture_wave(c: &mut Construction<'_>) {
    c.audio_scoped(Family::CaptureWave);
}

fn play_notation(c: &mut Construction<'_>) {
    c.audio_scoped(Family::PlayNotation);
}

fn play_dssi(c: &mut Construction<'_>) {
    c.audio_scoped(Family::PlayDssi);
}

fn play_lv2(c: &mut Construction<'_>) {
    c.audio_scoped(Family::PlayLv2);
}

fn peak(c: &mut Construction<'_>) {
    c.channel_scoped(Family::Peak);
}

fn mute(c: &mut Construction<'_>) {
    c.hybrid(Family::Mute);
}

fn volume(c: &mut Construction<'_>) {
    c.channel_scoped(Family::Volume);
}

fn envelope(c: &mut Construction<'_>) {
    c.channel_scoped(Family::Envelope);
}

fn ladspa(c: &mut Construction<'_>) {
    c.plugin(Family::Ladspa);
}

fn dssi(c: &mut Construction<'_>) {
    c.plugin(Family::Dssi);
}

fn lv2(c: &mut Construction<'_>) {
    c.plugin(Family::Lv2);
}

fn record_midi(c: &mut Construction<'_>) {
    c.audio_scoped(Family::RecordMidi);
}

fn route_dssi(c: &mut Construction<'_>) {
    c.audio_scoped(Family::RouteDssi);
}

fn route_lv2(c: &mut Construction<'_>) {
    c.audio_scoped(Family::RouteLv2);
}
