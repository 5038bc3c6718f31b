//! Audio abstraction.
//!
//! Sounds are addressed by file name and played fire-and-forget.

/// Sound played when an enemy dies.
pub const DEATH_SOUND: &str = "die.wav";

/// Something that can play a named sound.
pub trait AudioSink {
    fn play(&mut self, name: &str);
}

/// Discards every sound. Used by the server.
#[derive(Debug, Default)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn play(&mut self, _name: &str) {}
}

/// Keeps the names of played sounds, in order.
#[derive(Debug, Default)]
pub struct RecordingAudio {
    pub played: Vec<String>,
}

impl AudioSink for RecordingAudio {
    fn play(&mut self, name: &str) {
        self.played.push(name.to_string());
    }
}
