//! Top-level screens and sound output of the headless client.

use swarm_shared::audio::AudioSink;
use tracing::info;

use crate::input::PanelController;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Home,
    Game,
}

/// Tracks which panel is showing.
#[derive(Debug, Clone)]
pub struct Panels {
    current: Panel,
}

impl Panels {
    pub fn new(current: Panel) -> Self {
        Self { current }
    }

    pub fn current(&self) -> Panel {
        self.current
    }

    pub fn show_game_panel(&mut self) {
        if self.current != Panel::Game {
            info!("Switched to game panel");
        }
        self.current = Panel::Game;
    }
}

impl PanelController for Panels {
    fn show_home_panel(&mut self) {
        if self.current != Panel::Home {
            info!("Switched to home panel");
        }
        self.current = Panel::Home;
    }
}

/// Emits a tracing event per played sound.
#[derive(Debug, Default)]
pub struct LogAudio;

impl AudioSink for LogAudio {
    fn play(&mut self, name: &str) {
        info!(sound = %name, "Play sound");
    }
}
