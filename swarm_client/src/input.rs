//! Input handling.
//!
//! Keyboard events arrive from whatever window or terminal hosts the client.
//! `GlobalKeyListener` sees every event before the focused panel does and
//! reacts to the home key; all events pass through to the panel afterwards.

/// A keyboard key, independent of any windowing library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// A printable key. Letters compare case-insensitively.
    Char(char),
    Escape,
    Enter,
    Space,
}

impl Key {
    /// Parses a key name as typed on the console: a single character, or
    /// `esc`, `enter`, `space`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "esc" | "escape" => Some(Key::Escape),
            "enter" | "return" => Some(Key::Enter),
            "space" => Some(Key::Space),
            _ => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(Key::Char(c)),
                    _ => None,
                }
            }
        }
    }

    /// Same physical key, ignoring letter case.
    pub fn matches(self, other: Key) -> bool {
        match (self, other) {
            (Key::Char(a), Key::Char(b)) => a.eq_ignore_ascii_case(&b),
            (a, b) => a == b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub kind: KeyEventKind,
    pub key: Key,
}

impl KeyEvent {
    pub fn pressed(key: Key) -> Self {
        Self {
            kind: KeyEventKind::Pressed,
            key,
        }
    }

    pub fn released(key: Key) -> Self {
        Self {
            kind: KeyEventKind::Released,
            key,
        }
    }
}

/// Switches between top-level screens.
pub trait PanelController {
    fn show_home_panel(&mut self);
}

/// Application-wide key dispatcher.
#[derive(Debug, Clone, Copy)]
pub struct GlobalKeyListener {
    home_key: Key,
}

impl GlobalKeyListener {
    pub fn new(home_key: char) -> Self {
        Self {
            home_key: Key::Char(home_key),
        }
    }

    /// Handles a key event. Returns whether the event was consumed, which
    /// is never: the focused panel still receives it.
    pub fn dispatch(&self, event: &KeyEvent, panels: &mut dyn PanelController) -> bool {
        if event.kind == KeyEventKind::Pressed && event.key.matches(self.home_key) {
            panels.show_home_panel();
        }
        false
    }
}

impl Default for GlobalKeyListener {
    fn default() -> Self {
        Self::new('Q')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingPanels {
        home: u32,
    }

    impl PanelController for CountingPanels {
        fn show_home_panel(&mut self) {
            self.home += 1;
        }
    }

    #[test]
    fn q_press_shows_home() {
        let listener = GlobalKeyListener::default();
        let mut panels = CountingPanels::default();

        assert!(!listener.dispatch(&KeyEvent::pressed(Key::Char('q')), &mut panels));
        assert!(!listener.dispatch(&KeyEvent::pressed(Key::Char('Q')), &mut panels));
        assert_eq!(panels.home, 2);
    }

    #[test]
    fn other_events_pass_through() {
        let listener = GlobalKeyListener::default();
        let mut panels = CountingPanels::default();

        assert!(!listener.dispatch(&KeyEvent::released(Key::Char('q')), &mut panels));
        assert!(!listener.dispatch(&KeyEvent::pressed(Key::Char('w')), &mut panels));
        assert!(!listener.dispatch(&KeyEvent::pressed(Key::Escape), &mut panels));
        assert_eq!(panels.home, 0);
    }

    #[test]
    fn home_key_is_configurable() {
        let listener = GlobalKeyListener::new('h');
        let mut panels = CountingPanels::default();
        listener.dispatch(&KeyEvent::pressed(Key::Char('q')), &mut panels);
        listener.dispatch(&KeyEvent::pressed(Key::Char('H')), &mut panels);
        assert_eq!(panels.home, 1);
    }

    #[test]
    fn parses_console_key_names() {
        assert_eq!(Key::parse("q"), Some(Key::Char('q')));
        assert_eq!(Key::parse("ESC"), Some(Key::Escape));
        assert_eq!(Key::parse("space"), Some(Key::Space));
        assert_eq!(Key::parse("qq"), None);
        assert_eq!(Key::parse(""), None);
    }
}
