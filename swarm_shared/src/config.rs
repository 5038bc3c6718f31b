//! Configuration system.
//!
//! Loads game configuration from JSON strings/files. Missing fields take
//! their defaults, so a config file only needs the values it changes.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::math::Bounds;

/// Most enemies one snapshot datagram can carry, all of them exploding.
pub const MAX_ENEMIES: usize = 24;

/// Root configuration shared by client/server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GameConfig {
    /// Server listen address, e.g. `127.0.0.1:40000`.
    pub server_addr: String,
    /// Fixed simulation tick rate.
    pub tick_hz: u32,
    /// Play-field width in pixels.
    pub screen_width: f32,
    /// Play-field height in pixels.
    pub screen_height: f32,
    /// Enemies the server keeps alive.
    pub enemy_count: usize,
    /// Key that switches back to the home panel.
    pub home_key: char,
    /// RNG seed; random when absent.
    pub seed: Option<u64>,
    /// Player name (client only).
    pub player_name: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:40000".to_string(),
            tick_hz: 60,
            screen_width: 800.0,
            screen_height: 600.0,
            enemy_count: 12,
            home_key: 'Q',
            seed: None,
            player_name: "Player".to_string(),
        }
    }
}

impl GameConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let cfg = Self::from_json_str(&text)
            .with_context(|| format!("parse config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tick_hz == 0 {
            anyhow::bail!("tick_hz must be positive");
        }
        if self.enemy_count > MAX_ENEMIES {
            anyhow::bail!("enemy_count {} exceeds {MAX_ENEMIES}", self.enemy_count);
        }
        if !(self.screen_width > 0.0 && self.screen_height > 0.0) {
            anyhow::bail!(
                "screen size must be positive, got {}x{}",
                self.screen_width,
                self.screen_height
            );
        }
        Ok(())
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.screen_width, self.screen_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let cfg = GameConfig::from_json_str(r#"{"enemy_count": 3, "seed": 9}"#).unwrap();
        assert_eq!(cfg.enemy_count, 3);
        assert_eq!(cfg.seed, Some(9));
        assert_eq!(cfg.tick_hz, 60);
        assert_eq!(cfg.home_key, 'Q');
        assert_eq!(cfg.bounds(), Bounds::new(800.0, 600.0));
    }

    #[test]
    fn zero_tick_rate_is_invalid() {
        let cfg = GameConfig {
            tick_hz: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
        assert!(GameConfig::default().validate().is_ok());
    }

    #[test]
    fn oversized_swarm_is_invalid() {
        let cfg = GameConfig {
            enemy_count: MAX_ENEMIES + 1,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = GameConfig::load(Path::new("/nonexistent/swarm.json")).unwrap_err();
        assert!(err.to_string().contains("read config"));
    }
}
