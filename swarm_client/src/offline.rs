//! Single-player mode: the client owns and simulates the swarm itself.

use rand::{rngs::StdRng, SeedableRng};
use swarm_shared::{
    audio::AudioSink,
    clock::Millis,
    config::GameConfig,
    math::{Bounds, Vec2},
    net::EntityId,
    render::RenderBackend,
    swarm::{DamageOutcome, Swarm},
};
use tracing::info;

pub struct LocalGame {
    swarm: Swarm,
    rng: StdRng,
    bounds: Bounds,
    enemy_count: usize,
    kills: u32,
}

impl LocalGame {
    pub fn new(cfg: &GameConfig) -> Self {
        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let bounds = cfg.bounds();
        let mut swarm = Swarm::new();
        swarm.populate(cfg.enemy_count, bounds, &mut rng);
        Self {
            swarm,
            rng,
            bounds,
            enemy_count: cfg.enemy_count,
            kills: 0,
        }
    }

    pub fn swarm(&self) -> &Swarm {
        &self.swarm
    }

    pub fn kills(&self) -> u32 {
        self.kills
    }

    /// One paint pass: every enemy draws and moves, finished explosions are
    /// dropped, and the population is topped up.
    pub fn frame(&mut self, surface: &mut dyn RenderBackend, now: Millis) {
        surface.begin_frame();
        self.bounds = surface.screen_size();
        self.swarm.frame(surface, now, &mut self.rng);
        self.swarm
            .populate(self.enemy_count, self.bounds, &mut self.rng);
        surface.end_frame();
    }

    /// Hits the living enemy closest to `point`.
    pub fn fire_nearest(
        &mut self,
        point: Vec2,
        amount: f32,
        now: Millis,
        audio: &mut dyn AudioSink,
    ) -> Option<(EntityId, DamageOutcome)> {
        let id = self.swarm.nearest(point)?.id();
        let outcome = self.swarm.damage(id, amount, now, audio, &mut self.rng)?;
        if outcome == DamageOutcome::Killed {
            self.kills += 1;
            info!(enemy = %id, kills = self.kills, "Enemy killed");
        }
        Some((id, outcome))
    }
}

#[cfg(test)]
mod tests {
    use swarm_shared::{
        audio::RecordingAudio,
        clock::{Clock, ManualClock},
        render::RecordingRenderer,
    };

    use super::*;

    fn config() -> GameConfig {
        GameConfig {
            enemy_count: 3,
            seed: Some(5),
            screen_width: 400.0,
            screen_height: 300.0,
            ..Default::default()
        }
    }

    #[test]
    fn frames_draw_and_keep_population() {
        let mut game = LocalGame::new(&config());
        let mut surface = RecordingRenderer::new(Bounds::new(400.0, 300.0));
        let mut audio = RecordingAudio::default();
        let clock = ManualClock::new(0);

        game.frame(&mut surface, clock.now_millis());
        clock.advance(16);
        assert!(surface.ovals().count() >= 6);

        let center = Vec2::new(200.0, 150.0);
        let (_, outcome) = game
            .fire_nearest(center, 1_000.0, clock.now_millis(), &mut audio)
            .expect("an enemy to hit");
        assert_eq!(outcome, DamageOutcome::Killed);
        assert_eq!(game.kills(), 1);
        assert_eq!(audio.played.len(), 1);

        // A replacement is spawned right away; the dying one lingers until
        // its explosion ends.
        clock.advance(16);
        game.frame(&mut surface, clock.now_millis());
        assert_eq!(game.swarm().alive(), 3);
        assert_eq!(game.swarm().len(), 4);

        for _ in 0..63 {
            clock.advance(16);
            game.frame(&mut surface, clock.now_millis());
        }
        assert_eq!(game.swarm().len(), 3);
        assert_eq!(surface.frames, 65);
    }
}
