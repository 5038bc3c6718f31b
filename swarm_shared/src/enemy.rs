//! Enemy entity.
//!
//! A wandering, damageable blob. While alive it steers toward a random target
//! and wraps around the screen edges. When its health runs out it bursts into
//! a cloud of particles that fades over one second; only then does it count
//! as dead for the owner, who removes it.
//!
//! Randomness and time are passed in by the caller so the same code runs
//! under a seeded RNG and a manual clock in tests.

use std::f32::consts::TAU;

use rand::Rng;
use tracing::debug;

use crate::{
    audio::{AudioSink, DEATH_SOUND},
    clock::Millis,
    error::SyncError,
    math::{Bounds, Vec2},
    net::{EnemyState, EntityId},
    render::{Rect, RenderBackend, Rgba},
    steering::{self, SteeringLimits, JITTER, TARGET_REACHED},
};

/// How long the health bar stays up after a hit.
pub const HEALTH_BAR_DISPLAY_MS: Millis = 850;
/// Length of the death animation.
pub const EXPLOSION_MS: f32 = 1000.0;
/// Explosion time added per frame (60 FPS).
pub const FRAME_MS: f32 = 16.0;
/// Particles spawned on death.
pub const EXPLOSION_PARTICLES: usize = 50;

const MIN_SIZE: u32 = 5;
const MAX_SIZE: u32 = 35;
const HEALTH_PER_SIZE: f32 = 4.0;
const HEALTH_BAR_HEIGHT: f32 = 2.0;
const HEALTH_BAR_OFFSET: f32 = 10.0;
const PARTICLE_SIZE: f32 = 3.0;

/// A mobile, damageable game entity.
#[derive(Debug, Clone)]
pub struct Enemy {
    id: EntityId,
    position: Vec2,
    velocity: Vec2,
    target: Vec2,
    limits: SteeringLimits,
    size: f32,
    color: Rgba,
    max_health: f32,
    health: f32,
    dead: bool,
    explosion_particles: Vec<Vec2>,
    explosion_time: f32,
    last_damage: Option<Millis>,
    health_bar_visible: bool,
}

impl Enemy {
    /// Spawns an enemy with random size, color, position and target.
    pub fn new<R: Rng + ?Sized>(id: EntityId, bounds: Bounds, rng: &mut R) -> Self {
        let size = rng.gen_range(MIN_SIZE..MAX_SIZE) as f32;
        Self::with_size(id, size, bounds, rng)
    }

    /// Spawns an enemy of a given size; everything else is random.
    pub fn with_size<R: Rng + ?Sized>(
        id: EntityId,
        size: f32,
        bounds: Bounds,
        rng: &mut R,
    ) -> Self {
        let color = Rgba::new(
            rng.gen_range(150..255),
            rng.gen_range(0..80),
            rng.gen_range(0..100),
            120,
        );
        let position = random_point(bounds, rng);
        let target = random_point(bounds, rng);
        let max_health = max_health_for(size);
        Self {
            id,
            position,
            velocity: Vec2::ZERO,
            target,
            limits: SteeringLimits::default(),
            size,
            color,
            max_health,
            health: max_health,
            dead: false,
            explosion_particles: Vec::new(),
            explosion_time: 0.0,
            last_damage: None,
            health_bar_visible: false,
        }
    }

    /// Builds a local mirror of a remote enemy.
    ///
    /// Size and color come from the state when present, otherwise they are
    /// rolled like a fresh spawn.
    pub fn from_state<R: Rng + ?Sized>(
        state: &EnemyState,
        bounds: Bounds,
        rng: &mut R,
    ) -> Result<Self, SyncError> {
        let mut enemy = match state.size {
            Some(size) => Self::with_size(state.id, size, bounds, rng),
            None => Self::new(state.id, bounds, rng),
        };
        enemy.update_from_state(state)?;
        Ok(enemy)
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn target(&self) -> Vec2 {
        self.target
    }

    pub fn set_target(&mut self, target: Vec2) {
        self.target = target;
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn color(&self) -> Rgba {
        self.color
    }

    pub fn limits(&self) -> SteeringLimits {
        self.limits
    }

    pub fn max_health(&self) -> f32 {
        self.max_health
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn explosion_time(&self) -> f32 {
        self.explosion_time
    }

    pub fn explosion_particles(&self) -> &[Vec2] {
        &self.explosion_particles
    }

    pub fn is_health_bar_visible(&self) -> bool {
        self.health_bar_visible
    }

    /// True from the killing blow on, including during the explosion.
    pub fn is_dying(&self) -> bool {
        self.dead
    }

    /// True once the enemy is dead and its explosion has finished.
    pub fn is_dead(&self) -> bool {
        self.dead && self.explosion_particles.is_empty()
    }

    /// Per-frame paint callback: draws the current state, then advances it.
    pub fn frame<R: Rng + ?Sized>(
        &mut self,
        surface: &mut dyn RenderBackend,
        now: Millis,
        rng: &mut R,
    ) {
        self.draw(surface, now);
        let bounds = surface.screen_size();
        self.update(bounds, now, rng);
    }

    /// Advances movement while alive, or the explosion while dead.
    pub fn update<R: Rng + ?Sized>(&mut self, bounds: Bounds, now: Millis, rng: &mut R) {
        if self.dead {
            self.update_explosion(rng);
        } else {
            self.move_step(bounds, rng);
            self.health_bar_visible = self
                .since_damage(now)
                .is_some_and(|ms| ms < HEALTH_BAR_DISPLAY_MS);
        }
    }

    fn move_step<R: Rng + ?Sized>(&mut self, bounds: Bounds, rng: &mut R) {
        let distance = self.position.distance(self.target);
        let jitter = Vec2::new(
            rng.gen_range(-JITTER..JITTER),
            rng.gen_range(-JITTER..JITTER),
        );
        self.velocity = steering::step_velocity(
            self.position,
            self.velocity,
            self.target,
            self.limits,
            jitter,
        );
        self.position = bounds.wrap(self.position + self.velocity);

        if distance < TARGET_REACHED {
            self.target = random_point(bounds, rng);
        }
    }

    fn update_explosion<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.explosion_time += FRAME_MS;
        if self.explosion_time > EXPLOSION_MS {
            self.explosion_particles.clear();
        } else {
            for p in &mut self.explosion_particles {
                p.x += rng.gen_range(-1.0..1.0);
                p.y += rng.gen_range(-1.0..1.0);
            }
        }
    }

    /// Applies damage. Kills the enemy, once, when health drops to zero.
    pub fn take_damage<R: Rng + ?Sized>(
        &mut self,
        amount: f32,
        now: Millis,
        audio: &mut dyn AudioSink,
        rng: &mut R,
    ) {
        self.health = (self.health - amount).min(self.max_health);
        self.last_damage = Some(now);
        self.health_bar_visible = true;

        if self.health <= 0.0 && !self.dead {
            self.die(audio, rng);
        }
    }

    fn die<R: Rng + ?Sized>(&mut self, audio: &mut dyn AudioSink, rng: &mut R) {
        self.dead = true;
        audio.play(DEATH_SOUND);
        let origin = self.position;
        self.explosion_particles.clear();
        self.explosion_particles.extend((0..EXPLOSION_PARTICLES).map(|_| {
            let angle = rng.gen_range(0.0..TAU);
            let speed = rng.gen_range(1.0..3.0);
            origin + Vec2::from_angle(angle) * speed
        }));
        self.explosion_time = 0.0;
        debug!(id = %self.id, x = self.position.x, y = self.position.y, "Enemy died");
    }

    /// Shows the health bar as if hit at `now`, without changing health.
    /// Mirrors use this when a snapshot reports lost health.
    pub fn mark_hit(&mut self, now: Millis) {
        self.last_damage = Some(now);
        self.health_bar_visible = true;
    }

    fn since_damage(&self, now: Millis) -> Option<Millis> {
        self.last_damage.map(|t| now.saturating_sub(t))
    }

    /// Draws the enemy, or its explosion when dead.
    pub fn draw(&self, surface: &mut dyn RenderBackend, now: Millis) {
        if self.dead {
            self.draw_explosion(surface);
            return;
        }
        self.draw_body(surface, self.position);
        if self.health_bar_visible {
            self.draw_health_bar(surface, now);
        }
        self.draw_wrapped(surface);
    }

    fn draw_body(&self, surface: &mut dyn RenderBackend, at: Vec2) {
        surface.fill_oval(Rect::centered(at, self.size), self.color);

        // The eye leads in the direction of travel.
        let eye = at + self.velocity * (self.size / 2.0 / self.limits.max_speed);
        surface.fill_oval(Rect::centered(eye, self.size / 4.0), Rgba::WHITE);
    }

    /// Ghost copies on the opposite edges while the body straddles one.
    fn draw_wrapped(&self, surface: &mut dyn RenderBackend) {
        let bounds = surface.screen_size();
        let r = self.size / 2.0;
        let p = self.position;
        if p.x + r > bounds.width {
            self.draw_body(surface, Vec2::new(p.x - bounds.width, p.y));
        }
        if p.x - r < 0.0 {
            self.draw_body(surface, Vec2::new(p.x + bounds.width, p.y));
        }
        if p.y + r > bounds.height {
            self.draw_body(surface, Vec2::new(p.x, p.y - bounds.height));
        }
        if p.y - r < 0.0 {
            self.draw_body(surface, Vec2::new(p.x, p.y + bounds.height));
        }
    }

    fn draw_health_bar(&self, surface: &mut dyn RenderBackend, now: Millis) {
        let Some(since) = self.since_damage(now) else {
            return;
        };
        if since >= HEALTH_BAR_DISPLAY_MS {
            return;
        }
        let alpha = 1.0 - since as f32 / HEALTH_BAR_DISPLAY_MS as f32;

        let x = self.position.x - self.size / 2.0;
        let y = self.position.y - self.size / 2.0 - HEALTH_BAR_OFFSET;
        surface.fill_rect(
            Rect::new(x, y, self.size, HEALTH_BAR_HEIGHT),
            Rgba::GRAY.faded(alpha),
        );
        let ratio = (self.health / self.max_health).clamp(0.0, 1.0);
        surface.fill_rect(
            Rect::new(x, y, ratio * self.size, HEALTH_BAR_HEIGHT),
            Rgba::RED.faded(alpha),
        );
    }

    fn draw_explosion(&self, surface: &mut dyn RenderBackend) {
        let alpha = (1.0 - self.explosion_time / EXPLOSION_MS).max(0.0);
        let color = Rgba::from_unit(1.0, 0.5, 0.0, alpha);
        for p in &self.explosion_particles {
            surface.fill_oval(Rect::new(p.x, p.y, PARTICLE_SIZE, PARTICLE_SIZE), color);
        }
    }

    /// Overwrites local state with an authoritative snapshot.
    ///
    /// Nothing is changed if the state is rejected.
    pub fn update_from_state(&mut self, state: &EnemyState) -> Result<(), SyncError> {
        if state.id != self.id {
            return Err(SyncError::IdMismatch {
                expected: self.id,
                got: state.id,
            });
        }
        let Some(target) = state.target else {
            return Err(SyncError::MissingTarget { id: state.id });
        };
        let finite = |v: Vec2| v.x.is_finite() && v.y.is_finite();
        let checks = [
            ("position", finite(state.position)),
            ("health", state.health.is_finite()),
            ("target", finite(target)),
            ("velocity", state.velocity.map_or(true, finite)),
            ("explosion_time", state.explosion_time.is_finite()),
            (
                "explosion_particles",
                state.explosion_particles.iter().all(|&p| finite(p)),
            ),
            ("size", state.size.map_or(true, |s| s.is_finite() && s > 0.0)),
        ];
        if let Some(&(field, _)) = checks.iter().find(|(_, ok)| !ok) {
            return Err(SyncError::NonFinite { id: state.id, field });
        }

        if let Some(size) = state.size {
            self.size = size;
            self.max_health = max_health_for(size);
        }
        if let Some(color) = state.color {
            self.color = color;
        }
        self.position = state.position;
        self.health = state.health.min(self.max_health);
        self.dead = state.dead;
        if let Some(velocity) = state.velocity {
            self.velocity = velocity;
        }
        self.target = target;
        self.explosion_time = state.explosion_time;
        self.explosion_particles.clear();
        self.explosion_particles
            .extend_from_slice(&state.explosion_particles);
        Ok(())
    }

    /// Captures the replicated fields.
    pub fn create_state(&self) -> EnemyState {
        EnemyState {
            id: self.id,
            position: self.position,
            health: self.health,
            dead: self.dead,
            velocity: Some(self.velocity),
            target: Some(self.target),
            explosion_time: self.explosion_time,
            explosion_particles: self.explosion_particles.clone(),
            size: Some(self.size),
            color: Some(self.color),
        }
    }
}

fn max_health_for(size: f32) -> f32 {
    (size * HEALTH_PER_SIZE).trunc()
}

fn random_point<R: Rng + ?Sized>(bounds: Bounds, rng: &mut R) -> Vec2 {
    bounds.wrap(Vec2::new(
        rng.gen::<f32>() * bounds.width,
        rng.gen::<f32>() * bounds.height,
    ))
}
