//! Enemy collection.
//!
//! Owns every enemy in a match, keyed by id and iterated in id order so the
//! simulation is reproducible for a given seed. The server steps its swarm;
//! clients mirror the server's swarm from snapshots.

use std::collections::BTreeMap;

use rand::Rng;
use tracing::{debug, warn};

use crate::{
    audio::{AudioSink, DEATH_SOUND},
    clock::Millis,
    enemy::Enemy,
    math::{Bounds, Vec2},
    net::{EntityId, Snapshot},
    render::RenderBackend,
};

/// Result of routing damage to an enemy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// The enemy took damage and is still alive (or was already dying).
    Hit,
    /// This hit killed the enemy.
    Killed,
}

/// What `Swarm::apply_snapshot` did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub updated: usize,
    pub spawned: usize,
    pub removed: usize,
    pub rejected: usize,
}

#[derive(Debug, Default, Clone)]
pub struct Swarm {
    enemies: BTreeMap<EntityId, Enemy>,
}

impl Swarm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.enemies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enemies.is_empty()
    }

    /// Enemies that have not taken a killing blow.
    pub fn alive(&self) -> usize {
        self.enemies.values().filter(|e| !e.is_dying()).count()
    }

    pub fn get(&self, id: EntityId) -> Option<&Enemy> {
        self.enemies.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Enemy> {
        self.enemies.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Enemy> {
        self.enemies.values()
    }

    pub fn insert(&mut self, enemy: Enemy) {
        self.enemies.insert(enemy.id(), enemy);
    }

    pub fn clear(&mut self) {
        self.enemies.clear();
    }

    /// Spawns random enemies until `count` are alive. Returns the new ids.
    pub fn populate<R: Rng + ?Sized>(
        &mut self,
        count: usize,
        bounds: Bounds,
        rng: &mut R,
    ) -> Vec<EntityId> {
        let missing = count.saturating_sub(self.alive());
        (0..missing)
            .map(|_| {
                let id = EntityId::random(rng);
                self.insert(Enemy::new(id, bounds, rng));
                id
            })
            .collect()
    }

    /// Advances every enemy one frame and drops the ones whose explosion
    /// has finished. Returns the dropped ids.
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        bounds: Bounds,
        now: Millis,
        rng: &mut R,
    ) -> Vec<EntityId> {
        for enemy in self.enemies.values_mut() {
            enemy.update(bounds, now, rng);
        }
        self.remove_finished()
    }

    /// Draws and then advances every enemy, as one paint pass. Returns the
    /// ids dropped after their explosion finished.
    pub fn frame<R: Rng + ?Sized>(
        &mut self,
        surface: &mut dyn RenderBackend,
        now: Millis,
        rng: &mut R,
    ) -> Vec<EntityId> {
        for enemy in self.enemies.values_mut() {
            enemy.frame(surface, now, rng);
        }
        self.remove_finished()
    }

    fn remove_finished(&mut self) -> Vec<EntityId> {
        let finished: Vec<EntityId> = self
            .enemies
            .values()
            .filter(|e| e.is_dead())
            .map(Enemy::id)
            .collect();
        for id in &finished {
            self.enemies.remove(id);
            debug!(id = %id, "Enemy removed");
        }
        finished
    }

    pub fn draw(&self, surface: &mut dyn RenderBackend, now: Millis) {
        for enemy in self.enemies.values() {
            enemy.draw(surface, now);
        }
    }

    /// Routes damage to one enemy. `None` if the id is unknown.
    pub fn damage<R: Rng + ?Sized>(
        &mut self,
        id: EntityId,
        amount: f32,
        now: Millis,
        audio: &mut dyn AudioSink,
        rng: &mut R,
    ) -> Option<DamageOutcome> {
        let enemy = self.enemies.get_mut(&id)?;
        let was_dying = enemy.is_dying();
        enemy.take_damage(amount, now, audio, rng);
        if !was_dying && enemy.is_dying() {
            Some(DamageOutcome::Killed)
        } else {
            Some(DamageOutcome::Hit)
        }
    }

    /// The living enemy closest to `point`.
    pub fn nearest(&self, point: Vec2) -> Option<&Enemy> {
        self.enemies
            .values()
            .filter(|e| !e.is_dying())
            .min_by(|a, b| {
                let da = a.position().distance(point);
                let db = b.position().distance(point);
                da.total_cmp(&db)
            })
    }

    pub fn snapshot(&self, tick: u32) -> Snapshot {
        Snapshot {
            tick,
            enemies: self.enemies.values().map(Enemy::create_state).collect(),
        }
    }

    /// Makes this swarm mirror `snapshot`.
    ///
    /// Known enemies are overwritten in place, unknown ones are created, and
    /// local enemies missing from the snapshot are dropped. A bad state is
    /// logged and skipped; the enemy it refers to is left as it was. An
    /// enemy whose health went down since the last snapshot shows its
    /// health bar from `now`.
    pub fn apply_snapshot<R: Rng + ?Sized>(
        &mut self,
        snapshot: &Snapshot,
        bounds: Bounds,
        now: Millis,
        audio: &mut dyn AudioSink,
        rng: &mut R,
    ) -> SyncReport {
        let mut report = SyncReport::default();
        let mut seen = Vec::with_capacity(snapshot.enemies.len());

        for state in &snapshot.enemies {
            seen.push(state.id);
            match self.enemies.get_mut(&state.id) {
                Some(enemy) => {
                    let was_dying = enemy.is_dying();
                    let health = enemy.health();
                    match enemy.update_from_state(state) {
                        Ok(()) => {
                            report.updated += 1;
                            if enemy.health() < health {
                                enemy.mark_hit(now);
                            }
                            if !was_dying && enemy.is_dying() {
                                audio.play(DEATH_SOUND);
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, tick = snapshot.tick, "Rejected enemy state");
                            report.rejected += 1;
                        }
                    }
                }
                None => match Enemy::from_state(state, bounds, rng) {
                    Ok(enemy) => {
                        self.insert(enemy);
                        report.spawned += 1;
                    }
                    Err(e) => {
                        warn!(error = %e, tick = snapshot.tick, "Rejected new enemy state");
                        report.rejected += 1;
                    }
                },
            }
        }

        seen.sort_unstable();
        let before = self.enemies.len();
        self.enemies.retain(|id, _| seen.binary_search(id).is_ok());
        report.removed = before - self.enemies.len();
        report
    }
}
