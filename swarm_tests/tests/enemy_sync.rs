//! An authoritative swarm mirrored through the wire format, tick by tick.

use rand::{rngs::StdRng, SeedableRng};
use swarm_shared::audio::{NullAudio, RecordingAudio, DEATH_SOUND};
use swarm_shared::net::{decode_from_bytes, encode_to_bytes, NetMsg, Snapshot};
use swarm_shared::swarm::{DamageOutcome, Swarm, SyncReport};
use swarm_tests::{init_tracing, seeded_config};

/// Sends `snapshot` through the codec and returns what the receiver sees.
fn over_the_wire(snapshot: Snapshot) -> anyhow::Result<Snapshot> {
    match decode_from_bytes(&encode_to_bytes(&NetMsg::Snapshot(snapshot))?)? {
        NetMsg::Snapshot(snap) => Ok(snap),
        other => anyhow::bail!("expected Snapshot, got {other:?}"),
    }
}

#[test]
fn mirror_tracks_authority_through_a_kill() -> anyhow::Result<()> {
    init_tracing();
    let cfg = seeded_config(21);
    let bounds = cfg.bounds();
    let mut server_rng = StdRng::seed_from_u64(21);
    let mut client_rng = StdRng::seed_from_u64(99);
    let mut audio = RecordingAudio::default();

    let mut authority = Swarm::new();
    let mut mirror = Swarm::new();
    authority.populate(cfg.enemy_count, bounds, &mut server_rng);

    let first = over_the_wire(authority.snapshot(0))?;
    let report = mirror.apply_snapshot(&first, bounds, 0, &mut audio, &mut client_rng);
    assert_eq!(
        report,
        SyncReport {
            spawned: cfg.enemy_count,
            ..Default::default()
        }
    );
    assert_eq!(mirror.snapshot(0), authority.snapshot(0));

    let mut victim = None;
    for tick in 1..120u32 {
        let now = u64::from(tick) * 1_000 / u64::from(cfg.tick_hz);
        if tick == 10 {
            let id = authority
                .nearest(bounds.center())
                .map(|e| e.id())
                .expect("a living enemy");
            let outcome = authority.damage(id, 10_000.0, now, &mut NullAudio, &mut server_rng);
            assert_eq!(outcome, Some(DamageOutcome::Killed));
            victim = Some(id);
        }
        authority.step(bounds, now, &mut server_rng);
        authority.populate(cfg.enemy_count, bounds, &mut server_rng);

        let snap = over_the_wire(authority.snapshot(tick))?;
        let report = mirror.apply_snapshot(&snap, bounds, now, &mut audio, &mut client_rng);
        assert_eq!(report.rejected, 0);
        assert_eq!(mirror.snapshot(tick), authority.snapshot(tick));
    }

    let victim = victim.expect("victim chosen");
    assert!(mirror.get(victim).is_none(), "explosion should be over");
    assert_eq!(mirror.alive(), cfg.enemy_count);
    assert_eq!(audio.played, vec![DEATH_SOUND.to_string()]);
    Ok(())
}

#[test]
fn mirror_keeps_motion_inside_the_field() -> anyhow::Result<()> {
    let cfg = seeded_config(4);
    let bounds = cfg.bounds();
    let mut rng = StdRng::seed_from_u64(4);
    let mut authority = Swarm::new();
    let mut mirror = Swarm::new();
    authority.populate(cfg.enemy_count, bounds, &mut rng);

    for tick in 0..300u32 {
        authority.step(bounds, u64::from(tick) * 16, &mut rng);
        let snap = over_the_wire(authority.snapshot(tick))?;
        mirror.apply_snapshot(&snap, bounds, u64::from(tick) * 16, &mut NullAudio, &mut rng);
    }

    for enemy in mirror.iter() {
        let p = enemy.position();
        assert!(bounds.contains(p), "{p:?} escaped {bounds:?}");
        assert!(enemy.velocity().len() <= enemy.limits().max_speed + 1e-4);
    }
    assert_eq!(mirror.len(), cfg.enemy_count);
    Ok(())
}
