//! Shared helpers for the cross-crate integration tests.

use swarm_shared::config::GameConfig;

/// Routes tracing output through the test harness. Safe to call from
/// every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// A small, reproducible match.
pub fn seeded_config(seed: u64) -> GameConfig {
    GameConfig {
        tick_hz: 60,
        enemy_count: 6,
        seed: Some(seed),
        player_name: "TestPlayer".to_string(),
        ..Default::default()
    }
}
