//! Full socket-based integration tests for client ↔ server communication.

use std::time::Duration;

use swarm_client::client::ClientState;
use swarm_client::GameClient;
use swarm_server::server::{bind_ephemeral, GameServer};
use swarm_shared::config::GameConfig;
use swarm_shared::math::{Bounds, Vec2};
use swarm_shared::net::{
    decode_from_bytes, encode_to_bytes, ClientId, DamageCommand, EntityId, NetMsg,
    PROTOCOL_VERSION,
};
use swarm_tests::{init_tracing, seeded_config};
use tracing::info;

/// Unit-style test: protocol messages roundtrip correctly.
#[test]
fn protocol_messages_roundtrip() -> anyhow::Result<()> {
    let hello = NetMsg::Hello {
        protocol: PROTOCOL_VERSION,
    };
    assert_eq!(decode_from_bytes(&encode_to_bytes(&hello)?)?, hello);

    let welcome = NetMsg::Welcome {
        client_id: ClientId(1),
        bounds: Bounds::new(1024.0, 768.0),
    };
    assert_eq!(decode_from_bytes(&encode_to_bytes(&welcome)?)?, welcome);

    let damage = NetMsg::DamageEnemy(DamageCommand {
        client_id: ClientId(1),
        tick: 7,
        enemy: EntityId(Default::default()),
        amount: 12.5,
    });
    assert_eq!(decode_from_bytes(&encode_to_bytes(&damage)?)?, damage);

    Ok(())
}

/// Full integration: spawn server, connect client, mirror the swarm, kill
/// an enemy and watch the kill come back in a snapshot.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn client_server_full_roundtrip() -> anyhow::Result<()> {
    init_tracing();

    // Bind server to ephemeral port.
    let (mut server, cfg) = bind_ephemeral(seeded_config(11)).await?;

    // Spawn server accept + step loop in background.
    let server_handle = tokio::spawn(async move {
        let _cid = server.accept_one().await?;
        for _ in 0..150 {
            server.step().await?;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        Ok::<_, anyhow::Error>(())
    });

    // Connect client.
    let mut client = GameClient::connect(&cfg).await?;
    assert_eq!(client.state, ClientState::Connected);
    assert_eq!(client.bounds, cfg.bounds());
    client.send_ready().await?;

    // Wait for the mirror to fill up.
    let mut now = 0;
    for _ in 0..100 {
        now += 16;
        client.recv_snapshot(now).await?;
        if client.mirror().alive() == cfg.enemy_count {
            break;
        }
    }
    assert_eq!(client.mirror().alive(), cfg.enemy_count);
    assert!(client.last_snapshot_tick().is_some());

    // One shot far above any enemy's health.
    let target = client
        .fire_nearest(Vec2::new(400.0, 300.0), 10_000.0)
        .await?
        .expect("a living enemy");
    info!(enemy = %target, "Fired");

    let mut seen_dying = false;
    for _ in 0..100 {
        now += 16;
        client.recv_snapshot(now).await?;
        if client.mirror().get(target).is_some_and(|e| e.is_dying()) {
            seen_dying = true;
            break;
        }
    }
    assert!(seen_dying, "kill never reached the client");

    drop(client);
    server_handle.await??;
    Ok(())
}

/// Connects a client to a server driven by the test itself.
async fn connected_pair(
    cfg: GameConfig,
) -> anyhow::Result<(GameServer, GameClient, GameConfig)> {
    let (mut server, cfg) = bind_ephemeral(cfg).await?;
    let accept = tokio::spawn(async move {
        server.accept_one().await?;
        Ok::<_, anyhow::Error>(server)
    });
    let client = GameClient::connect(&cfg).await?;
    let server = accept.await??;
    Ok((server, client, cfg))
}

/// Snapshots that queue up between frames are skipped in favour of the
/// newest one.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn client_applies_newest_queued_snapshot() -> anyhow::Result<()> {
    init_tracing();
    let (mut server, mut client, cfg) = connected_pair(GameConfig {
        enemy_count: 2,
        ..seeded_config(31)
    })
    .await?;
    client.send_ready().await?;
    tokio::time::sleep(Duration::from_millis(20)).await;

    for _ in 0..31 {
        server.step().await?;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    let report = client.recv_snapshot(0).await?.expect("a snapshot");
    assert_eq!(server.tick(), 31);
    assert_eq!(client.last_snapshot_tick(), Some(30));
    assert_eq!(report.spawned, cfg.enemy_count);

    // The queue is empty now.
    assert!(client.recv_snapshot(16).await?.is_none());
    assert_eq!(client.last_snapshot_tick(), Some(30));
    Ok(())
}

/// A client that hangs up stops receiving snapshots.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn server_forgets_clients_that_hang_up() -> anyhow::Result<()> {
    init_tracing();
    let (mut server, mut client, _cfg) = connected_pair(seeded_config(32)).await?;
    client.send_ready().await?;
    server.step().await?;
    assert_eq!(server.client_count(), 1);

    drop(client);
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        server.step().await?;
        if server.client_count() == 0 {
            break;
        }
    }
    assert_eq!(server.client_count(), 0);
    Ok(())
}

/// A client with the wrong protocol version is turned away.
#[tokio::test]
async fn server_rejects_old_protocol() -> anyhow::Result<()> {
    use swarm_shared::net::ReliableConn;
    use tokio::net::TcpStream;

    init_tracing();
    let (mut server, _cfg) = bind_ephemeral(seeded_config(2)).await?;
    let addr = server.local_addr()?;

    let accept = tokio::spawn(async move { server.accept_one().await.is_err() });

    let mut conn = ReliableConn::new(TcpStream::connect(addr).await?);
    conn.send(&NetMsg::Hello {
        protocol: PROTOCOL_VERSION - 1,
    })
    .await?;
    match conn.recv().await? {
        NetMsg::Disconnect { reason } => assert!(reason.contains("unsupported")),
        other => panic!("expected Disconnect, got {other:?}"),
    }
    assert!(accept.await?);
    Ok(())
}
