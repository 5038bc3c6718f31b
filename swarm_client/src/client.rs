//! Client implementation.
//!
//! The client maintains:
//! - A reliable control stream (handshake + server messages)
//! - An unreliable datagram socket (snapshots, damage commands)
//! - A mirror swarm overwritten from every snapshot
//!
//! The mirror is never simulated locally; what the client draws is exactly
//! the last applied snapshot.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::Context;
use rand::{rngs::StdRng, SeedableRng};
use swarm_shared::{
    audio::AudioSink,
    clock::Millis,
    config::GameConfig,
    math::{Bounds, Vec2},
    net::{
        ClientId, DamageCommand, EntityId, NetMsg, ReliableConn, Snapshot, UnreliableConn,
        PROTOCOL_VERSION,
    },
    render::RenderBackend,
    swarm::{Swarm, SyncReport},
};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::panels::LogAudio;

/// Client connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    /// Not connected to any server.
    Disconnected,
    /// Handshake done, snapshots not requested yet.
    Connected,
    /// Receiving snapshots.
    Ready,
}

/// High-level game client.
pub struct GameClient {
    pub client_id: ClientId,
    pub state: ClientState,
    /// Play-field size announced by the server.
    pub bounds: Bounds,

    reliable: ReliableConn,
    pub unreliable: UnreliableConn,
    mirror: Swarm,
    rng: StdRng,
    audio: Box<dyn AudioSink + Send>,
    tick: u32,
    last_snapshot: Option<u32>,

    /// Server messages to display.
    pub server_messages: Vec<String>,
}

impl GameClient {
    /// Connects to a server and performs handshake.
    pub async fn connect(cfg: &GameConfig) -> anyhow::Result<Self> {
        let server_addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;

        info!(server = %server_addr, player = %cfg.player_name, "Connecting to server");

        // Bind UDP first so we can tell the server where to send snapshots.
        let local_ip = if server_addr.ip().is_loopback() {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        };
        let unreliable = UnreliableConn::connect(SocketAddr::new(local_ip, 0), server_addr).await?;
        let client_udp_port = unreliable.local_addr().context("udp local_addr")?.port();

        let stream = TcpStream::connect(server_addr)
            .await
            .context("tcp connect")?;
        let mut reliable = ReliableConn::new(stream);

        reliable
            .send(&NetMsg::Hello {
                protocol: PROTOCOL_VERSION,
            })
            .await?;
        reliable.send(&NetMsg::UdpHello { client_udp_port }).await?;

        let (client_id, bounds) = match reliable.recv().await? {
            NetMsg::Welcome { client_id, bounds } => (client_id, bounds),
            NetMsg::Disconnect { reason } => anyhow::bail!("server refused connection: {reason}"),
            other => anyhow::bail!("expected Welcome, got {other:?}"),
        };

        info!(client_id = ?client_id, width = bounds.width, height = bounds.height, "Connected to server");

        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut client = Self {
            client_id,
            state: ClientState::Connected,
            bounds,
            reliable,
            unreliable,
            mirror: Swarm::new(),
            rng,
            audio: Box::new(LogAudio),
            tick: 0,
            last_snapshot: None,
            server_messages: Vec::new(),
        };

        // Pick up the greeting, if it is already here.
        client.poll_reliable().await?;

        Ok(client)
    }

    /// Replaces the sound output.
    pub fn set_audio(&mut self, audio: Box<dyn AudioSink + Send>) {
        self.audio = audio;
    }

    pub fn mirror(&self) -> &Swarm {
        &self.mirror
    }

    pub fn last_snapshot_tick(&self) -> Option<u32> {
        self.last_snapshot
    }

    /// Polls the reliable connection for messages.
    pub async fn poll_reliable(&mut self) -> anyhow::Result<()> {
        // Use a short timeout to avoid blocking.
        match tokio::time::timeout(std::time::Duration::from_millis(10), self.reliable.recv()).await
        {
            Ok(Ok(msg)) => self.handle_reliable_message(msg),
            Ok(Err(e)) => {
                warn!(error = %e, "Reliable connection error");
                self.state = ClientState::Disconnected;
            }
            Err(_) => {
                // Timeout, no message available.
            }
        }
        Ok(())
    }

    fn handle_reliable_message(&mut self, msg: NetMsg) {
        match msg {
            NetMsg::ServerPrint { message } => {
                info!(message = %message, "Server message");
                self.server_messages.push(message);
            }
            NetMsg::Disconnect { reason } => {
                info!(reason = %reason, "Disconnected from server");
                self.state = ClientState::Disconnected;
            }
            other => {
                debug!(?other, "Unhandled reliable message");
            }
        }
    }

    /// Asks the server to start sending snapshots.
    pub async fn send_ready(&mut self) -> anyhow::Result<()> {
        self.unreliable
            .send(&NetMsg::ClientReady {
                client_id: self.client_id,
            })
            .await?;
        self.state = ClientState::Ready;
        info!("Sent ready signal to server");
        Ok(())
    }

    /// Waits briefly for snapshots, drains every queued one and mirrors the
    /// newest. Snapshots not newer than the last applied one are dropped.
    pub async fn recv_snapshot(&mut self, now: Millis) -> anyhow::Result<Option<SyncReport>> {
        let Some(first) = self
            .unreliable
            .recv_timeout(std::time::Duration::from_millis(20))
            .await?
        else {
            return Ok(None);
        };

        let mut newest = None;
        let mut drained = 0usize;
        let mut next = Some(first);
        while let Some(msg) = next {
            match msg {
                NetMsg::Snapshot(snap) => {
                    drained += 1;
                    if newest.as_ref().map_or(true, |n: &Snapshot| snap.tick > n.tick) {
                        newest = Some(snap);
                    }
                }
                other => debug!(?other, "Unexpected UDP message"),
            }
            next = self.unreliable.try_recv()?;
        }

        let Some(snap) = newest else {
            return Ok(None);
        };
        if drained > 1 {
            debug!(drained, tick = snap.tick, "Skipped queued snapshots");
        }
        if self.last_snapshot.is_some_and(|last| snap.tick <= last) {
            debug!(tick = snap.tick, "Dropped stale snapshot");
            return Ok(None);
        }
        let report = self.mirror.apply_snapshot(
            &snap,
            self.bounds,
            now,
            self.audio.as_mut(),
            &mut self.rng,
        );
        self.last_snapshot = Some(snap.tick);
        if report.rejected > 0 {
            warn!(tick = snap.tick, rejected = report.rejected, "Snapshot partly rejected");
        }
        Ok(Some(report))
    }

    /// Tells the server the player hit `enemy`.
    pub async fn fire(&mut self, enemy: EntityId, amount: f32) -> anyhow::Result<DamageCommand> {
        let cmd = DamageCommand {
            client_id: self.client_id,
            tick: self.tick,
            enemy,
            amount,
        };
        self.unreliable
            .send(&NetMsg::DamageEnemy(cmd.clone()))
            .await?;
        self.tick += 1;
        Ok(cmd)
    }

    /// Fires at the living enemy closest to `point`.
    pub async fn fire_nearest(
        &mut self,
        point: Vec2,
        amount: f32,
    ) -> anyhow::Result<Option<EntityId>> {
        let Some(id) = self.mirror.nearest(point).map(|e| e.id()) else {
            return Ok(None);
        };
        self.fire(id, amount).await?;
        Ok(Some(id))
    }

    /// Draws the mirror as one frame.
    pub fn render(&self, surface: &mut dyn RenderBackend, now: Millis) {
        surface.begin_frame();
        self.mirror.draw(surface, now);
        surface.end_frame();
    }

    /// Status lines for the console.
    pub fn status(&self) -> Vec<String> {
        vec![
            format!("State: {:?}", self.state),
            format!("Client ID: {:?}", self.client_id),
            format!("Shots: {}", self.tick),
            format!("Last snapshot: {:?}", self.last_snapshot),
            format!(
                "Enemies: {} ({} alive)",
                self.mirror.len(),
                self.mirror.alive()
            ),
        ]
    }

    /// Returns the underlying reliable connection peer.
    pub fn server_peer(&self) -> anyhow::Result<SocketAddr> {
        self.reliable.peer_addr()
    }
}
