//! Networking primitives.
//!
//! Goals:
//! - Provide a simple reliable (TCP) and unreliable (UDP) channel.
//! - Provide snapshot and command message types used by client/server.
//! - Keep serialization explicit and versionable.
//!
//! Enemy replication is full-state: every snapshot carries every enemy.

use std::{
    fmt,
    net::SocketAddr,
    sync::atomic::{AtomicU32, Ordering},
};

use anyhow::Context;
use bytes::{BufMut, Bytes, BytesMut};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream, UdpSocket},
    time,
};
use uuid::Uuid;

use crate::{
    math::{Bounds, Vec2},
    render::Rgba,
};

/// Protocol version for compatibility checks.
pub const PROTOCOL_VERSION: u32 = 2;

/// Largest datagram we accept.
pub const MAX_DATAGRAM: usize = 64 * 1024;

static NEXT_CLIENT_ID: AtomicU32 = AtomicU32::new(1);

/// Identifies a connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u32);

impl ClientId {
    pub fn new_unique() -> Self {
        ClientId(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Network-stable entity id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Random v4 id drawn from `rng`, so seeded simulations stay reproducible.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let bytes: [u8; 16] = rng.gen();
        EntityId(uuid::Builder::from_random_bytes(bytes).into_uuid())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// High-level message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum NetMsg {
    // ─── Connection handshake ───
    Hello {
        protocol: u32,
    },
    /// Client announces its UDP port to the server.
    UdpHello {
        client_udp_port: u16,
    },
    Welcome {
        client_id: ClientId,
        /// Play-field size the server simulates in.
        bounds: Bounds,
    },
    /// Client is ready to receive snapshots.
    ClientReady {
        client_id: ClientId,
    },

    // ─── Gameplay ───
    /// Client -> server: the player hit an enemy.
    DamageEnemy(DamageCommand),
    /// Server -> client: full enemy state.
    Snapshot(Snapshot),

    // ─── Misc ───
    /// Server -> client: print message.
    ServerPrint {
        message: String,
    },
    Disconnect {
        reason: String,
    },
}

/// Damage request for one enemy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DamageCommand {
    pub client_id: ClientId,
    pub tick: u32,
    pub enemy: EntityId,
    pub amount: f32,
}

/// Replicated state of one enemy.
///
/// `velocity` and `target` are optional on the wire; a state without a
/// target is rejected when applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnemyState {
    pub id: EntityId,
    pub position: Vec2,
    pub health: f32,
    pub dead: bool,
    #[serde(default)]
    pub velocity: Option<Vec2>,
    #[serde(default)]
    pub target: Option<Vec2>,
    pub explosion_time: f32,
    #[serde(default)]
    pub explosion_particles: Vec<Vec2>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgba>,
}

/// World snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub tick: u32,
    pub enemies: Vec<EnemyState>,
}

/// Reliable connection over TCP with length-prefixed frames.
#[derive(Debug)]
pub struct ReliableConn {
    stream: TcpStream,
}

impl ReliableConn {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub async fn send(&mut self, msg: &NetMsg) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(msg).context("serialize msg")?;
        let mut buf = BytesMut::with_capacity(4 + payload.len());
        buf.put_u32(payload.len() as u32);
        buf.extend_from_slice(&payload);
        self.stream.write_all(&buf).await.context("tcp write")?;
        Ok(())
    }

    pub async fn recv(&mut self) -> anyhow::Result<NetMsg> {
        let mut len_buf = [0u8; 4];
        self.stream
            .read_exact(&mut len_buf)
            .await
            .context("tcp read len")?;
        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_DATAGRAM {
            anyhow::bail!("tcp frame of {len} bytes exceeds {MAX_DATAGRAM}");
        }
        let mut payload = vec![0u8; len];
        self.stream
            .read_exact(&mut payload)
            .await
            .context("tcp read payload")?;
        let msg = serde_json::from_slice(&payload).context("deserialize msg")?;
        Ok(msg)
    }

    pub fn peer_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }

    /// True if the peer has hung up. Never waits and never consumes a
    /// pending frame.
    pub async fn peer_closed(&self) -> bool {
        let mut byte = [0u8; 1];
        match time::timeout(std::time::Duration::ZERO, self.stream.peek(&mut byte)).await {
            Ok(Ok(0)) | Ok(Err(_)) => true,
            Ok(Ok(_)) | Err(_) => false,
        }
    }
}

/// Unreliable channel over UDP.
#[derive(Debug)]
pub struct UnreliableConn {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UnreliableConn {
    pub async fn connect(bind_addr: SocketAddr, peer: SocketAddr) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await.context("udp bind")?;
        socket.connect(peer).await.context("udp connect")?;
        Ok(Self { socket, peer })
    }

    pub async fn send(&self, msg: &NetMsg) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(msg).context("serialize udp msg")?;
        self.socket.send(&payload).await.context("udp send")?;
        Ok(())
    }

    /// Receives a datagram within the given timeout.
    pub async fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> anyhow::Result<Option<NetMsg>> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        match time::timeout(timeout, self.socket.recv(&mut buf)).await {
            Ok(Ok(n)) => {
                let msg = serde_json::from_slice(&buf[..n]).context("deserialize udp msg")?;
                Ok(Some(msg))
            }
            Ok(Err(e)) => Err(e).context("udp recv")?,
            Err(_) => Ok(None),
        }
    }

    /// Receives a datagram that is already queued, without waiting.
    pub fn try_recv(&self) -> anyhow::Result<Option<NetMsg>> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        match self.socket.try_recv(&mut buf) {
            Ok(n) => {
                let msg = serde_json::from_slice(&buf[..n]).context("deserialize udp msg")?;
                Ok(Some(msg))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e).context("udp recv")?,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

/// TCP server listener.
pub struct ReliableListener {
    listener: TcpListener,
}

impl ReliableListener {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("tcp bind")?;
        Ok(Self { listener })
    }

    pub async fn accept(&self) -> anyhow::Result<(ReliableConn, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await.context("tcp accept")?;
        Ok((ReliableConn::new(stream), addr))
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

/// Convenience codec helpers.
pub fn encode_to_bytes(msg: &NetMsg) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(msg).context("serialize")?;
    Ok(Bytes::from(payload))
}

pub fn decode_from_bytes(b: &[u8]) -> anyhow::Result<NetMsg> {
    serde_json::from_slice(b).context("deserialize")
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn entity_ids_are_v4_and_seeded() {
        let a = EntityId::random(&mut StdRng::seed_from_u64(7));
        let b = EntityId::random(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert_eq!(a.0.get_version_num(), 4);
    }

    #[test]
    fn enemy_state_tolerates_missing_optionals() -> anyhow::Result<()> {
        let id = EntityId::random(&mut StdRng::seed_from_u64(1));
        let json = format!(
            r#"{{"id":"{id}","position":{{"x":1.0,"y":2.0}},"health":3.0,"dead":false,"explosion_time":0.0}}"#
        );
        let state: EnemyState = serde_json::from_str(&json)?;
        assert_eq!(state.velocity, None);
        assert_eq!(state.target, None);
        assert!(state.explosion_particles.is_empty());
        Ok(())
    }

    #[test]
    fn snapshot_msg_survives_the_codec() -> anyhow::Result<()> {
        let id = EntityId::random(&mut StdRng::seed_from_u64(2));
        let msg = NetMsg::Snapshot(Snapshot {
            tick: 9,
            enemies: vec![EnemyState {
                id,
                position: Vec2::new(4.0, 5.0),
                health: 12.5,
                dead: true,
                velocity: Some(Vec2::new(0.5, -0.5)),
                target: Some(Vec2::new(100.0, 50.0)),
                explosion_time: 32.0,
                explosion_particles: vec![Vec2::new(4.5, 5.5)],
                size: Some(20.0),
                color: Some(Rgba::new(200, 10, 20, 120)),
            }],
        });
        assert_eq!(decode_from_bytes(&encode_to_bytes(&msg)?)?, msg);
        Ok(())
    }
}
