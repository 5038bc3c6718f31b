//! Server implementation.
//!
//! An authoritative tick-based loop. It supports:
//! - Client connection handshake over TCP
//! - Damage commands from clients over UDP
//! - Enemy simulation with population top-up
//! - Full-state snapshot replication
//! - Operator console commands (status, spawn, quit)
//!
//! Determinism notes:
//! - Keep simulation in a fixed timestep; sim time is derived from the tick.
//! - All randomness comes from one seeded RNG.
//! - The swarm iterates enemies in id order.

use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use anyhow::Context;
use rand::{rngs::StdRng, SeedableRng};
use swarm_shared::{
    audio::NullAudio,
    clock::Millis,
    config::{GameConfig, MAX_ENEMIES},
    net::{
        ClientId, DamageCommand, NetMsg, ReliableConn, ReliableListener, MAX_DATAGRAM,
        PROTOCOL_VERSION,
    },
    swarm::{DamageOutcome, Swarm},
};
use tokio::{net::UdpSocket, sync::mpsc, time::Instant};
use tracing::{debug, info, warn};

/// Connected client state.
struct ClientState {
    reliable: ReliableConn,
    udp_peer: SocketAddr,
    last_cmd_tick: u32,
    /// Whether the client wants snapshots.
    ready: bool,
    kills: u32,
}

/// What the main loop should do after a console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleAction {
    Continue,
    Quit,
}

/// Game server.
pub struct GameServer {
    pub cfg: GameConfig,
    swarm: Swarm,
    rng: StdRng,
    clients: HashMap<ClientId, ClientState>,

    tcp: ReliableListener,
    udp: UdpSocket,

    tick: u32,
    quit_requested: bool,

    /// Channel for console commands from stdin.
    console_rx: Option<mpsc::Receiver<String>>,
}

impl GameServer {
    /// Binds server sockets and spawns the initial swarm.
    pub async fn new(cfg: GameConfig) -> anyhow::Result<Self> {
        cfg.validate()?;
        let addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;
        let tcp = ReliableListener::bind(addr).await?;
        // Bind UDP to the port TCP actually got, so port 0 works too.
        let udp_addr = SocketAddr::new(addr.ip(), tcp.local_addr()?.port());
        let udp = UdpSocket::bind(udp_addr).await.context("udp bind")?;
        Ok(Self::from_parts(cfg, tcp, udp))
    }

    fn from_parts(cfg: GameConfig, tcp: ReliableListener, udp: UdpSocket) -> Self {
        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut swarm = Swarm::new();
        swarm.populate(cfg.enemy_count, cfg.bounds(), &mut rng);
        info!(enemies = swarm.len(), seed = ?cfg.seed, "Swarm spawned");

        Self {
            cfg,
            swarm,
            rng,
            clients: HashMap::new(),
            tcp,
            udp,
            tick: 0,
            quit_requested: false,
            console_rx: None,
        }
    }

    /// Sets the console input receiver.
    pub fn set_console_input(&mut self, rx: mpsc::Receiver<String>) {
        self.console_rx = Some(rx);
    }

    /// Returns the local address (after binding).
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.tcp.local_addr()
    }

    pub fn swarm(&self) -> &Swarm {
        &self.swarm
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// True once an operator asked the server to stop.
    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    /// Simulation time of the current tick.
    fn sim_millis(&self) -> Millis {
        self.tick as Millis * 1_000 / self.cfg.tick_hz as Millis
    }

    /// Accepts exactly one client (handshake).
    pub async fn accept_one(&mut self) -> anyhow::Result<ClientId> {
        let (conn, peer) = self.tcp.accept().await?;
        self.handle_new_connection(conn, peer).await
    }

    /// Accepts a client with timeout (non-blocking).
    pub async fn try_accept(&mut self, timeout: Duration) -> anyhow::Result<Option<ClientId>> {
        match tokio::time::timeout(timeout, self.tcp.accept()).await {
            Ok(Ok((conn, peer))) => self.handle_new_connection(conn, peer).await.map(Some),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(None),
        }
    }

    async fn handle_new_connection(
        &mut self,
        mut conn: ReliableConn,
        peer: SocketAddr,
    ) -> anyhow::Result<ClientId> {
        let msg = conn.recv().await?;
        match msg {
            NetMsg::Hello { protocol } if protocol == PROTOCOL_VERSION => {
                let udp_hello = conn.recv().await?;
                let client_udp_port = match udp_hello {
                    NetMsg::UdpHello { client_udp_port } => client_udp_port,
                    other => anyhow::bail!("expected UdpHello, got {other:?}"),
                };

                let id = ClientId::new_unique();
                conn.send(&NetMsg::Welcome {
                    client_id: id,
                    bounds: self.cfg.bounds(),
                })
                .await?;
                conn.send(&NetMsg::ServerPrint {
                    message: format!("{} enemies on the field", self.swarm.alive()),
                })
                .await?;

                let udp_peer = SocketAddr::new(peer.ip(), client_udp_port);
                self.clients.insert(
                    id,
                    ClientState {
                        reliable: conn,
                        udp_peer,
                        last_cmd_tick: 0,
                        ready: false,
                        kills: 0,
                    },
                );

                info!(client_id = ?id, %udp_peer, "Client connected");
                Ok(id)
            }
            NetMsg::Hello { protocol } => {
                let _ = conn
                    .send(&NetMsg::Disconnect {
                        reason: format!("protocol {protocol} unsupported, need {PROTOCOL_VERSION}"),
                    })
                    .await;
                anyhow::bail!("client protocol {protocol} != {PROTOCOL_VERSION}")
            }
            other => anyhow::bail!("unexpected handshake msg: {other:?}"),
        }
    }

    /// Marks a client as ready to receive snapshots.
    pub fn client_ready(&mut self, client_id: ClientId, from: SocketAddr) -> anyhow::Result<()> {
        let client = self
            .clients
            .get_mut(&client_id)
            .with_context(|| format!("unknown client {client_id:?}"))?;
        client.ready = true;
        client.udp_peer = from;
        info!(client_id = ?client_id, "Client ready");
        Ok(())
    }

    /// Runs the server for a number of ticks.
    pub async fn run_for_ticks(&mut self, ticks: u32) -> anyhow::Result<()> {
        let dt = Duration::from_secs_f32(1.0 / self.cfg.tick_hz as f32);
        let mut next = Instant::now();

        for _ in 0..ticks {
            next += dt;
            self.step().await?;
            tokio::time::sleep_until(next).await;
        }
        Ok(())
    }

    /// Executes one fixed simulation step.
    pub async fn step(&mut self) -> anyhow::Result<()> {
        self.process_console_commands();
        self.recv_commands().await?;
        self.drop_disconnected().await;
        self.simulate();
        self.send_snapshots().await?;
        self.tick += 1;
        Ok(())
    }

    fn process_console_commands(&mut self) {
        let lines: Vec<String> = match self.console_rx {
            Some(ref mut rx) => std::iter::from_fn(|| rx.try_recv().ok()).collect(),
            None => Vec::new(),
        };

        for line in lines {
            let (output, action) = self.exec_console(&line);
            for out in output {
                println!("{out}");
            }
            if action == ConsoleAction::Quit {
                self.quit_requested = true;
            }
        }
    }

    /// Executes a console command.
    pub fn exec_console(&mut self, line: &str) -> (Vec<String>, ConsoleAction) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&cmd) = tokens.first() else {
            return (Vec::new(), ConsoleAction::Continue);
        };

        match cmd {
            "status" => {
                let mut out = vec![
                    format!("Tick: {}", self.tick),
                    format!(
                        "Enemies: {} ({} alive)",
                        self.swarm.len(),
                        self.swarm.alive()
                    ),
                    format!("Clients: {}", self.clients.len()),
                ];
                for (id, client) in &self.clients {
                    out.push(format!(
                        "  {:?}: udp={} ready={} kills={} last_cmd={}",
                        id, client.udp_peer, client.ready, client.kills, client.last_cmd_tick
                    ));
                }
                (out, ConsoleAction::Continue)
            }
            "spawn" => {
                let Some(n) = tokens.get(1).and_then(|s| s.parse::<usize>().ok()) else {
                    return (
                        vec!["Usage: spawn <count>".to_string()],
                        ConsoleAction::Continue,
                    );
                };
                if n > MAX_ENEMIES {
                    return (
                        vec![format!("At most {MAX_ENEMIES} enemies fit in a snapshot")],
                        ConsoleAction::Continue,
                    );
                }
                self.cfg.enemy_count = n;
                let added = self
                    .swarm
                    .populate(n, self.cfg.bounds(), &mut self.rng)
                    .len();
                info!(enemy_count = n, added, "Enemy count changed");
                (
                    vec![format!("Enemy count set to {n} ({added} spawned)")],
                    ConsoleAction::Continue,
                )
            }
            "quit" | "exit" => {
                info!("Server shutting down");
                (Vec::new(), ConsoleAction::Quit)
            }
            other => (
                vec![format!("Unknown command: {other}")],
                ConsoleAction::Continue,
            ),
        }
    }

    async fn recv_commands(&mut self) -> anyhow::Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            match self.udp.try_recv_from(&mut buf) {
                Ok((n, from)) => match serde_json::from_slice::<NetMsg>(&buf[..n]) {
                    Ok(msg) => self.handle_udp_message(from, msg),
                    Err(e) => debug!(%from, error = %e, "Dropped malformed datagram"),
                },
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                // A peer that went away; its error is reported once.
                Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                    debug!(error = %e, "UDP peer reset");
                }
                Err(e) => return Err(e).context("udp recv")?,
            }
        }
        Ok(())
    }

    fn handle_udp_message(&mut self, from: SocketAddr, msg: NetMsg) {
        match msg {
            NetMsg::DamageEnemy(cmd) => self.on_damage(from, cmd),
            NetMsg::ClientReady { client_id } => {
                if let Err(e) = self.client_ready(client_id, from) {
                    warn!(client_id = ?client_id, error = %e, "Failed to mark client ready");
                }
            }
            _ => {
                debug!(?msg, "Unexpected UDP message");
            }
        }
    }

    fn on_damage(&mut self, from: SocketAddr, cmd: DamageCommand) {
        if !cmd.amount.is_finite() || cmd.amount < 0.0 {
            warn!(client_id = ?cmd.client_id, amount = cmd.amount, "Ignored invalid damage");
            return;
        }
        let now = self.sim_millis();
        let Some(client) = self.clients.get_mut(&cmd.client_id) else {
            debug!(client_id = ?cmd.client_id, "Damage from unknown client");
            return;
        };
        client.udp_peer = from;
        client.last_cmd_tick = cmd.tick;

        match self
            .swarm
            .damage(cmd.enemy, cmd.amount, now, &mut NullAudio, &mut self.rng)
        {
            Some(DamageOutcome::Killed) => {
                client.kills += 1;
                info!(client_id = ?cmd.client_id, enemy = %cmd.enemy, kills = client.kills, "Enemy killed");
            }
            Some(DamageOutcome::Hit) => {
                debug!(client_id = ?cmd.client_id, enemy = %cmd.enemy, amount = cmd.amount, "Enemy hit");
            }
            None => {
                debug!(enemy = %cmd.enemy, "Damage for unknown enemy");
            }
        }
    }

    /// Forgets clients whose control connection has closed.
    async fn drop_disconnected(&mut self) {
        let mut gone = Vec::new();
        for (id, client) in &self.clients {
            if client.reliable.peer_closed().await {
                gone.push(*id);
            }
        }
        for id in gone {
            if let Some(client) = self.clients.remove(&id) {
                info!(client_id = ?id, kills = client.kills, "Client disconnected");
            }
        }
    }

    fn simulate(&mut self) {
        let bounds = self.cfg.bounds();
        let now = self.sim_millis();
        let removed = self.swarm.step(bounds, now, &mut self.rng);
        let spawned = self
            .swarm
            .populate(self.cfg.enemy_count, bounds, &mut self.rng);
        if !removed.is_empty() || !spawned.is_empty() {
            debug!(
                tick = self.tick,
                removed = removed.len(),
                spawned = spawned.len(),
                "Swarm population changed"
            );
        }
    }

    async fn send_snapshots(&self) -> anyhow::Result<()> {
        if !self.clients.values().any(|c| c.ready) {
            return Ok(());
        }
        let snap = NetMsg::Snapshot(self.swarm.snapshot(self.tick));
        let payload = serde_json::to_vec(&snap).context("serialize snapshot")?;
        if payload.len() > MAX_DATAGRAM {
            warn!(tick = self.tick, bytes = payload.len(), "Snapshot exceeds datagram size, not sent");
            return Ok(());
        }

        for c in self.clients.values().filter(|c| c.ready) {
            if let Err(e) = self.udp.send_to(&payload, c.udp_peer).await {
                warn!(peer = %c.udp_peer, error = %e, "Snapshot send failed");
            }
        }
        Ok(())
    }
}

/// Helper for tests: bind to an ephemeral port on localhost.
pub async fn bind_ephemeral(cfg: GameConfig) -> anyhow::Result<(GameServer, GameConfig)> {
    let mut cfg = GameConfig {
        server_addr: format!("{}:{}", IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
        ..cfg
    };

    // Bind TCP first to get an ephemeral port, then bind UDP to that same port.
    let tcp = ReliableListener::bind(cfg.server_addr.parse()?).await?;
    let addr = tcp.local_addr()?;
    cfg.server_addr = addr.to_string();

    let udp_bind = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port());
    let udp = UdpSocket::bind(udp_bind).await?;

    Ok((GameServer::from_parts(cfg.clone(), tcp, udp), cfg))
}
