//! Standalone server binary.
//!
//! Usage:
//!   cargo run -p swarm_server -- [--config swarm.json] [--addr 127.0.0.1:40000]
//!                                [--tick-hz 60] [--enemies 12] [--seed 42]
//!
//! The server listens for client connections, runs a fixed timestep enemy
//! simulation, and broadcasts snapshots to connected clients.
//!
//! Console commands:
//!   status         - Show server status
//!   spawn <count>  - Change how many enemies are kept alive
//!   quit           - Shutdown server

use std::env;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use swarm_server::server::GameServer;
use swarm_shared::config::GameConfig;
use tokio::sync::mpsc;
use tracing::{info, warn};

fn parse_args() -> anyhow::Result<GameConfig> {
    let args: Vec<String> = env::args().collect();

    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) => {
            let path = args.get(i + 1).context("--config needs a path")?;
            GameConfig::load(&PathBuf::from(path))?
        }
        None => GameConfig::default(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--tick-hz" if i + 1 < args.len() => {
                cfg.tick_hz = args[i + 1].parse().context("parse --tick-hz")?;
                i += 2;
            }
            "--enemies" if i + 1 < args.len() => {
                cfg.enemy_count = args[i + 1].parse().context("parse --enemies")?;
                i += 2;
            }
            "--seed" if i + 1 < args.len() => {
                cfg.seed = Some(args[i + 1].parse().context("parse --seed")?);
                i += 2;
            }
            _ => i += 1,
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;
    info!(addr = %cfg.server_addr, tick_hz = cfg.tick_hz, enemies = cfg.enemy_count, "Starting server");

    let mut server = GameServer::new(cfg.clone())
        .await
        .context("create server")?;
    let local = server.local_addr()?;
    info!(%local, "Server listening");

    // Set up console input channel.
    let (console_tx, console_rx) = mpsc::channel::<String>(32);
    server.set_console_input(console_rx);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Server ready. Type 'status' for info, 'spawn <n>' to resize the swarm, 'quit' to exit.");
    println!();

    // Main server loop.
    let tick_interval = std::time::Duration::from_secs_f32(1.0 / cfg.tick_hz as f32);
    let mut next_tick = tokio::time::Instant::now();

    while !server.quit_requested() {
        // Accept new clients (non-blocking).
        match server.try_accept(std::time::Duration::from_millis(1)).await {
            Ok(Some(cid)) => info!(client_id = ?cid, "New client accepted"),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Client handshake failed"),
        }

        server.step().await?;

        // Wait for next tick.
        next_tick += tick_interval;
        tokio::time::sleep_until(next_tick).await;
    }

    Ok(())
}
