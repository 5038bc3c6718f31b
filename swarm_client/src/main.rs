//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p swarm_client -- [--config swarm.json] [--addr 127.0.0.1:40000]
//!                                [--name Player] [--seed 42] [--offline]
//!                                [--draw-stats]
//!
//! The client connects to the server, mirrors its enemies and draws them to a
//! headless surface every frame. With `--offline` it simulates the swarm
//! itself. `--draw-stats` records draw calls so frame stats can report them.
//!
//! Console commands:
//!   status          - Show client status
//!   fire [amount]   - Hit the enemy nearest the screen center
//!   key <k>         - Send a key press through the global key listener
//!   play            - Return to the game panel
//!   quit            - Exit client

use std::env;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use swarm_client::client::{ClientState, GameClient};
use swarm_client::input::{GlobalKeyListener, Key, KeyEvent};
use swarm_client::offline::LocalGame;
use swarm_client::panels::{LogAudio, Panel, Panels};
use swarm_shared::clock::{Clock, SystemClock};
use swarm_shared::config::GameConfig;
use swarm_shared::render::{NullRenderer, RecordingRenderer, RenderBackend};
use tokio::sync::mpsc;
use tracing::{info, warn};

const DEFAULT_DAMAGE: f32 = 25.0;

struct Args {
    cfg: GameConfig,
    offline: bool,
    draw_stats: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let args: Vec<String> = env::args().collect();

    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) => {
            let path = args.get(i + 1).context("--config needs a path")?;
            GameConfig::load(&PathBuf::from(path))?
        }
        None => GameConfig::default(),
    };

    let mut offline = false;
    let mut draw_stats = false;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--name" if i + 1 < args.len() => {
                cfg.player_name = args[i + 1].clone();
                i += 2;
            }
            "--seed" if i + 1 < args.len() => {
                cfg.seed = Some(args[i + 1].parse().context("parse --seed")?);
                i += 2;
            }
            "--offline" => {
                offline = true;
                i += 1;
            }
            "--draw-stats" => {
                draw_stats = true;
                i += 1;
            }
            _ => i += 1,
        }
    }
    cfg.validate()?;
    Ok(Args {
        cfg,
        offline,
        draw_stats,
    })
}

/// Game running either against a server or locally.
enum Session {
    Online(GameClient),
    Offline(LocalGame),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let Args {
        cfg,
        offline,
        draw_stats,
    } = parse_args()?;
    info!(server = %cfg.server_addr, offline, "Starting client");

    let mut session = if offline {
        Session::Offline(LocalGame::new(&cfg))
    } else {
        let mut client = GameClient::connect(&cfg).await.context("connect")?;
        client.send_ready().await?;
        Session::Online(client)
    };

    let bounds = match &session {
        Session::Online(client) => client.bounds,
        Session::Offline(_) => cfg.bounds(),
    };
    let mut recorder = draw_stats.then(|| RecordingRenderer::new(bounds));
    let mut blank = NullRenderer::new(bounds);
    let mut audio = LogAudio;
    let clock = SystemClock;
    let keys = GlobalKeyListener::new(cfg.home_key);
    let mut panels = Panels::new(Panel::Game);

    // Set up console input channel.
    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);

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

    println!("Client running. Type 'status' for info, 'fire' to shoot, 'quit' to exit.");
    println!();

    let frame_interval = Duration::from_secs_f32(1.0 / cfg.tick_hz as f32);
    let mut frames: u64 = 0;

    'frames: loop {
        let now = clock.now_millis();

        // Process console commands.
        while let Ok(line) = console_rx.try_recv() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens.as_slice() {
                ["quit"] | ["exit"] => break 'frames,
                ["status"] => {
                    println!("Panel: {:?}", panels.current());
                    match &session {
                        Session::Online(client) => {
                            for l in client.status() {
                                println!("{l}");
                            }
                        }
                        Session::Offline(game) => {
                            println!(
                                "Offline: {} enemies ({} alive), {} kills",
                                game.swarm().len(),
                                game.swarm().alive(),
                                game.kills()
                            );
                        }
                    }
                }
                ["fire", rest @ ..] => {
                    if panels.current() != Panel::Game {
                        println!("Not in game");
                        continue;
                    }
                    let amount = match rest.first().map(|s| s.parse::<f32>()) {
                        Some(Ok(a)) => a,
                        Some(Err(_)) => {
                            println!("Usage: fire [amount]");
                            continue;
                        }
                        None => DEFAULT_DAMAGE,
                    };
                    let aim = bounds.center();
                    match &mut session {
                        Session::Online(client) => match client.fire_nearest(aim, amount).await {
                            Ok(Some(id)) => println!("Fired at {id}"),
                            Ok(None) => println!("No target"),
                            Err(e) => println!("Error: {e}"),
                        },
                        Session::Offline(game) => {
                            match game.fire_nearest(aim, amount, now, &mut audio) {
                                Some((id, outcome)) => println!("Hit {id}: {outcome:?}"),
                                None => println!("No target"),
                            }
                        }
                    }
                }
                ["key", name] => match Key::parse(name) {
                    Some(key) => {
                        keys.dispatch(&KeyEvent::pressed(key), &mut panels);
                        keys.dispatch(&KeyEvent::released(key), &mut panels);
                    }
                    None => println!("Unknown key '{name}'"),
                },
                ["play"] => panels.show_game_panel(),
                _ => println!("Unknown command: {line}"),
            }
        }

        let surface: &mut dyn RenderBackend = match recorder.as_mut() {
            Some(r) => r,
            None => &mut blank,
        };

        match &mut session {
            Session::Online(client) => {
                client.poll_reliable().await?;
                if client.state == ClientState::Disconnected {
                    println!("Disconnected from server.");
                    break;
                }
                if let Err(e) = client.recv_snapshot(now).await {
                    warn!(error = %e, "Snapshot error");
                }
                if panels.current() == Panel::Game {
                    client.render(surface, now);
                }
            }
            Session::Offline(game) => {
                if panels.current() == Panel::Game {
                    game.frame(surface, now);
                }
            }
        }

        frames += 1;
        if frames % (cfg.tick_hz as u64 * 5) == 0 {
            info!(
                frames,
                draw_calls = ?recorder.as_ref().map(|r| r.commands.len()),
                panel = ?panels.current(),
                "Frame stats"
            );
        }

        tokio::time::sleep(frame_interval).await;
    }

    Ok(())
}
