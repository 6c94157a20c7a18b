//! pokgame runtime: loads configuration, brings up logging, and drives the
//! update loop and I/O loop cooperatively on one thread (spec §2's
//! component 12/13 split, driven here the way the teacher drives its own
//! single `server.tick()` call in `server/src/main.rs::main`, rather than
//! as separate OS threads — `GameInfo` is a plain struct, not behind an
//! `Arc`, so one thread alternating both steps each tick is the natural
//! fit). The renderer is external per spec §1; this binary is the
//! headless stand-in that keeps the two owned threads alive.

use std::env;
use std::net::TcpStream;
use std::process;
use std::time::Duration;

use log::LevelFilter;

use pokcore::channel::{ByteChannel, StreamChannel};
use pokcore::error::{PokError, Severity};
use pokcore::game::GameInfo;
use pokcore::geometry::Direction;
use pokcore::intermsg::{InterMsg, InterMsgPayload};
use pokcore::keyboard::KeyboardState;
use pokcore::lock_table::GameLockTable;
use pokengine::default_scenario;
use pokengine::io_loop::IoLoop;
use pokengine::update_loop::{self, TileAniAccumulator};

struct Config {
    log_level: LevelFilter,
    log_file: Option<String>,
    peer_host: Option<String>,
    peer_port: u16,
    tick_ms: u64,
}

impl Config {
    fn from_env() -> Self {
        let log_level = env::var("POKGAME_LOG_LEVEL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(LevelFilter::Info);
        let log_file = env::var("POKGAME_LOG_FILE").ok();
        let peer_host = env::var("POKGAME_PEER_HOST").ok();
        let peer_port = env::var("POKGAME_PEER_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5481);
        let tick_ms = env::var("POKGAME_TICK_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(pokcore::constants::DEFAULT_TICK_MS);

        Self {
            log_level,
            log_file,
            peer_host,
            peer_port,
            tick_ms,
        }
    }
}

/// One peer session: either a real TCP connection to a version peer, or
/// the built-in default scenario standing in for one (spec §4.12,
/// DESIGN.md open question resolution #3).
enum Session {
    Peer(StreamChannel<TcpStream>),
    Default,
}

fn connect(cfg: &Config) -> anyhow::Result<Option<Session>> {
    let Some(host) = cfg.peer_host.as_deref() else {
        return Ok(None);
    };
    let stream = TcpStream::connect((host, cfg.peer_port))?;
    stream.set_nonblocking(true)?;
    log::info!("Connected to peer at {}:{}", host, cfg.peer_port);
    Ok(Some(Session::Peer(StreamChannel::new(stream))))
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cfg = Config::from_env();

    pokcore::logging::init(cfg.log_level, cfg.log_file.as_deref()).unwrap_or_else(|e| {
        eprintln!("Failed to initialize logger: {e}. Exiting.");
        process::exit(1);
    });

    log::info!("Starting pokgame runtime v0.1.0");
    log::info!("Process PID: {}", process::id());

    let session = connect(&cfg)?.unwrap_or_else(|| {
        log::info!("No POKGAME_PEER_HOST configured; running the built-in default scenario");
        Session::Default
    });

    let mut game = default_scenario::build_default_game();
    let tick = Duration::from_millis(cfg.tick_ms);
    let lock_table = GameLockTable::new();

    log::info!("Entering main loop...");

    let result = match session {
        Session::Peer(mut ch) => run_with_peer(&mut game, &mut ch, &lock_table, tick),
        Session::Default => {
            default_scenario::seed_mailbox(&mut game);
            run_default(&mut game, tick)
        }
    };

    if let Err(e) = &result {
        log::error!("Runtime loop ended with an error: {e}");
        if e.severity() == Severity::Fatal {
            process::exit(1);
        }
    }

    log::info!("Shutdown complete.");
    Ok(())
}

/// Drives both loops in lockstep: one I/O step, then one update step, each
/// tick (spec §4.11/§4.12). A retryable I/O error just means "no bytes
/// yet"; anything else ends the session.
fn run_with_peer(
    game: &mut GameInfo,
    ch: &mut dyn ByteChannel,
    lock_table: &GameLockTable,
    tick: Duration,
) -> Result<(), PokError> {
    let mut io = IoLoop::new();
    let mut tile_ani = TileAniAccumulator::default();
    let elapsed_ticks = tick.as_millis() as u32;

    game.update_timeout.set_amount(tick);
    game.io_timeout.set_amount(tick);

    while game.running {
        let mut did_work = false;

        if game.io_timeout.poll() {
            did_work = true;
            match io.drive(ch, game, lock_table) {
                Ok(()) => {}
                Err(e) if e.is_retryable() => {}
                Err(e) => return Err(e),
            }
        }

        if game.update_timeout.poll() {
            did_work = true;
            let keys = match update_loop::poll_incoming(game) {
                Some(msg) => keys_from_intermsg(&msg),
                None => poll_keys(),
            };
            update_loop::update_tick(game, keys, elapsed_ticks, &mut tile_ani);
        }

        if !did_work {
            let wait = game.io_timeout.remaining().min(game.update_timeout.remaining());
            std::thread::sleep(wait);
        }
    }
    Ok(())
}

/// Translates one relayed `InterMsg::KeyInput` into the single-tick
/// `KeyboardState` the update loop expects (spec §4.12: the peer session
/// delivers discrete key events, not a held-key snapshot, so each event
/// only registers for the tick it arrives on).
fn keys_from_intermsg(msg: &InterMsg) -> KeyboardState {
    let mut keys = KeyboardState::default();
    if let InterMsgPayload::Key(key) = &msg.payload {
        match key.direction() {
            Some(Direction::Up) => keys.up = true,
            Some(Direction::Down) => keys.down = true,
            Some(Direction::Left) => keys.left = true,
            Some(Direction::Right) => keys.right = true,
            _ => {}
        }
    }
    keys
}

/// Drives the update loop alone: the default scenario never has a peer to
/// exchange `InterMsg`s with, so there is no I/O step to interleave.
fn run_default(game: &mut GameInfo, tick: Duration) -> Result<(), PokError> {
    update_loop::run(game, tick, poll_keys, std::thread::sleep)
}

/// Headless stand-in for the renderer's keyboard polling (spec §1: the
/// renderer is an external collaborator, not part of this workspace).
/// Always reports no keys held.
fn poll_keys() -> KeyboardState {
    KeyboardState::default()
}
