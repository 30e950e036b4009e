//! inactivity-watch - drive an inactivity watchdog from the terminal.
//!
//! Every stdin line is one command:
//!
//! - `start X Y`, `move X Y`, `end X Y`: a touch inside the watched container
//! - `force on`, `force off`, `force clear`: set the force-active input
//! - `status`: log the current state
//! - `quit`
//!
//! Touches are routed through the container's capture hooks to a child view
//! that claims them, so both the watchdog and the child see every touch.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use user_inactivity::{
    Config, GestureEvent, PanHandlers, Responder, ResponderTree, TouchPhase, UserInactivity,
};

/// Application version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commands read from stdin.
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Touch(GestureEvent),
    Force(Option<bool>),
    Status,
    Quit,
}

/// Child view that claims every touch and counts what it receives.
#[derive(Debug, Default)]
struct TouchTarget {
    grants: u64,
    moves: u64,
    releases: u64,
}

impl Responder for TouchTarget {
    fn on_start_should_set_responder(&mut self, _event: &GestureEvent) -> bool {
        true
    }

    fn on_responder_grant(&mut self, event: &GestureEvent) {
        self.grants += 1;
        debug!("Child granted touch at ({}, {})", event.x, event.y);
    }

    fn on_responder_move(&mut self, _event: &GestureEvent) {
        self.moves += 1;
    }

    fn on_responder_release(&mut self, event: &GestureEvent) {
        self.releases += 1;
        debug!("Child released touch at ({}, {})", event.x, event.y);
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let config_path = std::env::args().nth(1).map(PathBuf::from);

    // Load configuration
    let config = Config::load(config_path.as_deref())?;
    config.validate()?;

    // Initialize tracing
    init_tracing(&config.logging.level)?;

    info!("Starting inactivity-watch v{}", VERSION);

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    runtime.block_on(run_watch_loop(config))
}

/// Feed stdin commands to the watchdog until `quit` or end of input.
async fn run_watch_loop(config: Config) -> Result<()> {
    info!(
        "Configuration loaded: inactivity after {}ms, force-active {:?}",
        config.inactivity.time_for_inactivity_ms, config.inactivity.is_active
    );

    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<bool>();
    let mut watchdog = UserInactivity::builder()
        .config(&config.inactivity)
        .on_action(move |active| {
            let _ = action_tx.send(active);
        })
        .build()
        .context("Failed to mount inactivity watchdog")?;

    let handlers: Arc<dyn PanHandlers> = watchdog.pan_handlers();
    let mut tree = ResponderTree::new(vec![handlers], TouchTarget::default());
    let mut since: DateTime<Utc> = Utc::now();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    info!("Watching for activity");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    info!("Input closed");
                    break;
                };

                match parse_command(&line) {
                    Some(Command::Touch(event)) => {
                        tree.dispatch(&event);
                    }
                    Some(Command::Force(is_active)) => watchdog.set_is_active(is_active),
                    Some(Command::Status) => {
                        let target = tree.target();
                        info!(
                            "{:?} since {} ({}s); child saw {} grants, {} moves, {} releases",
                            watchdog.state(),
                            since,
                            (Utc::now() - since).num_seconds(),
                            target.grants,
                            target.moves,
                            target.releases
                        );
                    }
                    Some(Command::Quit) => {
                        info!("Quit command received");
                        break;
                    }
                    None => warn!("Unrecognized command: {:?}", line),
                }
            }
            Some(active) = action_rx.recv() => {
                since = Utc::now();
                info!("on_action({})", active);
            }
        }
    }

    watchdog.unmount();
    info!("Goodbye!");
    Ok(())
}

fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    let keyword = parts.next()?;
    let command = match keyword {
        "start" | "move" | "end" => {
            let phase = match keyword {
                "start" => TouchPhase::Start,
                "move" => TouchPhase::Move,
                _ => TouchPhase::End,
            };
            let x = parts.next().map_or(Some(0.0), |v| v.parse().ok())?;
            let y = parts.next().map_or(Some(0.0), |v| v.parse().ok())?;
            Command::Touch(GestureEvent::new(phase, x, y))
        }
        "force" => match parts.next()? {
            "on" => Command::Force(Some(true)),
            "off" => Command::Force(Some(false)),
            "clear" => Command::Force(None),
            _ => return None,
        },
        "status" => Command::Status,
        "quit" => Command::Quit,
        _ => return None,
    };

    if parts.next().is_some() {
        return None;
    }
    Some(command)
}

/// Initialize tracing subscriber with the given log level.
fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();

    Ok(())
}
