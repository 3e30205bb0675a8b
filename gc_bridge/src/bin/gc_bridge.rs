//! Operator front end for one game controller.
//!
//! Runs without a simulator: referee messages are only logged and forwarded,
//! and no world is ever published, so robot reconciliation stays idle.
//! Simulator hosts embed [`gc_bridge::GameControllerBridge`] instead and feed
//! it through `publish_blue_world`.

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use gc_bridge::{
    load_bridge_config_from_env, parse_console_line, ConsoleCommand, GameControllerBridge,
    ManualOverrideQueue, RefereeConsumers, RefereeSink,
};
use gc_proto::ssl_gc::{self, Referee};
use tracing::{error, info, warn};

/// Logs forwarded referee messages in place of a team pipeline.
struct LoggingSink {
    consumer: &'static str,
}

impl RefereeSink for LoggingSink {
    fn publish(&self, referee: &Referee) {
        tracing::debug!(
            target: "gc_bridge::referee",
            consumer = self.consumer,
            command = ?referee.command(),
            stage = ?referee.stage(),
            counter = referee.command_counter(),
            "referee.forwarded"
        );
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (config, config_path) = load_bridge_config_from_env();
    let cycle = config.control_cycle();

    let mut bridge = match GameControllerBridge::new(config) {
        Ok(bridge) => bridge,
        Err(err) => {
            error!(target: "gc_bridge::ports", error = %err, "bridge.start_failed");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(&mut bridge, cycle) {
        error!(target: "gc_bridge::controller", error = %err, "bridge.failed");
    }
    if let Err(err) = bridge.shutdown() {
        error!(target: "gc_bridge::controller", error = %err, "bridge.shutdown_failed");
        std::process::exit(1);
    }
    info!(
        target: "gc_bridge::controller",
        config = ?config_path,
        "bridge.stopped"
    );
}

fn run(
    bridge: &mut GameControllerBridge,
    cycle: std::time::Duration,
) -> Result<(), gc_bridge::BridgeError> {
    bridge.launch_controller()?;
    bridge.reset_team_info(ssl_gc::Division::DivB)?;
    // forward only; no simulator sink
    bridge.attach(
        RefereeConsumers {
            blue: Box::new(LoggingSink { consumer: "blue" }),
            yellow: Box::new(LoggingSink { consumer: "yellow" }),
            observer: None,
        },
        None,
    )?;

    info!(
        target: "gc_bridge::controller",
        referee_port = bridge.referee_port(),
        ci_port = bridge.ci_port(),
        "Game controller bridge ready"
    );

    let running = Arc::new(AtomicBool::new(true));
    spawn_console(bridge.override_queue(), Arc::clone(&running));

    while running.load(Ordering::Acquire) {
        bridge.check_listener()?;
        match bridge.refresh() {
            Ok(0) => {}
            Ok(sent) => info!(target: "gc_bridge::overrides", sent, "overrides.flushed"),
            Err(err) => warn!(target: "gc_bridge::ci", error = %err, "overrides.flush_failed"),
        }
        thread::sleep(cycle);
    }
    Ok(())
}

fn spawn_console(queue: ManualOverrideQueue, running: Arc<AtomicBool>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!(target: "gc_bridge::overrides", error = %err, "console.read_failed");
                    break;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match parse_console_line(trimmed) {
                Some(ConsoleCommand::Override(item)) => {
                    queue.push(item);
                }
                Some(ConsoleCommand::Quit) => break,
                None => warn!(
                    target: "gc_bridge::overrides",
                    input = trimmed,
                    "console.invalid_command"
                ),
            }
        }
        running.store(false, Ordering::Release);
    });
}
