//! Bridge between an SSL game controller and a robot simulator.
//!
//! The bridge listens to the controller's referee broadcast, keeps the
//! simulated robot population consistent with the team sizes the controller
//! allows (see [`reconcile`]), and forwards operator overrides through the
//! controller's CI protocol (see [`ci`] and [`commands`]).

pub mod bridge;
pub mod ci;
pub mod commands;
pub mod config;
pub mod console;
pub mod controller;
pub mod frame;
pub mod overrides;
pub mod ports;
pub mod reconcile;
pub mod referee;
pub mod slot;
pub mod world;

pub use bridge::{
    BridgeError, GameControllerBridge, ReconciliationHandler, RefereeConsumers, WorldStateSink,
};
pub use ci::{CiError, CiLink, CiTransport, TcpCiLink};
pub use config::{load_bridge_config_from_env, BridgeConfig, BridgeConfigError};
pub use console::{parse_console_line, ConsoleCommand};
pub use controller::{ControllerError, ControllerLaunch, ControllerProcess};
pub use overrides::{ManualOverrideQueue, PushOutcome};
pub use ports::{is_bindable, next_free_port, PortError, PortReservation};
pub use reconcile::{RemovedIdPool, RobotPopulationReconciler, TeamTargets};
pub use referee::{
    HandlerError, ListenerConfig, ListenerError, RefereeHandler, RefereeListener, RefereeSink,
};
pub use slot::LatestSlot;
pub use world::{FieldDimensions, ObservedRobot, RobotId, RobotState, Vec2, WorldSnapshot, WorldState};
