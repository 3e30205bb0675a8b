//! The bridge between a game controller instance and the simulator.
//!
//! One [`GameControllerBridge`] owns the ports, the controller process, the
//! CI transport, the referee listener and the reconciliation state for a
//! single controller. Several bridges may live in one process.

use std::net::{SocketAddr, SocketAddrV4};
use std::path::Path;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::Sender;
use gc_proto::ssl_gc::{self, CiOutput, Referee};
use gc_proto::{sim, CommandKind, ManualOverride, PlacementPoint, TeamColor};
use thiserror::Error;

use crate::ci::{CiError, CiTransport, TcpCiLink};
use crate::commands;
use crate::config::{BridgeConfig, BridgeConfigError};
use crate::controller::{ControllerError, ControllerLaunch, ControllerProcess};
use crate::frame;
use crate::overrides::ManualOverrideQueue;
use crate::ports::{self, PortError, PortReservation};
use crate::reconcile::{RobotPopulationReconciler, TeamTargets};
use crate::referee::{
    HandlerError, ListenerConfig, ListenerError, RefereeHandler, RefereeListener, RefereeSink,
};
use crate::slot::LatestSlot;
use crate::world::{WorldSnapshot, WorldState};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Config(#[from] BridgeConfigError),
    #[error(transparent)]
    Ports(#[from] PortError),
    #[error(transparent)]
    Ci(#[from] CiError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error("referee listener is already running")]
    AlreadyAttached,
}

/// Receiver of corrected world states (the simulator input).
pub trait WorldStateSink: Send {
    fn push(&self, state: &sim::WorldState) -> Result<(), HandlerError>;
}

impl WorldStateSink for Sender<sim::WorldState> {
    fn push(&self, state: &sim::WorldState) -> Result<(), HandlerError> {
        self.send(state.clone())
            .map_err(|_| HandlerError::SimulatorDisconnected)
    }
}

/// Where forwarded referee messages go.
pub struct RefereeConsumers {
    pub blue: Box<dyn RefereeSink>,
    pub yellow: Box<dyn RefereeSink>,
    pub observer: Option<Box<dyn RefereeSink>>,
}

impl RefereeConsumers {
    fn into_sinks(self) -> Vec<Box<dyn RefereeSink>> {
        let mut sinks = vec![self.blue, self.yellow];
        sinks.extend(self.observer);
        sinks
    }
}

/// Referee callback that keeps the simulated robot population in line with
/// the controller's allowances.
pub struct ReconciliationHandler {
    reconciler: RobotPopulationReconciler,
    world: Arc<LatestSlot<WorldSnapshot>>,
    simulator: Option<Box<dyn WorldStateSink>>,
}

impl ReconciliationHandler {
    pub fn new(
        world: Arc<LatestSlot<WorldSnapshot>>,
        simulator: Option<Box<dyn WorldStateSink>>,
    ) -> Self {
        Self {
            reconciler: RobotPopulationReconciler::new(),
            world,
            simulator,
        }
    }

    pub fn reconciler(&self) -> &RobotPopulationReconciler {
        &self.reconciler
    }

    /// Run one reconciliation cycle. Returns the state pushed to the
    /// simulator, if any.
    pub fn apply(&mut self, referee: &Referee) -> Result<Option<WorldState>, HandlerError> {
        let Some(simulator) = self.simulator.as_ref() else {
            return Ok(None);
        };
        let Some(snapshot) = self.world.latest() else {
            tracing::debug!(target: "gc_bridge::reconcile", "reconcile.skipped=no_world");
            return Ok(None);
        };

        let targets = TeamTargets::from_referee(referee, &snapshot);
        let Some(reconciled) = self.reconciler.reconcile(&snapshot, targets) else {
            return Ok(None);
        };
        let state = frame::normalize(reconciled, referee.blue_team_on_positive_half());
        simulator.push(&state.to_proto())?;

        tracing::info!(
            target: "gc_bridge::reconcile",
            blue = state.blue.len(),
            yellow = state.yellow.len(),
            blue_target = targets.blue,
            yellow_target = targets.yellow,
            inverted = referee.blue_team_on_positive_half(),
            "reconcile.pushed"
        );
        Ok(Some(state))
    }
}

impl RefereeHandler for ReconciliationHandler {
    fn handle(&mut self, referee: &Referee) -> Result<(), HandlerError> {
        self.apply(referee).map(|_| ())
    }
}

pub struct GameControllerBridge {
    config: BridgeConfig,
    referee_port: u16,
    ci_port: u16,
    reservations: Vec<PortReservation>,
    overrides: ManualOverrideQueue,
    blue_world: Arc<LatestSlot<WorldSnapshot>>,
    listener: Option<RefereeListener>,
    ci: Option<CiTransport<TcpCiLink>>,
    controller: Option<ControllerProcess>,
}

impl GameControllerBridge {
    /// Pick the referee and CI ports. Both stay reserved until the
    /// controller is launched or the CI channel is connected.
    pub fn new(config: BridgeConfig) -> Result<Self, BridgeError> {
        let referee = if config.use_conventional_port {
            ports::reserve_exact_port(config.conventional_referee_port)?
        } else {
            ports::reserve_random_port(config.random_port_min, config.port_range_max)?
        };
        let ci = ports::reserve_free_port(config.ci_port_search_start, config.port_range_max)?;

        tracing::info!(
            target: "gc_bridge::ports",
            referee_port = referee.port(),
            ci_port = ci.port(),
            "ports.selected"
        );

        Ok(Self {
            referee_port: referee.port(),
            ci_port: ci.port(),
            reservations: vec![referee, ci],
            overrides: ManualOverrideQueue::new(config.override_capacity),
            blue_world: Arc::new(LatestSlot::new()),
            listener: None,
            ci: None,
            controller: None,
            config,
        })
    }

    pub fn from_config_file(path: &Path) -> Result<Self, BridgeError> {
        let config = BridgeConfig::from_file(path)?;
        Self::new(config)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn referee_port(&self) -> u16 {
        self.referee_port
    }

    pub fn ci_port(&self) -> u16 {
        self.ci_port
    }

    pub fn referee_publish_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.config.referee_group, self.referee_port)
    }

    pub fn ci_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.config.ci_host, self.ci_port)
    }

    /// Producer handle for operator overrides.
    pub fn override_queue(&self) -> ManualOverrideQueue {
        self.overrides.clone()
    }

    /// Slot the blue pipeline publishes its observed world into.
    pub fn world_slot(&self) -> Arc<LatestSlot<WorldSnapshot>> {
        Arc::clone(&self.blue_world)
    }

    pub fn publish_blue_world(&self, world: &sim::World) {
        self.blue_world.publish(WorldSnapshot::from(world));
    }

    fn release_reservations(&mut self) {
        for reservation in self.reservations.drain(..) {
            reservation.release();
        }
    }

    /// Start the controller process, wait for it to come up, then connect
    /// the CI channel.
    pub fn launch_controller(&mut self) -> Result<(), BridgeError> {
        self.release_reservations();
        let launch = ControllerLaunch {
            binary: self.config.controller_binary.clone(),
            publish_addr: self.referee_publish_addr(),
            ci_addr: self.ci_addr(),
            suppress_logs: self.config.suppress_controller_logs,
        };
        self.controller = Some(ControllerProcess::spawn(&launch)?);

        thread::sleep(self.config.launch_delay());
        self.connect_ci_at(SocketAddr::V4(self.ci_addr()))
    }

    /// Connect the CI channel to a controller that is already listening.
    pub fn connect_ci_at(&mut self, addr: SocketAddr) -> Result<(), BridgeError> {
        self.release_reservations();
        let link = TcpCiLink::connect(
            addr,
            self.config.ci_receive_buffer_size,
            self.config.ci_read_timeout(),
        )?;
        self.ci = Some(CiTransport::new(link, self.config.ci_max_attempts));
        Ok(())
    }

    /// Start listening for referee messages. Each message is reconciled
    /// against the latest blue world and then forwarded to `consumers`.
    pub fn attach(
        &mut self,
        consumers: RefereeConsumers,
        simulator: Option<Box<dyn WorldStateSink>>,
    ) -> Result<(), BridgeError> {
        if self.listener.is_some() {
            return Err(BridgeError::AlreadyAttached);
        }
        let listener_config = ListenerConfig {
            address: self.config.referee_group,
            port: self.referee_port,
            interface: self.config.referee_interface,
            poll_interval: self.config.listener_poll_interval(),
        };
        let handler = ReconciliationHandler::new(self.world_slot(), simulator);
        self.listener = Some(RefereeListener::spawn(
            &listener_config,
            handler,
            consumers.into_sinks(),
        )?);
        Ok(())
    }

    pub fn listener_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(RefereeListener::local_addr)
    }

    /// Surface a listener that stopped on its own.
    pub fn check_listener(&mut self) -> Result<(), BridgeError> {
        if self.listener.as_ref().is_some_and(RefereeListener::is_finished) {
            if let Some(listener) = self.listener.take() {
                listener.shutdown()?;
            }
        }
        Ok(())
    }

    /// Forward pending operator overrides to the controller in arrival
    /// order. Returns how many were sent. On a CI failure the override being
    /// sent is consumed and everything behind it stays queued for the next
    /// cycle.
    pub fn refresh(&mut self) -> Result<usize, CiError> {
        if self.ci.is_none() {
            return Err(CiError::NotConnected);
        }
        let mut sent = 0;
        while let Some(item) = self.overrides.pop() {
            if let Err(err) = self.send_override(&item) {
                tracing::warn!(
                    target: "gc_bridge::overrides",
                    command = ?item.command,
                    team = %item.team,
                    still_queued = self.overrides.len(),
                    error = %err,
                    "overrides.send_failed"
                );
                return Err(err);
            }
            sent += 1;
        }
        Ok(sent)
    }

    pub fn send_override(&mut self, item: &ManualOverride) -> Result<Vec<CiOutput>, CiError> {
        tracing::info!(
            target: "gc_bridge::overrides",
            command = ?item.command,
            team = %item.team,
            placement = item.placement.is_some(),
            "overrides.sent"
        );
        self.send_inputs(commands::override_inputs(item))
    }

    pub fn send_command(
        &mut self,
        command: CommandKind,
        team: TeamColor,
        placement: Option<PlacementPoint>,
    ) -> Result<Vec<CiOutput>, CiError> {
        self.send_inputs(commands::command_inputs(command, team, placement))
    }

    pub fn reset_team_info(
        &mut self,
        division: ssl_gc::Division,
    ) -> Result<Vec<CiOutput>, CiError> {
        self.send_inputs(commands::reset_team_info_inputs(division))
    }

    pub fn update_engine_config(
        &mut self,
        config: ssl_gc::Config,
    ) -> Result<Vec<CiOutput>, CiError> {
        self.send_inputs(vec![commands::engine_config_update(config)])
    }

    fn send_inputs(&mut self, inputs: Vec<ssl_gc::Input>) -> Result<Vec<CiOutput>, CiError> {
        let transport = self.ci.as_mut().ok_or(CiError::NotConnected)?;
        transport.send(&commands::ci_input(inputs))
    }

    /// Stop the listener, close the CI channel and stop the controller. Every
    /// resource is released even when an earlier step fails; the first
    /// failure is returned.
    pub fn shutdown(mut self) -> Result<(), BridgeError> {
        let listener = self
            .listener
            .take()
            .map_or(Ok(()), RefereeListener::shutdown)
            .map_err(BridgeError::from);
        self.ci = None;
        let controller = match self.controller.take() {
            Some(process) => process
                .terminate()
                .map(|_| ())
                .map_err(|source| BridgeError::Controller(ControllerError::Stop(source))),
            None => Ok(()),
        };
        self.release_reservations();
        listener.and(controller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{FieldDimensions, ObservedRobot, RobotState, Vec2};
    use crossbeam_channel::unbounded;

    fn referee(blue: u32, yellow: u32, blue_on_positive_half: bool) -> Referee {
        Referee {
            blue: Some(ssl_gc::referee::TeamInfo {
                max_allowed_bots: Some(blue),
                ..Default::default()
            }),
            yellow: Some(ssl_gc::referee::TeamInfo {
                max_allowed_bots: Some(yellow),
                ..Default::default()
            }),
            blue_team_on_positive_half: Some(blue_on_positive_half),
            ..Default::default()
        }
    }

    fn snapshot() -> WorldSnapshot {
        let robot = |id, x, y| ObservedRobot {
            id,
            state: RobotState {
                position: Vec2::new(x, y),
                velocity: Vec2::new(0.4, 0.4),
                ..Default::default()
            },
        };
        WorldSnapshot {
            field: FieldDimensions {
                x_length: 9.0,
                y_length: 6.0,
                boundary_buffer: 0.3,
            },
            blue: vec![robot(0, 1.0, 2.0), robot(1, -1.0, 0.5)],
            yellow: vec![robot(0, 3.0, 1.0)],
        }
    }

    #[test]
    fn handler_without_simulator_is_inert() {
        let world = Arc::new(LatestSlot::new());
        world.publish(snapshot());
        let mut handler = ReconciliationHandler::new(world, None);
        assert_eq!(handler.apply(&referee(1, 1, false)).expect("apply"), None);
        assert!(handler.reconciler().pool(TeamColor::Blue).is_empty());
    }

    #[test]
    fn handler_without_world_skips() {
        let (tx, rx) = unbounded::<sim::WorldState>();
        let mut handler =
            ReconciliationHandler::new(Arc::new(LatestSlot::new()), Some(Box::new(tx)));
        assert_eq!(handler.apply(&referee(1, 1, false)).expect("apply"), None);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn matching_counts_push_nothing() {
        let (tx, rx) = unbounded::<sim::WorldState>();
        let world = Arc::new(LatestSlot::new());
        world.publish(snapshot());
        let mut handler = ReconciliationHandler::new(world, Some(Box::new(tx)));

        assert_eq!(handler.apply(&referee(2, 1, true)).expect("apply"), None);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn shrink_is_normalized_and_pushed() {
        let (tx, rx) = unbounded::<sim::WorldState>();
        let world = Arc::new(LatestSlot::new());
        world.publish(snapshot());
        let mut handler = ReconciliationHandler::new(world, Some(Box::new(tx)));

        let state = handler
            .apply(&referee(1, 1, true))
            .expect("apply")
            .expect("blue shrinks");

        let blue = state.blue[&0];
        assert_eq!(blue.position, Vec2::new(-1.0, -2.0));
        assert!((blue.orientation - std::f64::consts::PI).abs() < 1e-12);
        assert_eq!(blue.velocity, Vec2::ZERO);
        assert_eq!(state.yellow[&0].position, Vec2::new(-3.0, -1.0));

        let pushed = rx.try_recv().expect("state pushed");
        assert_eq!(pushed, state.to_proto());
        assert_eq!(
            handler.reconciler().pool(TeamColor::Blue).iter().collect::<Vec<_>>(),
            vec![1]
        );
    }

    #[test]
    fn disconnected_simulator_is_an_error() {
        let (tx, rx) = unbounded::<sim::WorldState>();
        drop(rx);
        let world = Arc::new(LatestSlot::new());
        world.publish(snapshot());
        let mut handler = ReconciliationHandler::new(world, Some(Box::new(tx)));

        assert!(matches!(
            handler.apply(&referee(0, 1, false)),
            Err(HandlerError::SimulatorDisconnected)
        ));
    }

    #[test]
    fn commands_without_ci_channel_fail_cleanly() {
        let mut bridge = GameControllerBridge::new(BridgeConfig::default()).expect("bridge");
        let queue = bridge.override_queue();
        queue.push(ManualOverride::new(CommandKind::Halt, TeamColor::Blue));
        assert!(matches!(bridge.refresh(), Err(CiError::NotConnected)));
        assert_eq!(queue.len(), 1);
        assert!(matches!(
            bridge.reset_team_info(ssl_gc::Division::DivB),
            Err(CiError::NotConnected)
        ));
        bridge.shutdown().expect("shutdown");
    }

    #[test]
    fn config_file_errors_surface_as_bridge_errors() {
        let missing = std::env::temp_dir().join("gc_bridge_missing_config.json");
        assert!(matches!(
            GameControllerBridge::from_config_file(&missing),
            Err(BridgeError::Config(BridgeConfigError::ReadFailed { .. }))
        ));

        let path = std::env::temp_dir().join(format!(
            "gc_bridge_config_{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{ "ci_port_search_start": 41000 }"#).expect("write config");
        let bridge = GameControllerBridge::from_config_file(&path).expect("bridge from file");
        std::fs::remove_file(&path).ok();
        assert!(bridge.ci_port() >= 41000);
        assert_eq!(bridge.config().ci_max_attempts, Some(20));

        std::fs::write(&path, "not json").expect("write config");
        let result = GameControllerBridge::from_config_file(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(
            result,
            Err(BridgeError::Config(BridgeConfigError::Parse(_)))
        ));
    }

    #[test]
    fn two_bridges_get_distinct_ports() {
        let first = GameControllerBridge::new(BridgeConfig::default()).expect("first bridge");
        let second = GameControllerBridge::new(BridgeConfig::default()).expect("second bridge");
        assert_ne!(first.ci_port(), second.ci_port());
        assert_ne!(first.referee_port(), first.ci_port());
        assert_eq!(first.referee_publish_addr().ip(), &BridgeConfig::default().referee_group);
    }

    #[test]
    fn conventional_port_conflict_fails_construction() {
        let holder = std::net::TcpListener::bind("0.0.0.0:0").expect("hold a port");
        let port = holder.local_addr().expect("addr").port();
        let config = BridgeConfig {
            use_conventional_port: true,
            conventional_referee_port: port,
            ..BridgeConfig::default()
        };
        assert!(matches!(
            GameControllerBridge::new(config),
            Err(BridgeError::Ports(PortError::ReservedPortInUse(p))) if p == port
        ));
    }
}
