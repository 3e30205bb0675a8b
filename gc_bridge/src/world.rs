//! Robot population types shared by the reconciler and the frame normalizer,
//! plus conversions to and from the simulator's protobuf messages.

use std::collections::BTreeMap;
use std::f64::consts::TAU;

use gc_proto::{sim, TeamColor};

pub type RobotId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Kinematic state of one robot. Orientation is kept in `[0, 2π)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RobotState {
    pub position: Vec2,
    pub velocity: Vec2,
    pub orientation: f64,
    pub angular_velocity: f64,
}

impl RobotState {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn with_orientation(mut self, radians: f64) -> Self {
        self.orientation = wrap_angle(radians);
        self
    }
}

pub fn wrap_angle(radians: f64) -> f64 {
    let wrapped = radians.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservedRobot {
    pub id: RobotId,
    pub state: RobotState,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FieldDimensions {
    pub x_length: f64,
    pub y_length: f64,
    pub boundary_buffer: f64,
}

impl FieldDimensions {
    /// Distance from the centerline at which re-added robots are spawned.
    pub fn edge_y(&self) -> f64 {
        self.y_length / 2.0 - self.boundary_buffer
    }
}

/// World as observed by the blue pipeline. Robots keep the order in which
/// the pipeline reported them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorldSnapshot {
    pub field: FieldDimensions,
    pub blue: Vec<ObservedRobot>,
    pub yellow: Vec<ObservedRobot>,
}

impl WorldSnapshot {
    pub fn team(&self, color: TeamColor) -> &[ObservedRobot] {
        match color {
            TeamColor::Blue => &self.blue,
            TeamColor::Yellow => &self.yellow,
        }
    }
}

impl From<&sim::World> for WorldSnapshot {
    fn from(world: &sim::World) -> Self {
        let field = world
            .field
            .as_ref()
            .map(|field| FieldDimensions {
                x_length: field.field_x_length,
                y_length: field.field_y_length,
                boundary_buffer: field.boundary_buffer_size,
            })
            .unwrap_or_default();
        Self {
            field,
            blue: observed_team(world.friendly_team.as_ref()),
            yellow: observed_team(world.enemy_team.as_ref()),
        }
    }
}

fn observed_team(team: Option<&sim::Team>) -> Vec<ObservedRobot> {
    team.map(|team| {
        team.team_robots
            .iter()
            .map(|robot| ObservedRobot {
                id: robot.id,
                state: robot
                    .current_state
                    .as_ref()
                    .map(RobotState::from)
                    .unwrap_or_default(),
            })
            .collect()
    })
    .unwrap_or_default()
}

/// Robot states to inject into the simulator, keyed by team and id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorldState {
    pub blue: BTreeMap<RobotId, RobotState>,
    pub yellow: BTreeMap<RobotId, RobotState>,
}

impl WorldState {
    pub fn team(&self, color: TeamColor) -> &BTreeMap<RobotId, RobotState> {
        match color {
            TeamColor::Blue => &self.blue,
            TeamColor::Yellow => &self.yellow,
        }
    }

    pub fn team_mut(&mut self, color: TeamColor) -> &mut BTreeMap<RobotId, RobotState> {
        match color {
            TeamColor::Blue => &mut self.blue,
            TeamColor::Yellow => &mut self.yellow,
        }
    }

    pub fn robots_mut(&mut self) -> impl Iterator<Item = &mut RobotState> {
        self.blue.values_mut().chain(self.yellow.values_mut())
    }

    pub fn to_proto(&self) -> sim::WorldState {
        sim::WorldState {
            blue_robots: team_to_proto(&self.blue),
            yellow_robots: team_to_proto(&self.yellow),
        }
    }
}

fn team_to_proto(team: &BTreeMap<RobotId, RobotState>) -> BTreeMap<u32, sim::RobotState> {
    team.iter()
        .map(|(id, state)| (*id, sim::RobotState::from(state)))
        .collect()
}

impl From<&sim::RobotState> for RobotState {
    fn from(state: &sim::RobotState) -> Self {
        let position = state
            .global_position
            .as_ref()
            .map(|p| Vec2::new(p.x_meters, p.y_meters))
            .unwrap_or_default();
        let velocity = state
            .global_velocity
            .as_ref()
            .map(|v| Vec2::new(v.x_component_meters, v.y_component_meters))
            .unwrap_or_default();
        Self {
            position,
            velocity,
            orientation: wrap_angle(
                state
                    .global_orientation
                    .as_ref()
                    .map_or(0.0, |angle| angle.radians),
            ),
            angular_velocity: state
                .global_angular_velocity
                .as_ref()
                .map_or(0.0, |w| w.radians_per_second),
        }
    }
}

impl From<&RobotState> for sim::RobotState {
    fn from(state: &RobotState) -> Self {
        sim::RobotState {
            global_position: Some(sim::Point {
                x_meters: state.position.x,
                y_meters: state.position.y,
            }),
            global_orientation: Some(sim::Angle {
                radians: state.orientation,
            }),
            global_velocity: Some(sim::Vector {
                x_component_meters: state.velocity.x,
                y_component_meters: state.velocity.y,
            }),
            global_angular_velocity: Some(sim::AngularVelocity {
                radians_per_second: state.angular_velocity,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_angle_stays_in_range() {
        assert_eq!(wrap_angle(0.0), 0.0);
        assert!((wrap_angle(-std::f64::consts::FRAC_PI_2) - 1.5 * std::f64::consts::PI).abs() < 1e-12);
        assert!((wrap_angle(TAU + 1.0) - 1.0).abs() < 1e-12);
        assert!(wrap_angle(-1e-18) < TAU);
    }

    #[test]
    fn observed_world_keeps_report_order() {
        let robot = |id| sim::Robot {
            id,
            current_state: Some(sim::RobotState {
                global_position: Some(sim::Point {
                    x_meters: id as f64,
                    y_meters: 0.0,
                }),
                ..Default::default()
            }),
        };
        let world = sim::World {
            field: Some(sim::Field {
                field_x_length: 9.0,
                field_y_length: 6.0,
                boundary_buffer_size: 0.3,
            }),
            friendly_team: Some(sim::Team {
                team_robots: vec![robot(4), robot(1), robot(3)],
            }),
            enemy_team: None,
        };

        let snapshot = WorldSnapshot::from(&world);
        let ids: Vec<_> = snapshot.blue.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4, 1, 3]);
        assert!(snapshot.yellow.is_empty());
        assert_eq!(snapshot.blue[0].state.position, Vec2::new(4.0, 0.0));
        assert!((snapshot.field.edge_y() - 2.7).abs() < 1e-12);
    }

    #[test]
    fn world_state_proto_is_keyed_by_id() {
        let mut state = WorldState::default();
        state
            .yellow
            .insert(2, RobotState::at(Vec2::new(1.0, -1.0)).with_orientation(0.5));
        let proto = state.to_proto();
        assert!(proto.blue_robots.is_empty());
        let robot = &proto.yellow_robots[&2];
        assert_eq!(robot.global_position.as_ref().map(|p| p.y_meters), Some(-1.0));
        assert_eq!(robot.global_orientation.as_ref().map(|a| a.radians), Some(0.5));
    }
}
