//! Half-assignment normalization.
//!
//! The simulator's frame is fixed with blue defending the negative half. When
//! the controller reports blue on the positive half, every injected position
//! is mirrored through the origin and every orientation turned by π.

use std::f64::consts::PI;

use crate::world::{wrap_angle, Vec2, WorldState};

/// Return `state` expressed in the simulator frame.
///
/// Always applied to a freshly reconciled state, never to a previous output.
pub fn normalize(mut state: WorldState, blue_on_positive_half: bool) -> WorldState {
    if blue_on_positive_half {
        for robot in state.robots_mut() {
            robot.position = Vec2::new(-robot.position.x, -robot.position.y);
            robot.orientation = wrap_angle(robot.orientation + PI);
        }
    }
    state
}
