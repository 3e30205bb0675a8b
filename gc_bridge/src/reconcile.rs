//! Robot population reconciliation.
//!
//! The controller decides how many robots each team may field. Whenever the
//! observed world disagrees, a fresh [`WorldState`] is rebuilt for both teams:
//! surplus robots are taken off the field and their ids parked in a per-team
//! [`RemovedIdPool`]; missing robots are re-added from that pool at the field
//! edge. Ids are never invented, so a team only grows back to robots it had
//! before.

use std::collections::{BTreeMap, VecDeque};

use gc_proto::{ssl_gc, TeamColor};

use crate::world::{ObservedRobot, RobotId, RobotState, Vec2, WorldSnapshot, WorldState};

/// FIFO of ids removed from the field that may be placed again.
///
/// An id appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovedIdPool {
    ids: VecDeque<RobotId>,
}

impl RemovedIdPool {
    pub fn push(&mut self, id: RobotId) {
        if !self.ids.contains(&id) {
            self.ids.push_back(id);
        }
    }

    pub fn pop(&mut self) -> Option<RobotId> {
        self.ids.pop_front()
    }

    pub fn remove(&mut self, id: RobotId) -> bool {
        match self.ids.iter().position(|queued| *queued == id) {
            Some(index) => {
                self.ids.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: RobotId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = RobotId> + '_ {
        self.ids.iter().copied()
    }
}

impl FromIterator<RobotId> for RemovedIdPool {
    fn from_iter<T: IntoIterator<Item = RobotId>>(iter: T) -> Self {
        let mut pool = RemovedIdPool::default();
        for id in iter {
            pool.push(id);
        }
        pool
    }
}

/// Robot counts the controller currently allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamTargets {
    pub blue: usize,
    pub yellow: usize,
}

impl TeamTargets {
    pub fn get(&self, color: TeamColor) -> usize {
        match color {
            TeamColor::Blue => self.blue,
            TeamColor::Yellow => self.yellow,
        }
    }

    /// Read targets from a referee message. A team whose allowance is not
    /// reported keeps its current size.
    pub fn from_referee(referee: &ssl_gc::Referee, snapshot: &WorldSnapshot) -> Self {
        let allowance = |info: Option<&ssl_gc::referee::TeamInfo>, current: usize| {
            info.and_then(|info| info.max_allowed_bots)
                .map_or(current, |max| max as usize)
        };
        Self {
            blue: allowance(referee.blue.as_ref(), snapshot.blue.len()),
            yellow: allowance(referee.yellow.as_ref(), snapshot.yellow.len()),
        }
    }
}

/// Owns the removed-id pools for one bridge and rebuilds world states.
#[derive(Debug, Clone, Default)]
pub struct RobotPopulationReconciler {
    blue_pool: RemovedIdPool,
    yellow_pool: RemovedIdPool,
}

impl RobotPopulationReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pools(blue_pool: RemovedIdPool, yellow_pool: RemovedIdPool) -> Self {
        Self {
            blue_pool,
            yellow_pool,
        }
    }

    pub fn pool(&self, color: TeamColor) -> &RemovedIdPool {
        match color {
            TeamColor::Blue => &self.blue_pool,
            TeamColor::Yellow => &self.yellow_pool,
        }
    }

    fn pool_mut(&mut self, color: TeamColor) -> &mut RemovedIdPool {
        match color {
            TeamColor::Blue => &mut self.blue_pool,
            TeamColor::Yellow => &mut self.yellow_pool,
        }
    }

    pub fn is_satisfied(snapshot: &WorldSnapshot, targets: TeamTargets) -> bool {
        TeamColor::ALL
            .iter()
            .all(|color| snapshot.team(*color).len() == targets.get(*color))
    }

    /// Rebuild both teams to match `targets`, or `None` when they already do.
    pub fn reconcile(
        &mut self,
        snapshot: &WorldSnapshot,
        targets: TeamTargets,
    ) -> Option<WorldState> {
        if Self::is_satisfied(snapshot, targets) {
            return None;
        }

        let edge_y = snapshot.field.edge_y();
        let mut world_state = WorldState::default();
        for color in TeamColor::ALL {
            let spawn_y = match color {
                TeamColor::Blue => edge_y,
                TeamColor::Yellow => -edge_y,
            };
            let robots = self.rebuild_team(
                color,
                snapshot.team(color),
                targets.get(color),
                Vec2::new(0.0, spawn_y),
            );
            *world_state.team_mut(color) = robots;
        }

        tracing::debug!(
            target: "gc_bridge::reconcile",
            blue = world_state.blue.len(),
            yellow = world_state.yellow.len(),
            blue_pool = self.blue_pool.len(),
            yellow_pool = self.yellow_pool.len(),
            "reconcile.rebuilt"
        );
        Some(world_state)
    }

    fn rebuild_team(
        &mut self,
        color: TeamColor,
        observed: &[ObservedRobot],
        target: usize,
        spawn: Vec2,
    ) -> BTreeMap<RobotId, RobotState> {
        let pool = self.pool_mut(color);
        for robot in observed {
            pool.remove(robot.id);
        }

        let mut robots = BTreeMap::new();
        for (index, robot) in observed.iter().enumerate() {
            if index < target {
                let mut state = robot.state;
                state.velocity = Vec2::ZERO;
                robots.insert(robot.id, state);
            } else {
                pool.push(robot.id);
            }
        }

        let deficit = target.saturating_sub(observed.len());
        for _ in 0..deficit {
            let Some(id) = pool.pop() else {
                tracing::debug!(
                    target: "gc_bridge::reconcile",
                    team = %color,
                    missing = target - robots.len(),
                    "reconcile.pool_exhausted"
                );
                break;
            };
            robots.insert(id, RobotState::at(spawn));
        }

        robots
    }
}
