//! Builders for the API inputs carried by a CI request.
//!
//! Every function here is pure: it returns protobuf values and performs no
//! I/O. [`ci_input`] stamps a list of inputs with the current time.

use std::time::{SystemTime, UNIX_EPOCH};

use gc_proto::ssl_gc::{self, change, continue_action};
use gc_proto::{CommandKind, ManualOverride, PlacementPoint, TeamColor};

pub const DEFAULT_TIMEOUTS_LEFT: i32 = 4;
pub const DEFAULT_TIMEOUT_TIME_LEFT: &str = "05:00";

fn change_input(change: change::Change) -> ssl_gc::Input {
    ssl_gc::Input {
        change: Some(ssl_gc::Change {
            change: Some(change),
        }),
        ..Default::default()
    }
}

/// A single "new command" change for `team`.
pub fn new_command(command: CommandKind, team: TeamColor) -> ssl_gc::Input {
    let mut gc_command = ssl_gc::Command::default();
    gc_command.set_type(command.into());
    gc_command.set_for_team(team.into());

    change_input(change::Change::NewCommandChange(change::NewCommand {
        command: Some(gc_command),
    }))
}

pub fn set_ball_placement_pos(point: PlacementPoint) -> ssl_gc::Input {
    change_input(change::Change::SetBallPlacementPosChange(
        change::SetBallPlacementPos {
            pos: Some(ssl_gc::Vector2 {
                x: Some(point.x as f32),
                y: Some(point.y as f32),
            }),
        },
    ))
}

pub fn start_ball_placement(team: TeamColor) -> ssl_gc::Input {
    let mut action = ssl_gc::ContinueAction::default();
    action.set_type(continue_action::Type::BallPlacementStart);
    action.set_for_team(team.into());

    ssl_gc::Input {
        continue_action: Some(action),
        ..Default::default()
    }
}

/// Inputs for a command, followed by the placement position and the
/// placement start when a target point is given.
pub fn command_inputs(
    command: CommandKind,
    team: TeamColor,
    placement: Option<PlacementPoint>,
) -> Vec<ssl_gc::Input> {
    let mut inputs = vec![new_command(command, team)];
    if let Some(point) = placement {
        inputs.push(set_ball_placement_pos(point));
        inputs.push(start_ball_placement(team));
    }
    inputs
}

pub fn override_inputs(item: &ManualOverride) -> Vec<ssl_gc::Input> {
    command_inputs(item.command, item.team, item.placement)
}

/// Team state as it is at the start of a match.
pub fn team_reset(name: &str, team: TeamColor) -> change::UpdateTeamState {
    let mut update = change::UpdateTeamState {
        team_name: Some(name.to_string()),
        goals: Some(0),
        timeouts_left: Some(DEFAULT_TIMEOUTS_LEFT),
        timeout_time_left: Some(DEFAULT_TIMEOUT_TIME_LEFT.to_string()),
        can_place_ball: Some(true),
        ..Default::default()
    };
    update.set_for_team(team.into());
    update
}

/// Match configuration for a friendly game in `division` with blue kicking off.
pub fn game_reset(division: ssl_gc::Division) -> change::UpdateConfig {
    let mut update = change::UpdateConfig::default();
    update.set_division(division);
    update.set_first_kickoff_team(ssl_gc::Team::Blue);
    update.set_match_type(ssl_gc::MatchType::Friendly);
    update
}

/// Blue team reset, yellow team reset and game reset, each resetting the match.
pub fn reset_team_info_inputs(division: ssl_gc::Division) -> Vec<ssl_gc::Input> {
    let resetting = |change: change::Change| ssl_gc::Input {
        reset_match: Some(true),
        ..change_input(change)
    };

    vec![
        resetting(change::Change::UpdateTeamStateChange(team_reset(
            TeamColor::Blue.name(),
            TeamColor::Blue,
        ))),
        resetting(change::Change::UpdateTeamStateChange(team_reset(
            TeamColor::Yellow.name(),
            TeamColor::Yellow,
        ))),
        resetting(change::Change::UpdateConfigChange(game_reset(division))),
    ]
}

pub fn engine_config_update(config: ssl_gc::Config) -> ssl_gc::Input {
    ssl_gc::Input {
        config_delta: Some(config),
        ..Default::default()
    }
}

pub fn ci_input_at(timestamp_ns: i64, api_inputs: Vec<ssl_gc::Input>) -> ssl_gc::CiInput {
    ssl_gc::CiInput {
        timestamp: Some(timestamp_ns),
        api_inputs,
    }
}

pub fn ci_input(api_inputs: Vec<ssl_gc::Input>) -> ssl_gc::CiInput {
    let now_ns = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0);
    ci_input_at(now_ns, api_inputs)
}
