mod common;

use common::{referee_output, FakeController, FakeReply};
use gc_bridge::{CiError, GameControllerBridge};
use gc_proto::ssl_gc::{self, change};
use gc_proto::{CommandKind, ManualOverride, TeamColor};

fn connected_bridge(
    script: Vec<FakeReply>,
) -> anyhow::Result<(GameControllerBridge, FakeController)> {
    let fake = FakeController::start(script)?;
    let mut bridge = GameControllerBridge::new(common::loopback_config())?;
    bridge.connect_ci_at(fake.addr())?;
    Ok((bridge, fake))
}

#[test]
fn command_round_trip() -> anyhow::Result<()> {
    let (mut bridge, fake) = connected_bridge(vec![FakeReply::Outputs(vec![
        referee_output(7),
        referee_output(8),
    ])])?;

    let outputs = bridge.send_command(CommandKind::Stop, TeamColor::Yellow, None)?;
    assert_eq!(outputs, vec![referee_output(7), referee_output(8)]);

    let request = fake.next_request()?;
    assert!(request.timestamp.is_some());
    assert_eq!(request.api_inputs.len(), 1);
    let Some(change::Change::NewCommandChange(new_command)) = request.api_inputs[0]
        .change
        .as_ref()
        .and_then(|c| c.change.clone())
    else {
        panic!("expected a new command change");
    };
    let command = new_command.command.expect("command");
    assert_eq!(command.r#type(), ssl_gc::command::Type::Stop);
    assert_eq!(command.for_team(), ssl_gc::Team::Yellow);

    bridge.shutdown()?;
    Ok(())
}

#[test]
fn malformed_replies_are_retried() -> anyhow::Result<()> {
    let (mut bridge, fake) =
        connected_bridge(vec![FakeReply::Garbage, FakeReply::Garbage])?;

    let outputs = bridge.send_command(CommandKind::Halt, TeamColor::Blue, None)?;
    assert_eq!(outputs, vec![referee_output(3)]);

    let first = fake.next_request()?;
    assert_eq!(fake.next_request()?.api_inputs, first.api_inputs);
    assert_eq!(fake.next_request()?.api_inputs, first.api_inputs);
    assert_eq!(fake.pending_requests(), 0);

    bridge.shutdown()?;
    Ok(())
}

#[test]
fn retries_stop_at_the_configured_bound() -> anyhow::Result<()> {
    let fake = FakeController::start(vec![FakeReply::Garbage, FakeReply::Garbage])?;
    let mut bridge = GameControllerBridge::new(gc_bridge::BridgeConfig {
        ci_max_attempts: Some(2),
        ..common::loopback_config()
    })?;
    bridge.connect_ci_at(fake.addr())?;

    let result = bridge.send_command(CommandKind::Halt, TeamColor::Blue, None);
    assert!(matches!(
        result,
        Err(CiError::RetriesExhausted { attempts: 2, .. })
    ));

    bridge.shutdown()?;
    Ok(())
}

#[test]
fn queued_overrides_are_sent_in_order() -> anyhow::Result<()> {
    let (mut bridge, fake) = connected_bridge(Vec::new())?;
    let queue = bridge.override_queue();
    queue.push(ManualOverride::new(CommandKind::Halt, TeamColor::Blue));
    queue.push(
        ManualOverride::new(CommandKind::BallPlacement, TeamColor::Yellow)
            .with_placement(1.5, -0.5),
    );

    assert_eq!(bridge.refresh()?, 2);
    assert!(queue.is_empty());

    let halt = fake.next_request()?;
    assert_eq!(halt.api_inputs.len(), 1);

    let placement = fake.next_request()?;
    assert_eq!(placement.api_inputs.len(), 3);
    let Some(change::Change::SetBallPlacementPosChange(position)) = placement.api_inputs[1]
        .change
        .as_ref()
        .and_then(|c| c.change.clone())
    else {
        panic!("expected a placement position");
    };
    assert_eq!(
        position.pos,
        Some(ssl_gc::Vector2 {
            x: Some(1.5),
            y: Some(-0.5),
        })
    );
    let action = placement.api_inputs[2]
        .continue_action
        .as_ref()
        .expect("continue action");
    assert_eq!(
        action.r#type(),
        ssl_gc::continue_action::Type::BallPlacementStart
    );
    assert_eq!(action.for_team(), ssl_gc::Team::Yellow);

    assert_eq!(bridge.refresh()?, 0);
    assert_eq!(fake.pending_requests(), 0);

    bridge.shutdown()?;
    Ok(())
}

#[test]
fn reset_team_info_resets_both_teams_and_the_match() -> anyhow::Result<()> {
    let (mut bridge, fake) = connected_bridge(Vec::new())?;
    bridge.reset_team_info(ssl_gc::Division::DivA)?;

    let request = fake.next_request()?;
    assert_eq!(request.api_inputs.len(), 3);
    assert!(request
        .api_inputs
        .iter()
        .all(|input| input.reset_match == Some(true)));

    let changes: Vec<_> = request
        .api_inputs
        .iter()
        .filter_map(|input| input.change.as_ref().and_then(|c| c.change.clone()))
        .collect();
    let [change::Change::UpdateTeamStateChange(blue), change::Change::UpdateTeamStateChange(yellow), change::Change::UpdateConfigChange(game)] =
        changes.as_slice()
    else {
        panic!("unexpected reset changes: {changes:?}");
    };
    assert_eq!(blue.team_name.as_deref(), Some("BLUE"));
    assert_eq!(blue.for_team(), ssl_gc::Team::Blue);
    assert_eq!(yellow.team_name.as_deref(), Some("YELLOW"));
    assert_eq!(yellow.timeouts_left, Some(4));
    assert_eq!(yellow.timeout_time_left.as_deref(), Some("05:00"));
    assert_eq!(game.division(), ssl_gc::Division::DivA);
    assert_eq!(game.first_kickoff_team(), ssl_gc::Team::Blue);
    assert_eq!(game.match_type(), ssl_gc::MatchType::Friendly);

    bridge.shutdown()?;
    Ok(())
}

#[test]
fn engine_config_is_sent_as_a_delta() -> anyhow::Result<()> {
    let (mut bridge, fake) = connected_bridge(Vec::new())?;
    let config = ssl_gc::Config {
        active_tracker_source: Some("sim".to_string()),
        ..Default::default()
    };
    bridge.update_engine_config(config.clone())?;

    let request = fake.next_request()?;
    assert_eq!(request.api_inputs.len(), 1);
    assert_eq!(request.api_inputs[0].config_delta, Some(config));
    assert!(request.api_inputs[0].change.is_none());

    bridge.shutdown()?;
    Ok(())
}

#[test]
fn failed_override_leaves_the_rest_queued() -> anyhow::Result<()> {
    let fake = FakeController::start(vec![FakeReply::Garbage])?;
    let mut bridge = GameControllerBridge::new(gc_bridge::BridgeConfig {
        ci_max_attempts: Some(1),
        ..common::loopback_config()
    })?;
    bridge.connect_ci_at(fake.addr())?;

    let queue = bridge.override_queue();
    queue.push(ManualOverride::new(CommandKind::Halt, TeamColor::Blue));
    queue.push(ManualOverride::new(CommandKind::Stop, TeamColor::Yellow));

    assert!(matches!(
        bridge.refresh(),
        Err(CiError::RetriesExhausted { attempts: 1, .. })
    ));
    assert_eq!(queue.len(), 1);

    // next cycle sends the survivor
    assert_eq!(bridge.refresh()?, 1);
    assert!(queue.is_empty());

    let halt = fake.next_request()?;
    let stop = fake.next_request()?;
    let command_type = |request: &ssl_gc::CiInput| match request.api_inputs[0]
        .change
        .as_ref()
        .and_then(|c| c.change.clone())
    {
        Some(change::Change::NewCommandChange(new_command)) => {
            new_command.command.map(|command| command.r#type())
        }
        _ => None,
    };
    assert_eq!(command_type(&halt), Some(ssl_gc::command::Type::Halt));
    assert_eq!(command_type(&stop), Some(ssl_gc::command::Type::Stop));

    bridge.shutdown()?;
    Ok(())
}
