//! Text commands typed by an operator, e.g. `kickoff blue` or
//! `place yellow 1.0 -2.5`.

use gc_proto::{CommandKind, ManualOverride, TeamColor};

/// Parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Override(ManualOverride),
    Quit,
}

pub fn parse_console_line(input: &str) -> Option<ConsoleCommand> {
    let mut parts = input.split_whitespace();
    let keyword = parts.next()?;

    let neutral = |kind| {
        Some(ConsoleCommand::Override(ManualOverride::new(
            kind,
            TeamColor::Blue,
        )))
    };

    match keyword {
        "quit" | "exit" => Some(ConsoleCommand::Quit),
        "halt" => neutral(CommandKind::Halt),
        "stop" => neutral(CommandKind::Stop),
        "force" => neutral(CommandKind::ForceStart),
        "normal" => neutral(CommandKind::NormalStart),
        "kickoff" | "direct" | "penalty" | "timeout" => {
            let team = parse_team(parts.next()?)?;
            let kind = match keyword {
                "kickoff" => CommandKind::Kickoff,
                "direct" => CommandKind::Direct,
                "penalty" => CommandKind::Penalty,
                _ => CommandKind::Timeout,
            };
            Some(ConsoleCommand::Override(ManualOverride::new(kind, team)))
        }
        "place" => {
            let team = parse_team(parts.next()?)?;
            let x: f64 = parts.next()?.parse().ok()?;
            let y: f64 = parts.next()?.parse().ok()?;
            Some(ConsoleCommand::Override(
                ManualOverride::new(CommandKind::BallPlacement, team).with_placement(x, y),
            ))
        }
        _ => None,
    }
}

fn parse_team(token: &str) -> Option<TeamColor> {
    match token.to_ascii_lowercase().as_str() {
        "blue" | "b" => Some(TeamColor::Blue),
        "yellow" | "y" => Some(TeamColor::Yellow),
        _ => None,
    }
}
