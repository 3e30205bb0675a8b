use std::convert::TryFrom;
use std::fmt;

use prost::Message;
use thiserror::Error;

use crate::{sim, ssl_gc};

/// One of the two teams present in every world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TeamColor {
    Blue,
    Yellow,
}

impl TeamColor {
    pub const ALL: [TeamColor; 2] = [TeamColor::Blue, TeamColor::Yellow];

    pub fn opponent(self) -> Self {
        match self {
            TeamColor::Blue => TeamColor::Yellow,
            TeamColor::Yellow => TeamColor::Blue,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TeamColor::Blue => "BLUE",
            TeamColor::Yellow => "YELLOW",
        }
    }
}

impl fmt::Display for TeamColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<TeamColor> for ssl_gc::Team {
    fn from(value: TeamColor) -> Self {
        match value {
            TeamColor::Blue => ssl_gc::Team::Blue,
            TeamColor::Yellow => ssl_gc::Team::Yellow,
        }
    }
}

impl TryFrom<i32> for TeamColor {
    type Error = OverrideDecodeError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match ssl_gc::Team::try_from(value) {
            Ok(ssl_gc::Team::Blue) => Ok(TeamColor::Blue),
            Ok(ssl_gc::Team::Yellow) => Ok(TeamColor::Yellow),
            _ => Err(OverrideDecodeError::InvalidEnum {
                field: "Command.for_team",
                value,
            }),
        }
    }
}

/// Controller commands an operator may issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Halt,
    Stop,
    NormalStart,
    ForceStart,
    Direct,
    Kickoff,
    Penalty,
    Timeout,
    BallPlacement,
}

impl From<CommandKind> for ssl_gc::command::Type {
    fn from(value: CommandKind) -> Self {
        match value {
            CommandKind::Halt => ssl_gc::command::Type::Halt,
            CommandKind::Stop => ssl_gc::command::Type::Stop,
            CommandKind::NormalStart => ssl_gc::command::Type::NormalStart,
            CommandKind::ForceStart => ssl_gc::command::Type::ForceStart,
            CommandKind::Direct => ssl_gc::command::Type::Direct,
            CommandKind::Kickoff => ssl_gc::command::Type::Kickoff,
            CommandKind::Penalty => ssl_gc::command::Type::Penalty,
            CommandKind::Timeout => ssl_gc::command::Type::Timeout,
            CommandKind::BallPlacement => ssl_gc::command::Type::BallPlacement,
        }
    }
}

impl TryFrom<i32> for CommandKind {
    type Error = OverrideDecodeError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match ssl_gc::command::Type::try_from(value) {
            Ok(ssl_gc::command::Type::Halt) => Ok(CommandKind::Halt),
            Ok(ssl_gc::command::Type::Stop) => Ok(CommandKind::Stop),
            Ok(ssl_gc::command::Type::NormalStart) => Ok(CommandKind::NormalStart),
            Ok(ssl_gc::command::Type::ForceStart) => Ok(CommandKind::ForceStart),
            Ok(ssl_gc::command::Type::Direct) => Ok(CommandKind::Direct),
            Ok(ssl_gc::command::Type::Kickoff) => Ok(CommandKind::Kickoff),
            Ok(ssl_gc::command::Type::Penalty) => Ok(CommandKind::Penalty),
            Ok(ssl_gc::command::Type::Timeout) => Ok(CommandKind::Timeout),
            Ok(ssl_gc::command::Type::BallPlacement) => Ok(CommandKind::BallPlacement),
            _ => Err(OverrideDecodeError::InvalidEnum {
                field: "Command.type",
                value,
            }),
        }
    }
}

/// Ball placement target in field coordinates (meters).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementPoint {
    pub x: f64,
    pub y: f64,
}

/// Operator-issued command waiting to be forwarded to the controller.
///
/// `placement` is only present when the operator explicitly chose a ball
/// placement target; the origin is a valid target and is not treated as
/// "unset".
#[derive(Debug, Clone, PartialEq)]
pub struct ManualOverride {
    pub command: CommandKind,
    pub team: TeamColor,
    pub placement: Option<PlacementPoint>,
}

/// Error returned when decoding a manual command fails.
#[derive(Debug, Error)]
pub enum OverrideDecodeError {
    #[error("decode failed: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("manual command missing controller command")]
    MissingCommand,
    #[error("invalid enum value {value} for {field}")]
    InvalidEnum { field: &'static str, value: i32 },
}

impl ManualOverride {
    pub fn new(command: CommandKind, team: TeamColor) -> Self {
        Self {
            command,
            team,
            placement: None,
        }
    }

    pub fn with_placement(mut self, x: f64, y: f64) -> Self {
        self.placement = Some(PlacementPoint { x, y });
        self
    }

    /// Decode an override from a protobuf binary frame.
    pub fn decode(bytes: &[u8]) -> Result<Self, OverrideDecodeError> {
        let proto = sim::ManualGcCommand::decode(bytes)?;
        Self::try_from_proto(proto)
    }

    pub fn encode_to_vec(&self) -> Vec<u8> {
        self.to_proto().encode_to_vec()
    }

    pub fn to_proto(&self) -> sim::ManualGcCommand {
        let mut command = ssl_gc::Command::default();
        command.set_type(self.command.into());
        command.set_for_team(self.team.into());

        sim::ManualGcCommand {
            manual_command: Some(command),
            final_ball_placement_point: self.placement.map(|point| sim::Point {
                x_meters: point.x,
                y_meters: point.y,
            }),
        }
    }

    pub fn try_from_proto(proto: sim::ManualGcCommand) -> Result<Self, OverrideDecodeError> {
        let command = proto
            .manual_command
            .ok_or(OverrideDecodeError::MissingCommand)?;
        let kind = CommandKind::try_from(command.r#type.unwrap_or_default())?;
        let team = TeamColor::try_from(command.for_team.unwrap_or_default())?;
        let placement = proto
            .final_ball_placement_point
            .map(|point| PlacementPoint {
                x: point.x_meters,
                y: point.y_meters,
            });

        Ok(Self {
            command: kind,
            team,
            placement,
        })
    }
}
