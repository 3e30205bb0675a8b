#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, UdpSocket};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver};
use gc_bridge::BridgeConfig;
use gc_proto::ssl_gc::{referee::TeamInfo, CiInput, CiOutput, Referee};
use gc_proto::{decode_frames, encode_frame, sim, Message};

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Bridge config whose referee listener binds loopback unicast, so tests do
/// not depend on multicast routing.
pub fn loopback_config() -> BridgeConfig {
    BridgeConfig {
        referee_group: Ipv4Addr::LOCALHOST,
        listener_poll_ms: 10,
        launch_delay_ms: 0,
        ci_read_timeout_ms: Some(5_000),
        ..BridgeConfig::default()
    }
}

pub enum FakeReply {
    Garbage,
    Outputs(Vec<CiOutput>),
}

pub fn referee_output(counter: u32) -> CiOutput {
    CiOutput {
        referee_msg: Some(Referee {
            command_counter: Some(counter),
            ..Default::default()
        }),
    }
}

/// Single-connection stand-in for the controller's CI port. Every request
/// is recorded. Replies follow the script, then fall back to one output
/// carrying the request number.
pub struct FakeController {
    addr: SocketAddr,
    requests: Receiver<CiInput>,
}

impl FakeController {
    pub fn start(script: Vec<FakeReply>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        let (sender, requests) = unbounded();
        let mut script: VecDeque<FakeReply> = script.into();

        thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let mut pending = Vec::new();
            let mut chunk = [0u8; 4096];
            let mut served = 0u32;
            loop {
                let read = match stream.read(&mut chunk) {
                    Ok(0) | Err(_) => return,
                    Ok(read) => read,
                };
                pending.extend_from_slice(&chunk[..read]);
                let Ok(frames) = decode_frames::<CiInput>(&pending) else {
                    return;
                };
                pending.drain(..frames.consumed);

                for request in frames.messages {
                    served += 1;
                    if sender.send(request).is_err() {
                        return;
                    }
                    let reply = match script.pop_front() {
                        // length 2, then a field with wire type 7
                        Some(FakeReply::Garbage) => vec![0x02, 0x0f, 0x00],
                        Some(FakeReply::Outputs(outputs)) => outputs
                            .iter()
                            .flat_map(|output| encode_frame(output))
                            .collect(),
                        None => encode_frame(&referee_output(served)),
                    };
                    if stream.write_all(&reply).is_err() {
                        return;
                    }
                }
            }
        });

        Ok(Self { addr, requests })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn next_request(&self) -> anyhow::Result<CiInput> {
        Ok(self.requests.recv_timeout(TIMEOUT)?)
    }

    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }
}

pub fn send_referee(port: u16, referee: &Referee) -> anyhow::Result<()> {
    let socket = UdpSocket::bind("127.0.0.1:0")?;
    socket.send_to(&referee.encode_to_vec(), (Ipv4Addr::LOCALHOST, port))?;
    Ok(())
}

pub fn referee(blue: u32, yellow: u32, blue_on_positive_half: bool) -> Referee {
    Referee {
        command_counter: Some(1),
        blue: Some(TeamInfo {
            max_allowed_bots: Some(blue),
            ..Default::default()
        }),
        yellow: Some(TeamInfo {
            max_allowed_bots: Some(yellow),
            ..Default::default()
        }),
        blue_team_on_positive_half: Some(blue_on_positive_half),
        ..Default::default()
    }
}

pub fn robot(id: u32, x: f64, y: f64) -> sim::Robot {
    sim::Robot {
        id,
        current_state: Some(sim::RobotState {
            global_position: Some(sim::Point {
                x_meters: x,
                y_meters: y,
            }),
            global_orientation: Some(sim::Angle { radians: 0.0 }),
            global_velocity: Some(sim::Vector {
                x_component_meters: 1.0,
                y_component_meters: -1.0,
            }),
            global_angular_velocity: None,
        }),
    }
}

pub fn world(blue: Vec<sim::Robot>, yellow: Vec<sim::Robot>) -> sim::World {
    sim::World {
        field: Some(sim::Field {
            field_x_length: 9.0,
            field_y_length: 6.0,
            boundary_buffer_size: 0.3,
        }),
        friendly_team: Some(sim::Team { team_robots: blue }),
        enemy_team: Some(sim::Team { team_robots: yellow }),
    }
}
