//! Human input records and the movement integration shared with client prediction

use glam::Vec2;

use super::physics::{safe_normalize, PhysicsSystem};
use super::tuning::Tuning;

/// Directional intent flags for one input sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionalInput {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl DirectionalInput {
    /// Unit intent vector; zero when no key (or opposing keys) are held
    pub fn vector(&self) -> Vec2 {
        let mut v = Vec2::ZERO;
        if self.up {
            v.y -= 1.0;
        }
        if self.down {
            v.y += 1.0;
        }
        if self.left {
            v.x -= 1.0;
        }
        if self.right {
            v.x += 1.0;
        }
        safe_normalize(v, Vec2::ZERO)
    }

    pub fn any(&self) -> bool {
        self.up || self.down || self.left || self.right
    }
}

/// One validated input sample from a human client
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputFrame {
    pub seq: u32,
    pub dirs: DirectionalInput,
    /// Aim point in arena coordinates; `None` aims along the facing direction
    pub aim: Option<Vec2>,
    pub mouse_down: bool,
    pub space_down: bool,
    /// Client send time, echoed back and never used for ordering
    pub client_time: f64,
}

impl InputFrame {
    pub fn charging(&self) -> bool {
        self.mouse_down || self.space_down
    }
}

/// Buffered remote input plus the edge-detection state for throw charging
#[derive(Debug, Clone, Default)]
pub struct HumanControl {
    pub input: InputFrame,
    pub was_mouse_down: bool,
    pub was_space_down: bool,
    pub mouse_down_at: f64,
    pub space_down_at: f64,
    /// Simulation time the connection dropped, if it has
    pub disconnected_at: Option<f64>,
}

impl HumanControl {
    /// Accept `frame` only if its sequence number is newer than the last one.
    pub fn accept(&mut self, frame: InputFrame) -> bool {
        if frame.seq <= self.input.seq {
            return false;
        }
        self.input = frame;
        true
    }

    /// Drop held keys and buttons, keeping the sequence high-water mark
    pub fn release_all(&mut self) {
        self.input = InputFrame {
            seq: self.input.seq,
            aim: self.input.aim,
            client_time: self.input.client_time,
            ..InputFrame::default()
        };
    }

    pub fn is_connected(&self) -> bool {
        self.disconnected_at.is_none()
    }
}

/// Advance a human-controlled body by one step of directional input.
///
/// This is the exact integration the server runs, so client prediction
/// calls it too. Bounds and obstacles are applied by the caller.
pub fn integrate_directional(
    pos: &mut Vec2,
    vel: &mut Vec2,
    dirs: DirectionalInput,
    dt: f32,
    tuning: &Tuning,
) {
    let desired = dirs.vector() * tuning.human_speed;
    steer_velocity(pos, vel, desired, tuning.human_response, dt, tuning.friction);
}

/// Ease velocity toward `desired`, move, then apply friction.
pub fn steer_velocity(pos: &mut Vec2, vel: &mut Vec2, desired: Vec2, response: f32, dt: f32, friction: f32) {
    *vel = vel.lerp(desired, PhysicsSystem::response(response, dt));
    *pos += *vel * dt;
    *vel *= PhysicsSystem::friction(friction, dt);
}
