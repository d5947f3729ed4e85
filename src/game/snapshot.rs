//! Full-world snapshots for network transmission

use serde::{Deserialize, Serialize};

use super::physics::Rect;
use super::world::{InvariantViolation, Player, PlayerId, World};

/// Complete, self-sufficient view of the world at one simulation instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub now_ms: f64,
    pub arena_w: f32,
    pub arena_h: f32,
    pub player_radius: f32,
    pub ball_radius: f32,
    pub over: bool,
    pub winner_id: Option<PlayerId>,
    pub obstacles: Vec<Rect>,
    pub ball: BallSnapshot,
    pub players: Vec<PlayerSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallSnapshot {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub held_by: Option<PlayerId>,
    pub last_thrower: Option<PlayerId>,
    pub armed: bool,
    pub thrown_at: f64,
}

/// Player projection sent to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub human: bool,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub it: bool,
    /// Cumulative time spent as IT
    pub furry_ms: f64,
    pub score: f32,
    /// Throw wind-up telemetry
    pub aiming: bool,
    pub aim_charge: f32,
    pub aim_x: f32,
    pub aim_y: f32,
    pub disconnected: bool,
    /// Last accepted input sequence, for client reconciliation
    pub last_seq: u32,
    /// Client send time of that input, echoed back
    pub last_client_time: f64,
}

impl PlayerSnapshot {
    fn of(p: &Player) -> Self {
        let human = p.human();
        Self {
            id: p.id,
            name: p.name.clone(),
            human: human.is_some(),
            x: p.pos.x,
            y: p.pos.y,
            vx: p.vel.x,
            vy: p.vel.y,
            it: p.is_it,
            furry_ms: p.furry_ms,
            score: p.score,
            aiming: p.telegraph.aiming,
            aim_charge: p.telegraph.charge,
            aim_x: p.telegraph.target.x,
            aim_y: p.telegraph.target.y,
            disconnected: p.is_disconnected(),
            last_seq: p.last_seq(),
            last_client_time: human.map_or(0.0, |h| h.input.client_time),
        }
    }
}

impl WorldSnapshot {
    pub fn capture(world: &World) -> Self {
        let ball = &world.ball;
        Self {
            now_ms: world.now_ms,
            arena_w: world.tuning.arena_w,
            arena_h: world.tuning.arena_h,
            player_radius: world.tuning.player_radius,
            ball_radius: world.tuning.ball_radius,
            over: world.over,
            winner_id: world.winner_id,
            obstacles: world.obstacles.clone(),
            ball: BallSnapshot {
                x: ball.pos.x,
                y: ball.pos.y,
                vx: ball.vel.x,
                vy: ball.vel.y,
                held_by: ball.held_by,
                last_thrower: ball.last_thrower,
                armed: ball.armed,
                thrown_at: ball.thrown_at,
            },
            players: world.players.iter().map(PlayerSnapshot::of).collect(),
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerSnapshot> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn it_id(&self) -> Option<PlayerId> {
        self.players.iter().find(|p| p.it).map(|p| p.id)
    }

    /// The same structural checks the simulation runs, from snapshot data alone
    pub fn invariant_violation(&self) -> Option<InvariantViolation> {
        if self.players.is_empty() {
            return None;
        }
        let it_count = self.players.iter().filter(|p| p.it).count();
        if it_count != 1 {
            return Some(InvariantViolation::ItCount(it_count));
        }
        let it = self.it_id();
        if let Some(holder) = self.ball.held_by {
            if Some(holder) != it {
                return Some(InvariantViolation::BallHolder { holder, it });
            }
        }
        let r = self.player_radius - 1e-3;
        self.players
            .iter()
            .find(|p| p.x < r || p.y < r || p.x > self.arena_w - r || p.y > self.arena_h - r)
            .map(|p| InvariantViolation::OutOfBounds(p.id))
    }
}
