//! Time-delayed playback of server snapshots for remote entities

use std::collections::VecDeque;

use glam::Vec2;

use crate::game::snapshot::{BallSnapshot, PlayerSnapshot, WorldSnapshot};
use crate::game::world::PlayerId;

use super::prediction::PredictedBody;

pub const RENDER_DELAY_MS: f64 = 50.0;
pub const RETENTION_MS: f64 = 2000.0;
pub const EXTRAPOLATION_CAP_MS: f64 = 90.0;

#[derive(Debug, Clone)]
struct Received {
    recv_ms: f64,
    state: WorldSnapshot,
}

/// Recent snapshots ordered by server time
#[derive(Debug, Clone)]
pub struct SnapshotBuffer {
    snaps: VecDeque<Received>,
    pub render_delay_ms: f64,
    pub retention_ms: f64,
    pub extrapolation_cap_ms: f64,
}

impl Default for SnapshotBuffer {
    fn default() -> Self {
        Self {
            snaps: VecDeque::new(),
            render_delay_ms: RENDER_DELAY_MS,
            retention_ms: RETENTION_MS,
            extrapolation_cap_ms: EXTRAPOLATION_CAP_MS,
        }
    }
}

impl SnapshotBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.snaps.clear();
    }

    pub fn len(&self) -> usize {
        self.snaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snaps.is_empty()
    }

    pub fn latest(&self) -> Option<&WorldSnapshot> {
        self.snaps.back().map(|r| &r.state)
    }

    /// Store a snapshot received at local time `recv_ms`.
    ///
    /// Snapshots older than the newest one held are dropped; a snapshot for
    /// the same server instant replaces the stored one.
    pub fn push(&mut self, state: WorldSnapshot, recv_ms: f64) {
        match self.snaps.back() {
            Some(last) if state.now_ms < last.state.now_ms => return,
            Some(last) if state.now_ms == last.state.now_ms => {
                self.snaps.pop_back();
            }
            _ => {}
        }
        self.snaps.push_back(Received { recv_ms, state });

        let cutoff = recv_ms - self.retention_ms;
        while self.snaps.len() > 1 && self.snaps.front().is_some_and(|r| r.recv_ms < cutoff) {
            self.snaps.pop_front();
        }
    }

    /// Server time to render at local time `local_now_ms`: the newest
    /// snapshot's clock advanced by local time since it arrived, minus the delay
    pub fn render_time(&self, local_now_ms: f64) -> Option<f64> {
        let latest = self.snaps.back()?;
        let since = (local_now_ms - latest.recv_ms).max(0.0);
        Some(latest.state.now_ms + since - self.render_delay_ms)
    }

    /// Build the world to draw at `local_now_ms`.
    ///
    /// Remote players and a free ball are blended between the two snapshots
    /// bracketing the render time, or pushed forward along their velocity
    /// for a short while when the render time has passed the newest snapshot.
    /// `local` replaces the controlled player's kinematics with its prediction.
    pub fn sample(
        &self,
        local_now_ms: f64,
        local: Option<(PlayerId, PredictedBody)>,
    ) -> Option<WorldSnapshot> {
        let target = self.render_time(local_now_ms)?;
        let latest = &self.snaps.back()?.state;

        let mut frame = if target > latest.now_ms {
            let ahead = (target - latest.now_ms).min(self.extrapolation_cap_ms);
            extrapolate(latest, ahead)
        } else {
            let (a, b) = self.bracket(target);
            let span = b.now_ms - a.now_ms;
            let t = if span > 0.0 {
                ((target - a.now_ms) / span).clamp(0.0, 1.0) as f32
            } else {
                0.0
            };
            blend(a, b, t)
        };

        if let Some((me, body)) = local {
            if let Some(p) = frame.players.iter_mut().find(|p| p.id == me) {
                p.x = body.pos.x;
                p.y = body.pos.y;
                p.vx = body.vel.x;
                p.vy = body.vel.y;
            }
        }
        pin_held_ball(&mut frame);
        Some(frame)
    }

    fn bracket(&self, target: f64) -> (&WorldSnapshot, &WorldSnapshot) {
        let snaps = &self.snaps;
        match snaps.iter().rposition(|r| r.state.now_ms <= target) {
            Some(i) => {
                let j = (i + 1).min(snaps.len() - 1);
                (&snaps[i].state, &snaps[j].state)
            }
            // earlier than anything held: show the oldest
            None => (&snaps[0].state, &snaps[0].state),
        }
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn blend_player(a: &PlayerSnapshot, b: &PlayerSnapshot, t: f32) -> PlayerSnapshot {
    PlayerSnapshot {
        x: lerp(a.x, b.x, t),
        y: lerp(a.y, b.y, t),
        vx: lerp(a.vx, b.vx, t),
        vy: lerp(a.vy, b.vy, t),
        aim_x: lerp(a.aim_x, b.aim_x, t),
        aim_y: lerp(a.aim_y, b.aim_y, t),
        aim_charge: lerp(a.aim_charge, b.aim_charge, t),
        ..b.clone()
    }
}

fn blend(a: &WorldSnapshot, b: &WorldSnapshot, t: f32) -> WorldSnapshot {
    let mut players: Vec<PlayerSnapshot> = b
        .players
        .iter()
        .map(|pb| match a.player(pb.id) {
            Some(pa) => blend_player(pa, pb, t),
            None => pb.clone(),
        })
        .collect();
    players.extend(
        a.players
            .iter()
            .filter(|pa| b.player(pa.id).is_none())
            .cloned(),
    );

    let ball = BallSnapshot {
        x: lerp(a.ball.x, b.ball.x, t),
        y: lerp(a.ball.y, b.ball.y, t),
        vx: lerp(a.ball.vx, b.ball.vx, t),
        vy: lerp(a.ball.vy, b.ball.vy, t),
        ..b.ball.clone()
    };

    WorldSnapshot {
        now_ms: a.now_ms + (b.now_ms - a.now_ms) * f64::from(t),
        players,
        ball,
        ..b.clone()
    }
}

fn extrapolate(latest: &WorldSnapshot, ahead_ms: f64) -> WorldSnapshot {
    let secs = (ahead_ms / 1000.0) as f32;
    let mut frame = latest.clone();
    frame.now_ms += ahead_ms;
    for p in &mut frame.players {
        p.x += p.vx * secs;
        p.y += p.vy * secs;
    }
    if frame.ball.held_by.is_none() {
        frame.ball.x += frame.ball.vx * secs;
        frame.ball.y += frame.ball.vy * secs;
    }
    frame
}

/// A held ball is drawn in its holder's hand
fn pin_held_ball(frame: &mut WorldSnapshot) {
    let Some(holder) = frame.ball.held_by else {
        return;
    };
    if let Some(p) = frame.player(holder) {
        let pos = Vec2::new(p.x, p.y);
        frame.ball.x = pos.x;
        frame.ball.y = pos.y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tuning::Tuning;
    use crate::game::world::World;

    fn base_world() -> World {
        let tuning = Tuning {
            bot_count: 2,
            ..Tuning::default()
        };
        World::new(tuning, 12)
    }

    /// Snapshot at `now_ms` with the first player at `x`, moving at `vx`
    fn snap(world: &World, now_ms: f64, x: f32, vx: f32) -> WorldSnapshot {
        let mut s = WorldSnapshot::capture(world);
        s.now_ms = now_ms;
        s.players[0].x = x;
        s.players[0].vx = vx;
        s.players[0].aim_charge = x / 1000.0;
        s
    }

    #[test]
    fn renders_between_bracketing_snapshots() {
        let world = base_world();
        let id = world.players[0].id;
        let mut buf = SnapshotBuffer::new();
        buf.push(snap(&world, 1000.0, 100.0, 0.0), 5000.0);
        buf.push(snap(&world, 1050.0, 200.0, 0.0), 5050.0);
        buf.push(snap(&world, 1100.0, 300.0, 0.0), 5100.0);

        // render time = 1100 + 25 - 50 = 1075, halfway between the last two
        let frame = buf.sample(5125.0, None).unwrap();
        let p = frame.player(id).unwrap();
        assert!((p.x - 250.0).abs() < 1e-3);
        assert!((p.aim_charge - 0.25).abs() < 1e-4);
        assert!((frame.now_ms - 1075.0).abs() < 1e-6);
    }

    #[test]
    fn extrapolation_is_capped() {
        let world = base_world();
        let id = world.players[0].id;
        let mut buf = SnapshotBuffer::new();
        buf.push(snap(&world, 1000.0, 100.0, 100.0), 5000.0);

        // 60 ms late: 10 ms ahead of the snapshot
        let p = buf.sample(5060.0, None).unwrap().player(id).cloned().unwrap();
        assert!((p.x - 101.0).abs() < 1e-3);

        // far too late: capped at 90 ms
        let p = buf.sample(9000.0, None).unwrap().player(id).cloned().unwrap();
        assert!((p.x - 109.0).abs() < 1e-3);
    }

    #[test]
    fn old_snapshots_age_out_and_stale_ones_are_ignored() {
        let world = base_world();
        let mut buf = SnapshotBuffer::new();
        for i in 0..10 {
            buf.push(snap(&world, 1000.0 + 50.0 * i as f64, 0.0, 0.0), 1000.0 + 500.0 * i as f64);
        }
        // received at 1000..5500; retention keeps recv >= 3500
        assert_eq!(buf.len(), 5);

        buf.push(snap(&world, 10.0, 0.0, 0.0), 6000.0);
        assert_eq!(buf.latest().unwrap().now_ms, 1450.0);
    }

    #[test]
    fn local_player_uses_prediction_and_carries_ball() {
        let world = base_world();
        let it = world.it_id().unwrap();
        let mut buf = SnapshotBuffer::new();
        let mut s = WorldSnapshot::capture(&world);
        s.now_ms = 500.0;
        buf.push(s, 100.0);

        let body = PredictedBody {
            pos: Vec2::new(640.0, 200.0),
            vel: Vec2::new(5.0, 0.0),
        };
        let frame = buf.sample(150.0, Some((it, body))).unwrap();
        let me = frame.player(it).unwrap();
        assert_eq!((me.x, me.y), (640.0, 200.0));
        assert_eq!(frame.ball.held_by, Some(it));
        assert_eq!((frame.ball.x, frame.ball.y), (640.0, 200.0));
    }

    #[test]
    fn empty_buffer_renders_nothing() {
        assert!(SnapshotBuffer::new().sample(0.0, None).is_none());
    }
}
