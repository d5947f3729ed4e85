//! Local-player prediction and server reconciliation
//!
//! Every sent input is applied to a predicted body right away and kept in a
//! pending list. When a snapshot acknowledges input `n`, the body is reset to
//! the authoritative state and every pending input after `n` is replayed.
//! Replay is a pure function of the base state and the pending list, so
//! reconciling twice against the same snapshot lands in the same place.

use std::collections::VecDeque;

use glam::Vec2;

use crate::game::input::{integrate_directional, DirectionalInput};
use crate::game::snapshot::WorldSnapshot;
use crate::game::tuning::Tuning;
use crate::game::world::PlayerId;

/// Step used for the first input, or when two inputs share a timestamp
pub const FIRST_STEP_SECS: f32 = 0.02;
pub const MAX_STEP_SECS: f32 = 0.05;

/// An input sent to the server but not yet acknowledged
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingInput {
    pub seq: u32,
    /// Local send time in milliseconds
    pub sent_at_ms: f64,
    pub dirs: DirectionalInput,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictedBody {
    pub pos: Vec2,
    pub vel: Vec2,
}

#[derive(Debug, Clone)]
pub struct Predictor {
    tuning: Tuning,
    pending: VecDeque<PendingInput>,
    predicted: Option<PredictedBody>,
    last_input_at: Option<f64>,
    acked_seq: u32,
}

impl Predictor {
    pub fn new(tuning: Tuning) -> Self {
        Self {
            tuning,
            pending: VecDeque::new(),
            predicted: None,
            last_input_at: None,
            acked_seq: 0,
        }
    }

    /// Forget everything, e.g. after a fresh welcome
    pub fn reset(&mut self) {
        self.pending.clear();
        self.predicted = None;
        self.last_input_at = None;
        self.acked_seq = 0;
    }

    pub fn predicted(&self) -> Option<PredictedBody> {
        self.predicted
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingInput> {
        self.pending.iter()
    }

    pub fn acked_seq(&self) -> u32 {
        self.acked_seq
    }

    /// Record a sent input and advance the prediction by the time since the previous one
    pub fn record(&mut self, seq: u32, dirs: DirectionalInput, sent_at_ms: f64) {
        self.pending.push_back(PendingInput {
            seq,
            sent_at_ms,
            dirs,
        });

        let dt = match self.last_input_at {
            Some(prev) => step_secs(sent_at_ms - prev),
            None => FIRST_STEP_SECS,
        };
        self.last_input_at = Some(sent_at_ms);

        let center = Vec2::new(self.tuning.arena_w, self.tuning.arena_h) * 0.5;
        let body = self.predicted.unwrap_or(PredictedBody {
            pos: center,
            vel: Vec2::ZERO,
        });
        self.predicted = Some(step(body, dirs, dt, &self.tuning));
    }

    /// Correct the prediction from `state`. Returns false when the snapshot
    /// does not name `me` or acknowledges less than an earlier one did.
    pub fn reconcile(&mut self, state: &WorldSnapshot, me: PlayerId) -> bool {
        let Some(auth) = state.player(me) else {
            return false;
        };
        if auth.last_seq < self.acked_seq {
            return false;
        }
        self.acked_seq = auth.last_seq;
        self.tuning.arena_w = state.arena_w;
        self.tuning.arena_h = state.arena_h;
        self.tuning.player_radius = state.player_radius;

        while self.pending.front().is_some_and(|p| p.seq <= auth.last_seq) {
            self.pending.pop_front();
        }

        let base = PredictedBody {
            pos: Vec2::new(auth.x, auth.y),
            vel: sanitize(Vec2::new(auth.vx, auth.vy)),
        };
        self.predicted = Some(replay(base, self.pending.iter(), &self.tuning));
        true
    }
}

/// Replay `pending` on top of `base`
pub fn replay<'a>(
    base: PredictedBody,
    pending: impl IntoIterator<Item = &'a PendingInput>,
    tuning: &Tuning,
) -> PredictedBody {
    let mut body = base;
    let mut prev_at: Option<f64> = None;
    for input in pending {
        let dt = match prev_at {
            Some(prev) => step_secs(input.sent_at_ms - prev),
            None => FIRST_STEP_SECS,
        };
        prev_at = Some(input.sent_at_ms);
        body = step(body, input.dirs, dt, tuning);
    }
    body
}

/// One prediction step: the server's movement integration plus arena bounds.
/// Obstacles are left to the server to correct.
pub fn step(body: PredictedBody, dirs: DirectionalInput, dt: f32, tuning: &Tuning) -> PredictedBody {
    let PredictedBody { mut pos, mut vel } = body;
    integrate_directional(&mut pos, &mut vel, dirs, dt, tuning);

    let r = tuning.player_radius;
    pos.x = pos.x.min(tuning.arena_w - r).max(r);
    pos.y = pos.y.min(tuning.arena_h - r).max(r);
    PredictedBody { pos, vel }
}

fn step_secs(gap_ms: f64) -> f32 {
    let dt = ((gap_ms / 1000.0) as f32).clamp(0.0, MAX_STEP_SECS);
    if dt > 0.0 {
        dt
    } else {
        FIRST_STEP_SECS
    }
}

fn sanitize(v: Vec2) -> Vec2 {
    if v.is_finite() {
        v
    } else {
        Vec2::ZERO
    }
}
