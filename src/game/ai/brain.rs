//! Per-bot scratch state: behavior, perception cache, boldness, recovery timers

use std::collections::HashMap;
use std::f64::consts::TAU;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::params::*;
use crate::game::world::PlayerId;

/// Behavior a bot settled on this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BotState {
    /// Hover at a standoff distance from IT to earn proximity points
    #[default]
    Farm,
    /// Back away from an IT that is about to throw
    Evade,
    /// Steer clear of an armed loose ball
    AvoidBall,
    /// Crowd a dead ball so IT has to come close to reclaim it
    ContestBall,
    /// Sidestep a ball on a collision course
    Dodge,
    /// Stuck-recovery escape
    Panic,
    /// IT with the ball, picking a target and closing to throw range
    Hunt,
    /// IT close enough to tag by touch
    Rush,
    /// IT without the ball, going to get it
    ChaseBall,
    /// IT charging a throw
    WindUp,
}

/// Slowly oscillating personality trait, seeded per bot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoldnessTrait {
    pub base: f32,
    pub period_slow_ms: f64,
    pub phase_slow: f64,
    pub period_fast_ms: f64,
    pub phase_fast: f64,
}

impl BoldnessTrait {
    pub fn random(rng: &mut impl Rng) -> Self {
        Self {
            base: rng.gen_range(0.35..0.65),
            period_slow_ms: rng.gen_range(BOLD_PERIOD_SLOW_MS.0..BOLD_PERIOD_SLOW_MS.1),
            phase_slow: rng.gen_range(0.0..TAU),
            period_fast_ms: rng.gen_range(BOLD_PERIOD_FAST_MS.0..BOLD_PERIOD_FAST_MS.1),
            phase_fast: rng.gen_range(0.0..TAU),
        }
    }

    /// Trait value in [0, 1] at simulation time `now_ms`
    pub fn at(&self, now_ms: f64) -> f32 {
        let slow = (TAU * now_ms / self.period_slow_ms + self.phase_slow).sin() as f32;
        let fast = (TAU * now_ms / self.period_fast_ms + self.phase_fast).sin() as f32;
        (self.base + BOLD_AMP_SLOW * slow + BOLD_AMP_FAST * fast).clamp(0.0, 1.0)
    }
}

/// Blend a bot's own trait with how close the match is to being won.
///
/// Everyone gets bolder as the leader nears `win_points`; bots behind the
/// leader get an extra push that grows with the gap.
pub fn effective_boldness(trait_now: f32, my_score: f32, leader_score: f32, win_points: f32, is_leader: bool) -> f32 {
    let win = win_points.max(1.0);
    let endgame = ((leader_score / win - ENDGAME_START) / (1.0 - ENDGAME_START)).clamp(0.0, 1.0);
    let chase = if is_leader {
        0.0
    } else {
        CHASER_BOOST * endgame * ((leader_score - my_score) / (0.25 * win)).clamp(0.0, 1.0)
    };
    (trait_now + ENDGAME_BOOST * endgame + chase).clamp(0.0, 1.0)
}

/// Delayed, noisy observation of another player
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerceivedTarget {
    pub pos: Vec2,
    pub vel: Vec2,
    pub refreshed_at: f64,
}

/// A committed throw being wound up
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrowPlan {
    pub target: PlayerId,
    pub started_at: f64,
    pub windup_ms: f64,
    pub target_charge: f32,
    pub aim: Vec2,
}

impl ThrowPlan {
    pub fn progress(&self, now_ms: f64) -> f32 {
        ((now_ms - self.started_at) / self.windup_ms.max(1.0)).clamp(0.0, 1.0) as f32
    }
}

/// Decision-engine scratch record owned by one bot
#[derive(Debug, Clone)]
pub struct BotBrain {
    pub rng: ChaCha8Rng,
    pub state: BotState,
    pub target_id: Option<PlayerId>,
    pub perceived: HashMap<PlayerId, PerceivedTarget>,
    pub boldness: BoldnessTrait,
    pub throw_plan: Option<ThrowPlan>,
    /// Earliest time a new wind-up may start after an abort
    pub next_throw_at: f64,

    pub stuck_ms: f64,
    pub panic_until: f64,
    pub panic_dir: Vec2,
    pub panic_reroll_at: f64,
    /// Position before last tick's move and the distance it planned to cover
    pub last_pos: Option<Vec2>,
    pub planned_step: f32,

    pub wobble_phase: f64,
}

impl BotBrain {
    pub fn new(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let boldness = BoldnessTrait::random(&mut rng);
        let wobble_phase = rng.gen_range(0.0..TAU);
        Self {
            rng,
            state: BotState::default(),
            target_id: None,
            perceived: HashMap::new(),
            boldness,
            throw_plan: None,
            next_throw_at: 0.0,
            stuck_ms: 0.0,
            panic_until: f64::NEG_INFINITY,
            panic_dir: Vec2::X,
            panic_reroll_at: 0.0,
            last_pos: None,
            planned_step: 0.0,
            wobble_phase,
        }
    }

    pub fn panicking(&self, now_ms: f64) -> bool {
        now_ms < self.panic_until
    }

    /// Accumulate stuck time from how far we actually moved since the last plan.
    pub fn track_progress(&mut self, pos: Vec2, dt: f32) {
        let dt_ms = f64::from(dt) * 1000.0;
        if let Some(last) = self.last_pos {
            let moved = pos.distance(last);
            if self.planned_step > STUCK_PLAN_EPS && moved < self.planned_step * STUCK_MOVE_RATIO {
                self.stuck_ms += dt_ms;
            } else {
                self.stuck_ms = (self.stuck_ms - dt_ms * 2.0).max(0.0);
            }
        }
    }

    pub fn calm_down(&mut self, now_ms: f64) {
        if self.panicking(now_ms) {
            self.panic_until = now_ms;
        }
        self.stuck_ms = 0.0;
    }
}
