//! Target selection, perception lag and throw confidence for an IT bot

use glam::Vec2;
use rand::Rng;
use rand_distr::StandardNormal;

use super::brain::{BotBrain, PerceivedTarget};
use super::params::*;
use crate::game::physics::{safe_normalize, PhysicsSystem, Rect};
use crate::game::tuning::Tuning;
use crate::game::world::{PlayerId, World};

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Ramp 0 -> 1 over the first seconds of holding IT
pub fn shed_urgency(now_ms: f64, it_since: f64) -> f32 {
    ((now_ms - it_since) / SHED_RAMP_MS).clamp(0.0, 1.0) as f32
}

/// Refresh stale entries of the perception cache.
///
/// Entries older than the refresh interval are resampled from the true
/// state with Gaussian position noise scaled by the target's speed.
pub fn refresh_perception(brain: &mut BotBrain, world: &World, me: usize, urgency: f32) {
    let now = world.now_ms;
    let interval = PERCEPTION_BASE_MS + PERCEPTION_EXTRA_MS * f64::from(1.0 - urgency);
    let my_id = world.players[me].id;

    brain
        .perceived
        .retain(|id, _| world.players.iter().any(|p| p.id == *id));

    for p in world.players.iter().filter(|p| p.id != my_id) {
        let stale = brain
            .perceived
            .get(&p.id)
            .map_or(true, |seen| now - seen.refreshed_at >= interval);
        if !stale {
            continue;
        }
        let spread = p.vel.length() * PERCEPTION_NOISE;
        let nx: f32 = brain.rng.sample(StandardNormal);
        let ny: f32 = brain.rng.sample(StandardNormal);
        brain.perceived.insert(
            p.id,
            PerceivedTarget {
                pos: p.pos + Vec2::new(nx, ny) * spread,
                vel: p.vel,
                refreshed_at: now,
            },
        );
    }
}

/// Weighted candidate score; early urgency favors the leader, late favors proximity.
pub fn score_candidate(lead01: f32, near01: f32, jitter01: f32, line_of_sight: bool, urgency: f32) -> f32 {
    let u = urgency.clamp(0.0, 1.0);
    let lead_w = lerp(LEAD_WEIGHT_EARLY, LEAD_WEIGHT_LATE, u);
    let near_w = lerp(NEAR_WEIGHT_EARLY, NEAR_WEIGHT_LATE, u);
    let jitter_w = JITTER_WEIGHT * (1.0 - 0.5 * u);
    let los = if line_of_sight { 1.0 } else { 0.0 };
    (lead_w * lead01 + near_w * near01 + jitter_w * jitter01) * (0.25 + 0.75 * los)
}

/// Pick the target to hunt, sticking with the current one unless a rival
/// clearly beats it.
pub fn choose_target(brain: &mut BotBrain, world: &World, me: usize, urgency: f32) -> Option<PlayerId> {
    let my = &world.players[me];
    let leader = world.max_score();

    let mut best: Option<(PlayerId, f32)> = None;
    let mut current_score = None;

    for p in world.players.iter().filter(|p| p.id != my.id && !p.is_disconnected()) {
        let Some(seen) = brain.perceived.get(&p.id).copied() else {
            continue;
        };
        let d = my.pos.distance(seen.pos);
        let lead01 = if leader > 0.0 {
            (p.score / leader).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let near01 = (1.0 - d / NEAR_RANGE).clamp(0.0, 1.0);
        let jitter01: f32 = brain.rng.gen();
        let los = PhysicsSystem::has_line_of_sight(my.pos, seen.pos, &world.obstacles);
        let score = score_candidate(lead01, near01, jitter01, los, urgency);

        if brain.target_id == Some(p.id) {
            current_score = Some(score);
        }
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((p.id, score));
        }
    }

    let chosen = match (brain.target_id, current_score, best) {
        (Some(current), Some(kept), Some((_, top))) if top <= kept * TARGET_SWITCH_MARGIN => Some(current),
        (_, _, best) => best.map(|(id, _)| id),
    };
    brain.target_id = chosen;
    chosen
}

/// Where the target will be when a throw at `speed` reaches it, and the
/// estimated time to impact in seconds.
pub fn projected_impact(from: Vec2, target_pos: Vec2, target_vel: Vec2, speed: f32) -> (Vec2, f32) {
    let speed = speed.max(1.0);
    let mut tti = from.distance(target_pos) / speed;
    let mut impact = target_pos + target_vel * tti;
    // one refinement against the projected distance
    tti = from.distance(impact) / speed;
    impact = target_pos + target_vel * tti;
    (impact, tti)
}

/// Inputs to a throw-confidence estimate
#[derive(Debug, Clone, Copy)]
pub struct ShotContext<'a> {
    pub from: Vec2,
    /// Unit forward vector of the thrower
    pub forward: Vec2,
    pub target_pos: Vec2,
    pub target_vel: Vec2,
    pub charge: f32,
    pub obstacles: &'a [Rect],
    /// Positions of everyone except the thrower and the target
    pub bystanders: &'a [Vec2],
}

/// Confidence in [0, 1] that a throw at `ctx.charge` lands.
pub fn throw_confidence(ctx: &ShotContext<'_>, tuning: &Tuning) -> f32 {
    let speed = tuning.throw_speed(ctx.charge);
    let (impact, tti) = projected_impact(ctx.from, ctx.target_pos, ctx.target_vel, speed);
    let to_impact = impact - ctx.from;
    let dist = to_impact.length();
    let dir = safe_normalize(to_impact, ctx.forward);

    let alignment = ((ctx.forward.dot(dir) + 1.0) * 0.5).powi(2);

    // target velocity across the line of fire
    let lateral_speed = ctx.target_vel.dot(dir.perp()).abs();

    // miss lane: how far the target can stray plus expected aim error,
    // against the width of a hit
    let missing_charge = 1.0 - ctx.charge.clamp(0.0, 1.0);
    let spread_deg = tuning.throw_noise_base_deg + tuning.throw_noise_extra_deg * 0.65 * missing_charge;
    let aim_error = dist * spread_deg.to_radians().tan() * tuning.throw_noise_scale.max(0.0);
    let escape = lateral_speed * tti * 0.5;
    let contact = tuning.ball_contact_range();
    let lane = contact / (contact + escape + aim_error);

    let range = (1.0 - (dist - 120.0) / (THROW_RANGE - 120.0)).clamp(0.0, 1.0);
    let crossing = 1.0 / (1.0 + lateral_speed / CROSSING_SPEED_REF);

    let los = PhysicsSystem::has_line_of_sight(ctx.from, impact, ctx.obstacles);
    let los_factor = if los { 1.0 } else { 0.25 };

    let mut confidence = (0.30 * alignment + 0.30 * lane + 0.20 * range + 0.20 * crossing) * los_factor;

    let clustered = ctx
        .bystanders
        .iter()
        .filter(|p| p.distance(impact) < CLUSTER_RADIUS)
        .count()
        .min(3);
    if clustered > 0 {
        confidence += CLUSTER_BONUS * clustered as f32;
    } else if !ctx.bystanders.iter().any(|p| p.distance(impact) < ISOLATION_RADIUS) {
        confidence -= ISOLATION_PENALTY;
    }

    if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Charge a bot would wind up to for a target at `dist`.
pub fn desired_charge(dist: f32, boldness: f32) -> f32 {
    let dist01 = (dist / 700.0).clamp(0.0, 1.0);
    (0.35 + 0.55 * dist01 + 0.1 * boldness).clamp(0.3, 1.0)
}

/// Minimum confidence to start a wind-up
pub fn throw_threshold(boldness: f32, urgency: f32) -> f32 {
    (0.62 - 0.2 * boldness - 0.22 * urgency).clamp(0.22, 0.9)
}

/// Cooldown between throws; bold bots throw more often
pub fn throw_cooldown_ms(boldness: f32) -> f64 {
    THROW_COOLDOWN_MS * f64::from(1.25 - 0.5 * boldness)
}
