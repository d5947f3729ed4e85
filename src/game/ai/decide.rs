//! Per-tick behavior selection for one bot

use glam::Vec2;
use rand::Rng;

use super::brain::{effective_boldness, BotBrain, BotState, ThrowPlan};
use super::params::*;
use super::steering::{dodge_heading, escape_direction, evade_goal, farm_distance, farm_goal};
use super::targeting::{
    choose_target, desired_charge, projected_impact, refresh_perception, shed_urgency, throw_confidence,
    throw_cooldown_ms, throw_threshold, ShotContext,
};
use crate::game::physics::safe_normalize;
use crate::game::world::{PlayerId, Telegraph, World};

/// Throw a bot wants released this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrowCommand {
    pub aim: Vec2,
    pub charge: f32,
}

/// Concrete outcome of one decision: where to go, how fast, what to show
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BotIntent {
    pub state: BotState,
    pub move_target: Vec2,
    pub speed: f32,
    pub telegraph: Telegraph,
    pub throw: Option<ThrowCommand>,
}

impl BotIntent {
    fn moving(state: BotState, from: Vec2, move_target: Vec2, speed: f32) -> Self {
        Self {
            state,
            move_target,
            speed,
            telegraph: idle_telegraph(from),
            throw: None,
        }
    }
}

fn idle_telegraph(pos: Vec2) -> Telegraph {
    Telegraph {
        aiming: false,
        charge: 0.0,
        target: pos,
    }
}

/// Facts shared by every bot this tick
#[derive(Debug, Clone, Copy)]
pub struct TickView {
    pub it: Option<usize>,
    pub leader: Option<PlayerId>,
    pub leader_score: f32,
}

impl TickView {
    pub fn capture(world: &World) -> Self {
        let leader = world
            .players
            .iter()
            .filter(|p| p.score > 0.0)
            .fold(None::<(PlayerId, f32)>, |best, p| match best {
                Some((_, s)) if s >= p.score => best,
                _ => Some((p.id, p.score)),
            });
        Self {
            it: world.it_index(),
            leader: leader.map(|(id, _)| id),
            leader_score: leader.map_or(0.0, |(_, s)| s),
        }
    }
}

/// Pick this tick's behavior for the bot at `me`.
///
/// Guards run in priority order: a loose ball worth chasing suppresses
/// panic, panic overrides everything else, then the IT and runner
/// branches. Every path returns a finite target and speed.
pub fn decide(world: &World, view: &TickView, me: usize, brain: &mut BotBrain, dt: f32) -> BotIntent {
    let player = &world.players[me];
    let now = world.now_ms;

    brain.track_progress(player.pos, dt);

    let boldness = effective_boldness(
        brain.boldness.at(now),
        player.score,
        view.leader_score,
        world.tuning.win_points,
        view.leader == Some(player.id),
    );

    let contest = !player.is_it && wants_contest(world, view, me, boldness);
    let chasing_ball = world.ball.is_loose() && (player.is_it || contest);

    let panic = if chasing_ball {
        brain.calm_down(now);
        None
    } else {
        panic_intent(world, view, me, brain)
    };

    let intent = match panic {
        Some(intent) => intent,
        None if player.is_it => it_intent(world, me, brain, boldness),
        None => runner_intent(world, view, me, brain, boldness, contest),
    };

    brain.state = intent.state;
    brain.last_pos = Some(player.pos);
    // winding up is a deliberate near-stop, not an attempt to travel
    brain.planned_step = if intent.state == BotState::WindUp {
        0.0
    } else {
        (intent.speed * dt).min(player.pos.distance(intent.move_target))
    };
    intent
}

/// Runner near an unarmed loose ball that IT is further from
fn wants_contest(world: &World, view: &TickView, me: usize, boldness: f32) -> bool {
    let ball = &world.ball;
    if !ball.is_loose() || ball.armed || boldness < CONTEST_MIN_BOLDNESS {
        return false;
    }
    let Some(it) = view.it.map(|i| &world.players[i]) else {
        return false;
    };
    let mine = world.players[me].pos.distance(ball.pos);
    mine < CONTEST_BASE_RANGE + CONTEST_BOLD_RANGE * boldness && it.pos.distance(ball.pos) > mine
}

fn panic_intent(world: &World, view: &TickView, me: usize, brain: &mut BotBrain) -> Option<BotIntent> {
    let player = &world.players[me];
    let now = world.now_ms;

    if !brain.panicking(now) {
        if brain.stuck_ms < STUCK_PANIC_MS {
            return None;
        }
        brain.panic_until = now + brain.rng.gen_range(PANIC_MIN_MS..PANIC_MAX_MS);
        brain.panic_reroll_at = now;
        brain.stuck_ms = 0.0;
        brain.throw_plan = None;
    }

    if now >= brain.panic_reroll_at {
        let it_pos = if player.is_it {
            None
        } else {
            view.it.map(|i| world.players[i].pos)
        };
        brain.panic_dir = escape_direction(player.pos, world.arena_size(), &world.obstacles, it_pos, &mut brain.rng);
        brain.panic_reroll_at = now + brain.rng.gen_range(PANIC_REROLL_MIN_MS..PANIC_REROLL_MAX_MS);
    }

    Some(BotIntent::moving(
        BotState::Panic,
        player.pos,
        player.pos + brain.panic_dir * GOAL_REACH,
        world.tuning.bot_speed * PANIC_SPEED,
    ))
}

fn it_intent(world: &World, me: usize, brain: &mut BotBrain, boldness: f32) -> BotIntent {
    let player = &world.players[me];
    let tuning = &world.tuning;
    let ball = &world.ball;
    let now = world.now_ms;
    let urgency = shed_urgency(now, player.it_since);

    if ball.is_loose() {
        brain.throw_plan = None;
        let lead = (ball.speed() / 900.0).clamp(0.05, 0.25);
        return BotIntent::moving(
            BotState::ChaseBall,
            player.pos,
            ball.pos + ball.vel * lead,
            tuning.bot_speed * (1.0 + 0.15 * boldness),
        );
    }

    refresh_perception(brain, world, me, urgency);

    // a committed wind-up keeps its target
    let target = match brain.throw_plan {
        Some(plan) => Some(plan.target),
        None => choose_target(brain, world, me, urgency),
    };
    let Some((target_id, seen)) = target.and_then(|id| brain.perceived.get(&id).map(|seen| (id, *seen))) else {
        brain.throw_plan = None;
        return BotIntent::moving(BotState::Hunt, player.pos, world.center(), tuning.bot_speed * 0.3);
    };

    let dist = player.pos.distance(seen.pos);
    let rush_range = tuning.tag_range() + RUSH_MARGIN + RUSH_MARGIN_URGENT * urgency;
    if dist < rush_range {
        brain.throw_plan = None;
        return BotIntent::moving(
            BotState::Rush,
            player.pos,
            seen.pos + seen.vel * 0.12,
            tuning.bot_speed * (1.05 + 0.1 * boldness),
        );
    }

    let bystanders: Vec<Vec2> = world
        .players
        .iter()
        .filter(|p| p.id != player.id && p.id != target_id)
        .map(|p| brain.perceived.get(&p.id).map_or(p.pos, |s| s.pos))
        .collect();
    let forward = safe_normalize(player.facing, Vec2::X);
    let shot = |charge: f32| ShotContext {
        from: player.pos,
        forward,
        target_pos: seen.pos,
        target_vel: seen.vel,
        charge,
        obstacles: &world.obstacles,
        bystanders: &bystanders,
    };
    let threshold = throw_threshold(boldness, urgency);
    let windup_speed = tuning.bot_speed * 0.35;

    if let Some(mut plan) = brain.throw_plan {
        let (impact, _) = projected_impact(player.pos, seen.pos, seen.vel, tuning.throw_speed(plan.target_charge));
        plan.aim = impact;
        let progress = plan.progress(now);
        let mut intent = BotIntent {
            state: BotState::WindUp,
            move_target: seen.pos,
            speed: windup_speed,
            telegraph: Telegraph {
                aiming: true,
                charge: progress * plan.target_charge,
                target: impact,
            },
            throw: None,
        };
        if progress < 1.0 {
            brain.throw_plan = Some(plan);
            return intent;
        }

        brain.throw_plan = None;
        let confidence = throw_confidence(&shot(plan.target_charge), tuning);
        if confidence >= threshold * RELEASE_THRESHOLD_SHARE {
            intent.throw = Some(ThrowCommand {
                aim: impact,
                charge: plan.target_charge,
            });
        } else {
            brain.next_throw_at = now + ABORT_BACKOFF_MS;
            intent.state = BotState::Hunt;
            intent.telegraph = idle_telegraph(player.pos);
        }
        return intent;
    }

    let charge = desired_charge(dist, boldness);
    let ready = dist < THROW_RANGE
        && now - player.last_throw_at >= throw_cooldown_ms(boldness)
        && now >= brain.next_throw_at;
    if ready && throw_confidence(&shot(charge), tuning) >= threshold {
        let windup_ms = brain.rng.gen_range(WINDUP_MIN_MS..WINDUP_MAX_MS) * f64::from(1.1 - 0.3 * urgency);
        let target_charge = (charge + brain.rng.gen_range(-0.05..0.05)).clamp(0.3, 1.0);
        let (impact, _) = projected_impact(player.pos, seen.pos, seen.vel, tuning.throw_speed(target_charge));
        brain.throw_plan = Some(ThrowPlan {
            target: target_id,
            started_at: now,
            windup_ms,
            target_charge,
            aim: impact,
        });
        return BotIntent {
            state: BotState::WindUp,
            move_target: seen.pos,
            speed: windup_speed,
            telegraph: Telegraph {
                aiming: true,
                charge: 0.0,
                target: impact,
            },
            throw: None,
        };
    }

    BotIntent::moving(
        BotState::Hunt,
        player.pos,
        seen.pos + seen.vel * 0.25,
        tuning.bot_speed * (0.85 + 0.2 * boldness + 0.15 * urgency),
    )
}

fn runner_intent(
    world: &World,
    view: &TickView,
    me: usize,
    brain: &mut BotBrain,
    boldness: f32,
    contest: bool,
) -> BotIntent {
    let player = &world.players[me];
    let tuning = &world.tuning;
    let ball = &world.ball;
    let now = world.now_ms;

    // IT-only scratch does not survive losing the role
    brain.throw_plan = None;
    brain.target_id = None;
    brain.perceived.clear();

    let self_thrown = ball.last_thrower == Some(player.id);
    if let Some(heading) = dodge_heading(player.pos, self_thrown, ball, tuning.ball_contact_range()) {
        return BotIntent::moving(
            BotState::Dodge,
            player.pos,
            player.pos + heading * GOAL_REACH,
            tuning.bot_speed * 1.1,
        );
    }

    let Some(it) = view.it.map(|i| &world.players[i]) else {
        return BotIntent::moving(BotState::Farm, player.pos, world.center(), tuning.bot_speed * 0.4);
    };

    if contest {
        let guard = ball.pos + safe_normalize(it.pos - ball.pos, Vec2::X) * (tuning.ball_contact_range() + 24.0);
        return BotIntent::moving(
            BotState::ContestBall,
            player.pos,
            guard,
            tuning.bot_speed * (0.8 + 0.3 * boldness),
        );
    }

    let it_has_ball = ball.held_by == Some(it.id);
    let wobble = (now / WOBBLE_PERIOD_MS + brain.wobble_phase).sin() as f32;
    let behind = ((view.leader_score - player.score) / tuning.win_points.max(1.0)).clamp(0.0, 1.0);
    let risk = (0.3 + 0.3 * behind + 0.4 * boldness).clamp(0.0, 1.0);
    let desired = farm_distance(risk, !it_has_ball);
    let to_it = player.pos.distance(it.pos);
    let aimed_at_me = it.telegraph.aiming && it.telegraph.target.distance(player.pos) < AIMED_AT_RADIUS;

    let (mut state, mut goal, speed_scale) = if it_has_ball && (aimed_at_me || to_it < desired * 0.55) {
        (BotState::Evade, evade_goal(player.pos, it.pos, wobble), 1.0 + 0.1 * (1.0 - boldness))
    } else {
        (
            BotState::Farm,
            farm_goal(player.pos, it.pos, desired, wobble),
            0.85 + 0.25 * boldness,
        )
    };

    if ball.is_loose() && ball.armed {
        let lead = (ball.speed() / 900.0).clamp(0.1, 0.3);
        let away = player.pos - (ball.pos + ball.vel * lead);
        let dist = away.length();
        if dist < AVOID_BALL_RADIUS {
            goal += safe_normalize(away, Vec2::X) * AVOID_BALL_WEIGHT * (1.0 - dist / AVOID_BALL_RADIUS);
            state = BotState::AvoidBall;
        }
    }

    let heading = safe_normalize(goal, safe_normalize(player.pos - it.pos, Vec2::X));
    BotIntent::moving(
        state,
        player.pos,
        player.pos + heading * GOAL_REACH,
        tuning.bot_speed * speed_scale,
    )
}
