//! Fixed-step simulation pipeline
//!
//! One tick runs named stages in a fixed order: clock, IT census repair,
//! scoring, movement, separation, ball. Later stages read positions
//! corrected by earlier ones.

use glam::Vec2;

use super::ai::{self, BotIntent};
use super::input::{integrate_directional, steer_velocity};
use super::physics::{safe_normalize, PhysicsSystem};
use super::possession::{self, release_throw};
use super::scoring;
use super::world::{Control, World};

/// Bots ease off within this distance of their move target
const ARRIVE_RADIUS: f32 = 24.0;

/// Advance `world` by `dt` seconds.
///
/// A finished finite match keeps its clock running (so disconnect
/// grace windows still elapse) but nothing else moves until reset.
pub fn step(world: &mut World, dt: f32) {
    if !dt.is_finite() || dt <= 0.0 {
        return;
    }
    advance_clock(world, dt);
    world.ensure_single_it();
    if world.over {
        return;
    }
    scoring::accrue(world, dt);
    move_players(world, dt);
    separate_players(world);
    possession::resolve_ball(world, dt);
}

pub fn advance_clock(world: &mut World, dt: f32) {
    world.now_ms += f64::from(dt) * 1000.0;
}

/// Integrate every player: humans from their latest input, bots from the
/// decision engine. Bots that decided to throw release after moving.
pub fn move_players(world: &mut World, dt: f32) {
    let mut intents: Vec<Option<BotIntent>> = vec![None; world.players.len()];
    for (idx, intent) in ai::plan_bots(world, dt) {
        intents[idx] = Some(intent);
    }

    for (idx, intent) in intents.into_iter().enumerate() {
        let p = &world.players[idx];
        let (mut pos, mut vel, mut facing) = (p.pos, p.vel, p.facing);

        let mut aim = None;
        match (&p.control, intent) {
            (Control::Human(h), _) => {
                integrate_directional(&mut pos, &mut vel, h.input.dirs, dt, &world.tuning);
                aim = h.input.aim;
            }
            (Control::Bot(_), Some(intent)) => {
                let to = intent.move_target - pos;
                let arrive = (to.length() / ARRIVE_RADIUS).clamp(0.0, 1.0);
                let desired = safe_normalize(to, Vec2::ZERO) * intent.speed * arrive;
                let t = &world.tuning;
                steer_velocity(&mut pos, &mut vel, desired, t.bot_response, dt, t.friction);
                if intent.telegraph.aiming {
                    aim = Some(intent.telegraph.target);
                }
            }
            (Control::Bot(_), None) => {}
        }

        world.keep_in_bounds(&mut pos, &mut vel);

        facing = match aim {
            Some(target) => safe_normalize(target - pos, facing),
            None if vel.length_squared() > 1.0 => safe_normalize(vel, facing),
            None => facing,
        };

        let p = &mut world.players[idx];
        p.pos = pos;
        p.vel = vel;
        p.facing = facing;

        let Some(intent) = intent else {
            if let Some(target) = aim {
                p.telegraph.target = target;
            }
            continue;
        };
        p.telegraph = intent.telegraph;
        if let Some(shot) = intent.throw {
            let id = p.id;
            release_throw(world, id, shot.aim, shot.charge);
        }
    }
}

/// Push overlapping players apart with a symmetric impulse.
///
/// Plain O(n^2) pair loop; player counts stay in the tens. Each resolved
/// pair is put back inside the arena and out of obstacles immediately.
pub fn separate_players(world: &mut World) {
    let min_distance = world.tuning.tag_range();
    let impulse = world.tuning.separation_impulse;
    let n = world.players.len();

    for _ in 0..world.tuning.separation_passes {
        for i in 0..n {
            for j in (i + 1)..n {
                let (mut pa, mut va) = (world.players[i].pos, world.players[i].vel);
                let (mut pb, mut vb) = (world.players[j].pos, world.players[j].vel);
                if !PhysicsSystem::resolve_pair_separation(&mut pa, &mut va, &mut pb, &mut vb, min_distance, impulse) {
                    continue;
                }
                world.keep_in_bounds(&mut pa, &mut va);
                world.keep_in_bounds(&mut pb, &mut vb);
                world.players[i].pos = pa;
                world.players[i].vel = va;
                world.players[j].pos = pb;
                world.players[j].vel = vb;
            }
        }
    }
}
