//! Ball possession and IT transfer: touch tags, human throw edges, free
//! flight, pickup, tag by throw and disarm

use glam::Vec2;
use rand::Rng;
use rand_distr::StandardNormal;
use tracing::debug;

use super::physics::{safe_normalize, PhysicsSystem};
use super::world::{PlayerId, World};

/// Contact tolerance for bodies that separation just pushed to exactly
/// touching distance
const CONTACT_SLOP: f32 = 0.5;

/// Resolve the ball for one tick.
pub fn resolve_ball(world: &mut World, dt: f32) {
    repair_holder(world);
    match world.ball.held_by {
        Some(holder) => held_ball(world, holder),
        None => free_ball(world, dt),
    }
    reset_idle_throw_edges(world);
}

/// A ball held by anyone but the current IT goes back to IT.
fn repair_holder(world: &mut World) {
    let Some(holder) = world.ball.held_by else {
        return;
    };
    let it = world.it_id();
    if Some(holder) == it {
        return;
    }
    debug!(stale_holder = %holder, it = ?it, "Repairing ball holder");
    world.ball.held_by = it;
    world.ball.last_thrower = None;
    world.ball.armed = false;
}

fn held_ball(world: &mut World, holder: PlayerId) {
    let Some(idx) = world.index_of(holder) else {
        world.ball.held_by = None;
        return;
    };
    world.ball.pos = world.players[idx].pos;
    world.ball.vel = Vec2::ZERO;

    if !world.players[idx].is_it {
        return;
    }
    if try_touch_tag(world, idx) {
        return;
    }
    if world.players[idx].is_human() {
        human_throw_input(world, idx);
    }
}

/// IT touching another player passes the role, subject to both cooldowns.
fn try_touch_tag(world: &mut World, it_idx: usize) -> bool {
    let now = world.now_ms;
    let cooldown = world.tuning.touch_tag_cooldown_ms;
    let reach = world.tuning.tag_range() + CONTACT_SLOP;

    let it = &world.players[it_idx];
    if now - it.last_hit_at <= cooldown {
        return false;
    }
    let Some(victim) = world
        .players
        .iter()
        .enumerate()
        .find(|(i, p)| *i != it_idx && p.pos.distance(it.pos) <= reach && now - p.last_hit_at > cooldown)
        .map(|(_, p)| p.id)
    else {
        return false;
    };

    let tagger = it.id;
    world.players[it_idx].last_hit_at = now;
    if let Some(p) = world.player_mut(victim) {
        p.last_hit_at = now;
    }
    world.set_it(victim);
    if let Some(pos) = world.player(victim).map(|p| p.pos) {
        world.ball.pos = pos;
    }
    debug!(tagger = %tagger, tagged = %victim, "Tag by touch");
    true
}

/// Press/charge/release edges for a human IT holding the ball.
///
/// Mouse and key charge independently; the earliest active press sets the
/// charge start, and releasing either one throws.
fn human_throw_input(world: &mut World, idx: usize) {
    let now = world.now_ms;
    let charge_ms = world.tuning.charge_ms.max(1.0);
    let p = &mut world.players[idx];
    let pos = p.pos;
    let facing = p.facing;
    let Some(h) = p.human_mut() else {
        return;
    };

    let input = h.input;
    let mouse = input.mouse_down;
    let space = input.space_down;

    if mouse && !h.was_mouse_down {
        h.mouse_down_at = now;
    }
    if space && !h.was_space_down {
        h.space_down_at = now;
    }

    let start = match (mouse, space) {
        (true, true) => Some(h.mouse_down_at.min(h.space_down_at)),
        (true, false) => Some(h.mouse_down_at),
        (false, true) => Some(h.space_down_at),
        (false, false) => None,
    };
    let released = (!mouse && h.was_mouse_down) || (!space && h.was_space_down);
    h.was_mouse_down = mouse;
    h.was_space_down = space;

    let aim = input.aim.unwrap_or(pos + facing * 100.0);
    p.telegraph.target = aim;
    p.telegraph.aiming = start.is_some();
    match start {
        Some(start) => p.telegraph.charge = ((now - start) / charge_ms).clamp(0.0, 1.0) as f32,
        // a release throws with the charge held on the previous tick
        None if !released => p.telegraph.charge = 0.0,
        None => {}
    }

    if released {
        let charge = p.telegraph.charge;
        let id = p.id;
        release_throw(world, id, aim, charge);
    }
}

/// Humans who are not charging a held ball start fresh when they next get it.
fn reset_idle_throw_edges(world: &mut World) {
    let holder = world.ball.held_by;
    for p in world.players.iter_mut().filter(|p| Some(p.id) != holder) {
        if let Some(h) = p.human_mut() {
            h.was_mouse_down = false;
            h.was_space_down = false;
        }
    }
}

fn free_ball(world: &mut World, dt: f32) {
    let now = world.now_ms;
    {
        let friction = PhysicsSystem::friction(world.tuning.ball_friction, dt);
        let ball = &mut world.ball;
        ball.pos += ball.vel * dt;
        ball.vel *= friction;
    }
    bounce_ball(world);

    let contact = world.tuning.ball_contact_range();
    let it = world.it_id();
    let ball_pos = world.ball.pos;

    for idx in 0..world.players.len() {
        let p = &world.players[idx];
        if p.pos.distance(ball_pos) > contact {
            continue;
        }
        let id = p.id;

        if Some(id) == it && world.ball.speed() < world.tuning.pickup_speed {
            let ball = &mut world.ball;
            ball.held_by = Some(id);
            ball.last_thrower = None;
            ball.armed = false;
            ball.vel = Vec2::ZERO;
            debug!(player_id = %id, "IT picked up the ball");
            break;
        }

        if world.ball.armed {
            if world.ball.last_thrower == Some(id) || now - p.last_hit_at < world.tuning.hit_cooldown_ms {
                continue;
            }
            world.players[idx].last_hit_at = now;
            let thrower = world.ball.last_thrower;
            world.set_it(id);
            debug!(tagged = %id, thrower = ?thrower, "Tag by throw");
            break;
        }
    }

    if world.ball.is_loose() && world.ball.speed() < world.tuning.disarm_speed {
        world.ball.armed = false;
    }
}

/// Arena walls reflect with loss; obstacles reflect with restitution then damp.
fn bounce_ball(world: &mut World) {
    let t = &world.tuning;
    let r = t.ball_radius;
    let ball = &mut world.ball;

    if ball.pos.x < r {
        ball.pos.x = r;
        ball.vel.x *= -t.ball_wall_bounce;
    }
    if ball.pos.x > t.arena_w - r {
        ball.pos.x = t.arena_w - r;
        ball.vel.x *= -t.ball_wall_bounce;
    }
    if ball.pos.y < r {
        ball.pos.y = r;
        ball.vel.y *= -t.ball_wall_bounce;
    }
    if ball.pos.y > t.arena_h - r {
        ball.pos.y = t.arena_h - r;
        ball.vel.y *= -t.ball_wall_bounce;
    }

    for rect in &world.obstacles {
        let Some(hit) = PhysicsSystem::resolve_circle_penetration(ball.pos, r, rect) else {
            continue;
        };
        ball.pos += hit.normal * hit.depth;
        let vn = ball.vel.dot(hit.normal);
        if vn < 0.0 {
            ball.vel -= hit.normal * (t.ball_obstacle_restitution * vn);
            ball.vel *= t.ball_obstacle_damping;
        }
    }
}

/// Throw the ball from `thrower` toward `aim_target`.
///
/// No-op unless `thrower` holds the ball. Angular noise is a Gaussian
/// deviate scaled by a spread that grows with missing charge and with the
/// thrower's own speed. Returns whether the ball left the hand.
pub fn release_throw(world: &mut World, thrower: PlayerId, aim_target: Vec2, charge01: f32) -> bool {
    if world.ball.held_by != Some(thrower) {
        return false;
    }
    let Some(idx) = world.index_of(thrower) else {
        return false;
    };

    let charge = if charge01.is_finite() {
        charge01.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (pos, vel, facing) = {
        let p = &world.players[idx];
        (p.pos, p.vel, p.facing)
    };
    let t = &world.tuning;

    let aim_dir = safe_normalize(aim_target - pos, safe_normalize(facing, Vec2::X));
    let moving01 = (vel.length() / t.throw_noise_speed_ref.max(1.0)).clamp(0.0, 1.0);
    let spread_deg = t.throw_noise_base_deg + t.throw_noise_extra_deg * (0.65 * (1.0 - charge) + 0.35 * moving01);
    let deviate: f32 = world.rng.sample(StandardNormal);
    let angle = (spread_deg * deviate * t.throw_noise_scale).to_radians();
    let dir = Vec2::from_angle(angle).rotate(aim_dir);

    let speed = t.throw_speed(charge);
    let offset = t.player_radius + t.ball_radius + 2.0;
    let now = world.now_ms;

    let ball = &mut world.ball;
    ball.held_by = None;
    ball.last_thrower = Some(thrower);
    ball.armed = true;
    ball.thrown_at = now;
    ball.pos = pos + dir * offset;
    ball.vel = dir * speed;

    let p = &mut world.players[idx];
    p.last_throw_at = now;
    p.clear_telegraph();

    debug!(player_id = %thrower, charge, speed, "Ball thrown");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::input::InputFrame;
    use crate::game::tuning::Tuning;
    use crate::game::world::{Ball, NEVER_MS};

    const DT: f32 = 1.0 / 60.0;

    fn quiet_world(bots: usize) -> World {
        let tuning = Tuning {
            bot_count: bots,
            throw_noise_scale: 0.0,
            ..Tuning::default()
        };
        let mut w = World::new(tuning, 3);
        w.obstacles.clear();
        w
    }

    #[test]
    fn stale_holder_is_repaired_to_it() {
        let mut w = quiet_world(3);
        let not_it = w.players.iter().find(|p| !p.is_it).unwrap().id;
        w.ball.held_by = Some(not_it);
        resolve_ball(&mut w, DT);
        assert_eq!(w.ball.held_by, w.it_id());
    }

    #[test]
    fn touch_tag_respects_cooldown() {
        let mut w = quiet_world(2);
        let (a, b) = (w.players[0].id, w.players[1].id);
        w.set_it(a);
        w.players[0].pos = Vec2::new(300.0, 300.0);
        w.players[1].pos = Vec2::new(320.0, 300.0);
        w.now_ms = 10_000.0;
        w.players[1].last_hit_at = 9_800.0;

        resolve_ball(&mut w, DT);
        assert_eq!(w.it_id(), Some(a));

        w.now_ms = 10_500.0;
        resolve_ball(&mut w, DT);
        assert_eq!(w.it_id(), Some(b));
    }

    #[test]
    fn release_is_noop_for_non_holder() {
        let mut w = quiet_world(2);
        let not_it = w.players.iter().find(|p| !p.is_it).unwrap().id;
        let before = w.ball.clone();
        assert!(!release_throw(&mut w, not_it, Vec2::ZERO, 1.0));
        assert_eq!(w.ball, before);
    }

    #[test]
    fn noiseless_throw_flies_straight_at_aim() {
        let mut w = quiet_world(2);
        let it = w.players[0].id;
        w.set_it(it);
        w.players[0].pos = Vec2::new(200.0, 300.0);
        w.players[0].vel = Vec2::new(300.0, 0.0);
        assert!(release_throw(&mut w, it, Vec2::new(600.0, 300.0), 0.5));
        assert!(w.ball.armed);
        assert_eq!(w.ball.last_thrower, Some(it));
        assert!((w.ball.pos - Vec2::new(225.0, 300.0)).length() < 1e-3);
        assert!((w.ball.vel.x - w.tuning.throw_speed(0.5)).abs() < 1e-2);
        assert!(w.ball.vel.y.abs() < 1e-3);
        assert_eq!(w.players[0].last_throw_at, w.now_ms);
    }

    #[test]
    fn noise_spread_grows_with_missing_charge() {
        let tuning = Tuning {
            bot_count: 1,
            ..Tuning::default()
        };
        let mut w = World::new(tuning, 44);
        w.obstacles.clear();
        let it = w.players[0].id;

        let mut spread = |charge: f32| {
            let mut total = 0.0;
            for _ in 0..200 {
                w.set_it(it);
                w.players[0].pos = Vec2::new(300.0, 300.0);
                w.players[0].vel = Vec2::ZERO;
                release_throw(&mut w, it, Vec2::new(800.0, 300.0), charge);
                total += w.ball.vel.to_angle().abs();
            }
            total / 200.0
        };
        let full = spread(1.0);
        let weak = spread(0.0);
        assert!(weak > full * 1.5);
    }

    #[test]
    fn free_ball_decays_and_disarms() {
        let mut w = quiet_world(1);
        w.players[0].pos = Vec2::new(1000.0, 600.0);
        w.ball = Ball {
            vel: Vec2::new(60.0, 0.0),
            armed: true,
            ..Ball::at(Vec2::new(300.0, 300.0))
        };
        for _ in 0..30 {
            resolve_ball(&mut w, DT);
        }
        assert!(!w.ball.armed);
        assert!(w.ball.speed() < 60.0);
        assert!(w.ball.pos.x > 300.0);
    }

    #[test]
    fn ball_bounces_off_walls_and_obstacles() {
        let mut w = quiet_world(1);
        w.players[0].pos = Vec2::new(1000.0, 600.0);
        w.ball = Ball {
            vel: Vec2::new(-600.0, 0.0),
            armed: true,
            ..Ball::at(Vec2::new(12.0, 300.0))
        };
        resolve_ball(&mut w, DT);
        assert!(w.ball.vel.x > 0.0);
        assert!(w.ball.pos.x >= w.tuning.ball_radius);

        w.obstacles = vec![crate::game::physics::Rect::new(500.0, 250.0, 40.0, 100.0)];
        w.ball = Ball {
            vel: Vec2::new(600.0, 0.0),
            armed: true,
            ..Ball::at(Vec2::new(485.0, 300.0))
        };
        resolve_ball(&mut w, DT);
        assert!(w.ball.vel.x < 0.0);
        assert!(w.ball.pos.x <= 500.0 - w.tuning.ball_radius + 1e-3);
    }

    #[test]
    fn armed_ball_skips_thrower_and_cooling_players() {
        let mut w = quiet_world(3);
        let (thrower, cooling) = (w.players[0].id, w.players[1].id);
        w.set_it(thrower);
        w.now_ms = 5_000.0;
        w.players[0].pos = Vec2::new(300.0, 300.0);
        w.players[1].pos = Vec2::new(300.0, 300.0);
        w.players[1].last_hit_at = 4_800.0;
        w.players[2].pos = Vec2::new(900.0, 600.0);
        w.ball = Ball {
            vel: Vec2::new(500.0, 0.0),
            armed: true,
            last_thrower: Some(thrower),
            ..Ball::at(Vec2::new(292.0, 300.0))
        };
        resolve_ball(&mut w, DT);
        assert_eq!(w.it_id(), Some(thrower));
        assert_ne!(w.it_id(), Some(cooling));
        assert!(w.ball.is_loose());
    }

    #[test]
    fn human_charge_and_release_throws() {
        let mut w = quiet_world(1);
        let me = w.add_human(PlayerId::new_random(), "thrower");
        w.set_it(me);
        let idx = w.index_of(me).unwrap();
        w.players[idx].pos = Vec2::new(300.0, 300.0);
        w.players[idx].last_hit_at = NEVER_MS;
        let bot = w.players.iter().position(|p| !p.is_human()).unwrap();
        w.players[bot].pos = Vec2::new(1000.0, 650.0);

        let press = InputFrame {
            seq: 1,
            aim: Some(Vec2::new(700.0, 300.0)),
            mouse_down: true,
            ..Default::default()
        };
        w.apply_input(me, press);
        w.now_ms = 1_000.0;
        resolve_ball(&mut w, DT);
        assert!(w.player(me).unwrap().telegraph.aiming);

        w.now_ms = 1_900.0;
        resolve_ball(&mut w, DT);
        assert_eq!(w.player(me).unwrap().telegraph.charge, 1.0);

        w.apply_input(
            me,
            InputFrame {
                seq: 2,
                mouse_down: false,
                ..press
            },
        );
        w.now_ms = 1_916.0;
        resolve_ball(&mut w, DT);
        assert!(w.ball.is_loose());
        assert!((w.ball.speed() - w.tuning.max_throw_speed).abs() < 1e-2);
        assert!(w.ball.vel.x > 0.0);
    }
}
