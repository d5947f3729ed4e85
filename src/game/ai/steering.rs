//! Movement goals for non-throwing behaviors

use std::f32::consts::TAU;

use glam::Vec2;
use rand::Rng;

use super::params::*;
use crate::game::physics::{safe_normalize, Rect};
use crate::game::world::Ball;

/// Escape heading for a stuck bot.
///
/// Sums inward pushes from nearby arena edges, repulsion from nearby
/// obstacles, a push away from IT and a random component.
pub fn escape_direction(
    pos: Vec2,
    arena: Vec2,
    obstacles: &[Rect],
    it_pos: Option<Vec2>,
    rng: &mut impl Rng,
) -> Vec2 {
    let mut push = Vec2::ZERO;

    let edges = [
        (pos.x, Vec2::X),
        (arena.x - pos.x, Vec2::NEG_X),
        (pos.y, Vec2::Y),
        (arena.y - pos.y, Vec2::NEG_Y),
    ];
    for (dist, inward) in edges {
        if dist < EDGE_AVOID_DIST {
            push += inward * (1.0 - dist / EDGE_AVOID_DIST);
        }
    }

    for rect in obstacles {
        let closest = rect.closest_point(pos);
        let away = pos - closest;
        let dist = away.length();
        if dist >= OBSTACLE_AVOID_DIST {
            continue;
        }
        let center = rect.min() + (rect.max() - rect.min()) * 0.5;
        let dir = safe_normalize(away, safe_normalize(pos - center, Vec2::X));
        push += dir * (1.0 - dist / OBSTACLE_AVOID_DIST) * 1.2;
    }

    if let Some(it) = it_pos {
        let away = pos - it;
        let dist = away.length();
        if dist < PANIC_IT_PUSH_DIST {
            push += safe_normalize(away, Vec2::ZERO) * 0.8 * (1.0 - dist / PANIC_IT_PUSH_DIST);
        }
    }

    let angle = rng.gen_range(0.0..TAU);
    let random = Vec2::from_angle(angle);
    push += random * 0.9;

    safe_normalize(push, random)
}

/// Sidestep heading if `ball` is on a collision course with a body at `pos`.
///
/// The ball must be loose, armed, fast, thrown by someone else, ahead of
/// the body within a speed-scaled lead distance and within a narrow lane
/// around its line of travel.
pub fn dodge_heading(pos: Vec2, self_is_thrower: bool, ball: &Ball, contact: f32) -> Option<Vec2> {
    if !ball.is_loose() || !ball.armed || self_is_thrower {
        return None;
    }
    let speed = ball.speed();
    if !speed.is_finite() || speed <= DODGE_MIN_SPEED {
        return None;
    }
    let dir = ball.vel / speed;
    let rel = pos - ball.pos;
    let along = rel.dot(dir);
    let lead = (speed * DODGE_LEAD_SECS).min(DODGE_MAX_LEAD);
    if along <= 0.0 || along > lead {
        return None;
    }
    let lateral = dir.perp_dot(rel);
    if lateral.abs() >= contact + DODGE_MARGIN {
        return None;
    }
    // dead centre: break the tie to the left of travel
    let side = if lateral >= 0.0 { 1.0 } else { -1.0 };
    Some(dir.perp() * side)
}

/// Desired standoff from IT: closer for bold or trailing bots and during a
/// safe window (IT has no ball in hand).
pub fn farm_distance(risk: f32, safe_window: bool) -> f32 {
    let (sweet, far) = if safe_window {
        (FARM_SWEET_SAFE, FARM_FAR_SAFE)
    } else {
        (FARM_SWEET, FARM_FAR)
    };
    far + (sweet - far) * risk.clamp(0.0, 1.0)
}

/// Orbit IT at the desired distance with a sideways wobble.
pub fn farm_goal(pos: Vec2, it_pos: Vec2, desired: f32, wobble: f32) -> Vec2 {
    let to_it = it_pos - pos;
    let d = to_it.length();
    let n = safe_normalize(to_it, Vec2::X);
    let error = d - desired;
    let radial = if error.abs() < 12.0 {
        0.2 * error.signum()
    } else {
        error.signum()
    };
    n * radial + n.perp() * WOBBLE_AMPLITUDE * wobble
}

/// Back away from IT while curving to one side.
pub fn evade_goal(pos: Vec2, it_pos: Vec2, wobble: f32) -> Vec2 {
    let away = safe_normalize(pos - it_pos, Vec2::X);
    let side = if wobble >= 0.0 { 1.0 } else { -1.0 };
    away * 1.4 + away.perp() * 0.8 * side
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn thrown(pos: Vec2, vel: Vec2) -> Ball {
        Ball {
            vel,
            armed: true,
            ..Ball::at(pos)
        }
    }

    #[test]
    fn cornered_bot_escapes_inward() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let arena = Vec2::new(1200.0, 720.0);
        let mut inward = 0;
        for _ in 0..40 {
            let dir = escape_direction(Vec2::new(15.0, 15.0), arena, &[], None, &mut rng);
            assert!((dir.length() - 1.0).abs() < 1e-4);
            if dir.x > 0.0 && dir.y > 0.0 {
                inward += 1;
            }
        }
        assert!(inward > 25);
    }

    #[test]
    fn escape_never_yields_nan() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let rect = Rect::new(100.0, 100.0, 50.0, 50.0);
        // centre of an obstacle and on top of IT
        let pos = Vec2::new(125.0, 125.0);
        let dir = escape_direction(pos, Vec2::new(1200.0, 720.0), &[rect], Some(pos), &mut rng);
        assert!(dir.is_finite());
    }

    #[test]
    fn ball_on_course_triggers_tangent_dodge() {
        let ball = thrown(Vec2::new(100.0, 300.0), Vec2::new(600.0, 0.0));
        let dir = dodge_heading(Vec2::new(300.0, 305.0), false, &ball, 23.0).expect("threatened");
        assert!(dir.x.abs() < 1e-5);
        assert!(dir.y > 0.0);
    }

    #[test]
    fn no_dodge_when_behind_beside_or_slow() {
        let ball = thrown(Vec2::new(100.0, 300.0), Vec2::new(600.0, 0.0));
        assert!(dodge_heading(Vec2::new(50.0, 300.0), false, &ball, 23.0).is_none());
        assert!(dodge_heading(Vec2::new(300.0, 400.0), false, &ball, 23.0).is_none());
        assert!(dodge_heading(Vec2::new(300.0, 300.0), true, &ball, 23.0).is_none());

        let slow = thrown(Vec2::new(100.0, 300.0), Vec2::new(120.0, 0.0));
        assert!(dodge_heading(Vec2::new(130.0, 300.0), false, &slow, 23.0).is_none());

        let dead = Ball {
            armed: false,
            ..ball
        };
        assert!(dodge_heading(Vec2::new(300.0, 300.0), false, &dead, 23.0).is_none());
    }

    #[test]
    fn risk_pulls_standoff_closer() {
        assert_eq!(farm_distance(0.0, false), FARM_FAR);
        assert_eq!(farm_distance(1.0, false), FARM_SWEET);
        assert!(farm_distance(0.5, true) < farm_distance(0.5, false));
    }

    #[test]
    fn farm_goal_closes_distance_when_far() {
        let goal = farm_goal(Vec2::new(0.0, 0.0), Vec2::new(500.0, 0.0), 140.0, 0.0);
        assert!(goal.x > 0.0);
        let goal = farm_goal(Vec2::new(450.0, 0.0), Vec2::new(500.0, 0.0), 140.0, 0.0);
        assert!(goal.x < 0.0);
    }

    #[test]
    fn evade_moves_away() {
        let goal = evade_goal(Vec2::new(100.0, 100.0), Vec2::new(150.0, 100.0), 0.3);
        assert!(goal.x < 0.0);
    }
}
