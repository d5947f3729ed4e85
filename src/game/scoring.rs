//! Proximity scoring, IT bleed and the finite-match win check

use tracing::info;

use super::world::World;

/// Share of the proximity rate earned at distance `d` from IT
pub fn closeness(d: f32, max_dist: f32, exponent: f32) -> f32 {
    if max_dist <= 0.0 {
        return 0.0;
    }
    (1.0 - d / max_dist).clamp(0.0, 1.0).powf(exponent)
}

/// Accrue one tick of score.
///
/// Non-IT players earn points for staying close to IT; IT bleeds points
/// at a fixed rate and accumulates IT time. Scores floor at zero. In
/// finite mode the first player to reach the win threshold ends the match.
pub fn accrue(world: &mut World, dt: f32) {
    let t = &world.tuning;
    let (rate, max_dist, exponent, bleed) = (
        t.prox_points_per_sec,
        t.prox_max_dist,
        t.prox_exponent,
        t.it_bleed_points_per_sec,
    );
    let it_pos = world.it_index().map(|i| world.players[i].pos);

    for p in &mut world.players {
        if p.is_it {
            p.furry_ms += f64::from(dt) * 1000.0;
            p.score = (p.score - bleed * dt).max(0.0);
        } else if let Some(it_pos) = it_pos {
            p.score += rate * closeness(p.pos.distance(it_pos), max_dist, exponent) * dt;
        }
    }

    if world.tuning.endless || world.over {
        return;
    }
    let win = world.tuning.win_points;
    if let Some(winner) = world.players.iter().find(|p| p.score >= win) {
        world.over = true;
        world.winner_id = Some(winner.id);
        info!(winner = %winner.id, name = %winner.name, "Match won");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tuning::Tuning;
    use glam::Vec2;

    fn world(endless: bool) -> World {
        let tuning = Tuning {
            bot_count: 3,
            endless,
            ..Tuning::default()
        };
        World::new(tuning, 5)
    }

    #[test]
    fn closeness_is_superlinear_and_bounded() {
        assert_eq!(closeness(0.0, 260.0, 1.6), 1.0);
        assert_eq!(closeness(300.0, 260.0, 1.6), 0.0);
        let half = closeness(130.0, 260.0, 1.6);
        assert!(half < 0.5 && half > 0.0);
    }

    #[test]
    fn near_players_earn_and_it_bleeds() {
        let mut w = world(true);
        let it = w.it_index().unwrap();
        let others: Vec<usize> = (0..w.players.len()).filter(|i| *i != it).collect();
        w.players[it].pos = Vec2::new(600.0, 360.0);
        w.players[it].score = 10.0;
        w.players[others[0]].pos = Vec2::new(640.0, 360.0);
        w.players[others[1]].pos = Vec2::new(100.0, 100.0);

        accrue(&mut w, 0.5);
        assert!((w.players[it].score - 7.0).abs() < 1e-4);
        assert!((w.players[it].furry_ms - 500.0).abs() < 1e-6);
        assert!(w.players[others[0]].score > 0.0);
        assert_eq!(w.players[others[1]].score, 0.0);
    }

    #[test]
    fn it_score_floors_at_zero() {
        let mut w = world(true);
        let it = w.it_index().unwrap();
        w.players[it].score = 1.0;
        accrue(&mut w, 2.0);
        assert_eq!(w.players[it].score, 0.0);
    }

    #[test]
    fn finite_mode_declares_winner_once() {
        let mut w = world(false);
        let runner = w.players.iter().position(|p| !p.is_it).unwrap();
        w.players[runner].score = 100.0;
        accrue(&mut w, 0.016);
        assert!(w.over);
        assert_eq!(w.winner_id, Some(w.players[runner].id));
    }

    #[test]
    fn endless_mode_never_ends() {
        let mut w = world(true);
        let runner = w.players.iter().position(|p| !p.is_it).unwrap();
        w.players[runner].score = 500.0;
        accrue(&mut w, 0.016);
        assert!(!w.over);
    }
}
