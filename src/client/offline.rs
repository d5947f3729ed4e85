//! Offline play: the full simulation run locally against bots

use crate::game::input::InputFrame;
use crate::game::sim;
use crate::game::snapshot::WorldSnapshot;
use crate::game::tuning::Tuning;
use crate::game::world::{PlayerId, World};

use super::prediction::MAX_STEP_SECS;
use super::session::Controls;

/// A local world with one human and the bot census
pub struct LocalGame {
    world: World,
    local_id: PlayerId,
    seq: u32,
}

impl LocalGame {
    pub fn new(tuning: Tuning, seed: u64, name: &str) -> Self {
        let mut world = World::new(tuning, seed);
        let id = PlayerId::from_rng(&mut world.rng);
        let local_id = world.add_human(id, name);
        Self {
            world,
            local_id,
            seq: 0,
        }
    }

    pub fn local_id(&self) -> PlayerId {
        self.local_id
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Feed the current controls; local input is always newest
    pub fn set_controls(&mut self, controls: Controls, now_ms: f64) {
        self.seq += 1;
        let frame = InputFrame {
            seq: self.seq,
            dirs: controls.dirs,
            aim: controls.aim,
            mouse_down: controls.mouse_down,
            space_down: controls.space_down,
            client_time: now_ms,
        };
        self.world.apply_input(self.local_id, frame);
    }

    /// Advance by a frame's wall time, clamped like prediction steps
    pub fn advance(&mut self, dt: f32) {
        if !dt.is_finite() {
            return;
        }
        let dt = dt.clamp(0.0, MAX_STEP_SECS);
        if dt > 0.0 {
            sim::step(&mut self.world, dt);
        }
    }

    pub fn reset(&mut self) {
        self.world.reset();
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::capture(&self.world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::input::DirectionalInput;
    use glam::Vec2;

    fn game() -> LocalGame {
        let tuning = Tuning {
            bot_count: 5,
            ..Tuning::default()
        };
        LocalGame::new(tuning, 2024, "solo")
    }

    #[test]
    fn local_human_moves_and_bots_play() {
        let mut game = game();
        game.world.obstacles.clear();
        let me = game.local_id();
        let start = game.world().player(me).unwrap().pos;
        let bot_starts: Vec<Vec2> = game
            .world()
            .players
            .iter()
            .filter(|p| !p.is_human())
            .map(|p| p.pos)
            .collect();

        for i in 0..30 {
            game.set_controls(
                Controls {
                    dirs: DirectionalInput {
                        up: start.y < 360.0,
                        down: start.y >= 360.0,
                        ..Default::default()
                    },
                    ..Default::default()
                },
                f64::from(i) * 16.0,
            );
            game.advance(1.0 / 60.0);
        }

        let snap = game.snapshot();
        let me_now = snap.player(me).unwrap();
        assert!((me_now.y - start.y).abs() > 10.0);
        let bots_moved = game
            .world()
            .players
            .iter()
            .filter(|p| !p.is_human())
            .zip(bot_starts)
            .filter(|(p, s)| p.pos.distance(*s) > 1.0)
            .count();
        assert!(bots_moved > 0);
        assert!(snap.invariant_violation().is_none());
    }

    #[test]
    fn same_seed_same_game() {
        let mut a = game();
        let mut b = game();
        for _ in 0..120 {
            a.advance(1.0 / 60.0);
            b.advance(1.0 / 60.0);
        }
        let (sa, sb) = (a.snapshot(), b.snapshot());
        assert_eq!(sa.players.len(), sb.players.len());
        for (pa, pb) in sa.players.iter().zip(&sb.players) {
            assert_eq!(pa.id, pb.id);
            assert_eq!((pa.x, pa.y), (pb.x, pb.y));
        }
    }

    #[test]
    fn new_game_has_one_local_human_and_full_census() {
        let game = game();
        let me = game.local_id();
        let humans: Vec<_> = game.world().players.iter().filter(|p| p.is_human()).map(|p| p.id).collect();
        assert_eq!(humans, vec![me]);
        assert_eq!(game.world().player(me).unwrap().name, "solo");
        assert_eq!(game.world().bot_count(), 5);
        assert!(game.world().it_id().is_some());
        assert!(game.snapshot().invariant_violation().is_none());
    }

    #[test]
    fn wild_frame_times_are_contained() {
        let mut game = game();
        game.advance(f32::NAN);
        game.advance(-1.0);
        assert_eq!(game.world().now_ms, 0.0);
        game.advance(5.0);
        assert!((game.world().now_ms - 50.0).abs() < 1e-3);
    }
}
