//! World and entity model: players, ball, obstacles, census and invariants

use std::fmt;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::ai::BotBrain;
use super::input::{HumanControl, InputFrame};
use super::physics::{PhysicsSystem, Rect};
use super::tuning::Tuning;

/// Timestamp used for "never happened"; far enough back to clear any cooldown
pub const NEVER_MS: f64 = -1e9;

/// Stable identity of a player; doubles as the human rejoin token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derive an id from a seeded RNG so seeded worlds stay reproducible
    pub fn from_rng(rng: &mut impl Rng) -> Self {
        Self(uuid::Builder::from_random_bytes(rng.gen()).into_uuid())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Throw wind-up shown to other clients
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Telegraph {
    pub aiming: bool,
    pub charge: f32,
    pub target: Vec2,
}

/// Who drives a player: a remote human or the decision engine
#[derive(Debug, Clone)]
pub enum Control {
    Human(HumanControl),
    Bot(Box<BotBrain>),
}

/// A participant in the arena
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,

    pub pos: Vec2,
    pub vel: Vec2,
    /// Unit facing direction
    pub facing: Vec2,

    pub is_it: bool,
    pub it_since: f64,

    pub score: f32,
    /// Cumulative time spent as IT
    pub furry_ms: f64,

    pub last_hit_at: f64,
    pub last_throw_at: f64,

    pub telegraph: Telegraph,
    pub control: Control,
}

impl Player {
    pub fn new(id: PlayerId, name: String, pos: Vec2, control: Control) -> Self {
        Self {
            id,
            name,
            pos,
            vel: Vec2::ZERO,
            facing: Vec2::X,
            is_it: false,
            it_since: NEVER_MS,
            score: 0.0,
            furry_ms: 0.0,
            last_hit_at: NEVER_MS,
            last_throw_at: NEVER_MS,
            telegraph: Telegraph {
                target: pos,
                ..Telegraph::default()
            },
            control,
        }
    }

    pub fn is_human(&self) -> bool {
        matches!(self.control, Control::Human(_))
    }

    pub fn human(&self) -> Option<&HumanControl> {
        match &self.control {
            Control::Human(h) => Some(h),
            Control::Bot(_) => None,
        }
    }

    pub fn human_mut(&mut self) -> Option<&mut HumanControl> {
        match &mut self.control {
            Control::Human(h) => Some(h),
            Control::Bot(_) => None,
        }
    }

    pub fn brain(&self) -> Option<&BotBrain> {
        match &self.control {
            Control::Bot(b) => Some(b),
            Control::Human(_) => None,
        }
    }

    pub fn is_disconnected(&self) -> bool {
        self.human().is_some_and(|h| !h.is_connected())
    }

    /// Last accepted input sequence (0 for bots)
    pub fn last_seq(&self) -> u32 {
        self.human().map(|h| h.input.seq).unwrap_or(0)
    }

    pub fn clear_telegraph(&mut self) {
        self.telegraph.aiming = false;
        self.telegraph.charge = 0.0;
    }
}

/// The single ball
#[derive(Debug, Clone, PartialEq)]
pub struct Ball {
    pub pos: Vec2,
    pub vel: Vec2,
    pub held_by: Option<PlayerId>,
    pub last_thrower: Option<PlayerId>,
    /// Can transfer IT on contact
    pub armed: bool,
    pub thrown_at: f64,
}

impl Ball {
    pub fn at(pos: Vec2) -> Self {
        Self {
            pos,
            vel: Vec2::ZERO,
            held_by: None,
            last_thrower: None,
            armed: false,
            thrown_at: NEVER_MS,
        }
    }

    pub fn speed(&self) -> f32 {
        self.vel.length()
    }

    pub fn is_loose(&self) -> bool {
        self.held_by.is_none()
    }
}

/// Structural invariant that failed a check
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("expected exactly one IT player, found {0}")]
    ItCount(usize),

    #[error("ball held by {holder} but IT is {it:?}")]
    BallHolder {
        holder: PlayerId,
        it: Option<PlayerId>,
    },

    #[error("player {0} is outside the arena")]
    OutOfBounds(PlayerId),
}

/// The authoritative simulation context
pub struct World {
    pub tuning: Tuning,
    /// Simulation clock, advanced only by fixed steps
    pub now_ms: f64,
    pub players: Vec<Player>,
    pub ball: Ball,
    pub obstacles: Vec<Rect>,
    /// Finite-match terminal state
    pub over: bool,
    pub winner_id: Option<PlayerId>,
    pub rng: ChaCha8Rng,
    bots_spawned: u32,
}

impl World {
    pub fn new(tuning: Tuning, seed: u64) -> Self {
        let center = Vec2::new(tuning.arena_w * 0.5, tuning.arena_h * 0.5);
        let obstacles = Self::default_obstacles(tuning.arena_w, tuning.arena_h);
        let mut world = Self {
            tuning,
            now_ms: 0.0,
            players: Vec::new(),
            ball: Ball::at(center),
            obstacles,
            over: false,
            winner_id: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
            bots_spawned: 0,
        };
        world.reset();
        world
    }

    /// Central cross plus two side blocks
    pub fn default_obstacles(w: f32, h: f32) -> Vec<Rect> {
        vec![
            Rect::centered(w * 0.50, h * 0.50, 140.0, 36.0),
            Rect::centered(w * 0.50, h * 0.50, 36.0, 140.0),
            Rect::centered(w * 0.18, h * 0.30, 88.0, 56.0),
            Rect::centered(w * 0.82, h * 0.70, 88.0, 56.0),
        ]
    }

    pub fn arena_size(&self) -> Vec2 {
        Vec2::new(self.tuning.arena_w, self.tuning.arena_h)
    }

    pub fn center(&self) -> Vec2 {
        self.arena_size() * 0.5
    }

    /// Reinitialize a round: keep humans, fresh bots and scores, random IT.
    ///
    /// The clock keeps running so timestamps stay monotonic for clients.
    pub fn reset(&mut self) {
        self.over = false;
        self.winner_id = None;
        self.obstacles = Self::default_obstacles(self.tuning.arena_w, self.tuning.arena_h);

        self.players.retain(|p| p.is_human());
        self.bots_spawned = 0;
        for p in &mut self.players {
            p.is_it = false;
            p.it_since = NEVER_MS;
            p.score = 0.0;
            p.furry_ms = 0.0;
            p.last_hit_at = NEVER_MS;
            p.last_throw_at = NEVER_MS;
            if let Some(h) = p.human_mut() {
                h.was_mouse_down = false;
                h.was_space_down = false;
                h.mouse_down_at = 0.0;
                h.space_down_at = 0.0;
            }
        }
        self.top_up_bots();

        self.ball = Ball::at(self.center());
        if !self.players.is_empty() {
            let idx = self.rng.gen_range(0..self.players.len());
            let id = self.players[idx].id;
            self.set_it(id);
        }

        for p in &mut self.players {
            p.clear_telegraph();
            p.telegraph.target = p.pos;
        }

    }

    pub fn it_index(&self) -> Option<usize> {
        self.players.iter().position(|p| p.is_it)
    }

    pub fn it_id(&self) -> Option<PlayerId> {
        self.it_index().map(|i| self.players[i].id)
    }

    pub fn index_of(&self, id: PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn human_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_human()).count()
    }

    pub fn bot_count(&self) -> usize {
        self.players.len() - self.human_count()
    }

    pub fn max_score(&self) -> f32 {
        self.players.iter().map(|p| p.score).fold(0.0, f32::max)
    }

    /// Make `id` the only IT and put the ball in their hand.
    pub fn set_it(&mut self, id: PlayerId) {
        let now = self.now_ms;
        for p in &mut self.players {
            let was_it = p.is_it;
            p.is_it = p.id == id;
            if p.is_it && !was_it {
                p.it_since = now;
            }
            if !p.is_it {
                p.clear_telegraph();
            }
        }
        if let Some(pos) = self.player(id).map(|p| p.pos) {
            self.ball.pos = pos;
        }
        self.ball.held_by = Some(id);
        self.ball.last_thrower = None;
        self.ball.armed = false;
        self.ball.vel = Vec2::ZERO;
        debug!(player_id = %id, "IT transferred");
    }

    /// Repair the IT census: none gets a random IT, several keep the first.
    pub fn ensure_single_it(&mut self) {
        let count = self.players.iter().filter(|p| p.is_it).count();
        if count == 1 || self.players.is_empty() {
            return;
        }
        if count == 0 {
            let idx = self.rng.gen_range(0..self.players.len());
            let id = self.players[idx].id;
            debug!(player_id = %id, "No IT present, assigning one");
            self.set_it(id);
            return;
        }
        let mut seen = false;
        for p in &mut self.players {
            if p.is_it {
                p.is_it = !seen;
                seen = true;
            }
        }
        debug!(count, "Several IT players, keeping the first");
    }

    fn spawn_point(&mut self) -> Vec2 {
        let pad = self.tuning.spawn_padding;
        let w = self.tuning.arena_w;
        let h = self.tuning.arena_h;
        let x = if w > pad * 2.0 {
            self.rng.gen_range(pad..w - pad)
        } else {
            w * 0.5
        };
        let y = if h > pad * 2.0 {
            self.rng.gen_range(pad..h - pad)
        } else {
            h * 0.5
        };
        Vec2::new(x, y)
    }

    fn clean_name(&self, name: &str) -> String {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return "Player".to_string();
        }
        trimmed.chars().take(self.tuning.max_name_len).collect()
    }

    /// Add a human at the front of the roster.
    pub fn add_human(&mut self, id: PlayerId, name: &str) -> PlayerId {
        let pos = self.spawn_point();
        let name = self.clean_name(name);
        let player = Player::new(id, name, pos, Control::Human(HumanControl::default()));
        self.players.insert(0, player);
        if self.it_index().is_none() {
            self.set_it(id);
        }
        id
    }

    fn spawn_bot(&mut self) {
        let id = PlayerId::from_rng(&mut self.rng);
        let pos = self.spawn_point();
        let seed = self.rng.gen();
        self.bots_spawned += 1;
        let name = format!("Bot {}", self.bots_spawned);
        self.players.push(Player::new(
            id,
            name,
            pos,
            Control::Bot(Box::new(BotBrain::new(seed))),
        ));
    }

    /// Bring the bot census back up to `tuning.bot_count`.
    pub fn top_up_bots(&mut self) {
        while self.bot_count() < self.tuning.bot_count {
            self.spawn_bot();
        }
    }

    /// Remove a player for good, repairing IT and the bot census.
    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        let idx = self.index_of(id)?;
        let removed = self.players.remove(idx);

        if self.ball.last_thrower == Some(id) {
            self.ball.last_thrower = None;
        }
        self.top_up_bots();

        // humans first, bots after
        self.players.sort_by_key(|p| !p.is_human());

        if self.it_index().is_none() && !self.players.is_empty() {
            let next = self.players[self.rng.gen_range(0..self.players.len())].id;
            self.set_it(next);
        } else if self.ball.held_by == Some(id) {
            if let Some(it) = self.it_id() {
                self.ball.held_by = Some(it);
            }
        }
        if self.players.is_empty() {
            self.ball.held_by = None;
        }

        info!(player_id = %id, name = %removed.name, "Player removed");
        Some(removed)
    }

    /// Accept a human input frame if it is newer than the last one.
    pub fn apply_input(&mut self, id: PlayerId, mut frame: InputFrame) -> bool {
        let size = self.arena_size();
        let Some(human) = self.player_mut(id).and_then(Player::human_mut) else {
            return false;
        };
        frame.aim = frame
            .aim
            .filter(|a| a.is_finite())
            .map(|a| a.clamp(Vec2::ZERO, size));
        if !frame.client_time.is_finite() {
            frame.client_time = 0.0;
        }
        if !human.accept(frame) {
            return false;
        }
        // fresh input means a live connection, whatever a late close said
        if human.disconnected_at.take().is_some() {
            debug!(player_id = %id, "Input from a player marked disconnected, reviving");
        }
        true
    }

    pub fn mark_disconnected(&mut self, id: PlayerId) -> bool {
        let now = self.now_ms;
        match self.player_mut(id).and_then(Player::human_mut) {
            Some(h) => {
                h.disconnected_at = Some(now);
                h.release_all();
                true
            }
            None => false,
        }
    }

    pub fn mark_reconnected(&mut self, id: PlayerId, name: &str) -> bool {
        let name = self.clean_name(name);
        match self.player_mut(id) {
            Some(p) if p.is_human() => {
                p.name = name;
                if let Some(h) = p.human_mut() {
                    h.disconnected_at = None;
                }
                true
            }
            _ => false,
        }
    }

    /// Remove humans disconnected for longer than `grace_ms`.
    pub fn prune_disconnected(&mut self, grace_ms: f64) -> Vec<PlayerId> {
        let now = self.now_ms;
        let expired: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|p| {
                p.human()
                    .and_then(|h| h.disconnected_at)
                    .is_some_and(|at| now - at > grace_ms)
            })
            .map(|p| p.id)
            .collect();

        for id in &expired {
            self.remove_player(*id);
        }
        expired
    }

    /// Clamp a body into the arena and push it out of obstacles.
    ///
    /// The velocity component into an obstacle is removed and the rest
    /// damped. A final clamp keeps obstacle pushes inside the arena.
    pub fn keep_in_bounds(&self, pos: &mut Vec2, vel: &mut Vec2) {
        let r = self.tuning.player_radius;
        let lo = Vec2::splat(r);
        let hi = self.arena_size() - Vec2::splat(r);
        *pos = pos.clamp(lo, hi);

        for rect in &self.obstacles {
            let Some(hit) = PhysicsSystem::resolve_circle_penetration(*pos, r, rect) else {
                continue;
            };
            *pos += hit.normal * hit.depth;
            let vn = vel.dot(hit.normal);
            if vn < 0.0 {
                *vel -= hit.normal * vn;
                *vel *= self.tuning.obstacle_slide_damping;
            }
        }

        *pos = pos.clamp(lo, hi);
    }

    pub fn in_arena(&self, pos: Vec2, radius: f32) -> bool {
        let eps = 1e-3;
        pos.x >= radius - eps
            && pos.y >= radius - eps
            && pos.x <= self.tuning.arena_w - radius + eps
            && pos.y <= self.tuning.arena_h - radius + eps
    }

    /// First structural invariant that does not hold, if any
    pub fn invariant_violation(&self) -> Option<InvariantViolation> {
        if self.players.is_empty() {
            return None;
        }
        let it_count = self.players.iter().filter(|p| p.is_it).count();
        if it_count != 1 {
            return Some(InvariantViolation::ItCount(it_count));
        }
        let it = self.it_id();
        if let Some(holder) = self.ball.held_by {
            if Some(holder) != it {
                return Some(InvariantViolation::BallHolder { holder, it });
            }
        }
        self.players
            .iter()
            .find(|p| !self.in_arena(p.pos, self.tuning.player_radius))
            .map(|p| InvariantViolation::OutOfBounds(p.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> World {
        World::new(Tuning::default(), 7)
    }

    #[test]
    fn new_world_fills_bot_census_with_one_it() {
        let w = world();
        assert_eq!(w.bot_count(), 14);
        assert_eq!(w.players.iter().filter(|p| p.is_it).count(), 1);
        assert_eq!(w.ball.held_by, w.it_id());
        assert!(w.invariant_violation().is_none());
    }

    #[test]
    fn same_seed_builds_same_roster() {
        let a = world();
        let b = world();
        let ids_a: Vec<_> = a.players.iter().map(|p| (p.id, p.pos)).collect();
        let ids_b: Vec<_> = b.players.iter().map(|p| (p.id, p.pos)).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn humans_join_at_front_with_clean_names() {
        let mut w = world();
        let id = w.add_human(PlayerId::new_random(), "   ");
        assert_eq!(w.players[0].id, id);
        assert_eq!(w.players[0].name, "Player");

        let long = "x".repeat(40);
        let id2 = w.add_human(PlayerId::new_random(), &long);
        assert_eq!(w.player(id2).map(|p| p.name.len()), Some(24));
    }

    #[test]
    fn first_human_in_empty_world_becomes_it() {
        let tuning = Tuning {
            bot_count: 0,
            ..Tuning::default()
        };
        let mut w = World::new(tuning, 1);
        assert!(w.it_id().is_none());
        let id = w.add_human(PlayerId::new_random(), "solo");
        assert_eq!(w.it_id(), Some(id));
        assert_eq!(w.ball.held_by, Some(id));
    }

    #[test]
    fn set_it_moves_role_and_ball_together() {
        let mut w = world();
        let target = w.players.iter().find(|p| !p.is_it).map(|p| p.id).unwrap();
        w.now_ms = 1234.0;
        w.set_it(target);
        assert_eq!(w.it_id(), Some(target));
        assert_eq!(w.ball.held_by, Some(target));
        assert_eq!(w.player(target).unwrap().it_since, 1234.0);
        assert!(w.invariant_violation().is_none());
    }

    #[test]
    fn ensure_single_it_repairs_missing_role() {
        let mut w = world();
        for p in &mut w.players {
            p.is_it = false;
        }
        w.ensure_single_it();
        assert_eq!(w.players.iter().filter(|p| p.is_it).count(), 1);
        assert_eq!(w.ball.held_by, w.it_id());
    }

    #[test]
    fn removing_it_reassigns_and_tops_up_bots() {
        let mut w = world();
        let it = w.it_id().unwrap();
        w.remove_player(it);
        assert!(w.player(it).is_none());
        assert_eq!(w.bot_count(), 14);
        assert!(w.invariant_violation().is_none());
    }

    #[test]
    fn input_aim_is_clamped_to_arena() {
        let mut w = world();
        let id = w.add_human(PlayerId::new_random(), "aim");
        let accepted = w.apply_input(
            id,
            InputFrame {
                seq: 1,
                aim: Some(Vec2::new(-50.0, 9000.0)),
                ..Default::default()
            },
        );
        assert!(accepted);
        let aim = w.player(id).and_then(|p| p.human()).and_then(|h| h.input.aim);
        assert_eq!(aim, Some(Vec2::new(0.0, 720.0)));
    }

    #[test]
    fn bots_ignore_input() {
        let mut w = world();
        let bot = w.players.iter().find(|p| !p.is_human()).map(|p| p.id).unwrap();
        assert!(!w.apply_input(bot, InputFrame { seq: 1, ..Default::default() }));
    }

    #[test]
    fn prune_waits_for_grace_window() {
        let mut w = world();
        let id = w.add_human(PlayerId::new_random(), "leaver");
        w.now_ms = 1000.0;
        assert!(w.mark_disconnected(id));
        w.now_ms = 20_000.0;
        assert!(w.prune_disconnected(30_000.0).is_empty());
        w.now_ms = 31_001.0;
        assert_eq!(w.prune_disconnected(30_000.0), vec![id]);
        assert!(w.player(id).is_none());
    }

    #[test]
    fn reconnect_clears_disconnect_mark() {
        let mut w = world();
        let id = w.add_human(PlayerId::new_random(), "flaky");
        w.mark_disconnected(id);
        assert!(w.player(id).unwrap().is_disconnected());
        assert!(w.mark_reconnected(id, "back"));
        let p = w.player(id).unwrap();
        assert!(!p.is_disconnected());
        assert_eq!(p.name, "back");
    }

    #[test]
    fn accepted_input_revives_a_disconnected_human() {
        let mut w = world();
        let id = w.add_human(PlayerId::new_random(), "blip");
        w.mark_disconnected(id);
        assert!(!w.apply_input(id, InputFrame::default()));
        assert!(w.player(id).unwrap().is_disconnected());

        assert!(w.apply_input(id, InputFrame { seq: 1, ..Default::default() }));
        assert!(!w.player(id).unwrap().is_disconnected());
        w.now_ms = 60_000.0;
        assert!(w.prune_disconnected(30_000.0).is_empty());
    }

    #[test]
    fn reset_keeps_humans_and_clears_scores() {
        let mut w = world();
        let id = w.add_human(PlayerId::new_random(), "keeper");
        w.player_mut(id).unwrap().score = 55.0;
        w.now_ms = 5000.0;
        w.reset();
        assert_eq!(w.player(id).map(|p| p.score), Some(0.0));
        assert_eq!(w.bot_count(), 14);
        assert_eq!(w.now_ms, 5000.0);
        assert!(w.invariant_violation().is_none());
    }

    #[test]
    fn keep_in_bounds_clamps_and_clears_obstacles() {
        let w = world();
        let mut pos = Vec2::new(-100.0, 5000.0);
        let mut vel = Vec2::ZERO;
        w.keep_in_bounds(&mut pos, &mut vel);
        assert!(w.in_arena(pos, w.tuning.player_radius));

        // inside the central cross
        let mut pos = w.center();
        let mut vel = Vec2::new(10.0, 0.0);
        w.keep_in_bounds(&mut pos, &mut vel);
        assert!(w.obstacles.iter().all(|rect| !rect.contains(pos)));
    }
}
