//! Online client session: input pacing, snapshot intake and inactivity
//!
//! Transport-agnostic: the caller feeds it decoded server messages and local
//! time, and sends whatever client messages it hands back.

use glam::Vec2;

use crate::game::input::{DirectionalInput, InputFrame};
use crate::game::snapshot::WorldSnapshot;
use crate::game::tuning::Tuning;
use crate::game::world::PlayerId;
use crate::ws::protocol::{ClientMsg, InputMsg, ServerMsg};

use super::interpolation::SnapshotBuffer;
use super::prediction::Predictor;

/// Input send period
pub const INPUT_INTERVAL_MS: f64 = 20.0;
/// Online players with no directional input for this long are sent home
pub const INACTIVITY_KICK_MS: f64 = 5000.0;

/// Local control state sampled when building an input message
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Controls {
    pub dirs: DirectionalInput,
    pub aim: Option<Vec2>,
    pub mouse_down: bool,
    pub space_down: bool,
}

#[derive(Debug, Clone)]
pub struct ClientSession {
    player_id: Option<PlayerId>,
    next_seq: u32,
    last_sent_at: Option<f64>,
    last_move_at: f64,
    predictor: Predictor,
    snapshots: SnapshotBuffer,
}

impl ClientSession {
    pub fn new(tuning: Tuning, now_ms: f64) -> Self {
        Self {
            player_id: None,
            next_seq: 0,
            last_sent_at: None,
            last_move_at: now_ms,
            predictor: Predictor::new(tuning),
            snapshots: SnapshotBuffer::new(),
        }
    }

    /// The first message on a fresh connection; `stored_id` resumes an earlier identity
    pub fn join_message(&mut self, stored_id: Option<PlayerId>, name: &str, now_ms: f64) -> ClientMsg {
        self.last_move_at = now_ms;
        ClientMsg::Join {
            player_id: stored_id.map(|id| id.to_string()),
            name: Some(name.to_string()),
        }
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.player_id
    }

    /// Welcomed and sending input
    pub fn is_ready(&self) -> bool {
        self.player_id.is_some()
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    pub fn snapshots(&self) -> &SnapshotBuffer {
        &self.snapshots
    }

    /// Take in a server message received at local time `recv_ms`
    pub fn handle_server(&mut self, msg: &ServerMsg, recv_ms: f64) {
        match msg {
            ServerMsg::Welcome { player_id, state } => {
                self.player_id = Some(*player_id);
                self.predictor.reset();
                self.snapshots.clear();
                self.last_sent_at = None;
                self.last_move_at = recv_ms;
                // a resumed identity keeps the server's high-water mark; older seqs are dropped
                if let Some(me) = state.player(*player_id) {
                    self.next_seq = self.next_seq.max(me.last_seq);
                }
                self.take_state(state, recv_ms);
            }
            ServerMsg::State { state } => self.take_state(state, recv_ms),
            ServerMsg::Presence { .. } => {}
        }
    }

    fn take_state(&mut self, state: &WorldSnapshot, recv_ms: f64) {
        self.snapshots.push(state.clone(), recv_ms);
        if let Some(me) = self.player_id {
            self.predictor.reconcile(state, me);
        }
    }

    /// Build the next input message if one is due at `now_ms`
    pub fn poll_input(&mut self, controls: Controls, now_ms: f64) -> Option<ClientMsg> {
        if !self.is_ready() {
            return None;
        }
        if self
            .last_sent_at
            .is_some_and(|at| now_ms - at < INPUT_INTERVAL_MS)
        {
            return None;
        }
        self.last_sent_at = Some(now_ms);

        if controls.dirs.any() {
            self.last_move_at = now_ms;
        }
        self.next_seq += 1;
        let seq = self.next_seq;
        self.predictor.record(seq, controls.dirs, now_ms);

        let frame = InputFrame {
            seq,
            dirs: controls.dirs,
            aim: controls.aim,
            mouse_down: controls.mouse_down,
            space_down: controls.space_down,
            client_time: now_ms,
        };
        Some(ClientMsg::Input(InputMsg::from(frame)))
    }

    pub fn is_inactive(&self, now_ms: f64) -> bool {
        self.is_ready() && now_ms - self.last_move_at > INACTIVITY_KICK_MS
    }

    /// World to draw at `now_ms`, with the local player predicted
    pub fn render(&self, now_ms: f64) -> Option<WorldSnapshot> {
        let local = self.player_id.zip(self.predictor.predicted());
        self.snapshots.sample(now_ms, local)
    }

    /// Drop the connection state. `next_seq` survives so a rejoin never reuses a sequence number.
    pub fn disconnect(&mut self) {
        self.player_id = None;
        self.predictor.reset();
        self.snapshots.clear();
        self.last_sent_at = None;
    }
}
