//! The authoritative arena task: fixed-rate stepping, state broadcast and
//! the connection lifecycle (join, input, reset, disconnect, prune)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::ws::protocol::{PresenceEvent, ServerMsg};

use super::input::InputFrame;
use super::sim;
use super::snapshot::WorldSnapshot;
use super::world::{PlayerId, World};

/// Rates and windows for a running room
#[derive(Debug, Clone, Copy)]
pub struct RoomSettings {
    pub tick_hz: u32,
    pub snap_hz: u32,
    pub disconnect_grace_ms: u64,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            tick_hz: 60,
            snap_hz: 20,
            disconnect_grace_ms: 30_000,
        }
    }
}

/// Requests the room task serves between ticks
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        desired_id: Option<String>,
        name: Option<String>,
        reply: oneshot::Sender<JoinAck>,
    },
    Input {
        player_id: PlayerId,
        frame: InputFrame,
    },
    Reset,
    Disconnect {
        player_id: PlayerId,
    },
}

/// Identity assigned on join plus the world as of that moment
#[derive(Debug, Clone)]
pub struct JoinAck {
    pub player_id: PlayerId,
    pub resumed: bool,
    pub state: WorldSnapshot,
}

/// Handle to the running room
#[derive(Clone)]
pub struct RoomHandle {
    cmd_tx: mpsc::Sender<RoomCommand>,
    broadcast_tx: broadcast::Sender<Arc<ServerMsg>>,
    humans: Arc<AtomicUsize>,
    bots: Arc<AtomicUsize>,
}

impl RoomHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ServerMsg>> {
        self.broadcast_tx.subscribe()
    }

    /// Join or resume. `None` once the room has stopped.
    pub async fn join(&self, desired_id: Option<String>, name: Option<String>) -> Option<JoinAck> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(RoomCommand::Join {
                desired_id,
                name,
                reply,
            })
            .await
            .ok()?;
        rx.await.ok()
    }

    /// Queue an input frame; a full queue drops it, the next frame supersedes it anyway
    pub fn send_input(&self, player_id: PlayerId, frame: InputFrame) {
        if let Err(mpsc::error::TrySendError::Full(_)) =
            self.cmd_tx.try_send(RoomCommand::Input { player_id, frame })
        {
            warn!(player_id = %player_id, "Room command queue full, dropping input");
        }
    }

    pub async fn reset(&self) {
        let _ = self.cmd_tx.send(RoomCommand::Reset).await;
    }

    pub async fn disconnect(&self, player_id: PlayerId) {
        let _ = self.cmd_tx.send(RoomCommand::Disconnect { player_id }).await;
    }

    pub fn human_count(&self) -> usize {
        self.humans.load(Ordering::Relaxed)
    }

    pub fn bot_count(&self) -> usize {
        self.bots.load(Ordering::Relaxed)
    }
}

/// Owns the world exclusively; everything else talks to it through [`RoomHandle`]
pub struct GameRoom {
    world: World,
    settings: RoomSettings,
    cmd_rx: mpsc::Receiver<RoomCommand>,
    broadcast_tx: broadcast::Sender<Arc<ServerMsg>>,
    humans: Arc<AtomicUsize>,
    bots: Arc<AtomicUsize>,
}

impl GameRoom {
    pub fn new(world: World, settings: RoomSettings) -> (Self, RoomHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(1024);
        let (broadcast_tx, _) = broadcast::channel(64);
        let humans = Arc::new(AtomicUsize::new(world.human_count()));
        let bots = Arc::new(AtomicUsize::new(world.bot_count()));

        let handle = RoomHandle {
            cmd_tx,
            broadcast_tx: broadcast_tx.clone(),
            humans: humans.clone(),
            bots: bots.clone(),
        };

        let room = Self {
            world,
            settings,
            cmd_rx,
            broadcast_tx,
            humans,
            bots,
        };

        (room, handle)
    }

    /// Run until every handle is dropped
    pub async fn run(mut self) {
        let tick_hz = self.settings.tick_hz.max(1);
        let snap_hz = self.settings.snap_hz.max(1);
        info!(tick_hz, snap_hz, "Room started");

        let dt = 1.0 / tick_hz as f32;
        let mut tick_interval = interval(Duration::from_secs_f64(1.0 / f64::from(tick_hz)));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut snap_interval = interval(Duration::from_secs_f64(1.0 / f64::from(snap_hz)));
        snap_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick_interval.tick() => self.tick(dt),
                _ = snap_interval.tick() => self.broadcast_state(),
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                },
            }
        }

        info!("Room stopped");
    }

    fn tick(&mut self, dt: f32) {
        sim::step(&mut self.world, dt);

        let pruned = self
            .world
            .prune_disconnected(self.settings.disconnect_grace_ms as f64);
        if !pruned.is_empty() {
            info!(count = pruned.len(), "Pruned disconnected players");
            self.update_census();
            for player_id in pruned {
                self.publish(ServerMsg::Presence {
                    event: PresenceEvent::Leave,
                    player_id,
                    name: None,
                });
            }
        }

        if cfg!(debug_assertions) {
            if let Some(violation) = self.world.invariant_violation() {
                warn!(?violation, "World invariant broken after tick");
            }
        }
    }

    fn handle(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                desired_id,
                name,
                reply,
            } => self.handle_join(desired_id, name, reply),
            RoomCommand::Input { player_id, frame } => {
                if !self.world.apply_input(player_id, frame) {
                    trace!(player_id = %player_id, seq = frame.seq, "Input rejected");
                }
            }
            RoomCommand::Reset => {
                self.world.reset();
                info!(
                    now_ms = self.world.now_ms,
                    players = self.world.players.len(),
                    it = ?self.world.it_id(),
                    "World reset"
                );
                self.update_census();
                self.broadcast_state();
            }
            RoomCommand::Disconnect { player_id } => {
                if self.world.mark_disconnected(player_id) {
                    info!(player_id = %player_id, "Player disconnected");
                    self.publish(ServerMsg::Presence {
                        event: PresenceEvent::Leave,
                        player_id,
                        name: None,
                    });
                }
            }
        }
    }

    fn handle_join(
        &mut self,
        desired_id: Option<String>,
        name: Option<String>,
        reply: oneshot::Sender<JoinAck>,
    ) {
        let name = name.unwrap_or_default();
        let resumed_id = desired_id
            .as_deref()
            .and_then(PlayerId::parse)
            .filter(|id| self.world.mark_reconnected(*id, &name));

        let player_id = match resumed_id {
            Some(id) => id,
            None => self.world.add_human(PlayerId::new_random(), &name),
        };
        let resumed = resumed_id.is_some();
        let shown_name = self
            .world
            .player(player_id)
            .map(|p| p.name.clone())
            .unwrap_or_default();

        info!(player_id = %player_id, name = %shown_name, resumed, "Player joined");
        self.update_census();

        let ack = JoinAck {
            player_id,
            resumed,
            state: WorldSnapshot::capture(&self.world),
        };
        if reply.send(ack).is_err() {
            debug!(player_id = %player_id, "Joining connection went away before welcome");
        }

        self.publish(ServerMsg::Presence {
            event: PresenceEvent::Join,
            player_id,
            name: Some(shown_name),
        });
    }

    fn broadcast_state(&self) {
        if self.broadcast_tx.receiver_count() == 0 {
            return;
        }
        self.publish(ServerMsg::State {
            state: WorldSnapshot::capture(&self.world),
        });
    }

    fn publish(&self, msg: ServerMsg) {
        // no subscribers is not an error
        let _ = self.broadcast_tx.send(Arc::new(msg));
    }

    fn update_census(&self) {
        self.humans.store(self.world.human_count(), Ordering::Relaxed);
        self.bots.store(self.world.bot_count(), Ordering::Relaxed);
    }
}
