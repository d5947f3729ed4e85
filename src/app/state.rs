//! Application state shared across routes

use std::sync::Arc;

use dashmap::DashMap;
use rand::random;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::game::{GameRoom, PlayerId, RoomHandle, World};

/// Live WebSocket connections, keyed by connection id
pub struct SessionRegistry {
    sessions: DashMap<Uuid, Option<PlayerId>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn open(&self) -> Uuid {
        let conn_id = Uuid::new_v4();
        self.sessions.insert(conn_id, None);
        conn_id
    }

    pub fn bind(&self, conn_id: Uuid, player_id: PlayerId) {
        if let Some(mut entry) = self.sessions.get_mut(&conn_id) {
            *entry = Some(player_id);
        }
    }

    pub fn player(&self, conn_id: &Uuid) -> Option<PlayerId> {
        self.sessions.get(conn_id).and_then(|entry| *entry.value())
    }

    pub fn close(&self, conn_id: &Uuid) -> Option<PlayerId> {
        self.sessions.remove(conn_id).and_then(|(_, player)| player)
    }

    /// Whether any open connection currently controls `player_id`
    pub fn is_bound(&self, player_id: PlayerId) -> bool {
        self.sessions.iter().any(|e| *e.value() == Some(player_id))
    }

    pub fn connected(&self) -> usize {
        self.sessions.len()
    }

    /// Connections that have completed a join
    pub fn joined(&self) -> usize {
        self.sessions.iter().filter(|e| e.value().is_some()).count()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub room: RoomHandle,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    /// Build the state plus the room task the caller must spawn
    pub fn new(config: Config) -> (Self, GameRoom) {
        let config = Arc::new(config);

        let seed = config.world_seed.unwrap_or_else(random);
        info!(seed, bots = config.bot_count, endless = config.endless_online, "Creating world");
        let world = World::new(config.tuning(), seed);

        let (room, handle) = GameRoom::new(world, config.room_settings());

        let state = Self {
            config,
            room: handle,
            sessions: Arc::new(SessionRegistry::new()),
        };
        (state, room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_track_join_binding() {
        let registry = SessionRegistry::new();
        let a = registry.open();
        let b = registry.open();
        assert_eq!(registry.connected(), 2);
        assert_eq!(registry.joined(), 0);

        let player = PlayerId::new_random();
        registry.bind(a, player);
        assert_eq!(registry.player(&a), Some(player));
        assert_eq!(registry.joined(), 1);

        assert!(registry.is_bound(player));

        // the same player resumed on a second connection outlives the first
        registry.bind(b, player);
        assert_eq!(registry.close(&a), Some(player));
        assert!(registry.is_bound(player));
        assert_eq!(registry.close(&b), Some(player));
        assert!(!registry.is_bound(player));
        assert_eq!(registry.connected(), 0);
    }
}
