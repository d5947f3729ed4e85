//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::game::input::{DirectionalInput, InputFrame};
use crate::game::snapshot::WorldSnapshot;
use crate::game::world::PlayerId;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Enter the arena, or resume a previous identity
    Join {
        /// Rejoin token from an earlier welcome
        #[serde(default)]
        player_id: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },

    /// Latest input state
    Input(InputMsg),

    /// Restart the round for everyone
    Reset,
}

impl ClientMsg {
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Input sample; `seq` orders samples, `client_time` is only echoed
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputMsg {
    pub seq: u32,
    pub up: bool,
    pub dn: bool,
    pub lf: bool,
    pub rt: bool,
    /// Aim point in arena coordinates
    pub aim_x: Option<f32>,
    pub aim_y: Option<f32>,
    pub mouse_down: bool,
    pub space_down: bool,
    pub client_time: f64,
}

impl From<InputMsg> for InputFrame {
    fn from(msg: InputMsg) -> Self {
        let aim = match (msg.aim_x, msg.aim_y) {
            (Some(x), Some(y)) => Some(Vec2::new(x, y)),
            _ => None,
        };
        InputFrame {
            seq: msg.seq,
            dirs: DirectionalInput {
                up: msg.up,
                down: msg.dn,
                left: msg.lf,
                right: msg.rt,
            },
            aim,
            mouse_down: msg.mouse_down,
            space_down: msg.space_down,
            client_time: msg.client_time,
        }
    }
}

impl From<InputFrame> for InputMsg {
    fn from(frame: InputFrame) -> Self {
        InputMsg {
            seq: frame.seq,
            up: frame.dirs.up,
            dn: frame.dirs.down,
            lf: frame.dirs.left,
            rt: frame.dirs.right,
            aim_x: frame.aim.map(|a| a.x),
            aim_y: frame.aim.map(|a| a.y),
            mouse_down: frame.mouse_down,
            space_down: frame.space_down,
            client_time: frame.client_time,
        }
    }
}

/// Presence change kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceEvent {
    Join,
    Leave,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Reply to a join: assigned identity plus the current world
    Welcome {
        player_id: PlayerId,
        state: WorldSnapshot,
    },

    /// Periodic full-world broadcast
    State {
        state: WorldSnapshot,
    },

    /// Advisory join/leave notice
    Presence {
        event: PresenceEvent,
        player_id: PlayerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_join_with_and_without_token() {
        let msg = ClientMsg::decode(r#"{"type":"join","name":"Ada"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMsg::Join {
                player_id: None,
                name: Some("Ada".into())
            }
        );

        let msg = ClientMsg::decode(r#"{"type":"join","player_id":"abc"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Join { player_id: Some(ref id), .. } if id == "abc"));
    }

    #[test]
    fn decodes_sparse_input() {
        let msg = ClientMsg::decode(r#"{"type":"input","seq":7,"rt":true,"aim_x":10,"aim_y":20}"#).unwrap();
        let ClientMsg::Input(input) = msg else {
            panic!("expected input");
        };
        let frame = InputFrame::from(input);
        assert_eq!(frame.seq, 7);
        assert!(frame.dirs.right && !frame.dirs.left);
        assert_eq!(frame.aim, Some(Vec2::new(10.0, 20.0)));
        assert!(!frame.charging());
    }

    #[test]
    fn half_aim_is_no_aim() {
        let msg = InputMsg {
            aim_x: Some(3.0),
            ..Default::default()
        };
        assert_eq!(InputFrame::from(msg).aim, None);
    }

    #[test]
    fn rejects_unknown_and_malformed() {
        assert!(ClientMsg::decode(r#"{"type":"teleport"}"#).is_err());
        assert!(ClientMsg::decode(r#"{"seq":1}"#).is_err());
        assert!(ClientMsg::decode("not json").is_err());
        assert!(ClientMsg::decode(r#"{"type":"input","seq":"five"}"#).is_err());
    }

    #[test]
    fn presence_omits_missing_name() {
        let msg = ServerMsg::Presence {
            event: PresenceEvent::Leave,
            player_id: PlayerId::new_random(),
            name: None,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "presence");
        assert_eq!(value["event"], "leave");
        assert!(value.get("name").is_none());
    }
}
