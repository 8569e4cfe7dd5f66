use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use warp::ws::Message;

use super::protocol::ServerEvent;

/// Camera/microphone toggle state for one role in a room.
/// Devices start enabled; toggle events overwrite last-writer-wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceState {
    pub cam_on: bool,
    pub mic_on: bool,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            cam_on: true,
            mic_on: true,
        }
    }
}

struct Room {
    members: HashMap<String, mpsc::UnboundedSender<Message>>,
    interviewer_state: DeviceState,
    participant_state: DeviceState,
}

impl Room {
    fn new() -> Self {
        Self {
            members: HashMap::new(),
            interviewer_state: DeviceState::default(),
            participant_state: DeviceState::default(),
        }
    }
}

pub struct JoinOutcome {
    /// False when the connection was already a member (idempotent re-join).
    pub newly_joined: bool,
    /// The other members present at join time.
    pub peers: Vec<String>,
    pub interviewer_state: DeviceState,
    pub participant_state: DeviceState,
}

pub struct LeaveOutcome {
    pub room_id: String,
    /// Members left in the room after this departure.
    pub remaining: usize,
}

/// In-memory room membership and per-room broadcast state.
///
/// Device toggle state is kept here per room (not process-global) so
/// concurrent rooms do not observe each other's toggles.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Room>>,
    memberships: RwLock<HashMap<String, String>>,
}

impl RoomRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            rooms: RwLock::new(HashMap::new()),
            memberships: RwLock::new(HashMap::new()),
        })
    }

    /// Joins (or re-joins) a room, creating it on first use. A connection
    /// belongs to at most one room; joining a second room leaves the first.
    pub async fn join(
        &self,
        room_id: &str,
        conn_id: &str,
        sender: mpsc::UnboundedSender<Message>,
    ) -> JoinOutcome {
        let mut rooms = self.rooms.write().await;
        let mut memberships = self.memberships.write().await;

        if let Some(previous) = memberships.get(conn_id).cloned() {
            if previous != room_id {
                if let Some(room) = rooms.get_mut(&previous) {
                    room.members.remove(conn_id);
                    if room.members.is_empty() {
                        rooms.remove(&previous);
                    }
                }
                memberships.remove(conn_id);
                tracing::debug!(conn_id = %conn_id, room_id = %previous, "Left previous room on re-join");
            }
        }

        let room = rooms.entry(room_id.to_string()).or_insert_with(Room::new);
        let newly_joined = !room.members.contains_key(conn_id);
        let peers: Vec<String> = room
            .members
            .keys()
            .filter(|id| id.as_str() != conn_id)
            .cloned()
            .collect();

        room.members.insert(conn_id.to_string(), sender);
        memberships.insert(conn_id.to_string(), room_id.to_string());

        if newly_joined {
            tracing::info!(conn_id = %conn_id, room_id = %room_id, "Socket joined room");
        }

        JoinOutcome {
            newly_joined,
            peers,
            interviewer_state: room.interviewer_state,
            participant_state: room.participant_state,
        }
    }

    /// Removes a connection from its room. The room itself is dropped when
    /// the last member leaves.
    pub async fn leave(&self, conn_id: &str) -> Option<LeaveOutcome> {
        let mut rooms = self.rooms.write().await;
        let mut memberships = self.memberships.write().await;

        let room_id = memberships.remove(conn_id)?;
        let remaining = match rooms.get_mut(&room_id) {
            Some(room) => {
                room.members.remove(conn_id);
                let remaining = room.members.len();
                if remaining == 0 {
                    rooms.remove(&room_id);
                }
                remaining
            }
            None => 0,
        };

        tracing::info!(conn_id = %conn_id, room_id = %room_id, remaining = remaining, "Socket left room");

        Some(LeaveOutcome { room_id, remaining })
    }

    pub async fn room_of(&self, conn_id: &str) -> Option<String> {
        let memberships = self.memberships.read().await;
        memberships.get(conn_id).cloned()
    }

    pub async fn member_count(&self, room_id: &str) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(room_id).map(|r| r.members.len()).unwrap_or(0)
    }

    /// Sends an event to every member of a room.
    pub async fn broadcast(&self, room_id: &str, event: &ServerEvent) {
        let rooms = self.rooms.read().await;
        if let Some(room) = rooms.get(room_id) {
            if let Some(message) = encode(event) {
                for (conn_id, sender) in &room.members {
                    if sender.send(message.clone()).is_err() {
                        tracing::debug!(conn_id = %conn_id, "Dropping broadcast to closed connection");
                    }
                }
            }
        }
    }

    /// Sends an event to every member of a room except `except`.
    /// Relay events are never echoed to their sender.
    pub async fn send_to_others(&self, room_id: &str, except: &str, event: &ServerEvent) {
        let rooms = self.rooms.read().await;
        if let Some(room) = rooms.get(room_id) {
            if let Some(message) = encode(event) {
                for (conn_id, sender) in &room.members {
                    if conn_id != except && sender.send(message.clone()).is_err() {
                        tracing::debug!(conn_id = %conn_id, "Dropping relay to closed connection");
                    }
                }
            }
        }
    }

    pub async fn set_interviewer_state(&self, room_id: &str, state: DeviceState) {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get_mut(room_id) {
            room.interviewer_state = state;
        }
    }

    pub async fn set_participant_state(&self, room_id: &str, state: DeviceState) {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get_mut(room_id) {
            room.participant_state = state;
        }
    }

    pub async fn device_states(&self, room_id: &str) -> Option<(DeviceState, DeviceState)> {
        let rooms = self.rooms.read().await;
        rooms
            .get(room_id)
            .map(|r| (r.interviewer_state, r.participant_state))
    }
}

fn encode(event: &ServerEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Message::text(text)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize server event");
            None
        }
    }
}
