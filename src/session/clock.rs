use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::protocol::ServerEvent;
use super::registry::RoomRegistry;

struct Meeting {
    started_at: Instant,
    ticker: JoinHandle<()>,
}

/// Per-room meeting timer.
///
/// Starting a meeting broadcasts `meeting-started` and spawns a ticker
/// that pushes `meeting-status` to the room once per second. Start and
/// stop are idempotent: a second start (or a stop with no meeting
/// running) changes nothing and broadcasts nothing.
pub struct MeetingClock {
    registry: Arc<RoomRegistry>,
    meetings: Mutex<HashMap<String, Meeting>>,
}

impl MeetingClock {
    pub fn new(registry: Arc<RoomRegistry>) -> Arc<Self> {
        Arc::new(Self {
            registry,
            meetings: Mutex::new(HashMap::new()),
        })
    }

    /// Returns true if a meeting was started.
    pub async fn start(&self, room_id: &str) -> bool {
        let mut meetings = self.meetings.lock().await;
        if meetings.contains_key(room_id) {
            tracing::debug!(room_id = %room_id, "Meeting already running, ignoring start");
            return false;
        }

        tracing::info!(room_id = %room_id, "Meeting started");
        self.registry
            .broadcast(room_id, &ServerEvent::MeetingStarted)
            .await;

        let started_at = Instant::now();
        let registry = Arc::clone(&self.registry);
        let room = room_id.to_string();
        // First status goes out a full second after the start broadcast.
        let ticker = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                registry
                    .broadcast(
                        &room,
                        &ServerEvent::MeetingStatus {
                            meeting_state: true,
                            elapsed_seconds: started_at.elapsed().as_secs(),
                        },
                    )
                    .await;
            }
        });

        meetings.insert(room_id.to_string(), Meeting { started_at, ticker });
        true
    }

    /// Returns true if a running meeting was stopped.
    pub async fn stop(&self, room_id: &str) -> bool {
        let mut meetings = self.meetings.lock().await;
        let Some(meeting) = meetings.remove(room_id) else {
            tracing::debug!(room_id = %room_id, "No meeting running, ignoring end");
            return false;
        };
        meeting.ticker.abort();
        drop(meetings);

        tracing::info!(room_id = %room_id, "Meeting ended");
        self.registry
            .broadcast(room_id, &ServerEvent::MeetingEnded)
            .await;
        true
    }

    /// Stops the ticker without broadcasting. Used when the last member
    /// of a room disconnects and there is no one left to notify.
    pub async fn halt(&self, room_id: &str) {
        let mut meetings = self.meetings.lock().await;
        if let Some(meeting) = meetings.remove(room_id) {
            meeting.ticker.abort();
            tracing::info!(room_id = %room_id, "Meeting ticker halted for empty room");
        }
    }

    /// Current clock state for late joiners.
    pub async fn status(&self, room_id: &str) -> (bool, u64) {
        let meetings = self.meetings.lock().await;
        match meetings.get(room_id) {
            Some(meeting) => (true, meeting.started_at.elapsed().as_secs()),
            None => (false, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use warp::ws::Message;

    async fn clocked_room() -> (Arc<MeetingClock>, mpsc::UnboundedReceiver<Message>) {
        let registry = RoomRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.join("room-1", "conn-a", tx).await;
        (MeetingClock::new(registry), rx)
    }

    fn drain_types(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<String> {
        let mut types = Vec::new();
        while let Ok(message) = rx.try_recv() {
            let value: serde_json::Value =
                serde_json::from_str(message.to_str().unwrap()).unwrap();
            types.push(value["type"].as_str().unwrap().to_string());
        }
        types
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (clock, mut rx) = clocked_room().await;

        assert!(clock.start("room-1").await);
        assert!(!clock.start("room-1").await);

        assert_eq!(drain_types(&mut rx), vec!["meeting-started"]);
        let (running, _) = clock.status("room-1").await;
        assert!(running);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (clock, mut rx) = clocked_room().await;

        assert!(!clock.stop("room-1").await);
        clock.start("room-1").await;
        assert!(clock.stop("room-1").await);
        assert!(!clock.stop("room-1").await);

        assert_eq!(drain_types(&mut rx), vec!["meeting-started", "meeting-ended"]);
        let (running, elapsed) = clock.status("room-1").await;
        assert!(!running);
        assert_eq!(elapsed, 0);
    }

    #[tokio::test]
    async fn test_halt_broadcasts_nothing() {
        let (clock, mut rx) = clocked_room().await;

        clock.start("room-1").await;
        clock.halt("room-1").await;

        assert_eq!(drain_types(&mut rx), vec!["meeting-started"]);
        let (running, _) = clock.status("room-1").await;
        assert!(!running);
    }

    #[tokio::test]
    async fn test_clocks_are_per_room() {
        let registry = RoomRegistry::new();
        let clock = MeetingClock::new(registry);

        clock.start("room-1").await;

        let (running, _) = clock.status("room-1").await;
        assert!(running);
        let (running, _) = clock.status("room-2").await;
        assert!(!running);

        clock.halt("room-1").await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_reports_elapsed_seconds() {
        let (clock, mut rx) = clocked_room().await;

        clock.start("room-1").await;
        // Paused clock: this sleep lets the ticker fire at t=1s and t=2s
        // without spending wall time.
        tokio::time::sleep(Duration::from_millis(2500)).await;

        let types = drain_types(&mut rx);
        assert_eq!(types[0], "meeting-started");
        assert!(types.len() >= 2);
        assert!(types[1..].iter().all(|t| t == "meeting-status"));

        clock.halt("room-1").await;
    }
}
