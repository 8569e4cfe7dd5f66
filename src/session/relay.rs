use std::sync::Arc;

use serde_json::Value;

use super::protocol::ServerEvent;
use super::registry::RoomRegistry;

/// Forwards WebRTC negotiation payloads between the peers of a room.
///
/// Payloads are opaque to the server: offers, answers and ICE candidates
/// pass through byte-for-byte, tagged with the sender's connection id so
/// the receiving peer can address its reply. The sender never receives
/// its own payload back.
pub struct SignalingRelay {
    registry: Arc<RoomRegistry>,
}

impl SignalingRelay {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    pub async fn relay_offer(&self, room_id: &str, from: &str, offer: Value) {
        tracing::debug!(room_id = %room_id, from = %from, "Relaying offer");
        self.registry
            .send_to_others(
                room_id,
                from,
                &ServerEvent::Offer {
                    offer,
                    from: from.to_string(),
                },
            )
            .await;
    }

    pub async fn relay_answer(&self, room_id: &str, from: &str, answer: Value) {
        tracing::debug!(room_id = %room_id, from = %from, "Relaying answer");
        self.registry
            .send_to_others(
                room_id,
                from,
                &ServerEvent::Answer {
                    answer,
                    from: from.to_string(),
                },
            )
            .await;
    }

    pub async fn relay_ice_candidate(&self, room_id: &str, from: &str, candidate: Value) {
        self.registry
            .send_to_others(
                room_id,
                from,
                &ServerEvent::IceCandidate {
                    candidate,
                    from: from.to_string(),
                },
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;
    use warp::ws::Message;

    async fn two_peer_room() -> (
        SignalingRelay,
        mpsc::UnboundedReceiver<Message>,
        mpsc::UnboundedReceiver<Message>,
    ) {
        let registry = RoomRegistry::new();
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        registry.join("room-1", "conn-a", tx_a).await;
        registry.join("room-1", "conn-b", tx_b).await;
        (SignalingRelay::new(registry), rx_a, rx_b)
    }

    fn decode(message: Message) -> serde_json::Value {
        serde_json::from_str(message.to_str().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_offer_is_relayed_verbatim_with_sender() {
        let (relay, mut rx_a, mut rx_b) = two_peer_room().await;

        let offer = json!({"sdp": "v=0...", "sdpType": "offer"});
        relay.relay_offer("room-1", "conn-a", offer.clone()).await;

        assert!(rx_a.try_recv().is_err());
        let received = decode(rx_b.try_recv().unwrap());
        assert_eq!(received["type"], "offer");
        assert_eq!(received["offer"], offer);
        assert_eq!(received["from"], "conn-a");
    }

    #[tokio::test]
    async fn test_ice_candidate_round() {
        let (relay, mut rx_a, mut rx_b) = two_peer_room().await;

        relay
            .relay_ice_candidate("room-1", "conn-b", json!({"candidate": "candidate:1"}))
            .await;

        assert!(rx_b.try_recv().is_err());
        let received = decode(rx_a.try_recv().unwrap());
        assert_eq!(received["type"], "ice-candidate");
        assert_eq!(received["from"], "conn-b");
    }

    #[tokio::test]
    async fn test_answer_to_empty_room_is_noop() {
        let registry = RoomRegistry::new();
        let relay = SignalingRelay::new(registry);
        relay.relay_answer("ghost", "conn-a", json!({})).await;
    }
}
