use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{RwLock, broadcast};

use crate::model::UserId;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("push channel unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct PushEvent {
    pub event: String,
    pub payload: Value,
}

impl PushEvent {
    /// Server-sent event frame.
    pub fn to_sse_frame(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event, self.payload)
    }
}

/// Fire-and-forget delivery to a user's live sessions.
#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn send_to_user(
        &self,
        user_id: UserId,
        event: &str,
        payload: &Value,
    ) -> Result<(), PushError>;
}

/// In-process fan-out: one broadcast channel per connected user, every open
/// stream of that user holds a receiver.
pub struct PushHub {
    channels: RwLock<HashMap<UserId, broadcast::Sender<PushEvent>>>,
    capacity: usize,
}

impl PushHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Opens a new session for `user_id` and sweeps channels whose sessions
    /// have all closed.
    pub async fn subscribe(&self, user_id: UserId) -> broadcast::Receiver<PushEvent> {
        let mut channels = self.channels.write().await;
        channels.retain(|_, tx| tx.receiver_count() > 0);
        channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    #[cfg(test)]
    pub async fn connection_count(&self, user_id: UserId) -> usize {
        self.channels
            .read()
            .await
            .get(&user_id)
            .map_or(0, |tx| tx.receiver_count())
    }
}

#[async_trait]
impl PushChannel for PushHub {
    async fn send_to_user(
        &self,
        user_id: UserId,
        event: &str,
        payload: &Value,
    ) -> Result<(), PushError> {
        let event = PushEvent {
            event: event.to_owned(),
            payload: payload.clone(),
        };

        let delivered = match self.channels.read().await.get(&user_id) {
            Some(tx) => tx.send(event).ok(),
            None => {
                tracing::debug!(user_id = user_id.0, "No live session, push skipped");
                return Ok(());
            }
        };

        match delivered {
            Some(sessions) => {
                tracing::debug!(user_id = user_id.0, sessions, "Pushed notification");
            }
            None => {
                // every stream of this user has gone away
                let mut channels = self.channels.write().await;
                if channels
                    .get(&user_id)
                    .is_some_and(|tx| tx.receiver_count() == 0)
                {
                    channels.remove(&user_id);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[actix_web::test]
    async fn delivers_to_every_session_of_the_user() {
        let hub = PushHub::new(8);
        let mut first = hub.subscribe(UserId(7)).await;
        let mut second = hub.subscribe(UserId(7)).await;
        let mut other = hub.subscribe(UserId(8)).await;

        hub.send_to_user(UserId(7), "ReceiveNotification", &json!({"message": "hi"}))
            .await
            .unwrap();

        assert_eq!(first.recv().await.unwrap().payload["message"], "hi");
        assert_eq!(second.recv().await.unwrap().event, "ReceiveNotification");
        assert!(other.try_recv().is_err());
    }

    #[actix_web::test]
    async fn offline_user_is_not_an_error() {
        let hub = PushHub::new(8);
        hub.send_to_user(UserId(1), "ReceiveNotification", &json!({}))
            .await
            .unwrap();
        assert_eq!(hub.connection_count(UserId(1)).await, 0);
    }

    #[actix_web::test]
    async fn drops_channel_once_all_sessions_close() {
        let hub = PushHub::new(8);
        let rx = hub.subscribe(UserId(3)).await;
        assert_eq!(hub.connection_count(UserId(3)).await, 1);
        drop(rx);

        hub.send_to_user(UserId(3), "ReceiveNotification", &json!({}))
            .await
            .unwrap();
        assert!(hub.channels.read().await.get(&UserId(3)).is_none());
    }

    #[actix_web::test]
    async fn subscribing_sweeps_abandoned_channels() {
        let hub = PushHub::new(8);
        let idle = hub.subscribe(UserId(5)).await;
        drop(idle);
        assert!(hub.channels.read().await.contains_key(&UserId(5)));

        let _live = hub.subscribe(UserId(6)).await;
        let channels = hub.channels.read().await;
        assert!(!channels.contains_key(&UserId(5)));
        assert_eq!(channels.get(&UserId(6)).map(|tx| tx.receiver_count()), Some(1));
    }

    #[test]
    fn sse_frame_layout() {
        let event = PushEvent {
            event: "ReceiveNotification".into(),
            payload: json!({"id": 1}),
        };
        assert_eq!(
            event.to_sse_frame(),
            "event: ReceiveNotification\ndata: {\"id\":1}\n\n"
        );
    }
}
