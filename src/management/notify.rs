use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::types::NotificationPayload;

const CHANNEL_CAPACITY: usize = 32;

/// Per-user fan-out of live notifications to connected sockets.
///
/// A channel exists only while at least one socket of the user is
/// subscribed; publishing to a user without one does nothing.
#[derive(Default)]
pub struct NotificationHub {
    channels: DashMap<u64, broadcast::Sender<NotificationPayload>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, user_id: u64) -> broadcast::Receiver<NotificationPayload> {
        self.channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Sends `payload` to every socket of `user_id` and returns how many
    /// received it.
    pub fn publish(&self, user_id: u64, payload: NotificationPayload) -> usize {
        match self.channels.get(&user_id) {
            Some(sender) => sender.send(payload).unwrap_or(0),
            None => 0,
        }
    }

    /// Drops the user's channel once the last socket has gone away.
    pub fn release(&self, user_id: u64) {
        self.channels
            .remove_if(&user_id, |_, sender| sender.receiver_count() == 0);
    }

    pub fn connected_users(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[tokio::test]
    async fn delivers_only_to_the_recipient() {
        let hub = NotificationHub::new();
        let mut owner = hub.subscribe(1);
        let mut other = hub.subscribe(2);

        let payload = NotificationPayload::playlist_like("bob", "Favorites", Utc::now());
        assert_eq!(hub.publish(1, payload.clone()), 1);

        assert_eq!(owner.recv().await.unwrap(), payload);
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn publishing_without_subscribers_is_a_no_op() {
        let hub = NotificationHub::new();
        let payload = NotificationPayload::playlist_like("bob", "Favorites", Utc::now());
        assert_eq!(hub.publish(9, payload), 0);
    }

    #[test]
    fn release_keeps_channels_with_live_receivers() {
        let hub = NotificationHub::new();
        let first = hub.subscribe(1);
        let _second = hub.subscribe(1);

        drop(first);
        hub.release(1);
        assert_eq!(hub.connected_users(), 1);
    }
}
