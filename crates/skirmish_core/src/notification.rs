//! User-visible events raised by the simulation.
//!
//! The core never formats output for a client. It hands
//! [`Notification`]s to a [`NotificationSink`] supplied by the hosting
//! layer.

use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};

use crate::entity::PlayerId;

/// Broad topic of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationCategory {
    /// Income and spending.
    Economy,
    /// Research progress.
    Research,
    /// Attacks and losses.
    Combat,
    /// Units produced.
    Production,
}

/// One message addressed to one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Recipient.
    pub player: PlayerId,
    /// Topic.
    pub category: NotificationCategory,
    /// Human-readable text.
    pub message: String,
}

/// Receiver of notifications.
pub trait NotificationSink: Send {
    /// Deliver a notification. Must not block.
    fn notify(&mut self, notification: Notification);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&mut self, _notification: Notification) {}
}

/// Collects notifications in memory.
#[derive(Debug, Clone, Default)]
pub struct VecSink {
    /// Everything received, in order.
    pub received: Vec<Notification>,
}

impl NotificationSink for VecSink {
    fn notify(&mut self, notification: Notification) {
        self.received.push(notification);
    }
}

impl NotificationSink for Sender<Notification> {
    fn notify(&mut self, notification: Notification) {
        // A hung-up receiver just means nobody is listening any more.
        let _ = self.send(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(message: &str) -> Notification {
        Notification {
            player: PlayerId(1),
            category: NotificationCategory::Economy,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_vec_sink_keeps_order() {
        let mut sink = VecSink::default();
        sink.notify(note("a"));
        sink.notify(note("b"));
        assert_eq!(sink.received, vec![note("a"), note("b")]);
    }

    #[test]
    fn test_channel_sink() {
        let (mut tx, rx) = std::sync::mpsc::channel();
        tx.notify(note("interest"));
        assert_eq!(rx.recv().unwrap(), note("interest"));
        drop(rx);
        tx.notify(note("ignored"));
    }
}
