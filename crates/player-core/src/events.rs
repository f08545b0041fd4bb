//! Player notifications and the queue that serializes them.
//!
//! Players may run their decode loops anywhere, but the session consumes
//! their notifications one at a time, in arrival order, on the thread that
//! owns both players. Each player gets a sender tagged with its slot.

use dualsync_common::clock::Side;
use image::RgbaImage;
use tokio::sync::mpsc::{self, error::TryRecvError};

/// Notification emitted by a player.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    /// A new image is on screen. `image` is the decoded frame alone,
    /// without the merge image.
    FrameProduced {
        frame: i64,
        image: Option<RgbaImage>,
    },

    /// The player could not produce the frame at all.
    FrameFailed { frame: i64, reason: String },

    /// The user paused this player individually and asks for a global pause.
    PauseRequested,

    /// Playback speed changed.
    SpeedChanged { percent: f64 },
}

/// Sending half handed to a player on attach.
#[derive(Debug, Clone)]
pub struct PlayerEventSender {
    side: Side,
    tx: mpsc::UnboundedSender<(Side, PlayerEvent)>,
}

impl PlayerEventSender {
    /// Slot this sender reports for.
    pub fn side(&self) -> Side {
        self.side
    }

    /// Queue an event. Returns false once the session is gone.
    pub fn send(&self, event: PlayerEvent) -> bool {
        match self.tx.send((self.side, event)) {
            Ok(()) => true,
            Err(_) => {
                tracing::debug!(side = self.side.as_str(), "Player event dropped, queue closed");
                false
            }
        }
    }
}

/// Arrival-ordered queue of player events owned by the session.
#[derive(Debug)]
pub struct PlayerEventQueue {
    tx: mpsc::UnboundedSender<(Side, PlayerEvent)>,
    rx: mpsc::UnboundedReceiver<(Side, PlayerEvent)>,
}

impl PlayerEventQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// A sender tagged with `side`.
    pub fn sender(&self, side: Side) -> PlayerEventSender {
        PlayerEventSender {
            side,
            tx: self.tx.clone(),
        }
    }

    /// Next queued event, if any.
    pub fn try_next(&mut self) -> Option<(Side, PlayerEvent)> {
        match self.rx.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Drop everything queued so far.
    pub fn clear(&mut self) -> usize {
        let mut dropped = 0;
        while self.try_next().is_some() {
            dropped += 1;
        }
        dropped
    }
}

impl Default for PlayerEventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_keep_arrival_order_and_side() {
        let mut queue = PlayerEventQueue::new();
        let left = queue.sender(Side::Left);
        let right = queue.sender(Side::Right);

        assert!(right.send(PlayerEvent::PauseRequested));
        assert!(left.send(PlayerEvent::SpeedChanged { percent: 50.0 }));

        assert!(matches!(
            queue.try_next(),
            Some((Side::Right, PlayerEvent::PauseRequested))
        ));
        assert!(matches!(
            queue.try_next(),
            Some((Side::Left, PlayerEvent::SpeedChanged { .. }))
        ));
        assert!(queue.try_next().is_none());
    }

    #[test]
    fn clear_discards_pending_events() {
        let mut queue = PlayerEventQueue::new();
        let left = queue.sender(Side::Left);
        left.send(PlayerEvent::PauseRequested);
        left.send(PlayerEvent::PauseRequested);
        assert_eq!(queue.clear(), 2);
        assert!(queue.try_next().is_none());
    }
}
