//! Scoped ownership of the two synchronized players.

use dualsync_common::clock::Side;

use crate::events::PlayerEventQueue;
use crate::PlayerHandle;

/// Two players subscribed to a session's event queue.
///
/// Attaching happens on construction. Players are detached by
/// [`AttachedPair::detach`] or, failing that, when the pair is dropped, so
/// a session can never leave a subscription behind.
pub struct AttachedPair<P: PlayerHandle> {
    players: Option<(P, P)>,
}

impl<P: PlayerHandle> AttachedPair<P> {
    /// Subscribe both players to `queue`.
    pub fn attach(mut left: P, mut right: P, queue: &PlayerEventQueue) -> Self {
        left.attach(queue.sender(Side::Left));
        right.attach(queue.sender(Side::Right));
        tracing::debug!(left = left.name(), right = right.name(), "Players attached");
        Self {
            players: Some((left, right)),
        }
    }

    pub fn get(&self, side: Side) -> &P {
        let (left, right) = self.inner();
        match side {
            Side::Left => left,
            Side::Right => right,
        }
    }

    pub fn get_mut(&mut self, side: Side) -> &mut P {
        let (left, right) = self.inner_mut();
        match side {
            Side::Left => left,
            Side::Right => right,
        }
    }

    pub fn left(&self) -> &P {
        self.get(Side::Left)
    }

    pub fn right(&self) -> &P {
        self.get(Side::Right)
    }

    /// Both players at once.
    pub fn both_mut(&mut self) -> (&mut P, &mut P) {
        let (left, right) = self.inner_mut();
        (left, right)
    }

    /// Exchange slots, re-tagging each player's event sender.
    pub fn swap(&mut self, queue: &PlayerEventQueue) {
        if let Some((left, right)) = self.players.as_mut() {
            std::mem::swap(left, right);
            left.detach();
            right.detach();
            left.attach(queue.sender(Side::Left));
            right.attach(queue.sender(Side::Right));
        }
    }

    /// Unsubscribe both players and hand them back.
    pub fn detach(mut self) -> (P, P) {
        let (mut left, mut right) = self.take();
        left.detach();
        right.detach();
        tracing::debug!(left = left.name(), right = right.name(), "Players detached");
        (left, right)
    }

    fn take(&mut self) -> (P, P) {
        match self.players.take() {
            Some(players) => players,
            None => unreachable!("players are only taken when the pair is consumed"),
        }
    }

    fn inner(&self) -> &(P, P) {
        match self.players.as_ref() {
            Some(players) => players,
            None => unreachable!("players are only taken when the pair is consumed"),
        }
    }

    fn inner_mut(&mut self) -> &mut (P, P) {
        match self.players.as_mut() {
            Some(players) => players,
            None => unreachable!("players are only taken when the pair is consumed"),
        }
    }
}

impl<P: PlayerHandle> Drop for AttachedPair<P> {
    fn drop(&mut self) {
        if let Some((left, right)) = self.players.as_mut() {
            left.detach();
            right.detach();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PlayerEvent;
    use crate::synthetic::SyntheticPlayer;

    #[test]
    fn attach_tags_events_by_slot() {
        let mut queue = PlayerEventQueue::new();
        let mut pair = AttachedPair::attach(
            SyntheticPlayer::new("a", 10, 40.0),
            SyntheticPlayer::new("b", 10, 40.0),
            &queue,
        );

        pair.get_mut(Side::Right).seek_to(3, true).unwrap();
        assert!(matches!(
            queue.try_next(),
            Some((Side::Right, PlayerEvent::FrameProduced { frame: 3, .. }))
        ));

        pair.swap(&queue);
        assert_eq!(pair.left().name(), "b");
        pair.get_mut(Side::Left).seek_to(4, true).unwrap();
        assert!(matches!(
            queue.try_next(),
            Some((Side::Left, PlayerEvent::FrameProduced { frame: 4, .. }))
        ));
    }

    #[test]
    fn detach_stops_events() {
        let mut queue = PlayerEventQueue::new();
        let pair = AttachedPair::attach(
            SyntheticPlayer::new("a", 10, 40.0),
            SyntheticPlayer::new("b", 10, 40.0),
            &queue,
        );

        let (mut left, _right) = pair.detach();
        left.seek_to(5, true).unwrap();
        assert!(queue.try_next().is_none());
        assert!(!left.is_attached());
    }
}
