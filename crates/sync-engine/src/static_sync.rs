//! Discrete, user-driven repositioning of both players.

use dualsync_common::clock::NativePair;
use dualsync_common::error::SyncResult;
use dualsync_player_core::PlayerHandle;

use crate::timeline::SyncTimeline;

/// Seeks both players to match a position on the common timeline.
///
/// Every stepping operation pauses both players first.
pub struct StaticSync<'a, P: PlayerHandle> {
    timeline: &'a mut SyncTimeline,
    left: &'a mut P,
    right: &'a mut P,
}

impl<'a, P: PlayerHandle> StaticSync<'a, P> {
    pub fn new(timeline: &'a mut SyncTimeline, left: &'a mut P, right: &'a mut P) -> Self {
        Self {
            timeline,
            left,
            right,
        }
    }

    /// Seek both players to the native frames of `common_frame`.
    ///
    /// Targets are clamped to each player's content and players already on
    /// their target are left alone. Both seeks are attempted even when the
    /// first one fails; the first error is returned.
    pub fn goto(&mut self, common_frame: i64) -> SyncResult<NativePair> {
        let frame = self.timeline.set_current_frame(common_frame);
        let natives = self.timeline.natives();

        let left = seek_clamped(self.left, natives.left);
        let right = seek_clamped(self.right, natives.right);
        let reached = NativePair::new(left?, right?);

        tracing::trace!(
            common_frame = frame,
            left = reached.left,
            right = reached.right,
            "Static sync"
        );
        Ok(reached)
    }

    /// Re-seek both players to the current common position.
    pub fn refresh(&mut self) -> SyncResult<NativePair> {
        let current = self.timeline.current_frame();
        self.goto(current)
    }

    pub fn first(&mut self) -> SyncResult<NativePair> {
        self.pause_both();
        self.goto(0)
    }

    /// One frame back; does nothing at the first frame.
    pub fn prev(&mut self) -> SyncResult<Option<NativePair>> {
        self.pause_both();
        let current = self.timeline.current_frame();
        if current <= 0 {
            return Ok(None);
        }
        self.goto(current - 1).map(Some)
    }

    /// One frame forward; does nothing at the last frame.
    pub fn next(&mut self) -> SyncResult<Option<NativePair>> {
        self.pause_both();
        let current = self.timeline.current_frame();
        if current >= self.timeline.last_common_frame() {
            return Ok(None);
        }
        self.goto(current + 1).map(Some)
    }

    pub fn last(&mut self) -> SyncResult<NativePair> {
        self.pause_both();
        let last = self.timeline.last_common_frame();
        self.goto(last)
    }

    /// Jump to a position picked on the common scrub bar.
    pub fn scrub(&mut self, common_frame: i64) -> SyncResult<NativePair> {
        self.pause_both();
        self.goto(common_frame)
    }

    /// Recover after one or both players were moved on their own controls.
    pub fn resynchronize(&mut self) -> SyncResult<NativePair> {
        let actual = NativePair::new(self.left.current_frame(), self.right.current_frame());
        let common = self.timeline.resynchronize(actual);
        self.goto(common)
    }

    fn pause_both(&mut self) {
        self.left.ensure_paused();
        self.right.ensure_paused();
    }
}

fn seek_clamped<P: PlayerHandle>(player: &mut P, target: i64) -> SyncResult<i64> {
    let target = target.clamp(0, player.last_frame());
    if player.current_frame() != target {
        player.seek_to(target, true)?;
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dualsync_player_core::synthetic::SyntheticPlayer;

    fn timeline(lag: i64, left_len: i64, right_len: i64) -> SyncTimeline {
        let mut timeline = SyncTimeline::new();
        let reference = if lag >= 0 {
            NativePair::new(0, lag)
        } else {
            NativePair::new(-lag, 0)
        };
        timeline.set_sync_point(Some(reference), 40.0, 40.0);
        timeline.compute_limits(left_len, right_len);
        timeline
    }

    #[test]
    fn goto_maps_positive_lag() {
        let mut timeline = timeline(10, 100, 100);
        let mut left = SyntheticPlayer::new("l", 100, 40.0);
        let mut right = SyntheticPlayer::new("r", 100, 40.0);
        let mut sync = StaticSync::new(&mut timeline, &mut left, &mut right);

        assert_eq!(sync.goto(5).unwrap(), NativePair::new(0, 5));
        assert_eq!(sync.goto(20).unwrap(), NativePair::new(10, 20));
    }

    #[test]
    fn goto_clamps_to_shorter_content() {
        let mut timeline = timeline(0, 30, 40);
        let mut left = SyntheticPlayer::new("l", 30, 40.0);
        let mut right = SyntheticPlayer::new("r", 40, 40.0);
        let reached = StaticSync::new(&mut timeline, &mut left, &mut right)
            .goto(35)
            .unwrap();
        assert_eq!(reached, NativePair::new(29, 35));
        assert_eq!(left.current_frame(), 29);
    }

    #[test]
    fn seeks_are_skipped_when_already_there() {
        let mut timeline = timeline(10, 100, 100);
        let mut left = SyntheticPlayer::new("l", 100, 40.0);
        let mut right = SyntheticPlayer::new("r", 100, 40.0);
        let mut sync = StaticSync::new(&mut timeline, &mut left, &mut right);
        sync.goto(3).unwrap();
        sync.goto(7).unwrap();
        drop(sync);
        assert_eq!(left.seek_count(), 0);
        assert_eq!(right.seek_count(), 2);
    }

    #[test]
    fn stepping_pauses_and_respects_bounds() {
        let mut timeline = timeline(0, 3, 3);
        let mut left = SyntheticPlayer::new("l", 3, 40.0);
        let mut right = SyntheticPlayer::new("r", 3, 40.0);
        left.request_play_toggle();

        let mut sync = StaticSync::new(&mut timeline, &mut left, &mut right);
        assert!(sync.prev().unwrap().is_none());
        assert_eq!(sync.next().unwrap(), Some(NativePair::new(1, 1)));
        assert_eq!(sync.last().unwrap(), NativePair::new(2, 2));
        assert!(sync.next().unwrap().is_none());
        assert_eq!(sync.first().unwrap(), NativePair::new(0, 0));
        drop(sync);
        assert!(!left.is_playing());
    }

    #[test]
    fn resynchronize_after_individual_move() {
        let mut timeline = timeline(10, 100, 100);
        let mut left = SyntheticPlayer::new("l", 100, 40.0);
        let mut right = SyntheticPlayer::new("r", 100, 40.0);
        StaticSync::new(&mut timeline, &mut left, &mut right)
            .goto(30)
            .unwrap();

        right.seek_to(50, false).unwrap();
        let reached = StaticSync::new(&mut timeline, &mut left, &mut right)
            .resynchronize()
            .unwrap();
        assert_eq!(reached, NativePair::new(40, 50));
        assert_eq!(timeline.current_frame(), 50);
    }

    #[test]
    fn failed_seek_still_moves_the_other_player() {
        let mut timeline = timeline(0, 10, 10);
        let mut left = SyntheticPlayer::new("l", 10, 40.0).fail_decoding_at(4);
        let mut right = SyntheticPlayer::new("r", 10, 40.0);
        let result = StaticSync::new(&mut timeline, &mut left, &mut right).goto(4);
        assert!(result.is_err());
        assert_eq!(right.current_frame(), 4);
    }
}
