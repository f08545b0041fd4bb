//! Sync points, lag and the bounds of the common timeline.

use dualsync_common::clock::{common_to_native, native_lag_to_millis, native_to_common, NativePair, Side};
use dualsync_render_engine::TimelineSnapshot;

/// Position bookkeeping of a synchronized pair.
///
/// The frame lag only changes through [`SyncTimeline::set_sync_point`],
/// [`SyncTimeline::swap_sync_points`] or the drift recovery in
/// [`SyncTimeline::compute_limits`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncTimeline {
    left_sync_frame: i64,
    right_sync_frame: i64,
    lag_frames: i64,
    lag_ms: i64,
    current_frame: i64,
    max_common_frame: i64,
}

impl SyncTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn left_sync_frame(&self) -> i64 {
        self.left_sync_frame
    }

    pub fn right_sync_frame(&self) -> i64 {
        self.right_sync_frame
    }

    /// Right sync frame minus left sync frame.
    pub fn lag_frames(&self) -> i64 {
        self.lag_frames
    }

    /// The lag in wall-clock milliseconds at the current speeds.
    pub fn lag_ms(&self) -> i64 {
        self.lag_ms
    }

    /// Current position on the common timeline.
    pub fn current_frame(&self) -> i64 {
        self.current_frame
    }

    /// Number of frames on the common timeline.
    pub fn max_common_frame(&self) -> i64 {
        self.max_common_frame
    }

    /// Last addressable common frame.
    pub fn last_common_frame(&self) -> i64 {
        (self.max_common_frame - 1).max(0)
    }

    /// Move the common position, clamped to the timeline.
    pub fn set_current_frame(&mut self, frame: i64) -> i64 {
        self.current_frame = frame.clamp(0, self.last_common_frame());
        self.current_frame
    }

    /// Native frames each player should show at the current position.
    pub fn natives(&self) -> NativePair {
        common_to_native(self.current_frame, self.lag_frames)
    }

    /// Where each player's native position lands on the common timeline.
    pub fn hairlines(&self, actual: NativePair) -> NativePair {
        NativePair::new(
            native_to_common(Side::Left, actual.left, self.lag_frames),
            native_to_common(Side::Right, actual.right, self.lag_frames),
        )
    }

    /// Register a sync point and recompute the lag.
    ///
    /// With `reference == None` the stored sync frames are kept and only the
    /// millisecond lag is refreshed, which is what a speed change needs.
    /// The common position moves to the sync frame of the leading side.
    pub fn set_sync_point(
        &mut self,
        reference: Option<NativePair>,
        left_interval_ms: f64,
        right_interval_ms: f64,
    ) {
        if let Some(frames) = reference {
            self.left_sync_frame = frames.left;
            self.right_sync_frame = frames.right;
        }

        self.lag_frames = self.right_sync_frame - self.left_sync_frame;
        self.lag_ms = native_lag_to_millis(
            self.left_sync_frame,
            self.right_sync_frame,
            left_interval_ms,
            right_interval_ms,
        );
        self.current_frame = if self.lag_frames > 0 {
            self.right_sync_frame
        } else {
            self.left_sync_frame
        };

        tracing::debug!(
            left_sync = self.left_sync_frame,
            right_sync = self.right_sync_frame,
            lag_frames = self.lag_frames,
            lag_ms = self.lag_ms,
            "Sync point set"
        );
    }

    /// Put back sync points saved earlier, without touching any player.
    pub fn restore_sync_points(&mut self, left: i64, right: i64) {
        self.left_sync_frame = left.max(0);
        self.right_sync_frame = right.max(0);
        self.lag_frames = self.right_sync_frame - self.left_sync_frame;
    }

    /// Exchange the two sync frames after the players swapped slots.
    pub fn swap_sync_points(&mut self) {
        std::mem::swap(&mut self.left_sync_frame, &mut self.right_sync_frame);
    }

    /// Recompute the common timeline length from both players' lengths.
    ///
    /// The waiting side's length is inflated by the lag. A lag longer than
    /// the leading player is stale (the content changed under it) and is
    /// reset to zero. Returns whether that happened.
    pub fn compute_limits(&mut self, left_len: i64, right_len: i64) -> bool {
        let mut left_len = left_len.max(0);
        let mut right_len = right_len.max(0);
        let mut drifted = false;

        if self.lag_frames > 0 {
            if self.lag_frames > right_len {
                drifted = true;
            } else {
                left_len += self.lag_frames;
            }
        } else if -self.lag_frames > left_len {
            drifted = true;
        } else {
            right_len += -self.lag_frames;
        }

        if drifted {
            tracing::warn!(
                lag_frames = self.lag_frames,
                left_len,
                right_len,
                "Stored lag exceeds content length, resetting"
            );
            self.left_sync_frame = 0;
            self.right_sync_frame = 0;
            self.lag_frames = 0;
            self.lag_ms = 0;
        }

        self.max_common_frame = left_len.max(right_len);
        self.current_frame = self.current_frame.clamp(0, self.last_common_frame());
        tracing::debug!(
            lag_frames = self.lag_frames,
            lag_ms = self.lag_ms,
            max_common_frame = self.max_common_frame,
            "Sync limits computed"
        );
        drifted
    }

    /// Work out the common position after one or both players were moved
    /// individually, preferring the explanation that only one side moved.
    pub fn resynchronize(&mut self, actual: NativePair) -> i64 {
        let lag = self.lag_frames;
        let current = self.current_frame;

        let next = if lag > 0 {
            if actual.left + lag == current || (current < lag && actual.left == 0) {
                // Left untouched, follow right.
                actual.right
            } else {
                actual.left + lag
            }
        } else if actual.right - lag == current || (current < -lag && actual.right == 0) {
            // Right untouched, follow left.
            actual.left
        } else if actual.left == current {
            actual.right - lag
        } else {
            actual.left
        };

        tracing::debug!(
            left = actual.left,
            right = actual.right,
            from = current,
            to = next,
            "Resynchronized"
        );
        self.set_current_frame(next)
    }

    /// Read-only view handed to an export.
    pub fn snapshot(&self) -> TimelineSnapshot {
        TimelineSnapshot {
            lag_frames: self.lag_frames,
            max_common_frame: self.max_common_frame,
        }
    }

    /// Back to the initial state: sync points on the first frames.
    pub fn reset(&mut self) {
        *self = Self {
            max_common_frame: self.max_common_frame,
            ..Self::default()
        };
    }
}
