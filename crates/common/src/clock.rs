//! Sync clock arithmetic between native and common frame axes.
//!
//! Once two players are synchronized, positions are expressed on a virtual
//! common timeline. The signed lag (right sync frame minus left sync frame)
//! decides which player leads:
//! - lag > 0: the right player leads, the left one waits `lag` frames
//! - lag <= 0: the left player leads, the right one waits `-lag` frames
//!
//! The waiting player is held at its first frame rather than going negative.
//! Every function here is total; nothing can fail.

use serde::{Deserialize, Serialize};

/// One of the two player slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Both sides, left first.
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    /// The opposite slot.
    pub fn other(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

/// Sign of the lag between the two sync points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LagSign {
    /// Left leads, right waits.
    Negative,
    Zero,
    /// Right leads, left waits.
    Positive,
}

impl LagSign {
    pub fn of(lag: i64) -> Self {
        match lag.signum() {
            1 => LagSign::Positive,
            -1 => LagSign::Negative,
            _ => LagSign::Zero,
        }
    }

    /// The side that has to start first, if any.
    pub fn leader(self) -> Option<Side> {
        match self {
            LagSign::Positive => Some(Side::Right),
            LagSign::Negative => Some(Side::Left),
            LagSign::Zero => None,
        }
    }
}

/// A pair of native frame positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NativePair {
    pub left: i64,
    pub right: i64,
}

impl NativePair {
    pub fn new(left: i64, right: i64) -> Self {
        Self { left, right }
    }

    pub fn get(&self, side: Side) -> i64 {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn swapped(self) -> Self {
        Self {
            left: self.right,
            right: self.left,
        }
    }
}

/// The side whose native axis coincides with the common axis.
///
/// With zero lag both coincide and the left player is reported.
pub fn leading_side(lag_frames: i64) -> Side {
    if lag_frames > 0 {
        Side::Right
    } else {
        Side::Left
    }
}

/// Map a common timeline frame to each player's native frame.
pub fn common_to_native(common_frame: i64, lag_frames: i64) -> NativePair {
    if lag_frames > 0 {
        NativePair {
            left: common_frame.saturating_sub(lag_frames).max(0),
            right: common_frame.max(0),
        }
    } else {
        NativePair {
            left: common_frame.max(0),
            right: common_frame.saturating_add(lag_frames).max(0),
        }
    }
}

/// Map a native frame of one side back to the common timeline.
///
/// The leading side maps one to one; the waiting side is shifted by the lag.
pub fn native_to_common(side: Side, native_frame: i64, lag_frames: i64) -> i64 {
    if side == leading_side(lag_frames) {
        native_frame
    } else {
        native_frame.saturating_add(lag_frames.saturating_abs())
    }
}

/// Position of a native frame in milliseconds at the given frame interval.
pub fn frames_to_millis(frame: i64, frame_interval_ms: f64) -> i64 {
    (frame as f64 * frame_interval_ms) as i64
}

/// Lag between the two sync points expressed in wall-clock milliseconds.
///
/// Must be recomputed whenever either frame interval changes, even though
/// the frame lag stays the same.
pub fn native_lag_to_millis(
    left_sync_frame: i64,
    right_sync_frame: i64,
    left_interval_ms: f64,
    right_interval_ms: f64,
) -> i64 {
    frames_to_millis(right_sync_frame, right_interval_ms)
        - frames_to_millis(left_sync_frame, left_interval_ms)
}
