//! DualSync player core contracts.
//!
//! This crate describes the playback engine as the synchronization core sees
//! it: a handle that reports its position and accepts play/pause/seek
//! commands, plus the event plumbing that carries "frame produced"
//! notifications back to the single thread that owns both players.
//!
//! It does not decode anything itself. [`synthetic::SyntheticPlayer`] is a
//! deterministic in-memory implementation used by tests and the CLI.

pub mod events;
pub mod merge;
pub mod pair;
pub mod synthetic;

pub use events::*;
pub use pair::*;

use dualsync_common::error::SyncResult;
use image::RgbaImage;

/// View of one independently decoding playback engine.
///
/// Frames are zero-based indices on the player's own (native) axis.
pub trait PlayerHandle: Send {
    /// Display name for logging.
    fn name(&self) -> &str;

    /// Whether real content is loaded ("full" screen).
    fn is_loaded(&self) -> bool;

    /// Current native frame.
    fn current_frame(&self) -> i64;

    /// Playback interval between frames in milliseconds, speed included.
    fn frame_interval_ms(&self) -> f64;

    /// Estimated number of frames in the loaded content.
    fn estimated_frame_count(&self) -> i64;

    /// Whether the player's own timer is running.
    fn is_playing(&self) -> bool;

    /// Toggle between playing and paused.
    fn request_play_toggle(&mut self);

    /// Move to a native frame. `allow_ui_refresh` controls whether the
    /// player notifies listeners about the new image.
    fn seek_to(&mut self, frame: i64, allow_ui_refresh: bool) -> SyncResult<()>;

    /// The image shown at the current position: the decoded frame, blended
    /// with the merge image when one is set.
    fn current_image(&mut self) -> SyncResult<RgbaImage>;

    /// Playback speed as a percentage of real time.
    fn speed_percent(&self) -> f64;

    /// Change the playback speed. Emits `SpeedChanged` when it differs.
    fn set_speed_percent(&mut self, percent: f64);

    /// While set, the player must not emit live notifications.
    fn set_export_in_progress(&mut self, in_progress: bool);

    /// Image from the other player to blend in merge mode, `None` to clear.
    fn set_merge_image(&mut self, image: Option<RgbaImage>, allow_ui_refresh: bool);

    /// Start delivering events through `sender`.
    fn attach(&mut self, sender: PlayerEventSender);

    /// Stop delivering events.
    fn detach(&mut self);

    /// Last addressable native frame.
    fn last_frame(&self) -> i64 {
        (self.estimated_frame_count() - 1).max(0)
    }

    /// Start the player if it is paused.
    fn ensure_playing(&mut self) {
        if !self.is_playing() {
            self.request_play_toggle();
        }
    }

    /// Pause the player if it is running.
    fn ensure_paused(&mut self) {
        if self.is_playing() {
            self.request_play_toggle();
        }
    }
}

impl<P: PlayerHandle + ?Sized> PlayerHandle for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_loaded(&self) -> bool {
        (**self).is_loaded()
    }

    fn current_frame(&self) -> i64 {
        (**self).current_frame()
    }

    fn frame_interval_ms(&self) -> f64 {
        (**self).frame_interval_ms()
    }

    fn estimated_frame_count(&self) -> i64 {
        (**self).estimated_frame_count()
    }

    fn is_playing(&self) -> bool {
        (**self).is_playing()
    }

    fn request_play_toggle(&mut self) {
        (**self).request_play_toggle()
    }

    fn seek_to(&mut self, frame: i64, allow_ui_refresh: bool) -> SyncResult<()> {
        (**self).seek_to(frame, allow_ui_refresh)
    }

    fn current_image(&mut self) -> SyncResult<RgbaImage> {
        (**self).current_image()
    }

    fn speed_percent(&self) -> f64 {
        (**self).speed_percent()
    }

    fn set_speed_percent(&mut self, percent: f64) {
        (**self).set_speed_percent(percent)
    }

    fn set_export_in_progress(&mut self, in_progress: bool) {
        (**self).set_export_in_progress(in_progress)
    }

    fn set_merge_image(&mut self, image: Option<RgbaImage>, allow_ui_refresh: bool) {
        (**self).set_merge_image(image, allow_ui_refresh)
    }

    fn attach(&mut self, sender: PlayerEventSender) {
        (**self).attach(sender)
    }

    fn detach(&mut self) {
        (**self).detach()
    }
}
