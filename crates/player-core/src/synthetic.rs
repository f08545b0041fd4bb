//! Synthetic in-memory player.
//!
//! Produces solid-colour frames whose red and green channels encode the
//! frame index, so a decoded image can be traced back to the position it was
//! taken from. Time does not pass on its own: callers drive the player's
//! timer with [`SyntheticPlayer::tick`].

use dualsync_common::error::{SyncError, SyncResult};
use image::{Rgba, RgbaImage};

use crate::events::{PlayerEvent, PlayerEventSender};
use crate::merge::blend;
use crate::PlayerHandle;

const DEFAULT_WIDTH: u32 = 64;
const DEFAULT_HEIGHT: u32 = 36;

/// Deterministic player over a fixed number of frames.
#[derive(Debug)]
pub struct SyntheticPlayer {
    name: String,
    frame_count: i64,
    base_interval_ms: f64,
    speed_percent: f64,
    current: i64,
    playing: bool,
    loaded: bool,
    export_in_progress: bool,
    width: u32,
    height: u32,
    tint: u8,
    fail_at: Option<i64>,
    merge_image: Option<RgbaImage>,
    sender: Option<PlayerEventSender>,
    seeks: u64,
}

impl SyntheticPlayer {
    /// A loaded player with `frame_count` frames at `frame_interval_ms`.
    pub fn new(name: impl Into<String>, frame_count: i64, frame_interval_ms: f64) -> Self {
        let name = name.into();
        let tint = name.bytes().fold(0u8, |acc, b| acc.wrapping_mul(31).wrapping_add(b));
        Self {
            name,
            frame_count: frame_count.max(1),
            base_interval_ms: frame_interval_ms.max(0.001),
            speed_percent: 100.0,
            current: 0,
            playing: false,
            loaded: true,
            export_in_progress: false,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            tint,
            fail_at: None,
            merge_image: None,
            sender: None,
            seeks: 0,
        }
    }

    /// Change the produced image size.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width.max(1);
        self.height = height.max(1);
        self
    }

    /// Make decoding fail whenever the player lands on `frame`.
    pub fn fail_decoding_at(mut self, frame: i64) -> Self {
        self.fail_at = Some(frame);
        self
    }

    /// Drop the loaded content.
    pub fn unload(&mut self) {
        self.loaded = false;
        self.playing = false;
    }

    /// Load new content with a different length.
    pub fn reload(&mut self, frame_count: i64) {
        self.frame_count = frame_count.max(1);
        self.current = 0;
        self.playing = false;
        self.loaded = true;
    }

    /// Advance one frame if playing, looping back to the start after the
    /// last frame. Returns the new position.
    pub fn tick(&mut self) -> i64 {
        if !self.playing || !self.loaded {
            return self.current;
        }
        self.current = if self.current + 1 >= self.frame_count {
            0
        } else {
            self.current + 1
        };
        self.notify_frame();
        self.current
    }

    /// Simulate the user pausing this player on its own controls.
    pub fn user_pause(&mut self) {
        if self.playing {
            self.playing = false;
            self.emit(PlayerEvent::PauseRequested);
        }
    }

    /// Number of seeks that actually moved the playhead.
    pub fn seek_count(&self) -> u64 {
        self.seeks
    }

    pub fn is_attached(&self) -> bool {
        self.sender.is_some()
    }

    pub fn export_in_progress(&self) -> bool {
        self.export_in_progress
    }

    pub fn merge_image(&self) -> Option<&RgbaImage> {
        self.merge_image.as_ref()
    }

    /// Frame index encoded in an image produced by any synthetic player.
    pub fn frame_index_of(image: &RgbaImage) -> Option<i64> {
        let pixel = image.get_pixel_checked(0, 0)?;
        Some(pixel[0] as i64 | ((pixel[1] as i64) << 8))
    }

    fn render(&self, frame: i64) -> SyncResult<RgbaImage> {
        if self.fail_at == Some(frame) {
            return Err(SyncError::player(format!(
                "{}: cannot decode frame {frame}",
                self.name
            )));
        }
        let color = Rgba([
            (frame & 0xff) as u8,
            ((frame >> 8) & 0xff) as u8,
            self.tint,
            255,
        ]);
        Ok(RgbaImage::from_pixel(self.width, self.height, color))
    }

    fn notify_frame(&mut self) {
        if self.export_in_progress {
            return;
        }
        let event = match self.render(self.current) {
            Ok(image) => PlayerEvent::FrameProduced {
                frame: self.current,
                image: Some(image),
            },
            Err(e) => PlayerEvent::FrameFailed {
                frame: self.current,
                reason: e.to_string(),
            },
        };
        self.emit(event);
    }

    fn emit(&self, event: PlayerEvent) {
        if self.export_in_progress {
            return;
        }
        if let Some(sender) = &self.sender {
            sender.send(event);
        }
    }
}

impl PlayerHandle for SyntheticPlayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn current_frame(&self) -> i64 {
        self.current
    }

    fn frame_interval_ms(&self) -> f64 {
        self.base_interval_ms * 100.0 / self.speed_percent
    }

    fn estimated_frame_count(&self) -> i64 {
        self.frame_count
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn request_play_toggle(&mut self) {
        if self.loaded {
            self.playing = !self.playing;
        }
    }

    fn seek_to(&mut self, frame: i64, allow_ui_refresh: bool) -> SyncResult<()> {
        if !self.loaded {
            return Err(SyncError::player(format!("{}: nothing loaded", self.name)));
        }
        let target = frame.clamp(0, self.last_frame());
        if self.fail_at == Some(target) {
            return Err(SyncError::player(format!(
                "{}: cannot seek to frame {target}",
                self.name
            )));
        }
        if target != self.current {
            self.seeks += 1;
        }
        self.current = target;
        if allow_ui_refresh {
            self.notify_frame();
        }
        Ok(())
    }

    fn current_image(&mut self) -> SyncResult<RgbaImage> {
        let frame = self.render(self.current)?;
        Ok(match &self.merge_image {
            Some(other) => blend(&frame, other),
            None => frame,
        })
    }

    fn speed_percent(&self) -> f64 {
        self.speed_percent
    }

    fn set_speed_percent(&mut self, percent: f64) {
        let percent = percent.clamp(1.0, 1000.0);
        if (percent - self.speed_percent).abs() < f64::EPSILON {
            return;
        }
        self.speed_percent = percent;
        self.emit(PlayerEvent::SpeedChanged { percent });
    }

    fn set_export_in_progress(&mut self, in_progress: bool) {
        self.export_in_progress = in_progress;
    }

    fn set_merge_image(&mut self, image: Option<RgbaImage>, allow_ui_refresh: bool) {
        self.merge_image = image;
        if allow_ui_refresh {
            tracing::trace!(player = %self.name, "Merge image refreshed");
        }
    }

    fn attach(&mut self, sender: PlayerEventSender) {
        self.sender = Some(sender);
    }

    fn detach(&mut self) {
        self.sender = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_loops_at_end() {
        let mut player = SyntheticPlayer::new("p", 3, 40.0);
        player.request_play_toggle();
        assert_eq!(player.tick(), 1);
        assert_eq!(player.tick(), 2);
        assert_eq!(player.tick(), 0);
    }

    #[test]
    fn paused_player_does_not_advance() {
        let mut player = SyntheticPlayer::new("p", 3, 40.0);
        assert_eq!(player.tick(), 0);
    }

    #[test]
    fn image_encodes_frame_index() {
        let mut player = SyntheticPlayer::new("p", 1000, 40.0);
        player.seek_to(300, false).unwrap();
        let image = player.current_image().unwrap();
        assert_eq!(SyntheticPlayer::frame_index_of(&image), Some(300));
    }

    #[test]
    fn seek_clamps_to_content() {
        let mut player = SyntheticPlayer::new("p", 10, 40.0);
        player.seek_to(25, false).unwrap();
        assert_eq!(player.current_frame(), 9);
        player.seek_to(-4, false).unwrap();
        assert_eq!(player.current_frame(), 0);
    }

    #[test]
    fn speed_scales_interval() {
        let mut player = SyntheticPlayer::new("p", 10, 20.0);
        player.set_speed_percent(50.0);
        assert!((player.frame_interval_ms() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn merge_image_is_blended_into_current_image() {
        let mut left = SyntheticPlayer::new("left", 10, 40.0);
        let mut right = SyntheticPlayer::new("right", 10, 40.0);
        let own = left.current_image().unwrap();
        let other = right.current_image().unwrap();
        assert_ne!(own.get_pixel(0, 0)[2], other.get_pixel(0, 0)[2]);

        left.set_merge_image(Some(other.clone()), false);
        let merged = left.current_image().unwrap();
        assert_eq!(merged, blend(&own, &other));

        left.set_merge_image(None, false);
        assert_eq!(left.current_image().unwrap(), own);
    }

    #[test]
    fn decode_failure_surfaces() {
        let mut player = SyntheticPlayer::new("p", 10, 20.0).fail_decoding_at(4);
        assert!(player.seek_to(4, false).is_err());
        assert_eq!(player.current_frame(), 0);
    }
}
