//! The façade the UI talks to.
//!
//! A [`DualSyncSession`] owns exactly two players for as long as they are
//! entered. Player notifications arrive through a [`PlayerEventQueue`] and
//! are handled one at a time by [`DualSyncSession::pump`]; updates for the
//! UI leave through an unbounded [`SessionEvent`] channel.

use std::path::PathBuf;

use dualsync_common::clock::{NativePair, Side};
use dualsync_common::config::{AppConfig, ExportDefaults, SyncPreferences};
use dualsync_common::error::{SyncError, SyncResult};
use dualsync_player_core::{AttachedPair, PlayerEvent, PlayerEventQueue, PlayerHandle};
use dualsync_render_engine::{
    Compositor, EncoderSink, ExportCoordinator, ExportHandle, ExportJob, ExportOutcome,
    ExportProgress,
};
use image::RgbaImage;
use tokio::sync::mpsc;

use crate::dynamic::{self, Command, DynamicInput, Latches};
use crate::static_sync::StaticSync;
use crate::timeline::SyncTimeline;

/// Lifecycle of a session.
///
/// `Idle -> StaticOnly` when both players are loaded, `StaticOnly <->
/// DynamicActive` on play/pause, `StaticOnly -> Exporting -> StaticOnly`
/// around an export, and any state falls back to `Idle` when the pair stops
/// being two loaded players.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    StaticOnly,
    DynamicActive,
    Exporting,
}

/// Updates pushed to the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    CommonPositionChanged { frame: i64 },
    LagChanged { frames: i64, millis: i64 },
    LimitsChanged { max_common_frame: i64 },
    /// Each player's position projected on the common timeline.
    HairlinesChanged { left: i64, right: i64 },
    PlaybackChanged { playing: bool },
    /// A player could not produce a frame and was paused.
    PlayerStalled {
        side: Side,
        frame: i64,
        reason: String,
    },
    /// The pair stopped being two loaded players.
    SyncLost,
    ExportProgress(ExportProgress),
    ExportCompleted { outcome: ExportOutcome },
}

type BoxedSink = Box<dyn EncoderSink>;

struct ActiveExport<P> {
    handle: ExportHandle<P, BoxedSink>,
    resume_frame: i64,
}

/// Synchronization session over two players.
pub struct DualSyncSession<P: PlayerHandle + 'static> {
    prefs: SyncPreferences,
    export_defaults: ExportDefaults,
    state: SessionState,
    pair: Option<AttachedPair<P>>,
    queue: PlayerEventQueue,
    timeline: SyncTimeline,
    latches: Latches,
    merging: bool,
    export: Option<ActiveExport<P>>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl<P: PlayerHandle + 'static> DualSyncSession<P> {
    /// Create an empty session and the receiving end of its UI events.
    pub fn new(config: &AppConfig) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let session = Self {
            prefs: config.sync.clone(),
            export_defaults: config.export.clone(),
            state: SessionState::Idle,
            pair: None,
            queue: PlayerEventQueue::new(),
            timeline: SyncTimeline::new(),
            latches: Latches::default(),
            merging: false,
            export: None,
            events,
        };
        (session, rx)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn timeline(&self) -> &SyncTimeline {
        &self.timeline
    }

    pub fn latches(&self) -> Latches {
        self.latches
    }

    pub fn is_merging(&self) -> bool {
        self.merging
    }

    /// Both players loaded and static sync prepared.
    pub fn is_synching(&self) -> bool {
        matches!(
            self.state,
            SessionState::StaticOnly | SessionState::DynamicActive
        )
    }

    pub fn player(&self, side: Side) -> Option<&P> {
        self.pair.as_ref().map(|pair| pair.get(side))
    }

    /// Direct access to a player, e.g. to drive its timer or to move it on
    /// its own controls.
    pub fn player_mut(&mut self, side: Side) -> Option<&mut P> {
        self.pair.as_mut().map(|pair| pair.get_mut(side))
    }

    /// Take ownership of two players and prepare synchronization.
    ///
    /// A previous pair is exited first and dropped.
    pub fn enter(&mut self, left: P, right: P) {
        if self.pair.is_some() || self.export.is_some() {
            drop(self.exit());
        }
        tracing::info!(left = left.name(), right = right.name(), "Entering dual session");
        self.pair = Some(AttachedPair::attach(left, right, &self.queue));
        self.prepare(true);
    }

    /// Release both players. A running export is cancelled and awaited.
    pub fn exit(&mut self) -> Option<(P, P)> {
        if let Some(active) = self.export.take() {
            active.handle.cancel();
            match active.handle.join() {
                Ok(report) => {
                    self.emit(SessionEvent::ExportCompleted {
                        outcome: report.outcome,
                    });
                    self.pair = Some(AttachedPair::attach(report.left, report.right, &self.queue));
                }
                Err(e) => tracing::error!(error = %e, "Export worker lost during exit"),
            }
        }

        self.latches = Latches::default();
        self.merging = false;
        let was_active = self.state != SessionState::Idle;
        self.state = SessionState::Idle;
        let players = self.pair.take().map(AttachedPair::detach);
        self.queue.clear();
        if was_active {
            self.emit(SessionEvent::SyncLost);
        }
        tracing::info!("Dual session exited");
        players
    }

    /// One or both players reloaded their content; sync starts over.
    pub fn players_reloaded(&mut self) {
        if self.state == SessionState::Exporting {
            tracing::warn!("Ignoring reload notification during export");
            return;
        }
        self.prepare(true);
    }

    /// Put back sync points saved from an earlier session.
    pub fn restore_sync_points(&mut self, left: i64, right: i64) {
        if !self.is_synching() {
            return;
        }
        self.timeline.restore_sync_points(left, right);
        self.set_sync_point_inner(None);
    }

    // ---- Playback intents ----

    pub fn play(&mut self) {
        if self.state != SessionState::StaticOnly {
            return;
        }
        self.state = SessionState::DynamicActive;
        self.emit(SessionEvent::PlaybackChanged { playing: true });

        // Either player may have been moved on its own; restart both from
        // the earlier of the two positions.
        if let Some(pair) = self.pair.as_ref() {
            let actual = NativePair::new(pair.left().current_frame(), pair.right().current_frame());
            let hairlines = self.timeline.hairlines(actual);
            let earliest = hairlines.left.min(hairlines.right);
            tracing::trace!(
                left = hairlines.left,
                right = hairlines.right,
                common_frame = earliest,
                "Realigning players before playback"
            );
            self.restore_position(earliest);
        }
        self.run_dynamic();
    }

    pub fn pause(&mut self) {
        if self.state == SessionState::Exporting {
            return;
        }
        let was_playing = self.state == SessionState::DynamicActive;
        if was_playing {
            self.state = SessionState::StaticOnly;
            self.latches.clear_starting();
        }
        if let Some(pair) = self.pair.as_mut() {
            let (left, right) = pair.both_mut();
            left.ensure_paused();
            right.ensure_paused();
        }
        if was_playing {
            self.emit(SessionEvent::PlaybackChanged { playing: false });
        }
    }

    pub fn toggle_play(&mut self) {
        match self.state {
            SessionState::DynamicActive => self.pause(),
            SessionState::StaticOnly => self.play(),
            SessionState::Idle | SessionState::Exporting => {}
        }
    }

    // ---- Static repositioning ----

    pub fn goto_first(&mut self) {
        self.stepping(|sync| sync.first().map(Some));
    }

    pub fn goto_prev(&mut self) {
        self.stepping(|sync| sync.prev());
    }

    pub fn goto_next(&mut self) {
        self.stepping(|sync| sync.next());
    }

    pub fn goto_last(&mut self) {
        self.stepping(|sync| sync.last().map(Some));
    }

    /// Jump to a common frame picked on the scrub bar.
    pub fn scrub(&mut self, common_frame: i64) {
        self.stepping(|sync| sync.scrub(common_frame).map(Some));
    }

    /// Re-align after one player was moved on its own.
    pub fn resynchronize(&mut self) {
        self.stepping(|sync| sync.resynchronize().map(Some));
    }

    /// Declare the players' current frames as equivalent.
    pub fn set_sync_point(&mut self) {
        if !self.is_synching() {
            return;
        }
        let Some(pair) = self.pair.as_ref() else {
            return;
        };
        let reference = NativePair::new(pair.left().current_frame(), pair.right().current_frame());
        self.set_sync_point_inner(Some(reference));
    }

    /// Exchange the two player slots while keeping the sync semantics.
    pub fn swap(&mut self) {
        let Some(pair) = self.pair.as_mut() else {
            return;
        };
        pair.swap(&self.queue);
        if !self.is_synching() {
            return;
        }
        self.timeline.swap_sync_points();
        self.set_sync_point_inner(None);
    }

    /// Blend both players into a single view, or go back to side by side.
    pub fn toggle_merge(&mut self) {
        if !self.is_synching() {
            return;
        }
        self.merging = !self.merging;
        if self.merging {
            self.seed_merge_images();
        } else if let Some(pair) = self.pair.as_mut() {
            let (left, right) = pair.both_mut();
            left.set_merge_image(None, true);
            right.set_merge_image(None, true);
        }
        tracing::debug!(merging = self.merging, "Merge toggled");
    }

    /// Side-by-side still of what both players show right now.
    pub fn snapshot<C: Compositor>(&mut self, compositor: &C) -> SyncResult<RgbaImage> {
        let horizontal = self.export_defaults.horizontal;
        let pair = self
            .pair
            .as_mut()
            .ok_or_else(|| SyncError::sync("No players entered"))?;
        let (left, right) = pair.both_mut();
        let left_image = left.current_image()?;
        let right_image = right.current_image()?;
        Ok(compositor.render(&left_image, &right_image, false, horizontal))
    }

    // ---- Export ----

    /// Hand both players to a background export of the whole common
    /// timeline. They come back when [`DualSyncSession::poll_export`]
    /// observes the end of the export.
    pub fn start_export<C, S>(
        &mut self,
        target: impl Into<PathBuf>,
        compositor: C,
        sink: S,
    ) -> SyncResult<()>
    where
        C: Compositor + 'static,
        S: EncoderSink + 'static,
    {
        if !self.is_synching() {
            return Err(SyncError::export("Both players must be loaded and synchronized"));
        }
        self.pause();

        let job = ExportJob::whole_timeline(
            target,
            self.timeline.snapshot(),
            self.merging,
            self.export_defaults.horizontal,
        );
        let pair = self
            .pair
            .take()
            .ok_or_else(|| SyncError::sync("No players entered"))?;
        let (left, right) = pair.detach();
        self.queue.clear();

        let sink: BoxedSink = Box::new(sink);
        let coordinator = ExportCoordinator::new(job, left, right, compositor, sink)
            .with_progress_capacity(self.export_defaults.progress_channel_capacity);

        match coordinator.spawn() {
            Ok(handle) => {
                self.export = Some(ActiveExport {
                    handle,
                    resume_frame: self.timeline.current_frame(),
                });
                self.state = SessionState::Exporting;
                Ok(())
            }
            Err(e) => {
                // The players went down with the coordinator.
                self.state = SessionState::Idle;
                self.emit(SessionEvent::SyncLost);
                Err(e)
            }
        }
    }

    /// Ask the running export to stop at the next frame boundary.
    pub fn cancel_export(&mut self) {
        if let Some(active) = self.export.as_ref() {
            tracing::info!("Export cancellation requested");
            active.handle.cancel();
        }
    }

    /// Forward queued progress and, once the worker is done, take the
    /// players back. Returns the outcome when the export ended.
    pub fn poll_export(&mut self) -> SyncResult<Option<ExportOutcome>> {
        let finished = match self.export.as_mut() {
            None => return Ok(None),
            Some(active) => {
                let mut updates = Vec::new();
                while let Some(progress) = active.handle.try_progress() {
                    updates.push(progress);
                }
                for progress in updates {
                    self.emit(SessionEvent::ExportProgress(progress));
                }
                self.export
                    .as_ref()
                    .map_or(false, |active| active.handle.is_finished())
            }
        };
        if !finished {
            return Ok(None);
        }
        self.finish_export().map(Some)
    }

    /// Block until the running export ends.
    pub fn wait_export(&mut self) -> SyncResult<Option<ExportOutcome>> {
        if self.export.is_none() {
            return Ok(None);
        }
        self.finish_export().map(Some)
    }

    fn finish_export(&mut self) -> SyncResult<ExportOutcome> {
        let active = self
            .export
            .take()
            .ok_or_else(|| SyncError::export("No export running"))?;
        let mut handle = active.handle;
        let mut updates = Vec::new();
        while let Some(progress) = handle.try_progress() {
            updates.push(progress);
        }

        let report = match handle.join() {
            Ok(report) => report,
            Err(e) => {
                self.state = SessionState::Idle;
                self.emit(SessionEvent::SyncLost);
                return Err(e);
            }
        };
        for progress in updates {
            self.emit(SessionEvent::ExportProgress(progress));
        }

        tracing::info!(code = report.outcome.code(), "Export ended");
        self.pair = Some(AttachedPair::attach(report.left, report.right, &self.queue));
        self.state = SessionState::StaticOnly;
        self.restore_position(active.resume_frame);
        if self.merging {
            self.seed_merge_images();
        }
        self.emit(SessionEvent::ExportCompleted {
            outcome: report.outcome.clone(),
        });
        Ok(report.outcome)
    }

    // ---- Player notifications ----

    /// Handle every queued player notification in arrival order.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some((side, event)) = self.queue.try_next() {
            self.handle_player_event(side, event);
            handled += 1;
        }
        handled
    }

    pub fn handle_player_event(&mut self, side: Side, event: PlayerEvent) {
        if !self.is_synching() {
            return;
        }
        match event {
            PlayerEvent::FrameProduced { frame, image } => {
                if self.state == SessionState::DynamicActive {
                    self.run_dynamic();
                }
                self.emit_hairlines();
                if self.merging {
                    if let (Some(image), Some(pair)) = (image, self.pair.as_mut()) {
                        pair.get_mut(side.other()).set_merge_image(Some(image), true);
                    }
                }
                tracing::trace!(side = side.as_str(), frame, "Frame produced");
            }
            PlayerEvent::FrameFailed { frame, reason } => {
                tracing::warn!(side = side.as_str(), frame, reason = %reason, "Player stalled");
                if let Some(pair) = self.pair.as_mut() {
                    pair.get_mut(side).ensure_paused();
                }
                self.emit(SessionEvent::PlayerStalled {
                    side,
                    frame,
                    reason,
                });
            }
            PlayerEvent::PauseRequested => {
                if self.state == SessionState::DynamicActive {
                    self.pause();
                }
            }
            PlayerEvent::SpeedChanged { percent } => {
                if self.prefs.lock_speeds {
                    if let Some(pair) = self.pair.as_mut() {
                        pair.get_mut(side.other()).set_speed_percent(percent);
                    }
                }
                self.refresh_lag_ms();
            }
        }
    }

    // ---- Internals ----

    /// Enter `StaticOnly` when both players are loaded, `Idle` otherwise.
    fn prepare(&mut self, initialization: bool) {
        let loaded = self
            .pair
            .as_ref()
            .map_or(false, |pair| pair.left().is_loaded() && pair.right().is_loaded());

        if !loaded {
            let was_synching = self.is_synching();
            if let Some(pair) = self.pair.as_mut() {
                let (left, right) = pair.both_mut();
                left.ensure_paused();
                right.ensure_paused();
            }
            self.state = SessionState::Idle;
            self.latches = Latches::default();
            if was_synching {
                tracing::warn!("Players no longer synchronizable");
                self.emit(SessionEvent::SyncLost);
            }
            return;
        }

        if initialization {
            self.timeline.reset();
            self.latches = Latches::default();
            self.merging = false;
            if let Some(pair) = self.pair.as_mut() {
                let (left, right) = pair.both_mut();
                left.set_merge_image(None, false);
                right.set_merge_image(None, false);
            }
        }
        self.state = SessionState::StaticOnly;
        self.recompute_limits();
        self.emit(SessionEvent::LagChanged {
            frames: self.timeline.lag_frames(),
            millis: self.timeline.lag_ms(),
        });
        let current = self.timeline.current_frame();
        self.restore_position(current);
    }

    fn set_sync_point_inner(&mut self, reference: Option<NativePair>) {
        let Some(pair) = self.pair.as_ref() else {
            return;
        };
        let left_interval = pair.left().frame_interval_ms();
        let right_interval = pair.right().frame_interval_ms();
        self.timeline
            .set_sync_point(reference, left_interval, right_interval);
        self.latches = Latches::default();
        self.emit(SessionEvent::LagChanged {
            frames: self.timeline.lag_frames(),
            millis: self.timeline.lag_ms(),
        });
        self.recompute_limits();
        let current = self.timeline.current_frame();
        self.restore_position(current);
    }

    /// Refresh the millisecond lag after a speed change.
    fn refresh_lag_ms(&mut self) {
        let Some(pair) = self.pair.as_ref() else {
            return;
        };
        let left_interval = pair.left().frame_interval_ms();
        let right_interval = pair.right().frame_interval_ms();
        let current = self.timeline.current_frame();
        self.timeline
            .set_sync_point(None, left_interval, right_interval);
        self.timeline.set_current_frame(current);
        self.emit(SessionEvent::LagChanged {
            frames: self.timeline.lag_frames(),
            millis: self.timeline.lag_ms(),
        });
    }

    fn recompute_limits(&mut self) {
        let Some(pair) = self.pair.as_ref() else {
            return;
        };
        let left_len = pair.left().estimated_frame_count();
        let right_len = pair.right().estimated_frame_count();
        if self.timeline.compute_limits(left_len, right_len) {
            self.emit(SessionEvent::LagChanged {
                frames: 0,
                millis: 0,
            });
        }
        self.emit(SessionEvent::LimitsChanged {
            max_common_frame: self.timeline.max_common_frame(),
        });
    }

    fn restore_position(&mut self, common_frame: i64) {
        let Some(pair) = self.pair.as_mut() else {
            return;
        };
        let (left, right) = pair.both_mut();
        let result = StaticSync::new(&mut self.timeline, left, right).goto(common_frame);
        self.after_static(result.map(Some));
    }

    fn stepping<F>(&mut self, op: F)
    where
        F: FnOnce(&mut StaticSync<'_, P>) -> SyncResult<Option<NativePair>>,
    {
        if !self.is_synching() {
            return;
        }
        self.pause();
        let Some(pair) = self.pair.as_mut() else {
            return;
        };
        let (left, right) = pair.both_mut();
        let mut sync = StaticSync::new(&mut self.timeline, left, right);
        let result = op(&mut sync);
        self.after_static(result);
    }

    fn after_static(&mut self, result: SyncResult<Option<NativePair>>) {
        match result {
            Ok(Some(_)) => {
                self.emit(SessionEvent::CommonPositionChanged {
                    frame: self.timeline.current_frame(),
                });
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Static sync seek failed");
                self.emit(SessionEvent::CommonPositionChanged {
                    frame: self.timeline.current_frame(),
                });
                self.report_stall(&e);
            }
        }
    }

    /// Pause whichever player did not reach its target and tell the UI.
    fn report_stall(&mut self, error: &SyncError) {
        let natives = self.timeline.natives();
        let Some(pair) = self.pair.as_mut() else {
            return;
        };
        let mut stalled = Vec::new();
        for side in Side::BOTH {
            let player = pair.get_mut(side);
            let target = natives.get(side).clamp(0, player.last_frame());
            if player.current_frame() != target {
                player.ensure_paused();
                stalled.push((side, target));
            }
        }
        for (side, frame) in stalled {
            self.emit(SessionEvent::PlayerStalled {
                side,
                frame,
                reason: error.to_string(),
            });
        }
    }

    fn run_dynamic(&mut self) {
        let Some(pair) = self.pair.as_mut() else {
            return;
        };
        let (left, right) = pair.both_mut();
        let input = DynamicInput::new(
            left.current_frame(),
            right.current_frame(),
            left.frame_interval_ms(),
            right.frame_interval_ms(),
            self.timeline.lag_frames(),
            self.timeline.lag_ms(),
            self.prefs.catch_up_grace_ms,
        );
        let decision = dynamic::evaluate(&input, self.latches);

        for command in &decision.commands {
            match *command {
                Command::EnsurePlay(side) => pair.get_mut(side).ensure_playing(),
                Command::EnsurePause(side) => pair.get_mut(side).ensure_paused(),
            }
        }
        if decision.latches != self.latches {
            tracing::trace!(
                left = input.left_frame,
                right = input.right_frame,
                quadrant = ?decision.quadrant,
                latches = ?decision.latches,
                "Dynamic sync latches changed"
            );
        }
        self.latches = decision.latches;

        let previous = self.timeline.current_frame();
        let current = self.timeline.set_current_frame(decision.common_frame);
        if current != previous {
            self.emit(SessionEvent::CommonPositionChanged { frame: current });
        }
    }

    /// Give each player the other's plain frame to blend over its own.
    fn seed_merge_images(&mut self) {
        let Some(pair) = self.pair.as_mut() else {
            return;
        };
        let (left, right) = pair.both_mut();
        left.set_merge_image(None, false);
        right.set_merge_image(None, false);
        let left_image = left.current_image().ok();
        let right_image = right.current_image().ok();
        left.set_merge_image(right_image, true);
        right.set_merge_image(left_image, true);
    }

    fn emit_hairlines(&mut self) {
        let Some(pair) = self.pair.as_ref() else {
            return;
        };
        let actual = NativePair::new(pair.left().current_frame(), pair.right().current_frame());
        let hairlines = self.timeline.hairlines(actual);
        self.emit(SessionEvent::HairlinesChanged {
            left: hairlines.left,
            right: hairlines.right,
        });
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("Session event dropped, UI receiver gone");
        }
    }
}

impl<P: PlayerHandle + 'static> Drop for DualSyncSession<P> {
    fn drop(&mut self) {
        if let Some(active) = self.export.as_ref() {
            active.handle.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dualsync_player_core::synthetic::SyntheticPlayer;

    fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn session(left: i64, right: i64) -> (
        DualSyncSession<SyntheticPlayer>,
        mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let (mut session, rx) = DualSyncSession::new(&AppConfig::default());
        session.enter(
            SyntheticPlayer::new("left", left, 40.0),
            SyntheticPlayer::new("right", right, 40.0),
        );
        (session, rx)
    }

    #[test]
    fn enter_prepares_static_sync() {
        let (session, mut rx) = session(30, 40);
        assert_eq!(session.state(), SessionState::StaticOnly);
        assert_eq!(session.timeline().max_common_frame(), 40);
        assert!(drain(&mut rx).contains(&SessionEvent::LimitsChanged {
            max_common_frame: 40
        }));
    }

    #[test]
    fn unloaded_player_keeps_session_idle() {
        let (mut session, _rx) = DualSyncSession::new(&AppConfig::default());
        let mut right = SyntheticPlayer::new("right", 10, 40.0);
        right.unload();
        session.enter(SyntheticPlayer::new("left", 10, 40.0), right);
        assert_eq!(session.state(), SessionState::Idle);
        session.play();
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn play_and_pause_switch_states() {
        let (mut session, mut rx) = session(10, 10);
        session.play();
        assert_eq!(session.state(), SessionState::DynamicActive);
        assert!(session.player(Side::Left).unwrap().is_playing());
        assert!(session.player(Side::Right).unwrap().is_playing());

        session.toggle_play();
        assert_eq!(session.state(), SessionState::StaticOnly);
        assert!(!session.player(Side::Left).unwrap().is_playing());
        let events = drain(&mut rx);
        assert!(events.contains(&SessionEvent::PlaybackChanged { playing: false }));
    }

    #[test]
    fn stepping_pauses_dynamic_sync() {
        let (mut session, _rx) = session(10, 10);
        session.play();
        session.goto_next();
        assert_eq!(session.state(), SessionState::StaticOnly);
        assert_eq!(session.timeline().current_frame(), 1);
    }

    #[test]
    fn exit_detaches_players() {
        let (mut session, mut rx) = session(10, 10);
        let (left, right) = session.exit().unwrap();
        assert!(!left.is_attached());
        assert!(!right.is_attached());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(drain(&mut rx).contains(&SessionEvent::SyncLost));
    }

    #[test]
    fn user_pause_stops_both() {
        let (mut session, _rx) = session(10, 10);
        session.play();
        session.player_mut(Side::Left).unwrap().user_pause();
        session.pump();
        assert_eq!(session.state(), SessionState::StaticOnly);
        assert!(!session.player(Side::Right).unwrap().is_playing());
    }

    #[test]
    fn merge_forwards_images_to_the_other_player() {
        let (mut session, _rx) = session(10, 10);
        session.toggle_merge();
        assert!(session.is_merging());
        session.scrub(3);
        session.pump();
        let merged = session.player(Side::Right).unwrap().merge_image().unwrap();
        assert_eq!(SyntheticPlayer::frame_index_of(merged), Some(3));

        session.toggle_merge();
        assert!(session.player(Side::Right).unwrap().merge_image().is_none());
    }
}
