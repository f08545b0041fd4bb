//! Synchronized dual-video export.
//!
//! The coordinator walks the common timeline frame by frame on a dedicated
//! worker thread, seeks both players without UI refresh, renders the
//! composite and streams it to an [`EncoderSink`]. The players are moved
//! into the worker for the duration of the export and handed back in the
//! [`ExportReport`], so nothing else can seek them meanwhile.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use dualsync_common::clock::{common_to_native, leading_side, Side};
use dualsync_common::error::{SyncError, SyncResult};
use dualsync_player_core::PlayerHandle;
use image::RgbaImage;
use tokio::sync::mpsc;

use crate::compositor::{blend, pad_to_even_height, Compositor};
use crate::sink::EncoderSink;

/// Read-only view of the sync timeline taken when an export starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineSnapshot {
    pub lag_frames: i64,
    /// Number of frames on the common timeline.
    pub max_common_frame: i64,
}

/// An export job ready to be rendered.
#[derive(Debug, Clone)]
pub struct ExportJob {
    /// Output file path.
    pub target_path: PathBuf,

    /// First common frame to export.
    pub start_common_frame: i64,

    /// Common frame to stop at (exclusive).
    pub end_common_frame: i64,

    /// Frame lag at the time the job was created.
    pub lag_frames: i64,

    /// Export a single view: the leading player's frame with the other
    /// player's frame blended over it.
    pub merge_mode: bool,

    /// Side by side (true) or stacked (false).
    pub horizontal: bool,
}

impl ExportJob {
    /// Export the whole common timeline.
    pub fn whole_timeline(
        target_path: impl Into<PathBuf>,
        snapshot: TimelineSnapshot,
        merge_mode: bool,
        horizontal: bool,
    ) -> Self {
        Self {
            target_path: target_path.into(),
            start_common_frame: 0,
            end_common_frame: snapshot.max_common_frame.max(0),
            lag_frames: snapshot.lag_frames,
            merge_mode,
            horizontal,
        }
    }

    /// Number of frames the job produces.
    pub fn total_frames(&self) -> i64 {
        (self.end_common_frame - self.start_common_frame).max(0)
    }
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Preparing,
    Rendering,
    Finalizing,
    Complete,
    Cancelled,
    Failed,
}

/// Export progress report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportProgress {
    /// Frames written so far.
    pub frames_done: i64,

    /// Total frames to write.
    pub total_frames: i64,

    /// Completion in whole percent, [0, 100].
    pub percent: u8,

    pub stage: ExportStage,
}

impl ExportProgress {
    fn new(frames_done: i64, total_frames: i64, stage: ExportStage) -> Self {
        let percent = if total_frames <= 0 {
            100
        } else {
            ((frames_done as f64 / total_frames as f64) * 100.0).clamp(0.0, 100.0) as u8
        };
        Self {
            frames_done,
            total_frames,
            percent,
            stage,
        }
    }
}

/// How an export ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// All frames written and the sink finalized.
    Completed { frames: u64 },

    /// The user cancelled; the partial file was discarded.
    Cancelled { frames: u64 },

    /// The sink could not be opened; nothing was written.
    OpenFailed(String),

    /// Rendering, writing or finalizing failed partway.
    Failed(String),
}

impl ExportOutcome {
    /// Coarse result code: 0 success, 1 cancelled, 2 open failure, 3 failed.
    pub fn code(&self) -> u8 {
        match self {
            ExportOutcome::Completed { .. } => 0,
            ExportOutcome::Cancelled { .. } => 1,
            ExportOutcome::OpenFailed(_) => 2,
            ExportOutcome::Failed(_) => 3,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExportOutcome::Completed { .. })
    }
}

/// Everything handed back by a finished export.
#[derive(Debug)]
pub struct ExportReport<P, S> {
    pub outcome: ExportOutcome,
    pub left: P,
    pub right: P,
    pub sink: S,
}

/// Cooperative cancellation flag, checked once per frame boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives one export job over a pair of players.
pub struct ExportCoordinator<P, C, S> {
    job: ExportJob,
    left: P,
    right: P,
    compositor: C,
    sink: S,
    cancel: CancelToken,
    progress_capacity: usize,
}

enum LoopEnd {
    Done,
    Cancelled,
    Failed(String),
}

impl<P, C, S> ExportCoordinator<P, C, S>
where
    P: PlayerHandle + 'static,
    C: Compositor + 'static,
    S: EncoderSink + 'static,
{
    pub fn new(job: ExportJob, left: P, right: P, compositor: C, sink: S) -> Self {
        Self {
            job,
            left,
            right,
            compositor,
            sink,
            cancel: CancelToken::new(),
            progress_capacity: 64,
        }
    }

    /// Use an externally owned cancellation flag.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Bound of the progress queue; progress beyond it is dropped.
    pub fn with_progress_capacity(mut self, capacity: usize) -> Self {
        self.progress_capacity = capacity.max(1);
        self
    }

    /// Run the export on a dedicated worker thread.
    pub fn spawn(self) -> SyncResult<ExportHandle<P, S>> {
        let (tx, rx) = mpsc::channel(self.progress_capacity);
        let cancel = self.cancel.clone();

        let join = std::thread::Builder::new()
            .name("dual-export".to_string())
            .spawn(move || {
                self.run(|progress| {
                    if tx.try_send(progress).is_err() {
                        tracing::trace!(
                            frames_done = progress.frames_done,
                            "Progress queue full, update dropped"
                        );
                    }
                })
            })
            .map_err(|e| SyncError::export(format!("Failed to start export worker: {e}")))?;

        Ok(ExportHandle {
            cancel,
            progress: rx,
            join: Some(join),
        })
    }

    /// Run the export on the calling thread.
    pub fn run(mut self, mut progress: impl FnMut(ExportProgress)) -> ExportReport<P, S> {
        let started = std::time::Instant::now();
        let total = self.job.total_frames();
        tracing::info!(
            output = %self.job.target_path.display(),
            frames = total,
            lag_frames = self.job.lag_frames,
            merge = self.job.merge_mode,
            "Starting dual export"
        );

        self.left.set_export_in_progress(true);
        self.right.set_export_in_progress(true);
        // Live merge images are dropped; merged frames are blended from fresh decodes.
        self.left.set_merge_image(None, false);
        self.right.set_merge_image(None, false);
        progress(ExportProgress::new(0, total, ExportStage::Preparing));

        let outcome = self.export_frames(total, &mut progress);

        match &outcome {
            ExportOutcome::Completed { frames } => {
                progress(ExportProgress::new(*frames as i64, total, ExportStage::Complete));
                tracing::info!(
                    frames,
                    elapsed_secs = started.elapsed().as_secs_f64(),
                    "Dual export finished"
                );
            }
            ExportOutcome::Cancelled { frames } => {
                progress(ExportProgress::new(*frames as i64, total, ExportStage::Cancelled));
                tracing::info!(frames, "Dual export cancelled");
            }
            ExportOutcome::OpenFailed(reason) | ExportOutcome::Failed(reason) => {
                progress(ExportProgress::new(0, total, ExportStage::Failed));
                tracing::warn!(reason = %reason, code = outcome.code(), "Dual export failed");
            }
        }

        self.left.set_export_in_progress(false);
        self.right.set_export_in_progress(false);

        ExportReport {
            outcome,
            left: self.left,
            right: self.right,
            sink: self.sink,
        }
    }

    fn export_frames(
        &mut self,
        total: i64,
        progress: &mut impl FnMut(ExportProgress),
    ) -> ExportOutcome {
        if total <= 0 {
            return ExportOutcome::Failed("Common timeline is empty".to_string());
        }
        if self.cancel.is_cancelled() {
            return ExportOutcome::Cancelled { frames: 0 };
        }

        // The first composite gives the frame size needed to open the sink.
        let first = match self.composite_at(self.job.start_common_frame) {
            Ok(image) => image,
            Err(e) => return ExportOutcome::Failed(e.to_string()),
        };
        tracing::debug!(
            width = first.width(),
            height = first.height(),
            "Composite size"
        );

        let frame_interval_ms = self
            .left
            .frame_interval_ms()
            .max(self.right.frame_interval_ms());
        let target = self.job.target_path.clone();
        if let Err(e) = self
            .sink
            .open(&target, first.width(), first.height(), frame_interval_ms)
        {
            return ExportOutcome::OpenFailed(e.to_string());
        }

        let mut written: u64 = 0;
        let end = self.write_loop(first, total, &mut written, progress);

        match end {
            LoopEnd::Done => {
                progress(ExportProgress::new(
                    written as i64,
                    total,
                    ExportStage::Finalizing,
                ));
                match self.sink.close(true) {
                    Ok(()) => ExportOutcome::Completed { frames: written },
                    Err(e) => ExportOutcome::Failed(format!("Failed to finalize output: {e}")),
                }
            }
            LoopEnd::Cancelled => {
                self.discard(&target);
                ExportOutcome::Cancelled { frames: written }
            }
            LoopEnd::Failed(reason) => {
                self.discard(&target);
                ExportOutcome::Failed(reason)
            }
        }
    }

    fn write_loop(
        &mut self,
        first: RgbaImage,
        total: i64,
        written: &mut u64,
        progress: &mut impl FnMut(ExportProgress),
    ) -> LoopEnd {
        let mut pending = Some(first);
        let mut frame = self.job.start_common_frame;

        loop {
            let image = match pending.take() {
                Some(image) => image,
                None => match self.composite_at(frame) {
                    Ok(image) => image,
                    Err(e) => return LoopEnd::Failed(format!("Frame {frame}: {e}")),
                },
            };

            if let Err(e) = self.sink.write_frame(&image) {
                return LoopEnd::Failed(format!("Frame {frame}: {e}"));
            }
            *written += 1;
            progress(ExportProgress::new(
                *written as i64,
                total,
                ExportStage::Rendering,
            ));

            frame += 1;
            if frame >= self.job.end_common_frame {
                return LoopEnd::Done;
            }
            if self.cancel.is_cancelled() {
                return LoopEnd::Cancelled;
            }
        }
    }

    fn composite_at(&mut self, common_frame: i64) -> SyncResult<RgbaImage> {
        let natives = common_to_native(common_frame, self.job.lag_frames);

        let left_target = natives.left.min(self.left.last_frame());
        let right_target = natives.right.min(self.right.last_frame());
        self.left.seek_to(left_target, false)?;
        self.right.seek_to(right_target, false)?;

        if self.job.merge_mode {
            let (leader, other) = match leading_side(self.job.lag_frames) {
                Side::Left => (&mut self.left, &mut self.right),
                Side::Right => (&mut self.right, &mut self.left),
            };
            let base = leader.current_image()?;
            let top = other.current_image()?;
            return Ok(pad_to_even_height(blend(&base, &top)));
        }

        let left_image = self.left.current_image()?;
        let right_image = self.right.current_image()?;
        Ok(self
            .compositor
            .render(&left_image, &right_image, true, self.job.horizontal))
    }

    fn discard(&mut self, target: &Path) {
        if let Err(e) = self.sink.close(false) {
            tracing::warn!(error = %e, "Failed to discard export sink");
        }
        delete_partial_output(target);
    }
}

/// Best-effort removal of a partially written output.
fn delete_partial_output(path: &Path) {
    if !path.exists() {
        return;
    }
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Deleted partial export"),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to delete partial export")
        }
    }
}

/// Handle to an export running on its worker thread.
pub struct ExportHandle<P, S> {
    cancel: CancelToken,
    progress: mpsc::Receiver<ExportProgress>,
    join: Option<JoinHandle<ExportReport<P, S>>>,
}

impl<P, S> ExportHandle<P, S> {
    /// Ask the worker to stop at the next frame boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Next queued progress update, if any.
    pub fn try_progress(&mut self) -> Option<ExportProgress> {
        self.progress.try_recv().ok()
    }

    /// Whether the worker has returned.
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, |join| join.is_finished())
    }

    /// Wait for the worker and collect its report.
    pub fn join(mut self) -> SyncResult<ExportReport<P, S>> {
        let join = self
            .join
            .take()
            .ok_or_else(|| SyncError::export("Export worker already joined"))?;
        join.join()
            .map_err(|_| SyncError::export("Export worker panicked"))
    }
}
