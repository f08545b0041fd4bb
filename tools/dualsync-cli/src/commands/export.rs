//! Export the synchronized composite of two synthetic players.

use std::path::PathBuf;
use std::time::Duration;

use dualsync_common::config::AppConfig;
use dualsync_render_engine::{
    EncoderSink, ExportOutcome, FfmpegSink, RawVideoSink, SideBySideCompositor,
};
use dualsync_sync_engine::SessionEvent;

use super::synced_session;
use crate::PairArgs;

pub struct ExportOptions {
    pub output: PathBuf,
    pub merge: bool,
    pub vertical: bool,
    pub cancel_at: Option<i64>,
    pub raw: bool,
}

pub async fn run(mut config: AppConfig, pair: PairArgs, options: ExportOptions) -> anyhow::Result<()> {
    let ExportOptions {
        output,
        merge,
        vertical,
        cancel_at,
        raw,
    } = options;
    config.export.horizontal = !vertical;
    let (mut session, mut rx) = synced_session(&config, &pair)?;
    if merge {
        session.toggle_merge();
    }

    println!("Exporting dual video to: {}", output.display());
    println!(
        "  Timeline: {} frames, lag {} frames",
        session.timeline().max_common_frame(),
        session.timeline().lag_frames()
    );
    println!(
        "  Layout: {}",
        match (merge, vertical) {
            (true, _) => "merged",
            (false, true) => "stacked",
            (false, false) => "side by side",
        }
    );

    let sink: Box<dyn EncoderSink> = if raw {
        Box::new(RawVideoSink::new())
    } else {
        Box::new(FfmpegSink::new())
    };
    println!("  Encoder: {}", if raw { "raw RGBA" } else { "ffmpeg" });

    session
        .start_export(&output, SideBySideCompositor::default(), sink)
        .map_err(|e| anyhow::anyhow!("Failed to start export: {e}"))?;

    let mut cancel_requested = false;
    let outcome = loop {
        let finished = session
            .poll_export()
            .map_err(|e| anyhow::anyhow!("Export worker failed: {e}"))?;

        while let Ok(event) = rx.try_recv() {
            if let SessionEvent::ExportProgress(progress) = event {
                print!(
                    "\r  Progress: {:>3}% ({}/{} frames)  ",
                    progress.percent, progress.frames_done, progress.total_frames
                );
                if let Some(limit) = cancel_at {
                    if !cancel_requested && progress.frames_done >= limit {
                        cancel_requested = true;
                        session.cancel_export();
                    }
                }
            }
        }

        if let Some(outcome) = finished {
            break outcome;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };
    println!();

    match outcome {
        ExportOutcome::Completed { frames } => {
            println!("Export complete: {frames} frames -> {}", output.display());
            if raw {
                println!(
                    "  Header: {}",
                    RawVideoSink::header_path(&output).display()
                );
            }
            Ok(())
        }
        ExportOutcome::Cancelled { frames } => {
            println!("Export cancelled after {frames} frames, partial output removed");
            Ok(())
        }
        ExportOutcome::OpenFailed(reason) => {
            Err(anyhow::anyhow!("Export could not start: {reason}"))
        }
        ExportOutcome::Failed(reason) => Err(anyhow::anyhow!("Export failed: {reason}")),
    }
}
