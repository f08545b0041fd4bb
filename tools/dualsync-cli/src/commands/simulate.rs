//! Simulated synchronized playback on a virtual clock.

use dualsync_common::clock::{NativePair, Side};
use dualsync_common::config::AppConfig;
use dualsync_player_core::PlayerHandle;
use dualsync_sync_engine::SessionEvent;

use super::synced_session;
use crate::PairArgs;

pub fn run(config: &AppConfig, pair: PairArgs, duration_ms: u64, trace: bool) -> anyhow::Result<()> {
    let (mut session, mut rx) = synced_session(config, &pair)?;

    println!(
        "Simulating {duration_ms}ms: left {} frames @ {}ms, right {} frames @ {}ms, lag {}",
        pair.left_frames, pair.left_interval_ms, pair.right_frames, pair.right_interval_ms, pair.lag
    );

    session.play();

    // Each player's timer fires at its own interval; the earliest one goes next.
    let mut positions = NativePair::default();
    let mut deadline_ms = [pair.left_interval_ms, pair.right_interval_ms];
    let mut frames_shown = [0u64; 2];
    let mut stalls = 0u64;
    let mut loops = 0u64;
    let end = duration_ms as f64;

    loop {
        let index = if deadline_ms[0] <= deadline_ms[1] { 0 } else { 1 };
        let now = deadline_ms[index];
        if now > end {
            break;
        }
        let side = Side::BOTH[index];

        let Some(player) = session.player_mut(side) else {
            anyhow::bail!("Players were released during simulation");
        };
        let was_playing = player.is_playing();
        let before = player.current_frame();
        let after = player.tick();
        deadline_ms[index] = now + player.frame_interval_ms();
        if was_playing {
            frames_shown[index] += 1;
            if after < before {
                loops += 1;
            }
        }
        session.pump();

        while let Ok(event) = rx.try_recv() {
            match event {
                SessionEvent::CommonPositionChanged { frame } if trace => {
                    let positions = current_positions(&session);
                    println!(
                        "  t={now:>8.1}ms common={frame:>5} left={:>5} right={:>5}",
                        positions.left, positions.right
                    );
                }
                SessionEvent::PlayerStalled { side, frame, reason } => {
                    stalls += 1;
                    println!("  {} stalled at frame {frame}: {reason}", side.as_str());
                }
                _ => {}
            }
        }
        positions = current_positions(&session);
    }

    session.pause();

    println!();
    println!("Result:");
    println!("  Common frame: {}", session.timeline().current_frame());
    println!("  Native frames: left={} right={}", positions.left, positions.right);
    println!(
        "  Frames shown: left={} right={}",
        frames_shown[0], frames_shown[1]
    );
    println!("  Loops: {loops}");
    println!("  Stalls: {stalls}");
    Ok(())
}

fn current_positions(session: &super::Session) -> NativePair {
    NativePair::new(
        session
            .player(Side::Left)
            .map_or(0, |player| player.current_frame()),
        session
            .player(Side::Right)
            .map_or(0, |player| player.current_frame()),
    )
}
