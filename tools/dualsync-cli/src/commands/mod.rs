pub mod export;
pub mod simulate;
pub mod snapshot;

use dualsync_common::clock::Side;
use dualsync_common::config::AppConfig;
use dualsync_player_core::synthetic::SyntheticPlayer;
use dualsync_player_core::PlayerHandle;
use dualsync_sync_engine::{DualSyncSession, SessionEvent};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::PairArgs;

pub type Session = DualSyncSession<SyntheticPlayer>;

/// Build a session over two synthetic players, synchronized at `pair.lag`
/// and parked on the first common frame.
pub fn synced_session(
    config: &AppConfig,
    pair: &PairArgs,
) -> anyhow::Result<(Session, UnboundedReceiver<SessionEvent>)> {
    if pair.left_frames <= 0 || pair.right_frames <= 0 {
        anyhow::bail!("Both videos need at least one frame");
    }
    let leader_frames = if pair.lag > 0 {
        pair.right_frames
    } else {
        pair.left_frames
    };
    if pair.lag.abs() >= leader_frames {
        anyhow::bail!(
            "Lag {} does not fit in the leading video ({leader_frames} frames)",
            pair.lag
        );
    }

    let (mut session, rx) = DualSyncSession::new(config);
    session.enter(
        SyntheticPlayer::new("left", pair.left_frames, pair.left_interval_ms),
        SyntheticPlayer::new("right", pair.right_frames, pair.right_interval_ms),
    );

    let (side, frame) = if pair.lag >= 0 {
        (Side::Right, pair.lag)
    } else {
        (Side::Left, -pair.lag)
    };
    if let Some(player) = session.player_mut(side) {
        player
            .seek_to(frame, false)
            .map_err(|e| anyhow::anyhow!("Failed to place sync point: {e}"))?;
    }
    session.set_sync_point();
    session.goto_first();
    session.pump();

    tracing::info!(
        lag_frames = session.timeline().lag_frames(),
        lag_ms = session.timeline().lag_ms(),
        max_common_frame = session.timeline().max_common_frame(),
        "Session ready"
    );
    Ok((session, rx))
}
