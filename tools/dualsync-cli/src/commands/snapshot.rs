//! Save a side-by-side still of both players.

use std::path::PathBuf;

use dualsync_common::clock::Side;
use dualsync_common::config::AppConfig;
use dualsync_player_core::PlayerHandle;
use dualsync_render_engine::SideBySideCompositor;

use super::synced_session;
use crate::PairArgs;

pub fn run(
    config: &AppConfig,
    pair: PairArgs,
    left_frame: i64,
    right_frame: i64,
    output: PathBuf,
) -> anyhow::Result<()> {
    let (mut session, _rx) = synced_session(config, &pair)?;

    for (side, frame) in [(Side::Left, left_frame), (Side::Right, right_frame)] {
        let player = session
            .player_mut(side)
            .ok_or_else(|| anyhow::anyhow!("No {} player", side.as_str()))?;
        player
            .seek_to(frame, false)
            .map_err(|e| anyhow::anyhow!("Failed to seek {}: {e}", side.as_str()))?;
    }

    let still = session
        .snapshot(&SideBySideCompositor::default())
        .map_err(|e| anyhow::anyhow!("Failed to render snapshot: {e}"))?;
    still
        .save(&output)
        .map_err(|e| anyhow::anyhow!("Failed to save {}: {e}", output.display()))?;

    println!(
        "Snapshot saved: {} ({}x{}, left frame {left_frame}, right frame {right_frame})",
        output.display(),
        still.width(),
        still.height()
    );
    Ok(())
}
