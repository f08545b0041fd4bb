use dualsync_common::clock::{NativePair, Side};
use dualsync_common::config::AppConfig;
use dualsync_player_core::synthetic::SyntheticPlayer;
use dualsync_player_core::PlayerHandle;
use dualsync_sync_engine::{DualSyncSession, SessionEvent, SessionState};
use tokio::sync::mpsc::UnboundedReceiver;

type Session = DualSyncSession<SyntheticPlayer>;

fn start(
    config: &AppConfig,
    left: SyntheticPlayer,
    right: SyntheticPlayer,
) -> (Session, UnboundedReceiver<SessionEvent>) {
    let (mut session, rx) = DualSyncSession::new(config);
    session.enter(left, right);
    session.pump();
    (session, rx)
}

fn drain(rx: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn natives(session: &Session) -> NativePair {
    NativePair::new(
        session.player(Side::Left).expect("left").current_frame(),
        session.player(Side::Right).expect("right").current_frame(),
    )
}

/// Move one player on its own controls, then declare the sync point.
fn sync_at(session: &mut Session, left: i64, right: i64) {
    session
        .player_mut(Side::Left)
        .expect("left")
        .seek_to(left, false)
        .expect("seek");
    session
        .player_mut(Side::Right)
        .expect("right")
        .seek_to(right, false)
        .expect("seek");
    session.set_sync_point();
    session.pump();
}

fn tick(session: &mut Session, side: Side) -> i64 {
    let frame = session.player_mut(side).expect("player").tick();
    session.pump();
    frame
}

fn is_playing(session: &Session, side: Side) -> bool {
    session.player(side).expect("player").is_playing()
}

#[test]
fn equal_length_zero_lag_goto() {
    let (mut session, _rx) = start(
        &AppConfig::default(),
        SyntheticPlayer::new("left", 100, 40.0),
        SyntheticPlayer::new("right", 100, 40.0),
    );
    session.scrub(50);
    assert_eq!(natives(&session), NativePair::new(50, 50));
}

#[test]
fn positive_lag_goto_holds_left_at_start() {
    let (mut session, mut rx) = start(
        &AppConfig::default(),
        SyntheticPlayer::new("left", 100, 40.0),
        SyntheticPlayer::new("right", 100, 40.0),
    );
    sync_at(&mut session, 0, 10);
    assert_eq!(session.timeline().lag_frames(), 10);
    assert!(drain(&mut rx).contains(&SessionEvent::LagChanged {
        frames: 10,
        millis: 400
    }));

    session.scrub(5);
    assert_eq!(natives(&session), NativePair::new(0, 5));
    session.scrub(20);
    assert_eq!(natives(&session), NativePair::new(10, 20));
    assert!(drain(&mut rx).contains(&SessionEvent::CommonPositionChanged { frame: 20 }));
}

#[test]
fn limits_cover_both_players() {
    let (mut session, _rx) = start(
        &AppConfig::default(),
        SyntheticPlayer::new("left", 30, 40.0),
        SyntheticPlayer::new("right", 40, 40.0),
    );
    sync_at(&mut session, 7, 0);
    assert_eq!(session.timeline().max_common_frame(), 47);

    session.goto_last();
    assert_eq!(session.timeline().current_frame(), 46);
    assert_eq!(natives(&session), NativePair::new(29, 39));

    session.goto_next();
    assert_eq!(session.timeline().current_frame(), 46);
}

#[test]
fn stale_lag_resets_on_restore() {
    let (mut session, _rx) = start(
        &AppConfig::default(),
        SyntheticPlayer::new("left", 100, 40.0),
        SyntheticPlayer::new("right", 20, 40.0),
    );
    session.restore_sync_points(0, 50);
    assert_eq!(session.timeline().lag_frames(), 0);
    assert_eq!(session.timeline().max_common_frame(), 100);
}

#[test]
fn zero_lag_playback_stays_in_lockstep() {
    let (mut session, _rx) = start(
        &AppConfig::default(),
        SyntheticPlayer::new("left", 5, 40.0),
        SyntheticPlayer::new("right", 5, 40.0),
    );
    session.play();

    for _ in 0..12 {
        tick(&mut session, Side::Left);
        tick(&mut session, Side::Right);
        let positions = natives(&session);
        assert_eq!(positions.left, positions.right);
    }
    assert_eq!(session.state(), SessionState::DynamicActive);
}

#[test]
fn play_realigns_a_player_moved_on_its_own() {
    let (mut session, _rx) = start(
        &AppConfig::default(),
        SyntheticPlayer::new("left", 100, 40.0),
        SyntheticPlayer::new("right", 100, 40.0),
    );
    session.scrub(10);
    session
        .player_mut(Side::Right)
        .expect("right")
        .seek_to(30, false)
        .expect("seek");

    session.play();
    assert_eq!(natives(&session), NativePair::new(10, 10));
    assert_eq!(session.timeline().current_frame(), 10);

    for _ in 0..5 {
        tick(&mut session, Side::Left);
        tick(&mut session, Side::Right);
    }
    assert_eq!(natives(&session), NativePair::new(15, 15));
    assert_eq!(session.timeline().current_frame(), 15);
}

#[test]
fn positive_lag_releases_left_after_the_lag() {
    let (mut session, _rx) = start(
        &AppConfig::default(),
        SyntheticPlayer::new("left", 10, 40.0),
        SyntheticPlayer::new("right", 10, 40.0),
    );
    sync_at(&mut session, 0, 3);
    session.goto_first();
    session.pump();
    session.play();

    assert!(!is_playing(&session, Side::Left));
    assert!(is_playing(&session, Side::Right));

    // 40ms and 80ms are still short of 120ms - 24ms.
    tick(&mut session, Side::Right);
    tick(&mut session, Side::Left);
    tick(&mut session, Side::Right);
    assert!(!is_playing(&session, Side::Left));
    assert_eq!(natives(&session), NativePair::new(0, 2));

    tick(&mut session, Side::Right);
    assert!(is_playing(&session, Side::Left));
    assert_eq!(session.timeline().current_frame(), 3);

    tick(&mut session, Side::Left);
    tick(&mut session, Side::Right);
    assert_eq!(natives(&session), NativePair::new(1, 4));
    assert_eq!(session.timeline().current_frame(), 4);
}

#[test]
fn catch_up_grace_window_releases_right() {
    // Left leads by 25 frames of 20ms: -500ms.
    let (mut session, _rx) = start(
        &AppConfig::default(),
        SyntheticPlayer::new("left", 100, 20.0),
        SyntheticPlayer::new("right", 100, 20.0),
    );
    sync_at(&mut session, 25, 0);
    assert_eq!(session.timeline().lag_ms(), -500);
    session.goto_first();
    session.pump();
    session.play();
    assert!(session.latches().left_catching_up);

    for expected in 1..=23 {
        assert_eq!(tick(&mut session, Side::Left), expected);
        assert!(
            !is_playing(&session, Side::Right),
            "right released early at left frame {expected}"
        );
    }

    // Release needs strictly more than 500ms - 24ms = 476ms; 480ms is the
    // first left position past it.
    assert_eq!(tick(&mut session, Side::Left), 24);
    assert!(is_playing(&session, Side::Right));
    assert!(session.latches().right_starting);
    assert!(!session.latches().left_catching_up);
}

#[test]
fn manual_pause_is_respected_while_catching_up() {
    let (mut session, _rx) = start(
        &AppConfig::default(),
        SyntheticPlayer::new("left", 100, 20.0),
        SyntheticPlayer::new("right", 100, 20.0),
    );
    sync_at(&mut session, 25, 0);
    session.goto_first();
    session.pump();
    session.play();
    tick(&mut session, Side::Left);

    // Individual pause, bypassing the pause request.
    session
        .player_mut(Side::Left)
        .expect("left")
        .request_play_toggle();
    assert_eq!(tick(&mut session, Side::Left), 1);
    assert!(!is_playing(&session, Side::Left));
}

#[test]
fn locked_speeds_follow_and_refresh_lag() {
    let mut config = AppConfig::default();
    config.sync.lock_speeds = true;
    let (mut session, mut rx) = start(
        &config,
        SyntheticPlayer::new("left", 100, 40.0),
        SyntheticPlayer::new("right", 100, 40.0),
    );
    sync_at(&mut session, 0, 10);
    drain(&mut rx);

    session
        .player_mut(Side::Left)
        .expect("left")
        .set_speed_percent(50.0);
    session.pump();

    assert_eq!(session.player(Side::Right).expect("right").speed_percent(), 50.0);
    assert_eq!(session.timeline().lag_frames(), 10);
    assert_eq!(session.timeline().lag_ms(), 800);
    assert!(drain(&mut rx).contains(&SessionEvent::LagChanged {
        frames: 10,
        millis: 800
    }));
}

#[test]
fn unlocked_speed_change_only_refreshes_lag() {
    let (mut session, _rx) = start(
        &AppConfig::default(),
        SyntheticPlayer::new("left", 100, 40.0),
        SyntheticPlayer::new("right", 100, 40.0),
    );
    sync_at(&mut session, 0, 10);
    session
        .player_mut(Side::Right)
        .expect("right")
        .set_speed_percent(200.0);
    session.pump();

    assert_eq!(session.player(Side::Left).expect("left").speed_percent(), 100.0);
    assert_eq!(session.timeline().lag_ms(), 200);
}

#[test]
fn swap_mirrors_the_lag() {
    let (mut session, _rx) = start(
        &AppConfig::default(),
        SyntheticPlayer::new("a", 100, 40.0),
        SyntheticPlayer::new("b", 100, 40.0),
    );
    sync_at(&mut session, 0, 10);
    session.swap();
    session.pump();

    assert_eq!(session.player(Side::Left).expect("left").name(), "b");
    assert_eq!(session.timeline().lag_frames(), -10);
    assert_eq!(session.latches(), Default::default());

    session.scrub(15);
    assert_eq!(natives(&session), NativePair::new(15, 5));
}

#[test]
fn resynchronize_after_moving_one_player() {
    let (mut session, _rx) = start(
        &AppConfig::default(),
        SyntheticPlayer::new("left", 100, 40.0),
        SyntheticPlayer::new("right", 100, 40.0),
    );
    sync_at(&mut session, 0, 10);
    session.scrub(30);
    session
        .player_mut(Side::Left)
        .expect("left")
        .seek_to(35, false)
        .expect("seek");

    session.resynchronize();
    assert_eq!(session.timeline().current_frame(), 45);
    assert_eq!(natives(&session), NativePair::new(35, 45));
}

#[test]
fn decode_failure_pauses_the_side_and_reports() {
    let (mut session, mut rx) = start(
        &AppConfig::default(),
        SyntheticPlayer::new("left", 10, 40.0).fail_decoding_at(3),
        SyntheticPlayer::new("right", 10, 40.0),
    );
    session.play();
    for _ in 0..3 {
        tick(&mut session, Side::Left);
    }

    assert!(!is_playing(&session, Side::Left));
    let stalled = drain(&mut rx).into_iter().any(|event| {
        matches!(
            event,
            SessionEvent::PlayerStalled {
                side: Side::Left,
                frame: 3,
                ..
            }
        )
    });
    assert!(stalled);
}

#[test]
fn failed_seek_is_reported_as_stall() {
    let (mut session, mut rx) = start(
        &AppConfig::default(),
        SyntheticPlayer::new("left", 10, 40.0).fail_decoding_at(6),
        SyntheticPlayer::new("right", 10, 40.0),
    );
    session.scrub(6);
    assert_eq!(natives(&session), NativePair::new(0, 6));
    assert!(drain(&mut rx)
        .iter()
        .any(|event| matches!(event, SessionEvent::PlayerStalled { side: Side::Left, .. })));
}

#[test]
fn losing_a_player_returns_to_idle() {
    let (mut session, mut rx) = start(
        &AppConfig::default(),
        SyntheticPlayer::new("left", 10, 40.0),
        SyntheticPlayer::new("right", 10, 40.0),
    );
    session.play();
    assert!(is_playing(&session, Side::Left));
    session.player_mut(Side::Right).expect("right").unload();
    session.players_reloaded();

    assert_eq!(session.state(), SessionState::Idle);
    assert!(!is_playing(&session, Side::Left));
    assert_eq!(session.latches(), Default::default());
    assert!(drain(&mut rx).contains(&SessionEvent::SyncLost));

    session.player_mut(Side::Right).expect("right").reload(20);
    session.players_reloaded();
    assert_eq!(session.state(), SessionState::StaticOnly);
    assert_eq!(session.timeline().max_common_frame(), 20);
}

#[test]
fn hairlines_project_native_positions() {
    let (mut session, mut rx) = start(
        &AppConfig::default(),
        SyntheticPlayer::new("left", 100, 40.0),
        SyntheticPlayer::new("right", 100, 40.0),
    );
    sync_at(&mut session, 0, 10);
    drain(&mut rx);
    session.scrub(25);
    session.pump();

    assert!(drain(&mut rx).contains(&SessionEvent::HairlinesChanged {
        left: 25,
        right: 25
    }));
}
