//! Continuous play/pause coordination.
//!
//! Every time either player produces a frame, the pair of native positions
//! is classified into one of four [`Quadrant`]s and a decision table picks
//! the play/pause commands and the new common position. Playback itself is
//! driven by each player's own timer; this module only starts and stops
//! players, it never steps one.
//!
//! Manual pauses are respected everywhere except at the explicit
//! `EnsurePlay` transition points below.
//!
//! | Quadrant        | lag = 0                       | waiting side leads               | advanced side leads                      |
//! |-----------------|-------------------------------|----------------------------------|------------------------------------------|
//! | one advanced    | pause waiting unless starting | pause waiting unless starting    | release waiting past `abs(lag) - grace`   |
//! | both at start   | play both once                | play the leader, pause the other | (same)                                   |
//! | both advanced   | play both                     | play both                        | play both                                |

use dualsync_common::clock::{frames_to_millis, LagSign, Side};

/// Instantaneous classification of the two native positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    /// Left has advanced, right sits on its first frame.
    LeftAdvanced,
    /// Both on their first frame.
    BothAtStart,
    /// Right has advanced, left sits on its first frame.
    RightAdvanced,
    /// Both running.
    BothAdvanced,
}

impl Quadrant {
    pub fn classify(left_frame: i64, right_frame: i64) -> Self {
        match (left_frame > 0, right_frame > 0) {
            (true, false) => Quadrant::LeftAdvanced,
            (false, false) => Quadrant::BothAtStart,
            (false, true) => Quadrant::RightAdvanced,
            (true, true) => Quadrant::BothAdvanced,
        }
    }

    /// The side that moved off its first frame while the other did not.
    pub fn advanced_side(self) -> Option<Side> {
        match self {
            Quadrant::LeftAdvanced => Some(Side::Left),
            Quadrant::RightAdvanced => Some(Side::Right),
            Quadrant::BothAtStart | Quadrant::BothAdvanced => None,
        }
    }
}

/// Transient flags carried between evaluations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Latches {
    /// Left is on its first frame but was asked to play.
    pub left_starting: bool,
    pub right_starting: bool,
    /// Left runs alone while right waits out the lag.
    pub left_catching_up: bool,
    pub right_catching_up: bool,
}

impl Latches {
    pub fn starting(&self, side: Side) -> bool {
        match side {
            Side::Left => self.left_starting,
            Side::Right => self.right_starting,
        }
    }

    pub fn catching_up(&self, side: Side) -> bool {
        match side {
            Side::Left => self.left_catching_up,
            Side::Right => self.right_catching_up,
        }
    }

    pub fn set_starting(&mut self, side: Side, value: bool) {
        match side {
            Side::Left => self.left_starting = value,
            Side::Right => self.right_starting = value,
        }
    }

    pub fn set_catching_up(&mut self, side: Side, value: bool) {
        match side {
            Side::Left => self.left_catching_up = value,
            Side::Right => self.right_catching_up = value,
        }
    }

    /// Clear only the starting flags, as a user pause does.
    pub fn clear_starting(&mut self) {
        self.left_starting = false;
        self.right_starting = false;
    }
}

/// Everything one evaluation looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicInput {
    pub left_frame: i64,
    pub right_frame: i64,
    pub left_ms: i64,
    pub right_ms: i64,
    pub lag_frames: i64,
    pub lag_ms: i64,
    pub grace_ms: i64,
}

impl DynamicInput {
    /// Build the input from native positions and current frame intervals.
    pub fn new(
        left_frame: i64,
        right_frame: i64,
        left_interval_ms: f64,
        right_interval_ms: f64,
        lag_frames: i64,
        lag_ms: i64,
        grace_ms: i64,
    ) -> Self {
        Self {
            left_frame,
            right_frame,
            left_ms: frames_to_millis(left_frame, left_interval_ms),
            right_ms: frames_to_millis(right_frame, right_interval_ms),
            lag_frames,
            lag_ms,
            grace_ms,
        }
    }

    fn frame(&self, side: Side) -> i64 {
        match side {
            Side::Left => self.left_frame,
            Side::Right => self.right_frame,
        }
    }

    fn millis(&self, side: Side) -> i64 {
        match side {
            Side::Left => self.left_ms,
            Side::Right => self.right_ms,
        }
    }
}

/// A playback command for one player. Both are idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    EnsurePlay(Side),
    EnsurePause(Side),
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub quadrant: Quadrant,
    /// Commands to apply, in order.
    pub commands: Vec<Command>,
    pub latches: Latches,
    pub common_frame: i64,
}

/// Decide what both players should do after a frame was produced.
pub fn evaluate(input: &DynamicInput, latches: Latches) -> Decision {
    let quadrant = Quadrant::classify(input.left_frame, input.right_frame);
    let mut latches = latches;
    let mut commands = Vec::with_capacity(2);

    let common_frame = match quadrant {
        Quadrant::LeftAdvanced => {
            one_side_advanced(Side::Left, input, &mut latches, &mut commands)
        }
        Quadrant::RightAdvanced => {
            one_side_advanced(Side::Right, input, &mut latches, &mut commands)
        }
        Quadrant::BothAtStart => {
            both_at_start(input, &mut latches, &mut commands);
            0
        }
        Quadrant::BothAdvanced => {
            commands.push(Command::EnsurePlay(Side::Left));
            commands.push(Command::EnsurePlay(Side::Right));
            latches.clear_starting();
            input.left_frame.max(input.right_frame)
        }
    };

    Decision {
        quadrant,
        commands,
        latches,
        common_frame,
    }
}

/// One player has moved off its first frame, the other (`waiting`) has not:
/// it either just looped, is about to restart, or is waiting out the lag.
fn one_side_advanced(
    advanced: Side,
    input: &DynamicInput,
    latches: &mut Latches,
    commands: &mut Vec<Command>,
) -> i64 {
    let waiting = advanced.other();
    let position = input.frame(advanced);

    commands.push(Command::EnsurePlay(advanced));
    latches.set_starting(advanced, false);

    match LagSign::of(input.lag_frames).leader() {
        None => {
            // Waiting side looped: hold it for the common restart.
            if !latches.starting(waiting) {
                commands.push(Command::EnsurePause(waiting));
            }
            position
        }
        Some(leader) if leader == waiting => {
            // The waiting side should have started first, so the advanced
            // side is finishing its lap.
            if latches.starting(waiting) {
                position
            } else {
                commands.push(Command::EnsurePause(waiting));
                position + input.lag_frames.abs()
            }
        }
        Some(_) => {
            if !latches.catching_up(advanced) && !latches.starting(waiting) {
                // Advanced side is finishing its lap after the other looped.
                commands.push(Command::EnsurePause(waiting));
            } else if input.millis(advanced) > input.lag_ms.abs() - input.grace_ms {
                commands.push(Command::EnsurePlay(waiting));
                latches.set_starting(waiting, true);
                latches.set_catching_up(advanced, false);
            } else {
                // Still ahead of the sync point; a manual pause is kept.
                latches.set_catching_up(advanced, true);
            }
            position
        }
    }
}

fn both_at_start(input: &DynamicInput, latches: &mut Latches, commands: &mut Vec<Command>) {
    match LagSign::of(input.lag_frames).leader() {
        None => {
            if !latches.left_starting && !latches.right_starting {
                commands.push(Command::EnsurePlay(Side::Left));
                commands.push(Command::EnsurePlay(Side::Right));
                latches.left_starting = true;
                latches.right_starting = true;
            }
        }
        Some(leader) => {
            let follower = leader.other();
            if follower == Side::Left {
                commands.push(Command::EnsurePause(follower));
                commands.push(Command::EnsurePlay(leader));
            } else {
                commands.push(Command::EnsurePlay(leader));
                commands.push(Command::EnsurePause(follower));
            }
            latches.set_starting(leader, true);
            latches.set_catching_up(leader, true);
        }
    }
}
