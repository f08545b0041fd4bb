//! DualSync Sync Engine
//!
//! Keeps two independently decoding players in lockstep on a common
//! timeline defined by a user-chosen sync point.
//!
//! - [`timeline`]: sync points, lag and the bounds of the common timeline
//! - [`static_sync`]: discrete repositioning (step, scrub, catch)
//! - [`dynamic`]: play/pause decisions taken on every produced frame
//! - [`session`]: the façade owning both players
//!
//! ```text
//!   UI intent ──> DualSyncSession ──┬── StaticSync ───> seek both
//!                      ^            └── dynamic::evaluate ──> play / pause
//!                      │
//!          PlayerEvent queue <── players
//! ```

pub mod dynamic;
pub mod session;
pub mod static_sync;
pub mod timeline;

pub use dynamic::{Command, Decision, DynamicInput, Latches, Quadrant};
pub use session::{DualSyncSession, SessionEvent, SessionState};
pub use static_sync::StaticSync;
pub use timeline::SyncTimeline;
