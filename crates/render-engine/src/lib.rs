//! DualSync Render Engine
//!
//! Offline export of two synchronized players into a single composite
//! video, decoupled from live playback.
//!
//! # Pipeline Architecture
//!
//! ```text
//! common frame ── CommonToNative ──┬── seek left ──┐
//!                                  │               ├── Compositor ── EncoderSink ── output
//!                                  └── seek right ─┘
//!                                  (merge mode: leading side only)
//! ```
//!
//! The export runs on its own worker thread. Progress flows back through a
//! bounded queue and cancellation is a flag polled once per frame.

pub mod compositor;
pub mod export;
pub mod sink;

pub use compositor::*;
pub use export::*;
pub use sink::*;
