//! Channel layer for prompt-driven PTY exchanges.
//!
//! Most collection work runs over exec channels and never sees a prompt.
//! Commands that ask questions (a `copy` waiting for a password) or that
//! change shell state (`cli vrf`) need a PTY, and this module drives one.

mod buffer;
mod interactive;
mod pty;

pub use buffer::PatternBuffer;
pub use interactive::{InteractiveEvent, InteractiveResult, InteractiveStep};
pub use pty::{PtyChannel, PtyConfig};
