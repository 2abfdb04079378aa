//! Memory layers for piebot.
//!
//! [`WorkingMemory`] is the bounded, TTL-expiring in-process cache;
//! [`StateAdapter`] is the single writer of the durable canonical state
//! file and the only module that understands its patch vocabulary.

mod state;
mod working;

pub use state::{StateAdapter, StateError};
pub use working::{MemoryStats, WorkingMemory};
