//! Single-slot handoff between two suspendable routines on two threads.
//!
//! The routines themselves come from the [`coro`] crate; this crate adds the
//! guarded slot they meet at ([`Channel`]), the mutex/condvar pair it is
//! built on ([`sync::Monitor`]) and helpers wiring a producer and a consumer
//! routine to their own threads ([`pipeline`]).

mod channel;
mod config;
mod error;
pub mod pipeline;
pub mod sync;

pub use channel::{Channel, Receiving, Sending, SlotState};
pub use config::{ChannelConfig, WAIT_MODE_ENV};
pub use coro::{Co, Cursor, Generator, Step};
pub use error::{Error, Result};
pub use sync::WaitMode;
