//! Suspendable routines.
//!
//! A [`Generator`] wraps a body written as an `async` block. The body
//! suspends at every `co.produce(value).await` and is resumed, one
//! suspension point at a time, by [`Generator::step`].

mod cursor;
mod generator;
mod park;
mod step;

pub use cursor::Cursor;
pub use generator::{Co, Generator, Produce};
pub use step::Step;
