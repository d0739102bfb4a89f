//! Resource reuse for units of work.
//!
//! [`RingBuffer`] is a bounded, lock-protected FIFO. [`ConnectionPool`] sits
//! on top of it and adds a [`Factory`] for creating and destroying resources.

pub mod connection_pool;
pub mod ring;

pub use connection_pool::{ConnectionPool, Factory};
pub use ring::RingBuffer;
