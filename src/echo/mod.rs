//! TCP echo service used as the default system under test.
//!
//! [`EchoServer`] echoes length-prefixed frames back to the sender and
//! [`EchoUnit`] drives it from pooled client connections.

pub mod codec;
pub mod server;
pub mod unit;

pub use codec::{CodecError, EchoCodec};
pub use server::EchoServer;
pub use unit::{EchoUnit, TcpFactory};
