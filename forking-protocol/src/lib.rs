//! Line-oriented control protocol of the forking service.
//!
//! One request line in, one response line out, then the server closes the
//! connection. There is no session state.

pub mod client;
pub mod messages;
pub mod server;

pub use client::ControlClient;
pub use messages::{ControlCommand, ControlResponse, ProtocolError};
pub use server::ControlConnection;
