//! The `transport` module is responsible for the TCP side of the broker.
//!
//! It accepts connections, gives each one a `Client` record and a writer
//! task, reads frames off the socket and forwards every decoded message to
//! the shared broker.

pub mod tcp;

pub use tcp::{serve, start_server};

#[cfg(test)]
mod tests;
