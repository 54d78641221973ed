//! # CerealBus
//!
//! `cerealbus` is an in-memory publish/subscribe broker that speaks a small
//! framed protocol over TCP. Each frame carries its own payload format (JSON,
//! XML or a binary record), and every client receives messages in the format
//! it announced. Topics form a prefix hierarchy: a new topic starts with the
//! subscribers of every existing topic whose name is a prefix of its own.
//!
//! ## Core Modules
//!
//! - `broker`: topic store, subscriber inheritance and message routing.
//! - `client`: the broker's per-connection record and the `Queue` middleware.
//! - `config`: loading server configuration from files and environment.
//! - `protocol`: frames, messages and the three payload codecs.
//! - `transport`: the TCP server.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod protocol;
pub mod transport;
pub mod utils;
